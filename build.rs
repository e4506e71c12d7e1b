fn main() {
    // Only the Node addon build needs the napi link setup.
    if std::env::var_os("CARGO_FEATURE_NAPI").is_some() {
        napi_build::setup();
    }
}
