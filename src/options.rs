use serde::{Deserialize, Serialize};

/// Row-count ceiling handed to the renderer.
pub const DEFAULT_LIMIT: u32 = 200;

/// Caller-tunable parse settings. Missing keys fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParseOptions {
    pub limit: u32,
    /// Run group-by sub-parses on the rayon pool.
    pub parallel_group_by: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            parallel_group_by: false,
        }
    }
}
