use serde::Serialize;

use crate::markup::NodePath;

// ═══════════════════════════════════════════════════════════════════════════════
// CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_NO_VALID_FIELDS: &str = "ARCH-ERR-NO-FIELDS";
pub const ERR_EMPTY_ARCH: &str = "ARCH-ERR-EMPTY";
pub const ERR_MARKUP: &str = "ARCH-ERR-MARKUP";
pub const ERR_SCHEMA: &str = "ARCH-ERR-SCHEMA";

pub const DIAG_INVALID_FIELD: &str = "ARCH-W001";
pub const DIAG_INVALID_BUTTON: &str = "ARCH-W002";
pub const DIAG_GROUPBY_NO_RELATION: &str = "ARCH-W003";
pub const DIAG_INVALID_WIDGET: &str = "ARCH-W004";

// ═══════════════════════════════════════════════════════════════════════════════
// FATAL ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Errors that abort a parse. No partial descriptor is ever returned with one.
#[derive(Debug, thiserror::Error)]
pub enum ArchError {
    /// The top-level arch produced no usable field.
    #[error("gantt view on model '{model}' requires at least one valid field")]
    NoValidFields { model: String },

    #[error("arch contains no element")]
    EmptyArch,

    #[error("failed to read arch markup: {0}")]
    Markup(String),

    #[error("invalid field schema: {0}")]
    Schema(#[from] serde_json::Error),
}

impl ArchError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoValidFields { .. } => ERR_NO_VALID_FIELDS,
            Self::EmptyArch => ERR_EMPTY_ARCH,
            Self::Markup(_) => ERR_MARKUP,
            Self::Schema(_) => ERR_SCHEMA,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTICS
// ═══════════════════════════════════════════════════════════════════════════════

/// A skipped node. Reported alongside the result, never returned as an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: &'static str,
    pub message: String,
    pub tag: String,
    pub path: NodePath,
    pub model: String,
}

impl Diagnostic {
    /// Build the diagnostic and log it.
    pub fn emit(
        code: &'static str,
        message: String,
        tag: &str,
        path: &NodePath,
        model: &str,
    ) -> Self {
        tracing::warn!(code, %path, model, tag, "{}", message);
        Self {
            code,
            message,
            tag: tag.to_string(),
            path: path.clone(),
            model: model.to_string(),
        }
    }

    /// Re-anchor a diagnostic raised inside a subtree onto the enclosing tree.
    pub fn rebased(mut self, base: &NodePath) -> Self {
        self.path = base.join(&self.path);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_and_messages() {
        let err = ArchError::NoValidFields {
            model: "project.task".to_string(),
        };
        assert_eq!(err.code(), ERR_NO_VALID_FIELDS);
        assert!(err.to_string().contains("project.task"));

        let err = ArchError::Markup("Unexpected element in end phase".to_string());
        assert_eq!(err.code(), ERR_MARKUP);
        assert!(err.to_string().contains("end phase"));

        let err: ArchError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(err.code(), ERR_SCHEMA);
    }

    #[test]
    fn test_rebased_diagnostic() {
        let diag = Diagnostic::emit(
            DIAG_INVALID_FIELD,
            "unknown field".to_string(),
            "field",
            &NodePath::from(vec![1]),
            "stage",
        );
        let rebased = diag.rebased(&NodePath::from(vec![0, 2]));
        assert_eq!(rebased.path, NodePath::from(vec![0, 2, 1]));
        assert_eq!(rebased.code, DIAG_INVALID_FIELD);
    }
}
