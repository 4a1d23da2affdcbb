//! Error types with fix suggestions (v0.1)

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// All error variants are part of the public API.
/// Some variants are only constructed in library code/tests.
#[derive(Error, Debug)]
pub enum EngineError {
    // ─────────────────────────────────────────────────────────────
    // Configuration errors: fatal, raised at the point of
    // detection, never retried (COG-010 to COG-015)
    // ─────────────────────────────────────────────────────────────
    #[error("COG-010: Cog '{name}' is already defined in this scope")]
    DuplicateCog { name: String },

    #[error("COG-011: Unknown cog kind '{kind}'")]
    UnknownCogKind { kind: String },

    #[error("COG-012: Scope '{scope}' is not defined in this workflow")]
    UnknownScope { scope: String },

    #[error("COG-013: Invalid input for cog '{cog}': {reason}")]
    InvalidInput { cog: String, reason: String },

    #[error("COG-014: repeat '{cog}' requires a positive max_iterations")]
    MissingMaxIterations { cog: String },

    #[error("COG-015: {signal} signal raised outside of a repeat/map body")]
    StraySignal { signal: String },

    // ─────────────────────────────────────────────────────────────
    // Access errors: raised synchronously at the call site
    // (COG-020 to COG-023)
    // ─────────────────────────────────────────────────────────────
    #[error("COG-020: Cog '{name}' does not exist in this scope")]
    CogDoesNotExist { name: String },

    #[error("COG-021: Cog '{name}' was skipped and has no output")]
    CogSkipped { name: String },

    #[error("COG-022: Cog '{name}' failed: {reason}")]
    CogFailed { name: String, reason: String },

    #[error("COG-023: Iteration {index} is not available (of {len})")]
    IterationMissing { index: i64, len: usize },

    // ─────────────────────────────────────────────────────────────
    // Execution failures
    // ─────────────────────────────────────────────────────────────
    #[error("Execution error: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Command timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Background cog panicked: {0}")]
    TaskPanic(String),

    // ─────────────────────────────────────────────────────────────
    // Output extraction errors (COG-060 to COG-061)
    // ─────────────────────────────────────────────────────────────
    #[error("COG-060: No parseable JSON in output: {details}")]
    Parse { details: String },

    #[error("COG-061: No numeric value in output")]
    NoNumber,
}

impl EngineError {
    /// True for errors raised by the scoped accessors (`demand`,
    /// `iteration`, ...). The lenient `outputs` step swallows these
    /// into a nil final output instead of propagating.
    pub fn is_access(&self) -> bool {
        matches!(
            self,
            EngineError::CogDoesNotExist { .. }
                | EngineError::CogSkipped { .. }
                | EngineError::IterationMissing { .. }
        )
    }

    /// True for workflow-authoring errors that should surface during
    /// testing rather than at run time.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            EngineError::DuplicateCog { .. }
                | EngineError::UnknownCogKind { .. }
                | EngineError::UnknownScope { .. }
                | EngineError::InvalidInput { .. }
                | EngineError::MissingMaxIterations { .. }
                | EngineError::StraySignal { .. }
        )
    }
}

impl FixSuggestion for EngineError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            EngineError::DuplicateCog { .. } => {
                Some("Use unique cog names within a scope, or leave the cog anonymous")
            }
            EngineError::UnknownCogKind { .. } => {
                Some("Register the cog kind on the CogRegistry before running")
            }
            EngineError::UnknownScope { .. } => {
                Some("Declare the scope on the workflow before calling into it")
            }
            EngineError::InvalidInput { .. } => {
                Some("Populate the required input fields in the step procedure")
            }
            EngineError::MissingMaxIterations { .. } => {
                Some("Set max_iterations to a positive bound on the repeat input")
            }
            EngineError::StraySignal { .. } => {
                Some("break/next are only meaningful inside a repeat or map body scope")
            }
            EngineError::CogDoesNotExist { .. } => {
                Some("Define the cog earlier in the same scope, or use the non-raising accessor")
            }
            EngineError::CogSkipped { .. } | EngineError::CogFailed { .. } => {
                Some("Check cog status with the boolean accessor before demanding its output")
            }
            EngineError::IterationMissing { .. } => {
                Some("That iteration never ran (break/next); inspect slots via collect instead")
            }
            EngineError::Parse { .. } => Some("Ensure the cog output contains valid JSON"),
            EngineError::NoNumber => Some("Ensure the cog output contains a numeric value"),
            EngineError::Timeout { .. } => Some("Raise the timeout in the cog config"),
            EngineError::Execution(_) | EngineError::Io(_) | EngineError::TaskPanic(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_errors_are_classified() {
        assert!(EngineError::CogDoesNotExist {
            name: "x".to_string()
        }
        .is_access());
        assert!(EngineError::IterationMissing { index: -1, len: 0 }.is_access());
        assert!(!EngineError::Execution("boom".to_string()).is_access());
        // A failed cog propagates even through the lenient outputs step
        assert!(!EngineError::CogFailed {
            name: "x".to_string(),
            reason: "boom".to_string()
        }
        .is_access());
    }

    #[test]
    fn config_errors_are_classified() {
        assert!(EngineError::DuplicateCog {
            name: "a".to_string()
        }
        .is_config());
        assert!(EngineError::MissingMaxIterations {
            cog: "r".to_string()
        }
        .is_config());
        assert!(!EngineError::Timeout { seconds: 5 }.is_config());
    }

    #[test]
    fn every_config_error_has_a_suggestion() {
        let errs = [
            EngineError::DuplicateCog {
                name: "a".to_string(),
            },
            EngineError::UnknownCogKind {
                kind: "zap".to_string(),
            },
            EngineError::UnknownScope {
                scope: "body".to_string(),
            },
            EngineError::InvalidInput {
                cog: "c".to_string(),
                reason: "missing command".to_string(),
            },
            EngineError::MissingMaxIterations {
                cog: "r".to_string(),
            },
        ];
        for err in errs {
            assert!(err.fix_suggestion().is_some(), "no suggestion for {err}");
        }
    }
}
