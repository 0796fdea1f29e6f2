//! Error types for external command execution

use thiserror::Error;

/// Failure to get a usable answer out of an external program.
///
/// None of these are fatal: callers treat them as "unknown" and fall back.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Binary is not installed / not on PATH
    #[error("'{0}' is not installed")]
    NotFound(String),

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}")]
    Failed { program: String, status: String },

    #[error("'{0}' produced no output")]
    EmptyOutput(String),

    /// Output was there but not in the expected shape
    #[error("unexpected output from '{program}': {output:?}")]
    UnexpectedOutput { program: String, output: String },
}

impl CommandError {
    /// Map a spawn error, distinguishing a missing binary
    pub fn from_io(program: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            CommandError::NotFound(program.to_string())
        } else {
            CommandError::Spawn {
                program: program.to_string(),
                source: err,
            }
        }
    }

    /// True when the tool itself is unavailable on this system
    pub fn is_unavailable(&self) -> bool {
        matches!(self, CommandError::NotFound(_) | CommandError::Spawn { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_maps_to_not_found() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "nope");
        let mapped = CommandError::from_io("xinput", err);
        assert!(matches!(mapped, CommandError::NotFound(ref p) if p == "xinput"));
        assert!(mapped.is_unavailable());
    }

    #[test]
    fn test_failed_status_is_not_unavailable() {
        let err = CommandError::Failed {
            program: "synclient".into(),
            status: "exit status: 1".into(),
        };
        assert!(!err.is_unavailable());
        assert_eq!(err.to_string(), "'synclient' exited with exit status: 1");
    }
}
