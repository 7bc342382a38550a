// Error mapping helpers shared by the commands

use anyhow::{Result, anyhow};

/// Extension trait for Results that turns any displayable error into an
/// `anyhow::Error` with a "Failed to ..." context message.
pub trait ErrorContext<T> {
    /// Map error with a context message
    fn with_context_msg(self, msg: &str) -> Result<T>;

    /// Map error with a context message and a subject
    fn with_context_fmt(self, msg: &str, args: &dyn std::fmt::Display) -> Result<T>;

    /// File operations: "Failed to {operation} {path}: ..."
    fn file_context(self, operation: &str, path: &str) -> Result<T>;

    /// Configuration loading and validation
    fn config_context(self, path: &str) -> Result<T>;

    /// Template loading and rendering
    fn template_context(self, operation: &str) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::fmt::Display,
{
    fn with_context_msg(self, msg: &str) -> Result<T> {
        self.map_err(|e| anyhow!("{}: {}", msg, e))
    }

    fn with_context_fmt(self, msg: &str, args: &dyn std::fmt::Display) -> Result<T> {
        self.map_err(|e| anyhow!("{} {}: {}", msg, args, e))
    }

    fn file_context(self, operation: &str, path: &str) -> Result<T> {
        self.with_context_fmt(&format!("Failed to {}", operation), &path)
    }

    fn config_context(self, path: &str) -> Result<T> {
        self.with_context_fmt("Failed to load configuration", &path)
    }

    fn template_context(self, operation: &str) -> Result<T> {
        self.with_context_msg(&format!("Failed to {} templates", operation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_file_context() {
        let io_error = IoError::new(ErrorKind::NotFound, "file not found");
        let result: std::result::Result<(), _> = Err(io_error);

        let err = result.file_context("read", "/test/list.txt").expect_err("mapped");
        assert!(err.to_string().contains("Failed to read /test/list.txt"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_config_context() {
        let result: std::result::Result<(), _> = Err("unknown field `drss`");
        let err = result.config_context("tdspu.yaml").expect_err("mapped");
        assert_eq!(
            err.to_string(),
            "Failed to load configuration tdspu.yaml: unknown field `drss`"
        );
    }

    #[test]
    fn test_template_context() {
        let result: std::result::Result<(), _> = Err("no such directory");
        let err = result.template_context("load").expect_err("mapped");
        assert!(err.to_string().starts_with("Failed to load templates"));
    }
}
