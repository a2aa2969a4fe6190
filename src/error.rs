use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchErrorCode {
    Validation,
    InvalidConfig,
    Connection,
    Statement,
    Commit,
    Decode,
    Io,
}

impl BatchErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchErrorCode::Validation => "validation",
            BatchErrorCode::InvalidConfig => "invalid_config",
            BatchErrorCode::Connection => "connection",
            BatchErrorCode::Statement => "statement",
            BatchErrorCode::Commit => "commit",
            BatchErrorCode::Decode => "decode",
            BatchErrorCode::Io => "io",
        }
    }
}

impl std::fmt::Display for BatchErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("invalid config: {message}")]
    InvalidConfig { message: String },
    #[error("connection error: {message}")]
    Connection { message: String },
    #[error(
        "statement {position} failed: {message}; all changes rolled back",
        position = .index + 1
    )]
    Statement { index: usize, message: String },
    #[error("commit failed: {message}; all changes rolled back")]
    Commit { message: String },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BatchError {
    pub fn code(&self) -> BatchErrorCode {
        match self {
            BatchError::Validation(_) => BatchErrorCode::Validation,
            BatchError::InvalidConfig { .. } => BatchErrorCode::InvalidConfig,
            BatchError::Connection { .. } => BatchErrorCode::Connection,
            BatchError::Statement { .. } => BatchErrorCode::Statement,
            BatchError::Commit { .. } => BatchErrorCode::Commit,
            BatchError::Decode(_) => BatchErrorCode::Decode,
            BatchError::Io(_) => BatchErrorCode::Io,
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code().as_str()
    }

    /// Zero-based execution position of the statement that failed, if the
    /// failure came from one.
    pub fn statement_index(&self) -> Option<usize> {
        match self {
            BatchError::Statement { index, .. } => Some(*index),
            _ => None,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        BatchError::Validation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::{BatchError, BatchErrorCode};

    #[test]
    fn error_code_strings_are_stable() {
        assert_eq!(BatchErrorCode::Validation.as_str(), "validation");
        assert_eq!(BatchErrorCode::Connection.as_str(), "connection");
        assert_eq!(BatchErrorCode::Statement.as_str(), "statement");
        assert_eq!(BatchErrorCode::Commit.as_str(), "commit");
    }

    #[test]
    fn statement_error_reports_one_based_position_in_message() {
        let err = BatchError::Statement {
            index: 2,
            message: "no such column: nope".into(),
        };
        assert_eq!(err.code(), BatchErrorCode::Statement);
        assert_eq!(err.statement_index(), Some(2));
        assert_eq!(
            err.to_string(),
            "statement 3 failed: no such column: nope; all changes rolled back"
        );
    }

    #[test]
    fn non_statement_errors_carry_no_index() {
        let err = BatchError::Connection {
            message: "refused".into(),
        };
        assert_eq!(err.code_str(), "connection");
        assert_eq!(err.statement_index(), None);
    }
}
