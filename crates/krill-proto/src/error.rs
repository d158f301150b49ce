//! Protocol error types and the closed wire error-code set.

use std::fmt;
use std::str::FromStr;

/// Errors that can occur while reading, writing or parsing protocol frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    /// Underlying socket failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the connection before a complete frame arrived.
    #[error("connection closed mid-exchange")]
    ConnectionClosed,

    /// The per-operation deadline elapsed.
    #[error("operation timed out")]
    Timeout,

    /// A text line exceeded [`MAX_LINE_LEN`](crate::MAX_LINE_LEN) bytes.
    #[error("line exceeds maximum length")]
    LineTooLong,

    /// A text line contained non-ASCII bytes.
    #[error("line is not ascii text")]
    NotAscii,

    /// The first token of a request is not a known command.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// A known command with bad arity, numbers or ranges.
    #[error("invalid parameters for {command}: {detail}")]
    InvalidParameters {
        /// The command verb the parameters belong to.
        command: &'static str,
        /// What was wrong.
        detail: String,
    },

    /// A record line in a multi-record exchange could not be parsed.
    #[error("malformed record line: {0}")]
    MalformedRecord(String),

    /// An `ERROR` reply carried a code outside the closed set.
    #[error("unknown error code: {0}")]
    UnknownErrorCode(String),
}

/// The closed set of error codes surfaced on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Unknown or malformed first token.
    InvalidCommand,
    /// Argument arity, number parsing, or range failure.
    InvalidParameters,
    /// Fewer than the replication factor of nodes meet the size filter.
    InsufficientNodes,
    /// Unknown filename on download.
    FileNotFound,
    /// Metadata validation rejected the manifest.
    RegistrationFailed,
    /// Keep-alive or space update for an unknown node.
    NodeNotFound,
    /// Connection closed or timed out mid-exchange.
    ReadError,
}

impl ErrorCode {
    /// The wire token for this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidCommand => "INVALID_COMMAND",
            ErrorCode::InvalidParameters => "INVALID_PARAMETERS",
            ErrorCode::InsufficientNodes => "INSUFFICIENT_NODES",
            ErrorCode::FileNotFound => "FILE_NOT_FOUND",
            ErrorCode::RegistrationFailed => "REGISTRATION_FAILED",
            ErrorCode::NodeNotFound => "NODE_NOT_FOUND",
            ErrorCode::ReadError => "READ_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorCode {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INVALID_COMMAND" => Ok(ErrorCode::InvalidCommand),
            "INVALID_PARAMETERS" => Ok(ErrorCode::InvalidParameters),
            "INSUFFICIENT_NODES" => Ok(ErrorCode::InsufficientNodes),
            "FILE_NOT_FOUND" => Ok(ErrorCode::FileNotFound),
            "REGISTRATION_FAILED" => Ok(ErrorCode::RegistrationFailed),
            "NODE_NOT_FOUND" => Ok(ErrorCode::NodeNotFound),
            "READ_ERROR" => Ok(ErrorCode::ReadError),
            other => Err(ProtoError::UnknownErrorCode(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_roundtrip() {
        let codes = [
            ErrorCode::InvalidCommand,
            ErrorCode::InvalidParameters,
            ErrorCode::InsufficientNodes,
            ErrorCode::FileNotFound,
            ErrorCode::RegistrationFailed,
            ErrorCode::NodeNotFound,
            ErrorCode::ReadError,
        ];
        for code in codes {
            let parsed: ErrorCode = code.as_str().parse().unwrap();
            assert_eq!(parsed, code);
        }
    }

    #[test]
    fn test_error_code_rejects_unknown() {
        assert!("NOT_A_CODE".parse::<ErrorCode>().is_err());
        assert!("".parse::<ErrorCode>().is_err());
    }
}
