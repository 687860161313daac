//! Error types for the SQL MCP Server.
//!
//! Three layers of errors exist:
//! - [`ServerError`]: crate-wide failures (configuration, registry lookups, I/O)
//! - [`DriverError`]: a failure reported by the database driver, carrying the
//!   server error number and line so it can be classified and enriched
//! - [`ProtocolError`]: JSON-RPC level failures that map onto standard error codes

use std::borrow::Cow;
use thiserror::Error;

/// Domain-specific errors for the SQL MCP Server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No database name was given and no default is configured
    #[error("No default database configured. Available databases: {}", join_or_none(.available))]
    NoDefaultDatabase { available: Vec<String> },

    /// The requested database name is not registered
    #[error("Database '{requested}' not found. Available databases: {}", join_or_none(.available))]
    DatabaseNotFound {
        requested: String,
        available: Vec<String>,
    },

    /// I/O failure on the protocol streams
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn join_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join(", ")
    }
}

impl ServerError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Get a user-friendly suggestion for how to fix this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Config(_) => Some("Check SQL_MCP_DATABASES, SQL_MCP_DB_* and the --databases flag"),
            Self::NoDefaultDatabase { .. } => {
                Some("Pass a database name or set SQL_MCP_DEFAULT_DATABASE")
            }
            Self::DatabaseNotFound { .. } => {
                Some("Use list_databases to see the configured database names")
            }
            _ => None,
        }
    }
}

/// Broad origin of a driver failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// Error token returned by the database server.
    Server,
    /// Socket level failure.
    Io,
    /// Client-side timeout (connect or command).
    Timeout,
    /// Connection string or client configuration problem.
    Config,
    /// Anything else reported by the driver.
    Other,
}

/// A failure reported by the database driver.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct DriverError {
    /// Origin of the failure.
    pub kind: DriverErrorKind,
    /// Server error number, or a socket/timeout code mapped onto the same space.
    pub code: Option<i32>,
    /// Line within the batch the server reported, when known.
    pub line: Option<u32>,
    /// Message text as reported.
    pub message: String,
}

/// SQL Server error numbers and socket codes considered transient.
const TRANSIENT_CODES: &[i32] = &[
    -2,    // Timeout
    -1,    // Connection broken
    2,     // Network error / server not found
    53,    // Network path not found
    64,    // Specified network name no longer available
    233,   // No process on the other end of the pipe
    10053, // Connection aborted by host
    10054, // Connection reset by peer
    10060, // Connection attempt timed out
    40197, // Azure: service error processing request
    40501, // Azure: service busy
    40613, // Azure: database unavailable
];

/// Lowercased message fragments that mark a failure as transient.
const TRANSIENT_MESSAGE_FRAGMENTS: &[&str] = &[
    "transport-level error",
    "connection was forcibly closed",
    "connection broken",
    "foi forçado o cancelamento",
];

impl DriverError {
    /// Create an error reported by the server with its number and line.
    pub fn server(code: i32, line: Option<u32>, message: impl Into<String>) -> Self {
        Self {
            kind: DriverErrorKind::Server,
            code: Some(code),
            line,
            message: message.into(),
        }
    }

    /// Create a client-side timeout error. Uses code -2 like the native client.
    pub fn timeout(what: &str, seconds: u64) -> Self {
        Self {
            kind: DriverErrorKind::Timeout,
            code: Some(-2),
            line: None,
            message: format!("Timeout expired: {} did not complete within {} seconds", what, seconds),
        }
    }

    /// Create a configuration error (bad connection string and similar).
    pub fn config(message: impl Into<String>) -> Self {
        Self {
            kind: DriverErrorKind::Config,
            code: None,
            line: None,
            message: message.into(),
        }
    }

    /// Create an uncategorised driver error.
    pub fn other(message: impl Into<String>) -> Self {
        Self {
            kind: DriverErrorKind::Other,
            code: None,
            line: None,
            message: message.into(),
        }
    }

    /// Check if this error is transient and may succeed on retry.
    pub fn is_transient(&self) -> bool {
        if let Some(code) = self.code {
            if TRANSIENT_CODES.contains(&code) {
                return true;
            }
        }

        let message = self.message.to_lowercase();
        TRANSIENT_MESSAGE_FRAGMENTS
            .iter()
            .any(|fragment| message.contains(fragment))
    }
}

impl From<std::io::Error> for DriverError {
    fn from(e: std::io::Error) -> Self {
        DriverError::from_io_kind(e.kind(), e.to_string())
    }
}

impl DriverError {
    /// Map a socket failure onto the socket error numbers used by the transient set.
    pub fn from_io_kind(kind: std::io::ErrorKind, message: impl Into<String>) -> Self {
        use std::io::ErrorKind;

        let code = match kind {
            ErrorKind::ConnectionReset => Some(10054),
            ErrorKind::ConnectionAborted => Some(10053),
            ErrorKind::TimedOut => Some(10060),
            ErrorKind::ConnectionRefused | ErrorKind::NotConnected => Some(53),
            ErrorKind::BrokenPipe | ErrorKind::UnexpectedEof => Some(-1),
            _ => None,
        };

        Self {
            kind: DriverErrorKind::Io,
            code,
            line: None,
            message: message.into(),
        }
    }
}

/// JSON-RPC 2.0 protocol errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(Cow<'static, str>),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(Cow<'static, str>),

    #[error("Internal error: {0}")]
    Internal(Cow<'static, str>),
}

impl ProtocolError {
    /// Returns the JSON-RPC 2.0 error code.
    pub fn code(&self) -> i32 {
        match self {
            Self::ParseError(_) => -32700,
            Self::InvalidRequest(_) => -32600,
            Self::MethodNotFound(_) | Self::ToolNotFound(_) => -32601,
            Self::InvalidParams(_) => -32602,
            Self::Internal(_) => -32603,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_codes() {
        for code in [-2, -1, 2, 53, 64, 233, 10053, 10054, 10060, 40197, 40501, 40613] {
            let err = DriverError::server(code, None, "boom");
            assert!(err.is_transient(), "code {} should be transient", code);
        }
    }

    #[test]
    fn test_fatal_codes() {
        for code in [102, 156, 207, 208, 229, 1205, 4104, 18456] {
            let err = DriverError::server(code, Some(1), "boom");
            assert!(!err.is_transient(), "code {} should be fatal", code);
        }
    }

    #[test]
    fn test_transient_messages_case_insensitive() {
        let err = DriverError::other("A Transport-Level Error has occurred when receiving results");
        assert!(err.is_transient());

        let err = DriverError::other("An existing CONNECTION WAS FORCIBLY CLOSED by the remote host");
        assert!(err.is_transient());

        let err = DriverError::other("Connection Broken");
        assert!(err.is_transient());

        let err = DriverError::other("Foi forçado o cancelamento da conexão");
        assert!(err.is_transient());

        let err = DriverError::other("Invalid column name 'foo'.");
        assert!(!err.is_transient());
    }

    #[test]
    fn test_io_kind_mapping() {
        use std::io::ErrorKind;

        let err = DriverError::from_io_kind(ErrorKind::ConnectionReset, "reset");
        assert_eq!(err.code, Some(10054));
        assert!(err.is_transient());

        let err = DriverError::from_io_kind(ErrorKind::ConnectionRefused, "refused");
        assert_eq!(err.code, Some(53));
        assert!(err.is_transient());

        let err = DriverError::from_io_kind(ErrorKind::PermissionDenied, "denied");
        assert_eq!(err.code, None);
        assert!(!err.is_transient());
    }

    #[test]
    fn test_timeout_is_transient() {
        let err = DriverError::timeout("command", 300);
        assert_eq!(err.code, Some(-2));
        assert_eq!(err.kind, DriverErrorKind::Timeout);
        assert!(err.is_transient());
    }

    #[test]
    fn test_protocol_error_codes() {
        assert_eq!(ProtocolError::ParseError("x".into()).code(), -32700);
        assert_eq!(ProtocolError::InvalidRequest("x".into()).code(), -32600);
        assert_eq!(ProtocolError::MethodNotFound("x".into()).code(), -32601);
        assert_eq!(ProtocolError::ToolNotFound("x".into()).code(), -32601);
        assert_eq!(ProtocolError::InvalidParams("x".into()).code(), -32602);
        assert_eq!(ProtocolError::Internal("x".into()).code(), -32603);
    }

    #[test]
    fn test_resolution_messages() {
        let err = ServerError::DatabaseNotFound {
            requested: "sales".to_string(),
            available: vec!["main".to_string(), "audit".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Database 'sales' not found. Available databases: main, audit"
        );
        assert!(err.suggestion().is_some());

        let err = ServerError::NoDefaultDatabase { available: vec![] };
        assert_eq!(
            err.to_string(),
            "No default database configured. Available databases: (none)"
        );
    }
}
