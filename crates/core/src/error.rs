//! Error types for s3cm-core
//!
//! One variant per failure class the shell has to render. Provider responses
//! reach this type through [`crate::normalize`], never by string matching at
//! the call site.

use thiserror::Error;

/// Result type alias for s3cm-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for s3cm-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Bad profile or credential input; the user must correct it
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Credentials rejected by the provider
    #[error("Authentication failed ({code}): {message}")]
    Authentication { code: String, message: String },

    /// Network, DNS or timeout failure reaching the endpoint
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Non-2xx response not otherwise classified
    #[error("Provider error {code}{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Provider {
        code: String,
        status: Option<u16>,
        message: String,
    },

    /// Bucket name already taken
    #[error("Name conflict: {0}")]
    NameConflict(String),

    /// Bucket or object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed bucket name or object key
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation requires a connected session
    #[error("No active session; connect first")]
    NoActiveSession,

    /// Operation requires a selected bucket
    #[error("No bucket selected")]
    NoBucketSelected,

    /// Local file could not be read, created or written
    #[error("Local I/O error on {path}: {source}")]
    LocalIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Terminal transfer failure after retries were exhausted
    #[error("Transfer of '{key}' failed: {source}")]
    Transfer {
        key: String,
        #[source]
        source: Box<Error>,
    },

    /// Operation stopped by a cancellation signal
    #[error("Operation cancelled")]
    Cancelled,
}

/// Provider codes that signal throttling or a server-side hiccup
const TRANSIENT_CODES: &[&str] = &[
    "RequestTimeout",
    "ServiceUnavailable",
    "InternalError",
    "SlowDown",
    "Throttling",
];

impl Error {
    /// Wrap an I/O error with the local path it happened on
    pub fn local_io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Error::LocalIo {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Whether the retry decorator may try this call again
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Connectivity(_) => true,
            Error::Provider { code, status, .. } => {
                status.is_some_and(|s| s >= 500) || TRANSIENT_CODES.contains(&code.as_str())
            }
            _ => false,
        }
    }

    /// Short machine-readable name of the error class
    pub const fn kind(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "ConfigurationError",
            Error::Authentication { .. } => "AuthenticationError",
            Error::Connectivity(_) => "ConnectivityError",
            Error::Provider { .. } => "ProviderError",
            Error::NameConflict(_) => "NameConflictError",
            Error::NotFound(_) => "NotFoundError",
            Error::Validation(_) => "ValidationError",
            Error::NoActiveSession => "NoActiveSessionError",
            Error::NoBucketSelected => "NoBucketSelectedError",
            Error::LocalIo { .. } => "LocalIOError",
            Error::Transfer { .. } => "TransferError",
            Error::Cancelled => "Cancelled",
        }
    }

    /// Get the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Configuration(_)
            | Error::Validation(_)
            | Error::NoActiveSession
            | Error::NoBucketSelected => 2, // UsageError
            Error::Connectivity(_) => 3,            // NetworkError
            Error::Authentication { .. } => 4,      // AuthError
            Error::NotFound(_) => 5,                // NotFound
            Error::NameConflict(_) => 6,            // Conflict
            Error::Cancelled => 130,                // Interrupted
            Error::Transfer { source, .. } => source.exit_code(),
            _ => 1,                                 // GeneralError
        }
    }
}
