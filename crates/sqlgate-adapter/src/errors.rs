use std::{fmt, io};

use sqlgate_error::{ErrorCode, GateError};
use sqlgate_xdbc::error::Status;

pub type AdapterResult<T> = Result<T, AdapterError>;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AdapterErrorKind {
    /// Internal error
    Internal,
    /// Caller passed a blank or malformed input
    InvalidArgument,
    /// SQL execution error
    SqlExecution,
    /// Configuration-related error
    Configuration,
    /// XDBC driver error
    Xdbc(Status),
    /// Arrow error
    Arrow,
    /// Unexpected result
    UnexpectedResult,
    /// Connection could not be established or went away
    Connection,
    /// Timed out waiting for a connection or a statement
    Timeout,
    /// Cancelled operation
    Cancelled,
    /// Input/Output error
    Io,
    /// JSON ser/deserialization error
    SerdeJSON,
    /// Not supported
    NotSupported,
}

impl AdapterErrorKind {
    fn description(&self) -> &'static str {
        match self {
            Self::Internal => "Internal error",
            Self::InvalidArgument => "Invalid argument",
            Self::SqlExecution => "SQL execution error",
            Self::Configuration => "Configuration error",
            Self::Xdbc(_) => "Driver error",
            Self::Arrow => "Arrow error",
            Self::UnexpectedResult => "Unexpected result",
            Self::Connection => "Connection failure",
            Self::Timeout => "Timed out",
            Self::Cancelled => "Operation was cancelled",
            Self::Io => "Input/output",
            Self::SerdeJSON => "JSON",
            Self::NotSupported => "Not supported",
        }
    }
}

impl fmt::Display for AdapterErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Adapter error.
#[derive(Debug, Clone)]
pub struct AdapterError {
    kind: AdapterErrorKind,
    message: String,
    /// SQLSTATE code from database operations.
    ///
    /// Use [AdapterError::sqlstate()] to get the string representation.
    sqlstate: [u8; 5],
    /// Vendor-specific error code, if applicable.
    vendor_code: Option<i32>,
}

impl AdapterError {
    /// Create new error.
    pub fn new(kind: AdapterErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            sqlstate: [b'0'; 5],
            vendor_code: None,
        }
    }

    pub fn kind(&self) -> AdapterErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        let stripped_message = if matches!(self.kind, AdapterErrorKind::Xdbc(_)) {
            // Remove prefixes like "Unknown: " or "Internal: " which don't
            // add any informational value to the error message.
            self.message
                .strip_prefix("Unknown: ")
                .or_else(|| self.message.strip_prefix("Internal: "))
        } else {
            None
        };
        stripped_message.unwrap_or(&self.message)
    }

    /// Get SQLSTATE as an ASCII string.
    pub fn sqlstate(&self) -> &str {
        sqlgate_xdbc::str_from_sqlstate(&self.sqlstate)
    }

    pub fn vendor_code(&self) -> Option<i32> {
        self.vendor_code
    }
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = self.message();
        if message.is_empty() {
            write!(f, "{}", self.kind)?;
        } else {
            // Driver errors are already descriptive and usually prefixed with
            // vendor context, so the kind would only add noise.
            match self.kind {
                AdapterErrorKind::Xdbc(_) => write!(f, "{message}")?,
                _ => write!(f, "{}: {message}", self.kind)?,
            }
        }
        let sqlstate: &str = self.sqlstate();
        if sqlstate != "00000" || self.vendor_code.is_some() {
            write!(f, " (SQLSTATE: {sqlstate}")?;
            if let Some(vendor_code) = self.vendor_code {
                write!(f, ", Vendor code: {vendor_code}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl std::error::Error for AdapterError {}

impl From<sqlgate_xdbc::error::Error> for AdapterError {
    fn from(err: sqlgate_xdbc::error::Error) -> Self {
        let sqlstate = if err.sqlstate[0] == 0 {
            [b'0'; 5]
        } else {
            err.sqlstate
        };
        let vendor_code = if err.vendor_code == 0 {
            None
        } else {
            Some(err.vendor_code)
        };
        AdapterError {
            kind: AdapterErrorKind::Xdbc(err.status),
            message: err.message,
            sqlstate,
            vendor_code,
        }
    }
}

impl From<arrow_schema::ArrowError> for AdapterError {
    fn from(err: arrow_schema::ArrowError) -> Self {
        AdapterError::new(AdapterErrorKind::Arrow, err.to_string())
    }
}

impl From<io::Error> for AdapterError {
    fn from(err: io::Error) -> Self {
        AdapterError::new(AdapterErrorKind::Io, err.to_string())
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::new(AdapterErrorKind::SerdeJSON, err.to_string())
    }
}

impl From<AdapterError> for Box<GateError> {
    fn from(err: AdapterError) -> Self {
        let code = match err.kind {
            AdapterErrorKind::InvalidArgument => ErrorCode::InvalidArgument,
            AdapterErrorKind::Configuration => ErrorCode::InvalidConfig,
            AdapterErrorKind::SqlExecution | AdapterErrorKind::Xdbc(_) => ErrorCode::ExecutionError,
            AdapterErrorKind::Connection => ErrorCode::ConnectionFailure,
            AdapterErrorKind::Timeout => ErrorCode::TimedOut,
            AdapterErrorKind::Cancelled => ErrorCode::OperationCanceled,
            AdapterErrorKind::Io => ErrorCode::IoError,
            AdapterErrorKind::SerdeJSON => ErrorCode::SerializationError,
            AdapterErrorKind::NotSupported => ErrorCode::NotSupported,
            AdapterErrorKind::Internal
            | AdapterErrorKind::Arrow
            | AdapterErrorKind::UnexpectedResult => ErrorCode::RuntimeError,
        };
        Box::new(GateError::new(code, err.to_string()).with_cause(err))
    }
}
