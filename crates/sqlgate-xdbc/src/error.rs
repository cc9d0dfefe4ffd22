//! Error vocabulary for the XDBC traits.
//!
//! Follows the ADBC error model: a status class, a free-form message, a
//! 5-byte SQLSTATE and an optional vendor code.

use core::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// Status class of a driver error.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Status {
    Unknown,
    NotImplemented,
    NotFound,
    AlreadyExists,
    InvalidArguments,
    InvalidState,
    InvalidData,
    Integrity,
    Internal,
    Io,
    Cancelled,
    Timeout,
    Unauthenticated,
    Unauthorized,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Unknown => "Unknown",
            Status::NotImplemented => "Not implemented",
            Status::NotFound => "Not found",
            Status::AlreadyExists => "Already exists",
            Status::InvalidArguments => "Invalid arguments",
            Status::InvalidState => "Invalid state",
            Status::InvalidData => "Invalid data",
            Status::Integrity => "Integrity violation",
            Status::Internal => "Internal error",
            Status::Io => "IO error",
            Status::Cancelled => "Cancelled",
            Status::Timeout => "Timeout",
            Status::Unauthenticated => "Unauthenticated",
            Status::Unauthorized => "Unauthorized",
        };
        write!(f, "{s}")
    }
}

/// Driver error.
#[derive(Debug, Clone)]
pub struct Error {
    pub message: String,
    pub status: Status,
    /// SQLSTATE code, `b"00000"` when not applicable.
    pub sqlstate: [u8; 5],
    /// Vendor-specific error code, 0 when not applicable.
    pub vendor_code: i32,
}

impl Error {
    pub fn with_message_and_status(message: impl Into<String>, status: Status) -> Self {
        Error {
            message: message.into(),
            status,
            sqlstate: [b'0'; 5],
            vendor_code: 0,
        }
    }

    pub fn with_sqlstate(mut self, sqlstate: [u8; 5]) -> Self {
        self.sqlstate = sqlstate;
        self
    }

    pub fn with_vendor_code(mut self, vendor_code: i32) -> Self {
        self.vendor_code = vendor_code;
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

impl From<arrow_schema::ArrowError> for Error {
    fn from(err: arrow_schema::ArrowError) -> Self {
        Error::with_message_and_status(err.to_string(), Status::Internal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sqlstate_is_all_zeros() {
        let err = Error::with_message_and_status("boom", Status::Internal);
        assert_eq!(crate::str_from_sqlstate(&err.sqlstate), "00000");
    }
}
