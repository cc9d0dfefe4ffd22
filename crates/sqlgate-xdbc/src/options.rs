//! Typed option keys for databases, connections and statements.
//!
//! Every enum carries an `Other(String)` escape hatch for driver-specific
//! keys, mirroring the ADBC option model.

/// An option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    String(String),
    Bytes(Vec<u8>),
    Int(i64),
    Double(f64),
}

impl OptionValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            OptionValue::Int(i) => Some(*i),
            OptionValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::String(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::String(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Int(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OptionDatabase {
    Uri,
    Username,
    Password,
    Other(String),
}

impl AsRef<str> for OptionDatabase {
    fn as_ref(&self) -> &str {
        match self {
            OptionDatabase::Uri => "uri",
            OptionDatabase::Username => "username",
            OptionDatabase::Password => "password",
            OptionDatabase::Other(key) => key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OptionConnection {
    AutoCommit,
    ReadOnly,
    CurrentCatalog,
    CurrentSchema,
    Other(String),
}

impl AsRef<str> for OptionConnection {
    fn as_ref(&self) -> &str {
        match self {
            OptionConnection::AutoCommit => "autocommit",
            OptionConnection::ReadOnly => "readonly",
            OptionConnection::CurrentCatalog => "current_catalog",
            OptionConnection::CurrentSchema => "current_schema",
            OptionConnection::Other(key) => key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OptionStatement {
    /// Statement timeout, integer seconds. 0 means no limit.
    QueryTimeoutSeconds,
    /// Driver fetch/batch size hint, integer rows.
    FetchSize,
    Other(String),
}

impl AsRef<str> for OptionStatement {
    fn as_ref(&self) -> &str {
        match self {
            OptionStatement::QueryTimeoutSeconds => "query_timeout_s",
            OptionStatement::FetchSize => "fetch_size",
            OptionStatement::Other(key) => key,
        }
    }
}

/// Metadata keys answered by [`crate::DatabaseInfo::get_info`] and
/// [`crate::Connection::get_info`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum InfoCode {
    VendorName,
    VendorVersion,
    DriverName,
    DriverVersion,
}

/// The level of nesting requested from [`crate::Connection::get_objects`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ObjectDepth {
    All,
    Catalogs,
    Schemas,
    Tables,
    Columns,
}
