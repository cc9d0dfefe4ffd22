//! XDBC: the database connectivity seam of the gateway.
//!
//! Vendor drivers expose the dyn-compatible [`Driver`], [`Database`],
//! [`Connection`] and [`Statement`] traits defined here. The gateway never
//! talks to a vendor API directly; everything above this crate programs
//! against these traits and the [`error`]/[`options`] vocabulary. Result
//! sets travel as Arrow record batches.

pub mod error;
pub mod options;

pub mod driver;
pub use driver::{Backend, Driver};

pub mod database;
pub use database::{Database, DatabaseInfo};

pub mod connection;
pub use connection::Connection;

pub mod statement;
pub use statement::Statement;

pub mod sql;

// Constants for vendor-specific driver options
pub mod oracle;
pub mod postgres;

pub mod mock;

pub(crate) mod builder;

/// Interpret the SQLSTATE [1] 5-char ASCII string as a Rust string.
///
/// [1] https://en.wikipedia.org/wiki/SQLSTATE
pub fn str_from_sqlstate(sqlstate: &[u8; 5]) -> &str {
    let res = std::str::from_utf8(sqlstate);
    debug_assert!(res.is_ok(), "SQLSTATE is not valid ASCII: {sqlstate:?}");
    res.unwrap_or("")
}
