//! XDBC Connection
//!
//!

use core::fmt;
use std::time::Duration;

use arrow_array::RecordBatchReader;
use arrow_schema::Schema;

use crate::Statement;
use crate::error::Result;
use crate::options::{InfoCode, ObjectDepth, OptionConnection, OptionValue};

mod builder;
pub use builder::*;

/// XDBC Connection.
///
/// A [`Connection`] is a single, logical connection to a database.
/// Connections are created by a [`Database`](crate::Database) instance and
/// are used to execute SQL statements and inspect metadata. A connection must
/// never be shared between threads without external synchronization; the
/// pool above this crate guarantees exclusive borrows.
pub trait Connection: Send {
    /// Allocate and initialize a new statement.
    fn new_statement(&mut self) -> Result<Box<dyn Statement>>;

    /// Cancel the in-progress operation on this connection.
    fn cancel(&mut self) -> Result<()>;

    /// Probe whether the connection is still usable, waiting at most
    /// `timeout` for the round trip.
    fn is_valid(&mut self, timeout: Duration) -> Result<bool>;

    /// Flip the connection into (or out of) read-only mode.
    fn set_read_only(&mut self, read_only: bool) -> Result<()>;

    /// Close the connection. Dropping has the same effect; this form lets
    /// callers observe close failures.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// Get a piece of metadata about the database/driver.
    fn get_info(&mut self, info_code: InfoCode) -> Result<String>;

    /// Get a view of catalogs, schemas, tables, and columns.
    ///
    /// String filters may be `None` (no filtering) or a search pattern.
    /// The result is a flattened object listing with this schema:
    ///
    /// Field Name     | Field Type
    /// ---------------|--------------
    /// catalog_name   | utf8
    /// schema_name    | utf8
    /// object_name    | utf8 not null
    /// object_type    | utf8 not null
    fn get_objects<'a>(
        &'a mut self,
        depth: ObjectDepth,
        catalog: Option<&str>,
        db_schema: Option<&str>,
        table_name: Option<&str>,
        table_type: Option<Vec<&str>>,
        column_name: Option<&str>,
    ) -> Result<Box<dyn RecordBatchReader + Send + 'a>>;

    /// Get the Arrow schema of a table.
    fn get_table_schema(
        &mut self,
        catalog: Option<&str>,
        db_schema: Option<&str>,
        table_name: &str,
    ) -> Result<Schema>;

    /// Set a post-init option.
    fn set_option(&mut self, key: OptionConnection, value: OptionValue) -> Result<()>;

    /// [Debug](std::fmt::Debug) implementation for Connection.
    fn debug_fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dyn Connection")
    }
}

impl fmt::Debug for dyn Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.debug_fmt(f)
    }
}
