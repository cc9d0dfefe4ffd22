//! XDBC Statement
//!
//!

use core::fmt;

use arrow_array::{RecordBatch, RecordBatchReader};

use crate::error::Result;
use crate::options::{OptionStatement, OptionValue};

/// XDBC Statement.
///
/// One prepared statement. The usual lifecycle is `set_sql_query` →
/// (`bind`) → `execute`/`execute_update`; the statement owns its result
/// state and a new result invalidates the previous one.
pub trait Statement: Send {
    /// Bind parameter data. The batch carries one row; column `i` binds
    /// positional parameter `i + 1`.
    fn bind(&mut self, batch: RecordBatch) -> Result<()>;

    /// Execute the statement and get the results.
    ///
    /// This invalidates any prior result sets.
    fn execute<'a>(&'a mut self) -> Result<Box<dyn RecordBatchReader + Send + 'a>>;

    /// Execute a statement that doesn't have a result set and get the number
    /// of affected rows.
    ///
    /// Will return the number of rows affected. If the affected row count is
    /// unknown or unsupported by the database, will return `None`.
    fn execute_update(&mut self) -> Result<Option<i64>>;

    /// Turn this statement into a prepared statement to be executed multiple
    /// times.
    fn prepare(&mut self) -> Result<()>;

    /// Set the SQL text to execute.
    fn set_sql_query(&mut self, query: &str) -> Result<()>;

    /// Cancel execution of an in-progress statement.
    fn cancel(&mut self) -> Result<()>;

    /// Set a post-init option.
    fn set_option(&mut self, _key: OptionStatement, _value: OptionValue) -> Result<()> {
        Ok(())
    }

    /// [Debug](std::fmt::Debug) implementation for Statement.
    fn debug_fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dyn Statement")
    }
}

impl fmt::Debug for dyn Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.debug_fmt(f)
    }
}
