//! In-memory mock driver.
//!
//! The mock backend plays scripted results for exact SQL texts. It backs the
//! `mock` dialect tag and is the test double for every layer above the
//! driver seam: per-SQL row sets, update counts, errors and delays, a
//! configurable vendor version string, and a validity switch that simulates
//! dead connections.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use arrow_array::{RecordBatch, RecordBatchIterator, RecordBatchReader};
use arrow_schema::{Schema, SchemaRef};
use parking_lot::Mutex;

use crate::error::{Error, Result, Status};
use crate::options::{
    InfoCode, ObjectDepth, OptionConnection, OptionDatabase, OptionStatement, OptionValue,
};
use crate::{Connection, Database, DatabaseInfo, Driver, Statement};

#[derive(Clone)]
enum Script {
    Rows(RecordBatch),
    Update(i64),
    Error(String),
}

/// One executed statement, as recorded by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedStatement {
    pub sql: String,
    pub bound_params: usize,
}

#[derive(Default)]
struct MockInner {
    scripts: HashMap<String, Script>,
    delays: HashMap<String, Duration>,
    table_schemas: HashMap<String, Schema>,
    objects: Option<RecordBatch>,
    vendor_name: Option<String>,
    vendor_version: Option<String>,
    executed: Vec<ExecutedStatement>,
    last_read_only: Option<bool>,
    fail_connections: Option<String>,
    connections_opened: usize,
    connections_closed: usize,
}

#[derive(Default)]
struct MockState {
    inner: Mutex<MockInner>,
    valid: AtomicBool,
}

/// Scripted driver. Cloning shares the script and the execution log, so a
/// test can keep a handle while the gateway owns the registered factory.
#[derive(Clone)]
pub struct MockDriver {
    state: Arc<MockState>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    pub fn new() -> Self {
        let state = MockState {
            inner: Mutex::new(MockInner::default()),
            valid: AtomicBool::new(true),
        };
        MockDriver {
            state: Arc::new(state),
        }
    }

    fn key(sql: &str) -> String {
        sql.trim().to_string()
    }

    /// Script a result set for an exact SQL text (leading/trailing whitespace
    /// ignored).
    pub fn script_rows(&self, sql: &str, batch: RecordBatch) -> &Self {
        self.state
            .inner
            .lock()
            .scripts
            .insert(Self::key(sql), Script::Rows(batch));
        self
    }

    /// Script an update count for an exact SQL text.
    pub fn script_update(&self, sql: &str, rows_affected: i64) -> &Self {
        self.state
            .inner
            .lock()
            .scripts
            .insert(Self::key(sql), Script::Update(rows_affected));
        self
    }

    /// Script a failure for an exact SQL text.
    pub fn script_error(&self, sql: &str, message: impl Into<String>) -> &Self {
        self.state
            .inner
            .lock()
            .scripts
            .insert(Self::key(sql), Script::Error(message.into()));
        self
    }

    /// Make execution of the given SQL sleep for `delay` first.
    pub fn script_delay(&self, sql: &str, delay: Duration) -> &Self {
        self.state.inner.lock().delays.insert(Self::key(sql), delay);
        self
    }

    pub fn script_table_schema(&self, table_name: &str, schema: Schema) -> &Self {
        self.state
            .inner
            .lock()
            .table_schemas
            .insert(table_name.to_string(), schema);
        self
    }

    pub fn script_objects(&self, batch: RecordBatch) -> &Self {
        self.state.inner.lock().objects = Some(batch);
        self
    }

    pub fn set_vendor_name(&self, name: impl Into<String>) -> &Self {
        self.state.inner.lock().vendor_name = Some(name.into());
        self
    }

    pub fn set_server_version(&self, version: impl Into<String>) -> &Self {
        self.state.inner.lock().vendor_version = Some(version.into());
        self
    }

    /// Flip connection validity; `is_valid` probes observe this immediately.
    pub fn set_valid(&self, valid: bool) {
        self.state.valid.store(valid, Ordering::SeqCst);
    }

    /// Make every subsequent connection attempt fail with the given message.
    pub fn fail_connections(&self, message: impl Into<String>) {
        self.state.inner.lock().fail_connections = Some(message.into());
    }

    pub fn executed(&self) -> Vec<ExecutedStatement> {
        self.state.inner.lock().executed.clone()
    }

    pub fn executed_sql(&self) -> Vec<String> {
        self.state
            .inner
            .lock()
            .executed
            .iter()
            .map(|e| e.sql.clone())
            .collect()
    }

    pub fn last_read_only(&self) -> Option<bool> {
        self.state.inner.lock().last_read_only
    }

    pub fn connections_opened(&self) -> usize {
        self.state.inner.lock().connections_opened
    }

    pub fn connections_closed(&self) -> usize {
        self.state.inner.lock().connections_closed
    }
}

impl Driver for MockDriver {
    fn new_database(&mut self) -> Result<Box<dyn Database>> {
        Ok(Box::new(MockDatabase {
            state: self.state.clone(),
        }))
    }

    fn new_database_with_opts(
        &mut self,
        _opts: Vec<(OptionDatabase, OptionValue)>,
    ) -> Result<Box<dyn Database>> {
        self.new_database()
    }
}

struct MockDatabase {
    state: Arc<MockState>,
}

impl DatabaseInfo for MockDatabase {
    fn get_info(&mut self, info_code: InfoCode) -> Result<String> {
        get_info(&self.state, info_code)
    }
}

fn get_info(state: &MockState, info_code: InfoCode) -> Result<String> {
    let inner = state.inner.lock();
    let value = match info_code {
        InfoCode::VendorName => inner
            .vendor_name
            .clone()
            .unwrap_or_else(|| "MockDB".to_string()),
        InfoCode::VendorVersion => inner
            .vendor_version
            .clone()
            .unwrap_or_else(|| "MockDB 1.0.0".to_string()),
        InfoCode::DriverName => "sqlgate mock driver".to_string(),
        InfoCode::DriverVersion => env!("CARGO_PKG_VERSION").to_string(),
    };
    Ok(value)
}

impl Database for MockDatabase {
    fn new_connection(&mut self) -> Result<Box<dyn Connection>> {
        let mut inner = self.state.inner.lock();
        if let Some(message) = &inner.fail_connections {
            return Err(Error::with_message_and_status(
                message.clone(),
                Status::Io,
            ));
        }
        inner.connections_opened += 1;
        drop(inner);
        Ok(Box::new(MockConnection {
            state: self.state.clone(),
            read_only: false,
            closed: false,
        }))
    }

    fn new_connection_with_opts(
        &mut self,
        opts: Vec<(OptionConnection, OptionValue)>,
    ) -> Result<Box<dyn Connection>> {
        let mut conn = self.new_connection()?;
        for (key, value) in opts {
            conn.set_option(key, value)?;
        }
        Ok(conn)
    }

    fn set_option(&mut self, _key: OptionDatabase, _value: OptionValue) -> Result<()> {
        Ok(())
    }

    fn get_option_string(&self, key: OptionDatabase) -> Result<String> {
        Err(Error::with_message_and_status(
            format!("option not set: {}", key.as_ref()),
            Status::NotFound,
        ))
    }

    fn clone_box(&self) -> Box<dyn Database> {
        Box::new(MockDatabase {
            state: self.state.clone(),
        })
    }
}

struct MockConnection {
    state: Arc<MockState>,
    read_only: bool,
    closed: bool,
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        if !self.closed {
            self.state.inner.lock().connections_closed += 1;
        }
    }
}

impl Connection for MockConnection {
    fn new_statement(&mut self) -> Result<Box<dyn Statement>> {
        Ok(Box::new(MockStatement {
            state: self.state.clone(),
            sql: None,
            bound: None,
        }))
    }

    fn cancel(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_valid(&mut self, _timeout: Duration) -> Result<bool> {
        Ok(!self.closed && self.state.valid.load(Ordering::SeqCst))
    }

    fn set_read_only(&mut self, read_only: bool) -> Result<()> {
        self.read_only = read_only;
        self.state.inner.lock().last_read_only = Some(read_only);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.state.inner.lock().connections_closed += 1;
        }
        Ok(())
    }

    fn get_info(&mut self, info_code: InfoCode) -> Result<String> {
        get_info(&self.state, info_code)
    }

    fn get_objects<'a>(
        &'a mut self,
        _depth: ObjectDepth,
        _catalog: Option<&str>,
        _db_schema: Option<&str>,
        _table_name: Option<&str>,
        _table_type: Option<Vec<&str>>,
        _column_name: Option<&str>,
    ) -> Result<Box<dyn RecordBatchReader + Send + 'a>> {
        let inner = self.state.inner.lock();
        let batches: Vec<RecordBatch> = inner.objects.iter().cloned().collect();
        let schema: SchemaRef = batches
            .first()
            .map(|b| b.schema())
            .unwrap_or_else(|| Arc::new(Schema::empty()));
        Ok(Box::new(RecordBatchIterator::new(
            batches.into_iter().map(Ok),
            schema,
        )))
    }

    fn get_table_schema(
        &mut self,
        _catalog: Option<&str>,
        _db_schema: Option<&str>,
        table_name: &str,
    ) -> Result<Schema> {
        self.state
            .inner
            .lock()
            .table_schemas
            .get(table_name)
            .cloned()
            .ok_or_else(|| {
                Error::with_message_and_status(
                    format!("table not found: {table_name}"),
                    Status::NotFound,
                )
            })
    }

    fn set_option(&mut self, key: OptionConnection, value: OptionValue) -> Result<()> {
        if key == OptionConnection::ReadOnly {
            let on = value.as_str().is_some_and(|v| v == "true");
            self.set_read_only(on)?;
        }
        Ok(())
    }
}

struct MockStatement {
    state: Arc<MockState>,
    sql: Option<String>,
    bound: Option<RecordBatch>,
}

impl MockStatement {
    fn record_and_lookup(&mut self) -> Result<Option<Script>> {
        let sql = self.sql.clone().ok_or_else(|| {
            Error::with_message_and_status("no SQL set on statement", Status::InvalidState)
        })?;
        let key = MockDriver::key(&sql);
        let delay = {
            let mut inner = self.state.inner.lock();
            inner.executed.push(ExecutedStatement {
                sql: key.clone(),
                bound_params: self.bound.as_ref().map_or(0, |b| b.num_columns()),
            });
            inner.delays.get(&key).copied()
        };
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        Ok(self.state.inner.lock().scripts.get(&key).cloned())
    }
}

impl Statement for MockStatement {
    fn bind(&mut self, batch: RecordBatch) -> Result<()> {
        self.bound = Some(batch);
        Ok(())
    }

    fn execute<'a>(&'a mut self) -> Result<Box<dyn RecordBatchReader + Send + 'a>> {
        match self.record_and_lookup()? {
            Some(Script::Rows(batch)) => {
                let schema = batch.schema();
                Ok(Box::new(RecordBatchIterator::new(
                    vec![Ok(batch)].into_iter(),
                    schema,
                )))
            }
            Some(Script::Error(message)) => {
                Err(Error::with_message_and_status(message, Status::Internal))
            }
            // An unscripted or update statement yields an empty result set.
            Some(Script::Update(_)) | None => {
                let empty: Vec<std::result::Result<RecordBatch, arrow_schema::ArrowError>> =
                    Vec::new();
                Ok(Box::new(RecordBatchIterator::new(
                    empty.into_iter(),
                    Arc::new(Schema::empty()),
                )))
            }
        }
    }

    fn execute_update(&mut self) -> Result<Option<i64>> {
        match self.record_and_lookup()? {
            Some(Script::Update(n)) => Ok(Some(n)),
            Some(Script::Error(message)) => {
                Err(Error::with_message_and_status(message, Status::Internal))
            }
            Some(Script::Rows(_)) | None => Ok(Some(0)),
        }
    }

    fn prepare(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_sql_query(&mut self, query: &str) -> Result<()> {
        self.sql = Some(query.to_string());
        Ok(())
    }

    fn cancel(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_option(&mut self, _key: OptionStatement, _value: OptionValue) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::{Int64Array, StringArray};
    use arrow_schema::{DataType, Field};

    fn people_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 2])),
                Arc::new(StringArray::from(vec![Some("ada"), None])),
            ],
        )
        .unwrap()
    }

    fn connect(driver: &MockDriver) -> Box<dyn Connection> {
        let mut driver: Box<dyn Driver> = Box::new(driver.clone());
        let mut db = driver.new_database().unwrap();
        db.new_connection().unwrap()
    }

    #[test]
    fn test_scripted_rows_round_trip() {
        let driver = MockDriver::new();
        driver.script_rows("SELECT * FROM people", people_batch());

        let mut conn = connect(&driver);
        let mut stmt = conn.new_statement().unwrap();
        stmt.set_sql_query("SELECT * FROM people").unwrap();
        let reader = stmt.execute().unwrap();
        let batches: Vec<_> = reader.map(|b| b.unwrap()).collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].num_rows(), 2);
        assert_eq!(driver.executed_sql(), vec!["SELECT * FROM people"]);
    }

    #[test]
    fn test_scripted_error_surfaces() {
        let driver = MockDriver::new();
        driver.script_error("SELECT 1 FROM missing", "ORA-00942: table or view does not exist");

        let mut conn = connect(&driver);
        let mut stmt = conn.new_statement().unwrap();
        stmt.set_sql_query("SELECT 1 FROM missing").unwrap();
        let err = stmt.execute().err().unwrap();
        assert_eq!(err.message, "ORA-00942: table or view does not exist");
    }

    #[test]
    fn test_validity_switch() {
        let driver = MockDriver::new();
        let mut conn = connect(&driver);
        assert!(conn.is_valid(Duration::from_secs(2)).unwrap());
        driver.set_valid(false);
        assert!(!conn.is_valid(Duration::from_secs(2)).unwrap());
    }

    #[test]
    fn test_read_only_is_observable() {
        let driver = MockDriver::new();
        let mut conn = connect(&driver);
        conn.set_read_only(true).unwrap();
        assert_eq!(driver.last_read_only(), Some(true));
    }

    #[test]
    fn test_failing_connections() {
        let driver = MockDriver::new();
        driver.fail_connections("network unreachable");
        let mut boxed: Box<dyn Driver> = Box::new(driver.clone());
        let mut db = boxed.new_database().unwrap();
        let err = db.new_connection().err().unwrap();
        assert_eq!(err.status, Status::Io);
        assert_eq!(err.message, "network unreachable");
    }
}
