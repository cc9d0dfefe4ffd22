//! Statement execution.
//!
//! Exactly one prepared statement per call. Named parameters are compiled to
//! positional form, bound as a one-row Arrow batch, and results are drained
//! into JSON-safe rows. The pooled connection is held until the rows are
//! consumed.

use std::sync::Arc;
use std::time::Instant;

use arrow_array::{ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use serde_json::Value;
use sqlgate_common::constants::EXECUTING;
use sqlgate_common::time;
use sqlgate_xdbc::Connection;
use sqlgate_xdbc::options::{OptionStatement, OptionValue};
use sqlgate_xdbc::sql::{named, splitter};

use crate::convert::cell_to_json;
use crate::errors::{AdapterError, AdapterErrorKind, AdapterResult};
use crate::response::{ColumnMeta, ExecuteResponse, Row};

/// Named parameter values, keyed by placeholder name.
pub type ParamMap = serde_json::Map<String, Value>;

/// Options honored by [`execute_ad_hoc`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecuteOptions {
    /// Maximum number of rows to return; 0 means unlimited.
    pub limit: usize,
    /// Driver fetch-size hint.
    pub fetch_size: Option<i64>,
    /// Statement timeout in milliseconds; 0 means no limit.
    pub query_timeout_ms: u64,
}

/// Execute a query and return its rows. With `single_row`, iteration stops
/// after the first row.
pub fn execute_rows(
    conn: &mut dyn Connection,
    sql: &str,
    single_row: bool,
    params: &ParamMap,
) -> AdapterResult<Vec<Row>> {
    let limit = if single_row { 1 } else { 0 };
    let (_, rows, _) = run_query(conn, sql, params, limit, &[])?;
    Ok(rows)
}

/// Execute a query and return the full wire response: column metadata, rows
/// and timing.
pub fn execute_response(
    conn: &mut dyn Connection,
    sql: &str,
    single_row: bool,
    params: &ParamMap,
) -> AdapterResult<ExecuteResponse> {
    let started = Instant::now();
    let limit = if single_row { 1 } else { 0 };
    let (columns, rows, truncated) = run_query(conn, sql, params, limit, &[])?;
    let duration_ms = time::elapsed_ms(started);
    Ok(ExecuteResponse::tabular(columns, rows, truncated, duration_ms))
}

/// Execute ad-hoc SQL on behalf of a session: honors the row limit, fetch
/// size and statement timeout, flips the connection read-only when asked,
/// and distinguishes result sets from update counts.
pub fn execute_ad_hoc(
    conn: &mut dyn Connection,
    read_only: bool,
    sql: &str,
    options: &ExecuteOptions,
) -> AdapterResult<ExecuteResponse> {
    check_not_blank(sql)?;
    if !splitter::is_single_statement(sql) {
        return Err(AdapterError::new(
            AdapterErrorKind::InvalidArgument,
            "expected a single statement; split batches before submitting",
        ));
    }
    if read_only {
        conn.set_read_only(true)?;
    }

    let mut stmt_options: Vec<(OptionStatement, OptionValue)> = Vec::new();
    if options.query_timeout_ms > 0 {
        let seconds = (options.query_timeout_ms / 1000).max(1) as i64;
        stmt_options.push((OptionStatement::QueryTimeoutSeconds, OptionValue::Int(seconds)));
    }
    if let Some(fetch_size) = options.fetch_size {
        stmt_options.push((OptionStatement::FetchSize, OptionValue::Int(fetch_size)));
    }

    let started = Instant::now();
    if is_result_set_statement(sql) {
        let (columns, rows, truncated) =
            run_query(conn, sql, &ParamMap::new(), options.limit, &stmt_options)?;
        let duration_ms = time::elapsed_ms(started);
        Ok(ExecuteResponse::tabular(columns, rows, truncated, duration_ms))
    } else {
        let rows_affected = run_update(conn, sql, &stmt_options)?;
        let duration_ms = time::elapsed_ms(started);
        let message = match rows_affected {
            Some(n) => format!("{n} row(s) affected"),
            None => "statement executed".to_string(),
        };
        Ok(ExecuteResponse::text(message, rows_affected.unwrap_or(0), duration_ms))
    }
}

/// Statements whose leading keyword produces a result set. Everything else
/// goes through the update path.
fn is_result_set_statement(sql: &str) -> bool {
    let first = sql
        .trim_start()
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    matches!(
        first.as_str(),
        "select" | "with" | "show" | "explain" | "describe" | "desc" | "values"
    )
}

fn check_not_blank(sql: &str) -> AdapterResult<()> {
    if sql.trim().is_empty() {
        return Err(AdapterError::new(
            AdapterErrorKind::InvalidArgument,
            "sql must not be blank",
        ));
    }
    Ok(())
}

fn log_for_execution(sql: &str, param_names: &[String]) {
    if param_names.is_empty() {
        log::debug!(target: EXECUTING, "{sql}");
    } else {
        log::debug!(target: EXECUTING, "{sql} -- binds: [{}]", param_names.join(", "));
    }
}

/// Run a query, returning `(columns, rows, truncated)`. `limit == 0` means
/// unlimited.
fn run_query(
    conn: &mut dyn Connection,
    sql: &str,
    params: &ParamMap,
    limit: usize,
    stmt_options: &[(OptionStatement, OptionValue)],
) -> AdapterResult<(Vec<ColumnMeta>, Vec<Row>, bool)> {
    check_not_blank(sql)?;
    let compiled = named::compile(sql);
    log_for_execution(&compiled.positional_sql, &compiled.param_names);

    let mut stmt = conn.new_statement()?;
    stmt.set_sql_query(&compiled.positional_sql)?;
    for (key, value) in stmt_options {
        stmt.set_option(key.clone(), value.clone())?;
    }
    if !compiled.param_names.is_empty() {
        stmt.bind(bind_batch(&compiled.param_names, params)?)?;
    }

    let reader = stmt.execute()?;
    let schema = reader.schema();
    let columns = schema
        .fields()
        .iter()
        .map(|field| ColumnMeta {
            name: field.name().clone(),
            type_name: field.data_type().to_string(),
        })
        .collect::<Vec<_>>();

    let mut rows: Vec<Row> = Vec::new();
    let mut truncated = false;
    'batches: for batch in reader {
        let batch = batch.map_err(AdapterError::from)?;
        for row_idx in 0..batch.num_rows() {
            if limit > 0 && rows.len() >= limit {
                truncated = true;
                break 'batches;
            }
            let mut row = Row::new();
            for (col_idx, field) in batch.schema().fields().iter().enumerate() {
                row.insert(
                    field.name().clone(),
                    cell_to_json(batch.column(col_idx).as_ref(), row_idx),
                );
            }
            rows.push(row);
        }
    }
    Ok((columns, rows, truncated))
}

fn run_update(
    conn: &mut dyn Connection,
    sql: &str,
    stmt_options: &[(OptionStatement, OptionValue)],
) -> AdapterResult<Option<i64>> {
    let compiled = named::compile(sql);
    log_for_execution(&compiled.positional_sql, &compiled.param_names);

    let mut stmt = conn.new_statement()?;
    stmt.set_sql_query(&compiled.positional_sql)?;
    for (key, value) in stmt_options {
        stmt.set_option(key.clone(), value.clone())?;
    }
    Ok(stmt.execute_update()?)
}

/// Build the one-row bind batch: column `i` carries the value for positional
/// parameter `i + 1`. Missing names bind null.
fn bind_batch(param_names: &[String], params: &ParamMap) -> AdapterResult<RecordBatch> {
    let mut fields = Vec::with_capacity(param_names.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(param_names.len());
    for name in param_names {
        let value = params.get(name).unwrap_or(&Value::Null);
        let (data_type, array): (DataType, ArrayRef) = match value {
            Value::Bool(b) => (DataType::Boolean, Arc::new(BooleanArray::from(vec![*b]))),
            Value::Number(n) if n.is_i64() => {
                (DataType::Int64, Arc::new(Int64Array::from(vec![n.as_i64().unwrap()])))
            }
            Value::Number(n) => (
                DataType::Float64,
                Arc::new(Float64Array::from(vec![n.as_f64().unwrap_or(f64::NAN)])),
            ),
            Value::String(s) => (
                DataType::Utf8,
                Arc::new(StringArray::from(vec![Some(s.clone())])),
            ),
            Value::Null => (
                DataType::Utf8,
                Arc::new(StringArray::from(vec![None::<String>])),
            ),
            // Arrays and objects bind as their JSON text.
            other => (
                DataType::Utf8,
                Arc::new(StringArray::from(vec![Some(other.to_string())])),
            ),
        };
        fields.push(Field::new(name.clone(), data_type, true));
        arrays.push(array);
    }
    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).map_err(AdapterError::from)
}
