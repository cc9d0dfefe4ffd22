//! Per-session bounded history of executed SQL, sanitized for prompt use.
//!
//! Every stored item is safe to ship to an external model: sensitive
//! columns are masked, cells are clipped, error messages are scrubbed of
//! credential fragments, and the buffer itself is a small ring.

use std::collections::VecDeque;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use regex::Regex;
use serde_derive::Serialize;
use serde_json::Value;
use sqlgate_adapter::response::{ExecuteResponse, ResponseType, Row};
use sqlgate_common::constants::{
    AI_CONTEXT_MAX_CELL_CHARS, AI_CONTEXT_MAX_COLUMNS, AI_CONTEXT_MAX_ERROR_CHARS,
    AI_CONTEXT_MAX_ITEMS, AI_CONTEXT_MAX_SAMPLE_ROWS,
};
use sqlgate_common::time;

/// Column-name markers that force masking, matched as lowercase substrings.
const SENSITIVE_MARKERS: [&str; 6] =
    ["password", "passwd", "token", "secret", "key", "credential"];

const MASK: &str = "***";

static KEY_VALUE_SECRET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(password|passwd|pwd|token|secret|api_key|apikey|credential)\s*=\s*[^\s,;&]+")
        .expect("valid regex")
});

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextItem {
    pub sql: String,
    pub executed_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rows: Option<Vec<Row>>,
    pub truncated: bool,
    pub rows_affected: i64,
    pub duration_ms: u64,
}

/// Per-session ring of sanitized execution summaries. The outer map is
/// concurrent; each ring has its own lock.
#[derive(Default)]
pub struct AiContextBuffer {
    buffers: DashMap<String, Mutex<VecDeque<ContextItem>>>,
}

impl AiContextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful execution: metadata, column names, and up to
    /// three sanitized sample rows.
    pub fn record_execute(&self, session_id: &str, sql: &str, response: &ExecuteResponse) {
        let item_type = match response.response_type {
            ResponseType::Tabular => "QUERY",
            ResponseType::Text | ResponseType::File => "STATEMENT",
        };
        let columns = response.data.columns.as_ref().map(|columns| {
            columns
                .iter()
                .take(AI_CONTEXT_MAX_COLUMNS)
                .map(|column| column.name.clone())
                .collect()
        });
        let sample_rows = response.data.rows.as_ref().map(|rows| {
            rows.iter()
                .take(AI_CONTEXT_MAX_SAMPLE_ROWS)
                .map(sanitize_row)
                .collect()
        });
        self.push(
            session_id,
            ContextItem {
                sql: sql.to_string(),
                executed_at: time::now(),
                item_type: item_type.to_string(),
                error: None,
                columns,
                sample_rows,
                truncated: response.metadata.truncated,
                rows_affected: response.metadata.rows_affected,
                duration_ms: response.metadata.duration_ms,
            },
        );
    }

    /// Record a failed execution with a scrubbed error message.
    pub fn record_execute_error(&self, session_id: &str, sql: &str, error: &str) {
        self.push(
            session_id,
            ContextItem {
                sql: sql.to_string(),
                executed_at: time::now(),
                item_type: "ERROR".to_string(),
                error: Some(sanitize_error(error)),
                columns: None,
                sample_rows: None,
                truncated: false,
                rows_affected: 0,
                duration_ms: 0,
            },
        );
    }

    fn push(&self, session_id: &str, item: ContextItem) {
        let buffer = self
            .buffers
            .entry(session_id.to_string())
            .or_insert_with(|| Mutex::new(VecDeque::with_capacity(AI_CONTEXT_MAX_ITEMS)));
        let mut deque = buffer.lock();
        deque.push_front(item);
        while deque.len() > AI_CONTEXT_MAX_ITEMS {
            deque.pop_back();
        }
    }

    /// Most-recent-first, capped at the ring size.
    pub fn get_recent(&self, session_id: &str, limit: usize) -> Vec<ContextItem> {
        let limit = limit.clamp(1, AI_CONTEXT_MAX_ITEMS);
        match self.buffers.get(session_id) {
            Some(buffer) => buffer.lock().iter().take(limit).cloned().collect(),
            None => Vec::new(),
        }
    }

    pub fn clear(&self, session_id: &str) {
        self.buffers.remove(session_id);
    }
}

fn is_sensitive_column(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SENSITIVE_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn sanitize_row(row: &Row) -> Row {
    row.iter()
        .take(AI_CONTEXT_MAX_COLUMNS)
        .map(|(name, value)| {
            let value = if is_sensitive_column(name) {
                Value::String(MASK.to_string())
            } else {
                clip_value(value)
            };
            (name.clone(), value)
        })
        .collect()
}

fn clip_value(value: &Value) -> Value {
    match value {
        Value::String(s) if s.chars().count() > AI_CONTEXT_MAX_CELL_CHARS => {
            Value::String(s.chars().take(AI_CONTEXT_MAX_CELL_CHARS).collect())
        }
        other => other.clone(),
    }
}

fn sanitize_error(error: &str) -> String {
    let mut message = error.trim();
    // Drivers love stacking "error:" prefixes; strip the repetition.
    loop {
        let lower = message.to_ascii_lowercase();
        if let Some(rest) = lower.strip_prefix("error:") {
            message = message[message.len() - rest.len()..].trim_start();
        } else {
            break;
        }
    }
    let scrubbed = KEY_VALUE_SECRET.replace_all(message, "$1=***");
    scrubbed.chars().take(AI_CONTEXT_MAX_ERROR_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlgate_adapter::response::ColumnMeta;

    fn tabular_response(rows: Vec<Row>) -> ExecuteResponse {
        let columns = rows
            .first()
            .map(|row| {
                row.keys()
                    .map(|name| ColumnMeta {
                        name: name.clone(),
                        type_name: "Utf8".to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        ExecuteResponse::tabular(columns, rows, false, 5)
    }

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_sensitive_columns_are_masked() {
        let buffer = AiContextBuffer::new();
        let response = tabular_response(vec![row(&[
            ("user_id", json!(1)),
            ("password", json!("hunter2")),
            ("api_token", json!("abc")),
            ("note", json!("x")),
        ])]);
        buffer.record_execute("s1", "SELECT * FROM users", &response);

        let items = buffer.get_recent("s1", 10);
        let sample = &items[0].sample_rows.as_ref().unwrap()[0];
        assert_eq!(sample["user_id"], json!(1));
        assert_eq!(sample["password"], json!("***"));
        assert_eq!(sample["api_token"], json!("***"));
        assert_eq!(sample["note"], json!("x"));
    }

    #[test]
    fn test_cells_are_clipped_to_64_chars() {
        let buffer = AiContextBuffer::new();
        let long = "x".repeat(200);
        let response = tabular_response(vec![row(&[("blob", json!(long))])]);
        buffer.record_execute("s1", "SELECT blob FROM t", &response);

        let items = buffer.get_recent("s1", 1);
        let cell = items[0].sample_rows.as_ref().unwrap()[0]["blob"]
            .as_str()
            .unwrap()
            .to_string();
        assert_eq!(cell.chars().count(), AI_CONTEXT_MAX_CELL_CHARS);
    }

    #[test]
    fn test_ring_caps_at_ten_newest_first() {
        let buffer = AiContextBuffer::new();
        for i in 0..15 {
            let response = tabular_response(vec![row(&[("n", json!(i))])]);
            buffer.record_execute("s1", &format!("SELECT {i}"), &response);
        }
        let items = buffer.get_recent("s1", 100);
        assert_eq!(items.len(), AI_CONTEXT_MAX_ITEMS);
        assert_eq!(items[0].sql, "SELECT 14");
        assert_eq!(items[9].sql, "SELECT 5");
    }

    #[test]
    fn test_sample_rows_capped_at_three() {
        let buffer = AiContextBuffer::new();
        let rows = (0..5).map(|i| row(&[("n", json!(i))])).collect();
        buffer.record_execute("s1", "SELECT n", &tabular_response(rows));
        let items = buffer.get_recent("s1", 1);
        assert_eq!(items[0].sample_rows.as_ref().unwrap().len(), 3);
    }

    #[test]
    fn test_error_sanitization() {
        let buffer = AiContextBuffer::new();
        buffer.record_execute_error(
            "s1",
            "SELECT 1",
            "error: error: connect failed password=tiger token=abc123 host=db",
        );
        let items = buffer.get_recent("s1", 1);
        let error = items[0].error.as_ref().unwrap();
        assert!(!error.starts_with("error:"), "prefixes must be stripped: {error}");
        assert!(error.contains("password=***"));
        assert!(error.contains("token=***"));
        assert!(!error.contains("tiger"));
        assert!(error.contains("host=db"));
    }

    #[test]
    fn test_error_capped_at_512() {
        let buffer = AiContextBuffer::new();
        buffer.record_execute_error("s1", "SELECT 1", &"e".repeat(2000));
        let items = buffer.get_recent("s1", 1);
        assert_eq!(items[0].error.as_ref().unwrap().len(), AI_CONTEXT_MAX_ERROR_CHARS);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let buffer = AiContextBuffer::new();
        let response = tabular_response(vec![row(&[("n", json!(1))])]);
        buffer.record_execute("s1", "SELECT 1", &response);
        buffer.clear("s1");
        buffer.clear("s1");
        assert!(buffer.get_recent("s1", 5).is_empty());
    }
}
