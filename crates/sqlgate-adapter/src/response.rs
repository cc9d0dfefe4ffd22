//! Wire-shaped execution responses.

use serde_derive::{Deserialize, Serialize};

/// One result row: an ordered column → value mapping. The map type preserves
/// insertion order, so columns serialize in select-list order.
pub type Row = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Tabular,
    Text,
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    /// Declared type name as reported by the driver, e.g. `Int64` or `Utf8`.
    pub type_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<ColumnMeta>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Row>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub truncated: bool,
    pub rows_affected: i64,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Response from adapter statement execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub data: ResponseData,
    pub metadata: ResponseMetadata,
}

impl ExecuteResponse {
    pub fn tabular(
        columns: Vec<ColumnMeta>,
        rows: Vec<Row>,
        truncated: bool,
        duration_ms: u64,
    ) -> Self {
        let rows_affected = rows.len() as i64;
        ExecuteResponse {
            response_type: ResponseType::Tabular,
            data: ResponseData {
                columns: Some(columns),
                rows: Some(rows),
                text_content: None,
                file_url: None,
            },
            metadata: ResponseMetadata {
                truncated,
                rows_affected,
                duration_ms,
                next_page_token: None,
            },
        }
    }

    pub fn text(message: impl Into<String>, rows_affected: i64, duration_ms: u64) -> Self {
        ExecuteResponse {
            response_type: ResponseType::Text,
            data: ResponseData {
                columns: None,
                rows: None,
                text_content: Some(message.into()),
                file_url: None,
            },
            metadata: ResponseMetadata {
                truncated: false,
                rows_affected,
                duration_ms,
                next_page_token: None,
            },
        }
    }

    pub fn rows(&self) -> &[Row] {
        self.data.rows.as_deref().unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_snake_case() {
        let response = ExecuteResponse::text("2 row(s) affected", 2, 7);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["metadata"]["rows_affected"], 2);
        assert_eq!(json["data"]["text_content"], "2 row(s) affected");
        assert!(json["data"].get("rows").is_none());
    }
}
