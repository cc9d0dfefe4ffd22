//! Request/response bodies for the REST surface (snake_case on the wire).
//!
//! The HTTP binding deserializes into these, calls the [`Gateway`] and
//! serializes whatever comes back. Keeping the DTOs here pins the wire
//! contract to the runtime instead of the transport.
//!
//! [`Gateway`]: crate::gateway::Gateway

use serde_derive::{Deserialize, Serialize};
use sqlgate_adapter::executor::{ExecuteOptions, ParamMap};

use crate::sampler::definition::SamplerDefinitionPatch;
use crate::session::{ConnectOptions, Session};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConnectRequest {
    pub dsn: String,
    pub db_type: String,
    #[serde(default)]
    pub options: ConnectOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectResponse {
    pub session_id: String,
    pub db_type: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

impl From<Session> for ConnectResponse {
    fn from(session: Session) -> Self {
        ConnectResponse {
            session_id: session.session_id,
            db_type: session.db_type,
            expires_at: session.expires_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExecuteRequestOptions {
    /// Row cap; 0 (default) means unlimited.
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub fetch_size: Option<i64>,
    /// Statement timeout; 0 (default) means no limit.
    #[serde(default)]
    pub query_timeout_ms: u64,
}

impl From<ExecuteRequestOptions> for ExecuteOptions {
    fn from(options: ExecuteRequestOptions) -> Self {
        ExecuteOptions {
            limit: options.limit as usize,
            fetch_size: options.fetch_size,
            query_timeout_ms: options.query_timeout_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExecuteRequest {
    pub session_id: String,
    pub sql: String,
    #[serde(default)]
    pub options: ExecuteRequestOptions,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExplainRequest {
    pub session_id: String,
    pub sql: String,
    #[serde(default)]
    pub analyze: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CollectorsRunRequest {
    pub session_id: String,
    #[serde(default)]
    pub collector_id: Option<String>,
    #[serde(default)]
    pub collector_ref: Option<String>,
    /// When present, run exactly this query instead of the whole collector.
    #[serde(default)]
    pub query_id: Option<String>,
    #[serde(default)]
    pub params: Option<ParamMap>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SamplerUpsertRequest {
    #[serde(flatten)]
    pub patch: SamplerDefinitionPatch,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::definition::Schedule;

    #[test]
    fn test_connect_request_defaults_options() {
        let request: ConnectRequest = serde_json::from_str(
            r#"{"dsn": "postgres://db/hr", "db_type": "postgres"}"#,
        )
        .unwrap();
        assert!(!request.options.read_only);

        let request: ConnectRequest = serde_json::from_str(
            r#"{"dsn": "x", "db_type": "oracle", "options": {"read_only": true, "connection_timeout_ms": 3000}}"#,
        )
        .unwrap();
        assert!(request.options.read_only);
        assert_eq!(request.options.connection_timeout_ms, 3000);
    }

    #[test]
    fn test_execute_request_options_convert() {
        let request: ExecuteRequest = serde_json::from_str(
            r#"{"session_id": "s", "sql": "SELECT 1", "options": {"limit": 100, "query_timeout_ms": 2500}}"#,
        )
        .unwrap();
        let options: ExecuteOptions = request.options.into();
        assert_eq!(options.limit, 100);
        assert_eq!(options.query_timeout_ms, 2500);
        assert_eq!(options.fetch_size, None);
    }

    #[test]
    fn test_collectors_run_request_accepts_params() {
        let request: CollectorsRunRequest = serde_json::from_str(
            r#"{"session_id": "s", "query_id": "long_running", "params": {"threshold": 60}}"#,
        )
        .unwrap();
        assert_eq!(request.query_id.as_deref(), Some("long_running"));
        assert_eq!(request.params.unwrap()["threshold"], serde_json::json!(60));
        assert!(request.collector_id.is_none());
    }

    #[test]
    fn test_sampler_upsert_request_flattens_patch() {
        let request: SamplerUpsertRequest = serde_json::from_str(
            r#"{"enabled": true, "schedule": {"interval_sec": 5}}"#,
        )
        .unwrap();
        assert_eq!(request.patch.enabled, Some(true));
        assert_eq!(request.patch.schedule, Some(Schedule { interval_sec: 5 }));
    }
}
