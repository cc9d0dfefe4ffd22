//! Collector execution.
//!
//! Whole collectors run layer by layer (or query by query) with
//! continue-on-failure semantics; single queries run through the full
//! response path and fail loudly with the deepest cause message.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_derive::Serialize;
use sqlgate_adapter::executor::{self, ParamMap};
use sqlgate_adapter::response::{ExecuteResponse, Row};
use sqlgate_common::constants::COLLECTING;
use sqlgate_error::{ErrorCode, GateResult, err};
use sqlgate_xdbc::Connection;

use crate::registry::CollectorRegistry;
use crate::resolve::{resolve_collector, resolve_query};
use crate::schema::CollectorPack;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_hint: Option<serde_json::Value>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectorResult {
    pub db_type: String,
    pub collector_id: String,
    pub source_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layers: Option<BTreeMap<String, LayerResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queries: Option<BTreeMap<String, Vec<Row>>>,
    /// Sampling interval, filled in when a sampler stores this result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_sec: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub db_type: String,
    pub collector_id: String,
    pub source_file: String,
    pub query_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_hint: Option<serde_json::Value>,
    pub result: ExecuteResponse,
}

/// Listing entry for the collectors inventory endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectorListing {
    pub collector_ref: String,
    pub collector_id: String,
    pub source_file: String,
    pub db_type: String,
    pub layer_count: usize,
    pub query_count: usize,
}

/// Listing entry for the runnable-queries endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryListing {
    pub collector_ref: String,
    pub collector_id: String,
    pub query_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Drives collector and query execution against a live connection.
pub struct CollectorRunner {
    registry: Arc<CollectorRegistry>,
}

impl CollectorRunner {
    pub fn new(registry: Arc<CollectorRegistry>) -> Self {
        CollectorRunner { registry }
    }

    pub fn registry(&self) -> &CollectorRegistry {
        &self.registry
    }

    fn matching_packs(
        &self,
        conn: &mut dyn Connection,
        db_type: &str,
    ) -> Vec<Arc<CollectorPack>> {
        self.registry
            .get_matching_configs_for_connection(conn, db_type)
    }

    /// Run a whole collector. Failing layers (or queries) are logged and
    /// omitted; the rest of the collector proceeds.
    pub fn run_collector(
        &self,
        conn: &mut dyn Connection,
        db_type: &str,
        collector_id: Option<&str>,
        collector_ref: Option<&str>,
    ) -> GateResult<CollectorResult> {
        let packs = self.matching_packs(conn, db_type);
        let resolved = resolve_collector(&packs, db_type, collector_id, collector_ref)?;
        let definition = resolved.definition().clone();

        let mut result = CollectorResult {
            db_type: db_type.to_string(),
            collector_id: resolved.collector_id.clone(),
            source_file: resolved.pack.source_file.clone(),
            layers: None,
            queries: None,
            interval_sec: None,
        };

        if !definition.layers.is_empty() {
            let mut layers = BTreeMap::new();
            for (layer_id, layer) in definition.ordered_layers() {
                let single_row = layer.single_row.unwrap_or(false);
                match executor::execute_rows(conn, &layer.sql, single_row, &ParamMap::new()) {
                    Ok(rows) => {
                        layers.insert(
                            layer_id.clone(),
                            LayerResult {
                                order: layer.order,
                                render_hint: layer.render_hint.clone(),
                                rows,
                            },
                        );
                    }
                    Err(error) => {
                        log::warn!(
                            target: COLLECTING,
                            "collector '{}' layer '{layer_id}' failed, continuing: {error}",
                            resolved.collector_ref()
                        );
                    }
                }
            }
            result.layers = Some(layers);
        } else if !definition.queries.is_empty() {
            // Unlike layers, a failing query fails the whole collector.
            let mut queries = BTreeMap::new();
            for (query_id, query) in &definition.queries {
                let single_row = query.single_row.unwrap_or(false);
                let rows = executor::execute_rows(conn, &query.sql, single_row, &ParamMap::new())
                    .map_err(|error| {
                        Box::new(
                            sqlgate_error::GateError::new(
                                ErrorCode::ExecutionError,
                                format!(
                                    "collector '{}' query '{query_id}' failed",
                                    resolved.collector_ref()
                                ),
                            )
                            .with_cause(error),
                        )
                    })?;
                queries.insert(query_id.clone(), rows);
            }
            result.queries = Some(queries);
        }

        Ok(result)
    }

    /// Run one named query through the full response path.
    pub fn run_query(
        &self,
        conn: &mut dyn Connection,
        db_type: &str,
        collector_id: Option<&str>,
        collector_ref: Option<&str>,
        query_id: &str,
        params: &ParamMap,
    ) -> GateResult<QueryResult> {
        let packs = self.matching_packs(conn, db_type);
        let resolved = resolve_query(&packs, db_type, collector_id, collector_ref, query_id)?;
        let config = resolved.config().clone();
        let single_row = config.single_row.unwrap_or(false);

        // Error detail prefers the identifier the caller actually passed.
        let caller_ident = collector_ref
            .filter(|r| !r.trim().is_empty())
            .map(str::to_string)
            .or_else(|| collector_id.map(str::to_string))
            .unwrap_or_else(|| resolved.collector.collector_ref());

        match executor::execute_response(conn, &config.sql, single_row, params) {
            Ok(response) => Ok(QueryResult {
                db_type: db_type.to_string(),
                collector_id: resolved.collector.collector_id.clone(),
                source_file: resolved.collector.pack.source_file.clone(),
                query_id: query_id.to_string(),
                description: config.description.clone(),
                render_hint: None,
                result: response,
            }),
            Err(error) => {
                let deepest = sqlgate_error::deepest_message(&error);
                err!(
                    ErrorCode::ExecutionError,
                    "query '{query_id}' of collector '{caller_ident}' failed: {deepest}"
                )
            }
        }
    }

    /// Collectors available for the connected server.
    pub fn list_collectors(
        &self,
        conn: &mut dyn Connection,
        db_type: &str,
    ) -> Vec<CollectorListing> {
        let mut listings = Vec::new();
        for pack in self.matching_packs(conn, db_type) {
            for (collector_id, definition) in &pack.collectors {
                listings.push(CollectorListing {
                    collector_ref: format!("{}:{collector_id}", pack.pack_id()),
                    collector_id: collector_id.clone(),
                    source_file: pack.source_file.clone(),
                    db_type: pack.db_type.clone(),
                    layer_count: definition.layers.len(),
                    query_count: definition.queries.len(),
                });
            }
        }
        listings.sort_by(|a, b| a.collector_ref.cmp(&b.collector_ref));
        listings
    }

    /// Runnable queries, optionally restricted to one collector id.
    pub fn list_queries(
        &self,
        conn: &mut dyn Connection,
        db_type: &str,
        collector_id: Option<&str>,
    ) -> Vec<QueryListing> {
        let mut listings = Vec::new();
        for pack in self.matching_packs(conn, db_type) {
            for (candidate_id, definition) in &pack.collectors {
                if collector_id.is_some_and(|want| want != candidate_id) {
                    continue;
                }
                for (query_id, query) in &definition.queries {
                    listings.push(QueryListing {
                        collector_ref: format!("{}:{candidate_id}", pack.pack_id()),
                        collector_id: candidate_id.clone(),
                        query_id: query_id.clone(),
                        description: query.description.clone(),
                    });
                }
            }
        }
        listings.sort_by(|a, b| {
            a.collector_ref
                .cmp(&b.collector_ref)
                .then_with(|| a.query_id.cmp(&b.query_id))
        });
        listings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::{Int64Array, RecordBatch, StringArray};
    use arrow_schema::{DataType, Field, Schema};
    use serde_json::json;
    use sqlgate_xdbc::Driver;
    use sqlgate_xdbc::mock::MockDriver;
    use std::fs;
    use std::path::Path;

    fn mock_conn(driver: &MockDriver) -> Box<dyn Connection> {
        let mut boxed: Box<dyn Driver> = Box::new(driver.clone());
        let mut db = boxed.new_database().unwrap();
        db.new_connection().unwrap()
    }

    fn rows_batch(values: &[i64]) -> RecordBatch {
        let schema = std::sync::Arc::new(Schema::new(vec![
            Field::new("value", DataType::Int64, false),
            Field::new("tag", DataType::Utf8, true),
        ]));
        let tags: Vec<Option<String>> = values.iter().map(|v| Some(format!("t{v}"))).collect();
        RecordBatch::try_new(
            schema,
            vec![
                std::sync::Arc::new(Int64Array::from(values.to_vec())),
                std::sync::Arc::new(StringArray::from(tags)),
            ],
        )
        .unwrap()
    }

    fn write_fixture_pack(root: &Path) {
        let dir = root.join("mock");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("activity.yaml"),
            r#"
supported_versions:
  min: "1.0"
  max: "2.0"
collectors:
  top:
    layers:
      sessions:
        order: 1
        sql: SELECT * FROM sessions
      blocked:
        order: 2
        render_hint: { style: table }
        sql: SELECT * FROM blocked
  checks:
    queries:
      slow:
        description: slow statements
        sql: SELECT * FROM slow
"#,
        )
        .unwrap();
    }

    fn runner_with_fixture(dir: &Path) -> CollectorRunner {
        write_fixture_pack(dir);
        let registry = Arc::new(CollectorRegistry::new(dir));
        registry.reload();
        CollectorRunner::new(registry)
    }

    fn scripted_driver() -> MockDriver {
        let driver = MockDriver::new();
        driver.set_server_version("MockDB 1.5.0");
        driver.script_rows("SELECT * FROM sessions", rows_batch(&[1, 2]));
        driver.script_rows("SELECT * FROM blocked", rows_batch(&[3]));
        driver.script_rows("SELECT * FROM slow", rows_batch(&[4]));
        driver
    }

    #[test]
    fn test_run_collector_with_layers() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner_with_fixture(dir.path());
        let driver = scripted_driver();
        let mut conn = mock_conn(&driver);

        let result = runner
            .run_collector(conn.as_mut(), "mock", Some("top"), None)
            .unwrap();
        let layers = result.layers.unwrap();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers["sessions"].rows.len(), 2);
        assert_eq!(layers["blocked"].render_hint, Some(json!({"style": "table"})));
        assert!(result.queries.is_none());
    }

    #[test]
    fn test_failing_layer_is_omitted_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner_with_fixture(dir.path());
        let driver = scripted_driver();
        driver.script_error("SELECT * FROM sessions", "ORA-00942: table or view does not exist");
        let mut conn = mock_conn(&driver);

        let result = runner
            .run_collector(conn.as_mut(), "mock", Some("top"), None)
            .unwrap();
        let layers = result.layers.unwrap();
        assert!(!layers.contains_key("sessions"));
        assert_eq!(layers["blocked"].rows.len(), 1);
    }

    #[test]
    fn test_run_collector_with_queries() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner_with_fixture(dir.path());
        let driver = scripted_driver();
        let mut conn = mock_conn(&driver);

        let result = runner
            .run_collector(conn.as_mut(), "mock", Some("checks"), None)
            .unwrap();
        let queries = result.queries.unwrap();
        assert_eq!(queries["slow"].len(), 1);
        assert!(result.layers.is_none());
    }

    #[test]
    fn test_failing_query_fails_the_collector() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner_with_fixture(dir.path());
        let driver = scripted_driver();
        driver.script_error("SELECT * FROM slow", "ORA-00942: table or view does not exist");
        let mut conn = mock_conn(&driver);

        let err = runner
            .run_collector(conn.as_mut(), "mock", Some("checks"), None)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ExecutionError);
        assert_eq!(err.root_message(), "ORA-00942: table or view does not exist");
    }

    #[test]
    fn test_run_query_success_and_shorthand() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner_with_fixture(dir.path());
        let driver = scripted_driver();
        let mut conn = mock_conn(&driver);

        let result = runner
            .run_query(conn.as_mut(), "mock", None, None, "slow", &ParamMap::new())
            .unwrap();
        assert_eq!(result.collector_id, "checks");
        assert_eq!(result.description.as_deref(), Some("slow statements"));
        assert_eq!(result.result.rows().len(), 1);
    }

    #[test]
    fn test_run_query_failure_flattens_cause() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner_with_fixture(dir.path());
        let driver = scripted_driver();
        driver.script_error("SELECT * FROM slow", "ORA-01031: insufficient privileges");
        let mut conn = mock_conn(&driver);

        let err = runner
            .run_query(conn.as_mut(), "mock", Some("checks"), None, "slow", &ParamMap::new())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ExecutionError);
        assert!(err.context.contains("query 'slow'"));
        assert!(err.context.contains("checks"));
        assert!(err.context.contains("ORA-01031"));
    }

    #[test]
    fn test_version_mismatch_yields_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner_with_fixture(dir.path());
        let driver = scripted_driver();
        driver.set_server_version("MockDB 9.0.0");
        let mut conn = mock_conn(&driver);

        let err = runner
            .run_collector(conn.as_mut(), "mock", Some("top"), None)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::CollectorNotFound);
    }

    #[test]
    fn test_listings() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner_with_fixture(dir.path());
        let driver = scripted_driver();
        let mut conn = mock_conn(&driver);

        let collectors = runner.list_collectors(conn.as_mut(), "mock");
        assert_eq!(collectors.len(), 2);
        assert_eq!(collectors[0].collector_ref, "activity:checks");

        let queries = runner.list_queries(conn.as_mut(), "mock", None);
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].query_id, "slow");

        let filtered = runner.list_queries(conn.as_mut(), "mock", Some("top"));
        assert!(filtered.is_empty());
    }
}
