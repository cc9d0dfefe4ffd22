//! Sampler lifecycle tests against the mock driver: periodic results,
//! stop-on-failure with retained reasons, overlap handling, idempotent
//! stops.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use arrow_array::{Int64Array, RecordBatch};
use arrow_schema::{DataType, Field, Schema};
use sqlgate_adapter::pool::{ConnectionPool, PoolConfig};
use sqlgate_collectors::registry::CollectorRegistry;
use sqlgate_collectors::runner::CollectorRunner;
use sqlgate_server::sampler::definition::{SamplerDefinitionPatch, SamplerTarget, Schedule};
use sqlgate_server::sampler::manager::SamplerManager;
use sqlgate_server::session::{ConnectOptions, Session, SessionManager};
use sqlgate_xdbc::mock::MockDriver;
use sqlgate_xdbc::{Database, Driver};

fn rows_batch() -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![Field::new("n", DataType::Int64, false)]));
    RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2, 3]))]).unwrap()
}

fn write_packs(root: &Path) {
    let dir = root.join("mock");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("activity.yaml"),
        r#"
supported_versions:
  min: "1.0"
  max: "9.0"
collectors:
  top:
    layers:
      sessions:
        order: 1
        sql: SELECT * FROM sessions
  checks:
    queries:
      slow:
        sql: SELECT * FROM slow
  hollow: {}
"#,
    )
    .unwrap();
}

fn write_defaults(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("default.json");
    std::fs::write(
        &path,
        r#"{"samplers": [
            {"sampler_id": "activity",
             "schedule": {"interval_sec": 1},
             "run_policy": {"on_overlap": "skip"},
             "target": {"collector_id": "top"}},
            {"sampler_id": "health",
             "schedule": {"interval_sec": 1},
             "target": {"collector_id": "checks"}}
        ]}"#,
    )
    .unwrap();
    path
}

struct Fixture {
    driver: MockDriver,
    manager: SamplerManager,
    session: Session,
    pool: ConnectionPool,
    _dir: tempfile::TempDir,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    write_packs(dir.path());
    let defaults_path = write_defaults(dir.path());

    let registry = Arc::new(CollectorRegistry::new(dir.path()));
    registry.reload();
    let runner = Arc::new(CollectorRunner::new(registry));
    let manager = SamplerManager::new(runner, &defaults_path).unwrap();

    let driver = MockDriver::new();
    driver.set_server_version("MockDB 2.0.0");
    driver.script_rows("SELECT * FROM sessions", rows_batch());
    driver.script_rows("SELECT * FROM slow", rows_batch());

    let mut boxed: Box<dyn Driver> = Box::new(driver.clone());
    let database: Box<dyn Database> = boxed.new_database().unwrap();
    let pool = ConnectionPool::new(database, false, PoolConfig::default());

    let sessions = SessionManager::new();
    let session = sessions.create("mock://local", "mock", ConnectOptions::default());

    Fixture {
        driver,
        manager,
        session,
        pool,
        _dir: dir,
    }
}

async fn wait_for<F: Fn() -> bool>(what: &str, predicate: F) {
    for _ in 0..100 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {what}");
}

#[tokio::test]
async fn test_sampler_produces_and_stamps_latest_result() {
    let f = fixture();
    let view = f
        .manager
        .upsert(&f.session, f.pool.clone(), "activity", &SamplerDefinitionPatch::default())
        .await
        .unwrap();
    assert_eq!(view.status, "RUNNING");

    let sid = f.session.session_id.clone();
    wait_for("first sample", || {
        f.manager
            .snapshot(&sid, "activity")
            .ok()
            .flatten()
            .is_some()
    })
    .await;

    let result = f.manager.snapshot(&sid, "activity").unwrap().unwrap();
    assert_eq!(result.collector_id, "top");
    assert_eq!(result.interval_sec, Some(1));
    assert_eq!(result.layers.as_ref().unwrap()["sessions"].rows.len(), 3);

    f.manager.stop(&sid, "activity").await.unwrap();
    let status = f.manager.status(&sid, "activity").unwrap();
    assert_eq!(status.status, "STOPPED");
    assert_eq!(status.reason, None);
}

#[tokio::test]
async fn test_stop_on_failure_retains_reason_and_clears_instance() {
    let f = fixture();
    f.driver
        .script_error("SELECT * FROM slow", "ORA-00942: table or view does not exist");

    f.manager
        .upsert(&f.session, f.pool.clone(), "health", &SamplerDefinitionPatch::default())
        .await
        .unwrap();

    let sid = f.session.session_id.clone();
    wait_for("auto-stop", || {
        f.manager
            .status(&sid, "health")
            .is_ok_and(|status| status.status == "STOPPED")
    })
    .await;

    let status = f.manager.status(&sid, "health").unwrap();
    assert_eq!(
        status.reason.as_deref(),
        Some("ORA-00942: table or view does not exist")
    );
    assert!(f.manager.live_instance(&sid, "health").is_none());
    // The id stays visible so operators can see why it stopped.
    assert_eq!(f.manager.list_sampler_ids(&sid), vec!["health"]);
}

#[tokio::test]
async fn test_restart_clears_reason() {
    let f = fixture();
    f.driver.script_error("SELECT * FROM slow", "ORA-00942: table or view does not exist");
    f.manager
        .upsert(&f.session, f.pool.clone(), "health", &SamplerDefinitionPatch::default())
        .await
        .unwrap();

    let sid = f.session.session_id.clone();
    wait_for("auto-stop", || {
        f.manager.live_instance(&sid, "health").is_none()
    })
    .await;

    f.driver.script_rows("SELECT * FROM slow", rows_batch());
    let view = f
        .manager
        .restart(&f.session, f.pool.clone(), "health")
        .await
        .unwrap();
    assert_eq!(view.status, "RUNNING");
    assert_eq!(view.reason, None);

    wait_for("sample after restart", || {
        f.manager.snapshot(&sid, "health").ok().flatten().is_some()
    })
    .await;
    f.manager.stop(&sid, "health").await.unwrap();
}

#[tokio::test]
async fn test_invalid_connection_stops_with_connection_reason() {
    let f = fixture();
    f.driver.set_valid(false);

    f.manager
        .upsert(&f.session, f.pool.clone(), "activity", &SamplerDefinitionPatch::default())
        .await
        .unwrap();

    let sid = f.session.session_id.clone();
    wait_for("auto-stop on dead connection", || {
        f.manager.live_instance(&sid, "activity").is_none()
    })
    .await;
    let status = f.manager.status(&sid, "activity").unwrap();
    assert_eq!(status.reason.as_deref(), Some("connection is closed"));
}

#[tokio::test]
async fn test_empty_collector_counts_as_null_result() {
    let f = fixture();
    let patch = SamplerDefinitionPatch {
        target: Some(SamplerTarget {
            collector_id: Some("hollow".to_string()),
            collector_ref: None,
        }),
        ..Default::default()
    };
    f.manager
        .upsert(&f.session, f.pool.clone(), "activity", &patch)
        .await
        .unwrap();

    let sid = f.session.session_id.clone();
    wait_for("auto-stop on empty collector", || {
        f.manager.live_instance(&sid, "activity").is_none()
    })
    .await;
    let status = f.manager.status(&sid, "activity").unwrap();
    assert_eq!(status.reason.as_deref(), Some("collector returned null result"));
}

#[tokio::test]
async fn test_unknown_sampler_id_is_invalid_argument() {
    let f = fixture();
    let err = f
        .manager
        .upsert(&f.session, f.pool.clone(), "nope", &SamplerDefinitionPatch::default())
        .await
        .unwrap_err();
    assert_eq!(err.code, sqlgate_error::ErrorCode::InvalidArgument);
}

#[tokio::test]
async fn test_zero_interval_is_rejected() {
    let f = fixture();
    let patch = SamplerDefinitionPatch {
        schedule: Some(Schedule { interval_sec: 0 }),
        ..Default::default()
    };
    let err = f
        .manager
        .upsert(&f.session, f.pool.clone(), "activity", &patch)
        .await
        .unwrap_err();
    assert_eq!(err.code, sqlgate_error::ErrorCode::InvalidArgument);
}

#[tokio::test]
async fn test_stop_twice_is_idempotent() {
    let f = fixture();
    f.manager
        .upsert(&f.session, f.pool.clone(), "activity", &SamplerDefinitionPatch::default())
        .await
        .unwrap();
    let sid = f.session.session_id.clone();

    f.manager.stop(&sid, "activity").await.unwrap();
    f.manager.stop(&sid, "activity").await.unwrap();
    assert!(f.manager.live_instance(&sid, "activity").is_none());
    assert!(f.manager.list_sampler_ids(&sid).is_empty());
}

#[tokio::test]
async fn test_overlap_skip_drops_concurrent_tick() {
    let f = fixture();
    // Make collection slow so a second tick lands while the first holds
    // the gate.
    f.driver
        .script_delay("SELECT * FROM sessions", Duration::from_millis(400));

    f.manager
        .upsert(&f.session, f.pool.clone(), "activity", &SamplerDefinitionPatch::default())
        .await
        .unwrap();
    let sid = f.session.session_id.clone();
    let instance = f.manager.live_instance(&sid, "activity").unwrap();

    // Give the scheduled first tick time to enter its collection.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let before = f.driver.executed_sql().len();
    instance.tick().await; // should be skipped: the first tick holds the gate
    let after = f.driver.executed_sql().len();
    assert_eq!(before, after, "overlapping tick must be dropped under skip policy");

    f.manager.stop(&sid, "activity").await.unwrap();
}

#[tokio::test]
async fn test_stop_all_for_session_only_touches_that_session() {
    let f = fixture();
    let sessions = SessionManager::new();
    let other = sessions.create("mock://local", "mock", ConnectOptions::default());

    f.manager
        .upsert(&f.session, f.pool.clone(), "activity", &SamplerDefinitionPatch::default())
        .await
        .unwrap();
    f.manager
        .upsert(&other, f.pool.clone(), "activity", &SamplerDefinitionPatch::default())
        .await
        .unwrap();

    f.manager.stop_all_for_session(&f.session.session_id).await;
    assert!(f.manager.live_instance(&f.session.session_id, "activity").is_none());
    assert!(f.manager.live_instance(&other.session_id, "activity").is_some());

    f.manager.stop_all_for_session(&other.session_id).await;
}
