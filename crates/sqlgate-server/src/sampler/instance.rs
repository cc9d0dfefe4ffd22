//! One running sampler.
//!
//! The instance owns a scheduled tokio task ticking at a fixed rate. Every
//! tick borrows a connection from the session's pool (connections are never
//! cached across ticks), gates on validity, runs the target collector, and
//! stores the latest result. The first failure stops the instance and
//! retains the reason.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_derive::Serialize;
use sqlgate_adapter::pool::ConnectionPool;
use sqlgate_collectors::runner::{CollectorResult, CollectorRunner};
use sqlgate_common::constants::{SAMPLER_STOP_GRACE, SAMPLER_VALIDITY_PROBE, SAMPLING};
use sqlgate_common::time;
use tokio::time::MissedTickBehavior;

use crate::sampler::definition::{OverlapPolicy, SamplerDefinition};

/// Invoked exactly once when an instance stops itself. Arguments:
/// session id, sampler id, reason.
pub(crate) type AutoStopListener = Arc<dyn Fn(&str, &str, String) + Send + Sync>;

/// Status as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamplerStatusView {
    pub sampler_id: String,
    pub status: String,
    pub collecting: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_sec: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_result_at: Option<DateTime<Utc>>,
}

enum TickOutcome {
    Success(CollectorResult),
    AutoStop(String),
}

pub struct SamplerInstance {
    session_id: String,
    sampler_id: String,
    db_type: String,
    definition: SamplerDefinition,
    pool: ConnectionPool,
    runner: Arc<CollectorRunner>,
    running: AtomicBool,
    collecting: AtomicBool,
    latest_result: Mutex<Option<(CollectorResult, DateTime<Utc>)>>,
    stop_reason: Mutex<Option<String>>,
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
    /// Held for the duration of one tick; `stop` waits on it to let the
    /// in-flight tick finish.
    tick_gate: tokio::sync::Mutex<()>,
    on_auto_stop: AutoStopListener,
}

impl SamplerInstance {
    pub(crate) fn new(
        session_id: String,
        db_type: String,
        definition: SamplerDefinition,
        pool: ConnectionPool,
        runner: Arc<CollectorRunner>,
        on_auto_stop: AutoStopListener,
    ) -> Arc<Self> {
        Arc::new(SamplerInstance {
            sampler_id: definition.sampler_id.clone(),
            session_id,
            db_type,
            definition,
            pool,
            runner,
            running: AtomicBool::new(false),
            collecting: AtomicBool::new(false),
            latest_result: Mutex::new(None),
            stop_reason: Mutex::new(None),
            task: Mutex::new(None),
            tick_gate: tokio::sync::Mutex::new(()),
            on_auto_stop,
        })
    }

    pub fn sampler_id(&self) -> &str {
        &self.sampler_id
    }

    pub fn definition(&self) -> &SamplerDefinition {
        &self.definition
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_collecting(&self) -> bool {
        self.collecting.load(Ordering::SeqCst)
    }

    pub fn stop_reason(&self) -> Option<String> {
        self.stop_reason.lock().clone()
    }

    pub fn latest_result(&self) -> Option<CollectorResult> {
        self.latest_result.lock().as_ref().map(|(result, _)| result.clone())
    }

    pub fn status_view(&self) -> SamplerStatusView {
        SamplerStatusView {
            sampler_id: self.sampler_id.clone(),
            status: if self.is_running() { "RUNNING" } else { "STOPPED" }.to_string(),
            collecting: self.is_collecting(),
            reason: self.stop_reason(),
            interval_sec: Some(self.definition.schedule.interval_sec),
            last_result_at: self.latest_result.lock().as_ref().map(|(_, at)| *at),
        }
    }

    /// Schedule the periodic task. Must run on a tokio runtime.
    pub(crate) fn start(self: &Arc<Self>) {
        self.running.store(true, Ordering::SeqCst);
        let instance = Arc::clone(self);
        let period = Duration::from_secs(self.definition.schedule.interval_sec.max(1));
        let behavior = match self.definition.run_policy.on_overlap {
            OverlapPolicy::Skip => MissedTickBehavior::Skip,
            OverlapPolicy::Queue => MissedTickBehavior::Burst,
        };
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(behavior);
            loop {
                interval.tick().await;
                if !instance.is_running() {
                    break;
                }
                instance.tick().await;
                if !instance.is_running() {
                    break;
                }
            }
        });
        *self.task.lock() = Some(handle);
        log::info!(
            target: SAMPLING,
            "sampler {}/{} started (every {}s)",
            self.session_id,
            self.sampler_id,
            self.definition.schedule.interval_sec
        );
    }

    /// One sampling round. Public so callers can force an immediate sample.
    pub async fn tick(self: &Arc<Self>) {
        if !self.is_running() {
            return;
        }
        // Overlap guard: with the skip policy a tick arriving while the
        // previous one still holds the gate is dropped.
        let _gate = match self.tick_gate.try_lock() {
            Ok(gate) => gate,
            Err(_) => match self.definition.run_policy.on_overlap {
                OverlapPolicy::Skip => {
                    log::debug!(
                        target: SAMPLING,
                        "sampler {}/{} tick skipped: previous tick still collecting",
                        self.session_id,
                        self.sampler_id
                    );
                    return;
                }
                OverlapPolicy::Queue => self.tick_gate.lock().await,
            },
        };

        self.collecting.store(true, Ordering::SeqCst);
        let instance = Arc::clone(self);
        let outcome = tokio::task::spawn_blocking(move || instance.blocking_tick()).await;
        self.collecting.store(false, Ordering::SeqCst);

        match outcome {
            Ok(TickOutcome::Success(result)) => {
                *self.latest_result.lock() = Some((result, time::now()));
            }
            Ok(TickOutcome::AutoStop(reason)) => self.auto_stop(reason),
            Err(join_error) => {
                if join_error.is_panic() {
                    self.auto_stop(format!("sampler tick panicked: {join_error}"));
                }
            }
        }
    }

    fn blocking_tick(&self) -> TickOutcome {
        let mut conn = match self.pool.borrow() {
            Ok(conn) => conn,
            Err(_) => return TickOutcome::AutoStop("connection is closed".to_string()),
        };
        match conn.as_mut().is_valid(SAMPLER_VALIDITY_PROBE) {
            Ok(true) => {}
            _ => return TickOutcome::AutoStop("connection is closed".to_string()),
        }

        let target = &self.definition.target;
        match self.runner.run_collector(
            conn.as_mut(),
            &self.db_type,
            target.collector_id.as_deref(),
            target.collector_ref.as_deref(),
        ) {
            Ok(mut result) => {
                if result.layers.is_none() && result.queries.is_none() {
                    return TickOutcome::AutoStop("collector returned null result".to_string());
                }
                result.interval_sec = Some(self.definition.schedule.interval_sec);
                TickOutcome::Success(result)
            }
            Err(error) => TickOutcome::AutoStop(error.root_message()),
        }
    }

    /// Stop because of a failure. Idempotent: the first reason wins and the
    /// manager is notified exactly once.
    fn auto_stop(&self, reason: String) {
        {
            let mut stop_reason = self.stop_reason.lock();
            if stop_reason.is_some() {
                return;
            }
            *stop_reason = Some(reason.clone());
        }
        self.running.store(false, Ordering::SeqCst);
        log::warn!(
            target: SAMPLING,
            "sampler {}/{} stopped: {reason}",
            self.session_id,
            self.sampler_id
        );
        (self.on_auto_stop)(&self.session_id, &self.sampler_id, reason);
    }

    /// Manual stop: no reason is retained. Waits up to the grace period for
    /// an in-flight tick, then cancels the scheduled task. The underlying
    /// connections stay with the pool.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if tokio::time::timeout(SAMPLER_STOP_GRACE, self.tick_gate.lock())
            .await
            .is_err()
        {
            log::warn!(
                target: SAMPLING,
                "sampler {}/{} stop: in-flight tick did not finish within {:?}",
                self.session_id,
                self.sampler_id,
                SAMPLER_STOP_GRACE
            );
        }
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
        log::info!(target: SAMPLING, "sampler {}/{} stopped", self.session_id, self.sampler_id);
    }
}
