//! The sampler manager: lifecycle and status for every `(session, sampler)`
//! pair.
//!
//! State per pair: ABSENT → RUNNING (start/upsert) → ABSENT (manual stop,
//! no reason) or STOPPED_WITH_REASON (auto-stop). A self-stopped instance
//! is removed from the live map by the listener and only its reason
//! remains, for status queries; restart clears it.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use sqlgate_adapter::pool::ConnectionPool;
use sqlgate_collectors::runner::{CollectorResult, CollectorRunner};
use sqlgate_common::constants::SAMPLING;
use sqlgate_error::{ErrorCode, GateResult, err};

use crate::sampler::definition::{
    SamplerDefinition, SamplerDefinitionPatch, load_default_definitions,
};
use crate::sampler::instance::{SamplerInstance, SamplerStatusView};
use crate::session::Session;

type Key = (String, String);

struct ManagerInner {
    defaults: HashMap<String, SamplerDefinition>,
    instances: DashMap<Key, Arc<SamplerInstance>>,
    /// Reasons retained after auto-stop, keyed like the live map.
    stop_reasons: DashMap<Key, String>,
    /// Last definition each pair ran with; restart reuses it.
    last_definitions: DashMap<Key, SamplerDefinition>,
    runner: Arc<CollectorRunner>,
}

pub struct SamplerManager {
    inner: Arc<ManagerInner>,
}

impl SamplerManager {
    pub fn new(runner: Arc<CollectorRunner>, defaults_path: &Path) -> GateResult<Self> {
        let defaults = load_default_definitions(defaults_path)?;
        Ok(SamplerManager {
            inner: Arc::new(ManagerInner {
                defaults,
                instances: DashMap::new(),
                stop_reasons: DashMap::new(),
                last_definitions: DashMap::new(),
                runner,
            }),
        })
    }

    fn key(session_id: &str, sampler_id: &str) -> Key {
        (session_id.to_string(), sampler_id.to_string())
    }

    /// The definition an upsert starts from: the shipped default.
    fn default_definition(&self, sampler_id: &str) -> GateResult<SamplerDefinition> {
        self.inner.defaults.get(sampler_id).cloned().ok_or_else(|| {
            sqlgate_error::gate_err!(
                ErrorCode::InvalidArgument,
                "unknown sampler_id '{sampler_id}': no default definition"
            )
        })
    }

    /// Create or replace a sampler. The merged definition is immutable for
    /// the life of the instance; replacing means stop → new definition →
    /// start. Returns the resulting status.
    pub async fn upsert(
        &self,
        session: &Session,
        pool: ConnectionPool,
        sampler_id: &str,
        patch: &SamplerDefinitionPatch,
    ) -> GateResult<SamplerStatusView> {
        let default = self.default_definition(sampler_id)?;
        let merged = default.merged_with(patch);
        merged.validate()?;

        let key = Self::key(&session.session_id, sampler_id);
        if let Some((_, existing)) = self.inner.instances.remove(&key) {
            existing.stop().await;
        }
        self.inner.stop_reasons.remove(&key);
        self.inner.last_definitions.insert(key.clone(), merged.clone());

        if !merged.is_enabled() {
            log::info!(
                target: SAMPLING,
                "sampler {}/{sampler_id} upserted disabled",
                session.session_id
            );
            return Ok(SamplerStatusView {
                sampler_id: sampler_id.to_string(),
                status: "STOPPED".to_string(),
                collecting: false,
                reason: None,
                interval_sec: Some(merged.schedule.interval_sec),
                last_result_at: None,
            });
        }

        let instance = self.spawn_instance(session, pool, merged);
        let view = instance.status_view();
        self.inner.instances.insert(key, instance);
        Ok(view)
    }

    /// Start a sampler from its default (or last) definition.
    pub async fn start(
        &self,
        session: &Session,
        pool: ConnectionPool,
        sampler_id: &str,
    ) -> GateResult<SamplerStatusView> {
        self.upsert(session, pool, sampler_id, &SamplerDefinitionPatch::default())
            .await
    }

    /// Restart after an auto-stop: the retained reason is cleared and the
    /// last definition reused.
    pub async fn restart(
        &self,
        session: &Session,
        pool: ConnectionPool,
        sampler_id: &str,
    ) -> GateResult<SamplerStatusView> {
        let key = Self::key(&session.session_id, sampler_id);
        let definition = self
            .inner
            .last_definitions
            .get(&key)
            .map(|entry| entry.clone());
        let definition = match definition {
            Some(definition) => definition,
            None => self.default_definition(sampler_id)?,
        };
        definition.validate()?;

        if let Some((_, existing)) = self.inner.instances.remove(&key) {
            existing.stop().await;
        }
        self.inner.stop_reasons.remove(&key);

        let instance = self.spawn_instance(session, pool, definition);
        let view = instance.status_view();
        self.inner.instances.insert(key, instance);
        Ok(view)
    }

    fn spawn_instance(
        &self,
        session: &Session,
        pool: ConnectionPool,
        definition: SamplerDefinition,
    ) -> Arc<SamplerInstance> {
        let weak = Arc::downgrade(&self.inner);
        let listener = Arc::new(move |session_id: &str, sampler_id: &str, reason: String| {
            if let Some(inner) = weak.upgrade() {
                let key = (session_id.to_string(), sampler_id.to_string());
                inner.instances.remove(&key);
                inner.stop_reasons.insert(key, reason);
            }
        });
        let instance = SamplerInstance::new(
            session.session_id.clone(),
            session.db_type.clone(),
            definition,
            pool,
            self.inner.runner.clone(),
            listener,
        );
        instance.start();
        instance
    }

    /// Manual stop: the pair returns to ABSENT with no reason retained.
    pub async fn stop(&self, session_id: &str, sampler_id: &str) -> GateResult<()> {
        let key = Self::key(session_id, sampler_id);
        self.inner.stop_reasons.remove(&key);
        match self.inner.instances.remove(&key) {
            Some((_, instance)) => {
                instance.stop().await;
                Ok(())
            }
            // Stopping an already-stopped sampler is a no-op, not an error.
            None => Ok(()),
        }
    }

    /// Stop every sampler of a session. Called before the session's pool is
    /// closed.
    pub async fn stop_all_for_session(&self, session_id: &str) {
        let keys: Vec<Key> = self
            .inner
            .instances
            .iter()
            .filter(|entry| entry.key().0 == session_id)
            .map(|entry| entry.key().clone())
            .collect();
        for key in keys {
            if let Some((_, instance)) = self.inner.instances.remove(&key) {
                instance.stop().await;
            }
        }
        self.inner
            .stop_reasons
            .retain(|key, _| key.0 != session_id);
        self.inner
            .last_definitions
            .retain(|key, _| key.0 != session_id);
    }

    /// Sampler ids visible for a session: running ones plus those stopped
    /// with a retained reason.
    pub fn list_sampler_ids(&self, session_id: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .inner
            .instances
            .iter()
            .filter(|entry| entry.key().0 == session_id)
            .map(|entry| entry.key().1.clone())
            .chain(
                self.inner
                    .stop_reasons
                    .iter()
                    .filter(|entry| entry.key().0 == session_id)
                    .map(|entry| entry.key().1.clone()),
            )
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn status(&self, session_id: &str, sampler_id: &str) -> GateResult<SamplerStatusView> {
        let key = Self::key(session_id, sampler_id);
        if let Some(instance) = self.inner.instances.get(&key) {
            return Ok(instance.status_view());
        }
        if let Some(reason) = self.inner.stop_reasons.get(&key) {
            let interval_sec = self
                .inner
                .last_definitions
                .get(&key)
                .map(|definition| definition.schedule.interval_sec);
            return Ok(SamplerStatusView {
                sampler_id: sampler_id.to_string(),
                status: "STOPPED".to_string(),
                collecting: false,
                reason: Some(reason.clone()),
                interval_sec,
                last_result_at: None,
            });
        }
        if self.inner.defaults.contains_key(sampler_id) {
            return Ok(SamplerStatusView {
                sampler_id: sampler_id.to_string(),
                status: "STOPPED".to_string(),
                collecting: false,
                reason: None,
                interval_sec: None,
                last_result_at: None,
            });
        }
        err!(
            ErrorCode::SamplerNotFound,
            "unknown sampler '{sampler_id}' for session '{session_id}'"
        )
    }

    /// The latest stored collector result, if the sampler is live and has
    /// produced one.
    pub fn snapshot(
        &self,
        session_id: &str,
        sampler_id: &str,
    ) -> GateResult<Option<CollectorResult>> {
        let key = Self::key(session_id, sampler_id);
        match self.inner.instances.get(&key) {
            Some(instance) => Ok(instance.latest_result()),
            None => {
                // Distinguish "never started / stopped" from "unknown id".
                self.status(session_id, sampler_id)?;
                Ok(None)
            }
        }
    }

    pub fn live_instance(
        &self,
        session_id: &str,
        sampler_id: &str,
    ) -> Option<Arc<SamplerInstance>> {
        self.inner
            .instances
            .get(&Self::key(session_id, sampler_id))
            .map(|entry| entry.clone())
    }
}
