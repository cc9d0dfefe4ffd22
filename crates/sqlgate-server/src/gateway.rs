//! The service facade.
//!
//! One `Gateway` value owns every manager; the HTTP binding calls these
//! methods and maps results/errors onto the wire. Methods that touch a
//! database block (they borrow pooled connections); sampler lifecycle and
//! disconnect are async because they wait on in-flight ticks.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sqlgate_adapter::executor::{self, ExecuteOptions, ParamMap};
use sqlgate_adapter::metadata::{self, ColumnInfo, ConnInfo, DescribeDetail, ObjectInfo};
use sqlgate_adapter::pool::{ConnectionPool, PoolConfig, PoolManager};
use sqlgate_adapter::response::ExecuteResponse;
use sqlgate_collectors::registry::CollectorRegistry;
use sqlgate_collectors::runner::{
    CollectorListing, CollectorResult, CollectorRunner, QueryListing, QueryResult,
};
use sqlgate_common::constants::{CONNECTING, SAMPLER_DEFAULTS_FILE, SQLGATE};
use sqlgate_error::{ErrorCode, GateResult, err, gate_err};
use sqlgate_xdbc::{Backend, database, driver, oracle, postgres};

use crate::ai::config::AiGatewayConfig;
use crate::ai::context::{AiContextBuffer, ContextItem};
use crate::ai::generate::{self, AiClient, GenerateRequest, GenerateResponse};
use crate::sampler::definition::SamplerDefinitionPatch;
use crate::sampler::instance::SamplerStatusView;
use crate::sampler::manager::SamplerManager;
use crate::session::{ConnectOptions, Session, SessionManager};

/// Vendor-specific connect-time settings. These are threaded into the
/// per-backend database builder; they are read once at gateway construction
/// and never rewritten under the same connect.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VendorOptions {
    /// Directory with `tnsnames.ora`/`sqlnet.ora` for Oracle sessions.
    pub oracle_tns_admin: Option<PathBuf>,
    /// Auto-login wallet directory for Oracle sessions.
    pub oracle_wallet_location: Option<PathBuf>,
    /// `sslmode` applied to PostgreSQL sessions, e.g.
    /// [`sqlgate_xdbc::postgres::ssl_mode::REQUIRE`].
    pub postgres_ssl_mode: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Root of the collector pack tree: `<drivers_root>/<db_type>/*.y?ml`.
    pub drivers_root: PathBuf,
    /// Directory holding `default.json` with the sampler definitions.
    pub samplers_dir: PathBuf,
    /// Vendor-specific connect-time settings.
    pub vendor: VendorOptions,
}

impl GatewayConfig {
    pub fn sampler_defaults_path(&self) -> PathBuf {
        self.samplers_dir.join(SAMPLER_DEFAULTS_FILE)
    }
}

pub struct Gateway {
    sessions: Arc<SessionManager>,
    pools: Arc<PoolManager>,
    registry: Arc<CollectorRegistry>,
    runner: Arc<CollectorRunner>,
    samplers: SamplerManager,
    ai_context: AiContextBuffer,
    vendor: VendorOptions,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> GateResult<Self> {
        let registry = Arc::new(CollectorRegistry::new(&config.drivers_root));
        registry.reload();
        let runner = Arc::new(CollectorRunner::new(Arc::clone(&registry)));
        let samplers = SamplerManager::new(Arc::clone(&runner), &config.sampler_defaults_path())?;
        Ok(Gateway {
            sessions: Arc::new(SessionManager::new()),
            pools: Arc::new(PoolManager::new()),
            registry,
            runner,
            samplers,
            ai_context: AiContextBuffer::new(),
            vendor: config.vendor,
        })
    }

    /// Spawn the session expiration sweeper. Must run on a tokio runtime.
    pub fn start_background_tasks(&self) -> tokio::task::JoinHandle<()> {
        self.sessions.spawn_sweeper()
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn samplers(&self) -> &SamplerManager {
        &self.samplers
    }

    pub fn registry(&self) -> &CollectorRegistry {
        &self.registry
    }

    pub fn ai_context_buffer(&self) -> &AiContextBuffer {
        &self.ai_context
    }

    // ------------------------------------------------------------------
    // session lifecycle

    /// Open a session and eagerly initialize its pool (one validated borrow
    /// within the probe window). A failed pool init removes the session.
    pub fn connect(&self, dsn: &str, db_type: &str, options: ConnectOptions) -> GateResult<Session> {
        let backend = backend_for(db_type)?;
        let session = self.sessions.create(dsn, db_type, options);
        match self.init_pool(&session, backend) {
            Ok(_) => Ok(session),
            Err(error) => {
                self.sessions.remove(&session.session_id);
                Err(error)
            }
        }
    }

    fn init_pool(&self, session: &Session, backend: Backend) -> GateResult<ConnectionPool> {
        let mut loaded = driver::Builder::new(backend).try_load().map_err(|e| {
            gate_err!(ErrorCode::ConnectionFailure, "failed to load {backend} driver: {e}")
        })?;
        let database = database_builder(&self.vendor, session, backend)
            .build(&mut loaded)
            .map_err(|e| {
                gate_err!(ErrorCode::ConnectionFailure, "failed to configure database: {e}")
            })?;
        let pool_config = PoolConfig {
            acquire_timeout: Duration::from_millis(session.options.connection_timeout_ms.max(1)),
            ..Default::default()
        };
        let pool = ConnectionPool::initialize(database, session.options.read_only, pool_config)?;
        log::info!(
            target: CONNECTING,
            "pool ready for session {} ({backend})",
            session.session_id
        );
        Ok(self.pools.install(&session.session_id, pool))
    }

    /// Coordinated teardown: samplers first, then the pool, then the
    /// session record and its AI context.
    pub async fn disconnect(&self, session_id: &str) -> GateResult<()> {
        self.samplers.stop_all_for_session(session_id).await;
        if let Some(pool) = self.pools.remove(session_id) {
            pool.close();
        }
        self.sessions.remove(session_id);
        self.ai_context.clear(session_id);
        log::info!(target: CONNECTING, "session {session_id} disconnected");
        Ok(())
    }

    fn live_session(&self, session_id: &str) -> GateResult<Session> {
        self.sessions.get(session_id)
    }

    /// The session's pool; rebuilt on demand if it has not been initialized
    /// (first-writer-wins keeps racing initializers consistent).
    fn pool_for(&self, session: &Session) -> GateResult<ConnectionPool> {
        if let Some(pool) = self.pools.get(&session.session_id) {
            return Ok(pool);
        }
        let backend = backend_for(&session.db_type)?;
        self.init_pool(session, backend)
    }

    // ------------------------------------------------------------------
    // execution

    pub fn execute(
        &self,
        session_id: &str,
        sql: &str,
        options: &ExecuteOptions,
    ) -> GateResult<ExecuteResponse> {
        let session = self.live_session(session_id)?;
        let pool = self.pool_for(&session)?;
        let mut conn = pool.borrow()?;
        match executor::execute_ad_hoc(conn.as_mut(), session.options.read_only, sql, options) {
            Ok(response) => {
                self.ai_context.record_execute(session_id, sql, &response);
                Ok(response)
            }
            Err(error) => {
                self.ai_context
                    .record_execute_error(session_id, sql, &error.to_string());
                Err(error.into())
            }
        }
    }

    // ------------------------------------------------------------------
    // metadata

    pub fn conninfo(&self, session_id: &str) -> GateResult<ConnInfo> {
        let session = self.live_session(session_id)?;
        let pool = self.pool_for(&session)?;
        let mut conn = pool.borrow()?;
        Ok(metadata::conninfo(conn.as_mut())?)
    }

    pub fn describe(
        &self,
        session_id: &str,
        name: &str,
        detail: DescribeDetail,
    ) -> GateResult<Vec<ColumnInfo>> {
        if name.trim().is_empty() {
            return err!(ErrorCode::InvalidArgument, "object name must not be blank");
        }
        let session = self.live_session(session_id)?;
        let pool = self.pool_for(&session)?;
        let mut conn = pool.borrow()?;
        Ok(metadata::describe(conn.as_mut(), name, detail)?)
    }

    pub fn list_objects(
        &self,
        session_id: &str,
        kind: Option<&str>,
        schema: Option<&str>,
    ) -> GateResult<Vec<ObjectInfo>> {
        let session = self.live_session(session_id)?;
        let pool = self.pool_for(&session)?;
        let mut conn = pool.borrow()?;
        Ok(metadata::list_objects(conn.as_mut(), kind, schema)?)
    }

    pub fn completions(
        &self,
        session_id: &str,
        schema: Option<&str>,
        prefix: &str,
    ) -> GateResult<Vec<String>> {
        let session = self.live_session(session_id)?;
        let pool = self.pool_for(&session)?;
        let mut conn = pool.borrow()?;
        Ok(metadata::completions(conn.as_mut(), schema, prefix)?)
    }

    pub fn explain(&self, session_id: &str, sql: &str, analyze: bool) -> GateResult<ExecuteResponse> {
        let session = self.live_session(session_id)?;
        let backend = backend_for(&session.db_type)?;
        let explain_sql = metadata::explain_sql(backend, sql, analyze);
        self.execute(session_id, &explain_sql, &ExecuteOptions::default())
    }

    /// Dialect tags that currently resolve to a driver.
    pub fn list_drivers(&self) -> Vec<String> {
        driver::registered_backends()
            .into_iter()
            .map(|backend| backend.db_type().to_string())
            .collect()
    }

    // ------------------------------------------------------------------
    // collectors

    pub fn reload_collectors(&self) -> usize {
        self.registry.reload()
    }

    pub fn list_collectors(&self, session_id: &str) -> GateResult<Vec<CollectorListing>> {
        let session = self.live_session(session_id)?;
        let pool = self.pool_for(&session)?;
        let mut conn = pool.borrow()?;
        Ok(self.runner.list_collectors(conn.as_mut(), &session.db_type))
    }

    pub fn list_queries(
        &self,
        session_id: &str,
        collector_id: Option<&str>,
    ) -> GateResult<Vec<QueryListing>> {
        let session = self.live_session(session_id)?;
        let pool = self.pool_for(&session)?;
        let mut conn = pool.borrow()?;
        Ok(self
            .runner
            .list_queries(conn.as_mut(), &session.db_type, collector_id))
    }

    pub fn run_collector(
        &self,
        session_id: &str,
        collector_id: Option<&str>,
        collector_ref: Option<&str>,
    ) -> GateResult<CollectorResult> {
        let session = self.live_session(session_id)?;
        let pool = self.pool_for(&session)?;
        let mut conn = pool.borrow()?;
        self.runner
            .run_collector(conn.as_mut(), &session.db_type, collector_id, collector_ref)
    }

    pub fn run_query(
        &self,
        session_id: &str,
        collector_id: Option<&str>,
        collector_ref: Option<&str>,
        query_id: &str,
        params: &ParamMap,
    ) -> GateResult<QueryResult> {
        let session = self.live_session(session_id)?;
        let pool = self.pool_for(&session)?;
        let mut conn = pool.borrow()?;
        self.runner.run_query(
            conn.as_mut(),
            &session.db_type,
            collector_id,
            collector_ref,
            query_id,
            params,
        )
    }

    // ------------------------------------------------------------------
    // samplers

    pub async fn upsert_sampler(
        &self,
        session_id: &str,
        sampler_id: &str,
        patch: &SamplerDefinitionPatch,
    ) -> GateResult<SamplerStatusView> {
        let session = self.live_session(session_id)?;
        let pool = self.pool_for(&session)?;
        self.samplers.upsert(&session, pool, sampler_id, patch).await
    }

    pub async fn start_sampler(
        &self,
        session_id: &str,
        sampler_id: &str,
    ) -> GateResult<SamplerStatusView> {
        let session = self.live_session(session_id)?;
        let pool = self.pool_for(&session)?;
        self.samplers.start(&session, pool, sampler_id).await
    }

    pub async fn restart_sampler(
        &self,
        session_id: &str,
        sampler_id: &str,
    ) -> GateResult<SamplerStatusView> {
        let session = self.live_session(session_id)?;
        let pool = self.pool_for(&session)?;
        self.samplers.restart(&session, pool, sampler_id).await
    }

    pub async fn stop_sampler(&self, session_id: &str, sampler_id: &str) -> GateResult<()> {
        self.live_session(session_id)?;
        self.samplers.stop(session_id, sampler_id).await
    }

    pub fn list_samplers(&self, session_id: &str) -> GateResult<Vec<String>> {
        self.live_session(session_id)?;
        Ok(self.samplers.list_sampler_ids(session_id))
    }

    pub fn sampler_status(
        &self,
        session_id: &str,
        sampler_id: &str,
    ) -> GateResult<SamplerStatusView> {
        self.live_session(session_id)?;
        self.samplers.status(session_id, sampler_id)
    }

    pub fn sampler_snapshot(
        &self,
        session_id: &str,
        sampler_id: &str,
    ) -> GateResult<Option<CollectorResult>> {
        self.live_session(session_id)?;
        self.samplers.snapshot(session_id, sampler_id)
    }

    // ------------------------------------------------------------------
    // AI

    /// Generate SQL. Context comes from the session's buffer unless
    /// `context_mode` is `off`; with no session id the request silently
    /// proceeds without context.
    pub fn generate_sql(
        &self,
        config: &AiGatewayConfig,
        client: &dyn AiClient,
        request: &GenerateRequest,
    ) -> GateResult<GenerateResponse> {
        let context_items = if request.wants_context() {
            match &request.session_id {
                Some(session_id) => self
                    .ai_context
                    .get_recent(session_id, request.context_limit.unwrap_or(5)),
                None => Vec::new(),
            }
        } else {
            Vec::new()
        };
        generate::generate(config, client, request, &context_items)
    }

    pub fn ai_context(&self, session_id: &str, limit: usize) -> GateResult<Vec<ContextItem>> {
        self.live_session(session_id)?;
        Ok(self.ai_context.get_recent(session_id, limit))
    }

    pub fn ai_context_clear(&self, session_id: &str) -> GateResult<()> {
        self.live_session(session_id)?;
        self.ai_context.clear(session_id);
        Ok(())
    }
}

fn backend_for(db_type: &str) -> GateResult<Backend> {
    Backend::from_db_type(db_type).ok_or_else(|| {
        gate_err!(
            ErrorCode::InvalidArgument,
            "unsupported db_type '{db_type}' (expected oracle, postgres, mysql, sqlserver or mock)"
        )
    })
}

/// The database builder for one session: DSN plus the vendor-specific
/// options this backend understands.
fn database_builder(
    vendor: &VendorOptions,
    session: &Session,
    backend: Backend,
) -> database::Builder {
    let mut builder = database::Builder::new(backend).with_uri(&session.dsn);
    match backend {
        Backend::Oracle => {
            builder = builder.with_named_option(
                oracle::CONNECT_TIMEOUT_MS,
                session.options.connection_timeout_ms.to_string(),
            );
            if let Some(tns_admin) = &vendor.oracle_tns_admin {
                builder =
                    builder.with_named_option(oracle::TNS_ADMIN, tns_admin.display().to_string());
            }
            if let Some(wallet) = &vendor.oracle_wallet_location {
                builder = builder
                    .with_named_option(oracle::WALLET_LOCATION, wallet.display().to_string());
            }
        }
        Backend::Postgres => {
            let timeout_s = (session.options.connection_timeout_ms / 1000).max(1);
            builder = builder
                .with_named_option(postgres::APPLICATION_NAME, SQLGATE)
                .with_named_option(postgres::CONNECT_TIMEOUT_S, timeout_s.to_string());
            if let Some(ssl_mode) = &vendor.postgres_ssl_mode {
                builder = builder.with_named_option(postgres::SSL_MODE, ssl_mode.clone());
            }
        }
        _ => {}
    }
    builder
}
