use std::time::Duration;

// ----------------------------------------------------------------------------------------------
// SQLGATE
pub const SQLGATE: &str = "sqlgate";

// ----------------------------------------------------------------------------------------------
// log targets
pub const CONNECTING: &str = "connecting";
pub const EXECUTING: &str = "executing";
pub const COLLECTING: &str = "collecting";
pub const SAMPLING: &str = "sampling";
pub const LOADING: &str = "loading";

// ----------------------------------------------------------------------------------------------
// on-disk layout
//
//   <drivers_root>/
//   ├── oracle/
//   │   ├── oracle-19.yaml
//   │   └── oracle-21.yaml
//   └── postgres/
//       └── postgres-15.yaml
//   samplers/
//   └── default.json
pub const SAMPLERS_DIR_NAME: &str = "samplers";
pub const SAMPLER_DEFAULTS_FILE: &str = "default.json";
pub const PACK_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

// ----------------------------------------------------------------------------------------------
// session lifecycle
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
pub const SESSION_MAX_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);
pub const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

// ----------------------------------------------------------------------------------------------
// connection pool
pub const POOL_MAX_CONNECTIONS: usize = 5;
pub const POOL_MIN_IDLE: usize = 1;
pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
pub const POOL_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

// ----------------------------------------------------------------------------------------------
// samplers
pub const SAMPLER_VALIDITY_PROBE: Duration = Duration::from_secs(2);
pub const SAMPLER_STOP_GRACE: Duration = Duration::from_secs(5);

// ----------------------------------------------------------------------------------------------
// AI context buffer
pub const AI_CONTEXT_MAX_ITEMS: usize = 10;
pub const AI_CONTEXT_MAX_SAMPLE_ROWS: usize = 3;
pub const AI_CONTEXT_MAX_COLUMNS: usize = 20;
pub const AI_CONTEXT_MAX_CELL_CHARS: usize = 64;
pub const AI_CONTEXT_MAX_ERROR_CHARS: usize = 512;
