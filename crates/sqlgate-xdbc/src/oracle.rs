//! Oracle driver option names.
//!
//! Set once per database handle by the gateway's pool initializer and never
//! rewritten under the same connect; nothing here touches process-wide
//! system properties.

// Names of Database options --------------------------------------------

/// Directory holding `tnsnames.ora`/`sqlnet.ora`.
pub const TNS_ADMIN: &str = "sqlgate.oracle.tns_admin";
/// Directory holding the auto-login wallet for `wallet`-based auth.
pub const WALLET_LOCATION: &str = "sqlgate.oracle.wallet_location";
pub const CONNECT_TIMEOUT_MS: &str = "sqlgate.oracle.connect_timeout_ms";
