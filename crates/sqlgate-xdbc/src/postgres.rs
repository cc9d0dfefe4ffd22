//! PostgreSQL driver option names.

// Names of Database options --------------------------------------------

pub const APPLICATION_NAME: &str = "sqlgate.postgres.application_name";
pub const SSL_MODE: &str = "sqlgate.postgres.sslmode";
pub const CONNECT_TIMEOUT_S: &str = "sqlgate.postgres.connect_timeout";

pub mod ssl_mode {
    pub const DISABLE: &str = "disable";
    pub const PREFER: &str = "prefer";
    pub const REQUIRE: &str = "require";
    pub const VERIFY_CA: &str = "verify-ca";
    pub const VERIFY_FULL: &str = "verify-full";
}
