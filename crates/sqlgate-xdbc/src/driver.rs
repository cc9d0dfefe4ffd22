//! XDBC Driver
//!
//!

use std::collections::HashMap;
use std::fmt::{self, Display};
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;

use crate::Database;
use crate::error::{Error, Result, Status};
use crate::options::{OptionDatabase, OptionValue};

mod builder;
pub use builder::*;

/// Database backends the gateway can open sessions against.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum Backend {
    Oracle,
    Postgres,
    Mysql,
    SqlServer,
    /// In-memory mock backend, used by tests and the `mock` dialect tag.
    Mock,
    /// Dynamically registered backend.
    ///
    /// This variant is fully dynamic and experimental. Features might not
    /// work reliably and fail at runtime.
    Generic {
        /// The registered name of the driver, e.g. `sqlite`.
        name: &'static str,
    },
}

impl Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Oracle => write!(f, "Oracle"),
            Backend::Postgres => write!(f, "PostgreSQL"),
            Backend::Mysql => write!(f, "MySQL"),
            Backend::SqlServer => write!(f, "SQLServer"),
            Backend::Mock => write!(f, "Mock"),
            Backend::Generic { name } => write!(f, "Generic({name})"),
        }
    }
}

impl Backend {
    /// Map a normalized dialect tag (as it appears on the wire and in the
    /// collector pack directory tree) to a backend.
    pub fn from_db_type(db_type: &str) -> Option<Backend> {
        match db_type.trim().to_ascii_lowercase().as_str() {
            "oracle" => Some(Backend::Oracle),
            "postgres" | "postgresql" => Some(Backend::Postgres),
            "mysql" | "mariadb" => Some(Backend::Mysql),
            "sqlserver" | "mssql" => Some(Backend::SqlServer),
            "mock" => Some(Backend::Mock),
            _ => None,
        }
    }

    /// The dialect tag used for this backend in pack directories and wire
    /// payloads.
    pub fn db_type(&self) -> &'static str {
        match self {
            Backend::Oracle => "oracle",
            Backend::Postgres => "postgres",
            Backend::Mysql => "mysql",
            Backend::SqlServer => "sqlserver",
            Backend::Mock => "mock",
            Backend::Generic { name } => name,
        }
    }
}

/// XDBC Driver.
///
/// A [`Driver`] creates new [`Database`] instances that, in turn, create new
/// [`Connection`](crate::Connection) instances.
pub trait Driver: Send {
    fn new_database(&mut self) -> Result<Box<dyn Database>>;

    fn new_database_with_opts(
        &mut self,
        opts: Vec<(OptionDatabase, OptionValue)>,
    ) -> Result<Box<dyn Database>>;

    /// [Debug](std::fmt::Debug) implementation for Driver.
    fn debug_fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dyn Driver")
    }
}

impl fmt::Debug for dyn Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.debug_fmt(f)
    }
}

/// A factory producing fresh [`Driver`] values for one [`Backend`].
///
/// Vendor integrations register themselves here at process startup; the
/// gateway resolves drivers exclusively through this registry, so the set of
/// usable backends is whatever the embedding process registered.
pub type DriverFactory = dyn Fn() -> Result<Box<dyn Driver>> + Send + Sync;

static REGISTRY: LazyLock<RwLock<HashMap<Backend, Arc<DriverFactory>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Register (or replace) the driver factory for a backend.
pub fn register_driver(backend: Backend, factory: impl Fn() -> Result<Box<dyn Driver>> + Send + Sync + 'static) {
    REGISTRY.write().insert(backend, Arc::new(factory));
}

/// Backends that currently resolve to a driver. The mock backend is always
/// available.
pub fn registered_backends() -> Vec<Backend> {
    let mut backends: Vec<Backend> = REGISTRY.read().keys().copied().collect();
    if !backends.contains(&Backend::Mock) {
        backends.push(Backend::Mock);
    }
    backends.sort_by_key(|backend| backend.db_type());
    backends
}

pub(crate) fn load_driver(backend: Backend) -> Result<Box<dyn Driver>> {
    if let Some(factory) = REGISTRY.read().get(&backend) {
        return factory();
    }
    // The mock backend is always available so tests and dry runs don't need
    // explicit registration.
    if backend == Backend::Mock {
        return Ok(Box::new(crate::mock::MockDriver::new()));
    }
    Err(Error::with_message_and_status(
        format!("no driver registered for backend {backend}"),
        Status::NotFound,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_db_type_normalizes() {
        assert_eq!(Backend::from_db_type(" Oracle "), Some(Backend::Oracle));
        assert_eq!(Backend::from_db_type("postgresql"), Some(Backend::Postgres));
        assert_eq!(Backend::from_db_type("mssql"), Some(Backend::SqlServer));
        assert_eq!(Backend::from_db_type("db2"), None);
    }

    #[test]
    fn test_mock_backend_loads_without_registration() {
        let driver = load_driver(Backend::Mock);
        assert!(driver.is_ok());
    }

    #[test]
    fn test_unregistered_backend_fails() {
        let err = load_driver(Backend::SqlServer).unwrap_err();
        assert_eq!(err.status, Status::NotFound);
    }
}
