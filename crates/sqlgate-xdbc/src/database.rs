//! XDBC Database
//!
//!

use crate::Connection;
use crate::error::Result;
use crate::options::{InfoCode, OptionConnection, OptionDatabase, OptionValue};

mod builder;
pub use builder::*;

/// XDBC Database.
///
/// A configured handle to one database. Databases are cheap to clone and are
/// the factory for [`Connection`]s; drivers may share heavyweight state (TLS
/// contexts, driver handles) behind the clone.
pub trait Database: Send + Sync + DatabaseInfo {
    fn new_connection(&mut self) -> Result<Box<dyn Connection>>;

    fn new_connection_with_opts(
        &mut self,
        opts: Vec<(OptionConnection, OptionValue)>,
    ) -> Result<Box<dyn Connection>>;

    fn set_option(&mut self, key: OptionDatabase, value: OptionValue) -> Result<()>;

    fn get_option_string(&self, key: OptionDatabase) -> Result<String>;

    fn clone_box(&self) -> Box<dyn Database>;
}

impl Clone for Box<dyn Database> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Vendor and driver identity metadata.
pub trait DatabaseInfo {
    fn get_info(&mut self, info_code: InfoCode) -> Result<String>;

    /// Returns the name of the vendor.
    fn vendor_name(&mut self) -> Result<String> {
        self.get_info(InfoCode::VendorName)
    }

    /// Returns the version of the vendor, e.g.
    /// `"Oracle Database 19c Enterprise Edition Release 19.7.0.0.0"`.
    fn vendor_version(&mut self) -> Result<String> {
        self.get_info(InfoCode::VendorVersion)
    }

    /// Returns the name of the wrapped driver.
    fn driver_name(&mut self) -> Result<String> {
        self.get_info(InfoCode::DriverName)
    }

    /// Returns the version of the wrapped driver.
    fn driver_version(&mut self) -> Result<String> {
        self.get_info(InfoCode::DriverVersion)
    }
}
