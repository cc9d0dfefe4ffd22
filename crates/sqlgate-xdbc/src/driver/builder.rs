//! A builder for a [`Driver`]
//!
//!

use crate::driver::{Backend, Driver, load_driver};
use crate::error::Result;

/// A builder for [`Driver`].
///
/// Resolves the backend against the process-wide driver registry with
/// [`Builder::try_load`].
#[derive(Clone, Debug)]
pub struct Builder {
    /// The backend target of the driver.
    pub backend: Backend,
}

impl Builder {
    pub fn new(backend: Backend) -> Self {
        Builder { backend }
    }

    /// Attempt to load the driver for the configured backend.
    pub fn try_load(self) -> Result<Box<dyn Driver>> {
        load_driver(self.backend)
    }
}
