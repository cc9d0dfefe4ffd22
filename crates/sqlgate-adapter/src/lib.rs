//! The adapter layer: everything between the driver seam and the gateway
//! services. Statements go in as SQL text plus named parameters; results
//! come out as JSON-safe rows, wire-shaped responses, or metadata listings.

pub mod convert;
pub mod errors;
pub mod executor;
pub mod metadata;
pub mod pool;
pub mod response;

pub use errors::{AdapterError, AdapterErrorKind, AdapterResult};
pub use executor::{ExecuteOptions, ParamMap, execute_ad_hoc, execute_response, execute_rows};
pub use pool::{ConnectionPool, PoolConfig, PoolManager, PooledConnection};
pub use response::{ColumnMeta, ExecuteResponse, ResponseType, Row};
