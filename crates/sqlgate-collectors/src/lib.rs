//! Collector packs: versioned YAML bundles of SQL, one directory per
//! database dialect. This crate loads them, matches the pack to the
//! connected server version, resolves collector/query identifiers, and
//! drives execution.

pub mod registry;
pub mod resolve;
pub mod runner;
pub mod schema;
pub mod version;

pub use registry::CollectorRegistry;
pub use resolve::{ResolvedCollector, ResolvedQuery, resolve_collector, resolve_query};
pub use runner::{CollectorResult, CollectorRunner, LayerResult, QueryResult};
pub use schema::{CollectorDefinition, CollectorPack, LayerConfig, QueryConfig, SupportedVersions};
pub use version::VersionNumber;
