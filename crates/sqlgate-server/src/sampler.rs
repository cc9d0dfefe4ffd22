//! Periodic samplers: each one runs a chosen collector against a session's
//! pool on a fixed rate and exposes the latest result.

pub mod definition;
pub mod instance;
pub mod manager;

pub use definition::{
    OverlapPolicy, RunPolicy, SamplerDefinition, SamplerDefinitionPatch, SamplerTarget, Schedule,
    load_default_definitions,
};
pub use instance::{SamplerInstance, SamplerStatusView};
pub use manager::SamplerManager;
