//! AI assistance: the per-session context buffer, the gateway
//! configuration, and the statements wire contract. The HTTP client that
//! actually talks to the upstream model sits behind [`generate::AiClient`].

pub mod config;
pub mod context;
pub mod generate;

pub use config::AiGatewayConfig;
pub use context::{AiContextBuffer, ContextItem};
pub use generate::{AiClient, GenerateRequest, GenerateResponse};
