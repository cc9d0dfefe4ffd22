//! The gateway runtime: named sessions over pooled connections, periodic
//! samplers, an AI context buffer, and the service facade the HTTP binding
//! calls into.

pub mod ai;
pub mod gateway;
pub mod payload;
pub mod sampler;
pub mod session;
pub mod wire;

pub use gateway::{Gateway, GatewayConfig, VendorOptions};
pub use payload::ErrorPayload;
pub use session::{ConnectOptions, Session, SessionManager};
