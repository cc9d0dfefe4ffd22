#[macro_use]
pub mod macros;

mod codes;
mod types;

pub use codes::ErrorCode;
pub use types::{GateError, GateResult, WrappedError, deepest_message};
