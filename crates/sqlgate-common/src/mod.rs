pub mod constants;
pub mod logging;
pub mod stdfs;
pub mod time;

pub extern crate sqlgate_error as error;
pub use sqlgate_error::{ErrorCode, GateError, GateResult, deepest_message, err, gate_err};
