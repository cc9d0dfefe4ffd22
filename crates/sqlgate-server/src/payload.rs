//! Wire-shaped error payloads.
//!
//! Every HTTP status ≥ 400 carries this body. The mapping from error code
//! to status lives with the codes themselves; this module only shapes the
//! payload and stamps a trace id.

use serde_derive::Serialize;
use sqlgate_error::GateError;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub trace_id: String,
}

impl ErrorPayload {
    /// Build the payload and the HTTP status the binding should answer with.
    pub fn from_error(error: &GateError) -> (u16, ErrorPayload) {
        let code = error.code();
        (
            code.http_status(),
            ErrorPayload {
                code: code.wire_name().to_string(),
                message: error.to_string(),
                details: None,
                trace_id: Uuid::new_v4().to_string(),
            },
        )
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}
