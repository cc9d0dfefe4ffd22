//! SQL generation: prompt assembly and the statements wire contract.
//!
//! The upstream model is asked for strict JSON `{"statements": [...]}`
//! with no markdown fences and no trailing semicolons. Whatever comes
//! back is validated and re-serialized canonically before it reaches the
//! caller.

use serde_derive::{Deserialize, Serialize};
use sqlgate_error::{ErrorCode, GateResult, err};

use crate::ai::config::AiGatewayConfig;
use crate::ai::context::ContextItem;

/// The upstream HTTP client seam. The real implementation lives with the
/// transport layer; tests use closures.
pub trait AiClient: Send + Sync {
    /// Ask the configured model for a completion; returns the raw response
    /// body text.
    fn complete(
        &self,
        config: &AiGatewayConfig,
        system_prompt: &str,
        user_prompt: &str,
    ) -> GateResult<String>;
}

impl<F> AiClient for F
where
    F: Fn(&AiGatewayConfig, &str, &str) -> GateResult<String> + Send + Sync,
{
    fn complete(
        &self,
        config: &AiGatewayConfig,
        system_prompt: &str,
        user_prompt: &str,
    ) -> GateResult<String> {
        self(config, system_prompt, user_prompt)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    pub db_type: String,
    #[serde(default)]
    pub session_id: Option<String>,
    /// `off` disables history context; anything else (default) includes it
    /// when a session id is present.
    #[serde(default)]
    pub context_mode: Option<String>,
    #[serde(default)]
    pub context_limit: Option<usize>,
    #[serde(default)]
    pub schema_context: Option<String>,
}

impl GenerateRequest {
    pub fn wants_context(&self) -> bool {
        !self
            .context_mode
            .as_deref()
            .is_some_and(|mode| mode.eq_ignore_ascii_case("off"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateResponse {
    pub statements: Vec<String>,
    pub model: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

const SYSTEM_PROMPT: &str = "You are a SQL assistant. Answer with strict JSON of the form \
{\"statements\": [\"...\"]}: an array of executable SQL statements for the requested dialect, \
no trailing semicolons, no markdown fences, no commentary.";

/// Assemble the prompts for the upstream model.
pub fn build_prompts(
    request: &GenerateRequest,
    context_items: &[ContextItem],
) -> (String, String) {
    let mut user = format!("Dialect: {}\n", request.db_type);
    if let Some(schema_context) = request
        .schema_context
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    {
        user.push_str("Schema:\n");
        user.push_str(schema_context);
        user.push('\n');
    }
    if !context_items.is_empty() {
        user.push_str("Recent statements (most recent first):\n");
        for item in context_items {
            match &item.error {
                Some(error) => {
                    user.push_str(&format!("- {} -- failed: {}\n", item.sql, error));
                }
                None => {
                    user.push_str(&format!("- {}\n", item.sql));
                }
            }
        }
    }
    user.push_str("Task: ");
    user.push_str(&request.prompt);
    (SYSTEM_PROMPT.to_string(), user)
}

/// Validate the upstream reply and normalize the statements: a non-empty
/// array of non-blank strings, trimmed, trailing semicolons removed.
/// Tolerates a reply wrapped in fences or prose by extracting the outermost
/// JSON object.
pub fn parse_statements_payload(raw: &str) -> GateResult<Vec<String>> {
    let parsed: serde_json::Value = match serde_json::from_str(raw.trim()) {
        Ok(value) => value,
        Err(_) => {
            let candidate = raw
                .find('{')
                .and_then(|start| raw.rfind('}').map(|end| &raw[start..=end]));
            match candidate.and_then(|c| serde_json::from_str(c).ok()) {
                Some(value) => value,
                None => {
                    return err!(
                        ErrorCode::UpstreamError,
                        "AI gateway returned a non-JSON response"
                    );
                }
            }
        }
    };

    let Some(statements) = parsed.get("statements").and_then(|s| s.as_array()) else {
        return err!(
            ErrorCode::UpstreamError,
            "AI gateway response is missing the 'statements' array"
        );
    };
    if statements.is_empty() {
        return err!(ErrorCode::UpstreamError, "AI gateway returned no statements");
    }

    let mut normalized = Vec::with_capacity(statements.len());
    for statement in statements {
        let Some(text) = statement.as_str() else {
            return err!(
                ErrorCode::UpstreamError,
                "AI gateway returned a non-string statement"
            );
        };
        let text = text.trim().trim_end_matches(';').trim_end();
        if text.is_empty() {
            return err!(ErrorCode::UpstreamError, "AI gateway returned a blank statement");
        }
        normalized.push(text.to_string());
    }
    Ok(normalized)
}

/// Generate SQL through the configured gateway.
pub fn generate(
    config: &AiGatewayConfig,
    client: &dyn AiClient,
    request: &GenerateRequest,
    context_items: &[ContextItem],
) -> GateResult<GenerateResponse> {
    if request.prompt.trim().is_empty() {
        return err!(ErrorCode::InvalidArgument, "prompt must not be blank");
    }
    if !config.enabled() {
        return err!(
            ErrorCode::InvalidConfig,
            "AI generation is not configured: api key, virtual key and model are required"
        );
    }
    let (system_prompt, user_prompt) = build_prompts(request, context_items);
    let raw = client.complete(config, &system_prompt, &user_prompt)?;
    let statements = parse_statements_payload(&raw)?;
    Ok(GenerateResponse {
        statements,
        model: config.model.clone(),
        warnings: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_config() -> AiGatewayConfig {
        AiGatewayConfig::from_lookup(|name| match name {
            "PORTKEY_API_KEY" => Some("pk".to_string()),
            "PORTKEY_VIRTUAL_KEY" => Some("vk".to_string()),
            "PORTKEY_MODEL" => Some("test-model".to_string()),
            _ => None,
        })
    }

    #[test]
    fn test_parse_strict_payload() {
        let statements =
            parse_statements_payload(r#"{"statements": ["SELECT 1;", "  SELECT 2 "]}"#).unwrap();
        assert_eq!(statements, vec!["SELECT 1", "SELECT 2"]);
    }

    #[test]
    fn test_parse_tolerates_fences() {
        let raw = "```json\n{\"statements\": [\"SELECT a FROM t\"]}\n```";
        let statements = parse_statements_payload(raw).unwrap();
        assert_eq!(statements, vec!["SELECT a FROM t"]);
    }

    #[test]
    fn test_parse_rejects_bad_payloads() {
        for raw in [
            "no json here",
            r#"{"statements": []}"#,
            r#"{"statements": [""]}"#,
            r#"{"statements": [42]}"#,
            r#"{"other": true}"#,
        ] {
            let err = parse_statements_payload(raw).unwrap_err();
            assert_eq!(err.code, ErrorCode::UpstreamError, "payload: {raw}");
        }
    }

    #[test]
    fn test_generate_requires_config() {
        let config = AiGatewayConfig::from_lookup(|_| None);
        let client = |_: &AiGatewayConfig, _: &str, _: &str| -> GateResult<String> {
            unreachable!("client must not be called when disabled")
        };
        let request = GenerateRequest {
            prompt: "top sessions".to_string(),
            db_type: "oracle".to_string(),
            ..Default::default()
        };
        let err = generate(&config, &client, &request, &[]).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfig);
    }

    #[test]
    fn test_generate_happy_path_includes_context() {
        let config = enabled_config();
        let client = |_: &AiGatewayConfig, _system: &str, user: &str| -> GateResult<String> {
            assert!(user.contains("Dialect: oracle"));
            assert!(user.contains("Recent statements"));
            assert!(user.contains("SELECT * FROM v$session"));
            Ok(r#"{"statements": ["SELECT sid FROM v$session"]}"#.to_string())
        };
        let request = GenerateRequest {
            prompt: "list sessions".to_string(),
            db_type: "oracle".to_string(),
            session_id: Some("s1".to_string()),
            ..Default::default()
        };
        let item = ContextItem {
            sql: "SELECT * FROM v$session".to_string(),
            executed_at: chrono::Utc::now(),
            item_type: "QUERY".to_string(),
            error: None,
            columns: None,
            sample_rows: None,
            truncated: false,
            rows_affected: 1,
            duration_ms: 3,
        };
        let response = generate(&config, &client, &request, &[item]).unwrap();
        assert_eq!(response.statements, vec!["SELECT sid FROM v$session"]);
        assert_eq!(response.model, "test-model");
    }

    #[test]
    fn test_wants_context() {
        let mut request = GenerateRequest::default();
        assert!(request.wants_context());
        request.context_mode = Some("off".to_string());
        assert!(!request.wants_context());
        request.context_mode = Some("session".to_string());
        assert!(request.wants_context());
    }
}
