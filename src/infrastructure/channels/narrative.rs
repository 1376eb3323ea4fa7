//! Narrative generation through a hosted language model

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::shared::errors::GenerationError;

/// Role and style preamble sent ahead of every prompt
pub const ANALYST_PREAMBLE: &str = "\
You are a market intelligence analyst covering a single instrument.

ROLE:
- Analyse market context and explain what the data implies
- Describe risk around scheduled economic events

LIMITS:
- You do not execute orders
- Use only the data provided, never invent sources
- Never ask the user for more data

STYLE:
- Calm, firm, reasonable
- Not sensational
- Think like an institutional analyst";

/// Opaque text in, opaque text out
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: String,
}

/// Pull the generated text out of a Responses API body. Accepts the
/// `output_text` shortcut or walks `output[].content[]`.
pub fn extract_output_text(body: &Value) -> Option<String> {
    if let Some(text) = body.get("output_text").and_then(Value::as_str) {
        let text = text.trim();
        return (!text.is_empty()).then(|| text.to_string());
    }

    let text: String = body
        .get("output")?
        .as_array()?
        .iter()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter(|part| part.get("type").and_then(Value::as_str) == Some("output_text"))
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("\n");

    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Client for an OpenAI-compatible `/v1/responses` endpoint
pub struct OpenAiNarrator {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    timeout_secs: u64,
}

impl OpenAiNarrator {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>, timeout_secs: u64) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| GenerationError::Remote(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
            timeout_secs,
        })
    }
}

#[async_trait]
impl NarrativeGenerator for OpenAiNarrator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = ResponsesRequest {
            model: &self.model,
            input: format!("{}\n\n{}", ANALYST_PREAMBLE, prompt),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout(self.timeout_secs)
                } else {
                    GenerationError::Remote(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GenerationError::Remote(format!("{}: {}", status, detail.chars().take(200).collect::<String>())));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| GenerationError::Remote(format!("unreadable response: {}", e)))?;
        debug!("Narrative response received from {}", self.model);

        extract_output_text(&body).ok_or(GenerationError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_output_text_shortcut() {
        let body = json!({"output_text": "  Risk is elevated.  "});
        assert_eq!(extract_output_text(&body).as_deref(), Some("Risk is elevated."));
    }

    #[test]
    fn test_extract_output_text_from_output_items() {
        let body = json!({
            "output": [
                {"type": "reasoning", "summary": []},
                {"type": "message", "content": [
                    {"type": "output_text", "text": "Gold rallied on soft CPI."},
                    {"type": "output_text", "text": "Watch 4620."}
                ]}
            ]
        });
        assert_eq!(
            extract_output_text(&body).as_deref(),
            Some("Gold rallied on soft CPI.\nWatch 4620.")
        );
    }

    #[test]
    fn test_extract_output_text_empty() {
        assert_eq!(extract_output_text(&json!({"output": []})), None);
        assert_eq!(extract_output_text(&json!({"output_text": "   "})), None);
        assert_eq!(extract_output_text(&json!({"error": "nope"})), None);
    }

    #[test]
    fn test_request_prepends_preamble() {
        let request = ResponsesRequest {
            model: "gpt-4.1-mini",
            input: format!("{}\n\n{}", ANALYST_PREAMBLE, "DATA: x"),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json["input"].as_str().unwrap().starts_with("You are a market intelligence analyst"));
        assert!(json["input"].as_str().unwrap().ends_with("DATA: x"));
    }
}
