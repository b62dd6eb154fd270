//! LLM integration for workout planning
//!
//! This module handles communication with the Claude API. The planner hands
//! it a serialized planning context and gets raw text back; nothing here
//! trusts or interprets that text beyond locating the JSON in it.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// ---------------------------------------------------------------------------
/// Configuration
/// ---------------------------------------------------------------------------

const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
const CLAUDE_MODEL: &str = "claude-sonnet-4-20250514";
const API_VERSION: &str = "2023-06-01";
const PLAN_MAX_TOKENS: u32 = 1500;

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum LlmError {
  #[error("API key not configured")]
  MissingApiKey,

  #[error("Request failed: {0}")]
  Request(String),

  #[error("API error: {0}")]
  Api(String),

  #[error("Parse error: {0}")]
  Parse(String),
}

/// ---------------------------------------------------------------------------
/// Collaborator Contract
/// ---------------------------------------------------------------------------

#[async_trait]
pub trait PlanGenerator: Send + Sync {
  /// Raw, untrusted day-plan text for `date`
  async fn generate(&self, context_json: &str, date: NaiveDate) -> Result<String, LlmError>;
}

/// ---------------------------------------------------------------------------
/// Claude API Types
/// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ClaudeRequest {
  model: String,
  max_tokens: u32,
  system: String,
  messages: Vec<ClaudeMessage>,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage {
  role: String,
  content: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
  content: Vec<ContentBlock>,
  usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
  #[serde(rename = "type")]
  content_type: String,
  text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
  pub input_tokens: u32,
  pub output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ClaudeErrorResponse {
  error: ClaudeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ClaudeErrorDetail {
  message: String,
}

/// ---------------------------------------------------------------------------
/// Claude Client
/// ---------------------------------------------------------------------------

pub struct ClaudeClient {
  client: Client,
  api_key: String,
  api_url: String,
}

impl ClaudeClient {
  pub fn new(api_key: &str) -> Self {
    Self {
      client: Client::new(),
      api_key: api_key.to_string(),
      api_url: CLAUDE_API_URL.to_string(),
    }
  }

  /// Create a new Claude client, loading API key from environment
  pub fn from_env() -> Result<Self, LlmError> {
    let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| LlmError::MissingApiKey)?;
    Ok(Self::new(&api_key))
  }

  pub fn with_api_url(mut self, api_url: &str) -> Self {
    self.api_url = api_url.to_string();
    self
  }

  /// Call Claude with a system prompt and user message
  pub async fn complete(
    &self,
    system_prompt: &str,
    user_message: &str,
    max_tokens: u32,
  ) -> Result<(String, Usage), LlmError> {
    let request = ClaudeRequest {
      model: CLAUDE_MODEL.to_string(),
      max_tokens,
      system: system_prompt.to_string(),
      messages: vec![ClaudeMessage {
        role: "user".to_string(),
        content: user_message.to_string(),
      }],
    };

    let response = self
      .client
      .post(&self.api_url)
      .header("x-api-key", &self.api_key)
      .header("anthropic-version", API_VERSION)
      .header("content-type", "application/json")
      .json(&request)
      .send()
      .await
      .map_err(|e| LlmError::Request(e.to_string()))?;

    let status = response.status();
    let body = response
      .text()
      .await
      .map_err(|e| LlmError::Request(e.to_string()))?;

    if !status.is_success() {
      // Try to parse error response
      if let Ok(error_resp) = serde_json::from_str::<ClaudeErrorResponse>(&body) {
        return Err(LlmError::Api(error_resp.error.message));
      }
      return Err(LlmError::Api(format!("HTTP {}: {}", status, body)));
    }

    let claude_response: ClaudeResponse =
      serde_json::from_str(&body).map_err(|e| LlmError::Parse(e.to_string()))?;

    // Extract text from the first text content block
    let text = claude_response
      .content
      .iter()
      .find(|c| c.content_type == "text")
      .and_then(|c| c.text.clone())
      .ok_or_else(|| LlmError::Parse("No text content in response".to_string()))?;

    Ok((text, claude_response.usage))
  }
}

#[async_trait]
impl PlanGenerator for ClaudeClient {
  async fn generate(&self, context_json: &str, date: NaiveDate) -> Result<String, LlmError> {
    let system_prompt = include_str!("prompts/planner_system.txt");

    let user_message = format!(
      r#"Plan a workout for {} ({}).

PLANNING CONTEXT:
{}

Respond with valid JSON matching the OUTPUT FORMAT specified in your instructions."#,
      date,
      date.format("%A"),
      context_json
    );

    let (text, usage) = self.complete(system_prompt, &user_message, PLAN_MAX_TOKENS).await?;
    tracing::debug!(
      %date,
      input_tokens = usage.input_tokens,
      output_tokens = usage.output_tokens,
      "Plan generated"
    );
    Ok(text)
  }
}

/// Extract JSON from Claude's response (handles markdown code blocks)
pub(crate) fn extract_json(text: &str) -> Result<String, LlmError> {
  // Try direct parse first
  if text.trim().starts_with('{') {
    return Ok(text.trim().to_string());
  }

  // Look for JSON in code blocks
  if let Some(start) = text.find("```json") {
    let start = start + 7;
    if let Some(end) = text[start..].find("```") {
      return Ok(text[start..start + end].trim().to_string());
    }
  }

  // Look for plain code blocks
  if let Some(start) = text.find("```") {
    let start = start + 3;
    // Skip language identifier if present
    let content_start = text[start..]
      .find('\n')
      .map(|i| start + i + 1)
      .unwrap_or(start);
    if let Some(end) = text[content_start..].find("```") {
      return Ok(text[content_start..content_start + end].trim().to_string());
    }
  }

  // Last resort: find first { to last }
  if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
    if start < end {
      return Ok(text[start..=end].to_string());
    }
  }

  Err(LlmError::Parse("Could not extract JSON from response".to_string()))
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_extract_json_direct() {
    let input = r#"{"should_schedule": true, "option_a": {}}"#;
    let result = extract_json(input).unwrap();
    assert!(result.contains("should_schedule"));
  }

  #[test]
  fn test_extract_json_code_block() {
    let input = r#"Here's the plan:

```json
{"should_schedule": false, "reason_if_skip": "Rest day"}
```

Hope that helps!"#;
    let result = extract_json(input).unwrap();
    assert!(result.contains("Rest day"));
  }

  #[test]
  fn test_extract_json_fallback() {
    let input = r#"The plan is {"option_a": {"type": "Run"}} as shown."#;
    let result = extract_json(input).unwrap();
    assert!(result.starts_with('{') && result.ends_with('}'));
  }

  #[test]
  fn test_extract_json_rejects_braceless_text() {
    assert!(extract_json("No plan today } {").is_err());
  }

  #[tokio::test]
  async fn test_generate_returns_text_block() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("POST", "/v1/messages")
      .match_header("x-api-key", "test-key")
      .match_body(mockito::Matcher::Regex("Plan a workout for 2026-01-06 \\(Tuesday\\)".into()))
      .with_status(200)
      .with_body(
        json!({
          "content": [{ "type": "text", "text": "{\"should_schedule\": true}" }],
          "model": "claude",
          "stop_reason": "end_turn",
          "usage": { "input_tokens": 900, "output_tokens": 200 }
        })
        .to_string(),
      )
      .create_async()
      .await;

    let client = ClaudeClient::new("test-key").with_api_url(&format!("{}/v1/messages", server.url()));
    let text = client
      .generate("{}", NaiveDate::from_ymd_opt(2026, 1, 6).unwrap())
      .await
      .unwrap();

    mock.assert_async().await;
    assert_eq!(text, "{\"should_schedule\": true}");
  }

  #[tokio::test]
  async fn test_api_error_message_is_surfaced() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("POST", "/v1/messages")
      .with_status(529)
      .with_body(json!({ "error": { "type": "overloaded_error", "message": "Overloaded" } }).to_string())
      .create_async()
      .await;

    let client = ClaudeClient::new("test-key").with_api_url(&format!("{}/v1/messages", server.url()));
    let result = client.generate("{}", NaiveDate::from_ymd_opt(2026, 1, 6).unwrap()).await;

    assert!(matches!(result, Err(LlmError::Api(msg)) if msg == "Overloaded"));
  }
}
