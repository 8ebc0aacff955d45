//! Generation client for the Gemini `generateContent` API.
//!
//! Sends the user query, system prompt and response schema, then pulls the
//! structured text out of `candidates[0].content.parts[0].text`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::PlanGenerator;
use crate::config::{GenerationConfig, RetryPolicy};
use crate::error::PlanError;
use crate::plan::{ProjectPlan, parse_plan_json};

/// Gemini generation client with bounded retries.
pub struct GeminiClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl GeminiClient {
    pub fn new(config: &GenerationConfig, retry: &RetryPolicy) -> Result<Self, PlanError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            retry: retry.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn build_request_body(query: &str, system_prompt: &str, schema: &Value) -> Value {
        json!({
            "contents": [{"parts": [{"text": query}]}],
            "systemInstruction": {"parts": [{"text": system_prompt}]},
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema,
            },
        })
    }

    /// Call the endpoint, retrying per the configured policy, and return the
    /// raw structured text.
    pub async fn generate_text(
        &self,
        query: &str,
        system_prompt: &str,
        schema: &Value,
    ) -> Result<String, PlanError> {
        let body = Self::build_request_body(query, system_prompt, schema);
        let max_attempts = self.retry.attempts();

        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.send_once(&body).await {
                Ok(text) => {
                    debug!(attempt, "generate_text: success");
                    return Ok(text);
                }
                Err(e) => e,
            };

            if !err.is_retryable(self.retry.retry_client_errors) {
                warn!(attempt, error = %err, "generate_text: non-retryable failure");
                return Err(err);
            }
            if attempt >= max_attempts {
                warn!(attempt, error = %err, "generate_text: retries exhausted");
                return Err(PlanError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = self.retry.delay_after(attempt);
            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "generate_text: retrying after failure"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn send_once(&self, body: &Value) -> Result<String, PlanError> {
        let mut request = self.http.post(self.endpoint()).json(body);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key)]);
        }

        let response = request.send().await?;
        let status = response.status();
        let raw = response.text().await?;

        if !status.is_success() {
            return Err(PlanError::Api {
                status: status.as_u16(),
                body: raw,
            });
        }

        extract_text(&raw)
    }
}

#[async_trait]
impl PlanGenerator for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(
        &self,
        query: &str,
        system_prompt: &str,
        schema: &Value,
    ) -> Result<ProjectPlan, PlanError> {
        let text = self.generate_text(query, system_prompt, schema).await?;
        let plan = parse_plan_json(&text)?;
        debug!(
            project = %plan.project_name,
            groups = plan.groups.len(),
            "generate: plan parsed"
        );
        Ok(plan)
    }
}

// ---------------------------------------------------------------------------
// Response envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

/// Pull the first candidate's first text part out of a response body.
///
/// Any deviation from the expected envelope is a
/// [`PlanError::ResponseShape`] carrying the raw body.
fn extract_text(raw: &str) -> Result<String, PlanError> {
    let envelope: GenerateContentResponse =
        serde_json::from_str(raw).map_err(|_| PlanError::ResponseShape(raw.to_owned()))?;

    envelope
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| PlanError::ResponseShape(raw.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_matches_wire_format() {
        let schema = json!({"type": "OBJECT"});
        let body = GeminiClient::build_request_body("Build a shed", "be brief", &schema);
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Build a shed");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(body["generationConfig"]["responseSchema"], schema);
    }

    #[test]
    fn endpoint_includes_model() {
        let config = GenerationConfig {
            base_url: "http://localhost:9999/v1beta/".into(),
            model: "gemini-test".into(),
            ..GenerationConfig::default()
        };
        let client = GeminiClient::new(&config, &RetryPolicy::default()).unwrap();
        assert_eq!(
            client.endpoint(),
            "http://localhost:9999/v1beta/models/gemini-test:generateContent"
        );
    }

    #[test]
    fn extract_text_happy_path() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":1}"}]}}]}"#;
        assert_eq!(extract_text(raw).unwrap(), r#"{"a":1}"#);
    }

    #[test]
    fn extract_text_missing_text_embeds_body() {
        let raw = r#"{"candidates":[{"content":{"parts":[{}]}}]}"#;
        let err = extract_text(raw).unwrap_err();
        assert!(matches!(err, PlanError::ResponseShape(ref body) if body == raw));
        assert!(err.to_string().starts_with("invalid response structure"));
    }

    #[test]
    fn extract_text_no_candidates() {
        let err = extract_text(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap_err();
        assert!(matches!(err, PlanError::ResponseShape(_)));
    }

    #[test]
    fn extract_text_non_json_body() {
        let err = extract_text("<html>gateway</html>").unwrap_err();
        assert!(matches!(err, PlanError::ResponseShape(_)));
    }
}
