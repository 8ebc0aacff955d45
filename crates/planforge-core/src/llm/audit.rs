//! Audit client for an OpenAI-compatible chat completion API.
//!
//! The auditor is asked for JSON only, but models still wrap answers in
//! markdown fences or commentary. [`extract_json_object`] recovers the object
//! by brace scanning. It is a heuristic, not a parser. Anything it cannot
//! recover ends in the fallback verdict.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::PlanAuditor;
use crate::config::AuditConfig;
use crate::error::PlanError;
use crate::plan::prompt::AUDITOR_SYSTEM_PROMPT;
use crate::plan::{AuditResult, ProjectPlan, build_audit_prompt};

/// Fail-open audit client.
pub struct ChatAuditClient {
    http: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    fallback_score: u8,
}

impl ChatAuditClient {
    pub fn new(config: &AuditConfig) -> Result<Self, PlanError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            fallback_score: config.fallback_score,
        })
    }

    fn build_request_body(&self, prompt: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": AUDITOR_SYSTEM_PROMPT},
                {"role": "user", "content": prompt},
            ],
            "temperature": self.temperature,
            "response_format": {"type": "json_object"},
        })
    }

    /// The fallible half of [`PlanAuditor::audit`].
    pub async fn request_verdict(
        &self,
        plan: &ProjectPlan,
        strategy: &str,
    ) -> Result<AuditResult, PlanError> {
        let plan_json =
            serde_json::to_string_pretty(plan).map_err(|e| PlanError::Parse(e.to_string()))?;
        let body = self.build_request_body(&build_audit_prompt(&plan_json, strategy));

        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
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

        let completion: ChatCompletion =
            serde_json::from_str(&raw).map_err(|_| PlanError::ResponseShape(raw.clone()))?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| PlanError::ResponseShape(raw.clone()))?;

        parse_verdict(&content)
    }
}

#[async_trait]
impl PlanAuditor for ChatAuditClient {
    fn name(&self) -> &str {
        "chat-audit"
    }

    async fn audit(&self, plan: &ProjectPlan, strategy: &str) -> AuditResult {
        match self.request_verdict(plan, strategy).await {
            Ok(verdict) => {
                debug!(score = verdict.confidence_score, "audit: verdict received");
                verdict
            }
            Err(e) => {
                warn!(
                    error = %e,
                    fallback_score = self.fallback_score,
                    "audit: auditor unavailable, using fallback verdict"
                );
                AuditResult::fallback(self.fallback_score)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Verdict as the model writes it. Scores sometimes come back as floats.
#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(alias = "confidenceScore")]
    confidence_score: f64,
    #[serde(default)]
    feedback: String,
    #[serde(default, alias = "specificIssues")]
    specific_issues: Vec<String>,
}

/// Slice from the first `{` to the last `}`.
///
/// Returns `None` when either brace is missing or they are out of order.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse auditor output into an [`AuditResult`].
///
/// Scores are rounded and clamped into 0..=100.
pub fn parse_verdict(text: &str) -> Result<AuditResult, PlanError> {
    let object = extract_json_object(text)
        .ok_or_else(|| PlanError::Parse("no JSON object in auditor output".to_owned()))?;
    let raw: RawVerdict =
        serde_json::from_str(object).map_err(|e| PlanError::Parse(e.to_string()))?;

    if !raw.confidence_score.is_finite() {
        return Err(PlanError::Parse(format!(
            "confidence_score is not a finite number: {}",
            raw.confidence_score
        )));
    }

    Ok(AuditResult {
        confidence_score: raw.confidence_score.round().clamp(0.0, 100.0) as u8,
        feedback: raw.feedback,
        specific_issues: raw.specific_issues,
    })
}
