//! Evaluator backed by the Gemini `generateContent` REST API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::config::duration_secs;
use crate::domain::{CompetencyScore, GradingError, GradingResult};
use crate::evaluator::{prompt, retry_hint, CorrectorProfile, EvaluationRequest, Evaluator, EvaluatorError};

pub const DEFAULT_MODEL: &str = "gemini-flash-latest";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Gemini client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// API key sent as `x-goog-api-key`
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    /// Scheme and host, without the `/v1beta` path
    pub base_url: String,
    /// Per-request timeout
    #[serde(with = "duration_secs", rename = "timeout_secs")]
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl GeminiConfig {
    /// Point the client at another server (tests use a local mock).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP evaluator for Gemini models.
pub struct GeminiEvaluator {
    config: GeminiConfig,
    api_key: String,
    http_client: reqwest::Client,
}

impl GeminiEvaluator {
    pub fn new(config: GeminiConfig) -> GradingResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                GradingError::Config("no evaluator API key (set GEMINI_API_KEY)".to_string())
            })?;

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("grader/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| GradingError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            api_key,
            http_client,
        })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, self.config.model
        )
    }

    /// Send one prompt and return the first candidate's text.
    async fn generate(
        &self,
        prompt: &str,
        temperature: f32,
        json_reply: bool,
    ) -> Result<String, EvaluatorError> {
        let mut generation_config = json!({ "temperature": temperature });
        if json_reply {
            generation_config["responseMimeType"] = json!("application/json");
        }
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": generation_config,
        });

        let url = self.endpoint();
        debug!(model = %self.config.model, temperature, "generateContent request");

        let resp = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EvaluatorError::EvaluationFailed(format!("evaluator request timed out: {e}"))
                } else {
                    EvaluatorError::EvaluationFailed(format!("evaluator request failed: {e}"))
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after_header = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_error(
                status.as_u16(),
                retry_after_header.as_deref(),
                &text,
            ));
        }

        let json: serde_json::Value = resp.json().await.map_err(|e| {
            EvaluatorError::EvaluationFailed(format!("evaluator response is not JSON: {e}"))
        })?;

        json.pointer("/candidates/0/content/parts/0/text")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                let reason = json
                    .pointer("/candidates/0/finishReason")
                    .and_then(|v| v.as_str())
                    .unwrap_or("no candidates");
                EvaluatorError::EvaluationFailed(format!(
                    "evaluator response missing text ({reason})"
                ))
            })
    }
}

/// Map a non-success response to an evaluator error.
pub(crate) fn classify_error(status: u16, retry_after: Option<&str>, body: &str) -> EvaluatorError {
    let exhausted = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/status")
                .and_then(|s| s.as_str())
                .map(|s| s == "RESOURCE_EXHAUSTED")
        })
        .unwrap_or(false);

    if status == 429 || exhausted {
        let retry_after = retry_hint::extract(retry_after, body);
        warn!(status, retry_after = ?retry_after, "evaluator quota exceeded");
        return EvaluatorError::QuotaExceeded { retry_after };
    }

    let snippet: String = body.chars().take(500).collect();
    EvaluatorError::EvaluationFailed(format!("evaluator returned HTTP {status}: {snippet}"))
}

#[async_trait]
impl Evaluator for GeminiEvaluator {
    async fn evaluate(
        &self,
        request: &EvaluationRequest<'_>,
    ) -> Result<CompetencyScore, EvaluatorError> {
        let text = prompt::competency_prompt(request.dimension, request.text, request.topic);
        let reply = self
            .generate(&text, request.profile.temperature, true)
            .await?;
        prompt::parse_competency_reply(&reply, request.dimension.competency)
    }

    async fn summarize(
        &self,
        profile: &CorrectorProfile,
        scores: &[CompetencyScore],
    ) -> Result<String, EvaluatorError> {
        let text = prompt::summary_prompt(scores)?;
        let reply = self.generate(&text, profile.temperature, false).await?;
        Ok(reply.trim().to_string())
    }
}
