// OpenAI-compatible GenerationClient

use crate::prompts;
use async_trait::async_trait;
use quillforge_core::domain::{GenerationStep, JobSettings, TokenPricing};
use quillforge_core::port::{Generated, GenerationClient, GenerationContext, GenerationError};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default per-request timeout (a long body can take a while)
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Connection settings for the generation API
#[derive(Debug, Clone)]
pub struct GenerationApiConfig {
    /// e.g. `https://api.openai.com/v1`
    pub base_url: String,
    pub api_key: String,
    /// Used when a job's settings name no model
    pub default_model: String,
    pub request_timeout: Duration,
}

impl GenerationApiConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            default_model: "gpt-4o-mini".to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn system(content: String) -> Self {
        Self {
            role: "system".to_string(),
            content,
        }
    }

    fn user(content: String) -> Self {
        Self {
            role: "user".to_string(),
            content,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// First choice's text, or `None` when the API returned nothing usable
fn first_choice_text(body: &str) -> Result<Option<String>, GenerationError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;
    Ok(response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|t| !t.trim().is_empty()))
}

/// Chat-completions client; cost is priced from the output, not the API usage block
pub struct HttpGenerationClient {
    http: reqwest::Client,
    config: GenerationApiConfig,
    pricing: TokenPricing,
}

impl HttpGenerationClient {
    pub fn new(
        config: GenerationApiConfig,
        pricing: TokenPricing,
    ) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GenerationError::Request(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            http,
            config,
            pricing,
        })
    }

    fn model<'a>(&'a self, settings: &'a JobSettings) -> &'a str {
        if settings.model.trim().is_empty() {
            &self.config.default_model
        } else {
            &settings.model
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn generate(
        &self,
        step: GenerationStep,
        context: &GenerationContext,
        settings: &JobSettings,
    ) -> Result<Generated, GenerationError> {
        let start = Instant::now();
        let model = self.model(settings);
        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage::system(prompts::system_prompt(settings)),
                ChatMessage::user(prompts::user_prompt(step, context, settings)),
            ],
            temperature: 0.7,
            max_tokens: prompts::max_tokens(step, settings),
        };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(step = %step, error = %e, "Generation request failed");
                GenerationError::Request(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GenerationError::RateLimited(body));
        }
        if !status.is_success() {
            warn!(step = %step, status = %status, "Generation API error");
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let raw = first_choice_text(&body)?.ok_or(GenerationError::EmptyResponse(step))?;
        let text = prompts::clean_output(step, &raw);
        let tokens_used = self.pricing.cost(step, model, &text);

        debug!(
            step = %step,
            model = %model,
            tokens = tokens_used,
            duration_ms = start.elapsed().as_millis() as u64,
            "Generation step completed"
        );

        Ok(Generated { text, tokens_used })
    }
}
