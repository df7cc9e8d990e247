//! OpenRouter chat-completions client and the collaborators built on it.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use reviewforge_shared::{
    AnalysisResult, AppConfig, DiscoveredItem, OpenRouterConfig, Result, ReviewForgeError,
    resolve_api_key,
};

use crate::collaborators::{Analyzer, CallContext, Discoverer, Reviser, Synthesizer};
use crate::prompts;

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("reviewforge/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    /// Per-run session name, so the provider never merges separate runs.
    user: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// OpenRouterClient
// ---------------------------------------------------------------------------

/// Minimal client for OpenRouter's `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenRouterClient {
    pub fn new(config: &OpenRouterConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ReviewForgeError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: config.default_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// Build a client from the app config, reading the key from the environment.
    pub fn from_app_config(config: &AppConfig) -> Result<Self> {
        let api_key = resolve_api_key(config)?;
        Self::new(&config.openrouter, api_key)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one system + user exchange and return the reply text.
    #[instrument(skip_all, fields(session = %ctx.session, model = %self.model))]
    pub async fn complete(&self, ctx: &CallContext, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            user: &ctx.session,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("X-Title", "reviewforge")
            .json(&request)
            .send()
            .await
            .map_err(|e| ReviewForgeError::Network(format!("request to {} failed: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReviewForgeError::Network(format!(
                "OpenRouter returned HTTP {status}: {}",
                body.trim()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ReviewForgeError::parse(format!("invalid completion response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ReviewForgeError::Collaborator("completion had no content".into()))?;

        debug!(chars = content.len(), "completion received");
        Ok(content)
    }
}

// ---------------------------------------------------------------------------
// LlmCollaborators
// ---------------------------------------------------------------------------

/// Every collaborator role served by one model via role prompts.
#[derive(Debug, Clone)]
pub struct LlmCollaborators {
    client: OpenRouterClient,
}

impl LlmCollaborators {
    pub fn new(client: OpenRouterClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Discoverer for LlmCollaborators {
    async fn discover(&self, ctx: &CallContext, topic: &str, limit: usize) -> Result<String> {
        self.client
            .complete(ctx, prompts::DISCOVERY_SYSTEM, &prompts::discovery_request(topic, limit))
            .await
    }
}

#[async_trait]
impl Analyzer for LlmCollaborators {
    async fn analyze_one(&self, ctx: &CallContext, item: &DiscoveredItem) -> Result<String> {
        self.client
            .complete(ctx, prompts::ANALYSIS_SYSTEM, &prompts::analysis_request(item))
            .await
    }
}

#[async_trait]
impl Synthesizer for LlmCollaborators {
    async fn synthesize(
        &self,
        ctx: &CallContext,
        topic: &str,
        analyses: &[AnalysisResult],
    ) -> Result<String> {
        self.client
            .complete(ctx, prompts::SYNTHESIS_SYSTEM, &prompts::synthesis_request(topic, analyses))
            .await
    }
}

#[async_trait]
impl Reviser for LlmCollaborators {
    async fn revise(&self, ctx: &CallContext, draft: &str, directives: &[String]) -> Result<String> {
        self.client
            .complete(ctx, prompts::REVISION_SYSTEM, &prompts::revision_request(draft, directives))
            .await
    }
}
