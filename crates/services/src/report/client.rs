use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::prompt::ReportPrompt;
use crate::config::ReportConfig;
use crate::error::ReportError;

/// A text-completion backend that turns a prompt into report text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Model identifier recorded alongside stored reports, if known.
    fn model(&self) -> Option<String>;

    /// # Errors
    ///
    /// Returns `ReportError` when the backend is unavailable, rejects the
    /// request, or answers with no text.
    async fn complete(&self, prompt: &ReportPrompt) -> Result<String, ReportError>;
}

/// OpenAI-compatible `/chat/completions` client.
#[derive(Clone)]
pub struct ChatCompletionClient {
    client: Client,
    config: Option<ReportConfig>,
}

impl ChatCompletionClient {
    #[must_use]
    pub fn new(config: Option<ReportConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }
}

#[async_trait]
impl CompletionClient for ChatCompletionClient {
    fn model(&self) -> Option<String> {
        self.config.as_ref().map(|c| c.model.clone())
    }

    async fn complete(&self, prompt: &ReportPrompt) -> Result<String, ReportError> {
        let config = self.config.as_ref().ok_or(ReportError::Disabled)?;

        let url = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        let payload = ChatRequest {
            model: config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompt.system.clone(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt.user.clone(),
                },
            ],
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .header("X-Title", "Audit Management System")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ReportError::HttpStatus(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        extract_content(body)
    }
}

fn extract_content(body: ChatResponse) -> Result<String, ReportError> {
    body.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(ReportError::EmptyResponse)
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}
