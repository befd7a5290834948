//! `OpenAI` chat completions client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{ChatModel, ReplyClient};
use crate::conversation::MessageHistory;
use crate::voice::stt::OPENAI_API_BASE;
use crate::{Error, Result};

/// Reply client backed by `/v1/chat/completions`
pub struct OpenAiChat {
    client: Client,
    api_key: SecretString,
    base_url: String,
}

impl OpenAiChat {
    /// Create a new chat client
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(api_key: SecretString, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: OPENAI_API_BASE.to_string(),
        })
    }

    /// Point at a different API base (proxies, tests)
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl ReplyClient for OpenAiChat {
    async fn reply(&self, history: &MessageHistory, model: ChatModel) -> Result<String> {
        let request = ChatCompletionRequest {
            model: model.as_str(),
            messages: history
                .iter()
                .map(|m| Message {
                    role: m.role.as_str(),
                    content: &m.text,
                })
                .collect(),
        };

        tracing::debug!(%model, messages = request.messages.len(), "requesting reply");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Reply(format!("OpenAI request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat API error");
            return Err(Error::Reply(format!("OpenAI API error: {status} - {body}")));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Reply(format!("Failed to parse OpenAI response: {e}")))?;

        let text = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Reply("response contained no reply".to_string()))?;

        tracing::info!(%model, reply_len = text.len(), "reply received");
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "openai-chat"
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
