//! Language-inference gateway client
//!
//! Sends free text to an OpenAI-compatible chat completion endpoint and gets
//! back a comma-separated list of title names, always in English.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::models::CategoryFilter;

/// Inference gateway error types
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Gateway returned HTTP {0}")]
    Http(u16),

    #[error("Gateway reported an error: {0}")]
    Gateway(String),

    #[error("Response had no choices")]
    EmptyResponse,
}

/// Chat completion client used by smart search
#[derive(Clone)]
pub struct InferenceClient {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

impl InferenceClient {
    pub const DEFAULT_MODEL: &'static str = "gpt-4o-mini";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, "https://api.openai.com/v1")
    }

    /// Create with custom base URL (for testing)
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: Self::DEFAULT_MODEL.to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Ask for candidate title names matching the free-text query
    pub async fn infer(&self, prompt: &str, filter: CategoryFilter) -> Result<Vec<String>> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt(filter),
                },
                ChatMessage {
                    role: "user",
                    content: prompt.to_string(),
                },
            ],
            temperature: 0.75,
            max_tokens: 800,
        };

        debug!(model = %self.model, "inference request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to reach inference gateway")?;

        let status = response.status();
        let body: ChatResponse = response
            .json()
            .await
            .context("Failed to parse inference response")?;

        if let Some(error) = body.error {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(InferenceError::Gateway(message).into());
        }
        if !status.is_success() {
            return Err(InferenceError::Http(status.as_u16()).into());
        }

        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(InferenceError::EmptyResponse)?;

        Ok(split_candidates(&content))
    }
}

/// Instruction given to the model for the requested category
pub fn system_prompt(filter: CategoryFilter) -> String {
    format!(
        "Provide only the names of {} as they are listed on TMDB, separated by commas, \
         with no numbering or extra information. If the user types their query in Hebrew, \
         return the results in English separated by commas!.",
        filter.prompt_noun()
    )
}

/// Split a comma-separated answer into trimmed, non-empty names
pub fn split_candidates(content: &str) -> Vec<String> {
    content
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
