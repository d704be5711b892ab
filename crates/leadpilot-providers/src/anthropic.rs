//! Anthropic Messages API client.
//!
//! One user turn per call, optional system prompt, the first text block of
//! the reply is returned. [`parse_json_reply`] handles models that wrap JSON
//! in a fenced code block.

use std::sync::LazyLock;

use async_trait::async_trait;
use leadpilot_core::config::AnthropicConfig;
use leadpilot_core::error::{LeadPilotError, ProviderKind, Result};
use leadpilot_core::traits::LanguageModel;
use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::http::{build_client, check_status, read_json, transport_error};

const PROVIDER: ProviderKind = ProviderKind::Anthropic;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").expect("fenced block pattern is valid")
});

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

pub struct AnthropicClient {
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    api_version: String,
    client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(config: &AnthropicConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            api_version: config.api_version.clone(),
            client: build_client(PROVIDER)?,
        })
    }

    pub async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(LeadPilotError::Config(
                "Missing ANTHROPIC_API_KEY / anthropic.api_key".into(),
            ));
        }

        let mut body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [{ "role": "user", "content": prompt }],
        });
        if let Some(system) = system {
            body["system"] = json!(system);
        }

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        let resp = check_status(PROVIDER, resp).await?;
        let reply: MessagesResponse = read_json(PROVIDER, resp).await?;

        reply
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| {
                LeadPilotError::provider(PROVIDER, 200, "No text content in Claude response")
            })
    }
}

/// Decode a model reply as JSON, preferring the first fenced block if any.
pub fn parse_json_reply<T: DeserializeOwned>(text: &str) -> Result<T> {
    let candidate = FENCED_BLOCK
        .captures(text)
        .and_then(|c| c.get(1))
        .map_or(text, |m| m.as_str());
    serde_json::from_str(candidate.trim()).map_err(|e| {
        tracing::warn!("⚠️ Claude response was not valid JSON: {e}");
        LeadPilotError::provider(PROVIDER, 200, "Claude response was not valid JSON")
    })
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<String> {
        AnthropicClient::complete(self, prompt, system).await
    }
}
