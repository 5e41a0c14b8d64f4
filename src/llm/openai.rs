//! OpenAI-style chat completions provider over blocking HTTP.

use serde_json::json;
use std::env;
use std::time::Duration;

use super::{LlmProvider, Message, ProviderError};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct OpenAiProvider {
    api_key: String,
    base_url: String,
    client: reqwest::blocking::Client,
}

impl OpenAiProvider {
    /// Builds a provider from `OPENAI_API_KEY` and optional `OPENAI_BASE_URL`.
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or(ProviderError::MissingApiKey)?;
        let base_url = env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            api_key,
            base_url,
            client,
        })
    }
}

impl LlmProvider for OpenAiProvider {
    fn generate(
        &self,
        messages: &[Message],
        model: &str,
        temperature: f32,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let payload = json!({
            "model": model,
            "messages": messages,
            "temperature": temperature,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        match status {
            401 => return Err(ProviderError::AuthFailed),
            429 => return Err(ProviderError::RateLimited),
            s if s >= 400 => {
                let body = response.text().unwrap_or_default();
                return Err(ProviderError::Api { status, body });
            }
            _ => {}
        }

        let data: serde_json::Value = response
            .json()
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        data["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                ProviderError::MalformedResponse(
                    "missing choices[0].message.content".to_string(),
                )
            })
    }

    fn name(&self) -> &str {
        "openai"
    }
}
