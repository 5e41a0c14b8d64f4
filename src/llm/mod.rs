//! Provider boundary: a single synchronous text-generation capability.

use serde::{Deserialize, Serialize};
use std::fmt;

mod openai;

pub use openai::OpenAiProvider;

/// Chat role. The generation loop only ever speaks as `system` or `user`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One message in the conversation sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Failures at the provider boundary. These are transport-level problems a
/// corrective prompt cannot fix, so the generation loop never retries them.
#[derive(Debug)]
pub enum ProviderError {
    MissingApiKey,
    Network(String),
    AuthFailed,
    RateLimited,
    Api { status: u16, body: String },
    MalformedResponse(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProviderError::MissingApiKey => {
                write!(f, "OPENAI_API_KEY is required for the openai provider")
            }
            ProviderError::Network(details) => {
                write!(f, "network error calling the provider API: {details}")
            }
            ProviderError::AuthFailed => {
                write!(f, "provider API authentication failed; check OPENAI_API_KEY")
            }
            ProviderError::RateLimited => {
                write!(f, "provider API rate limit hit; try again later")
            }
            ProviderError::Api { status, body } => {
                write!(f, "provider API error {status}: {body}")
            }
            ProviderError::MalformedResponse(details) => {
                write!(f, "invalid response format from the provider API: {details}")
            }
        }
    }
}

impl std::error::Error for ProviderError {}

/// Synchronous text generation over an ordered message sequence.
///
/// Exactly one method so tests can substitute a scripted double and exercise
/// the retry and validation logic without a network.
pub trait LlmProvider {
    fn generate(
        &self,
        messages: &[Message],
        model: &str,
        temperature: f32,
    ) -> Result<String, ProviderError>;

    /// Short provider name recorded in the audit log.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_roles_serialize_lowercase() {
        let serialized = serde_json::to_string(&Message::system("hi")).unwrap();
        assert!(serialized.contains(r#""role":"system""#));
        let serialized = serde_json::to_string(&Message::user("hi")).unwrap();
        assert!(serialized.contains(r#""role":"user""#));
    }
}
