//! Upstream provider definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use validator::Validate;

/// Upstream API family. Selects the protocol adapter for a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderFamily {
    /// OpenAI chat-completions compatible
    OpenAI,
    /// Anthropic messages API
    Anthropic,
    /// Google Gemini generateContent API
    Gemini,
    /// DeepSeek (OpenAI-compatible wire format, bearer auth)
    DeepSeek,
}

impl fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderFamily::OpenAI => write!(f, "openai"),
            ProviderFamily::Anthropic => write!(f, "anthropic"),
            ProviderFamily::Gemini => write!(f, "gemini"),
            ProviderFamily::DeepSeek => write!(f, "deepseek"),
        }
    }
}

/// A registered upstream provider. Immutable after registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Provider {
    #[validate(length(min = 1))]
    pub id: String,
    pub name: String,
    pub family: ProviderFamily,
    /// Base URL; a channel endpoint override replaces it
    #[validate(url)]
    pub base_url: String,
    /// Models this provider serves
    #[serde(default)]
    pub models: BTreeSet<String>,
}

impl Provider {
    pub fn supports_model(&self, model: &str) -> bool {
        self.models.contains(model)
    }
}
