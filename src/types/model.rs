use crate::error::RelayError;
use std::fmt;
use std::str::FromStr;

/// Providers the relay knows how to reach. Declaration order is display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModelId {
    Gpt,
    DeepSeek,
    Gemini,
}

impl ModelId {
    pub const ALL: [ModelId; 3] = [ModelId::Gpt, ModelId::DeepSeek, ModelId::Gemini];

    /// Path segment used in `/api/{slug}`.
    pub fn slug(self) -> &'static str {
        match self {
            ModelId::Gpt => "gpt",
            ModelId::DeepSeek => "deepseek",
            ModelId::Gemini => "gemini",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ModelId::Gpt => "GPT",
            ModelId::DeepSeek => "DeepSeek",
            ModelId::Gemini => "Gemini",
        }
    }

    pub fn endpoint(self) -> String {
        format!("/api/{}", self.slug())
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ModelId {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        ModelId::ALL
            .into_iter()
            .find(|model| model.slug() == normalized)
            .ok_or_else(|| RelayError::UnknownModel(s.trim().to_string()))
    }
}
