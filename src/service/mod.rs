//! Boundary to the external generative image service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "4:3")]
    Standard,
    #[serde(rename = "3:4")]
    StandardPortrait,
}

impl AspectRatio {
    pub const fn ratio(self) -> (u32, u32) {
        match self {
            Self::Square => (1, 1),
            Self::Landscape => (16, 9),
            Self::Portrait => (9, 16),
            Self::Standard => (4, 3),
            Self::StandardPortrait => (3, 4),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
            Self::Standard => "4:3",
            Self::StandardPortrait => "3:4",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    #[default]
    Standard,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("image service failed: {message}")]
pub struct ServiceError {
    pub message: String,
}

impl ServiceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Generates, edits and describes images. `edit` and `analyze` receive the
/// flattened composition encoded as PNG.
#[async_trait]
pub trait ImageService: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        aspect: AspectRatio,
        quality: QualityTier,
    ) -> Result<Vec<u8>, ServiceError>;

    async fn edit(&self, image: &[u8], instruction: &str) -> Result<Vec<u8>, ServiceError>;

    async fn analyze(&self, image: &[u8], prompt: &str) -> Result<String, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_ratio_serializes_as_ratio_label() {
        let json = serde_json::to_string(&AspectRatio::Landscape).expect("serialize");
        assert_eq!(json, "\"16:9\"");
        let parsed: AspectRatio = serde_json::from_str("\"3:4\"").expect("parse");
        assert_eq!(parsed, AspectRatio::StandardPortrait);
        assert_eq!(parsed.ratio(), (3, 4));
        assert_eq!(parsed.label(), "3:4");
    }

    #[test]
    fn quality_tier_uses_lowercase_names() {
        let parsed: QualityTier = serde_json::from_str("\"high\"").expect("parse");
        assert_eq!(parsed, QualityTier::High);
        assert_eq!(QualityTier::default(), QualityTier::Standard);
    }
}
