//! Typed view over a bundle's config blob.

use crate::error::{MapleError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Model metadata stored in the config blob of a manifest.
///
/// Unknown JSON fields are ignored and missing fields take their zero
/// value. The origin hints (`hf_repo`, `embodiment_tag`, `data_config`) are
/// omitted from the encoding when empty, so an empty string and an absent
/// key mean the same thing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Policy architecture, e.g. `openvla`, `gr00t`, `smolvla`
    pub architecture: String,
    /// Backbone family, e.g. `llama`
    pub family: String,
    /// Human-readable parameter count, e.g. `7B`
    pub parameter_size: String,
    pub action_dim: u32,
    pub image_size: u32,
    /// Environments the policy is known to run in
    pub environments: Vec<String>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub hf_repo: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub embodiment_tag: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub data_config: String,
}

impl ModelConfig {
    /// Parse a config blob. `source` only labels the error.
    pub fn decode(bytes: &[u8], source: &Path) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| MapleError::corrupt(source, format!("Invalid model config: {}", e)))
    }

    /// Encode as a config blob payload.
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| MapleError::Other(format!("Failed to encode model config: {}", e)))
    }

    pub fn hf_repo(&self) -> Option<&str> {
        non_empty(&self.hf_repo)
    }

    pub fn embodiment_tag(&self) -> Option<&str> {
        non_empty(&self.embodiment_tag)
    }

    pub fn data_config(&self) -> Option<&str> {
        non_empty(&self.data_config)
    }

    pub fn supports_environment(&self, env: &str) -> bool {
        self.environments.iter().any(|e| e.eq_ignore_ascii_case(env))
    }
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn openvla() -> ModelConfig {
        ModelConfig {
            architecture: "openvla".into(),
            family: "llama".into(),
            parameter_size: "7B".into(),
            action_dim: 7,
            image_size: 224,
            environments: vec!["libero".into(), "bridge".into()],
            hf_repo: "openvla/openvla-7b".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_round_trip() {
        let config = openvla();
        let bytes = config.encode().unwrap();
        assert_eq!(ModelConfig::decode(&bytes, Path::new("cfg")).unwrap(), config);

        let bare = ModelConfig::default();
        let bytes = bare.encode().unwrap();
        assert_eq!(ModelConfig::decode(&bytes, Path::new("cfg")).unwrap(), bare);
    }

    #[test]
    fn test_empty_optionals_are_omitted() {
        let json: serde_json::Value = serde_json::from_slice(&openvla().encode().unwrap()).unwrap();
        assert_eq!(json["hf_repo"], "openvla/openvla-7b");
        assert!(json.get("embodiment_tag").is_none());
        assert!(json.get("data_config").is_none());
    }

    #[test]
    fn test_decode_ignores_unknown_and_defaults_missing() {
        let bytes = br#"{"architecture": "gr00t", "embodiment_tag": "", "future_field": [1, 2]}"#;
        let config = ModelConfig::decode(bytes, Path::new("cfg")).unwrap();
        assert_eq!(config.architecture, "gr00t");
        assert_eq!(config.action_dim, 0);
        assert!(config.environments.is_empty());
        assert_eq!(config.embodiment_tag(), None);
    }

    #[test]
    fn test_decode_rejects_wrong_types() {
        let err = ModelConfig::decode(br#"{"action_dim": "seven"}"#, Path::new("cfg")).unwrap_err();
        assert!(matches!(err, MapleError::Corrupt { .. }));
    }

    #[test]
    fn test_supports_environment() {
        assert!(openvla().supports_environment("LIBERO"));
        assert!(!openvla().supports_environment("robocasa"));
    }
}
