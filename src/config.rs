//! Stream configuration.
//!
//! Every field has a default so an empty JSON object is a valid config.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::layer::LayerState;
use crate::quality::{DeviceClassifier, MOBILE_BREAKPOINT, MOBILE_USER_AGENT};
use crate::sanitize::{Sanitizer, FOREIGN_ATTRIBUTE_PATTERN};

fn default_mobile_breakpoint() -> u32 {
    MOBILE_BREAKPOINT
}

fn default_user_agent_pattern() -> String {
    MOBILE_USER_AGENT.to_string()
}

fn default_foreign_attribute_pattern() -> String {
    FOREIGN_ATTRIBUTE_PATTERN.to_string()
}

fn default_connection_threshold() -> f32 {
    1.5
}

fn default_connection_retention() -> f64 {
    0.1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamConfig {
    /// Initial layer visibility.
    #[serde(default)]
    pub layers: LayerState,

    /// Force the quality flag instead of classifying the device.
    #[serde(default)]
    pub reduced_quality: Option<bool>,

    #[serde(default = "default_mobile_breakpoint")]
    pub mobile_breakpoint: u32,

    #[serde(default = "default_user_agent_pattern")]
    pub user_agent_pattern: String,

    /// Attribute keys matching this are stripped at the render handoff.
    #[serde(default = "default_foreign_attribute_pattern")]
    pub foreign_attribute_pattern: String,

    /// Synapse candidates must be strictly closer than this.
    #[serde(default = "default_connection_threshold")]
    pub connection_threshold: f32,

    /// Probability of keeping each synapse candidate.
    #[serde(default = "default_connection_retention")]
    pub connection_retention: f64,

    /// Seed for reproducible layouts. None seeds from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            layers: LayerState::default(),
            reduced_quality: None,
            mobile_breakpoint: default_mobile_breakpoint(),
            user_agent_pattern: default_user_agent_pattern(),
            foreign_attribute_pattern: default_foreign_attribute_pattern(),
            connection_threshold: default_connection_threshold(),
            connection_retention: default_connection_retention(),
            seed: None,
        }
    }
}

impl StreamConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Failed to parse stream config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_json_str(&json).with_context(|| format!("Invalid config: {}", path.display()))?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Check value ranges and that both patterns compile.
    pub fn validate(&self) -> Result<()> {
        if !(self.connection_threshold > 0.0) {
            anyhow::bail!("connectionThreshold must be positive, got {}", self.connection_threshold);
        }
        if !(0.0..=1.0).contains(&self.connection_retention) {
            anyhow::bail!("connectionRetention must be within [0, 1], got {}", self.connection_retention);
        }
        self.classifier()?;
        self.sanitizer()?;
        Ok(())
    }

    pub fn classifier(&self) -> Result<DeviceClassifier> {
        DeviceClassifier::new(self.mobile_breakpoint, &self.user_agent_pattern)
            .context("Invalid userAgentPattern")
    }

    pub fn sanitizer(&self) -> Result<Sanitizer> {
        Sanitizer::new(&self.foreign_attribute_pattern).context("Invalid foreignAttributePattern")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = StreamConfig::from_json_str("{}").unwrap();
        assert_eq!(config, StreamConfig::default());
        assert_eq!(config.mobile_breakpoint, 768);
        assert_eq!(config.connection_threshold, 1.5);
        assert!(config.layers.physical_brain);
    }

    #[test]
    fn test_camel_case_fields() {
        let config = StreamConfig::from_json_str(
            r#"{"reducedQuality": true, "seed": 42, "layers": {"higherMind": false}, "connectionRetention": 0.25}"#,
        )
        .unwrap();
        assert_eq!(config.reduced_quality, Some(true));
        assert_eq!(config.seed, Some(42));
        assert!(!config.layers.higher_mind);
        assert!(config.layers.physical_mind);
        assert_eq!(config.connection_retention, 0.25);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(StreamConfig::from_json_str(r#"{"connectionRetention": 1.5}"#).is_err());
        assert!(StreamConfig::from_json_str(r#"{"connectionThreshold": 0}"#).is_err());
        assert!(StreamConfig::from_json_str(r#"{"userAgentPattern": "("}"#).is_err());
        assert!(StreamConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = StreamConfig::from_json_file(Path::new("/nonexistent/stream.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
