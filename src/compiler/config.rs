use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::locator::LocatorKind;

/// Which locator kind is preferred as a node's primary locator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorStrategy {
    Css,
    Xpath,
    Text,
    #[default]
    Auto,
}

impl SelectorStrategy {
    /// The only kind eligible as primary, or `None` for `auto`.
    pub fn preferred_kind(&self) -> Option<LocatorKind> {
        match self {
            SelectorStrategy::Css => Some(LocatorKind::Css),
            SelectorStrategy::Xpath => Some(LocatorKind::Xpath),
            SelectorStrategy::Text => Some(LocatorKind::Text),
            SelectorStrategy::Auto => None,
        }
    }
}

impl FromStr for SelectorStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "css" => Ok(SelectorStrategy::Css),
            "xpath" => Ok(SelectorStrategy::Xpath),
            "text" => Ok(SelectorStrategy::Text),
            "auto" => Ok(SelectorStrategy::Auto),
            other => Err(format!(
                "unknown selector strategy {:?} (expected css, xpath, text or auto)",
                other
            )),
        }
    }
}

impl Display for SelectorStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SelectorStrategy::Css => "css",
            SelectorStrategy::Xpath => "xpath",
            SelectorStrategy::Text => "text",
            SelectorStrategy::Auto => "auto",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StepMappingConfig {
    pub enable_retries: bool,
    pub max_retries: u32,
    /// Milliseconds.
    pub wait_between_retries: u64,
    pub enable_screenshots: bool,
    pub enable_error_recovery: bool,
    /// Written into node parameters; never enforced while compiling.
    pub timeout_ms: u64,
    pub selector_strategy: SelectorStrategy,
}

impl Default for StepMappingConfig {
    fn default() -> Self {
        StepMappingConfig {
            enable_retries: true,
            max_retries: 3,
            wait_between_retries: 1000,
            enable_screenshots: false,
            enable_error_recovery: true,
            timeout_ms: 30_000,
            selector_strategy: SelectorStrategy::Auto,
        }
    }
}

impl StepMappingConfig {
    /// Reads a JSON config file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("could not read {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("invalid config in {}", path.display()))
    }

    /// Layers the fields set in `overrides` on top of this config.
    pub fn apply(&mut self, overrides: &StepMappingOverride) {
        if let Some(value) = overrides.enable_retries {
            self.enable_retries = value;
        }
        if let Some(value) = overrides.max_retries {
            self.max_retries = value;
        }
        if let Some(value) = overrides.wait_between_retries {
            self.wait_between_retries = value;
        }
        if let Some(value) = overrides.enable_screenshots {
            self.enable_screenshots = value;
        }
        if let Some(value) = overrides.enable_error_recovery {
            self.enable_error_recovery = value;
        }
        if let Some(value) = overrides.timeout_ms {
            self.timeout_ms = value;
        }
        if let Some(value) = overrides.selector_strategy {
            self.selector_strategy = value;
        }
    }

    pub fn with(mut self, overrides: &StepMappingOverride) -> Self {
        self.apply(overrides);
        self
    }
}

/// A partial config, as embedded in a workflow or assembled from CLI flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StepMappingOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_retries: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_between_retries: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_screenshots: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_error_recovery: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector_strategy: Option<SelectorStrategy>,
}
