//! Locators and the candidates produced for a recorded element.

use std::collections::BTreeMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

pub mod engine;
pub mod scoring;
pub mod snapshot;
pub mod strategy;

pub use engine::{InfrastructureError, LocatorEngine};
pub use snapshot::ElementSnapshot;
pub use strategy::LocatorStrategy;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocatorKind {
    Css,
    Xpath,
    Text,
    Role,
}

impl Display for LocatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LocatorKind::Css => "css",
            LocatorKind::Xpath => "xpath",
            LocatorKind::Text => "text",
            LocatorKind::Role => "role",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    pub kind: LocatorKind,
    pub value: String,
}

impl Locator {
    pub fn css(value: impl Into<String>) -> Self {
        Locator {
            kind: LocatorKind::Css,
            value: value.into(),
        }
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Locator {
            kind: LocatorKind::Xpath,
            value: value.into(),
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Locator {
            kind: LocatorKind::Text,
            value: value.into(),
        }
    }

    pub fn role(value: impl Into<String>) -> Self {
        Locator {
            kind: LocatorKind::Role,
            value: value.into(),
        }
    }
}

impl Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    AttributePriority,
    StructuralPath,
    TextContent,
    Role,
    Fallback,
}

/// Outcome of resolving a freshly extracted locator against the page it came
/// from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verification {
    /// Resolved to exactly the originating element.
    Passed,
    /// Resolved to nothing, several elements, or a different element.
    Failed,
    /// The locator could not be evaluated.
    Errored,
    /// Not checked (synthesized fallbacks).
    Skipped,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocatorCandidate {
    pub locator: Locator,
    pub confidence: u8,
    pub strategy: StrategyKind,
    pub verification: Verification,
    #[serde(default)]
    pub bounds: BoundingBox,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// Wraps `value` in double quotes, escaping `"` and `\`.
pub fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for char in value.chars() {
        if char == '"' || char == '\\' {
            quoted.push('\\');
        }
        quoted.push(char);
    }
    quoted.push('"');
    quoted
}
