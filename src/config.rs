/*!
# Parse Configuration

Settings for a parse job. Every field has a default, so an empty TOML or
YAML document is a valid configuration.
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::diagnostics::DiagnosticSeverity;
use crate::graph::KeywordSeed;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseConfig {
    /// Reserved words interned after the built-in keyword seed
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Maximum number of diagnostics before the parse is abandoned
    #[serde(default = "default_max_diagnostics")]
    pub max_diagnostics: Option<u32>,

    /// Maximum `{` nesting depth
    #[serde(default = "default_max_block_depth")]
    pub max_block_depth: u32,

    /// Severity reported for references to labels that are never declared
    #[serde(default = "default_unresolved_severity")]
    pub unresolved_reference_severity: DiagnosticSeverity,
}

fn default_max_diagnostics() -> Option<u32> {
    Some(100)
}

fn default_max_block_depth() -> u32 {
    64
}

fn default_unresolved_severity() -> DiagnosticSeverity {
    DiagnosticSeverity::Error
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            max_diagnostics: default_max_diagnostics(),
            max_block_depth: default_max_block_depth(),
            unresolved_reference_severity: default_unresolved_severity(),
        }
    }
}

impl ParseConfig {
    /// Built-in keywords followed by the configured extra ones.
    pub fn keyword_seed(&self) -> KeywordSeed {
        let mut seed = KeywordSeed::default();
        seed.extend(self.keywords.iter().cloned());
        seed
    }

    /// Load configuration from a TOML or YAML file, chosen by extension
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read parse config from {}", path.display()))?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let config = if is_yaml {
            Self::from_yaml_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
        .with_context(|| format!("Invalid parse config in {}", path.display()))?;

        for warning in config.validate() {
            tracing::warn!(config = %path.display(), "{warning}");
        }
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML config")
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse YAML config")
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize parse config to TOML")?;
        std::fs::write(&path, content).with_context(|| {
            format!("Failed to write parse config to {}", path.as_ref().display())
        })?;
        Ok(())
    }

    /// Non-fatal problems with the configuration
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.max_diagnostics == Some(0) {
            warnings.push("max_diagnostics = 0 aborts on the first diagnostic".to_string());
        }
        if self.max_block_depth == 0 {
            warnings.push("max_block_depth = 0 rejects every `{` block".to_string());
        }
        for keyword in &self.keywords {
            if keyword.trim().is_empty() {
                warnings.push("empty keyword in `keywords`".to_string());
            }
        }

        warnings
    }
}
