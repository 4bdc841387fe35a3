//! Configuration management for Parley
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (PARLEY_*)
//! 3. Config file (~/.config/parley/config.toml, or `--config`)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::backend::ProviderKind;
use crate::negotiation::{NegotiationSettings, RoundOrder};
use crate::prompts::PromptLimits;
use crate::{Error, Result};

/// Negotiation protocol settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NegotiationConfig {
    /// Number of debating rounds, at least 1
    pub rounds: u32,

    /// How rebuttal rounds thread context
    pub round_order: RoundOrder,

    /// Upper bound on a single model invocation
    #[serde(with = "humantime_serde")]
    pub invocation_timeout: Duration,

    /// Fail the run when the stress test has no verdict token
    pub strict_verdict: bool,

    /// Fail the run when the synthesis is missing sections
    pub strict_synthesis: bool,

    /// Where transcripts are written
    pub output_dir: PathBuf,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            rounds: 3,
            round_order: RoundOrder::Sequential,
            invocation_timeout: Duration::from_secs(120),
            strict_verdict: false,
            strict_synthesis: false,
            output_dir: PathBuf::from("negotiations"),
        }
    }
}

/// Provider selection
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider tried after a persona's own preference
    pub default: Option<ProviderKind>,

    /// Model used on the default provider
    pub model: Option<String>,
}

/// Which personas fill which role
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PersonaConfig {
    /// Exactly two debating personas, seat A first
    pub debaters: Vec<String>,

    /// Neutral persona producing the joint artifact
    pub synthesizer: String,

    /// Persona evaluating the joint artifact
    pub stress_tester: String,

    /// Extra persona definitions loaded on top of the built-ins
    #[serde(rename = "personas_file")]
    pub file: Option<PathBuf>,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            debaters: vec!["Boolean".to_string(), "Roux".to_string()],
            synthesizer: "The Loom".to_string(),
            stress_tester: "Seer".to_string(),
            file: None,
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub negotiation: NegotiationConfig,
    pub limits: PromptLimits,
    pub provider: ProviderConfig,
    pub personas: PersonaConfig,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub provider: Option<ProviderKind>,
    pub model: Option<String>,
    pub rounds: Option<u32>,
    pub round_order: Option<RoundOrder>,
    pub output_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config {}: {}", path.display(), e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/parley/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("parley").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - PARLEY_ROUNDS: Number of debating rounds
    /// - PARLEY_PROVIDER: Default provider
    /// - PARLEY_MODEL: Model on the default provider
    /// - PARLEY_OUTPUT_DIR: Transcript directory
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(rounds) = std::env::var("PARLEY_ROUNDS") {
            match rounds.trim().parse() {
                Ok(n) => self.negotiation.rounds = n,
                Err(_) => warn!(value = %rounds, "Ignoring invalid PARLEY_ROUNDS"),
            }
        }

        if let Ok(provider) = std::env::var("PARLEY_PROVIDER") {
            match provider.parse() {
                Ok(kind) => self.provider.default = Some(kind),
                Err(e) => warn!(error = %e, "Ignoring invalid PARLEY_PROVIDER"),
            }
        }

        if let Ok(model) = std::env::var("PARLEY_MODEL") {
            self.provider.model = Some(model);
        }

        if let Ok(dir) = std::env::var("PARLEY_OUTPUT_DIR") {
            self.negotiation.output_dir = PathBuf::from(dir);
        }

        self
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, cli: CliOverrides) -> Self {
        if let Some(provider) = cli.provider {
            self.provider.default = Some(provider);
        }
        if let Some(model) = cli.model {
            self.provider.model = Some(model);
        }
        if let Some(rounds) = cli.rounds {
            self.negotiation.rounds = rounds;
        }
        if let Some(order) = cli.round_order {
            self.negotiation.round_order = order;
        }
        if let Some(dir) = cli.output_dir {
            self.negotiation.output_dir = dir;
        }
        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(config_path: Option<&Path>, cli: CliOverrides) -> Result<Self> {
        let base = match config_path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load()?,
        };
        Ok(base.with_env_overrides().with_cli_overrides(cli))
    }

    /// Engine settings for one run
    pub fn settings(&self) -> NegotiationSettings {
        NegotiationSettings {
            rounds: self.negotiation.rounds,
            order: self.negotiation.round_order,
            invocation_timeout: self.negotiation.invocation_timeout,
            strict_verdict: self.negotiation.strict_verdict,
            strict_synthesis: self.negotiation.strict_synthesis,
            limits: self.limits,
        }
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to render config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.negotiation.rounds, 3);
        assert_eq!(config.negotiation.round_order, RoundOrder::Sequential);
        assert_eq!(config.negotiation.invocation_timeout, Duration::from_secs(120));
        assert!(!config.negotiation.strict_verdict);
        assert_eq!(config.limits.round_words, 300);
        assert_eq!(config.personas.debaters, vec!["Boolean", "Roux"]);
        assert!(config.provider.default.is_none());
    }

    #[test]
    fn test_cli_overrides() {
        let config = Config::default().with_cli_overrides(CliOverrides {
            provider: Some(ProviderKind::Groq),
            model: Some("llama".to_string()),
            rounds: Some(5),
            round_order: Some(RoundOrder::Symmetric),
            output_dir: Some(PathBuf::from("/tmp/out")),
        });

        assert_eq!(config.provider.default, Some(ProviderKind::Groq));
        assert_eq!(config.provider.model.as_deref(), Some("llama"));
        assert_eq!(config.negotiation.rounds, 5);
        assert_eq!(config.negotiation.round_order, RoundOrder::Symmetric);
        assert_eq!(config.negotiation.output_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[negotiation]
rounds = 4
round_order = "symmetric"
invocation_timeout = "45s"
strict_verdict = true

[limits]
round_words = 200
max_output_tokens = 2048

[provider]
default = "openrouter"
model = "nvidia/nemotron-nano-9b-v2:free"

[personas]
debaters = ["Roux", "Boolean"]
personas_file = "personas.toml"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.negotiation.rounds, 4);
        assert_eq!(config.negotiation.round_order, RoundOrder::Symmetric);
        assert_eq!(config.negotiation.invocation_timeout, Duration::from_secs(45));
        assert!(config.negotiation.strict_verdict);
        assert_eq!(config.limits.round_words, 200);
        assert_eq!(config.limits.synthesis_words, 400);
        assert_eq!(config.limits.max_output_tokens, 2048);
        assert_eq!(config.provider.default, Some(ProviderKind::OpenRouter));
        assert_eq!(config.personas.debaters, vec!["Roux", "Boolean"]);
        assert_eq!(config.personas.synthesizer, "The Loom");
        assert_eq!(config.personas.file, Some(PathBuf::from("personas.toml")));
    }

    #[test]
    fn test_load_from_file_reports_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[negotiation]\nrounds = \"three\"").unwrap();

        let err = Config::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn test_settings_and_toml_render() {
        let config = Config::default();
        let settings = config.settings();
        assert_eq!(settings.rounds, 3);
        assert_eq!(settings.limits, PromptLimits::default());

        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("invocation_timeout = \"2m\""));
        let back: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(back, config);
    }
}
