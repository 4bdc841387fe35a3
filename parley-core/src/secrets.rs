//! Secrets management for Parley
//!
//! Provider API keys are stored separately from configuration to avoid
//! accidental sharing. The secrets file is located at
//! `~/.config/parley/secrets.toml` and must have restrictive permissions
//! (0600 on Unix).
//!
//! Loading priority:
//! 1. Environment variables (ANTHROPIC_API_KEY, GEMINI_API_KEY, ...)
//! 2. Secrets file (~/.config/parley/secrets.toml)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::ProviderKind;
use crate::{Error, Result};

/// Secrets structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Secrets {
    pub anthropic: ProviderSecrets,
    pub google: ProviderSecrets,
    pub openai: ProviderSecrets,
    pub groq: ProviderSecrets,
    pub openrouter: ProviderSecrets,
}

/// Credentials for one provider
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderSecrets {
    pub api_key: Option<String>,
}

impl Secrets {
    /// Load secrets from the default location
    ///
    /// Returns default (empty) secrets if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_secrets_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load secrets from a specific file with permission checking
    pub fn load_from_file(path: &Path) -> Result<Self> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let metadata = std::fs::metadata(path).map_err(Error::Io)?;
            let mode = metadata.permissions().mode();

            if mode & 0o077 != 0 {
                return Err(Error::Config(format!(
                    "Secrets file {} has insecure permissions {:o}. \
                     Please run: chmod 600 {}",
                    path.display(),
                    mode & 0o777,
                    path.display()
                )));
            }

            debug!(path = %path.display(), mode = format!("{:o}", mode & 0o777), "Secrets file permissions OK");
        }

        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        let mut secrets: Secrets = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse secrets: {}", e)))?;

        for entry in secrets.entries_mut() {
            if let Some(key) = entry.api_key.take() {
                let key = key.trim().to_string();
                if !key.is_empty() {
                    entry.api_key = Some(key);
                }
            }
        }

        Ok(secrets)
    }

    /// Get the default secrets file path
    ///
    /// Returns `~/.config/parley/secrets.toml` on Unix
    pub fn default_secrets_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("parley").join("secrets.toml"))
    }

    /// Get a provider's API key with environment variable override
    ///
    /// Priority: provider env vars (in order) > secrets file
    pub fn api_key(&self, kind: ProviderKind) -> Option<String> {
        for var in kind.env_vars() {
            if let Ok(key) = std::env::var(var) {
                let key = key.trim().to_string();
                if !key.is_empty() {
                    debug!(provider = %kind, var, "Using API key from environment");
                    return Some(key);
                }
            }
        }

        let key = self.file_key(kind)?;
        debug!(provider = %kind, "Using API key from secrets file");
        Some(key.to_string())
    }

    /// API key from the secrets file only
    pub fn file_key(&self, kind: ProviderKind) -> Option<&str> {
        let entry = match kind {
            ProviderKind::Anthropic => &self.anthropic,
            ProviderKind::Google => &self.google,
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Groq => &self.groq,
            ProviderKind::OpenRouter => &self.openrouter,
            ProviderKind::Simulated => return None,
        };
        entry.api_key.as_deref().filter(|k| !k.is_empty())
    }

    fn entries_mut(&mut self) -> [&mut ProviderSecrets; 5] {
        [
            &mut self.anthropic,
            &mut self.google,
            &mut self.openai,
            &mut self.groq,
            &mut self.openrouter,
        ]
    }

    /// Create a template secrets file at the default location
    ///
    /// Creates parent directories if needed and sets secure permissions
    pub fn create_template() -> Result<PathBuf> {
        let path = Self::default_secrets_path()
            .ok_or_else(|| Error::Config("Could not determine secrets path".to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::Io)?;
        }

        if path.exists() {
            return Err(Error::Config(format!(
                "Secrets file already exists at {}",
                path.display()
            )));
        }

        let template = r#"# Parley Secrets
# This file contains sensitive credentials - do not share or commit to version control
#
# IMPORTANT: This file must have restrictive permissions (chmod 600)
# Environment variables take precedence over the keys below.

[anthropic]
api_key = ""

[google]
api_key = ""

[openai]
api_key = ""

[groq]
api_key = ""

[openrouter]
api_key = ""
"#;

        std::fs::write(&path, template).map_err(Error::Io)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&path, perms).map_err(Error::Io)?;
        }

        warn!(path = %path.display(), "Created secrets template - please edit and add your API keys");

        Ok(path)
    }
}
