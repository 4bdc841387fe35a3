//! Config command - show effective configuration and key status

use clap::Args;
use parley_core::{Config, ProviderKind, Secrets};

use super::Context;

/// Arguments for the config command
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Create a template secrets file with mode 0600
    #[arg(long)]
    pub init_secrets: bool,
}

impl ConfigArgs {
    /// Execute the config command
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        if self.init_secrets {
            let path = Secrets::create_template()
                .map_err(|e| anyhow::anyhow!("Failed to create secrets file: {}", e))?;
            println!("Created secrets template at {}", path.display());
            println!("Add your API keys, then run `parley preflight`.");
            return Ok(());
        }

        let config = ctx.config(|_| {})?;

        println!("Parley Configuration");
        println!("====================");
        println!();
        println!("{}", config.to_toml()?);

        let path = ctx.config_path.clone().or_else(Config::default_config_path);
        if let Some(path) = path {
            println!("Config file: {}", path.display());
            if path.exists() {
                println!("  (exists)");
            } else {
                println!("  (not found - using defaults)");
            }
        }

        if let Some(path) = Secrets::default_secrets_path() {
            println!("Secrets file: {}", path.display());
        }
        match Secrets::load() {
            Ok(secrets) => {
                println!();
                println!("API keys:");
                for kind in ProviderKind::PRIORITY {
                    let source = if kind.env_vars().iter().any(|v| std::env::var(v).is_ok()) {
                        "environment"
                    } else if secrets.file_key(kind).is_some() {
                        "secrets file"
                    } else {
                        "missing"
                    };
                    println!("  {:<11} {}", kind, source);
                }
            }
            Err(e) => println!("  (unreadable: {})", e),
        }

        Ok(())
    }
}
