//! CLI command implementations

pub mod compare;
pub mod config;
pub mod negotiate;
pub mod personas;
pub mod preflight;

pub use compare::CompareArgs;
pub use config::ConfigArgs;
pub use negotiate::NegotiateArgs;
pub use personas::PersonasArgs;
pub use preflight::PreflightArgs;

use std::path::PathBuf;
use std::sync::Arc;

use parley_core::{
    BackendRegistry, Cast, CliOverrides, Config, Negotiation, PersonaBook, PrintObserver, Secrets,
};

/// Global flags shared by every command
#[derive(Debug, Clone)]
pub struct Context {
    pub verbose: bool,
    pub config_path: Option<PathBuf>,
    pub overrides: CliOverrides,
}

impl Context {
    /// Load configuration, letting the command add its own overrides
    pub fn config(&self, extra: impl FnOnce(&mut CliOverrides)) -> anyhow::Result<Config> {
        let mut overrides = self.overrides.clone();
        extra(&mut overrides);
        let config = Config::load_with_overrides(self.config_path.as_deref(), overrides)
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        if self.verbose {
            tracing::info!(
                rounds = config.negotiation.rounds,
                order = %config.negotiation.round_order,
                provider = ?config.provider.default,
                model = ?config.provider.model,
                "Configuration loaded"
            );
        }
        Ok(config)
    }
}

/// Built-in personas plus any from the configured personas file
pub fn persona_book(config: &Config) -> anyhow::Result<PersonaBook> {
    let mut book = PersonaBook::with_builtins();
    if let Some(path) = &config.personas.file {
        book.load_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load personas from {}: {}", path.display(), e))?;
    }
    Ok(book)
}

pub fn cast(config: &Config, book: &PersonaBook) -> anyhow::Result<Cast> {
    Cast::from_config(book, &config.personas).map_err(|e| anyhow::anyhow!("{}", e))
}

/// Providers for this run: canned replies when simulating, otherwise every keyed provider
pub fn registry(config: &Config, simulate: bool) -> anyhow::Result<BackendRegistry> {
    if simulate {
        return Ok(BackendRegistry::simulated());
    }

    let secrets = Secrets::load().map_err(|e| anyhow::anyhow!("Failed to load secrets: {}", e))?;
    let registry = BackendRegistry::from_secrets(&secrets, &config.provider)
        .map_err(|e| anyhow::anyhow!("Failed to set up providers: {}", e))?;
    if registry.is_empty() {
        anyhow::bail!(
            "No provider API keys found. Set ANTHROPIC_API_KEY (or another provider key), \
             run `parley config --init-secrets`, or pass --simulate"
        );
    }
    Ok(registry)
}

/// Assemble a negotiation that prints progress to stderr
pub fn negotiation(
    topic: &str,
    config: &Config,
    registry: &BackendRegistry,
    verbose: bool,
) -> anyhow::Result<Negotiation> {
    let book = persona_book(config)?;
    let cast = cast(config, &book)?;
    let participants = registry
        .assign(&cast)
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let negotiation = Negotiation::new(topic, participants, config.settings())
        .map_err(|e| anyhow::anyhow!("{}", e))?
        .with_observer(Arc::new(PrintObserver::new(verbose)));
    Ok(negotiation)
}

/// Print who sits where before a run
pub fn print_participants(negotiation: &Negotiation) {
    let participants = negotiation.participants();
    println!("Mode: {}", negotiation.mode());
    for record in participants.records() {
        println!(
            "  {:<14} {:<10} {} / {}",
            record.role, record.persona, record.provider, record.model
        );
    }
    println!();
}
