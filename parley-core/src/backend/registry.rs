//! Provider registry and persona-to-backend resolution

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{
    AnthropicBackend, Backend, GeminiBackend, OpenAiCompatBackend, ProviderKind, ScriptedBackend,
};
use crate::config::ProviderConfig;
use crate::negotiation::{Participant, Participants};
use crate::persona::{Cast, Persona};
use crate::secrets::Secrets;
use crate::{Error, Result};

/// A persona's resolved provider
#[derive(Clone)]
pub struct Resolved {
    pub kind: ProviderKind,
    pub backend: Arc<dyn Backend>,
    pub model: String,
    /// False when the persona's preferred provider was unavailable
    pub native: bool,
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved")
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("native", &self.native)
            .finish()
    }
}

/// Backends available for this run, keyed by provider
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: BTreeMap<ProviderKind, Arc<dyn Backend>>,
    default_provider: Option<ProviderKind>,
    default_model: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend, replacing any backend of the same provider
    pub fn register(&mut self, backend: Arc<dyn Backend>) {
        self.backends.insert(backend.kind(), backend);
    }

    /// Provider tried after a persona's own preference, and its model
    pub fn with_default(mut self, provider: Option<ProviderKind>, model: Option<String>) -> Self {
        self.default_provider = provider;
        self.default_model = model;
        self
    }

    /// Build HTTP backends for every provider that has an API key
    pub fn from_secrets(secrets: &Secrets, config: &ProviderConfig) -> Result<Self> {
        if config.default == Some(ProviderKind::Simulated) {
            return Ok(Self::simulated());
        }

        let mut registry = Self::new().with_default(config.default, config.model.clone());
        for kind in ProviderKind::PRIORITY {
            let Some(key) = secrets.api_key(kind) else {
                debug!(provider = %kind, "No API key, provider skipped");
                continue;
            };
            let backend: Arc<dyn Backend> = match kind {
                ProviderKind::Anthropic => Arc::new(AnthropicBackend::new(key)),
                ProviderKind::Google => Arc::new(GeminiBackend::new(key)),
                _ => Arc::new(OpenAiCompatBackend::new(kind, key)?),
            };
            registry.register(backend);
        }

        info!(
            providers = %registry.available().iter().map(|k| k.name()).collect::<Vec<_>>().join(", "),
            "Provider registry ready"
        );
        Ok(registry)
    }

    /// Registry holding only the canned simulation backend
    pub fn simulated() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ScriptedBackend::simulation()));
        registry
    }

    /// Registered providers, in a stable order
    pub fn available(&self) -> Vec<ProviderKind> {
        self.backends.keys().copied().collect()
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn Backend>> {
        self.backends.get(&kind).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Model used on a provider when the persona does not name one
    pub fn model_for(&self, kind: ProviderKind) -> String {
        match &self.default_model {
            Some(model) if self.default_provider == Some(kind) => model.clone(),
            _ => kind.default_model().to_string(),
        }
    }

    /// Pick a backend and model for a persona
    ///
    /// Order: the persona's preferred provider, the configured default
    /// provider, then [`ProviderKind::PRIORITY`], then the simulation backend.
    pub fn resolve(&self, persona: &Persona) -> Result<Resolved> {
        let candidates = persona
            .provider
            .into_iter()
            .chain(self.default_provider)
            .chain(ProviderKind::PRIORITY)
            .chain(std::iter::once(ProviderKind::Simulated));

        for kind in candidates {
            let Some(backend) = self.get(kind) else {
                continue;
            };

            let preferred = persona.provider == Some(kind);
            let model = persona
                .model
                .clone()
                .filter(|_| preferred)
                .unwrap_or_else(|| self.model_for(kind));

            let native = persona.provider.is_none() || preferred;
            if !native {
                warn!(
                    persona = %persona.name,
                    preferred = ?persona.provider,
                    fallback = %kind,
                    "Preferred provider unavailable, falling back"
                );
            }

            return Ok(Resolved {
                kind,
                backend,
                model,
                native,
            });
        }

        Err(Error::Backend(format!(
            "No provider available for {}. Set an API key (e.g. ANTHROPIC_API_KEY) or use --simulate",
            persona.name
        )))
    }

    /// Resolve every member of the cast
    pub fn assign(&self, cast: &Cast) -> Result<Participants> {
        let participant = |persona: &Arc<Persona>| -> Result<Participant> {
            let resolved = self.resolve(persona)?;
            Ok(Participant::from_resolved(persona.clone(), resolved))
        };

        Ok(Participants {
            a: participant(&cast.debater_a)?,
            b: participant(&cast.debater_b)?,
            synthesizer: participant(&cast.synthesizer)?,
            stress_tester: participant(&cast.stress_tester)?,
        })
    }
}

/// How many independent providers back the debaters and the stress tester
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BrainMode {
    Single,
    Dual,
    Tri,
    Simulation,
}

impl BrainMode {
    pub fn for_participants(participants: &Participants) -> Self {
        let providers = [
            participants.a.provider,
            participants.b.provider,
            participants.stress_tester.provider,
        ];
        if providers.contains(&ProviderKind::Simulated) {
            return BrainMode::Simulation;
        }
        match providers.iter().collect::<BTreeSet<_>>().len() {
            3 => BrainMode::Tri,
            2 => BrainMode::Dual,
            _ => BrainMode::Single,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BrainMode::Single => "SINGLE-BRAIN",
            BrainMode::Dual => "DUAL-BRAIN",
            BrainMode::Tri => "TRI-BRAIN",
            BrainMode::Simulation => "SIMULATION",
        }
    }
}

impl fmt::Display for BrainMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Invocation;
    use crate::config::PersonaConfig;
    use crate::persona::PersonaBook;
    use async_trait::async_trait;

    struct FakeBackend(ProviderKind);

    #[async_trait]
    impl Backend for FakeBackend {
        fn kind(&self) -> ProviderKind {
            self.0
        }

        async fn invoke(&self, _invocation: &Invocation<'_>) -> Result<String> {
            Ok(String::new())
        }
    }

    fn registry(kinds: &[ProviderKind]) -> BackendRegistry {
        let mut registry = BackendRegistry::new();
        for kind in kinds {
            registry.register(Arc::new(FakeBackend(*kind)));
        }
        registry
    }

    fn cast() -> Cast {
        Cast::from_config(&PersonaBook::with_builtins(), &PersonaConfig::default()).unwrap()
    }

    #[test]
    fn test_preferred_provider_used() {
        let registry = registry(&[ProviderKind::Anthropic, ProviderKind::Google]);
        let roux = Persona::new("Roux", "d")
            .with_provider(ProviderKind::Google)
            .with_model("gemini-2.5-pro");

        let resolved = registry.resolve(&roux).unwrap();
        assert_eq!(resolved.kind, ProviderKind::Google);
        assert_eq!(resolved.model, "gemini-2.5-pro");
        assert!(resolved.native);
    }

    #[test]
    fn test_fallback_uses_provider_default_model() {
        let registry = registry(&[ProviderKind::Groq, ProviderKind::OpenAi]);
        let boolean = Persona::new("Boolean", "d")
            .with_provider(ProviderKind::Anthropic)
            .with_model("claude-opus");

        let resolved = registry.resolve(&boolean).unwrap();
        assert_eq!(resolved.kind, ProviderKind::OpenAi);
        assert_eq!(resolved.model, "gpt-4o");
        assert!(!resolved.native);
    }

    #[test]
    fn test_configured_default_before_priority() {
        let registry = registry(&[ProviderKind::Anthropic, ProviderKind::Groq])
            .with_default(Some(ProviderKind::Groq), Some("llama-custom".to_string()));
        let loom = Persona::new("The Loom", "d");

        let resolved = registry.resolve(&loom).unwrap();
        assert_eq!(resolved.kind, ProviderKind::Groq);
        assert_eq!(resolved.model, "llama-custom");
        assert!(resolved.native);
    }

    #[test]
    fn test_no_provider_is_error() {
        let err = BackendRegistry::new()
            .resolve(&Persona::new("X", "d"))
            .unwrap_err();
        assert!(matches!(err, Error::Backend(_)));
    }

    #[test]
    fn test_simulated_registry_resolves_everyone() {
        let participants = BackendRegistry::simulated().assign(&cast()).unwrap();
        assert_eq!(participants.a.provider, ProviderKind::Simulated);
        assert_eq!(participants.synthesizer.model, "scripted");
        assert_eq!(BrainMode::for_participants(&participants), BrainMode::Simulation);
    }

    #[test]
    fn test_brain_modes() {
        let all = registry(&[ProviderKind::Anthropic, ProviderKind::Google, ProviderKind::OpenAi]);
        let tri = all.assign(&cast()).unwrap();
        assert_eq!(BrainMode::for_participants(&tri), BrainMode::Tri);

        let two = registry(&[ProviderKind::Anthropic, ProviderKind::Google]);
        let dual = two.assign(&cast()).unwrap();
        assert_eq!(dual.stress_tester.provider, ProviderKind::Anthropic);
        assert_eq!(BrainMode::for_participants(&dual), BrainMode::Dual);

        let one = registry(&[ProviderKind::OpenRouter]);
        let single = one.assign(&cast()).unwrap();
        assert_eq!(BrainMode::for_participants(&single).label(), "SINGLE-BRAIN");
    }
}
