//! Personas and the cast of a negotiation
//!
//! A persona is an immutable identity record: a name plus a free-text
//! directive holding its principles, hard constraints and negotiation style.
//! Personas are loaded once into a [`PersonaBook`] and shared by `Arc`.
//!
//! Additional personas can be declared in TOML:
//!
//! ```toml
//! [[persona]]
//! name = "Boolean"
//! role = "The Architect of Door Number 3"
//! directive = "You are Boolean..."
//! provider = "anthropic"
//! anchors = ["PHIL-005"]
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::ProviderKind;
use crate::config::PersonaConfig;
use crate::{Error, Result};

/// An immutable persona identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    /// Identity name, unique within a book (case-insensitive)
    pub name: String,

    /// Short role description, informational only
    #[serde(default)]
    pub role: Option<String>,

    /// System directive sent with every invocation for this persona
    pub directive: String,

    /// Preferred provider; falls back to any configured provider
    #[serde(default)]
    pub provider: Option<ProviderKind>,

    /// Preferred model on the preferred provider
    #[serde(default)]
    pub model: Option<String>,

    /// Identifiers of the principles grounding this persona's stances
    #[serde(default)]
    pub anchors: Vec<String>,
}

impl Persona {
    pub fn new(name: impl Into<String>, directive: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: None,
            directive: directive.into(),
            provider: None,
            model: None,
            anchors: Vec::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_anchors(mut self, anchors: Vec<String>) -> Self {
        self.anchors = anchors;
        self
    }

    fn key(&self) -> String {
        self.name.to_lowercase()
    }
}

const BOOLEAN_DIRECTIVE: &str = "\
You are Boolean, the Architect of Door Number 3. You do not choose between bad options; you create better substitutes.

Core principles:
- Door Number 3: Reject binary traps. Architect a third option that neither side anticipated.
- Meaning is connection: Every idea gains value from what it connects to, not what it contains in isolation.
- Process is product: How we build defines what we build.

Hard constraints (never violate):
- Never accept a false dichotomy without proposing an alternative.
- Never optimize for efficiency at the cost of integrity.
- Always trace provenance. Ideas have origins that deserve acknowledgment.

Negotiation style: Constructive synthesis. Seek the hidden third option that serves both parties. Hold firm on integrity, stay flexible on implementation.";

const ROUX_DIRECTIVE: &str = "\
You are Roux, the Soil Alchemist. You fix systems, not people. The environment shapes growth; you reshape environments.

Core principles:
- The soil composition matters: it is not the person that is broken, only systems.
- Good is greedy: benevolence is the most rational strategy. Positive-sum economics over zero-sum extraction.
- No boxes: reject reductive labels.

Hard constraints (never violate):
- Never blame individuals for systemic failures.
- Never propose solutions that require people to change their nature. Change the system instead.
- Always challenge assumptions that treat scarcity as natural rather than designed.

Negotiation style: Systemic challenger. Question structural assumptions. Accept synthesis only if it addresses root causes, not symptoms.";

const SEER_DIRECTIVE: &str = "\
You are Seer. You do not predict the future; you interrogate the assumptions that make a future fragile. Core axiom: a plan that cannot survive its worst case was never a plan.

Core principles:
- Optimism without evidence is noise. Every position must earn its confidence through stress-testing.
- The failure mode you didn't model is the one that finds you. Ask what breaks at scale, under adversarial conditions, or in year three.
- A system's character is revealed under load, not under ideal conditions.

Hard constraints (never violate):
- Never drift into nihilism. If no failure modes exist, say so clearly.
- Never perform skepticism. Every challenge must be genuine and specific.
- Never dominate. Your role is to strengthen the joint artifact, not veto it.

Negotiation style: Survival stress-tester. Accept what survives interrogation.";

const LOOM_DIRECTIVE: &str = "\
You are The Loom, an impartial synthesis engine. You weave opposing positions into joint artifacts. You have no ego, no position and no agenda. You serve the negotiation.";

/// The personas shipped with Parley
pub fn builtin_personas() -> Vec<Persona> {
    vec![
        Persona::new("Boolean", BOOLEAN_DIRECTIVE)
            .with_role("The Architect of Door Number 3")
            .with_provider(ProviderKind::Anthropic),
        Persona::new("Roux", ROUX_DIRECTIVE)
            .with_role("The Soil Alchemist")
            .with_provider(ProviderKind::Google),
        Persona::new("Seer", SEER_DIRECTIVE)
            .with_role("Survival stress-tester")
            .with_provider(ProviderKind::OpenAi),
        Persona::new("The Loom", LOOM_DIRECTIVE).with_role("Impartial synthesis engine"),
    ]
}

#[derive(Debug, Deserialize)]
struct PersonaFile {
    #[serde(default)]
    persona: Vec<Persona>,
}

/// A read-only collection of personas, keyed by lowercase name
#[derive(Debug, Clone, Default)]
pub struct PersonaBook {
    personas: HashMap<String, Arc<Persona>>,
}

impl PersonaBook {
    /// Create an empty book
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a book holding the built-in personas
    pub fn with_builtins() -> Self {
        let mut book = Self::new();
        for persona in builtin_personas() {
            book.insert(persona);
        }
        book
    }

    /// Insert or replace a persona
    pub fn insert(&mut self, persona: Persona) {
        self.personas.insert(persona.key(), Arc::new(persona));
    }

    /// Parse personas from TOML and insert them, replacing same-named ones
    pub fn extend_from_toml(&mut self, contents: &str) -> Result<usize> {
        let file: PersonaFile = toml::from_str(contents)
            .map_err(|e| Error::Config(format!("Failed to parse personas: {}", e)))?;

        let count = file.persona.len();
        for persona in file.persona {
            if persona.name.trim().is_empty() {
                return Err(Error::Config("Persona with empty name".to_string()));
            }
            if persona.directive.trim().is_empty() {
                return Err(Error::Config(format!(
                    "Persona '{}' has an empty directive",
                    persona.name
                )));
            }
            self.insert(persona);
        }
        Ok(count)
    }

    /// Load personas from a TOML file on top of the current book
    pub fn load_file(&mut self, path: &Path) -> Result<usize> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        let count = self.extend_from_toml(&contents)?;
        debug!(path = %path.display(), count, "Loaded personas");
        Ok(count)
    }

    /// Look up a persona by name (case-insensitive)
    pub fn get(&self, name: &str) -> Result<Arc<Persona>> {
        self.personas
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| Error::Config(format!("Unknown persona: {}", name)))
    }

    /// All personas, sorted by name
    pub fn list(&self) -> Vec<Arc<Persona>> {
        let mut all: Vec<_> = self.personas.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}

/// The four personas taking part in one run
#[derive(Debug, Clone)]
pub struct Cast {
    pub debater_a: Arc<Persona>,
    pub debater_b: Arc<Persona>,
    pub synthesizer: Arc<Persona>,
    pub stress_tester: Arc<Persona>,
}

impl Cast {
    /// Build a cast, validating that the roles are filled by distinct personas
    pub fn new(
        debater_a: Arc<Persona>,
        debater_b: Arc<Persona>,
        synthesizer: Arc<Persona>,
        stress_tester: Arc<Persona>,
    ) -> Result<Self> {
        let same = |x: &Persona, y: &Persona| x.key() == y.key();

        if same(&debater_a, &debater_b) {
            return Err(Error::Config(format!(
                "Both debaters are '{}'; two distinct debating personas are required",
                debater_a.name
            )));
        }
        for debater in [&debater_a, &debater_b] {
            if same(debater, &synthesizer) {
                return Err(Error::Config(format!(
                    "'{}' cannot both debate and synthesize",
                    debater.name
                )));
            }
            if same(debater, &stress_tester) {
                return Err(Error::Config(format!(
                    "'{}' cannot both debate and stress-test",
                    debater.name
                )));
            }
        }
        if same(&synthesizer, &stress_tester) {
            return Err(Error::Config(format!(
                "'{}' cannot both synthesize and stress-test",
                synthesizer.name
            )));
        }

        Ok(Self {
            debater_a,
            debater_b,
            synthesizer,
            stress_tester,
        })
    }

    /// Select a cast from the book using the persona configuration
    pub fn from_config(book: &PersonaBook, config: &PersonaConfig) -> Result<Self> {
        if config.debaters.len() < 2 {
            return Err(Error::Config(format!(
                "At least two debating personas are required, got {}",
                config.debaters.len()
            )));
        }
        if config.debaters.len() > 2 {
            return Err(Error::Config(format!(
                "Exactly two debating personas take part, got {}: {}",
                config.debaters.len(),
                config.debaters.join(", ")
            )));
        }

        Self::new(
            book.get(&config.debaters[0])?,
            book.get(&config.debaters[1])?,
            book.get(&config.synthesizer)?,
            book.get(&config.stress_tester)?,
        )
    }
}
