//! Parley Core - Core library for multi-persona negotiation
//!
//! Two debating personas exchange positions over a fixed number of rounds,
//! a neutral persona merges their final positions into a joint artifact, and
//! a third persona stress-tests that artifact and issues a verdict.

pub mod backend;
pub mod config;
pub mod error;
pub mod negotiation;
pub mod persona;
pub mod preflight;
pub mod prompts;
pub mod secrets;
mod sections;
pub mod stress;
pub mod synthesis;
pub mod tension;
pub mod transcript;

pub use backend::{
    Backend, BackendRegistry, BrainMode, Invocation, ProviderKind, Resolved, ScriptedBackend,
};
pub use config::{CliOverrides, Config, NegotiationConfig, PersonaConfig, ProviderConfig};
pub use error::{Error, Result};
pub use negotiation::{
    Negotiation, NegotiationEvent, NegotiationObserver, NegotiationSettings, Participant,
    Participants, Position, PrintObserver, Round, RoundOrder, Seat, Stage, TracingObserver,
};
pub use persona::{Cast, Persona, PersonaBook};
pub use preflight::{CheckStatus, PreflightOutcome, PreflightReport};
pub use prompts::{Composer, PromptLimits};
pub use secrets::Secrets;
pub use stress::{StressTestVerdict, Verdict};
pub use synthesis::SynthesisArtifact;
pub use tension::{TensionLabel, TensionScore};
pub use transcript::{FileSink, Transcript, TranscriptSink};
