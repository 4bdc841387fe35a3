//! Negotiation phase state machine
//!
//! A run moves through `Round(1)..Round(N)`, then `Synthesis`, `StressTest`
//! and `Done`. Any phase may move to `Failed`. The transition table is built
//! once from the round count, so an out-of-order stage is rejected rather
//! than silently executed.

use crate::error::{Error, Result};
use std::fmt::{self, Debug};

/// Phase of a negotiation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationPhase {
    /// Debating round with a 1-based index
    Round(u32),
    /// Neutral merge of both final positions
    Synthesis,
    /// Adversarial evaluation of the merged artifact
    StressTest,
    /// Terminal success
    Done,
    /// Terminal failure
    Failed,
}

impl NegotiationPhase {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, NegotiationPhase::Done | NegotiationPhase::Failed)
    }
}

impl fmt::Display for NegotiationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegotiationPhase::Round(i) => write!(f, "round {}", i),
            NegotiationPhase::Synthesis => write!(f, "synthesis"),
            NegotiationPhase::StressTest => write!(f, "stress test"),
            NegotiationPhase::Done => write!(f, "done"),
            NegotiationPhase::Failed => write!(f, "failed"),
        }
    }
}

/// Core workflow trait for state machine management
pub trait Workflow {
    /// The phase type for this workflow
    type Phase: Clone + PartialEq + Debug;

    /// Get the current phase of the workflow
    fn current_phase(&self) -> &Self::Phase;

    /// Check if a transition to the given phase is valid
    fn can_transition_to(&self, phase: &Self::Phase) -> bool;

    /// Attempt to transition to a new phase
    ///
    /// Returns an error if the transition is not valid.
    fn transition_to(&mut self, phase: Self::Phase) -> Result<()>;
}

/// A table-driven state machine
#[derive(Debug, Clone)]
pub struct StateMachine<P: Clone + PartialEq + Debug> {
    current_phase: P,
    valid_transitions: Vec<(P, P)>,
}

impl<P: Clone + PartialEq + Debug> StateMachine<P> {
    /// Create a new state machine with the given initial phase
    pub fn new(initial_phase: P) -> Self {
        Self {
            current_phase: initial_phase,
            valid_transitions: Vec::new(),
        }
    }

    /// Add a valid transition from one phase to another
    pub fn add_transition(mut self, from: P, to: P) -> Self {
        self.valid_transitions.push((from, to));
        self
    }

    /// Add multiple valid transitions
    pub fn add_transitions(mut self, transitions: Vec<(P, P)>) -> Self {
        self.valid_transitions.extend(transitions);
        self
    }

    fn is_valid_transition(&self, from: &P, to: &P) -> bool {
        self.valid_transitions
            .iter()
            .any(|(f, t)| f == from && t == to)
    }
}

impl<P: Clone + PartialEq + Debug> Workflow for StateMachine<P> {
    type Phase = P;

    fn current_phase(&self) -> &Self::Phase {
        &self.current_phase
    }

    fn can_transition_to(&self, phase: &Self::Phase) -> bool {
        self.is_valid_transition(&self.current_phase, phase)
    }

    fn transition_to(&mut self, phase: Self::Phase) -> Result<()> {
        if !self.can_transition_to(&phase) {
            return Err(Error::Other(format!(
                "Invalid transition from {:?} to {:?}",
                self.current_phase, phase
            )));
        }

        tracing::debug!(
            from = ?self.current_phase,
            to = ?phase,
            "Negotiation phase transition"
        );

        self.current_phase = phase;
        Ok(())
    }
}

/// Build the state machine for a run with `rounds` debating rounds
pub fn negotiation_machine(rounds: u32) -> Result<StateMachine<NegotiationPhase>> {
    if rounds == 0 {
        return Err(Error::Config(
            "Round count must be at least 1".to_string(),
        ));
    }

    let mut transitions = Vec::new();
    for i in 1..rounds {
        transitions.push((NegotiationPhase::Round(i), NegotiationPhase::Round(i + 1)));
    }
    transitions.push((NegotiationPhase::Round(rounds), NegotiationPhase::Synthesis));
    transitions.push((NegotiationPhase::Synthesis, NegotiationPhase::StressTest));
    transitions.push((NegotiationPhase::StressTest, NegotiationPhase::Done));

    for i in 1..=rounds {
        transitions.push((NegotiationPhase::Round(i), NegotiationPhase::Failed));
    }
    transitions.push((NegotiationPhase::Synthesis, NegotiationPhase::Failed));
    transitions.push((NegotiationPhase::StressTest, NegotiationPhase::Failed));

    Ok(StateMachine::new(NegotiationPhase::Round(1)).add_transitions(transitions))
}
