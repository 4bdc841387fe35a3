//! Progress events emitted while a negotiation runs
//!
//! Observers are advisory: they see every phase transition but cannot alter
//! control flow.

use std::time::Duration;

use tracing::{info, warn};

use super::round::{Position, Stage};
use crate::stress::Verdict;

/// One phase transition of a run
#[derive(Debug, Clone, PartialEq)]
pub enum NegotiationEvent {
    RoundStarted { round: u32, total: u32 },
    PositionRecorded { position: Position },
    RoundCompleted { round: u32, elapsed: Duration },
    SynthesisStarted,
    SynthesisCompleted { missing: Vec<String>, elapsed: Duration },
    StressTestStarted,
    StressTestCompleted { verdict: Verdict, inferred: bool, elapsed: Duration },
    Completed { verdict: Verdict, elapsed: Duration },
    Failed { stage: Option<Stage>, message: String },
}

/// Receives negotiation events
pub trait NegotiationObserver: Send + Sync {
    fn on_event(&self, event: &NegotiationEvent);
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl NegotiationObserver for TracingObserver {
    fn on_event(&self, event: &NegotiationEvent) {
        match event {
            NegotiationEvent::RoundStarted { round, total } => {
                info!(round, total, "Round started");
            }
            NegotiationEvent::PositionRecorded { position } => {
                info!(
                    round = position.round,
                    seat = %position.seat,
                    persona = %position.persona,
                    chars = position.text.len(),
                    "Position recorded"
                );
            }
            NegotiationEvent::RoundCompleted { round, elapsed } => {
                info!(round, elapsed_ms = elapsed.as_millis() as u64, "Round completed");
            }
            NegotiationEvent::SynthesisStarted => info!("Synthesis started"),
            NegotiationEvent::SynthesisCompleted { missing, elapsed } => {
                info!(
                    missing = missing.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Synthesis completed"
                );
            }
            NegotiationEvent::StressTestStarted => info!("Stress test started"),
            NegotiationEvent::StressTestCompleted {
                verdict,
                inferred,
                elapsed,
            } => {
                info!(
                    verdict = %verdict,
                    inferred,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Stress test completed"
                );
            }
            NegotiationEvent::Completed { verdict, elapsed } => {
                info!(verdict = %verdict, elapsed_ms = elapsed.as_millis() as u64, "Negotiation complete");
            }
            NegotiationEvent::Failed { stage, message } => {
                warn!(stage = ?stage, error = %message, "Negotiation failed");
            }
        }
    }
}

/// Prints progress to stderr, and full positions when verbose
pub struct PrintObserver {
    verbose: bool,
}

impl PrintObserver {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl NegotiationObserver for PrintObserver {
    fn on_event(&self, event: &NegotiationEvent) {
        match event {
            NegotiationEvent::RoundStarted { round, total } => {
                eprintln!("-- Round {}/{} --", round, total);
            }
            NegotiationEvent::PositionRecorded { position } => {
                if self.verbose {
                    eprintln!("[{} (seat {})]\n{}\n", position.persona, position.seat, position.text);
                } else {
                    eprintln!("  {} responded ({} chars)", position.persona, position.text.len());
                }
            }
            NegotiationEvent::RoundCompleted { elapsed, .. } => {
                eprintln!("  done in {:.1}s", elapsed.as_secs_f64());
            }
            NegotiationEvent::SynthesisStarted => eprintln!("-- Synthesis --"),
            NegotiationEvent::SynthesisCompleted { missing, elapsed } => {
                if !missing.is_empty() {
                    eprintln!("  warning: missing sections {}", missing.join(", "));
                }
                eprintln!("  done in {:.1}s", elapsed.as_secs_f64());
            }
            NegotiationEvent::StressTestStarted => eprintln!("-- Stress test --"),
            NegotiationEvent::StressTestCompleted {
                verdict,
                inferred,
                elapsed,
            } => {
                let note = if *inferred { " (inferred)" } else { "" };
                eprintln!("  verdict {}{} in {:.1}s", verdict, note, elapsed.as_secs_f64());
            }
            NegotiationEvent::Completed { elapsed, .. } => {
                eprintln!("Negotiation complete in {:.1}s", elapsed.as_secs_f64());
            }
            NegotiationEvent::Failed { stage, message } => match stage {
                Some(stage) => eprintln!("Negotiation failed at {}: {}", stage, message),
                None => eprintln!("Negotiation failed: {}", message),
            },
        }
    }
}
