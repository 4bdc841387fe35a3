//! Scripted backend for offline simulation and tests

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{Backend, Invocation, ProviderKind};
use crate::Result;

type Responder = Box<dyn Fn(&Invocation<'_>) -> Result<String> + Send + Sync>;

/// One recorded invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub persona: String,
    pub instruction: String,
}

/// A backend whose replies come from a closure
///
/// Every invocation is recorded, in call order, before the responder runs.
pub struct ScriptedBackend {
    responder: Responder,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Option<Duration>,
}

impl ScriptedBackend {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Canned, well-formed responses for every stage
    ///
    /// Used by `--simulate` when no provider keys are available.
    pub fn simulation() -> Self {
        Self::new(|inv| Ok(simulated_reply(inv)))
    }

    /// Sleep before each reply
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Snapshot of all calls so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Simulated
    }

    async fn invoke(&self, invocation: &Invocation<'_>) -> Result<String> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedCall {
                persona: invocation.persona.name.clone(),
                instruction: invocation.instruction.to_string(),
            });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        (self.responder)(invocation)
    }
}

/// Per-round replies of the built-in debaters, rounds 1 to 3
const BOOLEAN_REPLIES: [&str; 3] = [
    include_str!("simulation/boolean_1.md"),
    include_str!("simulation/boolean_2.md"),
    include_str!("simulation/boolean_3.md"),
];
const ROUX_REPLIES: [&str; 3] = [
    include_str!("simulation/roux_1.md"),
    include_str!("simulation/roux_2.md"),
    include_str!("simulation/roux_3.md"),
];
const SYNTHESIS_REPLY: &str = include_str!("simulation/synthesis.md");

fn simulated_reply(inv: &Invocation<'_>) -> String {
    let name = &inv.persona.name;
    let header = inv.instruction.lines().next().unwrap_or_default();

    if header.starts_with("STRESS TEST") {
        return format!(
            "1. LOAD-BEARING ASSUMPTIONS:\n\
             - Both parties keep honoring the trade-offs they conceded\n\
             - The conditions in the shell can actually be monitored\n\n\
             2. FAILURE MODES:\n\
             - The compromise erodes once the first deadline slips\n\n\
             3. MISSING VOICES:\n\
             - The people who carry the cost but were not at the table\n\n\
             4. VERDICT: HOLDS_WITH_CONDITIONS\n\
             {} accepts the artifact if the monitoring conditions are written down.",
            name
        );
    }

    if header.starts_with("SYNTHESIS") {
        return SYNTHESIS_REPLY.trim_end().to_string();
    }

    let replies = match name.to_lowercase().as_str() {
        "boolean" => Some(&BOOLEAN_REPLIES),
        "roux" => Some(&ROUX_REPLIES),
        _ => None,
    };
    if let (Some(replies), Some(round)) = (replies, round_of(header)) {
        let index = round.clamp(1, replies.len()) - 1;
        return replies[index].trim_end().to_string();
    }

    if inv.instruction.contains("REVISED POSITION") {
        return format!(
            "1. RESPONSE:\n{} acknowledges the counterpart's point but still holds firm on the core constraint.\n\n\
             2. REVISED POSITION:\nKeep the constraint, relax the timeline.\n\n\
             3. SYNTHESIS OPPORTUNITY:\nA staged rollout that satisfies both sides.",
            name
        );
    }

    format!(
        "1. POSITION:\n{} opens with a principled stance on the topic.\n\n\
         2. NON-NEGOTIABLES:\n- Integrity of the process\n\n\
         3. FLEXIBLE AREAS:\n- Timing and mechanism",
        name
    )
}

/// Round number from a `NEGOTIATION ROUND <n> of <total>` header
fn round_of(header: &str) -> Option<usize> {
    header
        .strip_prefix("NEGOTIATION ROUND ")?
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}
