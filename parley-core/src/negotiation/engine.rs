//! Negotiation engine: rounds, synthesis and stress test

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info};

use super::observer::{NegotiationEvent, NegotiationObserver, TracingObserver};
use super::round::{Position, Round, RoundOrder, Seat, Stage};
use super::state::{negotiation_machine, NegotiationPhase, StateMachine, Workflow};
use crate::backend::{Backend, BrainMode, Invocation, ProviderKind, Resolved};
use crate::persona::{Cast, Persona};
use crate::prompts::{Composer, PromptLimits};
use crate::stress::StressTestVerdict;
use crate::synthesis::SynthesisArtifact;
use crate::tension;
use crate::transcript::{ParticipantRecord, PhaseTiming, Transcript, TranscriptSink};
use crate::{Error, Result};

/// A persona bound to the backend and model that speaks for it
#[derive(Clone)]
pub struct Participant {
    pub persona: Arc<Persona>,
    pub backend: Arc<dyn Backend>,
    pub provider: ProviderKind,
    pub model: String,
}

impl Participant {
    /// Bind a persona to a backend, using the persona's model or the provider default
    pub fn new(persona: Arc<Persona>, backend: Arc<dyn Backend>) -> Self {
        let provider = backend.kind();
        let model = persona
            .model
            .clone()
            .unwrap_or_else(|| provider.default_model().to_string());
        Self {
            persona,
            backend,
            provider,
            model,
        }
    }

    pub fn from_resolved(persona: Arc<Persona>, resolved: Resolved) -> Self {
        Self {
            persona,
            backend: resolved.backend,
            provider: resolved.kind,
            model: resolved.model,
        }
    }

    pub fn name(&self) -> &str {
        &self.persona.name
    }
}

impl fmt::Debug for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Participant")
            .field("persona", &self.persona.name)
            .field("provider", &self.provider)
            .field("model", &self.model)
            .finish()
    }
}

/// The four participants of one run
#[derive(Debug, Clone)]
pub struct Participants {
    pub a: Participant,
    pub b: Participant,
    pub synthesizer: Participant,
    pub stress_tester: Participant,
}

impl Participants {
    /// Every member of the cast on the same backend
    pub fn from_cast(cast: &Cast, backend: Arc<dyn Backend>) -> Self {
        let bind = |persona: &Arc<Persona>| Participant::new(persona.clone(), backend.clone());
        Self {
            a: bind(&cast.debater_a),
            b: bind(&cast.debater_b),
            synthesizer: bind(&cast.synthesizer),
            stress_tester: bind(&cast.stress_tester),
        }
    }

    pub fn seat(&self, seat: Seat) -> &Participant {
        match seat {
            Seat::A => &self.a,
            Seat::B => &self.b,
        }
    }

    pub fn records(&self) -> Vec<ParticipantRecord> {
        [
            ("debater A", &self.a),
            ("debater B", &self.b),
            ("synthesizer", &self.synthesizer),
            ("stress tester", &self.stress_tester),
        ]
        .into_iter()
        .map(|(role, p)| ParticipantRecord {
            role: role.to_string(),
            persona: p.persona.name.clone(),
            provider: p.provider,
            model: p.model.clone(),
        })
        .collect()
    }
}

/// Fixed parameters of a run
#[derive(Debug, Clone, PartialEq)]
pub struct NegotiationSettings {
    pub rounds: u32,
    pub order: RoundOrder,
    pub invocation_timeout: Duration,
    pub strict_verdict: bool,
    pub strict_synthesis: bool,
    pub limits: PromptLimits,
}

impl Default for NegotiationSettings {
    fn default() -> Self {
        Self {
            rounds: 3,
            order: RoundOrder::Sequential,
            invocation_timeout: Duration::from_secs(120),
            strict_verdict: false,
            strict_synthesis: false,
            limits: PromptLimits::default(),
        }
    }
}

/// One configured negotiation, ready to run
pub struct Negotiation {
    topic: String,
    participants: Participants,
    settings: NegotiationSettings,
    composer: Composer,
    mode: BrainMode,
    observer: Arc<dyn NegotiationObserver>,
}

impl Negotiation {
    /// Validate the configuration. Nothing is invoked here.
    pub fn new(
        topic: impl Into<String>,
        participants: Participants,
        settings: NegotiationSettings,
    ) -> Result<Self> {
        let topic = topic.into();
        if topic.trim().is_empty() {
            return Err(Error::Config("Topic must not be empty".to_string()));
        }
        if settings.rounds == 0 {
            return Err(Error::Config("Round count must be at least 1".to_string()));
        }

        Cast::new(
            participants.a.persona.clone(),
            participants.b.persona.clone(),
            participants.synthesizer.persona.clone(),
            participants.stress_tester.persona.clone(),
        )?;

        let mode = BrainMode::for_participants(&participants);
        let composer = Composer::new(settings.rounds, settings.limits)
            .with_mode(mode.label())
            .with_anchors(
                participants.a.persona.anchors.clone(),
                participants.b.persona.anchors.clone(),
            );

        Ok(Self {
            topic,
            participants,
            settings,
            composer,
            mode,
            observer: Arc::new(TracingObserver),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn NegotiationObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn mode(&self) -> BrainMode {
        self.mode
    }

    pub fn participants(&self) -> &Participants {
        &self.participants
    }

    pub fn settings(&self) -> &NegotiationSettings {
        &self.settings
    }

    /// Run every round, the synthesis and the stress test
    ///
    /// Any failed invocation aborts the run; no partial transcript is
    /// produced.
    pub async fn run(&self) -> Result<Transcript> {
        let mut machine = negotiation_machine(self.settings.rounds)?;

        match self.drive(&mut machine).await {
            Ok(transcript) => Ok(transcript),
            Err(err) => {
                if let Err(e) = machine.transition_to(NegotiationPhase::Failed) {
                    debug!(error = %e, "Could not mark negotiation failed");
                }
                self.emit(NegotiationEvent::Failed {
                    stage: err.stage(),
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Run, then hand the transcript to a sink
    pub async fn run_and_record(&self, sink: &dyn TranscriptSink) -> Result<Transcript> {
        let transcript = self.run().await?;
        sink.record(&transcript)?;
        Ok(transcript)
    }

    async fn drive(&self, machine: &mut StateMachine<NegotiationPhase>) -> Result<Transcript> {
        let started_at = Utc::now();
        let run_start = Instant::now();
        let total = self.settings.rounds;
        let mut positions = Vec::with_capacity(2 * total as usize);
        let mut timings = Vec::new();

        info!(
            topic = %self.topic,
            rounds = total,
            order = %self.settings.order,
            mode = %self.mode,
            "Negotiation starting"
        );

        let round_start = Instant::now();
        self.emit(NegotiationEvent::RoundStarted { round: 1, total });
        let opening = self.composer.compose(&self.topic, Round::opening(), None)?;
        let (mut last_a, mut last_b) = tokio::try_join!(
            self.take_turn(Seat::A, 1, &opening),
            self.take_turn(Seat::B, 1, &opening),
        )?;
        self.finish_round(1, [&last_a, &last_b], round_start, &mut positions, &mut timings);

        for index in 2..=total {
            machine.transition_to(NegotiationPhase::Round(index))?;
            let round_start = Instant::now();
            self.emit(NegotiationEvent::RoundStarted { round: index, total });

            let round = Round::new(index)
                .ok_or_else(|| Error::Other(format!("Invalid round index {}", index)))?;

            let (a, b) = match self.settings.order {
                RoundOrder::Sequential => {
                    let prompt_a = self.composer.compose(&self.topic, round, Some(&last_b))?;
                    let a = self.take_turn(Seat::A, index, &prompt_a).await?;
                    let prompt_b = self.composer.compose(&self.topic, round, Some(&a))?;
                    let b = self.take_turn(Seat::B, index, &prompt_b).await?;
                    (a, b)
                }
                RoundOrder::Symmetric => {
                    let prompt_a = self.composer.compose(&self.topic, round, Some(&last_b))?;
                    let prompt_b = self.composer.compose(&self.topic, round, Some(&last_a))?;
                    tokio::try_join!(
                        self.take_turn(Seat::A, index, &prompt_a),
                        self.take_turn(Seat::B, index, &prompt_b),
                    )?
                }
            };
            last_a = a;
            last_b = b;
            self.finish_round(index, [&last_a, &last_b], round_start, &mut positions, &mut timings);
        }

        machine.transition_to(NegotiationPhase::Synthesis)?;
        let phase_start = Instant::now();
        self.emit(NegotiationEvent::SynthesisStarted);
        let prompt = self.composer.compose_synthesis(&self.topic, &last_a, &last_b);
        let raw = self
            .invoke(&self.participants.synthesizer, Stage::Synthesis, &prompt)
            .await?;
        let synthesis =
            SynthesisArtifact::parse(self.topic.as_str(), raw).validate(self.settings.strict_synthesis)?;
        let elapsed = phase_start.elapsed();
        timings.push(timing("synthesis", elapsed));
        self.emit(NegotiationEvent::SynthesisCompleted {
            missing: synthesis.missing.clone(),
            elapsed,
        });

        machine.transition_to(NegotiationPhase::StressTest)?;
        let phase_start = Instant::now();
        self.emit(NegotiationEvent::StressTestStarted);
        let prompt =
            self.composer
                .compose_stress_test(&self.topic, &last_a, &last_b, &synthesis.raw);
        let raw = self
            .invoke(&self.participants.stress_tester, Stage::StressTest, &prompt)
            .await?;
        let stress_test = StressTestVerdict::parse(raw, self.settings.strict_verdict)?;
        let elapsed = phase_start.elapsed();
        timings.push(timing("stress test", elapsed));
        self.emit(NegotiationEvent::StressTestCompleted {
            verdict: stress_test.verdict,
            inferred: stress_test.inferred,
            elapsed,
        });

        machine.transition_to(NegotiationPhase::Done)?;
        self.emit(NegotiationEvent::Completed {
            verdict: stress_test.verdict,
            elapsed: run_start.elapsed(),
        });

        Ok(Transcript {
            topic: self.topic.clone(),
            started_at,
            completed_at: Utc::now(),
            mode: self.mode.label().to_string(),
            round_order: self.settings.order,
            rounds: total,
            participants: self.participants.records(),
            tension: tension::score(&positions),
            positions,
            final_a: last_a,
            final_b: last_b,
            synthesis,
            stress_test,
            timings,
        })
    }

    async fn take_turn(&self, seat: Seat, round: u32, instruction: &str) -> Result<Position> {
        let participant = self.participants.seat(seat);
        let stage = Stage::Round { index: round, seat };
        let text = self.invoke(participant, stage, instruction).await?;

        let position = Position::new(participant.name(), seat, round, text);
        self.emit(NegotiationEvent::PositionRecorded {
            position: position.clone(),
        });
        Ok(position)
    }

    /// One timeout-bounded model call, attributed to its stage on failure
    async fn invoke(&self, participant: &Participant, stage: Stage, instruction: &str) -> Result<String> {
        debug!(
            stage = %stage,
            persona = %participant.name(),
            provider = %participant.provider,
            model = %participant.model,
            prompt_chars = instruction.len(),
            "Invoking model"
        );

        let invocation = Invocation {
            persona: &participant.persona,
            instruction,
            model: &participant.model,
            max_output_tokens: self.settings.limits.max_output_tokens,
        };

        let failure = |message: String| Error::Invocation {
            stage,
            persona: participant.name().to_string(),
            message,
        };

        let timeout = self.settings.invocation_timeout;
        match tokio::time::timeout(timeout, participant.backend.invoke(&invocation)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(failure(e.to_string())),
            Err(_) => Err(failure(format!("timed out after {:?}", timeout))),
        }
    }

    fn finish_round(
        &self,
        round: u32,
        latest: [&Position; 2],
        started: Instant,
        positions: &mut Vec<Position>,
        timings: &mut Vec<PhaseTiming>,
    ) {
        positions.extend(latest.into_iter().cloned());
        let elapsed = started.elapsed();
        timings.push(timing(&format!("round {}", round), elapsed));
        self.emit(NegotiationEvent::RoundCompleted { round, elapsed });
    }

    fn emit(&self, event: NegotiationEvent) {
        self.observer.on_event(&event);
    }
}

fn timing(phase: &str, elapsed: Duration) -> PhaseTiming {
    PhaseTiming {
        phase: phase.to_string(),
        millis: elapsed.as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{RecordedCall, ScriptedBackend};
    use crate::config::PersonaConfig;
    use crate::negotiation::observer::tests::RecordingObserver;
    use crate::persona::PersonaBook;
    use crate::stress::Verdict;
    use crate::transcript::FileSink;
    use tempfile::TempDir;

    const VILLAGE: &str = "Should the Village onboard tenants before infrastructure is stable?";

    const SYNTHESIS_REPLY: &str = "### NUCLEUS\nA founding cohort on a frozen core.\n\n### SHELL\n- Anchors: none\n\n### CORONA\n- supports: staged rollout\n\n### ECHO\n- Rounds: 3";

    fn header_round(instruction: &str) -> Option<u32> {
        instruction
            .strip_prefix("NEGOTIATION ROUND ")?
            .split_whitespace()
            .next()?
            .parse()
            .ok()
    }

    /// Debaters answer `<name>-r<round>`; synthesis and stress test are well formed
    fn village_reply(inv: &Invocation<'_>) -> Result<String> {
        let instruction = inv.instruction;
        if instruction.starts_with("SYNTHESIS") {
            return Ok(SYNTHESIS_REPLY.to_string());
        }
        if instruction.starts_with("STRESS TEST") {
            return Ok("1. LOAD-BEARING ASSUMPTIONS:\n- the core stays frozen\n\n4. VERDICT: HOLDS".to_string());
        }
        let round = header_round(instruction).unwrap_or(0);
        Ok(format!("{}-r{}", inv.persona.name, round))
    }

    fn cast() -> Cast {
        Cast::from_config(&PersonaBook::with_builtins(), &PersonaConfig::default()).unwrap()
    }

    fn settings(rounds: u32) -> NegotiationSettings {
        NegotiationSettings {
            rounds,
            ..NegotiationSettings::default()
        }
    }

    fn negotiation(backend: Arc<ScriptedBackend>, settings: NegotiationSettings) -> Negotiation {
        Negotiation::new(VILLAGE, Participants::from_cast(&cast(), backend), settings).unwrap()
    }

    fn find<'a>(calls: &'a [RecordedCall], persona: &str, round: u32) -> &'a RecordedCall {
        calls
            .iter()
            .find(|c| c.persona == persona && header_round(&c.instruction) == Some(round))
            .unwrap()
    }

    #[tokio::test]
    async fn test_invocation_counts_and_order() {
        let backend = Arc::new(ScriptedBackend::new(village_reply));
        negotiation(backend.clone(), settings(3)).run().await.unwrap();

        let calls = backend.calls();
        assert_eq!(calls.len(), 8);
        assert!(calls[..6].iter().all(|c| header_round(&c.instruction).is_some()));
        assert!(calls[6].instruction.starts_with("SYNTHESIS"));
        assert_eq!(calls[6].persona, "The Loom");
        assert!(calls[7].instruction.starts_with("STRESS TEST"));
        assert_eq!(calls[7].persona, "Seer");
    }

    #[tokio::test]
    async fn test_round_one_prompts_are_independent() {
        let backend = Arc::new(ScriptedBackend::new(village_reply));
        negotiation(backend.clone(), settings(2)).run().await.unwrap();

        let calls = backend.calls();
        let a = find(&calls, "Boolean", 1);
        let b = find(&calls, "Roux", 1);
        assert_eq!(a.instruction, b.instruction);
        assert!(!a.instruction.contains("Roux-r"));
        assert!(!b.instruction.contains("Boolean-r"));
    }

    #[tokio::test]
    async fn test_sequential_context_is_asymmetric() {
        let backend = Arc::new(ScriptedBackend::new(village_reply));
        negotiation(backend.clone(), settings(3)).run().await.unwrap();

        let calls = backend.calls();
        for round in 2..=3 {
            let a = find(&calls, "Boolean", round);
            assert!(a.instruction.contains(&format!("Roux-r{}", round - 1)));

            let b = find(&calls, "Roux", round);
            assert!(b.instruction.contains(&format!("Boolean-r{}", round)));
            assert!(!b.instruction.contains(&format!("Boolean-r{}", round - 1)));
        }
    }

    #[tokio::test]
    async fn test_symmetric_context_uses_previous_round() {
        let backend = Arc::new(ScriptedBackend::new(village_reply));
        let settings = NegotiationSettings {
            order: RoundOrder::Symmetric,
            ..settings(3)
        };
        let transcript = negotiation(backend.clone(), settings).run().await.unwrap();

        let calls = backend.calls();
        let b = find(&calls, "Roux", 2);
        assert!(b.instruction.contains("Boolean-r1"));
        assert!(!b.instruction.contains("Boolean-r2"));
        assert_eq!(transcript.round_order, RoundOrder::Symmetric);
    }

    #[tokio::test]
    async fn test_village_scenario() {
        let backend = Arc::new(ScriptedBackend::new(village_reply));
        let observer = Arc::new(RecordingObserver::default());
        let transcript = negotiation(backend, settings(3))
            .with_observer(observer.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(transcript.topic, VILLAGE);
        assert_eq!(transcript.mode, "SIMULATION");
        assert_eq!(transcript.positions.len(), 6);
        assert_eq!(transcript.final_a, Position::new("Boolean", Seat::A, 3, "Boolean-r3"));
        assert_eq!(transcript.final_b, Position::new("Roux", Seat::B, 3, "Roux-r3"));
        assert!(transcript.synthesis.is_complete());
        assert_eq!(transcript.stress_test.verdict, Verdict::Holds);
        assert!(!transcript.stress_test.inferred);
        assert_eq!(transcript.stress_test.assumptions, vec!["the core stays frozen"]);
        assert_eq!(transcript.timings.len(), 5);
        assert_eq!(transcript.participants.len(), 4);

        let events = observer.events();
        assert_eq!(events.first(), Some(&NegotiationEvent::RoundStarted { round: 1, total: 3 }));
        assert!(matches!(
            events.last(),
            Some(NegotiationEvent::Completed {
                verdict: Verdict::Holds,
                ..
            })
        ));
        let positions = events
            .iter()
            .filter(|e| matches!(e, NegotiationEvent::PositionRecorded { .. }))
            .count();
        assert_eq!(positions, 6);
    }

    #[tokio::test]
    async fn test_failure_at_round_two_stops_run() {
        let backend = Arc::new(ScriptedBackend::new(|inv| {
            if inv.persona.name == "Boolean" && header_round(inv.instruction) == Some(2) {
                return Err(Error::Backend("anthropic rate limit exceeded".to_string()));
            }
            village_reply(inv)
        }));
        let observer = Arc::new(RecordingObserver::default());
        let dir = TempDir::new().unwrap();
        let sink = FileSink::new(dir.path());

        let err = negotiation(backend.clone(), settings(3))
            .with_observer(observer.clone())
            .run_and_record(&sink)
            .await
            .unwrap_err();

        assert_eq!(
            err.stage(),
            Some(Stage::Round {
                index: 2,
                seat: Seat::A
            })
        );
        assert!(err.to_string().contains("rate limit"));

        let calls = backend.calls();
        assert_eq!(calls.len(), 3);
        assert!(!calls.iter().any(|c| c.persona == "The Loom" || c.persona == "Seer"));

        assert!(matches!(
            observer.events().last(),
            Some(NegotiationEvent::Failed { stage: Some(_), .. })
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_single_round_never_composes_rebuttal() {
        let backend = Arc::new(ScriptedBackend::new(village_reply));
        let transcript = negotiation(backend.clone(), settings(1)).run().await.unwrap();

        let calls = backend.calls();
        assert_eq!(calls.len(), 4);
        assert!(!calls.iter().any(|c| c.instruction.contains("REVISED POSITION")));
        assert_eq!(transcript.final_a.round, 1);
    }

    #[tokio::test]
    async fn test_timeout_is_invocation_failure() {
        let backend = Arc::new(
            ScriptedBackend::new(village_reply).with_delay(Duration::from_millis(500)),
        );
        let settings = NegotiationSettings {
            invocation_timeout: Duration::from_millis(20),
            ..settings(2)
        };

        let err = negotiation(backend, settings).run().await.unwrap_err();
        assert!(err.is_invocation_failure());
        assert!(matches!(err.stage(), Some(Stage::Round { index: 1, .. })));
        assert!(err.to_string().contains("timed out"));
    }

    fn no_verdict_reply(inv: &Invocation<'_>) -> Result<String> {
        if inv.instruction.starts_with("STRESS TEST") {
            return Ok("I have concerns but no conclusion.".to_string());
        }
        village_reply(inv)
    }

    #[tokio::test]
    async fn test_missing_verdict_inferred_or_strict() {
        let lenient = negotiation(Arc::new(ScriptedBackend::new(no_verdict_reply)), settings(1))
            .run()
            .await
            .unwrap();
        assert_eq!(lenient.stress_test.verdict, Verdict::Fragile);
        assert!(lenient.stress_test.inferred);

        let strict = NegotiationSettings {
            strict_verdict: true,
            ..settings(1)
        };
        let err = negotiation(Arc::new(ScriptedBackend::new(no_verdict_reply)), strict)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedVerdict { .. }));
    }

    #[tokio::test]
    async fn test_strict_synthesis_stops_before_stress_test() {
        let backend = Arc::new(ScriptedBackend::new(|inv| {
            if inv.instruction.starts_with("SYNTHESIS") {
                return Ok("Just a paragraph.".to_string());
            }
            village_reply(inv)
        }));
        let strict = NegotiationSettings {
            strict_synthesis: true,
            ..settings(1)
        };

        let err = negotiation(backend.clone(), strict).run().await.unwrap_err();
        assert!(matches!(err, Error::MalformedSynthesis { .. }));
        assert!(!backend.calls().iter().any(|c| c.persona == "Seer"));
    }

    #[tokio::test]
    async fn test_synthesis_prompt_is_idempotent_across_runs() {
        let first = Arc::new(ScriptedBackend::new(village_reply));
        let second = Arc::new(ScriptedBackend::new(village_reply));
        negotiation(first.clone(), settings(2)).run().await.unwrap();
        negotiation(second.clone(), settings(2)).run().await.unwrap();

        assert_eq!(first.calls()[4].instruction, second.calls()[4].instruction);
    }

    #[tokio::test]
    async fn test_run_and_record_writes_transcript() {
        let dir = TempDir::new().unwrap();
        let sink = FileSink::new(dir.path());
        let backend = Arc::new(ScriptedBackend::new(village_reply));

        let transcript = negotiation(backend, settings(1))
            .run_and_record(&sink)
            .await
            .unwrap();

        let (json, md) = sink.paths_for(&transcript);
        assert!(json.exists());
        assert!(md.exists());
    }

    #[test]
    fn test_configuration_errors() {
        let backend: Arc<dyn Backend> = Arc::new(ScriptedBackend::new(village_reply));
        let cast = cast();
        let participants = Participants::from_cast(&cast, backend.clone());

        assert!(matches!(
            Negotiation::new("  ", participants.clone(), settings(3)),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Negotiation::new(VILLAGE, participants.clone(), settings(0)),
            Err(Error::Config(_))
        ));

        let mut same = participants.clone();
        same.b = same.a.clone();
        assert!(matches!(
            Negotiation::new(VILLAGE, same, settings(3)),
            Err(Error::Config(_))
        ));

        let mut overlap = participants;
        overlap.stress_tester = overlap.b.clone();
        assert!(matches!(
            Negotiation::new(VILLAGE, overlap, settings(3)),
            Err(Error::Config(_))
        ));
    }
}
