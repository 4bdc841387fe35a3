//! Instruction templates for every stage of a negotiation
//!
//! Templates are embedded Markdown files with `{{VARIABLE}}` placeholders.
//! Rendering is a single left-to-right pass: substituted values are never
//! re-scanned, so a position that happens to contain `{{TOPIC}}` is copied
//! verbatim and the output depends only on the inputs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::negotiation::{Position, Round, Seat};
use crate::{Error, Result};

const OPENING_PROMPT: &str = include_str!("prompts/opening.md");
const REBUTTAL_PROMPT: &str = include_str!("prompts/rebuttal.md");
const SYNTHESIS_PROMPT: &str = include_str!("prompts/synthesis.md");
const STRESS_TEST_PROMPT: &str = include_str!("prompts/stress_test.md");

/// Which instruction is being composed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Opening,
    Rebuttal,
    Synthesis,
    StressTest,
}

/// Get the raw template for a prompt kind
pub fn get_template(kind: PromptKind) -> &'static str {
    match kind {
        PromptKind::Opening => OPENING_PROMPT,
        PromptKind::Rebuttal => REBUTTAL_PROMPT,
        PromptKind::Synthesis => SYNTHESIS_PROMPT,
        PromptKind::StressTest => STRESS_TEST_PROMPT,
    }
}

/// Length directives embedded in the instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptLimits {
    /// Word limit for opening and rebuttal positions
    pub round_words: u32,
    /// Word limit for the joint artifact
    pub synthesis_words: u32,
    /// Word limit for the stress test
    pub stress_test_words: u32,
    /// Hard cap on generated tokens passed to the backend
    pub max_output_tokens: u32,
}

impl Default for PromptLimits {
    fn default() -> Self {
        Self {
            round_words: 300,
            synthesis_words: 400,
            stress_test_words: 400,
            max_output_tokens: 1024,
        }
    }
}

/// Context for rendering a prompt template
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    variables: HashMap<String, String>,
}

impl PromptContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Set a variable value (builder pattern)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }
}

/// Render a template string with variable substitution
///
/// Unset `{{UPPERCASE_NAME}}` placeholders become `(not specified)`; any
/// other `{{...}}` text is left alone.
pub fn render_template(template: &str, context: &PromptContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };

        let name = &after[..end];
        let is_placeholder =
            !name.is_empty() && name.chars().all(|c| c.is_ascii_uppercase() || c == '_');

        if is_placeholder {
            match context.variables.get(name) {
                Some(value) => out.push_str(value),
                None => out.push_str("(not specified)"),
            }
            rest = &after[end + 2..];
        } else {
            out.push_str("{{");
            rest = after;
        }
    }

    out.push_str(rest);
    out
}

/// Composes the instruction for every invocation of one run
///
/// All methods are pure: the same inputs always produce the same text.
#[derive(Debug, Clone)]
pub struct Composer {
    total_rounds: u32,
    limits: PromptLimits,
    mode: String,
    anchors_a: Vec<String>,
    anchors_b: Vec<String>,
}

impl Composer {
    pub fn new(total_rounds: u32, limits: PromptLimits) -> Self {
        Self {
            total_rounds,
            limits,
            mode: "(not specified)".to_string(),
            anchors_a: Vec::new(),
            anchors_b: Vec::new(),
        }
    }

    /// Mode label echoed in the synthesis provenance section
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    /// Principle identifiers grounding each seat, listed in the shell section
    pub fn with_anchors(mut self, anchors_a: Vec<String>, anchors_b: Vec<String>) -> Self {
        self.anchors_a = anchors_a;
        self.anchors_b = anchors_b;
        self
    }

    pub fn total_rounds(&self) -> u32 {
        self.total_rounds
    }

    /// Instruction for a debating round
    ///
    /// Round 1 ignores `context`. Later rounds require the counterpart's
    /// most recent position.
    pub fn compose(&self, topic: &str, round: Round, context: Option<&Position>) -> Result<String> {
        if round.index == 0 || round.index > self.total_rounds {
            return Err(Error::Prompt(format!(
                "Round {} is outside 1..={}",
                round.index, self.total_rounds
            )));
        }

        let base = PromptContext::new()
            .with("ROUND", round.index.to_string())
            .with("TOTAL_ROUNDS", self.total_rounds.to_string())
            .with("TOPIC", topic)
            .with("WORD_LIMIT", self.limits.round_words.to_string());

        if round.is_opening() {
            return Ok(render_template(get_template(PromptKind::Opening), &base));
        }

        let counterpart = context.ok_or_else(|| {
            Error::Prompt(format!(
                "Round {} needs the counterpart's latest position",
                round.index
            ))
        })?;

        let ctx = base
            .with("COUNTERPART", counterpart.persona.as_str())
            .with("COUNTERPART_POSITION", counterpart.text.as_str());
        Ok(render_template(get_template(PromptKind::Rebuttal), &ctx))
    }

    /// Instruction for the single synthesis invocation
    pub fn compose_synthesis(&self, topic: &str, position_a: &Position, position_b: &Position) -> String {
        let ctx = self
            .final_positions(topic, position_a, position_b)
            .with("ANCHORS_A", format_anchors(self.anchors_for(position_a.seat)))
            .with("ANCHORS_B", format_anchors(self.anchors_for(position_b.seat)))
            .with("MODE", self.mode.as_str())
            .with("WORD_LIMIT", self.limits.synthesis_words.to_string());

        render_template(get_template(PromptKind::Synthesis), &ctx)
    }

    /// Instruction for the single stress-test invocation
    pub fn compose_stress_test(
        &self,
        topic: &str,
        position_a: &Position,
        position_b: &Position,
        artifact: &str,
    ) -> String {
        let ctx = self
            .final_positions(topic, position_a, position_b)
            .with("ARTIFACT", artifact)
            .with("WORD_LIMIT", self.limits.stress_test_words.to_string());

        render_template(get_template(PromptKind::StressTest), &ctx)
    }

    fn final_positions(&self, topic: &str, a: &Position, b: &Position) -> PromptContext {
        PromptContext::new()
            .with("TOPIC", topic)
            .with("TOTAL_ROUNDS", self.total_rounds.to_string())
            .with("PARTY_A", a.persona.as_str())
            .with("PARTY_B", b.persona.as_str())
            .with("POSITION_A", a.text.as_str())
            .with("POSITION_B", b.text.as_str())
    }

    fn anchors_for(&self, seat: Seat) -> &[String] {
        match seat {
            Seat::A => &self.anchors_a,
            Seat::B => &self.anchors_b,
        }
    }
}

fn format_anchors(anchors: &[String]) -> String {
    if anchors.is_empty() {
        "(none declared; name the principles this party relied on)".to_string()
    } else {
        anchors.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC: &str = "Should the Village onboard tenants before infrastructure is stable?";

    fn composer() -> Composer {
        Composer::new(3, PromptLimits::default())
    }

    #[test]
    fn test_render_with_variables() {
        let ctx = PromptContext::new().with("NAME", "Boolean");
        assert_eq!(render_template("Hi {{NAME}}!", &ctx), "Hi Boolean!");
    }

    #[test]
    fn test_render_unset_placeholder() {
        let rendered = render_template("Mode: {{MODE}}", &PromptContext::new());
        assert_eq!(rendered, "Mode: (not specified)");
    }

    #[test]
    fn test_render_does_not_rescan_values() {
        let ctx = PromptContext::new()
            .with("A", "{{B}}")
            .with("B", "second");
        assert_eq!(render_template("{{A}} / {{B}}", &ctx), "{{B}} / second");
    }

    #[test]
    fn test_render_leaves_lowercase_braces() {
        let rendered = render_template("json {{not_a_var}} end", &PromptContext::new());
        assert_eq!(rendered, "json {{not_a_var}} end");

        let rendered = render_template("dangling {{OPEN", &PromptContext::new());
        assert_eq!(rendered, "dangling {{OPEN");
    }

    #[test]
    fn test_opening_prompt_sections() {
        let prompt = composer().compose(TOPIC, Round::opening(), None).unwrap();
        assert!(prompt.starts_with("NEGOTIATION ROUND 1 of 3"));
        assert!(prompt.contains(TOPIC));
        assert!(prompt.contains("1. POSITION"));
        assert!(prompt.contains("2. NON-NEGOTIABLES"));
        assert!(prompt.contains("3. FLEXIBLE AREAS"));
        assert!(prompt.contains("under 300 words"));
    }

    #[test]
    fn test_opening_ignores_context() {
        let other = Position::new("Roux", Seat::B, 1, "SECRET COUNTERPART TEXT");
        let with = composer().compose(TOPIC, Round::opening(), Some(&other)).unwrap();
        let without = composer().compose(TOPIC, Round::opening(), None).unwrap();
        assert_eq!(with, without);
        assert!(!with.contains("SECRET COUNTERPART TEXT"));
    }

    #[test]
    fn test_rebuttal_prompt_sections() {
        let other = Position::new("Roux", Seat::B, 1, "Fix the soil first.");
        let round = Round::new(2).unwrap();
        let prompt = composer().compose(TOPIC, round, Some(&other)).unwrap();

        assert!(prompt.starts_with("NEGOTIATION ROUND 2 of 3"));
        assert!(prompt.contains("Your counterpart, Roux"));
        assert!(prompt.contains("Fix the soil first."));
        assert!(prompt.contains("1. RESPONSE"));
        assert!(prompt.contains("2. REVISED POSITION"));
        assert!(prompt.contains("3. SYNTHESIS OPPORTUNITY"));
        assert!(prompt.contains("hidden third option"));
        assert!(prompt.contains("under 300 words"));
    }

    #[test]
    fn test_rebuttal_requires_context() {
        let err = composer()
            .compose(TOPIC, Round::new(2).unwrap(), None)
            .unwrap_err();
        assert!(matches!(err, Error::Prompt(_)));
    }

    #[test]
    fn test_round_out_of_range() {
        let other = Position::new("Roux", Seat::B, 3, "x");
        assert!(composer()
            .compose(TOPIC, Round::new(4).unwrap(), Some(&other))
            .is_err());
    }

    #[test]
    fn test_synthesis_prompt() {
        let a = Position::new("Boolean", Seat::A, 3, "Door number three.");
        let b = Position::new("Roux", Seat::B, 3, "Fix the system.");
        let prompt = composer()
            .with_mode("TRI-BRAIN")
            .with_anchors(vec!["PHIL-005".to_string()], Vec::new())
            .compose_synthesis(TOPIC, &a, &b);

        for section in ["### NUCLEUS", "### SHELL", "### CORONA", "### ECHO"] {
            assert!(prompt.contains(section), "missing {}", section);
        }
        assert!(prompt.contains("Door number three."));
        assert!(prompt.contains("Fix the system."));
        assert!(prompt.contains("Anchors (Boolean): PHIL-005"));
        assert!(prompt.contains("Anchors (Roux): (none declared"));
        assert!(prompt.contains("Mode: TRI-BRAIN"));
        assert!(prompt.contains("Rounds: 3"));
        assert!(prompt.contains("under 400 words"));
    }

    #[test]
    fn test_synthesis_prompt_is_deterministic() {
        let a = Position::new("Boolean", Seat::A, 3, "A final");
        let b = Position::new("Roux", Seat::B, 3, "B final");
        let c = composer();
        assert_eq!(c.compose_synthesis(TOPIC, &a, &b), c.compose_synthesis(TOPIC, &a, &b));
    }

    #[test]
    fn test_stress_test_prompt() {
        let a = Position::new("Boolean", Seat::A, 3, "A final");
        let b = Position::new("Roux", Seat::B, 3, "B final");
        let prompt = composer().compose_stress_test(TOPIC, &a, &b, "THE ARTIFACT");

        assert!(prompt.contains("THE ARTIFACT"));
        assert!(prompt.contains("1. LOAD-BEARING ASSUMPTIONS"));
        assert!(prompt.contains("2. FAILURE MODES"));
        assert!(prompt.contains("3. MISSING VOICES"));
        assert!(prompt.contains("4. VERDICT"));
        assert!(prompt.contains("exactly one of: HOLDS, HOLDS_WITH_CONDITIONS, FRAGILE"));
    }
}
