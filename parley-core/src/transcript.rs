//! Transcript of a completed negotiation and where it is written

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backend::ProviderKind;
use crate::negotiation::{Position, RoundOrder};
use crate::stress::StressTestVerdict;
use crate::synthesis::SynthesisArtifact;
use crate::tension::TensionScore;
use crate::{Error, Result};

/// Who filled a role, and on which model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub role: String,
    pub persona: String,
    pub provider: ProviderKind,
    pub model: String,
}

/// Wall-clock time of one phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTiming {
    pub phase: String,
    pub millis: u64,
}

/// Everything a completed run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub topic: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Brain mode label, e.g. TRI-BRAIN
    pub mode: String,
    pub round_order: RoundOrder,
    pub rounds: u32,
    pub participants: Vec<ParticipantRecord>,
    /// Every position in production order
    pub positions: Vec<Position>,
    pub final_a: Position,
    pub final_b: Position,
    pub synthesis: SynthesisArtifact,
    pub stress_test: StressTestVerdict,
    pub tension: TensionScore,
    pub timings: Vec<PhaseTiming>,
}

impl Transcript {
    /// Total wall-clock time of all phases
    pub fn total_millis(&self) -> u64 {
        self.timings.iter().map(|t| t.millis).sum()
    }

    /// File name without extension: `negotiation-<slug>-<timestamp>`
    pub fn file_stem(&self) -> String {
        format!(
            "negotiation-{}-{}",
            slugify(&self.topic),
            self.started_at.format("%Y-%m-%dT%H-%M-%S")
        )
    }

    /// Human-readable rendering
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();

        out.push_str("# Negotiation Transcript\n\n");
        out.push_str(&format!("**Topic:** {}\n", self.topic));
        out.push_str(&format!("**Mode:** {}\n", self.mode));
        out.push_str(&format!("**Round order:** {}\n", self.round_order));
        out.push_str(&format!("**Started:** {}\n", self.started_at.to_rfc3339()));
        out.push_str(&format!("**Completed:** {}\n", self.completed_at.to_rfc3339()));
        out.push_str(&format!("**Rounds:** {}\n\n", self.rounds));

        out.push_str("## Participants\n\n");
        out.push_str("| Role | Persona | Provider | Model |\n");
        out.push_str("|------|---------|----------|-------|\n");
        for p in &self.participants {
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                p.role, p.persona, p.provider, p.model
            ));
        }
        out.push('\n');

        for round in 1..=self.rounds {
            out.push_str(&format!("---\n## Round {} of {}\n\n", round, self.rounds));
            for position in self.positions.iter().filter(|p| p.round == round) {
                out.push_str(&format!("### {}\n\n{}\n\n", position.persona, position.text.trim()));
            }
        }

        out.push_str("---\n## Synthesis\n\n");
        if !self.synthesis.missing.is_empty() {
            out.push_str(&format!(
                "> Missing sections: {}\n\n",
                self.synthesis.missing.join(", ")
            ));
        }
        out.push_str(self.synthesis.raw.trim());
        out.push_str("\n\n");

        out.push_str("---\n## Stress Test\n\n");
        out.push_str(&format!("**Verdict:** {}", self.stress_test.verdict));
        if self.stress_test.inferred {
            out.push_str(" (inferred, no verdict token found)");
        }
        out.push_str("\n\n");
        out.push_str(self.stress_test.raw.trim());
        out.push_str("\n\n");

        out.push_str("---\n## Tension\n\n");
        out.push_str(&format!(
            "**Score:** {} | friction {} | agreement {} | persistence {:.2}\n\n",
            self.tension, self.tension.friction, self.tension.agreement, self.tension.persistence
        ));

        out.push_str("## Timings\n\n");
        for timing in &self.timings {
            out.push_str(&format!("- {}: {} ms\n", timing.phase, timing.millis));
        }
        out.push_str(&format!("- total: {} ms\n", self.total_millis()));

        out
    }
}

/// Receives the transcript of a successful run
pub trait TranscriptSink: Send + Sync {
    fn record(&self, transcript: &Transcript) -> Result<()>;
}

/// Writes `<stem>.json` and `<stem>.md` into a directory
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// JSON and Markdown paths a transcript is written to
    pub fn paths_for(&self, transcript: &Transcript) -> (PathBuf, PathBuf) {
        let stem = transcript.file_stem();
        (
            self.dir.join(format!("{}.json", stem)),
            self.dir.join(format!("{}.md", stem)),
        )
    }
}

impl TranscriptSink for FileSink {
    fn record(&self, transcript: &Transcript) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            Error::Other(format!(
                "Failed to create output directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let (json_path, md_path) = self.paths_for(transcript);
        std::fs::write(&json_path, serde_json::to_string_pretty(transcript)?)?;
        std::fs::write(&md_path, transcript.to_markdown())?;

        info!(
            json = %json_path.display(),
            markdown = %md_path.display(),
            "Transcript written"
        );
        Ok(())
    }
}

fn slugify(topic: &str) -> String {
    let mut slug = String::new();
    for c in topic.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    let slug: String = slug.chars().take(60).collect();
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::negotiation::Seat;
    use crate::tension;
    use chrono::TimeZone;
    use tempfile::TempDir;

    pub(crate) fn sample() -> Transcript {
        let positions = vec![
            Position::new("Boolean", Seat::A, 1, "However, door three."),
            Position::new("Roux", Seat::B, 1, "Fix the soil."),
        ];
        let started_at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 5).unwrap();
        Transcript {
            topic: "Should the Village onboard tenants?".to_string(),
            started_at,
            completed_at: started_at,
            mode: "SIMULATION".to_string(),
            round_order: RoundOrder::Sequential,
            rounds: 1,
            participants: vec![ParticipantRecord {
                role: "debater A".to_string(),
                persona: "Boolean".to_string(),
                provider: ProviderKind::Simulated,
                model: "scripted".to_string(),
            }],
            final_a: positions[0].clone(),
            final_b: positions[1].clone(),
            tension: tension::score(&positions),
            positions,
            synthesis: SynthesisArtifact::parse("t", "### NUCLEUS\nmerged"),
            stress_test: StressTestVerdict::parse("no verdict here", false).unwrap(),
            timings: vec![
                PhaseTiming {
                    phase: "round 1".to_string(),
                    millis: 10,
                },
                PhaseTiming {
                    phase: "synthesis".to_string(),
                    millis: 5,
                },
            ],
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Should the Village onboard tenants?"), "should-the-village-onboard-tenants");
        assert_eq!(slugify("  --AI & You--  "), "ai-you");
        assert_eq!(slugify("???"), "untitled");
        assert!(slugify(&"word ".repeat(40)).len() <= 60);
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(
            sample().file_stem(),
            "negotiation-should-the-village-onboard-tenants-2026-03-01T12-30-05"
        );
    }

    #[test]
    fn test_markdown_contents() {
        let md = sample().to_markdown();
        assert!(md.contains("**Topic:** Should the Village onboard tenants?"));
        assert!(md.contains("| debater A | Boolean | simulated | scripted |"));
        assert!(md.contains("## Round 1 of 1"));
        assert!(md.contains("### Roux\n\nFix the soil."));
        assert!(md.contains("> Missing sections: SHELL, CORONA, ECHO"));
        assert!(md.contains("**Verdict:** FRAGILE (inferred"));
        assert!(md.contains("- total: 15 ms"));
    }

    #[test]
    fn test_file_sink_writes_both_files() {
        let dir = TempDir::new().unwrap();
        let sink = FileSink::new(dir.path().join("out"));
        let transcript = sample();

        sink.record(&transcript).unwrap();

        let (json_path, md_path) = sink.paths_for(&transcript);
        assert!(md_path.exists());
        let json = std::fs::read_to_string(json_path).unwrap();
        let back: Transcript = serde_json::from_str(&json).unwrap();
        assert_eq!(back.topic, transcript.topic);
        assert_eq!(back.stress_test.verdict, transcript.stress_test.verdict);
        assert!(json.contains("\"FRAGILE\""));
    }
}
