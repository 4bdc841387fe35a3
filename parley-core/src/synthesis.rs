//! The joint artifact produced by the synthesis stage

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::sections;
use crate::{Error, Result};

/// Section names the synthesis instruction mandates, in order
pub const SYNTHESIS_SECTIONS: [&str; 4] = ["NUCLEUS", "SHELL", "CORONA", "ECHO"];

/// Merged artifact built from both final positions
///
/// The raw text is always kept verbatim. Parsed sections are `None` when the
/// model did not produce them; their names are listed in `missing`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisArtifact {
    pub topic: String,
    /// The merged core content
    pub nucleus: Option<String>,
    /// Metadata, including the anchors that grounded each party
    pub shell: Option<String>,
    /// Relational links to other positions and ideas
    pub corona: Option<String>,
    /// Provenance: who, how many rounds, which mode
    pub echo: Option<String>,
    pub raw: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
}

impl SynthesisArtifact {
    /// Parse model output into an artifact. Never fails; see [`Self::validate`].
    pub fn parse(topic: impl Into<String>, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let found = sections::split(&raw, &SYNTHESIS_SECTIONS);

        let take = |index: usize| {
            sections::find(&found, index)
                .filter(|body| !body.is_empty())
                .map(str::to_string)
        };

        let nucleus = take(0);
        let shell = take(1);
        let corona = take(2);
        let echo = take(3);

        let missing = [&nucleus, &shell, &corona, &echo]
            .iter()
            .zip(SYNTHESIS_SECTIONS)
            .filter(|(section, _)| section.is_none())
            .map(|(_, name)| name.to_string())
            .collect();

        Self {
            topic: topic.into(),
            nucleus,
            shell,
            corona,
            echo,
            raw,
            missing,
        }
    }

    /// Whether every mandated section was found
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Accept or reject a malformed artifact
    ///
    /// In strict mode any missing section is an error. Otherwise the artifact
    /// is kept as-is and the gap is logged.
    pub fn validate(self, strict: bool) -> Result<Self> {
        if self.is_complete() {
            return Ok(self);
        }
        if strict {
            return Err(Error::MalformedSynthesis {
                missing: self.missing,
            });
        }
        warn!(
            missing = %self.missing.join(", "),
            "Synthesis output is missing sections, keeping raw text"
        );
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = "\
## JOINT ARTIFACT

### NUCLEUS
Onboard a small founding cohort onto a deliberately stable core.

### SHELL
- Topic: Village onboarding
- Anchors (Boolean): PHIL-005
- Anchors (Roux): PHIL-012

### CORONA
- supports: staged rollout
- tensions: growth targets

### ECHO
- Participants: Boolean, Roux
- Rounds: 3
- Mode: TRI-BRAIN
";

    #[test]
    fn test_parse_well_formed() {
        let artifact = SynthesisArtifact::parse("Village onboarding", WELL_FORMED);
        assert!(artifact.is_complete());
        assert_eq!(
            artifact.nucleus.as_deref(),
            Some("Onboard a small founding cohort onto a deliberately stable core.")
        );
        assert!(artifact.shell.as_deref().unwrap().contains("PHIL-012"));
        assert!(artifact.echo.as_deref().unwrap().contains("Rounds: 3"));
        assert_eq!(artifact.raw, WELL_FORMED);
    }

    #[test]
    fn test_missing_sections_recorded() {
        let artifact = SynthesisArtifact::parse("t", "NUCLEUS: just the core\n\nCORONA: links");
        assert_eq!(artifact.missing, vec!["SHELL", "ECHO"]);
        assert!(artifact.nucleus.is_some());
        assert!(artifact.shell.is_none());
    }

    #[test]
    fn test_empty_section_counts_as_missing() {
        let artifact = SynthesisArtifact::parse("t", "### NUCLEUS\n### SHELL\nmeta\n### CORONA\nx\n### ECHO\ny");
        assert_eq!(artifact.missing, vec!["NUCLEUS"]);
    }

    #[test]
    fn test_validate_lenient_keeps_raw() {
        let artifact = SynthesisArtifact::parse("t", "free-form prose with no headings");
        assert_eq!(artifact.missing.len(), 4);
        let kept = artifact.validate(false).unwrap();
        assert_eq!(kept.raw, "free-form prose with no headings");
    }

    #[test]
    fn test_validate_strict_rejects() {
        let artifact = SynthesisArtifact::parse("t", "### NUCLEUS\nonly this");
        match artifact.validate(true) {
            Err(Error::MalformedSynthesis { missing }) => {
                assert_eq!(missing, vec!["SHELL", "CORONA", "ECHO"]);
            }
            other => panic!("expected MalformedSynthesis, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_strict_accepts_complete() {
        let artifact = SynthesisArtifact::parse("t", WELL_FORMED);
        assert!(artifact.validate(true).is_ok());
    }
}
