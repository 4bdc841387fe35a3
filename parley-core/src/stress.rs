//! Stress-test evaluation and verdict extraction

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::sections;
use crate::{Error, Result};

/// Section names the stress-test instruction mandates, in order
pub const STRESS_TEST_SECTIONS: [&str; 4] = [
    "LOAD-BEARING ASSUMPTIONS",
    "FAILURE MODES",
    "MISSING VOICES",
    "VERDICT",
];

const VERDICT_SECTION: usize = 3;

/// Closed set of stress-test outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Holds,
    HoldsWithConditions,
    Fragile,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Holds => "HOLDS",
            Verdict::HoldsWithConditions => "HOLDS_WITH_CONDITIONS",
            Verdict::Fragile => "FRAGILE",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of the stress-test stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StressTestVerdict {
    pub verdict: Verdict,
    pub assumptions: Vec<String>,
    pub failure_modes: Vec<String>,
    pub missing_voices: Vec<String>,
    /// True when no verdict token was found and FRAGILE was assumed
    pub inferred: bool,
    pub raw: String,
}

impl StressTestVerdict {
    /// Parse stress-test output.
    ///
    /// Only the uppercase literals count. The VERDICT section is searched
    /// first, then the whole text. Two different literals are ambiguous and
    /// treated like a missing verdict: FRAGILE is assumed, or an error is
    /// returned when `strict` is set.
    pub fn parse(raw: impl Into<String>, strict: bool) -> Result<Self> {
        let raw = raw.into();
        let found = sections::split(&raw, &STRESS_TEST_SECTIONS);

        let scan = match sections::find(&found, VERDICT_SECTION).map(find_verdict) {
            Some(Scan::Missing) | None => find_verdict(&raw),
            Some(scan) => scan,
        };

        let (verdict, inferred) = match scan {
            Scan::Found(v) => (v, false),
            _ if strict => return Err(Error::MalformedVerdict { raw }),
            Scan::Ambiguous(seen) => {
                warn!(
                    verdicts = %seen.iter().map(Verdict::as_str).collect::<Vec<_>>().join(", "),
                    "Stress test output names more than one verdict, assuming FRAGILE"
                );
                (Verdict::Fragile, true)
            }
            Scan::Missing => {
                warn!("Stress test output has no verdict token, assuming FRAGILE");
                (Verdict::Fragile, true)
            }
        };

        let list = |index: usize| {
            sections::find(&found, index)
                .map(sections::items)
                .unwrap_or_default()
        };

        Ok(Self {
            verdict,
            assumptions: list(0),
            failure_modes: list(1),
            missing_voices: list(2),
            inferred,
            raw,
        })
    }
}

#[derive(Debug, PartialEq)]
enum Scan {
    Found(Verdict),
    Ambiguous(Vec<Verdict>),
    Missing,
}

/// Distinct verdict literals in `text`.
///
/// Literals must be uppercase; HOLDS WITH CONDITIONS may be joined by spaces,
/// underscores or hyphens and is never read as HOLDS. A line naming all three
/// literals is an echo of the option list and is skipped.
fn find_verdict(text: &str) -> Scan {
    let mut seen: Vec<Verdict> = Vec::new();

    for line in text.lines() {
        let in_line = literals(line);
        if in_line.len() == 3 {
            continue;
        }
        for verdict in in_line {
            if !seen.contains(&verdict) {
                seen.push(verdict);
            }
        }
    }

    match seen.len() {
        0 => Scan::Missing,
        1 => Scan::Found(seen[0]),
        _ => Scan::Ambiguous(seen),
    }
}

fn literals(line: &str) -> Vec<Verdict> {
    let words: Vec<&str> = line
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let mut found = Vec::new();
    let mut i = 0;
    while i < words.len() {
        let verdict = match words[i] {
            "HOLDS" if words.get(i + 1..i + 3) == Some(&["WITH", "CONDITIONS"][..]) => {
                i += 2;
                Some(Verdict::HoldsWithConditions)
            }
            "HOLDS" => Some(Verdict::Holds),
            "FRAGILE" => Some(Verdict::Fragile),
            _ => None,
        };
        if let Some(v) = verdict {
            if !found.contains(&v) {
                found.push(v);
            }
        }
        i += 1;
    }
    found
}
