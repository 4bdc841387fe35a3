//! Lexical tension score across debating rounds
//!
//! A rough measure of how much friction survives the negotiation: friction
//! markers versus agreement markers over all rounds, weighted by how much of
//! the first round's friction is still present in the last.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::negotiation::Position;

const FRICTION: &[&[&str]] = &[
    &["however"],
    &["but"],
    &["push", "back"],
    &["pushback"],
    &["challenge"],
    &["disagree"],
    &["reject"],
    &["insufficient"],
    &["not", "enough"],
    &["hold", "firm"],
    &["still", "requires"],
    &["critically"],
    &["unless"],
    &["without"],
    &["missing"],
    &["fail"],
    &["warn"],
    &["problematic"],
    &["weaker"],
    &["incomplete"],
];

const AGREEMENT: &[&[&str]] = &[
    &["agree"],
    &["accept"],
    &["acknowledge"],
    &["exactly"],
    &["correct"],
    &["valid"],
    &["incorporate"],
    &["embrace"],
    &["welcome"],
    &["appreciate"],
    &["concur"],
    &["right"],
    &["indeed"],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TensionLabel {
    Maximum,
    High,
    Medium,
    Low,
    Minimal,
}

impl TensionLabel {
    fn for_score(score: f64) -> Self {
        if score >= 0.8 {
            TensionLabel::Maximum
        } else if score >= 0.6 {
            TensionLabel::High
        } else if score >= 0.4 {
            TensionLabel::Medium
        } else if score >= 0.2 {
            TensionLabel::Low
        } else {
            TensionLabel::Minimal
        }
    }
}

impl fmt::Display for TensionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TensionLabel::Maximum => "MAXIMUM",
            TensionLabel::High => "HIGH",
            TensionLabel::Medium => "MEDIUM",
            TensionLabel::Low => "LOW",
            TensionLabel::Minimal => "MINIMAL",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundTension {
    pub round: u32,
    pub friction: u32,
    pub agreement: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensionScore {
    /// In [0, 1], two decimals
    pub score: f64,
    pub label: TensionLabel,
    pub friction: u32,
    pub agreement: u32,
    /// Share of first-round friction still present in the last round, capped at 1
    pub persistence: f64,
    pub per_round: Vec<RoundTension>,
}

impl fmt::Display for TensionScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} ({})", self.score, self.label)
    }
}

/// Score all debating positions, grouped by round
pub fn score(positions: &[Position]) -> TensionScore {
    let mut by_round: BTreeMap<u32, (u32, u32)> = BTreeMap::new();
    for position in positions {
        let words = words(&position.text);
        let entry = by_round.entry(position.round).or_default();
        entry.0 += count(FRICTION, &words);
        entry.1 += count(AGREEMENT, &words);
    }

    let per_round: Vec<RoundTension> = by_round
        .into_iter()
        .map(|(round, (friction, agreement))| RoundTension {
            round,
            friction,
            agreement,
        })
        .collect();

    let friction: u32 = per_round.iter().map(|r| r.friction).sum();
    let agreement: u32 = per_round.iter().map(|r| r.agreement).sum();

    let first = per_round.first().map(|r| r.friction).filter(|f| *f > 0).unwrap_or(1);
    let last = per_round.last().map(|r| r.friction).unwrap_or(0);
    let persistence = (f64::from(last) / f64::from(first)).min(1.0);

    let ratio = f64::from(friction) / (f64::from(friction) + f64::from(agreement) + 1.0);
    let raw = (ratio * 0.6 + persistence * 0.4).clamp(0.0, 1.0);
    let score = round2(raw);

    TensionScore {
        score,
        label: TensionLabel::for_score(score),
        friction,
        agreement,
        persistence: round2(persistence),
        per_round,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Lowercased words; hyphenated compounds stay one word
fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '-')
        .map(|w| w.trim_matches('-'))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn count(markers: &[&[&str]], words: &[String]) -> u32 {
    let mut n = 0;
    for marker in markers {
        n += words
            .windows(marker.len())
            .filter(|window| window.iter().zip(marker.iter()).all(|(w, m)| w == m))
            .count() as u32;
    }
    n
}
