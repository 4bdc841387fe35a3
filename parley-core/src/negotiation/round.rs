//! Rounds, seats and positions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which debating seat a persona occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Seat {
    A,
    B,
}

impl Seat {
    /// The opposite seat
    pub fn other(&self) -> Seat {
        match self {
            Seat::A => Seat::B,
            Seat::B => Seat::A,
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seat::A => write!(f, "A"),
            Seat::B => write!(f, "B"),
        }
    }
}

/// Phase of a negotiation round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundPhase {
    /// First round, no counterpart context
    Opening,
    /// Every later round, reacting to the counterpart
    Rebuttal,
}

/// A single round of the negotiation loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    /// 1-based round index
    pub index: u32,
    /// Opening only at index 1
    pub phase: RoundPhase,
}

impl Round {
    /// Build the round for a 1-based index. Index 0 is invalid.
    pub fn new(index: u32) -> Option<Self> {
        match index {
            0 => None,
            1 => Some(Self {
                index,
                phase: RoundPhase::Opening,
            }),
            _ => Some(Self {
                index,
                phase: RoundPhase::Rebuttal,
            }),
        }
    }

    /// The opening round
    pub fn opening() -> Self {
        Self {
            index: 1,
            phase: RoundPhase::Opening,
        }
    }

    pub fn is_opening(&self) -> bool {
        self.phase == RoundPhase::Opening
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "round {}", self.index)
    }
}

/// Where in the protocol something happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// A debating invocation
    Round { index: u32, seat: Seat },
    /// The single synthesis invocation
    Synthesis,
    /// The single stress-test invocation
    StressTest,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Round { index, seat } => write!(f, "round {} (seat {})", index, seat),
            Stage::Synthesis => write!(f, "synthesis"),
            Stage::StressTest => write!(f, "stress test"),
        }
    }
}

/// How rebuttal rounds thread context between the two debaters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundOrder {
    /// A answers B's previous-round position, then B answers A's
    /// current-round position. Both calls are sequential.
    #[default]
    Sequential,
    /// Both answer the other's previous-round position, concurrently.
    Symmetric,
}

impl RoundOrder {
    pub fn name(&self) -> &'static str {
        match self {
            RoundOrder::Sequential => "sequential",
            RoundOrder::Symmetric => "symmetric",
        }
    }
}

impl fmt::Display for RoundOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for RoundOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequential" | "seq" | "asymmetric" => Ok(RoundOrder::Sequential),
            "symmetric" | "sym" | "parallel" => Ok(RoundOrder::Symmetric),
            _ => Err(format!("Unknown round order: {}", s)),
        }
    }
}

/// One persona's output for one round. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Name of the persona that produced it
    pub persona: String,
    /// Seat the persona occupied
    pub seat: Seat,
    /// 1-based round index
    pub round: u32,
    /// Generated text, stored verbatim
    pub text: String,
}

impl Position {
    pub fn new(persona: impl Into<String>, seat: Seat, round: u32, text: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
            seat,
            round,
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_phase_by_index() {
        assert!(Round::new(0).is_none());
        assert_eq!(Round::new(1).unwrap().phase, RoundPhase::Opening);
        assert_eq!(Round::new(2).unwrap().phase, RoundPhase::Rebuttal);
        assert_eq!(Round::new(7).unwrap().phase, RoundPhase::Rebuttal);
        assert!(Round::opening().is_opening());
    }

    #[test]
    fn test_stage_display() {
        let stage = Stage::Round {
            index: 2,
            seat: Seat::A,
        };
        assert_eq!(stage.to_string(), "round 2 (seat A)");
        assert_eq!(Stage::StressTest.to_string(), "stress test");
    }

    #[test]
    fn test_round_order_from_str() {
        assert_eq!("seq".parse::<RoundOrder>().unwrap(), RoundOrder::Sequential);
        assert_eq!(
            "Symmetric".parse::<RoundOrder>().unwrap(),
            RoundOrder::Symmetric
        );
        assert!("sideways".parse::<RoundOrder>().is_err());
        assert_eq!(RoundOrder::default(), RoundOrder::Sequential);
    }

    #[test]
    fn test_seat_other() {
        assert_eq!(Seat::A.other(), Seat::B);
        assert_eq!(Seat::B.other(), Seat::A);
    }
}
