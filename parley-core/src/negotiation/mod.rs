//! The negotiation protocol
//!
//! Two debating personas exchange positions over a fixed number of rounds,
//! a neutral persona merges their final positions, and a third persona
//! stress-tests the merge.

mod engine;
mod observer;
mod round;
mod state;

pub use engine::{Negotiation, NegotiationSettings, Participant, Participants};
pub use observer::{NegotiationEvent, NegotiationObserver, PrintObserver, TracingObserver};
pub use round::{Position, Round, RoundOrder, RoundPhase, Seat, Stage};
pub use state::{negotiation_machine, NegotiationPhase, StateMachine, Workflow};
