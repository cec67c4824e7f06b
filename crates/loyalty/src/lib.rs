//! Session points — the ledger that accumulates a viewer's points and the
//! calculator that turns answers, form completions and slide visits into
//! point amounts.
//!
//! The ledger has no knowledge of the trigger bus; whoever adds points
//! relays the gain.

pub mod calculator;
pub mod ledger;

pub use calculator::{AnswerOutcome, PointsAward, PointsCalculator};
pub use ledger::{PointsGain, PointsLedger};
