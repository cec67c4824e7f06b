//! Viewing session — wires navigation, the trigger bus, the points ledger
//! and the analytics queue together for one viewer walking through a flow.

pub mod session;
pub mod telemetry;

pub use session::FlowSession;
