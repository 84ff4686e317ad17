//! Account safety controls.
//!
//! The kill switch is the last line of defense against runaway risk: a
//! single authoritative state machine that decides whether trading is
//! permitted at all. Every transition attempt is written to the audit log
//! for forensic replay.

mod kill_switch;
mod legacy;

pub use kill_switch::{InvalidTransition, KillSwitch, KillSwitchError, KillSwitchState};
pub use legacy::LegacyRiskEvaluator;
