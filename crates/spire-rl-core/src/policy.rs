//! Decision-maker contract

use crate::action::LegalityMask;

/// Anything that turns an observation and a legality mask into an action index.
///
/// Implementations must return an index marked legal in `mask`; the engine never
/// calls a policy on screens the autopilot resolves by itself.
pub trait Policy: Send {
    fn decide(&mut self, observation: &[f32], mask: &LegalityMask) -> usize;
}
