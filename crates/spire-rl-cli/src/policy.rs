//! Baseline policy for smoke runs

use spire_rl_core::{ActionSlot, CANCEL_ACTION, END_TURN_ACTION, LegalityMask, Policy};

/// Plays the lowest legal card (or choice), then advances, then cancels.
/// Potions are only used when nothing else is legal.
#[derive(Debug, Default, Clone, Copy)]
pub struct GreedyPolicy;

impl Policy for GreedyPolicy {
    fn decide(&mut self, _observation: &[f32], mask: &LegalityMask) -> usize {
        mask.legal_indices()
            .find(|&i| matches!(ActionSlot::from_index(i), Some(ActionSlot::Card { .. })))
            .or_else(|| [END_TURN_ACTION, CANCEL_ACTION].into_iter().find(|&i| mask.is_legal(i)))
            .or_else(|| mask.legal_indices().next())
            .unwrap_or(END_TURN_ACTION)
    }
}
