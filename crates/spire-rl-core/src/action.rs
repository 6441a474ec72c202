//! Action space layout and legality masks
//!
//! The flat action space is split into disjoint ranges:
//!
//! | Range      | Meaning                     |
//! |------------|-----------------------------|
//! | `0..50`    | hand slot x target slot     |
//! | `50..65`   | potion slot x target slot   |
//! | `65`       | end turn / confirm / advance|
//! | `66`       | cancel / return             |
//!
//! Outside combat the low indices are reused as `choose <i>`.

use std::fmt;

/// Hand slots addressable by an action
pub const MAX_HAND_CARDS: usize = 10;
/// Target slots per card or potion
pub const MAX_TARGETS: usize = 5;
/// Potion slots addressable by an action
pub const MAX_POTIONS: usize = 3;

pub const CARD_ACTION_START: usize = 0;
pub const CARD_ACTIONS: usize = MAX_HAND_CARDS * MAX_TARGETS;
pub const POTION_ACTION_START: usize = CARD_ACTION_START + CARD_ACTIONS;
pub const POTION_ACTIONS: usize = MAX_POTIONS * MAX_TARGETS;
pub const END_TURN_ACTION: usize = POTION_ACTION_START + POTION_ACTIONS;
pub const CANCEL_ACTION: usize = END_TURN_ACTION + 1;
pub const TOTAL_ACTIONS: usize = CANCEL_ACTION + 1;

/// Semantic slot an action index refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionSlot {
    Card { slot: usize, target: usize },
    Potion { slot: usize, target: usize },
    EndTurn,
    Cancel,
}

impl ActionSlot {
    /// Decompose a flat index; `None` outside `[0, TOTAL_ACTIONS)`
    pub fn from_index(index: usize) -> Option<Self> {
        if index < POTION_ACTION_START {
            let offset = index - CARD_ACTION_START;
            Some(ActionSlot::Card {
                slot: offset / MAX_TARGETS,
                target: offset % MAX_TARGETS,
            })
        } else if index < END_TURN_ACTION {
            let offset = index - POTION_ACTION_START;
            Some(ActionSlot::Potion {
                slot: offset / MAX_TARGETS,
                target: offset % MAX_TARGETS,
            })
        } else if index == END_TURN_ACTION {
            Some(ActionSlot::EndTurn)
        } else if index == CANCEL_ACTION {
            Some(ActionSlot::Cancel)
        } else {
            None
        }
    }

    /// Flat index; `None` when a slot or target is out of range
    pub fn index(self) -> Option<usize> {
        match self {
            ActionSlot::Card { slot, target } if slot < MAX_HAND_CARDS && target < MAX_TARGETS => {
                Some(CARD_ACTION_START + slot * MAX_TARGETS + target)
            }
            ActionSlot::Potion { slot, target } if slot < MAX_POTIONS && target < MAX_TARGETS => {
                Some(POTION_ACTION_START + slot * MAX_TARGETS + target)
            }
            ActionSlot::EndTurn => Some(END_TURN_ACTION),
            ActionSlot::Cancel => Some(CANCEL_ACTION),
            _ => None,
        }
    }
}

/// Boolean legality vector of length [`TOTAL_ACTIONS`]
#[derive(Clone, PartialEq, Eq)]
pub struct LegalityMask(Vec<bool>);

impl LegalityMask {
    /// All-illegal mask
    pub fn new() -> Self {
        Self(vec![false; TOTAL_ACTIONS])
    }

    /// Mark an index legal; out-of-range indices are ignored
    pub fn allow(&mut self, index: usize) {
        if let Some(entry) = self.0.get_mut(index) {
            *entry = true;
        }
    }

    pub fn allow_slot(&mut self, slot: ActionSlot) {
        if let Some(index) = slot.index() {
            self.allow(index);
        }
    }

    pub fn is_legal(&self, index: usize) -> bool {
        self.0.get(index).copied().unwrap_or(false)
    }

    pub fn any(&self) -> bool {
        self.0.iter().any(|legal| *legal)
    }

    pub fn count(&self) -> usize {
        self.0.iter().filter(|legal| **legal).count()
    }

    pub fn legal_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(i, legal)| legal.then_some(i))
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<bool> {
        self.0
    }
}

impl Default for LegalityMask {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LegalityMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LegalityMask")
            .field(&self.legal_indices().collect::<Vec<_>>())
            .finish()
    }
}
