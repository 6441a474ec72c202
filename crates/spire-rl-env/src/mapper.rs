//! Action mapping
//!
//! Translates between the flat action space and protocol commands, and
//! computes the legality mask for a snapshot. Both directions branch on the
//! same screen shape (combat, chooser, passage) so every legal index decodes
//! to a command.

use spire_rl_core::action::{
    ActionSlot, CANCEL_ACTION, END_TURN_ACTION, MAX_HAND_CARDS, MAX_POTIONS, MAX_TARGETS,
};
use spire_rl_core::snapshot::UNPLAYABLE_COST;
use spire_rl_core::{Card, Command, LegalityMask, PotionSyntax, Snapshot, Verb};

/// Verbs the end-turn index resolves to, in priority order
pub const ADVANCE_VERBS: [Verb; 5] =
    [Verb::End, Verb::Confirm, Verb::Proceed, Verb::Leave, Verb::Skip];
/// Verbs the cancel index resolves to, in priority order
pub const CANCEL_VERBS: [Verb; 5] =
    [Verb::Cancel, Verb::Return, Verb::Leave, Verb::Skip, Verb::Proceed];

const ENTANGLED: &str = "Entangled";
const CLASH: &str = "Clash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Combat,
    Chooser,
    Passage,
}

fn shape(snapshot: &Snapshot) -> Shape {
    if snapshot.has_any(&[Verb::Play, Verb::End]) {
        Shape::Combat
    } else if snapshot.has(Verb::Choose) {
        Shape::Chooser
    } else {
        Shape::Passage
    }
}

/// Stateless mapper between action indices and commands
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionMapper;

impl ActionMapper {
    pub fn new() -> Self {
        Self
    }

    /// Legal actions for `snapshot`; never all-false
    pub fn mask(&self, snapshot: Option<&Snapshot>) -> LegalityMask {
        let mut mask = LegalityMask::new();
        if let Some(snapshot) = snapshot {
            match shape(snapshot) {
                Shape::Combat => self.combat_mask(snapshot, &mut mask),
                Shape::Chooser => {
                    let offered = snapshot.choices().len().min(END_TURN_ACTION);
                    for index in 0..offered {
                        mask.allow(index);
                    }
                    self.passage_mask(snapshot, &mut mask);
                }
                Shape::Passage => self.passage_mask(snapshot, &mut mask),
            }
        }
        if !mask.any() {
            mask.allow(END_TURN_ACTION);
        }
        mask
    }

    fn combat_mask(&self, snapshot: &Snapshot, mask: &mut LegalityMask) {
        let targets: Vec<usize> = snapshot
            .monsters()
            .iter()
            .take(MAX_TARGETS)
            .enumerate()
            .filter(|(_, m)| m.is_targetable())
            .map(|(i, _)| i)
            .collect();

        if snapshot.has(Verb::Play) {
            let energy = snapshot.energy().unwrap_or(0);
            let hand = snapshot.hand();
            let entangled = snapshot.combat().is_some_and(|c| c.player.has_power(ENTANGLED));
            for (slot, card) in hand.iter().take(MAX_HAND_CARDS).enumerate() {
                if !card_is_castable(card, hand, energy, entangled) {
                    continue;
                }
                if card.has_target {
                    for target in &targets {
                        mask.allow_slot(ActionSlot::Card {
                            slot,
                            target: *target,
                        });
                    }
                } else {
                    mask.allow_slot(ActionSlot::Card { slot, target: 0 });
                }
            }
        }

        if snapshot.has(Verb::Potion) {
            for (slot, potion) in snapshot.potions().iter().take(MAX_POTIONS).enumerate() {
                if !potion.can_use || potion.is_empty() {
                    continue;
                }
                if potion.requires_target {
                    for target in &targets {
                        mask.allow_slot(ActionSlot::Potion {
                            slot,
                            target: *target,
                        });
                    }
                } else {
                    mask.allow_slot(ActionSlot::Potion { slot, target: 0 });
                }
            }
        }

        if snapshot.has(Verb::End) {
            mask.allow(END_TURN_ACTION);
        }
    }

    fn passage_mask(&self, snapshot: &Snapshot, mask: &mut LegalityMask) {
        if snapshot.has_any(&ADVANCE_VERBS) {
            mask.allow(END_TURN_ACTION);
        }
        if snapshot.has_any(&CANCEL_VERBS) {
            mask.allow(CANCEL_ACTION);
        }
    }

    /// Command for `action`, or `None` when it does not fit the snapshot
    pub fn decode(&self, action: usize, snapshot: &Snapshot) -> Option<Command> {
        let slot = ActionSlot::from_index(action)?;
        match slot {
            ActionSlot::EndTurn => Some(
                snapshot
                    .first_of(&ADVANCE_VERBS)
                    .map_or(Command::State, Command::Bare),
            ),
            ActionSlot::Cancel => Some(
                snapshot
                    .first_of(&CANCEL_VERBS)
                    .map_or(Command::State, Command::Bare),
            ),
            ActionSlot::Card { slot, target } if shape(snapshot) == Shape::Combat => {
                let card = snapshot.hand().get(slot)?;
                let target = if card.has_target {
                    Some(safe_target(snapshot, target)?)
                } else {
                    None
                };
                Some(Command::Play { slot, target })
            }
            ActionSlot::Potion { slot, target } if shape(snapshot) == Shape::Combat => {
                let potion = snapshot.potions().get(slot)?;
                if potion.is_empty() {
                    return None;
                }
                // The game takes a target index even for untargeted potions
                let target = if potion.requires_target {
                    safe_target(snapshot, target)?
                } else {
                    snapshot.first_target().unwrap_or(0)
                };
                Some(Command::Potion {
                    slot,
                    target: Some(target),
                    syntax: PotionSyntax::Use,
                })
            }
            _ if shape(snapshot) == Shape::Chooser && action < snapshot.choices().len() => {
                Some(Command::Choose(action))
            }
            _ => None,
        }
    }

    /// Human-readable label for step logging
    pub fn describe(&self, action: usize, snapshot: Option<&Snapshot>) -> String {
        let Some(slot) = ActionSlot::from_index(action) else {
            return format!("invalid action {}", action);
        };
        let shape = snapshot.map(shape).unwrap_or(Shape::Passage);
        match slot {
            ActionSlot::EndTurn => match snapshot.and_then(|s| s.first_of(&ADVANCE_VERBS)) {
                Some(verb) => format!("advance ({})", verb),
                None => "advance (refresh)".to_string(),
            },
            ActionSlot::Cancel => match snapshot.and_then(|s| s.first_of(&CANCEL_VERBS)) {
                Some(verb) => format!("cancel ({})", verb),
                None => "cancel (refresh)".to_string(),
            },
            _ if shape == Shape::Chooser => {
                let label = snapshot
                    .and_then(|s| s.choices().get(action))
                    .map(String::as_str)
                    .unwrap_or("?");
                format!("choose {} ({})", action, label)
            }
            ActionSlot::Card { slot, target } => {
                let name = snapshot
                    .and_then(|s| s.hand().get(slot))
                    .map(|c| if c.name.is_empty() { c.id.as_str() } else { c.name.as_str() })
                    .unwrap_or("?");
                format!("play {} [{}] -> target {}", slot, name, target)
            }
            ActionSlot::Potion { slot, target } => {
                let name = snapshot
                    .and_then(|s| s.potions().get(slot))
                    .map(|p| if p.name.is_empty() { p.id.as_str() } else { p.name.as_str() })
                    .unwrap_or("?");
                format!("potion {} [{}] -> target {}", slot, name, target)
            }
        }
    }
}

fn card_is_castable(card: &Card, hand: &[Card], energy: i32, entangled: bool) -> bool {
    if !card.is_playable || card.cost == UNPLAYABLE_COST || energy < card.cost.max(0) {
        return false;
    }
    if entangled && card.is_attack() {
        return false;
    }
    if card.id == CLASH && !hand.iter().all(Card::is_attack) {
        return false;
    }
    true
}

/// `requested` if it names a targetable monster, else the first one that is
fn safe_target(snapshot: &Snapshot, requested: usize) -> Option<usize> {
    let valid = snapshot
        .monsters()
        .get(requested)
        .is_some_and(|m| m.is_targetable());
    if valid {
        Some(requested)
    } else {
        snapshot.first_target()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use spire_rl_core::TOTAL_ACTIONS;
    use spire_rl_core::action::POTION_ACTION_START;

    fn parse(value: Value) -> Snapshot {
        serde_json::from_value(value).unwrap()
    }

    fn combat(hand: Value, monsters: Value, extra: Value) -> Snapshot {
        let mut state = json!({
            "available_commands": ["play", "end", "potion", "state"],
            "game_state": {
                "screen_type": "NONE",
                "room_phase": "COMBAT",
                "potions": [
                    {"id": "Fire Potion", "name": "Fire Potion", "can_use": true, "requires_target": true},
                    {"id": "Block Potion", "name": "Block Potion", "can_use": true, "requires_target": false},
                    {"id": "Potion Slot", "name": "Potion Slot"}
                ],
                "combat_state": {
                    "turn": 1,
                    "player": {"current_hp": 60, "max_hp": 80, "energy": 2, "powers": []},
                    "hand": hand,
                    "monsters": monsters
                }
            }
        });
        if let Value::Object(extra) = extra {
            for (key, value) in extra {
                state["game_state"]["combat_state"][key] = value;
            }
        }
        parse(state)
    }

    fn fixtures() -> Vec<Snapshot> {
        vec![
            parse(json!({"available_commands":["play","end"],"game_state":{"screen_type":"COMBAT","combat_state":{"player":{"energy":3,"hp":50},"hand":[{"cost":1,"is_playable":true,"has_target":true}],"monsters":[{"current_hp":10,"is_gone":false}]}}})),
            combat(
                json!([
                    {"id": "Strike_R", "cost": 1, "type": "ATTACK", "has_target": true, "is_playable": true},
                    {"id": "Defend_R", "cost": 1, "type": "SKILL", "is_playable": true},
                    {"id": "Bludgeon", "cost": 3, "type": "ATTACK", "has_target": true, "is_playable": true},
                    {"id": "Wound", "cost": -2, "type": "STATUS", "is_playable": false}
                ]),
                json!([{"current_hp": 10}, {"current_hp": 0, "is_gone": true}, {"current_hp": 8, "half_dead": true}, {"current_hp": 12}]),
                json!({}),
            ),
            parse(json!({"available_commands": ["choose", "confirm"], "game_state": {"screen_type": "HAND_SELECT", "room_phase": "COMBAT", "choice_list": ["strike", "defend"]}})),
            parse(json!({"available_commands": ["choose"], "game_state": {"screen_type": "EVENT", "choice_list": []}})),
            parse(json!({"available_commands": ["proceed", "state"], "game_state": {"screen_type": "COMBAT_REWARD"}})),
            parse(json!({"available_commands": ["state", "wait"], "game_state": {"screen_type": "NONE", "room_phase": "COMBAT"}})),
            parse(json!({"available_commands": []})),
            parse(json!({"available_commands": ["end"], "game_state": {"screen_type": "NONE", "room_phase": "COMBAT", "combat_state": {"hand": []}}})),
        ]
    }

    #[test]
    fn test_documented_combat_scenario() {
        let snapshot = &fixtures()[0];
        let mask = ActionMapper.mask(Some(snapshot));
        assert_eq!(mask.legal_indices().collect::<Vec<_>>(), vec![0, END_TURN_ACTION]);
        assert_eq!(
            ActionMapper.decode(0, snapshot),
            Some(Command::Play {
                slot: 0,
                target: Some(0)
            })
        );
        assert_eq!(ActionMapper.decode(0, snapshot).unwrap().to_string(), "play 1 0");
    }

    #[test]
    fn test_mask_is_never_empty() {
        let mapper = ActionMapper::new();
        assert!(mapper.mask(None).is_legal(END_TURN_ACTION));
        for snapshot in fixtures() {
            assert!(mapper.mask(Some(&snapshot)).any(), "empty mask for {:?}", snapshot);
        }
    }

    #[test]
    fn test_legal_indices_decode() {
        let mapper = ActionMapper::new();
        for snapshot in fixtures() {
            for index in mapper.mask(Some(&snapshot)).legal_indices() {
                let command = mapper
                    .decode(index, &snapshot)
                    .unwrap_or_else(|| panic!("index {} did not decode for {:?}", index, snapshot));
                assert!(!command.to_string().is_empty());
            }
        }
    }

    #[test]
    fn test_mask_is_idempotent() {
        let mapper = ActionMapper::new();
        for snapshot in fixtures() {
            assert_eq!(mapper.mask(Some(&snapshot)), mapper.mask(Some(&snapshot)));
        }
    }

    #[test]
    fn test_combat_rules() {
        let snapshot = &fixtures()[1];
        let mask = ActionMapper.mask(Some(snapshot));

        // Strike: monsters 0 and 3 only (1 gone, 2 half dead)
        assert!(mask.is_legal(0));
        assert!(!mask.is_legal(1));
        assert!(!mask.is_legal(2));
        assert!(mask.is_legal(3));
        // Defend: target slot 0 only
        assert!(mask.is_legal(MAX_TARGETS));
        assert!(!mask.is_legal(MAX_TARGETS + 1));
        // Bludgeon costs more than the energy left, Wound is unplayable
        assert!((2 * MAX_TARGETS..4 * MAX_TARGETS).all(|i| !mask.is_legal(i)));
        // Fire Potion on living monsters, Block Potion untargeted, empty slot never
        assert!(mask.is_legal(POTION_ACTION_START));
        assert!(mask.is_legal(POTION_ACTION_START + 3));
        assert!(mask.is_legal(POTION_ACTION_START + MAX_TARGETS));
        assert!(!mask.is_legal(POTION_ACTION_START + MAX_TARGETS + 1));
        assert!(!mask.is_legal(POTION_ACTION_START + 2 * MAX_TARGETS));
        assert!(mask.is_legal(END_TURN_ACTION));
        assert!(!mask.is_legal(CANCEL_ACTION));
    }

    #[test]
    fn test_entangled_and_clash() {
        let hand = json!([
            {"id": "Strike_R", "cost": 1, "type": "ATTACK", "has_target": true, "is_playable": true},
            {"id": "Clash", "cost": 0, "type": "ATTACK", "has_target": true, "is_playable": true},
            {"id": "Defend_R", "cost": 1, "type": "SKILL", "is_playable": true}
        ]);
        let monsters = json!([{"current_hp": 10}]);

        let free = combat(hand.clone(), monsters.clone(), json!({}));
        let mask = ActionMapper.mask(Some(&free));
        assert!(mask.is_legal(0));
        assert!(!mask.is_legal(MAX_TARGETS), "Clash needs an all-attack hand");
        assert!(mask.is_legal(2 * MAX_TARGETS));

        let entangled = combat(
            hand,
            monsters,
            json!({"player": {"energy": 2, "powers": [{"id": "Entangled", "amount": 1}]}}),
        );
        let mask = ActionMapper.mask(Some(&entangled));
        assert!(!mask.is_legal(0));
        assert!(mask.is_legal(2 * MAX_TARGETS));
    }

    #[test]
    fn test_chooser_mask() {
        let snapshot = &fixtures()[2];
        let mask = ActionMapper.mask(Some(snapshot));
        assert_eq!(mask.legal_indices().collect::<Vec<_>>(), vec![0, 1, END_TURN_ACTION]);
        assert_eq!(ActionMapper.decode(1, snapshot), Some(Command::Choose(1)));
        assert_eq!(ActionMapper.decode(2, snapshot), None);
        assert_eq!(
            ActionMapper.decode(END_TURN_ACTION, snapshot),
            Some(Command::Bare(Verb::Confirm))
        );
    }

    #[test]
    fn test_decode_inconsistent_actions() {
        let snapshot = &fixtures()[1];
        // Hand slot beyond the hand
        assert_eq!(ActionMapper.decode(5 * MAX_TARGETS, snapshot), None);
        // Empty potion slot
        assert_eq!(ActionMapper.decode(POTION_ACTION_START + 2 * MAX_TARGETS, snapshot), None);
        assert_eq!(ActionMapper.decode(TOTAL_ACTIONS, snapshot), None);
        // Dead target is replaced by the first living monster
        assert_eq!(
            ActionMapper.decode(1, snapshot),
            Some(Command::Play {
                slot: 0,
                target: Some(0)
            })
        );
        // Untargeted card carries no target
        assert_eq!(
            ActionMapper.decode(MAX_TARGETS + 4, snapshot).map(|c| c.to_string()),
            Some("play 2".to_string())
        );
        assert_eq!(
            ActionMapper.decode(POTION_ACTION_START + 3, snapshot).map(|c| c.to_string()),
            Some("potion use 0 3".to_string())
        );
    }

    #[test]
    fn test_untargeted_potion_carries_safe_target() {
        let snapshot = &fixtures()[1];
        let block = ActionMapper
            .decode(POTION_ACTION_START + MAX_TARGETS, snapshot)
            .unwrap();
        assert_eq!(block.to_string(), "potion use 1 0");

        let legacy = block.alternate_syntax().to_string();
        assert_eq!(legacy, "potion 1 0");
        assert_eq!(legacy.split_whitespace().count(), 3);

        let first_gone = combat(
            json!([]),
            json!([{"current_hp": 0, "is_gone": true}, {"current_hp": 5}]),
            json!({}),
        );
        let block = ActionMapper.decode(POTION_ACTION_START + MAX_TARGETS, &first_gone);
        assert_eq!(block.map(|c| c.to_string()), Some("potion use 1 1".to_string()));
    }

    #[test]
    fn test_end_without_advance_verb_refreshes() {
        let snapshot = &fixtures()[5];
        let legal: Vec<_> = ActionMapper.mask(Some(snapshot)).legal_indices().collect();
        assert_eq!(legal, vec![END_TURN_ACTION]);
        assert_eq!(ActionMapper.decode(END_TURN_ACTION, snapshot), Some(Command::State));
    }

    #[test]
    fn test_describe() {
        let snapshot = &fixtures()[1];
        assert_eq!(ActionMapper.describe(END_TURN_ACTION, Some(snapshot)), "advance (end)");
        assert_eq!(
            ActionMapper.describe(POTION_ACTION_START, Some(snapshot)),
            "potion 0 [Fire Potion] -> target 0"
        );
        assert_eq!(ActionMapper.describe(3, Some(snapshot)), "play 0 [Strike_R] -> target 3");
        assert_eq!(ActionMapper.describe(99, None), "invalid action 99");

        let chooser = &fixtures()[2];
        assert_eq!(ActionMapper.describe(1, Some(chooser)), "choose 1 (defend)");
    }
}
