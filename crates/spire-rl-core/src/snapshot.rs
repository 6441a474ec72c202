//! Snapshot model for the game's JSON state lines
//!
//! Each inbound line is one JSON object. `available_commands` is the only
//! required field; everything under `game_state` defaults to empty so that
//! transitional screens still parse.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::command::Verb;

/// Identity the game reports for an empty potion slot
pub const EMPTY_POTION_SLOT: &str = "Potion Slot";

/// Cost the game reports for cards that can never be played (curses, statuses)
pub const UNPLAYABLE_COST: i32 = -2;

/// One parsed state report from the game process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Verbs the game currently accepts
    pub available_commands: Vec<String>,

    /// Whether the game reports itself idle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_for_command: Option<bool>,

    /// Run state; absent on the main menu and while transitioning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_state: Option<GameState>,
}

/// Run-level state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameState {
    pub screen_type: ScreenType,
    pub screen_state: serde_json::Value,
    pub room_phase: String,
    pub act: i32,
    pub floor: i32,
    pub gold: i32,
    pub current_hp: i32,
    pub max_hp: i32,
    pub relics: Vec<Relic>,
    pub potions: Vec<Potion>,
    pub choice_list: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combat_state: Option<CombatState>,
}

/// Screen the game is currently showing
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ScreenType {
    /// No overlay; plain room view or a transition
    #[default]
    None,
    Combat,
    Event,
    Chest,
    ShopRoom,
    ShopScreen,
    Rest,
    CardReward,
    CombatReward,
    BossReward,
    Map,
    Grid,
    HandSelect,
    GameOver,
    Complete,
    Victory,
    Other(String),
}

impl ScreenType {
    pub fn as_str(&self) -> &str {
        match self {
            ScreenType::None => "NONE",
            ScreenType::Combat => "COMBAT",
            ScreenType::Event => "EVENT",
            ScreenType::Chest => "CHEST",
            ScreenType::ShopRoom => "SHOP_ROOM",
            ScreenType::ShopScreen => "SHOP_SCREEN",
            ScreenType::Rest => "REST",
            ScreenType::CardReward => "CARD_REWARD",
            ScreenType::CombatReward => "COMBAT_REWARD",
            ScreenType::BossReward => "BOSS_REWARD",
            ScreenType::Map => "MAP",
            ScreenType::Grid => "GRID",
            ScreenType::HandSelect => "HAND_SELECT",
            ScreenType::GameOver => "GAME_OVER",
            ScreenType::Complete => "COMPLETE",
            ScreenType::Victory => "VICTORY",
            ScreenType::Other(name) => name,
        }
    }

    /// Run-ending screens
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScreenType::GameOver | ScreenType::Victory | ScreenType::Complete
        )
    }

    /// Screens on which a fight is still being shown
    pub fn is_combat_view(&self) -> bool {
        matches!(self, ScreenType::Combat | ScreenType::None)
    }

    /// Card-picking overlays
    pub fn is_card_chooser(&self) -> bool {
        matches!(
            self,
            ScreenType::Grid | ScreenType::HandSelect | ScreenType::CardReward
        )
    }
}

impl From<String> for ScreenType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "NONE" => ScreenType::None,
            "COMBAT" => ScreenType::Combat,
            "EVENT" => ScreenType::Event,
            "CHEST" => ScreenType::Chest,
            "SHOP_ROOM" => ScreenType::ShopRoom,
            "SHOP_SCREEN" | "SHOP" => ScreenType::ShopScreen,
            "REST" => ScreenType::Rest,
            "CARD_REWARD" => ScreenType::CardReward,
            "COMBAT_REWARD" => ScreenType::CombatReward,
            "BOSS_REWARD" => ScreenType::BossReward,
            "MAP" => ScreenType::Map,
            "GRID" => ScreenType::Grid,
            "HAND_SELECT" => ScreenType::HandSelect,
            "GAME_OVER" => ScreenType::GameOver,
            "COMPLETE" => ScreenType::Complete,
            "VICTORY" => ScreenType::Victory,
            _ => ScreenType::Other(name),
        }
    }
}

impl From<ScreenType> for String {
    fn from(screen: ScreenType) -> Self {
        screen.as_str().to_string()
    }
}

impl fmt::Display for ScreenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Combat sub-state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatState {
    pub player: Player,
    pub hand: Vec<Card>,
    pub monsters: Vec<Monster>,
    pub draw_pile: Vec<Card>,
    pub discard_pile: Vec<Card>,
    pub exhaust_pile: Vec<Card>,
    pub turn: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Player {
    #[serde(alias = "hp")]
    pub current_hp: i32,
    pub max_hp: i32,
    pub block: i32,
    pub energy: i32,
    pub powers: Vec<Power>,
}

impl Player {
    pub fn has_power(&self, id: &str) -> bool {
        self.powers.iter().any(|p| p.id == id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Power {
    pub id: String,
    pub name: String,
    pub amount: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Card {
    pub id: String,
    pub name: String,
    pub uuid: String,
    pub cost: i32,
    #[serde(rename = "type")]
    pub card_type: String,
    pub has_target: bool,
    pub is_playable: bool,
    pub upgrades: i32,
}

impl Card {
    pub fn is_attack(&self) -> bool {
        self.card_type == "ATTACK"
    }

    /// Identity used to tell two hands apart; uuid when the game sends one
    pub fn identity(&self) -> &str {
        if self.uuid.is_empty() {
            &self.id
        } else {
            &self.uuid
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Monster {
    pub id: String,
    pub name: String,
    pub current_hp: i32,
    pub max_hp: i32,
    pub block: i32,
    pub intent: String,
    pub move_adjusted_damage: i32,
    pub half_dead: bool,
    pub is_gone: bool,
    pub is_dying: bool,
}

impl Monster {
    /// Alive, present and not in a half-dead phase
    pub fn is_targetable(&self) -> bool {
        !self.is_gone && !self.half_dead && !self.is_dying && self.current_hp > 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Potion {
    pub id: String,
    pub name: String,
    pub can_use: bool,
    pub can_discard: bool,
    pub requires_target: bool,
}

impl Potion {
    pub fn is_empty(&self) -> bool {
        self.id == EMPTY_POTION_SLOT
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Relic {
    pub id: String,
    pub name: String,
    pub counter: i32,
}

impl Snapshot {
    pub fn has(&self, verb: Verb) -> bool {
        self.available_commands.iter().any(|c| c == verb.as_str())
    }

    pub fn has_any(&self, verbs: &[Verb]) -> bool {
        verbs.iter().any(|v| self.has(*v))
    }

    /// First verb of `verbs` (in priority order) that is currently legal
    pub fn first_of(&self, verbs: &[Verb]) -> Option<Verb> {
        verbs.iter().copied().find(|v| self.has(*v))
    }

    pub fn screen_type(&self) -> ScreenType {
        self.game_state
            .as_ref()
            .map(|g| g.screen_type.clone())
            .unwrap_or_default()
    }

    pub fn combat(&self) -> Option<&CombatState> {
        self.game_state.as_ref()?.combat_state.as_ref()
    }

    pub fn in_combat_phase(&self) -> bool {
        self.game_state
            .as_ref()
            .is_some_and(|g| g.room_phase == "COMBAT")
    }

    pub fn turn(&self) -> u32 {
        self.combat().map(|c| c.turn).unwrap_or(0)
    }

    pub fn energy(&self) -> Option<i32> {
        self.combat().map(|c| c.player.energy)
    }

    pub fn hand(&self) -> &[Card] {
        self.combat().map(|c| c.hand.as_slice()).unwrap_or(&[])
    }

    pub fn monsters(&self) -> &[Monster] {
        self.combat().map(|c| c.monsters.as_slice()).unwrap_or(&[])
    }

    pub fn potions(&self) -> &[Potion] {
        self.game_state
            .as_ref()
            .map(|g| g.potions.as_slice())
            .unwrap_or(&[])
    }

    pub fn choices(&self) -> &[String] {
        self.game_state
            .as_ref()
            .map(|g| g.choice_list.as_slice())
            .unwrap_or(&[])
    }

    /// True when every potion slot holds a potion
    pub fn potion_slots_full(&self) -> bool {
        let potions = self.potions();
        !potions.is_empty() && potions.iter().all(|p| !p.is_empty())
    }

    /// First monster that can legally be targeted
    pub fn first_target(&self) -> Option<usize> {
        self.monsters().iter().position(Monster::is_targetable)
    }

    pub fn is_terminal(&self) -> bool {
        self.screen_type().is_terminal()
    }

    /// A run-ending screen that reports a win
    pub fn is_victory(&self) -> bool {
        match self.game_state.as_ref() {
            Some(g) => match g.screen_type {
                ScreenType::Victory | ScreenType::Complete => true,
                ScreenType::GameOver => g
                    .screen_state
                    .get("victory")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
                _ => false,
            },
            None => false,
        }
    }

    /// Run-level hp ratio, falling back to the combat player when the run fields are empty
    pub fn hp_ratio(&self) -> Option<f32> {
        let game = self.game_state.as_ref()?;
        let (hp, max) = if game.max_hp > 0 {
            (game.current_hp, game.max_hp)
        } else {
            let player = &game.combat_state.as_ref()?.player;
            (player.current_hp, player.max_hp)
        };
        if max <= 0 {
            return None;
        }
        Some(hp as f32 / max as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMBAT_LINE: &str = r#"{
        "available_commands": ["play", "end", "key", "click", "wait", "state"],
        "ready_for_command": true,
        "in_game": true,
        "game_state": {
            "screen_type": "NONE",
            "room_phase": "COMBAT",
            "floor": 1, "act": 1, "gold": 99, "current_hp": 80, "max_hp": 80,
            "relics": [{"id": "Burning Blood", "name": "Burning Blood", "counter": -1}],
            "potions": [
                {"id": "Fire Potion", "name": "Fire Potion", "can_use": true, "can_discard": true, "requires_target": true},
                {"id": "Potion Slot", "name": "Potion Slot", "can_use": false, "can_discard": false, "requires_target": false}
            ],
            "choice_list": [],
            "combat_state": {
                "turn": 1,
                "player": {"current_hp": 80, "max_hp": 80, "block": 0, "energy": 3, "powers": []},
                "hand": [
                    {"id": "Strike_R", "name": "Strike", "uuid": "a1", "cost": 1, "type": "ATTACK", "has_target": true, "is_playable": true, "upgrades": 0},
                    {"id": "Ascender's Bane", "name": "Ascender's Bane", "uuid": "a2", "cost": -2, "type": "CURSE", "has_target": false, "is_playable": false}
                ],
                "monsters": [
                    {"id": "JawWorm", "name": "Jaw Worm", "current_hp": 42, "max_hp": 42, "block": 0, "intent": "ATTACK", "move_adjusted_damage": 11, "half_dead": false, "is_gone": false}
                ],
                "draw_pile": [{"id": "Defend_R", "cost": 1, "type": "SKILL"}],
                "discard_pile": [],
                "exhaust_pile": []
            }
        }
    }"#;

    #[test]
    fn test_parse_combat_snapshot() {
        let snapshot: Snapshot = serde_json::from_str(COMBAT_LINE).unwrap();

        assert!(snapshot.has(Verb::Play));
        assert!(snapshot.has(Verb::End));
        assert!(!snapshot.has(Verb::Choose));
        assert_eq!(snapshot.screen_type(), ScreenType::None);
        assert!(snapshot.in_combat_phase());
        assert_eq!(snapshot.turn(), 1);
        assert_eq!(snapshot.energy(), Some(3));
        assert_eq!(snapshot.hand().len(), 2);
        assert_eq!(snapshot.hand()[1].cost, UNPLAYABLE_COST);
        assert_eq!(snapshot.first_target(), Some(0));
        assert!(!snapshot.potion_slots_full());
        assert_eq!(snapshot.hp_ratio(), Some(1.0));
    }

    #[test]
    fn test_commands_are_required() {
        let result: Result<Snapshot, _> =
            serde_json::from_str(r#"{"ready_for_command": true, "error": "Invalid command"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_game_state_is_valid() {
        let snapshot: Snapshot =
            serde_json::from_str(r#"{"available_commands": ["start", "state"]}"#).unwrap();
        assert!(snapshot.game_state.is_none());
        assert_eq!(snapshot.screen_type(), ScreenType::None);
        assert!(snapshot.hand().is_empty());
        assert!(snapshot.has(Verb::Start));
    }

    #[test]
    fn test_player_hp_alias() {
        let snapshot: Snapshot = serde_json::from_str(
            r#"{"available_commands":["play"],"game_state":{"screen_type":"COMBAT","combat_state":{"player":{"energy":3,"hp":50}}}}"#,
        )
        .unwrap();
        let combat = snapshot.combat().unwrap();
        assert_eq!(combat.player.current_hp, 50);
        assert_eq!(snapshot.screen_type(), ScreenType::Combat);
    }

    #[test]
    fn test_unknown_screen_is_preserved() {
        let screen = ScreenType::from("FTUE".to_string());
        assert_eq!(screen, ScreenType::Other("FTUE".into()));
        assert_eq!(String::from(screen), "FTUE");
    }

    #[test]
    fn test_game_over_victory_flag() {
        let won: Snapshot = serde_json::from_str(
            r#"{"available_commands":["proceed"],"game_state":{"screen_type":"GAME_OVER","screen_state":{"victory":true,"score":900}}}"#,
        )
        .unwrap();
        assert!(won.is_terminal());
        assert!(won.is_victory());

        let lost: Snapshot = serde_json::from_str(
            r#"{"available_commands":["proceed"],"game_state":{"screen_type":"GAME_OVER","screen_state":{"victory":false}}}"#,
        )
        .unwrap();
        assert!(lost.is_terminal());
        assert!(!lost.is_victory());
    }

    #[test]
    fn test_full_potion_slots() {
        let snapshot: Snapshot = serde_json::from_str(
            r#"{"available_commands":["choose"],"game_state":{"screen_type":"COMBAT_REWARD","potions":[{"id":"Fire Potion"},{"id":"Block Potion"},{"id":"Swift Potion"}]}}"#,
        )
        .unwrap();
        assert!(snapshot.potion_slots_full());
    }
}
