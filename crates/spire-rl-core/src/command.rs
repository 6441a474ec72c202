//! Outbound command grammar
//!
//! Every command is one line of plain text: a verb followed by
//! space-separated arguments.

use std::fmt;

/// Verbs that can appear in `available_commands`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Play,
    End,
    Potion,
    Choose,
    Confirm,
    Proceed,
    Leave,
    Skip,
    Return,
    Cancel,
    Start,
    State,
    Ready,
    Click,
    Key,
    Wait,
}

impl Verb {
    /// Wire spelling of the verb
    pub const fn as_str(self) -> &'static str {
        match self {
            Verb::Play => "play",
            Verb::End => "end",
            Verb::Potion => "potion",
            Verb::Choose => "choose",
            Verb::Confirm => "confirm",
            Verb::Proceed => "proceed",
            Verb::Leave => "leave",
            Verb::Skip => "skip",
            Verb::Return => "return",
            Verb::Cancel => "cancel",
            Verb::Start => "start",
            Verb::State => "state",
            Verb::Ready => "ready",
            Verb::Click => "click",
            Verb::Key => "key",
            Verb::Wait => "wait",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which textual form a potion command takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PotionSyntax {
    /// `potion use <slot> [target]`
    #[default]
    Use,
    /// `potion <slot> <target>`, accepted by older mod builds
    Legacy,
}

/// A command sent to the game
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Ask the game to re-emit its state
    State,
    /// Handshake / wake-up
    Ready,
    /// Start a new run from the main menu
    Start {
        character: String,
        ascension: Option<u32>,
        seed: Option<String>,
    },
    /// Play the card in hand `slot` (0-based; rendered 1-based)
    Play { slot: usize, target: Option<usize> },
    /// Use the potion in `slot`
    Potion {
        slot: usize,
        target: Option<usize>,
        syntax: PotionSyntax,
    },
    /// Pick an entry of the current choice list
    Choose(usize),
    /// Any argument-less verb (`end`, `confirm`, `proceed`, ...)
    Bare(Verb),
}

impl Command {
    /// Refresh requests are keep-alive noise and are not logged as traffic
    pub fn is_refresh(&self) -> bool {
        matches!(self, Command::State)
    }

    pub fn verb(&self) -> Verb {
        match self {
            Command::State => Verb::State,
            Command::Ready => Verb::Ready,
            Command::Start { .. } => Verb::Start,
            Command::Play { .. } => Verb::Play,
            Command::Potion { .. } => Verb::Potion,
            Command::Choose(_) => Verb::Choose,
            Command::Bare(verb) => *verb,
        }
    }

    /// Same potion command in the other accepted syntax; other commands are returned unchanged
    pub fn alternate_syntax(&self) -> Command {
        match self {
            Command::Potion {
                slot,
                target,
                syntax,
            } => Command::Potion {
                slot: *slot,
                target: *target,
                syntax: match syntax {
                    PotionSyntax::Use => PotionSyntax::Legacy,
                    PotionSyntax::Legacy => PotionSyntax::Use,
                },
            },
            other => other.clone(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::State => f.write_str("state"),
            Command::Ready => f.write_str("ready"),
            Command::Start {
                character,
                ascension,
                seed,
            } => {
                write!(f, "start {}", character)?;
                match (ascension, seed) {
                    (Some(level), Some(seed)) => write!(f, " {} {}", level, seed),
                    (None, Some(seed)) => write!(f, " 0 {}", seed),
                    (Some(level), None) => write!(f, " {}", level),
                    (None, None) => Ok(()),
                }
            }
            Command::Play { slot, target } => {
                write!(f, "play {}", slot + 1)?;
                if let Some(target) = target {
                    write!(f, " {}", target)?;
                }
                Ok(())
            }
            Command::Potion {
                slot,
                target,
                syntax,
            } => {
                match (syntax, target) {
                    (PotionSyntax::Use, Some(target)) => {
                        write!(f, "potion use {} {}", slot, target)
                    }
                    (PotionSyntax::Use, None) => write!(f, "potion use {}", slot),
                    // The legacy form always takes a target index
                    (PotionSyntax::Legacy, target) => {
                        write!(f, "potion {} {}", slot, target.unwrap_or(0))
                    }
                }
            }
            Command::Choose(index) => write!(f, "choose {}", index),
            Command::Bare(verb) => f.write_str(verb.as_str()),
        }
    }
}
