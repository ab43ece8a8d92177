//! The turn-based battle engine.
//!
//! - [`state`] holds the explicit finite-state machine for one encounter
//! - [`channel`] is the presentation boundary (prompts, clicks, timeouts)
//! - [`runner`] drives a battle to its end in one of the three modes

pub mod channel;
pub mod runner;
pub mod state;

pub use channel::{
    ActionButton, ActionId, BattleChannel, ChannelError, Interaction, TurnPrompt,
};
pub use runner::{BattleError, BattleOutcome, BattleRunner};
pub use state::{Battle, BattleEvent, Phase, PlayerMove, TransitionError};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Errors from parsing battle modes and action ids.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BattleParseError {
    #[error("unknown battle mode: {0} (expected manual, quick or hybrid)")]
    UnknownMode(String),
    #[error("unknown action: {0}")]
    UnknownAction(String),
}

/// How the player's action is chosen each round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BattleMode {
    /// The player picks every action.
    #[default]
    Manual,
    /// Fully simulated with basic attacks.
    Quick,
    /// Simulated, with a chance each round to cast a random affordable skill.
    Hybrid,
}

impl BattleMode {
    pub fn name(&self) -> &'static str {
        match self {
            BattleMode::Manual => "manual",
            BattleMode::Quick => "quick",
            BattleMode::Hybrid => "hybrid",
        }
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self, BattleMode::Manual)
    }
}

impl fmt::Display for BattleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BattleMode {
    type Err = BattleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "manual" => Ok(BattleMode::Manual),
            "quick" | "auto" => Ok(BattleMode::Quick),
            "hybrid" => Ok(BattleMode::Hybrid),
            other => Err(BattleParseError::UnknownMode(other.to_string())),
        }
    }
}

/// How a battle ended. Exactly one per battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BattleResult {
    Victory,
    Defeat,
    Fled,
    TimedOut,
    RoundCapReached,
}

impl BattleResult {
    pub fn is_victory(&self) -> bool {
        matches!(self, BattleResult::Victory)
    }
}

impl fmt::Display for BattleResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BattleResult::Victory => "Victory",
            BattleResult::Defeat => "Defeat",
            BattleResult::Fled => "Fled",
            BattleResult::TimedOut => "Timed out",
            BattleResult::RoundCapReached => "Draw",
        };
        f.write_str(text)
    }
}

/// Unique identifier for one encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BattleId(pub Uuid);

impl BattleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BattleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BattleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Largest chunk a chat message carries.
pub const LOG_CHUNK_CHARS: usize = 1500;

/// Join log lines into messages of at most `max_chars` characters.
///
/// Chunks break on line boundaries; a single line longer than the limit is
/// split on its own.
pub fn chunk_log(lines: &[String], max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in lines {
        let pieces: Vec<String> = if line.chars().count() > max_chars {
            let chars: Vec<char> = line.chars().collect();
            chars.chunks(max_chars).map(|c| c.iter().collect()).collect()
        } else {
            vec![line.clone()]
        };

        for piece in pieces {
            let piece_len = piece.chars().count();
            let needed = if current.is_empty() {
                piece_len
            } else {
                current_len + 1 + piece_len
            };
            if needed > max_chars && !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if !current.is_empty() {
                current.push('\n');
                current_len += 1;
            }
            current.push_str(&piece);
            current_len += piece_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
