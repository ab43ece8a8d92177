//! The presentation boundary between a battle and the chat platform.

use super::BattleParseError;
use crate::character::UserId;
use crate::skills::{Skill, SkillId};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from the presentation sink.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Failed to deliver battle update: {0}")]
    Delivery(String),
}

/// A selectable action. Renders as the platform component id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionId {
    BasicAttack,
    Skill(SkillId),
    Flee,
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionId::BasicAttack => f.write_str("basic_attack"),
            ActionId::Skill(id) => write!(f, "skill_{}", id.0),
            ActionId::Flee => f.write_str("flee"),
        }
    }
}

impl FromStr for ActionId {
    type Err = BattleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "basic_attack" => Ok(ActionId::BasicAttack),
            "flee" => Ok(ActionId::Flee),
            _ => s
                .strip_prefix("skill_")
                .and_then(|id| id.parse().ok())
                .map(|id| ActionId::Skill(SkillId(id)))
                .ok_or_else(|| BattleParseError::UnknownAction(s.to_string())),
        }
    }
}

/// One button on the turn prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionButton {
    pub id: ActionId,
    pub label: String,
    /// Skills the player cannot afford are shown but disabled.
    pub enabled: bool,
}

/// What the player sees at the start of their turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnPrompt {
    pub round: u32,
    pub round_cap: u32,
    pub player_hp: i32,
    pub player_max_hp: i32,
    pub player_mana: i32,
    pub player_max_mana: i32,
    pub enemy_name: String,
    pub enemy_hp: i32,
    pub enemy_max_hp: i32,
    pub actions: Vec<ActionButton>,
}

impl TurnPrompt {
    /// Basic attack, one button per active skill, then flee.
    pub fn actions_for(skills: &[Skill], mana: i32) -> Vec<ActionButton> {
        let mut actions = vec![ActionButton {
            id: ActionId::BasicAttack,
            label: "Attack".to_string(),
            enabled: true,
        }];
        actions.extend(skills.iter().filter(|s| s.is_active()).map(|s| ActionButton {
            id: ActionId::Skill(s.id),
            label: format!("{} ({} MP)", s.name, s.mana_cost),
            enabled: mana >= s.mana_cost,
        }));
        actions.push(ActionButton {
            id: ActionId::Flee,
            label: "Flee".to_string(),
            enabled: true,
        });
        actions
    }

    pub fn enabled_actions(&self) -> impl Iterator<Item = &ActionButton> {
        self.actions.iter().filter(|a| a.enabled)
    }
}

/// A click from someone in the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interaction {
    pub user_id: UserId,
    pub action: ActionId,
}

impl Interaction {
    pub fn new(user_id: impl Into<String>, action: ActionId) -> Self {
        Self {
            user_id: UserId::new(user_id),
            action,
        }
    }
}

/// The chat-side surface a battle talks to.
#[async_trait]
pub trait BattleChannel: Send {
    /// Show the log so far and the actions for this turn.
    async fn present(&mut self, log: &[String], prompt: &TurnPrompt) -> Result<(), ChannelError>;

    /// Wait for the next click. `None` once the channel is closed.
    async fn next_interaction(&mut self) -> Option<Interaction>;

    /// Tell a user the click was not accepted.
    async fn reject(&mut self, interaction: &Interaction, notice: &str)
        -> Result<(), ChannelError>;

    /// Stop collecting input. Called as soon as the battle has a result,
    /// before anything is settled; later clicks are no longer delivered.
    async fn stop_input(&mut self) -> Result<(), ChannelError>;

    /// Show the final log.
    async fn finish(&mut self, log: &[String]) -> Result<(), ChannelError>;
}
