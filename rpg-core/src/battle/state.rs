//! The encounter state machine.
//!
//! ```text
//!              PlayerActed (enemy alive) / TimedOut (below idle limit)
//!  PlayerTurn ─────────────────────────────────────────────────────▶ EnemyTurn
//!      ▲                                                                │
//!      └──────────── EnemyActed (player alive, round < cap) ────────────┘
//!
//!  PlayerTurn ── PlayerActed (enemy down) ──▶ Finished(Victory)
//!  PlayerTurn ── Fled ──────────────────────▶ Finished(Fled)
//!  PlayerTurn ── TimedOut (idle limit hit) ─▶ Finished(TimedOut)
//!  EnemyTurn ─── EnemyActed (player down) ──▶ Finished(Defeat)
//!  EnemyTurn ─── EnemyActed (round == cap) ─▶ Finished(RoundCapReached)
//! ```
//!
//! A timed-out turn is forfeited: no player action applies and the enemy
//! still attacks. The round counter starts at 1, advances once per full
//! round, and never passes the cap.

use super::{BattleId, BattleMode, BattleResult};
use crate::combat::{AttackRoll, PlayerStats};
use crate::enemies::EnemyArchetype;
use crate::skills::SkillEffect;
use std::sync::Arc;
use thiserror::Error;

/// Whose move it is, or how the battle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    PlayerTurn,
    EnemyTurn,
    Finished(BattleResult),
}

/// What the player did with their turn.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerMove {
    Attack(AttackRoll),
    Skill { name: String, effect: SkillEffect },
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum BattleEvent {
    PlayerActed(PlayerMove),
    Fled,
    TimedOut,
    EnemyActed { roll: AttackRoll, phrase: String },
}

impl BattleEvent {
    fn name(&self) -> &'static str {
        match self {
            BattleEvent::PlayerActed(_) => "PlayerActed",
            BattleEvent::Fled => "Fled",
            BattleEvent::TimedOut => "TimedOut",
            BattleEvent::EnemyActed { .. } => "EnemyActed",
        }
    }
}

/// An event that is not valid in the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("{event} is not valid during {phase:?}")]
    OutOfTurn { phase: Phase, event: &'static str },

    #[error("Battle already finished: {0}")]
    AlreadyFinished(BattleResult),

    #[error("Battle is still in progress")]
    NotFinished,
}

/// One encounter in progress. Never persisted.
#[derive(Debug, Clone)]
pub struct Battle {
    id: BattleId,
    mode: BattleMode,
    player: PlayerStats,
    enemy: Arc<EnemyArchetype>,
    enemy_hp: i32,
    round: u32,
    round_cap: u32,
    idle_limit: u32,
    idle_streak: u32,
    phase: Phase,
    log: Vec<String>,
}

impl Battle {
    pub fn new(
        mode: BattleMode,
        player: PlayerStats,
        enemy: Arc<EnemyArchetype>,
        round_cap: u32,
        idle_limit: u32,
    ) -> Self {
        let mut battle = Self {
            id: BattleId::new(),
            mode,
            enemy_hp: enemy.health,
            player,
            enemy,
            round: 1,
            round_cap: round_cap.max(1),
            idle_limit: idle_limit.max(1),
            idle_streak: 0,
            phase: Phase::PlayerTurn,
            log: Vec::new(),
        };
        battle.note(format!(
            "A wild {} (level {}) appears! {} HP",
            battle.enemy.name, battle.enemy.level, battle.enemy.health
        ));
        battle.note_round();
        battle
    }

    pub fn id(&self) -> BattleId {
        self.id
    }

    pub fn mode(&self) -> BattleMode {
        self.mode
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn result(&self) -> Option<BattleResult> {
        match self.phase {
            Phase::Finished(result) => Some(result),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.result().is_some()
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn round_cap(&self) -> u32 {
        self.round_cap
    }

    pub fn player(&self) -> &PlayerStats {
        &self.player
    }

    pub fn enemy(&self) -> &EnemyArchetype {
        &self.enemy
    }

    pub fn enemy_archetype(&self) -> Arc<EnemyArchetype> {
        Arc::clone(&self.enemy)
    }

    pub fn enemy_hp(&self) -> i32 {
        self.enemy_hp
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    /// Append a line to the battle log.
    pub fn note(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
    }

    /// Sync battle-local mana with the persisted value after a spend.
    pub fn set_player_mana(&mut self, mana: i32) {
        self.player.mana = mana.clamp(0, self.player.max_mana);
    }

    fn note_round(&mut self) {
        let line = format!("-- Round {}/{} --", self.round, self.round_cap);
        self.note(line);
    }

    /// Apply an event and return the new phase.
    pub fn transition(&mut self, event: BattleEvent) -> Result<Phase, TransitionError> {
        let next = match (self.phase, event) {
            (Phase::Finished(result), _) => return Err(TransitionError::AlreadyFinished(result)),

            (Phase::PlayerTurn, BattleEvent::PlayerActed(action)) => {
                self.idle_streak = 0;
                self.apply_player_move(action);
                if self.enemy_hp <= 0 {
                    let line = format!("{} {}", self.enemy.name, self.enemy.death_phrase);
                    self.note(line);
                    Phase::Finished(BattleResult::Victory)
                } else {
                    Phase::EnemyTurn
                }
            }

            (Phase::PlayerTurn, BattleEvent::Fled) => {
                let line = format!("{} fled from the battle!", self.player.name);
                self.note(line);
                Phase::Finished(BattleResult::Fled)
            }

            (Phase::PlayerTurn, BattleEvent::TimedOut) => {
                self.idle_streak += 1;
                if self.idle_streak >= self.idle_limit {
                    let line = format!(
                        "{} hesitated too long and the {} wandered off.",
                        self.player.name, self.enemy.name
                    );
                    self.note(line);
                    Phase::Finished(BattleResult::TimedOut)
                } else {
                    let line = format!("{} hesitates and loses the turn.", self.player.name);
                    self.note(line);
                    Phase::EnemyTurn
                }
            }

            (Phase::EnemyTurn, BattleEvent::EnemyActed { roll, phrase }) => {
                self.apply_enemy_attack(roll, &phrase);
                if self.player.health <= 0 {
                    let line = format!("{} has been defeated...", self.player.name);
                    self.note(line);
                    Phase::Finished(BattleResult::Defeat)
                } else if self.round >= self.round_cap {
                    self.note("Both sides are exhausted. The battle ends in a draw.");
                    Phase::Finished(BattleResult::RoundCapReached)
                } else {
                    self.round += 1;
                    self.note_round();
                    Phase::PlayerTurn
                }
            }

            (phase, event) => {
                return Err(TransitionError::OutOfTurn {
                    phase,
                    event: event.name(),
                })
            }
        };

        self.phase = next;
        Ok(next)
    }

    fn apply_player_move(&mut self, action: PlayerMove) {
        match action {
            PlayerMove::Attack(roll) => {
                let damage = roll.landed_damage();
                self.enemy_hp -= damage;
                let crit = if roll.is_critical { " Critical hit!" } else { "" };
                let line = format!(
                    "{} attacks the {} for {} damage!{} ({} HP left)",
                    self.player.name,
                    self.enemy.name,
                    damage,
                    crit,
                    self.enemy_hp.max(0)
                );
                self.note(line);
            }
            PlayerMove::Skill { name, effect } => {
                self.enemy_hp -= effect.damage;
                self.player.health =
                    (self.player.health + effect.healing).min(self.player.max_health);
                let line = format!(
                    "{} uses {} and {}! ({} HP left)",
                    self.player.name,
                    name,
                    effect.describe(),
                    self.enemy_hp.max(0)
                );
                self.note(line);
            }
        }
    }

    fn apply_enemy_attack(&mut self, roll: AttackRoll, phrase: &str) {
        if roll.was_dodged {
            let line = format!(
                "The {} {}, but {} dodges!",
                self.enemy.name, phrase, self.player.name
            );
            self.note(line);
            return;
        }

        self.player.health -= roll.damage;
        let crit = if roll.is_critical { " Critical hit!" } else { "" };
        let line = format!(
            "The {} {} for {} damage!{} ({}/{} HP)",
            self.enemy.name,
            phrase,
            roll.damage,
            crit,
            self.player.health.max(0),
            self.player.max_health
        );
        self.note(line);
    }
}
