//! Drives a [`Battle`] from the first prompt to a result.
//!
//! The runner picks the player's move according to the battle mode, rolls the
//! enemy's attack, and feeds both into the state machine. Manual battles are
//! the only ones that touch the channel mid-fight; they suspend once per turn
//! waiting for the owner's click or the turn timeout.

use super::channel::{ActionId, BattleChannel, ChannelError, TurnPrompt};
use super::state::{Battle, BattleEvent, Phase, PlayerMove, TransitionError};
use super::{BattleId, BattleMode, BattleResult};
use crate::character::{CharacterId, CharacterRecord, UserId};
use crate::combat::{compute_attack, Combatant, PlayerStats};
use crate::config::GameConfig;
use crate::enemies::EnemyArchetype;
use crate::rewards::BattleRewards;
use crate::skills::{use_skill, Skill, SkillId, SkillUse};
use crate::store::{CharacterStore, StoreError};
use rand::rngs::StdRng;
use rand::Rng;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

/// Infrastructure failures that abort a battle.
#[derive(Debug, Error)]
pub enum BattleError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Presentation error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Battle state error: {0}")]
    Transition(#[from] TransitionError),
}

/// The settled view of a finished battle.
#[derive(Debug, Clone)]
pub struct BattleOutcome {
    pub battle_id: BattleId,
    pub mode: BattleMode,
    pub result: BattleResult,
    pub victory: bool,
    pub battle_log: Vec<String>,
    /// Battle-local HP at the end, never below zero.
    pub final_player_hp: i32,
    pub final_enemy_hp: i32,
    pub xp_earned: u32,
    pub gold_earned: u32,
    pub rounds_fought: u32,
    pub enemy: Arc<EnemyArchetype>,
}

impl BattleOutcome {
    pub fn from_battle(battle: Battle) -> Result<Self, TransitionError> {
        let result = battle.result().ok_or(TransitionError::NotFinished)?;
        let rewards = BattleRewards::for_result(result, battle.enemy());

        Ok(Self {
            battle_id: battle.id(),
            mode: battle.mode(),
            result,
            victory: result.is_victory(),
            final_player_hp: battle.player().health.max(0),
            final_enemy_hp: battle.enemy_hp().max(0),
            xp_earned: rewards.xp,
            gold_earned: rewards.gold,
            rounds_fought: battle.round(),
            enemy: battle.enemy_archetype(),
            battle_log: battle.log().to_vec(),
        })
    }
}

/// Runs battles against a store with one random stream.
pub struct BattleRunner<'a> {
    store: &'a dyn CharacterStore,
    config: &'a GameConfig,
    rng: StdRng,
}

impl<'a> BattleRunner<'a> {
    pub fn new(store: &'a dyn CharacterStore, config: &'a GameConfig, rng: StdRng) -> Self {
        Self { store, config, rng }
    }

    /// Fight `enemy` with `character` until the battle ends.
    ///
    /// Input collection is stopped before this returns, whatever the result.
    /// On a storage or channel failure the log so far is flushed to the
    /// channel with an apology and the error is returned; nothing is settled.
    pub async fn run(
        &mut self,
        character: &CharacterRecord,
        enemy: Arc<EnemyArchetype>,
        mode: BattleMode,
        channel: &mut dyn BattleChannel,
    ) -> Result<BattleOutcome, BattleError> {
        let mut battle = Battle::new(
            mode,
            PlayerStats::from(character),
            enemy,
            self.config.round_cap(mode),
            self.config.idle_forfeit_limit,
        );
        info!(
            battle = %battle.id(),
            user = %character.user_id,
            enemy = %battle.enemy().name,
            %mode,
            "battle started"
        );

        let driven = self.drive(&mut battle, character, channel).await;
        if let Err(e) = channel.stop_input().await {
            warn!(battle = %battle.id(), error = %e, "failed to stop input collection");
        }

        if let Err(e) = driven {
            warn!(battle = %battle.id(), error = %e, "battle aborted");
            battle.note(
                "Something went wrong and the battle was interrupted. No rewards were granted.",
            );
            if let Err(flush) = channel.finish(battle.log()).await {
                warn!(battle = %battle.id(), error = %flush, "failed to flush battle log");
            }
            return Err(e);
        }

        let outcome = BattleOutcome::from_battle(battle)?;
        info!(
            battle = %outcome.battle_id,
            result = %outcome.result,
            rounds = outcome.rounds_fought,
            xp = outcome.xp_earned,
            gold = outcome.gold_earned,
            "battle finished"
        );
        Ok(outcome)
    }

    async fn drive(
        &mut self,
        battle: &mut Battle,
        character: &CharacterRecord,
        channel: &mut dyn BattleChannel,
    ) -> Result<(), BattleError> {
        let skills: Vec<Skill> = self
            .store
            .learned_skills(character.id)
            .await?
            .into_iter()
            .filter(|l| l.unlocked && l.skill.is_active())
            .map(|l| l.skill)
            .collect();

        loop {
            let event = match battle.phase() {
                Phase::Finished(_) => return Ok(()),
                Phase::EnemyTurn => self.enemy_attack(battle),
                Phase::PlayerTurn => match battle.mode() {
                    BattleMode::Manual => {
                        self.manual_turn(battle, character, &skills, channel).await?
                    }
                    BattleMode::Quick => self.basic_attack(battle),
                    BattleMode::Hybrid => self.hybrid_turn(battle, character.id, &skills).await?,
                },
            };
            battle.transition(event)?;
        }
    }

    fn basic_attack(&mut self, battle: &Battle) -> BattleEvent {
        let roll = compute_attack(
            Combatant::Player(battle.player()),
            Combatant::Enemy(battle.enemy()),
            &mut self.rng,
        );
        BattleEvent::PlayerActed(PlayerMove::Attack(roll))
    }

    fn enemy_attack(&mut self, battle: &Battle) -> BattleEvent {
        let roll = compute_attack(
            Combatant::Enemy(battle.enemy()),
            Combatant::Player(battle.player()),
            &mut self.rng,
        );
        let phrase = battle.enemy().attack_phrase(&mut self.rng).to_string();
        BattleEvent::EnemyActed { roll, phrase }
    }

    /// Spend mana for a skill and keep the battle's copy in step with the store.
    async fn cast(
        &mut self,
        battle: &mut Battle,
        character_id: CharacterId,
        skill_id: SkillId,
    ) -> Result<SkillUse, StoreError> {
        let used = use_skill(
            self.store,
            character_id,
            skill_id,
            battle.player(),
            &mut self.rng,
        )
        .await?;

        match &used {
            SkillUse::Applied { remaining_mana, .. } => battle.set_player_mana(*remaining_mana),
            SkillUse::InsufficientMana { available, .. } => battle.set_player_mana(*available),
            _ => {}
        }
        Ok(used)
    }

    async fn manual_turn(
        &mut self,
        battle: &mut Battle,
        character: &CharacterRecord,
        skills: &[Skill],
        channel: &mut dyn BattleChannel,
    ) -> Result<BattleEvent, BattleError> {
        // One deadline per turn; re-prompts and rejected clicks do not reset it.
        let deadline = Instant::now() + self.config.turn_timeout;
        loop {
            let prompt = prompt_for(battle, skills);
            channel.present(battle.log(), &prompt).await?;

            let Some(action) = self
                .await_action(&character.user_id, deadline, channel)
                .await?
            else {
                debug!(battle = %battle.id(), round = battle.round(), "turn forfeited");
                return Ok(BattleEvent::TimedOut);
            };

            let skill_id = match action {
                ActionId::Flee => return Ok(BattleEvent::Fled),
                ActionId::BasicAttack => return Ok(self.basic_attack(battle)),
                ActionId::Skill(id) => id,
            };

            match self.cast(battle, character.id, skill_id).await? {
                SkillUse::Applied { skill, effect, .. } => {
                    return Ok(BattleEvent::PlayerActed(PlayerMove::Skill {
                        name: skill.name,
                        effect,
                    }))
                }
                SkillUse::InsufficientMana { skill, available } => {
                    battle.note(format!(
                        "Not enough mana for {} ({}/{} MP). Choose another action.",
                        skill.name, available, skill.mana_cost
                    ));
                }
                SkillUse::NotLearned(_) | SkillUse::Passive(_) => {
                    battle.note("That skill can't be used. You make a basic attack instead.");
                    return Ok(self.basic_attack(battle));
                }
            }
        }
    }

    /// Wait for the owner's click until the turn deadline.
    ///
    /// Clicks from other users are rejected and do not extend the deadline.
    /// `None` means the turn timed out or the channel closed.
    async fn await_action(
        &self,
        owner: &UserId,
        deadline: Instant,
        channel: &mut dyn BattleChannel,
    ) -> Result<Option<ActionId>, ChannelError> {
        loop {
            match time::timeout_at(deadline, channel.next_interaction()).await {
                Err(_) | Ok(None) => return Ok(None),
                Ok(Some(interaction)) if interaction.user_id != *owner => {
                    channel
                        .reject(&interaction, "This is not your battle!")
                        .await?;
                }
                Ok(Some(interaction)) => return Ok(Some(interaction.action)),
            }
        }
    }

    async fn hybrid_turn(
        &mut self,
        battle: &mut Battle,
        character_id: CharacterId,
        skills: &[Skill],
    ) -> Result<BattleEvent, BattleError> {
        let affordable: Vec<SkillId> = skills
            .iter()
            .filter(|s| s.mana_cost <= battle.player().mana)
            .map(|s| s.id)
            .collect();

        if !affordable.is_empty() && self.rng.gen::<f64>() < self.config.hybrid_skill_chance {
            let skill_id = affordable[self.rng.gen_range(0..affordable.len())];
            if let SkillUse::Applied { skill, effect, .. } =
                self.cast(battle, character_id, skill_id).await?
            {
                return Ok(BattleEvent::PlayerActed(PlayerMove::Skill {
                    name: skill.name,
                    effect,
                }));
            }
        }

        Ok(self.basic_attack(battle))
    }
}

fn prompt_for(battle: &Battle, skills: &[Skill]) -> TurnPrompt {
    let player = battle.player();
    TurnPrompt {
        round: battle.round(),
        round_cap: battle.round_cap(),
        player_hp: player.health,
        player_max_hp: player.max_health,
        player_mana: player.mana,
        player_max_mana: player.max_mana,
        enemy_name: battle.enemy().name.clone(),
        enemy_hp: battle.enemy_hp(),
        enemy_max_hp: battle.enemy().health,
        actions: TurnPrompt::actions_for(skills, player.mana),
    }
}
