//! GameSession - the command-layer facade.
//!
//! Every chat command maps onto one method here. The session owns the shared
//! collaborators (record store, cooldowns, enemy catalog, configuration) and
//! sequences a battle: claim the user's battle slot, load the character, check
//! the cooldown, pick an enemy, run the battle, settle rewards, arm the
//! cooldown, then post the summary.

use crate::battle::{chunk_log, BattleChannel, BattleError, BattleMode, BattleOutcome, BattleRunner};
use crate::character::{Attribute, CharacterClass, CharacterRecord, NewCharacter, Race, UserId};
use crate::config::GameConfig;
use crate::cooldown::CooldownTracker;
use crate::enemies::{EnemyCatalog, LevelBand};
use crate::rewards::{self, Progression};
use crate::skills::{self, LearnOutcome, LearnedSkill, Skill, SkillId};
use crate::store::{CharacterStore, Settlement, StatUpgrade, StoreError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Errors from GameSession operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Battle error: {0}")]
    Battle(#[from] BattleError),

    #[error("No character found for user {0}")]
    CharacterNotFound(UserId),

    #[error("User {0} already has a character")]
    CharacterExists(UserId),

    #[error("Battle cooldown active: {remaining_secs}s remaining")]
    OnCooldown { remaining_secs: u64 },

    #[error("User {0} is already in a battle")]
    BattleInProgress(UserId),
}

impl SessionError {
    /// The reply shown in chat.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Store(_) | SessionError::Battle(_) => {
                "Sorry, something went wrong. Please try again later.".to_string()
            }
            SessionError::CharacterNotFound(_) => {
                "You don't have a character yet. Create one first!".to_string()
            }
            SessionError::CharacterExists(_) => "You already have a character.".to_string(),
            SessionError::OnCooldown { remaining_secs } => {
                format!("You need to rest! Try again in {remaining_secs}s.")
            }
            SessionError::BattleInProgress(_) => "You are already in a battle!".to_string(),
        }
    }
}

/// A settled battle.
#[derive(Debug, Clone)]
pub struct BattleReport {
    pub outcome: BattleOutcome,
    pub progression: Progression,
}

/// Marks a user as in battle until dropped.
struct BattleGuard<'a> {
    active: &'a Mutex<HashSet<UserId>>,
    user_id: UserId,
}

impl<'a> BattleGuard<'a> {
    fn acquire(active: &'a Mutex<HashSet<UserId>>, user_id: &UserId) -> Option<Self> {
        let mut users = active.lock().unwrap_or_else(PoisonError::into_inner);
        if !users.insert(user_id.clone()) {
            return None;
        }
        Some(Self {
            active,
            user_id: user_id.clone(),
        })
    }
}

impl Drop for BattleGuard<'_> {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.user_id);
    }
}

/// The game, as seen by the command layer.
pub struct GameSession {
    store: Arc<dyn CharacterStore>,
    cooldowns: CooldownTracker,
    catalog: EnemyCatalog,
    config: GameConfig,
    rng: Mutex<StdRng>,
    in_battle: Mutex<HashSet<UserId>>,
}

impl GameSession {
    /// A session over `store` with in-memory cooldowns and the standard bestiary.
    pub fn new(store: Arc<dyn CharacterStore>, config: GameConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut cooldowns = CooldownTracker::in_memory(config.cooldown_sweep_chance);
        if let Some(seed) = config.rng_seed {
            cooldowns = cooldowns.with_rng_seed(seed);
        }
        Self {
            store,
            cooldowns,
            catalog: EnemyCatalog::standard(),
            config,
            rng: Mutex::new(rng),
            in_battle: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_cooldowns(mut self, cooldowns: CooldownTracker) -> Self {
        self.cooldowns = cooldowns;
        self
    }

    pub fn with_catalog(mut self, catalog: EnemyCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn store(&self) -> &Arc<dyn CharacterStore> {
        &self.store
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn catalog(&self) -> &EnemyCatalog {
        &self.catalog
    }

    pub fn cooldowns(&self) -> &CooldownTracker {
        &self.cooldowns
    }

    /// Whether a battle is running for the user right now.
    pub fn in_battle(&self, user_id: &UserId) -> bool {
        self.in_battle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(user_id)
    }

    // ========================================================================
    // Characters
    // ========================================================================

    pub async fn create_character(
        &self,
        user_id: &UserId,
        name: &str,
        class: CharacterClass,
        race: Race,
    ) -> Result<CharacterRecord, SessionError> {
        let new = NewCharacter::new(user_id.clone(), name.trim(), class, race);
        match self.store.create_character(new).await {
            Ok(record) => {
                info!(user = %user_id, class = %class, "character created");
                Ok(record)
            }
            Err(StoreError::DuplicateCharacter(user)) => Err(SessionError::CharacterExists(user)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn character(&self, user_id: &UserId) -> Result<CharacterRecord, SessionError> {
        self.store
            .character(user_id)
            .await?
            .ok_or_else(|| SessionError::CharacterNotFound(user_id.clone()))
    }

    pub async fn upgrade_stat(
        &self,
        user_id: &UserId,
        attribute: Attribute,
        amount: u32,
    ) -> Result<StatUpgrade, SessionError> {
        self.store
            .upgrade_attribute(user_id, attribute, amount)
            .await?
            .ok_or_else(|| SessionError::CharacterNotFound(user_id.clone()))
    }

    pub async fn rest(&self, user_id: &UserId) -> Result<CharacterRecord, SessionError> {
        self.store
            .rest(user_id)
            .await?
            .ok_or_else(|| SessionError::CharacterNotFound(user_id.clone()))
    }

    pub async fn grant_xp(
        &self,
        user_id: &UserId,
        amount: u32,
    ) -> Result<Progression, SessionError> {
        rewards::grant_xp(self.store.as_ref(), user_id, amount, &self.config.leveling)
            .await?
            .ok_or_else(|| SessionError::CharacterNotFound(user_id.clone()))
    }

    // ========================================================================
    // Skills
    // ========================================================================

    /// Skills the user's class can learn.
    pub async fn class_skills(&self, user_id: &UserId) -> Result<Vec<Skill>, SessionError> {
        let character = self.character(user_id).await?;
        Ok(skills::skills_for_class(self.store.as_ref(), character.class).await?)
    }

    pub async fn learned_skills(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<LearnedSkill>, SessionError> {
        let character = self.character(user_id).await?;
        Ok(skills::learned_skills(self.store.as_ref(), character.id).await?)
    }

    pub async fn learn_skill(
        &self,
        user_id: &UserId,
        skill_id: SkillId,
    ) -> Result<LearnOutcome, SessionError> {
        let character = self.character(user_id).await?;
        Ok(skills::learn_skill(self.store.as_ref(), character.id, skill_id).await?)
    }

    // ========================================================================
    // Cooldowns
    // ========================================================================

    pub async fn is_on_cooldown(&self, user_id: &UserId) -> bool {
        self.cooldowns.is_on_cooldown(user_id).await
    }

    pub async fn remaining_cooldown(&self, user_id: &UserId) -> u64 {
        self.cooldowns.remaining_seconds(user_id).await
    }

    pub async fn arm_cooldown(&self, user_id: &UserId, duration: Duration) {
        self.cooldowns.arm(user_id, duration).await
    }

    // ========================================================================
    // Battles
    // ========================================================================

    /// Run a battle for the user and settle it.
    ///
    /// The battle slot is claimed before the cooldown is read, so a second
    /// invocation either finds the slot taken or sees the armed cooldown.
    /// Input collection has stopped by the time rewards are settled. Storage
    /// failures abort without rewards and without arming the cooldown; the log
    /// up to the failure has already been flushed to the channel.
    pub async fn start_battle(
        &self,
        user_id: &UserId,
        mode: BattleMode,
        channel: &mut dyn BattleChannel,
    ) -> Result<BattleReport, SessionError> {
        let _guard = BattleGuard::acquire(&self.in_battle, user_id)
            .ok_or_else(|| SessionError::BattleInProgress(user_id.clone()))?;

        let character = self.character(user_id).await?;

        let remaining_secs = self.cooldowns.remaining_seconds(user_id).await;
        if remaining_secs > 0 {
            return Err(SessionError::OnCooldown { remaining_secs });
        }

        let (enemy, seed) = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            let enemy = self.catalog.select(LevelBand::around(character.level), &mut *rng);
            (enemy, rng.gen::<u64>())
        };

        let mut runner = BattleRunner::new(
            self.store.as_ref(),
            &self.config,
            StdRng::seed_from_u64(seed),
        );
        let mut outcome = runner.run(&character, enemy, mode, channel).await?;

        let settlement = Settlement {
            xp: outcome.xp_earned,
            gold: outcome.gold_earned,
            final_health: Some(outcome.final_player_hp.max(1)),
        };
        let progression = match self
            .store
            .apply_settlement(user_id, &settlement, &self.config.leveling)
            .await
        {
            Ok(Some(progression)) => progression,
            Ok(None) => return Err(SessionError::CharacterNotFound(user_id.clone())),
            Err(e) => {
                warn!(user = %user_id, error = %e, "battle settlement failed");
                outcome.battle_log.push(
                    "Something went wrong while saving the results. No rewards were granted."
                        .to_string(),
                );
                if let Err(flush) = channel.finish(&outcome.battle_log).await {
                    warn!(user = %user_id, error = %flush, "failed to flush battle log");
                }
                return Err(e.into());
            }
        };

        self.cooldowns
            .arm(user_id, self.config.battle_cooldown)
            .await;

        outcome.battle_log.extend(summary_lines(&outcome, &progression));
        if let Err(e) = channel.finish(&outcome.battle_log).await {
            warn!(user = %user_id, error = %e, "failed to deliver battle summary");
        }

        Ok(BattleReport {
            outcome,
            progression,
        })
    }

    /// The final log split into chat-sized messages.
    pub fn log_messages(outcome: &BattleOutcome) -> Vec<String> {
        chunk_log(&outcome.battle_log, crate::battle::LOG_CHUNK_CHARS)
    }
}

fn summary_lines(outcome: &BattleOutcome, progression: &Progression) -> Vec<String> {
    let mut lines = vec![format!(
        "Result: {} after {} round(s). +{} XP, +{} gold.",
        outcome.result, outcome.rounds_fought, outcome.xp_earned, outcome.gold_earned
    )];
    if progression.leveled_up {
        lines.push(format!(
            "LEVEL UP! You are now level {} and gained {} stat points.",
            progression.new_level, progression.stat_points_granted
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::ScriptedChannel;

    #[tokio::test]
    async fn test_missing_character() {
        let session = GameSession::new(Arc::new(MemoryStore::new()), GameConfig::default());
        let mut channel = ScriptedChannel::new("u1");
        let result = session
            .start_battle(&UserId::from("u1"), BattleMode::Quick, &mut channel)
            .await;
        assert!(matches!(result, Err(SessionError::CharacterNotFound(_))));
    }

    #[tokio::test]
    async fn test_duplicate_character() {
        let session = GameSession::new(Arc::new(MemoryStore::new()), GameConfig::default());
        let user = UserId::from("u1");
        session
            .create_character(&user, "Brom", CharacterClass::Warrior, Race::Human)
            .await
            .unwrap();
        let again = session
            .create_character(&user, "Brom", CharacterClass::Mage, Race::Elf)
            .await;
        assert!(matches!(again, Err(SessionError::CharacterExists(_))));
    }

    #[test]
    fn test_battle_guard_is_exclusive() {
        let active = Mutex::new(HashSet::new());
        let user = UserId::from("u1");
        let guard = BattleGuard::acquire(&active, &user).unwrap();
        assert!(BattleGuard::acquire(&active, &user).is_none());
        drop(guard);
        assert!(BattleGuard::acquire(&active, &user).is_some());
    }

    #[test]
    fn test_user_messages() {
        let err = SessionError::OnCooldown { remaining_secs: 42 };
        assert!(err.user_message().contains("42s"));
        let err = SessionError::Store(StoreError::Unavailable("down".into()));
        assert!(err.user_message().starts_with("Sorry"));
    }
}
