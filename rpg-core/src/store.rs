//! Character persistence.
//!
//! [`CharacterStore`] is the boundary to the durable record store. Every
//! method that mutates state is one atomic unit: the learn-skill insert is
//! check-and-insert, mana spending is a relative decrement, and settlement
//! applies health, gold, experience, level and stat points together.
//!
//! [`MemoryStore`] implements it behind a single `RwLock` and can snapshot
//! itself to versioned JSON.

use crate::character::{
    Attribute, CharacterClass, CharacterId, CharacterRecord, NewCharacter, UserId,
};
use crate::rewards::{LevelingRules, Progression};
use crate::skills::{fallback_skills, LearnedSkill, Skill, SkillId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::debug;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("User {0} already has a character")]
    DuplicateCharacter(UserId),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Result of a conditional mana decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManaSpend {
    Spent { remaining: i32 },
    Insufficient { available: i32 },
}

/// Net effect of a battle (or a plain XP grant) on a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Settlement {
    pub xp: u32,
    pub gold: u32,
    /// Health to write back; untouched when `None`.
    pub final_health: Option<i32>,
}

/// Result of spending stat points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatUpgrade {
    Applied {
        attribute: Attribute,
        old_value: i32,
        new_value: i32,
        remaining_points: u32,
    },
    NotEnoughPoints {
        available: u32,
        requested: u32,
    },
}

/// The persistent record store.
#[async_trait]
pub trait CharacterStore: Send + Sync {
    /// Look up the character owned by a user.
    async fn character(&self, user_id: &UserId) -> Result<Option<CharacterRecord>, StoreError>;

    async fn character_by_id(&self, id: CharacterId)
        -> Result<Option<CharacterRecord>, StoreError>;

    /// Create a level 1 character; one per user.
    async fn create_character(&self, new: NewCharacter) -> Result<CharacterRecord, StoreError>;

    /// Authored skills for a class, in no particular order.
    async fn class_skills(&self, class: CharacterClass) -> Result<Vec<Skill>, StoreError>;

    /// An authored skill by id.
    async fn skill(&self, id: SkillId) -> Result<Option<Skill>, StoreError>;

    /// Skills a character has learned, lowest level requirement first.
    async fn learned_skills(&self, id: CharacterId) -> Result<Vec<LearnedSkill>, StoreError>;

    /// Record a learned skill. Returns `false` when the pair already exists.
    async fn insert_learned_skill(
        &self,
        id: CharacterId,
        skill_id: SkillId,
    ) -> Result<bool, StoreError>;

    /// `mana = mana - cost` when `mana >= cost`. `None` when no such character.
    async fn spend_mana(&self, id: CharacterId, cost: i32)
        -> Result<Option<ManaSpend>, StoreError>;

    /// Apply a settlement atomically. `None` when the user has no character.
    async fn apply_settlement(
        &self,
        user_id: &UserId,
        settlement: &Settlement,
        rules: &LevelingRules,
    ) -> Result<Option<Progression>, StoreError>;

    /// Spend stat points on an attribute, updating derived health and mana.
    async fn upgrade_attribute(
        &self,
        user_id: &UserId,
        attribute: Attribute,
        amount: u32,
    ) -> Result<Option<StatUpgrade>, StoreError>;

    /// Restore health and mana to maximum.
    async fn rest(&self, user_id: &UserId) -> Result<Option<CharacterRecord>, StoreError>;
}

/// Current snapshot file version.
const SNAPSHOT_VERSION: u32 = 1;

/// A learned-skill relationship row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedRecord {
    pub character_id: CharacterId,
    pub skill_id: SkillId,
    pub unlocked: bool,
    pub skill_level: u32,
}

/// Serialized form of a [`MemoryStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: u32,
    pub saved_at: String,
    pub next_character_id: u64,
    pub characters: Vec<CharacterRecord>,
    pub skills: Vec<Skill>,
    pub learned: Vec<LearnedRecord>,
}

#[derive(Debug, Default)]
struct StoreData {
    next_character_id: u64,
    characters: HashMap<CharacterId, CharacterRecord>,
    users: HashMap<UserId, CharacterId>,
    skills: BTreeMap<SkillId, Skill>,
    learned: HashMap<CharacterId, BTreeMap<SkillId, LearnedRecord>>,
}

impl StoreData {
    fn character_mut(&mut self, user_id: &UserId) -> Option<&mut CharacterRecord> {
        let id = self.users.get(user_id).copied()?;
        self.characters.get_mut(&id)
    }

    fn resolve_skill(&self, id: SkillId) -> Option<Skill> {
        self.skills.get(&id).cloned().or_else(|| {
            CharacterClass::all()
                .into_iter()
                .flat_map(fallback_skills)
                .find(|s| s.id == id)
        })
    }
}

/// In-memory [`CharacterStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<StoreData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-loaded with authored skill definitions.
    pub fn with_skills(skills: impl IntoIterator<Item = Skill>) -> Self {
        let data = StoreData {
            skills: skills.into_iter().map(|s| (s.id, s)).collect(),
            ..StoreData::default()
        };
        Self {
            data: RwLock::new(data),
        }
    }

    /// Insert or replace a character record as-is.
    pub async fn put_character(&self, record: CharacterRecord) {
        let mut data = self.data.write().await;
        data.next_character_id = data.next_character_id.max(record.id.0);
        data.users.insert(record.user_id.clone(), record.id);
        data.characters.insert(record.id, record);
    }

    pub async fn learned_count(&self, id: CharacterId) -> usize {
        self.data
            .read()
            .await
            .learned
            .get(&id)
            .map(|m| m.len())
            .unwrap_or(0)
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        let data = self.data.read().await;
        let mut characters: Vec<_> = data.characters.values().cloned().collect();
        characters.sort_by_key(|c| c.id);

        StoreSnapshot {
            version: SNAPSHOT_VERSION,
            saved_at: chrono::Utc::now().to_rfc3339(),
            next_character_id: data.next_character_id,
            characters,
            skills: data.skills.values().cloned().collect(),
            learned: data
                .learned
                .values()
                .flat_map(|m| m.values().cloned())
                .collect(),
        }
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self, StoreError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: SNAPSHOT_VERSION,
                found: snapshot.version,
            });
        }

        let mut data = StoreData {
            next_character_id: snapshot.next_character_id,
            ..StoreData::default()
        };
        for character in snapshot.characters {
            data.next_character_id = data.next_character_id.max(character.id.0);
            data.users.insert(character.user_id.clone(), character.id);
            data.characters.insert(character.id, character);
        }
        data.skills = snapshot.skills.into_iter().map(|s| (s.id, s)).collect();
        for row in snapshot.learned {
            data.learned
                .entry(row.character_id)
                .or_default()
                .insert(row.skill_id, row);
        }

        Ok(Self {
            data: RwLock::new(data),
        })
    }

    /// Save to a JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(&self.snapshot().await)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let content = fs::read_to_string(path).await?;
        let snapshot: StoreSnapshot = serde_json::from_str(&content)?;
        Self::from_snapshot(snapshot)
    }
}

#[async_trait]
impl CharacterStore for MemoryStore {
    async fn character(&self, user_id: &UserId) -> Result<Option<CharacterRecord>, StoreError> {
        let data = self.data.read().await;
        Ok(data
            .users
            .get(user_id)
            .and_then(|id| data.characters.get(id))
            .cloned())
    }

    async fn character_by_id(
        &self,
        id: CharacterId,
    ) -> Result<Option<CharacterRecord>, StoreError> {
        Ok(self.data.read().await.characters.get(&id).cloned())
    }

    async fn create_character(&self, new: NewCharacter) -> Result<CharacterRecord, StoreError> {
        let mut data = self.data.write().await;
        if data.users.contains_key(&new.user_id) {
            return Err(StoreError::DuplicateCharacter(new.user_id));
        }

        data.next_character_id += 1;
        let id = CharacterId(data.next_character_id);
        let record = CharacterRecord::create(id, new);
        data.users.insert(record.user_id.clone(), id);
        data.characters.insert(id, record.clone());

        debug!(character = %id, user = %record.user_id, "character created");
        Ok(record)
    }

    async fn class_skills(&self, class: CharacterClass) -> Result<Vec<Skill>, StoreError> {
        Ok(self
            .data
            .read()
            .await
            .skills
            .values()
            .filter(|s| s.class == class)
            .cloned()
            .collect())
    }

    async fn skill(&self, id: SkillId) -> Result<Option<Skill>, StoreError> {
        Ok(self.data.read().await.skills.get(&id).cloned())
    }

    async fn learned_skills(&self, id: CharacterId) -> Result<Vec<LearnedSkill>, StoreError> {
        let data = self.data.read().await;
        let mut learned: Vec<LearnedSkill> = data
            .learned
            .get(&id)
            .into_iter()
            .flat_map(|rows| rows.values())
            .filter_map(|row| {
                data.resolve_skill(row.skill_id).map(|skill| LearnedSkill {
                    skill,
                    unlocked: row.unlocked,
                    skill_level: row.skill_level,
                })
            })
            .collect();
        learned.sort_by_key(|l| (l.skill.level_required, l.skill.id));
        Ok(learned)
    }

    async fn insert_learned_skill(
        &self,
        id: CharacterId,
        skill_id: SkillId,
    ) -> Result<bool, StoreError> {
        let mut data = self.data.write().await;
        let rows = data.learned.entry(id).or_default();
        if rows.contains_key(&skill_id) {
            return Ok(false);
        }
        rows.insert(
            skill_id,
            LearnedRecord {
                character_id: id,
                skill_id,
                unlocked: true,
                skill_level: 1,
            },
        );
        Ok(true)
    }

    async fn spend_mana(
        &self,
        id: CharacterId,
        cost: i32,
    ) -> Result<Option<ManaSpend>, StoreError> {
        let mut data = self.data.write().await;
        let Some(character) = data.characters.get_mut(&id) else {
            return Ok(None);
        };

        if character.mana < cost {
            return Ok(Some(ManaSpend::Insufficient {
                available: character.mana,
            }));
        }
        character.mana -= cost;
        Ok(Some(ManaSpend::Spent {
            remaining: character.mana,
        }))
    }

    async fn apply_settlement(
        &self,
        user_id: &UserId,
        settlement: &Settlement,
        rules: &LevelingRules,
    ) -> Result<Option<Progression>, StoreError> {
        let mut data = self.data.write().await;
        let Some(character) = data.character_mut(user_id) else {
            return Ok(None);
        };

        if let Some(health) = settlement.final_health {
            character.health = health.clamp(0, character.max_health);
        }
        character.gold = character.gold.saturating_add(settlement.gold);

        let progression = rules.advance(character.level, character.xp, settlement.xp);
        character.level = progression.new_level;
        character.xp = progression.remaining_xp;
        character.stat_points += progression.stat_points_granted;
        if progression.leveled_up && rules.heal_on_level_up {
            character.health = character.max_health;
        }

        Ok(Some(progression))
    }

    async fn upgrade_attribute(
        &self,
        user_id: &UserId,
        attribute: Attribute,
        amount: u32,
    ) -> Result<Option<StatUpgrade>, StoreError> {
        let mut data = self.data.write().await;
        let Some(character) = data.character_mut(user_id) else {
            return Ok(None);
        };

        if character.stat_points < amount {
            return Ok(Some(StatUpgrade::NotEnoughPoints {
                available: character.stat_points,
                requested: amount,
            }));
        }

        let points = amount as i32;
        let old_value = character.attributes.get(attribute);
        character.attributes.set(attribute, old_value + points);
        character.stat_points -= amount;

        let health_gain = attribute.health_per_point() * points;
        character.max_health += health_gain;
        character.health += health_gain;
        let mana_gain = attribute.mana_per_point() * points;
        character.max_mana += mana_gain;
        character.mana += mana_gain;

        Ok(Some(StatUpgrade::Applied {
            attribute,
            old_value,
            new_value: old_value + points,
            remaining_points: character.stat_points,
        }))
    }

    async fn rest(&self, user_id: &UserId) -> Result<Option<CharacterRecord>, StoreError> {
        let mut data = self.data.write().await;
        let Some(character) = data.character_mut(user_id) else {
            return Ok(None);
        };
        character.health = character.max_health;
        character.mana = character.max_mana;
        Ok(Some(character.clone()))
    }
}
