//! Skill definitions, learning and in-battle use.
//!
//! Skill definitions are global and keyed by [`SkillId`]. Learning creates a
//! (character, skill) relationship exactly once; it is never removed.
//! Every class has a small built-in kit that applies when the store holds no
//! authored skills for it.

use crate::character::{CharacterClass, CharacterId};
use crate::combat::PlayerStats;
use crate::store::{CharacterStore, ManaSpend, StoreError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Unique identifier for skills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SkillId(pub u32);

impl fmt::Display for SkillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The skill that heals instead of dealing damage.
pub const REGENERATION: SkillId = SkillId(102);

/// Percent of max HP restored by [`REGENERATION`].
pub const REGENERATION_HEAL_PERCENT: i32 = 15;

/// A skill definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub id: SkillId,
    pub name: String,
    pub description: String,
    pub class: CharacterClass,
    pub level_required: u32,
    pub mana_cost: i32,
    /// Seconds between uses. Declared for display; battles do not enforce it.
    pub cooldown_secs: u32,
    pub is_passive: bool,
}

impl Skill {
    pub fn is_active(&self) -> bool {
        !self.is_passive
    }
}

/// A skill a character has unlocked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedSkill {
    pub skill: Skill,
    pub unlocked: bool,
    pub skill_level: u32,
}

/// Outcome of trying to learn a skill.
#[derive(Debug, Clone, PartialEq)]
pub enum LearnOutcome {
    Learned(Skill),
    AlreadyKnown(Skill),
    LevelTooLow { skill: Skill, required: u32, current: u32 },
    /// The id is unknown or belongs to another class.
    UnknownSkill(SkillId),
    CharacterNotFound,
}

impl LearnOutcome {
    pub fn message(&self) -> String {
        match self {
            LearnOutcome::Learned(skill) => format!("Successfully learned: {}", skill.name),
            LearnOutcome::AlreadyKnown(skill) => format!("You already know {}", skill.name),
            LearnOutcome::LevelTooLow {
                required, current, ..
            } => format!("Requires level {required} (you're level {current})"),
            LearnOutcome::UnknownSkill(_) => "Skill not available for your class".to_string(),
            LearnOutcome::CharacterNotFound => "Character not found".to_string(),
        }
    }
}

/// What a skill did when used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SkillEffect {
    pub damage: i32,
    pub healing: i32,
}

impl SkillEffect {
    pub fn describe(&self) -> String {
        match (self.damage > 0, self.healing > 0) {
            (true, true) => format!(
                "deals {} damage and restores {} HP",
                self.damage, self.healing
            ),
            (false, true) => format!("restores {} HP", self.healing),
            _ => format!("deals {} damage", self.damage),
        }
    }
}

/// Outcome of using a skill.
#[derive(Debug, Clone, PartialEq)]
pub enum SkillUse {
    Applied {
        skill: Skill,
        effect: SkillEffect,
        remaining_mana: i32,
    },
    NotLearned(SkillId),
    InsufficientMana { skill: Skill, available: i32 },
    /// Passive skills are always on and cannot be invoked.
    Passive(Skill),
}

/// The built-in kit for a class.
pub fn fallback_skills(class: CharacterClass) -> Vec<Skill> {
    let skill = |id: u32,
                 name: &str,
                 description: &str,
                 cooldown: u32,
                 level: u32,
                 mana: i32,
                 passive: bool| Skill {
        id: SkillId(id),
        name: name.to_string(),
        description: description.to_string(),
        class,
        level_required: level,
        mana_cost: mana,
        cooldown_secs: cooldown,
        is_passive: passive,
    };

    match class {
        CharacterClass::Warrior => vec![
            skill(
                101,
                "Provoking Shout",
                "Taunts enemies to attack you for 3 rounds (+50% threat generation)",
                8,
                1,
                10,
                false,
            ),
            skill(
                102,
                "Regeneration",
                "Heals 15% of max HP over 10 seconds",
                20,
                3,
                15,
                false,
            ),
        ],
        CharacterClass::Rogue => vec![skill(
            301,
            "Backstab",
            "Deals 250% damage when attacking from behind",
            0,
            1,
            0,
            true,
        )],
        CharacterClass::Ranged => vec![skill(
            201,
            "Explosive Arrow",
            "Shoots an arrow that explodes on impact (150% damage in AoE)",
            12,
            1,
            20,
            false,
        )],
        CharacterClass::Mage => vec![skill(
            401,
            "Arcane Bolt",
            "Hurls a bolt of raw arcane force at a single enemy",
            6,
            1,
            15,
            false,
        )],
    }
}

/// Skills a class can learn, lowest level requirement first.
pub async fn skills_for_class(
    store: &dyn CharacterStore,
    class: CharacterClass,
) -> Result<Vec<Skill>, StoreError> {
    let mut skills = store.class_skills(class).await?;
    if skills.is_empty() {
        skills = fallback_skills(class);
    }
    skills.sort_by_key(|s| s.level_required);
    Ok(skills)
}

/// Look a skill up by id, restricted to `class` when given.
pub async fn find_skill(
    store: &dyn CharacterStore,
    id: SkillId,
    class: Option<CharacterClass>,
) -> Result<Option<Skill>, StoreError> {
    if let Some(skill) = store.skill(id).await? {
        if class.map_or(true, |c| c == skill.class) {
            return Ok(Some(skill));
        }
        return Ok(None);
    }

    let classes = match class {
        Some(c) => vec![c],
        None => CharacterClass::all().to_vec(),
    };
    Ok(classes
        .into_iter()
        .flat_map(fallback_skills)
        .find(|s| s.id == id))
}

/// Skills the character has unlocked.
pub async fn learned_skills(
    store: &dyn CharacterStore,
    character_id: CharacterId,
) -> Result<Vec<LearnedSkill>, StoreError> {
    store.learned_skills(character_id).await
}

/// Learn a skill for a character.
///
/// The final insert is check-and-insert inside the store, so two concurrent
/// calls for the same pair leave exactly one record and one `AlreadyKnown`.
pub async fn learn_skill(
    store: &dyn CharacterStore,
    character_id: CharacterId,
    skill_id: SkillId,
) -> Result<LearnOutcome, StoreError> {
    let Some(character) = store.character_by_id(character_id).await? else {
        return Ok(LearnOutcome::CharacterNotFound);
    };

    let Some(skill) = find_skill(store, skill_id, Some(character.class)).await? else {
        return Ok(LearnOutcome::UnknownSkill(skill_id));
    };

    let known = store.learned_skills(character_id).await?;
    if known.iter().any(|l| l.skill.id == skill_id) {
        return Ok(LearnOutcome::AlreadyKnown(skill));
    }

    if character.level < skill.level_required {
        return Ok(LearnOutcome::LevelTooLow {
            required: skill.level_required,
            current: character.level,
            skill,
        });
    }

    if !store.insert_learned_skill(character_id, skill.id).await? {
        return Ok(LearnOutcome::AlreadyKnown(skill));
    }

    info!(character = %character_id, skill = %skill.name, "skill learned");
    Ok(LearnOutcome::Learned(skill))
}

/// Roll the effect of an active skill for `caster`.
pub fn roll_effect(skill: &Skill, caster: &PlayerStats, rng: &mut impl Rng) -> SkillEffect {
    if skill.id == REGENERATION {
        return SkillEffect {
            damage: 0,
            healing: caster.max_health * REGENERATION_HEAL_PERCENT / 100,
        };
    }

    let base = caster.strength as f64 * 0.5 + caster.dexterity as f64 * 0.3;
    let damage = (base * rng.gen_range(0.75..1.25)).max(0.0).round() as i32;
    SkillEffect { damage, healing: 0 }
}

/// Use a learned skill.
///
/// Mana is deducted from the persistent record straight away, as a relative
/// decrement that fails when the character cannot afford the cost.
pub async fn use_skill<R: Rng + Send>(
    store: &dyn CharacterStore,
    character_id: CharacterId,
    skill_id: SkillId,
    caster: &PlayerStats,
    rng: &mut R,
) -> Result<SkillUse, StoreError> {
    let learned = store.learned_skills(character_id).await?;
    let Some(entry) = learned
        .into_iter()
        .find(|l| l.skill.id == skill_id && l.unlocked)
    else {
        return Ok(SkillUse::NotLearned(skill_id));
    };
    let skill = entry.skill;

    if skill.is_passive {
        return Ok(SkillUse::Passive(skill));
    }

    match store.spend_mana(character_id, skill.mana_cost).await? {
        Some(ManaSpend::Spent { remaining }) => {
            let effect = roll_effect(&skill, caster, rng);
            debug!(
                character = %character_id,
                skill = %skill.name,
                ?effect,
                remaining,
                "skill used"
            );
            Ok(SkillUse::Applied {
                skill,
                effect,
                remaining_mana: remaining,
            })
        }
        Some(ManaSpend::Insufficient { available }) => {
            Ok(SkillUse::InsufficientMana { skill, available })
        }
        None => Ok(SkillUse::NotLearned(skill_id)),
    }
}
