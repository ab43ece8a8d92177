//! Attack resolution for any attacker/defender pair.
//!
//! The formulas are asymmetric on purpose and each asymmetry lives in one
//! match arm on [`Combatant`]:
//! - offense: players use `strength*0.7 + dexterity*0.3 + weapon`, enemies
//!   jitter their attack by ±10% on every call
//! - defense: enemies jitter theirs by ±20%, players use
//!   `constitution*0.6 + dexterity*0.2 + armor`
//! - criticals: `0.05 + dexterity*0.005` for players, flat `0.05` for enemies
//! - dodges: rolled only when an enemy attacks, at `agility*0.005` of the defender

use crate::character::CharacterRecord;
use crate::enemies::EnemyArchetype;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const BASE_CRIT_CHANCE: f64 = 0.05;
pub const CRIT_CHANCE_PER_DEX: f64 = 0.005;
pub const CRIT_MULTIPLIER: f64 = 1.5;
pub const DODGE_CHANCE_PER_AGILITY: f64 = 0.005;
/// Fraction of the defense value subtracted from offense.
pub const DEFENSE_FACTOR: f64 = 0.6;

/// The numbers combat needs from a player character.
///
/// Loaded once per battle; HP and mana here are the battle-local working copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub name: String,
    pub strength: i32,
    pub dexterity: i32,
    pub agility: i32,
    pub constitution: i32,
    pub wisdom: i32,
    pub intelligence: i32,
    pub health: i32,
    pub max_health: i32,
    pub mana: i32,
    pub max_mana: i32,
    pub weapon_bonus: i32,
    pub armor_bonus: i32,
}

impl From<&CharacterRecord> for PlayerStats {
    fn from(record: &CharacterRecord) -> Self {
        let a = &record.attributes;
        Self {
            name: record.name.clone(),
            strength: a.strength,
            dexterity: a.dexterity,
            agility: a.agility,
            constitution: a.constitution,
            wisdom: a.wisdom,
            intelligence: a.intelligence,
            health: record.health,
            max_health: record.max_health,
            mana: record.mana,
            max_mana: record.max_mana,
            weapon_bonus: 0,
            armor_bonus: 0,
        }
    }
}

/// One side of an exchange.
#[derive(Debug, Clone, Copy)]
pub enum Combatant<'a> {
    Player(&'a PlayerStats),
    Enemy(&'a EnemyArchetype),
}

impl Combatant<'_> {
    pub fn is_player(&self) -> bool {
        matches!(self, Combatant::Player(_))
    }

    /// Enemies have no agility stat.
    pub fn agility(&self) -> i32 {
        match self {
            Combatant::Player(p) => p.agility,
            Combatant::Enemy(_) => 0,
        }
    }

    fn offense(&self, rng: &mut impl Rng) -> f64 {
        match self {
            Combatant::Player(p) => {
                p.strength as f64 * 0.7 + p.dexterity as f64 * 0.3 + p.weapon_bonus as f64
            }
            Combatant::Enemy(e) => e.attack as f64 * rng.gen_range(0.9..1.1),
        }
    }

    fn defense(&self, rng: &mut impl Rng) -> f64 {
        match self {
            Combatant::Player(p) => {
                p.constitution as f64 * 0.6 + p.dexterity as f64 * 0.2 + p.armor_bonus as f64
            }
            Combatant::Enemy(e) => e.defense as f64 * rng.gen_range(0.8..1.2),
        }
    }

    pub fn crit_chance(&self) -> f64 {
        match self {
            Combatant::Player(p) => BASE_CRIT_CHANCE + p.dexterity as f64 * CRIT_CHANCE_PER_DEX,
            Combatant::Enemy(_) => BASE_CRIT_CHANCE,
        }
    }
}

/// Result of one attack roll.
///
/// When `was_dodged` is set, `damage` is still populated but must not be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackRoll {
    pub damage: i32,
    pub is_critical: bool,
    pub was_dodged: bool,
}

impl AttackRoll {
    /// Damage that actually lands.
    pub fn landed_damage(&self) -> i32 {
        if self.was_dodged {
            0
        } else {
            self.damage
        }
    }
}

/// `max(1, offense * crit - defense * 0.6)`, rounded to the nearest integer.
pub fn mitigated_damage(offense: f64, defense: f64, critical: bool) -> i32 {
    let multiplier = if critical { CRIT_MULTIPLIER } else { 1.0 };
    let raw = (offense * multiplier - defense * DEFENSE_FACTOR).max(1.0);
    raw.round() as i32
}

/// Roll one attack.
///
/// Draw order: offense jitter, defense jitter, critical, then dodge.
pub fn compute_attack(
    attacker: Combatant<'_>,
    defender: Combatant<'_>,
    rng: &mut impl Rng,
) -> AttackRoll {
    let offense = attacker.offense(rng);
    let defense = defender.defense(rng);

    let is_critical = rng.gen::<f64>() < attacker.crit_chance();
    let damage = mitigated_damage(offense, defense, is_critical);

    // Player attacks are never dodged.
    let was_dodged = !attacker.is_player()
        && rng.gen::<f64>() < defender.agility() as f64 * DODGE_CHANCE_PER_AGILITY;

    AttackRoll {
        damage,
        is_critical,
        was_dodged,
    }
}
