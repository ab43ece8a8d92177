//! Enemy archetypes and level-banded random selection.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Errors from building an enemy catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Enemy catalog must contain at least one archetype")]
    Empty,
}

/// An immutable enemy template. Battles reference it and track their own HP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyArchetype {
    pub id: u32,
    pub name: String,
    pub level: u32,
    pub health: i32,
    pub attack: i32,
    pub defense: i32,
    pub xp: u32,
    pub gold: u32,
    /// Flavor for the enemy's attacks, e.g. "swings a rusty dagger".
    pub attack_phrases: Vec<String>,
    pub death_phrase: String,
}

impl EnemyArchetype {
    #[allow(clippy::too_many_arguments)]
    fn new(
        id: u32,
        name: &str,
        level: u32,
        health: i32,
        attack: i32,
        defense: i32,
        xp: u32,
        gold: u32,
        attack_phrases: &[&str],
        death_phrase: &str,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            level,
            health,
            attack,
            defense,
            xp,
            gold,
            attack_phrases: attack_phrases.iter().map(|p| p.to_string()).collect(),
            death_phrase: death_phrase.to_string(),
        }
    }

    /// Copies placed in the selection pool: `max(1, 5 - level)`.
    pub fn selection_weight(&self) -> usize {
        5usize.saturating_sub(self.level as usize).max(1)
    }

    /// Pick one attack phrase uniformly.
    pub fn attack_phrase(&self, rng: &mut impl Rng) -> &str {
        if self.attack_phrases.is_empty() {
            return "attacks";
        }
        &self.attack_phrases[rng.gen_range(0..self.attack_phrases.len())]
    }
}

/// Inclusive enemy level range for one encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelBand {
    pub min: u32,
    pub max: u32,
}

impl LevelBand {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// The band a character of `level` fights in: `[max(1, level-2), level+2]`.
    pub fn around(level: u32) -> Self {
        Self {
            min: level.saturating_sub(2).max(1),
            max: level + 2,
        }
    }

    pub fn contains(&self, level: u32) -> bool {
        level >= self.min && level <= self.max
    }
}

/// The static enemy table.
#[derive(Debug, Clone)]
pub struct EnemyCatalog {
    archetypes: Vec<Arc<EnemyArchetype>>,
}

impl EnemyCatalog {
    pub fn new(archetypes: Vec<EnemyArchetype>) -> Result<Self, CatalogError> {
        if archetypes.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(Self {
            archetypes: archetypes.into_iter().map(Arc::new).collect(),
        })
    }

    /// The shipped bestiary.
    pub fn standard() -> Self {
        Self {
            archetypes: standard_archetypes().into_iter().map(Arc::new).collect(),
        }
    }

    pub fn archetypes(&self) -> &[Arc<EnemyArchetype>] {
        &self.archetypes
    }

    pub fn get(&self, id: u32) -> Option<Arc<EnemyArchetype>> {
        self.archetypes.iter().find(|a| a.id == id).cloned()
    }

    /// Choose an opponent whose level lies in `band`.
    ///
    /// Each qualifying archetype is weighted by [`EnemyArchetype::selection_weight`],
    /// so low-level enemies show up more often. With nothing qualifying the
    /// first catalog entry is returned.
    pub fn select(&self, band: LevelBand, rng: &mut impl Rng) -> Arc<EnemyArchetype> {
        let pool: Vec<&Arc<EnemyArchetype>> = self
            .archetypes
            .iter()
            .filter(|a| band.contains(a.level))
            .flat_map(|a| std::iter::repeat(a).take(a.selection_weight()))
            .collect();

        if pool.is_empty() {
            return Arc::clone(&self.archetypes[0]);
        }

        Arc::clone(pool[rng.gen_range(0..pool.len())])
    }
}

impl Default for EnemyCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

fn standard_archetypes() -> Vec<EnemyArchetype> {
    vec![
        EnemyArchetype::new(
            1,
            "Goblin",
            1,
            30,
            5,
            2,
            15,
            10,
            &["swings a rusty dagger", "throws a rock", "scratches at you"],
            "collapses in a heap of green limbs",
        ),
        EnemyArchetype::new(
            2,
            "Orc",
            3,
            60,
            8,
            4,
            30,
            20,
            &["swings a crude axe", "charges with a roar", "punches wildly"],
            "lets out a final bellow before falling",
        ),
        EnemyArchetype::new(
            3,
            "Troll",
            5,
            100,
            12,
            6,
            50,
            35,
            &["swings a massive club", "regenerates some health", "stomps the ground"],
            "slowly crumbles into dust",
        ),
        EnemyArchetype::new(
            4,
            "Dragon",
            10,
            200,
            20,
            10,
            100,
            100,
            &["breathes a cone of fire", "swipes with razor claws", "tail whips you"],
            "lets out a final roar before collapsing",
        ),
    ]
}
