//! Persistent character records.
//!
//! A character is owned by exactly one chat user and is the single source of
//! truth for health, mana, experience, level, gold and unspent stat points.
//! Battles work on a transient copy and write back only the net effect.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Chat-platform user identifier (a Discord snowflake, kept opaque).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Store-assigned character identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CharacterId(pub u64);

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors from parsing user-supplied names of classes, races and attributes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown class: {0}")]
    UnknownClass(String),
    #[error("unknown race: {0}")]
    UnknownRace(String),
    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),
}

/// The nine character attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Attribute {
    Strength,
    Agility,
    Intelligence,
    Vitality,
    Durability,
    Charisma,
    Dexterity,
    Constitution,
    Wisdom,
}

impl Attribute {
    pub fn name(&self) -> &'static str {
        match self {
            Attribute::Strength => "Strength",
            Attribute::Agility => "Agility",
            Attribute::Intelligence => "Intelligence",
            Attribute::Vitality => "Vitality",
            Attribute::Durability => "Durability",
            Attribute::Charisma => "Charisma",
            Attribute::Dexterity => "Dexterity",
            Attribute::Constitution => "Constitution",
            Attribute::Wisdom => "Wisdom",
        }
    }

    pub fn all() -> [Attribute; 9] {
        [
            Attribute::Strength,
            Attribute::Agility,
            Attribute::Intelligence,
            Attribute::Vitality,
            Attribute::Durability,
            Attribute::Charisma,
            Attribute::Dexterity,
            Attribute::Constitution,
            Attribute::Wisdom,
        ]
    }

    /// Health gained per point spent on this attribute.
    pub fn health_per_point(&self) -> i32 {
        match self {
            Attribute::Vitality => 5,
            Attribute::Constitution => 2,
            _ => 0,
        }
    }

    /// Mana gained per point spent on this attribute.
    pub fn mana_per_point(&self) -> i32 {
        match self {
            Attribute::Intelligence => 3,
            Attribute::Wisdom => 2,
            _ => 0,
        }
    }
}

impl FromStr for Attribute {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Attribute::all()
            .into_iter()
            .find(|a| a.name().to_lowercase() == lowered)
            .ok_or_else(|| ParseError::UnknownAttribute(s.to_string()))
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Attribute block shared by class bases, race modifiers and characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Attributes {
    pub strength: i32,
    pub agility: i32,
    pub intelligence: i32,
    pub vitality: i32,
    pub durability: i32,
    pub charisma: i32,
    pub dexterity: i32,
    pub constitution: i32,
    pub wisdom: i32,
}

impl Attributes {
    pub fn get(&self, attribute: Attribute) -> i32 {
        match attribute {
            Attribute::Strength => self.strength,
            Attribute::Agility => self.agility,
            Attribute::Intelligence => self.intelligence,
            Attribute::Vitality => self.vitality,
            Attribute::Durability => self.durability,
            Attribute::Charisma => self.charisma,
            Attribute::Dexterity => self.dexterity,
            Attribute::Constitution => self.constitution,
            Attribute::Wisdom => self.wisdom,
        }
    }

    pub fn set(&mut self, attribute: Attribute, value: i32) {
        match attribute {
            Attribute::Strength => self.strength = value,
            Attribute::Agility => self.agility = value,
            Attribute::Intelligence => self.intelligence = value,
            Attribute::Vitality => self.vitality = value,
            Attribute::Durability => self.durability = value,
            Attribute::Charisma => self.charisma = value,
            Attribute::Dexterity => self.dexterity = value,
            Attribute::Constitution => self.constitution = value,
            Attribute::Wisdom => self.wisdom = value,
        }
    }

    /// Component-wise sum, used to apply race modifiers to a class base.
    pub fn plus(&self, other: &Attributes) -> Attributes {
        let mut sum = *self;
        for attribute in Attribute::all() {
            sum.set(attribute, self.get(attribute) + other.get(attribute));
        }
        sum
    }

    pub fn max_health(&self) -> i32 {
        100 + self.vitality * 5 + self.constitution * 2
    }

    pub fn max_mana(&self) -> i32 {
        50 + self.intelligence * 3 + self.wisdom * 2
    }
}

/// Playable classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharacterClass {
    Warrior,
    Mage,
    Rogue,
    Ranged,
}

impl CharacterClass {
    pub fn id(&self) -> &'static str {
        match self {
            CharacterClass::Warrior => "warrior",
            CharacterClass::Mage => "mage",
            CharacterClass::Rogue => "rogue",
            CharacterClass::Ranged => "ranged",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CharacterClass::Warrior => "Warrior",
            CharacterClass::Mage => "Mage",
            CharacterClass::Rogue => "Rogue",
            CharacterClass::Ranged => "Ranger",
        }
    }

    pub fn all() -> [CharacterClass; 4] {
        [
            CharacterClass::Warrior,
            CharacterClass::Mage,
            CharacterClass::Rogue,
            CharacterClass::Ranged,
        ]
    }

    /// Starting attributes before race modifiers.
    pub fn base_attributes(&self) -> Attributes {
        match self {
            CharacterClass::Warrior => Attributes {
                strength: 8,
                agility: 3,
                intelligence: 2,
                vitality: 7,
                durability: 6,
                charisma: 2,
                dexterity: 3,
                constitution: 6,
                wisdom: 2,
            },
            CharacterClass::Mage => Attributes {
                strength: 1,
                agility: 3,
                intelligence: 8,
                vitality: 3,
                durability: 2,
                charisma: 4,
                dexterity: 3,
                constitution: 2,
                wisdom: 7,
            },
            CharacterClass::Rogue => Attributes {
                strength: 4,
                agility: 7,
                intelligence: 3,
                vitality: 4,
                durability: 3,
                charisma: 4,
                dexterity: 8,
                constitution: 3,
                wisdom: 2,
            },
            CharacterClass::Ranged => Attributes {
                strength: 4,
                agility: 6,
                intelligence: 3,
                vitality: 4,
                durability: 3,
                charisma: 3,
                dexterity: 8,
                constitution: 3,
                wisdom: 4,
            },
        }
    }
}

impl FromStr for CharacterClass {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "warrior" => Ok(CharacterClass::Warrior),
            "mage" => Ok(CharacterClass::Mage),
            "rogue" => Ok(CharacterClass::Rogue),
            "ranged" | "ranger" => Ok(CharacterClass::Ranged),
            _ => Err(ParseError::UnknownClass(s.to_string())),
        }
    }
}

impl fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Playable races.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Race {
    Human,
    Elf,
}

impl Race {
    pub fn name(&self) -> &'static str {
        match self {
            Race::Human => "Human",
            Race::Elf => "Elf",
        }
    }

    pub fn modifiers(&self) -> Attributes {
        match self {
            Race::Human => Attributes {
                strength: 1,
                agility: 1,
                intelligence: 1,
                vitality: 1,
                durability: 1,
                charisma: 1,
                dexterity: 1,
                constitution: 1,
                wisdom: 1,
            },
            Race::Elf => Attributes {
                strength: -1,
                agility: 3,
                intelligence: 2,
                vitality: 1,
                durability: 0,
                charisma: 2,
                dexterity: 2,
                constitution: 0,
                wisdom: 3,
            },
        }
    }
}

impl FromStr for Race {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "human" => Ok(Race::Human),
            "elf" => Ok(Race::Elf),
            _ => Err(ParseError::UnknownRace(s.to_string())),
        }
    }
}

impl fmt::Display for Race {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Input to character creation.
#[derive(Debug, Clone)]
pub struct NewCharacter {
    pub user_id: UserId,
    pub name: String,
    pub class: CharacterClass,
    pub race: Race,
}

impl NewCharacter {
    pub fn new(
        user_id: UserId,
        name: impl Into<String>,
        class: CharacterClass,
        race: Race,
    ) -> Self {
        Self {
            user_id,
            name: name.into(),
            class,
            race,
        }
    }
}

/// The durable character record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterRecord {
    pub id: CharacterId,
    pub user_id: UserId,
    pub name: String,
    pub class: CharacterClass,
    pub race: Race,
    pub level: u32,
    pub xp: u32,
    pub gold: u32,
    pub stat_points: u32,
    pub attributes: Attributes,
    pub health: i32,
    pub max_health: i32,
    pub mana: i32,
    pub max_mana: i32,
}

impl CharacterRecord {
    /// Build a fresh level 1 character at full health and mana.
    pub fn create(id: CharacterId, new: NewCharacter) -> Self {
        let attributes = new.class.base_attributes().plus(&new.race.modifiers());
        let max_health = attributes.max_health();
        let max_mana = attributes.max_mana();

        Self {
            id,
            user_id: new.user_id,
            name: new.name,
            class: new.class,
            race: new.race,
            level: 1,
            xp: 0,
            gold: 0,
            stat_points: 0,
            attributes,
            health: max_health,
            max_health,
            mana: max_mana,
            max_mana,
        }
    }

    pub fn is_conscious(&self) -> bool {
        self.health > 0
    }
}

/// Create a human warrior for tests and demos.
pub fn create_sample_warrior(id: u64, user_id: &str) -> CharacterRecord {
    CharacterRecord::create(
        CharacterId(id),
        NewCharacter::new(
            UserId::from(user_id),
            "Test Warrior",
            CharacterClass::Warrior,
            Race::Human,
        ),
    )
}
