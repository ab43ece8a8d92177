//! Battle engine for a chat-platform text RPG.
//!
//! This crate provides:
//! - An enemy catalog with level-banded weighted selection
//! - Combat math for player and enemy attacks
//! - Skill learning and in-battle skill use
//! - A turn-based battle state machine (manual, quick and hybrid modes)
//! - Per-user battle cooldowns
//! - Reward settlement and leveling
//!
//! # Quick Start
//!
//! ```ignore
//! use rpg_core::{BattleMode, CharacterClass, GameConfig, GameSession, MemoryStore, Race, UserId};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = GameSession::new(Arc::new(MemoryStore::new()), GameConfig::from_env());
//!     let user = UserId::from("1234");
//!     session
//!         .create_character(&user, "Brom", CharacterClass::Warrior, Race::Human)
//!         .await?;
//!
//!     let mut channel = /* a BattleChannel for the chat platform */;
//!     let report = session.start_battle(&user, BattleMode::Quick, &mut channel).await?;
//!     println!("{}", report.outcome.result);
//!     Ok(())
//! }
//! ```

pub mod battle;
pub mod character;
pub mod combat;
pub mod config;
pub mod cooldown;
pub mod enemies;
pub mod rewards;
pub mod session;
pub mod skills;
pub mod store;
pub mod testing;

// Primary public API
pub use battle::{
    ActionId, BattleChannel, BattleError, BattleMode, BattleOutcome, BattleResult, Interaction,
    TurnPrompt,
};
pub use character::{Attribute, CharacterClass, CharacterId, CharacterRecord, Race, UserId};
pub use config::GameConfig;
pub use cooldown::{Clock, CooldownTracker, InMemoryCooldowns, SystemClock};
pub use enemies::{EnemyArchetype, EnemyCatalog, LevelBand};
pub use rewards::{LevelingRules, Progression};
pub use session::{BattleReport, GameSession, SessionError};
pub use skills::{LearnOutcome, Skill, SkillId};
pub use store::{CharacterStore, MemoryStore, StoreError};
pub use testing::{FlakyStore, ManualClock, ScriptedChannel};
