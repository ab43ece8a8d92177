//! Game tuning knobs.

use crate::battle::BattleMode;
use crate::rewards::LevelingRules;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Configuration shared by the battle engine, cooldowns and settlement.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Cooldown armed after every battle, whatever the outcome.
    pub battle_cooldown: Duration,

    /// How long the player has to pick an action in manual mode.
    pub turn_timeout: Duration,

    pub manual_round_cap: u32,
    pub hybrid_round_cap: u32,
    pub quick_round_cap: u32,

    /// Chance per hybrid round to auto-cast a random affordable skill.
    pub hybrid_skill_chance: f64,

    /// Consecutive forfeited turns after which a manual battle is abandoned.
    pub idle_forfeit_limit: u32,

    /// Chance that arming a cooldown also sweeps expired entries.
    pub cooldown_sweep_chance: f64,

    /// Fixed seed for battle rolls; entropy when unset.
    pub rng_seed: Option<u64>,

    pub leveling: LevelingRules,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            battle_cooldown: Duration::from_secs(300),
            turn_timeout: Duration::from_secs(60),
            manual_round_cap: 15,
            hybrid_round_cap: 10,
            quick_round_cap: 30,
            hybrid_skill_chance: 0.4,
            idle_forfeit_limit: 3,
            cooldown_sweep_chance: 0.1,
            rng_seed: None,
            leveling: LevelingRules::default(),
        }
    }
}

impl GameConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by any `RPG_*` environment variables that parse.
    ///
    /// Recognised: `RPG_BATTLE_COOLDOWN_SECS`, `RPG_TURN_TIMEOUT_SECS`,
    /// `RPG_MANUAL_ROUND_CAP`, `RPG_HYBRID_ROUND_CAP`, `RPG_QUICK_ROUND_CAP`,
    /// `RPG_HYBRID_SKILL_CHANCE`, `RPG_IDLE_FORFEIT_LIMIT`, `RPG_RNG_SEED`,
    /// `RPG_STAT_POINTS_PER_LEVEL`, `RPG_HEAL_ON_LEVEL_UP`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secs) = env_parse::<u64>("RPG_BATTLE_COOLDOWN_SECS") {
            config.battle_cooldown = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("RPG_TURN_TIMEOUT_SECS") {
            config.turn_timeout = Duration::from_secs(secs);
        }
        if let Some(cap) = env_parse("RPG_MANUAL_ROUND_CAP") {
            config.manual_round_cap = cap;
        }
        if let Some(cap) = env_parse("RPG_HYBRID_ROUND_CAP") {
            config.hybrid_round_cap = cap;
        }
        if let Some(cap) = env_parse("RPG_QUICK_ROUND_CAP") {
            config.quick_round_cap = cap;
        }
        if let Some(chance) = env_parse::<f64>("RPG_HYBRID_SKILL_CHANCE") {
            config.hybrid_skill_chance = chance.clamp(0.0, 1.0);
        }
        if let Some(limit) = env_parse("RPG_IDLE_FORFEIT_LIMIT") {
            config.idle_forfeit_limit = limit;
        }
        config.rng_seed = env_parse("RPG_RNG_SEED");
        if let Some(points) = env_parse("RPG_STAT_POINTS_PER_LEVEL") {
            config.leveling.stat_points_per_level = points;
        }
        if let Some(heal) = env_parse("RPG_HEAL_ON_LEVEL_UP") {
            config.leveling.heal_on_level_up = heal;
        }

        config
    }

    pub fn with_battle_cooldown(mut self, cooldown: Duration) -> Self {
        self.battle_cooldown = cooldown;
        self
    }

    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = timeout;
        self
    }

    pub fn with_hybrid_skill_chance(mut self, chance: f64) -> Self {
        self.hybrid_skill_chance = chance.clamp(0.0, 1.0);
        self
    }

    pub fn with_idle_forfeit_limit(mut self, limit: u32) -> Self {
        self.idle_forfeit_limit = limit;
        self
    }

    pub fn with_cooldown_sweep_chance(mut self, chance: f64) -> Self {
        self.cooldown_sweep_chance = chance.clamp(0.0, 1.0);
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn with_leveling(mut self, leveling: LevelingRules) -> Self {
        self.leveling = leveling;
        self
    }

    /// Maximum rounds for a battle mode.
    pub fn round_cap(&self, mode: BattleMode) -> u32 {
        match mode {
            BattleMode::Manual => self.manual_round_cap,
            BattleMode::Quick => self.quick_round_cap,
            BattleMode::Hybrid => self.hybrid_round_cap,
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
