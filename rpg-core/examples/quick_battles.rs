//! Run a few simulated battles and print the logs.
//!
//! ```bash
//! cargo run -p rpg-core --example quick_battles
//! ```

use rpg_core::{
    BattleMode, CharacterClass, GameConfig, GameSession, MemoryStore, Race, ScriptedChannel,
    UserId,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Quick Battles ===\n");

    let config = GameConfig::new()
        .with_battle_cooldown(Duration::ZERO)
        .with_rng_seed(2024);
    let session = GameSession::new(Arc::new(MemoryStore::new()), config);

    let user = UserId::from("demo");
    let character = session
        .create_character(&user, "Thorin", CharacterClass::Warrior, Race::Human)
        .await?;
    println!(
        "Created {} (HP {}/{}, MP {}/{})\n",
        character.name, character.health, character.max_health, character.mana, character.max_mana
    );

    for (i, mode) in [BattleMode::Quick, BattleMode::Hybrid, BattleMode::Quick]
        .into_iter()
        .enumerate()
    {
        let mut channel = ScriptedChannel::new(user.as_str());
        let report = session.start_battle(&user, mode, &mut channel).await?;

        println!("--- Battle {} ({mode}) vs {} ---", i + 1, report.outcome.enemy.name);
        for message in GameSession::log_messages(&report.outcome) {
            println!("{message}");
        }
        println!();

        session.rest(&user).await?;
    }

    let character = session.character(&user).await?;
    println!(
        "Final: level {}, {} XP, {} gold",
        character.level, character.xp, character.gold
    );
    Ok(())
}
