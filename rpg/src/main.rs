//! RPG battle bot console.
//!
//! Plays the chat platform's part on stdin/stdout so the battle engine can be
//! driven by hand or by scripts:
//!
//! ```bash
//! cargo run -p rpg -- --user 1234 --save rpg.json
//! ```

mod headless;

use headless::HeadlessConfig;
use rpg_core::{GameConfig, GameSession, MemoryStore, UserId};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries the console protocol.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let config = parse_config_from_args(&args);
    let store = match &config.save_path {
        Some(path) if path.exists() => {
            let store = MemoryStore::load_json(path).await?;
            info!(path = %path.display(), "loaded saved game");
            store
        }
        _ => MemoryStore::new(),
    };
    let store = Arc::new(store);

    let session = GameSession::new(store.clone(), GameConfig::from_env());
    headless::run_headless(session, store, config).await?;
    Ok(())
}

/// Parse console options from command line arguments.
fn parse_config_from_args(args: &[String]) -> HeadlessConfig {
    let mut config = HeadlessConfig {
        user_id: UserId::from("local-player"),
        save_path: None,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--user" => {
                if let Some(user) = args.get(i + 1) {
                    config.user_id = UserId::new(user.clone());
                    i += 1;
                }
            }
            "--save" => {
                if let Some(path) = args.get(i + 1) {
                    config.save_path = Some(PathBuf::from(path));
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }

    config
}

fn print_help() {
    println!("RPG battle bot console");
    println!();
    println!("USAGE:");
    println!("  rpg [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -h, --help       Show this help message");
    println!("  --user <ID>      Acting user id (default: local-player)");
    println!("  --save <PATH>    Load from and save to this JSON file");
    println!();
    println!("ENVIRONMENT:");
    println!("  RUST_LOG                    Log filter (default: info)");
    println!("  RPG_BATTLE_COOLDOWN_SECS    Cooldown after each battle (default: 300)");
    println!("  RPG_TURN_TIMEOUT_SECS       Time to pick an action (default: 60)");
    println!("  RPG_RNG_SEED                Fixed seed for reproducible battles");
}
