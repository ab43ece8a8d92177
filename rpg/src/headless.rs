//! Headless console front end.
//!
//! Stands in for the chat platform with a line-oriented protocol:
//! - Lines starting with `#` are commands (create, stats, battle, ...)
//! - During a manual battle each line is a button click: an action id such as
//!   `basic_attack`, `skill_101` or `flee`, optionally prefixed with
//!   `@<user> ` to click as someone else
//! - Output lines are tagged (`[LOG]`, `[TURN]`, `[ERROR]`, ...)

use async_trait::async_trait;
use rpg_core::battle::{chunk_log, ChannelError, LOG_CHUNK_CHARS};
use rpg_core::skills::{LearnOutcome, SkillId};
use rpg_core::store::StatUpgrade;
use rpg_core::{
    ActionId, Attribute, BattleChannel, BattleMode, CharacterClass, GameSession, Interaction,
    MemoryStore, Race, SessionError, TurnPrompt, UserId,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::warn;

pub type InputLines = Lines<BufReader<Stdin>>;

/// Options for the console.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    pub user_id: UserId,
    pub save_path: Option<PathBuf>,
}

/// The battle presentation sink over stdin/stdout.
///
/// Clicks without an `@user` prefix belong to `owner`.
pub struct ConsoleChannel<'a> {
    lines: &'a mut InputLines,
    owner: UserId,
    shown: usize,
    accepting: bool,
}

impl<'a> ConsoleChannel<'a> {
    pub fn new(lines: &'a mut InputLines, owner: UserId) -> Self {
        Self {
            lines,
            owner,
            shown: 0,
            accepting: true,
        }
    }

    fn print_new_lines(&mut self, log: &[String]) {
        let start = self.shown.min(log.len());
        for line in &log[start..] {
            println!("[LOG] {line}");
        }
        self.shown = log.len();
    }
}

#[async_trait]
impl BattleChannel for ConsoleChannel<'_> {
    async fn present(&mut self, log: &[String], prompt: &TurnPrompt) -> Result<(), ChannelError> {
        self.print_new_lines(log);
        println!(
            "[TURN] Round {}/{} | HP {}/{} | MP {}/{} | {} {}/{}",
            prompt.round,
            prompt.round_cap,
            prompt.player_hp,
            prompt.player_max_hp,
            prompt.player_mana,
            prompt.player_max_mana,
            prompt.enemy_name,
            prompt.enemy_hp.max(0),
            prompt.enemy_max_hp
        );
        let actions: Vec<String> = prompt
            .actions
            .iter()
            .map(|a| {
                if a.enabled {
                    format!("{} ({})", a.id, a.label)
                } else {
                    format!("{} ({}, disabled)", a.id, a.label)
                }
            })
            .collect();
        println!("[ACTIONS] {}", actions.join(" | "));
        Ok(())
    }

    async fn next_interaction(&mut self) -> Option<Interaction> {
        if !self.accepting {
            return None;
        }
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(e) => {
                    warn!(error = %e, "failed to read input");
                    return None;
                }
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (user, action) = match line.strip_prefix('@') {
                Some(rest) => match rest.split_once(' ') {
                    Some((user, action)) => (Some(user), action),
                    None => (None, rest),
                },
                None => (None, line),
            };

            match action.parse::<ActionId>() {
                Ok(action) => {
                    return Some(Interaction {
                        user_id: user.map_or_else(|| self.owner.clone(), UserId::from),
                        action,
                    })
                }
                Err(e) => println!("[ERROR] {e}"),
            }
        }
    }

    async fn reject(
        &mut self,
        interaction: &Interaction,
        notice: &str,
    ) -> Result<(), ChannelError> {
        println!("[REJECTED] {}: {notice}", interaction.user_id);
        Ok(())
    }

    async fn stop_input(&mut self) -> Result<(), ChannelError> {
        self.accepting = false;
        Ok(())
    }

    async fn finish(&mut self, log: &[String]) -> Result<(), ChannelError> {
        let start = self.shown.min(log.len());
        for message in chunk_log(&log[start..], LOG_CHUNK_CHARS) {
            for line in message.lines() {
                println!("[LOG] {line}");
            }
            println!("[MESSAGE END]");
        }
        self.shown = log.len();
        Ok(())
    }
}

/// Run the console until `#quit` or end of input.
pub async fn run_headless(
    session: GameSession,
    store: Arc<MemoryStore>,
    config: HeadlessConfig,
) -> Result<(), SessionError> {
    let mut user = config.user_id.clone();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("=== RPG Headless Mode ===");
    println!("Acting as user {user}");
    print_help();
    println!();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some(command) = line.strip_prefix('#') else {
            println!("[ERROR] Commands start with '#'. Type #help for help.");
            continue;
        };
        let parts: Vec<&str> = command.split_whitespace().collect();

        match parts.first().copied() {
            Some("quit") | Some("exit") => {
                println!("Goodbye!");
                break;
            }
            Some("help") => print_help(),
            Some("as") => match parts.get(1) {
                Some(id) => {
                    user = UserId::from(*id);
                    println!("[OK] Acting as user {user}");
                }
                None => println!("[ERROR] Usage: #as <user>"),
            },
            Some("create") => create(&session, &user, &parts[1..]).await,
            Some("stats") => match session.character(&user).await {
                Ok(c) => {
                    println!(
                        "[STATS] {} the {} {} (level {})",
                        c.name,
                        c.race.name(),
                        c.class,
                        c.level
                    );
                    let next = session.config().leveling.xp_to_next_level(c.level);
                    println!("  XP: {}/{}", c.xp, next);
                    println!("  HP: {}/{}  MP: {}/{}", c.health, c.max_health, c.mana, c.max_mana);
                    println!("  Gold: {}  Stat points: {}", c.gold, c.stat_points);
                    let attributes: Vec<String> = Attribute::all()
                        .iter()
                        .map(|a| format!("{} {}", a.name(), c.attributes.get(*a)))
                        .collect();
                    println!("  {}", attributes.join(", "));
                }
                Err(e) => report(&e),
            },
            Some("battle") => {
                let mode = match parts.get(1).map(|m| m.parse::<BattleMode>()) {
                    None => BattleMode::Manual,
                    Some(Ok(mode)) => mode,
                    Some(Err(e)) => {
                        println!("[ERROR] {e}");
                        continue;
                    }
                };
                let mut channel = ConsoleChannel::new(&mut lines, user.clone());
                match session.start_battle(&user, mode, &mut channel).await {
                    Ok(report) => println!(
                        "[BATTLE] {} vs {}: {}",
                        mode, report.outcome.enemy.name, report.outcome.result
                    ),
                    Err(e) => report(&e),
                }
            }
            Some("skills") => match session.class_skills(&user).await {
                Ok(skills) => {
                    println!("[SKILLS]");
                    for s in skills {
                        let kind = if s.is_passive { "passive" } else { "active" };
                        println!(
                            "  {} {} (level {}, {} MP, {}): {}",
                            s.id, s.name, s.level_required, s.mana_cost, kind, s.description
                        );
                    }
                }
                Err(e) => report(&e),
            },
            Some("myskills") => match session.learned_skills(&user).await {
                Ok(learned) if learned.is_empty() => println!("[SKILLS] None learned yet"),
                Ok(learned) => {
                    println!("[SKILLS]");
                    for l in learned {
                        println!(
                            "  {} {} (skill level {})",
                            l.skill.id, l.skill.name, l.skill_level
                        );
                    }
                }
                Err(e) => report(&e),
            },
            Some("learn") => match parts.get(1).and_then(|id| id.parse::<u32>().ok()) {
                Some(id) => match session.learn_skill(&user, SkillId(id)).await {
                    Ok(outcome) => {
                        let tag = if matches!(outcome, LearnOutcome::Learned(_)) {
                            "OK"
                        } else {
                            "DENIED"
                        };
                        println!("[{tag}] {}", outcome.message());
                    }
                    Err(e) => report(&e),
                },
                None => println!("[ERROR] Usage: #learn <skill id>"),
            },
            Some("upgrade") => upgrade(&session, &user, &parts[1..]).await,
            Some("rest") => match session.rest(&user).await {
                Ok(c) => println!(
                    "[OK] Rested. HP {}/{}  MP {}/{}",
                    c.health, c.max_health, c.mana, c.max_mana
                ),
                Err(e) => report(&e),
            },
            Some("cooldown") => {
                let remaining = session.remaining_cooldown(&user).await;
                if remaining == 0 {
                    println!("[COOLDOWN] Ready to battle");
                } else {
                    println!("[COOLDOWN] {remaining}s remaining");
                }
            }
            Some("save") => {
                let path = parts.get(1).map(PathBuf::from).or_else(|| config.save_path.clone());
                match path {
                    Some(path) => match store.save_json(&path).await {
                        Ok(()) => println!("[SAVED] Game saved to {}", path.display()),
                        Err(e) => println!("[ERROR] Save failed: {e}"),
                    },
                    None => println!("[ERROR] Usage: #save <path>"),
                }
            }
            _ => println!("[ERROR] Unknown command. Type #help for help."),
        }
    }

    if let Some(path) = &config.save_path {
        if let Err(e) = store.save_json(path).await {
            eprintln!("Failed to save to {}: {e}", path.display());
        }
    }
    Ok(())
}

async fn create(session: &GameSession, user: &UserId, args: &[&str]) {
    let [name, class, race] = args else {
        println!("[ERROR] Usage: #create <name> <class> <race>");
        return;
    };
    let class = match class.parse::<CharacterClass>() {
        Ok(c) => c,
        Err(e) => return println!("[ERROR] {e}"),
    };
    let race = match race.parse::<Race>() {
        Ok(r) => r,
        Err(e) => return println!("[ERROR] {e}"),
    };

    match session.create_character(user, name, class, race).await {
        Ok(c) => println!(
            "[CREATED] {} the {} {} | HP {} | MP {}",
            c.name,
            c.race.name(),
            c.class,
            c.max_health,
            c.max_mana
        ),
        Err(e) => report(&e),
    }
}

async fn upgrade(session: &GameSession, user: &UserId, args: &[&str]) {
    let (attribute, amount) = match args {
        [attribute] => (attribute, Ok(1)),
        [attribute, amount] => (attribute, amount.parse::<u32>()),
        _ => return println!("[ERROR] Usage: #upgrade <attribute> [points]"),
    };
    let attribute = match attribute.parse::<Attribute>() {
        Ok(a) => a,
        Err(e) => return println!("[ERROR] {e}"),
    };
    let Ok(amount) = amount else {
        return println!("[ERROR] Points must be a positive number");
    };

    match session.upgrade_stat(user, attribute, amount).await {
        Ok(StatUpgrade::Applied {
            attribute,
            old_value,
            new_value,
            remaining_points,
        }) => println!(
            "[OK] {} {} -> {} ({} points left)",
            attribute.name(),
            old_value,
            new_value,
            remaining_points
        ),
        Ok(StatUpgrade::NotEnoughPoints {
            available,
            requested,
        }) => println!("[DENIED] Need {requested} stat points, you have {available}"),
        Err(e) => report(&e),
    }
}

fn report(error: &SessionError) {
    if matches!(error, SessionError::Store(_) | SessionError::Battle(_)) {
        warn!(error = %error, "command failed");
    }
    println!("[ERROR] {}", error.user_message());
}

fn print_help() {
    println!("Commands:");
    println!("  #create <name> <class> <race>  - Create a character");
    println!("                                   (warrior, mage, rogue, ranged; human, elf)");
    println!("  #stats                         - Show your character");
    println!("  #battle [manual|quick|hybrid]  - Fight an enemy near your level");
    println!("  #skills                        - Skills your class can learn");
    println!("  #myskills                      - Skills you have learned");
    println!("  #learn <skill id>              - Learn a skill");
    println!("  #upgrade <attribute> [points]  - Spend stat points");
    println!("  #rest                          - Restore HP and MP");
    println!("  #cooldown                      - Time until your next battle");
    println!("  #as <user>                     - Act as another user");
    println!("  #save [path]                   - Save the game");
    println!("  #quit                          - Exit");
    println!("During a manual battle, type an action id (basic_attack, skill_<id>, flee),");
    println!("or '@<user> <action>' to click as someone else.");
}
