//! QA tests for full battles driven through the session facade.
//!
//! Enemies here are training dummies with known stats so outcomes do not
//! depend on the random stream. The sample warrior has agility 0, so enemy
//! attacks are never dodged.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rpg_core::battle::BattleRunner;
use rpg_core::character::create_sample_warrior;
use rpg_core::cooldown::{CooldownStore, CooldownTracker, InMemoryCooldowns, SystemClock};
use rpg_core::skills::{SkillId, REGENERATION};
use rpg_core::store::MemoryStore;
use rpg_core::testing::{FlakyStore, ManualClock, ScriptedChannel};
use rpg_core::{
    ActionId, BattleError, BattleMode, BattleResult, CharacterClass, CharacterStore,
    EnemyArchetype, EnemyCatalog, GameConfig, GameSession, SessionError, StoreError, UserId,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const USER: &str = "u1";

fn dummy(health: i32, attack: i32, xp: u32, gold: u32) -> EnemyArchetype {
    EnemyArchetype {
        id: 1,
        name: "Training Dummy".to_string(),
        level: 1,
        health,
        attack,
        defense: 0,
        xp,
        gold,
        attack_phrases: vec!["wobbles menacingly".to_string()],
        death_phrase: "falls apart".to_string(),
    }
}

async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let mut warrior = create_sample_warrior(1, USER);
    warrior.attributes.agility = 0;
    store.put_character(warrior).await;
    store
}

fn session(
    store: Arc<dyn CharacterStore>,
    enemy: EnemyArchetype,
    config: GameConfig,
) -> GameSession {
    GameSession::new(store, config.with_rng_seed(7))
        .with_catalog(EnemyCatalog::new(vec![enemy]).unwrap())
}

fn user() -> UserId {
    UserId::from(USER)
}

// =============================================================================
// Terminal states
// =============================================================================

#[tokio::test]
async fn test_killing_blow_wins_without_counterattack() {
    let store = seeded_store().await;
    let game = session(store.clone(), dummy(1, 50, 15, 10), GameConfig::default());
    let mut channel = ScriptedChannel::new(USER).click(ActionId::BasicAttack);

    let report = game
        .start_battle(&user(), BattleMode::Manual, &mut channel)
        .await
        .unwrap();

    let outcome = &report.outcome;
    assert_eq!(outcome.result, BattleResult::Victory);
    assert!(outcome.victory);
    assert_eq!(outcome.rounds_fought, 1);
    assert_eq!(outcome.final_enemy_hp, 0);
    assert_eq!(outcome.final_player_hp, 154, "enemy must not strike back");
    assert_eq!((outcome.xp_earned, outcome.gold_earned), (15, 10));

    let character = store.character(&user()).await.unwrap().unwrap();
    assert_eq!(character.xp, 15);
    assert_eq!(character.gold, 10);
    assert_eq!(character.health, 154);

    let log = channel.final_log.expect("log flushed");
    assert!(log.iter().any(|l| l.contains("falls apart")));
    assert!(log.iter().any(|l| l.starts_with("Result: Victory")));
}

#[tokio::test]
async fn test_flee_ends_battle_without_rewards() {
    let store = seeded_store().await;
    let game = session(store.clone(), dummy(500, 1, 15, 10), GameConfig::default());
    let mut channel = ScriptedChannel::new(USER)
        .click(ActionId::BasicAttack)
        .click(ActionId::Flee);

    let report = game
        .start_battle(&user(), BattleMode::Manual, &mut channel)
        .await
        .unwrap();

    assert_eq!(report.outcome.result, BattleResult::Fled);
    assert_eq!(report.outcome.xp_earned, 0);
    assert_eq!(report.outcome.gold_earned, 0);
    assert_eq!(report.outcome.rounds_fought, 2);
    // Cooldown is armed whatever the outcome.
    assert!(game.is_on_cooldown(&user()).await);
}

#[tokio::test]
async fn test_defeat_grants_consolation_xp_and_leaves_one_hp() {
    let store = seeded_store().await;
    let game = session(store.clone(), dummy(10_000, 1_000, 40, 25), GameConfig::default());
    let mut channel = ScriptedChannel::new(USER).click(ActionId::BasicAttack);

    let report = game
        .start_battle(&user(), BattleMode::Manual, &mut channel)
        .await
        .unwrap();

    assert_eq!(report.outcome.result, BattleResult::Defeat);
    assert!(!report.outcome.victory);
    assert_eq!(report.outcome.xp_earned, 12);
    assert_eq!(report.outcome.gold_earned, 0);
    assert_eq!(report.outcome.final_player_hp, 0);

    let character = store.character(&user()).await.unwrap().unwrap();
    assert_eq!(character.health, 1);
    assert_eq!(character.xp, 12);
}

#[tokio::test]
async fn test_round_cap_ends_in_draw_with_half_xp() {
    let store = seeded_store().await;
    let game = session(store.clone(), dummy(10_000, 1, 40, 25), GameConfig::default());
    let mut channel = ScriptedChannel::new(USER).repeat(ActionId::BasicAttack, 20);

    let report = game
        .start_battle(&user(), BattleMode::Manual, &mut channel)
        .await
        .unwrap();

    assert_eq!(report.outcome.result, BattleResult::RoundCapReached);
    assert_eq!(report.outcome.rounds_fought, 15);
    assert_eq!(channel.prompts.len(), 15);
    assert_eq!(channel.remaining_steps(), 5);
    assert_eq!(report.outcome.xp_earned, 20);
    assert_eq!(report.outcome.gold_earned, 0);

    // One point of damage per enemy turn.
    let character = store.character(&user()).await.unwrap().unwrap();
    assert_eq!(character.health, 154 - 15);
}

#[tokio::test]
async fn test_victory_that_levels_up_heals() {
    let store = seeded_store().await;
    let mut hurt = store.character(&user()).await.unwrap().unwrap();
    hurt.health = 50;
    store.put_character(hurt).await;

    let game = session(store.clone(), dummy(1, 1, 150, 0), GameConfig::default());
    let mut channel = ScriptedChannel::new(USER).click(ActionId::BasicAttack);
    let report = game
        .start_battle(&user(), BattleMode::Manual, &mut channel)
        .await
        .unwrap();

    assert!(report.progression.leveled_up);
    assert_eq!(report.progression.new_level, 2);

    let character = store.character(&user()).await.unwrap().unwrap();
    assert_eq!(character.level, 2);
    assert_eq!(character.stat_points, 5);
    assert_eq!(character.health, character.max_health);
    let log = channel.final_log.unwrap();
    assert!(log.iter().any(|l| l.starts_with("LEVEL UP!")));
}

// =============================================================================
// Input collection
// =============================================================================

#[tokio::test]
async fn test_clicks_from_other_users_are_rejected() {
    let store = seeded_store().await;
    let game = session(store, dummy(500, 1, 15, 10), GameConfig::default());
    let mut channel = ScriptedChannel::new(USER)
        .click_as("intruder", ActionId::BasicAttack)
        .click(ActionId::Flee);

    let report = game
        .start_battle(&user(), BattleMode::Manual, &mut channel)
        .await
        .unwrap();

    assert_eq!(report.outcome.result, BattleResult::Fled);
    assert_eq!(report.outcome.rounds_fought, 1);
    assert_eq!(channel.rejections.len(), 1);
    assert_eq!(channel.rejections[0].0.user_id, UserId::from("intruder"));
    assert_eq!(channel.rejections[0].1, "This is not your battle!");
}

#[tokio::test(start_paused = true)]
async fn test_timeouts_forfeit_turns_until_idle_limit() {
    let store = seeded_store().await;
    let game = session(store.clone(), dummy(500, 1, 15, 10), GameConfig::default());
    let mut channel = ScriptedChannel::new(USER).silence().silence().silence();

    let started = tokio::time::Instant::now();
    let report = game
        .start_battle(&user(), BattleMode::Manual, &mut channel)
        .await
        .unwrap();

    assert_eq!(report.outcome.result, BattleResult::TimedOut);
    assert_eq!(report.outcome.rounds_fought, 3);
    assert_eq!(report.outcome.xp_earned, 0);
    assert_eq!(report.outcome.final_enemy_hp, 500);
    // The enemy still attacked after the first two forfeits.
    assert_eq!(report.outcome.final_player_hp, 152);
    assert!(started.elapsed() >= Duration::from_secs(180));
}

#[tokio::test(start_paused = true)]
async fn test_forfeited_turn_then_player_resumes() {
    let store = seeded_store().await;
    let game = session(store, dummy(1, 1, 15, 10), GameConfig::default());
    let mut channel = ScriptedChannel::new(USER)
        .silence()
        .click(ActionId::BasicAttack);

    let report = game
        .start_battle(&user(), BattleMode::Manual, &mut channel)
        .await
        .unwrap();

    assert_eq!(report.outcome.result, BattleResult::Victory);
    assert_eq!(report.outcome.rounds_fought, 2);
    assert_eq!(report.outcome.final_player_hp, 153);
}

#[tokio::test]
async fn test_closed_channel_counts_as_timeout() {
    let store = seeded_store().await;
    let game = session(store, dummy(500, 1, 15, 10), GameConfig::default());
    let mut channel = ScriptedChannel::new(USER).close();

    let report = game
        .start_battle(&user(), BattleMode::Manual, &mut channel)
        .await
        .unwrap();

    assert_eq!(report.outcome.result, BattleResult::TimedOut);
}

#[tokio::test(start_paused = true)]
async fn test_reprompts_do_not_extend_the_turn() {
    let store = seeded_store().await;
    let mut poor = store.character(&user()).await.unwrap().unwrap();
    poor.mana = 5;
    store.put_character(poor).await;

    let game = session(store, dummy(500, 1, 15, 10), GameConfig::default());
    game.learn_skill(&user(), SkillId(101)).await.unwrap();

    // Two unaffordable picks 40s apart: the second lands after the 60s turn.
    let mut channel = ScriptedChannel::new(USER)
        .pause(Duration::from_secs(40))
        .click(ActionId::Skill(SkillId(101)))
        .pause(Duration::from_secs(40))
        .click(ActionId::Skill(SkillId(101)))
        .click(ActionId::Flee);

    let started = tokio::time::Instant::now();
    let report = game
        .start_battle(&user(), BattleMode::Manual, &mut channel)
        .await
        .unwrap();

    assert_eq!(report.outcome.result, BattleResult::Fled);
    // Round 1 was forfeited at the 60s mark; the flee came in round 2.
    assert_eq!(report.outcome.rounds_fought, 2);
    assert_eq!(started.elapsed(), Duration::from_secs(60));
}

#[tokio::test]
async fn test_input_stops_before_rewards_are_settled() {
    let memory = seeded_store().await;
    let flaky = Arc::new(FlakyStore::new(memory.clone()));
    let game = session(flaky.clone(), dummy(500, 1, 15, 10), GameConfig::default());

    let mut channel = ScriptedChannel::new(USER)
        .click(ActionId::Flee)
        .click(ActionId::BasicAttack);
    let signal = channel.stop_signal();
    let stopped_at_settlement = Arc::new(AtomicBool::new(false));
    let seen = stopped_at_settlement.clone();
    flaky.before_settlement(move || seen.store(signal.load(Ordering::SeqCst), Ordering::SeqCst));

    game.start_battle(&user(), BattleMode::Manual, &mut channel)
        .await
        .unwrap();

    assert!(stopped_at_settlement.load(Ordering::SeqCst));
    assert!(channel.input_stopped());
    // The click after the flee was never collected.
    assert_eq!(channel.remaining_steps(), 1);
    let log = channel.final_log.expect("summary delivered");
    assert!(log.last().unwrap().starts_with("Result: Fled"));
}

#[tokio::test]
async fn test_runner_stops_input_on_its_own() {
    let store = seeded_store().await;
    let character = store.character(&user()).await.unwrap().unwrap();
    let config = GameConfig::default();
    let mut runner = BattleRunner::new(store.as_ref(), &config, StdRng::seed_from_u64(1));
    let mut channel = ScriptedChannel::new(USER).click(ActionId::BasicAttack);

    let outcome = runner
        .run(
            &character,
            Arc::new(dummy(1, 1, 15, 10)),
            BattleMode::Manual,
            &mut channel,
        )
        .await
        .unwrap();

    assert_eq!(outcome.result, BattleResult::Victory);
    assert!(channel.input_stopped());
    // Delivering the summary is left to the caller.
    assert!(channel.final_log.is_none());
}

// =============================================================================
// Skills in battle
// =============================================================================

#[tokio::test]
async fn test_unaffordable_skill_reprompts_without_using_the_round() {
    let store = seeded_store().await;
    let mut poor = store.character(&user()).await.unwrap().unwrap();
    poor.mana = 5;
    store.put_character(poor).await;

    let game = session(store.clone(), dummy(1, 1, 15, 10), GameConfig::default());
    game.learn_skill(&user(), SkillId(101)).await.unwrap();

    let mut channel = ScriptedChannel::new(USER)
        .click(ActionId::Skill(SkillId(101)))
        .click(ActionId::BasicAttack);
    let report = game
        .start_battle(&user(), BattleMode::Manual, &mut channel)
        .await
        .unwrap();

    assert_eq!(report.outcome.result, BattleResult::Victory);
    assert_eq!(report.outcome.rounds_fought, 1);
    assert_eq!(channel.prompts.len(), 2);
    let shout = &channel.prompts[0].actions[1];
    assert_eq!(shout.id, ActionId::Skill(SkillId(101)));
    assert!(!shout.enabled);
    assert!(report
        .outcome
        .battle_log
        .iter()
        .any(|l| l.starts_with("Not enough mana for Provoking Shout")));
    assert_eq!(store.character(&user()).await.unwrap().unwrap().mana, 5);
}

#[tokio::test]
async fn test_unknown_skill_falls_back_to_basic_attack() {
    let store = seeded_store().await;
    let game = session(store, dummy(1, 1, 15, 10), GameConfig::default());
    let mut channel = ScriptedChannel::new(USER).click(ActionId::Skill(SkillId(999)));

    let report = game
        .start_battle(&user(), BattleMode::Manual, &mut channel)
        .await
        .unwrap();

    assert_eq!(report.outcome.result, BattleResult::Victory);
    assert!(report
        .outcome
        .battle_log
        .iter()
        .any(|l| l.contains("basic attack instead")));
}

#[tokio::test]
async fn test_skill_spends_mana_immediately() {
    let store = seeded_store().await;
    let game = session(store.clone(), dummy(500, 1, 15, 10), GameConfig::default());
    game.learn_skill(&user(), SkillId(101)).await.unwrap();

    let mut channel = ScriptedChannel::new(USER)
        .click(ActionId::Skill(SkillId(101)))
        .click(ActionId::Flee);
    game.start_battle(&user(), BattleMode::Manual, &mut channel)
        .await
        .unwrap();

    assert_eq!(store.character(&user()).await.unwrap().unwrap().mana, 55);
    // The second prompt reflects the spent mana.
    assert_eq!(channel.prompts[1].player_mana, 55);
}

#[tokio::test]
async fn test_hybrid_casts_until_mana_runs_out() {
    let store = seeded_store().await;
    let config = GameConfig::default().with_hybrid_skill_chance(1.0);
    let game = session(store.clone(), dummy(10_000, 1, 40, 0), config);
    game.learn_skill(&user(), SkillId(101)).await.unwrap();

    let mut channel = ScriptedChannel::new(USER);
    let report = game
        .start_battle(&user(), BattleMode::Hybrid, &mut channel)
        .await
        .unwrap();

    assert_eq!(report.outcome.result, BattleResult::RoundCapReached);
    assert_eq!(report.outcome.rounds_fought, 10);
    assert!(channel.prompts.is_empty());

    // 65 mana buys six casts of a 10 MP skill.
    let casts = report
        .outcome
        .battle_log
        .iter()
        .filter(|l| l.contains("uses Provoking Shout"))
        .count();
    assert_eq!(casts, 6);
    assert_eq!(store.character(&user()).await.unwrap().unwrap().mana, 5);
}

#[tokio::test]
async fn test_quick_battle_needs_no_input() {
    let store = Arc::new(MemoryStore::new());
    store.put_character(create_sample_warrior(1, USER)).await;
    let game = GameSession::new(store, GameConfig::default().with_rng_seed(3));
    let mut channel = ScriptedChannel::new(USER);

    let report = game
        .start_battle(&user(), BattleMode::Quick, &mut channel)
        .await
        .unwrap();

    assert!(channel.prompts.is_empty());
    assert!(report.outcome.rounds_fought <= 30);
    assert!(report.outcome.enemy.level <= 3);
    assert_ne!(report.outcome.result, BattleResult::Fled);
    assert_ne!(report.outcome.result, BattleResult::TimedOut);
    assert!(channel.final_log.is_some());
}

#[tokio::test]
async fn test_quick_battle_runs_to_its_round_cap() {
    let store = seeded_store().await;
    let game = session(store.clone(), dummy(10_000, 1, 40, 25), GameConfig::default());
    let mut channel = ScriptedChannel::new(USER);

    let report = game
        .start_battle(&user(), BattleMode::Quick, &mut channel)
        .await
        .unwrap();

    assert_eq!(report.outcome.result, BattleResult::RoundCapReached);
    assert_eq!(report.outcome.rounds_fought, 30);
    assert_eq!((report.outcome.xp_earned, report.outcome.gold_earned), (20, 0));
    // One point of damage per enemy turn.
    assert_eq!(report.outcome.final_player_hp, 124);
    assert!(report
        .outcome
        .battle_log
        .iter()
        .any(|l| l == "-- Round 30/30 --"));
    assert!(!report.outcome.battle_log.iter().any(|l| l.contains("Round 31")));
}

#[tokio::test]
async fn test_regeneration_heals_up_to_max_without_damage() {
    let store = Arc::new(MemoryStore::new());
    let mut warrior = create_sample_warrior(1, USER);
    warrior.attributes.agility = 0;
    warrior.level = 3;
    warrior.health = 140;
    store.put_character(warrior).await;

    let game = session(store.clone(), dummy(500, 1, 15, 10), GameConfig::default());
    game.learn_skill(&user(), REGENERATION).await.unwrap();

    let mut channel = ScriptedChannel::new(USER)
        .click(ActionId::Skill(REGENERATION))
        .click(ActionId::Flee);
    let report = game
        .start_battle(&user(), BattleMode::Manual, &mut channel)
        .await
        .unwrap();

    assert_eq!(report.outcome.result, BattleResult::Fled);
    assert!(report
        .outcome
        .battle_log
        .iter()
        .any(|l| l.contains("uses Regeneration and restores 23 HP")));
    assert_eq!(report.outcome.final_enemy_hp, 500);

    assert_eq!(channel.prompts[0].player_hp, 140);
    // 140 + 23 caps at 154, then the dummy hits for 1.
    assert_eq!(channel.prompts[1].player_hp, 153);
    // 65 - 15 MP, reflected in the battle before the next prompt.
    assert_eq!(channel.prompts[1].player_mana, 50);
    assert_eq!(store.character(&user()).await.unwrap().unwrap().mana, 50);
}

#[tokio::test]
async fn test_hybrid_never_casts_a_passive_only_kit() {
    let store = Arc::new(MemoryStore::new());
    let mut rogue = create_sample_warrior(1, USER);
    rogue.class = CharacterClass::Rogue;
    rogue.attributes.agility = 0;
    store.put_character(rogue).await;

    let config = GameConfig::default().with_hybrid_skill_chance(1.0);
    let game = session(store.clone(), dummy(10_000, 1, 40, 0), config);
    game.learn_skill(&user(), SkillId(301)).await.unwrap();

    let mut channel = ScriptedChannel::new(USER);
    let report = game
        .start_battle(&user(), BattleMode::Hybrid, &mut channel)
        .await
        .unwrap();

    assert_eq!(report.outcome.result, BattleResult::RoundCapReached);
    assert_eq!(report.outcome.rounds_fought, 10);
    assert!(!report.outcome.battle_log.iter().any(|l| l.contains(" uses ")));
    assert_eq!(store.character(&user()).await.unwrap().unwrap().mana, 65);
}

// =============================================================================
// Cooldowns and concurrency
// =============================================================================

#[tokio::test]
async fn test_cooldown_blocks_next_battle_until_expired() {
    let store = seeded_store().await;
    let clock = Arc::new(ManualClock::new());
    let cooldowns =
        CooldownTracker::new(Arc::new(InMemoryCooldowns::new()), clock.clone(), 0.0);
    let game =
        session(store, dummy(500, 1, 15, 10), GameConfig::default()).with_cooldowns(cooldowns);

    let mut channel = ScriptedChannel::new(USER).click(ActionId::Flee);
    game.start_battle(&user(), BattleMode::Manual, &mut channel)
        .await
        .unwrap();

    let mut again = ScriptedChannel::new(USER).click(ActionId::Flee);
    let blocked = game
        .start_battle(&user(), BattleMode::Manual, &mut again)
        .await;
    assert!(matches!(
        blocked,
        Err(SessionError::OnCooldown { remaining_secs: 300 })
    ));

    clock.advance(Duration::from_secs(300));
    assert!(!game.is_on_cooldown(&user()).await);
    game.start_battle(&user(), BattleMode::Manual, &mut again)
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_second_concurrent_battle_is_rejected() {
    let store = seeded_store().await;
    let game = session(store, dummy(500, 1, 15, 10), GameConfig::default());

    let mut first = ScriptedChannel::new(USER).silence().click(ActionId::Flee);
    let mut second = ScriptedChannel::new(USER).click(ActionId::Flee);
    let owner = user();

    let (a, b) = tokio::join!(
        game.start_battle(&owner, BattleMode::Manual, &mut first),
        game.start_battle(&owner, BattleMode::Manual, &mut second),
    );

    assert_eq!(a.unwrap().outcome.result, BattleResult::Fled);
    assert!(matches!(b, Err(SessionError::BattleInProgress(_))));
    assert_eq!(second.remaining_steps(), 1);
    assert!(!game.in_battle(&owner));
}

/// Cooldown storage whose reads take a while, like a remote key-value store.
struct SlowCooldowns(InMemoryCooldowns);

#[async_trait]
impl CooldownStore for SlowCooldowns {
    async fn expiry(&self, user_id: &UserId) -> Option<DateTime<Utc>> {
        let expiry = self.0.expiry(user_id).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        expiry
    }

    async fn set_expiry(&self, user_id: &UserId, expires_at: DateTime<Utc>) {
        self.0.set_expiry(user_id, expires_at).await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        self.0.purge_expired(now).await
    }

    async fn len(&self) -> usize {
        self.0.len().await
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_cooldown_reads_cannot_admit_two_battles() {
    let store = seeded_store().await;
    let cooldowns = CooldownTracker::new(
        Arc::new(SlowCooldowns(InMemoryCooldowns::new())),
        Arc::new(SystemClock),
        0.0,
    );
    let game = session(store.clone(), dummy(1, 1, 15, 10), GameConfig::default())
        .with_cooldowns(cooldowns);

    let mut first = ScriptedChannel::new(USER);
    let mut second = ScriptedChannel::new(USER);
    let owner = user();

    let (a, b) = tokio::join!(
        game.start_battle(&owner, BattleMode::Quick, &mut first),
        game.start_battle(&owner, BattleMode::Quick, &mut second),
    );

    assert_eq!(a.unwrap().outcome.result, BattleResult::Victory);
    assert!(matches!(
        b,
        Err(SessionError::BattleInProgress(_)) | Err(SessionError::OnCooldown { .. })
    ));
    let character = store.character(&owner).await.unwrap().unwrap();
    assert_eq!((character.xp, character.gold), (15, 10));

    let mut third = ScriptedChannel::new(USER);
    let again = game
        .start_battle(&owner, BattleMode::Quick, &mut third)
        .await;
    assert!(matches!(again, Err(SessionError::OnCooldown { .. })));
}

// =============================================================================
// Storage failures
// =============================================================================

#[tokio::test]
async fn test_storage_failure_mid_battle_flushes_log_and_grants_nothing() {
    let memory = seeded_store().await;
    let flaky = Arc::new(FlakyStore::new(memory.clone()));
    let game = session(flaky.clone(), dummy(500, 1, 15, 10), GameConfig::default());
    game.learn_skill(&user(), SkillId(101)).await.unwrap();
    flaky.fail_mana(true);

    let mut channel = ScriptedChannel::new(USER)
        .click(ActionId::BasicAttack)
        .click(ActionId::Skill(SkillId(101)));
    let result = game
        .start_battle(&user(), BattleMode::Manual, &mut channel)
        .await;

    let err = result.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Battle(BattleError::Store(StoreError::Unavailable(_)))
    ));
    assert!(err.user_message().starts_with("Sorry"));

    let log = channel.final_log.expect("log flushed before the error");
    assert!(log.iter().any(|l| l.contains("attacks the Training Dummy")));
    assert!(log.last().unwrap().contains("No rewards were granted"));

    assert!(!game.is_on_cooldown(&user()).await);
    let character = memory.character(&user()).await.unwrap().unwrap();
    assert_eq!(character.xp, 0);
    assert!(!game.in_battle(&user()));
}

#[tokio::test]
async fn test_settlement_failure_applies_nothing() {
    let memory = seeded_store().await;
    let flaky = Arc::new(FlakyStore::new(memory.clone()));
    let game = session(flaky.clone(), dummy(1, 1, 15, 10), GameConfig::default());
    flaky.fail_settlement(true);

    let mut channel = ScriptedChannel::new(USER);
    let result = game
        .start_battle(&user(), BattleMode::Quick, &mut channel)
        .await;

    assert!(matches!(result, Err(SessionError::Store(_))));
    assert!(!game.is_on_cooldown(&user()).await);
    let character = memory.character(&user()).await.unwrap().unwrap();
    assert_eq!((character.xp, character.gold), (0, 0));
    assert!(channel
        .final_log
        .unwrap()
        .last()
        .unwrap()
        .contains("No rewards were granted"));
}
