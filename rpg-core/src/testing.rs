//! Testing utilities for the battle engine.
//!
//! - `ScriptedChannel` plays back clicks and silences instead of a chat client
//! - `ManualClock` only moves when told to
//! - `FlakyStore` wraps a store and fails chosen operations on demand

use crate::battle::{ActionId, BattleChannel, ChannelError, Interaction, TurnPrompt};
use crate::character::{
    Attribute, CharacterClass, CharacterId, CharacterRecord, NewCharacter, UserId,
};
use crate::cooldown::Clock;
use crate::rewards::{LevelingRules, Progression};
use crate::skills::{LearnedSkill, Skill, SkillId};
use crate::store::{CharacterStore, ManaSpend, Settlement, StatUpgrade, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// One scripted step of player input.
#[derive(Debug, Clone)]
pub enum Step {
    Click(Interaction),
    /// Nobody clicks; the turn runs into its timeout.
    Silence,
    /// Nobody clicks for a while, then the script carries on.
    Pause(Duration),
    /// The channel goes away.
    Close,
}

/// A [`BattleChannel`] that replays a script.
///
/// Once the script runs out, or input has been stopped, the channel reports
/// itself closed.
#[derive(Debug)]
pub struct ScriptedChannel {
    owner: UserId,
    steps: VecDeque<Step>,
    stopped: Arc<AtomicBool>,
    /// Every prompt presented, in order.
    pub prompts: Vec<TurnPrompt>,
    /// Rejected clicks with the notice sent back.
    pub rejections: Vec<(Interaction, String)>,
    /// The log passed to `finish`, if it was called.
    pub final_log: Option<Vec<String>>,
}

impl ScriptedChannel {
    /// An empty script on behalf of `owner`.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: UserId::new(owner),
            steps: VecDeque::new(),
            stopped: Arc::new(AtomicBool::new(false)),
            prompts: Vec::new(),
            rejections: Vec::new(),
            final_log: None,
        }
    }

    /// Queue a click by the owner.
    pub fn click(mut self, action: ActionId) -> Self {
        let interaction = Interaction {
            user_id: self.owner.clone(),
            action,
        };
        self.steps.push_back(Step::Click(interaction));
        self
    }

    /// Queue a click by someone else.
    pub fn click_as(mut self, user_id: impl Into<String>, action: ActionId) -> Self {
        self.steps
            .push_back(Step::Click(Interaction::new(user_id, action)));
        self
    }

    /// Queue `n` clicks of the same action.
    pub fn repeat(mut self, action: ActionId, n: usize) -> Self {
        for _ in 0..n {
            self = self.click(action);
        }
        self
    }

    pub fn silence(mut self) -> Self {
        self.steps.push_back(Step::Silence);
        self
    }

    /// Queue a delay before the next step.
    pub fn pause(mut self, duration: Duration) -> Self {
        self.steps.push_back(Step::Pause(duration));
        self
    }

    pub fn close(mut self) -> Self {
        self.steps.push_back(Step::Close);
        self
    }

    pub fn remaining_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn last_prompt(&self) -> Option<&TurnPrompt> {
        self.prompts.last()
    }

    /// Whether `stop_input` has been called.
    pub fn input_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// A handle that reads `input_stopped` while the channel is borrowed.
    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        self.stopped.clone()
    }
}

#[async_trait]
impl BattleChannel for ScriptedChannel {
    async fn present(&mut self, _log: &[String], prompt: &TurnPrompt) -> Result<(), ChannelError> {
        self.prompts.push(prompt.clone());
        Ok(())
    }

    async fn next_interaction(&mut self) -> Option<Interaction> {
        if self.input_stopped() {
            return None;
        }
        loop {
            match self.steps.pop_front() {
                Some(Step::Click(interaction)) => return Some(interaction),
                Some(Step::Pause(duration)) => tokio::time::sleep(duration).await,
                Some(Step::Silence) => std::future::pending::<()>().await,
                Some(Step::Close) | None => return None,
            }
        }
    }

    async fn reject(
        &mut self,
        interaction: &Interaction,
        notice: &str,
    ) -> Result<(), ChannelError> {
        self.rejections
            .push((interaction.clone(), notice.to_string()));
        Ok(())
    }

    async fn stop_input(&mut self) -> Result<(), ChannelError> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn finish(&mut self, log: &[String]) -> Result<(), ChannelError> {
        self.final_log = Some(log.to_vec());
        Ok(())
    }
}

/// A [`Clock`] that moves only when advanced.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        if let Ok(span) = chrono::Duration::from_std(by) {
            *now += span;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

type SettlementHook = Box<dyn Fn() + Send + Sync>;

/// A store wrapper whose operations fail while their switch is on.
pub struct FlakyStore {
    inner: Arc<dyn CharacterStore>,
    fail_reads: AtomicBool,
    fail_mana: AtomicBool,
    fail_settlement: AtomicBool,
    before_settlement: Mutex<Option<SettlementHook>>,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn CharacterStore>) -> Self {
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_mana: AtomicBool::new(false),
            fail_settlement: AtomicBool::new(false),
            before_settlement: Mutex::new(None),
        }
    }

    /// Run `hook` at the start of every settlement, before any write.
    pub fn before_settlement(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self
            .before_settlement
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
    }

    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    pub fn fail_mana(&self, on: bool) {
        self.fail_mana.store(on, Ordering::SeqCst);
    }

    pub fn fail_settlement(&self, on: bool) {
        self.fail_settlement.store(on, Ordering::SeqCst);
    }

    fn run_settlement_hook(&self) {
        let hook = self
            .before_settlement
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(hook) = hook.as_ref() {
            hook();
        }
    }

    fn check(flag: &AtomicBool, operation: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("injected {operation} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl CharacterStore for FlakyStore {
    async fn character(&self, user_id: &UserId) -> Result<Option<CharacterRecord>, StoreError> {
        Self::check(&self.fail_reads, "read")?;
        self.inner.character(user_id).await
    }

    async fn character_by_id(
        &self,
        id: CharacterId,
    ) -> Result<Option<CharacterRecord>, StoreError> {
        Self::check(&self.fail_reads, "read")?;
        self.inner.character_by_id(id).await
    }

    async fn create_character(&self, new: NewCharacter) -> Result<CharacterRecord, StoreError> {
        self.inner.create_character(new).await
    }

    async fn class_skills(&self, class: CharacterClass) -> Result<Vec<Skill>, StoreError> {
        Self::check(&self.fail_reads, "read")?;
        self.inner.class_skills(class).await
    }

    async fn skill(&self, id: SkillId) -> Result<Option<Skill>, StoreError> {
        Self::check(&self.fail_reads, "read")?;
        self.inner.skill(id).await
    }

    async fn learned_skills(&self, id: CharacterId) -> Result<Vec<LearnedSkill>, StoreError> {
        Self::check(&self.fail_reads, "read")?;
        self.inner.learned_skills(id).await
    }

    async fn insert_learned_skill(
        &self,
        id: CharacterId,
        skill_id: SkillId,
    ) -> Result<bool, StoreError> {
        self.inner.insert_learned_skill(id, skill_id).await
    }

    async fn spend_mana(
        &self,
        id: CharacterId,
        cost: i32,
    ) -> Result<Option<ManaSpend>, StoreError> {
        Self::check(&self.fail_mana, "mana")?;
        self.inner.spend_mana(id, cost).await
    }

    async fn apply_settlement(
        &self,
        user_id: &UserId,
        settlement: &Settlement,
        rules: &LevelingRules,
    ) -> Result<Option<Progression>, StoreError> {
        self.run_settlement_hook();
        Self::check(&self.fail_settlement, "settlement")?;
        self.inner.apply_settlement(user_id, settlement, rules).await
    }

    async fn upgrade_attribute(
        &self,
        user_id: &UserId,
        attribute: Attribute,
        amount: u32,
    ) -> Result<Option<StatUpgrade>, StoreError> {
        self.inner.upgrade_attribute(user_id, attribute, amount).await
    }

    async fn rest(&self, user_id: &UserId) -> Result<Option<CharacterRecord>, StoreError> {
        self.inner.rest(user_id).await
    }
}
