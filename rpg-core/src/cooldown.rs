//! Per-user battle cooldowns.
//!
//! Expiry timestamps live in an injected [`CooldownStore`] and time comes
//! from an injected [`Clock`]. Expired entries are inert; they are purged by
//! an occasional sweep piggybacked on [`CooldownTracker::arm`].

use crate::character::UserId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Key-value storage for cooldown expiries.
#[async_trait]
pub trait CooldownStore: Send + Sync {
    async fn expiry(&self, user_id: &UserId) -> Option<DateTime<Utc>>;

    /// Overwrite the expiry for a user.
    async fn set_expiry(&self, user_id: &UserId, expires_at: DateTime<Utc>);

    /// Remove every entry that expired at or before `now`. Returns how many.
    async fn purge_expired(&self, now: DateTime<Utc>) -> usize;

    async fn len(&self) -> usize;
}

/// In-memory [`CooldownStore`].
#[derive(Debug, Default)]
pub struct InMemoryCooldowns {
    entries: RwLock<HashMap<UserId, DateTime<Utc>>>,
}

impl InMemoryCooldowns {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CooldownStore for InMemoryCooldowns {
    async fn expiry(&self, user_id: &UserId) -> Option<DateTime<Utc>> {
        self.entries.read().await.get(user_id).copied()
    }

    async fn set_expiry(&self, user_id: &UserId, expires_at: DateTime<Utc>) {
        self.entries
            .write()
            .await
            .insert(user_id.clone(), expires_at);
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, expires_at| *expires_at > now);
        before - entries.len()
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// The cooldown gate checked before every battle.
#[derive(Clone)]
pub struct CooldownTracker {
    store: Arc<dyn CooldownStore>,
    clock: Arc<dyn Clock>,
    sweep_chance: f64,
    rng: Arc<Mutex<StdRng>>,
}

impl CooldownTracker {
    pub fn new(store: Arc<dyn CooldownStore>, clock: Arc<dyn Clock>, sweep_chance: f64) -> Self {
        Self {
            store,
            clock,
            sweep_chance: sweep_chance.clamp(0.0, 1.0),
            rng: Arc::new(Mutex::new(StdRng::from_entropy())),
        }
    }

    /// Fix the random stream behind the sweep roll.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Arc::new(Mutex::new(StdRng::seed_from_u64(seed)));
        self
    }

    /// In-memory storage and the system clock.
    pub fn in_memory(sweep_chance: f64) -> Self {
        Self::new(
            Arc::new(InMemoryCooldowns::new()),
            Arc::new(SystemClock),
            sweep_chance,
        )
    }

    pub fn store(&self) -> &Arc<dyn CooldownStore> {
        &self.store
    }

    pub async fn is_on_cooldown(&self, user_id: &UserId) -> bool {
        self.store
            .expiry(user_id)
            .await
            .is_some_and(|expires_at| expires_at > self.clock.now())
    }

    /// Whole seconds left, rounded up; 0 when not on cooldown.
    pub async fn remaining_seconds(&self, user_id: &UserId) -> u64 {
        let Some(expires_at) = self.store.expiry(user_id).await else {
            return 0;
        };
        let millis = (expires_at - self.clock.now()).num_milliseconds();
        if millis <= 0 {
            0
        } else {
            (millis as u64).div_ceil(1000)
        }
    }

    /// Start (or restart) a cooldown of `duration` from now.
    pub async fn arm(&self, user_id: &UserId, duration: Duration) {
        let now = self.clock.now();
        let expires_at = chrono::Duration::from_std(duration)
            .ok()
            .and_then(|span| now.checked_add_signed(span))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.store.set_expiry(user_id, expires_at).await;

        let roll = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            rng.gen::<f64>()
        };
        if roll < self.sweep_chance {
            self.sweep().await;
        }
    }

    /// Purge every expired entry.
    pub async fn sweep(&self) -> usize {
        let purged = self.store.purge_expired(self.clock.now()).await;
        if purged > 0 {
            debug!(purged, "expired cooldowns swept");
        }
        purged
    }
}
