// ============================================
// Session Store
// ============================================
//
// Registry of online users. Each profile sits behind its own async mutex
// so reactions, refills and paging on one user are serialized while
// different users proceed independently.
//
// Lifecycle:
// 1. log_on: load persisted profile (or start fresh) into memory
// 2. react / next_n: operate on the in-memory profile
// 3. log_off or idle flush: persist the profile, then drop it

pub mod profile_store;

pub use profile_store::{InMemoryProfileStore, ProfileStore, RedisProfileStore, StoreError};

use crate::config::{AffinityConfig, FeedConfig};
use crate::models::{Reaction, Sentinel};
use crate::services::affinity::ReactionSummary;
use crate::services::feed::{FeedError, FeedScheduler, UserProfile};
use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("User not online: {0}")]
    NotOnline(String),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, SessionError>;

struct Session {
    profile: UserProfile,
    rng: StdRng,
    last_activity: Instant,
    /// Set under the lock once the profile is persisted and the entry removed
    closed: bool,
}

impl Session {
    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

pub struct SessionStore {
    sessions: DashMap<String, Arc<Mutex<Session>>>,
    scheduler: FeedScheduler,
    store: Arc<dyn ProfileStore>,
    affinity: AffinityConfig,
    feed: FeedConfig,
    rng_seed: Option<u64>,
}

impl SessionStore {
    pub fn new(
        scheduler: FeedScheduler,
        store: Arc<dyn ProfileStore>,
        affinity: AffinityConfig,
        feed: FeedConfig,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            scheduler,
            store,
            affinity,
            feed,
            rng_seed: None,
        }
    }

    /// Seed every session's event rng (reproducible feeds in tests)
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Bring a user online. Returns true when a persisted profile was restored.
    pub async fn log_on(&self, user_id: &str) -> Result<bool> {
        if let Ok(session) = self.session(user_id) {
            let mut guard = session.lock().await;
            if !guard.closed {
                guard.touch();
                return Ok(false);
            }
            // Closed while we waited; its profile is persisted, reload it
        }

        let (profile, restored) = match self.store.load(user_id).await? {
            Some(stored) => (
                UserProfile::from_stored(user_id, &stored, &self.affinity, &self.feed)?,
                true,
            ),
            None => (UserProfile::fresh(user_id, &self.affinity, &self.feed), false),
        };

        let rng = match self.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let session = Session {
            profile,
            rng,
            last_activity: Instant::now(),
            closed: false,
        };
        self.sessions
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(session)));

        info!(user_id = user_id, restored = restored, online = self.sessions.len(), "User logged on");
        Ok(restored)
    }

    /// Persist the profile and take the user offline. A failed save keeps
    /// the session online.
    pub async fn log_off(&self, user_id: &str) -> Result<()> {
        self.close(user_id, None).await.map(|_| ())
    }

    /// Log off only if the session has been idle for at least `max_idle`,
    /// checked under the session lock. Returns true when flushed.
    pub async fn log_off_if_idle(&self, user_id: &str, max_idle: Duration) -> Result<bool> {
        self.close(user_id, Some(max_idle)).await
    }

    pub async fn react(&self, user_id: &str, entry_id: &str, reaction: &Reaction) -> Result<ReactionSummary> {
        let mut guard = self.open(user_id).await?;
        guard.touch();
        Ok(self.scheduler.react(&mut guard.profile, entry_id, reaction)?)
    }

    /// React with a legacy wire code (0 like, 1 dislike, 2 ignore, 3 donate)
    pub async fn react_code(
        &self,
        user_id: &str,
        entry_id: &str,
        code: i32,
        amount: f64,
    ) -> Result<ReactionSummary> {
        let reaction = Reaction::from_code(code, amount).map_err(FeedError::from)?;
        self.react(user_id, entry_id, &reaction).await
    }

    /// Next page of entry ids; `None` uses the configured page size
    pub async fn next_n(&self, user_id: &str, n: Option<usize>) -> Result<Vec<String>> {
        let n = n.unwrap_or(self.feed.default_page_size);
        let mut guard = self.open(user_id).await?;
        guard.touch();
        let Session { profile, rng, .. } = &mut *guard;
        Ok(self.scheduler.next_n(profile, n, rng)?)
    }

    /// Opt a user in or out of a special exploration event
    pub async fn set_sentinel(&self, user_id: &str, sentinel: Sentinel, enabled: bool) -> Result<()> {
        let mut guard = self.open(user_id).await?;
        guard.touch();
        if enabled {
            guard.profile.enable_sentinel(sentinel);
        } else {
            guard.profile.disable_sentinel(sentinel);
        }
        Ok(())
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.sessions.contains_key(user_id)
    }

    pub fn online_count(&self) -> usize {
        self.sessions.len()
    }

    /// Snapshot of an online user's profile
    pub async fn profile(&self, user_id: &str) -> Result<UserProfile> {
        let guard = self.open(user_id).await?;
        Ok(guard.profile.clone())
    }

    /// Log off every session idle for at least `max_idle`
    pub async fn flush_idle(&self, max_idle: Duration) -> usize {
        self.close_all(Some(max_idle), "idle").await
    }

    /// Log off every session
    pub async fn flush_all(&self) -> usize {
        self.close_all(None, "shutdown").await
    }

    async fn close_all(&self, max_idle: Option<Duration>, reason: &'static str) -> usize {
        let users: Vec<String> = self.sessions.iter().map(|entry| entry.key().clone()).collect();

        let mut flushed = 0;
        for user_id in users {
            match self.close(&user_id, max_idle).await {
                Ok(true) => flushed += 1,
                Ok(false) | Err(SessionError::NotOnline(_)) => {}
                Err(e) => error!(user_id = %user_id, reason = reason, error = %e, "Failed to flush session"),
            }
        }
        if flushed > 0 {
            info!(flushed = flushed, reason = reason, "Sessions flushed");
        }
        flushed
    }

    async fn close(&self, user_id: &str, max_idle: Option<Duration>) -> Result<bool> {
        let session = self.session(user_id)?;
        let mut guard = session.lock().await;
        if guard.closed {
            return Err(SessionError::NotOnline(user_id.to_string()));
        }
        if let Some(max_idle) = max_idle {
            if guard.last_activity.elapsed() < max_idle {
                return Ok(false);
            }
        }

        let stored = guard.profile.to_stored(self.affinity.vocabulary_size);
        self.store.save(user_id, &stored).await?;
        guard.closed = true;
        self.sessions
            .remove_if(user_id, |_, current| Arc::ptr_eq(current, &session));
        drop(guard);

        info!(user_id = user_id, online = self.sessions.len(), "User logged off");
        Ok(true)
    }

    /// Lock a live session; sessions closed while waiting count as offline
    async fn open(&self, user_id: &str) -> Result<OwnedMutexGuard<Session>> {
        let guard = self.session(user_id)?.lock_owned().await;
        if guard.closed {
            return Err(SessionError::NotOnline(user_id.to_string()));
        }
        Ok(guard)
    }

    fn session(&self, user_id: &str) -> Result<Arc<Mutex<Session>>> {
        self.sessions
            .get(user_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| SessionError::NotOnline(user_id.to_string()))
    }
}
