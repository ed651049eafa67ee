use crate::models::StoredProfile;
use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt profile for {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistence seam for profiles of offline users
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn load(&self, user_id: &str) -> Result<Option<StoredProfile>>;

    async fn save(&self, user_id: &str, profile: &StoredProfile) -> Result<()>;
}

/// Process-local store, used in tests and single-node runs
#[derive(Default)]
pub struct InMemoryProfileStore {
    profiles: DashMap<String, StoredProfile>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn load(&self, user_id: &str) -> Result<Option<StoredProfile>> {
        Ok(self.profiles.get(user_id).map(|entry| entry.value().clone()))
    }

    async fn save(&self, user_id: &str, profile: &StoredProfile) -> Result<()> {
        self.profiles.insert(user_id.to_string(), profile.clone());
        Ok(())
    }
}

/// Profiles as JSON strings under `{prefix}:profile:{user_id}`
pub struct RedisProfileStore {
    redis: redis::Client,
    key_prefix: String,
}

impl RedisProfileStore {
    pub fn new(redis: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            redis,
            key_prefix: key_prefix.into(),
        }
    }

    fn profile_key(&self, user_id: &str) -> String {
        format!("{}:profile:{}", self.key_prefix, user_id)
    }
}

#[async_trait]
impl ProfileStore for RedisProfileStore {
    async fn load(&self, user_id: &str) -> Result<Option<StoredProfile>> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(self.profile_key(user_id)).await?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        if raw.trim().is_empty() {
            return Err(StoreError::Corrupt(user_id.to_string()));
        }

        let profile: StoredProfile = serde_json::from_str(&raw)?;
        debug!(user_id = user_id, weights = profile.weights.len(), "Profile loaded");
        Ok(Some(profile))
    }

    async fn save(&self, user_id: &str, profile: &StoredProfile) -> Result<()> {
        let payload = serde_json::to_string(profile)?;
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let _: () = conn.set(self.profile_key(user_id), payload).await?;

        debug!(user_id = user_id, "Profile saved");
        Ok(())
    }
}
