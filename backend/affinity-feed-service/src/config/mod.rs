use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub redis: RedisConfig,
    pub affinity: AffinityConfig,
    pub feed: FeedConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub service_name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_name: "affinity-feed-service".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            key_prefix: "feed".to_string(),
        }
    }
}

/// Tag table parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AffinityConfig {
    pub vocabulary_size: usize,
    /// Weight of every tag in a fresh profile
    pub default_weight: f64,
    /// Zero-weight tags tracked before the oldest is revived
    pub zero_capacity: usize,
    /// Weight given to a zero tag evicted from the FIFO
    pub revival_weight: f64,
    /// Tags in a composed query
    pub query_tags: usize,
}

impl Default for AffinityConfig {
    fn default() -> Self {
        Self {
            vocabulary_size: 100,
            default_weight: 0.5,
            zero_capacity: 25,
            revival_weight: 0.5,
            query_tags: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub seen_capacity: usize,
    pub positive_history_capacity: usize,
    /// Candidates appended to the upcoming queue per refill
    pub refill_batch: usize,
    pub default_page_size: usize,
    /// JSON file of catalog records loaded at startup
    pub catalog_path: Option<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            seen_capacity: 50,
            positive_history_capacity: 100,
            refill_batch: 10,
            default_page_size: 3,
            catalog_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub idle_timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 7200, // 2 hours
            sweep_interval_secs: 60,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = Config {
            service: envy::prefixed("SERVICE_").from_env()?,
            redis: envy::prefixed("REDIS_").from_env()?,
            affinity: envy::prefixed("AFFINITY_").from_env()?,
            feed: envy::prefixed("FEED_").from_env()?,
            session: envy::prefixed("SESSION_").from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.affinity.validate()?;

        let feed = &self.feed;
        if feed.seen_capacity == 0 || feed.refill_batch == 0 || feed.positive_history_capacity == 0 {
            return Err(ConfigError::Invalid(
                "feed capacities and refill batch must be positive".to_string(),
            ));
        }
        if self.session.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "SESSION_SWEEP_INTERVAL_SECS must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl AffinityConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vocabulary_size == 0 || self.zero_capacity == 0 || self.query_tags == 0 {
            return Err(ConfigError::Invalid(
                "vocabulary size, zero capacity and query tags must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.default_weight) {
            return Err(ConfigError::Invalid(format!(
                "AFFINITY_DEFAULT_WEIGHT {} outside [0, 1]",
                self.default_weight
            )));
        }
        // Reviving to zero would push the tag straight back into the FIFO
        if !(self.revival_weight > 0.0 && self.revival_weight <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "AFFINITY_REVIVAL_WEIGHT {} outside (0, 1]",
                self.revival_weight
            )));
        }
        Ok(())
    }
}
