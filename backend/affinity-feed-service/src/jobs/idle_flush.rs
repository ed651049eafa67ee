// ============================================
// Idle Flush Job
// ============================================
//
// Periodically logs off users whose session saw no reaction or paging
// for longer than the idle timeout, persisting their affinity profile.
//
// Workflow:
// 1. Wake every sweep interval
// 2. Flush sessions idle for at least the timeout
// 3. Record pass statistics

use crate::config::SessionConfig;
use crate::services::session::SessionStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Statistics of one flush pass
#[derive(Debug, Clone, Default)]
pub struct FlushStats {
    pub started_at: Option<DateTime<Utc>>,
    pub online_before: usize,
    pub flushed: usize,
    pub duration_ms: u64,
}

pub struct IdleFlushJob {
    sessions: Arc<SessionStore>,
    idle_timeout: Duration,
    sweep_interval: Duration,
}

impl IdleFlushJob {
    pub fn new(sessions: Arc<SessionStore>, config: &SessionConfig) -> Self {
        Self {
            sessions,
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
        }
    }

    /// Run passes forever; intended to be spawned
    pub async fn run(self) {
        info!(
            idle_timeout_secs = self.idle_timeout.as_secs(),
            sweep_interval_secs = self.sweep_interval.as_secs(),
            "Idle flush job started"
        );

        let mut ticker = interval(self.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let stats = self.run_single_pass().await;
            if stats.flushed > 0 {
                info!(
                    online_before = stats.online_before,
                    flushed = stats.flushed,
                    duration_ms = stats.duration_ms,
                    "Idle flush pass completed"
                );
            }
        }
    }

    pub async fn run_single_pass(&self) -> FlushStats {
        let start_time = Instant::now();
        let mut stats = FlushStats {
            started_at: Some(Utc::now()),
            online_before: self.sessions.online_count(),
            ..Default::default()
        };

        stats.flushed = self.sessions.flush_idle(self.idle_timeout).await;
        stats.duration_ms = start_time.elapsed().as_millis() as u64;

        debug!(online = self.sessions.online_count(), "Idle flush pass finished");
        stats
    }
}
