// Background task scheduler
// Periodic maintenance: expired sessions, expired verification tokens, idle rate limit keys

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::models::{Session, VerificationToken};

/// Rows removed by one maintenance pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PurgeStats {
    pub sessions: usize,
    pub verification_tokens: usize,
}

/// Background task manager for auth maintenance
pub struct BackgroundTaskManager {
    state: AppState,
    interval: Duration,
}

impl BackgroundTaskManager {
    pub fn new(state: AppState) -> Self {
        let interval = Duration::from_secs(state.config.auth.session_cleanup_interval_secs.max(1));
        Self { state, interval }
    }

    /// Run one maintenance pass
    pub async fn purge_expired(&self) -> Result<PurgeStats, String> {
        let mut conn = self
            .state
            .diesel_pool
            .get()
            .await
            .map_err(|e| format!("Connection pool error: {}", e))?;

        let sessions = Session::delete_expired(&mut conn)
            .await
            .map_err(|e| e.to_string())?;
        let verification_tokens = VerificationToken::delete_expired(&mut conn)
            .await
            .map_err(|e| e.to_string())?;

        self.state.rate_limiter.prune();

        Ok(PurgeStats {
            sessions,
            verification_tokens,
        })
    }

    /// Start all background tasks
    pub fn start_all_tasks(self) -> JoinHandle<()> {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting background maintenance tasks"
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match self.purge_expired().await {
                    Ok(stats) if stats != PurgeStats::default() => info!(
                        sessions = stats.sessions,
                        verification_tokens = stats.verification_tokens,
                        "[MAINTENANCE] Purged expired rows"
                    ),
                    Ok(_) => debug!("[MAINTENANCE] Nothing to purge"),
                    Err(e) => warn!(error = %e, "[MAINTENANCE] Purge failed"),
                }
            }
        })
    }
}

/// Initialize background tasks (call this in main.rs)
pub fn initialize_background_tasks(state: AppState) -> JoinHandle<()> {
    BackgroundTaskManager::new(state).start_all_tasks()
}
