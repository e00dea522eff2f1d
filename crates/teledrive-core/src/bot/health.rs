//! Per-credential health tracking for the bot pool.
//!
//! Each credential moves through `Active -> Inactive -> Probation -> Active`.
//! A credential is demoted after `failure_threshold` consecutive failures and
//! sits out until its recovery deadline; after that it gets exactly one trial
//! selection. A success on probation restores it, a failure demotes it again
//! with a fresh deadline.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use teledrive_types::bot::{BotState, BotStatusInfo};
use teledrive_types::config::TelegramConfig;

/// Thresholds for demotion and recovery.
#[derive(Debug, Clone)]
pub struct HealthPolicy {
    /// Consecutive failures before a credential is deactivated.
    pub failure_threshold: u32,
    /// How long a deactivated credential waits before probation.
    pub recovery_window: Duration,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_window: Duration::from_secs(300),
        }
    }
}

impl From<&TelegramConfig> for HealthPolicy {
    fn from(config: &TelegramConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
            recovery_window: Duration::from_secs(config.recovery_window_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HealthState {
    Active,
    Inactive { recovery_deadline: Instant },
    /// `claimed` is set once a selection has taken the single trial slot.
    Probation { claimed: bool },
}

#[derive(Debug)]
struct BotHealth {
    id: String,
    name: String,
    state: HealthState,
    consecutive_failures: u32,
    total_successes: u64,
    total_failures: u64,
    last_error: Option<String>,
    last_failure_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl BotHealth {
    fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            state: HealthState::Active,
            consecutive_failures: 0,
            total_successes: 0,
            total_failures: 0,
            last_error: None,
            last_failure_at: None,
        }
    }

    /// Promote to probation if the recovery deadline has passed.
    fn refresh(&mut self, now: Instant) {
        if let HealthState::Inactive { recovery_deadline } = self.state {
            if now >= recovery_deadline {
                info!(bot = %self.id, "Recovery deadline elapsed, bot on probation");
                self.state = HealthState::Probation { claimed: false };
            }
        }
    }

    fn effective_state(&self, now: Instant) -> BotState {
        match self.state {
            HealthState::Active => BotState::Active,
            HealthState::Inactive { recovery_deadline } if now >= recovery_deadline => {
                BotState::Probation
            }
            HealthState::Inactive { .. } => BotState::Inactive,
            HealthState::Probation { .. } => BotState::Probation,
        }
    }
}

/// A credential that may be selected right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthyBot {
    pub id: String,
    /// The credential is on its single trial after a recovery window.
    pub probation: bool,
}

/// Authoritative health state for every credential of one pool.
///
/// Mutations hold a short, non-async lock, so concurrent tasks never observe
/// a half-applied update.
#[derive(Debug)]
pub struct HealthRegistry {
    bots: Mutex<Vec<BotHealth>>,
    policy: HealthPolicy,
}

impl HealthRegistry {
    /// Register `(id, name)` pairs, all starting `Active`.
    pub fn new<I, S>(bots: I, policy: HealthPolicy) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let bots = bots
            .into_iter()
            .map(|(id, name)| BotHealth::new(id.into(), name.into()))
            .collect();
        Self {
            bots: Mutex::new(bots),
            policy,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<BotHealth>> {
        self.bots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clear the failure counter and restore the credential to `Active`.
    pub fn record_success(&self, id: &str) {
        let mut bots = self.lock();
        let Some(bot) = bots.iter_mut().find(|b| b.id == id) else {
            return;
        };
        if bot.state != HealthState::Active {
            info!(bot = %bot.id, "Bot recovered, back in rotation");
        }
        bot.state = HealthState::Active;
        bot.consecutive_failures = 0;
        bot.total_successes += 1;
    }

    /// Count a failure, demoting the credential once the threshold is reached.
    ///
    /// For rate-limit failures the recovery deadline follows the backend's
    /// `retry_after` hint when one was given. A failure while on probation
    /// demotes immediately.
    pub fn record_failure(
        &self,
        id: &str,
        is_rate_limit: bool,
        retry_after: Option<Duration>,
        error: &str,
    ) {
        let now = Instant::now();
        let mut bots = self.lock();
        let Some(bot) = bots.iter_mut().find(|b| b.id == id) else {
            return;
        };

        bot.consecutive_failures = bot.consecutive_failures.saturating_add(1);
        bot.total_failures += 1;
        bot.last_error = Some(error.to_string());
        bot.last_failure_at = Some(chrono::Utc::now());

        let on_probation = matches!(bot.state, HealthState::Probation { .. });
        let reached_threshold = bot.consecutive_failures >= self.policy.failure_threshold;
        if !(on_probation || reached_threshold) {
            return;
        }

        let wait = match retry_after {
            Some(hint) if is_rate_limit => hint,
            _ => self.policy.recovery_window,
        };
        bot.state = HealthState::Inactive {
            recovery_deadline: now + wait,
        };
        warn!(
            bot = %bot.id,
            failures = bot.consecutive_failures,
            recovery_secs = wait.as_secs(),
            rate_limited = is_rate_limit,
            "Bot deactivated"
        );
    }

    /// Credentials selectable now, in registration order.
    ///
    /// Inactive credentials whose deadline has elapsed are moved to probation
    /// and returned flagged; a probation credential whose trial slot is already
    /// claimed is left out until its outcome is recorded.
    pub fn list_healthy(&self) -> Vec<HealthyBot> {
        let now = Instant::now();
        let mut bots = self.lock();
        bots.iter_mut()
            .filter_map(|bot| {
                bot.refresh(now);
                match bot.state {
                    HealthState::Active => Some(HealthyBot {
                        id: bot.id.clone(),
                        probation: false,
                    }),
                    HealthState::Probation { claimed: false } => Some(HealthyBot {
                        id: bot.id.clone(),
                        probation: true,
                    }),
                    _ => None,
                }
            })
            .collect()
    }

    /// Take the single probation slot for `id`. Returns `false` if another
    /// selection got there first or the credential is not on probation.
    pub fn claim_probation(&self, id: &str) -> bool {
        let mut bots = self.lock();
        match bots.iter_mut().find(|b| b.id == id) {
            Some(bot) if bot.state == (HealthState::Probation { claimed: false }) => {
                bot.state = HealthState::Probation { claimed: true };
                true
            }
            _ => false,
        }
    }

    /// Give back a probation slot whose attempt ended without an outcome
    /// (the caller dropped it, or the payload itself was refused).
    pub fn release_probation(&self, id: &str) {
        let mut bots = self.lock();
        if let Some(bot) = bots.iter_mut().find(|b| b.id == id) {
            if bot.state == (HealthState::Probation { claimed: true }) {
                bot.state = HealthState::Probation { claimed: false };
            }
        }
    }

    /// Deadline for an inactive credential, if it is currently inactive.
    pub fn recovery_deadline(&self, id: &str) -> Option<Instant> {
        self.lock().iter().find(|b| b.id == id).and_then(|b| match b.state {
            HealthState::Inactive { recovery_deadline } => Some(recovery_deadline),
            _ => None,
        })
    }

    /// Read-only snapshot for dashboards.
    pub fn status(&self) -> Vec<BotStatusInfo> {
        let now = Instant::now();
        self.lock()
            .iter()
            .map(|bot| {
                let state = bot.effective_state(now);
                BotStatusInfo {
                    id: bot.id.clone(),
                    name: bot.name.clone(),
                    active: state != BotState::Inactive,
                    failures: bot.consecutive_failures,
                    state,
                    total_successes: bot.total_successes,
                    total_failures: bot.total_failures,
                    last_error: bot.last_error.clone(),
                    last_failure_at: bot.last_failure_at.map(|t| t.to_rfc3339()),
                }
            })
            .collect()
    }
}
