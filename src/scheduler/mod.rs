//! Unattended backup triggering.
//!
//! The host calls `AutoBackupScheduler::on_trigger` on cold start and whenever
//! the app returns to the foreground. The scheduler decides whether a backup is
//! due, runs at most one at a time, and never surfaces failures to the caller;
//! they are logged and the next trigger tries again.
//!
//! # Guards
//!
//! A trigger proceeds only when all of these hold, checked in order:
//!
//! 1. Auto-backup is enabled in the policy store
//! 2. An account is signed in
//! 3. The last successful backup is older than the cooldown, or absent

pub mod policy;

pub use self::policy::{
    BackupPolicyState, JsonFilePolicyStore, MemoryPolicyStore, PolicyStore,
};

use crate::errors::AppResult;
use crate::remote::IdentityProvider;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// What woke the scheduler up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The app process just started
    ColdStart,
    /// The app came back to the foreground
    Foreground,
}

/// Why a trigger did not start a backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Auto-backup is turned off or was never turned on
    Disabled,
    /// No account is signed in
    NotSignedIn,
    /// A backup succeeded recently; `remaining` is left on the cooldown
    CooldownActive {
        /// Time until the next backup is due
        remaining: Duration,
    },
}

/// Result of evaluating the guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Every guard passed
    Proceed,
    /// A guard failed
    Skip(SkipReason),
}

/// What a trigger ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Another backup was already running; nothing was done
    Busy,
    /// A guard failed
    Skipped(SkipReason),
    /// A backup ran and succeeded
    Completed,
    /// A backup ran and failed; the failure was logged
    Failed,
}

/// The backup the scheduler runs when a trigger proceeds.
#[async_trait]
pub trait BackupRunner: Send + Sync {
    /// Performs one full backup, recording its own policy timestamps.
    async fn run_backup(&self) -> AppResult<()>;
}

/// Decides when to back up and keeps unattended backups single-flight.
pub struct AutoBackupScheduler {
    policy: Arc<dyn PolicyStore>,
    identity: Arc<dyn IdentityProvider>,
    runner: Arc<dyn BackupRunner>,
    cooldown: Duration,
    in_flight: Mutex<()>,
}

impl AutoBackupScheduler {
    /// Creates a scheduler with the given cooldown between successful backups.
    pub fn new(
        policy: Arc<dyn PolicyStore>,
        identity: Arc<dyn IdentityProvider>,
        runner: Arc<dyn BackupRunner>,
        cooldown: Duration,
    ) -> Self {
        Self {
            policy,
            identity,
            runner,
            cooldown,
            in_flight: Mutex::new(()),
        }
    }

    /// Returns true while a scheduled backup is running.
    pub fn is_busy(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    /// Evaluates the guards against `now` without running anything.
    ///
    /// A last-success timestamp in the future (clock moved backwards) counts as
    /// due, so a skewed clock cannot suppress backups indefinitely.
    pub async fn evaluate(&self, now: DateTime<Utc>) -> AppResult<Decision> {
        let state = BackupPolicyState::load(self.policy.as_ref()).await?;

        if !state.auto_backup_enabled {
            return Ok(Decision::Skip(SkipReason::Disabled));
        }
        if !self.identity.is_signed_in().await {
            return Ok(Decision::Skip(SkipReason::NotSignedIn));
        }

        if let Some(last) = state.last_successful_backup {
            if let Ok(elapsed) = now.signed_duration_since(last).to_std() {
                if elapsed < self.cooldown {
                    return Ok(Decision::Skip(SkipReason::CooldownActive {
                        remaining: self.cooldown - elapsed,
                    }));
                }
            }
        }

        Ok(Decision::Proceed)
    }

    /// Handles a lifecycle trigger.
    ///
    /// Returns immediately with `Busy` when another trigger holds the
    /// single-flight guard. Errors never propagate; they are logged and
    /// reported as `Failed`.
    pub async fn on_trigger(&self, trigger: Trigger) -> TriggerOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("Auto-backup already in flight; ignoring {:?}", trigger);
            return TriggerOutcome::Busy;
        };

        let span = info_span!(
            "auto_backup",
            correlation_id = %Uuid::new_v4(),
            trigger = ?trigger
        );
        self.run_guarded(trigger).instrument(span).await
    }

    async fn run_guarded(&self, trigger: Trigger) -> TriggerOutcome {
        match self.evaluate(Utc::now()).await {
            Ok(Decision::Proceed) => {}
            Ok(Decision::Skip(reason)) => {
                debug!("Auto-backup skipped on {:?}: {:?}", trigger, reason);
                return TriggerOutcome::Skipped(reason);
            }
            Err(e) => {
                warn!("Auto-backup policy could not be read: {}", e);
                return TriggerOutcome::Failed;
            }
        }

        info!("Starting auto-backup");
        match self.runner.run_backup().await {
            Ok(()) => {
                info!("Auto-backup completed");
                TriggerOutcome::Completed
            }
            Err(e) => {
                warn!("Auto-backup failed: {}", e);
                TriggerOutcome::Failed
            }
        }
    }
}
