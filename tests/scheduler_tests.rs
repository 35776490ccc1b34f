//! Integration tests for unattended backups driven through `BackupCore`.

mod test_helpers;

use chrono::Utc;
use rentsync::scheduler::{policy, BackupPolicyState, PolicyStore, SkipReason};
use rentsync::{Trigger, TriggerOutcome};
use test_helpers::TestEnv;

#[tokio::test]
async fn test_first_trigger_backs_up_and_records_timestamps() {
    let env = TestEnv::new();
    env.write_database(b"rent roll");
    policy::set_auto_backup_enabled(env.policy.as_ref(), true)
        .await
        .unwrap();

    let before = Utc::now();
    let outcome = env.core.scheduler().on_trigger(Trigger::ColdStart).await;

    assert_eq!(outcome, TriggerOutcome::Completed);
    assert_eq!(env.remote.object_count(), 1);

    let state = BackupPolicyState::load(env.policy.as_ref()).await.unwrap();
    let last = state.last_successful_backup.expect("success recorded");
    assert!(last >= before - chrono::Duration::milliseconds(1));
    assert_eq!(state.last_sync_time, Some(last));
    assert!(state.last_backup_attempt.is_some());
    assert!(state.account_linked);
}

#[tokio::test]
async fn test_second_trigger_within_cooldown_is_skipped() {
    let env = TestEnv::new();
    env.write_database(b"rent roll");
    policy::set_auto_backup_enabled(env.policy.as_ref(), true)
        .await
        .unwrap();

    let scheduler = env.core.scheduler();
    assert_eq!(
        scheduler.on_trigger(Trigger::ColdStart).await,
        TriggerOutcome::Completed
    );
    let outcome = scheduler.on_trigger(Trigger::Foreground).await;

    assert!(matches!(
        outcome,
        TriggerOutcome::Skipped(SkipReason::CooldownActive { .. })
    ));
    assert_eq!(env.remote.upload_count(), 1);
}

#[tokio::test]
async fn test_manual_backup_resets_cooldown() {
    let env = TestEnv::new();
    env.write_database(b"rent roll");
    policy::set_auto_backup_enabled(env.policy.as_ref(), true)
        .await
        .unwrap();

    env.core.upload_backup().await.unwrap();
    let outcome = env.core.scheduler().on_trigger(Trigger::Foreground).await;

    assert!(matches!(
        outcome,
        TriggerOutcome::Skipped(SkipReason::CooldownActive { .. })
    ));
}

#[tokio::test]
async fn test_failed_backup_records_attempt_only() {
    let env = TestEnv::new();
    policy::set_auto_backup_enabled(env.policy.as_ref(), true)
        .await
        .unwrap();

    // No database yet, so the build fails.
    let outcome = env.core.scheduler().on_trigger(Trigger::ColdStart).await;

    assert_eq!(outcome, TriggerOutcome::Failed);
    let state = BackupPolicyState::load(env.policy.as_ref()).await.unwrap();
    assert!(state.last_backup_attempt.is_some());
    assert_eq!(state.last_successful_backup, None);
    assert_eq!(state.last_sync_time, None);
    assert!(!env.core.scheduler().is_busy());
}

#[tokio::test]
async fn test_disabled_by_default() {
    let env = TestEnv::new();
    env.write_database(b"rent roll");

    let outcome = env.core.scheduler().on_trigger(Trigger::ColdStart).await;

    assert_eq!(outcome, TriggerOutcome::Skipped(SkipReason::Disabled));
    assert_eq!(env.remote.upload_count(), 0);
    assert_eq!(
        env.policy
            .get(rentsync::constants::KEY_LAST_BACKUP_ATTEMPT)
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn test_signed_out_is_skipped() {
    let env = TestEnv::new();
    env.write_database(b"rent roll");
    policy::set_auto_backup_enabled(env.policy.as_ref(), true)
        .await
        .unwrap();
    env.session.sign_out();

    let outcome = env.core.scheduler().on_trigger(Trigger::Foreground).await;

    assert_eq!(outcome, TriggerOutcome::Skipped(SkipReason::NotSignedIn));
    assert_eq!(env.remote.upload_count(), 0);
}
