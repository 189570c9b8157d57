//! State machine, scheduler and sweep behaviour against a real SQLite store
//! and a scripted executor.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use audnet_access::{AccessError, AccessService};
use audnet_core::access::AccessState;
use audnet_core::actions::ActionKind;
use audnet_core::error::CoreError;
use audnet_db::models::room_access::RoomAccessRecord;
use audnet_db::repositories::RoomAccessRepo;
use audnet_executor::testing::ScriptedExecutor;
use audnet_executor::ActionError;
use chrono::Utc;
use sqlx::SqlitePool;

const ROSTER: &[i64] = &[11, 14, 15, 103];

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn setup(pool: &SqlitePool) -> (AccessService, Arc<ScriptedExecutor>) {
    let executor = Arc::new(ScriptedExecutor::new());
    let service = AccessService::new(pool.clone(), executor.clone());
    service.start(ROSTER).await.expect("startup should succeed");
    (service, executor)
}

async fn record(pool: &SqlitePool, room: i64) -> RoomAccessRecord {
    RoomAccessRepo::find(pool, room)
        .await
        .unwrap()
        .unwrap_or_else(|| panic!("room {room} should have a record"))
}

fn millis(ms: i64) -> chrono::Duration {
    chrono::Duration::milliseconds(ms)
}

/// Poll `check` every 25ms until it returns true or `limit` elapses.
async fn eventually<F, Fut>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    check().await
}

async fn is_unlocked(pool: &SqlitePool, room: i64) -> bool {
    record(pool, room).await.is_network_on
}

// ---------------------------------------------------------------------------
// Lock
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_lock_is_reflected_in_status(pool: SqlitePool) {
    let (service, executor) = setup(&pool).await;

    let before = Utc::now();
    let locked = service.lock(14, 30).await.unwrap();

    assert!(!locked.is_network_on);
    let unlock_time = locked.unlock_time.expect("unlock time should be set");
    let expected = before + chrono::Duration::minutes(30);
    assert!((unlock_time - expected).num_seconds().abs() <= 2);

    let status = service.status().await.unwrap();
    let room_14 = status.iter().find(|r| r.room_number == 14).unwrap();
    assert_eq!(room_14.state(), AccessState::LockedPendingAutoUnlock);
    assert_eq!(room_14.unlock_time, Some(unlock_time));

    assert_eq!(service.scheduled_unlock(14).await, Some(unlock_time));
    assert_eq!(executor.count(ActionKind::ApplyBlock, 14), 1);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_lock_rejects_invalid_duration(pool: SqlitePool) {
    let (service, executor) = setup(&pool).await;

    let err = service.lock(14, 0).await.unwrap_err();
    assert_matches!(err, AccessError::Core(CoreError::Validation(_)));
    assert!(executor.calls().is_empty(), "no action may run for invalid input");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_lock_failure_leaves_store_untouched(pool: SqlitePool) {
    let (service, executor) = setup(&pool).await;
    executor.fail(ActionKind::ApplyBlock);

    let err = service.lock(14, 30).await.unwrap_err();
    assert_matches!(err, AccessError::Action(ActionError::Failed { .. }));

    let room_14 = record(&pool, 14).await;
    assert!(room_14.is_network_on);
    assert!(room_14.unlock_time.is_none());
    assert!(service.pending().await.is_empty());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_lock_missing_playbook_is_not_found(pool: SqlitePool) {
    let (service, executor) = setup(&pool).await;
    executor.fail_not_found(ActionKind::ApplyBlock);

    let err = service.lock(14, 30).await.unwrap_err();
    assert_matches!(err, AccessError::Action(ActionError::NotFound { .. }));
    assert!(is_unlocked(&pool, 14).await);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_lock_unknown_room_creates_record(pool: SqlitePool) {
    let (service, _executor) = setup(&pool).await;

    service.lock(500, 10).await.unwrap();

    let room_500 = record(&pool, 500).await;
    assert_eq!(room_500.state(), AccessState::LockedPendingAutoUnlock);
}

// ---------------------------------------------------------------------------
// Unlock
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_unlock_cancels_pending_task(pool: SqlitePool) {
    let (service, executor) = setup(&pool).await;

    service.lock_for(14, millis(300)).await.unwrap();
    let unlocked = service.unlock(14).await.unwrap().unwrap();

    assert!(unlocked.is_network_on);
    assert!(unlocked.unlock_time.is_none());
    assert!(service.pending().await.is_empty());

    // Well past the scheduled deadline, the cancelled task must not have run.
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(executor.count(ActionKind::RemoveBlock, 14), 1, "only the manual unlock");
    let room_14 = record(&pool, 14).await;
    assert!(room_14.is_network_on);
    assert!(room_14.unlock_time.is_none());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_unlock_is_idempotent(pool: SqlitePool) {
    let (service, executor) = setup(&pool).await;

    assert!(service.unlock(11).await.unwrap().unwrap().is_network_on);
    assert!(service.unlock(11).await.unwrap().unwrap().is_network_on);

    assert_eq!(executor.count(ActionKind::RemoveBlock, 11), 2);
    let records = service.status().await.unwrap();
    assert_eq!(records.len(), ROSTER.len(), "unlock must not create rows");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_unlock_unknown_room_is_not_an_error(pool: SqlitePool) {
    let (service, _executor) = setup(&pool).await;

    let result = service.unlock(999).await.unwrap();
    assert!(result.is_none());
    assert!(RoomAccessRepo::find(&pool, 999).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_unlock_failure_keeps_lock_and_schedule(pool: SqlitePool) {
    let (service, executor) = setup(&pool).await;

    service.lock(14, 30).await.unwrap();
    executor.fail(ActionKind::RemoveBlock);

    let err = service.unlock(14).await.unwrap_err();
    assert_matches!(err, AccessError::Action(ActionError::Failed { .. }));

    let room_14 = record(&pool, 14).await;
    assert_eq!(room_14.state(), AccessState::LockedPendingAutoUnlock);
    assert_eq!(service.pending().await.len(), 1);
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_room_14_unlocks_automatically(pool: SqlitePool) {
    let (service, executor) = setup(&pool).await;

    let locked = service.lock_for(14, millis(400)).await.unwrap();
    assert!(!locked.is_network_on);
    assert!(locked.unlock_time.is_some());

    assert!(
        eventually(Duration::from_secs(5), || is_unlocked(&pool, 14)).await,
        "room 14 should unlock once its time passes"
    );

    let room_14 = record(&pool, 14).await;
    assert!(room_14.unlock_time.is_none());
    assert_eq!(executor.count(ActionKind::RemoveBlock, 14), 1);
    assert!(
        eventually(Duration::from_secs(1), || async { service.pending().await.is_empty() }).await
    );
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_relock_supersedes_previous_schedule(pool: SqlitePool) {
    let (service, executor) = setup(&pool).await;

    service.lock(14, 60).await.unwrap();
    let second = service.lock_for(14, millis(300)).await.unwrap();

    let pending = service.pending().await;
    assert_eq!(pending.len(), 1, "exactly one live task per room");
    assert_eq!(Some(pending[0].fire_at), second.unlock_time);

    assert!(eventually(Duration::from_secs(5), || is_unlocked(&pool, 14)).await);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(executor.count(ActionKind::RemoveBlock, 14), 1);
    assert_eq!(executor.count(ActionKind::ApplyBlock, 14), 2);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_failed_automatic_unlock_leaves_room_locked(pool: SqlitePool) {
    let (service, executor) = setup(&pool).await;
    executor.fail(ActionKind::RemoveBlock);

    service.lock_for(14, millis(200)).await.unwrap();

    assert!(
        eventually(Duration::from_secs(5), || async {
            executor.count(ActionKind::RemoveBlock, 14) == 1
        })
        .await
    );
    tokio::time::sleep(Duration::from_millis(100)).await;

    let room_14 = record(&pool, 14).await;
    assert!(!room_14.is_network_on, "failed unlock must not claim the room is open");
    assert!(room_14.unlock_time.is_some());
    assert_eq!(executor.count(ActionKind::RemoveBlock, 14), 1, "no retry");
    assert!(service.pending().await.is_empty());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_shutdown_drains_pending_tasks(pool: SqlitePool) {
    let (service, executor) = setup(&pool).await;

    for room in [11, 14, 15] {
        service.lock_for(room, millis(300)).await.unwrap();
    }
    assert_eq!(service.pending().await.len(), 3);

    let report = service.shutdown(Duration::from_secs(5)).await;
    assert_eq!(report.cancelled, 3);
    assert!(report.unsettled.is_empty());

    tokio::time::sleep(Duration::from_millis(600)).await;
    for room in [11, 14, 15] {
        assert_eq!(executor.count(ActionKind::RemoveBlock, room), 0);
        // The persisted time survives so the next start can re-arm it.
        assert_eq!(record(&pool, room).await.state(), AccessState::LockedPendingAutoUnlock);
    }

    let err = service.lock(103, 10).await.unwrap_err();
    assert_matches!(err, AccessError::ShuttingDown);
    assert_eq!(executor.count(ActionKind::ApplyBlock, 103), 0);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_lock_in_flight_when_shutdown_begins_still_succeeds(pool: SqlitePool) {
    let (service, executor) = setup(&pool).await;
    executor.set_latency(Duration::from_millis(200));

    let lock = {
        let service = service.clone();
        tokio::spawn(async move { service.lock(14, 30).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    service.shutdown(Duration::from_secs(5)).await;

    // The block was applied, so the caller must learn about it.
    let locked = lock.await.unwrap().expect("applied lock must be reported");
    assert!(!locked.is_network_on);
    assert_eq!(executor.count(ActionKind::ApplyBlock, 14), 1);
    assert_eq!(record(&pool, 14).await.state(), AccessState::LockedPendingAutoUnlock);
    // No live task; the next start re-arms the persisted time.
    assert!(service.pending().await.is_empty());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_lock_waiting_for_room_when_shutdown_begins_is_refused(pool: SqlitePool) {
    let (service, executor) = setup(&pool).await;
    executor.set_latency(Duration::from_millis(200));

    // Holds room 14 while the lock below waits for it.
    let unlock = {
        let service = service.clone();
        tokio::spawn(async move { service.unlock(14).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let lock = {
        let service = service.clone();
        tokio::spawn(async move { service.lock(14, 30).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    service.shutdown(Duration::from_secs(5)).await;

    unlock.await.unwrap().unwrap();
    let err = lock.await.unwrap().unwrap_err();
    assert_matches!(err, AccessError::ShuttingDown);
    assert_eq!(executor.count(ActionKind::ApplyBlock, 14), 0);
    assert!(is_unlocked(&pool, 14).await);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_start_rearms_persisted_unlocks(pool: SqlitePool) {
    RoomAccessRepo::seed_roster(&pool, ROSTER).await.unwrap();
    RoomAccessRepo::upsert_locked(&pool, 14, Some(Utc::now() - chrono::Duration::minutes(5)))
        .await
        .unwrap();
    let later = Utc::now() + chrono::Duration::hours(1);
    RoomAccessRepo::upsert_locked(&pool, 15, Some(later)).await.unwrap();
    RoomAccessRepo::upsert_locked(&pool, 103, None).await.unwrap();

    let executor = Arc::new(ScriptedExecutor::new());
    let service = AccessService::new(pool.clone(), executor.clone());
    let report = service.start(ROSTER).await.unwrap();

    assert_eq!(report.seeded, 0);
    assert_eq!(report.rearmed, 2);

    // Past due: fires immediately.
    assert!(eventually(Duration::from_secs(5), || is_unlocked(&pool, 14)).await);
    assert_eq!(service.scheduled_unlock(15).await, Some(later));
    // Indefinite lock is not touched.
    assert_eq!(record(&pool, 103).await.state(), AccessState::LockedNoSchedule);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_concurrent_lock_and_unlock_end_in_a_full_state(pool: SqlitePool) {
    let (service, executor) = setup(&pool).await;
    executor.set_latency(Duration::from_millis(50));

    let lock = {
        let service = service.clone();
        tokio::spawn(async move { service.lock(14, 30).await })
    };
    let unlock = {
        let service = service.clone();
        tokio::spawn(async move { service.unlock(14).await })
    };
    lock.await.unwrap().unwrap();
    unlock.await.unwrap().unwrap();

    let room_14 = record(&pool, 14).await;
    let scheduled = service.scheduled_unlock(14).await;
    match room_14.state() {
        AccessState::Unlocked => {
            assert!(room_14.unlock_time.is_none());
            assert!(scheduled.is_none(), "unlock won: no task may survive");
        }
        AccessState::LockedPendingAutoUnlock => {
            assert_eq!(scheduled, room_14.unlock_time, "lock won: its task is live");
        }
        AccessState::LockedNoSchedule => panic!("hybrid state after concurrent lock/unlock"),
    }
}

// ---------------------------------------------------------------------------
// Configure
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_configure_passes_parameters_and_skips_store(pool: SqlitePool) {
    let (service, executor) = setup(&pool).await;

    let output = service.configure(103, 2, "present").await.unwrap();
    assert!(output.contains("generic-configure"));

    let calls = executor.calls();
    let (kind, params) = calls.last().unwrap();
    assert_eq!(*kind, ActionKind::Configure);
    assert_eq!(params.to_extra_vars(), "auditorium_number=103 class=2 state=present");

    assert!(is_unlocked(&pool, 103).await);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_configure_rejects_unsafe_state(pool: SqlitePool) {
    let (service, executor) = setup(&pool).await;

    let err = service.configure(103, 2, "present; reboot").await.unwrap_err();
    assert_matches!(err, AccessError::Core(CoreError::Validation(_)));
    let err = service.configure(103, -1, "present").await.unwrap_err();
    assert_matches!(err, AccessError::Core(CoreError::Validation(_)));
    assert!(executor.calls().is_empty());
}

// ---------------------------------------------------------------------------
// Network check
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_check_network_queries_one_room_and_skips_store(pool: SqlitePool) {
    let (service, executor) = setup(&pool).await;
    service.lock(14, 30).await.unwrap();
    executor.set_blocked_rooms(vec![14]);

    let output = service.check_network(14).await.unwrap();
    assert_eq!(output, "blocked_rooms: 14");

    let calls = executor.calls();
    let (kind, params) = calls.last().unwrap();
    assert_eq!(*kind, ActionKind::QueryStatus);
    assert_eq!(params.to_extra_vars(), "auditorium_number=14");

    // Read-only: the lock and its task are untouched.
    let room_14 = record(&pool, 14).await;
    assert_eq!(room_14.state(), AccessState::LockedPendingAutoUnlock);
    assert_eq!(service.scheduled_unlock(14).await, room_14.unlock_time);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_check_network_errors(pool: SqlitePool) {
    let (service, executor) = setup(&pool).await;

    let err = service.check_network(0).await.unwrap_err();
    assert_matches!(err, AccessError::Core(CoreError::Validation(_)));
    assert!(executor.calls().is_empty());

    executor.fail_not_found(ActionKind::QueryStatus);
    let err = service.check_network(14).await.unwrap_err();
    assert_matches!(
        err,
        AccessError::Action(ActionError::NotFound { action: ActionKind::QueryStatus, .. })
    );
}

// ---------------------------------------------------------------------------
// Reconciliation sweep
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_sweep_restores_externally_blocked_room(pool: SqlitePool) {
    let (service, executor) = setup(&pool).await;
    executor.set_blocked_rooms(vec![103]);

    let report = service.check_and_restore().await.unwrap();

    assert_eq!(report.restored, vec![103]);
    assert!(report.failed.is_empty());
    assert_eq!(executor.count(ActionKind::RemoveBlock, 103), 1);
    let room_103 = record(&pool, 103).await;
    assert!(room_103.is_network_on);
    assert!(room_103.unlock_time.is_none());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_sweep_with_nothing_blocked(pool: SqlitePool) {
    let (service, executor) = setup(&pool).await;

    let report = service.check_and_restore().await.unwrap();

    assert!(report.restored.is_empty());
    assert_eq!(executor.calls().len(), 1, "only the status query runs");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_sweep_clears_stale_lock_and_its_task(pool: SqlitePool) {
    let (service, executor) = setup(&pool).await;
    service.lock(14, 60).await.unwrap();
    executor.set_blocked_rooms(vec![14]);

    let report = service.check_and_restore().await.unwrap();

    assert_eq!(report.restored, vec![14]);
    assert!(service.pending().await.is_empty());
    assert_eq!(record(&pool, 14).await.state(), AccessState::Unlocked);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_sweep_reports_rooms_it_could_not_restore(pool: SqlitePool) {
    let (service, executor) = setup(&pool).await;
    service.lock(11, 60).await.unwrap();
    executor.set_blocked_rooms(vec![11, 15]);
    executor.fail(ActionKind::RemoveBlock);

    let report = service.check_and_restore().await.unwrap();

    assert!(report.restored.is_empty());
    assert_eq!(report.failed, vec![11, 15]);
    assert_eq!(record(&pool, 11).await.state(), AccessState::LockedPendingAutoUnlock);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_sweep_fails_when_status_query_fails(pool: SqlitePool) {
    let (service, executor) = setup(&pool).await;
    executor.fail(ActionKind::QueryStatus);

    let err = service.check_and_restore().await.unwrap_err();
    assert_matches!(
        err,
        AccessError::Action(ActionError::Failed { action: ActionKind::QueryStatus, .. })
    );
}
