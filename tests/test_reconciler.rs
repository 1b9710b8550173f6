mod common;

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{PLAYER, StubContract, StubState, utc3};
use fheguess::clock::{GamePhase, ManualClock};
use fheguess::contract::{ContractEvent, GameContract};
use fheguess::error::{ActionError, RefreshError};
use fheguess::gate::{Action, ActionKind, GateDenial};
use fheguess::observability::EventEmitter;
use fheguess::reconciler::Reconciler;
use tokio::sync::mpsc;

fn setup(state: StubState, hour: u32) -> (Arc<StubContract>, Arc<ManualClock>, Arc<Reconciler>) {
    let contract = Arc::new(StubContract::new(state, Some(PLAYER)));
    let clock = Arc::new(ManualClock::new(utc3(hour, 15, 0)));
    let reconciler = Arc::new(Reconciler::new(
        Arc::clone(&contract) as Arc<dyn GameContract>,
        Arc::clone(&clock) as Arc<dyn fheguess::clock::Clock>,
        Some(PLAYER),
    ));
    (contract, clock, reconciler)
}

async fn settle(mut done: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if done() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn lines(&self) -> Vec<serde_json::Value> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

// ============================================================================
// refresh
// ============================================================================

#[tokio::test]
async fn refresh_twice_without_remote_change_is_value_equal() {
    let (contract, _, reconciler) = setup(StubState::guessing(), 13);

    let first = reconciler.refresh().await.unwrap();
    let second = reconciler.refresh().await.unwrap();

    assert_eq!(*first, *second);
    assert_eq!(contract.reads(), 2);
    assert_eq!(reconciler.view().sequence, 2);
    assert_eq!(reconciler.snapshot().as_deref(), Some(&*first));
}

#[tokio::test]
async fn refresh_replaces_snapshot_wholesale() {
    let (contract, _, reconciler) = setup(StubState::guessing(), 13);
    reconciler.refresh().await.unwrap();

    contract.update(|s| {
        s.round.player_count = 7;
        s.flags.guess_active = false;
    });
    let snapshot = reconciler.refresh().await.unwrap();

    assert_eq!(snapshot.round.player_count, 7);
    assert!(!snapshot.flags.guess_active);
    assert_eq!(snapshot.player.map(|p| p.has_guessed), Some(false));
}

#[tokio::test]
async fn failed_refresh_keeps_previous_snapshot() {
    let (contract, _, reconciler) = setup(StubState::guessing(), 13);
    let before = reconciler.refresh().await.unwrap();
    let view_before = reconciler.view();

    contract.update(|s| {
        s.round.player_count = 3;
        s.fail_reads = Some("connection reset".into());
    });
    let err = reconciler.refresh().await.unwrap_err();

    assert!(matches!(err, RefreshError::Remote(_)));
    assert_eq!(reconciler.snapshot().as_deref(), Some(&*before));
    assert_eq!(reconciler.view(), view_before);

    contract.update(|s| s.fail_reads = None);
    assert_eq!(reconciler.refresh().await.unwrap().round.player_count, 3);
}

#[tokio::test]
async fn player_status_is_skipped_without_account() {
    let contract = Arc::new(StubContract::new(StubState::guessing(), None));
    let reconciler = Reconciler::new(
        Arc::clone(&contract) as Arc<dyn GameContract>,
        Arc::new(ManualClock::new(utc3(13, 0, 0))),
        None,
    );
    let snapshot = reconciler.refresh().await.unwrap();
    assert!(snapshot.player.is_none());
    assert!(reconciler.permitted().is_empty());
}

#[tokio::test]
async fn slower_older_refresh_never_overwrites_newer_snapshot() {
    let (contract, _, reconciler) = setup(StubState::guessing(), 13);

    let gate = contract.hold_reads();
    let slow = tokio::spawn({
        let reconciler = Arc::clone(&reconciler);
        async move { reconciler.refresh().await }
    });
    settle(|| contract.reads() == 1).await;
    contract.stop_holding_reads();

    contract.update(|s| s.round.player_count = 5);
    let fresh = reconciler.refresh().await.unwrap();
    assert_eq!(fresh.round.player_count, 5);

    contract.update(|s| s.round.player_count = 9);
    gate.notify_waiters();
    let late = slow.await.unwrap().unwrap();

    assert_eq!(late.round.player_count, 5);
    assert_eq!(reconciler.snapshot().unwrap().round.player_count, 5);
    assert_eq!(reconciler.view().sequence, 2);
}

// ============================================================================
// submit
// ============================================================================

#[tokio::test]
async fn accepted_guess_is_visible_before_next_tick() {
    let (contract, _, reconciler) = setup(StubState::guessing(), 13);
    reconciler.refresh().await.unwrap();
    let reads_before = contract.reads();

    let accepted = reconciler.submit(Action::SubmitGuess(42)).await.unwrap();

    assert_eq!(accepted.action, Action::SubmitGuess(42));
    assert!(accepted.receipt.status);
    assert!(accepted.snapshot.as_ref().unwrap().has_guessed());
    assert!(reconciler.snapshot().unwrap().has_guessed());
    assert_eq!(reconciler.snapshot().unwrap().round.player_count, 1);
    assert_eq!(contract.reads(), reads_before + 1);
    assert_eq!(contract.writes(), 1);
}

#[tokio::test]
async fn out_of_range_guess_is_rejected_remotely_without_touching_player() {
    let (contract, _, reconciler) = setup(StubState::guessing(), 13);
    let before = reconciler.refresh().await.unwrap();

    let err = reconciler.submit(Action::SubmitGuess(101)).await.unwrap_err();

    match err {
        ActionError::RemoteRejected(reason) => assert_eq!(reason, "out of range"),
        other => panic!("expected RemoteRejected, got {other:?}"),
    }
    assert_eq!(contract.writes(), 1);
    let after = reconciler.snapshot().unwrap();
    assert_eq!(after.player, before.player);
    assert!(!after.has_guessed());
}

#[tokio::test]
async fn second_submit_while_pending_fails_without_remote_call() {
    let (contract, _, reconciler) = setup(StubState::guessing(), 13);
    reconciler.refresh().await.unwrap();

    let release = contract.hold_writes();
    let first = tokio::spawn({
        let reconciler = Arc::clone(&reconciler);
        async move { reconciler.submit(Action::SubmitGuess(7)).await }
    });
    settle(|| contract.writes() == 1).await;
    assert!(reconciler.action_in_flight());

    let err = reconciler.submit(Action::SubmitGuess(8)).await.unwrap_err();
    assert!(matches!(err, ActionError::AlreadyInProgress));
    let err = reconciler.submit(Action::StartRound).await.unwrap_err();
    assert!(matches!(err, ActionError::AlreadyInProgress));
    assert_eq!(contract.writes(), 1);

    release.notify_one();
    first.await.unwrap().unwrap();
    assert!(!reconciler.action_in_flight());
}

#[tokio::test]
async fn refresh_runs_while_submit_is_pending() {
    let (contract, _, reconciler) = setup(StubState::guessing(), 13);
    reconciler.refresh().await.unwrap();

    let release = contract.hold_writes();
    let pending = tokio::spawn({
        let reconciler = Arc::clone(&reconciler);
        async move { reconciler.submit(Action::SubmitGuess(7)).await }
    });
    settle(|| reconciler.action_in_flight() && contract.writes() == 1).await;

    contract.update(|s| s.round.player_count = 4);
    let snapshot = reconciler.refresh().await.unwrap();
    assert_eq!(snapshot.round.player_count, 4);
    assert!(reconciler.action_in_flight());

    release.notify_one();
    pending.await.unwrap().unwrap();
}

#[tokio::test]
async fn guard_is_released_after_rejection() {
    let (contract, _, reconciler) = setup(StubState::guessing(), 13);
    reconciler.refresh().await.unwrap();

    tokio_test::assert_err!(reconciler.submit(Action::SubmitGuess(101)).await);
    assert!(!reconciler.action_in_flight());
    tokio_test::assert_ok!(reconciler.submit(Action::SubmitGuess(50)).await);
    assert_eq!(contract.writes(), 2);
}

#[tokio::test]
async fn gate_denials_never_reach_the_contract() {
    let (contract, clock, reconciler) = setup(StubState::guessing(), 13);

    let err = reconciler.submit(Action::SubmitGuess(1)).await.unwrap_err();
    assert!(matches!(
        err,
        ActionError::NotPermittedLocally {
            reason: GateDenial::StateNotLoaded,
            ..
        }
    ));

    reconciler.refresh().await.unwrap();
    clock.set(utc3(14, 0, 5));
    let err = reconciler.submit(Action::SubmitGuess(1)).await.unwrap_err();
    match err {
        ActionError::NotPermittedLocally { action, reason } => {
            assert_eq!(action, ActionKind::SubmitGuess);
            assert_eq!(
                reason,
                GateDenial::WrongWindow {
                    required: GamePhase::OddRoundWindow
                }
            );
        }
        other => panic!("expected NotPermittedLocally, got {other:?}"),
    }
    assert!(err_is_local(&reconciler.submit(Action::StartRound).await));
    assert_eq!(contract.writes(), 0);
}

fn err_is_local<T>(result: &Result<T, ActionError>) -> bool {
    result.as_ref().err().is_some_and(ActionError::is_local)
}

#[tokio::test]
async fn duplicate_guess_is_refused_locally() {
    let (contract, _, reconciler) = setup(StubState::guessing(), 13);
    reconciler.refresh().await.unwrap();
    reconciler.submit(Action::SubmitGuess(10)).await.unwrap();

    let err = reconciler.submit(Action::SubmitGuess(11)).await.unwrap_err();
    assert!(matches!(
        err,
        ActionError::NotPermittedLocally {
            reason: GateDenial::AlreadyGuessed,
            ..
        }
    ));
    assert_eq!(contract.writes(), 1);
}

#[tokio::test]
async fn write_transport_failure_is_not_a_rejection() {
    let (contract, _, reconciler) = setup(StubState::guessing(), 13);
    reconciler.refresh().await.unwrap();
    contract.update(|s| s.fail_writes = Some("request declined in wallet".into()));

    let err = reconciler.submit(Action::SubmitGuess(3)).await.unwrap_err();
    match err {
        ActionError::TransportFailed(detail) => assert!(detail.contains("declined")),
        other => panic!("expected TransportFailed, got {other:?}"),
    }
    assert!(!reconciler.snapshot().unwrap().has_guessed());
}

#[tokio::test]
async fn accepted_stays_accepted_when_follow_up_refresh_fails() {
    let (contract, _, reconciler) = setup(StubState::guessing(), 13);
    reconciler.refresh().await.unwrap();

    let release = contract.hold_writes();
    let pending = tokio::spawn({
        let reconciler = Arc::clone(&reconciler);
        async move { reconciler.submit(Action::SubmitGuess(9)).await }
    });
    settle(|| contract.writes() == 1).await;
    contract.update(|s| s.fail_reads = Some("node down".into()));
    release.notify_one();

    let accepted = pending.await.unwrap().unwrap();
    assert!(accepted.snapshot.is_none());
    assert!(!reconciler.snapshot().unwrap().has_guessed());
}

#[tokio::test]
async fn round_lifecycle_start_then_reveal() {
    let (contract, clock, reconciler) = setup(StubState::fresh(), 13);
    reconciler.refresh().await.unwrap();
    assert!(reconciler.permitted().start_round);

    let accepted = reconciler.submit(Action::StartRound).await.unwrap();
    assert!(accepted.snapshot.unwrap().round.is_open());
    assert!(!reconciler.permitted().start_round);
    assert!(reconciler.permitted().submit_guess);

    clock.set(utc3(14, 0, 0));
    contract.update(|s| {
        s.flags.odd_hour = false;
        s.flags.even_hour = true;
        s.flags.guess_active = false;
        s.flags.reveal_active = true;
    });
    reconciler.refresh().await.unwrap();
    let permitted = reconciler.permitted();
    assert!(permitted.reveal_result);
    assert!(!permitted.submit_guess);

    reconciler.submit(Action::RevealResult).await.unwrap();
    assert!(reconciler.snapshot().unwrap().round.round_ended);
    assert!(reconciler.permitted().is_empty());
}

#[tokio::test]
async fn start_round_offered_at_thirteen_hundred_without_secret() {
    let (_, clock, reconciler) = setup(StubState::fresh(), 13);
    clock.set(utc3(13, 0, 0));
    reconciler.refresh().await.unwrap();

    assert_eq!(reconciler.reading().phase, GamePhase::OddRoundWindow);
    let permitted = reconciler.permitted();
    assert!(permitted.start_round);
    assert!(!permitted.reveal_result);
}

#[tokio::test]
async fn reveal_offered_at_fourteen_hundred_for_open_round() {
    let (_, clock, reconciler) = setup(StubState::revealing(), 14);
    clock.set(utc3(14, 0, 0));
    reconciler.refresh().await.unwrap();

    assert_eq!(reconciler.reading().phase, GamePhase::EvenRevealWindow);
    let permitted = reconciler.permitted();
    assert!(permitted.reveal_result);
    assert!(!permitted.submit_guess);
    assert!(!permitted.start_round);
}

#[tokio::test]
async fn phase_is_rederived_after_clock_jump() {
    let (_, clock, reconciler) = setup(StubState::guessing(), 13);
    reconciler.refresh().await.unwrap();
    assert!(reconciler.permitted().submit_guess);

    // A suspended process resuming past the boundary sees the new window at once.
    clock.set(utc3(16, 30, 0));
    assert_eq!(reconciler.reading().phase, GamePhase::EvenRevealWindow);
    assert!(!reconciler.permitted().submit_guess);
}

// ============================================================================
// Scheduling and teardown
// ============================================================================

#[tokio::test(start_paused = true)]
async fn poll_loop_refreshes_every_period_until_shutdown() {
    let (contract, _, reconciler) = setup(StubState::guessing(), 13);

    let handle = reconciler.start(Duration::from_secs(1), None);
    tokio::time::sleep(Duration::from_millis(3500)).await;
    let reads = contract.reads();
    assert!((3..=5).contains(&reads), "unexpected read count {reads}");

    reconciler.shutdown();
    handle.await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(contract.reads(), reads);
    assert!(reconciler.is_shut_down());
}

#[tokio::test(start_paused = true)]
async fn contract_events_trigger_an_immediate_refresh() {
    let (contract, _, reconciler) = setup(StubState::guessing(), 13);
    let (tx, rx) = mpsc::channel(4);

    let handle = reconciler.start(Duration::from_secs(3600), Some(rx));
    settle(|| contract.reads() == 1).await;

    contract.update(|s| s.round.player_count = 2);
    tx.send(ContractEvent::GuessSubmitted {
        player: PLAYER,
        round: 1,
    })
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(contract.reads(), 2);
    assert_eq!(reconciler.snapshot().unwrap().round.player_count, 2);

    drop(tx);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!handle.is_finished(), "closed event channel must not stop polling");

    reconciler.shutdown();
    handle.await.unwrap();
}

#[tokio::test]
async fn results_arriving_after_shutdown_are_discarded() {
    let (contract, _, reconciler) = setup(StubState::guessing(), 13);

    let gate = contract.hold_reads();
    let pending = tokio::spawn({
        let reconciler = Arc::clone(&reconciler);
        async move { reconciler.refresh().await }
    });
    settle(|| contract.reads() == 1).await;

    reconciler.shutdown();
    contract.stop_holding_reads();
    gate.notify_waiters();

    assert!(matches!(
        pending.await.unwrap(),
        Err(RefreshError::Cancelled)
    ));
    assert!(reconciler.snapshot().is_none());
    assert!(matches!(
        reconciler.refresh().await,
        Err(RefreshError::Cancelled)
    ));
}

#[tokio::test]
async fn pending_action_is_cancelled_by_shutdown() {
    let (contract, _, reconciler) = setup(StubState::guessing(), 13);
    reconciler.refresh().await.unwrap();

    let _release = contract.hold_writes();
    let pending = tokio::spawn({
        let reconciler = Arc::clone(&reconciler);
        async move { reconciler.submit(Action::SubmitGuess(5)).await }
    });
    settle(|| contract.writes() == 1).await;

    reconciler.shutdown();
    assert!(matches!(
        pending.await.unwrap(),
        Err(ActionError::Cancelled)
    ));
    assert!(!reconciler.snapshot().unwrap().has_guessed());
}

#[tokio::test]
async fn emits_structured_events() {
    let captured = Captured::default();
    let contract = Arc::new(StubContract::new(StubState::guessing(), Some(PLAYER)));
    let reconciler = Reconciler::new(
        Arc::clone(&contract) as Arc<dyn GameContract>,
        Arc::new(ManualClock::new(utc3(13, 0, 0))),
        Some(PLAYER),
    )
    .with_event_emitter(Arc::new(EventEmitter::new(Box::new(captured.clone()))));

    reconciler.refresh().await.unwrap();
    reconciler.refresh().await.unwrap();
    reconciler.submit(Action::SubmitGuess(101)).await.unwrap_err();

    let types: Vec<String> = captured
        .lines()
        .iter()
        .map(|e| e["type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        types,
        vec!["SnapshotRefreshed", "ActionSubmitted", "ActionCompleted"]
    );
    let completed = &captured.lines()[2];
    assert_eq!(completed["outcome"], "remote_rejected");
    assert_eq!(completed["detail"], "out of range");
}
