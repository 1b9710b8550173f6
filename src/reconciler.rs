//! State reconciler.
//!
//! Keeps a local [`GameSnapshot`] consistent with the contract and forwards
//! player actions to it. Two stimuli drive it: a fixed-period poll tick and
//! user actions. Reads may overlap freely; at most one action is in flight
//! per client, and a second one fails immediately instead of queueing.
//!
//! The view lives in a `watch` channel with the reconciler as its only
//! writer. Each refresh replaces the snapshot wholesale, and only if its
//! sequence number is newer than the last applied one, so a slow refresh
//! can never overwrite a fresher result. After [`Reconciler::shutdown`]
//! every late result is discarded instead of applied.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::{Clock, ClockReading};
use crate::contract::{ContractEvent, GameContract};
use crate::error::{ActionError, ContractError, RefreshError};
use crate::gate::{self, Action, GateInputs, PermittedActions};
use crate::observability::metrics;
use crate::observability::{Event, EventEmitter};
use crate::snapshot::GameSnapshot;
use crate::types::{Address, TxReceipt};

/// Default poll period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// What readers see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    /// Latest applied snapshot; `None` until the first successful refresh
    pub snapshot: Option<Arc<GameSnapshot>>,
    /// When a refresh last completed successfully
    pub refreshed_at: Option<DateTime<Utc>>,
    /// Sequence number of the last applied refresh
    pub sequence: u64,
}

/// A state-changing call the contract accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    /// The action that was sent
    pub action: Action,
    /// Receipt of the included transaction
    pub receipt: TxReceipt,
    /// Snapshot from the follow-up refresh; `None` if that refresh failed
    pub snapshot: Option<Arc<GameSnapshot>>,
}

/// Releases the in-flight flag on every exit path.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

enum Wake {
    Tick,
    Event(ContractEvent),
    EventsClosed,
}

/// Single-owner container for the client's view of the game.
pub struct Reconciler {
    contract: Arc<dyn GameContract>,
    clock: Arc<dyn Clock>,
    account: Option<Address>,
    view: watch::Sender<ViewState>,
    issued: AtomicU64,
    in_flight: AtomicBool,
    consecutive_failures: AtomicU64,
    cancel: CancellationToken,
    events: Arc<EventEmitter>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("account", &self.account)
            .field("sequence", &self.view.borrow().sequence)
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a reconciler with an empty view.
    ///
    /// `account` is the connected wallet account; without one nothing is
    /// offered and player status is not fetched.
    #[must_use]
    pub fn new(
        contract: Arc<dyn GameContract>,
        clock: Arc<dyn Clock>,
        account: Option<Address>,
    ) -> Self {
        let (view, _) = watch::channel(ViewState::default());
        Self {
            contract,
            clock,
            account,
            view,
            issued: AtomicU64::new(0),
            in_flight: AtomicBool::new(false),
            consecutive_failures: AtomicU64::new(0),
            cancel: CancellationToken::new(),
            events: Arc::new(EventEmitter::noop()),
        }
    }

    /// Sends structured events to `events`.
    #[must_use]
    pub fn with_event_emitter(mut self, events: Arc<EventEmitter>) -> Self {
        self.events = events;
        self
    }

    /// Ties the reconciler's lifetime to `cancel`.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Connected account.
    #[must_use]
    pub const fn account(&self) -> Option<Address> {
        self.account
    }

    /// Copy of the current view.
    #[must_use]
    pub fn view(&self) -> ViewState {
        self.view.borrow().clone()
    }

    /// Latest applied snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<GameSnapshot>> {
        self.view.borrow().snapshot.clone()
    }

    /// Subscribes to view changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.view.subscribe()
    }

    /// Derives the clock reading for right now.
    #[must_use]
    pub fn reading(&self) -> ClockReading {
        ClockReading::now(self.clock.as_ref())
    }

    /// Actions the gate would currently offer.
    #[must_use]
    pub fn permitted(&self) -> PermittedActions {
        let snapshot = self.snapshot();
        gate::evaluate(&GateInputs {
            phase: self.reading().phase,
            snapshot: snapshot.as_deref(),
            connected: self.account.is_some(),
        })
    }

    /// Returns `true` while an action is pending.
    #[must_use]
    pub fn action_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fetches round info, player status and window flags concurrently and
    /// replaces the snapshot.
    ///
    /// Safe to call at any time and from any number of tasks. With no remote
    /// change in between, consecutive calls return equal snapshots.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::Remote`] if any read fails (the previous
    /// snapshot is kept) or [`RefreshError::Cancelled`] after shutdown.
    pub async fn refresh(&self) -> Result<Arc<GameSnapshot>, RefreshError> {
        if self.cancel.is_cancelled() {
            return Err(RefreshError::Cancelled);
        }
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let started = Instant::now();

        let result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            result = self.fetch() => Some(result),
        };
        let Some(result) = result.filter(|_| !self.cancel.is_cancelled()) else {
            debug!(refresh = seq, "discarding refresh result after shutdown");
            metrics::record_refresh("discarded", started.elapsed());
            return Err(RefreshError::Cancelled);
        };

        match result {
            Ok(snapshot) => {
                self.consecutive_failures.store(0, Ordering::Relaxed);
                Ok(self.apply(seq, snapshot, started.elapsed()))
            }
            Err(e) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                metrics::record_refresh("failed", started.elapsed());
                self.events.emit(Event::RefreshFailed {
                    timestamp: Utc::now(),
                    error: e.to_string(),
                    consecutive_failures: failures,
                });
                Err(RefreshError::Remote(e))
            }
        }
    }

    async fn fetch(&self) -> Result<GameSnapshot, ContractError> {
        let player = async {
            match self.account {
                Some(account) => self.contract.player_status(account).await.map(Some),
                None => Ok(None),
            }
        };
        let (round, player, flags) = tokio::try_join!(
            self.contract.round_info(),
            player,
            self.contract.window_flags(),
        )?;
        Ok(GameSnapshot {
            round,
            player,
            flags,
        })
    }

    fn apply(&self, seq: u64, snapshot: GameSnapshot, elapsed: Duration) -> Arc<GameSnapshot> {
        let mut stale = false;
        let mut changed = false;
        self.view.send_if_modified(|view| {
            if seq <= view.sequence {
                stale = true;
                return false;
            }
            view.sequence = seq;
            view.refreshed_at = Some(self.clock.now());
            changed = view.snapshot.as_deref() != Some(&snapshot);
            if changed {
                view.snapshot = Some(Arc::new(snapshot));
            }
            changed
        });

        let current = self.view.borrow().snapshot.clone();
        let current = current.unwrap_or_else(|| Arc::new(snapshot));

        if stale {
            debug!(refresh = seq, "newer refresh already applied, dropping result");
            metrics::record_refresh("stale", elapsed);
        } else if changed {
            debug!(
                refresh = seq,
                round = current.round.round_id,
                players = current.round.player_count,
                "snapshot updated"
            );
            metrics::record_refresh("applied", elapsed);
            metrics::set_round_gauges(&current);
            self.events.emit(Event::SnapshotRefreshed {
                timestamp: Utc::now(),
                refresh: seq,
                snapshot: *current,
                duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            });
        } else {
            metrics::record_refresh("unchanged", elapsed);
        }
        current
    }

    /// Sends an action to the contract.
    ///
    /// Checks, in order: no other action pending, then the advisory gate,
    /// then forwards the call. On acceptance a refresh runs before this
    /// returns, so the view already reflects the new state.
    ///
    /// # Errors
    ///
    /// - [`ActionError::AlreadyInProgress`] if another action is pending
    /// - [`ActionError::NotPermittedLocally`] if the gate refuses
    /// - [`ActionError::RemoteRejected`] if the contract reverts
    /// - [`ActionError::TransportFailed`] if the call cannot be completed
    /// - [`ActionError::Cancelled`] after shutdown
    ///
    /// Nothing is retried.
    pub async fn submit(&self, action: Action) -> Result<Accepted, ActionError> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            debug!(action = %action, "action refused: another action is pending");
            return Err(ActionError::AlreadyInProgress);
        };
        if self.cancel.is_cancelled() {
            return Err(ActionError::Cancelled);
        }

        let kind = action.kind();
        let snapshot = self.snapshot();
        gate::check(
            kind,
            &GateInputs {
                phase: self.reading().phase,
                snapshot: snapshot.as_deref(),
                connected: self.account.is_some(),
            },
        )
        .map_err(|reason| {
            debug!(action = %action, %reason, "action refused by local gate");
            ActionError::NotPermittedLocally {
                action: kind,
                reason,
            }
        })?;

        info!(action = %action, "submitting action");
        self.events.emit(Event::ActionSubmitted {
            timestamp: Utc::now(),
            action: kind,
            guess: action.guess(),
        });
        let started = Instant::now();

        let result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            result = self.dispatch(action) => Some(result),
        };
        let Some(result) = result.filter(|_| !self.cancel.is_cancelled()) else {
            warn!(action = %action, "client shut down before the action completed");
            self.complete(action, "cancelled", None, None, started);
            return Err(ActionError::Cancelled);
        };

        match result {
            Ok(receipt) => {
                info!(action = %action, tx = %receipt.transaction_hash, "action accepted");
                self.complete(action, "accepted", Some(&receipt), None, started);
                let snapshot = match self.refresh().await {
                    Ok(snapshot) => Some(snapshot),
                    Err(e) => {
                        warn!(error = %e, "refresh after accepted action failed");
                        None
                    }
                };
                Ok(Accepted {
                    action,
                    receipt,
                    snapshot,
                })
            }
            Err(ContractError::Reverted(reason)) => {
                warn!(action = %action, %reason, "action rejected by contract");
                self.complete(action, "remote_rejected", None, Some(&reason), started);
                Err(ActionError::RemoteRejected(reason))
            }
            Err(e) => {
                let detail = e.to_string();
                warn!(action = %action, error = %detail, "action failed");
                self.complete(action, "transport_failed", None, Some(&detail), started);
                Err(ActionError::TransportFailed(detail))
            }
        }
    }

    async fn dispatch(&self, action: Action) -> Result<TxReceipt, ContractError> {
        match action {
            Action::StartRound => self.contract.start_new_round().await,
            Action::SubmitGuess(guess) => self.contract.submit_guess(guess).await,
            Action::RevealResult => self.contract.reveal_result().await,
        }
    }

    fn complete(
        &self,
        action: Action,
        outcome: &'static str,
        receipt: Option<&TxReceipt>,
        detail: Option<&str>,
        started: Instant,
    ) {
        let elapsed = started.elapsed();
        metrics::record_action(action.kind(), outcome, elapsed);
        self.events.emit(Event::ActionCompleted {
            timestamp: Utc::now(),
            action: action.kind(),
            outcome: outcome.to_string(),
            tx_hash: receipt.map(|r| r.transaction_hash),
            detail: detail.map(str::to_string),
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        });
    }

    /// Starts the poll loop: a refresh every `period`, plus an immediate
    /// refresh whenever a contract event arrives on `events`.
    ///
    /// The loop stops on [`shutdown`](Self::shutdown). A closed event
    /// channel only stops the event-driven refreshes.
    pub fn start(
        self: &Arc<Self>,
        period: Duration,
        events: Option<mpsc::Receiver<ContractEvent>>,
    ) -> JoinHandle<()> {
        let reconciler = Arc::clone(self);
        tokio::spawn(async move {
            let mut events = events;
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                let wake = tokio::select! {
                    () = reconciler.cancel.cancelled() => {
                        debug!("poll loop cancelled");
                        break;
                    }
                    _ = interval.tick() => Wake::Tick,
                    event = recv_event(&mut events) => {
                        event.map_or(Wake::EventsClosed, Wake::Event)
                    }
                };
                match wake {
                    Wake::Tick => reconciler.tick().await,
                    Wake::Event(event) => {
                        reconciler.observe(event);
                        reconciler.tick().await;
                    }
                    Wake::EventsClosed => {
                        debug!("event channel closed, continuing with polling only");
                        events = None;
                    }
                }
            }
        })
    }

    async fn tick(&self) {
        match self.refresh().await {
            Ok(_) | Err(RefreshError::Cancelled) => {}
            Err(e) => {
                let failures = self.consecutive_failures.load(Ordering::Relaxed);
                if failures == 1 {
                    warn!(error = %e, "refresh failed, keeping previous state");
                } else {
                    debug!(error = %e, failures, "refresh still failing");
                }
            }
        }
    }

    fn observe(&self, event: ContractEvent) {
        debug!(event = event.name(), round = event.round(), "contract event");
        metrics::record_contract_event(event.name());
        self.events.emit(Event::ContractEventObserved {
            timestamp: Utc::now(),
            event,
        });
    }

    /// Stops the poll loop and discards any results still in flight.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

async fn recv_event(events: &mut Option<mpsc::Receiver<ContractEvent>>) -> Option<ContractEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
