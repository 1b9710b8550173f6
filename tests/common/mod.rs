//! Shared integration-test harness: an in-memory game contract, a JSON-RPC
//! stub node served by axum, and helpers for running the built binary.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::process::Output;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use serde_json::{Value, json};
use tokio::sync::Notify;

use fheguess::contract::GameContract;
use fheguess::error::ContractError;
use fheguess::snapshot::{PlayerSnapshot, RoundRecord, RoundSnapshot, WindowFlags};
use fheguess::types::{Address, H256, TxReceipt};

/// Account used by most tests.
pub const PLAYER: Address = Address::new([0x11; 20]);

/// Instant at `hour:minute:second` on 2025-03-01, UTC+3.
#[allow(clippy::missing_panics_doc)]
pub fn utc3(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
    FixedOffset::east_opt(3 * 3600)
        .unwrap()
        .with_ymd_and_hms(2025, 3, 1, hour, minute, second)
        .unwrap()
        .with_timezone(&Utc)
}

// ============================================================================
// In-memory contract
// ============================================================================

/// Mutable state behind [`StubContract`].
#[derive(Debug, Clone)]
pub struct StubState {
    pub round: RoundSnapshot,
    pub players: HashMap<Address, PlayerSnapshot>,
    pub flags: WindowFlags,
    pub hour: u32,
    pub history: HashMap<u8, RoundRecord>,
    /// When set, every read fails with this transport error
    pub fail_reads: Option<String>,
    /// When set, every write fails with this transport error
    pub fail_writes: Option<String>,
}

impl StubState {
    /// An open round in the odd window with guessing active.
    pub fn guessing() -> Self {
        Self {
            round: RoundSnapshot {
                round_id: 1,
                number_generated: true,
                round_ended: false,
                start_time: 1_740_823_200,
                player_count: 0,
            },
            players: HashMap::new(),
            flags: WindowFlags {
                odd_hour: true,
                even_hour: false,
                guess_active: true,
                reveal_active: false,
            },
            hour: 13,
            history: HashMap::new(),
            fail_reads: None,
            fail_writes: None,
        }
    }

    /// No round yet, odd window.
    pub fn fresh() -> Self {
        let mut state = Self::guessing();
        state.round = RoundSnapshot {
            round_id: 0,
            number_generated: false,
            round_ended: false,
            start_time: 0,
            player_count: 0,
        };
        state.flags.guess_active = false;
        state
    }

    /// An open round in the even window with revealing active.
    pub fn revealing() -> Self {
        let mut state = Self::guessing();
        state.hour = 14;
        state.flags = WindowFlags {
            odd_hour: false,
            even_hour: true,
            guess_active: false,
            reveal_active: true,
        };
        state
    }
}

/// A [`GameContract`] that emulates the contract's own rules in memory and
/// counts every call.
pub struct StubContract {
    state: Mutex<StubState>,
    account: Option<Address>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    read_gate: Mutex<Option<Arc<Notify>>>,
    write_gate: Mutex<Option<Arc<Notify>>>,
}

impl StubContract {
    pub fn new(state: StubState, account: Option<Address>) -> Self {
        Self {
            state: Mutex::new(state),
            account,
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            read_gate: Mutex::new(None),
            write_gate: Mutex::new(None),
        }
    }

    /// Number of `round_info` calls (one per refresh).
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of write calls that reached the contract.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Changes the remote state.
    pub fn update(&self, f: impl FnOnce(&mut StubState)) {
        f(&mut self.state.lock().unwrap());
    }

    /// Copy of the remote state.
    pub fn state(&self) -> StubState {
        self.state.lock().unwrap().clone()
    }

    /// Makes reads wait until the returned handle is notified.
    pub fn hold_reads(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.read_gate.lock().unwrap() = Some(Arc::clone(&notify));
        notify
    }

    /// Stops holding new reads; reads already waiting stay parked until
    /// their handle is notified.
    pub fn stop_holding_reads(&self) {
        self.read_gate.lock().unwrap().take();
    }

    /// Makes writes wait until the returned handle is notified.
    pub fn hold_writes(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.write_gate.lock().unwrap() = Some(Arc::clone(&notify));
        notify
    }

    async fn wait_read(&self) {
        let gate = self.read_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    async fn wait_write(&self) {
        let gate = self.write_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    fn read<T>(&self, f: impl FnOnce(&StubState) -> T) -> Result<T, ContractError> {
        let state = self.state.lock().unwrap();
        match &state.fail_reads {
            Some(message) => Err(ContractError::Transport(message.clone())),
            None => Ok(f(&state)),
        }
    }

    /// Counts the write, then waits if writes are held.
    async fn begin_write(&self) -> usize {
        let n = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
        self.wait_write().await;
        n
    }

    fn write(
        &self,
        n: usize,
        f: impl FnOnce(&mut StubState, Option<Address>) -> Result<(), String>,
    ) -> Result<TxReceipt, ContractError> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.fail_writes {
            return Err(ContractError::Transport(message.clone()));
        }
        f(&mut state, self.account).map_err(ContractError::Reverted)?;
        let mut hash = [0u8; 32];
        hash[31] = u8::try_from(n % 256).unwrap();
        Ok(TxReceipt {
            transaction_hash: H256::new(hash),
            block_number: 100 + u64::try_from(n).unwrap(),
            status: true,
        })
    }
}

#[async_trait::async_trait]
impl GameContract for StubContract {
    async fn round_info(&self) -> Result<RoundSnapshot, ContractError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.wait_read().await;
        self.read(|s| s.round)
    }

    async fn player_status(&self, player: Address) -> Result<PlayerSnapshot, ContractError> {
        self.read(|s| {
            s.players.get(&player).copied().unwrap_or(PlayerSnapshot {
                has_guessed: false,
                timestamp: 0,
            })
        })
    }

    async fn window_flags(&self) -> Result<WindowFlags, ContractError> {
        self.read(|s| s.flags)
    }

    async fn current_hour(&self) -> Result<u32, ContractError> {
        self.read(|s| s.hour)
    }

    async fn current_round(&self) -> Result<u8, ContractError> {
        self.read(|s| s.round.round_id)
    }

    async fn round_history(&self, round: u8) -> Result<RoundRecord, ContractError> {
        self.read(|s| {
            s.history.get(&round).copied().unwrap_or(RoundRecord {
                round_id: round,
                ended: false,
                winner: None,
                winning_number: 0,
                start_time: 0,
                end_time: 0,
                player_count: 0,
            })
        })
    }

    async fn submit_guess(&self, guess: u8) -> Result<TxReceipt, ContractError> {
        let n = self.begin_write().await;
        self.write(n, |s, account| {
            let account = account.ok_or("no sender")?;
            if !s.flags.guess_active {
                return Err("Not guess time".into());
            }
            if guess > 100 {
                return Err("out of range".into());
            }
            if s.players.get(&account).is_some_and(|p| p.has_guessed) {
                return Err("Already guessed this round".into());
            }
            s.players.insert(
                account,
                PlayerSnapshot {
                    has_guessed: true,
                    timestamp: s.round.start_time + 60,
                },
            );
            s.round.player_count += 1;
            Ok(())
        })
    }

    async fn start_new_round(&self) -> Result<TxReceipt, ContractError> {
        let n = self.begin_write().await;
        self.write(n, |s, _| {
            if !s.flags.odd_hour {
                return Err("Can only start in odd hours".into());
            }
            if s.round.number_generated && !s.round.round_ended {
                return Err("Round in progress".into());
            }
            s.round = RoundSnapshot {
                round_id: s.round.round_id + 1,
                number_generated: true,
                round_ended: false,
                start_time: s.round.start_time + 7200,
                player_count: 0,
            };
            s.players.clear();
            s.flags.guess_active = true;
            Ok(())
        })
    }

    async fn reveal_result(&self) -> Result<TxReceipt, ContractError> {
        let n = self.begin_write().await;
        self.write(n, |s, _| {
            if !s.flags.reveal_active {
                return Err("Not reveal time".into());
            }
            s.round.round_ended = true;
            s.flags.reveal_active = false;
            Ok(())
        })
    }
}

// ============================================================================
// JSON-RPC stub node
// ============================================================================

/// JSON-RPC error returned by a [`StubNode`] handler.
#[derive(Debug, Clone)]
pub struct RpcFailure {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

impl RpcFailure {
    pub fn new(code: i64, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
            data: None,
        }
    }
}

type Handler = dyn Fn(&str, &Value) -> Result<Value, RpcFailure> + Send + Sync;

#[derive(Clone)]
struct NodeState {
    handler: Arc<Handler>,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

/// A JSON-RPC 2.0 endpoint on localhost whose answers come from a closure.
pub struct StubNode {
    pub addr: SocketAddr,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
    server: tokio::task::JoinHandle<()>,
}

impl StubNode {
    /// Starts serving on an ephemeral port.
    pub async fn spawn(
        handler: impl Fn(&str, &Value) -> Result<Value, RpcFailure> + Send + Sync + 'static,
    ) -> Self {
        use axum::Router;
        use axum::routing::post;

        let calls = Arc::new(Mutex::new(Vec::new()));
        let state = NodeState {
            handler: Arc::new(handler),
            calls: Arc::clone(&calls),
        };
        let app = Router::new()
            .route("/", post(handle_rpc))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            addr,
            calls,
            server,
        }
    }

    /// Endpoint URL.
    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Methods called so far, in order.
    pub fn methods(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(m, _)| m.clone())
            .collect()
    }

    /// Params of every call to `method`.
    pub fn params_of(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

impl Drop for StubNode {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn handle_rpc(
    axum::extract::State(state): axum::extract::State<NodeState>,
    axum::Json(request): axum::Json<Value>,
) -> axum::Json<Value> {
    let method = request["method"].as_str().unwrap_or_default().to_string();
    let params = request["params"].clone();
    state
        .calls
        .lock()
        .unwrap()
        .push((method.clone(), params.clone()));

    let id = request["id"].clone();
    let body = match (state.handler)(&method, &params) {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        Err(failure) => {
            let mut error = json!({ "code": failure.code, "message": failure.message });
            if let Some(data) = failure.data {
                error["data"] = data;
            }
            json!({ "jsonrpc": "2.0", "id": id, "error": error })
        }
    };
    axum::Json(body)
}

/// 32-byte ABI word for `value`, as a hex string without prefix.
pub fn word(value: u64) -> String {
    format!("{value:064x}")
}

/// ABI-encoded return data from a list of words.
pub fn words(values: &[u64]) -> Value {
    let body: String = values.iter().map(|v| word(*v)).collect();
    Value::String(format!("0x{body}"))
}

/// Selector (first 4 bytes, hex) of an `eth_call` request.
pub fn selector_of(params: &Value) -> String {
    let data = params[0]["data"].as_str().unwrap_or_default();
    data.trim_start_matches("0x").chars().take(8).collect()
}

// ============================================================================
// Binary helpers
// ============================================================================

/// Runs the built `fheguess` binary with `args` and no inherited config.
#[allow(clippy::missing_panics_doc)]
pub fn run_cli(args: &[&str]) -> Output {
    std::process::Command::new(env!("CARGO_BIN_EXE_fheguess"))
        .args(args)
        .env_remove("FHEGUESS_CONFIG")
        .env_remove("FHEGUESS_RPC_URL")
        .env_remove("FHEGUESS_CONTRACT")
        .env_remove("FHEGUESS_ACCOUNT")
        .env_remove("FHEGUESS_LOG_LEVEL")
        .env("NO_COLOR", "1")
        .output()
        .expect("failed to run fheguess")
}
