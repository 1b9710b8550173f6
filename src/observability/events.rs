//! Structured event stream for `fheguess`.
//!
//! Discrete, typed events emitted while the client runs. Events are
//! serialized as newline-delimited JSON (JSONL) and carry a monotonically
//! increasing sequence number for ordering.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::contract::ContractEvent;
use crate::gate::ActionKind;
use crate::snapshot::GameSnapshot;
use crate::types::{Address, TxHash};

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during a client session.
///
/// Each variant is tagged with `"type"` when serialized to JSON.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// The client connected and started watching the contract.
    ClientStarted {
        /// When the client started.
        timestamp: DateTime<Utc>,
        /// JSON-RPC endpoint.
        rpc_url: String,
        /// Game contract address.
        contract: Address,
        /// Connected account, if any.
        account: Option<Address>,
    },

    /// The client stopped.
    ClientStopped {
        /// When the client stopped.
        timestamp: DateTime<Utc>,
        /// Human-readable stop reason.
        reason: String,
    },

    /// A refresh produced a snapshot that differs from the previous one.
    SnapshotRefreshed {
        /// When the snapshot was applied.
        timestamp: DateTime<Utc>,
        /// Refresh sequence number.
        refresh: u64,
        /// The new snapshot.
        snapshot: GameSnapshot,
        /// Round-trip time in milliseconds.
        duration_ms: u64,
    },

    /// A refresh failed; the previous snapshot was kept.
    RefreshFailed {
        /// When the failure was observed.
        timestamp: DateTime<Utc>,
        /// Error description.
        error: String,
        /// Failures in a row, including this one.
        consecutive_failures: u64,
    },

    /// An action passed the local checks and was sent to the contract.
    ActionSubmitted {
        /// When the action was sent.
        timestamp: DateTime<Utc>,
        /// Action kind.
        action: ActionKind,
        /// Guess value, for `submitGuess`.
        guess: Option<u8>,
    },

    /// A sent action reached a terminal outcome.
    ActionCompleted {
        /// When the outcome was known.
        timestamp: DateTime<Utc>,
        /// Action kind.
        action: ActionKind,
        /// `accepted`, `remote_rejected`, `transport_failed` or `cancelled`.
        outcome: String,
        /// Transaction hash, when accepted.
        tx_hash: Option<TxHash>,
        /// Rejection or failure detail.
        detail: Option<String>,
        /// Time from submission to outcome in milliseconds.
        duration_ms: u64,
    },

    /// A contract event arrived from the log watcher.
    ContractEventObserved {
        /// When the event was received.
        timestamp: DateTime<Utc>,
        /// The decoded event.
        event: ContractEvent,
    },
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

/// Wraps an [`Event`] with a monotonically increasing sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope {
    /// Zero-based, monotonically increasing sequence counter.
    sequence: u64,
    /// The wrapped event (flattened into the same JSON object).
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Each call to [`emit`](Self::emit) increments the sequence counter,
/// writes the event as one JSON line and flushes. Serialization and I/O
/// failures are dropped so the event stream can never take the client down.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates an emitter that discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use super::*;
    use crate::snapshot::{RoundSnapshot, WindowFlags};

    /// In-memory writer for capturing emitter output in tests.
    #[derive(Clone)]
    struct TestWriter(Arc<StdMutex<Vec<u8>>>);

    impl TestWriter {
        fn new() -> Self {
            Self(Arc::new(StdMutex::new(Vec::new())))
        }

        fn contents(&self) -> String {
            let buf = self.0.lock().unwrap();
            String::from_utf8_lossy(&buf).into_owned()
        }
    }

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn started() -> Event {
        Event::ClientStarted {
            timestamp: DateTime::parse_from_rfc3339("2025-02-04T10:15:30Z")
                .unwrap()
                .with_timezone(&Utc),
            rpc_url: "http://127.0.0.1:8545".to_owned(),
            contract: Address::new([0x4e; 20]),
            account: None,
        }
    }

    #[test]
    fn emitter_writes_valid_jsonl() {
        let tw = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(tw.clone()));
        emitter.emit(started());

        let parsed: serde_json::Value = serde_json::from_str(tw.contents().trim()).unwrap();
        assert_eq!(parsed["type"], "ClientStarted");
        assert_eq!(parsed["rpc_url"], "http://127.0.0.1:8545");
        assert_eq!(parsed["account"], serde_json::Value::Null);
        assert_eq!(parsed["sequence"], 0);
    }

    #[test]
    fn emitter_increments_sequence() {
        let tw = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(tw.clone()));
        emitter.emit(started());
        emitter.emit(Event::ClientStopped {
            timestamp: Utc::now(),
            reason: "interrupted".to_owned(),
        });

        assert_eq!(emitter.event_count(), 2);
        let lines: Vec<serde_json::Value> = tw
            .contents()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0]["sequence"], 0);
        assert_eq!(lines[1]["sequence"], 1);
        assert_eq!(lines[1]["type"], "ClientStopped");
    }

    #[test]
    fn nested_payloads_serialize() {
        let now = Utc::now();
        let snapshot = GameSnapshot {
            round: RoundSnapshot {
                round_id: 2,
                number_generated: true,
                round_ended: false,
                start_time: 1,
                player_count: 4,
            },
            player: None,
            flags: WindowFlags::default(),
        };
        let refreshed = serde_json::to_value(Event::SnapshotRefreshed {
            timestamp: now,
            refresh: 9,
            snapshot,
            duration_ms: 12,
        })
        .unwrap();
        assert_eq!(refreshed["snapshot"]["round"]["player_count"], 4);

        let observed = serde_json::to_value(Event::ContractEventObserved {
            timestamp: now,
            event: ContractEvent::RoundStarted {
                round: 3,
                start_time: 10,
            },
        })
        .unwrap();
        assert_eq!(observed["type"], "ContractEventObserved");
        assert_eq!(observed["event"]["event"], "round_started");

        let completed = serde_json::to_value(Event::ActionCompleted {
            timestamp: now,
            action: ActionKind::SubmitGuess,
            outcome: "remote_rejected".to_owned(),
            tx_hash: None,
            detail: Some("out of range".to_owned()),
            duration_ms: 5,
        })
        .unwrap();
        assert_eq!(completed["action"], "submitGuess");
    }

    #[test]
    fn envelope_flattens_event_fields() {
        let envelope = EventEnvelope {
            sequence: 7,
            event: started(),
        };
        let parsed = serde_json::to_value(&envelope).unwrap();
        assert_eq!(parsed["sequence"], 7);
        assert_eq!(parsed["type"], "ClientStarted");
        assert!(parsed.get("event").is_none());
    }
}
