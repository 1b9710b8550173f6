//! `watch`: the live view.
//!
//! Runs the reconciler's poll loop (and the log watcher, unless disabled),
//! redraws the panel, and reads actions from stdin. Actions run on their own
//! task so the view keeps updating while a transaction is pending.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cli::args::{ConnectionArgs, OutputFormat, WatchArgs};
use crate::cli::commands::{AccountMode, Session};
use crate::contract::EventWatcher;
use crate::error::FheGuessError;
use crate::gate::Action;
use crate::observability::{Event, EventEmitter, init_metrics};
use crate::reconciler::Reconciler;
use crate::render::{StatusReport, action_message};
use crate::types::Address;

const HELP: &str = "commands: guess <0-100> | start | reveal | refresh | help | quit";

/// A line typed into `watch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchCommand {
    /// Send an action
    Act(Action),
    /// Refresh now
    Refresh,
    /// Show the command list
    Help,
    /// Leave
    Quit,
}

/// Parses one input line.
///
/// # Errors
///
/// Returns a message describing what was wrong with the line.
pub fn parse_command(line: &str) -> Result<WatchCommand, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err("empty command".to_string());
    };
    let arg = words.next();
    if words.next().is_some() {
        return Err(format!("too many arguments for '{verb}'"));
    }

    let verb = verb.to_ascii_lowercase();
    let command = match (verb.as_str(), arg) {
        ("guess" | "g", Some(raw)) => {
            let number: u8 = raw
                .parse()
                .map_err(|_| format!("'{raw}' is not a number between 0 and 100"))?;
            if number > 100 {
                return Err("Please enter a number between 0-100!".to_string());
            }
            WatchCommand::Act(Action::SubmitGuess(number))
        }
        ("guess" | "g", None) => return Err("usage: guess <0-100>".to_string()),
        ("start" | "start-round", None) => WatchCommand::Act(Action::StartRound),
        ("reveal", None) => WatchCommand::Act(Action::RevealResult),
        ("refresh" | "r", None) => WatchCommand::Refresh,
        ("help" | "?", None) => WatchCommand::Help,
        ("quit" | "exit" | "q", None) => WatchCommand::Quit,
        (
            "start" | "start-round" | "reveal" | "refresh" | "r" | "help" | "?" | "quit" | "exit"
            | "q",
            Some(_),
        ) => return Err(format!("'{verb}' takes no arguments")),
        _ => return Err(format!("unknown command '{verb}'")),
    };
    Ok(command)
}

/// Runs the live view until Ctrl+C, `quit`, or end of input.
///
/// # Errors
///
/// Returns an error if the session cannot be opened or the metrics or
/// event outputs cannot be set up.
pub async fn run(
    connection: &ConnectionArgs,
    args: &WatchArgs,
    cancel: CancellationToken,
) -> Result<(), FheGuessError> {
    if let Some(port) = args.metrics_port {
        init_metrics(Some(port))?;
        info!(port, "Prometheus metrics endpoint started");
    }

    let events = Arc::new(match &args.events_file {
        Some(path) => EventEmitter::from_file(path)?,
        None => EventEmitter::noop(),
    });

    let session = Session::open(connection, AccountMode::Optional).await?;
    let period = args.poll_interval.unwrap_or(session.config.client.poll_interval);
    let cancel = cancel.child_token();

    events.emit(Event::ClientStarted {
        timestamp: Utc::now(),
        rpc_url: session.config.network.rpc_url.clone(),
        contract: session.contract.address(),
        account: session.account,
    });

    let reconciler = Arc::new(
        session
            .reconciler()
            .with_event_emitter(Arc::clone(&events))
            .with_cancellation(cancel.clone()),
    );

    let contract_events = if session.config.client.watch_events && !args.no_events {
        let (tx, rx) = mpsc::channel(64);
        EventWatcher::new(
            Arc::clone(&session.provider),
            session.contract.address(),
            session.config.client.event_poll_interval,
        )
        .spawn(tx, cancel.child_token());
        Some(rx)
    } else {
        None
    };
    let poll_loop = reconciler.start(period, contract_events);

    let reason = view_loop(&reconciler, &cancel, session.contract.address()).await;

    reconciler.shutdown();
    let _ = poll_loop.await;
    events.emit(Event::ClientStopped {
        timestamp: Utc::now(),
        reason: reason.to_string(),
    });
    Ok(())
}

async fn view_loop(
    reconciler: &Arc<Reconciler>,
    cancel: &CancellationToken,
    contract: Address,
) -> &'static str {
    let format = if std::io::stdout().is_terminal() {
        OutputFormat::Human
    } else {
        OutputFormat::Json
    };
    let redraw_every_tick = format == OutputFormat::Human;

    let mut view = reconciler.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let (done_tx, mut done_rx) = mpsc::channel::<String>(8);
    let mut last_message = String::from(HELP);

    let mut redraw = tokio::time::interval(Duration::from_secs(1));
    redraw.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            () = cancel.cancelled() => return "interrupted",
            _ = redraw.tick(), if redraw_every_tick => {
                draw(reconciler, contract, format, &last_message);
            }
            changed = view.changed() => {
                if changed.is_err() {
                    return "reconciler stopped";
                }
                view.borrow_and_update();
                if !redraw_every_tick {
                    draw(reconciler, contract, format, &last_message);
                }
            }
            Some(message) = done_rx.recv() => {
                last_message = message;
                draw(reconciler, contract, format, &last_message);
            }
            line = lines.next_line(), if stdin_open => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) | Err(_) => {
                        debug!("stdin closed, watching without input");
                        stdin_open = false;
                        continue;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_command(&line) {
                    Ok(WatchCommand::Quit) => return "quit",
                    Ok(WatchCommand::Help) => last_message = HELP.to_string(),
                    Ok(WatchCommand::Refresh) => {
                        let reconciler = Arc::clone(reconciler);
                        tokio::spawn(async move {
                            let _ = reconciler.refresh().await;
                        });
                        last_message = "Refreshing...".to_string();
                    }
                    Ok(WatchCommand::Act(action)) => {
                        last_message = format!("Sending {action}...");
                        let reconciler = Arc::clone(reconciler);
                        let done = done_tx.clone();
                        tokio::spawn(async move {
                            let result = reconciler.submit(action).await;
                            let _ = done.send(action_message(action, &result)).await;
                        });
                    }
                    Err(message) => last_message = message,
                }
                draw(reconciler, contract, format, &last_message);
            }
        }
    }
}

fn draw(reconciler: &Reconciler, contract: Address, format: OutputFormat, message: &str) {
    let snapshot = reconciler.snapshot();
    let report = StatusReport::new(
        reconciler.reading(),
        contract,
        reconciler.account(),
        snapshot.as_deref(),
        None,
    );
    match format {
        OutputFormat::Human => {
            print!("\x1b[2J\x1b[H{}", report.render());
            if reconciler.action_in_flight() {
                println!("> Transaction pending...");
            }
            println!("\n{message}");
        }
        OutputFormat::Json => {
            if let Ok(line) = serde_json::to_string(&report) {
                println!("{line}");
            }
        }
    }
}
