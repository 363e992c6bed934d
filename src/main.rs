//! Oráculo - terminal chat client
//!
//! A line-oriented front end for the streaming session controller: plain
//! lines are streamed to the assistant service, slash commands manage
//! attachments and the conversation, Ctrl-C cancels the active exchange.

mod attachment;
mod client;
mod config;
mod exchange;
mod progress;
mod state_machine;
mod stream;

#[cfg(test)]
mod testing;

use client::{HttpBackend, LoggingBackend};
use config::ClientConfig;
use exchange::{CancelHandle, ExchangeCoordinator, ExchangeOutcome, History, Rejected, Role};
use progress::{ProgressMerger, ProgressSnapshot, TaskStatus, WebSocketFeed};
use state_machine::{StreamPhase, StreamSnapshot};
use std::borrow::Cow;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they never interleave with the conversation
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oraculo=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = ClientConfig::from_env();
    tracing::info!(
        base_url = %config.base_url,
        progress_url = %config.progress_url,
        workspace_id = %config.workspace_id,
        timeout_secs = config.request_timeout.as_secs(),
        "Starting client"
    );

    let backend = Arc::new(LoggingBackend::new(HttpBackend::new(&config.base_url)?));
    let progress = ProgressMerger::new(Arc::new(WebSocketFeed::new(config.progress_url.clone())));
    let mut coordinator = ExchangeCoordinator::new(backend, progress)
        .with_timeout(config.request_timeout)
        .with_workspace(config.workspace_id.clone())
        .with_paste_threshold(config.paste_threshold);

    if coordinator.probe_connectivity().await {
        println!("Connected to {} (workspace: {})", config.base_url, config.workspace_id);
    } else {
        println!("Service at {} is not reachable; messages will still be sent", config.base_url);
    }

    spawn_interrupt_listener(coordinator.cancel_handle());
    let rendered = Arc::new(Mutex::new(String::new()));
    spawn_live_renderer(coordinator.subscribe_stream(), rendered.clone());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };

        if !execute(&mut coordinator, parse_command(&line), &rendered).await {
            break;
        }
    }

    Ok(())
}

/// Run one command; false means quit
async fn execute(
    coordinator: &mut ExchangeCoordinator,
    command: Command<'_>,
    rendered: &Mutex<String>,
) -> bool {
    match command {
        Command::Send(text) => {
            let outcome = coordinator.send(text, None).await;
            report(&outcome, rendered);
        }
        Command::Ask(text) => {
            let outcome = coordinator.ask(text, None).await;
            report(&outcome, rendered);
        }
        Command::Attach(path) => match coordinator.attach_path(Path::new(path)).await {
            Ok(attachment) => println!("{}", attachment.summary()),
            Err(e) => println!("Could not attach {path}: {e}"),
        },
        Command::Paste(text) => match coordinator.attach_paste("", text).await {
            Ok(Some(replacement)) => println!("{replacement}"),
            Ok(None) => {
                let outcome = coordinator.send(text, None).await;
                report(&outcome, rendered);
            }
            Err(e) => println!("Could not attach pasted text: {e}"),
        },
        Command::Detach => match coordinator.detach() {
            Some(attachment) => println!("Removed {}", attachment.name),
            None => println!("No file attached"),
        },
        Command::Workspace(workspace) => {
            coordinator.set_workspace(workspace).await;
            let session = coordinator.session();
            println!(
                "Workspace: {} ({})",
                session.workspace_id(),
                if session.is_connected() { "connected" } else { "unreachable" }
            );
        }
        Command::New => {
            coordinator.clear_chat();
            println!("New conversation");
        }
        Command::Progress => print_progress(&coordinator.progress_snapshot()),
        Command::History => print_history(coordinator.history()),
        Command::Quit => return false,
        Command::Unknown(command) => println!("Unknown command: {command}"),
        Command::Empty => {}
    }
    true
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

/// Ctrl-C cancels the active exchange instead of killing the process
fn spawn_interrupt_listener(handle: CancelHandle) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !handle.cancel() {
                println!();
                println!("Nothing to cancel (use /quit to exit)");
                prompt();
            }
        }
    });
}

/// Echo live text as it streams. `rendered` holds what is on screen for the
/// current exchange.
fn spawn_live_renderer(rx: watch::Receiver<StreamSnapshot>, rendered: Arc<Mutex<String>>) {
    tokio::spawn(async move {
        let mut updates = WatchStream::from_changes(rx);
        while let Some(snapshot) = updates.next().await {
            let mut shown = rendered.lock().unwrap_or_else(PoisonError::into_inner);
            match snapshot.phase {
                StreamPhase::Idle => shown.clear(),
                StreamPhase::Streaming => {
                    if let Some(delta) = snapshot.live_text.strip_prefix(shown.as_str()) {
                        print!("{delta}");
                    } else {
                        // A partial response replaced the text
                        print!("\n{}", snapshot.live_text);
                    }
                    let _ = std::io::stdout().flush();
                    shown.clone_from(&snapshot.live_text);
                }
                StreamPhase::Settled => {}
            }
        }
    });
}

fn report(outcome: &ExchangeOutcome, rendered: &Mutex<String>) {
    let shown = std::mem::take(&mut *rendered.lock().unwrap_or_else(PoisonError::into_inner));
    if let ExchangeOutcome::Completed { message: Some(message) } = outcome {
        println!("{}", remaining_text(&message.content, &shown));
        return;
    }
    if !shown.is_empty() {
        println!();
    }
    match outcome {
        ExchangeOutcome::Completed { .. } => {}
        ExchangeOutcome::Failed(error) => println!("Error: {error}"),
        ExchangeOutcome::Cancelled => println!("{}", exchange::CANCELLED_NOTICE),
        ExchangeOutcome::TimedOut => println!("Request timed out"),
        ExchangeOutcome::Rejected(Rejected::Busy) => println!("Still waiting for the previous answer"),
        ExchangeOutcome::Rejected(Rejected::Empty) => {}
    }
}

/// What still has to be printed once the final text is known. The live
/// renderer may have missed the last updates, or shown a partial snapshot
/// that the final text does not extend.
fn remaining_text<'a>(content: &'a str, shown: &str) -> Cow<'a, str> {
    match content.strip_prefix(shown) {
        Some(rest) => Cow::Borrowed(rest),
        None => Cow::Owned(format!("\n{content}")),
    }
}

fn print_history(history: &History) {
    if history.is_empty() {
        println!("No messages yet");
        return;
    }
    for message in history.messages() {
        let who = match message.role {
            Role::User => "you",
            Role::Assistant if message.is_error => "error",
            Role::Assistant => "assistant",
        };
        println!(
            "[{}] {who}: {}",
            message.timestamp.format("%H:%M:%S"),
            message.content
        );
    }
}

fn print_progress(snapshot: &ProgressSnapshot) {
    if snapshot.is_empty() {
        println!("No task progress");
        return;
    }
    if let (Some(current), Some(total)) = (snapshot.current_step, snapshot.total_steps) {
        println!("Step {current}/{total}, {} running", snapshot.running().count());
    }
    for task in &snapshot.tasks {
        let mark = match task.status {
            TaskStatus::Pending => ' ',
            TaskStatus::Running => '>',
            TaskStatus::Completed => 'x',
            TaskStatus::Error => '!',
        };
        match &task.subtitle {
            Some(subtitle) => println!("[{mark}] {} - {subtitle}", task.title),
            None => println!("[{mark}] {}", task.title),
        }
        if let Some(error) = &task.error {
            println!("    {error}");
        }
    }
}

/// One line of user input
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Send(&'a str),
    Ask(&'a str),
    Attach(&'a str),
    Paste(&'a str),
    Detach,
    Workspace(&'a str),
    New,
    Progress,
    History,
    Quit,
    Unknown(&'a str),
    Empty,
}

fn parse_command(line: &str) -> Command<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Command::Empty;
    }
    let Some(command) = trimmed.strip_prefix('/') else {
        return Command::Send(line);
    };
    let (name, arg) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(name, arg)| (name, arg.trim()));

    match (name, arg) {
        ("ask", text) if !text.is_empty() => Command::Ask(text),
        ("attach", path) if !path.is_empty() => Command::Attach(path),
        ("paste", text) if !text.is_empty() => Command::Paste(text),
        ("workspace", id) if !id.is_empty() => Command::Workspace(id),
        ("detach", _) => Command::Detach,
        ("new", _) => Command::New,
        ("progress", _) => Command::Progress,
        ("history", _) => Command::History,
        ("quit" | "exit", _) => Command::Quit,
        _ => Command::Unknown(trimmed),
    }
}
