// Fidus Memory - interactive chat client

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use fidus_core::identity::SessionIdentity;
use fidus_core::preference::PreferenceConflict;
use fidus_core::streaming::MemoryStreamEvent;
use fidus_memory::cli::{settings_update, ReplCommand, HELP};
use fidus_memory::services::chat::{Outcome, StreamPhase};
use fidus_memory::services::privacy_disclosure;
use fidus_memory::storage::{ConfigService, FileIdentityStore};
use fidus_memory::{AppState, ConflictDecision, ResolutionReport};

#[derive(Parser)]
#[command(name = "fidus-chat")]
#[command(about = "Chat with the Fidus Memory assistant", long_about = None)]
struct Cli {
    /// Path to config.json (default: ~/.fidus-memory/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Memory API base URL, overrides config and FIDUS_BACKEND_URL
    #[arg(long)]
    backend_url: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool, configured_level: &str) {
    let default_level = if verbose { "debug" } else { configured_level };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigService::open(path),
        None => ConfigService::new(),
    }
    .context("failed to load configuration")?
    .with_env_overrides()
    .context("invalid FIDUS_BACKEND_URL")?
    .with_backend_override(cli.backend_url.clone())
    .context("invalid --backend-url")?;

    init_tracing(cli.verbose, &config.get_config().log_level);

    let identity: Arc<dyn SessionIdentity> =
        Arc::new(FileIdentityStore::new().context("failed to open identity store")?);

    let (tx, rx) = mpsc::channel(64);
    let printer = tokio::spawn(print_events(rx));

    let state = AppState::new();
    state.initialize(config, identity, Some(tx)).await?;

    match state.ai_config().await {
        Ok(ai) => println!("{}", privacy_disclosure(&ai)),
        Err(e) => tracing::warn!("[fidus-chat] Could not fetch model configuration: {}", e),
    }
    println!("{}\n", HELP);

    let result = run_repl(&state).await;

    // Dropping the state closes the observer channel and ends the printer.
    drop(state);
    let _ = printer.await;
    result
}

async fn run_repl(state: &AppState) -> anyhow::Result<()> {
    let services = state.services().await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        prompt();
        // SIGINT no longer terminates the process once ctrl_c() was awaited.
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };
        let Some(line) = line else {
            break;
        };

        let command = match ReplCommand::parse(&line) {
            Ok(command) => command,
            Err(msg) => {
                println!("{}", msg);
                continue;
            }
        };

        match command {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::Help => println!("{}", HELP),
            ReplCommand::Message(text) => {
                let cancel = CancellationToken::new();
                let submit = services.chat.submit(&text, cancel.clone());
                tokio::pin!(submit);
                let phase = tokio::select! {
                    phase = &mut submit => phase,
                    _ = tokio::signal::ctrl_c() => {
                        cancel.cancel();
                        submit.await
                    }
                };
                match phase {
                    Ok(StreamPhase::Settled(Outcome::Done)) => {}
                    Ok(StreamPhase::Settled(Outcome::Errored { .. })) => {
                        let snapshot = services.chat.snapshot().await;
                        if let Some(notice) = snapshot.notice {
                            println!("! {} (failed attempts: {})", notice.message, snapshot.retry_count);
                            services.chat.dismiss_notice().await;
                        }
                    }
                    Ok(StreamPhase::Settled(Outcome::Cancelled)) => println!("\n(cancelled)"),
                    Ok(phase) => tracing::debug!("[fidus-chat] Submission ended in {:?}", phase),
                    Err(e) => println!("{}", e),
                }
                let pending = services.chat.snapshot().await.conflicts.len();
                if pending > 0 {
                    println!("{} preference conflict(s) pending, see /conflicts", pending);
                }
            }
            ReplCommand::Conflicts => {
                let conflicts = services.chat.snapshot().await.conflicts.snapshot();
                if conflicts.is_empty() {
                    println!("No pending conflicts.");
                }
                for (i, conflict) in conflicts.iter().enumerate() {
                    print_conflict(i + 1, conflict);
                }
            }
            ReplCommand::Accept(index) => {
                let report = services.resolver.resolve(index, ConflictDecision::AcceptNew).await;
                print_report(report);
            }
            ReplCommand::Keep(index) => {
                let report = services.resolver.resolve(index, ConflictDecision::KeepOld).await;
                print_report(report);
            }
            ReplCommand::Dismiss(index) => match services.resolver.dismiss(index).await {
                Ok(conflict) => println!("Dismissed conflict on {}.", conflict.key),
                Err(e) => println!("{}", e),
            },
            ReplCommand::Preferences => match services.views.reload_preferences().await {
                Ok(0) => println!("No stored preferences."),
                Ok(_) => {
                    for (i, pref) in services.views.preferences().await.iter().enumerate() {
                        println!(
                            "{:>3}. [{}] {} = {} ({}, {:.0}%){}",
                            i + 1,
                            pref.domain(),
                            pref.key,
                            pref.value,
                            pref.sentiment,
                            pref.confidence * 100.0,
                            if pref.is_exception { " exception" } else { "" }
                        );
                    }
                }
                Err(e) => println!("Could not load preferences: {}", e),
            },
            ReplCommand::Like(index) => match services.views.accept_preference(index).await {
                Ok(confidence) => println!("Reinforced, confidence now {:.0}%.", confidence * 100.0),
                Err(e) => println!("{}", e),
            },
            ReplCommand::Dislike(index) => match services.views.reject_preference(index).await {
                Ok(confidence) => println!("Weakened, confidence now {:.0}%.", confidence * 100.0),
                Err(e) => println!("{}", e),
            },
            ReplCommand::Forget(index) => match services.views.forget_preference(index).await {
                Ok(pref) => println!("Forgot {} = {}.", pref.key, pref.value),
                Err(e) => println!("{}", e),
            },
            ReplCommand::ForgetAll => {
                print!("Delete every stored preference? Type 'yes' to confirm: ");
                let _ = std::io::stdout().flush();
                let answer = lines.next_line().await?.unwrap_or_default();
                if answer.trim().eq_ignore_ascii_case("yes") {
                    match services.views.forget_all_preferences().await {
                        Ok(count) => println!("Deleted {} preference(s).", count),
                        Err(e) => println!("{}", e),
                    }
                } else {
                    println!("Nothing deleted.");
                }
            }
            ReplCommand::Situations => match services.views.reload_situations().await {
                Ok(_) => {
                    for situation in services.views.situations().await {
                        let mut factors: Vec<_> = situation
                            .factors
                            .iter()
                            .map(|(k, v)| format!("{}={}", k, v))
                            .collect();
                        factors.sort();
                        println!(
                            "  {} [{}] -> {} preference(s)",
                            situation.id,
                            factors.join(", "),
                            situation.preference_ids.len()
                        );
                    }
                }
                Err(e) => println!("Could not load situations: {}", e),
            },
            ReplCommand::WhoAmI => match state.current_identity().await? {
                Some(id) => println!("Session identity: {}", id),
                None => println!("No identity assigned yet."),
            },
            ReplCommand::ResetIdentity => {
                state.forget_identity().await?;
                println!("Identity cleared. The backend assigns a new one on the next request.");
            }
            ReplCommand::ShowConfig => {
                print_config(&state.get_config().await?);
                println!(
                    "  file: {}{}",
                    state.config_path().await?.display(),
                    if state.is_config_healthy() { "" } else { " (missing or invalid)" }
                );
            }
            ReplCommand::SetConfig { key, value } => {
                let update = match settings_update(&key, &value) {
                    Ok(update) => update,
                    Err(msg) => {
                        println!("{}", msg);
                        continue;
                    }
                };
                match state.update_config(update).await {
                    Ok(_) => println!("Saved {}. Restart fidus-chat to apply it.", key),
                    Err(e) => println!("{}", e),
                }
            }
            ReplCommand::ResetConfig => match state.reset_config().await {
                Ok(_) => println!("Settings reset to defaults. Restart fidus-chat to apply them."),
                Err(e) => println!("{}", e),
            },
        }
    }

    Ok(())
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

fn print_config(config: &fidus_memory::AppConfig) {
    println!("  backend_url: {}", config.backend_url);
    println!("  fallback_user_id: {}", config.fallback_user_id);
    println!("  connect_timeout_secs: {}", config.connect_timeout_secs);
    println!("  log_level: {}", config.log_level);
    match &config.proxy {
        Some(proxy) => println!("  proxy: {}:{}", proxy.host, proxy.port),
        None => println!("  proxy: none"),
    }
}

fn print_conflict(number: usize, conflict: &PreferenceConflict) {
    println!(
        "{}. {}: was \"{}\" ({}, {:.0}%), now \"{}\" ({}, {:.0}%)",
        number,
        conflict.key,
        conflict.old_value,
        conflict.old_sentiment,
        conflict.old_confidence * 100.0,
        conflict.new_value,
        conflict.new_sentiment,
        conflict.new_confidence * 100.0
    );
    for related in conflict.related() {
        println!(
            "     related: {} = \"{}\" ({}, {:.0}%)",
            related.key,
            related.value,
            related.sentiment,
            related.confidence * 100.0
        );
    }
}

fn print_report(report: fidus_memory::AppResult<ResolutionReport>) {
    match report {
        Ok(report) if report.failed.is_empty() => {
            if report.applied.is_empty() {
                println!("Conflict resolved, nothing needed saving.");
            } else {
                println!("Saved: {}", report.applied.join(", "));
            }
        }
        Ok(report) => {
            if !report.applied.is_empty() {
                println!("Saved: {}", report.applied.join(", "));
            }
            let failed: Vec<_> = report.failed.iter().map(|(key, _)| key.as_str()).collect();
            println!(
                "! Could not save: {}. The conflict is still pending; try again.",
                failed.join(", ")
            );
        }
        Err(e) => println!("{}", e),
    }
}

/// Echo streamed reply text as it arrives.
async fn print_events(mut rx: mpsc::Receiver<MemoryStreamEvent>) {
    let mut stdout = std::io::stdout();
    let mut mid_line = false;
    while let Some(event) = rx.recv().await {
        match event {
            MemoryStreamEvent::Token { content } => {
                let _ = write!(stdout, "{}", content);
                let _ = stdout.flush();
                mid_line = true;
            }
            MemoryStreamEvent::PreferencesUpdated => {
                tracing::debug!("[fidus-chat] Memory updated");
            }
            MemoryStreamEvent::Done | MemoryStreamEvent::Error { .. } => {
                if mid_line {
                    let _ = writeln!(stdout);
                    mid_line = false;
                }
            }
            _ => {}
        }
    }
}
