use anyhow::{Context, Result};
use clap::Parser;
use mcsync::config::{load_config, SyncConfig};
use mcsync::handler::ConsoleHandler;
use mcsync::monitor::{IdleMonitor, PlayerActivity};
use mcsync::relay::{ConsoleRelay, RelayMode};
use mcsync::subprocess::{ServerCommand, ServerProcess};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// How long finished servers get for their last events to be handled
const HANDLER_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Supervise a Minecraft server and turn its console into events
#[derive(Parser)]
#[command(name = "mcsync")]
#[command(about = "Supervise a Minecraft server and turn its console output into events", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to a TOML settings file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Chat questions starting with this word are reported as AI questions
    #[arg(long)]
    trigger_word: Option<String>,

    /// Stop the server after this many seconds with nobody online (0 disables)
    #[arg(long, value_name = "SECS")]
    idle_shutdown: Option<u64>,

    /// Seconds between player list polls
    #[arg(long, value_name = "SECS")]
    list_interval: Option<u64>,

    /// Maximum characters per relayed console chunk
    #[arg(long, value_name = "CHARS")]
    chunk_limit: Option<usize>,

    /// Print events as JSON lines instead of relaying console output
    #[arg(long)]
    json: bool,

    /// Server launch command, overriding `launch_command` from the settings file
    #[arg(last = true, value_name = "COMMAND")]
    command: Vec<String>,
}

impl Cli {
    fn apply_overrides(&self, config: &mut SyncConfig) {
        if let Some(word) = &self.trigger_word {
            config.trigger_word = word.clone();
        }
        if let Some(seconds) = self.idle_shutdown {
            config.inactive_shutdown_seconds = seconds;
        }
        if let Some(seconds) = self.list_interval {
            config.list_interval_seconds = seconds;
        }
        if let Some(limit) = self.chunk_limit {
            config.chunk_limit = limit;
        }
    }

    fn server_command(&self, config: &SyncConfig) -> Result<ServerCommand> {
        if self.command.is_empty() {
            return config.server_command();
        }
        let mut command = ServerCommand::from_words(self.command.iter().cloned())?;
        command.working_dir = config.working_dir.clone();
        command.env.extend(config.env.clone());
        Ok(command)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        2 => "trace",
        _ => "trace,tokio=debug", // -vvv shows everything including dependencies
    };

    // stdout carries relayed console output, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .with_target(cli.verbose >= 2)
        .with_thread_ids(cli.verbose >= 3)
        .with_line_number(cli.verbose >= 3)
        .init();

    debug!("mcsync started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            eprintln!("Error: {e:#}");
            1
        }
    };

    // a pending stdin read cannot be cancelled, so leave without waiting for it
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let mut config = load_config(cli.config.as_deref()).await?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    let command = cli.server_command(&config)?;
    let activity = Arc::new(PlayerActivity::new(Instant::now()));
    let handler = Arc::new(ConsoleHandler::new(Arc::clone(&activity), cli.json));
    let process = Arc::new(ServerProcess::new(command, config.classifier(), handler));

    let mode = if cli.json {
        RelayMode::Discard
    } else {
        RelayMode::Print
    };
    let (stop_relay, relay_stopped) = oneshot::channel();
    let relay = tokio::spawn(
        ConsoleRelay::new(process.buffer(), config.chunk_limit, mode)
            .run(config.relay_interval(), relay_stopped),
    );

    let monitor = config.idle_shutdown().map(|idle_limit| {
        let monitor = IdleMonitor::new(
            Arc::clone(&process),
            Arc::clone(&activity),
            config.list_interval(),
            idle_limit,
        );
        tokio::spawn(monitor.run())
    });

    let forwarder = tokio::spawn(forward_operator_input(Arc::clone(&process)));

    let status = process
        .poll()
        .await
        .with_context(|| format!("Server command failed: {}", process.command().display()))?;

    forwarder.abort();
    if let Some(monitor) = monitor {
        monitor.abort();
    }

    if tokio::time::timeout(HANDLER_GRACE_PERIOD, process.wait_for_handlers())
        .await
        .is_err()
    {
        warn!(
            in_flight = process.handlers_in_flight(),
            "Event handlers still running, cancelling"
        );
    }
    process.shutdown().await;

    let _ = stop_relay.send(());
    if let Err(e) = relay.await {
        warn!(error = %e, "Console relay task failed");
    }

    info!(code = ?status.code(), "mcsync finished");
    Ok(status.code().unwrap_or(1))
}

/// Forward lines typed by the operator to the server console
async fn forward_operator_input(process: Arc<ServerProcess>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => {
                if let Err(e) = process.write(&line).await {
                    warn!(error = %e, "Failed to forward command to server");
                }
            }
            Ok(None) => {
                debug!("Operator input closed");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read operator input");
                return;
            }
        }
    }
}
