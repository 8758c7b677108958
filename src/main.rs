use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::{error, info, warn};
use tokio::sync::mpsc;

use recolte::configuration::config::Config;
use recolte::configuration::types::SessionConfig;
use recolte::session_management::{SessionController, SessionEvent};
use recolte::storage::FileDestination;

#[derive(Parser)]
#[command(name = "recolte")]
#[command(version)]
#[command(about = "CSI acquisition from an ESP32 sensing node over UDP")]
struct Args {
    /// Optional TOML file overriding the network profile
    #[arg(long, global = true)]
    profile: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Wait for a node to announce itself and print its address
    Discover {
        /// How long to wait for an announcement, in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Run a timed collection session against a known node
    Collect {
        /// IPv4 address of the sensing node
        #[arg(long)]
        peer: String,
        /// Session length in seconds
        #[arg(long)]
        duration: u64,
        /// Scenario label stored with every record
        #[arg(long)]
        scenario: String,
        /// Path of the SQLite file to produce
        #[arg(long)]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    let args = Args::parse();

    let config = match args.profile {
        Some(ref path) => match Config::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Unable to import configuration from file: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };

    let (events_tx, events_rx) = mpsc::channel(100);
    let controller = SessionController::new(config.net.clone(), events_tx);

    let outcome = match args.command {
        Command::Discover { timeout } => {
            let wait_for = timeout
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.net.discovery_timeout());
            run_discovery(&controller, events_rx, wait_for).await
        }
        Command::Collect {
            peer,
            duration,
            scenario,
            out,
        } => {
            let session = SessionConfig {
                peer_addr: peer,
                duration_secs: duration,
                scenario,
            };
            run_collection(&controller, events_rx, session, out).await
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(()) => ExitCode::FAILURE,
    }
}

async fn run_discovery(
    controller: &SessionController,
    mut events: mpsc::Receiver<SessionEvent>,
    wait_for: Duration,
) -> Result<(), ()> {
    if let Err(e) = controller.start_discovery(wait_for).await {
        error!("Unable to start discovery: {}", e);
        return Err(());
    }

    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::DiscoveryStarted { port } => {
                info!(
                    "Listening for announcements on port {} ({} s)",
                    port,
                    wait_for.as_secs()
                );
            }
            SessionEvent::PeerDiscovered { addr } => {
                println!("{}", addr);
                return Ok(());
            }
            SessionEvent::DiscoveryTimedOut => {
                error!("No node announced itself within the wait window");
                return Err(());
            }
            SessionEvent::DiscoveryFailed { error } => {
                error!("Discovery failed: {}", error);
                return Err(());
            }
            other => warn!("Unexpected event during discovery: {:?}", other),
        }
    }
    error!("Event channel closed before discovery finished");
    Err(())
}

async fn run_collection(
    controller: &SessionController,
    mut events: mpsc::Receiver<SessionEvent>,
    session: SessionConfig,
    out: PathBuf,
) -> Result<(), ()> {
    let destination = Arc::new(FileDestination::new(&out));
    if let Err(e) = controller
        .start_collection(session, Some(destination))
        .await
    {
        error!("Unable to start collection: {}", e);
        return Err(());
    }

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!("Unable to listen for the interrupt signal: {}", e);
                }
                info!("Interrupt received, stopping the session");
                controller.stop_collection();
            }
            event = events.recv() => {
                let Some(event) = event else {
                    error!("Event channel closed before the session finished");
                    return Err(());
                };
                match event {
                    SessionEvent::CollectionStarted { session_id, data_port } => {
                        info!("[{}] Receiving on port {}", session_id, data_port);
                    }
                    SessionEvent::PeerAcknowledged { session_id } => {
                        info!("[{}] Node acknowledged the start command", session_id);
                    }
                    SessionEvent::Progress { session_id, buffered } => {
                        info!("[{}] {} record(s) buffered", session_id, buffered);
                    }
                    SessionEvent::ListenerFailed { session_id, error } => {
                        error!("[{}] Receive loop failed: {}", session_id, error);
                    }
                    SessionEvent::CollectionStopped { session_id, reason } => {
                        info!("[{}] Collection stopped: {:?}", session_id, reason);
                    }
                    SessionEvent::CommitCompleted { session_id, report } => {
                        info!(
                            "[{}] Saved {}/{} record(s) to {}",
                            session_id,
                            report.saved,
                            report.total,
                            out.display()
                        );
                        match serde_json::to_string_pretty(&report) {
                            Ok(json) => println!("{}", json),
                            Err(e) => warn!("Unable to render the report: {}", e),
                        }
                        return Ok(());
                    }
                    SessionEvent::CommitFailed { session_id, error } => {
                        error!("[{}] Unable to persist the session: {}", session_id, error);
                        return Err(());
                    }
                    other => warn!("Unexpected event during collection: {:?}", other),
                }
            }
        }
    }
}
