//! PSI/VHT Bridge Relay
//!
//! Connects to a message hub, relays PSI utterances and positions to the
//! virtual human toolkit, and optionally answers launcher control queries.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpStream;
use tracing::{info, warn};

use vhbridge_core::config::load_config;
use vhbridge_core::launcher::LauncherExit;
use vhbridge_core::tracing_init::{DEFAULT_FILTER, LogFormat, init_tracing};
use vhbridge_relay::bridge::Bridge;
use vhbridge_relay::transport;

#[derive(Parser, Debug)]
#[command(name = "vhbridge-relay")]
#[command(version, about = "PSI/VHT bridge relay - routes PSI messages to virtual humans")]
struct Args {
    /// Message hub address.
    #[arg(long, env = "VHBRIDGE_CONNECT", default_value = "127.0.0.1:15000")]
    connect: String,

    /// Config file layered over the global settings.
    #[arg(long, env = "VHBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Character to address; overrides the configured default.
    #[arg(long)]
    character: Option<String>,

    /// Answer launcher control messages.
    #[arg(long, env = "VHBRIDGE_LAUNCHER")]
    launcher: bool,

    /// Ask the launcher which character is loaded before relaying.
    #[arg(long, env = "VHBRIDGE_QUERY_CHARACTER")]
    query_character: bool,

    /// Directory reported in `launcher path` replies (default: current dir).
    #[arg(long)]
    working_dir: Option<PathBuf>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(DEFAULT_FILTER, LogFormat::from_json_flag(args.log_json));

    info!(
        version = env!("CARGO_PKG_VERSION"),
        connect = %args.connect,
        "Starting vhbridge-relay"
    );

    let mut config = load_config(args.config.as_deref())?;
    if let Some(character) = args.character {
        config.launcher.default_character = character;
        config.validate()?;
    }

    let stream = TcpStream::connect(&args.connect).await?;
    info!(addr = %args.connect, "Connected");
    let (transport, reader) = transport::split(stream);

    let bridge = Bridge::new(&config, transport);
    let reader = tokio::spawn(reader.run(bridge.sink()));

    if args.query_character {
        match bridge
            .query_character(config.launcher.character_query_timeout())
            .await
        {
            Ok(name) => info!(character = %name, "Using launcher character"),
            Err(e) => warn!(
                error = %e,
                character = %config.launcher.default_character,
                "Character query failed, keeping default"
            ),
        }
    }

    let consumer = bridge.spawn_consumer();
    let launcher = if args.launcher {
        let working_dir = match args.working_dir {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };
        Some(bridge.spawn_launcher(working_dir))
    } else {
        None
    };

    let renderer_ended = async {
        match launcher {
            Some(handle) => matches!(handle.await, Ok(LauncherExit::RendererEnded)),
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
        result = reader => match result {
            Ok(frames) => info!(frames, "Connection ended, shutting down"),
            Err(e) => warn!(error = %e, "Reader task failed"),
        },
        ended = renderer_ended => {
            if ended {
                info!("Renderer ended, shutting down");
            }
        }
    }

    bridge.close();
    let stats = consumer.await?;
    info!(
        published = stats.published,
        failed = stats.failed,
        unrouted = stats.unrouted,
        "vhbridge-relay stopped"
    );
    Ok(())
}
