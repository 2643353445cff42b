//! fintrack-sync - Device-to-device sync for the finance tracker
//!
//! This is the composition root that wires together all the components.

use clap::{Parser, Subcommand};
use fintrack_sync::adapters::outbound::{LineCaptureDevice, SqliteStore, StdoutFrameDisplay};
use fintrack_sync::infrastructure::shutdown_signal;
use fintrack_sync::{
    load_config, CloneSession, Codec, IdentityStore, ReceiveInput, SyncService, TransportKind, UserIdentity,
    WireVersion,
};
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(version, about = "Sync a local finance snapshot between devices", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Sign in an identity on this device
    Login {
        /// Identity id
        #[arg(long)]
        id: String,

        /// Display name
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: Option<String>,

        /// API credential to store for this identity
        #[arg(long)]
        credential: Option<String>,
    },
    /// Broadcast the signed-in snapshot as frames on stdout until Ctrl+C
    Show,
    /// Read frames from stdin and replace the local snapshot
    Scan,
    /// Decode a wire string and print a summary
    Inspect {
        /// Wire string (FINT_V2:..., FINT_C_V1:...)
        wire: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging on stderr; stdout carries frames
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Inspect { wire } = &cli.command {
        return inspect(wire);
    }

    // ===== COMPOSITION ROOT =====
    let store = Arc::new(SqliteStore::open(&cfg.db_path).await?);
    tracing::info!("starting fintrack-sync db={} origin={}", cfg.db_path, cfg.origin);

    match cli.command {
        Commands::Login {
            id,
            name,
            email,
            credential,
        } => {
            let identity = UserIdentity {
                id,
                name,
                email,
            };
            store.save_identity(&identity).await?;
            if credential.is_some() {
                store.save_credential(credential.as_deref()).await?;
            }
            println!("signed in as {} ({})", identity.name, identity.id);
        }
        Commands::Show => {
            let sync_config = cfg.to_sync_config().transport(TransportKind::Broadcast);
            let service = SyncService::new(store.clone(), sync_config)
                .with_display(Arc::new(StdoutFrameDisplay));

            let CloneSession::Broadcast(session) = service.start_clone().await? else {
                anyhow::bail!("broadcast transport expected");
            };
            tracing::info!("broadcasting {} frames, press Ctrl+C to stop", session.frame_count());

            shutdown_signal().await;
            session.stop();
        }
        Commands::Scan => {
            let service = SyncService::new(store.clone(), cfg.to_sync_config());
            let camera = LineCaptureDevice::stdin();

            let report = service.receive(ReceiveInput::Camera(&camera)).await?;
            println!(
                "received {} transactions and {} accounts for {} ({})",
                report.transactions, report.accounts, report.identity.name, report.identity.id
            );
        }
        Commands::Inspect { .. } => {}
    }

    Ok(())
}

fn inspect(wire: &str) -> anyhow::Result<()> {
    let version = WireVersion::detect(wire.trim())
        .map(|(v, _)| v.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let payload = Codec::standard().decode(wire)?;
    let snapshot = &payload.snapshot;

    println!("version:      {}", version);
    println!("identity:     {} ({})", payload.identity.name, payload.identity.id);
    println!("transactions: {}", snapshot.transactions.len());
    println!("accounts:     {}", snapshot.accounts.len());
    println!("categories:   {}", snapshot.transaction_categories.len());
    println!("last updated: {}", snapshot.last_updated);
    println!("credential:   {}", if payload.credential.is_some() { "yes" } else { "no" });
    Ok(())
}
