use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use snapslot_core::app::{Allocation, AllocationMode};
use snapslot_core::impls::{HttpPhotoStore, SqliteCaptureStore};
use snapslot_core::observability;
use snapslot_core::{AutoSendLoop, SessionBuilder, SnapslotConfig, UploadSession};

#[derive(Debug, Parser)]
#[command(name = "snapslot", about = "Queue photos locally and deliver them to event slots")]
struct Cli {
    /// Config file; without it, defaults plus SNAPSLOT_* variables are used.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Queue an image file and try to send it right away
    Capture {
        file: PathBuf,

        /// Slot to overwrite when every slot is already filled
        #[arg(long)]
        slot: Option<u32>,
    },
    /// List captures not yet confirmed by the remote store
    Pending,
    /// Fetch the event listing and show this identity's slots
    Occupancy,
    /// Run one send pass now
    Send,
    /// Keep sending in the background until Ctrl-C
    Run,
    /// Drop every pending capture
    Clear,
    /// Pending count, occupancy and the last pass as JSON
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => SnapslotConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SnapslotConfig::from_env()?,
    };
    observability::init(config.log.profile);

    let session = Arc::new(build_session(&config)?);

    match cli.command {
        Command::Capture { file, slot } => capture(&session, &config, &file, slot).await,
        Command::Pending => {
            for record in session.pending_snapshot().await? {
                let slot = record
                    .target_slot
                    .map_or_else(|| "-".to_string(), |slot| slot.to_string());
                println!(
                    "{}\tslot {}\t{}\t{} bytes",
                    record.id,
                    slot,
                    record.created_at.to_rfc3339(),
                    record.image_bytes.len()
                );
            }
            Ok(())
        }
        Command::Occupancy => {
            let view = session.refresh_occupancy().await?;
            if let Some(name) = &view.event_name {
                println!("{name}");
            }
            for slot in &view.slots {
                let occupant = slot.occupant_id.as_deref().unwrap_or("-");
                println!("{:>4}  {occupant}", slot.slot.get());
            }
            println!(
                "{}/{} filled{}",
                view.filled_count,
                view.slots.len(),
                if view.is_at_capacity { " (full)" } else { "" }
            );
            Ok(())
        }
        Command::Send => {
            let report = session.trigger_send_now().await?;
            println!(
                "sent {} failed {} awaiting slot {}",
                report.sent, report.failed, report.deferred
            );
            Ok(())
        }
        Command::Run => run(session, &config).await,
        Command::Clear => {
            session.clear_pending().await?;
            println!("cleared");
            Ok(())
        }
        Command::Status => {
            let status = session.status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
    }
}

fn build_session(config: &SnapslotConfig) -> Result<UploadSession> {
    let identity = config.upload_identity()?;
    let store = SqliteCaptureStore::open(&config.queue.db_path)
        .with_context(|| format!("opening queue {}", config.queue.db_path.display()))?;
    let remote = HttpPhotoStore::new(config.remote.api_base.clone(), config.request_timeout())?;

    Ok(SessionBuilder::new(identity)
        .plan_limits(config.plan_limits())
        .store(Arc::new(store))
        .remote(Arc::new(remote))
        .build()?)
}

async fn capture(
    session: &UploadSession,
    config: &SnapslotConfig,
    file: &Path,
    slot: Option<u32>,
) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    if let Some(slot) = slot {
        session.select_replace_slot(slot).await?;
    }

    let queued = session
        .queue_capture(bytes, &config.nickname(), mime_for(file))
        .await?;
    let state = if session.is_pending(queued.id).await? {
        "queued"
    } else {
        "sent"
    };
    let (target, ignored) = describe_target(queued.allocation, slot);
    if let Some(note) = ignored {
        warn!(requested = ?slot, "{note}");
        eprintln!("{note}");
    }
    println!("{}\t{target}\t{state}", queued.id);
    Ok(())
}

/// Slot column for `capture`, plus a note when `--slot` had no effect.
fn describe_target(allocation: Option<Allocation>, requested: Option<u32>) -> (String, Option<String>) {
    let Some(allocation) = allocation else {
        let note = requested.map(|n| format!("--slot {n} not applied; occupancy unknown"));
        return ("slot pending (occupancy unknown)".to_string(), note);
    };
    let note = match requested {
        Some(n) if allocation.mode == AllocationMode::Append => Some(format!(
            "--slot {n} ignored; slot {} was free",
            allocation.slot
        )),
        _ => None,
    };
    (format!("slot {}", allocation.slot), note)
}

async fn run(session: Arc<UploadSession>, config: &SnapslotConfig) -> Result<()> {
    let send_loop = AutoSendLoop::spawn(session, config.send_interval());
    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    info!("shutting down");
    send_loop.shutdown_and_join().await;
    Ok(())
}

fn mime_for(file: &Path) -> &'static str {
    let ext = file
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}
