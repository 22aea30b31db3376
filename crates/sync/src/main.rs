use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use workerdesk_core::{BackendId, FrontendId, ProfileUpdate, WorkerStatus};
use workerdesk_sync::{ConnectivityMonitor, SyncConfig, WorkerSyncService};

#[derive(Parser)]
#[command(name = "workerdesk", about = "Worker identity reconciliation and offline sync")]
struct Cli {
    /// Human-readable logs instead of JSON
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe the worker API and record the offline flag
    Probe,
    /// Fetch all workers with stable frontend ids
    List,
    /// Set a worker's status (queued when the API is unavailable)
    SetStatus {
        /// Frontend id (e.g. ravi_9876543210)
        id: FrontendId,
        /// active, inactive, pending or rejected
        status: WorkerStatus,
        #[arg(long, default_value = "")]
        religion: String,
    },
    /// Approve a worker
    Approve {
        id: FrontendId,
        #[arg(long, default_value = "")]
        religion: String,
    },
    /// Reject a worker
    Reject {
        id: FrontendId,
        #[arg(long, default_value = "")]
        religion: String,
    },
    /// Deactivate a worker
    Deactivate {
        id: FrontendId,
        #[arg(long, default_value = "")]
        religion: String,
    },
    /// Reactivate a worker
    Activate {
        id: FrontendId,
        #[arg(long, default_value = "")]
        religion: String,
    },
    /// Update profile fields; unset flags keep their current values
    Profile {
        id: FrontendId,
        #[arg(long)]
        status: Option<WorkerStatus>,
        #[arg(long)]
        religion: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        service: Option<String>,
        #[arg(long)]
        availability: Option<String>,
    },
    /// Delete a worker and purge its local mappings
    Delete { id: FrontendId },
    /// Rebuild id mappings from the current roster
    SyncMappings,
    /// Replay queued changes
    Replay,
    /// Print the id mapping tables
    Mappings,
    /// Check the seed workers resolve to their expected backend ids
    Verify,
    /// List queued changes
    Pending,
    /// Drop learned mappings, keeping the seed workers
    ResetMappings,
    /// Override a single mapping
    SetMapping {
        /// Frontend id or phone digits
        key: String,
        backend_id: BackendId,
    },
    /// Poll connectivity and sync on reconnect until Ctrl-C
    Watch,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.pretty {
        workerdesk_observability::init_pretty();
    } else {
        workerdesk_observability::init();
    }

    let config = SyncConfig::from_env().context("invalid configuration")?;
    let service = Arc::new(
        WorkerSyncService::connect(&config)
            .await
            .context("failed to start worker sync")?,
    );

    match cli.command {
        Commands::Probe => {
            let online = service.test_connection().await;
            print_json(&serde_json::json!({ "online": online }))?;
        }
        Commands::List => print_json(&service.get_all_workers().await?)?,
        Commands::SetStatus { id, status, religion } => {
            let outcome = service
                .update_worker_status(&id, status, &religion)
                .await?;
            print_json(&outcome)?;
        }
        Commands::Approve { id, religion } => {
            print_json(&service.approve_worker(&id, &religion).await?)?
        }
        Commands::Reject { id, religion } => {
            print_json(&service.reject_worker(&id, &religion).await?)?
        }
        Commands::Deactivate { id, religion } => {
            print_json(&service.deactivate_worker(&id, &religion).await?)?
        }
        Commands::Activate { id, religion } => {
            print_json(&service.activate_worker(&id, &religion).await?)?
        }
        Commands::Profile {
            id,
            status,
            religion,
            phone,
            email,
            address,
            service: worker_service,
            availability,
        } => {
            let updates = ProfileUpdate {
                status,
                religion,
                phone,
                email,
                address,
                service: worker_service,
                availability,
            };
            if updates.is_empty() {
                anyhow::bail!("no profile fields given");
            }
            let current = service
                .get_all_workers()
                .await?
                .into_iter()
                .find(|w| w.id == id)
                .with_context(|| format!("worker {} not found", id))?;
            print_json(&service.update_worker_profile(&id, &updates, &current).await?)?;
        }
        Commands::Delete { id } => {
            service.delete_worker(&id).await?;
            print_json(&serde_json::json!({ "deleted": id }))?;
        }
        Commands::SyncMappings => print_json(&service.sync_worker_mappings().await?)?,
        Commands::Replay => print_json(&service.sync_pending_worker_changes().await?)?,
        Commands::Mappings => print_json(&service.get_id_mappings())?,
        Commands::Verify => {
            let report = service.verify_critical_worker_ids().await;
            print_json(&report)?;
            if !report.success {
                anyhow::bail!("critical worker ids do not match");
            }
        }
        Commands::Pending => print_json(&service.pending_changes().await?)?,
        Commands::ResetMappings => {
            service.reset_id_mappings();
            print_json(&service.get_id_mappings())?;
        }
        Commands::SetMapping { key, backend_id } => {
            service.set_id_mapping(&key, backend_id);
            print_json(&service.get_id_mappings())?;
        }
        Commands::Watch => {
            let monitor = ConnectivityMonitor::new(service.clone(), config.poll_interval);
            let shutdown = monitor.shutdown_handle();
            let handle = monitor.start();

            tokio::signal::ctrl_c().await?;
            tracing::info!("shutting down");
            shutdown.notify_one();
            handle.await?;
        }
    }

    Ok(())
}
