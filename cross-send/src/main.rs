//! cross-send - Background daemon for scheduled publishing
//!
//! Polls the scheduled-job queue every minute and refreshes expiring
//! tokens every hour. The daemon is the non-overlapping external trigger
//! the library's "run one pass" entry points expect.

use clap::Parser;
use libcrosspost::{CapabilityRegistry, Config, Database, PublishService, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "cross-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled publishing and token refresh")]
struct Cli {
    /// Seconds between due-job polls
    #[arg(long, value_name = "SECONDS", default_value_t = 60)]
    poll_interval: u64,

    /// Seconds between token refresh passes
    #[arg(long, value_name = "SECONDS", default_value_t = 3600)]
    refresh_interval: u64,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Run one job pass and one refresh pass, then exit (for testing)
    #[arg(long, hide = true)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config = Config::load()?;
    let db = Database::new(&config.database.path).await?;
    let registry = Arc::new(CapabilityRegistry::from_config(&config));
    let service = PublishService::new(db, registry, config.scheduler.clone());

    info!("cross-send daemon starting");

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    if cli.once {
        run_job_pass(&service).await;
        run_refresh_pass(&service).await;
        info!("cross-send: ran one pass of each, exiting");
    } else {
        run_daemon_loop(&service, &cli, shutdown).await;
    }

    info!("cross-send daemon stopped");
    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Set up signal handlers for graceful shutdown
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(|e| {
        libcrosspost::CrosspostError::InvalidInput(format!("Signal setup failed: {}", e))
    })?;

    let shutdown_clone = shutdown.clone();
    std::thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGTERM | SIGINT => {
                    info!("Received shutdown signal, stopping gracefully...");
                    shutdown_clone.store(true, Ordering::Relaxed);
                    break;
                }
                _ => {}
            }
        }
    });

    Ok(())
}

async fn run_daemon_loop(service: &PublishService, cli: &Cli, shutdown: Arc<AtomicBool>) {
    let mut secs_since_refresh = cli.refresh_interval; // refresh on first tick

    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, stopping daemon loop");
            break;
        }

        if secs_since_refresh >= cli.refresh_interval {
            run_refresh_pass(service).await;
            secs_since_refresh = 0;
        }

        run_job_pass(service).await;

        // Sleep until next poll, staying responsive to shutdown
        for _ in 0..cli.poll_interval {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            sleep(Duration::from_secs(1)).await;
            secs_since_refresh += 1;
        }
    }
}

async fn run_job_pass(service: &PublishService) {
    if let Err(e) = service.run_due_scheduled_jobs().await {
        error!("Scheduled job pass failed: {}", e);
    }
}

async fn run_refresh_pass(service: &PublishService) {
    if let Err(e) = service.refresh_expired_tokens().await {
        error!("Token refresh pass failed: {}", e);
    }
}
