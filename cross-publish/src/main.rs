//! cross-publish - Trigger an immediate publish of a stored post

use std::sync::Arc;

use clap::Parser;
use libcrosspost::{CapabilityRegistry, Config, Database, PublishService, Result};

#[derive(Parser, Debug)]
#[command(name = "cross-publish")]
#[command(about = "Publish a stored post to its target platforms now", long_about = None)]
struct Cli {
    /// Organization that owns the post
    #[arg(long)]
    org: String,

    /// Post id to publish
    post_id: String,

    /// Initiate the publish and return without waiting for completion
    #[arg(long)]
    detach: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_writer(std::io::stderr)
            .init();
    } else {
        libcrosspost::logging::init_default();
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let db = Database::new(&config.database.path).await?;
    let registry = Arc::new(CapabilityRegistry::from_config(&config));
    let service = PublishService::new(db.clone(), registry, config.scheduler.clone());

    if cli.detach {
        service.spawn_publish(&cli.org, &cli.post_id).await?;
        println!("Publish of post {} initiated", cli.post_id);
        return Ok(());
    }

    service.publish_post(&cli.org, &cli.post_id).await?;

    // Report the per-target outcome the orchestration recorded
    let post = db
        .get_post(&cli.org, &cli.post_id)
        .await?
        .ok_or_else(|| libcrosspost::CrosspostError::PostNotFound(cli.post_id.clone()))?;

    println!("Post {}: {}", post.id, post.status.as_str());
    for target in &post.targets {
        match (&target.platform_post_id, &target.error_message) {
            (Some(id), _) => println!("  {} -> {}", target.account_id, id),
            (None, Some(error)) => println!("  {} -> FAILED: {}", target.account_id, error),
            (None, None) => println!("  {} -> {}", target.account_id, target.status.as_str()),
        }
    }

    Ok(())
}
