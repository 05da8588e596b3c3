use anyhow::Result;
use clap::Parser;
use rdb_backup::cli::{Cli, Commands};
use rdb_backup::config::{self, Config, FileConfig};
use rdb_backup::BackupManager;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rdb_backup={}", level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Backup(args) => {
            let file = FileConfig::load(cli.config.as_deref())?;
            let level = cli
                .log_level
                .as_deref()
                .or(file.logging.level.as_deref())
                .unwrap_or("info");
            init_tracing(level);

            let config = Config::resolve(&args, &file)?;
            info!(
                "Backing up {} into {} (save mode: {:?})",
                config.snapshot.path.display(),
                config.backup_dir.display(),
                config.snapshot.mode
            );

            let summary = BackupManager::new(config).run().await?;
            if let Some(ref upload) = summary.upload {
                println!("{}", upload.url);
            } else if let Some(ref artifact) = summary.local_artifact {
                println!("{}", artifact.display());
            }
        }
        Commands::GenerateConfig { output } => {
            config::write_example_config(&output)?;
        }
    }

    Ok(())
}
