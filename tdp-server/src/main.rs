use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tdp::config::CONFIG_FILE_NAME;
use tdp::BackupConfig;
use tdp_server::{commands, server};
use tracing::info;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    #[clap(short, long, global = true, default_value = "tdp.db")]
    database: String,
    /// TOML configuration file
    #[clap(short, long, global = true, default_value = CONFIG_FILE_NAME)]
    config: PathBuf,
    /// Overrides `media_root` from the file and environment
    #[clap(long, global = true)]
    media_root: Option<PathBuf>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Serve {
        #[clap(short, long, default_value = "3000")]
        port: u16,
        #[clap(long)]
        cors_origin: Option<String>,
    },
    /// Write `<PREFIX>_<YYYYMMDD>.zip` into a directory
    Export {
        #[clap(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// Restore an archive, replacing the collections it contains
    Restore {
        #[clap(short, long)]
        archive: PathBuf,
    },
    Migrate {
        #[clap(subcommand)]
        direction: server::MigrateDirection,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    let mut config = BackupConfig::load(Some(&args.config))?;
    if let Some(media_root) = args.media_root {
        config.media_root = media_root;
    }

    match args.command {
        Commands::Serve { port, cors_origin } => {
            info!("Starting server on port {}", port);
            server::start_server(port, &args.database, cors_origin.as_deref(), config).await?;
        }
        Commands::Export { output } => {
            let ctx = server::open_context(&args.database, config).await?;
            commands::export_to_dir(&ctx, &output).await?;
        }
        Commands::Restore { archive } => {
            let ctx = server::open_context(&args.database, config).await?;
            commands::restore_from_file(&ctx, &archive).await?;
        }
        Commands::Migrate { direction } => {
            info!("Running database migration: {:?}", direction);
            server::migrate_database(&args.database, direction).await?;
        }
    }

    Ok(())
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("hyper=info,{}", log_level)))
        .without_time()
        .init();
}
