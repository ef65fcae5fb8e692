use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;

use config::SnapConfig;

#[derive(Parser, Debug)]
#[command(name = "snap")]
#[command(about = "Upload, resolve and repair snapvault media")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a local image and print the receipt
    Upload {
        file: PathBuf,

        /// Owner of the uploaded object
        #[arg(long)]
        user: String,

        /// Tag used in the object key, e.g. snap, story, memory
        #[arg(long, default_value = "snap")]
        purpose: String,

        /// simple, direct or robust
        #[arg(long, default_value = "robust")]
        policy: String,
    },

    /// Resolve a stored media reference to a displayable URL
    Resolve {
        reference: String,

        #[arg(long, default_value = "cli")]
        consumer: String,

        /// Also check the URL serves a non-empty body
        #[arg(long)]
        probe: bool,
    },

    /// Report bad media references and zero-byte objects
    Scan,

    /// Repair what `scan` finds
    Cleanup {
        /// Only report what would be repaired
        #[arg(long)]
        dry_run: bool,
    },

    /// Expire messages now and every 30 minutes
    Sweep {
        /// Run a single sweep and exit
        #[arg(long)]
        once: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = SnapConfig::from_env()?;

    match cli.command {
        Command::Upload {
            file,
            user,
            purpose,
            policy,
        } => commands::upload(&config, &file, &user, &purpose, &policy).await,
        Command::Resolve {
            reference,
            consumer,
            probe,
        } => commands::resolve(&config, &reference, &consumer, probe).await,
        Command::Scan => commands::scan(&config).await,
        Command::Cleanup { dry_run } => commands::cleanup(&config, dry_run).await,
        Command::Sweep { once } => commands::sweep(&config, once).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_defaults() {
        let cli = Cli::try_parse_from(["snap", "upload", "a.jpg", "--user", "userA"]).unwrap();
        match cli.command {
            Command::Upload { purpose, policy, .. } => {
                assert_eq!(purpose, "snap");
                assert_eq!(policy, "robust");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn cleanup_dry_run_flag() {
        let cli = Cli::try_parse_from(["snap", "cleanup", "--dry-run"]).unwrap();
        assert!(matches!(cli.command, Command::Cleanup { dry_run: true }));
    }

    #[test]
    fn upload_requires_user() {
        assert!(Cli::try_parse_from(["snap", "upload", "a.jpg"]).is_err());
    }
}
