use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use qrtrack::analytics::export::to_csv;
use qrtrack::config::Config;
use qrtrack::models::QrCode;
use qrtrack::storage::{self, Storage};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "qrtrack-admin")]
#[command(about = "qrtrack QR code management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all QR codes with their scan counts
    List,
    /// Stop redirecting a short code
    Deactivate {
        /// Short code (case-insensitive)
        code: String,
    },
    /// Resume redirecting a short code
    Reactivate {
        /// Short code (case-insensitive)
        code: String,
    },
    /// Delete a QR code with all of its scans and analytics
    Delete {
        /// Short code (case-insensitive)
        code: String,
    },
    /// Export every scan of a short code as CSV
    Export {
        /// Short code (case-insensitive)
        code: String,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

async fn find(storage: &dyn Storage, code: &str) -> Result<QrCode> {
    storage
        .get_qr_code_by_short_code(code)
        .await?
        .with_context(|| format!("no QR code with short code '{code}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let storage = storage::connect(&config.database).await?;

    match cli.command {
        Commands::List => {
            let codes = storage.list_qr_codes().await?;
            if codes.is_empty() {
                println!("No QR codes found.");
            } else {
                println!(
                    "{:<6} {:<12} {:<8} {:>8}  {}",
                    "ID", "Code", "Active", "Scans", "Title"
                );
                println!("{}", "-".repeat(80));
                for qr in codes {
                    println!(
                        "{:<6} {:<12} {:<8} {:>8}  {}",
                        qr.id,
                        qr.short_code,
                        if qr.is_active { "yes" } else { "no" },
                        qr.scans,
                        qr.display_title()
                    );
                }
            }
        }
        Commands::Deactivate { code } => {
            let qr = find(storage.as_ref(), &code).await?;
            storage.set_active(qr.id, false).await?;
            println!("✓ Deactivated '{}'", qr.short_code);
        }
        Commands::Reactivate { code } => {
            let qr = find(storage.as_ref(), &code).await?;
            storage.set_active(qr.id, true).await?;
            println!("✓ Reactivated '{}'", qr.short_code);
        }
        Commands::Delete { code } => {
            let qr = find(storage.as_ref(), &code).await?;
            if storage.delete_qr_code(qr.id).await? {
                println!("✓ Deleted '{}' and its scan history", qr.short_code);
            } else {
                println!("⚠ '{}' was already gone", qr.short_code);
            }
        }
        Commands::Export { code, output } => {
            let qr = find(storage.as_ref(), &code).await?;
            let events = storage.list_scan_events(qr.id, None).await?;
            let csv = to_csv(&events, qr.display_title());
            match output {
                Some(path) => {
                    std::fs::write(&path, csv)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("✓ Wrote {} scans to {}", events.len(), path.display());
                }
                None => println!("{csv}"),
            }
        }
    }

    Ok(())
}
