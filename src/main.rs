//! XP-Pen Innovator 16 frame button remapper
//!
//! Main entry point.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use xppen_remap::config::RemapConfig;
use xppen_remap::device::list_devices;
use xppen_remap::{hwdb, session};

#[derive(Parser)]
#[command(name = "xppen-remap")]
#[command(author, version, about = "Frame button remapper for the XP-Pen Innovator 16")]
struct Cli {
    /// Config file path (default: ~/.config/xppen-remap/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// List input devices and show which ones would be taken over
    #[arg(long)]
    list: bool,

    /// Print the effective configuration as TOML
    #[arg(long)]
    print_config: bool,

    /// Print the udev hwdb rule that pre-maps the tablet's scancodes
    #[arg(long)]
    print_hwdb: bool,

    /// Read the tablet without grabbing it and log what would be typed
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Load config
    let config_path = cli.config.unwrap_or_else(RemapConfig::default_path);
    info!("Loading config from {:?}", config_path);
    let config = RemapConfig::load(&config_path)?;

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }
    if cli.print_hwdb {
        print!("{}", hwdb::render(config.vendor_id, config.product_id));
        return Ok(());
    }
    if cli.list {
        return list(&config);
    }

    session::run(&config, cli.dry_run).await
}

/// Print every input device, marking the tablet sources
fn list(config: &RemapConfig) -> Result<()> {
    let devices = list_devices(&config.device_filter()?);
    if devices.is_empty() {
        println!("No input devices readable (try running as root or joining the input group)");
        return Ok(());
    }
    for dev in devices {
        let marker = match dev.kind {
            Some(kind) => format!("[{kind}]"),
            None => String::new(),
        };
        println!(
            "{:<20} {:04x}:{:04x}  {} {}",
            dev.path.display(),
            dev.vendor,
            dev.product,
            dev.name,
            marker
        );
    }
    Ok(())
}
