//! CLI entry point for the lanwatch discovery daemon and inventory tools.

use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};

use lanwatch_core::{Device, InventoryStats};
use lanwatch_store::InventoryStore;

use lanwatch_discover::config::{self, DiscoverConfig};
use lanwatch_discover::control::{self, ControlRequest, ControlResponse, ControlSurface};
use lanwatch_discover::scanner::ArpScanner;
use lanwatch_discover::scheduler::ScanLoop;
use lanwatch_discover::target::ScanTarget;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Parser)]
#[command(name = "lanwatch")]
#[command(about = "ARP sweep daemon and device inventory for a local subnet")]
struct Cli {
    /// Config file prefix (default: lanwatch).
    #[arg(short, long, default_value = "lanwatch", global = true)]
    config: String,

    /// Override the inventory database path.
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scan loop and control socket until interrupted.
    Daemon,
    /// Run a single sweep and exit.
    Once {
        /// Subnet to sweep (default: configured default_subnet).
        #[arg(short, long)]
        subnet: Option<String>,
    },
    /// List every device in the inventory.
    Devices,
    /// Show inventory statistics.
    Stats,
    /// Show recent device events.
    Logs {
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Export devices to a JSON file.
    Export {
        #[arg(short, long, default_value = "devices_export.json")]
        output: String,
    },
    /// Remove devices not seen for the given number of days.
    Purge {
        /// Retention in days (default: configured retention_days).
        #[arg(short, long)]
        days: Option<u32>,
    },
    /// Add or overwrite a device manually.
    Add {
        #[arg(long)]
        ip: String,
        #[arg(long)]
        mac: String,
        #[arg(long, default_value = "")]
        name: String,
        /// Subnet label (default: configured default_subnet).
        #[arg(long)]
        subnet: Option<String>,
    },
    /// Edit a device's name and/or subnet.
    Edit {
        #[arg(long)]
        ip: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        subnet: Option<String>,
    },
    /// Change the scan target of a running daemon.
    Target {
        /// New subnet specifier, e.g. 192.168.1.0/24.
        subnet: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let mut discover_config = config::load(&cli.config)?;
    if let Some(path) = &cli.database {
        discover_config.database_path = path.clone();
    }

    match cli.command {
        Command::Daemon => run_daemon(discover_config).await,
        Command::Once { subnet } => run_once(discover_config, subnet).await,
        Command::Target { subnet } => send_target(&discover_config, subnet).await,
        Command::Devices => {
            let (_, surface) = open_local(&discover_config)?;
            print_devices(&surface.list_devices().await?);
            Ok(())
        }
        Command::Stats => {
            let (_, surface) = open_local(&discover_config)?;
            print!("{}", render_stats(&surface.stats().await?));
            Ok(())
        }
        Command::Logs { limit } => {
            let (_, surface) = open_local(&discover_config)?;
            for event in surface.logs(limit).await? {
                println!(
                    "{}  {:<12} {:<15} {}",
                    event.timestamp.format(TIME_FORMAT),
                    event.event_type.as_str(),
                    event.ip,
                    event.mac
                );
            }
            Ok(())
        }
        Command::Export { output } => {
            let (_, surface) = open_local(&discover_config)?;
            let devices = surface.list_devices().await?;
            std::fs::write(&output, serde_json::to_string_pretty(&devices)?)?;
            println!("Exported {} devices to {output}", devices.len());
            Ok(())
        }
        Command::Purge { days } => {
            let (store, _) = open_local(&discover_config)?;
            let days = days.unwrap_or(discover_config.retention_days);
            purge(&store, days)
        }
        Command::Add {
            ip,
            mac,
            name,
            subnet,
        } => {
            let (_, surface) = open_local(&discover_config)?;
            let subnet = subnet.unwrap_or_else(|| discover_config.default_subnet.clone());
            if surface.add_device(&ip, &mac, &name, &subnet).await? {
                println!("Added new device with IP {ip}");
            } else {
                println!("Updated device with IP {ip}");
            }
            Ok(())
        }
        Command::Edit { ip, name, subnet } => {
            if name.is_none() && subnet.is_none() {
                anyhow::bail!("Nothing to change: pass --name and/or --subnet");
            }
            let (_, surface) = open_local(&discover_config)?;
            if !surface.update_device(&ip, name, subnet).await? {
                anyhow::bail!("Device not found: {ip}");
            }
            println!("Device updated.");
            Ok(())
        }
    }
}

async fn run_daemon(config: DiscoverConfig) -> anyhow::Result<()> {
    let store = InventoryStore::open(&config.database_path)?;

    let scanner = ArpScanner::from_config(&config);
    match scanner.verify_installation().await {
        Ok(version) => tracing::info!(arp_scan_version = %version, "arp-scan verified"),
        Err(e) => tracing::warn!(error = %e, "arp-scan unavailable, sweeps will record empty scans"),
    }

    let target = ScanTarget::new(config.default_subnet.clone());
    let surface = ControlSurface::new(store.clone(), target.clone(), config.default_log_limit);

    let listener = TcpListener::bind(&config.control_addr).await?;
    let (stop_tx, stop_rx) = watch::channel(false);
    let server = tokio::spawn(control::serve(listener, surface, stop_rx));

    let scan_loop = ScanLoop::new(&config, Arc::new(scanner), store, target).spawn();

    wait_for_shutdown().await?;
    tracing::info!("Shutdown requested, stopping daemon");

    let _ = stop_tx.send(true);
    scan_loop.shutdown().await?;
    server.await??;

    tracing::info!("Daemon stopped");
    Ok(())
}

async fn run_once(config: DiscoverConfig, subnet: Option<String>) -> anyhow::Result<()> {
    let store = InventoryStore::open(&config.database_path)?;
    let target = ScanTarget::new(subnet.unwrap_or_else(|| config.default_subnet.clone()));
    let scanner = ArpScanner::from_config(&config);

    let summary = ScanLoop::new(&config, Arc::new(scanner), store, target)
        .run_cycle()
        .await?;

    println!(
        "Scanned {}: {} devices found, {} new ({} ms){}",
        summary.subnet,
        summary.devices_found,
        summary.new_devices,
        summary.duration.as_millis(),
        if summary.probe_failed { " [probe failed]" } else { "" }
    );
    Ok(())
}

async fn send_target(config: &DiscoverConfig, subnet: String) -> anyhow::Result<()> {
    let addr: SocketAddr = config.control_addr.parse()?;
    let request = ControlRequest::Scan {
        subnet: Some(subnet),
    };

    match control::send_request(addr, &request).await? {
        ControlResponse::Ok { message, .. } => {
            println!("{}", message.unwrap_or_else(|| "ok".to_string()));
            Ok(())
        }
        ControlResponse::NotFound { message } | ControlResponse::Error { message } => {
            anyhow::bail!("daemon rejected target change: {message}")
        }
    }
}

/// Open the inventory directly, for commands that do not need the daemon.
fn open_local(config: &DiscoverConfig) -> anyhow::Result<(InventoryStore, ControlSurface)> {
    let store = InventoryStore::open(&config.database_path)?;
    let surface = ControlSurface::new(
        store.clone(),
        ScanTarget::new(config.default_subnet.clone()),
        config.default_log_limit,
    );
    Ok((store, surface))
}

/// `now` minus `days`, or an error when that falls outside the calendar.
fn retention_cutoff(now: DateTime<Utc>, days: u32) -> anyhow::Result<DateTime<Utc>> {
    Duration::try_days(i64::from(days))
        .and_then(|span| now.checked_sub_signed(span))
        .ok_or_else(|| anyhow::anyhow!("Retention of {days} days is out of range"))
}

fn purge(store: &InventoryStore, days: u32) -> anyhow::Result<()> {
    let cutoff = retention_cutoff(Utc::now(), days)?;
    let removed = store.purge_before(cutoff)?;
    if removed == 0 {
        println!("No devices found older than {days} days.");
    } else {
        println!(
            "Removed {removed} devices not seen since {}.",
            cutoff.format(TIME_FORMAT)
        );
    }
    Ok(())
}

fn render_stats(stats: &InventoryStats) -> String {
    let mut out = String::from("\n===== Inventory Statistics =====\n");
    let _ = writeln!(out, "Total devices: {}", stats.device_count);
    let _ = writeln!(out, "Total scans: {}", stats.scan_count);
    let _ = writeln!(out, "Total events: {}", stats.event_count);

    if let Some(scan) = &stats.latest_scan {
        let _ = writeln!(out, "\nLatest scan: {}", scan.timestamp.format(TIME_FORMAT));
        let _ = writeln!(out, "  Subnet: {}", scan.subnet);
        let _ = writeln!(out, "  Devices found: {}", scan.devices_found);
        let _ = writeln!(out, "  New devices: {}", scan.new_devices);
    }

    if !stats.recent_devices.is_empty() {
        out.push_str("\nRecently discovered:\n");
        for d in &stats.recent_devices {
            let _ = writeln!(out, "  {:<15} {}", d.ip, d.first_seen.format(TIME_FORMAT));
        }
    }

    if !stats.subnet_stats.is_empty() {
        out.push_str("\nDevices by subnet:\n");
        for s in &stats.subnet_stats {
            let _ = writeln!(out, "  {}: {} devices", s.subnet, s.device_count);
        }
    }

    out
}

fn print_devices(devices: &[Device]) {
    if devices.is_empty() {
        println!("No devices found in inventory.");
        return;
    }

    println!(
        "\n{:<15} {:<17} {:<20} {:<18} {:<20} {:<20}",
        "IP", "MAC", "Name", "Subnet", "First Seen", "Last Seen"
    );
    println!("{}", "-".repeat(115));
    for d in devices {
        println!(
            "{:<15} {:<17} {:<20} {:<18} {:<20} {:<20}",
            d.ip,
            d.mac,
            if d.name.is_empty() { "(unnamed)" } else { d.name.as_str() },
            d.subnet,
            d.first_seen.format(TIME_FORMAT).to_string(),
            d.last_seen.format(TIME_FORMAT).to_string(),
        );
    }
    println!("\nTotal: {} devices", devices.len());
}

/// Wait for Ctrl-C, or SIGTERM on Unix.
async fn wait_for_shutdown() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}
