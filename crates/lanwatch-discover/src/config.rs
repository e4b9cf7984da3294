//! Configuration for the lanwatch discovery daemon.

use std::time::Duration;

use serde::Deserialize;

/// Top-level discover configuration.
///
/// Loaded from `lanwatch.toml` `[discover]` section or
/// `LANWATCH__DISCOVER__` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverConfig {
    /// SQLite inventory file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Scan target used until the control surface changes it.
    #[serde(default = "default_subnet")]
    pub default_subnet: String,

    /// Sleep between sweeps, in seconds.
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,

    /// Upper bound on a single sweep, in seconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Path to the arp-scan binary (default: "arp-scan").
    #[serde(default = "default_arp_scan_path")]
    pub arp_scan_path: String,

    /// Network interface for arp-scan; arp-scan picks one when unset.
    #[serde(default)]
    pub interface: Option<String>,

    /// Listen address of the control socket.
    #[serde(default = "default_control_addr")]
    pub control_addr: String,

    /// Devices not seen for this many days are removed by `purge`.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Number of device events returned by `logs` when no limit is given.
    #[serde(default = "default_log_limit")]
    pub default_log_limit: usize,
}

impl DiscoverConfig {
    /// Sleep between sweeps, never less than one second.
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs.max(1))
    }

    /// Probe timeout, never less than one second.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.max(1))
    }
}

fn default_database_path() -> String {
    "network_devices.db".to_string()
}

fn default_subnet() -> String {
    "10.0.0.1/20".to_string()
}

fn default_scan_interval() -> u64 {
    60
}

fn default_probe_timeout() -> u64 {
    30
}

fn default_arp_scan_path() -> String {
    "arp-scan".to_string()
}

fn default_control_addr() -> String {
    "127.0.0.1:1817".to_string()
}

fn default_retention_days() -> u32 {
    30
}

fn default_log_limit() -> usize {
    50
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            default_subnet: default_subnet(),
            scan_interval_secs: default_scan_interval(),
            probe_timeout_secs: default_probe_timeout(),
            arp_scan_path: default_arp_scan_path(),
            interface: None,
            control_addr: default_control_addr(),
            retention_days: default_retention_days(),
            default_log_limit: default_log_limit(),
        }
    }
}

/// Load configuration from an optional file and the environment.
///
/// A missing or malformed `[discover]` section falls back to defaults.
pub fn load(file_prefix: &str) -> crate::error::Result<DiscoverConfig> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("LANWATCH")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| crate::error::DiscoverError::Config(e.to_string()))?;

    match cfg.get::<DiscoverConfig>("discover") {
        Ok(c) => Ok(c),
        Err(e) => {
            tracing::debug!(error = %e, "No usable [discover] config section, using defaults");
            Ok(DiscoverConfig::default())
        }
    }
}
