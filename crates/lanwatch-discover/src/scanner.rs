//! ARP sweep wrapper.
//!
//! Executes arp-scan as a child process via `tokio::process::Command` and
//! parses its plain output into observations.

use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;

use lanwatch_core::Observation;

use crate::arp_output;
use crate::config::DiscoverConfig;
use crate::error::{DiscoverError, Result};

/// One discovery sweep over a subnet specifier.
///
/// An empty result is a valid answer. Implementations may fail; callers
/// bound the call with their own timeout.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, target: &str) -> Result<Vec<Observation>>;
}

/// Wrapper around the arp-scan binary.
pub struct ArpScanner {
    arp_scan_path: String,
    interface: Option<String>,
}

impl ArpScanner {
    pub fn new(arp_scan_path: &str, interface: Option<&str>) -> Self {
        Self {
            arp_scan_path: arp_scan_path.to_string(),
            interface: interface.map(String::from),
        }
    }

    pub fn from_config(config: &DiscoverConfig) -> Self {
        Self::new(&config.arp_scan_path, config.interface.as_deref())
    }

    /// Verify arp-scan is installed and accessible.
    pub async fn verify_installation(&self) -> Result<String> {
        let output = Command::new(&self.arp_scan_path)
            .arg("--version")
            .output()
            .await
            .map_err(|_| DiscoverError::ProberNotFound {
                path: self.arp_scan_path.clone(),
            })?;

        // arp-scan prints its banner on stderr.
        let banner = if output.stdout.is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        Ok(String::from_utf8_lossy(&banner)
            .lines()
            .next()
            .unwrap_or_default()
            .to_string())
    }

    fn args(&self, target: &str) -> Vec<String> {
        let mut args = vec!["--plain".to_string(), "--quiet".to_string()];
        if let Some(iface) = &self.interface {
            args.push(format!("--interface={iface}"));
        }
        args.push(target.to_string());
        args
    }
}

#[async_trait]
impl Prober for ArpScanner {
    /// Run arp-scan against `target`.
    ///
    /// The child is killed if this future is dropped, so an outer timeout
    /// never leaves a stray sweep running.
    async fn probe(&self, target: &str) -> Result<Vec<Observation>> {
        let start = Instant::now();

        tracing::debug!(target = %target, "Starting arp-scan sweep");

        let output = Command::new(&self.arp_scan_path)
            .args(self.args(target))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| DiscoverError::ProberNotFound {
                path: format!("{}: {e}", self.arp_scan_path),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(DiscoverError::ProberFailed {
                code: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        let scope = arp_output::target_network(target);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let observations = arp_output::parse_arp_scan(&stdout, scope.as_ref());

        tracing::debug!(
            target = %target,
            responders = observations.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "arp-scan sweep complete"
        );

        Ok(observations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_without_interface() {
        let scanner = ArpScanner::new("arp-scan", None);
        assert_eq!(scanner.args("10.0.0.1/20"), vec!["--plain", "--quiet", "10.0.0.1/20"]);
    }

    #[test]
    fn test_args_with_interface() {
        let scanner = ArpScanner::new("arp-scan", Some("eth1"));
        assert_eq!(
            scanner.args("192.168.1.0/24"),
            vec!["--plain", "--quiet", "--interface=eth1", "192.168.1.0/24"]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_an_error() {
        let scanner = ArpScanner::new("/nonexistent/arp-scan", None);
        let err = scanner.probe("10.0.0.0/24").await.unwrap_err();
        assert!(matches!(err, DiscoverError::ProberNotFound { .. }));
        assert!(scanner.verify_installation().await.is_err());
    }
}
