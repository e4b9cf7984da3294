//! Control surface: inventory queries, device edits and scan-target changes.
//!
//! `ControlSurface` holds the operations. The daemon exposes them over a
//! newline-delimited JSON socket: one request object per line in, one
//! response object per line out.

use std::net::SocketAddr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use lanwatch_core::{Device, DeviceEvent, InventoryStats};
use lanwatch_store::{InventoryStore, StoreError};

use crate::error::Result;
use crate::target::ScanTarget;

/// A control request, tagged by `cmd`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ControlRequest {
    Devices,
    Device {
        ip: String,
    },
    Update {
        ip: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        subnet: Option<String>,
    },
    /// Change the scan target. Without a subnet the target is left as is.
    Scan {
        #[serde(default)]
        subnet: Option<String>,
    },
    Stats,
    Logs {
        #[serde(default)]
        limit: Option<usize>,
    },
}

/// A control response, tagged by `status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ControlResponse {
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
    NotFound {
        message: String,
    },
    Error {
        message: String,
    },
}

impl ControlResponse {
    fn message(message: &str) -> Self {
        Self::Ok {
            message: Some(message.to_string()),
            data: None,
        }
    }

    fn data<T: Serialize>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => Self::Ok {
                message: None,
                data: Some(v),
            },
            Err(e) => Self::Error {
                message: e.to_string(),
            },
        }
    }
}

/// The query-and-control operations, shared by the socket server and the CLI.
#[derive(Clone)]
pub struct ControlSurface {
    store: InventoryStore,
    target: ScanTarget,
    default_log_limit: usize,
}

impl ControlSurface {
    pub fn new(store: InventoryStore, target: ScanTarget, default_log_limit: usize) -> Self {
        Self {
            store,
            target,
            default_log_limit,
        }
    }

    pub async fn list_devices(&self) -> Result<Vec<Device>> {
        self.blocking(|store| store.list_all()).await
    }

    pub async fn get_device(&self, ip: &str) -> Result<Option<Device>> {
        let ip = ip.to_string();
        self.blocking(move |store| store.get(&ip)).await
    }

    /// Edit name and/or subnet. `false` when the IP is unknown.
    pub async fn update_device(
        &self,
        ip: &str,
        name: Option<String>,
        subnet: Option<String>,
    ) -> Result<bool> {
        let ip = ip.to_string();
        self.blocking(move |store| store.edit(&ip, name.as_deref(), subnet.as_deref()))
            .await
    }

    /// Operator insert; see `InventoryStore::add_manual`.
    pub async fn add_device(&self, ip: &str, mac: &str, name: &str, subnet: &str) -> Result<bool> {
        let (ip, mac, name, subnet) = (
            ip.to_string(),
            mac.to_string(),
            name.to_string(),
            subnet.to_string(),
        );
        self.blocking(move |store| store.add_manual(&ip, &mac, &name, &subnet, Utc::now()))
            .await
    }

    pub fn target(&self) -> String {
        self.target.get()
    }

    /// Replace the scan target; the scan loop picks it up next cycle.
    pub fn set_target(&self, subnet: &str) {
        let previous = self.target.set(subnet);
        tracing::info!(previous = %previous, target = %subnet, "Scan target changed");
    }

    pub async fn stats(&self) -> Result<InventoryStats> {
        self.blocking(|store| store.stats()).await
    }

    /// Newest device events; `None` uses the configured default limit.
    pub async fn logs(&self, limit: Option<usize>) -> Result<Vec<DeviceEvent>> {
        let limit = limit.unwrap_or(self.default_log_limit);
        self.blocking(move |store| store.device_events(limit)).await
    }

    /// Dispatch one request. Failures become `Error` responses.
    pub async fn handle(&self, request: ControlRequest) -> ControlResponse {
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "Control request failed");
                ControlResponse::Error {
                    message: e.to_string(),
                }
            }
        }
    }

    async fn dispatch(&self, request: ControlRequest) -> Result<ControlResponse> {
        Ok(match request {
            ControlRequest::Devices => ControlResponse::data(&self.list_devices().await?),
            ControlRequest::Device { ip } => match self.get_device(&ip).await? {
                Some(device) => ControlResponse::data(&device),
                None => not_found(),
            },
            ControlRequest::Update { ip, name, subnet } => {
                if self.update_device(&ip, name, subnet).await? {
                    ControlResponse::message("Device updated.")
                } else {
                    not_found()
                }
            }
            ControlRequest::Scan { subnet } => {
                if let Some(subnet) = subnet.filter(|s| !s.trim().is_empty()) {
                    self.set_target(subnet.trim());
                }
                ControlResponse::message("Scan triggered.")
            }
            ControlRequest::Stats => ControlResponse::data(&self.stats().await?),
            ControlRequest::Logs { limit } => ControlResponse::data(&self.logs(limit).await?),
        })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&InventoryStore) -> std::result::Result<T, StoreError> + Send + 'static,
    {
        let store = self.store.clone();
        Ok(tokio::task::spawn_blocking(move || f(&store)).await??)
    }
}

fn not_found() -> ControlResponse {
    ControlResponse::NotFound {
        message: "Device not found.".to_string(),
    }
}

// ── Socket server ────────────────────────────────────────────────

/// Serve the control protocol until `shutdown` flips to true.
pub async fn serve(
    listener: TcpListener,
    control: ControlSurface,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "Control socket listening");

    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            _ = shutdown.changed() => break,
        };

        match accepted {
            Ok((stream, peer)) => {
                let control = control.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, &control).await {
                        tracing::warn!(peer = %peer, error = %e, "Control connection error");
                    }
                });
            }
            Err(e) => tracing::warn!(error = %e, "Failed to accept control connection"),
        }
    }

    tracing::info!("Control socket closed");
    Ok(())
}

async fn handle_connection(stream: TcpStream, control: &ControlSurface) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<ControlRequest>(&line) {
            Ok(request) => {
                tracing::debug!(request = ?request, "Control request");
                control.handle(request).await
            }
            Err(e) => ControlResponse::Error {
                message: format!("invalid request: {e}"),
            },
        };

        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        writer.write_all(&out).await?;
    }

    Ok(())
}

/// Send one request to a running daemon and wait for its response.
pub async fn send_request(addr: SocketAddr, request: &ControlRequest) -> Result<ControlResponse> {
    let stream = TcpStream::connect(addr).await?;
    let (reader, mut writer) = stream.into_split();

    let mut out = serde_json::to_vec(request)?;
    out.push(b'\n');
    writer.write_all(&out).await?;

    let mut lines = BufReader::new(reader).lines();
    let line = lines.next_line().await?.ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "control socket closed without a response",
        )
    })?;
    Ok(serde_json::from_str(&line)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanwatch_core::UpsertOp;

    fn surface() -> (ControlSurface, InventoryStore, ScanTarget) {
        let store = InventoryStore::in_memory().unwrap();
        let target = ScanTarget::new("10.0.0.1/20");
        (ControlSurface::new(store.clone(), target.clone(), 50), store, target)
    }

    fn seed(store: &InventoryStore, ip: &str) {
        store
            .upsert(&UpsertOp {
                ip: ip.to_string(),
                mac: "aa:bb:cc:dd:ee:ff".to_string(),
                subnet: "10.0.0.1/20".to_string(),
                seen_at: Utc::now(),
            })
            .unwrap();
    }

    #[test]
    fn test_request_wire_format() {
        let req: ControlRequest =
            serde_json::from_str(r#"{"cmd":"update","ip":"10.0.0.5","name":"nas"}"#).unwrap();
        assert_eq!(
            req,
            ControlRequest::Update {
                ip: "10.0.0.5".to_string(),
                name: Some("nas".to_string()),
                subnet: None,
            }
        );

        let req: ControlRequest = serde_json::from_str(r#"{"cmd":"logs"}"#).unwrap();
        assert_eq!(req, ControlRequest::Logs { limit: None });
    }

    #[test]
    fn test_response_wire_format() {
        let json = serde_json::to_string(&not_found()).unwrap();
        assert_eq!(json, r#"{"status":"not_found","message":"Device not found."}"#);

        let json = serde_json::to_string(&ControlResponse::message("Scan triggered.")).unwrap();
        assert_eq!(json, r#"{"status":"ok","message":"Scan triggered."}"#);
    }

    #[tokio::test]
    async fn test_update_unknown_device_is_not_found() {
        let (control, _, _) = surface();
        let resp = control
            .handle(ControlRequest::Update {
                ip: "10.0.0.99".to_string(),
                name: Some("ghost".to_string()),
                subnet: None,
            })
            .await;
        assert!(matches!(resp, ControlResponse::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_known_device() {
        let (control, store, _) = surface();
        seed(&store, "10.0.0.5");

        let resp = control
            .handle(ControlRequest::Update {
                ip: "10.0.0.5".to_string(),
                name: Some("printer".to_string()),
                subnet: None,
            })
            .await;

        assert_eq!(resp, ControlResponse::message("Device updated."));
        assert_eq!(store.get("10.0.0.5").unwrap().unwrap().name, "printer");
    }

    #[tokio::test]
    async fn test_scan_sets_target_only_when_given() {
        let (control, _, target) = surface();

        control.handle(ControlRequest::Scan { subnet: None }).await;
        assert_eq!(target.get(), "10.0.0.1/20");

        let resp = control
            .handle(ControlRequest::Scan {
                subnet: Some("192.168.1.0/24".to_string()),
            })
            .await;
        assert_eq!(resp, ControlResponse::message("Scan triggered."));
        assert_eq!(target.get(), "192.168.1.0/24");
        assert_eq!(control.target(), "192.168.1.0/24");
    }

    #[tokio::test]
    async fn test_add_device_and_logs() {
        let (control, _, _) = surface();
        assert!(control.add_device("10.0.0.8", "aa", "tv", "home").await.unwrap());

        let logs = control.logs(None).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].event_type, lanwatch_core::EventType::ManualAdd);
    }

    #[tokio::test]
    async fn test_socket_round_trip() {
        let (control, store, target) = surface();
        seed(&store, "10.0.0.5");

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = watch::channel(false);
        let server = tokio::spawn(serve(listener, control, stop_rx));

        let resp = send_request(addr, &ControlRequest::Devices).await.unwrap();
        match resp {
            ControlResponse::Ok { data: Some(data), .. } => {
                let devices: Vec<Device> = serde_json::from_value(data).unwrap();
                assert_eq!(devices.len(), 1);
                assert_eq!(devices[0].ip, "10.0.0.5");
            }
            other => panic!("unexpected response: {other:?}"),
        }

        send_request(
            addr,
            &ControlRequest::Scan {
                subnet: Some("172.16.0.0/16".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(target.get(), "172.16.0.0/16");

        stop_tx.send(true).unwrap();
        server.await.unwrap().unwrap();
    }
}
