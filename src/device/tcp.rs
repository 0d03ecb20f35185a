//! TCP bridge standing in for the watchface host channel.
//!
//! One watchface connection is served at a time, newline-delimited JSON
//! in both directions: inbound lines become `DeviceEvent`s on the
//! session channel, outbound `MatchFrame`s are written by the shared
//! link handle. A successful write+flush is the delivery confirmation;
//! an I/O error marks the link disconnected until the device reconnects.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use super::{DeviceEvent, DeviceLink, LinkError, MatchFrame, KEY_UPDATE_MODE};

/// Shared handle to the currently connected device's write half.
#[derive(Clone)]
pub struct TcpDeviceLink {
    writer: Arc<Mutex<Option<OwnedWriteHalf>>>,
}

impl TcpDeviceLink {
    pub fn new() -> Self {
        TcpDeviceLink {
            writer: Arc::new(Mutex::new(None)),
        }
    }

    async fn install(&self, half: OwnedWriteHalf) {
        *self.writer.lock().await = Some(half);
    }

    async fn clear(&self) {
        *self.writer.lock().await = None;
    }
}

impl Default for TcpDeviceLink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceLink for TcpDeviceLink {
    fn name(&self) -> &str {
        "tcp-bridge"
    }

    async fn send_frame(&self, frame: &MatchFrame) -> Result<(), LinkError> {
        let mut line = serde_json::to_vec(frame)?;
        line.push(b'\n');

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(LinkError::Disconnected)?;

        let result = async {
            writer.write_all(&line).await?;
            writer.flush().await
        }
        .await;

        if let Err(e) = result {
            // A broken pipe means the device went away; drop the half so
            // later sends fail fast with Disconnected.
            *guard = None;
            return Err(e.into());
        }
        Ok(())
    }
}

/// Accept loop for the device bridge. Serves one connection at a time;
/// a watchface connecting synthesizes the `Ready` lifecycle event.
pub async fn serve(listener: TcpListener, link: TcpDeviceLink, events: mpsc::Sender<DeviceEvent>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Device bridge accept failed: {}", e);
                continue;
            }
        };
        info!("Device connected from {}", peer);

        let (read_half, write_half) = stream.into_split();
        link.install(write_half).await;

        if events.send(DeviceEvent::Ready).await.is_err() {
            // Session is gone; nothing left to serve.
            return;
        }

        let mut lines = BufReader::new(read_half).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match parse_device_line(&line) {
                        Some(event) => {
                            if events.send(event).await.is_err() {
                                return;
                            }
                        }
                        None => warn!("Ignoring unparseable device line: {}", line),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Device read error: {}", e);
                    break;
                }
            }
        }

        info!("Device {} disconnected", peer);
        link.clear().await;
    }
}

/// Parse one inbound line into a lifecycle event. Returns `None` for
/// anything that is not a recognized message.
fn parse_device_line(line: &str) -> Option<DeviceEvent> {
    let raw: serde_json::Value = serde_json::from_str(line).ok()?;
    match raw["type"].as_str()? {
        "ready" => Some(DeviceEvent::Ready),
        "appmessage" => Some(DeviceEvent::AppMessage {
            update_mode: raw["payload"][KEY_UPDATE_MODE].as_i64(),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::UPDATE_MODE_REFRESH;

    #[test]
    fn test_parse_ready_line() {
        assert_eq!(
            parse_device_line(r#"{"type":"ready"}"#),
            Some(DeviceEvent::Ready)
        );
    }

    #[test]
    fn test_parse_refresh_message() {
        let ev = parse_device_line(r#"{"type":"appmessage","payload":{"KEY_UPDATEMODE":0}}"#);
        assert_eq!(
            ev,
            Some(DeviceEvent::AppMessage {
                update_mode: Some(UPDATE_MODE_REFRESH)
            })
        );
    }

    #[test]
    fn test_parse_next_match_message() {
        let ev = parse_device_line(r#"{"type":"appmessage","payload":{"KEY_UPDATEMODE":1}}"#);
        assert_eq!(
            ev,
            Some(DeviceEvent::AppMessage {
                update_mode: Some(1)
            })
        );
    }

    #[test]
    fn test_parse_message_without_mode_flag() {
        let ev = parse_device_line(r#"{"type":"appmessage","payload":{}}"#);
        assert_eq!(ev, Some(DeviceEvent::AppMessage { update_mode: None }));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_device_line("not json at all"), None);
        assert_eq!(parse_device_line(r#"{"type":"selfie"}"#), None);
        assert_eq!(parse_device_line(r#"{"payload":{}}"#), None);
    }

    #[tokio::test]
    async fn test_send_frame_without_device_fails_fast() {
        let link = TcpDeviceLink::new();
        let frame = MatchFrame {
            red_name: None,
            red_score: 0,
            blue_name: None,
            blue_score: 0,
            green_name: None,
            green_score: 0,
            this_match: 1,
            match_count: 1,
        };
        match link.send_frame(&frame).await {
            Err(LinkError::Disconnected) => {}
            other => panic!("Expected Disconnected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_frame_reaches_connected_device() {
        use tokio::io::AsyncReadExt;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let link = TcpDeviceLink::new();
        let mut device = tokio::net::TcpStream::connect(addr).await.unwrap();
        let (stream, _) = listener.accept().await.unwrap();
        let (_read_half, write_half) = stream.into_split();
        link.install(write_half).await;

        let frame = MatchFrame {
            red_name: Some("Tarnished Coast".to_string()),
            red_score: 50,
            blue_name: Some("Sea of Sorrows".to_string()),
            blue_score: 30,
            green_name: Some("Blackgate".to_string()),
            green_score: 20,
            this_match: 1,
            match_count: 1,
        };
        link.send_frame(&frame).await.unwrap();

        let mut buf = vec![0u8; 1024];
        let n = device.read(&mut buf).await.unwrap();
        let line = String::from_utf8_lossy(&buf[..n]);
        assert!(line.ends_with('\n'));
        let raw: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(raw["KEY_RED_NAME"], "Tarnished Coast");
        assert_eq!(raw["KEY_THIS_MATCH"], 1);
    }
}
