pub mod tcp;

pub use tcp::TcpDeviceLink;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Payload key carrying the update-mode flag on inbound app messages.
pub const KEY_UPDATE_MODE: &str = "KEY_UPDATEMODE";

/// Mode flag value that requests a full data refresh; every other value
/// asks for the next match.
pub const UPDATE_MODE_REFRESH: i64 = 0;

/// Lifecycle events arriving from the watchface host channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// The watchface (re)opened and wants fresh data.
    Ready,
    /// An app message with its update-mode flag, if one was present.
    AppMessage { update_mode: Option<i64> },
}

/// Outbound match summary frame, keyed with the watchface's fixed
/// message vocabulary. An unresolved realm name omits its key entirely,
/// the same way the host dictionary dropped undefined entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchFrame {
    #[serde(rename = "KEY_RED_NAME", skip_serializing_if = "Option::is_none")]
    pub red_name: Option<String>,
    #[serde(rename = "KEY_RED_SCORE")]
    pub red_score: u8,
    #[serde(rename = "KEY_BLUE_NAME", skip_serializing_if = "Option::is_none")]
    pub blue_name: Option<String>,
    #[serde(rename = "KEY_BLUE_SCORE")]
    pub blue_score: u8,
    #[serde(rename = "KEY_GREEN_NAME", skip_serializing_if = "Option::is_none")]
    pub green_name: Option<String>,
    #[serde(rename = "KEY_GREEN_SCORE")]
    pub green_score: u8,
    /// 1-based position of this match in the current list.
    #[serde(rename = "KEY_THIS_MATCH")]
    pub this_match: u32,
    #[serde(rename = "KEY_MATCHES")]
    pub match_count: u32,
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("no device connected")]
    Disconnected,
    #[error("frame encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Outbound half of the host channel. `send_frame` resolves once the
/// host has accepted the frame for delivery; an error means the frame
/// did not go out and may be retried by the caller.
#[async_trait]
pub trait DeviceLink: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    async fn send_frame(&self, frame: &MatchFrame) -> Result<(), LinkError>;
}
