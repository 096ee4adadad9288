//! Flarecast Sources
//!
//! The contract between the overlay server and an upstream livestream event
//! source, plus the bundled bridge implementation. The upstream wire
//! protocol stays external: the server only depends on the types and trait
//! defined here, and tests drive sessions with scripted implementations.

pub mod bridge;

pub use bridge::BridgeSource;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use flarecast_protocol::{ProfileSnapshot, StatsSnapshot};

/// Errors that can occur in an event source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to spawn bridge process: {0}")]
    Spawn(String),

    #[error("Bridge I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed bridge payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Liveness probe failed: {0}")]
    Probe(String),

    #[error("Upstream error: {0}")]
    Upstream(String),
}

/// Identity attached to every interaction event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiveUser {
    /// Numeric upstream id, stringified
    #[serde(default)]
    pub id: String,
    /// Unique handle, the name shown in wire messages
    pub username: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub follower_count: u64,
    #[serde(default)]
    pub following_count: u64,
    #[serde(default)]
    pub bio: Option<String>,
}

/// Static description of a gift, from the room's gift catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GiftSpec {
    pub name: String,
    /// Coin value of a single gift
    #[serde(default)]
    pub coins: u64,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Whether the gift can be sent as a rapid-repeat combo
    #[serde(default)]
    pub streakable: bool,
}

/// Events delivered by a live event source.
///
/// `Connect` arrives once after ingestion starts; `Disconnect` and `LiveEnd`
/// are terminal for the stream. Everything else is an interaction event
/// carrying the acting user's identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LiveEvent {
    Connect {
        /// Raw room-owner record, in the upstream shape (see [`parse_room_owner`])
        #[serde(default)]
        owner: Option<Value>,
        #[serde(default)]
        room_info: Option<Value>,
        #[serde(default)]
        gift_info: Option<Value>,
        /// Initial room like count, when the upstream reports one
        #[serde(default)]
        like_count: Option<u64>,
    },
    Comment {
        user: LiveUser,
        text: String,
    },
    Like {
        user: LiveUser,
        count: u64,
        /// Running total, when the upstream reports one
        #[serde(default)]
        total: Option<u64>,
    },
    Follow {
        user: LiveUser,
    },
    Share {
        user: LiveUser,
    },
    Join {
        user: LiveUser,
    },
    Subscribe {
        user: LiveUser,
    },
    Gift {
        user: LiveUser,
        gift: GiftSpec,
        repeat_count: u64,
        /// True while a streakable gift combo is still running
        #[serde(default)]
        streaking: bool,
    },
    Disconnect,
    LiveEnd,
}

/// Options for starting ingestion
#[derive(Debug, Clone, Copy)]
pub struct StartOptions {
    /// Fetch room metadata once at connection time
    pub fetch_room_info: bool,
    /// Fetch the gift catalog once at connection time
    pub fetch_gift_info: bool,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            fetch_room_info: true,
            fetch_gift_info: true,
        }
    }
}

/// Cloneable control that asks a running source to disconnect.
///
/// Idempotent (the signal fires at most once) and safe to use even if the
/// source never connected.
#[derive(Clone)]
pub struct StopHandle {
    tx: std::sync::Arc<std::sync::Mutex<Option<oneshot::Sender<()>>>>,
}

impl StopHandle {
    pub fn stop(&self) {
        if let Some(tx) = self.tx.lock().unwrap().take() {
            let _ = tx.send(());
        }
    }
}

/// A running subscription to a live event source.
///
/// Dropping the stream or firing its [`StopHandle`] releases the underlying
/// source.
pub struct EventStream {
    events: mpsc::Receiver<LiveEvent>,
    stop: StopHandle,
}

impl EventStream {
    /// Build a stream from an event channel. The returned receiver fires
    /// once when a consumer asks the source to stop.
    pub fn new(events: mpsc::Receiver<LiveEvent>) -> (Self, oneshot::Receiver<()>) {
        let (stop_tx, stop_rx) = oneshot::channel();
        (
            Self {
                events,
                stop: StopHandle {
                    tx: std::sync::Arc::new(std::sync::Mutex::new(Some(stop_tx))),
                },
            },
            stop_rx,
        )
    }

    /// Next event, or `None` when the source has ended.
    pub async fn next(&mut self) -> Option<LiveEvent> {
        self.events.recv().await
    }

    /// Detachable stop control, so owners other than the stream consumer
    /// can release the source.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Ask the source to disconnect. Safe to call more than once.
    pub fn stop(&self) {
        self.stop.stop()
    }
}

/// Capability the session layer depends on.
///
/// Implementations must not assume they are called from a particular task;
/// the server shares one source across all connections.
#[async_trait]
pub trait LiveSource: Send + Sync {
    /// Whether `username` is currently live. Callers treat errors as "not
    /// live"; the probe fails closed.
    async fn probe_live(&self, username: &str) -> Result<bool, SourceError>;

    /// Begin ingestion for `username`. A start failure is fatal for that
    /// session's live path.
    async fn start(
        &self,
        username: &str,
        options: StartOptions,
    ) -> Result<EventStream, SourceError>;

    /// One-shot room stats, used by the periodic refresh task. `Ok(None)`
    /// means the upstream had no stats for the user right now.
    async fn fetch_room_stats(&self, username: &str)
        -> Result<Option<StatsSnapshot>, SourceError>;
}

/// Room-owner record reduced to the profile fields the overlay needs
#[derive(Debug, Clone, PartialEq)]
pub struct RoomOwner {
    pub profile: ProfileSnapshot,
    pub likes: Option<u64>,
}

/// Extract a profile from a raw room-owner record.
///
/// The upstream shape nests counts under `follow_info` and the avatar under
/// `avatar_thumb.url_list`; records without `follow_info` are not owner
/// records and yield `None`.
pub fn parse_room_owner(data: &Value) -> Option<RoomOwner> {
    let follow_info = data.get("follow_info")?;

    let avatar = data
        .get("avatar_thumb")
        .and_then(|thumb| thumb.get("url_list"))
        .and_then(|list| list.get(0))
        .and_then(Value::as_str)
        .map(str::to_string);

    let profile = ProfileSnapshot {
        nickname: data
            .get("nickname")
            .and_then(Value::as_str)
            .unwrap_or("N/A")
            .to_string(),
        username: data
            .get("display_id")
            .and_then(Value::as_str)
            .unwrap_or("N/A")
            .to_string(),
        avatar,
        followers: follow_info
            .get("follower_count")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        following: follow_info
            .get("following_count")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        bio: data
            .get("bio_description")
            .and_then(Value::as_str)
            .unwrap_or("")
            .replace('\n', " "),
    };

    Some(RoomOwner {
        profile,
        likes: data.get("like_count").and_then(Value::as_u64),
    })
}
