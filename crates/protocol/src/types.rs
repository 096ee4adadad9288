//! Core types shared across the protocol

use serde::{Deserialize, Serialize};

/// Where a tracked stream currently is, as shown to the overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    Live,
    Offline,
    Ended,
}

/// Severity attached to a `system_status` message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLevel {
    Info,
    Live,
    Error,
    Disconnected,
    Ended,
}

/// Public profile metadata for a tracked user.
///
/// Produced either from a live room's embedded owner record or from the
/// scraped profile page; the shape is identical regardless of source.
/// Immutable once constructed; a fresh snapshot replaces a stored one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub nickname: String,
    pub username: String,
    pub avatar: Option<String>,
    pub followers: u64,
    pub following: u64,
    pub bio: String,
}

/// Bio shown when the source record has none
pub const PLACEHOLDER_BIO: &str = "Bio not available.";

impl ProfileSnapshot {
    /// Minimal snapshot for a user we could not look up
    pub fn placeholder(username: &str) -> Self {
        Self {
            nickname: username.to_string(),
            username: username.to_string(),
            avatar: None,
            followers: 0,
            following: 0,
            bio: PLACEHOLDER_BIO.to_string(),
        }
    }
}

/// Follower/following pair used for change detection by the stats refresher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub followers: u64,
    pub following: u64,
}
