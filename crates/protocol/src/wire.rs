//! Server → Client messages

use serde::{Deserialize, Serialize};

use crate::types::*;

/// One JSON object sent to the browser client describing a discrete update.
///
/// The `type` discriminator and the per-variant payload shapes are the
/// contract the overlay page is written against; renaming a field here
/// breaks deployed overlays.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    // Metadata
    ProfileInfo {
        data: ProfileSnapshot,
    },
    TotalLikesUpdate {
        count: u64,
    },
    RoomInfoUpdate {
        /// Opaque room metadata object, forwarded as-is
        data: serde_json::Value,
    },
    GiftInfoUpdate {
        /// Opaque gift catalog object, forwarded as-is
        data: serde_json::Value,
    },
    StatsUpdate {
        data: StatsSnapshot,
    },

    // Lifecycle
    StatusUpdate {
        status: StreamStatus,
    },
    SystemStatus {
        status: String,
        level: StatusLevel,
    },

    // Interaction events
    Comment {
        user: String,
        comment: String,
    },
    Like {
        user: String,
        count: u64,
    },
    Follow {
        user: String,
    },
    Share {
        user: String,
    },
    Join {
        user: String,
    },
    Subscribe {
        user: String,
    },
    Gift {
        user: String,
        gift_name: String,
        count: u64,
        coins: u64,
        gift_image_url: Option<String>,
        #[serde(rename = "userId")]
        user_id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::WireMessage;
    use crate::types::*;

    #[test]
    fn profile_info_shape() {
        let msg = WireMessage::ProfileInfo {
            data: ProfileSnapshot {
                nickname: "Alice".to_string(),
                username: "alice".to_string(),
                avatar: Some("https://cdn.example/a.jpg".to_string()),
                followers: 12,
                following: 3,
                bio: "hi".to_string(),
            },
        };

        let json = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(json["type"], "profile_info");
        assert_eq!(json["data"]["nickname"], "Alice");
        assert_eq!(json["data"]["username"], "alice");
        assert_eq!(json["data"]["avatar"], "https://cdn.example/a.jpg");
        assert_eq!(json["data"]["followers"], 12);
        assert_eq!(json["data"]["following"], 3);
        assert_eq!(json["data"]["bio"], "hi");
    }

    #[test]
    fn status_update_uses_lowercase_states() {
        for (status, expected) in [
            (StreamStatus::Live, "live"),
            (StreamStatus::Offline, "offline"),
            (StreamStatus::Ended, "ended"),
        ] {
            let json =
                serde_json::to_value(WireMessage::StatusUpdate { status }).expect("serialize");
            assert_eq!(json["type"], "status_update");
            assert_eq!(json["status"], expected);
        }
    }

    #[test]
    fn system_status_levels() {
        let json = serde_json::to_value(WireMessage::SystemStatus {
            status: "Stream Disconnected".to_string(),
            level: StatusLevel::Disconnected,
        })
        .expect("serialize");
        assert_eq!(json["type"], "system_status");
        assert_eq!(json["status"], "Stream Disconnected");
        assert_eq!(json["level"], "disconnected");
    }

    #[test]
    fn gift_keeps_camel_case_user_id() {
        let msg = WireMessage::Gift {
            user: "bob".to_string(),
            gift_name: "Rose".to_string(),
            count: 5,
            coins: 1,
            gift_image_url: None,
            user_id: "7012".to_string(),
        };

        let json = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(json["type"], "gift");
        assert_eq!(json["gift_name"], "Rose");
        assert_eq!(json["count"], 5);
        assert_eq!(json["coins"], 1);
        // The overlay reads this exact key; it is intentionally not snake_case.
        assert_eq!(json["userId"], "7012");
        assert!(json.get("user_id").is_none());
    }

    #[test]
    fn interaction_events_are_flat() {
        let json = serde_json::to_value(WireMessage::Comment {
            user: "carol".to_string(),
            comment: "hello!".to_string(),
        })
        .expect("serialize");
        assert_eq!(json["type"], "comment");
        assert_eq!(json["user"], "carol");
        assert_eq!(json["comment"], "hello!");

        let json = serde_json::to_value(WireMessage::Like {
            user: "carol".to_string(),
            count: 3,
        })
        .expect("serialize");
        assert_eq!(json["type"], "like");
        assert_eq!(json["count"], 3);

        let json = serde_json::to_value(WireMessage::Follow {
            user: "carol".to_string(),
        })
        .expect("serialize");
        assert_eq!(json["type"], "follow");
        assert_eq!(json["user"], "carol");
    }

    #[test]
    fn roundtrip_stats_update() {
        let msg = WireMessage::StatsUpdate {
            data: StatsSnapshot {
                followers: 10,
                following: 2,
            },
        };

        let json = serde_json::to_string(&msg).expect("serialize");
        let reparsed: WireMessage = serde_json::from_str(&json).expect("deserialize");
        match reparsed {
            WireMessage::StatsUpdate { data } => {
                assert_eq!(data.followers, 10);
                assert_eq!(data.following, 2);
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }
}
