//! Event normalization
//!
//! One pure dispatch table mapping each upstream event variant to the wire
//! messages it produces. Ordering of the connect-time metadata bundle and
//! gift streak suppression live here and nowhere else.

use flarecast_protocol::{StatsSnapshot, StatusLevel, StreamStatus, WireMessage};
use flarecast_source::{parse_room_owner, LiveEvent};

/// Map an upstream event to the wire messages to forward, in order.
///
/// An empty result means the event is intentionally suppressed (gifts while
/// mid-streak). `Connect` expands into the full metadata bundle, with
/// `status_update{live}` strictly after the metadata messages.
pub fn normalize(event: &LiveEvent) -> Vec<WireMessage> {
    match event {
        LiveEvent::Connect {
            owner,
            room_info,
            gift_info,
            like_count,
        } => {
            let mut out = Vec::new();
            let owner = owner.as_ref().and_then(parse_room_owner);

            if let Some(owner) = &owner {
                out.push(WireMessage::ProfileInfo {
                    data: owner.profile.clone(),
                });
                out.push(WireMessage::StatsUpdate {
                    data: StatsSnapshot {
                        followers: owner.profile.followers,
                        following: owner.profile.following,
                    },
                });
            }

            if let Some(count) = owner.as_ref().and_then(|o| o.likes).or(*like_count) {
                out.push(WireMessage::TotalLikesUpdate { count });
            }

            if let Some(room) = room_info {
                out.push(WireMessage::RoomInfoUpdate { data: room.clone() });
            }
            if let Some(gifts) = gift_info {
                out.push(WireMessage::GiftInfoUpdate {
                    data: gifts.clone(),
                });
            }

            out.push(WireMessage::StatusUpdate {
                status: StreamStatus::Live,
            });
            out.push(WireMessage::SystemStatus {
                status: "Connected & Listening".to_string(),
                level: StatusLevel::Live,
            });
            out
        }

        LiveEvent::Comment { user, text } => vec![WireMessage::Comment {
            user: user.username.clone(),
            comment: text.clone(),
        }],

        LiveEvent::Like { user, count, total } => {
            let mut out = vec![WireMessage::Like {
                user: user.username.clone(),
                count: *count,
            }];
            // A missing running total is "no update", not an error.
            if let Some(total) = total {
                out.push(WireMessage::TotalLikesUpdate { count: *total });
            }
            out
        }

        LiveEvent::Follow { user } => vec![WireMessage::Follow {
            user: user.username.clone(),
        }],
        LiveEvent::Share { user } => vec![WireMessage::Share {
            user: user.username.clone(),
        }],
        LiveEvent::Join { user } => vec![WireMessage::Join {
            user: user.username.clone(),
        }],
        LiveEvent::Subscribe { user } => vec![WireMessage::Subscribe {
            user: user.username.clone(),
        }],

        LiveEvent::Gift {
            user,
            gift,
            repeat_count,
            streaking,
        } => {
            // Forward only the terminal repeat count of a combo
            if gift.streakable && *streaking {
                return Vec::new();
            }
            vec![WireMessage::Gift {
                user: user.username.clone(),
                gift_name: gift.name.clone(),
                count: *repeat_count,
                coins: gift.coins,
                gift_image_url: gift.image_url.clone(),
                user_id: user.id.clone(),
            }]
        }

        LiveEvent::Disconnect => vec![WireMessage::SystemStatus {
            status: "Stream Disconnected".to_string(),
            level: StatusLevel::Disconnected,
        }],

        LiveEvent::LiveEnd => vec![
            WireMessage::StatusUpdate {
                status: StreamStatus::Ended,
            },
            WireMessage::SystemStatus {
                status: "Livestream Ended".to_string(),
                level: StatusLevel::Ended,
            },
        ],
    }
}

/// Initial stats carried by a `Connect` event, used to seed the periodic
/// stats refresher. `None` for every other variant.
pub fn connect_stats(event: &LiveEvent) -> Option<StatsSnapshot> {
    match event {
        LiveEvent::Connect { owner, .. } => {
            owner
                .as_ref()
                .and_then(parse_room_owner)
                .map(|o| StatsSnapshot {
                    followers: o.profile.followers,
                    following: o.profile.following,
                })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flarecast_source::{GiftSpec, LiveUser};
    use serde_json::json;

    fn user(name: &str) -> LiveUser {
        LiveUser {
            id: "1001".to_string(),
            username: name.to_string(),
            ..Default::default()
        }
    }

    fn connect_event() -> LiveEvent {
        LiveEvent::Connect {
            owner: Some(json!({
                "nickname": "Bob",
                "display_id": "bob",
                "avatar_thumb": { "url_list": ["u1"] },
                "follow_info": { "follower_count": 10, "following_count": 2 },
                "like_count": 55
            })),
            room_info: Some(json!({"room": "meta"})),
            gift_info: Some(json!([{"name": "Rose"}])),
            like_count: None,
        }
    }

    fn tag(msg: &WireMessage) -> &'static str {
        match msg {
            WireMessage::ProfileInfo { .. } => "profile_info",
            WireMessage::TotalLikesUpdate { .. } => "total_likes_update",
            WireMessage::RoomInfoUpdate { .. } => "room_info_update",
            WireMessage::GiftInfoUpdate { .. } => "gift_info_update",
            WireMessage::StatsUpdate { .. } => "stats_update",
            WireMessage::StatusUpdate { .. } => "status_update",
            WireMessage::SystemStatus { .. } => "system_status",
            _ => "other",
        }
    }

    #[test]
    fn connect_bundle_puts_live_status_after_metadata() {
        let out = normalize(&connect_event());
        let tags: Vec<_> = out.iter().map(tag).collect();
        assert_eq!(
            tags,
            vec![
                "profile_info",
                "stats_update",
                "total_likes_update",
                "room_info_update",
                "gift_info_update",
                "status_update",
                "system_status",
            ]
        );

        match &out[0] {
            WireMessage::ProfileInfo { data } => {
                assert_eq!(data.avatar.as_deref(), Some("u1"));
                assert_eq!(data.followers, 10);
            }
            other => panic!("unexpected message: {:?}", other),
        }
        match &out[2] {
            WireMessage::TotalLikesUpdate { count } => assert_eq!(*count, 55),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn connect_without_owner_still_goes_live() {
        let out = normalize(&LiveEvent::Connect {
            owner: None,
            room_info: None,
            gift_info: None,
            like_count: Some(7),
        });
        let tags: Vec<_> = out.iter().map(tag).collect();
        assert_eq!(
            tags,
            vec!["total_likes_update", "status_update", "system_status"]
        );
    }

    #[test]
    fn mid_streak_gifts_are_suppressed() {
        let streaking = LiveEvent::Gift {
            user: user("dana"),
            gift: GiftSpec {
                name: "Rose".to_string(),
                coins: 1,
                image_url: None,
                streakable: true,
            },
            repeat_count: 3,
            streaking: true,
        };
        assert!(normalize(&streaking).is_empty());

        let finished = LiveEvent::Gift {
            user: user("dana"),
            gift: GiftSpec {
                name: "Rose".to_string(),
                coins: 1,
                image_url: None,
                streakable: true,
            },
            repeat_count: 7,
            streaking: false,
        };
        match normalize(&finished).as_slice() {
            [WireMessage::Gift {
                count,
                user_id,
                gift_name,
                ..
            }] => {
                assert_eq!(*count, 7);
                assert_eq!(user_id, "1001");
                assert_eq!(gift_name, "Rose");
            }
            other => panic!("unexpected messages: {:?}", other),
        }
    }

    #[test]
    fn non_streakable_gifts_always_forward() {
        let gift = LiveEvent::Gift {
            user: user("dana"),
            gift: GiftSpec {
                name: "Drama Queen".to_string(),
                coins: 5000,
                image_url: Some("https://cdn/g.png".to_string()),
                streakable: false,
            },
            repeat_count: 1,
            streaking: false,
        };
        assert_eq!(normalize(&gift).len(), 1);
    }

    #[test]
    fn like_with_running_total_also_updates_total() {
        let out = normalize(&LiveEvent::Like {
            user: user("carol"),
            count: 5,
            total: Some(312),
        });
        let tags: Vec<_> = out.iter().map(tag).collect();
        assert_eq!(tags, vec!["other", "total_likes_update"]);

        let out = normalize(&LiveEvent::Like {
            user: user("carol"),
            count: 5,
            total: None,
        });
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn live_end_transitions_status_to_ended() {
        let out = normalize(&LiveEvent::LiveEnd);
        match out.as_slice() {
            [WireMessage::StatusUpdate { status }, WireMessage::SystemStatus { level, .. }] => {
                assert_eq!(*status, StreamStatus::Ended);
                assert_eq!(*level, StatusLevel::Ended);
            }
            other => panic!("unexpected messages: {:?}", other),
        }
    }

    #[test]
    fn connect_stats_seed_comes_from_owner() {
        assert_eq!(
            connect_stats(&connect_event()),
            Some(StatsSnapshot {
                followers: 10,
                following: 2
            })
        );
        assert_eq!(connect_stats(&LiveEvent::Disconnect), None);
    }
}
