//! Bridge subprocess event source
//!
//! Spawns a configured bridge command and communicates via stdout using
//! newline-delimited JSON. The bridge speaks the upstream livestream
//! protocol; this side only decodes [`LiveEvent`] lines, so the upstream
//! wire format never leaks into the server.
//!
//! Invocation contract:
//! - `<cmd> --probe <username>` prints `{"live": bool}` and exits.
//! - `<cmd> --stats <username>` prints `{"followers": n, "following": n}`.
//! - `<cmd> [--no-room-info] [--no-gift-info] <username>` streams events
//!   until the stream ends or the process is killed.

use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use flarecast_protocol::StatsSnapshot;

use crate::{EventStream, LiveEvent, LiveSource, SourceError, StartOptions};

/// Event source backed by an external bridge process
pub struct BridgeSource {
    command: String,
}

impl BridgeSource {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Run the bridge in one-shot mode and parse its stdout as one JSON
    /// document.
    async fn run_oneshot(&self, args: &[&str]) -> Result<Value, SourceError> {
        let output = Command::new(&self.command)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| SourceError::Spawn(format!("{}: {}", self.command, e)))?;

        if !output.status.success() {
            return Err(SourceError::Upstream(format!(
                "bridge exited with {}",
                output.status
            )));
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

#[async_trait]
impl LiveSource for BridgeSource {
    async fn probe_live(&self, username: &str) -> Result<bool, SourceError> {
        let value = self.run_oneshot(&["--probe", username]).await?;
        parse_probe(&value)
    }

    async fn start(
        &self,
        username: &str,
        options: StartOptions,
    ) -> Result<EventStream, SourceError> {
        let mut args: Vec<&str> = Vec::new();
        if !options.fetch_room_info {
            args.push("--no-room-info");
        }
        if !options.fetch_gift_info {
            args.push("--no-gift-info");
        }
        args.push(username);

        info!(
            component = "bridge",
            event = "bridge.spawn",
            command = %self.command,
            username = %username,
            "Spawning bridge process"
        );

        let mut child = Command::new(&self.command)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SourceError::Spawn(format!("{}: {}", self.command, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SourceError::Spawn("no stdout on bridge".into()))?;

        // Surface bridge diagnostics in our own logs
        if let Some(stderr) = child.stderr.take() {
            let username = username.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(
                        component = "bridge",
                        event = "bridge.stderr",
                        username = %username,
                        line = %line,
                        "Bridge stderr"
                    );
                }
            });
        }

        let (event_tx, event_rx) = mpsc::channel::<LiveEvent>(256);
        let (stream, mut stop_rx) = EventStream::new(event_rx);

        let username = username.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        let _ = child.start_kill();
                        break;
                    }
                    line = lines.next_line() => {
                        match line {
                            Ok(Some(line)) => {
                                let line = line.trim();
                                if line.is_empty() {
                                    continue;
                                }
                                match decode_event(line) {
                                    Ok(event) => {
                                        if event_tx.send(event).await.is_err() {
                                            // Consumer is gone
                                            let _ = child.start_kill();
                                            break;
                                        }
                                    }
                                    Err(e) => {
                                        warn!(
                                            component = "bridge",
                                            event = "bridge.event.malformed",
                                            username = %username,
                                            error = %e,
                                            "Skipping malformed bridge line"
                                        );
                                    }
                                }
                            }
                            Ok(None) => {
                                debug!(
                                    component = "bridge",
                                    event = "bridge.stream.ended",
                                    username = %username,
                                    "Bridge stream ended"
                                );
                                break;
                            }
                            Err(e) => {
                                warn!(
                                    component = "bridge",
                                    event = "bridge.stream.read_failed",
                                    username = %username,
                                    error = %e,
                                    "Bridge read error"
                                );
                                break;
                            }
                        }
                    }
                }
            }
            let _ = child.wait().await;
        });

        Ok(stream)
    }

    async fn fetch_room_stats(
        &self,
        username: &str,
    ) -> Result<Option<StatsSnapshot>, SourceError> {
        let value = self.run_oneshot(&["--stats", username]).await?;
        Ok(parse_stats(&value))
    }
}

fn parse_probe(value: &Value) -> Result<bool, SourceError> {
    value
        .get("live")
        .and_then(Value::as_bool)
        .ok_or_else(|| SourceError::Probe("probe output missing `live` flag".into()))
}

fn parse_stats(value: &Value) -> Option<StatsSnapshot> {
    let followers = value.get("followers").and_then(Value::as_u64)?;
    let following = value.get("following").and_then(Value::as_u64)?;
    Some(StatsSnapshot {
        followers,
        following,
    })
}

fn decode_event(line: &str) -> Result<LiveEvent, serde_json::Error> {
    serde_json::from_str(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_gift_event_line() {
        let line = r#"{"event":"gift","user":{"id":"7","username":"dana"},"gift":{"name":"Rose","coins":1,"streakable":true},"repeat_count":3,"streaking":true}"#;
        match decode_event(line).expect("decode") {
            LiveEvent::Gift {
                user,
                gift,
                repeat_count,
                streaking,
            } => {
                assert_eq!(user.username, "dana");
                assert_eq!(gift.name, "Rose");
                assert!(gift.streakable);
                assert_eq!(repeat_count, 3);
                assert!(streaking);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn decode_rejects_malformed_lines() {
        assert!(decode_event("not json").is_err());
        assert!(decode_event(r#"{"event":"nope"}"#).is_err());
    }

    #[test]
    fn probe_output_requires_live_flag() {
        assert!(parse_probe(&json!({"live": true})).expect("flag"));
        assert!(!parse_probe(&json!({"live": false})).expect("flag"));
        assert!(parse_probe(&json!({})).is_err());
    }

    #[test]
    fn stats_need_both_counts() {
        assert_eq!(
            parse_stats(&json!({"followers": 5, "following": 2})),
            Some(StatsSnapshot {
                followers: 5,
                following: 2
            })
        );
        assert_eq!(parse_stats(&json!({"followers": 5})), None);
        assert_eq!(parse_stats(&json!({})), None);
    }
}
