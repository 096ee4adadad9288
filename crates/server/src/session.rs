//! Per-connection session lifecycle
//!
//! One `Session` per WebSocket connection. At start the session probes
//! liveness exactly once and commits to either the live path (event
//! producer plus periodic stats refresher) or the offline path (one-shot
//! profile scrape). Every background task is owned here and torn down
//! exactly once when the connection ends.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use flarecast_protocol::{ProfileSnapshot, StatsSnapshot, StatusLevel, StreamStatus, WireMessage};
use flarecast_source::{LiveEvent, LiveSource, StartOptions, StopHandle};

use crate::normalize::{connect_stats, normalize};
use crate::profile::ProfileLookup;

pub const STATS_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Lifecycle states. The liveness decision is made once, in
/// `Connecting`; `Ended` is reached exactly once from either branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Live,
    Offline,
    Ended,
}

/// Refresher slot shared between the producer task, which fills it on
/// Connect, and teardown. `Closed` is terminal: a Connect delivered while
/// teardown runs must not start a task nobody will ever abort.
enum RefresherState {
    Empty,
    Running(JoinHandle<()>),
    Closed,
}

type RefresherSlot = Arc<Mutex<RefresherState>>;

/// Start the stats refresher if the slot is still empty. Returns false
/// when one is already running or the slot has been closed.
fn spawn_refresher(
    refresher: &RefresherSlot,
    source: Arc<dyn LiveSource>,
    username: String,
    outbound: mpsc::Sender<WireMessage>,
    seed: Option<StatsSnapshot>,
) -> bool {
    let mut slot = refresher.lock().unwrap();
    match *slot {
        RefresherState::Empty => {
            *slot = RefresherState::Running(tokio::spawn(refresh_stats(
                source, username, outbound, seed,
            )));
            true
        }
        _ => false,
    }
}

fn close_refresher(refresher: &RefresherSlot) {
    let prev = std::mem::replace(&mut *refresher.lock().unwrap(), RefresherState::Closed);
    if let RefresherState::Running(task) = prev {
        task.abort();
    }
}

pub struct Session {
    username: String,
    outbound: mpsc::Sender<WireMessage>,
    source: Arc<dyn LiveSource>,
    profiles: Arc<dyn ProfileLookup>,
    state: SessionState,
    producer: Option<JoinHandle<()>>,
    // Shared with the producer task, which spawns the refresher on Connect
    refresher: RefresherSlot,
    stream_stop: Option<StopHandle>,
}

impl Session {
    pub fn new(
        username: &str,
        outbound: mpsc::Sender<WireMessage>,
        source: Arc<dyn LiveSource>,
        profiles: Arc<dyn ProfileLookup>,
    ) -> Self {
        Self {
            username: username.to_lowercase(),
            outbound,
            source,
            profiles,
            state: SessionState::Connecting,
            producer: None,
            refresher: Arc::new(Mutex::new(RefresherState::Empty)),
            stream_stop: None,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Probe liveness and start exactly one producer. Returns once the
    /// offline messages are queued or the live producer is spawned.
    pub async fn start(&mut self) {
        let live = match self.source.probe_live(&self.username).await {
            Ok(live) => live,
            Err(e) => {
                // The probe fails closed: any error means the offline path.
                warn!(
                    component = "session",
                    event = "session.probe.failed",
                    username = %self.username,
                    error = %e,
                    "Liveness probe failed, treating user as offline"
                );
                false
            }
        };

        if live {
            self.start_live().await;
        } else {
            self.start_offline().await;
        }
    }

    async fn start_offline(&mut self) {
        self.state = SessionState::Offline;
        info!(
            component = "session",
            event = "session.offline",
            username = %self.username,
            "User is offline, scraping profile"
        );

        self.send(WireMessage::SystemStatus {
            status: "User is offline. Scraping profile...".to_string(),
            level: StatusLevel::Info,
        })
        .await;

        let profile = match self.profiles.fetch(&self.username).await {
            Some(profile) => profile,
            None => {
                self.send(WireMessage::SystemStatus {
                    status: format!("Could not retrieve profile for @{}.", self.username),
                    level: StatusLevel::Error,
                })
                .await;
                ProfileSnapshot::placeholder(&self.username)
            }
        };

        self.send(WireMessage::ProfileInfo { data: profile }).await;
        self.send(WireMessage::StatusUpdate {
            status: StreamStatus::Offline,
        })
        .await;
    }

    async fn start_live(&mut self) {
        let stream = match self
            .source
            .start(&self.username, StartOptions::default())
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                // Fatal for the live path; the connection stays open idle.
                error!(
                    component = "session",
                    event = "session.source.start_failed",
                    username = %self.username,
                    error = %e,
                    "Failed to start live event source"
                );
                self.send(WireMessage::SystemStatus {
                    status: format!("Failed to connect to @{}'s livestream.", self.username),
                    level: StatusLevel::Error,
                })
                .await;
                return;
            }
        };

        info!(
            component = "session",
            event = "session.live",
            username = %self.username,
            "Live event source started"
        );

        self.state = SessionState::Live;
        self.stream_stop = Some(stream.stop_handle());
        self.producer = Some(tokio::spawn(forward_events(
            stream,
            self.outbound.clone(),
            self.source.clone(),
            self.username.clone(),
            self.refresher.clone(),
        )));
    }

    /// Tear down all background work. Re-entrant-safe: a second call (for
    /// example a disconnect racing an error path) finds nothing left to
    /// release and does nothing.
    pub fn teardown(&mut self) {
        let first = self.state != SessionState::Ended;
        self.state = SessionState::Ended;

        if let Some(stop) = self.stream_stop.take() {
            stop.stop();
        }
        if let Some(task) = self.producer.take() {
            task.abort();
        }
        close_refresher(&self.refresher);

        if first {
            info!(
                component = "session",
                event = "session.ended",
                username = %self.username,
                "Connection closed and tasks cleaned up"
            );
        }
    }

    async fn send(&self, msg: WireMessage) {
        if self.outbound.send(msg).await.is_err() {
            debug!(
                component = "session",
                event = "session.send.dropped",
                username = %self.username,
                "Transport closed, dropping message"
            );
        }
    }
}

/// Live-path producer: forwards normalized events until the source ends,
/// the stream goes terminal, or the transport closes.
async fn forward_events(
    mut stream: flarecast_source::EventStream,
    outbound: mpsc::Sender<WireMessage>,
    source: Arc<dyn LiveSource>,
    username: String,
    refresher: RefresherSlot,
) {
    while let Some(event) = stream.next().await {
        let terminal = matches!(event, LiveEvent::LiveEnd);

        for msg in normalize(&event) {
            if outbound.send(msg).await.is_err() {
                debug!(
                    component = "session",
                    event = "session.forward.transport_closed",
                    username = %username,
                    "Transport closed, stopping event forwarding"
                );
                stream.stop();
                close_refresher(&refresher);
                return;
            }
        }

        if let LiveEvent::Connect { .. } = &event {
            spawn_refresher(
                &refresher,
                source.clone(),
                username.clone(),
                outbound.clone(),
                connect_stats(&event),
            );
        }

        if terminal {
            break;
        }
    }

    stream.stop();
    close_refresher(&refresher);
}

/// Periodic stats refresh. Best-effort telemetry: any fetch error stops
/// this task silently and never touches the rest of the session.
async fn refresh_stats(
    source: Arc<dyn LiveSource>,
    username: String,
    outbound: mpsc::Sender<WireMessage>,
    mut cached: Option<StatsSnapshot>,
) {
    loop {
        tokio::time::sleep(STATS_REFRESH_INTERVAL).await;

        let stats = match source.fetch_room_stats(&username).await {
            Ok(Some(stats)) => stats,
            Ok(None) => continue,
            Err(e) => {
                debug!(
                    component = "session",
                    event = "session.stats_refresh.stopped",
                    username = %username,
                    error = %e,
                    "Stats refresh failed, stopping refresh loop"
                );
                return;
            }
        };

        if cached == Some(stats) {
            continue;
        }
        cached = Some(stats);

        if outbound
            .send(WireMessage::StatsUpdate { data: stats })
            .await
            .is_err()
        {
            return;
        }
    }
}
