//! Application state

use std::sync::Arc;

use flarecast_source::LiveSource;

use crate::profile::ProfileLookup;

/// Shared application state.
///
/// Nothing here is mutable: sessions own all of their per-connection state,
/// so the only things shared across connections are the profile fetcher and
/// the live event source.
pub struct AppState {
    profiles: Arc<dyn ProfileLookup>,
    source: Arc<dyn LiveSource>,
}

impl AppState {
    pub fn new(profiles: impl ProfileLookup + 'static, source: Arc<dyn LiveSource>) -> Self {
        Self {
            profiles: Arc::new(profiles),
            source,
        }
    }

    pub fn profiles(&self) -> Arc<dyn ProfileLookup> {
        self.profiles.clone()
    }

    pub fn source(&self) -> Arc<dyn LiveSource> {
        self.source.clone()
    }
}
