//! HTML pages
//!
//! The landing page and the per-user overlay page. Templates are embedded
//! at compile time; the overlay template carries `__PAGE_TITLE__`,
//! `__PAGE_DESCRIPTION__` and `__PAGE_ICON__` placeholders filled from a
//! profile lookup so link previews show the tracked user.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Html,
};
use tracing::debug;

use crate::state::AppState;

const LANDING_TEMPLATE: &str = include_str!("../assets/landing.html");
const OVERLAY_TEMPLATE: &str = include_str!("../assets/overlay.html");

const DEFAULT_TITLE: &str = "Flarecast Overlay";
const DEFAULT_DESCRIPTION: &str = "Live interaction overlay";
const DEFAULT_ICON: &str = "/favicon.ico";

pub async fn landing() -> Html<&'static str> {
    Html(LANDING_TEMPLATE)
}

pub async fn overlay(
    Path(username): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Html<String> {
    let username = username.to_lowercase();
    let profile = state.profiles().fetch(&username).await;
    if profile.is_none() {
        debug!(
            component = "pages",
            event = "pages.overlay.profile_missing",
            username = %username,
            "No profile for overlay page, using placeholders"
        );
    }

    let (title, description, icon) = match &profile {
        Some(p) => (
            format!("{} (@{})", p.nickname, p.username),
            p.bio.clone(),
            p.avatar.clone().unwrap_or_else(|| DEFAULT_ICON.to_string()),
        ),
        None => (
            DEFAULT_TITLE.to_string(),
            DEFAULT_DESCRIPTION.to_string(),
            DEFAULT_ICON.to_string(),
        ),
    };

    Html(render_overlay(&title, &description, &icon))
}

fn render_overlay(title: &str, description: &str, icon: &str) -> String {
    OVERLAY_TEMPLATE
        .replace("__PAGE_TITLE__", &escape_html(title))
        .replace("__PAGE_DESCRIPTION__", &escape_html(description))
        .replace("__PAGE_ICON__", &escape_html(icon))
}

/// Escape text for interpolation into HTML content or quoted attributes.
fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
