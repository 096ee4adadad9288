//! Profile scraping
//!
//! Fetches public profile metadata from the user's profile page. The page
//! embeds a structured-data JSON document; we pull the fields the overlay
//! needs out of its well-known nested path. Every failure mode degrades to
//! `None`; callers substitute placeholder data, never errors.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use flarecast_protocol::{ProfileSnapshot, PLACEHOLDER_BIO};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const EMBED_MARKER: &str = "__UNIVERSAL_DATA_FOR_REHYDRATION__";

/// Profile lookup capability, separated out so sessions can be tested
/// without touching the network.
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    /// Fetch a snapshot for `username`; `None` means not found or any
    /// transient failure. Idempotent and side-effect-free.
    async fn fetch(&self, username: &str) -> Option<ProfileSnapshot>;
}

/// HTTP-backed profile fetcher
#[derive(Clone)]
pub struct ProfileFetcher {
    client: reqwest::Client,
}

impl ProfileFetcher {
    pub fn new() -> reqwest::Result<Self> {
        // The target blocks non-browser requests, so identify as one.
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }

    async fn fetch_page(&self, username: &str) -> reqwest::Result<Option<String>> {
        let url = format!("https://www.tiktok.com/@{username}");
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            debug!(
                component = "profile",
                event = "profile.fetch.http_status",
                username = %username,
                status = %response.status(),
                "Profile page returned non-success status"
            );
            return Ok(None);
        }
        Ok(Some(response.text().await?))
    }
}

#[async_trait]
impl ProfileLookup for ProfileFetcher {
    async fn fetch(&self, username: &str) -> Option<ProfileSnapshot> {
        match self.fetch_page(username).await {
            Ok(Some(body)) => extract_profile(&body, username),
            Ok(None) => None,
            Err(e) => {
                warn!(
                    component = "profile",
                    event = "profile.fetch.failed",
                    username = %username,
                    error = %e,
                    "Profile fetch failed"
                );
                None
            }
        }
    }
}

/// Pull the embedded structured-data document out of the page and reduce it
/// to a snapshot. `None` on a missing or malformed document.
fn extract_profile(html: &str, username: &str) -> Option<ProfileSnapshot> {
    let raw = extract_embedded_json(html)?;
    let data: Value = serde_json::from_str(raw).ok()?;

    let user_info = data
        .get("__DEFAULT_SCOPE__")?
        .get("webapp.user-detail")?
        .get("userInfo")?;
    let user = user_info.get("user")?;
    let stats = user_info.get("stats");

    Some(ProfileSnapshot {
        nickname: user
            .get("nickname")
            .and_then(Value::as_str)
            .unwrap_or(username)
            .to_string(),
        username: user
            .get("uniqueId")
            .and_then(Value::as_str)
            .unwrap_or(username)
            .to_string(),
        avatar: user
            .get("avatarLarger")
            .and_then(Value::as_str)
            .map(str::to_string),
        followers: stats
            .and_then(|s| s.get("followerCount"))
            .and_then(Value::as_u64)
            .unwrap_or(0),
        following: stats
            .and_then(|s| s.get("followingCount"))
            .and_then(Value::as_u64)
            .unwrap_or(0),
        bio: user
            .get("signature")
            .and_then(Value::as_str)
            .unwrap_or(PLACEHOLDER_BIO)
            .replace('\n', " "),
    })
}

/// The document sits in `<script id="__UNIVERSAL_DATA_FOR_REHYDRATION__"
/// type="application/json">...</script>`.
fn extract_embedded_json(html: &str) -> Option<&str> {
    let marker = html.find(EMBED_MARKER)?;
    let tag_end = marker + html[marker..].find('>')? + 1;
    let close = tag_end + html[tag_end..].find("</script>")?;
    Some(&html[tag_end..close])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with(data: &str) -> String {
        format!(
            "<html><head><script id=\"{EMBED_MARKER}\" type=\"application/json\">{data}</script></head><body></body></html>"
        )
    }

    #[test]
    fn extracts_full_profile() {
        let html = page_with(
            r#"{"__DEFAULT_SCOPE__":{"webapp.user-detail":{"userInfo":{
                "user":{"nickname":"Alice","uniqueId":"alice","avatarLarger":"https://cdn/a.jpg","signature":"first line\nsecond line"},
                "stats":{"followerCount":120,"followingCount":45}
            }}}}"#,
        );

        let profile = extract_profile(&html, "alice").expect("profile");
        assert_eq!(profile.nickname, "Alice");
        assert_eq!(profile.username, "alice");
        assert_eq!(profile.avatar.as_deref(), Some("https://cdn/a.jpg"));
        assert_eq!(profile.followers, 120);
        assert_eq!(profile.following, 45);
        assert_eq!(profile.bio, "first line second line");
    }

    #[test]
    fn missing_fields_fall_back_to_request() {
        let html = page_with(
            r#"{"__DEFAULT_SCOPE__":{"webapp.user-detail":{"userInfo":{"user":{}}}}}"#,
        );

        let profile = extract_profile(&html, "bob").expect("profile");
        assert_eq!(profile.nickname, "bob");
        assert_eq!(profile.username, "bob");
        assert_eq!(profile.avatar, None);
        assert_eq!(profile.followers, 0);
        assert_eq!(profile.bio, PLACEHOLDER_BIO);
    }

    #[test]
    fn missing_document_yields_none() {
        assert!(extract_profile("<html><body>nope</body></html>", "x").is_none());
    }

    #[test]
    fn malformed_document_yields_none() {
        let html = page_with("{not json");
        assert!(extract_profile(&html, "x").is_none());
    }

    #[test]
    fn missing_user_detail_yields_none() {
        let html = page_with(r#"{"__DEFAULT_SCOPE__":{}}"#);
        assert!(extract_profile(&html, "x").is_none());
    }
}
