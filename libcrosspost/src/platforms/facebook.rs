//! Facebook capability
//!
//! Page publishing is a single Graph API call: text posts go to the feed
//! edge, photos and videos to their own edges with the media URL handed
//! to Facebook directly. Page access tokens are long-lived and have no
//! refresh flow, so this capability registers no refresh — the
//! coordinator treats that as a normal skip.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::PublishError;
use crate::media::MediaKind;
use crate::platforms::{network_error, remote_rejected, Capability};
use crate::types::{PlatformKind, Post, PostTarget, SocialAccount};

const GRAPH_BASE: &str = "https://graph.facebook.com/v19.0";

pub struct FacebookCapability {
    http: Client,
}

impl FacebookCapability {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

impl Default for FacebookCapability {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Capability for FacebookCapability {
    fn platform(&self) -> PlatformKind {
        PlatformKind::Facebook
    }

    async fn publish(
        &self,
        account: &SocialAccount,
        post: &Post,
        _target: &PostTarget,
    ) -> Result<String, PublishError> {
        if post.content.trim().is_empty() && post.media_urls.is_empty() {
            return Err(PublishError::MissingMedia(
                "Facebook requires text or at least one media attachment".to_string(),
            ));
        }

        let page_id = &account.platform_user_id;

        let (endpoint, params) = match post.media_urls.first() {
            None => (
                format!("{}/{}/feed", GRAPH_BASE, page_id),
                vec![
                    ("message", post.content.clone()),
                    ("access_token", account.access_token.clone()),
                ],
            ),
            Some(url) if MediaKind::from_url(url).is_video() => (
                format!("{}/{}/videos", GRAPH_BASE, page_id),
                vec![
                    ("file_url", url.clone()),
                    ("description", post.content.clone()),
                    ("access_token", account.access_token.clone()),
                ],
            ),
            Some(url) => (
                format!("{}/{}/photos", GRAPH_BASE, page_id),
                vec![
                    ("url", url.clone()),
                    ("caption", post.content.clone()),
                    ("access_token", account.access_token.clone()),
                ],
            ),
        };

        let resp = self
            .http
            .post(&endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| network_error("Facebook publish", e))?;

        if !resp.status().is_success() {
            return Err(remote_rejected("Facebook publish", resp).await);
        }

        let created: CreateResponse = resp
            .json()
            .await
            .map_err(|e| network_error("Facebook publish response", e))?;

        // Photo posts return the feed post id separately from the photo id
        Ok(created.post_id.unwrap_or(created.id))
    }
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    id: String,
    post_id: Option<String>,
}
