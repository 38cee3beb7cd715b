//! Instagram capability
//!
//! Publishing is the Graph API container flow: create a media container
//! for the image or video, poll its status code until the backend reports
//! FINISHED, then publish the container. The access token is a long-lived
//! Instagram token refreshed by re-extension — no refresh token exists for
//! these accounts.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::PublishError;
use crate::media::MediaKind;
use crate::platforms::{
    network_error, poll_until_ready, remote_rejected, Capability, PollStatus, POLL_INTERVAL,
    POLL_MAX_ATTEMPTS,
};
use crate::types::{PlatformKind, Post, PostTarget, RefreshedCredential, SocialAccount};

const GRAPH_BASE: &str = "https://graph.facebook.com/v19.0";
const REFRESH_BASE: &str = "https://graph.instagram.com";

pub struct InstagramCapability {
    http: Client,
}

impl InstagramCapability {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }

    async fn check_container(
        &self,
        access_token: &str,
        container_id: &str,
    ) -> Result<PollStatus, PublishError> {
        let resp = self
            .http
            .get(format!("{}/{}", GRAPH_BASE, container_id))
            .query(&[("fields", "status_code"), ("access_token", access_token)])
            .send()
            .await
            .map_err(|e| network_error("Instagram container status", e))?;

        if !resp.status().is_success() {
            return Err(remote_rejected("Instagram container status", resp).await);
        }

        let status: ContainerStatus = resp
            .json()
            .await
            .map_err(|e| network_error("Instagram container status response", e))?;

        Ok(match status.status_code.as_str() {
            "FINISHED" => PollStatus::Ready,
            "ERROR" => PollStatus::Failed("Instagram media processing failed".to_string()),
            _ => PollStatus::Pending,
        })
    }
}

impl Default for InstagramCapability {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Capability for InstagramCapability {
    fn platform(&self) -> PlatformKind {
        PlatformKind::Instagram
    }

    async fn publish(
        &self,
        account: &SocialAccount,
        post: &Post,
        _target: &PostTarget,
    ) -> Result<String, PublishError> {
        let media_url = post.media_urls.first().ok_or_else(|| {
            PublishError::MissingMedia(
                "Instagram requires at least one media attachment".to_string(),
            )
        })?;

        // Step 1: create the media container
        let mut params = vec![
            ("caption", post.content.clone()),
            ("access_token", account.access_token.clone()),
        ];
        if MediaKind::from_url(media_url).is_video() {
            params.push(("media_type", "REELS".to_string()));
            params.push(("video_url", media_url.clone()));
        } else {
            params.push(("image_url", media_url.clone()));
        }

        let resp = self
            .http
            .post(format!(
                "{}/{}/media",
                GRAPH_BASE, account.platform_user_id
            ))
            .form(&params)
            .send()
            .await
            .map_err(|e| network_error("Instagram container create", e))?;

        if !resp.status().is_success() {
            return Err(remote_rejected("Instagram container create", resp).await);
        }

        let container: IdResponse = resp
            .json()
            .await
            .map_err(|e| network_error("Instagram container create response", e))?;

        // Step 2: wait for the backend to finish ingesting the media
        poll_until_ready(POLL_MAX_ATTEMPTS, POLL_INTERVAL, || {
            self.check_container(&account.access_token, &container.id)
        })
        .await?;

        // Step 3: publish the finished container
        let resp = self
            .http
            .post(format!(
                "{}/{}/media_publish",
                GRAPH_BASE, account.platform_user_id
            ))
            .form(&[
                ("creation_id", container.id.as_str()),
                ("access_token", account.access_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| network_error("Instagram media publish", e))?;

        if !resp.status().is_success() {
            return Err(remote_rejected("Instagram media publish", resp).await);
        }

        let published: IdResponse = resp
            .json()
            .await
            .map_err(|e| network_error("Instagram media publish response", e))?;

        Ok(published.id)
    }

    async fn refresh(
        &self,
        account: &SocialAccount,
    ) -> Result<RefreshedCredential, PublishError> {
        let resp = self
            .http
            .get(format!("{}/refresh_access_token", REFRESH_BASE))
            .query(&[
                ("grant_type", "ig_refresh_token"),
                ("access_token", account.access_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| network_error("Instagram token refresh", e))?;

        if !resp.status().is_success() {
            return Err(remote_rejected("Instagram token refresh", resp).await);
        }

        let token: RefreshResponse = resp
            .json()
            .await
            .map_err(|e| network_error("Instagram token refresh response", e))?;

        Ok(RefreshedCredential {
            access_token: token.access_token,
            refresh_token: None,
            expires_in: token.expires_in,
        })
    }

    fn supports_refresh(&self) -> bool {
        true
    }

    /// Instagram re-extends the access token itself; no refresh token exists
    fn requires_refresh_token(&self) -> bool {
        false
    }
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ContainerStatus {
    status_code: String,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> SocialAccount {
        SocialAccount {
            id: "acct-ig".to_string(),
            org_id: "org-1".to_string(),
            platform: PlatformKind::Instagram,
            access_token: "token".to_string(),
            refresh_token: None,
            token_expires_at: None,
            platform_user_id: "ig-1".to_string(),
            username: "creator".to_string(),
            last_sync_at: None,
        }
    }

    #[test]
    fn test_platform_kind() {
        let cap = InstagramCapability::new();
        assert_eq!(cap.platform(), PlatformKind::Instagram);
        assert!(cap.supports_refresh());
        // Re-extension works off the access token alone
        assert!(!cap.requires_refresh_token());
    }

    #[tokio::test]
    async fn test_publish_rejects_post_without_media() {
        let cap = InstagramCapability::new();
        let post = Post::new("org-1".to_string(), "caption".to_string(), vec![]);
        let target = PostTarget::new("acct-ig".to_string(), None);

        let result = cap.publish(&account(), &post, &target).await;
        match result {
            Err(PublishError::MissingMedia(msg)) => {
                assert!(msg.contains("media"));
            }
            other => panic!("Expected MissingMedia, got {:?}", other),
        }
    }
}
