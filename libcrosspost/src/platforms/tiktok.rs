//! TikTok capability
//!
//! Video-only platform. Publishing hands TikTok the video URL
//! (PULL_FROM_URL source) and then polls the publish status endpoint until
//! the remote side finishes pulling and processing, bounded like every
//! other async publish flow. Refresh is the standard OAuth2 refresh grant
//! against the TikTok token endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::OAuthApp;
use crate::error::PublishError;
use crate::media::MediaKind;
use crate::platforms::{
    network_error, poll_until_ready, remote_rejected, Capability, PollStatus, POLL_INTERVAL,
    POLL_MAX_ATTEMPTS,
};
use crate::types::{PlatformKind, Post, PostTarget, RefreshedCredential, SocialAccount};

const API_BASE: &str = "https://open.tiktokapis.com";

pub struct TiktokCapability {
    http: Client,
    app: OAuthApp,
}

impl TiktokCapability {
    pub fn new(app: OAuthApp) -> Self {
        Self {
            http: Client::new(),
            app,
        }
    }

    async fn check_publish_status(
        &self,
        access_token: &str,
        publish_id: &str,
    ) -> Result<PollStatus, PublishError> {
        let body = serde_json::json!({ "publish_id": publish_id });

        let resp = self
            .http
            .post(format!("{}/v2/post/publish/status/fetch/", API_BASE))
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| network_error("TikTok status fetch", e))?;

        if !resp.status().is_success() {
            return Err(remote_rejected("TikTok status fetch", resp).await);
        }

        let status: StatusResponse = resp
            .json()
            .await
            .map_err(|e| network_error("TikTok status response", e))?;

        Ok(match status.data.status.as_str() {
            "PUBLISH_COMPLETE" => PollStatus::Ready,
            "FAILED" => PollStatus::Failed(
                status
                    .data
                    .fail_reason
                    .unwrap_or_else(|| "TikTok publish failed".to_string()),
            ),
            _ => PollStatus::Pending,
        })
    }
}

#[async_trait]
impl Capability for TiktokCapability {
    fn platform(&self) -> PlatformKind {
        PlatformKind::Tiktok
    }

    async fn publish(
        &self,
        account: &SocialAccount,
        post: &Post,
        _target: &PostTarget,
    ) -> Result<String, PublishError> {
        let video_url = post
            .media_urls
            .iter()
            .find(|url| MediaKind::from_url(url).is_video())
            .ok_or_else(|| {
                PublishError::MissingMedia(
                    "TikTok requires at least one video attachment".to_string(),
                )
            })?;

        let body = serde_json::json!({
            "post_info": {
                "title": post.content,
                "privacy_level": "PUBLIC_TO_EVERYONE",
            },
            "source_info": {
                "source": "PULL_FROM_URL",
                "video_url": video_url,
            },
        });

        let resp = self
            .http
            .post(format!("{}/v2/post/publish/video/init/", API_BASE))
            .bearer_auth(&account.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| network_error("TikTok publish init", e))?;

        if !resp.status().is_success() {
            return Err(remote_rejected("TikTok publish init", resp).await);
        }

        let init: InitResponse = resp
            .json()
            .await
            .map_err(|e| network_error("TikTok publish init response", e))?;
        let publish_id = init.data.publish_id;

        poll_until_ready(POLL_MAX_ATTEMPTS, POLL_INTERVAL, || {
            self.check_publish_status(&account.access_token, &publish_id)
        })
        .await?;

        Ok(publish_id)
    }

    async fn refresh(
        &self,
        account: &SocialAccount,
    ) -> Result<RefreshedCredential, PublishError> {
        let refresh_token = account.refresh_token.as_deref().ok_or_else(|| {
            PublishError::RemoteRejected("TikTok account has no refresh token".to_string())
        })?;

        let params = [
            ("client_key", self.app.client_id.as_str()),
            ("client_secret", self.app.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        let resp = self
            .http
            .post(format!("{}/v2/oauth/token/", API_BASE))
            .form(&params)
            .send()
            .await
            .map_err(|e| network_error("TikTok token refresh", e))?;

        if !resp.status().is_success() {
            return Err(remote_rejected("TikTok token refresh", resp).await);
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| network_error("TikTok token refresh response", e))?;

        Ok(RefreshedCredential {
            access_token: token.access_token,
            // TikTok rotates refresh tokens on every exchange
            refresh_token: Some(token.refresh_token),
            expires_in: token.expires_in,
        })
    }

    fn supports_refresh(&self) -> bool {
        true
    }
}

#[derive(Debug, Deserialize)]
struct InitResponse {
    data: InitData,
}

#[derive(Debug, Deserialize)]
struct InitData {
    publish_id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    data: StatusData,
}

#[derive(Debug, Deserialize)]
struct StatusData {
    status: String,
    fail_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capability() -> TiktokCapability {
        TiktokCapability::new(OAuthApp {
            client_id: "key".to_string(),
            client_secret: "secret".to_string(),
        })
    }

    fn account() -> SocialAccount {
        SocialAccount {
            id: "acct-tt".to_string(),
            org_id: "org-1".to_string(),
            platform: PlatformKind::Tiktok,
            access_token: "token".to_string(),
            refresh_token: Some("refresh".to_string()),
            token_expires_at: None,
            platform_user_id: "tt-1".to_string(),
            username: "creator".to_string(),
            last_sync_at: None,
        }
    }

    #[test]
    fn test_platform_kind() {
        assert_eq!(capability().platform(), PlatformKind::Tiktok);
        assert!(capability().supports_refresh());
        assert!(capability().requires_refresh_token());
    }

    #[tokio::test]
    async fn test_publish_rejects_post_without_media() {
        let cap = capability();
        let post = Post::new("org-1".to_string(), "caption".to_string(), vec![]);
        let target = PostTarget::new("acct-tt".to_string(), None);

        let result = cap.publish(&account(), &post, &target).await;
        match result {
            Err(PublishError::MissingMedia(msg)) => {
                assert!(msg.contains("video"));
            }
            other => panic!("Expected MissingMedia, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_rejects_image_only_media() {
        let cap = capability();
        let post = Post::new(
            "org-1".to_string(),
            "caption".to_string(),
            vec!["https://cdn.example.com/photo.jpg".to_string()],
        );
        let target = PostTarget::new("acct-tt".to_string(), None);

        let result = cap.publish(&account(), &post, &target).await;
        assert!(matches!(result, Err(PublishError::MissingMedia(_))));
    }
}
