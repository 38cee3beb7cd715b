//! Pinterest capability
//!
//! Pins are board-scoped: the destination board comes from the target's
//! metadata and its absence fails fast before any network call. Pin
//! creation is one call with the image URL as the media source. Refresh is
//! the OAuth2 refresh grant with Basic client authentication.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;

use crate::config::OAuthApp;
use crate::error::PublishError;
use crate::media::MediaKind;
use crate::platforms::{network_error, remote_rejected, Capability};
use crate::types::{PlatformKind, Post, PostTarget, RefreshedCredential, SocialAccount};

const API_BASE: &str = "https://api.pinterest.com/v5";

pub struct PinterestCapability {
    http: Client,
    app: OAuthApp,
}

impl PinterestCapability {
    pub fn new(app: OAuthApp) -> Self {
        Self {
            http: Client::new(),
            app,
        }
    }

    fn basic_auth_header(&self) -> String {
        let credentials = format!("{}:{}", self.app.client_id, self.app.client_secret);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials)
        )
    }
}

#[async_trait]
impl Capability for PinterestCapability {
    fn platform(&self) -> PlatformKind {
        PlatformKind::Pinterest
    }

    async fn publish(
        &self,
        account: &SocialAccount,
        post: &Post,
        target: &PostTarget,
    ) -> Result<String, PublishError> {
        let board_id = target.metadata_str("board_id").ok_or_else(|| {
            PublishError::MissingDestination(
                "No Pinterest board selected for this post".to_string(),
            )
        })?;

        let image_url = post
            .media_urls
            .iter()
            .find(|url| !MediaKind::from_url(url).is_video())
            .ok_or_else(|| {
                PublishError::MissingMedia(
                    "Pinterest requires at least one image attachment".to_string(),
                )
            })?;

        // Pins surface a short title plus the full description
        let title: String = post.content.chars().take(100).collect();

        let body = serde_json::json!({
            "board_id": board_id,
            "title": title,
            "description": post.content,
            "media_source": {
                "source_type": "image_url",
                "url": image_url,
            },
        });

        let resp = self
            .http
            .post(format!("{}/pins", API_BASE))
            .bearer_auth(&account.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| network_error("Pinterest pin create", e))?;

        if !resp.status().is_success() {
            return Err(remote_rejected("Pinterest pin create", resp).await);
        }

        let pin: PinResponse = resp
            .json()
            .await
            .map_err(|e| network_error("Pinterest pin create response", e))?;

        Ok(pin.id)
    }

    async fn refresh(
        &self,
        account: &SocialAccount,
    ) -> Result<RefreshedCredential, PublishError> {
        let refresh_token = account.refresh_token.as_deref().ok_or_else(|| {
            PublishError::RemoteRejected("Pinterest account has no refresh token".to_string())
        })?;

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        let resp = self
            .http
            .post(format!("{}/oauth/token", API_BASE))
            .header("Authorization", self.basic_auth_header())
            .form(&params)
            .send()
            .await
            .map_err(|e| network_error("Pinterest token refresh", e))?;

        if !resp.status().is_success() {
            return Err(remote_rejected("Pinterest token refresh", resp).await);
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| network_error("Pinterest token refresh response", e))?;

        Ok(RefreshedCredential {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in,
        })
    }

    fn supports_refresh(&self) -> bool {
        true
    }
}

#[derive(Debug, Deserialize)]
struct PinResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capability() -> PinterestCapability {
        PinterestCapability::new(OAuthApp {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
        })
    }

    fn account() -> SocialAccount {
        SocialAccount {
            id: "acct-pin".to_string(),
            org_id: "org-1".to_string(),
            platform: PlatformKind::Pinterest,
            access_token: "token".to_string(),
            refresh_token: Some("refresh".to_string()),
            token_expires_at: None,
            platform_user_id: "pin-1".to_string(),
            username: "pinner".to_string(),
            last_sync_at: None,
        }
    }

    #[test]
    fn test_platform_kind() {
        assert_eq!(capability().platform(), PlatformKind::Pinterest);
        assert!(capability().supports_refresh());
        assert!(capability().requires_refresh_token());
    }

    #[tokio::test]
    async fn test_publish_rejects_missing_board() {
        let cap = capability();
        let post = Post::new(
            "org-1".to_string(),
            "caption".to_string(),
            vec!["https://cdn.example.com/photo.jpg".to_string()],
        );
        let target = PostTarget::new("acct-pin".to_string(), None);

        let result = cap.publish(&account(), &post, &target).await;
        match result {
            Err(PublishError::MissingDestination(msg)) => {
                assert!(msg.contains("board"));
            }
            other => panic!("Expected MissingDestination, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_rejects_missing_image() {
        let cap = capability();
        let post = Post::new(
            "org-1".to_string(),
            "caption".to_string(),
            vec!["https://cdn.example.com/clip.mp4".to_string()],
        );
        let target = PostTarget::new(
            "acct-pin".to_string(),
            Some(serde_json::json!({ "board_id": "board-7" })),
        );

        let result = cap.publish(&account(), &post, &target).await;
        assert!(matches!(result, Err(PublishError::MissingMedia(_))));
    }

    #[tokio::test]
    async fn test_board_checked_before_media() {
        // Both preconditions violated: the destination check runs first
        let cap = capability();
        let post = Post::new("org-1".to_string(), "caption".to_string(), vec![]);
        let target = PostTarget::new("acct-pin".to_string(), None);

        let result = cap.publish(&account(), &post, &target).await;
        assert!(matches!(result, Err(PublishError::MissingDestination(_))));
    }
}
