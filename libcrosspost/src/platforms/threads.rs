//! Threads capability
//!
//! Same container flow as Instagram, against the Threads graph: create a
//! TEXT, IMAGE or VIDEO container, poll until the backend reports
//! FINISHED, then publish it. Text-only posts still go through a
//! container, so no media precondition applies. Tokens are long-lived and
//! re-extended without a refresh token.

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

const GRAPH_BASE: &str = "https://graph.threads.net/v1.0";
const REFRESH_URL: &str = "https://graph.threads.net/refresh_access_token";

pub struct ThreadsCapability {
    http: Client,
}

impl ThreadsCapability {
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
            .query(&[("fields", "status"), ("access_token", access_token)])
            .send()
            .await
            .map_err(|e| network_error("Threads container status", e))?;

        if !resp.status().is_success() {
            return Err(remote_rejected("Threads container status", resp).await);
        }

        let status: ContainerStatus = resp
            .json()
            .await
            .map_err(|e| network_error("Threads container status response", e))?;

        Ok(match status.status.as_str() {
            "FINISHED" => PollStatus::Ready,
            "ERROR" => PollStatus::Failed("Threads media processing failed".to_string()),
            _ => PollStatus::Pending,
        })
    }
}

impl Default for ThreadsCapability {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Capability for ThreadsCapability {
    fn platform(&self) -> PlatformKind {
        PlatformKind::Threads
    }

    async fn publish(
        &self,
        account: &SocialAccount,
        post: &Post,
        _target: &PostTarget,
    ) -> Result<String, PublishError> {
        if post.content.trim().is_empty() && post.media_urls.is_empty() {
            return Err(PublishError::MissingMedia(
                "Threads requires text or at least one media attachment".to_string(),
            ));
        }

        // Step 1: create the container
        let mut params = vec![
            ("text", post.content.clone()),
            ("access_token", account.access_token.clone()),
        ];
        match post.media_urls.first() {
            None => params.push(("media_type", "TEXT".to_string())),
            Some(url) if MediaKind::from_url(url).is_video() => {
                params.push(("media_type", "VIDEO".to_string()));
                params.push(("video_url", url.clone()));
            }
            Some(url) => {
                params.push(("media_type", "IMAGE".to_string()));
                params.push(("image_url", url.clone()));
            }
        }

        let resp = self
            .http
            .post(format!(
                "{}/{}/threads",
                GRAPH_BASE, account.platform_user_id
            ))
            .form(&params)
            .send()
            .await
            .map_err(|e| network_error("Threads container create", e))?;

        if !resp.status().is_success() {
            return Err(remote_rejected("Threads container create", resp).await);
        }

        let container: IdResponse = resp
            .json()
            .await
            .map_err(|e| network_error("Threads container create response", e))?;

        // Step 2: wait for ingestion
        poll_until_ready(POLL_MAX_ATTEMPTS, POLL_INTERVAL, || {
            self.check_container(&account.access_token, &container.id)
        })
        .await?;

        // Step 3: publish the container
        let resp = self
            .http
            .post(format!(
                "{}/{}/threads_publish",
                GRAPH_BASE, account.platform_user_id
            ))
            .form(&[
                ("creation_id", container.id.as_str()),
                ("access_token", account.access_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| network_error("Threads publish", e))?;

        if !resp.status().is_success() {
            return Err(remote_rejected("Threads publish", resp).await);
        }

        let published: IdResponse = resp
            .json()
            .await
            .map_err(|e| network_error("Threads publish response", e))?;

        Ok(published.id)
    }

    async fn refresh(
        &self,
        account: &SocialAccount,
    ) -> Result<RefreshedCredential, PublishError> {
        let resp = self
            .http
            .get(REFRESH_URL)
            .query(&[
                ("grant_type", "th_refresh_token"),
                ("access_token", account.access_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| network_error("Threads token refresh", e))?;

        if !resp.status().is_success() {
            return Err(remote_rejected("Threads token refresh", resp).await);
        }

        let token: RefreshResponse = resp
            .json()
            .await
            .map_err(|e| network_error("Threads token refresh response", e))?;

        Ok(RefreshedCredential {
            access_token: token.access_token,
            refresh_token: None,
            expires_in: token.expires_in,
        })
    }

    fn supports_refresh(&self) -> bool {
        true
    }

    /// Threads re-extends the access token itself; no refresh token exists
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
    status: String,
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
            id: "acct-th".to_string(),
            org_id: "org-1".to_string(),
            platform: PlatformKind::Threads,
            access_token: "token".to_string(),
            refresh_token: None,
            token_expires_at: None,
            platform_user_id: "th-1".to_string(),
            username: "poster".to_string(),
            last_sync_at: None,
        }
    }

    #[test]
    fn test_platform_kind() {
        let cap = ThreadsCapability::new();
        assert_eq!(cap.platform(), PlatformKind::Threads);
        assert!(cap.supports_refresh());
        assert!(!cap.requires_refresh_token());
    }

    #[tokio::test]
    async fn test_publish_rejects_empty_post() {
        let cap = ThreadsCapability::new();
        let post = Post::new("org-1".to_string(), "".to_string(), vec![]);
        let target = PostTarget::new("acct-th".to_string(), None);

        let result = cap.publish(&account(), &post, &target).await;
        assert!(matches!(result, Err(PublishError::MissingMedia(_))));
    }
}
