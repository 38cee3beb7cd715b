//! LinkedIn capability
//!
//! Media is registered first (`assets?action=registerUpload`), the binary
//! is PUT to the returned upload URL, and the share references the asset
//! URN. Text-only shares skip the upload. Refresh is the OAuth2 refresh
//! grant against the LinkedIn token endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::OAuthApp;
use crate::error::PublishError;
use crate::media::{self, MediaKind};
use crate::platforms::{network_error, remote_rejected, Capability};
use crate::types::{PlatformKind, Post, PostTarget, RefreshedCredential, SocialAccount};

const API_BASE: &str = "https://api.linkedin.com/v2";
const TOKEN_URL: &str = "https://www.linkedin.com/oauth/v2/accessToken";

pub struct LinkedinCapability {
    http: Client,
    app: OAuthApp,
}

impl LinkedinCapability {
    pub fn new(app: OAuthApp) -> Self {
        Self {
            http: Client::new(),
            app,
        }
    }

    /// Register an upload slot and push the media bytes into it.
    /// Returns the asset URN the share will reference.
    async fn upload_asset(
        &self,
        account: &SocialAccount,
        url: &str,
        author_urn: &str,
    ) -> Result<String, PublishError> {
        let recipe = if MediaKind::from_url(url).is_video() {
            "urn:li:digitalmediaRecipe:feedshare-video"
        } else {
            "urn:li:digitalmediaRecipe:feedshare-image"
        };

        let body = serde_json::json!({
            "registerUploadRequest": {
                "recipes": [recipe],
                "owner": author_urn,
                "serviceRelationships": [{
                    "relationshipType": "OWNER",
                    "identifier": "urn:li:userGeneratedContent",
                }],
            },
        });

        let resp = self
            .http
            .post(format!("{}/assets?action=registerUpload", API_BASE))
            .bearer_auth(&account.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| network_error("LinkedIn register upload", e))?;

        if !resp.status().is_success() {
            return Err(remote_rejected("LinkedIn register upload", resp).await);
        }

        let registered: RegisterUploadResponse = resp
            .json()
            .await
            .map_err(|e| network_error("LinkedIn register upload response", e))?;

        let upload_url = registered
            .value
            .upload_mechanism
            .media_upload
            .upload_url;
        let asset = registered.value.asset;

        let data = media::fetch_media(&self.http, url).await?;

        let resp = self
            .http
            .put(&upload_url)
            .bearer_auth(&account.access_token)
            .body(data)
            .send()
            .await
            .map_err(|e| network_error("LinkedIn media upload", e))?;

        if !resp.status().is_success() {
            return Err(remote_rejected("LinkedIn media upload", resp).await);
        }

        Ok(asset)
    }
}

#[async_trait]
impl Capability for LinkedinCapability {
    fn platform(&self) -> PlatformKind {
        PlatformKind::Linkedin
    }

    async fn publish(
        &self,
        account: &SocialAccount,
        post: &Post,
        _target: &PostTarget,
    ) -> Result<String, PublishError> {
        if post.content.trim().is_empty() && post.media_urls.is_empty() {
            return Err(PublishError::MissingMedia(
                "LinkedIn requires text or at least one media attachment".to_string(),
            ));
        }

        let author_urn = format!("urn:li:person:{}", account.platform_user_id);

        let mut media_entries = Vec::new();
        let mut share_category = "NONE";
        for url in &post.media_urls {
            let asset = self.upload_asset(account, url, &author_urn).await?;
            share_category = if MediaKind::from_url(url).is_video() {
                "VIDEO"
            } else {
                "IMAGE"
            };
            media_entries.push(serde_json::json!({
                "status": "READY",
                "media": asset,
            }));
        }

        let body = serde_json::json!({
            "author": author_urn,
            "lifecycleState": "PUBLISHED",
            "specificContent": {
                "com.linkedin.ugc.ShareContent": {
                    "shareCommentary": { "text": post.content },
                    "shareMediaCategory": share_category,
                    "media": media_entries,
                },
            },
            "visibility": {
                "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC",
            },
        });

        let resp = self
            .http
            .post(format!("{}/ugcPosts", API_BASE))
            .bearer_auth(&account.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| network_error("LinkedIn share create", e))?;

        if !resp.status().is_success() {
            return Err(remote_rejected("LinkedIn share create", resp).await);
        }

        let created: UgcPostResponse = resp
            .json()
            .await
            .map_err(|e| network_error("LinkedIn share create response", e))?;

        Ok(created.id)
    }

    async fn refresh(
        &self,
        account: &SocialAccount,
    ) -> Result<RefreshedCredential, PublishError> {
        let refresh_token = account.refresh_token.as_deref().ok_or_else(|| {
            PublishError::RemoteRejected("LinkedIn account has no refresh token".to_string())
        })?;

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.app.client_id.as_str()),
            ("client_secret", self.app.client_secret.as_str()),
        ];

        let resp = self
            .http
            .post(TOKEN_URL)
            .form(&params)
            .send()
            .await
            .map_err(|e| network_error("LinkedIn token refresh", e))?;

        if !resp.status().is_success() {
            return Err(remote_rejected("LinkedIn token refresh", resp).await);
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| network_error("LinkedIn token refresh response", e))?;

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
struct RegisterUploadResponse {
    value: RegisterUploadValue,
}

#[derive(Debug, Deserialize)]
struct RegisterUploadValue {
    asset: String,
    #[serde(rename = "uploadMechanism")]
    upload_mechanism: UploadMechanism,
}

#[derive(Debug, Deserialize)]
struct UploadMechanism {
    #[serde(
        rename = "com.linkedin.digitalmedia.uploading.MediaUploadHttpRequest"
    )]
    media_upload: MediaUploadRequest,
}

#[derive(Debug, Deserialize)]
struct MediaUploadRequest {
    #[serde(rename = "uploadUrl")]
    upload_url: String,
}

#[derive(Debug, Deserialize)]
struct UgcPostResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
}
