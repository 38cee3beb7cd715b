//! X/Twitter capability
//!
//! Media goes through the v2 media upload endpoints: simple multipart for
//! small images, INIT/APPEND/FINALIZE chunked upload for videos and any
//! payload at or above the chunked threshold, with a bounded STATUS poll
//! while the remote side transcodes. The tweet itself is one call to
//! `POST /2/tweets`. Token refresh uses the OAuth2 refresh grant with
//! Basic client authentication.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;

use crate::config::OAuthApp;
use crate::error::PublishError;
use crate::media;
use crate::platforms::{
    network_error, poll_until_ready, remote_rejected, Capability, PollStatus, POLL_INTERVAL,
    POLL_MAX_ATTEMPTS,
};
use crate::types::{PlatformKind, Post, PostTarget, RefreshedCredential, SocialAccount};

const API_BASE: &str = "https://api.x.com";

pub struct TwitterCapability {
    http: Client,
    app: OAuthApp,
}

impl TwitterCapability {
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

    async fn upload_media(
        &self,
        access_token: &str,
        url: &str,
    ) -> Result<String, PublishError> {
        let data = media::fetch_media(&self.http, url).await?;
        let mime = media::mime_for(url);
        let kind = media::MediaKind::from_url(url);

        // Videos always take the chunked path; images only above the
        // size threshold
        if kind.is_video() || media::needs_chunked_upload(data.len() as u64) {
            self.upload_media_chunked(access_token, &data, mime).await
        } else {
            self.upload_media_simple(access_token, &data, mime).await
        }
    }

    async fn upload_media_simple(
        &self,
        access_token: &str,
        data: &[u8],
        mime: &str,
    ) -> Result<String, PublishError> {
        let media_category = if mime == "image/gif" {
            "tweet_gif"
        } else {
            "tweet_image"
        };

        let part = reqwest::multipart::Part::bytes(data.to_vec())
            .mime_str(mime)
            .map_err(|e| PublishError::Network(format!("invalid mime type: {}", e)))?;

        let form = reqwest::multipart::Form::new()
            .text("media_category", media_category.to_string())
            .text("media_type", mime.to_string())
            .part("media", part);

        let resp = self
            .http
            .post(format!("{}/2/media/upload", API_BASE))
            .bearer_auth(access_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| network_error("Twitter media upload", e))?;

        if !resp.status().is_success() {
            return Err(remote_rejected("Twitter media upload", resp).await);
        }

        let wrapper: MediaUploadResponse = resp
            .json()
            .await
            .map_err(|e| network_error("Twitter media upload response", e))?;
        Ok(wrapper.data.id)
    }

    /// Chunked upload via the dedicated v2 endpoints:
    /// initialize, append per chunk, finalize, then a bounded STATUS poll
    /// while the platform processes the media.
    async fn upload_media_chunked(
        &self,
        access_token: &str,
        data: &[u8],
        mime: &str,
    ) -> Result<String, PublishError> {
        let media_category = if mime.starts_with("video/") {
            "tweet_video"
        } else if mime == "image/gif" {
            "tweet_gif"
        } else {
            "tweet_image"
        };

        let init_body = serde_json::json!({
            "media_type": mime,
            "total_bytes": data.len(),
            "media_category": media_category,
        });

        let resp = self
            .http
            .post(format!("{}/2/media/upload/initialize", API_BASE))
            .bearer_auth(access_token)
            .json(&init_body)
            .send()
            .await
            .map_err(|e| network_error("Twitter upload INIT", e))?;

        if !resp.status().is_success() {
            return Err(remote_rejected("Twitter upload INIT", resp).await);
        }

        let init: MediaUploadResponse = resp
            .json()
            .await
            .map_err(|e| network_error("Twitter upload INIT response", e))?;
        let media_id = init.data.id;

        for (segment_index, chunk) in data.chunks(media::UPLOAD_CHUNK_SIZE).enumerate() {
            let part = reqwest::multipart::Part::bytes(chunk.to_vec())
                .mime_str(mime)
                .map_err(|e| PublishError::Network(format!("invalid mime type: {}", e)))?;

            let form = reqwest::multipart::Form::new()
                .text("segment_index", segment_index.to_string())
                .part("media", part);

            let resp = self
                .http
                .post(format!("{}/2/media/upload/{}/append", API_BASE, media_id))
                .bearer_auth(access_token)
                .multipart(form)
                .send()
                .await
                .map_err(|e| network_error("Twitter upload APPEND", e))?;

            if !resp.status().is_success() {
                return Err(remote_rejected("Twitter upload APPEND", resp).await);
            }
        }

        let resp = self
            .http
            .post(format!("{}/2/media/upload/{}/finalize", API_BASE, media_id))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| network_error("Twitter upload FINALIZE", e))?;

        if !resp.status().is_success() {
            return Err(remote_rejected("Twitter upload FINALIZE", resp).await);
        }

        let finalized: MediaUploadResponse = resp
            .json()
            .await
            .map_err(|e| network_error("Twitter upload FINALIZE response", e))?;

        let needs_poll = finalized
            .data
            .processing_info
            .map(|p| p.state != "succeeded")
            .unwrap_or(false);

        if needs_poll {
            poll_until_ready(POLL_MAX_ATTEMPTS, POLL_INTERVAL, || {
                self.check_processing(access_token, &media_id)
            })
            .await?;
        }

        Ok(media_id)
    }

    async fn check_processing(
        &self,
        access_token: &str,
        media_id: &str,
    ) -> Result<PollStatus, PublishError> {
        let resp = self
            .http
            .get(format!(
                "{}/2/media/upload?command=STATUS&media_id={}",
                API_BASE, media_id
            ))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| network_error("Twitter upload STATUS", e))?;

        if !resp.status().is_success() {
            return Err(remote_rejected("Twitter upload STATUS", resp).await);
        }

        let status: MediaUploadResponse = resp
            .json()
            .await
            .map_err(|e| network_error("Twitter upload STATUS response", e))?;

        Ok(match status.data.processing_info {
            None => PollStatus::Ready,
            Some(info) => match info.state.as_str() {
                "succeeded" => PollStatus::Ready,
                "failed" => PollStatus::Failed(
                    info.error
                        .map(|e| e.message)
                        .unwrap_or_else(|| "Twitter media processing failed".to_string()),
                ),
                _ => PollStatus::Pending,
            },
        })
    }
}

#[async_trait]
impl Capability for TwitterCapability {
    fn platform(&self) -> PlatformKind {
        PlatformKind::Twitter
    }

    async fn publish(
        &self,
        account: &SocialAccount,
        post: &Post,
        _target: &PostTarget,
    ) -> Result<String, PublishError> {
        if post.content.trim().is_empty() && post.media_urls.is_empty() {
            return Err(PublishError::MissingMedia(
                "Twitter requires text or at least one media attachment".to_string(),
            ));
        }

        let mut media_ids = Vec::with_capacity(post.media_urls.len());
        for url in &post.media_urls {
            media_ids.push(self.upload_media(&account.access_token, url).await?);
        }

        let mut body = serde_json::json!({ "text": post.content });
        if !media_ids.is_empty() {
            body["media"] = serde_json::json!({ "media_ids": media_ids });
        }

        let resp = self
            .http
            .post(format!("{}/2/tweets", API_BASE))
            .bearer_auth(&account.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| network_error("Twitter tweet create", e))?;

        if !resp.status().is_success() {
            return Err(remote_rejected("Twitter tweet create", resp).await);
        }

        let wrapper: TweetResponseWrapper = resp
            .json()
            .await
            .map_err(|e| network_error("Twitter tweet create response", e))?;

        Ok(wrapper.data.id)
    }

    async fn refresh(
        &self,
        account: &SocialAccount,
    ) -> Result<RefreshedCredential, PublishError> {
        let refresh_token = account.refresh_token.as_deref().ok_or_else(|| {
            PublishError::RemoteRejected("Twitter account has no refresh token".to_string())
        })?;

        let params = [
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let resp = self
            .http
            .post(format!("{}/2/oauth2/token", API_BASE))
            .header("Authorization", self.basic_auth_header())
            .form(&params)
            .send()
            .await
            .map_err(|e| network_error("Twitter token refresh", e))?;

        if !resp.status().is_success() {
            return Err(remote_rejected("Twitter token refresh", resp).await);
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| network_error("Twitter token refresh response", e))?;

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
struct MediaUploadResponse {
    data: MediaUploadData,
}

#[derive(Debug, Deserialize)]
struct MediaUploadData {
    id: String,
    processing_info: Option<MediaProcessingInfo>,
}

#[derive(Debug, Deserialize)]
struct MediaProcessingInfo {
    state: String,
    error: Option<MediaProcessingError>,
}

#[derive(Debug, Deserialize)]
struct MediaProcessingError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct TweetResponseWrapper {
    data: TweetData,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
}
