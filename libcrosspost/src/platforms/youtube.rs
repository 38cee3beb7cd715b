//! YouTube capability
//!
//! Uploads go through the resumable upload protocol: open an upload
//! session with the video metadata, then send the bytes — in one PUT for
//! small payloads, or in bounded chunks with `Content-Range` headers once
//! the payload crosses the chunked threshold. Refresh is the Google OAuth2
//! refresh grant; Google does not rotate refresh tokens.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::OAuthApp;
use crate::error::PublishError;
use crate::media::{self, MediaKind};
use crate::platforms::{network_error, remote_rejected, Capability};
use crate::types::{PlatformKind, Post, PostTarget, RefreshedCredential, SocialAccount};

const UPLOAD_URL: &str =
    "https://www.googleapis.com/upload/youtube/v3/videos?uploadType=resumable&part=snippet,status";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

pub struct YoutubeCapability {
    http: Client,
    app: OAuthApp,
}

impl YoutubeCapability {
    pub fn new(app: OAuthApp) -> Self {
        Self {
            http: Client::new(),
            app,
        }
    }

    /// Open a resumable upload session and return its session URI
    async fn open_session(
        &self,
        access_token: &str,
        post: &Post,
        total_bytes: u64,
    ) -> Result<String, PublishError> {
        // The first line of the caption doubles as the video title
        let title: String = post.content.lines().next().unwrap_or("").chars().take(100).collect();

        let metadata = serde_json::json!({
            "snippet": {
                "title": title,
                "description": post.content,
            },
            "status": {
                "privacyStatus": "public",
            },
        });

        let resp = self
            .http
            .post(UPLOAD_URL)
            .bearer_auth(access_token)
            .header("X-Upload-Content-Length", total_bytes)
            .header("X-Upload-Content-Type", "video/mp4")
            .json(&metadata)
            .send()
            .await
            .map_err(|e| network_error("YouTube session open", e))?;

        if !resp.status().is_success() {
            return Err(remote_rejected("YouTube session open", resp).await);
        }

        resp.headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                PublishError::RemoteRejected(
                    "YouTube session open returned no upload location".to_string(),
                )
            })
    }

    async fn upload_single_shot(
        &self,
        access_token: &str,
        session_uri: &str,
        data: Vec<u8>,
    ) -> Result<String, PublishError> {
        let resp = self
            .http
            .put(session_uri)
            .bearer_auth(access_token)
            .header(reqwest::header::CONTENT_TYPE, "video/mp4")
            .body(data)
            .send()
            .await
            .map_err(|e| network_error("YouTube upload", e))?;

        if !resp.status().is_success() {
            return Err(remote_rejected("YouTube upload", resp).await);
        }

        let video: VideoResponse = resp
            .json()
            .await
            .map_err(|e| network_error("YouTube upload response", e))?;
        Ok(video.id)
    }

    async fn upload_chunked(
        &self,
        access_token: &str,
        session_uri: &str,
        data: &[u8],
    ) -> Result<String, PublishError> {
        let total = data.len();
        let mut video_id = None;

        for (index, chunk) in data.chunks(media::UPLOAD_CHUNK_SIZE).enumerate() {
            let start = index * media::UPLOAD_CHUNK_SIZE;
            let end = start + chunk.len() - 1;
            let content_range = format!("bytes {}-{}/{}", start, end, total);

            let resp = self
                .http
                .put(session_uri)
                .bearer_auth(access_token)
                .header(reqwest::header::CONTENT_RANGE, content_range)
                .body(chunk.to_vec())
                .send()
                .await
                .map_err(|e| network_error("YouTube chunk upload", e))?;

            let status = resp.status();

            // 308 acknowledges an intermediate chunk; the final chunk
            // returns the created video resource
            if status.as_u16() == 308 {
                continue;
            }

            if !status.is_success() {
                return Err(remote_rejected("YouTube chunk upload", resp).await);
            }

            let video: VideoResponse = resp
                .json()
                .await
                .map_err(|e| network_error("YouTube upload response", e))?;
            video_id = Some(video.id);
        }

        video_id.ok_or_else(|| {
            PublishError::RemoteRejected(
                "YouTube upload finished without returning a video id".to_string(),
            )
        })
    }
}

#[async_trait]
impl Capability for YoutubeCapability {
    fn platform(&self) -> PlatformKind {
        PlatformKind::Youtube
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
                    "YouTube requires at least one video attachment".to_string(),
                )
            })?;

        let data = media::fetch_media(&self.http, video_url).await?;
        let session_uri = self
            .open_session(&account.access_token, post, data.len() as u64)
            .await?;

        if media::needs_chunked_upload(data.len() as u64) {
            self.upload_chunked(&account.access_token, &session_uri, &data)
                .await
        } else {
            self.upload_single_shot(&account.access_token, &session_uri, data)
                .await
        }
    }

    async fn refresh(
        &self,
        account: &SocialAccount,
    ) -> Result<RefreshedCredential, PublishError> {
        let refresh_token = account.refresh_token.as_deref().ok_or_else(|| {
            PublishError::RemoteRejected("YouTube account has no refresh token".to_string())
        })?;

        let params = [
            ("client_id", self.app.client_id.as_str()),
            ("client_secret", self.app.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let resp = self
            .http
            .post(TOKEN_URL)
            .form(&params)
            .send()
            .await
            .map_err(|e| network_error("YouTube token refresh", e))?;

        if !resp.status().is_success() {
            return Err(remote_rejected("YouTube token refresh", resp).await);
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| network_error("YouTube token refresh response", e))?;

        Ok(RefreshedCredential {
            access_token: token.access_token,
            refresh_token: None,
            expires_in: token.expires_in,
        })
    }

    fn supports_refresh(&self) -> bool {
        true
    }
}

#[derive(Debug, Deserialize)]
struct VideoResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}
