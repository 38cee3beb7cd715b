//! Core types for Crosspost

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum caption/body length accepted for a post
pub const MAX_CONTENT_CHARS: usize = 2200;

/// Maximum number of media attachments per post
pub const MAX_MEDIA_URLS: usize = 10;

/// The platforms a social account can belong to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    Tiktok,
    Instagram,
    Youtube,
    Twitter,
    Facebook,
    Linkedin,
    Threads,
    Pinterest,
}

impl PlatformKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tiktok => "tiktok",
            Self::Instagram => "instagram",
            Self::Youtube => "youtube",
            Self::Twitter => "twitter",
            Self::Facebook => "facebook",
            Self::Linkedin => "linkedin",
            Self::Threads => "threads",
            Self::Pinterest => "pinterest",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "tiktok" => Some(Self::Tiktok),
            "instagram" => Some(Self::Instagram),
            "youtube" => Some(Self::Youtube),
            "twitter" | "x" => Some(Self::Twitter),
            "facebook" => Some(Self::Facebook),
            "linkedin" => Some(Self::Linkedin),
            "threads" => Some(Self::Threads),
            "pinterest" => Some(Self::Pinterest),
            _ => None,
        }
    }

    /// All supported platforms, in display order
    pub fn all() -> [PlatformKind; 8] {
        [
            Self::Tiktok,
            Self::Instagram,
            Self::Youtube,
            Self::Twitter,
            Self::Facebook,
            Self::Linkedin,
            Self::Threads,
            Self::Pinterest,
        ]
    }
}

impl std::fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a post as a whole
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Publishing,
    Published,
    Failed,
    PendingApproval,
    Approved,
    Rejected,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Publishing => "publishing",
            Self::Published => "published",
            Self::Failed => "failed",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "scheduled" => Some(Self::Scheduled),
            "publishing" => Some(Self::Publishing),
            "published" => Some(Self::Published),
            "failed" => Some(Self::Failed),
            "pending_approval" => Some(Self::PendingApproval),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Status of a single publish target, scoped to one account
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Draft,
    Published,
    Failed,
}

impl TargetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One (account, post) pairing: a single platform destination for a post
///
/// Invariant: `platform_post_id` is set if and only if the status is
/// `Published`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostTarget {
    pub account_id: String,
    pub status: TargetStatus,
    pub platform_post_id: Option<String>,
    pub error_message: Option<String>,
    /// Free-form per-target settings, e.g. the destination board for
    /// board-based platforms
    pub metadata: Option<serde_json::Value>,
}

impl PostTarget {
    pub fn new(account_id: String, metadata: Option<serde_json::Value>) -> Self {
        Self {
            account_id,
            status: TargetStatus::Draft,
            platform_post_id: None,
            error_message: None,
            metadata,
        }
    }

    pub fn is_published(&self) -> bool {
        self.status == TargetStatus::Published && self.platform_post_id.is_some()
    }

    pub fn mark_published(&mut self, platform_post_id: String) {
        self.status = TargetStatus::Published;
        self.platform_post_id = Some(platform_post_id);
        self.error_message = None;
    }

    pub fn mark_failed(&mut self, error_message: String) {
        self.status = TargetStatus::Failed;
        self.platform_post_id = None;
        self.error_message = Some(error_message);
    }

    /// Look up a string value in the target metadata map
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(key))
            .and_then(|v| v.as_str())
    }
}

/// Approval workflow sub-record for gated posts
///
/// Created and resolved by the approval routes; the publishing core only
/// carries it alongside the post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApprovalRequest {
    pub requested_by: String,
    pub requested_at: i64,
    pub decided_by: Option<String>,
    pub decided_at: Option<i64>,
    pub note: Option<String>,
}

/// A logical post, fanned out to one or more platform targets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub org_id: String,
    pub status: PostStatus,
    pub content: String,
    pub media_urls: Vec<String>,
    pub scheduled_at: Option<i64>,
    /// Set the first time any target publish succeeds, never overwritten
    pub published_at: Option<i64>,
    pub created_at: i64,
    pub targets: Vec<PostTarget>,
    pub approval: Option<ApprovalRequest>,
}

impl Post {
    pub fn new(org_id: String, content: String, media_urls: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            org_id,
            status: PostStatus::Draft,
            content,
            media_urls,
            scheduled_at: None,
            published_at: None,
            created_at: chrono::Utc::now().timestamp(),
            targets: Vec::new(),
            approval: None,
        }
    }
}

/// A connected third-party account with its stored credential
///
/// Tokens are sensitive: the Debug impl redacts them and nothing in the
/// library logs them.
#[derive(Clone, Serialize, Deserialize)]
pub struct SocialAccount {
    pub id: String,
    pub org_id: String,
    pub platform: PlatformKind,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<i64>,
    pub platform_user_id: String,
    pub username: String,
    pub last_sync_at: Option<i64>,
}

impl std::fmt::Debug for SocialAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocialAccount")
            .field("id", &self.id)
            .field("org_id", &self.org_id)
            .field("platform", &self.platform)
            .field("access_token", &"[redacted]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[redacted]"))
            .field("token_expires_at", &self.token_expires_at)
            .field("platform_user_id", &self.platform_user_id)
            .field("username", &self.username)
            .field("last_sync_at", &self.last_sync_at)
            .finish()
    }
}

/// A renewed credential returned by a platform's refresh flow
#[derive(Debug, Clone)]
pub struct RefreshedCredential {
    pub access_token: String,
    /// Present only when the platform rotates refresh tokens
    pub refresh_token: Option<String>,
    /// Seconds until the new access token expires
    pub expires_in: i64,
}

/// Status of a scheduled publish job
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One scheduled publish event for a post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: String,
    pub post_id: String,
    pub org_id: String,
    pub scheduled_at: i64,
    pub status: JobStatus,
    pub processed_at: Option<i64>,
}

impl ScheduledJob {
    pub fn new(post_id: String, org_id: String, scheduled_at: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            post_id,
            org_id,
            scheduled_at,
            status: JobStatus::Pending,
            processed_at: None,
        }
    }
}
