//! Publishing service facade
//!
//! The surface the route layer talks to: create and schedule posts,
//! trigger a publish (awaited or fire-and-forget), and the two "run one
//! pass" background entry points. The external trigger owns the cadence
//! and must not overlap invocations of the same pass.

use std::sync::Arc;

use tracing::{error, info};

use crate::config::SchedulerConfig;
use crate::db::Database;
use crate::error::{CrosspostError, Result};
use crate::jobs::ScheduledJobRunner;
use crate::orchestrator::Orchestrator;
use crate::platforms::CapabilityRegistry;
use crate::refresh::TokenRefreshCoordinator;
use crate::types::{Post, PostStatus, PostTarget, ScheduledJob, MAX_CONTENT_CHARS, MAX_MEDIA_URLS};

#[derive(Clone)]
pub struct PublishService {
    db: Database,
    orchestrator: Orchestrator,
    scheduler: SchedulerConfig,
    registry: Arc<CapabilityRegistry>,
}

/// Request to create a post
#[derive(Debug, Clone)]
pub struct CreatePostRequest {
    pub org_id: String,
    pub content: String,
    pub media_urls: Vec<String>,
    /// One target per account id; duplicates are collapsed keeping first
    /// position
    pub targets: Vec<TargetRequest>,
}

#[derive(Debug, Clone)]
pub struct TargetRequest {
    pub account_id: String,
    pub metadata: Option<serde_json::Value>,
}

impl PublishService {
    pub fn new(
        db: Database,
        registry: Arc<CapabilityRegistry>,
        scheduler: SchedulerConfig,
    ) -> Self {
        let orchestrator = Orchestrator::new(db.clone(), registry.clone());
        Self {
            db,
            orchestrator,
            scheduler,
            registry,
        }
    }

    /// Validate and store a new post with its targets.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` when the content or media exceed their
    /// limits or no target accounts were given.
    pub async fn create_post(&self, request: CreatePostRequest) -> Result<Post> {
        if request.content.chars().count() > MAX_CONTENT_CHARS {
            return Err(CrosspostError::InvalidInput(format!(
                "Content exceeds the {} character limit",
                MAX_CONTENT_CHARS
            )));
        }

        if request.media_urls.len() > MAX_MEDIA_URLS {
            return Err(CrosspostError::InvalidInput(format!(
                "A post can carry at most {} media attachments",
                MAX_MEDIA_URLS
            )));
        }

        if request.targets.is_empty() {
            return Err(CrosspostError::InvalidInput(
                "A post needs at least one target account".to_string(),
            ));
        }

        // Exactly one target per distinct account
        let mut post = Post::new(request.org_id, request.content, request.media_urls);
        for target in request.targets {
            if post
                .targets
                .iter()
                .any(|t| t.account_id == target.account_id)
            {
                continue;
            }
            post.targets
                .push(PostTarget::new(target.account_id, target.metadata));
        }

        self.db.create_post(&post).await?;
        info!("Created post {} with {} target(s)", post.id, post.targets.len());

        Ok(post)
    }

    /// Mark a post scheduled and enqueue (or move) its pending job
    pub async fn schedule_post(&self, org_id: &str, post_id: &str, at: i64) -> Result<()> {
        let post = self
            .db
            .get_post(org_id, post_id)
            .await?
            .ok_or_else(|| CrosspostError::PostNotFound(post_id.to_string()))?;

        self.db.update_post_schedule(org_id, &post.id, at).await?;

        let job = ScheduledJob::new(post.id.clone(), org_id.to_string(), at);
        self.db.upsert_pending_job(&job).await?;

        info!("Scheduled post {} for {}", post.id, at);

        Ok(())
    }

    /// Publish a post now and wait for the orchestration to finish.
    ///
    /// Throws only when the post cannot be found; per-target failures are
    /// recorded on the post, not raised.
    pub async fn publish_post(&self, org_id: &str, post_id: &str) -> Result<()> {
        let marked = self
            .db
            .update_post_status(org_id, post_id, PostStatus::Publishing)
            .await?;
        if !marked {
            return Err(CrosspostError::PostNotFound(post_id.to_string()));
        }

        self.orchestrator.publish_post(org_id, post_id).await
    }

    /// Initiate a publish without waiting for it.
    ///
    /// The post is marked `publishing` before this returns; the
    /// orchestration itself runs on a detached task whose only completion
    /// signal is the post's stored status. Errors inside the task go to
    /// the log, there is nobody left to raise them to.
    pub async fn spawn_publish(&self, org_id: &str, post_id: &str) -> Result<()> {
        let marked = self
            .db
            .update_post_status(org_id, post_id, PostStatus::Publishing)
            .await?;
        if !marked {
            return Err(CrosspostError::PostNotFound(post_id.to_string()));
        }

        let orchestrator = self.orchestrator.clone();
        let org_id = org_id.to_string();
        let post_id = post_id.to_string();

        tokio::spawn(async move {
            if let Err(e) = orchestrator.publish_post(&org_id, &post_id).await {
                error!("Background publish of post {} failed: {}", post_id, e);
            }
        });

        Ok(())
    }

    /// One token-refresh pass over the whole account population
    pub async fn refresh_expired_tokens(&self) -> Result<()> {
        let coordinator = TokenRefreshCoordinator::new(
            self.db.clone(),
            self.registry.clone(),
            self.scheduler.refresh_lookahead_secs,
        );
        coordinator.run_once().await
    }

    /// One pass over due scheduled jobs
    pub async fn run_due_scheduled_jobs(&self) -> Result<()> {
        let runner = ScheduledJobRunner::new(
            self.db.clone(),
            self.orchestrator.clone(),
            self.scheduler.job_batch_size,
        );
        runner.run_once().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::mock::MockCapability;
    use crate::types::PlatformKind;
    use tempfile::TempDir;

    async fn test_service(registry: CapabilityRegistry) -> (PublishService, Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(db_path.to_str().unwrap()).await.unwrap();
        let service = PublishService::new(
            db.clone(),
            Arc::new(registry),
            SchedulerConfig::default(),
        );
        (service, db, temp_dir)
    }

    fn request(targets: &[&str]) -> CreatePostRequest {
        CreatePostRequest {
            org_id: "org-1".to_string(),
            content: "Hello".to_string(),
            media_urls: vec![],
            targets: targets
                .iter()
                .map(|id| TargetRequest {
                    account_id: id.to_string(),
                    metadata: None,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_create_post_round_trip() {
        let (service, db, _dir) = test_service(CapabilityRegistry::new()).await;

        let post = service
            .create_post(request(&["acct-1", "acct-2"]))
            .await
            .unwrap();

        let loaded = db.get_post("org-1", &post.id).await.unwrap().unwrap();
        assert_eq!(loaded.targets.len(), 2);
        assert_eq!(loaded.status, PostStatus::Draft);
    }

    #[tokio::test]
    async fn test_create_post_collapses_duplicate_targets() {
        let (service, _db, _dir) = test_service(CapabilityRegistry::new()).await;

        let post = service
            .create_post(request(&["acct-1", "acct-1", "acct-2"]))
            .await
            .unwrap();

        assert_eq!(post.targets.len(), 2);
        assert_eq!(post.targets[0].account_id, "acct-1");
        assert_eq!(post.targets[1].account_id, "acct-2");
    }

    #[tokio::test]
    async fn test_create_post_rejects_long_content() {
        let (service, _db, _dir) = test_service(CapabilityRegistry::new()).await;

        let mut req = request(&["acct-1"]);
        req.content = "x".repeat(MAX_CONTENT_CHARS + 1);

        let result = service.create_post(req).await;
        assert!(matches!(result, Err(CrosspostError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_create_post_rejects_too_many_media() {
        let (service, _db, _dir) = test_service(CapabilityRegistry::new()).await;

        let mut req = request(&["acct-1"]);
        req.media_urls = (0..=MAX_MEDIA_URLS)
            .map(|i| format!("https://x/{}.jpg", i))
            .collect();

        let result = service.create_post(req).await;
        assert!(matches!(result, Err(CrosspostError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_create_post_rejects_no_targets() {
        let (service, _db, _dir) = test_service(CapabilityRegistry::new()).await;

        let result = service.create_post(request(&[])).await;
        assert!(matches!(result, Err(CrosspostError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_publish_post_missing_is_error() {
        let (service, _db, _dir) = test_service(CapabilityRegistry::new()).await;

        let result = service.publish_post("org-1", "ghost").await;
        assert!(matches!(result, Err(CrosspostError::PostNotFound(_))));
    }

    #[tokio::test]
    async fn test_spawn_publish_missing_is_error() {
        let (service, _db, _dir) = test_service(CapabilityRegistry::new()).await;

        let result = service.spawn_publish("org-1", "ghost").await;
        assert!(matches!(result, Err(CrosspostError::PostNotFound(_))));
    }

    #[tokio::test]
    async fn test_schedule_post_creates_pending_job() {
        let (service, db, _dir) = test_service(CapabilityRegistry::new()).await;

        let post = service.create_post(request(&["acct-1"])).await.unwrap();
        service.schedule_post("org-1", &post.id, 2_000_000_000).await.unwrap();

        let loaded = db.get_post("org-1", &post.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, PostStatus::Scheduled);
        assert_eq!(loaded.scheduled_at, Some(2_000_000_000));

        let due = db.due_jobs(2_000_000_001, 10).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].post_id, post.id);
    }

    #[tokio::test]
    async fn test_reschedule_reuses_pending_job() {
        let (service, db, _dir) = test_service(CapabilityRegistry::new()).await;

        let post = service.create_post(request(&["acct-1"])).await.unwrap();
        service.schedule_post("org-1", &post.id, 2_000_000_000).await.unwrap();
        service.schedule_post("org-1", &post.id, 2_100_000_000).await.unwrap();

        let due = db.due_jobs(2_200_000_000, 10).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].scheduled_at, 2_100_000_000);
    }

    #[tokio::test]
    async fn test_publish_post_runs_orchestration() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Box::new(MockCapability::publishing(
            PlatformKind::Twitter,
            "tw-1",
        )));
        let (service, db, _dir) = test_service(registry).await;

        let account = crate::types::SocialAccount {
            id: "acct-1".to_string(),
            org_id: "org-1".to_string(),
            platform: PlatformKind::Twitter,
            access_token: "token".to_string(),
            refresh_token: None,
            token_expires_at: None,
            platform_user_id: "u-1".to_string(),
            username: "user".to_string(),
            last_sync_at: None,
        };
        db.create_account(&account).await.unwrap();

        let post = service.create_post(request(&["acct-1"])).await.unwrap();
        service.publish_post("org-1", &post.id).await.unwrap();

        let loaded = db.get_post("org-1", &post.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, PostStatus::Published);
        assert_eq!(loaded.targets[0].platform_post_id.as_deref(), Some("tw-1"));
    }
}
