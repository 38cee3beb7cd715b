//! End-to-end orchestration tests
//!
//! Drives the full publish pipeline — service facade, orchestrator,
//! capability registry, persistence — with scripted mock capabilities
//! standing in for the platform APIs.

use anyhow::Result;
use libcrosspost::config::SchedulerConfig;
use libcrosspost::db::Database;
use libcrosspost::platforms::mock::MockCapability;
use libcrosspost::platforms::CapabilityRegistry;
use libcrosspost::service::{CreatePostRequest, PublishService, TargetRequest};
use libcrosspost::types::{PlatformKind, PostStatus, SocialAccount, TargetStatus};
use libcrosspost::PublishError;
use std::sync::Arc;
use tempfile::TempDir;

struct TestEnv {
    _temp_dir: TempDir,
    db: Database,
    service: PublishService,
}

impl TestEnv {
    async fn new(registry: CapabilityRegistry) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(&db_path.to_string_lossy()).await?;

        let service = PublishService::new(
            db.clone(),
            Arc::new(registry),
            SchedulerConfig::default(),
        );

        Ok(Self {
            _temp_dir: temp_dir,
            db,
            service,
        })
    }

    async fn seed_account(&self, id: &str, platform: PlatformKind) -> Result<()> {
        let account = SocialAccount {
            id: id.to_string(),
            org_id: "org-1".to_string(),
            platform,
            access_token: "token".to_string(),
            refresh_token: None,
            token_expires_at: None,
            platform_user_id: "user-1".to_string(),
            username: "user".to_string(),
            last_sync_at: None,
        };
        self.db.create_account(&account).await?;
        Ok(())
    }
}

fn target(account_id: &str) -> TargetRequest {
    TargetRequest {
        account_id: account_id.to_string(),
        metadata: None,
    }
}

/// The canonical mixed-outcome scenario: one video post targeted at a
/// TikTok account that accepts it and an Instagram account whose media
/// processing fails remotely.
#[tokio::test]
async fn test_partial_success_end_to_end() -> Result<()> {
    let mut registry = CapabilityRegistry::new();
    registry.register(Box::new(MockCapability::publishing(
        PlatformKind::Tiktok,
        "v123",
    )));
    registry.register(Box::new(MockCapability::failing(
        PlatformKind::Instagram,
        PublishError::RemoteRejected("media processing failed".to_string()),
    )));

    let env = TestEnv::new(registry).await?;
    env.seed_account("acct_tiktok", PlatformKind::Tiktok).await?;
    env.seed_account("acct_instagram", PlatformKind::Instagram)
        .await?;

    let post = env
        .service
        .create_post(CreatePostRequest {
            org_id: "org-1".to_string(),
            content: "New drop".to_string(),
            media_urls: vec!["https://x/a.mp4".to_string()],
            targets: vec![target("acct_tiktok"), target("acct_instagram")],
        })
        .await?;

    env.service.publish_post("org-1", &post.id).await?;

    let loaded = env.db.get_post("org-1", &post.id).await?.unwrap();

    assert_eq!(loaded.status, PostStatus::Published);
    assert!(loaded.published_at.is_some());

    assert_eq!(loaded.targets[0].status, TargetStatus::Published);
    assert_eq!(loaded.targets[0].platform_post_id.as_deref(), Some("v123"));
    assert_eq!(loaded.targets[0].error_message, None);

    assert_eq!(loaded.targets[1].status, TargetStatus::Failed);
    assert_eq!(loaded.targets[1].platform_post_id, None);
    assert_eq!(
        loaded.targets[1].error_message.as_deref(),
        Some("media processing failed")
    );

    Ok(())
}

#[tokio::test]
async fn test_total_failure_end_to_end() -> Result<()> {
    let mut registry = CapabilityRegistry::new();
    registry.register(Box::new(MockCapability::failing(
        PlatformKind::Tiktok,
        PublishError::Network("connection reset".to_string()),
    )));
    registry.register(Box::new(MockCapability::failing(
        PlatformKind::Instagram,
        PublishError::RemoteRejected("invalid token".to_string()),
    )));

    let env = TestEnv::new(registry).await?;
    env.seed_account("acct_tiktok", PlatformKind::Tiktok).await?;
    env.seed_account("acct_instagram", PlatformKind::Instagram)
        .await?;

    let post = env
        .service
        .create_post(CreatePostRequest {
            org_id: "org-1".to_string(),
            content: "New drop".to_string(),
            media_urls: vec!["https://x/a.mp4".to_string()],
            targets: vec![target("acct_tiktok"), target("acct_instagram")],
        })
        .await?;

    env.service.publish_post("org-1", &post.id).await?;

    let loaded = env.db.get_post("org-1", &post.id).await?.unwrap();
    assert_eq!(loaded.status, PostStatus::Failed);
    assert_eq!(loaded.published_at, None);
    assert!(loaded
        .targets
        .iter()
        .all(|t| t.status == TargetStatus::Failed && t.error_message.is_some()));

    Ok(())
}

#[tokio::test]
async fn test_fire_and_forget_publish_completes() -> Result<()> {
    let mut registry = CapabilityRegistry::new();
    registry.register(Box::new(MockCapability::publishing(
        PlatformKind::Twitter,
        "tw-1",
    )));

    let env = TestEnv::new(registry).await?;
    env.seed_account("acct-tw", PlatformKind::Twitter).await?;

    let post = env
        .service
        .create_post(CreatePostRequest {
            org_id: "org-1".to_string(),
            content: "Fire and forget".to_string(),
            media_urls: vec![],
            targets: vec![target("acct-tw")],
        })
        .await?;

    env.service.spawn_publish("org-1", &post.id).await?;

    // The call returns with the post already marked publishing; the
    // detached task finishes on its own
    let marked = env.db.get_post("org-1", &post.id).await?.unwrap();
    assert!(matches!(
        marked.status,
        PostStatus::Publishing | PostStatus::Published
    ));

    let mut published = false;
    for _ in 0..50 {
        let loaded = env.db.get_post("org-1", &post.id).await?.unwrap();
        if loaded.status == PostStatus::Published {
            published = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(published, "background publish never completed");

    Ok(())
}

#[tokio::test]
async fn test_retry_after_partial_failure_skips_published() -> Result<()> {
    // First pass: instagram fails
    let ig_fail = MockCapability::failing(
        PlatformKind::Instagram,
        PublishError::RemoteRejected("media processing failed".to_string()),
    );
    let tiktok = MockCapability::publishing(PlatformKind::Tiktok, "v123");
    let tiktok_probes = tiktok.probes();

    let mut registry = CapabilityRegistry::new();
    registry.register(Box::new(tiktok));
    registry.register(Box::new(ig_fail));

    let env = TestEnv::new(registry).await?;
    env.seed_account("acct_tiktok", PlatformKind::Tiktok).await?;
    env.seed_account("acct_instagram", PlatformKind::Instagram)
        .await?;

    let post = env
        .service
        .create_post(CreatePostRequest {
            org_id: "org-1".to_string(),
            content: "New drop".to_string(),
            media_urls: vec!["https://x/a.mp4".to_string()],
            targets: vec![target("acct_tiktok"), target("acct_instagram")],
        })
        .await?;

    env.service.publish_post("org-1", &post.id).await?;
    assert_eq!(tiktok_probes.publish_count(), 1);

    let after_first = env.db.get_post("org-1", &post.id).await?.unwrap();
    let first_published_at = after_first.published_at;
    assert!(first_published_at.is_some());

    // Retry: the user re-triggers publish. The TikTok target is already
    // published and must not be attempted again.
    env.service.publish_post("org-1", &post.id).await?;

    assert_eq!(tiktok_probes.publish_count(), 1);
    let after_retry = env.db.get_post("org-1", &post.id).await?.unwrap();
    assert_eq!(
        after_retry.targets[0].platform_post_id.as_deref(),
        Some("v123")
    );
    assert_eq!(after_retry.published_at, first_published_at);

    Ok(())
}

#[tokio::test]
async fn test_publish_missing_post_is_the_only_thrown_error() -> Result<()> {
    let env = TestEnv::new(CapabilityRegistry::new()).await?;

    let result = env.service.publish_post("org-1", "no-such-post").await;
    assert!(result.is_err());

    Ok(())
}
