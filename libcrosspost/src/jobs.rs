//! Scheduled publish job runner
//!
//! One pass picks up a bounded batch of due pending jobs and walks each
//! through pending → processing → completed | failed, invoking the
//! orchestrator in between. Jobs run sequentially within a batch; one
//! job's failure is logged and the rest of the batch continues.
//!
//! A crash between `processing` and a terminal state leaves the job
//! parked in `processing` — there is no retry path, operational tooling
//! owns that cleanup.

use tracing::{error, info};

use crate::db::Database;
use crate::error::Result;
use crate::orchestrator::Orchestrator;
use crate::types::{JobStatus, PostStatus, ScheduledJob};

pub struct ScheduledJobRunner {
    db: Database,
    orchestrator: Orchestrator,
    batch_size: u32,
}

impl ScheduledJobRunner {
    pub fn new(db: Database, orchestrator: Orchestrator, batch_size: u32) -> Self {
        Self {
            db,
            orchestrator,
            batch_size,
        }
    }

    /// Process one batch of due jobs.
    ///
    /// Errors only when the due-job query itself fails; each job's own
    /// failure is recorded on that job and the batch continues.
    pub async fn run_once(&self) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let jobs = self.db.due_jobs(now, self.batch_size).await?;

        if jobs.is_empty() {
            return Ok(());
        }

        info!("Found {} scheduled job(s) due", jobs.len());

        for job in jobs {
            if let Err(e) = self.run_job(&job).await {
                error!("Job {} for post {} failed: {}", job.id, job.post_id, e);
                let done_at = chrono::Utc::now().timestamp();
                if let Err(e) = self
                    .db
                    .update_job_status(&job.id, JobStatus::Failed, Some(done_at))
                    .await
                {
                    error!("Failed to mark job {} failed: {}", job.id, e);
                }
            }
        }

        Ok(())
    }

    async fn run_job(&self, job: &ScheduledJob) -> Result<()> {
        info!("Processing job {} (post {})", job.id, job.post_id);

        // Claim the job before publishing so a second pass cannot pick
        // it up again
        self.db
            .update_job_status(&job.id, JobStatus::Processing, None)
            .await?;

        self.db
            .update_post_status(&job.org_id, &job.post_id, PostStatus::Publishing)
            .await?;

        self.orchestrator
            .publish_post(&job.org_id, &job.post_id)
            .await?;

        let done_at = chrono::Utc::now().timestamp();
        self.db
            .update_job_status(&job.id, JobStatus::Completed, Some(done_at))
            .await?;

        info!("Job {} completed", job.id);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PublishError;
    use crate::platforms::mock::MockCapability;
    use crate::platforms::CapabilityRegistry;
    use crate::types::{PlatformKind, Post, PostTarget, SocialAccount};
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(db_path.to_str().unwrap()).await.unwrap();
        (db, temp_dir)
    }

    fn account(id: &str, platform: PlatformKind) -> SocialAccount {
        SocialAccount {
            id: id.to_string(),
            org_id: "org-1".to_string(),
            platform,
            access_token: "token".to_string(),
            refresh_token: None,
            token_expires_at: None,
            platform_user_id: "u-1".to_string(),
            username: "user".to_string(),
            last_sync_at: None,
        }
    }

    async fn seed_scheduled_post(db: &Database, account_id: &str, when: i64) -> Post {
        let mut post = Post::new("org-1".to_string(), "Scheduled!".to_string(), vec![]);
        post.targets = vec![PostTarget::new(account_id.to_string(), None)];
        post.scheduled_at = Some(when);
        post.status = crate::types::PostStatus::Scheduled;
        db.create_post(&post).await.unwrap();

        let job = ScheduledJob::new(post.id.clone(), "org-1".to_string(), when);
        db.upsert_pending_job(&job).await.unwrap();

        post
    }

    fn runner(db: &Database, registry: CapabilityRegistry) -> ScheduledJobRunner {
        let orchestrator = Orchestrator::new(db.clone(), Arc::new(registry));
        ScheduledJobRunner::new(db.clone(), orchestrator, 10)
    }

    #[tokio::test]
    async fn test_due_job_publishes_and_completes() {
        let (db, _dir) = test_db().await;
        db.create_account(&account("acct-a", PlatformKind::Twitter))
            .await
            .unwrap();

        let mut registry = CapabilityRegistry::new();
        registry.register(Box::new(MockCapability::publishing(
            PlatformKind::Twitter,
            "tw-1",
        )));

        let past = chrono::Utc::now().timestamp() - 60;
        let post = seed_scheduled_post(&db, "acct-a", past).await;

        runner(&db, registry).run_once().await.unwrap();

        let loaded = db.get_post("org-1", &post.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, crate::types::PostStatus::Published);

        // The job reached a terminal state and is never re-selected
        let due = db.due_jobs(chrono::Utc::now().timestamp(), 10).await.unwrap();
        assert!(due.is_empty());
    }

    #[tokio::test]
    async fn test_future_job_left_pending() {
        let (db, _dir) = test_db().await;
        db.create_account(&account("acct-a", PlatformKind::Twitter))
            .await
            .unwrap();

        let mut registry = CapabilityRegistry::new();
        registry.register(Box::new(MockCapability::publishing(
            PlatformKind::Twitter,
            "tw-1",
        )));

        let future = chrono::Utc::now().timestamp() + 3600;
        let post = seed_scheduled_post(&db, "acct-a", future).await;

        runner(&db, registry).run_once().await.unwrap();

        let loaded = db.get_post("org-1", &post.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, crate::types::PostStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_missing_post_fails_job_but_not_batch() {
        let (db, _dir) = test_db().await;
        db.create_account(&account("acct-a", PlatformKind::Twitter))
            .await
            .unwrap();

        let mut registry = CapabilityRegistry::new();
        registry.register(Box::new(MockCapability::publishing(
            PlatformKind::Twitter,
            "tw-1",
        )));

        let past = chrono::Utc::now().timestamp() - 60;

        // A job whose post was deleted out from under it
        let orphan = ScheduledJob::new("ghost-post".to_string(), "org-1".to_string(), past - 10);
        db.upsert_pending_job(&orphan).await.unwrap();

        let post = seed_scheduled_post(&db, "acct-a", past).await;

        runner(&db, registry).run_once().await.unwrap();

        // The orphan job failed terminally
        let orphan_loaded = db.get_job(&orphan.id).await.unwrap().unwrap();
        assert_eq!(orphan_loaded.status, JobStatus::Failed);
        assert!(orphan_loaded.processed_at.is_some());

        // The healthy job still ran to completion
        let loaded = db.get_post("org-1", &post.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, crate::types::PostStatus::Published);
    }

    #[tokio::test]
    async fn test_publish_failure_completes_job_with_failed_post() {
        // The orchestrator completing (with the post marked failed) still
        // completes the job: the job tracks delivery of the attempt
        let (db, _dir) = test_db().await;
        db.create_account(&account("acct-a", PlatformKind::Twitter))
            .await
            .unwrap();

        let mut registry = CapabilityRegistry::new();
        registry.register(Box::new(MockCapability::failing(
            PlatformKind::Twitter,
            PublishError::RemoteRejected("rejected".to_string()),
        )));

        let past = chrono::Utc::now().timestamp() - 60;
        let post = seed_scheduled_post(&db, "acct-a", past).await;

        runner(&db, registry).run_once().await.unwrap();

        let loaded = db.get_post("org-1", &post.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, crate::types::PostStatus::Failed);

        let due = db.due_jobs(chrono::Utc::now().timestamp(), 10).await.unwrap();
        assert!(due.is_empty());
    }
}
