//! Multi-platform publish orchestration
//!
//! Turns one post with N target accounts into N independent publish
//! attempts and one aggregate outcome. A target's failure is recorded on
//! that target alone — it never aborts the siblings or the aggregate.
//! At least one successful target makes the whole post `published`; the
//! per-target statuses tell the user which destinations still failed.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::{CrosspostError, PublishError, Result};
use crate::platforms::CapabilityRegistry;
use crate::types::{Post, PostStatus, PostTarget, SocialAccount};

#[derive(Clone)]
pub struct Orchestrator {
    db: Database,
    registry: Arc<CapabilityRegistry>,
}

impl Orchestrator {
    pub fn new(db: Database, registry: Arc<CapabilityRegistry>) -> Self {
        Self { db, registry }
    }

    /// Publish a post to all of its targets.
    ///
    /// Errors only on whole-operation failures (post missing, final
    /// persistence); per-target failures land in that target's
    /// `error_message` and are not errors here. Targets that already
    /// published in an earlier run are skipped, so a retry never
    /// duplicates content on platforms that accepted it.
    pub async fn publish_post(&self, org_id: &str, post_id: &str) -> Result<()> {
        let mut post = self
            .db
            .get_post(org_id, post_id)
            .await?
            .ok_or_else(|| CrosspostError::PostNotFound(post_id.to_string()))?;

        info!(
            "Publishing post {} to {} target(s)",
            post.id,
            post.targets.len()
        );

        // Batch-load all target accounts up front, in parallel, so the
        // fan-out below starts without a sequential lookup chain
        let accounts = join_all(
            post.targets
                .iter()
                .map(|t| self.db.get_account(org_id, &t.account_id)),
        )
        .await;

        let outcomes = {
            let post_ref = &post;
            join_all(
                post_ref
                    .targets
                    .iter()
                    .zip(accounts)
                    .map(|(target, account)| self.publish_target(post_ref, target, account)),
            )
            .await
        };

        let mut targets = Vec::with_capacity(outcomes.len());
        let mut attempted_accounts = Vec::new();
        for (target, attempted) in outcomes {
            if let Some(account_id) = attempted {
                attempted_accounts.push(account_id);
            }
            targets.push(target);
        }

        let any_published = targets.iter().any(|t| t.is_published());
        let now = chrono::Utc::now().timestamp();

        post.targets = targets;
        post.status = if any_published {
            PostStatus::Published
        } else {
            PostStatus::Failed
        };
        // First success wins; a later re-publish keeps the original stamp
        if any_published && post.published_at.is_none() {
            post.published_at = Some(now);
        }

        self.db.apply_publish_outcome(&post).await?;

        for account_id in attempted_accounts {
            if let Err(e) = self.db.touch_account_sync(&account_id, now).await {
                warn!("Failed to stamp sync time for account {}: {}", account_id, e);
            }
        }

        info!("Post {} finished as {}", post.id, post.status.as_str());

        Ok(())
    }

    /// Run one target's publish attempt, converting every failure into
    /// that target's failed state.
    ///
    /// Returns the updated target and, when a platform call was actually
    /// attempted, the account id to stamp with sync activity.
    async fn publish_target(
        &self,
        post: &Post,
        target: &PostTarget,
        account: Result<Option<SocialAccount>>,
    ) -> (PostTarget, Option<String>) {
        let mut updated = target.clone();

        if target.is_published() {
            debug!(
                "Skipping target {} of post {}: already published as {:?}",
                target.account_id, post.id, target.platform_post_id
            );
            return (updated, None);
        }

        let account = match account {
            Ok(Some(account)) => account,
            Ok(None) => {
                updated.mark_failed("Account not found".to_string());
                return (updated, None);
            }
            Err(e) => {
                updated.mark_failed(format!("Account lookup failed: {}", e));
                return (updated, None);
            }
        };

        let Some(capability) = self.registry.get(account.platform) else {
            warn!(
                "No publisher registered for platform {} (account {})",
                account.platform, account.id
            );
            updated.mark_failed(
                PublishError::UnsupportedPlatform(account.platform.to_string()).to_string(),
            );
            return (updated, None);
        };

        match capability.publish(&account, post, target).await {
            Ok(platform_post_id) => {
                info!(
                    "Published post {} to {} as {}",
                    post.id, account.platform, platform_post_id
                );
                updated.mark_published(platform_post_id);
            }
            Err(e) => {
                warn!(
                    "Failed to publish post {} to {}: {}",
                    post.id, account.platform, e
                );
                updated.mark_failed(e.to_string());
            }
        }

        (updated, Some(account.id))
    }
}
