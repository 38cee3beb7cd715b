//! Database operations for Crosspost

use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::path::Path;

use crate::error::{DbError, Result};
use crate::types::{
    JobStatus, PlatformKind, Post, PostStatus, PostTarget, ScheduledJob, SocialAccount,
    TargetStatus,
};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(db_path: &str) -> Result<Self> {
        // Expand path and create parent directories
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if path.parent().is_some() && expanded_path != ":memory:" {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
                }
            }
        }

        // Use forward slashes for SQLite URL (works on both Windows and Unix)
        // and mode=rwc so the database file is created if missing
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    // ========================================================================
    // Social accounts
    // ========================================================================

    pub async fn create_account(&self, account: &SocialAccount) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO social_accounts
                (id, org_id, platform, access_token, refresh_token, token_expires_at,
                 platform_user_id, username, last_sync_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(&account.org_id)
        .bind(account.platform.as_str())
        .bind(&account.access_token)
        .bind(&account.refresh_token)
        .bind(account.token_expires_at)
        .bind(&account.platform_user_id)
        .bind(&account.username)
        .bind(account.last_sync_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_account(
        &self,
        org_id: &str,
        account_id: &str,
    ) -> Result<Option<SocialAccount>> {
        let row = sqlx::query(
            r#"
            SELECT id, org_id, platform, access_token, refresh_token, token_expires_at,
                   platform_user_id, username, last_sync_at
            FROM social_accounts WHERE org_id = ? AND id = ?
            "#,
        )
        .bind(org_id)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.map(account_from_row))
    }

    /// Accounts whose token expires within `(now, now + lookahead_secs]`.
    ///
    /// Already-expired accounts are excluded: refreshing them would fail
    /// anyway, and the window is defined as strictly future.
    pub async fn accounts_expiring_within(
        &self,
        now: i64,
        lookahead_secs: i64,
    ) -> Result<Vec<SocialAccount>> {
        let rows = sqlx::query(
            r#"
            SELECT id, org_id, platform, access_token, refresh_token, token_expires_at,
                   platform_user_id, username, last_sync_at
            FROM social_accounts
            WHERE token_expires_at IS NOT NULL
              AND token_expires_at > ?
              AND token_expires_at <= ?
            ORDER BY token_expires_at ASC
            "#,
        )
        .bind(now)
        .bind(now + lookahead_secs)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows.into_iter().map(account_from_row).collect())
    }

    /// Overwrite an account's credential after a successful refresh
    pub async fn update_account_tokens(
        &self,
        account_id: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        token_expires_at: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE social_accounts SET
                access_token = ?,
                refresh_token = COALESCE(?, refresh_token),
                token_expires_at = ?
            WHERE id = ?
            "#,
        )
        .bind(access_token)
        .bind(refresh_token)
        .bind(token_expires_at)
        .bind(account_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Stamp an account's last publish activity
    pub async fn touch_account_sync(&self, account_id: &str, at: i64) -> Result<()> {
        sqlx::query("UPDATE social_accounts SET last_sync_at = ? WHERE id = ?")
            .bind(at)
            .bind(account_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(())
    }

    // ========================================================================
    // Posts
    // ========================================================================

    /// Insert a post together with its target rows
    pub async fn create_post(&self, post: &Post) -> Result<()> {
        let media_urls =
            serde_json::to_string(&post.media_urls).unwrap_or_else(|_| "[]".to_string());
        let approval = post
            .approval
            .as_ref()
            .map(|a| serde_json::to_string(a).unwrap_or_default());

        let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;

        sqlx::query(
            r#"
            INSERT INTO posts (id, org_id, status, content, media_urls, scheduled_at,
                               published_at, created_at, approval)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.org_id)
        .bind(post.status.as_str())
        .bind(&post.content)
        .bind(media_urls)
        .bind(post.scheduled_at)
        .bind(post.published_at)
        .bind(post.created_at)
        .bind(approval)
        .execute(&mut *tx)
        .await
        .map_err(DbError::SqlxError)?;

        for (position, target) in post.targets.iter().enumerate() {
            insert_target(&mut tx, &post.id, position as i64, target).await?;
        }

        tx.commit().await.map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_post(&self, org_id: &str, post_id: &str) -> Result<Option<Post>> {
        let row = sqlx::query(
            r#"
            SELECT id, org_id, status, content, media_urls, scheduled_at, published_at,
                   created_at, approval
            FROM posts WHERE org_id = ? AND id = ?
            "#,
        )
        .bind(org_id)
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let target_rows = sqlx::query(
            r#"
            SELECT account_id, status, platform_post_id, error_message, metadata
            FROM post_targets WHERE post_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        let targets = target_rows
            .into_iter()
            .map(|r| PostTarget {
                account_id: r.get("account_id"),
                status: TargetStatus::parse(&r.get::<String, _>("status"))
                    .unwrap_or(TargetStatus::Draft),
                platform_post_id: r.get("platform_post_id"),
                error_message: r.get("error_message"),
                metadata: r
                    .get::<Option<String>, _>("metadata")
                    .and_then(|m| serde_json::from_str(&m).ok()),
            })
            .collect();

        let media_urls: Vec<String> =
            serde_json::from_str(&row.get::<String, _>("media_urls")).unwrap_or_default();
        let approval = row
            .get::<Option<String>, _>("approval")
            .and_then(|a| serde_json::from_str(&a).ok());

        Ok(Some(Post {
            id: row.get("id"),
            org_id: row.get("org_id"),
            status: PostStatus::parse(&row.get::<String, _>("status"))
                .unwrap_or(PostStatus::Draft),
            content: row.get("content"),
            media_urls,
            scheduled_at: row.get("scheduled_at"),
            published_at: row.get("published_at"),
            created_at: row.get("created_at"),
            targets,
            approval,
        }))
    }

    /// Update a post's overall status. Returns false if the post is missing
    /// (or owned by a different organization).
    pub async fn update_post_status(
        &self,
        org_id: &str,
        post_id: &str,
        status: PostStatus,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE posts SET status = ? WHERE org_id = ? AND id = ?")
            .bind(status.as_str())
            .bind(org_id)
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark a post scheduled for a given instant
    pub async fn update_post_schedule(
        &self,
        org_id: &str,
        post_id: &str,
        scheduled_at: i64,
    ) -> Result<bool> {
        let result =
            sqlx::query("UPDATE posts SET status = ?, scheduled_at = ? WHERE org_id = ? AND id = ?")
                .bind(PostStatus::Scheduled.as_str())
                .bind(scheduled_at)
                .bind(org_id)
                .bind(post_id)
                .execute(&self.pool)
                .await
                .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Persist an orchestration outcome: overall status, published_at and
    /// the full per-target list, as one transaction.
    pub async fn apply_publish_outcome(&self, post: &Post) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;

        sqlx::query("UPDATE posts SET status = ?, published_at = ? WHERE id = ?")
            .bind(post.status.as_str())
            .bind(post.published_at)
            .bind(&post.id)
            .execute(&mut *tx)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::query("DELETE FROM post_targets WHERE post_id = ?")
            .bind(&post.id)
            .execute(&mut *tx)
            .await
            .map_err(DbError::SqlxError)?;

        for (position, target) in post.targets.iter().enumerate() {
            insert_target(&mut tx, &post.id, position as i64, target).await?;
        }

        tx.commit().await.map_err(DbError::SqlxError)?;

        Ok(())
    }

    // ========================================================================
    // Scheduled jobs
    // ========================================================================

    /// Create or move a post's pending job.
    ///
    /// A post rescheduled before its job ran keeps the same job row; only
    /// terminal jobs leave history behind.
    pub async fn upsert_pending_job(&self, job: &ScheduledJob) -> Result<()> {
        let existing: Option<String> = sqlx::query_scalar(
            "SELECT id FROM scheduled_jobs WHERE post_id = ? AND status = 'pending'",
        )
        .bind(&job.post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        match existing {
            Some(id) => {
                sqlx::query("UPDATE scheduled_jobs SET scheduled_at = ? WHERE id = ?")
                    .bind(job.scheduled_at)
                    .bind(id)
                    .execute(&self.pool)
                    .await
                    .map_err(DbError::SqlxError)?;
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO scheduled_jobs (id, post_id, org_id, scheduled_at, status,
                                                processed_at)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&job.id)
                .bind(&job.post_id)
                .bind(&job.org_id)
                .bind(job.scheduled_at)
                .bind(job.status.as_str())
                .bind(job.processed_at)
                .execute(&self.pool)
                .await
                .map_err(DbError::SqlxError)?;
            }
        }

        Ok(())
    }

    /// Pending jobs due at or before `now`, oldest first, bounded batch
    pub async fn due_jobs(&self, now: i64, limit: u32) -> Result<Vec<ScheduledJob>> {
        let rows = sqlx::query(
            r#"
            SELECT id, post_id, org_id, scheduled_at, status, processed_at
            FROM scheduled_jobs
            WHERE status = 'pending' AND scheduled_at <= ?
            ORDER BY scheduled_at ASC
            LIMIT ?
            "#,
        )
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows
            .into_iter()
            .map(|r| ScheduledJob {
                id: r.get("id"),
                post_id: r.get("post_id"),
                org_id: r.get("org_id"),
                scheduled_at: r.get("scheduled_at"),
                status: JobStatus::parse(&r.get::<String, _>("status"))
                    .unwrap_or(JobStatus::Pending),
                processed_at: r.get("processed_at"),
            })
            .collect())
    }

    pub async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        processed_at: Option<i64>,
    ) -> Result<()> {
        sqlx::query("UPDATE scheduled_jobs SET status = ?, processed_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(processed_at)
            .bind(job_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_job(&self, job_id: &str) -> Result<Option<ScheduledJob>> {
        let row = sqlx::query(
            r#"
            SELECT id, post_id, org_id, scheduled_at, status, processed_at
            FROM scheduled_jobs WHERE id = ?
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.map(|r| ScheduledJob {
            id: r.get("id"),
            post_id: r.get("post_id"),
            org_id: r.get("org_id"),
            scheduled_at: r.get("scheduled_at"),
            status: JobStatus::parse(&r.get::<String, _>("status"))
                .unwrap_or(JobStatus::Pending),
            processed_at: r.get("processed_at"),
        }))
    }
}

fn account_from_row(r: sqlx::sqlite::SqliteRow) -> SocialAccount {
    let platform_str: String = r.get("platform");
    SocialAccount {
        id: r.get("id"),
        org_id: r.get("org_id"),
        platform: PlatformKind::parse(&platform_str).unwrap_or(PlatformKind::Twitter),
        access_token: r.get("access_token"),
        refresh_token: r.get("refresh_token"),
        token_expires_at: r.get("token_expires_at"),
        platform_user_id: r.get("platform_user_id"),
        username: r.get("username"),
        last_sync_at: r.get("last_sync_at"),
    }
}

async fn insert_target(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    post_id: &str,
    position: i64,
    target: &PostTarget,
) -> Result<()> {
    let metadata = target
        .metadata
        .as_ref()
        .map(|m| serde_json::to_string(m).unwrap_or_default());

    sqlx::query(
        r#"
        INSERT INTO post_targets (post_id, account_id, position, status, platform_post_id,
                                  error_message, metadata)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(post_id)
    .bind(&target.account_id)
    .bind(position)
    .bind(target.status.as_str())
    .bind(&target.platform_post_id)
    .bind(&target.error_message)
    .bind(metadata)
    .execute(&mut **tx)
    .await
    .map_err(DbError::SqlxError)?;

    Ok(())
}
