//! Proactive token refresh
//!
//! One pass scans the whole account population for credentials expiring
//! inside the lookahead window and refreshes each through its platform's
//! capability. Accounts are handled independently: a missing refresh flow
//! or a failed exchange is logged and the batch continues.

use std::sync::Arc;

use tracing::{info, warn};

use crate::db::Database;
use crate::error::Result;
use crate::platforms::CapabilityRegistry;
use crate::types::SocialAccount;

pub struct TokenRefreshCoordinator {
    db: Database,
    registry: Arc<CapabilityRegistry>,
    lookahead_secs: i64,
}

impl TokenRefreshCoordinator {
    pub fn new(db: Database, registry: Arc<CapabilityRegistry>, lookahead_secs: i64) -> Self {
        Self {
            db,
            registry,
            lookahead_secs,
        }
    }

    /// Refresh every credential expiring within the lookahead window.
    ///
    /// The window is `(now, now + lookahead]` — already-expired tokens are
    /// left alone, they can no longer be exchanged proactively. Errors
    /// here are only whole-pass failures (the expiry query itself);
    /// per-account failures never abort the batch.
    pub async fn run_once(&self) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let accounts = self
            .db
            .accounts_expiring_within(now, self.lookahead_secs)
            .await?;

        if accounts.is_empty() {
            return Ok(());
        }

        info!(
            "Refreshing {} account(s) expiring within {}s",
            accounts.len(),
            self.lookahead_secs
        );

        for account in accounts {
            self.refresh_account(&account, now).await;
        }

        Ok(())
    }

    async fn refresh_account(&self, account: &SocialAccount, now: i64) {
        let Some(capability) = self.registry.get(account.platform) else {
            warn!(
                "Skipping refresh for account {}: no capability registered for {}",
                account.id, account.platform
            );
            return;
        };

        if !capability.supports_refresh() {
            warn!(
                "Skipping refresh for account {}: {} has no refresh flow",
                account.id, account.platform
            );
            return;
        }

        if capability.requires_refresh_token() && account.refresh_token.is_none() {
            warn!(
                "Skipping refresh for account {}: no refresh token stored",
                account.id
            );
            return;
        }

        match capability.refresh(account).await {
            Ok(credential) => {
                let expires_at = now + credential.expires_in;
                let result = self
                    .db
                    .update_account_tokens(
                        &account.id,
                        &credential.access_token,
                        credential.refresh_token.as_deref(),
                        expires_at,
                    )
                    .await;

                match result {
                    Ok(()) => info!(
                        "Refreshed token for account {} ({}), new expiry {}",
                        account.id, account.platform, expires_at
                    ),
                    Err(e) => warn!(
                        "Refreshed token for account {} but failed to store it: {}",
                        account.id, e
                    ),
                }
            }
            Err(e) => {
                warn!(
                    "Failed to refresh token for account {} ({}): {}",
                    account.id, account.platform, e
                );
            }
        }
    }
}
