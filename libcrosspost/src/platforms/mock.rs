//! Mock capability for testing
//!
//! A configurable capability that simulates publish and refresh outcomes
//! without touching the network. Available in all builds so integration
//! tests can drive the orchestrator, refresh coordinator and job runner
//! against scripted platform behavior.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::PublishError;
use crate::types::{PlatformKind, Post, PostTarget, RefreshedCredential, SocialAccount};

use super::Capability;

/// Scripted behavior for a mock capability
#[derive(Clone)]
pub struct MockConfig {
    pub platform: PlatformKind,

    /// Platform post id returned on publish success
    pub publish_result: Result<String, PublishError>,

    /// Credential returned on refresh success
    pub refresh_result: Result<RefreshedCredential, PublishError>,

    pub supports_refresh: bool,
    pub requires_refresh_token: bool,

    /// Delay before completing operations (simulates network latency)
    pub delay: Duration,

    /// Number of times publish has been called
    pub publish_calls: Arc<Mutex<usize>>,

    /// Number of times refresh has been called
    pub refresh_calls: Arc<Mutex<usize>>,

    /// Account ids that publish was invoked for (for verification)
    pub published_accounts: Arc<Mutex<Vec<String>>>,
}

impl MockConfig {
    fn new(platform: PlatformKind) -> Self {
        Self {
            platform,
            publish_result: Ok("mock-post-id".to_string()),
            refresh_result: Ok(RefreshedCredential {
                access_token: "mock-access".to_string(),
                refresh_token: None,
                expires_in: 3600,
            }),
            supports_refresh: false,
            requires_refresh_token: true,
            delay: Duration::from_millis(0),
            publish_calls: Arc::new(Mutex::new(0)),
            refresh_calls: Arc::new(Mutex::new(0)),
            published_accounts: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Mock capability with scripted outcomes
pub struct MockCapability {
    config: MockConfig,
}

impl MockCapability {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// A capability that publishes successfully with the given post id
    pub fn publishing(platform: PlatformKind, platform_post_id: &str) -> Self {
        let mut config = MockConfig::new(platform);
        config.publish_result = Ok(platform_post_id.to_string());
        Self::new(config)
    }

    /// A capability whose publish fails with the given error
    pub fn failing(platform: PlatformKind, error: PublishError) -> Self {
        let mut config = MockConfig::new(platform);
        config.publish_result = Err(error);
        Self::new(config)
    }

    /// A capability that refreshes successfully with the given credential
    pub fn refreshing(platform: PlatformKind, credential: RefreshedCredential) -> Self {
        let mut config = MockConfig::new(platform);
        config.supports_refresh = true;
        config.refresh_result = Ok(credential);
        Self::new(config)
    }

    /// A capability whose refresh fails with the given error
    pub fn refresh_failing(platform: PlatformKind, error: PublishError) -> Self {
        let mut config = MockConfig::new(platform);
        config.supports_refresh = true;
        config.refresh_result = Err(error);
        Self::new(config)
    }

    /// Override whether the refresh flow needs a stored refresh token
    pub fn with_requires_refresh_token(mut self, requires: bool) -> Self {
        self.config.requires_refresh_token = requires;
        self
    }

    /// Add latency to every operation
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.config.delay = delay;
        self
    }

    /// Handles to the call counters and the published-accounts log,
    /// for assertions after the capability has been boxed away
    pub fn probes(&self) -> MockProbes {
        MockProbes {
            publish_calls: self.config.publish_calls.clone(),
            refresh_calls: self.config.refresh_calls.clone(),
            published_accounts: self.config.published_accounts.clone(),
        }
    }
}

/// Shared counters observed by tests
#[derive(Clone)]
pub struct MockProbes {
    pub publish_calls: Arc<Mutex<usize>>,
    pub refresh_calls: Arc<Mutex<usize>>,
    pub published_accounts: Arc<Mutex<Vec<String>>>,
}

impl MockProbes {
    pub fn publish_count(&self) -> usize {
        *self.publish_calls.lock().unwrap()
    }

    pub fn refresh_count(&self) -> usize {
        *self.refresh_calls.lock().unwrap()
    }

    pub fn published_account_ids(&self) -> Vec<String> {
        self.published_accounts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Capability for MockCapability {
    fn platform(&self) -> PlatformKind {
        self.config.platform
    }

    async fn publish(
        &self,
        account: &SocialAccount,
        _post: &Post,
        _target: &PostTarget,
    ) -> Result<String, PublishError> {
        if self.config.delay > Duration::from_millis(0) {
            sleep(self.config.delay).await;
        }

        *self.config.publish_calls.lock().unwrap() += 1;
        self.config
            .published_accounts
            .lock()
            .unwrap()
            .push(account.id.clone());

        self.config.publish_result.clone()
    }

    async fn refresh(
        &self,
        _account: &SocialAccount,
    ) -> Result<RefreshedCredential, PublishError> {
        if self.config.delay > Duration::from_millis(0) {
            sleep(self.config.delay).await;
        }

        *self.config.refresh_calls.lock().unwrap() += 1;
        self.config.refresh_result.clone()
    }

    fn supports_refresh(&self) -> bool {
        self.config.supports_refresh
    }

    fn requires_refresh_token(&self) -> bool {
        self.config.requires_refresh_token
    }
}
