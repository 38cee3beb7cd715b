//! Platform capability abstraction and implementations
//!
//! Each supported platform implements the [`Capability`] trait: one publish
//! operation that runs the platform's full protocol (single-call,
//! container-create / poll-ready / finalize, or chunked binary upload), and
//! an optional token refresh operation. Dispatch goes through a
//! [`CapabilityRegistry`] built once at startup — adding a platform means
//! registering one more entry, not touching call sites.

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use crate::config::Config;
use crate::error::PublishError;
use crate::types::{PlatformKind, Post, PostTarget, RefreshedCredential, SocialAccount};

pub mod facebook;
pub mod instagram;
pub mod linkedin;
pub mod pinterest;
pub mod threads;
pub mod tiktok;
pub mod twitter;
pub mod youtube;

// Mock capability is available in all builds to support integration tests
pub mod mock;

/// Maximum status checks for asynchronous remote processing
pub const POLL_MAX_ATTEMPTS: u32 = 30;

/// Interval between status checks
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// A platform's publish and token-refresh behavior behind a uniform
/// interface.
///
/// Implementations hold their own `reqwest` client plus any OAuth app
/// credentials their refresh flow authenticates with. They must fail fast
/// on violated preconditions (missing media, missing destination) before
/// making any network call.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Which platform this capability publishes to
    fn platform(&self) -> PlatformKind;

    /// Publish a post to one target account, returning the platform's own
    /// identifier for the created content.
    async fn publish(
        &self,
        account: &SocialAccount,
        post: &Post,
        target: &PostTarget,
    ) -> Result<String, PublishError>;

    /// Exchange the account's refresh token (or re-extend its long-lived
    /// token) for a renewed credential.
    ///
    /// Only meaningful when [`supports_refresh`](Self::supports_refresh)
    /// returns true; the default implementation rejects the call.
    async fn refresh(
        &self,
        _account: &SocialAccount,
    ) -> Result<RefreshedCredential, PublishError> {
        Err(PublishError::UnsupportedPlatform(format!(
            "{} does not support token refresh",
            self.platform()
        )))
    }

    /// Whether this platform has a token refresh flow at all.
    ///
    /// "No refresh available" is a normal state, not an error: the refresh
    /// coordinator skips such accounts with a warning.
    fn supports_refresh(&self) -> bool {
        false
    }

    /// Whether the refresh flow needs a stored refresh token.
    ///
    /// Platforms that re-extend the access token itself (Instagram,
    /// Threads) override this to false.
    fn requires_refresh_token(&self) -> bool {
        true
    }
}

/// Registry mapping each platform to its capability implementation
///
/// Built once at startup; the orchestrator and refresh coordinator resolve
/// capabilities through it. An account whose platform has no entry fails
/// that one target with `UnsupportedPlatform`.
#[derive(Default)]
pub struct CapabilityRegistry {
    capabilities: HashMap<PlatformKind, Box<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            capabilities: HashMap::new(),
        }
    }

    /// Build the registry from configuration.
    ///
    /// Platforms that publish with the user token alone are always
    /// registered. Platforms whose refresh flow authenticates as the OAuth
    /// app are registered only when that app's credentials are configured.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();

        registry.register(Box::new(facebook::FacebookCapability::new()));
        registry.register(Box::new(instagram::InstagramCapability::new()));
        registry.register(Box::new(threads::ThreadsCapability::new()));

        if let Some(app) = &config.apps.twitter {
            registry.register(Box::new(twitter::TwitterCapability::new(app.clone())));
        }
        if let Some(app) = &config.apps.tiktok {
            registry.register(Box::new(tiktok::TiktokCapability::new(app.clone())));
        }
        if let Some(app) = &config.apps.youtube {
            registry.register(Box::new(youtube::YoutubeCapability::new(app.clone())));
        }
        if let Some(app) = &config.apps.linkedin {
            registry.register(Box::new(linkedin::LinkedinCapability::new(app.clone())));
        }
        if let Some(app) = &config.apps.pinterest {
            registry.register(Box::new(pinterest::PinterestCapability::new(app.clone())));
        }

        registry
    }

    /// Register a capability under its own platform. A later registration
    /// for the same platform replaces the earlier one.
    pub fn register(&mut self, capability: Box<dyn Capability>) {
        self.capabilities.insert(capability.platform(), capability);
    }

    pub fn get(&self, platform: PlatformKind) -> Option<&dyn Capability> {
        self.capabilities.get(&platform).map(|c| c.as_ref())
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

/// Outcome of one remote processing status check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    /// Processing finished, the resource is usable
    Ready,
    /// Still processing, check again later
    Pending,
    /// The remote side reported a terminal failure
    Failed(String),
}

/// Poll a remote status check until ready, bounded by `max_attempts`.
///
/// A remote failure surfaces as `RemoteRejected` with the platform's
/// message; exhausting the attempts is a terminal `ProcessingTimedOut`,
/// never an unbounded wait.
pub(crate) async fn poll_until_ready<F, Fut>(
    max_attempts: u32,
    interval: Duration,
    mut check: F,
) -> Result<(), PublishError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollStatus, PublishError>>,
{
    for attempt in 1..=max_attempts {
        match check().await? {
            PollStatus::Ready => return Ok(()),
            PollStatus::Failed(message) => return Err(PublishError::RemoteRejected(message)),
            PollStatus::Pending => {
                if attempt < max_attempts {
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }

    Err(PublishError::ProcessingTimedOut(max_attempts))
}

/// Map a transport-level failure to the publish error taxonomy
pub(crate) fn network_error(context: &str, error: reqwest::Error) -> PublishError {
    PublishError::Network(format!("{}: {}", context, error))
}

/// Convert a non-success HTTP response into `RemoteRejected`, preserving
/// the platform's response body for user display.
pub(crate) async fn remote_rejected(context: &str, resp: reqwest::Response) -> PublishError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    if body.is_empty() {
        PublishError::RemoteRejected(format!("{} failed with status {}", context, status))
    } else {
        PublishError::RemoteRejected(format!("{} failed ({}): {}", context, status, body))
    }
}
