//! Crosspost - multi-platform social publishing orchestration
//!
//! This library fans a single logical post out to connected accounts on
//! up to eight social platforms, reconciles the per-target outcomes into
//! one post status, and keeps credentials fresh ahead of use.

pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod media;
pub mod orchestrator;
pub mod platforms;
pub mod refresh;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{CrosspostError, PublishError, Result};
pub use orchestrator::Orchestrator;
pub use platforms::{Capability, CapabilityRegistry};
pub use service::PublishService;
pub use types::{
    ApprovalRequest, JobStatus, PlatformKind, Post, PostStatus, PostTarget, ScheduledJob,
    SocialAccount, TargetStatus,
};
