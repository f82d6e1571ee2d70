//! Named hooks that run around committed writes
//!
//! A [`SideEffect`] runs after a create or update has been stored; a
//! [`Cleanup`] runs after a delete. Both receive the stored document (never
//! the projected one). Hooks run inline, in registration order, and their
//! failures are logged and otherwise ignored: the write they follow is
//! already committed and nothing is retried.

use crate::core::error::HookError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Action triggered by a successful create or update
#[async_trait]
pub trait SideEffect: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    async fn run(&self, document: &Value) -> Result<(), HookError>;
}

/// Action triggered by a successful delete
#[async_trait]
pub trait Cleanup: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    async fn run(&self, document: &Value) -> Result<(), HookError>;
}

/// Run side effects, logging failures
///
/// Returns how many hooks failed, for callers that want to report it.
pub async fn run_side_effects(resource: &str, hooks: &[Arc<dyn SideEffect>], document: &Value) -> usize {
    let mut failures = 0;
    for hook in hooks {
        if let Err(error) = hook.run(document).await {
            failures += 1;
            tracing::warn!(resource, hook = hook.name(), %error, "side effect failed");
        } else {
            tracing::debug!(resource, hook = hook.name(), "side effect done");
        }
    }
    failures
}

/// Run cleanups, logging failures
pub async fn run_cleanups(resource: &str, hooks: &[Arc<dyn Cleanup>], document: &Value) -> usize {
    let mut failures = 0;
    for hook in hooks {
        if let Err(error) = hook.run(document).await {
            failures += 1;
            tracing::warn!(resource, hook = hook.name(), %error, "cleanup failed");
        } else {
            tracing::debug!(resource, hook = hook.name(), "cleanup done");
        }
    }
    failures
}
