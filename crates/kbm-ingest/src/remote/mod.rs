//! Remote knowledge-base access
//!
//! The drivers only see the [`KnowledgeBase`] trait, so tests can swap in a
//! spy and the HTTP client stays a thin adapter.

pub mod client;
pub mod endpoints;
pub mod types;

pub use client::NucliaClient;
pub use types::*;

use crate::config::Target;
use async_trait::async_trait;
use kbm_common::RemoteError;

/// Result of a single remote call
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Operations the migration consumes from the knowledge-base service
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Create a resource; returns the service-assigned resource id
    async fn create(&self, target: &Target, payload: &ResourcePayload) -> RemoteResult<String>;

    /// Replace the fields set in `payload` on an existing resource
    async fn update(
        &self,
        target: &Target,
        key: &ResourceKey,
        payload: &ResourcePayload,
    ) -> RemoteResult<()>;

    async fn delete(&self, target: &Target, key: &ResourceKey) -> RemoteResult<()>;

    async fn get(&self, target: &Target, key: &ResourceKey) -> RemoteResult<Resource>;

    async fn search(&self, target: &Target, query: &SearchQuery) -> RemoteResult<Vec<Resource>>;
}

/// What an upsert ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Create the resource, or update it in place when its slug already exists
pub async fn upsert<K: KnowledgeBase + ?Sized>(
    kb: &K,
    target: &Target,
    slug: &str,
    payload: &ResourcePayload,
) -> RemoteResult<UpsertOutcome> {
    match kb.create(target, payload).await {
        Ok(_) => Ok(UpsertOutcome::Created),
        Err(e) if e.is_conflict() => {
            tracing::debug!(slug, "slug exists, updating in place");
            kb.update(target, &ResourceKey::slug(slug), payload).await?;
            Ok(UpsertOutcome::Updated)
        }
        Err(e) => Err(e),
    }
}
