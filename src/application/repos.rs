//! Repository traits describing the content store consumed by the caches.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::ArticleRecord;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Shared, immutable list of article references in store order.
pub type ArticleList = Arc<[Arc<ArticleRecord>]>;

/// The store's view of the public article collection at a given version.
#[derive(Debug, Clone)]
pub struct ArticleCollection {
    pub version: u64,
    pub articles: ArticleList,
}

#[async_trait]
pub trait ArticlesRepo: Send + Sync {
    /// Report the current collection version together with the public
    /// (non-private, non-deleted) articles. Called on every cache read, so it
    /// must stay cheap. `last_known` is the caller's current version, if any.
    async fn collection_version(
        &self,
        last_known: Option<u64>,
    ) -> Result<ArticleCollection, RepoError>;
}

#[async_trait]
pub trait BodiesRepo: Send + Sync {
    /// Fetch the raw stored body for `body_id`.
    async fn text_body(&self, body_id: &str) -> Result<String, RepoError>;
}
