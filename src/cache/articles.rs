//! Versioned cache of the public article collection and its client payload.

use std::sync::Arc;
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use bytes::Bytes;
use metrics::{counter, histogram};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::application::repos::{ArticleList, ArticlesRepo};
use crate::domain::entities::{ArticleId, ArticleRecord};

use super::payload::{articles_js_url, build_articles_js};

const SOURCE: &str = "quire::cache::articles";

pub(crate) const METRIC_REBUILD_TOTAL: &str = "quire_articles_cache_rebuild_total";
pub(crate) const METRIC_REBUILD_MS: &str = "quire_articles_cache_rebuild_ms";
pub(crate) const METRIC_STORE_ERROR_TOTAL: &str = "quire_articles_cache_store_error_total";

/// Serialised client payload together with its content digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticlesPayload {
    pub bytes: Bytes,
    pub digest: String,
}

/// Position of an article within the cached collection.
///
/// An unknown id yields the default value: no neighbours, no article, index 0.
#[derive(Debug, Clone, Default)]
pub struct ArticleContext {
    pub previous: Option<Arc<ArticleRecord>>,
    pub current: Option<Arc<ArticleRecord>>,
    pub next: Option<Arc<ArticleRecord>>,
    pub index: usize,
}

impl ArticleContext {
    fn locate(articles: &[Arc<ArticleRecord>], id: ArticleId) -> Self {
        let Some(index) = articles.iter().position(|article| article.id == id) else {
            return Self::default();
        };

        Self {
            previous: index
                .checked_sub(1)
                .and_then(|prev| articles.get(prev))
                .cloned(),
            current: articles.get(index).cloned(),
            next: articles.get(index + 1).cloned(),
            index,
        }
    }
}

struct ArticlesState {
    /// `None` until the first successful build.
    version: Option<u64>,
    articles: ArticleList,
    payload: Bytes,
    digest: String,
}

impl Default for ArticlesState {
    fn default() -> Self {
        Self {
            version: None,
            articles: Arc::from(Vec::new()),
            payload: Bytes::new(),
            digest: String::new(),
        }
    }
}

/// Cache of the public article list, rebuilt whenever the store reports a new
/// collection version.
///
/// Every read checks the store's version under the cache lock and rebuilds
/// synchronously on mismatch, so a reader observes either the previous build or
/// the new one in full. The instance is created once at startup and shared by
/// reference for the life of the process.
pub struct ArticlesCache {
    repo: Arc<dyn ArticlesRepo>,
    state: Mutex<ArticlesState>,
    #[cfg(test)]
    rebuilds: AtomicUsize,
}

impl ArticlesCache {
    pub fn new(repo: Arc<dyn ArticlesRepo>) -> Self {
        Self {
            repo,
            state: Mutex::new(ArticlesState::default()),
            #[cfg(test)]
            rebuilds: AtomicUsize::new(0),
        }
    }

    /// Content-addressed URL of the client payload, e.g. `/djs/articles-<digest>.js`.
    pub async fn resource_url(&self) -> String {
        let state = self.refreshed().await;
        articles_js_url(&state.digest)
    }

    pub async fn payload(&self) -> ArticlesPayload {
        let state = self.refreshed().await;
        ArticlesPayload {
            bytes: state.payload.clone(),
            digest: state.digest.clone(),
        }
    }

    /// Public articles in store order.
    pub async fn articles(&self) -> ArticleList {
        let state = self.refreshed().await;
        Arc::clone(&state.articles)
    }

    /// Neighbours and index of `id` in the current collection.
    pub async fn article_context(&self, id: ArticleId) -> ArticleContext {
        let state = self.refreshed().await;
        ArticleContext::locate(&state.articles, id)
    }

    /// Version of the last build, without consulting the store.
    pub async fn version(&self) -> Option<u64> {
        self.state.lock().await.version
    }

    async fn refreshed(&self) -> MutexGuard<'_, ArticlesState> {
        let mut state = self.state.lock().await;
        self.rebuild_if_needed(&mut state).await;
        state
    }

    async fn rebuild_if_needed(&self, state: &mut ArticlesState) {
        let collection = match self.repo.collection_version(state.version).await {
            Ok(collection) => collection,
            Err(err) => {
                counter!(METRIC_STORE_ERROR_TOTAL).increment(1);
                warn!(
                    target = SOURCE,
                    cached_version = ?state.version,
                    error = %err,
                    "article store unavailable; serving previous build"
                );
                return;
            }
        };

        if state.version == Some(collection.version) {
            return;
        }

        let started_at = Instant::now();
        let (payload, digest) = build_articles_js(&collection.articles);
        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;

        info!(
            target = SOURCE,
            previous_version = ?state.version,
            version = collection.version,
            articles = collection.articles.len(),
            payload_bytes = payload.len(),
            digest = %digest,
            "rebuilt article cache"
        );
        debug!(target = SOURCE, elapsed_ms, "article cache rebuild timing");

        *state = ArticlesState {
            version: Some(collection.version),
            articles: collection.articles,
            payload,
            digest,
        };

        counter!(METRIC_REBUILD_TOTAL).increment(1);
        histogram!(METRIC_REBUILD_MS).record(elapsed_ms);
        #[cfg(test)]
        self.rebuilds.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU64;

    use async_trait::async_trait;
    use time::macros::date;

    use super::*;
    use crate::application::repos::{ArticleCollection, RepoError};
    use crate::domain::types::TextFormat;

    fn article(id: u64, tags: &[&str]) -> Arc<ArticleRecord> {
        Arc::new(ArticleRecord {
            id,
            title: format!("Article {id}"),
            published_on: date!(2024 - 05 - 01),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            is_private: false,
            is_deleted: false,
            body_id: format!("body-{id}"),
            format: TextFormat::Markdown,
        })
    }

    /// Hand-driven store: tests set the version and article list directly.
    #[derive(Default)]
    struct FakeRepo {
        version: AtomicU64,
        articles: std::sync::Mutex<Vec<Arc<ArticleRecord>>>,
        failing: std::sync::atomic::AtomicBool,
        calls: AtomicUsize,
    }

    impl FakeRepo {
        fn set(&self, version: u64, articles: Vec<Arc<ArticleRecord>>) {
            *self.articles.lock().expect("fake repo lock") = articles;
            self.version.store(version, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ArticlesRepo for FakeRepo {
        async fn collection_version(
            &self,
            _last_known: Option<u64>,
        ) -> Result<ArticleCollection, RepoError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(RepoError::Persistence("offline".to_string()));
            }
            let articles = self.articles.lock().expect("fake repo lock").clone();
            Ok(ArticleCollection {
                version: self.version.load(Ordering::SeqCst),
                articles: Arc::from(articles),
            })
        }
    }

    fn cache_with(repo: &Arc<FakeRepo>) -> ArticlesCache {
        ArticlesCache::new(Arc::clone(repo) as Arc<dyn ArticlesRepo>)
    }

    #[tokio::test]
    async fn first_read_builds_even_when_store_reports_version_zero() {
        let repo = Arc::new(FakeRepo::default());
        repo.set(0, vec![article(1, &["a"])]);
        let cache = cache_with(&repo);

        assert_eq!(cache.version().await, None);
        assert_eq!(cache.articles().await.len(), 1);
        assert_eq!(cache.version().await, Some(0));
        assert_eq!(cache.rebuilds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn repeated_reads_rebuild_once() {
        let repo = Arc::new(FakeRepo::default());
        repo.set(3, vec![article(1, &["a"]), article(2, &["b"])]);
        let cache = cache_with(&repo);

        let first = cache.payload().await;
        let second = cache.payload().await;
        let _ = cache.resource_url().await;
        let _ = cache.article_context(1).await;

        assert_eq!(first, second);
        assert_eq!(cache.rebuilds.load(Ordering::SeqCst), 1);
        assert_eq!(repo.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn version_change_triggers_rebuild_and_new_digest() {
        let repo = Arc::new(FakeRepo::default());
        repo.set(1, vec![article(1, &["a"])]);
        let cache = cache_with(&repo);

        let before = cache.resource_url().await;
        repo.set(2, vec![article(1, &["a"]), article(2, &["b"])]);
        let after = cache.resource_url().await;

        assert_ne!(before, after);
        assert_eq!(cache.version().await, Some(2));
        assert_eq!(cache.articles().await.len(), 2);
        assert_eq!(cache.rebuilds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unchanged_version_ignores_changed_list() {
        let repo = Arc::new(FakeRepo::default());
        repo.set(5, vec![article(1, &["a"])]);
        let cache = cache_with(&repo);
        let _ = cache.articles().await;

        repo.set(5, vec![article(1, &["a"]), article(2, &["b"])]);
        assert_eq!(cache.articles().await.len(), 1);
        assert_eq!(cache.rebuilds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn resource_url_embeds_payload_digest() {
        let repo = Arc::new(FakeRepo::default());
        repo.set(1, vec![article(1, &["a"])]);
        let cache = cache_with(&repo);

        let payload = cache.payload().await;
        assert_eq!(payload.digest.len(), 64);
        assert_eq!(
            cache.resource_url().await,
            format!("/djs/articles-{}.js", payload.digest)
        );
    }

    #[tokio::test]
    async fn store_failure_keeps_previous_build() {
        let repo = Arc::new(FakeRepo::default());
        repo.set(1, vec![article(1, &["a"])]);
        let cache = cache_with(&repo);
        let before = cache.payload().await;

        repo.failing.store(true, Ordering::SeqCst);
        repo.set(2, vec![]);
        assert_eq!(cache.payload().await, before);
        assert_eq!(cache.version().await, Some(1));
    }

    #[tokio::test]
    async fn store_failure_before_first_build_serves_empty_state() {
        let repo = Arc::new(FakeRepo::default());
        repo.failing.store(true, Ordering::SeqCst);
        let cache = cache_with(&repo);

        assert!(cache.articles().await.is_empty());
        let payload = cache.payload().await;
        assert!(payload.bytes.is_empty());
        assert!(payload.digest.is_empty());
        assert_eq!(cache.version().await, None);
    }

    #[tokio::test]
    async fn article_context_reports_neighbours() {
        let repo = Arc::new(FakeRepo::default());
        repo.set(1, vec![article(10, &[]), article(20, &[]), article(30, &[])]);
        let cache = cache_with(&repo);

        let middle = cache.article_context(20).await;
        assert_eq!(middle.previous.map(|a| a.id), Some(10));
        assert_eq!(middle.current.map(|a| a.id), Some(20));
        assert_eq!(middle.next.map(|a| a.id), Some(30));
        assert_eq!(middle.index, 1);

        let first = cache.article_context(10).await;
        assert!(first.previous.is_none());
        assert_eq!(first.next.map(|a| a.id), Some(20));
        assert_eq!(first.index, 0);

        let last = cache.article_context(30).await;
        assert_eq!(last.previous.map(|a| a.id), Some(20));
        assert!(last.next.is_none());
        assert_eq!(last.index, 2);
    }

    #[tokio::test]
    async fn article_context_for_unknown_id_is_empty() {
        let repo = Arc::new(FakeRepo::default());
        repo.set(1, vec![article(10, &[])]);
        let cache = cache_with(&repo);

        let missing = cache.article_context(99).await;
        assert!(missing.previous.is_none());
        assert!(missing.current.is_none());
        assert!(missing.next.is_none());
        assert_eq!(missing.index, 0);
    }

    #[tokio::test]
    async fn concurrent_readers_share_a_single_rebuild() {
        let repo = Arc::new(FakeRepo::default());
        repo.set(9, (1..=20).map(|id| article(id, &["t"])).collect());
        let cache = Arc::new(cache_with(&repo));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move { cache.payload().await }));
        }

        let mut digests = Vec::new();
        for handle in handles {
            digests.push(handle.await.expect("reader task").digest);
        }

        assert!(digests.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(cache.rebuilds.load(Ordering::SeqCst), 1);
    }
}
