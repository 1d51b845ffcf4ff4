//! In-process content store backed by a directory of JSON metadata and body files.
//!
//! Layout of a content directory:
//!
//! ```text
//! <dir>/articles.json     JSON array of article records
//! <dir>/bodies/<name>     raw body text, one file per body
//! ```
//!
//! Articles name their body by file name. On load every such reference is
//! rewritten to `<name>@<sha256 of the content>`, so an edited body gets a new
//! id and changes the article set. A reference with no matching file keeps the
//! bare name.

use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, LockResult, RwLock},
};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{info, warn};

use crate::application::repos::{
    ArticleCollection, ArticleList, ArticlesRepo, BodiesRepo, RepoError,
};
use crate::domain::entities::{ArticleId, ArticleRecord};

use super::error::InfraError;

const SOURCE: &str = "quire::infra::memory";
const ARTICLES_FILE: &str = "articles.json";
const BODIES_DIR: &str = "bodies";
const INITIAL_VERSION: u64 = 1;

struct Collection {
    version: u64,
    /// Every article, including private and deleted ones, keyed by id.
    all: HashMap<ArticleId, Arc<ArticleRecord>>,
    /// Public articles ordered by publication date, then id.
    public: ArticleList,
}

impl Collection {
    fn new(articles: Vec<ArticleRecord>) -> Self {
        let all = articles
            .into_iter()
            .map(|article| (article.id, Arc::new(article)))
            .collect();
        let mut collection = Self {
            version: INITIAL_VERSION,
            all,
            public: Arc::from(Vec::new()),
        };
        collection.refilter();
        collection
    }

    fn refilter(&mut self) {
        let mut public: Vec<Arc<ArticleRecord>> = self
            .all
            .values()
            .filter(|article| article.is_public())
            .cloned()
            .collect();
        public.sort_by_key(|article| (article.published_on, article.id));
        self.public = Arc::from(public);
    }

    fn bump(&mut self) -> u64 {
        self.refilter();
        self.version += 1;
        self.version
    }
}

/// Thread-safe article and body store. The collection version starts at 1 and
/// increases by one on every effective change to the article set.
pub struct MemoryStore {
    collection: RwLock<Collection>,
    bodies: RwLock<HashMap<String, String>>,
}

fn recover<G>(result: LockResult<G>, op: &'static str) -> G {
    result.unwrap_or_else(|poisoned| {
        warn!(
            target = SOURCE,
            op,
            result = "poisoned_recovered",
            hint = "state may be stale after panic in another thread",
            "Recovered from poisoned store lock"
        );
        poisoned.into_inner()
    })
}

impl MemoryStore {
    pub fn new(articles: Vec<ArticleRecord>, bodies: HashMap<String, String>) -> Self {
        Self {
            collection: RwLock::new(Collection::new(articles)),
            bodies: RwLock::new(bodies),
        }
    }

    /// Load a content directory. A missing `bodies/` directory is treated as empty.
    pub async fn load_dir(dir: impl AsRef<Path>) -> Result<Self, InfraError> {
        let (articles, bodies) = read_content_dir(dir.as_ref()).await?;
        info!(
            target = SOURCE,
            dir = %dir.as_ref().display(),
            articles = articles.len(),
            bodies = bodies.len(),
            "loaded content directory"
        );
        Ok(Self::new(articles, bodies))
    }

    /// Re-read a content directory, replacing all articles and bodies.
    /// Returns the new version if the article set changed.
    pub async fn reload_dir(&self, dir: impl AsRef<Path>) -> Result<Option<u64>, InfraError> {
        let (articles, bodies) = read_content_dir(dir.as_ref()).await?;
        *recover(self.bodies.write(), "reload_dir.bodies") = bodies;
        Ok(self.replace_all(articles))
    }

    pub fn version(&self) -> u64 {
        recover(self.collection.read(), "version").version
    }

    /// Insert or replace an article. Returns the new version, or `None` when
    /// the stored record was already identical.
    pub fn upsert_article(&self, article: ArticleRecord) -> Option<u64> {
        let mut collection = recover(self.collection.write(), "upsert_article");
        if collection
            .all
            .get(&article.id)
            .is_some_and(|existing| **existing == article)
        {
            return None;
        }
        collection.all.insert(article.id, Arc::new(article));
        Some(collection.bump())
    }

    /// Returns the new version, or `None` if no such article existed.
    pub fn remove_article(&self, id: ArticleId) -> Option<u64> {
        let mut collection = recover(self.collection.write(), "remove_article");
        collection.all.remove(&id)?;
        Some(collection.bump())
    }

    /// Swap in a whole new article set. Returns the new version if anything
    /// differs from what is stored.
    pub fn replace_all(&self, articles: Vec<ArticleRecord>) -> Option<u64> {
        let incoming: HashMap<ArticleId, Arc<ArticleRecord>> = articles
            .into_iter()
            .map(|article| (article.id, Arc::new(article)))
            .collect();

        let mut collection = recover(self.collection.write(), "replace_all");
        if collection.all == incoming {
            return None;
        }
        collection.all = incoming;
        Some(collection.bump())
    }

    /// Store a raw body. Bodies are addressed separately from the article set
    /// and do not change the collection version. Rendered bodies are cached by
    /// id, so changed content must be stored under a new id.
    pub fn put_body(&self, body_id: impl Into<String>, raw: impl Into<String>) {
        recover(self.bodies.write(), "put_body").insert(body_id.into(), raw.into());
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Vec::new(), HashMap::new())
    }
}

#[async_trait]
impl ArticlesRepo for MemoryStore {
    async fn collection_version(
        &self,
        _last_known: Option<u64>,
    ) -> Result<ArticleCollection, RepoError> {
        let collection = recover(self.collection.read(), "collection_version");
        Ok(ArticleCollection {
            version: collection.version,
            articles: Arc::clone(&collection.public),
        })
    }
}

#[async_trait]
impl BodiesRepo for MemoryStore {
    async fn text_body(&self, body_id: &str) -> Result<String, RepoError> {
        recover(self.bodies.read(), "text_body")
            .get(body_id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }
}

async fn read_content_dir(
    dir: &Path,
) -> Result<(Vec<ArticleRecord>, HashMap<String, String>), InfraError> {
    let articles_path = dir.join(ARTICLES_FILE);
    let raw = fs::read(&articles_path).await?;
    let articles: Vec<ArticleRecord> = serde_json::from_slice(&raw)
        .map_err(|err| InfraError::content(&articles_path, err.to_string()))?;

    let mut bodies = HashMap::new();
    let bodies_dir = dir.join(BODIES_DIR);
    if !fs::try_exists(&bodies_dir).await? {
        return Ok(address_bodies(articles, bodies));
    }

    let mut entries = fs::read_dir(&bodies_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let path = entry.path();
        let Some(body_id) = entry.file_name().to_str().map(str::to_owned) else {
            warn!(
                target = SOURCE,
                path = %path.display(),
                "skipping body file with non UTF-8 name"
            );
            continue;
        };
        let raw = fs::read_to_string(&path).await?;
        bodies.insert(body_id, raw);
    }

    Ok(address_bodies(articles, bodies))
}

/// Re-key bodies by content and point each article at its addressed body.
fn address_bodies(
    mut articles: Vec<ArticleRecord>,
    files: HashMap<String, String>,
) -> (Vec<ArticleRecord>, HashMap<String, String>) {
    let mut addressed = HashMap::with_capacity(files.len());
    let mut by_name = HashMap::with_capacity(files.len());
    for (name, raw) in files {
        let id = content_address(&name, &raw);
        by_name.insert(name, id.clone());
        addressed.insert(id, raw);
    }

    for article in &mut articles {
        if let Some(id) = by_name.get(&article.body_id) {
            article.body_id.clone_from(id);
        }
    }

    (articles, addressed)
}

fn content_address(name: &str, raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    format!("{name}@{}", hex::encode(hasher.finalize()))
}
