//! Domain entities mirrored from the content store.

use serde::{Deserialize, Serialize};
use slug::slugify;
use time::Date;

use crate::domain::types::TextFormat;

pub type ArticleId = u64;

time::serde::format_description!(article_date, Date, "[year]-[month]-[day]");

/// A published (or hidden) article as known to the content store.
///
/// Only the metadata lives here; the body is addressed indirectly through
/// `body_id` so that bodies can be fetched and rendered lazily.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: ArticleId,
    pub title: String,
    #[serde(with = "article_date")]
    pub published_on: Date,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub is_deleted: bool,
    pub body_id: String,
    #[serde(default)]
    pub format: TextFormat,
}

impl ArticleRecord {
    /// Visible to anonymous readers.
    pub fn is_public(&self) -> bool {
        !self.is_private && !self.is_deleted
    }

    /// Canonical URL path, e.g. `/article/12/hello-world.html`.
    pub fn permalink(&self) -> String {
        let slug = slugify(&self.title);
        if slug.is_empty() {
            format!("/article/{}.html", self.id)
        } else {
            format!("/article/{}/{slug}.html", self.id)
        }
    }
}

/// Compact view of an article for listings and navigation links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleSummary {
    pub id: ArticleId,
    pub title: String,
    pub permalink: String,
    #[serde(with = "article_date")]
    pub published_on: Date,
    pub tags: Vec<String>,
}

impl From<&ArticleRecord> for ArticleSummary {
    fn from(record: &ArticleRecord) -> Self {
        Self {
            id: record.id,
            title: record.title.clone(),
            permalink: record.permalink(),
            published_on: record.published_on,
            tags: record.tags.clone(),
        }
    }
}
