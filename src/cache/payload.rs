//! Client payload for the article collection.
//!
//! The payload is a small JavaScript file that assigns a JSON array to a global
//! and hands it to the client-side loader:
//!
//! ```text
//! var __articles_json = [[["rust","cache"]],[["go"]]]; articlesJsonLoaded(__articles_json);
//! ```
//!
//! It is served under a content-addressed name so browsers can cache it forever.

use std::sync::Arc;

use bytes::Bytes;
use metrics::counter;
use serde::{Serialize, Serializer, ser::SerializeSeq};
use sha2::{Digest, Sha256};
use tracing::error;

use crate::domain::entities::ArticleRecord;

pub const ARTICLES_JS_DIR: &str = "/djs";
pub const ARTICLES_JS_STEM: &str = "articles";
pub const ARTICLES_JS_EXTENSION: &str = "js";

const PAYLOAD_HEADER: &str = "var __articles_json = ";
const PAYLOAD_FOOTER: &str = "; articlesJsonLoaded(__articles_json);";

pub(crate) const METRIC_SERIALIZE_ERROR_TOTAL: &str = "quire_articles_cache_serialize_error_total";

/// Per-article record as the client script expects it.
///
/// Serialised positionally. New fields must be appended here and in the
/// client loader together.
pub struct ClientArticleView<'a> {
    tags: &'a [String],
}

impl<'a> From<&'a ArticleRecord> for ClientArticleView<'a> {
    fn from(article: &'a ArticleRecord) -> Self {
        Self {
            tags: &article.tags,
        }
    }
}

impl Serialize for ClientArticleView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(1))?;
        seq.serialize_element(self.tags)?;
        seq.end()
    }
}

/// Build the framed payload (newest article first) and its hex SHA-256 digest.
pub(crate) fn build_articles_js(articles: &[Arc<ArticleRecord>]) -> (Bytes, String) {
    let views = articles
        .iter()
        .rev()
        .map(|article| ClientArticleView::from(article.as_ref()));
    frame_payload(views)
}

/// Frame any sequence of serialisable values as a client payload and digest it.
/// Values that fail to serialise are logged, counted and skipped.
pub fn frame_payload<I, T>(values: I) -> (Bytes, String)
where
    I: IntoIterator<Item = T>,
    T: Serialize,
{
    let mut buf = Vec::with_capacity(PAYLOAD_HEADER.len() + PAYLOAD_FOOTER.len() + 2);
    buf.extend_from_slice(PAYLOAD_HEADER.as_bytes());
    append_json_array(&mut buf, values);
    buf.extend_from_slice(PAYLOAD_FOOTER.as_bytes());

    let digest = hex_digest(&buf);
    (Bytes::from(buf), digest)
}

/// Serialise each value independently. A value that fails to serialise is
/// logged and left out; the array itself always stays well formed.
fn append_json_array<I, T>(buf: &mut Vec<u8>, values: I)
where
    I: IntoIterator<Item = T>,
    T: Serialize,
{
    buf.push(b'[');
    let mut written = 0usize;
    for (position, value) in values.into_iter().enumerate() {
        match serde_json::to_vec(&value) {
            Ok(data) => {
                if written > 0 {
                    buf.push(b',');
                }
                buf.extend_from_slice(&data);
                written += 1;
            }
            Err(err) => {
                counter!(METRIC_SERIALIZE_ERROR_TOTAL).increment(1);
                error!(
                    target = "quire::cache::payload",
                    position,
                    error = %err,
                    "failed to serialise article for client payload"
                );
            }
        }
    }
    buf.push(b']');
}

pub(crate) fn hex_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Content-addressed URL path for a payload digest.
pub fn articles_js_url(digest: &str) -> String {
    format!("{ARTICLES_JS_DIR}/{ARTICLES_JS_STEM}-{digest}.{ARTICLES_JS_EXTENSION}")
}

/// Extract the digest from a file name like `articles-<digest>.js`.
pub fn digest_from_file_name(file_name: &str) -> Option<&str> {
    let digest = file_name
        .strip_prefix(ARTICLES_JS_STEM)?
        .strip_prefix('-')?
        .strip_suffix(ARTICLES_JS_EXTENSION)?
        .strip_suffix('.')?;
    (!digest.is_empty() && digest.bytes().all(|b| b.is_ascii_hexdigit())).then_some(digest)
}
