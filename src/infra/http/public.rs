use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use serde::Serialize;

use crate::{
    application::error::HttpError,
    cache::{ArticlesCache, BodyCache, articles_js_url, digest_from_file_name},
    domain::entities::{ArticleId, ArticleSummary},
};

use super::middleware::{log_responses, set_request_context};

const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";
const JAVASCRIPT_CONTENT_TYPE: &str = "application/javascript; charset=utf-8";

#[derive(Clone)]
pub struct HttpState {
    pub articles: Arc<ArticlesCache>,
    pub bodies: Arc<BodyCache>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/djs/{file}", get(articles_js))
        .route("/api/articles", get(list_articles))
        .route("/api/articles/{id}", get(article_detail))
        .route("/_health", get(health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn articles_js(
    State(state): State<HttpState>,
    Path(file): Path<String>,
    headers: HeaderMap,
) -> Response {
    let Some(requested) = digest_from_file_name(&file) else {
        return HttpError::not_found(
            "infra::http::public::articles_js",
            format!("no script named `{file}`"),
        )
        .into_response();
    };

    let payload = state.articles.payload().await;
    if requested != payload.digest {
        // Outdated digest: point the client at the current payload.
        return (
            StatusCode::TEMPORARY_REDIRECT,
            [
                (header::LOCATION, articles_js_url(&payload.digest)),
                (header::CACHE_CONTROL, "no-store".to_string()),
            ],
        )
            .into_response();
    }

    let etag = format!("\"{}\"", payload.digest);
    if etag_matches(&headers, &etag) {
        let mut response = StatusCode::NOT_MODIFIED.into_response();
        apply_cache_headers(response.headers_mut(), &etag);
        return response;
    }

    build_script_response(payload.bytes, &etag)
}

fn etag_matches(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get_all(header::IF_NONE_MATCH)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|candidate| candidate.trim() == etag || candidate.trim() == "*")
}

fn apply_cache_headers(headers: &mut HeaderMap, etag: &str) {
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(IMMUTABLE_CACHE_CONTROL),
    );
    if let Ok(value) = HeaderValue::from_str(etag) {
        headers.insert(header::ETAG, value);
    }
}

fn build_script_response(bytes: Bytes, etag: &str) -> Response {
    let len = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(JAVASCRIPT_CONTENT_TYPE),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    apply_cache_headers(headers, etag);

    response
}

#[derive(Serialize)]
struct ArticleIndex {
    articles_js_url: String,
    articles: Vec<ArticleSummary>,
}

async fn list_articles(State(state): State<HttpState>) -> Json<ArticleIndex> {
    let articles_js_url = state.articles.resource_url().await;
    let articles = state
        .articles
        .articles()
        .await
        .iter()
        .map(|article| ArticleSummary::from(article.as_ref()))
        .collect();

    Json(ArticleIndex {
        articles_js_url,
        articles,
    })
}

#[derive(Serialize)]
struct ArticleDetail<'a> {
    index: usize,
    previous: Option<ArticleSummary>,
    article: ArticleSummary,
    next: Option<ArticleSummary>,
    html: &'a str,
}

async fn article_detail(
    State(state): State<HttpState>,
    Path(id): Path<ArticleId>,
) -> Result<Response, HttpError> {
    let context = state.articles.article_context(id).await;
    let Some(current) = context.current else {
        return Err(HttpError::not_found(
            "infra::http::public::article_detail",
            format!("article {id} is not in the public collection"),
        ));
    };

    let html = state.bodies.html(&current.body_id, current.format).await;
    let detail = ArticleDetail {
        index: context.index,
        previous: context.previous.as_deref().map(ArticleSummary::from),
        article: ArticleSummary::from(current.as_ref()),
        next: context.next.as_deref().map(ArticleSummary::from),
        html: &html,
    };

    Ok(Json(detail).into_response())
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}
