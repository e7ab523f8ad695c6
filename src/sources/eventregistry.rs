//! EventRegistry news source.
//!
//! Articles are requested from `POST {base_url}/api/v1/article/getArticles`,
//! newest first, one page at a time until enough usable articles have been
//! collected or the service runs out of pages.
//!
//! # Failure handling
//!
//! - transport errors, timeouts, 408/429 and 5xx are retried with backoff
//! - any other non-success status fails at once with `NewsServiceRejected`
//! - a 200 response carrying an `error` field is also a rejection

use super::{NewsQuery, NewsSource};
use crate::api::{
    Attempt, RetryError, RetryPolicy, build_client, describe_transport_error,
    is_retryable_status, join_path,
};
use crate::config::{Credentials, Settings};
use crate::error::{Error, Result};
use crate::models::Article;
use crate::utils::{truncate_chars, truncate_for_log};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, instrument, warn};
use url::Url;

const GET_ARTICLES_PATH: &str = "api/v1/article/getArticles";

pub struct EventRegistryClient {
    http: Client,
    endpoint: Url,
    api_key: String,
    page_size: usize,
    body_char_limit: usize,
    retry: RetryPolicy,
}

impl fmt::Debug for EventRegistryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistryClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &"<redacted>")
            .field("page_size", &self.page_size)
            .field("retry", &self.retry)
            .finish()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GetArticlesRequest<'a> {
    action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    keyword: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keyword_loc: Option<&'static str>,
    category_uri: &'static str,
    lang: &'a str,
    date_start: String,
    date_end: String,
    articles_page: usize,
    articles_count: usize,
    articles_sort_by: &'static str,
    articles_sort_by_asc: bool,
    article_body_len: i32,
    result_type: &'static str,
    data_type: [&'static str; 1],
    api_key: &'a str,
}

#[derive(Debug, Deserialize)]
struct GetArticlesResponse {
    #[serde(default)]
    articles: Option<ArticleResults>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ArticleResults {
    #[serde(default)]
    results: Vec<RawArticle>,
    #[serde(default)]
    pages: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawArticle {
    uri: Option<String>,
    title: Option<String>,
    body: Option<String>,
    url: Option<String>,
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    source: Option<RawSource>,
    #[serde(default)]
    authors: Vec<RawAuthor>,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAuthor {
    name: Option<String>,
}

impl EventRegistryClient {
    pub fn new(settings: &Settings, credentials: &Credentials) -> Result<Self> {
        let base = Url::parse(&settings.news.base_url)
            .map_err(|e| Error::Config(format!("news.base_url: {e}")))?;
        let endpoint = join_path(&base, GET_ARTICLES_PATH)
            .map_err(|e| Error::Config(format!("news endpoint: {e}")))?;
        Ok(Self {
            http: build_client(settings.news_timeout())?,
            endpoint,
            api_key: credentials.news_api_key.clone(),
            page_size: settings.news.page_size.clamp(1, 100),
            body_char_limit: settings.news.body_char_limit,
            retry: settings.news.retry.clone(),
        })
    }

    fn page_request<'a>(
        &'a self,
        query: &'a NewsQuery,
        page: usize,
        count: usize,
    ) -> GetArticlesRequest<'a> {
        let (start, end) = query.date_window();
        let keyword = query.keyword.as_deref();
        GetArticlesRequest {
            action: "getArticles",
            keyword,
            keyword_loc: keyword.map(|_| "body,title"),
            category_uri: query.category.category_uri(),
            lang: &query.language,
            date_start: start.format("%Y-%m-%d").to_string(),
            date_end: end.format("%Y-%m-%d").to_string(),
            articles_page: page,
            articles_count: count,
            articles_sort_by: "date",
            articles_sort_by_asc: false,
            article_body_len: -1,
            result_type: "articles",
            data_type: ["news"],
            api_key: &self.api_key,
        }
    }

    /// One HTTP round trip, classified for the retry loop.
    async fn request_page(
        &self,
        request: &GetArticlesRequest<'_>,
        attempt: usize,
    ) -> Attempt<ArticleResults, Error> {
        let response = match self.http.post(self.endpoint.clone()).json(request).send().await {
            Ok(r) => r,
            Err(e) => {
                return Attempt::Retryable(Error::NewsServiceUnavailable {
                    attempts: attempt,
                    last: describe_transport_error(&e),
                });
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                return Attempt::Retryable(Error::NewsServiceUnavailable {
                    attempts: attempt,
                    last: describe_transport_error(&e),
                });
            }
        };

        if !status.is_success() {
            if is_retryable_status(status) {
                return Attempt::Retryable(Error::NewsServiceUnavailable {
                    attempts: attempt,
                    last: format!("status {}: {}", status.as_u16(), truncate_for_log(&body, 300)),
                });
            }
            return Attempt::Fatal(Error::NewsServiceRejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GetArticlesResponse = match serde_json::from_str(&body) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, body = %truncate_for_log(&body, 300), "Undecodable news response");
                return Attempt::Fatal(Error::Decode(e));
            }
        };

        if let Some(err) = parsed.error {
            let message = match err {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            return Attempt::Fatal(Error::NewsServiceRejected {
                status: status.as_u16(),
                body: message,
            });
        }

        Attempt::Success(parsed.articles.unwrap_or_default())
    }

    fn to_article(&self, raw: RawArticle, query: &NewsQuery) -> Option<Article> {
        let title = raw.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())?;
        let body = raw.body.map(|b| b.trim().to_string()).filter(|b| !b.is_empty())?;
        let source = raw
            .source
            .and_then(|s| s.title)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Unknown".to_string());
        let published_at = raw
            .date_time
            .as_deref()
            .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
            .map(|d| d.with_timezone(&Utc));
        let authors = raw
            .authors
            .into_iter()
            .filter_map(|a| a.name)
            .filter(|n| !n.trim().is_empty())
            .collect();

        Some(Article {
            id: Article::derive_id(raw.uri.as_deref(), &title, &source),
            body: truncate_chars(&body, self.body_char_limit),
            title,
            source,
            url: raw.url.filter(|u| !u.is_empty()),
            published_at,
            category: query.category,
            authors,
        })
    }
}

impl NewsSource for EventRegistryClient {
    #[instrument(level = "info", skip_all, fields(category = %query.category, max = query.max_results))]
    async fn fetch_articles(&self, query: &NewsQuery) -> Result<Vec<Article>> {
        let count = self.page_size.min(query.max_results.max(1));
        let mut collected: Vec<Article> = Vec::new();
        let mut page = 1usize;

        loop {
            let request = self.page_request(query, page, count);
            let request = &request;
            let results = self
                .retry
                .run("eventregistry.getArticles", move |attempt| {
                    self.request_page(request, attempt)
                })
                .await
                .map_err(|e| match e {
                    RetryError::Fatal(e) => e,
                    RetryError::Exhausted { last, .. } => last,
                })?;

            let returned = results.results.len();
            let usable: Vec<Article> = results
                .results
                .into_iter()
                .filter_map(|raw| self.to_article(raw, query))
                .collect();
            debug!(page, returned, usable = usable.len(), pages = ?results.pages, "Fetched news page");
            collected.extend(usable);

            let unique = collected.iter().map(|a| a.id.as_str()).unique().count();
            let last_page = match results.pages {
                Some(pages) => page >= pages,
                None => returned < count,
            };
            if unique >= query.max_results || returned == 0 || last_page {
                break;
            }
            page += 1;
        }

        let articles: Vec<Article> = collected
            .into_iter()
            .unique_by(|a| a.id.clone())
            .take(query.max_results)
            .collect();
        info!(count = articles.len(), pages = page, "Fetched articles");
        Ok(articles)
    }
}
