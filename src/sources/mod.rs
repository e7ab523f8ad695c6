//! News sources the digest can pull articles from.
//!
//! A source turns a [`NewsQuery`] into a list of [`Article`]s. Only EventRegistry
//! is implemented; the trait exists so the orchestrator can be driven by a fake
//! source in tests.
//!
//! | Source | Module | Method |
//! |--------|--------|--------|
//! | EventRegistry | [`eventregistry`] | `article/getArticles` JSON API |

pub mod eventregistry;

use crate::config::Settings;
use crate::error::Result;
use crate::models::{Article, Category};
use chrono::{Duration, NaiveDate};

/// What to ask the news service for.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsQuery {
    pub category: Category,
    pub keyword: Option<String>,
    pub max_results: usize,
    pub lookback: Duration,
    pub language: String,
    /// End of the date window (inclusive).
    pub today: NaiveDate,
}

impl NewsQuery {
    pub fn from_settings(settings: &Settings, today: NaiveDate) -> Self {
        Self {
            category: settings.category,
            keyword: settings.keyword.clone(),
            max_results: settings.max_results,
            lookback: Duration::days(settings.lookback_days),
            language: settings.language.clone(),
            today,
        }
    }

    /// Inclusive `(start, end)` dates of the search window.
    pub fn date_window(&self) -> (NaiveDate, NaiveDate) {
        (self.today - self.lookback, self.today)
    }
}

/// Anything that can answer a [`NewsQuery`].
///
/// An empty result is a valid answer, not an error.
pub trait NewsSource {
    async fn fetch_articles(&self, query: &NewsQuery) -> Result<Vec<Article>>;
}

impl<T: NewsSource + ?Sized> NewsSource for &T {
    async fn fetch_articles(&self, query: &NewsQuery) -> Result<Vec<Article>> {
        (**self).fetch_articles(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_window() {
        let mut settings = Settings::default();
        settings.lookback_days = 7;
        let q = NewsQuery::from_settings(&settings, NaiveDate::from_ymd_opt(2025, 5, 6).unwrap());
        let (start, end) = q.date_window();
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 4, 29).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 5, 6).unwrap());
    }
}
