//! Data models for fetched articles, their rewritten versions, and the run report.
//!
//! - [`Article`]: a news item as returned by the news service
//! - [`EnhancedArticle`]: an article after the generative service rewrote it
//! - [`RunReport`]: counts and per-article failures for one run
//!
//! Everything here lives for a single invocation; the only persistence is the
//! files written by [`crate::outputs`].

use chrono::{DateTime, NaiveDate, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// News category filter, mapped onto EventRegistry category URIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Politics,
    Business,
    Technology,
    Sports,
    Health,
    Science,
}

impl Category {
    /// The EventRegistry category URI for this filter.
    pub fn category_uri(&self) -> &'static str {
        match self {
            Category::Politics => "dmoz/Society/Politics",
            Category::Business => "dmoz/Business",
            Category::Technology => "dmoz/Computers",
            Category::Sports => "dmoz/Sports",
            Category::Health => "dmoz/Health",
            Category::Science => "dmoz/Science",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Politics => "politics",
            Category::Business => "business",
            Category::Technology => "technology",
            Category::Sports => "sports",
            Category::Health => "health",
            Category::Science => "science",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Writing tone applied uniformly to every article in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    Professional,
    Casual,
    Academic,
}

impl Style {
    /// The instruction line embedded in the prompt.
    pub fn instruction(&self) -> &'static str {
        match self {
            Style::Professional => {
                "Write in a professional, journalistic tone suitable for business readers."
            }
            Style::Casual => "Write in a conversational, engaging tone for general audiences.",
            Style::Academic => "Write in a formal, analytical tone with deeper insights.",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Style::Professional => "professional",
            Style::Casual => "casual",
            Style::Academic => "academic",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw news article as returned by the news service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Upstream URI, or a content hash when the service did not provide one.
    pub id: String,
    pub title: String,
    pub body: String,
    /// Publisher name (e.g. "Reuters").
    pub source: String,
    pub url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub category: Category,
    pub authors: Vec<String>,
}

impl Article {
    /// Identity for an article: the upstream id if present and non-blank,
    /// otherwise the first 16 hex chars of SHA-256 over title and source.
    pub fn derive_id(upstream: Option<&str>, title: &str, source: &str) -> String {
        match upstream.map(str::trim).filter(|s| !s.is_empty()) {
            Some(id) => id.to_string(),
            None => {
                let mut hasher = Sha256::new();
                hasher.update(title.as_bytes());
                hasher.update(b"\n");
                hasher.update(source.as_bytes());
                let digest = hex::encode(hasher.finalize());
                digest[..16].to_string()
            }
        }
    }
}

/// An article rewritten by the generative service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedArticle {
    pub article: Article,
    /// Headline pulled out of the generated text.
    pub headline: String,
    pub enhanced_body: String,
    pub style: Style,
    pub generation_timestamp: DateTime<Utc>,
}

impl EnhancedArticle {
    pub fn id(&self) -> &str {
        &self.article.id
    }
}

/// Pipeline stage a per-article failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Enhance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub article_id: String,
    pub stage: Stage,
    pub reason: String,
}

/// Overall result of a run, mapped onto the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    PartialSuccess,
    TotalFailure,
}

impl RunOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Success => 0,
            RunOutcome::PartialSuccess => 1,
            RunOutcome::TotalFailure => 2,
        }
    }
}

/// Per-run summary written next to the digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_date: NaiveDate,
    pub run_timestamp: DateTime<Utc>,
    pub category: Category,
    pub keyword: Option<String>,
    pub style: Style,
    pub requested_count: usize,
    pub fetched_count: usize,
    pub enhanced_count: usize,
    pub failures: Vec<FailureEntry>,
    /// Set when the fetch stage failed and nothing could be processed.
    pub fetch_error: Option<String>,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn new(
        run_date: NaiveDate,
        run_timestamp: DateTime<Utc>,
        category: Category,
        keyword: Option<String>,
        style: Style,
        requested_count: usize,
    ) -> Self {
        Self {
            run_date,
            run_timestamp,
            category,
            keyword,
            style,
            requested_count,
            fetched_count: 0,
            enhanced_count: 0,
            failures: Vec::new(),
            fetch_error: None,
            outcome: RunOutcome::TotalFailure,
        }
    }

    pub fn record_failure(&mut self, article_id: &str, stage: Stage, reason: impl Into<String>) {
        self.failures.push(FailureEntry {
            article_id: article_id.to_string(),
            stage,
            reason: reason.into(),
        });
    }

    /// Outcome implied by the current counts.
    pub fn compute_outcome(&self) -> RunOutcome {
        if self.fetch_error.is_some() || self.enhanced_count == 0 {
            RunOutcome::TotalFailure
        } else if self.failures.is_empty() {
            RunOutcome::Success
        } else {
            RunOutcome::PartialSuccess
        }
    }

    /// Check the count and traceability invariants against the fetched ids.
    pub fn is_consistent(&self, fetched_ids: &[&str]) -> bool {
        let enhance_failures = self
            .failures
            .iter()
            .filter(|f| f.stage == Stage::Enhance)
            .count();
        self.enhanced_count <= self.fetched_count
            && self.fetched_count <= self.requested_count
            && self.fetched_count == fetched_ids.len()
            && self.enhanced_count + enhance_failures == self.fetched_count
            && self
                .failures
                .iter()
                .all(|f| fetched_ids.contains(&f.article_id.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> RunReport {
        RunReport::new(
            NaiveDate::from_ymd_opt(2025, 5, 6).unwrap(),
            Utc::now(),
            Category::Technology,
            None,
            Style::Professional,
            5,
        )
    }

    #[test]
    fn test_derive_id_prefers_upstream() {
        assert_eq!(Article::derive_id(Some("8123456"), "T", "S"), "8123456");
    }

    #[test]
    fn test_derive_id_hash_is_stable_and_short() {
        let a = Article::derive_id(None, "Title", "Source");
        let b = Article::derive_id(Some("  "), "Title", "Source");
        let c = Article::derive_id(None, "Title", "Other");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_category_serde_and_uri() {
        let c: Category = serde_json::from_str("\"politics\"").unwrap();
        assert_eq!(c, Category::Politics);
        assert_eq!(c.category_uri(), "dmoz/Society/Politics");
        assert_eq!(serde_json::to_string(&Category::Technology).unwrap(), "\"technology\"");
        assert!(serde_json::from_str::<Category>("\"weather\"").is_err());
    }

    #[test]
    fn test_style_instruction() {
        assert!(Style::Academic.instruction().contains("analytical"));
        assert_eq!(Style::Casual.to_string(), "casual");
    }

    #[test]
    fn test_outcome_rules() {
        let mut r = report();
        assert_eq!(r.compute_outcome(), RunOutcome::TotalFailure);

        r.fetched_count = 2;
        r.enhanced_count = 2;
        assert_eq!(r.compute_outcome(), RunOutcome::Success);

        r.enhanced_count = 1;
        r.record_failure("b", Stage::Enhance, "timeout");
        assert_eq!(r.compute_outcome(), RunOutcome::PartialSuccess);

        r.fetch_error = Some("boom".into());
        assert_eq!(r.compute_outcome(), RunOutcome::TotalFailure);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunOutcome::Success.exit_code(), 0);
        assert_eq!(RunOutcome::PartialSuccess.exit_code(), 1);
        assert_eq!(RunOutcome::TotalFailure.exit_code(), 2);
    }

    #[test]
    fn test_consistency_check() {
        let mut r = report();
        r.fetched_count = 2;
        r.enhanced_count = 1;
        r.record_failure("b", Stage::Enhance, "timeout");
        assert!(r.is_consistent(&["a", "b"]));
        assert!(!r.is_consistent(&["a", "c"]));

        r.enhanced_count = 2;
        assert!(!r.is_consistent(&["a", "b"]));
    }

    #[test]
    fn test_report_serialization_uses_snake_case_outcome() {
        let mut r = report();
        r.outcome = RunOutcome::PartialSuccess;
        r.record_failure("x", Stage::Enhance, "filtered");
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("\"partial_success\""));
        assert!(json.contains("\"stage\":\"enhance\""));
        assert!(json.contains("\"run_date\":\"2025-05-06\""));
    }
}
