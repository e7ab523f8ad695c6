//! JSON serialization of the digest and the run report.
//!
//! # Documents
//!
//! - `{date}.json`: [`DigestDocument`], the run parameters plus every
//!   enhanced article in digest order
//! - `{date}.report.json`: the [`RunReport`] as is
//!
//! Both are pretty-printed with a trailing newline.

use crate::error::Result;
use crate::models::{Category, EnhancedArticle, RunReport, Style};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// Structured form of the Markdown digest.
#[derive(Debug, Serialize)]
pub struct DigestDocument<'a> {
    pub run_date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub category: Category,
    pub keyword: Option<&'a str>,
    pub style: Style,
    pub article_count: usize,
    pub articles: &'a [EnhancedArticle],
}

impl<'a> DigestDocument<'a> {
    pub fn new(enhanced: &'a [EnhancedArticle], report: &'a RunReport) -> Self {
        Self {
            run_date: report.run_date,
            generated_at: report.run_timestamp,
            category: report.category,
            keyword: report.keyword.as_deref(),
            style: report.style,
            article_count: enhanced.len(),
            articles: enhanced,
        }
    }
}

pub fn render_digest(enhanced: &[EnhancedArticle], report: &RunReport) -> Result<String> {
    let mut json = serde_json::to_string_pretty(&DigestDocument::new(enhanced, report))?;
    json.push('\n');
    Ok(json)
}

pub fn render_report(report: &RunReport) -> Result<String> {
    let mut json = serde_json::to_string_pretty(report)?;
    json.push('\n');
    Ok(json)
}
