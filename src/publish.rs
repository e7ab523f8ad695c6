//! Optional GitHub issue announcing a finished run.
//!
//! When enabled, a run that enhanced at least one article opens an issue in
//! `GITHUB_REPOSITORY` listing each headline with a short preview of its body.
//! Publishing is best effort: the caller logs failures and the exit status of
//! the run is not affected.
//!
//! # Environment
//!
//! | Variable | Use |
//! |----------|-----|
//! | `GITHUB_TOKEN` | Bearer token for the REST API |
//! | `GITHUB_REPOSITORY` | `owner/name` the issue is opened in |
//! | `GITHUB_RUN_NUMBER` | Shown in the title; `local` when unset |

use crate::api::{build_client, describe_transport_error, join_path};
use crate::config::PublishSettings;
use crate::error::{Error, Result};
use crate::models::{EnhancedArticle, RunReport};
use crate::utils::{truncate_chars, truncate_for_log, upcase};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::time::Duration;
use tracing::{info, instrument, warn};
use url::Url;

pub const TOKEN_VAR: &str = "GITHUB_TOKEN";
pub const REPOSITORY_VAR: &str = "GITHUB_REPOSITORY";
pub const RUN_NUMBER_VAR: &str = "GITHUB_RUN_NUMBER";

const PREVIEW_LINES: usize = 5;
const PREVIEW_CHARS: usize = 400;

/// What happened when publishing was attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Created { number: u64, url: String },
    Skipped(&'static str),
}

#[derive(Debug, Serialize)]
struct CreateIssue<'a> {
    title: String,
    body: String,
    labels: &'a [String],
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    number: u64,
    html_url: String,
}

/// Open an issue for the run if enabled and configured.
///
/// `lookup` reads the GitHub variables; pass `|k| std::env::var(k).ok()` in
/// production.
#[instrument(level = "info", skip_all, fields(date = %report.run_date, enabled = settings.github_issue))]
pub async fn publish_issue<F>(
    settings: &PublishSettings,
    enhanced: &[EnhancedArticle],
    report: &RunReport,
    lookup: F,
) -> Result<PublishOutcome>
where
    F: Fn(&str) -> Option<String>,
{
    if !settings.github_issue {
        return Ok(PublishOutcome::Skipped("disabled"));
    }
    if enhanced.is_empty() {
        info!("No enhanced articles; not opening an issue");
        return Ok(PublishOutcome::Skipped("no articles"));
    }
    let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let (Some(token), Some(repository)) = (read(TOKEN_VAR), read(REPOSITORY_VAR)) else {
        warn!("GITHUB_TOKEN or GITHUB_REPOSITORY not set; not opening an issue");
        return Ok(PublishOutcome::Skipped("github environment not set"));
    };
    let run_number = read(RUN_NUMBER_VAR).unwrap_or_else(|| "local".to_string());

    let base = Url::parse(&settings.api_base)
        .map_err(|e| Error::Config(format!("publish.api_base: {e}")))?;
    let endpoint = join_path(&base, &format!("repos/{repository}/issues"))
        .map_err(|e| Error::Config(format!("issue endpoint: {e}")))?;

    let request = CreateIssue {
        title: issue_title(report, &run_number),
        body: issue_body(enhanced, report),
        labels: &settings.labels,
    };

    let http = build_client(Duration::from_secs(settings.timeout_secs))?;
    let response = http
        .post(endpoint)
        .bearer_auth(&token)
        .header(reqwest::header::ACCEPT, "application/vnd.github+json")
        .json(&request)
        .send()
        .await
        .map_err(|e| Error::Publish(describe_transport_error(&e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), body = %truncate_for_log(&body, 300), "GitHub rejected the issue");
        return Err(Error::Publish(format!("status {}", status.as_u16())));
    }

    let created: CreatedIssue = response.json().await?;
    info!(number = created.number, url = %created.html_url, "Opened digest issue");
    Ok(PublishOutcome::Created {
        number: created.number,
        url: created.html_url,
    })
}

fn issue_title(report: &RunReport, run_number: &str) -> String {
    format!(
        "News digest: {} {} (run {})",
        report.category, report.run_date, run_number
    )
}

fn issue_body(enhanced: &[EnhancedArticle], report: &RunReport) -> String {
    let mut body = String::new();
    writeln!(
        body,
        "**{}** digest for {} in a {} style.\n",
        upcase(report.category.as_str()),
        report.run_date,
        report.style
    )
    .unwrap();
    writeln!(
        body,
        "Fetched {} of {} requested; {} rewritten, {} failed.\n",
        report.fetched_count,
        report.requested_count,
        report.enhanced_count,
        report.failures.len()
    )
    .unwrap();

    for item in enhanced {
        writeln!(body, "### {}\n", item.headline).unwrap();
        writeln!(body, "_{}_\n", item.article.source).unwrap();
        writeln!(body, "{}\n", preview(&item.enhanced_body)).unwrap();
    }
    body
}

/// First non-empty lines of a body, capped in length.
fn preview(text: &str) -> String {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(PREVIEW_LINES)
        .collect();
    let joined = lines.join("\n");
    if joined.chars().count() > PREVIEW_CHARS {
        format!("{}…", truncate_chars(&joined, PREVIEW_CHARS))
    } else {
        joined
    }
}
