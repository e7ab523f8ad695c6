//! Output generation for a run: Markdown digest, JSON document, run report, index.
//!
//! # Submodules
//!
//! - [`json`]: structured digest document and run report
//! - [`markdown`]: human-readable digest
//! - [`indexes`]: the `index.md` listing every run date
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── 2025-05-06.md           # Digest
//! ├── 2025-05-06.json         # Same content, machine-readable
//! ├── 2025-05-06.report.json  # Counts and failures
//! └── index.md                # All run dates, newest first
//! ```
//!
//! Files for a date are overwritten on a re-run for that date. Given the same
//! articles and report, the bytes written are identical.

pub mod indexes;
pub mod json;
pub mod markdown;

use crate::error::{Error, Result};
use crate::models::{EnhancedArticle, RunReport};
use crate::utils::ensure_writable_dir;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Where the files of one run were written.
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenPaths {
    pub markdown: PathBuf,
    pub structured: PathBuf,
    pub report: PathBuf,
}

impl WrittenPaths {
    /// The paths a run on `run_date` writes to.
    pub fn for_date(output_dir: &Path, run_date: NaiveDate) -> Self {
        let date = run_date.format("%Y-%m-%d").to_string();
        Self {
            markdown: output_dir.join(format!("{date}.md")),
            structured: output_dir.join(format!("{date}.json")),
            report: output_dir.join(format!("{date}.report.json")),
        }
    }
}

/// Write the digest, the structured document and the run report.
///
/// The directory is created and checked for writability first. A failure on a later file
/// leaves earlier files in place.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display(), date = %report.run_date))]
pub async fn write_outputs(
    enhanced: &[EnhancedArticle],
    report: &RunReport,
    output_dir: &Path,
) -> Result<WrittenPaths> {
    ensure_writable_dir(output_dir).await?;
    let paths = WrittenPaths::for_date(output_dir, report.run_date);

    let md = markdown::render_digest(enhanced, report);
    write_file(&paths.markdown, md.as_bytes()).await?;

    let structured = json::render_digest(enhanced, report)?;
    write_file(&paths.structured, structured.as_bytes()).await?;

    let report_json = json::render_report(report)?;
    write_file(&paths.report, report_json.as_bytes()).await?;

    if let Err(e) = indexes::update_index(output_dir, report.run_date).await {
        error!(error = %e, "Failed to update digest index");
    }

    info!(
        markdown = %paths.markdown.display(),
        structured = %paths.structured.display(),
        report = %paths.report.display(),
        articles = enhanced.len(),
        "Wrote run outputs"
    );
    Ok(paths)
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    fs::write(path, contents).await.map_err(|source| {
        error!(path = %path.display(), error = %source, "Failed writing output file");
        Error::WriteFailure {
            path: path.to_path_buf(),
            source,
        }
    })?;
    info!(path = %path.display(), bytes = contents.len(), "Wrote output file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, RunOutcome, Stage, Style};
    use crate::testing::article;
    use chrono::{TimeZone, Utc};

    fn report(ts_secs: i64) -> RunReport {
        let mut r = RunReport::new(
            NaiveDate::from_ymd_opt(2025, 5, 6).unwrap(),
            Utc.timestamp_opt(ts_secs, 0).unwrap(),
            Category::Technology,
            Some("ai".into()),
            Style::Professional,
            3,
        );
        r.fetched_count = 3;
        r.enhanced_count = 2;
        r.record_failure("art-3", Stage::Enhance, "timed out");
        r.outcome = RunOutcome::PartialSuccess;
        r
    }

    fn enhanced(ts_secs: i64) -> Vec<EnhancedArticle> {
        (1..=2)
            .map(|n| EnhancedArticle {
                article: article(n),
                headline: format!("Rewritten headline {n}"),
                enhanced_body: format!("Rewritten body {n}."),
                style: Style::Professional,
                generation_timestamp: Utc.timestamp_opt(ts_secs, 0).unwrap(),
            })
            .collect()
    }

    fn without_timestamps(text: &str) -> String {
        text.lines()
            .filter(|l| {
                !l.contains("generated_at")
                    && !l.contains("generation_timestamp")
                    && !l.contains("run_timestamp")
                    && !l.starts_with("_Generated")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[tokio::test]
    async fn test_write_outputs_creates_three_dated_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("digest");
        let paths = write_outputs(&enhanced(1_700_000_000), &report(1_700_000_000), &dir)
            .await
            .unwrap();

        assert_eq!(paths.markdown, dir.join("2025-05-06.md"));
        assert_eq!(paths.structured, dir.join("2025-05-06.json"));
        assert_eq!(paths.report, dir.join("2025-05-06.report.json"));
        for p in [&paths.markdown, &paths.structured, &paths.report] {
            assert!(p.is_file(), "{} missing", p.display());
        }
        assert!(dir.join("index.md").is_file());

        let report_json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&paths.report).unwrap()).unwrap();
        assert_eq!(report_json["enhanced_count"], 2);
        assert_eq!(report_json["failures"][0]["article_id"], "art-3");
        assert_eq!(report_json["outcome"], "partial_success");
    }

    #[tokio::test]
    async fn test_rewrite_is_byte_identical() {
        let tmp = tempfile::tempdir().unwrap();
        let first = write_outputs(&enhanced(1_700_000_000), &report(1_700_000_000), tmp.path())
            .await
            .unwrap();
        let md1 = std::fs::read(&first.markdown).unwrap();
        let json1 = std::fs::read(&first.structured).unwrap();
        let report1 = std::fs::read(&first.report).unwrap();

        let second = write_outputs(&enhanced(1_700_000_000), &report(1_700_000_000), tmp.path())
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(md1, std::fs::read(&second.markdown).unwrap());
        assert_eq!(json1, std::fs::read(&second.structured).unwrap());
        assert_eq!(report1, std::fs::read(&second.report).unwrap());
    }

    #[tokio::test]
    async fn test_rewrite_differs_only_in_timestamps() {
        let tmp = tempfile::tempdir().unwrap();
        let first = write_outputs(&enhanced(1_700_000_000), &report(1_700_000_000), tmp.path())
            .await
            .unwrap();
        let md1 = std::fs::read_to_string(&first.markdown).unwrap();
        let json1 = std::fs::read_to_string(&first.structured).unwrap();

        let second = write_outputs(&enhanced(1_700_009_999), &report(1_700_009_999), tmp.path())
            .await
            .unwrap();
        let md2 = std::fs::read_to_string(&second.markdown).unwrap();
        let json2 = std::fs::read_to_string(&second.structured).unwrap();

        assert_ne!(md1, md2);
        assert_ne!(json1, json2);
        assert_eq!(without_timestamps(&md1), without_timestamps(&md2));
        assert_eq!(without_timestamps(&json1), without_timestamps(&json2));
    }

    #[tokio::test]
    async fn test_index_failure_does_not_fail_the_write() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("index.md")).unwrap();

        let paths = write_outputs(&enhanced(1_700_000_000), &report(1_700_000_000), tmp.path())
            .await
            .unwrap();

        for p in [&paths.markdown, &paths.structured, &paths.report] {
            assert!(p.is_file(), "{} missing", p.display());
        }
        assert!(tmp.path().join("index.md").is_dir());
    }

    #[tokio::test]
    async fn test_unwritable_output_dir_is_write_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "file, not dir").unwrap();
        let err = write_outputs(&enhanced(0), &report(0), &blocker.join("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::WriteFailure { .. }));
    }
}
