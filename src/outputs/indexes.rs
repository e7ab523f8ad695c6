//! The `index.md` file linking every run date's digest.
//!
//! ```text
//! # News Digest Index
//!
//! - [2025-05-07](./2025-05-07.md)
//! - [2025-05-06](./2025-05-06.md)
//! ```
//!
//! Entries are kept newest first with one line per date, so re-running a date
//! leaves the index unchanged. Lines that are not entries are dropped on
//! rewrite.

use crate::error::{Error, Result};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

const INDEX_FILE: &str = "index.md";
const INDEX_HEADER: &str = "# News Digest Index";

/// Add `run_date` to `{output_dir}/index.md`, creating the file if needed.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display(), date = %run_date))]
pub async fn update_index(output_dir: &Path, run_date: NaiveDate) -> Result<()> {
    let index_path = output_dir.join(INDEX_FILE);
    let existing = match fs::read_to_string(&index_path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(source) => {
            return Err(Error::WriteFailure {
                path: index_path,
                source,
            });
        }
    };

    let mut dates: BTreeSet<NaiveDate> = existing.lines().filter_map(parse_entry).collect();
    let added = dates.insert(run_date);

    let content = render_index(&dates);
    fs::write(&index_path, content)
        .await
        .map_err(|source| Error::WriteFailure {
            path: index_path.clone(),
            source,
        })?;
    info!(path = %index_path.display(), entries = dates.len(), added, "Updated digest index");
    Ok(())
}

fn render_index(dates: &BTreeSet<NaiveDate>) -> String {
    let mut out = format!("{INDEX_HEADER}\n\n");
    for date in dates.iter().rev() {
        out.push_str(&format!("- [{date}](./{date}.md)\n"));
    }
    out
}

/// Date of an index line such as `- [2025-05-06](./2025-05-06.md)`.
fn parse_entry(line: &str) -> Option<NaiveDate> {
    let rest = line.trim().strip_prefix("- [")?;
    let (date, _) = rest.split_once(']')?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}
