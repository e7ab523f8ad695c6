//! Command-line interface definitions for the news digest.
//!
//! Every flag is optional: unset flags fall back to the settings file, and the
//! settings file falls back to built-in defaults. Environment overrides
//! (`INPUT_CATEGORY`, `INPUT_STYLE`, ...) are applied in
//! [`Settings::resolve`](crate::config::Settings::resolve), between the two.

use crate::models::{Category, Style};
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the news digest.
///
/// # Examples
///
/// ```sh
/// # Use a settings file
/// news_digest --config digest.yaml
///
/// # Override the topic for a manual run
/// news_digest --category business --keyword "interest rates" --style casual
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to a YAML settings file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// News category to fetch
    #[arg(long, value_enum)]
    pub category: Option<Category>,

    /// Keyword searched in article titles and bodies
    #[arg(short, long)]
    pub keyword: Option<String>,

    /// Writing style for the rewritten articles
    #[arg(short, long, value_enum)]
    pub style: Option<Style>,

    /// Maximum number of articles to fetch
    #[arg(short = 'n', long)]
    pub max_articles: Option<usize>,

    /// How many days back to search
    #[arg(long)]
    pub lookback_days: Option<i64>,

    /// Directory the digest files are written to
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Enhancement requests in flight at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Open a GitHub issue previewing the digest (needs GITHUB_TOKEN and GITHUB_REPOSITORY)
    #[arg(long)]
    pub github_issue: bool,
}
