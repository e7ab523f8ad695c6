//! # News Digest
//!
//! A scheduled news bot: fetches recent articles for a category from
//! EventRegistry, rewrites each one in a chosen style with Google Gemini, and
//! writes a dated Markdown digest, a structured JSON document and a run report.
//!
//! ## Usage
//!
//! ```sh
//! EVENTREGISTRY_API_KEY=... GOOGLE_API_KEY=... \
//!     news_digest --category technology --style casual -o ./news
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Credentials**: Read API keys from the environment
//! 2. **Fetching**: Query EventRegistry for the category and date window
//! 3. **Enhancing**: Rewrite articles through Gemini (bounded concurrency)
//! 4. **Output**: Write the digest, JSON document, run report and index
//! 5. **Publishing** (optional): Open a GitHub issue previewing the digest
//!
//! ## Exit Status
//!
//! `0` every article was rewritten, `1` some were, `2` none were or the run failed.

use chrono::{Local, Utc};
use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod enhancer;
mod error;
mod models;
mod orchestrator;
mod outputs;
mod publish;
mod sources;
mod utils;

#[cfg(test)]
mod testing;

use cli::Cli;
use config::Settings;
use enhancer::gemini::GeminiClient;
use models::RunOutcome;
use orchestrator::{RunClock, run};
use sources::eventregistry::EventRegistryClient;

#[tokio::main]
async fn main() -> ExitCode {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "news_digest starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // ---- Settings ----
    let settings = match Settings::resolve(&args, |key| std::env::var(key).ok()) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::from(RunOutcome::TotalFailure.exit_code());
        }
    };
    info!(
        category = %settings.category,
        keyword = ?settings.keyword,
        style = %settings.style,
        max_results = settings.max_results,
        output_dir = %settings.output_dir.display(),
        "Settings loaded"
    );

    // ---- Run ----
    let clock = RunClock {
        today: Local::now().date_naive(),
        now: Utc::now(),
    };
    let summary = run(
        &settings,
        |key| std::env::var(key).ok(),
        |creds| {
            Ok((
                EventRegistryClient::new(&settings, creds)?,
                GeminiClient::new(&settings, creds)?,
            ))
        },
        clock,
    )
    .await;

    // ---- Optional issue ----
    if let Some(report) = &summary.report {
        if summary.paths.is_some() {
            if let Err(e) = publish::publish_issue(
                &settings.publish,
                &summary.enhanced,
                report,
                |key| std::env::var(key).ok(),
            )
            .await
            {
                warn!(error = %e, "Publishing the digest issue failed; continuing");
            }
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        state = ?summary.state,
        terminal = summary.state.is_terminal(),
        outcome = ?summary.outcome,
        exit_code = summary.exit_code(),
        error = ?summary.error,
        "Execution complete"
    );
    ExitCode::from(summary.exit_code())
}
