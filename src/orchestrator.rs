//! Drives one run: credentials, fetch, enhance, write.
//!
//! # State Machine
//!
//! ```text
//! Idle → LoadingCredentials → Fetching → Enhancing → Writing → Done
//!               │                 │                      │
//!               ▼                 └──────(fetch failed)──┤
//!             Failed ◄───────────────────────────────────┘ (write failed)
//! ```
//!
//! A failed fetch still writes a report (with `fetch_error` set) and ends in
//! `Done` with a total-failure outcome. Enhancement runs with bounded
//! concurrency and all results are collected before `Writing`; they are folded
//! into the report on this task, so the report has one writer.

use crate::config::{Credentials, Settings, load_credentials};
use crate::enhancer::{ContentEnhancer, TextGenerator};
use crate::error::{Error, Result};
use crate::models::{Article, EnhancedArticle, RunOutcome, RunReport, Stage};
use crate::outputs::{WrittenPaths, write_outputs};
use crate::sources::{NewsQuery, NewsSource};
use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    LoadingCredentials,
    Fetching,
    Enhancing,
    Writing,
    Done,
    Failed,
}

impl RunState {
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, LoadingCredentials)
                | (LoadingCredentials, Fetching)
                | (LoadingCredentials, Failed)
                | (Fetching, Enhancing)
                | (Fetching, Writing)
                | (Enhancing, Writing)
                | (Writing, Done)
                | (Writing, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

/// Current state of a run, advanced only along valid transitions.
#[derive(Debug)]
pub struct RunMachine {
    state: RunState,
}

impl Default for RunMachine {
    fn default() -> Self {
        Self {
            state: RunState::Idle,
        }
    }
}

impl RunMachine {
    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn advance(&mut self, next: RunState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(from = ?self.state, to = ?next, "Run state transition");
        self.state = next;
        Ok(())
    }
}

/// Wall-clock values a run is stamped with.
#[derive(Debug, Clone, Copy)]
pub struct RunClock {
    /// Names the output files and ends the search window.
    pub today: NaiveDate,
    pub now: DateTime<Utc>,
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub state: RunState,
    pub outcome: RunOutcome,
    /// Absent when the run failed before fetching.
    pub report: Option<RunReport>,
    pub enhanced: Vec<EnhancedArticle>,
    pub paths: Option<WrittenPaths>,
    /// The error that moved the run to `Failed`.
    pub error: Option<Error>,
}

impl RunSummary {
    pub fn exit_code(&self) -> u8 {
        self.outcome.exit_code()
    }

    fn failed(state: RunState, report: Option<RunReport>, error: Error) -> Self {
        Self {
            state,
            outcome: RunOutcome::TotalFailure,
            report,
            enhanced: Vec::new(),
            paths: None,
            error: Some(error),
        }
    }
}

/// Execute one run.
///
/// `env` supplies the API keys. `connect` builds the news source and the text
/// generator once credentials are known.
#[instrument(level = "info", skip_all, fields(category = %settings.category, style = %settings.style, date = %clock.today))]
pub async fn run<E, C, N, G>(settings: &Settings, env: E, connect: C, clock: RunClock) -> RunSummary
where
    E: Fn(&str) -> Option<String>,
    C: FnOnce(&Credentials) -> Result<(N, G)>,
    N: NewsSource,
    G: TextGenerator,
{
    match run_inner(settings, env, connect, clock).await {
        Ok(summary) => summary,
        Err(e) => {
            error!(error = %e, "Run aborted on an invalid state transition");
            RunSummary::failed(RunState::Failed, None, e)
        }
    }
}

async fn run_inner<E, C, N, G>(
    settings: &Settings,
    env: E,
    connect: C,
    clock: RunClock,
) -> Result<RunSummary>
where
    E: Fn(&str) -> Option<String>,
    C: FnOnce(&Credentials) -> Result<(N, G)>,
    N: NewsSource,
    G: TextGenerator,
{
    let start_time = Instant::now();
    let mut machine = RunMachine::default();

    // ---- Credentials ----
    machine.advance(RunState::LoadingCredentials)?;
    let connected = load_credentials(env).and_then(|creds| connect(&creds));
    let (source, generator) = match connected {
        Ok(pair) => pair,
        Err(e) => {
            error!(error = %e, "Cannot start run");
            machine.advance(RunState::Failed)?;
            return Ok(RunSummary::failed(machine.state(), None, e));
        }
    };

    // ---- Fetch ----
    machine.advance(RunState::Fetching)?;
    let mut report = RunReport::new(
        clock.today,
        clock.now,
        settings.category,
        settings.keyword.clone(),
        settings.style,
        settings.max_results,
    );
    let query = NewsQuery::from_settings(settings, clock.today);
    let articles = match source.fetch_articles(&query).await {
        Ok(articles) => articles,
        Err(e) => {
            error!(error = %e, "Fetching articles failed");
            report.fetch_error = Some(e.to_string());
            Vec::new()
        }
    };
    report.fetched_count = articles.len();
    info!(fetched = articles.len(), requested = settings.max_results, "Fetch stage complete");

    // ---- Enhance ----
    let enhanced = if articles.is_empty() {
        if report.fetch_error.is_none() {
            warn!("No articles matched the query");
        }
        Vec::new()
    } else {
        machine.advance(RunState::Enhancing)?;
        let enhancer = ContentEnhancer::new(generator, settings);
        enhance_all(&enhancer, &articles, settings, &mut report).await
    };
    report.enhanced_count = enhanced.len();
    report.outcome = report.compute_outcome();

    let fetched_ids: Vec<&str> = articles.iter().map(|a| a.id.as_str()).collect();
    debug_assert!(report.is_consistent(&fetched_ids));

    // ---- Write ----
    machine.advance(RunState::Writing)?;
    match write_outputs(&enhanced, &report, &settings.output_dir).await {
        Ok(paths) => {
            machine.advance(RunState::Done)?;
            let elapsed = start_time.elapsed();
            info!(
                ?elapsed,
                enhanced = report.enhanced_count,
                failed = report.failures.len(),
                outcome = ?report.outcome,
                "Run complete"
            );
            Ok(RunSummary {
                state: machine.state(),
                outcome: report.outcome,
                report: Some(report),
                enhanced,
                paths: Some(paths),
                error: None,
            })
        }
        Err(e) => {
            error!(error = %e, "Writing outputs failed");
            machine.advance(RunState::Failed)?;
            report.outcome = RunOutcome::TotalFailure;
            Ok(RunSummary::failed(machine.state(), Some(report), e))
        }
    }
}

/// Enhance every article, at most `settings.concurrency` at a time.
///
/// Returns successes in fetch order and records each failure in `report`.
async fn enhance_all<G: TextGenerator>(
    enhancer: &ContentEnhancer<G>,
    articles: &[Article],
    settings: &Settings,
    report: &mut RunReport,
) -> Vec<EnhancedArticle> {
    let style = settings.style;
    info!(
        total = articles.len(),
        concurrency = settings.concurrency,
        "Starting article enhancement"
    );

    let mut results: Vec<(usize, _)> = stream::iter(articles.iter().enumerate())
        .map(|(i, article)| async move {
            debug!(index = i, article_id = %article.id, "Enhancing article");
            (i, enhancer.enhance(article, style).await)
        })
        .buffer_unordered(settings.concurrency)
        .collect()
        .await;
    results.sort_by_key(|(i, _)| *i);

    let mut enhanced = Vec::with_capacity(results.len());
    for (i, result) in results {
        let article = &articles[i];
        match result {
            Ok(item) => {
                info!(index = i, article_id = %item.id(), headline = %item.headline, "Enhanced article");
                enhanced.push(item);
            }
            Err(failure) => {
                warn!(index = i, article_id = %article.id, error = %failure, "Enhancement failed; skipping article");
                report.record_failure(&article.id, Stage::Enhance, failure.to_string());
            }
        }
    }

    info!(
        total = articles.len(),
        successful = enhanced.len(),
        failed = articles.len() - enhanced.len(),
        "Completed article enhancement"
    );
    enhanced
}
