//! Run configuration: credentials from the environment and settings from YAML + CLI.
//!
//! Both are built once in `main` and handed to every component by reference.

use crate::api::RetryPolicy;
use crate::cli::Cli;
use crate::error::{Error, Result};
use crate::models::{Category, Style};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

pub const NEWS_API_KEY_VAR: &str = "EVENTREGISTRY_API_KEY";
pub const AI_API_KEY_VAR: &str = "GOOGLE_API_KEY";

pub const CONFIG_VAR: &str = "NEWS_DIGEST_CONFIG";
pub const CATEGORY_VAR: &str = "INPUT_CATEGORY";
pub const KEYWORD_VAR: &str = "INPUT_KEYWORD";
pub const STYLE_VAR: &str = "INPUT_STYLE";
pub const MAX_ARTICLES_VAR: &str = "MAX_ARTICLES";
pub const OUTPUT_DIR_VAR: &str = "NEWS_OUTPUT_DIR";

/// Trimmed value of `name`, or `None` when unset or blank.
fn non_blank<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// API keys for the two external services.
#[derive(Clone)]
pub struct Credentials {
    pub news_api_key: String,
    pub ai_api_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("news_api_key", &"<redacted>")
            .field("ai_api_key", &"<redacted>")
            .finish()
    }
}

/// Read both keys through `lookup` (usually `std::env::var`). Blank values
/// count as missing.
pub fn load_credentials<F>(lookup: F) -> Result<Credentials>
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &'static str| {
        non_blank(&lookup, name).ok_or(Error::MissingCredential(name))
    };
    let news_api_key = read(NEWS_API_KEY_VAR)?;
    let ai_api_key = read(AI_API_KEY_VAR)?;
    info!(
        news_key_len = news_api_key.len(),
        ai_key_len = ai_api_key.len(),
        "Loaded API credentials"
    );
    Ok(Credentials {
        news_api_key,
        ai_api_key,
    })
}

/// News service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Articles requested per page (the service allows at most 100).
    pub page_size: usize,
    /// Bodies longer than this many characters are cut before enhancement.
    pub body_char_limit: usize,
    pub retry: RetryPolicy,
}

impl Default for NewsSettings {
    fn default() -> Self {
        Self {
            base_url: "https://eventregistry.org".to_string(),
            timeout_secs: 30,
            page_size: 50,
            body_char_limit: 2_000,
            retry: RetryPolicy::default(),
        }
    }
}

/// Generative service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Overrides the built-in prompt. Placeholders: `{style}`,
    /// `{style_instruction}`, `{title}`, `{source}`, `{body}`.
    pub prompt_template: Option<String>,
    pub retry: RetryPolicy,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-1.5-flash".to_string(),
            timeout_secs: 60,
            temperature: 0.7,
            max_output_tokens: 2_048,
            prompt_template: None,
            retry: RetryPolicy::default(),
        }
    }
}

/// Optional GitHub issue publishing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishSettings {
    pub github_issue: bool,
    pub api_base: String,
    pub labels: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            github_issue: false,
            api_base: "https://api.github.com".to_string(),
            labels: vec!["news-digest".to_string(), "automated".to_string()],
            timeout_secs: 30,
        }
    }
}

/// Everything a run needs besides credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub category: Category,
    /// Optional keyword searched in article titles and bodies.
    pub keyword: Option<String>,
    pub style: Style,
    pub max_results: usize,
    pub lookback_days: i64,
    /// ISO 639-2 language code understood by the news service.
    pub language: String,
    pub output_dir: PathBuf,
    /// Enhancement calls in flight at once.
    pub concurrency: usize,
    pub news: NewsSettings,
    pub ai: AiSettings,
    pub publish: PublishSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            category: Category::Technology,
            keyword: None,
            style: Style::Professional,
            max_results: 5,
            lookback_days: 2,
            language: "eng".to_string(),
            output_dir: PathBuf::from("news"),
            concurrency: 4,
            news: NewsSettings::default(),
            ai: AiSettings::default(),
            publish: PublishSettings::default(),
        }
    }
}

impl Settings {
    /// Parse settings from YAML text. Missing keys take their defaults.
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load from `path` when given, otherwise start from defaults.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
                let settings = Self::from_yaml(&text)?;
                info!(path = %path.display(), "Loaded settings file");
                Ok(settings)
            }
            None => Ok(Self::default()),
        }
    }

    /// Settings for a run: file, then environment, then command line, validated.
    ///
    /// The file comes from `--config`, else `NEWS_DIGEST_CONFIG`. Blank
    /// environment values are ignored.
    pub fn resolve<F>(cli: &Cli, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = cli
            .config
            .clone()
            .or_else(|| non_blank(&lookup, CONFIG_VAR).map(PathBuf::from));
        let settings = Self::load(path.as_deref())?
            .apply_env(&lookup)?
            .apply_cli(cli);
        settings.validate()?;
        Ok(settings)
    }

    /// Apply the `INPUT_*`, `MAX_ARTICLES` and `NEWS_OUTPUT_DIR` overrides.
    pub fn apply_env<F>(mut self, lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = non_blank(lookup, CATEGORY_VAR) {
            self.category = <Category as ValueEnum>::from_str(&v, true)
                .map_err(|_| Error::Config(format!("{CATEGORY_VAR}: unknown category {v:?}")))?;
        }
        if let Some(v) = non_blank(lookup, KEYWORD_VAR) {
            self.keyword = Some(v);
        }
        if let Some(v) = non_blank(lookup, STYLE_VAR) {
            self.style = <Style as ValueEnum>::from_str(&v, true)
                .map_err(|_| Error::Config(format!("{STYLE_VAR}: unknown style {v:?}")))?;
        }
        if let Some(v) = non_blank(lookup, MAX_ARTICLES_VAR) {
            self.max_results = v
                .parse()
                .map_err(|e| Error::Config(format!("{MAX_ARTICLES_VAR}={v:?}: {e}")))?;
        }
        if let Some(v) = non_blank(lookup, OUTPUT_DIR_VAR) {
            self.output_dir = PathBuf::from(v);
        }
        Ok(self)
    }

    /// Apply command-line overrides.
    pub fn apply_cli(mut self, cli: &Cli) -> Self {
        if let Some(category) = cli.category {
            self.category = category;
        }
        if let Some(keyword) = &cli.keyword {
            self.keyword = Some(keyword.clone());
        }
        if let Some(style) = cli.style {
            self.style = style;
        }
        if let Some(max) = cli.max_articles {
            self.max_results = max;
        }
        if let Some(days) = cli.lookback_days {
            self.lookback_days = days;
        }
        if let Some(dir) = &cli.output_dir {
            self.output_dir = dir.clone();
        }
        if let Some(n) = cli.concurrency {
            self.concurrency = n;
        }
        if cli.github_issue {
            self.publish.github_issue = true;
        }
        self.keyword = self
            .keyword
            .take()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_results == 0 {
            return Err(Error::Config("max_results must be at least 1".into()));
        }
        if !(1..=16).contains(&self.concurrency) {
            return Err(Error::Config(format!(
                "concurrency must be between 1 and 16, got {}",
                self.concurrency
            )));
        }
        if !(1..=100).contains(&self.news.page_size) {
            return Err(Error::Config(format!(
                "news.page_size must be between 1 and 100, got {}",
                self.news.page_size
            )));
        }
        if self.lookback_days < 1 {
            return Err(Error::Config("lookback_days must be at least 1".into()));
        }
        if self.news.retry.max_attempts == 0 || self.ai.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.news.timeout_secs == 0 || self.ai.timeout_secs == 0 {
            return Err(Error::Config("timeouts must be at least one second".into()));
        }
        Ok(())
    }

    pub fn news_timeout(&self) -> Duration {
        Duration::from_secs(self.news.timeout_secs)
    }

    pub fn ai_timeout(&self) -> Duration {
        Duration::from_secs(self.ai.timeout_secs)
    }
}
