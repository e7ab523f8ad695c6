//! Rewrites fetched articles through a generative text service.
//!
//! The [`ContentEnhancer`] owns the prompt, the per-call timeout and the retry
//! policy; the [`TextGenerator`] behind it only knows how to turn one prompt
//! into text. Failures come back as [`EnhanceFailure`] so the orchestrator can
//! record them without aborting the run.

pub mod gemini;

use crate::api::{Attempt, RetryError, RetryPolicy};
use crate::config::Settings;
use crate::error::EnhanceFailure;
use crate::models::{Article, EnhancedArticle, Style};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, instrument};

pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
Rewrite this news article in a {style} style. Make it engaging and well-structured.

Original Article:
Title: {title}
Source: {source}
Content: {body}

Instructions:
- {style_instruction}
- Put an engaging headline on the first line
- Structure with clear paragraphs
- Add insights or analysis where appropriate
- Keep it between 300-800 words
- Include relevant context
- End with a brief conclusion

Format the response as a complete article ready for publication.
";

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{(style_instruction|style|title|source|body)\}").expect("placeholder regex")
});

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z]*[ \t]*\r?\n(.*?)\r?\n?```\s*$").expect("code fence regex")
});

static HEADLINE_MARKUP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(#{1,6}\s*)?(headline\s*:\s*)?").expect("headline regex")
});

/// Turns a prompt into generated text.
pub trait TextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, EnhanceFailure>;
}

impl<T: TextGenerator + ?Sized> TextGenerator for &T {
    async fn generate(&self, prompt: &str) -> Result<String, EnhanceFailure> {
        (**self).generate(prompt).await
    }
}

pub struct ContentEnhancer<G> {
    generator: G,
    template: String,
    call_timeout: Duration,
    retry: RetryPolicy,
}

impl<G: TextGenerator> ContentEnhancer<G> {
    pub fn new(generator: G, settings: &Settings) -> Self {
        Self {
            generator,
            template: settings
                .ai
                .prompt_template
                .clone()
                .unwrap_or_else(|| DEFAULT_PROMPT_TEMPLATE.to_string()),
            call_timeout: settings.ai_timeout(),
            retry: settings.ai.retry.clone(),
        }
    }

    /// Fill the prompt template for one article.
    ///
    /// Placeholders are substituted in a single pass, so braces inside the
    /// article text are left alone.
    pub fn build_prompt(&self, article: &Article, style: Style) -> String {
        PLACEHOLDER
            .replace_all(&self.template, |caps: &Captures| match &caps[1] {
                "style" => style.as_str().to_string(),
                "style_instruction" => style.instruction().to_string(),
                "title" => article.title.clone(),
                "source" => article.source.clone(),
                _ => article.body.clone(),
            })
            .into_owned()
    }

    /// Rewrite one article in `style`.
    ///
    /// Each generator call is bounded by the configured timeout; timeouts and
    /// other transient failures are retried per the retry policy.
    #[instrument(level = "info", skip_all, fields(article_id = %article.id, %style))]
    pub async fn enhance(
        &self,
        article: &Article,
        style: Style,
    ) -> Result<EnhancedArticle, EnhanceFailure> {
        let prompt = self.build_prompt(article, style);
        let prompt = prompt.as_str();
        let generator = &self.generator;
        let call_timeout = self.call_timeout;

        let text = self
            .retry
            .run("generate", move |_| async move {
                match timeout(call_timeout, generator.generate(prompt)).await {
                    Err(_) => Attempt::Retryable(EnhanceFailure::Retryable(format!(
                        "timed out after {}s",
                        call_timeout.as_secs()
                    ))),
                    Ok(Ok(text)) => Attempt::Success(text),
                    Ok(Err(e)) if e.is_retryable() => Attempt::Retryable(e),
                    Ok(Err(e)) => Attempt::Fatal(e),
                }
            })
            .await
            .map_err(|e| match e {
                RetryError::Fatal(e) => e,
                RetryError::Exhausted { attempts, last } => EnhanceFailure::Exhausted {
                    attempts,
                    last: last.to_string(),
                },
            })?;

        let cleaned = strip_code_fences(&text);
        if cleaned.trim().is_empty() {
            return Err(EnhanceFailure::EmptyGeneration);
        }
        let (headline, body) = split_headline(&cleaned);
        debug!(bytes = body.len(), headline = ?headline, "Generated article");

        Ok(EnhancedArticle {
            article: article.clone(),
            headline: headline.unwrap_or_else(|| article.title.clone()),
            enhanced_body: body,
            style,
            generation_timestamp: Utc::now(),
        })
    }
}

/// Remove a Markdown code fence wrapping the whole response.
pub fn strip_code_fences(text: &str) -> String {
    match CODE_FENCE.captures(text) {
        Some(caps) => caps[1].trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// Pull a headline off the first non-empty line of generated text.
///
/// The line qualifies when, after heading markers, a `Headline:` prefix and
/// emphasis are stripped, it is longer than 10 characters. The remainder of
/// the text becomes the body; if nothing remains, the full text is kept.
pub fn split_headline(text: &str) -> (Option<String>, String) {
    let trimmed = text.trim();
    let (first, rest) = match trimmed.split_once('\n') {
        Some((first, rest)) => (first, rest),
        None => (trimmed, ""),
    };
    let unemphasized = first.trim().replace("**", "").replace("__", "").replace('*', "");
    let candidate = HEADLINE_MARKUP
        .replace(unemphasized.trim(), "")
        .trim()
        .to_string();

    if candidate.chars().count() > 10 {
        let rest = rest.trim();
        if rest.is_empty() {
            (Some(candidate), trimmed.to_string())
        } else {
            (Some(candidate), rest.to_string())
        }
    } else {
        (None, trimmed.to_string())
    }
}
