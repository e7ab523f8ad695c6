//! Fakes for the external services, shared by unit tests.

use crate::enhancer::TextGenerator;
use crate::error::{EnhanceFailure, Result};
use crate::models::{Article, Category};
use crate::sources::{NewsQuery, NewsSource};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub fn article(n: usize) -> Article {
    Article {
        id: format!("art-{n}"),
        title: format!("Story number {n}"),
        body: format!("Body of story {n}."),
        source: "Example Wire".into(),
        url: Some(format!("https://news.example/{n}")),
        published_at: None,
        category: Category::Technology,
        authors: vec![],
    }
}

/// Replays a fixed sequence of generator results.
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<std::result::Result<String, EnhanceFailure>>>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<std::result::Result<String, EnhanceFailure>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, _prompt: &str) -> std::result::Result<String, EnhanceFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(EnhanceFailure::Retryable("script exhausted".into())))
    }
}

/// Never answers; every call runs into the enhancer's timeout.
#[derive(Default)]
pub struct HangingGenerator {
    calls: AtomicUsize,
}

impl HangingGenerator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextGenerator for HangingGenerator {
    async fn generate(&self, _prompt: &str) -> std::result::Result<String, EnhanceFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

/// Answers by prompt content; `None` from the router means hang forever.
pub struct RoutedGenerator<F> {
    route: F,
    calls: AtomicUsize,
}

impl<F> RoutedGenerator<F>
where
    F: Fn(&str) -> Option<std::result::Result<String, EnhanceFailure>>,
{
    pub fn new(route: F) -> Self {
        Self {
            route,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<F> TextGenerator for RoutedGenerator<F>
where
    F: Fn(&str) -> Option<std::result::Result<String, EnhanceFailure>>,
{
    async fn generate(&self, prompt: &str) -> std::result::Result<String, EnhanceFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match (self.route)(prompt) {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }
}

/// Answers every prompt after `delay`, recording how many calls overlap.
pub struct TrackingGenerator {
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl TrackingGenerator {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextGenerator for TrackingGenerator {
    async fn generate(&self, prompt: &str) -> std::result::Result<String, EnhanceFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let title = prompt
            .lines()
            .find_map(|l| l.strip_prefix("Title: "))
            .unwrap_or("untitled");
        Ok(format!("Rewritten: {title}\nA fresh body."))
    }
}

/// A news source returning a canned answer.
pub struct FakeNewsSource {
    answer: Box<dyn Fn() -> Result<Vec<Article>>>,
    calls: AtomicUsize,
}

impl FakeNewsSource {
    pub fn returning(articles: Vec<Article>) -> Self {
        Self {
            answer: Box::new(move || Ok(articles.clone())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(err: impl Fn() -> crate::error::Error + 'static) -> Self {
        Self {
            answer: Box::new(move || Err(err())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl NewsSource for FakeNewsSource {
    async fn fetch_articles(&self, _query: &NewsQuery) -> Result<Vec<Article>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.answer)()
    }
}
