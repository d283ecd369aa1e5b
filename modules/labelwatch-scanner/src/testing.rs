// Test doubles for page fetching and extraction.
//
// - MockFetcher (PageFetcher): HashMap-based URL→body, records every call
// - MockExtractor (Extractor): reads `name:` and `tag:` lines from a body

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{FetchError, Result};
use crate::extractor::{fill_pattern, Extractor, ADDRESS_SLOT};
use crate::fetch::PageFetcher;

/// Returns `Err` for unregistered URLs.
#[derive(Default)]
pub struct MockFetcher {
    pages: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<String>>,
    count: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_page(self, url: &str, body: impl Into<String>) -> Self {
        self.set_page(url, body);
        self
    }

    /// Register or replace a page after the fetcher is shared.
    pub fn set_page(&self, url: &str, body: impl Into<String>) {
        if let Ok(mut pages) = self.pages.lock() {
            pages.insert(url.to_string(), body.into());
        }
    }

    /// Total number of fetches, successful or not.
    pub fn call_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Number of fetches for URLs containing `needle`.
    pub fn calls_matching(&self, needle: &str) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.iter().filter(|u| u.contains(needle)).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(url.to_string());
        }
        let body = self
            .pages
            .lock()
            .ok()
            .and_then(|pages| pages.get(url).map(|body| body.to_lowercase()));
        body.ok_or_else(|| FetchError::Network {
            url: url.to_string(),
            message: "MockFetcher: no page registered".to_string(),
        })
    }
}

/// Extractor over a line format: `name:<value>` and `tag:<value>`.
pub struct MockExtractor {
    patterns: Vec<String>,
}

impl MockExtractor {
    pub fn with_pages(count: usize) -> Self {
        Self {
            patterns: (0..count)
                .map(|i| format!("https://explorer.test/page{i}/{ADDRESS_SLOT}"))
                .collect(),
        }
    }

    /// URL of page `index` for `address`.
    pub fn url(&self, index: usize, address: &str) -> String {
        fill_pattern(&self.patterns[index], address)
    }
}

impl Extractor for MockExtractor {
    fn extract_name(&self, body: &str) -> String {
        body.lines()
            .find_map(|l| l.strip_prefix("name:"))
            .unwrap_or_default()
            .trim()
            .to_string()
    }

    fn extract_tags(&self, body: &str) -> Vec<String> {
        let mut tags: Vec<String> = body
            .lines()
            .filter_map(|l| l.strip_prefix("tag:"))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        tags.sort();
        tags.dedup();
        tags
    }

    fn url_patterns(&self) -> Vec<String> {
        self.patterns.clone()
    }
}

/// Body understood by [`MockExtractor`].
pub fn mock_page(name: &str, tags: &[&str]) -> String {
    let mut lines = Vec::new();
    if !name.is_empty() {
        lines.push(format!("name:{name}"));
    }
    lines.extend(tags.iter().map(|t| format!("tag:{t}")));
    lines.join("\n")
}
