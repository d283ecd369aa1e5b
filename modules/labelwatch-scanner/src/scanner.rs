use std::sync::Arc;

use chrono::Utc;
use labelwatch_common::AddressReport;
use tracing::{debug, warn};

use crate::extractor::{fill_pattern, Extractor};
use crate::fetch::PageFetcher;

/// Outcome of scanning every page of one address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub report: AddressReport,
    pub pages_fetched: usize,
    pub pages_failed: usize,
}

impl ScanResult {
    /// No page could be fetched, so the empty report says nothing about the address.
    pub fn is_unreachable(&self) -> bool {
        self.pages_fetched == 0 && self.pages_failed > 0
    }
}

#[derive(Clone)]
pub struct Scanner {
    fetcher: Arc<dyn PageFetcher>,
}

impl Scanner {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    /// Scan an address and fold every page into one report. Failed pages are
    /// skipped; if all fail the report is empty with a zero timestamp.
    pub async fn scan(&self, extractor: &dyn Extractor, address: &str) -> AddressReport {
        self.scan_pages(extractor, address).await.report
    }

    /// Like [`Scanner::scan`], also counting fetched and failed pages.
    pub async fn scan_pages(&self, extractor: &dyn Extractor, address: &str) -> ScanResult {
        let mut result = ScanResult::default();

        for pattern in extractor.url_patterns() {
            let url = fill_pattern(&pattern, address);
            match self.fetcher.fetch(&url).await {
                Ok(body) => {
                    result.pages_fetched += 1;
                    let partial = AddressReport::new(
                        extractor.extract_name(&body),
                        extractor.extract_tags(&body),
                        Utc::now(),
                    );
                    debug!(url = %url, tags = partial.tags.len(), "Extracted page");
                    result.report.merge(&partial);
                }
                Err(e) => {
                    result.pages_failed += 1;
                    warn!(url = %url, error = %e, "Error getting page (skipping)");
                }
            }
        }

        result
    }
}
