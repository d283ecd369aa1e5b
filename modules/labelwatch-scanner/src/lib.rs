pub mod error;
pub mod extractor;
pub mod fetch;
pub mod scanner;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use error::{FetchError, Result};
pub use extractor::{extractor_for, extractor_for_chain_id, fill_pattern, ExplorerExtractor, Extractor};
pub use fetch::{is_challenge_page, HttpPageFetcher, PageFetcher};
pub use scanner::{ScanResult, Scanner};
