pub mod chain;
pub mod config;
pub mod label;
pub mod protocol;
pub mod report;

pub use chain::{parse_chain_id, Chain, ChainParseError};
pub use config::{Config, StoreBackend};
pub use label::{clean_text, summarize_by_entity, LabelPair, NAME_LABEL_PREFIX};
pub use report::AddressReport;
