//! Best-effort label extraction from block explorer pages.
//!
//! Every explorer front-end gets an entry in a fixed table keyed by [`Chain`].
//! Extraction works on lower-cased markup and never fails: a page that does
//! not match yields an empty name and no tags.

use std::sync::Arc;

use labelwatch_common::Chain;

/// Slot in a URL pattern that receives the address.
pub const ADDRESS_SLOT: &str = "{address}";

pub trait Extractor: Send + Sync {
    /// Display name of the address, or empty.
    fn extract_name(&self, body: &str) -> String;

    /// Reputation tags, sorted and without duplicates.
    fn extract_tags(&self, body: &str) -> Vec<String>;

    /// URL templates, each with exactly one [`ADDRESS_SLOT`].
    fn url_patterns(&self) -> Vec<String>;
}

/// Substitute `address` into a URL pattern.
pub fn fill_pattern(pattern: &str, address: &str) -> String {
    pattern.replacen(ADDRESS_SLOT, address, 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagRule {
    /// Etherscan hashtag chips: `<i class='far fa-hashtag'></i>` followed by the tag text.
    Hashtag,
    /// Every non-empty run of text between `prefix` and the next `suffix`.
    Between {
        prefix: &'static str,
        suffix: &'static str,
    },
}

const RED_BADGE_SINGLE: TagRule = TagRule::Between {
    prefix: "<span class='u-label u-label--xs u-label--danger'>",
    suffix: "<",
};
const RED_BADGE_DOUBLE: TagRule = TagRule::Between {
    prefix: "<span class=\"u-label u-label--xs u-label--danger\">",
    suffix: "<",
};
const ACCOUNT_LABEL_SINGLE: TagRule = TagRule::Between {
    prefix: "/accounts/label/",
    suffix: "'",
};
const ACCOUNT_LABEL_DOUBLE: TagRule = TagRule::Between {
    prefix: "/accounts/label/",
    suffix: "\"",
};

const HASHTAG_MARKER: &str = "<i class='far fa-hashtag'></i>";
const HASHTAG_SPAN: &str = "<span class='hash-tag text-truncate'>";
const NAME_MARKER: &str = " | address 0x";

/// Extraction rules for one explorer front-end.
#[derive(Debug, Clone, Copy)]
pub struct ExplorerExtractor {
    pub chain: Chain,
    host: &'static str,
    tag_rules: &'static [TagRule],
}

impl ExplorerExtractor {
    pub fn host(&self) -> &'static str {
        self.host
    }
}

impl Extractor for ExplorerExtractor {
    fn extract_name(&self, body: &str) -> String {
        extract_title_name(body)
    }

    fn extract_tags(&self, body: &str) -> Vec<String> {
        let mut tags: Vec<String> = self
            .tag_rules
            .iter()
            .flat_map(|rule| match *rule {
                TagRule::Hashtag => extract_hashtags(body),
                TagRule::Between { prefix, suffix } => extract_all_between(body, prefix, suffix),
            })
            .collect();
        tags.sort();
        tags.dedup();
        tags
    }

    fn url_patterns(&self) -> Vec<String> {
        vec![
            format!("https://{}/token/{ADDRESS_SLOT}", self.host),
            format!("https://{}/address/{ADDRESS_SLOT}", self.host),
        ]
    }
}

/// Extractor for a known chain.
pub fn extractor_for(chain: Chain) -> ExplorerExtractor {
    let (host, tag_rules): (&'static str, &'static [TagRule]) = match chain {
        Chain::Ethereum => ("etherscan.io", &[TagRule::Hashtag]),
        Chain::Bsc => ("www.bscscan.com", &[RED_BADGE_SINGLE, ACCOUNT_LABEL_SINGLE]),
        Chain::Polygon => ("www.polygonscan.com", &[RED_BADGE_DOUBLE, ACCOUNT_LABEL_DOUBLE]),
        Chain::Arbitrum => ("www.arbiscan.io", &[ACCOUNT_LABEL_SINGLE]),
        Chain::Optimism => (
            "optimistic.etherscan.io",
            &[RED_BADGE_DOUBLE, ACCOUNT_LABEL_SINGLE],
        ),
        Chain::Avalanche => ("snowtrace.io", &[ACCOUNT_LABEL_SINGLE]),
        Chain::Fantom => ("ftmscan.com", &[ACCOUNT_LABEL_SINGLE]),
    };
    ExplorerExtractor {
        chain,
        host,
        tag_rules,
    }
}

/// Extractor for a numeric chain id; unknown chains have none.
pub fn extractor_for_chain_id(chain_id: u64) -> Option<Arc<dyn Extractor>> {
    Chain::from_id(chain_id).map(|chain| Arc::new(extractor_for(chain)) as Arc<dyn Extractor>)
}

fn extract_all_between(body: &str, prefix: &str, suffix: &str) -> Vec<String> {
    body.split(prefix)
        .skip(1)
        .filter_map(|segment| {
            let tag = segment.split(suffix).next().unwrap_or_default().trim();
            (!tag.is_empty()).then(|| tag.to_string())
        })
        .collect()
}

fn extract_hashtags(body: &str) -> Vec<String> {
    body.split(HASHTAG_MARKER)
        .skip(1)
        .filter_map(|segment| {
            let segment = segment.replacen(HASHTAG_SPAN, "", 1);
            let tag = segment.split('<').next().unwrap_or_default().trim();
            (!tag.is_empty()).then(|| tag.to_string())
        })
        .collect()
}

/// Page titles read `<title>NAME | Address 0x… | Etherscan</title>`.
fn extract_title_name(body: &str) -> String {
    let Some((before, _)) = body.split_once(NAME_MARKER) else {
        return String::new();
    };
    let last = before.rsplit('>').next().unwrap_or_default();
    last.split('|').next().unwrap_or_default().trim().to_string()
}
