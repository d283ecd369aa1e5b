use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Prefix marking a label derived from an address's display name.
pub const NAME_LABEL_PREFIX: &str = "name|";

/// One proposed (entity, label) emission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelPair {
    pub entity: String,
    pub label: String,
}

impl LabelPair {
    pub fn new(entity: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            label: label.into(),
        }
    }
}

/// Normalize text used in store keys.
pub fn clean_text(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Group labels by entity, joining each entity's labels with `|`.
pub fn summarize_by_entity(labels: &[LabelPair]) -> BTreeMap<String, String> {
    let mut grouped: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for pair in labels {
        grouped
            .entry(pair.entity.clone())
            .or_default()
            .push(pair.label.as_str());
    }
    grouped
        .into_iter()
        .map(|(entity, labels)| (entity, labels.join("|")))
        .collect()
}
