use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::label::NAME_LABEL_PREFIX;

/// Everything known about one address.
///
/// `tags` behaves as a set: it never holds the same tag twice, and the order
/// only reflects when a tag was first seen. A non-empty `name` is never
/// replaced by an empty one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressReport {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub last_checked: DateTime<Utc>,
}

impl AddressReport {
    pub fn new(name: impl Into<String>, tags: Vec<String>, last_checked: DateTime<Utc>) -> Self {
        let mut report = Self {
            name: name.into(),
            tags: Vec::with_capacity(tags.len()),
            last_checked,
        };
        report.extend_tags(&tags);
        report
    }

    /// Fold `other` into `self`: latest timestamp, first non-empty name,
    /// union of tags with existing tags first.
    pub fn merge(&mut self, other: &AddressReport) {
        if self.last_checked < other.last_checked {
            self.last_checked = other.last_checked;
        }
        if self.name.is_empty() {
            self.name = other.name.clone();
        }
        self.extend_tags(&other.tags);
    }

    fn extend_tags(&mut self, tags: &[String]) {
        for tag in tags {
            if !self.tags.contains(tag) {
                self.tags.push(tag.clone());
            }
        }
    }

    /// True when nothing was learned about the address.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.tags.is_empty()
    }

    /// Whether the report was refreshed less than `ttl` before `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_checked < ttl
    }

    /// Candidate labels for emission: every tag, then `name|<name>` if known.
    pub fn candidate_labels(&self) -> Vec<String> {
        let mut labels = self.tags.clone();
        if !self.name.is_empty() {
            labels.push(format!("{NAME_LABEL_PREFIX}{}", self.name));
        }
        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn tag_set(report: &AddressReport) -> BTreeSet<String> {
        report.tags.iter().cloned().collect()
    }

    #[test]
    fn merge_takes_latest_timestamp_and_unions_tags() {
        let earlier = Utc::now() - Duration::hours(1);
        let later = Utc::now();
        let mut a = AddressReport::new("", tags(&["label1"]), earlier);
        let b = AddressReport::new("", tags(&["label1", "label2"]), later);

        a.merge(&b);

        assert_eq!(a, AddressReport::new("", tags(&["label1", "label2"]), later));
    }

    #[test]
    fn merge_keeps_existing_timestamp_when_newer() {
        let later = Utc::now();
        let mut a = AddressReport::new("", vec![], later);
        a.merge(&AddressReport::new("", vec![], later - Duration::hours(5)));
        assert_eq!(a.last_checked, later);
    }

    #[test]
    fn merge_never_overwrites_name_with_empty() {
        let now = Utc::now();
        let mut a = AddressReport::new("tether: usdt stablecoin", vec![], now);
        a.merge(&AddressReport::new("", tags(&["stablecoin"]), now));
        assert_eq!(a.name, "tether: usdt stablecoin");

        let mut empty = AddressReport::default();
        empty.merge(&AddressReport::new("yearn exploiter", vec![], now));
        assert_eq!(empty.name, "yearn exploiter");
    }

    #[test]
    fn merge_first_non_empty_name_wins() {
        let now = Utc::now();
        let mut a = AddressReport::new("first", vec![], now);
        a.merge(&AddressReport::new("second", vec![], now));
        assert_eq!(a.name, "first");
    }

    #[test]
    fn merge_appends_new_tags_in_other_order() {
        let now = Utc::now();
        let mut a = AddressReport::new("", tags(&["heist"]), now);
        a.merge(&AddressReport::new("", tags(&["exploit", "heist", "blocked"]), now));
        assert_eq!(a.tags, tags(&["heist", "exploit", "blocked"]));
    }

    #[test]
    fn merge_is_idempotent() {
        let a = AddressReport::new("name", tags(&["a", "b"]), Utc::now());
        let mut merged = a.clone();
        merged.merge(&a);
        assert_eq!(merged, a);
    }

    #[test]
    fn merge_grouping_does_not_change_tag_set() {
        let now = Utc::now();
        let a = AddressReport::new("", tags(&["x", "y"]), now);
        let b = AddressReport::new("", tags(&["y", "z"]), now);
        let c = AddressReport::new("", tags(&["w", "x"]), now);

        let mut left = a.clone();
        left.merge(&b);
        left.merge(&c);

        let mut bc = b.clone();
        bc.merge(&c);
        let mut right = a.clone();
        right.merge(&bc);

        let mut reversed = c.clone();
        reversed.merge(&b);
        reversed.merge(&a);

        let expected: BTreeSet<String> = tags(&["w", "x", "y", "z"]).into_iter().collect();
        assert_eq!(tag_set(&left), expected);
        assert_eq!(tag_set(&right), expected);
        assert_eq!(tag_set(&reversed), expected);
    }

    #[test]
    fn new_drops_duplicate_tags() {
        let report = AddressReport::new("", tags(&["heist", "heist", "Heist"]), Utc::now());
        assert_eq!(report.tags, tags(&["heist", "Heist"]));
    }

    #[test]
    fn freshness_is_relative_to_ttl() {
        let now = Utc::now();
        let ttl = Duration::hours(72);
        let fresh = AddressReport::new("", vec![], now - Duration::hours(71));
        let stale = AddressReport::new("", vec![], now - Duration::hours(73));
        assert!(fresh.is_fresh(now, ttl));
        assert!(!stale.is_fresh(now, ttl));
        assert!(!AddressReport::default().is_fresh(now, ttl));
    }

    #[test]
    fn candidate_labels_include_name() {
        let report = AddressReport::new("tether: usdt stablecoin", tags(&["stablecoin"]), Utc::now());
        assert_eq!(
            report.candidate_labels(),
            tags(&["stablecoin", "name|tether: usdt stablecoin"])
        );
        assert!(AddressReport::default().candidate_labels().is_empty());
    }

    #[test]
    fn serializes_with_camel_case_timestamp() {
        let report = AddressReport::new("n", tags(&["t"]), Utc::now());
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("lastChecked").is_some());
        let back: AddressReport = serde_json::from_value(json).unwrap();
        assert_eq!(back, report);
    }
}
