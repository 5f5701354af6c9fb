//! Exploding `ZUSATZINFO` into one row per tag.
use std::collections::HashMap;

use crate::config::Config;
use crate::types::{ControlRecord, ControlTable, TagCountRow};

/// One tag of one record. `record` indexes into the table the tag came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRow {
    pub tag: String,
    pub record: usize,
}

impl TagRow {
    pub fn source<'a>(&self, table: &'a ControlTable) -> Option<&'a ControlRecord> {
        table.records.get(self.record)
    }
}

pub fn split_tags(table: &ControlTable) -> Vec<TagRow> {
    table
        .records
        .iter()
        .enumerate()
        .flat_map(|(i, r)| {
            r.tags
                .as_deref()
                .unwrap_or("")
                .split_whitespace()
                .map(move |tag| TagRow { tag: tag.to_string(), record: i })
        })
        .collect()
}

/// Only the tags that count against the distributor.
pub fn split_performance_tags(table: &ControlTable, config: &Config) -> Vec<TagRow> {
    split_tags(table)
        .into_iter()
        .filter(|t| config.is_performance_tag(&t.tag))
        .collect()
}

/// Tag frequencies, most frequent first.
pub fn tag_counts(tags: &[TagRow]) -> Vec<TagCountRow> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for t in tags {
        *counts.entry(t.tag.as_str()).or_default() += 1;
    }
    let mut rows: Vec<TagCountRow> = counts
        .into_iter()
        .map(|(tag, count)| TagCountRow { tag: tag.to_string(), count })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    rows
}

/// Sorted distinct tags, used as filter options.
pub fn distinct_tags(tags: &[TagRow]) -> Vec<String> {
    let mut out: Vec<String> = tags.iter().map(|t| t.tag.clone()).collect();
    out.sort();
    out.dedup();
    out
}
