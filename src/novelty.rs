// src/novelty.rs
//! # Novelty detection
//! Decides which items of a freshly fetched batch have not been delivered yet.
//!
//! Feeds do not keep insertion order and sometimes re-list older items near
//! the tail, so a plain set difference against "seen" ids is not used.
//! Instead the batch is ordered by publish time and walked from the newest
//! end back to the first item already delivered. Work is bounded by the
//! size of the gap, not the batch.

use crate::ingest::RawItem;

/// Items of `items` newer than the last delivered one, oldest first.
///
/// * Sort is stable and ascending by `published_at`; missing or invalid
///   timestamps (`None`) sort as the oldest.
/// * If the newest item is already delivered, the batch is stale → empty.
/// * Otherwise everything after the last delivered item (scanning backward)
///   is new. If no item is delivered, the whole batch is new.
/// * An empty batch returns empty without calling `is_delivered`.
pub fn select_new<F>(mut items: Vec<RawItem>, mut is_delivered: F) -> Vec<RawItem>
where
    F: FnMut(&RawItem) -> bool,
{
    if items.is_empty() {
        return items;
    }

    // `Option` orders `None` before any `Some`, so undated items land first.
    items.sort_by(|a, b| a.published_at.cmp(&b.published_at));

    let tip = items.len() - 1;
    if is_delivered(&items[tip]) {
        return Vec::new();
    }

    let first_new = items[..tip]
        .iter()
        .rposition(&mut is_delivered)
        .map_or(0, |i| i + 1);

    items.split_off(first_new)
}

/// The item `select_new` would treat as the tip: latest `published_at`,
/// ties resolved to the one listed last.
pub fn newest(items: &[RawItem]) -> Option<&RawItem> {
    items.iter().max_by_key(|it| it.published_at)
}

/// Predicate matching the default watermark check: an item counts as
/// delivered iff its unique id equals the stored one.
pub fn matches_watermark<'a>(last_delivered_id: &'a str) -> impl Fn(&RawItem) -> bool + 'a {
    move |item| item.unique_id.as_deref() == Some(last_delivered_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    fn item(id: &str, t: Option<i64>) -> RawItem {
        RawItem {
            unique_id: Some(id.to_string()),
            published_at: t.map(|s| Utc.timestamp_opt(s, 0).unwrap()),
            ..Default::default()
        }
    }

    fn ids(items: &[RawItem]) -> Vec<&str> {
        items
            .iter()
            .map(|i| i.unique_id.as_deref().unwrap_or(""))
            .collect()
    }

    #[test]
    fn empty_batch_never_consults_predicate() {
        let mut calls = 0;
        let out = select_new(Vec::new(), |_| {
            calls += 1;
            false
        });
        assert!(out.is_empty());
        assert_eq!(calls, 0);
    }

    #[test]
    fn unordered_batch_after_watermark() {
        let batch = vec![
            item("item-5", Some(5)),
            item("item-3", Some(3)),
            item("item-4", Some(4)),
        ];
        let out = select_new(batch, matches_watermark("item-3"));
        assert_eq!(ids(&out), vec!["item-4", "item-5"]);
    }

    #[test]
    fn stale_tip_short_circuits() {
        let mut calls = 0;
        let batch = vec![item("item-8", Some(8)), item("item-9", Some(9))];
        let out = select_new(batch, |it| {
            calls += 1;
            it.unique_id.as_deref() == Some("item-9")
        });
        assert!(out.is_empty());
        assert_eq!(calls, 1, "only the tip is inspected");
    }

    #[test]
    fn scan_stops_at_first_delivered_from_the_tail() {
        // item-1 re-listed with an old date, watermark is item-2
        let batch = vec![
            item("item-1", Some(1)),
            item("item-2", Some(2)),
            item("item-0", Some(0)),
            item("item-3", Some(3)),
        ];
        let out = select_new(batch, matches_watermark("item-2"));
        assert_eq!(ids(&out), vec!["item-3"]);
    }

    #[test]
    fn undated_items_sort_first() {
        let batch = vec![item("dated", Some(10)), item("undated", None)];
        let out = select_new(batch, |_| false);
        assert_eq!(ids(&out), vec!["undated", "dated"]);
    }

    #[test]
    fn equal_timestamps_keep_feed_order() {
        let batch = vec![item("a", Some(1)), item("b", Some(1)), item("c", Some(1))];
        let out = select_new(batch, matches_watermark("a"));
        assert_eq!(ids(&out), vec!["b", "c"]);
    }

    #[rstest]
    #[case::nothing_delivered("none", vec!["i1", "i2", "i3"])]
    #[case::oldest_delivered("i1", vec!["i2", "i3"])]
    #[case::middle_delivered("i2", vec!["i3"])]
    #[case::tip_delivered("i3", vec![])]
    fn watermark_position_decides_gap(#[case] watermark: &str, #[case] expected: Vec<&str>) {
        let batch = vec![item("i3", Some(3)), item("i1", Some(1)), item("i2", Some(2))];
        let out = select_new(batch, matches_watermark(watermark));
        assert_eq!(ids(&out), expected);
    }

    #[test]
    fn newest_agrees_with_sorted_tip() {
        let batch = vec![item("a", Some(4)), item("b", None), item("c", Some(4))];
        assert_eq!(newest(&batch).and_then(|i| i.unique_id.as_deref()), Some("c"));
        assert!(newest(&[]).is_none());
    }

    #[test]
    fn same_inputs_same_output() {
        let batch = vec![
            item("x", Some(2)),
            item("y", None),
            item("z", Some(7)),
            item("w", Some(2)),
        ];
        let a = select_new(batch.clone(), matches_watermark("y"));
        let b = select_new(batch, matches_watermark("y"));
        assert_eq!(a, b);
    }
}
