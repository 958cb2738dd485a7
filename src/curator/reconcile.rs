//! Planning for POST-triggered reconciliation.
//!
//! A POST means the resource at its URL just changed. Older snapshots cached
//! under the same URL are superseded, and cached GETs of the resource must
//! be refetched. Planning is pure; the curator executes the plan against the
//! store.

use std::cmp::Ordering;

use crate::types::{CacheRecord, RequestMethod};

/// Changes implied by one POST record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Record kept among exact-URL matches.
    pub survivor: Option<String>,
    /// Exact-URL matches other than the survivor.
    pub superseded: Vec<String>,
    /// GET records (case-insensitive URL match) to mark for refresh.
    pub refresh: Vec<String>,
}

/// Plan reconciliation for `url` over a same-pass view of current records.
///
/// The survivor is the exact-URL record with the latest `last_used`; on a
/// tie the lexicographically smallest key wins. Superseded records are
/// excluded from the refresh list.
pub fn plan(url: &str, current: &[CacheRecord]) -> ReconcilePlan {
    let same_url: Vec<&CacheRecord> = current.iter().filter(|r| r.url == url).collect();

    let survivor = same_url
        .iter()
        .copied()
        .max_by(|a, b| newest_first(a, b))
        .map(|r| r.key.clone());

    let superseded: Vec<String> = same_url
        .iter()
        .filter(|r| Some(&r.key) != survivor.as_ref())
        .map(|r| r.key.clone())
        .collect();

    let refresh = current
        .iter()
        .filter(|r| r.method == RequestMethod::Get && r.url_matches(url))
        .filter(|r| !superseded.contains(&r.key))
        .map(|r| r.key.clone())
        .collect();

    ReconcilePlan {
        survivor,
        superseded,
        refresh,
    }
}

/// Orders by `last_used`, then prefers the smaller key as "greater".
fn newest_first(a: &CacheRecord, b: &CacheRecord) -> Ordering {
    a.last_used
        .total_cmp(&b.last_used)
        .then_with(|| b.key.cmp(&a.key))
}
