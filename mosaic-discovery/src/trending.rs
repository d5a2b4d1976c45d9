//! Time-windowed recency and interaction ranking
//!
//! An event at `at` counts for a query at `now` iff
//! `now - window <= at <= now`. The edge itself is inside the window;
//! one tick later it is not.

use crate::model::{Asset, AssetId};
use crate::store::StoreSnapshot;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;

fn in_window(at: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    at <= now && now.checked_sub_signed(window).map_or(true, |start| start <= at)
}

/// View events recorded between refreshes
///
/// This is the only state the engine mutates outside a published
/// snapshot. Events older than the retention are dropped as new ones
/// arrive.
pub struct InteractionLog {
    retention: Duration,
    events: Mutex<BTreeMap<AssetId, Vec<DateTime<Utc>>>>,
}

impl InteractionLog {
    pub fn new(retention: Duration) -> Self {
        Self {
            retention,
            events: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn record(&self, id: AssetId, at: DateTime<Utc>) {
        let mut events = self.lock();
        events.entry(id).or_default().push(at);

        // A retention reaching past the earliest representable time keeps everything
        if let Some(cutoff) = at.checked_sub_signed(self.retention) {
            events.retain(|_, times| {
                times.retain(|t| *t >= cutoff);
                !times.is_empty()
            });
        }
    }

    /// Views per asset inside the window ending at `now`
    pub fn counts(&self, now: DateTime<Utc>, window: Duration) -> BTreeMap<AssetId, usize> {
        self.lock()
            .iter()
            .filter_map(|(id, times)| {
                let n = times.iter().filter(|t| in_window(**t, now, window)).count();
                (n > 0).then(|| (id.clone(), n))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<AssetId, Vec<DateTime<Utc>>>> {
        match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Per-asset counters for one query time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendingEntry {
    pub asset_id: AssetId,
    /// 1 when the asset was added inside the window
    pub added_signal: usize,
    pub view_count: usize,
}

impl TrendingEntry {
    pub fn score(&self) -> usize {
        self.added_signal + self.view_count
    }
}

/// Trending counters of a snapshot evaluated at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct TrendingWindow {
    pub now: DateTime<Utc>,
    pub window: Duration,
    entries: BTreeMap<AssetId, TrendingEntry>,
}

impl TrendingWindow {
    /// Views for ids not in the snapshot are ignored
    pub fn build(
        snapshot: &StoreSnapshot,
        views: &BTreeMap<AssetId, usize>,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Self {
        let entries = snapshot
            .assets
            .values()
            .filter_map(|asset| {
                let added_signal = usize::from(in_window(asset.created_at, now, window));
                let view_count = views.get(&asset.id).copied().unwrap_or(0);
                (added_signal + view_count > 0).then(|| {
                    (
                        asset.id.clone(),
                        TrendingEntry {
                            asset_id: asset.id.clone(),
                            added_signal,
                            view_count,
                        },
                    )
                })
            })
            .collect();

        Self { now, window, entries }
    }

    pub fn entry(&self, id: &AssetId) -> Option<&TrendingEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Assets added inside the window, `created_at` descending then id ascending
    pub fn newly_added<'a>(&self, snapshot: &'a StoreSnapshot, limit: usize) -> Vec<&'a Asset> {
        let mut added: Vec<&Asset> = self
            .entries
            .values()
            .filter(|e| e.added_signal > 0)
            .filter_map(|e| snapshot.get(&e.asset_id))
            .collect();
        added.sort_by(|a, b| recency_order(a, b));
        added.truncate(limit);
        added
    }

    /// Assets by in-window event count descending, ties by id ascending
    pub fn trending<'a>(&self, snapshot: &'a StoreSnapshot, limit: usize) -> Vec<(&'a Asset, usize)> {
        let mut ranked: Vec<(&Asset, usize)> = self
            .entries
            .values()
            .filter_map(|e| snapshot.get(&e.asset_id).map(|a| (a, e.score())))
            .collect();
        ranked.sort_by(|(a, sa), (b, sb)| sb.cmp(sa).then_with(|| a.id.cmp(&b.id)));
        ranked.truncate(limit);
        ranked
    }
}

/// Newest first, ties by id ascending
pub fn recency_order(a: &Asset, b: &Asset) -> std::cmp::Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| a.id.cmp(&b.id))
}
