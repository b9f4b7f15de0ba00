use std::collections::HashMap;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;

use super::{Aggregate, Metric, ResponseMetrics};
use crate::ids::ResponseId;

/// Metrics are write-once per id; a second record is a middleware bug and is
/// surfaced instead of silently overwriting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("metrics for response {0} were already recorded")]
pub struct RecordError(pub ResponseId);

#[derive(Debug, Clone, Copy)]
enum Slot {
    /// Id handed out, response still in flight.
    Pending,
    Final(ResponseMetrics),
}

/// Concurrent id-to-metrics map shared by every server coroutine.
///
/// Ids become visible through [`reserve`](Self::reserve) before their
/// response completes, so the observed count ([`len`](Self::len)) covers
/// in-flight work; measurements land later through exactly one
/// [`record`](Self::record). Sharded locking (dashmap) keeps reserve/record
/// for one id atomic without serializing unrelated ids.
#[derive(Debug, Default)]
pub struct MetricsStore {
    entries: DashMap<ResponseId, Slot>,
}

impl MetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim an id. Returns false when the id is already present, which the
    /// middleware treats as an allocation collision and retries.
    pub fn reserve(&self, id: ResponseId) -> bool {
        match self.entries.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Slot::Pending);
                true
            }
        }
    }

    /// Store the final measurements for an id, exactly once. An id that was
    /// never reserved is stored directly; a finalized id is left untouched
    /// and the call fails.
    pub fn record(&self, id: &ResponseId, metrics: ResponseMetrics) -> Result<(), RecordError> {
        match self.entries.entry(id.clone()) {
            Entry::Occupied(mut slot) => match slot.get() {
                Slot::Final(_) => Err(RecordError(id.clone())),
                Slot::Pending => {
                    slot.insert(Slot::Final(metrics));
                    Ok(())
                }
            },
            Entry::Vacant(slot) => {
                slot.insert(Slot::Final(metrics));
                Ok(())
            }
        }
    }

    /// Point-in-time copy, safe to take while writers proceed. Every entry is
    /// observed either pending or fully written, never in between.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let entries = self
            .entries
            .iter()
            .map(|entry| {
                let metrics = match entry.value() {
                    Slot::Pending => None,
                    Slot::Final(m) => Some(*m),
                };
                (entry.key().clone(), metrics)
            })
            .collect();
        MetricsSnapshot { entries }
    }

    /// Responses observed (finalized or still in flight) since the last
    /// clear.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Responses with complete measurements.
    pub fn finalized_len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.value(), Slot::Final(_)))
            .count()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

/// Detached copy of the store at one instant. In-flight entries carry no
/// metrics and are excluded from aggregates and the finalized view.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    entries: HashMap<ResponseId, Option<ResponseMetrics>>,
}

impl MetricsSnapshot {
    /// All observed ids, including in-flight ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn metrics(&self, id: &ResponseId) -> Option<ResponseMetrics> {
        self.entries.get(id).copied().flatten()
    }

    pub fn contains(&self, id: &ResponseId) -> bool {
        self.entries.contains_key(id)
    }

    /// Entries whose measurements completed before the snapshot was taken.
    pub fn finalized(&self) -> impl Iterator<Item = (&ResponseId, &ResponseMetrics)> {
        self.entries
            .iter()
            .filter_map(|(id, metrics)| metrics.as_ref().map(|m| (id, m)))
    }

    pub fn finalized_len(&self) -> usize {
        self.finalized().count()
    }

    /// Min/max/mean of one dimension over the finalized entries; all zeros
    /// when there are none.
    pub fn aggregate(&self, metric: Metric) -> Aggregate {
        let mut count: u64 = 0;
        let mut sum: u128 = 0;
        let mut min = u64::MAX;
        let mut max = 0u64;
        for (_, m) in self.finalized() {
            let value = metric.value(m);
            count += 1;
            sum += u128::from(value);
            min = min.min(value);
            max = max.max(value);
        }
        if count == 0 {
            Aggregate::default()
        } else {
            Aggregate {
                min,
                max,
                average: sum as f64 / count as f64,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn m(size: u64, nanos: u64) -> ResponseMetrics {
        ResponseMetrics::new(size, Duration::from_nanos(nanos))
    }

    #[test]
    fn test_reserve_claims_each_id_once() {
        let store = MetricsStore::new();
        assert!(store.reserve(ResponseId::from("1")));
        assert!(!store.reserve(ResponseId::from("1")));
        assert_eq!(store.len(), 1);
        assert_eq!(store.finalized_len(), 0);
    }

    #[test]
    fn test_record_is_write_once() {
        let store = MetricsStore::new();
        let id = ResponseId::from("7");
        store.reserve(id.clone());
        store.record(&id, m(10, 100)).unwrap();
        let err = store.record(&id, m(99, 999)).unwrap_err();
        assert_eq!(err, RecordError(id.clone()));
        assert_eq!(store.snapshot().metrics(&id), Some(m(10, 100)));
    }

    #[test]
    fn test_record_without_reserve_stores_directly() {
        let store = MetricsStore::new();
        let id = ResponseId::from("direct");
        store.record(&id, m(5, 50)).unwrap();
        assert_eq!(store.finalized_len(), 1);
        assert!(store.record(&id, m(6, 60)).is_err());
    }

    #[test]
    fn test_snapshot_separates_pending_from_finalized() {
        let store = MetricsStore::new();
        let done = ResponseId::from("done");
        let pending = ResponseId::from("pending");
        store.reserve(done.clone());
        store.reserve(pending.clone());
        store.record(&done, m(3, 30)).unwrap();

        let snap = store.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.finalized_len(), 1);
        assert!(snap.contains(&pending));
        assert_eq!(snap.metrics(&pending), None);
        assert_eq!(snap.metrics(&done), Some(m(3, 30)));
    }

    #[test]
    fn test_empty_snapshot_aggregates_to_zeros() {
        let snap = MetricsStore::new().snapshot();
        let agg = snap.aggregate(Metric::ResponseSize);
        assert_eq!((agg.min, agg.max), (0, 0));
        assert_eq!(agg.average, 0.0);
    }

    #[test]
    fn test_clear_forgets_everything() {
        let store = MetricsStore::new();
        store.record(&ResponseId::from("1"), m(1, 1)).unwrap();
        store.clear();
        assert!(store.is_empty());
        assert!(store.reserve(ResponseId::from("1")));
    }
}
