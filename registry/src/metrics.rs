use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// Lock-free counters describing how a registry is being used.
#[derive(Debug)]
pub(crate) struct Metrics {
  // --- Lookups ---
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,
  pub(crate) stale_purges: CachePadded<AtomicU64>,

  // --- Registration ---
  pub(crate) inserts: CachePadded<AtomicU64>,
  pub(crate) replacements: CachePadded<AtomicU64>,
  pub(crate) removals: CachePadded<AtomicU64>,
  pub(crate) rejected: CachePadded<AtomicU64>,

  created_at: Instant,
}

impl Default for Metrics {
  fn default() -> Self {
    Self {
      hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      stale_purges: CachePadded::new(AtomicU64::new(0)),
      inserts: CachePadded::new(AtomicU64::new(0)),
      replacements: CachePadded::new(AtomicU64::new(0)),
      removals: CachePadded::new(AtomicU64::new(0)),
      rejected: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub(crate) fn bump(counter: &CachePadded<AtomicU64>) {
    counter.fetch_add(1, Ordering::Relaxed);
  }

  /// Creates a point-in-time snapshot of the current counters.
  pub(crate) fn snapshot(&self) -> MetricsSnapshot {
    let hits = self.hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let total_lookups = hits + misses;

    MetricsSnapshot {
      hits,
      misses,
      hit_ratio: if total_lookups == 0 {
        0.0
      } else {
        hits as f64 / total_lookups as f64
      },
      stale_purges: self.stale_purges.load(Ordering::Relaxed),
      inserts: self.inserts.load(Ordering::Relaxed),
      replacements: self.replacements.load(Ordering::Relaxed),
      removals: self.removals.load(Ordering::Relaxed),
      rejected: self.rejected.load(Ordering::Relaxed),
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time, public-facing snapshot of a registry's metrics.
#[derive(Clone)]
pub struct MetricsSnapshot {
  /// Lookups that returned a live resource.
  pub hits: u64,
  /// Lookups that found nothing, found a stale entry, or found another type.
  pub misses: u64,
  /// The hit ratio (hits / (hits + misses)).
  pub hit_ratio: f64,
  /// Stale entries removed, either by a failed lookup or by `purge_stale`.
  pub stale_purges: u64,
  /// Successful registrations under a previously unused key.
  pub inserts: u64,
  /// Successful registrations that superseded an existing entry.
  pub replacements: u64,
  /// Entries removed through `remove`.
  pub removals: u64,
  /// Registrations refused because of an invalid key or a dead resource.
  pub rejected: u64,
  /// The number of seconds the registry has existed.
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("hits", &self.hits)
      .field("misses", &self.misses)
      .field("hit_ratio", &format!("{:.2}%", self.hit_ratio * 100.0))
      .field("stale_purges", &self.stale_purges)
      .field("inserts", &self.inserts)
      .field("replacements", &self.replacements)
      .field("removals", &self.removals)
      .field("rejected", &self.rejected)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_metrics_have_zero_hit_ratio() {
    let snapshot = Metrics::new().snapshot();
    assert_eq!(snapshot.hits, 0);
    assert_eq!(snapshot.misses, 0);
    assert_eq!(snapshot.hit_ratio, 0.0);
  }

  #[test]
  fn hit_ratio_reflects_lookups() {
    let metrics = Metrics::new();
    Metrics::bump(&metrics.hits);
    Metrics::bump(&metrics.hits);
    Metrics::bump(&metrics.hits);
    Metrics::bump(&metrics.misses);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.hits, 3);
    assert_eq!(snapshot.misses, 1);
    assert!((snapshot.hit_ratio - 0.75).abs() < f64::EPSILON);
    assert!(format!("{:?}", snapshot).contains("75.00%"));
  }
}
