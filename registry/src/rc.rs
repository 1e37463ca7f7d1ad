//! A reference-counted cell whose weak side can fail to promote.
//!
//! `Handle<T>` is a strong claim: the payload lives exactly as long as at least
//! one `Handle` exists. `WeakHandle<T>` only observes the cell. Promoting a weak
//! handle refuses to move the strong count off zero, so a cell whose destructor
//! has started can never be handed out again.
//!
//! Both are thin wrappers over `Arc`/`Weak`, whose `upgrade` is already an
//! atomic compare-and-increment that fails at zero.

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Weak};

/// A strong, shared handle to a reference-counted payload.
///
/// Cloning increments the strong count; dropping the last clone runs the
/// payload's destructor exactly once.
pub struct Handle<T>(Arc<T>);

impl<T> Handle<T> {
  /// Allocates a new cell holding `value` with a strong count of one.
  pub fn new(value: T) -> Self {
    Self(Arc::new(value))
  }

  /// Creates a new weak handle to the same cell.
  pub fn downgrade(this: &Self) -> WeakHandle<T> {
    WeakHandle(Arc::downgrade(&this.0))
  }

  /// Number of strong handles currently alive, including `this`.
  pub fn strong_count(this: &Self) -> usize {
    Arc::strong_count(&this.0)
  }

  /// Number of weak handles currently alive.
  pub fn weak_count(this: &Self) -> usize {
    Arc::weak_count(&this.0)
  }

  /// Returns `true` if both handles point at the same cell.
  pub fn ptr_eq(a: &Self, b: &Self) -> bool {
    Arc::ptr_eq(&a.0, &b.0)
  }
}

impl<T> Clone for Handle<T> {
  fn clone(&self) -> Self {
    Self(Arc::clone(&self.0))
  }
}

impl<T> Deref for Handle<T> {
  type Target = T;

  #[inline]
  fn deref(&self) -> &T {
    &self.0
  }
}

impl<T: fmt::Debug> fmt::Debug for Handle<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(&*self.0, f)
  }
}

/// A non-owning handle that may be promoted back into a [`Handle`].
pub struct WeakHandle<T>(Weak<T>);

impl<T> WeakHandle<T> {
  /// Attempts to take a new strong claim on the payload.
  ///
  /// Returns `None` once the strong count has reached zero; in that case the
  /// destructor has run or is running and the payload must not be touched.
  pub fn upgrade(&self) -> Option<Handle<T>> {
    self.0.upgrade().map(Handle)
  }

  /// Number of strong handles currently alive.
  pub fn strong_count(&self) -> usize {
    self.0.strong_count()
  }

  /// Number of weak handles currently alive, or zero once the payload is gone.
  pub fn weak_count(&self) -> usize {
    self.0.weak_count()
  }

  /// Returns `true` while the payload has not been destroyed.
  ///
  /// This is only a hint; the answer can change before the caller acts on it.
  pub fn is_live(&self) -> bool {
    self.strong_count() > 0
  }

  /// Returns `true` if both handles point at the same cell.
  pub fn ptr_eq(a: &Self, b: &Self) -> bool {
    Weak::ptr_eq(&a.0, &b.0)
  }

  /// Returns `true` if this weak handle observes the cell behind `strong`.
  pub fn points_to(&self, strong: &Handle<T>) -> bool {
    std::ptr::eq(self.0.as_ptr(), Arc::as_ptr(&strong.0))
  }
}

impl<T> Clone for WeakHandle<T> {
  fn clone(&self) -> Self {
    Self(Weak::clone(&self.0))
  }
}

impl<T> fmt::Debug for WeakHandle<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WeakHandle")
      .field("strong", &self.strong_count())
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
  use std::thread;

  struct DropCounter {
    drops: Arc<AtomicUsize>,
    tag: u64,
  }

  impl Drop for DropCounter {
    fn drop(&mut self) {
      self.drops.fetch_add(1, Ordering::SeqCst);
    }
  }

  fn counted(tag: u64) -> (Handle<DropCounter>, Arc<AtomicUsize>) {
    let drops = Arc::new(AtomicUsize::new(0));
    let handle = Handle::new(DropCounter {
      drops: drops.clone(),
      tag,
    });
    (handle, drops)
  }

  #[test]
  fn handles_are_send_and_sync() {
    fn assert_send_sync<S: Send + Sync>() {}
    assert_send_sync::<Handle<String>>();
    assert_send_sync::<WeakHandle<String>>();
  }

  #[test]
  fn clone_and_drop_track_strong_count() {
    let (a, drops) = counted(1);
    assert_eq!(Handle::strong_count(&a), 1);

    let b = a.clone();
    assert_eq!(Handle::strong_count(&a), 2);
    assert!(Handle::ptr_eq(&a, &b));

    drop(b);
    assert_eq!(Handle::strong_count(&a), 1);
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    drop(a);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn weak_does_not_keep_payload_alive() {
    let (strong, drops) = counted(7);
    let weak = Handle::downgrade(&strong);
    assert_eq!(Handle::weak_count(&strong), 1);
    assert!(weak.is_live());

    drop(strong);
    assert_eq!(drops.load(Ordering::SeqCst), 1, "destructor runs at strong zero");
    assert!(!weak.is_live());
    assert_eq!(weak.strong_count(), 0);
    assert_eq!(weak.weak_count(), 0);
    assert!(weak.upgrade().is_none(), "promotion never resurrects a dead cell");
  }

  #[test]
  fn upgrade_adds_exactly_one_strong_claim() {
    let (strong, _drops) = counted(3);
    let weak = Handle::downgrade(&strong);

    let promoted = weak.upgrade().expect("payload is live");
    assert_eq!(promoted.tag, 3);
    assert_eq!(Handle::strong_count(&strong), 2);
    assert!(weak.points_to(&promoted));
  }

  #[test]
  fn weak_clones_are_released_independently() {
    let (strong, drops) = counted(9);
    let w1 = Handle::downgrade(&strong);
    let w2 = w1.clone();
    assert!(WeakHandle::ptr_eq(&w1, &w2));
    assert_eq!(Handle::weak_count(&strong), 2);

    drop(w1);
    assert_eq!(Handle::weak_count(&strong), 1);
    drop(strong);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert!(w2.upgrade().is_none());
  }

  #[test]
  fn racing_upgrade_and_final_drop_never_observes_a_dead_payload() {
    for round in 0..200 {
      let (strong, drops) = counted(round);
      let weak = Handle::downgrade(&strong);
      let start = Arc::new(AtomicBool::new(false));

      thread::scope(|s| {
        for _ in 0..4 {
          let weak = weak.clone();
          let start = start.clone();
          s.spawn(move || {
            while !start.load(Ordering::Acquire) {
              std::hint::spin_loop();
            }
            for _ in 0..100 {
              if let Some(h) = weak.upgrade() {
                // A successful promotion always sees an intact payload.
                assert_eq!(h.tag, round);
                assert_eq!(h.drops.load(Ordering::SeqCst), 0);
              }
            }
          });
        }
        start.store(true, Ordering::Release);
        drop(strong);
      });

      assert_eq!(drops.load(Ordering::SeqCst), 1, "destructor ran exactly once");
      assert!(weak.upgrade().is_none());
    }
  }
}
