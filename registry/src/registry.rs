//! The `Registry` struct and its get/put/remove protocol.

use crate::builder::RegistryBuilder;
use crate::error::RegistryError;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::rc::{Handle, WeakHandle};

use core::fmt;
use std::any::{self, Any};
use std::borrow::Cow;
use std::collections::HashMap;
use std::hash::BuildHasher;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

/// A type-erased weak entry, so resources of different types can share a store.
pub(crate) trait ErasedWeak: Send + Sync {
  /// Promotes to a strong `Handle<T>` boxed as `Any`, or `None` if the payload is gone.
  fn promote(&self) -> Option<Box<dyn Any + Send + Sync>>;

  fn is_live(&self) -> bool;

  fn type_name(&self) -> &'static str;
}

impl<T: Send + Sync + 'static> ErasedWeak for WeakHandle<T> {
  fn promote(&self) -> Option<Box<dyn Any + Send + Sync>> {
    self
      .upgrade()
      .map(|strong| Box::new(strong) as Box<dyn Any + Send + Sync>)
  }

  fn is_live(&self) -> bool {
    WeakHandle::is_live(self)
  }

  fn type_name(&self) -> &'static str {
    any::type_name::<T>()
  }
}

pub(crate) type Store<H> = HashMap<Box<[u8]>, Box<dyn ErasedWeak>, H>;

#[inline]
fn display_key(name: &[u8]) -> Cow<'_, str> {
  String::from_utf8_lossy(name)
}

/// Copies a key into an owned buffer, reporting allocation failure.
fn owned_key(name: &[u8]) -> Result<Box<[u8]>, RegistryError> {
  let mut key = Vec::new();
  key.try_reserve_exact(name.len()).map_err(|err| {
    warn!("Unable to allocate key of {} bytes: {}", name.len(), err);
    RegistryError::AllocationFailure(err)
  })?;
  key.extend_from_slice(name);
  Ok(key.into_boxed_slice())
}

/// A thread-safe registry of named, reference-counted resources.
///
/// Entries are weak: registering a resource never keeps it alive, and a
/// resource is destroyed when its last [`Handle`] elsewhere is dropped, whether
/// or not it is still registered. Lookups promote the weak entry back into a
/// strong handle, and entries whose resource is gone are purged lazily.
///
/// Every access to the store is serialized by a single lock.
pub struct Registry<H = ahash::RandomState> {
  store: Mutex<Store<H>>,
  metrics: Metrics,
}

impl<H> fmt::Debug for Registry<H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Registry")
      .field("entries", &self.store.lock().len())
      .finish_non_exhaustive()
  }
}

impl Registry {
  /// Creates a registry with the default capacity hint and hasher.
  pub fn init() -> Result<Self, RegistryError> {
    RegistryBuilder::new().build()
  }

  /// Returns a builder for a customized registry.
  pub fn builder() -> RegistryBuilder {
    RegistryBuilder::new()
  }
}

impl<H> Registry<H> {
  pub(crate) fn from_parts(store: Mutex<Store<H>>, metrics: Metrics) -> Self {
    Self { store, metrics }
  }

  /// Destroys the registry.
  ///
  /// Every weak handle still registered is released. Resources stay alive for
  /// as long as callers hold strong handles to them.
  pub fn teardown(self) {
    info!("Tearing down resource registry.");

    let remaining = self.store.into_inner();
    if !remaining.is_empty() {
      debug!(
        remaining = remaining.len(),
        "Releasing entries still registered at teardown."
      );
    }
    drop(remaining);

    info!("Done.");
  }

  /// Returns a snapshot of the registry's usage counters.
  pub fn metrics(&self) -> MetricsSnapshot {
    self.metrics.snapshot()
  }

  /// Number of entries in the store, including stale ones not yet purged.
  pub fn len(&self) -> usize {
    self.store.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.store.lock().is_empty()
  }
}

impl<H: BuildHasher> Registry<H> {
  /// Looks up the resource registered under `name`.
  ///
  /// Returns a new strong handle if an entry exists, its resource is still
  /// alive, and it holds a `T`. A missing key, an empty key, a stale entry, and
  /// an entry of another type all return `None`. A stale entry is removed on
  /// the way out.
  pub fn get<T>(&self, name: impl AsRef<[u8]>) -> Option<Handle<T>>
  where
    T: Send + Sync + 'static,
  {
    let found = self.lookup::<T>(name.as_ref());
    if found.is_some() {
      Metrics::bump(&self.metrics.hits);
    } else {
      Metrics::bump(&self.metrics.misses);
    }
    found
  }

  /// The body of `get`, without touching the hit and miss counters.
  fn lookup<T>(&self, name: &[u8]) -> Option<Handle<T>>
  where
    T: Send + Sync + 'static,
  {
    if name.is_empty() {
      warn!("Called with an empty key!");
      return None;
    }

    trace!(key = %display_key(name), "Looking up resource.");

    // The promotion happens under the lock so it cannot interleave with a
    // concurrent remove or overwrite releasing the same weak handle.
    let (present, promoted) = {
      let store = self.store.lock();
      match store.get(name) {
        Some(weak) => (true, weak.promote()),
        None => (false, None),
      }
    };

    match promoted {
      Some(strong) => match strong.downcast::<Handle<T>>() {
        Ok(handle) => {
          debug!(key = %display_key(name), "Resource found.");
          Some(*handle)
        }
        Err(_other) => {
          warn!(
            key = %display_key(name),
            requested = any::type_name::<T>(),
            "Registered resource has a different type."
          );
          None
        }
      },
      None => {
        if present {
          debug!(key = %display_key(name), "Resource was already destroyed, purging entry.");
          self.purge_if_stale(name);
        } else {
          debug!(key = %display_key(name), "Resource not found.");
        }
        None
      }
    }
  }

  /// Registers `resource` under `name`, replacing any previous entry.
  ///
  /// The registry keeps only a weak handle; the caller remains responsible for
  /// the resource's lifetime whatever the outcome.
  pub fn put<T>(&self, name: impl AsRef<[u8]>, resource: &Handle<T>) -> Result<(), RegistryError>
  where
    T: Send + Sync + 'static,
  {
    let weak = Handle::downgrade(resource);
    self.insert(name.as_ref(), Box::new(weak))
  }

  /// Registers the resource observed by `resource` under `name`.
  ///
  /// Fails with [`RegistryError::InvalidArgument`] if that resource has already
  /// been destroyed; no entry is inserted in that case.
  pub fn put_weak<T>(&self, name: impl AsRef<[u8]>, resource: &WeakHandle<T>) -> Result<(), RegistryError>
  where
    T: Send + Sync + 'static,
  {
    let weak = resource.clone();
    if !weak.is_live() {
      warn!("Called with an already destroyed resource!");
      Metrics::bump(&self.metrics.rejected);
      return Err(RegistryError::InvalidArgument("resource has already been destroyed"));
    }
    self.insert(name.as_ref(), Box::new(weak))
  }

  fn insert(&self, name: &[u8], weak: Box<dyn ErasedWeak>) -> Result<(), RegistryError> {
    if name.is_empty() {
      warn!("Called with an empty key!");
      Metrics::bump(&self.metrics.rejected);
      return Err(RegistryError::InvalidArgument("empty key"));
    }

    trace!(key = %display_key(name), resource = weak.type_name(), "Registering resource.");

    let key = owned_key(name)?;

    let superseded = {
      let mut store = self.store.lock();
      if let Err(err) = store.try_reserve(1) {
        drop(store);
        warn!(key = %display_key(name), "Error inserting resource: {}", err);
        return Err(RegistryError::AllocationFailure(err));
      }
      store.insert(key, weak)
    };

    // The superseded weak handle is released here, outside the lock.
    if superseded.is_some() {
      Metrics::bump(&self.metrics.replacements);
      debug!(key = %display_key(name), "Replaced existing entry.");
    } else {
      Metrics::bump(&self.metrics.inserts);
    }

    Ok(())
  }

  /// Removes the entry for `name` and releases its weak handle.
  ///
  /// Returns [`RegistryError::NotFound`] if there was no such entry.
  pub fn remove(&self, name: impl AsRef<[u8]>) -> Result<(), RegistryError> {
    let name = name.as_ref();
    if name.is_empty() {
      warn!("Called with an empty key!");
      return Err(RegistryError::InvalidArgument("empty key"));
    }

    trace!(key = %display_key(name), "Removing resource.");

    let removed = self.store.lock().remove(name);

    match removed {
      Some(weak) => {
        drop(weak);
        Metrics::bump(&self.metrics.removals);
        Ok(())
      }
      None => Err(RegistryError::NotFound),
    }
  }

  /// Returns `true` if an entry exists for `name`, live or stale.
  pub fn contains(&self, name: impl AsRef<[u8]>) -> bool {
    self.store.lock().contains_key(name.as_ref())
  }

  /// Looks up `name`, building and registering the resource on a miss.
  ///
  /// `build` runs without the lock held. If another thread registered a live
  /// resource of the same type in the meantime, that one is returned and the
  /// freshly built resource is dropped. A live entry of another type is never
  /// replaced: the call fails with [`RegistryError::InvalidArgument`] instead.
  ///
  /// A successful call counts as exactly one hit or one miss.
  pub fn get_or_put_with<T, F>(&self, name: impl AsRef<[u8]>, build: F) -> Result<Handle<T>, RegistryError>
  where
    T: Send + Sync + 'static,
    F: FnOnce() -> Handle<T>,
  {
    let name = name.as_ref();
    if name.is_empty() {
      warn!("Called with an empty key!");
      Metrics::bump(&self.metrics.rejected);
      return Err(RegistryError::InvalidArgument("empty key"));
    }

    if let Some(found) = self.lookup::<T>(name) {
      Metrics::bump(&self.metrics.hits);
      return Ok(found);
    }

    let fresh = build();
    let weak: Box<dyn ErasedWeak> = Box::new(Handle::downgrade(&fresh));
    let key = owned_key(name)?;

    // Strong handles taken under the lock are dropped after it is released.
    let mut mismatched: Option<Box<dyn Any + Send + Sync>> = None;
    let mut superseded: Option<Box<dyn ErasedWeak>> = None;

    let winner = {
      let mut store = self.store.lock();
      let existing = store
        .get(name)
        .and_then(|weak| weak.promote())
        .map(|strong| strong.downcast::<Handle<T>>());

      match existing {
        Some(Ok(winner)) => Some(*winner),
        Some(Err(other)) => {
          mismatched = Some(other);
          None
        }
        None => {
          if let Err(err) = store.try_reserve(1) {
            drop(store);
            warn!(key = %display_key(name), "Error inserting resource: {}", err);
            return Err(RegistryError::AllocationFailure(err));
          }
          superseded = store.insert(key, weak);
          None
        }
      }
    };

    if mismatched.take().is_some() {
      Metrics::bump(&self.metrics.rejected);
      warn!(
        key = %display_key(name),
        requested = any::type_name::<T>(),
        "Registered resource has a different type, keeping it."
      );
      return Err(RegistryError::InvalidArgument("registered resource has a different type"));
    }

    match winner {
      Some(existing) => {
        Metrics::bump(&self.metrics.hits);
        debug!(key = %display_key(name), "Lost the race to register, using existing resource.");
        Ok(existing)
      }
      None => {
        Metrics::bump(&self.metrics.misses);
        if superseded.take().is_some() {
          Metrics::bump(&self.metrics.replacements);
        } else {
          Metrics::bump(&self.metrics.inserts);
        }
        Ok(fresh)
      }
    }
  }

  /// Removes every entry whose resource has been destroyed.
  ///
  /// Returns how many entries were purged.
  pub fn purge_stale(&self) -> usize {
    let purged: Vec<Box<dyn ErasedWeak>> = {
      let mut store = self.store.lock();
      let stale_keys: Vec<Box<[u8]>> = store
        .iter()
        .filter(|(_, weak)| !weak.is_live())
        .map(|(key, _)| key.clone())
        .collect();
      stale_keys
        .iter()
        .filter_map(|key| store.remove(key))
        .collect()
    };

    let count = purged.len();
    self
      .metrics
      .stale_purges
      .fetch_add(count as u64, Ordering::Relaxed);
    if count > 0 {
      debug!(count, "Purged stale entries.");
    }
    count
  }

  /// Removes the entry for `name` only if its resource is gone.
  ///
  /// A fresh registration that raced in after a failed lookup is left alone.
  fn purge_if_stale(&self, name: &[u8]) {
    let removed = {
      let mut store = self.store.lock();
      match store.get(name) {
        Some(weak) if !weak.is_live() => store.remove(name),
        _ => None,
      }
    };

    if removed.is_some() {
      Metrics::bump(&self.metrics.stale_purges);
    }
  }
}
