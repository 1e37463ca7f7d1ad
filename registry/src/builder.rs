use crate::error::RegistryError;
use crate::metrics::Metrics;
use crate::registry::Registry;

use core::fmt;
use std::collections::HashMap;
use std::hash::BuildHasher;

use parking_lot::Mutex;

/// Initial capacity hint used when none is configured.
pub const DEFAULT_CAPACITY: usize = 200;

/// A builder for creating [`Registry`] instances.
pub struct RegistryBuilder<H = ahash::RandomState> {
  capacity: usize,
  hasher: H,
}

impl<H> fmt::Debug for RegistryBuilder<H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RegistryBuilder")
      .field("capacity", &self.capacity)
      .finish_non_exhaustive()
  }
}

impl Default for RegistryBuilder {
  fn default() -> Self {
    Self {
      capacity: DEFAULT_CAPACITY,
      hasher: ahash::RandomState::new(),
    }
  }
}

impl RegistryBuilder {
  /// Creates a builder with the default capacity hint and hasher.
  pub fn new() -> Self {
    Self::default()
  }
}

impl<H> RegistryBuilder<H> {
  /// Sets how many entries the store reserves room for up front.
  ///
  /// This is only a hint; the store grows past it as needed.
  pub fn capacity(mut self, capacity: usize) -> Self {
    self.capacity = capacity;
    self
  }

  /// Replaces the hasher used by the store.
  pub fn hasher<H2>(self, hasher: H2) -> RegistryBuilder<H2>
  where
    H2: BuildHasher,
  {
    RegistryBuilder {
      capacity: self.capacity,
      hasher,
    }
  }
}

impl<H: BuildHasher> RegistryBuilder<H> {
  /// Builds the registry.
  ///
  /// Fails with [`RegistryError::Create`] if the store cannot reserve the
  /// requested capacity, in which case nothing is left behind.
  pub fn build(self) -> Result<Registry<H>, RegistryError> {
    tracing::info!(capacity = self.capacity, "Initializing resource registry.");

    let mut store = HashMap::with_hasher(self.hasher);
    if let Err(err) = store.try_reserve(self.capacity) {
      tracing::error!("Unable to allocate the registry store: {}", err);
      return Err(RegistryError::Create(err));
    }

    tracing::info!("Finished initializing resource registry.");

    Ok(Registry::from_parts(Mutex::new(store), Metrics::new()))
  }
}
