use std::collections::TryReserveError;

use thiserror::Error;

/// Errors returned by registry operations.
///
/// A failed lookup is not an error: `get` reports a miss and a stale entry the
/// same way, as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
  /// An empty key, or a resource that was already destroyed.
  #[error("invalid argument: {0}")]
  InvalidArgument(&'static str),

  /// No entry exists under the given key.
  #[error("no resource registered under that key")]
  NotFound,

  /// Growing the store or a key buffer failed.
  #[error("allocation failed: {0}")]
  AllocationFailure(#[source] TryReserveError),

  /// The store could not be created with the requested capacity.
  #[error("unable to create the registry store: {0}")]
  Create(#[source] TryReserveError),

  /// The process-wide registry was initialized twice without a teardown.
  #[error("the process-wide registry is already initialized")]
  AlreadyInitialized,
}
