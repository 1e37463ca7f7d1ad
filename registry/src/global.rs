//! The process-wide registry slot.
//!
//! Nothing here is created lazily: [`init`] must run before [`global`] returns
//! anything, and [`teardown`] empties the slot again. Code that can be handed a
//! `Registry` directly should prefer that over this module.

use crate::builder::RegistryBuilder;
use crate::error::RegistryError;
use crate::registry::Registry;

use std::sync::Arc;

use parking_lot::RwLock;

static GLOBAL_REGISTRY: RwLock<Option<Arc<Registry>>> = parking_lot::const_rwlock(None);

/// Installs the process-wide registry with default settings.
///
/// Call once during single-threaded startup. Fails with
/// [`RegistryError::AlreadyInitialized`] if a registry is already installed.
///
/// # Examples
///
/// ```
/// use fibre_registry::{global, Handle};
///
/// global::init().unwrap();
///
/// let session = Handle::new(String::from("session"));
/// global::global().unwrap().put("plc:10.0.0.5", &session).unwrap();
///
/// global::teardown();
/// ```
pub fn init() -> Result<(), RegistryError> {
  init_with(RegistryBuilder::new())
}

/// Installs the process-wide registry built from `builder`.
pub fn init_with(builder: RegistryBuilder) -> Result<(), RegistryError> {
  let mut slot = GLOBAL_REGISTRY.write();
  if slot.is_some() {
    tracing::warn!("Resource registry is already initialized!");
    return Err(RegistryError::AlreadyInitialized);
  }
  *slot = Some(Arc::new(builder.build()?));
  Ok(())
}

/// Returns the process-wide registry, if one is installed.
pub fn global() -> Option<Arc<Registry>> {
  GLOBAL_REGISTRY.read().clone()
}

/// Removes and destroys the process-wide registry.
///
/// Does nothing if no registry is installed. If some caller still holds the
/// `Arc` returned by [`global`], the registry is destroyed once they drop it.
pub fn teardown() {
  let taken = GLOBAL_REGISTRY.write().take();
  match taken.map(Arc::try_unwrap) {
    Some(Ok(registry)) => registry.teardown(),
    Some(Err(shared)) => {
      tracing::warn!("Resource registry is still in use; it will be released by its last user.");
      drop(shared);
    }
    None => tracing::debug!("Resource registry was not initialized, nothing to tear down."),
  }
}
