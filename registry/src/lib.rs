//! # Fibre Registry
//!
//! A thread-safe registry that lets many callers share one instance of an
//! expensive, named resource (a connection, a session, a device handle)
//! instead of each building their own.
//!
//! ## Core Concepts
//!
//! - **Handle**: a strong, atomically reference-counted claim on a resource.
//!   The resource is destroyed when the last `Handle` is dropped.
//! - **WeakHandle**: an observer that can be promoted back into a `Handle`
//!   only while the resource is still alive.
//! - **Registry**: maps byte-string keys to weak handles. Registering a
//!   resource never keeps it alive; looking it up promotes the entry, and
//!   entries whose resource is gone are purged on the next lookup.
//! - **Global registry**: an optional process-wide slot, installed and torn
//!   down explicitly with `global::init()` and `global::teardown()`.
//!
//! ## Quick Start
//!
//! ```
//! use fibre_registry::{make_key, Handle, Registry};
//!
//! struct Connection {
//!   address: String,
//! }
//!
//! let registry = Registry::init().unwrap();
//! let key = make_key!("tcp://", "10.0.0.7", ":44818").unwrap();
//!
//! // First caller misses, builds the connection and registers it.
//! assert!(registry.get::<Connection>(&key).is_none());
//! let conn = Handle::new(Connection { address: "10.0.0.7".into() });
//! registry.put(&key, &conn).unwrap();
//!
//! // Later callers share it.
//! let shared = registry.get::<Connection>(&key).unwrap();
//! assert!(Handle::ptr_eq(&conn, &shared));
//! assert_eq!(shared.address, "10.0.0.7");
//!
//! // Once every holder lets go, the entry no longer resolves.
//! drop(conn);
//! drop(shared);
//! assert!(registry.get::<Connection>(&key).is_none());
//!
//! registry.teardown();
//! ```

mod builder;
mod error;
pub mod global;
mod key;
mod macros;
mod metrics;
mod rc;
mod registry;

pub use builder::{RegistryBuilder, DEFAULT_CAPACITY};
pub use error::RegistryError;
pub use key::make_key;
pub use metrics::MetricsSnapshot;
pub use rc::{Handle, WeakHandle};
pub use registry::Registry;
