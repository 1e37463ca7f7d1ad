//! Public macros for building registry keys.

/// Builds a registry key from a list of fragments.
///
/// Each argument may be a `&str` or an `Option<&str>`; `None` fragments are
/// skipped. Expands to a call to [`make_key`](crate::make_key) and returns its
/// `Result`.
///
/// # Examples
///
/// ```
/// use fibre_registry::make_key;
///
/// let path: Option<&str> = None;
/// let key = make_key!("ab_eip:", "10.0.0.1", path).unwrap();
/// assert_eq!(key, "ab_eip:10.0.0.1");
///
/// assert_eq!(make_key!().unwrap(), "");
/// ```
#[macro_export]
macro_rules! make_key {
  () => {
    $crate::make_key(::core::iter::empty::<::core::option::Option<&str>>())
  };

  ($($fragment:expr),+ $(,)?) => {
    $crate::make_key([$(::core::option::Option::<&str>::from($fragment)),+])
  };
}
