//! Building composite registry keys out of string fragments.

use crate::error::RegistryError;

/// Concatenates every present fragment, in order, with no separator.
///
/// `None` fragments are skipped, which makes it easy to build keys out of
/// optional parts (a protocol, a host, an optional path, ...). The result is
/// sized once up front, so an allocation failure is reported as
/// [`RegistryError::AllocationFailure`] instead of aborting. An empty sequence
/// yields an empty string.
///
/// ```
/// use fibre_registry::make_key;
///
/// let key = make_key([Some("ab_eip:"), None, Some("10.0.0.1")]).unwrap();
/// assert_eq!(key, "ab_eip:10.0.0.1");
/// ```
pub fn make_key<'a, I>(fragments: I) -> Result<String, RegistryError>
where
  I: IntoIterator<Item = Option<&'a str>>,
  I::IntoIter: Clone,
{
  let fragments = fragments.into_iter();

  let total_len: usize = fragments.clone().flatten().map(str::len).sum();

  let mut key = String::new();
  key.try_reserve_exact(total_len).map_err(|err| {
    tracing::error!(total_len, "Unable to allocate key buffer: {}", err);
    RegistryError::AllocationFailure(err)
  })?;

  for fragment in fragments.flatten() {
    key.push_str(fragment);
  }

  Ok(key)
}
