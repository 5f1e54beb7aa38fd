//! Operation key handling.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// A caller-supplied name that identifies one rate limited operation.
///
/// Two wraps under the same key share a quota; distinct keys never do.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationKey(Arc<str>);

impl OperationKey {
    /// Create a new operation key.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OperationKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for OperationKey {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl From<&OperationKey> for OperationKey {
    fn from(key: &OperationKey) -> Self {
        key.clone()
    }
}

impl Borrow<str> for OperationKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
