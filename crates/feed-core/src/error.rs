use thiserror::Error;

/// Errors surfaced by the remote feed store.
///
/// A missing transaction target is deliberately not represented here: the
/// mutation operations resolve it to a no-op outcome instead of an error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store rejected the write (security rules, ACL).
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// Any other store-side failure.
    #[error("store backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
