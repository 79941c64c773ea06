//! Loading state of an asynchronously resolved source.

use serde::{Deserialize, Serialize};

/// A value that is resolved asynchronously and independently of others.
///
/// `Failed` carries a human-readable cause for logs; consumers must treat it
/// fail-closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "lowercase")]
pub enum Loadable<T> {
    Loading,
    Ready(T),
    Failed(String),
}

impl<T> Loadable<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Loadable::Loading)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Loadable::Ready(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Loadable::Failed(_))
    }

    /// Still loading, or failed and worth asking again.
    pub fn needs_fetch(&self) -> bool {
        !self.is_ready()
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Loadable::Ready(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ref(&self) -> Loadable<&T> {
        match self {
            Loadable::Loading => Loadable::Loading,
            Loadable::Ready(v) => Loadable::Ready(v),
            Loadable::Failed(cause) => Loadable::Failed(cause.clone()),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Loadable<U> {
        match self {
            Loadable::Loading => Loadable::Loading,
            Loadable::Ready(v) => Loadable::Ready(f(v)),
            Loadable::Failed(cause) => Loadable::Failed(cause),
        }
    }
}

impl<T> Default for Loadable<T> {
    fn default() -> Self {
        Loadable::Loading
    }
}

impl<T, E: core::fmt::Display> From<Result<T, E>> for Loadable<T> {
    fn from(value: Result<T, E>) -> Self {
        match value {
            Ok(v) => Loadable::Ready(v),
            Err(e) => Loadable::Failed(e.to_string()),
        }
    }
}
