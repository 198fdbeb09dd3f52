use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Call-site identity: deduplicates identical function/frame combinations
/// within one profile.
///
/// Backed by `Arc<str>` because every aggregate node keeps one and every
/// child map is keyed by it; cloning must not allocate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallUid(Arc<str>);

impl CallUid {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for CallUid {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for CallUid {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl std::ops::Deref for CallUid {
    type Target = str;

    #[inline]
    fn deref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for CallUid {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CallUid {
    #[inline]
    fn from(s: &str) -> Self {
        CallUid(Arc::from(s))
    }
}

impl From<String> for CallUid {
    #[inline]
    fn from(s: String) -> Self {
        CallUid(Arc::from(s))
    }
}

impl std::fmt::Display for CallUid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// Hand-rolled so serde's `rc` feature stays off.

impl Serialize for CallUid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for CallUid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(CallUid::from(s))
    }
}
