//! Unlock tags: the grow-only set a session accumulates from its choices.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// A monotonically growing set of opaque unlock tags.
///
/// Tags are granted by choices and tested by option prerequisites and
/// ending conditions. There is no removal operation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnlockSet {
    tags: FxHashSet<String>,
}

impl UnlockSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the union of this set and `tags`. Granting a tag that is
    /// already present is a no-op.
    pub fn grant<I, S>(&self, tags: I) -> UnlockSet
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut next = self.clone();
        for tag in tags {
            let tag = tag.as_ref();
            if !next.tags.contains(tag) {
                next.tags.insert(tag.to_string());
            }
        }
        next
    }

    /// Returns true if this set has the given tag.
    pub fn has(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Returns true if this set has ALL of the given tags.
    pub fn has_all<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required.iter().all(|tag| self.tags.contains(tag.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Tags in sorted order, for stable display.
    pub fn sorted(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.tags.iter().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}

impl<S: Into<String>> FromIterator<S> for UnlockSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        UnlockSet {
            tags: iter.into_iter().map(Into::into).collect(),
        }
    }
}
