//! One per-page record with a document-wide default.
//!
//! Not synchronized: [`Settings`](super::Settings) owns several of these
//! behind its single lock.

use std::collections::BTreeMap;

use crate::types::PageId;

#[derive(Debug, Clone)]
pub(crate) struct PerPage<V> {
    entries: BTreeMap<PageId, V>,
    default: Option<V>,
    initial_default: Option<V>,
}

impl<V: Clone> PerPage<V> {
    /// Record whose absent pages read as `default`.
    pub(crate) fn with_default(default: V) -> Self {
        Self {
            entries: BTreeMap::new(),
            default: Some(default.clone()),
            initial_default: Some(default),
        }
    }

    /// Record whose absent pages read as `None` until
    /// [`set_for_all`](Self::set_for_all) installs a default.
    pub(crate) const fn without_default() -> Self {
        Self {
            entries: BTreeMap::new(),
            default: None,
            initial_default: None,
        }
    }

    pub(crate) fn get(&self, page: &PageId) -> Option<V> {
        self.entries.get(page).or(self.default.as_ref()).cloned()
    }

    pub(crate) fn set(&mut self, page: &PageId, value: V) {
        self.entries.insert(page.clone(), value);
    }

    pub(crate) fn remove(&mut self, page: &PageId) {
        self.entries.remove(page);
    }

    /// Overwrite every explicit entry and the default.
    pub(crate) fn set_for_all(&mut self, value: &V) {
        for entry in self.entries.values_mut() {
            entry.clone_from(value);
        }
        self.default = Some(value.clone());
    }

    /// Drop all entries and restore the construction-time default.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.default.clone_from(&self.initial_default);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
