//! Intermediate images collected while analyzing a page.
//!
//! A task that was asked for debug output owns a [`DebugImages`] value,
//! lends it mutably to the analyzer, and then moves it into its
//! [`TaskResult`](crate::TaskResult). Nothing else holds it.

use crate::types::GrayImage;

/// Ordered, labelled intermediate images.
#[derive(Debug, Clone, Default)]
pub struct DebugImages {
    images: Vec<(String, GrayImage)>,
}

impl DebugImages {
    /// Empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an image under `label`.
    pub fn add(&mut self, image: GrayImage, label: impl Into<String>) {
        self.images.push((label.into(), image));
    }

    /// Returns `true` if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Number of collected images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Iterate over `(label, image)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &GrayImage)> {
        self.images.iter().map(|(label, image)| (label.as_str(), image))
    }
}
