//! The cached per-page result of content selection.

use serde::{Deserialize, Serialize};

use crate::dependencies::Dependencies;
use crate::types::Rect;

/// Whether a content box was computed or set by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Computed by the analyzer; recomputed when dependencies change.
    #[default]
    Auto,
    /// User override; the rectangle survives dependency changes.
    Manual,
}

/// Content box plus the dependency key that produced it.
///
/// Immutable once built. The settings store replaces whole values, so a
/// reader never sees a rectangle paired with the wrong key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Params {
    content_rect: Rect,
    dependencies: Dependencies,
    mode: Mode,
}

impl Params {
    /// Build a cached result.
    #[must_use]
    pub const fn new(content_rect: Rect, dependencies: Dependencies, mode: Mode) -> Self {
        Self {
            content_rect,
            dependencies,
            mode,
        }
    }

    /// The content box.
    #[must_use]
    pub const fn content_rect(&self) -> Rect {
        self.content_rect
    }

    /// The key this result was computed under.
    #[must_use]
    pub const fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    /// Automatic or manual.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Same rectangle and mode under a new key.
    #[must_use]
    pub fn with_dependencies(self, dependencies: Dependencies) -> Self {
        Self {
            dependencies,
            ..self
        }
    }
}
