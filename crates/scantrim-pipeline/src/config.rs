//! Task configuration.

use serde::{Deserialize, Serialize};

use crate::finder::ContentBoxFinderConfig;
use crate::types::PipelineError;

/// Configuration of a content selection task.
///
/// All parameters have sensible defaults; the bench CLI can also accept
/// the whole struct as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Absolute tolerance, in pixels, when comparing a stored dependency
    /// key against a fresh one. `0.0` means exact equality.
    pub dependency_tolerance: f64,

    /// Whether tasks collect intermediate analyzer images.
    pub debug_images: bool,

    /// Tuning of the default content box finder.
    pub finder: ContentBoxFinderConfig,
}

impl TaskConfig {
    /// Default dependency tolerance (exact comparison).
    pub const DEFAULT_DEPENDENCY_TOLERANCE: f64 = 0.0;

    /// Check parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the dependency
    /// tolerance or margin is negative or not finite, the blur sigma is
    /// not finite, or the minimum content fraction lies outside
    /// `0.0..=1.0`.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.dependency_tolerance.is_finite() || self.dependency_tolerance < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "dependency_tolerance must be finite and non-negative, got {}",
                self.dependency_tolerance
            )));
        }
        if !self.finder.blur_sigma.is_finite() {
            return Err(PipelineError::InvalidConfig(format!(
                "finder.blur_sigma must be finite, got {}",
                self.finder.blur_sigma
            )));
        }
        if !(0.0..=1.0).contains(&self.finder.min_content_fraction) {
            return Err(PipelineError::InvalidConfig(format!(
                "finder.min_content_fraction must be within 0.0..=1.0, got {}",
                self.finder.min_content_fraction
            )));
        }
        if !self.finder.margin_px.is_finite() || self.finder.margin_px < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "finder.margin_px must be finite and non-negative, got {}",
                self.finder.margin_px
            )));
        }
        Ok(())
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            dependency_tolerance: Self::DEFAULT_DEPENDENCY_TOLERANCE,
            debug_images: false,
            finder: ContentBoxFinderConfig::default(),
        }
    }
}
