//! Shared types for the content selection stage.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can hand page rasters to
/// the stage without depending on `image` directly.
pub use image::GrayImage;

/// A 2D point in page image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle in page image coordinates.
///
/// The content box produced by the stage is always a `Rect`. A rectangle
/// is [valid](Self::is_valid) when all coordinates are finite and both
/// sides are strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

impl Rect {
    /// Create a rectangle from its top-left corner and size.
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge (`x + width`).
    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge (`y + height`).
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Area in square pixels.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Returns `true` if every coordinate is finite and both sides are
    /// strictly positive.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width > 0.0
            && self.height > 0.0
    }

    /// Smallest rectangle containing all `points`.
    ///
    /// Returns `None` for an empty iterator.
    #[must_use]
    pub fn bounding<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in iter {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }

    /// Grow (positive `margin`) or shrink (negative) on every side.
    #[must_use]
    pub fn adjusted(&self, margin: f64) -> Self {
        Self::new(
            self.x - margin,
            self.y - margin,
            2.0f64.mul_add(margin, self.width),
            2.0f64.mul_add(margin, self.height),
        )
    }

    /// Intersection with `other`, or `None` if they do not overlap.
    #[must_use]
    pub fn intersected(&self, other: &Self) -> Option<Self> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        (right > left && bottom > top).then(|| Self::new(left, top, right - left, bottom - top))
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of a raster image.
    #[must_use]
    pub fn of(image: &GrayImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }
}

/// Identifies one source image: a file plus the page index inside it
/// (multi-page TIFFs carry several pages per file).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ImageId {
    path: PathBuf,
    page: u32,
}

impl ImageId {
    /// Create an image id.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, page: u32) -> Self {
        Self {
            path: path.into(),
            page,
        }
    }

    /// Source file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Zero-based page index inside the source file.
    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }
}

/// Which part of a source image a logical page covers.
///
/// Two-page spreads are split into a left and a right page upstream.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum SubPage {
    /// The whole image is one page.
    #[default]
    Single,
    /// Left half of a spread.
    Left,
    /// Right half of a spread.
    Right,
}

/// Identifier of one logical page in the working set.
///
/// Used as the sole key into [`Settings`](crate::Settings). Totally
/// ordered so per-page maps iterate in document order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageId {
    image: ImageId,
    sub_page: SubPage,
}

impl PageId {
    /// Create a page id.
    #[must_use]
    pub const fn new(image: ImageId, sub_page: SubPage) -> Self {
        Self { image, sub_page }
    }

    /// Shorthand for a single-page image file.
    #[must_use]
    pub fn single(path: impl Into<PathBuf>) -> Self {
        Self::new(ImageId::new(path, 0), SubPage::Single)
    }

    /// The source image.
    #[must_use]
    pub const fn image(&self) -> &ImageId {
        &self.image
    }

    /// Which part of the image this page covers.
    #[must_use]
    pub const fn sub_page(&self) -> SubPage {
        self.sub_page
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.image.path.display(), self.image.page)?;
        match self.sub_page {
            SubPage::Single => Ok(()),
            SubPage::Left => f.write_str("[L]"),
            SubPage::Right => f.write_str("[R]"),
        }
    }
}

/// Errors that can occur while preparing page input for the stage.
///
/// Cancellation is deliberately not part of this enum; see
/// [`Cancelled`](crate::Cancelled).
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Reading the page source failed.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Task configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- Rect tests ---

    #[test]
    fn rect_edges_and_area() {
        let r = Rect::new(10.0, 20.0, 30.0, 40.0);
        assert!((r.right() - 40.0).abs() < f64::EPSILON);
        assert!((r.bottom() - 60.0).abs() < f64::EPSILON);
        assert!((r.area() - 1200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rect_validity() {
        assert!(Rect::new(0.0, 0.0, 1.0, 1.0).is_valid());
        assert!(!Rect::new(0.0, 0.0, 0.0, 1.0).is_valid());
        assert!(!Rect::new(0.0, 0.0, 1.0, -1.0).is_valid());
        assert!(!Rect::new(f64::NAN, 0.0, 1.0, 1.0).is_valid());
        assert!(!Rect::new(0.0, 0.0, f64::INFINITY, 1.0).is_valid());
    }

    #[test]
    fn rect_bounding_of_points() {
        let points = [
            Point::new(5.0, 1.0),
            Point::new(-2.0, 7.0),
            Point::new(3.0, 4.0),
        ];
        let r = Rect::bounding(&points).unwrap();
        assert_eq!(r, Rect::new(-2.0, 1.0, 7.0, 6.0));
    }

    #[test]
    fn rect_bounding_of_nothing_is_none() {
        assert!(Rect::bounding(&[]).is_none());
    }

    #[test]
    fn rect_adjusted_grows_every_side() {
        let r = Rect::new(10.0, 10.0, 20.0, 20.0).adjusted(2.0);
        assert_eq!(r, Rect::new(8.0, 8.0, 24.0, 24.0));
    }

    #[test]
    fn rect_intersection() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);
        assert_eq!(a.intersected(&b), Some(Rect::new(5.0, 5.0, 5.0, 5.0)));

        let far = Rect::new(20.0, 20.0, 1.0, 1.0);
        assert!(a.intersected(&far).is_none());
    }

    // --- PageId tests ---

    #[test]
    fn page_ids_order_by_image_then_sub_page() {
        let a_left = PageId::new(ImageId::new("a.png", 0), SubPage::Left);
        let a_right = PageId::new(ImageId::new("a.png", 0), SubPage::Right);
        let b = PageId::single("b.png");
        assert!(a_left < a_right);
        assert!(a_right < b);
    }

    #[test]
    fn page_id_display() {
        assert_eq!(PageId::single("scan.tif").to_string(), "scan.tif#0");
        let right = PageId::new(ImageId::new("book.tif", 3), SubPage::Right);
        assert_eq!(right.to_string(), "book.tif#3[R]");
    }

    #[test]
    fn page_id_serde_round_trip() {
        let id = PageId::new(ImageId::new("book.tif", 2), SubPage::Left);
        let json = serde_json::to_string(&id).unwrap();
        let back: PageId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    // --- PipelineError tests ---

    #[test]
    fn error_empty_input_display() {
        assert_eq!(
            PipelineError::EmptyInput.to_string(),
            "input image data is empty"
        );
    }

    #[test]
    fn error_invalid_config_display() {
        let err = PipelineError::InvalidConfig("threads must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "invalid configuration: threads must be positive",
        );
    }
}
