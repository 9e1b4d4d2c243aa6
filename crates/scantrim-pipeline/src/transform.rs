//! Upstream working-area transform.
//!
//! Earlier stages rotate the page and crop it to a working area. The
//! content selection stage only needs the result of that: the polygon,
//! in rotated page coordinates, that the analyzer is allowed to look at.
//! That polygon is also the dependency key of the cached content box.

use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, Point, Rect};

/// Orthogonal pre-rotation applied by an earlier stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    /// No rotation.
    #[default]
    None,
    /// 90 degrees clockwise.
    Cw90,
    /// 180 degrees.
    Rotate180,
    /// 90 degrees counter-clockwise.
    Ccw90,
}

impl Rotation {
    /// Rotation from a clockwise angle in degrees.
    ///
    /// Returns `None` for angles that are not a multiple of 90.
    #[must_use]
    pub const fn from_degrees(degrees: i32) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Self::None),
            90 => Some(Self::Cw90),
            180 => Some(Self::Rotate180),
            270 => Some(Self::Ccw90),
            _ => None,
        }
    }

    /// Dimensions of an image of size `dims` after this rotation.
    #[must_use]
    pub const fn rotate_dimensions(self, dims: Dimensions) -> Dimensions {
        match self {
            Self::None | Self::Rotate180 => dims,
            Self::Cw90 | Self::Ccw90 => Dimensions {
                width: dims.height,
                height: dims.width,
            },
        }
    }
}

/// Transform describing how the page looks after upstream stages.
///
/// Each task owns its own copy; it is cheap to clone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageTransform {
    original_size: Dimensions,
    rotation: Rotation,
    /// Crop polygon in rotated coordinates. `None` means the whole
    /// rotated image.
    crop_area: Option<Vec<Point>>,
}

impl ImageTransform {
    /// Identity transform for an image of the given size.
    #[must_use]
    pub const fn new(original_size: Dimensions) -> Self {
        Self {
            original_size,
            rotation: Rotation::None,
            crop_area: None,
        }
    }

    /// Replace the pre-rotation.
    #[must_use]
    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Restrict the working area to `polygon` (rotated coordinates).
    #[must_use]
    pub fn with_crop_area(mut self, polygon: Vec<Point>) -> Self {
        self.crop_area = Some(polygon);
        self
    }

    /// Size of the unrotated source image.
    #[must_use]
    pub const fn original_size(&self) -> Dimensions {
        self.original_size
    }

    /// The pre-rotation.
    #[must_use]
    pub const fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Size of the image after pre-rotation.
    #[must_use]
    pub const fn rotated_size(&self) -> Dimensions {
        self.rotation.rotate_dimensions(self.original_size)
    }

    /// The working-area polygon in rotated coordinates.
    ///
    /// Without an explicit crop area this is the outline of the whole
    /// rotated image, listed clockwise from the top-left corner.
    #[must_use]
    pub fn resulting_crop_area(&self) -> Vec<Point> {
        if let Some(polygon) = &self.crop_area {
            return polygon.clone();
        }
        let size = self.rotated_size();
        let (w, h) = (f64::from(size.width), f64::from(size.height));
        vec![
            Point::new(0.0, 0.0),
            Point::new(w, 0.0),
            Point::new(w, h),
            Point::new(0.0, h),
        ]
    }

    /// Bounding rectangle of [`resulting_crop_area`](Self::resulting_crop_area),
    /// clipped to the rotated image.
    ///
    /// Falls back to the full rotated image when the crop polygon is
    /// empty or lies entirely outside the image. Always valid: a
    /// zero-sized image yields a one pixel rectangle at the origin.
    #[must_use]
    pub fn crop_bounds(&self) -> Rect {
        let size = self.rotated_size();
        let full = Rect::new(
            0.0,
            0.0,
            f64::from(size.width.max(1)),
            f64::from(size.height.max(1)),
        );
        Rect::bounding(&self.resulting_crop_area())
            .and_then(|r| r.intersected(&full))
            .unwrap_or(full)
    }
}
