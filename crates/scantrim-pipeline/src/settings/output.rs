//! Auxiliary per-page records kept alongside the content box.
//!
//! These are consumed by the output stage further down the pipeline.
//! They share the store's lock and its default / set-for-all-pages
//! semantics but carry no dependency key of their own.

use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, Point, Rect};

/// Output resolution in dots per inch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dpi {
    /// Horizontal DPI.
    pub horizontal: u32,
    /// Vertical DPI.
    pub vertical: u32,
}

impl Dpi {
    /// Same resolution on both axes.
    #[must_use]
    pub const fn uniform(dpi: u32) -> Self {
        Self {
            horizontal: dpi,
            vertical: dpi,
        }
    }
}

impl Default for Dpi {
    fn default() -> Self {
        Self::uniform(600)
    }
}

/// How the output stage renders a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorMode {
    /// 1-bit output.
    #[default]
    BlackAndWhite,
    /// Color or grayscale output, whichever the source is.
    ColorGrayscale,
    /// Black-and-white text with picture zones kept in color.
    Mixed,
}

/// Color rendering parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorParams {
    /// Rendering mode.
    pub color_mode: ColorMode,
    /// Shift applied to the automatic binarization threshold.
    pub threshold_adjustment: i32,
    /// Pad the output with white margins around the content box.
    pub white_margins: bool,
    /// Even out uneven lighting before rendering.
    pub normalize_illumination: bool,
}

impl Default for ColorParams {
    fn default() -> Self {
        Self {
            color_mode: ColorMode::default(),
            threshold_adjustment: 0,
            white_margins: false,
            normalize_illumination: true,
        }
    }
}

/// Speckle removal strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DespeckleLevel {
    /// No speckle removal.
    Off,
    /// Remove only the smallest specks.
    Cautious,
    /// Moderate removal.
    #[default]
    Normal,
    /// Remove anything that is not clearly text.
    Aggressive,
}

/// Parameters the output image was last rendered with.
///
/// Stored so the output stage can tell whether a previously written
/// file is still up to date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputParams {
    /// Size of the rendered image.
    pub output_size: Dimensions,
    /// Content box the image was rendered from.
    pub content_rect: Rect,
    /// Output resolution.
    pub dpi: Dpi,
    /// Color rendering parameters.
    pub color_params: ColorParams,
    /// Speckle removal strength.
    pub despeckle_level: DespeckleLevel,
}

/// What the output stage does inside a picture zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PictureLayer {
    /// Zone is ignored.
    NoOp,
    /// Force the area to be treated as non-picture.
    Eraser,
    /// Auto-detected picture area.
    Painter1,
    /// User-drawn picture area.
    Painter2,
}

/// One property attached to a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneProperty {
    /// Picture handling for the zone.
    PictureLayer(PictureLayer),
    /// Fill the zone with an RGB color.
    FillColor([u8; 3]),
}

/// Set of properties attached to a zone.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PropertySet(Vec<ZoneProperty>);

impl PropertySet {
    /// Create a property set.
    #[must_use]
    pub const fn new(properties: Vec<ZoneProperty>) -> Self {
        Self(properties)
    }

    /// Default properties for newly drawn picture zones.
    #[must_use]
    pub fn default_picture_zone() -> Self {
        Self(vec![ZoneProperty::PictureLayer(PictureLayer::Painter2)])
    }

    /// Default properties for newly drawn fill zones.
    #[must_use]
    pub fn default_fill_zone() -> Self {
        Self(vec![ZoneProperty::FillColor([255, 255, 255])])
    }

    /// All properties.
    #[must_use]
    pub fn properties(&self) -> &[ZoneProperty] {
        &self.0
    }
}

/// A polygonal zone with its properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// Zone outline in output image coordinates.
    pub polygon: Vec<Point>,
    /// Zone properties.
    pub properties: PropertySet,
}

/// All zones of one kind on a page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ZoneSet(Vec<Zone>);

impl ZoneSet {
    /// Create a zone set.
    #[must_use]
    pub const fn new(zones: Vec<Zone>) -> Self {
        Self(zones)
    }

    /// Returns `true` if there are no zones.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All zones.
    #[must_use]
    pub fn zones(&self) -> &[Zone] {
        &self.0
    }
}
