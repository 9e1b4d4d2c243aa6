//! Page decoding.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, TIFF, WebP) and produces the
//! grayscale [`FilterData`] the content stage works on.

use image::GrayImage;

use crate::finder::FilterData;
use crate::transform::{ImageTransform, Rotation};
use crate::types::{Dimensions, PipelineError, Point};

/// Decode raw image bytes and convert to grayscale.
///
/// Supports whatever formats the `image` crate was built with. The
/// standard luminance formula is used for RGB-to-gray conversion.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
#[must_use = "returns the decoded grayscale image"]
pub fn decode_page(bytes: &[u8]) -> Result<GrayImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_luma8())
}

/// Decode `bytes` and attach the geometric transform of earlier stages.
///
/// `crop_area`, when present, is a polygon in rotated page coordinates.
///
/// # Errors
///
/// Same as [`decode_page`].
pub fn prepare_page(
    bytes: &[u8],
    rotation: Rotation,
    crop_area: Option<Vec<Point>>,
) -> Result<FilterData, PipelineError> {
    let image = decode_page(bytes)?;
    let mut xform = ImageTransform::new(Dimensions::of(&image)).with_rotation(rotation);
    if let Some(polygon) = crop_area {
        xform = xform.with_crop_area(polygon);
    }
    Ok(FilterData::new(image, xform))
}
