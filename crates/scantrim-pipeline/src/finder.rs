//! Content box detection.
//!
//! [`ContentAnalyzer`] is the contract a task invokes the analysis
//! under: deterministic, callable from any worker thread, and polling
//! the run's [`TaskStatus`] during expensive work. [`ContentBoxFinder`]
//! is the default implementation:
//!
//! 1. Apply the upstream pre-rotation
//! 2. Restrict to the working area's bounding box
//! 3. Gaussian blur (noise and dust reduction)
//! 4. Otsu binarization
//! 5. Bounding box of dark pixels, grown by a small margin
//!
//! Pages without enough dark pixels (blank pages, flat scans) yield the
//! whole working area, so callers always receive a valid rectangle. An
//! empty image yields a one pixel rectangle at the origin.

use image::imageops;
use serde::{Deserialize, Serialize};

use crate::cancel::{Cancelled, TaskStatus};
use crate::debug::DebugImages;
use crate::transform::{ImageTransform, Rotation};
use crate::types::{GrayImage, Rect};

/// Per-task input: the page raster and the upstream transform.
///
/// Each task owns its own copy, so no image buffer is shared between
/// worker threads.
#[derive(Debug, Clone)]
pub struct FilterData {
    image: GrayImage,
    xform: ImageTransform,
}

impl FilterData {
    /// Bundle a page raster with its transform.
    #[must_use]
    pub const fn new(image: GrayImage, xform: ImageTransform) -> Self {
        Self { image, xform }
    }

    /// The unrotated source raster.
    #[must_use]
    pub const fn image(&self) -> &GrayImage {
        &self.image
    }

    /// The upstream transform.
    #[must_use]
    pub const fn xform(&self) -> &ImageTransform {
        &self.xform
    }

    /// Split into owned parts.
    #[must_use]
    pub fn into_parts(self) -> (GrayImage, ImageTransform) {
        (self.image, self.xform)
    }
}

/// Computes the content box of a page.
///
/// Implementations must return a [valid](Rect::is_valid) rectangle
/// inside the working area for every input, and must surface a
/// cancellation request as `Err(Cancelled)` rather than a partial
/// result.
pub trait ContentAnalyzer: Send + Sync {
    /// Find the content box of `data` in rotated page coordinates.
    ///
    /// When `debug` is `Some`, intermediate images may be appended to it.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if `status` requested cancellation before
    /// the analysis finished.
    fn find_content_box(
        &self,
        status: &dyn TaskStatus,
        data: &FilterData,
        debug: Option<&mut DebugImages>,
    ) -> Result<Rect, Cancelled>;
}

/// Tuning parameters for [`ContentBoxFinder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentBoxFinderConfig {
    /// Gaussian blur sigma applied before binarization. Non-positive
    /// values disable the blur.
    pub blur_sigma: f32,
    /// Minimum share of dark pixels in the working area for the page to
    /// count as having content.
    pub min_content_fraction: f64,
    /// Margin in pixels added around the detected box.
    pub margin_px: f64,
    /// Number of rows scanned between two cancellation checks.
    pub cancel_poll_rows: u32,
}

impl ContentBoxFinderConfig {
    /// Default blur sigma.
    pub const DEFAULT_BLUR_SIGMA: f32 = 1.0;
    /// Default minimum dark-pixel share.
    pub const DEFAULT_MIN_CONTENT_FRACTION: f64 = 0.0005;
    /// Default margin around the detected box.
    pub const DEFAULT_MARGIN_PX: f64 = 2.0;
    /// Default cancellation poll interval.
    pub const DEFAULT_CANCEL_POLL_ROWS: u32 = 64;
}

impl Default for ContentBoxFinderConfig {
    fn default() -> Self {
        Self {
            blur_sigma: Self::DEFAULT_BLUR_SIGMA,
            min_content_fraction: Self::DEFAULT_MIN_CONTENT_FRACTION,
            margin_px: Self::DEFAULT_MARGIN_PX,
            cancel_poll_rows: Self::DEFAULT_CANCEL_POLL_ROWS,
        }
    }
}

/// Default [`ContentAnalyzer`]: Otsu binarization plus dark-pixel bounds.
#[derive(Debug, Clone, Default)]
pub struct ContentBoxFinder {
    config: ContentBoxFinderConfig,
}

impl ContentBoxFinder {
    /// Finder with the given tuning parameters.
    #[must_use]
    pub const fn new(config: ContentBoxFinderConfig) -> Self {
        Self { config }
    }

    /// The tuning parameters.
    #[must_use]
    pub const fn config(&self) -> &ContentBoxFinderConfig {
        &self.config
    }
}

impl ContentAnalyzer for ContentBoxFinder {
    fn find_content_box(
        &self,
        status: &dyn TaskStatus,
        data: &FilterData,
        debug: Option<&mut DebugImages>,
    ) -> Result<Rect, Cancelled> {
        status.throw_if_cancelled()?;

        let rotated = rotate(data.image(), data.xform().rotation());
        let area = data.xform().crop_bounds();
        let (x0, y0, w, h) = pixel_bounds(&area, rotated.width(), rotated.height());
        if w == 0 || h == 0 {
            return Ok(area);
        }

        let region = imageops::crop_imm(&rotated, x0, y0, w, h).to_image();
        let smooth = blur(&region, self.config.blur_sigma);
        status.throw_if_cancelled()?;

        let level = imageproc::contrast::otsu_level(&smooth);
        let scan = scan_dark_pixels(&smooth, level, self.config.cancel_poll_rows, status)?;

        if let Some(dbg) = debug {
            dbg.add(scan.binarized, "binarized");
        }

        let total = f64::from(w) * f64::from(h);
        #[allow(clippy::cast_precision_loss)]
        let dark_share = scan.dark_count as f64 / total;
        let Some((min_x, min_y, max_x, max_y)) = scan.bounds else {
            return Ok(area);
        };
        if !scan.has_contrast || dark_share < self.config.min_content_fraction {
            return Ok(area);
        }

        let found = Rect::new(
            f64::from(x0 + min_x),
            f64::from(y0 + min_y),
            f64::from(max_x - min_x + 1),
            f64::from(max_y - min_y + 1),
        )
        .adjusted(self.config.margin_px);

        Ok(found.intersected(&area).unwrap_or(area))
    }
}

/// Apply an orthogonal pre-rotation.
fn rotate(image: &GrayImage, rotation: Rotation) -> GrayImage {
    match rotation {
        Rotation::None => image.clone(),
        Rotation::Cw90 => imageops::rotate90(image),
        Rotation::Rotate180 => imageops::rotate180(image),
        Rotation::Ccw90 => imageops::rotate270(image),
    }
}

/// Gaussian blur that treats a non-positive or non-finite sigma as
/// "off", since `imageproc` panics unless `sigma > 0.0`.
fn blur(image: &GrayImage, sigma: f32) -> GrayImage {
    if !sigma.is_finite() || sigma <= 0.0 {
        return image.clone();
    }
    imageproc::filter::gaussian_blur_f32(image, sigma)
}

/// Integer pixel window `(x, y, width, height)` covering `rect`,
/// clamped to a `width` x `height` image.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn pixel_bounds(rect: &Rect, width: u32, height: u32) -> (u32, u32, u32, u32) {
    let clamp = |v: f64, max: u32| v.clamp(0.0, f64::from(max)) as u32;
    let x0 = clamp(rect.x.floor(), width);
    let y0 = clamp(rect.y.floor(), height);
    let x1 = clamp(rect.right().ceil(), width);
    let y1 = clamp(rect.bottom().ceil(), height);
    (x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
}

/// Result of one pass over a binarized region.
struct DarkScan {
    /// `(min_x, min_y, max_x, max_y)` of dark pixels, region-relative.
    bounds: Option<(u32, u32, u32, u32)>,
    dark_count: u64,
    /// `false` when every pixel had the same value.
    has_contrast: bool,
    /// Dark pixels as 0, everything else as 255.
    binarized: GrayImage,
}

fn scan_dark_pixels(
    image: &GrayImage,
    level: u8,
    poll_rows: u32,
    status: &dyn TaskStatus,
) -> Result<DarkScan, Cancelled> {
    let poll_rows = poll_rows.max(1);
    let mut binarized = GrayImage::new(image.width(), image.height());
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    let mut dark_count = 0u64;
    let (mut lo, mut hi) = (u8::MAX, u8::MIN);

    for (y, row) in image.enumerate_rows() {
        if y % poll_rows == 0 {
            status.throw_if_cancelled()?;
        }
        for (x, _, pixel) in row {
            let value = pixel.0[0];
            lo = lo.min(value);
            hi = hi.max(value);
            let dark = value <= level;
            binarized.put_pixel(x, y, image::Luma([if dark { 0 } else { 255 }]));
            if dark {
                dark_count += 1;
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }
    }

    Ok(DarkScan {
        bounds,
        dark_count,
        has_contrast: lo < hi,
        binarized,
    })
}
