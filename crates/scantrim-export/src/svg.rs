//! SVG overlay serializer.
//!
//! Draws one page's geometry as an SVG document in rotated page
//! coordinates, using the [`svg`] crate for document construction, XML
//! escaping, and path data formatting:
//!
//! - the page bounds as a light background `<rect>`
//! - the crop area as a closed dashed `<path>`
//! - the content box as a `<rect>`, blue for automatic and orange for
//!   manual boxes
//!
//! Optional [`SvgMetadata`] embeds `<title>`, `<desc>` and a namespaced
//! `<metadata>` element carrying the stage configuration.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Description, Element, Group, Path, Rectangle, Title};
use svg::node::{Node, Text, Value};

use scantrim_pipeline::{Dimensions, ImageView, Mode, Point, Rect};

/// Stroke colour of automatic content boxes.
const AUTO_COLOR: &str = "#1f6feb";
/// Stroke colour of manual content boxes.
const MANUAL_COLOR: &str = "#d97706";

/// Metadata to embed in the SVG document.
///
/// All fields are optional. Text values are XML-escaped automatically
/// by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    ///
    /// Typically the page id.
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Serialized task configuration, emitted inside a `<metadata>`
    /// element wrapped in a namespaced `<scantrim:stage>` element.
    pub config_json: Option<&'a str>,
}

/// The geometry of one page to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct PageOverlay {
    /// Page size after pre-rotation.
    pub dimensions: Dimensions,
    /// Crop polygon in rotated page coordinates.
    pub crop_area: Vec<Point>,
    /// Detected or user-set content box.
    pub content_rect: Rect,
    pub mode: Mode,
}

impl PageOverlay {
    /// Overlay of what `view` currently shows.
    #[must_use]
    pub fn from_view(view: &ImageView) -> Self {
        Self {
            dimensions: view.xform().rotated_size(),
            crop_area: view.xform().resulting_crop_area(),
            content_rect: view.content_rect(),
            mode: view.mode(),
        }
    }
}

/// Build a closed SVG path `d` attribute string from a polygon.
///
/// Returns an empty string for polygons with fewer than 3 points.
///
/// # Examples
///
/// ```
/// use scantrim_pipeline::Point;
/// use scantrim_export::build_polygon_data;
///
/// let d = build_polygon_data(&[
///     Point::new(0.0, 0.0),
///     Point::new(10.0, 0.0),
///     Point::new(10.0, 5.0),
/// ]);
/// assert!(d.starts_with("M0,0 L10,0 L10,5"));
/// ```
#[must_use]
pub fn build_polygon_data(points: &[Point]) -> String {
    let [first, rest @ ..] = points else {
        return String::new();
    };
    if rest.len() < 2 {
        return String::new();
    }

    let mut data = Data::new().move_to((first.x, first.y));
    for p in rest {
        data = data.line_to((p.x, p.y));
    }
    String::from(Value::from(data.close()))
}

/// Serialize a page overlay into an SVG string.
///
/// The `viewBox` spans the rotated page in pixels.
#[must_use]
pub fn to_svg(overlay: &PageOverlay, metadata: &SvgMetadata<'_>) -> String {
    let w = overlay.dimensions.width;
    let h = overlay.dimensions.height;
    let mut doc = Document::new()
        .set("width", w)
        .set("height", h)
        .set("viewBox", (0, 0, w, h));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }

    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    if let Some(config_json) = metadata.config_json {
        let mut stage_el = Element::new("scantrim:stage");
        stage_el.assign("xmlns:scantrim", "https://scantrim.dev/ns/1");
        stage_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(stage_el);
        doc = doc.add(metadata_el);
    }

    doc = doc.add(
        Rectangle::new()
            .set("id", "page")
            .set("width", w)
            .set("height", h)
            .set("fill", "#f6f6f6"),
    );

    let crop = build_polygon_data(&overlay.crop_area);
    if !crop.is_empty() {
        doc = doc.add(
            Path::new()
                .set("id", "crop-area")
                .set("d", crop)
                .set("fill", "none")
                .set("stroke", "#555555")
                .set("stroke-dasharray", "4 2")
                .set("stroke-width", 1),
        );
    }

    let rect = overlay.content_rect;
    let (mode, color) = match overlay.mode {
        Mode::Auto => ("auto", AUTO_COLOR),
        Mode::Manual => ("manual", MANUAL_COLOR),
    };
    doc = doc.add(
        Group::new().set("id", "content-box").set("data-mode", mode).add(
            Rectangle::new()
                .set("x", rect.x)
                .set("y", rect.y)
                .set("width", rect.width)
                .set("height", rect.height)
                .set("fill", color)
                .set("fill-opacity", 0.15)
                .set("stroke", color)
                .set("stroke-width", 2),
        ),
    );

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}
