//! scantrim-export: Pure format serializers (sans-IO)
//!
//! Renders a page's crop area and content box as an SVG overlay.

pub mod svg;

pub use svg::{PageOverlay, SvgMetadata, build_polygon_data, to_svg};
