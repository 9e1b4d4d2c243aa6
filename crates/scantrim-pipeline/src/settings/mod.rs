//! Thread-safe per-page settings store.
//!
//! [`Settings`] is shared (via `Arc`) between every worker task and the
//! coordinating thread for the lifetime of a document session. All
//! mutable state sits behind one [`parking_lot::Mutex`]; every
//! operation takes the lock, copies values in or out, and releases it
//! before returning. No reference into the store ever escapes, and no
//! lock is held while a caller runs the analyzer.

mod output;
mod per_page;

use std::collections::BTreeMap;

use parking_lot::Mutex;

pub use output::{
    ColorMode, ColorParams, DespeckleLevel, Dpi, OutputParams, PictureLayer, PropertySet, Zone,
    ZoneProperty, ZoneSet,
};

use crate::params::Params;
use crate::types::PageId;
use per_page::PerPage;

/// Per-page settings for one document session.
#[derive(Debug)]
pub struct Settings {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    params: PerPage<Params>,
    color_params: PerPage<ColorParams>,
    dpi: PerPage<Dpi>,
    despeckle_level: PerPage<DespeckleLevel>,
    output_params: BTreeMap<PageId, OutputParams>,
    picture_zones: BTreeMap<PageId, ZoneSet>,
    fill_zones: BTreeMap<PageId, ZoneSet>,
    default_picture_zone_props: PropertySet,
    default_fill_zone_props: PropertySet,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            params: PerPage::without_default(),
            color_params: PerPage::with_default(ColorParams::default()),
            dpi: PerPage::with_default(Dpi::default()),
            despeckle_level: PerPage::with_default(DespeckleLevel::default()),
            output_params: BTreeMap::new(),
            picture_zones: BTreeMap::new(),
            fill_zones: BTreeMap::new(),
            default_picture_zone_props: PropertySet::default_picture_zone(),
            default_fill_zone_props: PropertySet::default_fill_zone(),
        }
    }
}

impl Inner {
    fn clear(&mut self) {
        self.params.clear();
        self.color_params.clear();
        self.dpi.clear();
        self.despeckle_level.clear();
        self.output_params.clear();
        self.picture_zones.clear();
        self.fill_zones.clear();
        self.default_picture_zone_props = PropertySet::default_picture_zone();
        self.default_fill_zone_props = PropertySet::default_fill_zone();
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl Settings {
    /// Empty store with construction-time defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Remove every per-page entry of every record and restore all
    /// defaults to their construction-time values.
    pub fn clear(&self) {
        self.inner.lock().clear();
        tracing::debug!("settings cleared");
    }

    // ───────────────────────── Content box params ──────────────────────

    /// Cached content box for `page`.
    ///
    /// Returns the explicit entry, else the document-wide value installed
    /// by [`set_params_for_all_pages`](Self::set_params_for_all_pages),
    /// else `None`. A `None` is an ordinary cache miss.
    #[must_use]
    pub fn get_page_params(&self, page: &PageId) -> Option<Params> {
        self.inner.lock().params.get(page)
    }

    /// Insert or replace the cached content box for `page`.
    pub fn set_page_params(&self, page: &PageId, params: Params) {
        tracing::trace!(%page, mode = ?params.mode(), "storing page params");
        self.inner.lock().params.set(page, params);
    }

    /// Forget the cached content box for `page`. Absence is not an error.
    pub fn remove_page_params(&self, page: &PageId) {
        tracing::trace!(%page, "removing page params");
        self.inner.lock().params.remove(page);
    }

    /// Replace every page's content box, including pages without an
    /// entry yet, in one critical section.
    pub fn set_params_for_all_pages(&self, params: &Params) {
        tracing::trace!(mode = ?params.mode(), "storing params for all pages");
        self.inner.lock().params.set_for_all(params);
    }

    /// Number of pages with an explicit content box entry.
    #[must_use]
    pub fn page_params_count(&self) -> usize {
        self.inner.lock().params.len()
    }

    // ───────────────────────── Color params ────────────────────────────

    /// Color parameters for `page`, or the document default.
    #[must_use]
    pub fn color_params(&self, page: &PageId) -> ColorParams {
        self.inner
            .lock()
            .color_params
            .get(page)
            .unwrap_or_default()
    }

    /// Set color parameters for one page.
    pub fn set_color_params(&self, page: &PageId, params: ColorParams) {
        tracing::trace!(%page, "storing color params");
        self.inner.lock().color_params.set(page, params);
    }

    /// Set color parameters for every page and the document default.
    pub fn set_color_params_for_all_pages(&self, params: ColorParams) {
        tracing::trace!("storing color params for all pages");
        self.inner.lock().color_params.set_for_all(&params);
    }

    // ───────────────────────── DPI ─────────────────────────────────────

    /// Output DPI for `page`, or the document default.
    #[must_use]
    pub fn dpi(&self, page: &PageId) -> Dpi {
        self.inner.lock().dpi.get(page).unwrap_or_default()
    }

    /// Set output DPI for one page.
    pub fn set_dpi(&self, page: &PageId, dpi: Dpi) {
        tracing::trace!(%page, ?dpi, "storing dpi");
        self.inner.lock().dpi.set(page, dpi);
    }

    /// Set output DPI for every page and the document default.
    pub fn set_dpi_for_all_pages(&self, dpi: Dpi) {
        tracing::trace!(?dpi, "storing dpi for all pages");
        self.inner.lock().dpi.set_for_all(&dpi);
    }

    // ───────────────────────── Despeckle level ─────────────────────────

    /// Despeckle level for `page`, or the document default.
    #[must_use]
    pub fn despeckle_level(&self, page: &PageId) -> DespeckleLevel {
        self.inner
            .lock()
            .despeckle_level
            .get(page)
            .unwrap_or_default()
    }

    /// Set the despeckle level for one page.
    pub fn set_despeckle_level(&self, page: &PageId, level: DespeckleLevel) {
        tracing::trace!(%page, ?level, "storing despeckle level");
        self.inner.lock().despeckle_level.set(page, level);
    }

    /// Set the despeckle level for every page and the document default.
    pub fn set_despeckle_level_for_all_pages(&self, level: DespeckleLevel) {
        tracing::trace!(?level, "storing despeckle level for all pages");
        self.inner.lock().despeckle_level.set_for_all(&level);
    }

    // ───────────────────────── Output params ───────────────────────────

    /// Parameters the page's output was last rendered with, if any.
    #[must_use]
    pub fn output_params(&self, page: &PageId) -> Option<OutputParams> {
        self.inner.lock().output_params.get(page).cloned()
    }

    /// Record the parameters the page's output was rendered with.
    pub fn set_output_params(&self, page: &PageId, params: OutputParams) {
        tracing::trace!(%page, "storing output params");
        self.inner.lock().output_params.insert(page.clone(), params);
    }

    /// Forget the page's output parameters.
    pub fn remove_output_params(&self, page: &PageId) {
        tracing::trace!(%page, "removing output params");
        self.inner.lock().output_params.remove(page);
    }

    // ───────────────────────── Zones ───────────────────────────────────

    /// Picture zones for `page` (empty if none were set).
    #[must_use]
    pub fn picture_zones_for_page(&self, page: &PageId) -> ZoneSet {
        self.inner
            .lock()
            .picture_zones
            .get(page)
            .cloned()
            .unwrap_or_default()
    }

    /// Fill zones for `page` (empty if none were set).
    #[must_use]
    pub fn fill_zones_for_page(&self, page: &PageId) -> ZoneSet {
        self.inner
            .lock()
            .fill_zones
            .get(page)
            .cloned()
            .unwrap_or_default()
    }

    /// Replace the picture zones of `page`.
    pub fn set_picture_zones(&self, page: &PageId, zones: ZoneSet) {
        tracing::trace!(%page, "storing picture zones");
        self.inner.lock().picture_zones.insert(page.clone(), zones);
    }

    /// Replace the fill zones of `page`.
    pub fn set_fill_zones(&self, page: &PageId, zones: ZoneSet) {
        tracing::trace!(%page, "storing fill zones");
        self.inner.lock().fill_zones.insert(page.clone(), zones);
    }

    /// Properties given to newly drawn picture zones.
    ///
    /// Not persistent: reset by [`clear`](Self::clear).
    #[must_use]
    pub fn default_picture_zone_properties(&self) -> PropertySet {
        self.inner.lock().default_picture_zone_props.clone()
    }

    /// Properties given to newly drawn fill zones.
    #[must_use]
    pub fn default_fill_zone_properties(&self) -> PropertySet {
        self.inner.lock().default_fill_zone_props.clone()
    }

    /// Replace the default picture zone properties.
    pub fn set_default_picture_zone_properties(&self, props: PropertySet) {
        tracing::trace!("storing default picture zone properties");
        self.inner.lock().default_picture_zone_props = props;
    }

    /// Replace the default fill zone properties.
    pub fn set_default_fill_zone_properties(&self, props: PropertySet) {
        tracing::trace!("storing default fill zone properties");
        self.inner.lock().default_fill_zone_props = props;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dependencies::Dependencies;
    use crate::params::Mode;
    use crate::types::{Dimensions, Point, Rect};

    fn page(name: &str) -> PageId {
        PageId::single(name)
    }

    fn params(x: f64, mode: Mode) -> Params {
        Params::new(
            Rect::new(x, x, 100.0, 100.0),
            Dependencies::new(vec![Point::new(0.0, 0.0), Point::new(200.0, 200.0)]),
            mode,
        )
    }

    // --- Content box params ---

    #[test]
    fn empty_store_misses() {
        let settings = Settings::new();
        assert!(settings.get_page_params(&page("a")).is_none());
        assert_eq!(settings.page_params_count(), 0);
    }

    #[test]
    fn set_then_get_returns_same_value() {
        let settings = Settings::new();
        settings.set_page_params(&page("a"), params(1.0, Mode::Auto));
        assert_eq!(
            settings.get_page_params(&page("a")),
            Some(params(1.0, Mode::Auto))
        );
        assert!(settings.get_page_params(&page("b")).is_none());
    }

    #[test]
    fn set_replaces_whole_value() {
        let settings = Settings::new();
        settings.set_page_params(&page("a"), params(1.0, Mode::Auto));
        settings.set_page_params(&page("a"), params(2.0, Mode::Manual));
        assert_eq!(
            settings.get_page_params(&page("a")),
            Some(params(2.0, Mode::Manual))
        );
        assert_eq!(settings.page_params_count(), 1);
    }

    #[test]
    fn remove_missing_page_is_not_an_error() {
        let settings = Settings::new();
        settings.remove_page_params(&page("ghost"));
        settings.set_page_params(&page("a"), params(1.0, Mode::Auto));
        settings.remove_page_params(&page("a"));
        assert!(settings.get_page_params(&page("a")).is_none());
    }

    #[test]
    fn set_params_for_all_pages_reaches_every_page() {
        let settings = Settings::new();
        settings.set_page_params(&page("auto"), params(1.0, Mode::Auto));
        settings.set_page_params(&page("manual"), params(2.0, Mode::Manual));

        let bulk = params(9.0, Mode::Manual);
        settings.set_params_for_all_pages(&bulk);

        for name in ["auto", "manual", "never-seen"] {
            assert_eq!(settings.get_page_params(&page(name)), Some(bulk.clone()));
        }
    }

    #[test]
    fn clear_resets_everything() {
        let settings = Settings::new();
        settings.set_page_params(&page("a"), params(1.0, Mode::Auto));
        settings.set_params_for_all_pages(&params(3.0, Mode::Auto));
        settings.set_dpi_for_all_pages(Dpi::uniform(300));
        settings.set_despeckle_level(&page("a"), DespeckleLevel::Off);
        settings.set_color_params_for_all_pages(ColorParams {
            color_mode: ColorMode::Mixed,
            ..ColorParams::default()
        });
        settings.set_picture_zones(
            &page("a"),
            ZoneSet::new(vec![Zone {
                polygon: vec![Point::new(0.0, 0.0), Point::new(5.0, 0.0), Point::new(5.0, 5.0)],
                properties: PropertySet::default_picture_zone(),
            }]),
        );
        settings.set_fill_zones(&page("a"), ZoneSet::new(vec![]));
        settings.set_default_fill_zone_properties(PropertySet::new(vec![]));

        settings.clear();

        assert!(settings.get_page_params(&page("a")).is_none());
        assert!(settings.get_page_params(&page("b")).is_none());
        assert_eq!(settings.page_params_count(), 0);
        assert_eq!(settings.dpi(&page("a")), Dpi::default());
        assert_eq!(settings.dpi(&page("b")), Dpi::default());
        assert_eq!(settings.despeckle_level(&page("a")), DespeckleLevel::default());
        assert_eq!(settings.color_params(&page("z")), ColorParams::default());
        assert!(settings.picture_zones_for_page(&page("a")).is_empty());
        assert_eq!(
            settings.default_fill_zone_properties(),
            PropertySet::default_fill_zone()
        );
    }

    // --- Auxiliary records ---

    #[test]
    fn dpi_defaults_and_bulk_set() {
        let settings = Settings::new();
        assert_eq!(settings.dpi(&page("a")), Dpi::uniform(600));

        settings.set_dpi(&page("a"), Dpi::uniform(400));
        assert_eq!(settings.dpi(&page("a")), Dpi::uniform(400));
        assert_eq!(settings.dpi(&page("b")), Dpi::uniform(600));

        settings.set_dpi_for_all_pages(Dpi::uniform(300));
        assert_eq!(settings.dpi(&page("a")), Dpi::uniform(300));
        assert_eq!(settings.dpi(&page("b")), Dpi::uniform(300));
    }

    #[test]
    fn color_params_per_page_and_bulk() {
        let settings = Settings::new();
        let mixed = ColorParams {
            color_mode: ColorMode::Mixed,
            ..ColorParams::default()
        };
        settings.set_color_params(&page("a"), mixed);
        assert_eq!(settings.color_params(&page("a")), mixed);
        assert_eq!(settings.color_params(&page("b")), ColorParams::default());

        let gray = ColorParams {
            color_mode: ColorMode::ColorGrayscale,
            threshold_adjustment: -10,
            ..ColorParams::default()
        };
        settings.set_color_params_for_all_pages(gray);
        assert_eq!(settings.color_params(&page("a")), gray);
        assert_eq!(settings.color_params(&page("z")), gray);
    }

    #[test]
    fn despeckle_level_per_page_and_bulk() {
        let settings = Settings::new();
        assert_eq!(settings.despeckle_level(&page("a")), DespeckleLevel::Normal);
        settings.set_despeckle_level(&page("a"), DespeckleLevel::Off);
        assert_eq!(settings.despeckle_level(&page("a")), DespeckleLevel::Off);
        settings.set_despeckle_level_for_all_pages(DespeckleLevel::Aggressive);
        assert_eq!(
            settings.despeckle_level(&page("a")),
            DespeckleLevel::Aggressive
        );
        assert_eq!(
            settings.despeckle_level(&page("b")),
            DespeckleLevel::Aggressive
        );
    }

    #[test]
    fn output_params_set_get_remove() {
        let settings = Settings::new();
        assert!(settings.output_params(&page("a")).is_none());

        let out = OutputParams {
            output_size: Dimensions {
                width: 800,
                height: 1000,
            },
            content_rect: Rect::new(10.0, 10.0, 780.0, 980.0),
            dpi: Dpi::uniform(300),
            color_params: ColorParams::default(),
            despeckle_level: DespeckleLevel::Cautious,
        };
        settings.set_output_params(&page("a"), out.clone());
        assert_eq!(settings.output_params(&page("a")), Some(out));

        settings.remove_output_params(&page("a"));
        assert!(settings.output_params(&page("a")).is_none());
    }

    #[test]
    fn zones_are_independent_per_kind() {
        let settings = Settings::new();
        let zones = ZoneSet::new(vec![Zone {
            polygon: vec![Point::new(0.0, 0.0), Point::new(5.0, 0.0), Point::new(5.0, 5.0)],
            properties: PropertySet::default_picture_zone(),
        }]);
        settings.set_picture_zones(&page("a"), zones.clone());
        assert_eq!(settings.picture_zones_for_page(&page("a")), zones);
        assert!(settings.fill_zones_for_page(&page("a")).is_empty());
        assert!(settings.picture_zones_for_page(&page("b")).is_empty());
    }

    #[test]
    fn default_zone_properties_can_be_replaced() {
        let settings = Settings::new();
        assert_eq!(
            settings.default_picture_zone_properties(),
            PropertySet::default_picture_zone()
        );
        let eraser = PropertySet::new(vec![ZoneProperty::PictureLayer(PictureLayer::Eraser)]);
        settings.set_default_picture_zone_properties(eraser.clone());
        assert_eq!(settings.default_picture_zone_properties(), eraser);
    }

    // --- Concurrency ---

    #[test]
    fn concurrent_writers_on_distinct_pages() {
        let settings = Arc::new(Settings::new());
        std::thread::scope(|scope| {
            for t in 0..8 {
                let settings = Arc::clone(&settings);
                scope.spawn(move || {
                    for i in 0..50 {
                        let id = page(&format!("t{t}-p{i}"));
                        settings.set_page_params(&id, params(f64::from(i), Mode::Auto));
                        assert_eq!(
                            settings.get_page_params(&id),
                            Some(params(f64::from(i), Mode::Auto))
                        );
                    }
                });
            }
        });
        assert_eq!(settings.page_params_count(), 400);
    }

    #[test]
    fn readers_never_observe_torn_bulk_set() {
        let settings = Arc::new(Settings::new());
        let pages: Vec<PageId> = (0..32).map(|i| page(&format!("p{i}"))).collect();
        for p in &pages {
            settings.set_page_params(p, params(0.0, Mode::Auto));
        }
        let allowed = [params(0.0, Mode::Auto), params(7.0, Mode::Manual)];

        std::thread::scope(|scope| {
            let writer = Arc::clone(&settings);
            scope.spawn(move || writer.set_params_for_all_pages(&params(7.0, Mode::Manual)));

            for _ in 0..4 {
                let reader = Arc::clone(&settings);
                let pages = &pages;
                let allowed = &allowed;
                scope.spawn(move || {
                    for _ in 0..100 {
                        for p in pages {
                            let seen = reader.get_page_params(p).unwrap();
                            assert!(allowed.contains(&seen), "torn value {seen:?}");
                        }
                    }
                });
            }
        });

        for p in &pages {
            assert_eq!(
                settings.get_page_params(p),
                Some(params(7.0, Mode::Manual))
            );
        }
    }
}
