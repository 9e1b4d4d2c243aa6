//! UI hand-off contract.
//!
//! Task results are plain values. The coordinating thread receives them
//! and calls [`TaskResult::update_ui`](crate::TaskResult::update_ui),
//! which posts the page's [`UiData`] to the persistent [`OptionsPanel`]
//! and installs a fresh [`ImageView`]. User edits in the view travel back
//! to the panel over an `mpsc` channel and are committed to
//! [`Settings`] as [`Mode::Manual`] params, so the next task for that
//! page reuses them.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::debug::DebugImages;
use crate::dependencies::Dependencies;
use crate::params::{Mode, Params};
use crate::settings::Settings;
use crate::transform::ImageTransform;
use crate::types::{GrayImage, PageId, Rect};

/// What the options panel displays for one page.
#[derive(Debug, Clone, PartialEq)]
pub struct UiData {
    content_rect: Rect,
    dependencies: Dependencies,
    mode: Mode,
}

impl UiData {
    /// Panel state for the given values.
    #[must_use]
    pub const fn new(content_rect: Rect, dependencies: Dependencies, mode: Mode) -> Self {
        Self {
            content_rect,
            dependencies,
            mode,
        }
    }

    /// Content rectangle shown to the user.
    #[must_use]
    pub const fn content_rect(&self) -> Rect {
        self.content_rect
    }

    /// Dependency key the rectangle was computed under.
    #[must_use]
    pub const fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    /// Whether the rectangle is automatic or user-set.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    pub const fn set_content_rect(&mut self, rect: Rect) {
        self.content_rect = rect;
    }

    pub const fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    /// The params this panel state would persist.
    #[must_use]
    pub fn to_params(&self) -> Params {
        Params::new(self.content_rect, self.dependencies.clone(), self.mode)
    }
}

impl From<Params> for UiData {
    fn from(params: Params) -> Self {
        Self::new(params.content_rect(), params.dependencies().clone(), params.mode())
    }
}

/// A user edit of a page's content rectangle, sent from an [`ImageView`].
#[derive(Debug, Clone, PartialEq)]
pub struct ManualOverride {
    /// Page the edit belongs to.
    pub page: PageId,
    /// New content rectangle.
    pub content_rect: Rect,
    /// Dependency key of the view the edit was made in.
    pub dependencies: Dependencies,
}

// ───── Options panel ─────

/// Per-stage options panel, owned by the UI and reused across pages.
#[derive(Debug)]
pub struct OptionsPanel {
    settings: Arc<Settings>,
    current: Option<(PageId, UiData)>,
    overrides_tx: Sender<ManualOverride>,
    overrides_rx: Receiver<ManualOverride>,
}

impl OptionsPanel {
    /// Panel committing edits to `settings`.
    #[must_use]
    pub fn new(settings: Arc<Settings>) -> Self {
        let (overrides_tx, overrides_rx) = mpsc::channel();
        Self {
            settings,
            current: None,
            overrides_tx,
            overrides_rx,
        }
    }

    /// Show `ui_data` for `page`.
    pub fn post_update_ui(&mut self, page: PageId, ui_data: UiData) {
        self.current = Some((page, ui_data));
    }

    /// Page currently shown, if any.
    #[must_use]
    pub fn page(&self) -> Option<&PageId> {
        self.current.as_ref().map(|(page, _)| page)
    }

    /// Panel state of the current page, if any.
    #[must_use]
    pub fn ui_data(&self) -> Option<&UiData> {
        self.current.as_ref().map(|(_, data)| data)
    }

    /// Channel end image views send their edits to.
    #[must_use]
    pub fn override_sender(&self) -> Sender<ManualOverride> {
        self.overrides_tx.clone()
    }

    /// The user set the current page's content rectangle by hand.
    ///
    /// Returns the committed params, or `None` if no page is shown.
    pub fn manual_content_rect_set(&mut self, rect: Rect) -> Option<Params> {
        let (page, data) = self.current.as_mut()?;
        data.set_content_rect(rect);
        data.set_mode(Mode::Manual);
        let params = data.to_params();
        self.settings.set_page_params(page, params.clone());
        tracing::debug!(%page, ?rect, "manual content rect committed");
        Some(params)
    }

    /// Commit every edit received from image views since the last call.
    ///
    /// Returns the number of edits committed.
    pub fn apply_pending_overrides(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(edit) = self.overrides_rx.try_recv() {
            if let Some((page, data)) = self.current.as_mut()
                && *page == edit.page
            {
                data.set_content_rect(edit.content_rect);
                data.set_mode(Mode::Manual);
            }
            let params = Params::new(edit.content_rect, edit.dependencies, Mode::Manual);
            self.settings.set_page_params(&edit.page, params);
            tracing::debug!(page = %edit.page, rect = ?edit.content_rect, "manual override committed");
            applied += 1;
        }
        applied
    }
}

// ───── Image view ─────

/// Interactive view of one page's content box.
#[derive(Debug)]
pub struct ImageView {
    page: PageId,
    image: GrayImage,
    xform: ImageTransform,
    ui_data: UiData,
    overrides: Sender<ManualOverride>,
}

impl ImageView {
    /// View of `image` under `xform`, reporting edits to `overrides`.
    #[must_use]
    pub const fn new(
        page: PageId,
        image: GrayImage,
        xform: ImageTransform,
        ui_data: UiData,
        overrides: Sender<ManualOverride>,
    ) -> Self {
        Self {
            page,
            image,
            xform,
            ui_data,
            overrides,
        }
    }

    #[must_use]
    pub const fn page(&self) -> &PageId {
        &self.page
    }

    /// Original page raster.
    #[must_use]
    pub const fn image(&self) -> &GrayImage {
        &self.image
    }

    #[must_use]
    pub const fn xform(&self) -> &ImageTransform {
        &self.xform
    }

    /// Content rectangle currently drawn.
    #[must_use]
    pub const fn content_rect(&self) -> Rect {
        self.ui_data.content_rect()
    }

    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.ui_data.mode()
    }

    /// The user dragged the content rectangle to `rect`.
    ///
    /// Returns `false` if the panel the view was wired to is gone.
    pub fn set_content_rect(&mut self, rect: Rect) -> bool {
        self.ui_data.set_content_rect(rect);
        self.ui_data.set_mode(Mode::Manual);
        self.overrides
            .send(ManualOverride {
                page: self.page.clone(),
                content_rect: rect,
                dependencies: self.ui_data.dependencies().clone(),
            })
            .is_ok()
    }
}

// ───── Filter UI ─────

/// The host UI a task result is handed to.
pub trait FilterUi {
    /// The stage's persistent options panel.
    fn options_panel(&mut self) -> &mut OptionsPanel;

    /// Make the options panel visible for the page just posted to it.
    fn show_options_panel(&mut self);

    /// Replace the image area with `view`, plus any debug images.
    fn set_image_view(&mut self, view: ImageView, debug: Option<DebugImages>);
}

/// [`FilterUi`] without a display: keeps the latest view per page.
///
/// Used by batch runs and tests.
#[derive(Debug)]
pub struct HeadlessUi {
    panel: OptionsPanel,
    views: BTreeMap<PageId, ImageView>,
    debug: BTreeMap<PageId, DebugImages>,
    updates: usize,
}

impl HeadlessUi {
    #[must_use]
    pub fn new(settings: Arc<Settings>) -> Self {
        Self {
            panel: OptionsPanel::new(settings),
            views: BTreeMap::new(),
            debug: BTreeMap::new(),
            updates: 0,
        }
    }

    /// Latest view installed for `page`.
    #[must_use]
    pub fn view(&self, page: &PageId) -> Option<&ImageView> {
        self.views.get(page)
    }

    /// Mutable access to the latest view, for simulating user edits.
    pub fn view_mut(&mut self, page: &PageId) -> Option<&mut ImageView> {
        self.views.get_mut(page)
    }

    /// Debug images installed alongside the latest view of `page`.
    #[must_use]
    pub fn debug_images(&self, page: &PageId) -> Option<&DebugImages> {
        self.debug.get(page)
    }

    /// Number of views installed so far.
    #[must_use]
    pub const fn updates(&self) -> usize {
        self.updates
    }

    /// Iterate over the latest view of every page, in page order.
    pub fn views(&self) -> impl Iterator<Item = &ImageView> {
        self.views.values()
    }
}

impl FilterUi for HeadlessUi {
    fn options_panel(&mut self) -> &mut OptionsPanel {
        &mut self.panel
    }

    fn show_options_panel(&mut self) {}

    fn set_image_view(&mut self, view: ImageView, debug: Option<DebugImages>) {
        let page = view.page().clone();
        match debug {
            Some(images) => {
                self.debug.insert(page.clone(), images);
            }
            None => {
                self.debug.remove(&page);
            }
        }
        self.views.insert(page, view);
        self.updates += 1;
    }
}
