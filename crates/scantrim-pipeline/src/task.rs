//! One pass of the content selection stage over one page.
//!
//! A [`Task`] looks up the page's stored [`Params`], compares their
//! dependency key against the one derived from the current transform,
//! and then either reuses the stored rectangle, refreshes a manual one,
//! or runs the [`ContentAnalyzer`]. The outcome is written back to
//! [`Settings`] and returned as a [`TaskResult`] for the UI thread.

use std::sync::Arc;

use crate::cancel::{Cancelled, TaskStatus};
use crate::config::TaskConfig;
use crate::debug::DebugImages;
use crate::dependencies::Dependencies;
use crate::diagnostics::{CacheOutcome, Clock, SystemClock, TaskDiagnostics};
use crate::finder::{ContentAnalyzer, FilterData};
use crate::params::{Mode, Params};
use crate::settings::Settings;
use crate::transform::ImageTransform;
use crate::types::{GrayImage, PageId};
use crate::ui::{FilterUi, ImageView, UiData};

/// A single content selection pass for one page.
///
/// Consumed by [`process`](Self::process); create a new task for every
/// pass.
pub struct Task {
    page: PageId,
    settings: Arc<Settings>,
    analyzer: Arc<dyn ContentAnalyzer>,
    dependency_tolerance: f64,
    debug: Option<DebugImages>,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("page", &self.page)
            .field("dependency_tolerance", &self.dependency_tolerance)
            .field("debug", &self.debug.is_some())
            .finish_non_exhaustive()
    }
}

impl Task {
    /// Task for `page` against the shared `settings`.
    #[must_use]
    pub fn new(
        page: PageId,
        settings: Arc<Settings>,
        analyzer: Arc<dyn ContentAnalyzer>,
        config: &TaskConfig,
    ) -> Self {
        Self {
            page,
            settings,
            analyzer,
            dependency_tolerance: config.dependency_tolerance,
            debug: config.debug_images.then(DebugImages::new),
        }
    }

    /// Page this task runs for.
    #[must_use]
    pub const fn page(&self) -> &PageId {
        &self.page
    }

    /// Run the task.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if `status` requested cancellation. When
    /// cancellation is observed before the decision is written, the
    /// settings store is left untouched.
    pub fn process(self, status: &dyn TaskStatus, data: FilterData) -> Result<TaskResult, Cancelled> {
        self.process_with_diagnostics(status, data, &SystemClock)
            .map(|(result, _)| result)
    }

    /// Run the task, also returning timing and cache diagnostics.
    ///
    /// # Errors
    ///
    /// Same as [`process`](Self::process).
    pub fn process_with_diagnostics<C: Clock>(
        mut self,
        status: &dyn TaskStatus,
        data: FilterData,
        clock: &C,
    ) -> Result<(TaskResult, TaskDiagnostics), Cancelled> {
        status.throw_if_cancelled()?;
        let started = clock.now();

        let fresh = Dependencies::from_transform(data.xform());
        let stored = self.settings.get_page_params(&self.page);
        let lookup = clock.elapsed(&started);
        let fingerprint = fresh.fingerprint();

        let (params, outcome, analysis) = match stored {
            Some(params)
                if params
                    .dependencies()
                    .matches_within(&fresh, self.dependency_tolerance) =>
            {
                tracing::debug!(page = %self.page, mode = ?params.mode(), "content box cache hit");
                (params, CacheOutcome::Reused, None)
            }
            Some(params) if params.mode() == Mode::Manual => {
                tracing::debug!(
                    page = %self.page,
                    fingerprint = format_args!("{fingerprint:016x}"),
                    "refreshing dependencies of manual content box"
                );
                let params = params.with_dependencies(fresh);
                status.throw_if_cancelled()?;
                self.settings.set_page_params(&self.page, params.clone());
                (params, CacheOutcome::Refreshed, None)
            }
            stale => {
                tracing::debug!(
                    page = %self.page,
                    stale = stale.is_some(),
                    fingerprint = format_args!("{fingerprint:016x}"),
                    "content box cache miss"
                );
                let analysis_started = clock.now();
                let rect = self
                    .analyzer
                    .find_content_box(status, &data, self.debug.as_mut())?;
                let analysis = clock.elapsed(&analysis_started);
                debug_assert!(rect.is_valid(), "analyzer returned invalid rect {rect:?}");

                let params = Params::new(rect, fresh, Mode::Auto);
                status.throw_if_cancelled()?;
                self.settings.set_page_params(&self.page, params.clone());
                (params, CacheOutcome::Recomputed, Some(analysis))
            }
        };

        status.throw_if_cancelled()?;

        let diagnostics = TaskDiagnostics {
            page: self.page.clone(),
            outcome,
            lookup,
            analysis,
            total: clock.elapsed(&started),
            dependency_fingerprint: fingerprint,
        };
        let (image, xform) = data.into_parts();
        let result = TaskResult {
            page: self.page,
            ui_data: UiData::from(params),
            image,
            xform,
            debug: self.debug,
            outcome,
        };
        Ok((result, diagnostics))
    }
}

/// Outcome of a [`Task`], handed to the coordinating thread.
#[derive(Debug)]
pub struct TaskResult {
    page: PageId,
    ui_data: UiData,
    image: GrayImage,
    xform: ImageTransform,
    debug: Option<DebugImages>,
    outcome: CacheOutcome,
}

impl TaskResult {
    #[must_use]
    pub const fn page(&self) -> &PageId {
        &self.page
    }

    /// Content rectangle, dependencies and mode resolved by the task.
    #[must_use]
    pub const fn ui_data(&self) -> &UiData {
        &self.ui_data
    }

    /// The original page raster.
    #[must_use]
    pub const fn image(&self) -> &GrayImage {
        &self.image
    }

    #[must_use]
    pub const fn xform(&self) -> &ImageTransform {
        &self.xform
    }

    /// Intermediate analyzer images, when collection was enabled.
    #[must_use]
    pub const fn debug_images(&self) -> Option<&DebugImages> {
        self.debug.as_ref()
    }

    #[must_use]
    pub const fn outcome(&self) -> CacheOutcome {
        self.outcome
    }

    /// Whether the analyzer ran for this result.
    #[must_use]
    pub const fn analyzed(&self) -> bool {
        matches!(self.outcome, CacheOutcome::Recomputed)
    }

    /// Present the result in `ui`. Must run on the coordinating thread.
    ///
    /// Posts the panel state, shows the options panel, and installs an
    /// image view wired to the panel so user edits become manual params.
    pub fn update_ui(self, ui: &mut impl FilterUi) {
        let panel = ui.options_panel();
        panel.post_update_ui(self.page.clone(), self.ui_data.clone());
        let overrides = panel.override_sender();
        ui.show_options_panel();

        let view = ImageView::new(self.page, self.image, self.xform, self.ui_data, overrides);
        ui.set_image_view(view, self.debug);
    }
}
