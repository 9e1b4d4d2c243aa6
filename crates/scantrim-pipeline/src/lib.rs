//! scantrim-pipeline: content selection stage of a page-processing
//! pipeline (sans-IO).
//!
//! For every page, a [`Task`] decides whether the stored content box is
//! still valid for the page's current geometry, and only runs the
//! [`ContentAnalyzer`] when it is not:
//!
//! 1. Derive the [`Dependencies`] key from the upstream [`ImageTransform`]
//! 2. Look up the page's [`Params`] in the shared [`Settings`] store
//! 3. Reuse matching params, refresh stale manual params, or recompute
//! 4. Write the decision back and hand a [`TaskResult`] to the UI thread
//!
//! Cancellation is cooperative through [`TaskStatus`]. This crate does
//! **no file I/O and spawns no threads**: it operates on in-memory
//! images, and the batch runner lives in `scantrim-worker`.

pub mod cancel;
pub mod config;
pub mod debug;
pub mod decode;
pub mod dependencies;
pub mod diagnostics;
pub mod finder;
pub mod params;
pub mod settings;
pub mod task;
pub mod transform;
pub mod types;
pub mod ui;

pub use cancel::{CancellationToken, Cancelled, NeverCancelled, TaskStatus};
pub use config::TaskConfig;
pub use debug::DebugImages;
pub use decode::{decode_page, prepare_page};
pub use dependencies::Dependencies;
pub use diagnostics::{BatchDiagnostics, CacheOutcome, Clock, SystemClock, TaskDiagnostics};
pub use finder::{ContentAnalyzer, ContentBoxFinder, ContentBoxFinderConfig, FilterData};
pub use params::{Mode, Params};
pub use settings::Settings;
pub use task::{Task, TaskResult};
pub use transform::{ImageTransform, Rotation};
pub use types::{Dimensions, GrayImage, ImageId, PageId, PipelineError, Point, Rect, SubPage};
pub use ui::{FilterUi, HeadlessUi, ImageView, ManualOverride, OptionsPanel, UiData};
