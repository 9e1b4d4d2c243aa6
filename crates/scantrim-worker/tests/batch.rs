//! Batch runs over in-memory pages.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use scantrim_pipeline::{
    CacheOutcome, Cancelled, CancellationToken, ContentAnalyzer, ContentBoxFinder, DebugImages,
    FilterData, FilterUi, HeadlessUi, Mode, PageId, Point, Rect, Settings, TaskConfig, TaskStatus,
};
use scantrim_worker::{BatchRunner, PageJob, WorkerConfig, WorkerError};

/// Real finder behind an invocation counter.
#[derive(Default)]
struct Counted {
    inner: ContentBoxFinder,
    calls: AtomicUsize,
}

impl ContentAnalyzer for Counted {
    fn find_content_box(
        &self,
        status: &dyn TaskStatus,
        data: &FilterData,
        debug: Option<&mut DebugImages>,
    ) -> Result<Rect, Cancelled> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_content_box(status, data, debug)
    }
}

/// Analyzer that panics on every page.
struct Exploding;

impl ContentAnalyzer for Exploding {
    #[allow(clippy::panic)]
    fn find_content_box(
        &self,
        _status: &dyn TaskStatus,
        _data: &FilterData,
        _debug: Option<&mut DebugImages>,
    ) -> Result<Rect, Cancelled> {
        panic!("analyzer failure");
    }
}

/// PNG bytes of a white 120x90 page with a dark block.
fn page_png(x0: u32, y0: u32) -> Vec<u8> {
    let img = image::GrayImage::from_fn(120, 90, |x, y| {
        let inside = (x0..x0 + 30).contains(&x) && (y0..y0 + 20).contains(&y);
        image::Luma([if inside { 10 } else { 245 }])
    });
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    image::ImageEncoder::write_image(
        encoder,
        img.as_raw(),
        img.width(),
        img.height(),
        image::ExtendedColorType::L8,
    )
    .ok();
    buf
}

fn jobs(count: usize) -> Vec<PageJob> {
    (0..count)
        .map(|i| {
            let offset = u32::try_from(i).unwrap() * 5;
            PageJob::from_bytes(
                PageId::single(format!("page-{i:02}.png")),
                page_png(10 + offset, 20),
            )
        })
        .collect()
}

fn runner(settings: &Arc<Settings>, analyzer: Arc<dyn ContentAnalyzer>) -> BatchRunner {
    BatchRunner::new(
        Arc::clone(settings),
        analyzer,
        TaskConfig::default(),
        &WorkerConfig { threads: 3 },
    )
    .unwrap()
}

#[test]
fn second_batch_reuses_every_page() {
    let settings = Arc::new(Settings::new());
    let analyzer = Arc::new(Counted::default());
    let runner = runner(&settings, analyzer.clone());
    let mut ui = HeadlessUi::new(Arc::clone(&settings));
    let token = CancellationToken::new();

    let first = runner.run(jobs(8), &token, &mut ui).unwrap();
    assert_eq!(first.completed(), 8);
    assert_eq!(first.count(CacheOutcome::Recomputed), 8);

    let second = runner.run(jobs(8), &token, &mut ui).unwrap();
    assert_eq!(second.count(CacheOutcome::Reused), 8);

    assert_eq!(analyzer.calls.load(Ordering::SeqCst), 8);
    assert_eq!(settings.page_params_count(), 8);
    assert_eq!(ui.updates(), 16);
    assert_eq!(ui.views().count(), 8);
}

#[test]
fn content_boxes_cover_the_blocks() {
    let settings = Arc::new(Settings::new());
    let runner = runner(&settings, Arc::new(Counted::default()));
    let mut ui = HeadlessUi::new(Arc::clone(&settings));

    runner
        .run(jobs(3), &CancellationToken::new(), &mut ui)
        .unwrap();

    for (i, view) in ui.views().enumerate() {
        let x0 = 10.0 + 5.0 * f64::from(u32::try_from(i).unwrap());
        let rect = view.content_rect();
        assert!(rect.x <= x0 && rect.right() >= x0 + 30.0, "{rect:?}");
        assert!(rect.y <= 20.0 && rect.bottom() >= 40.0, "{rect:?}");
        assert_eq!(view.mode(), Mode::Auto);
    }
}

#[test]
fn cancelled_batch_writes_nothing() {
    let settings = Arc::new(Settings::new());
    let analyzer = Arc::new(Counted::default());
    let runner = runner(&settings, analyzer.clone());
    let mut ui = HeadlessUi::new(Arc::clone(&settings));
    let token = CancellationToken::new();
    token.cancel();

    let summary = runner.run(jobs(5), &token, &mut ui).unwrap();

    assert_eq!(summary.completed(), 0);
    assert_eq!(summary.cancelled.len(), 5);
    assert_eq!(settings.page_params_count(), 0);
    assert_eq!(analyzer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(ui.updates(), 0);
}

#[test]
fn load_failures_are_reported_per_page() {
    let settings = Arc::new(Settings::new());
    let runner = runner(&settings, Arc::new(Counted::default()));
    let mut ui = HeadlessUi::new(Arc::clone(&settings));
    let mut batch = jobs(2);
    batch.push(PageJob::from_bytes(PageId::single("corrupt.png"), vec![0xFF, 0x00, 0x13]));
    batch.push(PageJob::from_file("/nonexistent/scantrim/missing.png"));

    let summary = runner
        .run(batch, &CancellationToken::new(), &mut ui)
        .unwrap();

    assert_eq!(summary.completed(), 2);
    assert_eq!(summary.failed.len(), 2);
    assert!(
        summary
            .failed
            .iter()
            .any(|(page, error)| *page == PageId::single("corrupt.png")
                && error.starts_with("failed to decode image"))
    );
    assert!(
        summary
            .failed
            .iter()
            .any(|(_, error)| error.starts_with("failed to read /nonexistent/scantrim/missing.png"))
    );
}

#[test]
fn manual_edits_between_batches_are_kept() {
    let settings = Arc::new(Settings::new());
    let analyzer = Arc::new(Counted::default());
    let runner = runner(&settings, analyzer.clone());
    let mut ui = HeadlessUi::new(Arc::clone(&settings));
    let token = CancellationToken::new();
    let page = PageId::single("page-00.png");

    runner.run(jobs(1), &token, &mut ui).unwrap();
    let edited = Rect::new(5.0, 5.0, 100.0, 70.0);
    ui.view_mut(&page).unwrap().set_content_rect(edited);
    ui.options_panel().apply_pending_overrides();

    let crop = vec![
        Point::new(2.0, 2.0),
        Point::new(118.0, 2.0),
        Point::new(118.0, 88.0),
        Point::new(2.0, 88.0),
    ];
    let cropped: Vec<PageJob> = jobs(1)
        .into_iter()
        .map(|job| job.with_crop_area(crop.clone()))
        .collect();
    let summary = runner.run(cropped, &token, &mut ui).unwrap();

    assert_eq!(summary.count(CacheOutcome::Refreshed), 1);
    let stored = settings.get_page_params(&page).unwrap();
    assert_eq!(stored.mode(), Mode::Manual);
    assert_eq!(stored.content_rect(), edited);
    assert_eq!(analyzer.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn panicking_worker_surfaces_as_error() {
    let settings = Arc::new(Settings::new());
    let runner = runner(&settings, Arc::new(Exploding));
    let mut ui = HeadlessUi::new(Arc::clone(&settings));

    let result = runner.run(jobs(2), &CancellationToken::new(), &mut ui);

    assert!(matches!(result, Err(WorkerError::TaskPanicked { .. })));
    assert_eq!(settings.page_params_count(), 0);
}

#[test]
fn invalid_config_is_rejected() {
    let config = TaskConfig {
        dependency_tolerance: -1.0,
        ..TaskConfig::default()
    };
    let result = BatchRunner::new(
        Arc::new(Settings::new()),
        Arc::new(Counted::default()),
        config,
        &WorkerConfig::default(),
    );
    assert!(matches!(result, Err(WorkerError::Config(_))));
}

#[test]
fn nan_blur_sigma_is_rejected_before_any_page_runs() {
    let mut config = TaskConfig::default();
    config.finder.blur_sigma = f32::NAN;
    let result = BatchRunner::new(
        Arc::new(Settings::new()),
        Arc::new(Counted::default()),
        config,
        &WorkerConfig::default(),
    );
    assert!(matches!(result, Err(WorkerError::Config(_))));
}
