//! ExportOptions, RecognizeOptions, and PipelineOptions tests.

use std::sync::Arc;

use sub2srt::{
    CancellationToken, DEFAULT_CHARACTER_WHITELIST, DEFAULT_CODEC, ExportOptions, OcrSettings,
    PipelineOptions, ProgressCallback, ProgressInfo, RecognizeOptions, SelectionMode,
    language_allow_list,
};

// ── RecognizeOptions builder ─────────────────────────────────────

#[test]
fn recognize_defaults() {
    let options = RecognizeOptions::new();
    let debug = format!("{options:?}");
    assert!(debug.contains("RecognizeOptions"));
    assert!(debug.contains("has_cancellation: false"));
    assert!(debug.contains("batch_size: 1"));
    assert_eq!(options.limit(), None);
    assert!(!options.overwrite());
}

#[test]
fn recognize_with_batch_size_clamps_zero() {
    let options = RecognizeOptions::new().with_batch_size(0);
    let debug = format!("{options:?}");
    // Clamped to 1.
    assert!(debug.contains("batch_size: 1"));

    let options = RecognizeOptions::new().with_batch_size(25);
    assert!(format!("{options:?}").contains("batch_size: 25"));
}

#[test]
fn recognize_with_limit_and_overwrite() {
    let options = RecognizeOptions::new()
        .with_limit(Some(50))
        .with_overwrite(true);
    assert_eq!(options.limit(), Some(50));
    assert!(options.overwrite());
}

#[test]
fn recognize_with_cancellation() {
    let options = RecognizeOptions::new().with_cancellation(CancellationToken::new());
    assert!(format!("{options:?}").contains("has_cancellation: true"));
}

#[test]
fn recognize_with_progress_callback() {
    struct Noop;
    impl ProgressCallback for Noop {
        fn on_progress(&self, _info: &ProgressInfo) {}
    }

    let options = RecognizeOptions::new().with_progress(Arc::new(Noop));
    assert!(format!("{options:?}").contains("has_progress: true"));
}

// ── OcrSettings ──────────────────────────────────────────────────

#[test]
fn ocr_defaults_match_single_block_layout() {
    let settings = OcrSettings::default();
    assert_eq!(settings.engine_mode, 3);
    assert_eq!(settings.page_segmentation, 6);
    assert_eq!(settings.whitelist, DEFAULT_CHARACTER_WHITELIST);
    assert_eq!(settings.model, None);
    assert!(settings.whitelist.contains('♪'));
}

#[test]
fn recognize_with_ocr_settings() {
    let options = RecognizeOptions::new().with_ocr(OcrSettings {
        model: Some("deu".to_string()),
        ..OcrSettings::default()
    });
    assert!(format!("{options:?}").contains("model: Some(\"deu\")"));
}

// ── ExportOptions ────────────────────────────────────────────────

#[test]
fn export_defaults() {
    let options = ExportOptions::new();
    let debug = format!("{options:?}");
    assert!(debug.contains("selection: First"));
    assert!(debug.contains(DEFAULT_CODEC));
    assert!(debug.contains("live_window: None"));
}

#[test]
fn export_builder_round_trip() {
    let options = ExportOptions::new()
        .with_selection(SelectionMode::PreferDefault)
        .with_languages(language_allow_list(&["ja"]).expect("Japanese resolves"))
        .with_codecs(vec!["S_VOBSUB".to_string()])
        .with_live_window(Some(12));
    let debug = format!("{options:?}");
    assert!(debug.contains("selection: PreferDefault"));
    assert!(debug.contains("\"jpn\""));
    assert!(debug.contains("S_VOBSUB"));
    assert!(debug.contains("live_window: Some(12)"));
}

// ── PipelineOptions ──────────────────────────────────────────────

#[test]
fn pipeline_cancellation_reaches_recognition() {
    let token = CancellationToken::new();
    let options = PipelineOptions::new("out").with_cancellation(token.clone());
    let debug = format!("{options:?}");
    assert!(debug.contains("has_cancellation: true"));

    token.cancel();
    assert!(options.cancellation().is_cancelled());
}

#[test]
fn pipeline_queue_capacity_clamps_zero() {
    let options = PipelineOptions::new("out").with_queue_capacity(0);
    assert!(format!("{options:?}").contains("queue_capacity: 1"));

    let options = PipelineOptions::new("out");
    assert!(format!("{options:?}").contains("queue_capacity: 20"));
}
