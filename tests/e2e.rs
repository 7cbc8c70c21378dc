//! End-to-end tests against a real tesseract install and a live model server.
//!
//! Gated behind `E2E_ENABLED` so they do not run in CI unless explicitly
//! requested. Scans go in `./test_cases/scans/`; outputs land in
//! `./test_cases/output/`.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture
//!
//! Point at another server or model with `SCANSCRIBE_ENDPOINT` /
//! `SCANSCRIBE_MODEL`.

use image::{ImageBuffer, Luma};
use scanscribe::output::is_flattened_remote_error;
use scanscribe::{run_batch, BatchConfig, PipelineMode, TesseractExtractor, TextExtractor};
use std::path::PathBuf;
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn scans_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/scans")
}

fn output_dir(name: &str) -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("test_cases/output")
        .join(name);
    std::fs::create_dir_all(&d).ok();
    d
}

/// Skip unless E2E_ENABLED is set and the scans directory has images.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let dir = scans_dir();
        let has_images = std::fs::read_dir(&dir)
            .map(|rd| {
                rd.filter_map(Result::ok)
                    .any(|e| scanscribe::pipeline::input::has_image_extension(&e.path()))
            })
            .unwrap_or(false);
        if !has_images {
            println!("SKIP — no .png/.jpg scans in {}", dir.display());
            return;
        }
        dir
    }};
}

fn live_config(mode: PipelineMode) -> BatchConfig {
    let mut builder = BatchConfig::builder()
        .mode(mode)
        .max_attempts(2)
        .retry_delay(Duration::from_secs(2));
    if let Ok(url) = std::env::var("SCANSCRIBE_ENDPOINT") {
        builder = builder.endpoint_url(url);
    }
    if let Ok(model) = std::env::var("SCANSCRIBE_MODEL") {
        builder = builder.model(model);
    }
    if let Ok(lang) = std::env::var("SCANSCRIBE_LANG") {
        builder = builder.ocr_language(lang);
    }
    builder.build().expect("valid config")
}

/// Assert a transcription looks like text rather than an error marker.
fn assert_transcription_quality(text: &str, context: &str) {
    assert!(!text.trim().is_empty(), "[{context}] transcription is empty");
    assert!(
        !is_flattened_remote_error(text),
        "[{context}] remote call failed: {text}"
    );
    let first_line = text.lines().next().unwrap_or("");
    assert!(
        !first_line.starts_with("```"),
        "[{context}] output must not start with a code fence, got: {first_line:?}"
    );
    println!("[{context}] ✓  {} bytes", text.len());
}

/// Check every per-item final transcription in `out`.
fn assert_final_files_quality(out: &std::path::Path) {
    let mut checked = 0;
    for entry in std::fs::read_dir(out).unwrap() {
        let path = entry.unwrap().path();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        if name.ends_with("_ollama.txt") {
            let text = std::fs::read_to_string(&path).unwrap();
            assert_transcription_quality(&text, &name);
            checked += 1;
        }
    }
    assert!(checked > 0, "no _ollama.txt files in {}", out.display());
}

// ── Local OCR only ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_tesseract_reads_blank_page() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP");
        return;
    }

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("blank.png");
    ImageBuffer::<Luma<u8>, _>::from_pixel(200, 100, Luma([255u8]))
        .save(&path)
        .unwrap();

    let text = TesseractExtractor::new("tesseract", "eng")
        .extract(&path)
        .await
        .expect("tesseract should run on a blank page");
    assert!(text.trim().is_empty(), "blank page produced {text:?}");
}

#[tokio::test]
async fn test_tesseract_unknown_language_fails() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP");
        return;
    }

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("blank.png");
    ImageBuffer::<Luma<u8>, _>::from_pixel(50, 50, Luma([255u8]))
        .save(&path)
        .unwrap();

    let result = TesseractExtractor::new("tesseract", "definitely_not_a_lang")
        .extract(&path)
        .await;
    assert!(result.is_err(), "unknown traineddata should fail");
}

// ── Full batch (needs model server) ──────────────────────────────────────────

#[tokio::test]
async fn test_single_step_batch() {
    let scans = e2e_skip_unless_ready!();
    let out = output_dir("single");

    let summary = run_batch(&scans, &out, &live_config(PipelineMode::SingleStep))
        .await
        .expect("batch should complete");

    println!("{summary:#?}");
    assert_eq!(summary.processed + summary.skipped, summary.total);
    assert_eq!(summary.remote_failures, 0, "no item should fail remotely");

    assert_final_files_quality(&out);
    assert!(out.join("all_ollama_results.txt").exists());
}

#[tokio::test]
async fn test_two_step_batch_then_resume() {
    let scans = e2e_skip_unless_ready!();
    let out = output_dir("two_step");
    let config = live_config(PipelineMode::TwoStep);

    let first = run_batch(&scans, &out, &config)
        .await
        .expect("batch should complete");
    assert_eq!(first.remote_failures, 0);
    assert!(out.join("all_ollama_intermediate_results.txt").exists());

    assert_final_files_quality(&out);

    let corpus_before = std::fs::read(out.join("all_ollama_results.txt")).unwrap();
    let second = run_batch(&scans, &out, &config)
        .await
        .expect("resumed batch should complete");
    assert_eq!(second.processed, 0, "everything was already done");
    assert_eq!(second.skipped, second.total);
    assert_eq!(
        std::fs::read(out.join("all_ollama_results.txt")).unwrap(),
        corpus_before
    );
}
