//! End-to-end pipeline tests against a scripted browser session

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use visreg::raster::{self, RasterImage};
use visreg::session::{CropArea, Session};
use visreg::store::SnapshotStore;
use visreg::{runner, Error, Example, Result, RunConfig, Viewport};

static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "visreg-pipeline-test-{}-{}",
        std::process::id(),
        NEXT_DIR.fetch_add(1, Ordering::SeqCst)
    ));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn screenshot_png(width: u32, height: u32, fill: u8) -> Vec<u8> {
    let image = RasterImage::new(
        width,
        height,
        vec![fill; width as usize * height as usize * 4],
    )
    .unwrap();
    raster::encode(&image).expect("encode")
}

/// What the scripted session observed, shared with the test body
#[derive(Default)]
struct Observed {
    resizes: Vec<(u32, u32)>,
    rendered: Vec<String>,
}

/// A session with canned replies, standing in for the browser
struct ScriptedSession {
    init_errors: Vec<String>,
    examples: Vec<Example>,
    /// description -> full-page screenshot bytes served after rendering it
    screenshots: HashMap<String, Vec<u8>>,
    failing: HashSet<String>,
    observed: Arc<Mutex<Observed>>,
    last_rendered: Option<String>,
}

impl ScriptedSession {
    fn new(examples: Vec<Example>) -> Self {
        Self {
            init_errors: Vec::new(),
            examples,
            screenshots: HashMap::new(),
            failing: HashSet::new(),
            observed: Arc::new(Mutex::new(Observed::default())),
            last_rendered: None,
        }
    }

    fn with_screenshot(mut self, description: &str, bytes: Vec<u8>) -> Self {
        self.screenshots.insert(description.to_string(), bytes);
        self
    }

    fn with_render_failure(mut self, description: &str) -> Self {
        self.failing.insert(description.to_string());
        self
    }

    fn with_init_errors(mut self, errors: &[&str]) -> Self {
        self.init_errors = errors.iter().map(|e| e.to_string()).collect();
        self
    }

    fn observed(&self) -> Arc<Mutex<Observed>> {
        Arc::clone(&self.observed)
    }
}

impl Session for ScriptedSession {
    fn initialization_errors(&mut self) -> Result<Vec<String>> {
        Ok(self.init_errors.clone())
    }

    fn all_examples(&mut self) -> Result<Vec<Example>> {
        Ok(self.examples.clone())
    }

    fn resize_viewport(&mut self, width: u32, height: u32) -> Result<()> {
        self.observed.lock().unwrap().resizes.push((width, height));
        Ok(())
    }

    fn render(&mut self, description: &str) -> Result<CropArea> {
        if self.failing.contains(description) {
            return Err(Error::Render {
                description: description.to_string(),
                message: "ReferenceError: boom".to_string(),
            });
        }
        self.observed
            .lock()
            .unwrap()
            .rendered
            .push(description.to_string());
        self.last_rendered = Some(description.to_string());

        let bytes = self
            .screenshots
            .get(description)
            .expect("scripted screenshot");
        let image = raster::decode(bytes).expect("scripted png");
        Ok(CropArea {
            width: image.width,
            height: image.height,
            top: 0,
            left: 0,
        })
    }

    fn screenshot(&mut self) -> Result<Vec<u8>> {
        let description = self.last_rendered.as_ref().expect("render first");
        Ok(self.screenshots.get(description).expect("scripted").clone())
    }

    fn close(self) -> Result<()> {
        Ok(())
    }
}

fn config(snapshot_dir: PathBuf, viewports: Vec<Viewport>) -> RunConfig {
    RunConfig {
        snapshot_dir,
        viewports,
        script_timeout_ms: 5_000,
    }
}

fn one_viewport() -> Vec<Viewport> {
    vec![Viewport::new("desktop", 1024, 768).unwrap()]
}

#[tokio::test]
async fn first_run_records_every_capture_as_new() {
    let dir = temp_dir();
    let session = ScriptedSession::new(vec![Example::new("button"), Example::new("card")])
        .with_screenshot("button", screenshot_png(10, 8, 0x10))
        .with_screenshot("card", screenshot_png(10, 12, 0x20));
    let observed = session.observed();

    let summary = runner::run(&config(dir.clone(), one_viewport()), move || Ok(session))
        .await
        .expect("run");

    assert_eq!(summary.new_images.len(), 2);
    assert!(summary.diff_images.is_empty());
    assert_eq!(
        observed.lock().unwrap().rendered,
        vec!["button".to_string(), "card".to_string()]
    );

    let store = SnapshotStore::new(&dir);
    assert!(store.current_path("button", "desktop").exists());
    assert!(store.current_path("card", "desktop").exists());

    // The summary artifact is a structured record with a timestamp
    let raw = std::fs::read_to_string(runner::summary_path(&dir)).expect("summary");
    let parsed: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert!(parsed.get("generatedAt").is_some());
    assert_eq!(parsed["newImages"].as_array().unwrap().len(), 2);
    assert_eq!(parsed["diffImages"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn unchanged_rerun_records_nothing() {
    let dir = temp_dir();
    let make_session = || {
        ScriptedSession::new(vec![Example::new("button")])
            .with_screenshot("button", screenshot_png(10, 8, 0x10))
    };

    runner::run(&config(dir.clone(), one_viewport()), {
        let session = make_session();
        move || Ok(session)
    })
    .await
    .expect("first run");

    let summary = runner::run(&config(dir.clone(), one_viewport()), {
        let session = make_session();
        move || Ok(session)
    })
    .await
    .expect("second run");

    assert!(summary.new_images.is_empty());
    assert!(summary.diff_images.is_empty());
    let store = SnapshotStore::new(&dir);
    assert!(!store.previous_path("button", "desktop").exists());
}

#[tokio::test]
async fn changed_capture_is_reported_and_rotated() {
    let dir = temp_dir();

    runner::run(&config(dir.clone(), one_viewport()), {
        let session = ScriptedSession::new(vec![Example::new("button")])
            .with_screenshot("button", screenshot_png(10, 8, 0x10));
        move || Ok(session)
    })
    .await
    .expect("first run");

    let summary = runner::run(&config(dir.clone(), one_viewport()), {
        let session = ScriptedSession::new(vec![Example::new("button")])
            .with_screenshot("button", screenshot_png(10, 11, 0x33));
        move || Ok(session)
    })
    .await
    .expect("second run");

    assert!(summary.new_images.is_empty());
    assert_eq!(summary.diff_images.len(), 1);
    assert_eq!(summary.diff_images[0].height, 11);

    let store = SnapshotStore::new(&dir);
    let previous =
        std::fs::read(store.previous_path("button", "desktop")).expect("previous file");
    assert_eq!(raster::decode(&previous).expect("decode").height, 8);
}

#[tokio::test]
async fn render_failure_aborts_after_durable_captures() {
    let dir = temp_dir();
    let session = ScriptedSession::new(vec![Example::new("button"), Example::new("card")])
        .with_screenshot("button", screenshot_png(10, 8, 0x10))
        .with_render_failure("card");

    let result = runner::run(&config(dir.clone(), one_viewport()), move || Ok(session)).await;
    assert!(matches!(result, Err(Error::Render { .. })));

    // The first example's artifact is already durable; no summary is written
    let store = SnapshotStore::new(&dir);
    assert!(store.current_path("button", "desktop").exists());
    assert!(!runner::summary_path(&dir).exists());
}

#[tokio::test]
async fn page_errors_abort_before_any_capture() {
    let dir = temp_dir();
    let session = ScriptedSession::new(vec![Example::new("button")])
        .with_screenshot("button", screenshot_png(10, 8, 0x10))
        .with_init_errors(&["TypeError: harness exploded"]);
    let observed = session.observed();

    let result = runner::run(&config(dir.clone(), one_viewport()), move || Ok(session)).await;
    assert!(matches!(result, Err(Error::PageScript(_))));
    assert!(observed.lock().unwrap().rendered.is_empty());
    assert!(!runner::summary_path(&dir).exists());
}

#[tokio::test]
async fn empty_harness_is_an_error() {
    let dir = temp_dir();
    let session = ScriptedSession::new(Vec::new());
    let result = runner::run(&config(dir, one_viewport()), move || Ok(session)).await;
    assert!(matches!(result, Err(Error::NoExamples)));
}

#[tokio::test]
async fn viewports_resize_in_order_and_examples_rerender_per_viewport() {
    let dir = temp_dir();
    let viewports = vec![
        Viewport::new("desktop", 1024, 768).unwrap(),
        Viewport::new("mobile", 375, 667).unwrap(),
    ];
    let session = ScriptedSession::new(vec![Example::with_viewports(
        "button",
        &["desktop", "mobile"],
    )])
    .with_screenshot("button", screenshot_png(10, 8, 0x10));
    let observed = session.observed();

    let summary = runner::run(&config(dir, viewports), move || Ok(session))
        .await
        .expect("run");

    assert_eq!(summary.new_images.len(), 2);
    let observed = observed.lock().unwrap();
    assert_eq!(observed.resizes, vec![(1024, 768), (375, 667)]);
    assert_eq!(
        observed.rendered,
        vec!["button".to_string(), "button".to_string()]
    );
}
