//! Visreg Visual Regression Pipeline
//!
//! A visual-regression runner for Rust that drives a remote headless browser
//! to render named UI examples at one or more viewport sizes, captures a
//! cropped screenshot per example, and compares it against a stored baseline.
//!
//! # Features
//!
//! - **CDP Backend** (default): Drives a headless Chrome instance via the
//!   Chrome DevTools Protocol and a `window.visreg` harness page
//! - **Row Alignment**: When a screenshot and its baseline differ in height,
//!   an LCS-based row alignment pads both images with transparent gap rows so
//!   the rendered diff stays positionally meaningful
//! - **Modular Design**: The browser session sits behind a trait so the
//!   pipeline can be exercised against scripted sessions in tests
//!
//! # Example
//!
//! ```no_run
//! use visreg::{RunConfig, SessionConfig, Viewport};
//!
//! # #[tokio::main]
//! # async fn main() -> visreg::Result<()> {
//! let config = RunConfig {
//!     snapshot_dir: ".visreg".into(),
//!     viewports: vec![Viewport::new("desktop", 1024, 768)?],
//!     script_timeout_ms: 30_000,
//! };
//!
//! let session = SessionConfig {
//!     harness_url: "http://localhost:8000".to_string(),
//!     ..Default::default()
//! };
//!
//! let summary = visreg::runner::run(&config, move || visreg::cdp::CdpSession::new(session)).await?;
//! println!("{} new, {} diff", summary.new_images.len(), summary.diff_images.len());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

pub mod error;
pub use error::{Error, Result};

pub mod align;
pub mod capture;
pub mod driver;
pub mod raster;
pub mod runner;
pub mod session;
pub mod store;

#[cfg(feature = "cdp")]
pub mod cdp;

pub use driver::Driver;
pub use raster::RasterImage;
pub use session::{CropArea, Session};
pub use store::{Outcome, SnapshotStore};

/// Configuration for a capture run
///
/// Viewports are processed strictly in the order given here; the first entry
/// is the default for examples that do not name their viewports.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Directory holding snapshot artifacts and the run summary
    pub snapshot_dir: PathBuf,
    /// Configured viewports, in capture order
    pub viewports: Vec<Viewport>,
    /// Hard ceiling for any single remote command, in milliseconds
    pub script_timeout_ms: u64,
}

/// Configuration for the browser session backing a run
///
/// The defaults are chosen to be conservative: a desktop-sized window and a
/// 30 second ceiling on navigation and in-page script execution.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// URL of the test harness page exposing `window.visreg`
    pub harness_url: String,
    /// Initial browser window width
    pub window_width: u32,
    /// Initial browser window height
    pub window_height: u32,
    /// Timeout applied to navigation and in-page script execution
    pub script_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            harness_url: "http://localhost:8000".to_string(),
            window_width: 1280,
            window_height: 720,
            script_timeout_ms: 30_000,
        }
    }
}

/// A named viewport size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewport {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Create a viewport, rejecting zero dimensions
    pub fn new(name: &str, width: u32, height: u32) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::Config("viewport name must not be empty".to_string()));
        }
        if width == 0 || height == 0 {
            return Err(Error::Config(format!(
                "viewport \"{}\" must have non-zero dimensions",
                name
            )));
        }
        Ok(Self {
            name: name.to_string(),
            width,
            height,
        })
    }
}

/// A renderable example enumerated from the harness page
///
/// `viewports` lists the names of the configured viewports the example wants
/// to be captured at; when empty the example defaults to the first configured
/// viewport. Immutable once enumerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    pub description: String,
    pub viewports: Vec<String>,
}

impl Example {
    pub fn new(description: &str) -> Self {
        Self {
            description: description.to_string(),
            viewports: Vec::new(),
        }
    }

    pub fn with_viewports(description: &str, viewports: &[&str]) -> Self {
        Self {
            description: description.to_string(),
            viewports: viewports.iter().map(|v| v.to_string()).collect(),
        }
    }
}
