//! Chrome DevTools Protocol session adapter
//!
//! Launches a headless Chrome instance, navigates the single tab to the test
//! harness page, and implements [`Session`] by evaluating the in-page
//! `window.visreg` contract: `getInitializationErrors()`, `getAllExamples()`
//! and `renderExample(description)`.

use crate::session::{CropArea, Session};
use crate::{Error, Example, Result, SessionConfig};
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::types::Bounds;
use headless_chrome::{Browser, LaunchOptions};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Example record as the harness page serializes it
#[derive(Debug, Deserialize)]
struct ExampleRecord {
    description: String,
    #[serde(default)]
    options: ExampleOptions,
}

#[derive(Debug, Default, Deserialize)]
struct ExampleOptions {
    #[serde(default)]
    viewports: Vec<String>,
}

/// Render reply as the harness page serializes it. When `error` is set the
/// geometry fields are absent.
#[derive(Debug, Deserialize)]
struct RenderReply {
    error: Option<String>,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default)]
    top: u32,
    #[serde(default)]
    left: u32,
}

/// CDP-backed session implementation (uses the `headless_chrome` crate)
///
/// This adapter launches a headless Chrome instance, manages a single tab
/// pointed at the harness page, and provides the `Session` trait
/// implementation over it.
pub struct CdpSession {
    browser: Browser,
    tab: Arc<Tab>,
    config: SessionConfig,
}

impl CdpSession {
    /// Launch Chrome, open a tab and navigate to the harness page
    pub fn new(config: SessionConfig) -> Result<Self> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((config.window_width, config.window_height)))
            .build()
            .map_err(|e| Error::SessionInit(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::SessionInit(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::SessionInit(format!("Failed to create tab: {}", e)))?;

        tab.set_default_timeout(Duration::from_millis(config.script_timeout_ms));

        tab.navigate_to(&config.harness_url)
            .map_err(|e| Error::SessionInit(format!("Navigation failed: {}", e)))?;
        tab.wait_until_navigated()
            .map_err(|e| Error::SessionInit(format!("Wait for navigation failed: {}", e)))?;

        debug!("harness page loaded from {}", config.harness_url);

        Ok(Self {
            browser,
            tab,
            config,
        })
    }

    /// Evaluate a harness expression that returns `JSON.stringify(...)` and
    /// deserialize its payload.
    fn eval_json<T: DeserializeOwned>(&self, expression: &str) -> Result<T> {
        let evaluated = self
            .tab
            .evaluate(expression, true)
            .map_err(|e| Error::Script(format!("Evaluation failed: {}", e)))?;

        let value = evaluated
            .value
            .ok_or_else(|| Error::Script("No value returned from harness".to_string()))?;
        let payload = value
            .as_str()
            .ok_or_else(|| Error::Script("Harness returned a non-string payload".to_string()))?;

        serde_json::from_str(payload)
            .map_err(|e| Error::Script(format!("Malformed harness payload: {}", e)))
    }
}

impl Session for CdpSession {
    fn initialization_errors(&mut self) -> Result<Vec<String>> {
        self.eval_json("JSON.stringify(window.visreg.getInitializationErrors())")
    }

    fn all_examples(&mut self) -> Result<Vec<Example>> {
        let records: Vec<ExampleRecord> =
            self.eval_json("JSON.stringify(window.visreg.getAllExamples())")?;
        Ok(records
            .into_iter()
            .map(|record| Example {
                description: record.description,
                viewports: record.options.viewports,
            })
            .collect())
    }

    fn resize_viewport(&mut self, width: u32, height: u32) -> Result<()> {
        self.tab
            .set_bounds(Bounds::Normal {
                left: None,
                top: None,
                width: Some(width as f64),
                height: Some(height as f64),
            })
            .map_err(|e| Error::Script(format!("Viewport resize failed: {}", e)))?;
        Ok(())
    }

    fn render(&mut self, description: &str) -> Result<CropArea> {
        // Pass the description through a JSON string literal so quoting in
        // example names cannot break the expression.
        let literal = serde_json::to_string(description)
            .map_err(|e| Error::Script(format!("Unencodable description: {}", e)))?;
        let expression = format!(
            "Promise.resolve(window.visreg.renderExample({})).then(function(r) {{ return JSON.stringify(r); }})",
            literal
        );

        let reply: RenderReply = self.eval_json(&expression)?;
        if let Some(message) = reply.error {
            return Err(Error::Render {
                description: description.to_string(),
                message,
            });
        }
        Ok(CropArea {
            width: reply.width,
            height: reply.height,
            top: reply.top,
            left: reply.left,
        })
    }

    fn screenshot(&mut self) -> Result<Vec<u8>> {
        let bytes = self
            .tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| Error::Script(format!("Screenshot failed: {}", e)))?;
        Ok(bytes)
    }

    fn close(self) -> Result<()> {
        // Dropping the browser tears down the Chrome process; surface nothing
        // beyond what launch already reported.
        drop(self.tab);
        drop(self.browser);
        debug!("session for {} closed", self.config.harness_url);
        Ok(())
    }
}
