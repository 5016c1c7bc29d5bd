//! Browser session contract
//!
//! The pipeline talks to the remote browser through the [`Session`] trait so
//! backends stay swappable: the CDP adapter implements it for headless
//! Chrome, and tests implement it with scripted replies. A session owns one
//! page, one viewport size and one active render at a time; callers must
//! never overlap two calls against the same session.

use crate::{Example, Result};
use serde::Deserialize;

/// Bounding box of a rendered example, as reported by the harness page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CropArea {
    pub width: u32,
    pub height: u32,
    pub top: u32,
    pub left: u32,
}

/// Synchronous browser session backing a capture run
///
/// Implementations are owned by a single worker thread (see
/// [`crate::driver::Driver`]); methods take `&mut self` and are free to keep
/// per-session mutable state.
pub trait Session {
    /// JavaScript errors the harness page collected while loading
    fn initialization_errors(&mut self) -> Result<Vec<String>>;

    /// Enumerate the renderable examples exposed by the harness page
    fn all_examples(&mut self) -> Result<Vec<Example>>;

    /// Resize the page viewport
    fn resize_viewport(&mut self, width: u32, height: u32) -> Result<()>;

    /// Render one example and return its bounding box.
    ///
    /// A harness-reported render error is fatal for the whole run and must
    /// surface as [`crate::Error::Render`].
    fn render(&mut self, description: &str) -> Result<CropArea>;

    /// Capture the full page as PNG bytes
    fn screenshot(&mut self) -> Result<Vec<u8>>;

    /// Close the session and release the browser
    fn close(self) -> Result<()>
    where
        Self: Sized;
}
