//! Snapshot store: classifies captures against on-disk baselines
//!
//! Artifacts are keyed by `(description, viewport)`. Each key owns at most
//! one `current` baseline and, transiently, one `previous` artifact holding
//! the bytes the latest `diff` displaced.

use crate::raster::{self, RasterImage};
use crate::Result;
use log::debug;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Classification of a freshly captured image against its baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No baseline existed; the capture became the baseline
    New { height: u32 },
    /// The capture differs from the baseline; `height` is the max of the two
    Diff { height: u32 },
    /// The capture is byte-for-byte identical to the baseline
    Equal,
}

/// Store rooted at a snapshot directory
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Path of the `current` baseline for a key
    pub fn current_path(&self, description: &str, viewport: &str) -> PathBuf {
        self.dir.join(format!(
            "{}_{}.png",
            sanitize_component(description),
            sanitize_component(viewport)
        ))
    }

    /// Path of the transient `previous` artifact for a key
    pub fn previous_path(&self, description: &str, viewport: &str) -> PathBuf {
        self.dir.join(format!(
            "{}_{}_previous.png",
            sanitize_component(description),
            sanitize_component(viewport)
        ))
    }

    /// Classify a capture and perform the persistence side effect.
    ///
    /// Policy, in order: any stale `previous` artifact is deleted first; with
    /// no baseline the capture is persisted as `current`; with a baseline the
    /// two are compared strictly (height, width, then full byte equality).
    /// Equal captures write nothing. Differing captures rename the old
    /// `current` to `previous`, byte-preserving, before the new `current` is
    /// written.
    pub async fn classify_and_persist(
        &self,
        description: &str,
        viewport: &str,
        image: &RasterImage,
    ) -> Result<Outcome> {
        let current = self.current_path(description, viewport);
        let previous = self.previous_path(description, viewport);

        if fs::metadata(&previous).await.is_ok() {
            debug!("removing stale previous artifact {:?}", previous);
            fs::remove_file(&previous).await?;
        }

        let existing = match fs::read(&current).await {
            Ok(bytes) => Some(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => return Err(err.into()),
        };

        match existing {
            None => {
                fs::write(&current, raster::encode(image)?).await?;
                debug!("new baseline for \"{}\" at {}", description, viewport);
                Ok(Outcome::New {
                    height: image.height,
                })
            }
            Some(bytes) => {
                let baseline = raster::decode(&bytes)?;
                if baseline.matches(image) {
                    return Ok(Outcome::Equal);
                }
                fs::rename(&current, &previous).await?;
                fs::write(&current, raster::encode(image)?).await?;
                debug!("baseline rotated for \"{}\" at {}", description, viewport);
                Ok(Outcome::Diff {
                    height: baseline.height.max(image.height),
                })
            }
        }
    }
}

/// Reduce a key component to filesystem-safe characters
fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}
