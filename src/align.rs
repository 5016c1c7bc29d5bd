//! Row alignment engine
//!
//! Reconciles two raster images of different height before a pixel diff is
//! rendered. Each pixel row is reduced to a content hash; the longest common
//! subsequence of the two hash sequences decides which rows correspond, and
//! rows present in only one image are paired with fully transparent gap rows
//! in the other. Both outputs end up with equal width and equal height.
//!
//! The engine is pure: no I/O, no shared state. For long-running callers it
//! can be moved onto a worker thread that reports integer percentage
//! milestones over a channel, see [`spawn_aligned_pair`].

use crate::raster::{RasterImage, PIXEL_BYTES};
use crate::{Error, Result};
use sha2::{Digest, Sha256};
use std::sync::mpsc;
use std::thread;

/// Content hash of one pixel row. Collisions are accepted: an equal
/// fingerprint is treated as an equal row.
pub type RowFingerprint = [u8; 32];

/// Upper bound on the row count of either input; the LCS table is O(N*M)
/// in time and space, so pathological inputs must be rejected up front.
pub const MAX_ALIGN_ROWS: usize = 4096;

/// One position in an aligned sequence: a real source row or an injected gap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSlot {
    /// Index of a row in the original image
    Real(usize),
    /// A synthetic fully transparent row
    Gap,
}

/// The aligned row schedules for a previous/current image pair
///
/// Both sequences always have the same length; position `i` refers either to
/// a mutually matching row or to one real row paired with one gap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alignment {
    pub previous: Vec<RowSlot>,
    pub current: Vec<RowSlot>,
}

impl Alignment {
    pub fn len(&self) -> usize {
        self.previous.len()
    }

    pub fn is_empty(&self) -> bool {
        self.previous.is_empty()
    }

    pub fn gap_count(&self) -> usize {
        let gaps = |slots: &[RowSlot]| slots.iter().filter(|s| matches!(s, RowSlot::Gap)).count();
        gaps(&self.previous) + gaps(&self.current)
    }
}

/// Message emitted by a worker spawned with [`spawn_aligned_pair`]
#[derive(Debug)]
pub enum AlignMessage {
    /// Ordered percentage milestone (25, 50, 75, 100)
    Progress(u8),
    /// Final message carrying both gap-padded images
    Done {
        previous: RasterImage,
        current: RasterImage,
    },
}

/// Hash every row of an image as if right-padded with transparent pixels to
/// `padded_width`, so identical content in differently sized buffers hashes
/// identically.
pub fn fingerprint_rows(image: &RasterImage, padded_width: u32) -> Vec<RowFingerprint> {
    let pad = vec![0u8; (padded_width.saturating_sub(image.width)) as usize * PIXEL_BYTES];
    (0..image.height as usize)
        .map(|y| {
            let mut hasher = Sha256::new();
            hasher.update(image.row(y));
            if !pad.is_empty() {
                hasher.update(&pad);
            }
            hasher.finalize().into()
        })
        .collect()
}

/// Compute the row alignment of two fingerprint sequences.
///
/// Runs the standard O(N*M) LCS dynamic program over row hashes and walks
/// both sequences forward against it. Ties between equally long solutions are
/// broken deterministically: the previous-side row is consumed first, which
/// matches the earliest possible occurrence in each sequence. Callers must
/// not depend on the choice among equally valid alignments, only on the
/// structural invariants.
pub fn align(previous: &[RowFingerprint], current: &[RowFingerprint]) -> Alignment {
    let n = previous.len();
    let m = current.len();

    // lcs[i][j] = LCS length of previous[i..] and current[j..]
    let stride = m + 1;
    let mut lcs = vec![0u32; (n + 1) * stride];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i * stride + j] = if previous[i] == current[j] {
                lcs[(i + 1) * stride + j + 1] + 1
            } else {
                lcs[(i + 1) * stride + j].max(lcs[i * stride + j + 1])
            };
        }
    }

    let mut aligned_previous = Vec::with_capacity(n.max(m));
    let mut aligned_current = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (0usize, 0usize);
    while i < n && j < m {
        if previous[i] == current[j] {
            aligned_previous.push(RowSlot::Real(i));
            aligned_current.push(RowSlot::Real(j));
            i += 1;
            j += 1;
        } else if lcs[(i + 1) * stride + j] >= lcs[i * stride + j + 1] {
            aligned_previous.push(RowSlot::Real(i));
            aligned_current.push(RowSlot::Gap);
            i += 1;
        } else {
            aligned_previous.push(RowSlot::Gap);
            aligned_current.push(RowSlot::Real(j));
            j += 1;
        }
    }
    while i < n {
        aligned_previous.push(RowSlot::Real(i));
        aligned_current.push(RowSlot::Gap);
        i += 1;
    }
    while j < m {
        aligned_previous.push(RowSlot::Gap);
        aligned_current.push(RowSlot::Real(j));
        j += 1;
    }

    Alignment {
        previous: aligned_previous,
        current: aligned_current,
    }
}

/// Align two images and build fresh gap-padded copies of both.
///
/// Output images share the same width (the max of the two inputs; narrower
/// rows are right-padded with transparent pixels) and the same height (the
/// alignment length). Gap rows are fully transparent. The originals are left
/// untouched; the outputs are constructed from the alignment trace.
///
/// `progress` receives the ordered milestones 25 (inputs validated and
/// normalized), 50 (previous hashed), 75 (current hashed) and 100 (alignment
/// complete).
pub fn aligned_pair(
    previous: &RasterImage,
    current: &RasterImage,
    mut progress: impl FnMut(u8),
) -> Result<(RasterImage, RasterImage)> {
    check_row_cap(previous, current)?;
    let max_width = previous.width.max(current.width);
    progress(25);

    let previous_rows = fingerprint_rows(previous, max_width);
    progress(50);
    let current_rows = fingerprint_rows(current, max_width);
    progress(75);

    let alignment = align(&previous_rows, &current_rows);
    let padded_previous = expand(previous, &alignment.previous, max_width);
    let padded_current = expand(current, &alignment.current, max_width);
    progress(100);

    Ok((padded_previous, padded_current))
}

/// Run [`aligned_pair`] on a dedicated worker thread.
///
/// The caller receives ordered [`AlignMessage::Progress`] milestones followed
/// by a single [`AlignMessage::Done`]; the worker owns its inputs and shares
/// no state with the caller. Inputs beyond [`MAX_ALIGN_ROWS`] are rejected
/// before the thread is spawned.
pub fn spawn_aligned_pair(
    previous: RasterImage,
    current: RasterImage,
) -> Result<mpsc::Receiver<AlignMessage>> {
    check_row_cap(&previous, &current)?;

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let progress_tx = tx.clone();
        // Cap already checked; the only failure mode left is a disconnected
        // receiver, which we treat as cancellation.
        let result = aligned_pair(&previous, &current, |pct| {
            let _ = progress_tx.send(AlignMessage::Progress(pct));
        });
        if let Ok((padded_previous, padded_current)) = result {
            let _ = tx.send(AlignMessage::Done {
                previous: padded_previous,
                current: padded_current,
            });
        }
    });
    Ok(rx)
}

fn check_row_cap(previous: &RasterImage, current: &RasterImage) -> Result<()> {
    let rows = previous.height.max(current.height) as usize;
    if rows > MAX_ALIGN_ROWS {
        return Err(Error::AlignmentInput(format!(
            "{} rows exceeds the {} row cap",
            rows, MAX_ALIGN_ROWS
        )));
    }
    Ok(())
}

fn expand(source: &RasterImage, slots: &[RowSlot], width: u32) -> RasterImage {
    let row_len = width as usize * PIXEL_BYTES;
    let mut data = vec![0u8; row_len * slots.len()];
    for (out_index, slot) in slots.iter().enumerate() {
        if let RowSlot::Real(src_index) = slot {
            let row = source.row(*src_index);
            data[out_index * row_len..out_index * row_len + row.len()].copy_from_slice(row);
        }
    }
    RasterImage {
        width,
        height: slots.len() as u32,
        data,
    }
}
