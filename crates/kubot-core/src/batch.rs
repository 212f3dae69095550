//! Batching — a forward-only cursor over the suite list.
//!
//! Each call yields the next contiguous window of at most `size` names and
//! advances the cursor by the number yielded. Once the list is consumed every
//! further call yields `None`; the cursor never resets.

use std::iter::FusedIterator;
use std::num::NonZeroUsize;

/// Slices a file list into bounded windows.
#[derive(Debug, Clone)]
pub struct Batcher {
    size: NonZeroUsize,
    cursor: usize,
    files: Vec<String>,
}

impl Batcher {
    /// Create a batcher over `files`. A zero size is unrepresentable; callers
    /// validate it before getting here.
    pub fn new(size: NonZeroUsize, files: Vec<String>) -> Self {
        Self {
            size,
            cursor: 0,
            files,
        }
    }

    /// The next window, or `None` once the list is exhausted.
    pub fn next_batch(&mut self) -> Option<&[String]> {
        if self.cursor >= self.files.len() {
            return None;
        }

        let start = self.cursor;
        let end = (start + self.size.get()).min(self.files.len());
        self.cursor = end;

        Some(&self.files[start..end])
    }

    /// Number of names already handed out.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of names still to be handed out.
    pub fn remaining(&self) -> usize {
        self.files.len() - self.cursor
    }

    /// Window size.
    pub fn size(&self) -> NonZeroUsize {
        self.size
    }
}

impl Iterator for Batcher {
    type Item = Vec<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().map(<[String]>::to_vec)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining().div_ceil(self.size.get());
        (n, Some(n))
    }
}

impl ExactSizeIterator for Batcher {}

impl FusedIterator for Batcher {}
