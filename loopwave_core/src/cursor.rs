//! Block indexing into a looped buffer.

use serde::{Deserialize, Serialize};

/// How block indices wrap at the end of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexWrap {
    /// Indices wrap modulo the loop length `N`; blocks tile the loop exactly.
    #[default]
    Exact,
    /// Indices wrap modulo `N - 1`. The last sample of the loop is never
    /// played and the first one is played twice per loop, which shifts the
    /// phase by one sample at every seam. Kept for output compatibility with
    /// earlier recordings.
    Legacy,
}

impl IndexWrap {
    /// Modulus applied to indices of a loop of `len` samples.
    pub fn modulus(self, len: usize) -> usize {
        match self {
            IndexWrap::Exact => len.max(1),
            IndexWrap::Legacy => len.saturating_sub(1).max(1),
        }
    }
}

/// Contiguous run of loop indices, wrapping at `modulus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    start: usize,
    len: usize,
    modulus: usize,
}

impl BlockRange {
    /// First index of the block, already reduced.
    pub fn start(&self) -> usize {
        self.start
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn modulus(&self) -> usize {
        self.modulus
    }

    pub fn indices(&self) -> BlockIndices {
        BlockIndices {
            next: self.start,
            remaining: self.len,
            modulus: self.modulus,
        }
    }
}

impl IntoIterator for BlockRange {
    type Item = usize;
    type IntoIter = BlockIndices;

    fn into_iter(self) -> BlockIndices {
        self.indices()
    }
}

/// Iterator over the indices of a [`BlockRange`].
#[derive(Debug, Clone)]
pub struct BlockIndices {
    next: usize,
    remaining: usize,
    modulus: usize,
}

impl Iterator for BlockIndices {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let index = self.next;
        self.next += 1;
        if self.next == self.modulus {
            self.next = 0;
        }
        self.remaining -= 1;
        Some(index)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for BlockIndices {}

/// Cycling block counter.
///
/// The counter runs `1..=nblocks` and survives loop changes: when the loop
/// length changes only the modulus follows, so the next block after a
/// parameter change starts wherever the old counter points into the new loop.
#[derive(Debug, Clone, Default)]
pub struct BlockCursor {
    counter: usize,
    wrap: IndexWrap,
}

impl BlockCursor {
    pub fn new(wrap: IndexWrap) -> Self {
        Self { counter: 0, wrap }
    }

    pub fn wrap(&self) -> IndexWrap {
        self.wrap
    }

    pub fn set_wrap(&mut self, wrap: IndexWrap) {
        self.wrap = wrap;
    }

    /// Blocks served in the current cycle, `0` before the first read.
    pub fn counter(&self) -> usize {
        self.counter
    }

    pub fn reset(&mut self) {
        self.counter = 0;
    }

    /// Advance one block and return its indices in a loop of `len` samples.
    ///
    /// `len` must be a multiple of `block_len`.
    pub fn next_range(&mut self, block_len: usize, len: usize) -> BlockRange {
        debug_assert!(block_len > 0 && len % block_len == 0);

        let nblocks = (len / block_len).max(1);
        self.counter = 1 + self.counter % nblocks;

        let modulus = self.wrap.modulus(len);
        BlockRange {
            start: ((self.counter - 1) * block_len) % modulus,
            len: block_len,
            modulus,
        }
    }
}
