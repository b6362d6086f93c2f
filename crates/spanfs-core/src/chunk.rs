use std::fmt;

use crate::fs::LeafRef;

/// One contiguous logical-offset range of a striped file, backed by a single
/// per-chunk file on one leaf.
///
/// `end` is `None` only for the tail chunk, whose range is unbounded until a
/// successor seals it.
pub struct Chunk {
    pub start: u64,
    pub end: Option<u64>,
    pub leaf: LeafRef,
}

impl Chunk {
    pub fn new_tail(start: u64, leaf: LeafRef) -> Self {
        Chunk {
            start,
            end: None,
            leaf,
        }
    }

    /// Whether `offset` falls inside this chunk's range.
    pub fn covers(&self, offset: u64) -> bool {
        offset >= self.start && self.end.map_or(true, |end| offset < end)
    }

    /// Bytes between `offset` and the chunk's end, capped at `want`.
    /// For the unbounded tail the cap alone applies.
    pub fn span_from(&self, offset: u64, want: u64) -> u64 {
        match self.end {
            Some(end) => want.min(end.saturating_sub(offset)),
            None => want,
        }
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "Chunk[{}, {})", self.start, end),
            None => write!(f, "Chunk[{}, ..)", self.start),
        }
    }
}

/// Index of the first chunk whose range may still hold `offset`: the first
/// chunk with `end > offset`. Logarithmic in the chunk count, so a
/// federation configured with many leaves does not degrade linearly.
///
/// Returns `chunks.len()` when every chunk is sealed at or before `offset`.
pub fn covering_chunk(chunks: &[Chunk], offset: u64) -> usize {
    chunks.partition_point(|c| matches!(c.end, Some(end) if end <= offset))
}

/// Seal the current tail at `end`, so a successor chunk can start there.
/// No-op on an empty list.
pub fn seal_tail(chunks: &mut [Chunk], end: u64) {
    if let Some(tail) = chunks.last_mut() {
        if tail.end.is_none() {
            tail.end = Some(end);
        }
    }
}

/// Check the chunk-list layout invariants: ascending contiguous ranges,
/// first chunk at zero, only the tail unbounded.
#[cfg(test)]
pub fn layout_is_valid(chunks: &[Chunk]) -> bool {
    if chunks.is_empty() {
        return true;
    }
    if chunks[0].start != 0 {
        return false;
    }
    for pair in chunks.windows(2) {
        match pair[0].end {
            Some(end) if end == pair[1].start => {}
            _ => return false,
        }
    }
    true
}
