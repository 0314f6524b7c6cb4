//! # Placement Search
//!
//! Run detection over a page predicate, shared by both heaps. A *run* is a
//! maximal sequence of consecutive free pages. The searches here are pure:
//! they read occupancy through a closure and never mutate heap state.

use crate::HeapError;
use heap_addresses::{HeapRegion, pages_for};

/// A run of free pages, by page index.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Run {
    pub start: usize,
    pub len: usize,
}

/// Accumulates the current run while a scan walks page indices in order.
#[derive(Debug, Default)]
pub(crate) struct RunTracker {
    start: usize,
    len: usize,
}

impl RunTracker {
    pub(crate) const fn new() -> Self {
        Self { start: 0, len: 0 }
    }

    /// Extend the current run by the free page `index`.
    pub(crate) const fn extend(&mut self, index: usize) -> Run {
        if self.len == 0 {
            self.start = index;
        }
        self.len += 1;
        self.current_unchecked()
    }

    /// End the current run, returning it if it was non-empty.
    pub(crate) const fn close(&mut self) -> Option<Run> {
        let run = self.current();
        self.len = 0;
        run
    }

    pub(crate) const fn current(&self) -> Option<Run> {
        if self.len == 0 {
            None
        } else {
            Some(self.current_unchecked())
        }
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    const fn current_unchecked(&self) -> Run {
        Run {
            start: self.start,
            len: self.len,
        }
    }
}

/// Convert a byte request into a page count that fits `region`.
pub(crate) fn request_pages(size: u64, region: &HeapRegion) -> Result<usize, HeapError> {
    if size == 0 {
        return Err(HeapError::ZeroSize);
    }
    let pages = pages_for(size);
    let capacity = region.page_count();
    match usize::try_from(pages) {
        Ok(n) if n <= capacity => Ok(n),
        _ => Err(HeapError::TooLarge { pages, capacity }),
    }
}

/// Smallest run of at least `n` pages among `0..total`; ties go to the lowest index.
pub fn best_fit(total: usize, n: usize, mut is_free: impl FnMut(usize) -> bool) -> Option<Run> {
    let mut best: Option<Run> = None;
    let mut run = RunTracker::new();
    for i in 0..total {
        if is_free(i) {
            run.extend(i);
        } else if let Some(r) = run.close() {
            best = better(best, r, n);
        }
    }
    // the run abutting the end of the region
    if let Some(r) = run.close() {
        best = better(best, r, n);
    }
    best
}

#[inline]
fn better(best: Option<Run>, candidate: Run, n: usize) -> Option<Run> {
    if candidate.len >= n && best.is_none_or(|b| candidate.len < b.len) {
        Some(candidate)
    } else {
        best
    }
}

/// Lowest-index run of at least `n` pages among `0..total`.
///
/// The returned run is cut to exactly `n` pages.
pub fn first_fit(total: usize, n: usize, mut is_free: impl FnMut(usize) -> bool) -> Option<Run> {
    let mut run = RunTracker::new();
    for i in 0..total {
        if !is_free(i) {
            run.close();
            continue;
        }
        let r = run.extend(i);
        if r.len >= n {
            return Some(r);
        }
    }
    None
}

/// First run of at least `n` pages met while scanning circularly from `origin`.
///
/// Examines each of the `total` pages at most once. Runs do not span the
/// region end, with one exception: the run still open when the lap closes
/// ends right before `origin` and may continue into the free pages found at
/// `origin` itself, in which case the combined run is accepted.
pub fn next_fit(
    total: usize,
    origin: usize,
    n: usize,
    mut is_free: impl FnMut(usize) -> bool,
) -> Option<Run> {
    if total == 0 || origin >= total {
        return None;
    }

    let mut run = RunTracker::new();
    // free pages directly at `origin`, before the first used page or the wrap
    let mut leading = None;
    for step in 0..total {
        let i = (origin + step) % total;
        if i == 0 && step != 0 {
            leading = leading.or(Some(run.len()));
            run.close();
        }
        if !is_free(i) {
            leading = leading.or(Some(run.len()));
            run.close();
            continue;
        }
        let r = run.extend(i);
        if r.len >= n {
            return Some(r);
        }
    }

    let tail = run.current()?;
    let joined = tail.len + leading.unwrap_or(0);
    (origin > 0 && joined >= n).then_some(Run {
        start: tail.start,
        len: n,
    })
}
