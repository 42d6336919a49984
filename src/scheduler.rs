//! Cell-batch scheduler.
//!
//! Ocean cells are split into contiguous runs, one per worker, so that each
//! run holds roughly the same number of schools.

/// Contiguous run of ocean cells handled by one worker for a whole step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    /// Position of the first cell in the ocean-cell ordering
    pub start: usize,
    /// Number of cells
    pub len: usize,
    /// Number of schools in those cells
    pub schools: usize,
}

impl Batch {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Number of consecutive cells given to each of `worker_count` batches.
///
/// Cells are walked in order and added to the current batch until the next
/// one would overshoot `total / worker_count` schools. The cell then goes to
/// the side closest to that target, a tie starting the next batch. The batch
/// index never goes past the last worker, so exactly `worker_count` counts
/// are returned, some possibly zero.
pub fn partition(school_counts: &[usize], worker_count: usize) -> Vec<usize> {
    let workers = worker_count.max(1);
    let last = workers - 1;
    let total: usize = school_counts.iter().sum();
    let target = (total / workers) as i64;

    let mut cells = vec![0usize; workers];
    let mut batch = 0usize;
    let mut in_batch = 0i64;
    for &count in school_counts {
        let count = count as i64;
        if in_batch + count > target {
            let over = in_batch + count - target;
            let under = target - in_batch;
            if over >= under {
                // The cell opens the next batch
                cells[(batch + 1).min(last)] += 1;
                in_batch = count;
            } else {
                cells[batch] += 1;
                in_batch = 0;
            }
            batch = (batch + 1).min(last);
        } else {
            in_batch += count;
            cells[batch] += 1;
        }
    }
    cells
}

/// [`partition`] resolved into cell ranges and school counts
pub fn batches(school_counts: &[usize], worker_count: usize) -> Vec<Batch> {
    let mut start = 0;
    partition(school_counts, worker_count)
        .into_iter()
        .map(|len| {
            let schools = school_counts[start..start + len].iter().sum();
            let batch = Batch {
                start,
                len,
                schools,
            };
            start += len;
            batch
        })
        .collect()
}

/// Split `items` into consecutive disjoint slices of the given lengths.
/// Lengths beyond the end of `items` yield empty slices.
pub fn split_batches<'a, T>(mut items: &'a mut [T], lens: &[usize]) -> Vec<&'a mut [T]> {
    let mut parts = Vec::with_capacity(lens.len());
    for &len in lens {
        let len = len.min(items.len());
        let (head, tail) = std::mem::take(&mut items).split_at_mut(len);
        parts.push(head);
        items = tail;
    }
    parts
}
