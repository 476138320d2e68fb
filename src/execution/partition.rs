/// Contiguous chunk partitioning for the three-phase parallel operators
///
/// Every data-producing operator follows the same pattern: split the input
/// row range into contiguous chunks, let each worker collect survivors into
/// a private vector, then carve the pre-sized output buffers into disjoint
/// windows so workers can materialize without synchronization. Chunk order
/// is worker order, which keeps the concatenated output deterministic.
use std::ops::Range;

/// Split `[0, rows)` into at most `workers` contiguous chunks of
/// ceil(rows / workers) rows; the last chunk may be short.
pub fn chunk_ranges(rows: usize, workers: usize) -> Vec<Range<usize>> {
    if rows == 0 || workers == 0 {
        return Vec::new();
    }
    let chunk = (rows + workers - 1) / workers;
    let mut ranges = Vec::with_capacity(workers);
    let mut start = 0;
    while start < rows {
        let end = (start + chunk).min(rows);
        ranges.push(start..end);
        start = end;
    }
    ranges
}

/// Carve each output buffer into per-chunk disjoint windows sized by
/// `sizes`, returned as `windows[chunk][buffer]`. Buffers must already be
/// sized to the sum of `sizes`.
pub fn carve_windows<'a>(
    buffers: &'a mut [Vec<u64>],
    sizes: &[usize],
) -> Vec<Vec<&'a mut [u64]>> {
    let mut windows: Vec<Vec<&mut [u64]>> = sizes
        .iter()
        .map(|_| Vec::with_capacity(buffers.len()))
        .collect();
    for buffer in buffers.iter_mut() {
        let mut rest: &mut [u64] = buffer.as_mut_slice();
        for (chunk, &size) in sizes.iter().enumerate() {
            let (head, tail) = rest.split_at_mut(size);
            windows[chunk].push(head);
            rest = tail;
        }
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_range_with_short_last_chunk() {
        let ranges = chunk_ranges(10, 4);
        assert_eq!(ranges, vec![0..3, 3..6, 6..9, 9..10]);
    }

    #[test]
    fn may_produce_fewer_chunks_than_workers() {
        let ranges = chunk_ranges(9, 4);
        assert_eq!(ranges, vec![0..3, 3..6, 6..9]);
    }

    #[test]
    fn single_worker_gets_everything() {
        assert_eq!(chunk_ranges(5, 1), vec![0..5]);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_ranges(0, 8).is_empty());
    }

    #[test]
    fn windows_are_disjoint_and_ordered() {
        let mut buffers = vec![vec![0u64; 6], vec![0u64; 6]];
        let sizes = [2, 0, 4];
        {
            let mut windows = carve_windows(&mut buffers, &sizes);
            assert_eq!(windows.len(), 3);
            for (chunk, window) in windows.iter().enumerate() {
                assert!(window.iter().all(|w| w.len() == sizes[chunk]));
            }
            // Writes through one chunk's window land in that chunk's region.
            windows[2][0].copy_from_slice(&[9, 9, 9, 9]);
            windows[0][0].copy_from_slice(&[1, 1]);
        }
        assert_eq!(buffers[0], vec![1, 1, 9, 9, 9, 9]);
        assert_eq!(buffers[1], vec![0; 6]);
    }
}
