use rayon::prelude::*;

/// Rows handed to one worker per slice call.
pub(crate) const SLICE_ROWS: usize = 64;

/// Partition `data` (interleaved RGBA rows of `width` pixels) into contiguous
/// row ranges and run `f(start_line, rows)` for each range in parallel.
///
/// Each range is mutated by exactly one worker; the call returns once every
/// range has finished (fork-join barrier).
pub(crate) fn par_row_slices<T: Send, F>(data: &mut [T], width: usize, f: F)
where
    F: Fn(usize, &mut [T]) + Send + Sync,
{
    let chunk = SLICE_ROWS * width * 4;
    if chunk == 0 {
        return;
    }
    data.par_chunks_mut(chunk)
        .enumerate()
        .for_each(|(i, rows)| f(i * SLICE_ROWS, rows));
}
