use crate::error::{EiaError, Result};
use crate::period::TimeRange;

/// One request-sized slice of a query range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub range: TimeRange,
}

/// Split `range` into contiguous chunks of `chunk_size` periods.
///
/// A non-final chunk ends one period before the next chunk starts, so no
/// period is requested twice. The last chunk always ends exactly at
/// `range.end()`; when a step lands on `end` it takes that one extra period.
pub fn plan_chunks(range: &TimeRange, chunk_size: usize) -> Result<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(EiaError::invalid("chunk size must be at least one period"));
    }
    let step = i64::try_from(chunk_size)
        .map_err(|_| EiaError::invalid(format!("chunk size {chunk_size} is too large")))?;

    let end = range.end();
    let mut chunks = Vec::new();
    let mut current = range.start();
    loop {
        // Stepping off the calendar counts as passing `end`.
        match current.shift(step).ok() {
            Some(next) if next < end => {
                chunks.push(Chunk {
                    index: chunks.len(),
                    range: TimeRange::new(current, next.shift(-1)?)?,
                });
                current = next;
            }
            _ => {
                chunks.push(Chunk {
                    index: chunks.len(),
                    range: TimeRange::new(current, end)?,
                });
                break;
            }
        }
    }
    Ok(chunks)
}

/// Periods per chunk so that `periods × n_series` stays near `max_rows`.
///
/// `ceil(max_rows / n_series)`, bumped to the next even number.
pub fn chunk_size_for(max_rows: usize, n_series: usize) -> Result<usize> {
    if max_rows == 0 {
        return Err(EiaError::invalid("max rows per request must be positive"));
    }
    if n_series == 0 {
        return Err(EiaError::EmptyResult("no series to size chunks for".into()));
    }
    let size = max_rows.div_ceil(n_series);
    Ok(if size % 2 == 1 { size + 1 } else { size })
}
