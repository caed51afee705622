use snafu::ensure;

use crate::plan::{InvalidChunkSizeSnafu, PartitionError};

/// Groups `items` into runs of `max_chunk_size`, preserving order.
///
/// Every run except possibly the last has exactly `max_chunk_size` items.
pub fn chunk<T>(items: Vec<T>, max_chunk_size: usize) -> Result<Vec<Vec<T>>, PartitionError> {
    ensure!(
        max_chunk_size > 0,
        InvalidChunkSizeSnafu {
            size: max_chunk_size
        }
    );

    let mut chunks = Vec::with_capacity(items.len().div_ceil(max_chunk_size));
    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        chunks.push(iter.by_ref().take(max_chunk_size).collect());
    }
    Ok(chunks)
}
