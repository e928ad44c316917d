//! Chunk planning for the chunked upload protocol.

use crate::errors::{SyncError, SyncResult};

/// One chunk of a planned upload. Indexes are zero-based and contiguous; the
/// last chunk may be shorter than the configured size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkDescriptor {
    pub index: u32,
    pub offset: u64,
    pub len: u64,
}

/// Split `total_size` bytes into chunks of `chunk_size`.
///
/// Chunks are contiguous and non-overlapping; both uploaders consume the same
/// plan so the wire protocol sees identical `totalChunks` either way.
pub fn plan(total_size: u64, chunk_size: u64) -> SyncResult<Vec<ChunkDescriptor>> {
    if chunk_size == 0 {
        return Err(SyncError::Internal("chunk size must be non-zero".into()));
    }
    if total_size == 0 {
        return Ok(Vec::new());
    }

    let count = total_size.div_ceil(chunk_size);
    let mut chunks = Vec::with_capacity(count as usize);
    for index in 0..count {
        let offset = index * chunk_size;
        let len = chunk_size.min(total_size - offset);
        chunks.push(ChunkDescriptor {
            index: index as u32,
            offset,
            len,
        });
    }
    Ok(chunks)
}
