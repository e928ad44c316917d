//! Content fingerprinting.
//!
//! Fingerprints drive the journal's skip-on-retry check: a file whose digest
//! already has a completed journal record is not uploaded again.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use xxhash_rust::xxh3::Xxh3;

use crate::errors::SyncResult;

pub const HASH_BUFFER_SIZE: usize = 1024 * 1024;

/// Compute the streaming xxh3-128 digest of a file, hex-encoded.
///
/// Reads through a 1 MiB buffer so memory use is flat regardless of file size.
pub fn fingerprint_file(path: &Path) -> SyncResult<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(HASH_BUFFER_SIZE, file);
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
    let mut hasher = Xxh3::new();

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:032x}", hasher.digest128()))
}

/// Digest an in-memory buffer. Same encoding as [`fingerprint_file`].
pub fn fingerprint_bytes(data: &[u8]) -> String {
    let mut hasher = Xxh3::new();
    hasher.update(data);
    format!("{:032x}", hasher.digest128())
}
