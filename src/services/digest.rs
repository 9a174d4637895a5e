//! Streaming digest over the two byte ranges flanking the placeholder.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::domain::types::ByteRange;
use crate::infra::error::{SignError, SignResult};

/// SHA-256 over `[before_start, before_start+before_size)` followed by
/// `[after_start, after_start+after_size)`, returned as padded Base64.
///
/// Streams through `buffer`; memory use is independent of file size.
pub fn byte_range_digest_b64(
    path: &Path,
    range: &ByteRange,
    buffer: &mut [u8],
) -> SignResult<String> {
    debug_assert!(!buffer.is_empty());

    let mut file = File::open(path).map_err(|e| SignError::io(path, e))?;
    let file_size = file
        .metadata()
        .map_err(|e| SignError::io(path, e))?
        .len();
    range.validate(file_size)?;

    let mut hasher = Sha256::new();
    let chunks = [
        (range.before_start, range.before_size),
        (range.after_start, range.after_size),
    ];
    for (start, size) in chunks {
        file.seek(SeekFrom::Start(start))
            .map_err(|e| SignError::io(path, e))?;
        let mut remaining = size;
        while remaining > 0 {
            let chunk = usize::try_from(remaining.min(buffer.len() as u64)).unwrap_or(buffer.len());
            file.read_exact(&mut buffer[..chunk])
                .map_err(|e| SignError::io(path, e))?;
            hasher.update(&buffer[..chunk]);
            remaining -= chunk as u64;
        }
    }

    Ok(STANDARD.encode(hasher.finalize()))
}
