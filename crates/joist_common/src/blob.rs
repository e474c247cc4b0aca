//! Framed binary blobs with a validated header.
//!
//! Layout: a 4-byte little-endian header length, the bincode-encoded
//! [`BlobHeader`], then the payload. The action history and the graph cache
//! both persist through this framing.

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::hash::ContentHash;

/// Header prepended to every persisted blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobHeader {
    /// Identifies the blob type.
    pub magic: [u8; 4],
    /// Payload format version. Any mismatch rejects the blob.
    pub format_version: u32,
    /// Version of the tool that wrote the blob.
    pub tool_version: String,
    /// Fingerprint of the payload bytes.
    pub checksum: ContentHash,
}

/// Why a blob was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlobError {
    /// Shorter than its declared header.
    #[error("blob is truncated")]
    Truncated,
    /// The header could not be decoded.
    #[error("blob header is unreadable: {0}")]
    BadHeader(String),
    /// Magic bytes belong to another blob type.
    #[error("blob magic {found:?} does not match {expected:?}")]
    WrongMagic {
        /// Magic found in the file.
        found: [u8; 4],
        /// Magic the reader expects.
        expected: [u8; 4],
    },
    /// Written by an incompatible format version.
    #[error("blob format version {found} does not match {expected}")]
    VersionMismatch {
        /// Version found in the file.
        found: u32,
        /// Version the reader expects.
        expected: u32,
    },
    /// Payload bytes do not match the recorded checksum.
    #[error("blob checksum mismatch")]
    ChecksumMismatch,
    /// The header could not be encoded.
    #[error("failed to encode blob header: {0}")]
    Encode(String),
}

/// Frames `payload` behind a header.
pub fn encode_blob(
    magic: [u8; 4],
    format_version: u32,
    tool_version: &str,
    payload: &[u8],
) -> Result<Vec<u8>, BlobError> {
    let header = BlobHeader {
        magic,
        format_version,
        tool_version: tool_version.to_string(),
        checksum: ContentHash::from_bytes(payload),
    };
    let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
        .map_err(|e| BlobError::Encode(e.to_string()))?;

    let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
    output.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
    output.extend_from_slice(&header_bytes);
    output.extend_from_slice(payload);
    Ok(output)
}

/// Validates the header of `raw` and returns it with the payload slice.
pub fn decode_blob(
    raw: &[u8],
    magic: [u8; 4],
    format_version: u32,
) -> Result<(BlobHeader, &[u8]), BlobError> {
    let len_bytes: [u8; 4] = raw
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or(BlobError::Truncated)?;
    let header_len = u32::from_le_bytes(len_bytes) as usize;
    let header_bytes = raw.get(4..4 + header_len).ok_or(BlobError::Truncated)?;

    let (header, _): (BlobHeader, usize) =
        bincode::serde::decode_from_slice(header_bytes, bincode::config::standard())
            .map_err(|e| BlobError::BadHeader(e.to_string()))?;
    if header.magic != magic {
        return Err(BlobError::WrongMagic {
            found: header.magic,
            expected: magic,
        });
    }
    if header.format_version != format_version {
        return Err(BlobError::VersionMismatch {
            found: header.format_version,
            expected: format_version,
        });
    }

    let payload = &raw[4 + header_len..];
    if ContentHash::from_bytes(payload) != header.checksum {
        return Err(BlobError::ChecksumMismatch);
    }
    Ok((header, payload))
}

/// Writes `bytes` to a sibling temp file and renames it over `path`.
///
/// Readers never observe a partially written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = Path::new(&tmp_name);
    std::fs::write(tmp, bytes)?;
    std::fs::rename(tmp, path)
}
