//! Content fingerprints for command lines and generated files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// A 128-bit fingerprint computed using XXH3.
///
/// Used for the command fingerprint recorded in the action history and for
/// the inlined generated-file fingerprints stored in the graph cache. Two
/// inputs with the same `ContentHash` are assumed identical.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    /// Computes a fingerprint from a byte slice using XXH3-128.
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = xxhash_rust::xxh3::xxh3_128(data);
        Self(hash.to_le_bytes())
    }

    /// Computes a fingerprint over several string parts.
    ///
    /// Each part is length-prefixed so that `["ab", "c"]` and `["a", "bc"]`
    /// produce different fingerprints.
    pub fn from_parts(parts: &[&str]) -> Self {
        let mut buf = Vec::with_capacity(parts.iter().map(|p| p.len() + 8).sum());
        for part in parts {
            buf.extend_from_slice(&(part.len() as u64).to_le_bytes());
            buf.extend_from_slice(part.as_bytes());
        }
        Self::from_bytes(&buf)
    }

    /// Reads a file and computes the fingerprint of its contents.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let data = std::fs::read(path)?;
        Ok(Self::from_bytes(&data))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = ContentHash::from_bytes(b"cl.exe /c a.cpp");
        let b = ContentHash::from_bytes(b"cl.exe /c a.cpp");
        assert_eq!(a, b);
    }

    #[test]
    fn parts_are_length_prefixed() {
        let a = ContentHash::from_parts(&["ab", "c"]);
        let b = ContentHash::from_parts(&["a", "bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn display_format() {
        let h = ContentHash::from_bytes(b"link.exe");
        let s = format!("{h}");
        assert_eq!(s.len(), 32, "Display should be 32 hex chars");
        assert!(s.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn debug_abbreviated() {
        let h = ContentHash::from_bytes(b"test");
        let s = format!("{h:?}");
        assert!(s.starts_with("ContentHash("));
    }

    #[test]
    fn from_file_matches_from_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gen.h");
        std::fs::write(&path, "#pragma once").unwrap();
        assert_eq!(
            ContentHash::from_file(&path).unwrap(),
            ContentHash::from_bytes(b"#pragma once")
        );
        assert!(ContentHash::from_file(&dir.path().join("missing.h")).is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let h = ContentHash::from_parts(&["clang", "-c a.c", "17.0"]);
        let json = serde_json::to_string(&h).unwrap();
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(h, back);
    }
}
