//! Shared foundational types used across the joist build engine.
//!
//! This crate provides content fingerprints for command lines and generated
//! files, point-in-time file stamps used for timestamp-based staleness, and
//! the framed blob format shared by every persisted store.

#![warn(missing_docs)]

pub mod blob;
pub mod hash;
pub mod stamp;

pub use blob::{decode_blob, encode_blob, write_atomic, BlobError, BlobHeader};
pub use hash::ContentHash;
pub use stamp::FileStamp;
