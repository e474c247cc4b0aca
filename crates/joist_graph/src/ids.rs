//! Opaque ID newtypes for graph entities.
//!
//! Each ID is a thin `u32` wrapper that is `Copy`, `Hash`, `Ord`, and
//! `Serialize`/`Deserialize`. IDs are created by
//! [`Arena::alloc`](crate::arena::Arena::alloc).

use crate::arena::ArenaId;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Creates an ID from a raw `u32` index.
            pub const fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index.
            pub const fn as_raw(self) -> u32 {
                self.0
            }

            /// Returns the index as a `usize`, for side tables parallel to the arena.
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl ArenaId for $name {
            fn from_raw(index: u32) -> Self {
                Self(index)
            }

            fn as_raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Opaque, copyable ID for a build step in the step arena.
    StepId,
    "step#"
);

define_id!(
    /// Opaque, copyable ID for an interned artifact path.
    ArtifactId,
    "artifact#"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefix() {
        assert_eq!(StepId::from_raw(3).to_string(), "step#3");
        assert_eq!(ArtifactId::from_raw(7).to_string(), "artifact#7");
    }

    #[test]
    fn ordering_follows_raw_index() {
        assert!(StepId::from_raw(1) < StepId::from_raw(2));
        assert_eq!(StepId::from_raw(5).index(), 5);
    }
}
