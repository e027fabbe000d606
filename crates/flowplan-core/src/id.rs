//! Strongly-typed handles into the graph and plan arenas.
//!
//! Every handle is a plain index into the owning arena, so identity checks are
//! integer comparisons and handles stay valid for the lifetime of the arena.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

macro_rules! new_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd,
        )]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            pub const fn new(v: u32) -> Self {
                Self(v)
            }
            pub const fn get(self) -> u32 {
                self.0
            }
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
            pub(crate) fn from_index(i: usize) -> Self {
                Self(i as u32)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

new_id!(OperatorId);
new_id!(PortId);
new_id!(StageId);
new_id!(StagePortId);
new_id!(GraphId);

impl GraphId {
    /// A handle no other graph in this process has been given.
    pub(crate) fn fresh() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl StageId {
    /// Handle for the next element of an arena of length `len`.
    pub fn next(len: usize) -> Self {
        Self::from_index(len)
    }
}

impl StagePortId {
    /// Handle for the next element of an arena of length `len`.
    pub fn next(len: usize) -> Self {
        Self::from_index(len)
    }
}
