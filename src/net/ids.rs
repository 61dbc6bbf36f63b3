//! 库所与迁移的强类型编号。
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::net::index_vec::Idx;

macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        #[repr(transparent)]
        pub struct $name(pub u32);

        impl $name {
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            pub const fn raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.0).finish()
            }
        }

        /// Short label used in graph exports and reports, e.g. `p3` / `t0`.
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl Idx for $name {
            fn index(self) -> usize {
                self.0 as usize
            }

            fn from_usize(idx: usize) -> Self {
                assert!(
                    idx <= u32::MAX as usize,
                    "index {idx} does not fit into {}",
                    stringify!($name)
                );
                Self(idx as u32)
            }
        }
    };
}

define_id!(PlaceId, "p");
define_id!(TransitionId, "t");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_render_with_kind_prefix() {
        assert_eq!(PlaceId::new(3).to_string(), "p3");
        assert_eq!(TransitionId::from_usize(0).to_string(), "t0");
        assert_eq!(format!("{:?}", PlaceId::new(1)), "PlaceId(1)");
        assert_eq!(format!("{:?}", TransitionId::new(7)), "TransitionId(7)");
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn oversized_index_is_rejected() {
        PlaceId::from_usize(u32::MAX as usize + 1);
    }
}
