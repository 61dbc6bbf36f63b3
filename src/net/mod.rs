//! # Petri 网核心定义（Place/Transition Net）
//!
//! 设离散库所集合 `P` 与迁移集合 `T`。定义输入/输出映射
//! `Pre, Post ∈ ℕ^{|P|×|T|}`，以及关联矩阵 `C = Post - Pre`。
//! 对任意标识 `M ∈ (ℕ ∪ {ω})^{|P|}`：
//!
//! * 迁移 `t` **可发生** 当且仅当 `∀p: M[p] ≥ Pre[p, t]`（`ω` 大于任意有限值），
//!   且所有设有容量的输出库所在发生后不超过容量；
//! * 迁移 **发生** 后 `M' = M + C[:, t]`，其中 `ω ± k = ω`。
//!
//! ## 示例
//!
//! ```rust
//! use pn_analyzer::net::*;
//!
//! let mut net = Net::empty();
//! let p0 = net.add_place(Place::new("p0", 1)).unwrap();
//! let p1 = net.add_place(Place::new("p1", 0)).unwrap();
//! let t0 = net.add_transition(Transition::new("t0"));
//!
//! net.add_input_arc(p0, t0, 1).unwrap();
//! net.add_output_arc(p1, t0, 1).unwrap();
//!
//! let marking = net.initial_marking();
//! assert_eq!(net.enabled_transitions(&marking), vec![t0]);
//! let next = net.fire(&marking, t0).unwrap();
//! assert_eq!(next.tokens(p0), Tokens::Finite(0));
//! assert_eq!(next.tokens(p1), Tokens::Finite(1));
//! ```

pub mod core;
pub mod ids;
pub mod incidence;
pub mod index_vec;
pub mod io;
pub mod structure;

pub use self::core::{
    DiagnosticReport, FireError, MAX_ARC_WEIGHT, Net, NetDescription, TopologyError,
};
pub use ids::{PlaceId, TransitionId};
pub use incidence::Incidence;
pub use index_vec::{Idx, IndexVec};
pub use structure::{Arc, ArcDirection, Marking, Place, Tokens, Transition, Weight};
