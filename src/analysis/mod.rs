//! # 状态空间分析
//!
//! 先由 [`reachability`] 在给定初始标识上构造可达图或覆盖图，再在图上做
//! 行为性质分析：
//!
//! * [`liveness`]：逐迁移的活性等级；
//! * [`boundness`]：逐库所的界与整网有界性；
//! * [`reversibility`]：初始标识能否从任意可达标识重新到达；
//! * [`conservation`]：基于关联矩阵的 P-不变量与守恒性（不依赖图）。
//!
//! 所有分析都是只读的纯函数，不修改网或图。

pub mod boundness;
pub mod components;
pub mod conservation;
pub mod liveness;
pub mod reachability;
pub mod reversibility;

pub use boundness::{
    BoundnessAnalyzer, BoundnessResult, PlaceBound, analyze_boundedness, check_boundness,
};
pub use components::Components;
pub use conservation::{Conservation, analyze_conservation, analyze_conservation_in, place_invariants};
pub use liveness::{LivenessLevel, analyze_liveness, dead_at, is_live};
pub use reachability::{
    ExplorationBudget, ExplorationError, ExplorationMode, GraphExport, StateGraph,
    StateGraphConfig, StateGraphStats, explore_coverability, explore_reachability,
};
pub use reversibility::analyze_reversibility;

use crate::net::{Incidence, Net};

/// `C = Post - Pre` of `net`, places × transitions.
pub fn incidence_matrix(net: &Net) -> Incidence<i64> {
    net.incidence_matrix()
}
