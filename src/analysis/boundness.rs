//! 有界性分析
//!
//! 基于覆盖图：网有界当且仅当覆盖图中不存在含 `ω` 的标识。逐库所报告
//! 所有节点上观察到的最大有限 token 数，出现 `ω` 的库所记为无界。

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::analysis::reachability::{
    ExplorationBudget, ExplorationError, StateGraph, explore_coverability,
};
use crate::net::Net;
use crate::net::ids::{PlaceId, TransitionId};
use crate::net::structure::{Tokens, Weight};

/// Bound of a single place over all explored markings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaceBound {
    Bounded(Weight),
    Unbounded,
}

impl PlaceBound {
    fn absorb(self, tokens: Tokens) -> Self {
        match (self, tokens) {
            (PlaceBound::Unbounded, _) | (_, Tokens::Omega) => PlaceBound::Unbounded,
            (PlaceBound::Bounded(max), Tokens::Finite(count)) => PlaceBound::Bounded(max.max(count)),
        }
    }
}

impl fmt::Display for PlaceBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaceBound::Bounded(max) => write!(f, "bounded (max {max})"),
            PlaceBound::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// 有界性检查结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum BoundnessResult {
    /// Every place stays at or below `bound` tokens.
    Bounded { bound: Weight },
    Unbounded {
        unbounded_places: Vec<PlaceId>,
        /// Firing sequence from the initial marking to the first ω marking.
        witness_sequence: Vec<TransitionId>,
    },
    /// 无法确定（状态空间超出预算）
    Unknown { reason: String },
}

impl BoundnessResult {
    pub fn is_bounded(&self) -> bool {
        matches!(self, BoundnessResult::Bounded { .. })
    }

    /// 1-bounded.
    pub fn is_safe(&self) -> bool {
        matches!(self, BoundnessResult::Bounded { bound } if *bound <= 1)
    }
}

impl fmt::Display for BoundnessResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundnessResult::Bounded { bound } => write!(f, "net is {bound}-bounded"),
            BoundnessResult::Unbounded {
                unbounded_places,
                witness_sequence,
            } => {
                write!(f, "net is unbounded in {:?}", unbounded_places)?;
                if !witness_sequence.is_empty() {
                    write!(f, ", witness: {:?}", witness_sequence)?;
                }
                Ok(())
            }
            BoundnessResult::Unknown { reason } => write!(f, "boundedness unknown: {reason}"),
        }
    }
}

/// Per-place bounds over every node of `state_graph`.
pub fn analyze_boundedness(state_graph: &StateGraph, net: &Net) -> BTreeMap<PlaceId, PlaceBound> {
    if state_graph.truncated {
        log::warn!("boundedness computed on a truncated graph; bounds are lower estimates");
    }
    let mut bounds: BTreeMap<PlaceId, PlaceBound> = net
        .places()
        .indices()
        .map(|place| (place, PlaceBound::Bounded(0)))
        .collect();
    for (_, node) in state_graph.nodes() {
        for (place, tokens) in node.marking.iter() {
            if let Some(bound) = bounds.get_mut(&place) {
                *bound = bound.absorb(tokens);
            }
        }
    }
    bounds
}

/// Whole-net verdict with a witness sequence when unbounded.
pub fn check_boundness(state_graph: &StateGraph, net: &Net) -> BoundnessResult {
    let bounds = analyze_boundedness(state_graph, net);
    let unbounded_places: Vec<PlaceId> = bounds
        .iter()
        .filter(|(_, bound)| **bound == PlaceBound::Unbounded)
        .map(|(place, _)| *place)
        .collect();

    if unbounded_places.is_empty() {
        let bound = bounds
            .values()
            .filter_map(|bound| match bound {
                PlaceBound::Bounded(max) => Some(*max),
                PlaceBound::Unbounded => None,
            })
            .max()
            .unwrap_or(0);
        return BoundnessResult::Bounded { bound };
    }

    let witness_sequence = state_graph
        .nodes()
        .find(|(_, node)| node.marking.has_omega())
        .map(|(index, _)| state_graph.path_to(index))
        .unwrap_or_default();
    BoundnessResult::Unbounded {
        unbounded_places,
        witness_sequence,
    }
}

pub fn check_place_boundness(state_graph: &StateGraph, net: &Net, place: PlaceId) -> PlaceBound {
    analyze_boundedness(state_graph, net)
        .get(&place)
        .copied()
        .unwrap_or(PlaceBound::Bounded(0))
}

/// Runs its own coverability exploration from the net's initial marking.
pub struct BoundnessAnalyzer {
    budget: ExplorationBudget,
}

impl Default for BoundnessAnalyzer {
    fn default() -> Self {
        Self {
            budget: ExplorationBudget::states(10_000),
        }
    }
}

impl BoundnessAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_budget(mut self, budget: ExplorationBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn check(&self, net: &Net) -> Result<BoundnessResult, ExplorationError> {
        match explore_coverability(net, net.initial_marking(), self.budget) {
            Ok(graph) => {
                let result = check_boundness(&graph, net);
                log::info!("{}", result);
                Ok(result)
            }
            Err(ExplorationError::BudgetExceeded { budget, partial }) => {
                // An ω seen before the cut-off is already conclusive.
                match check_boundness(&partial, net) {
                    unbounded @ BoundnessResult::Unbounded { .. } => Ok(unbounded),
                    _ => Ok(BoundnessResult::Unknown {
                        reason: format!(
                            "coverability graph exceeded {:?} after {} states",
                            budget,
                            partial.node_count()
                        ),
                    }),
                }
            }
            Err(err) => Err(err),
        }
    }
}
