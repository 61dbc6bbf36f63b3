//! 活性分析
//!
//! 在状态图上对每个迁移分级：
//! * `Dead`（L0）：在任何已探索标识下均不可发生；
//! * `PotentiallyFirable`（L1）：至少在一个标识下可发生；
//! * `InfinitelyFirable`（L3）：标注该迁移的某条边位于一个强连通分量内部，
//!   即存在无限次发生该迁移的发生序列；
//! * `Live`（L4 近似）：每个终端强连通分量中都有使其可发生的标识，等价于
//!   从任一可达标识出发都能再次使其可发生。
//!
//! 在覆盖图上 `ω` 会掩盖精确计数，此时结果是近似值。L2 与 L3 在有限
//! 状态图上不作区分。
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use petgraph::Direction;
use petgraph::graph::NodeIndex;
use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::analysis::components::Components;
use crate::analysis::reachability::StateGraph;
use crate::net::Net;
use crate::net::ids::TransitionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum LivenessLevel {
    Dead,
    PotentiallyFirable,
    InfinitelyFirable,
    Live,
}

impl LivenessLevel {
    /// Level in the usual L0–L4 hierarchy.
    pub fn level(self) -> u8 {
        match self {
            LivenessLevel::Dead => 0,
            LivenessLevel::PotentiallyFirable => 1,
            LivenessLevel::InfinitelyFirable => 3,
            LivenessLevel::Live => 4,
        }
    }
}

impl fmt::Display for LivenessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LivenessLevel::Dead => "dead",
            LivenessLevel::PotentiallyFirable => "potentially firable",
            LivenessLevel::InfinitelyFirable => "infinitely firable",
            LivenessLevel::Live => "live",
        };
        write!(f, "L{} ({})", self.level(), name)
    }
}

pub fn analyze_liveness(
    state_graph: &StateGraph,
    net: &Net,
) -> BTreeMap<TransitionId, LivenessLevel> {
    if state_graph.truncated {
        log::warn!("liveness computed on a truncated graph");
    }
    let components = Components::of(state_graph);

    let mut cycling: FxHashSet<TransitionId> = FxHashSet::default();
    for (source, transition, target) in state_graph.edges() {
        if components.same_component(source, target) {
            cycling.insert(transition);
        }
    }

    net.transitions()
        .indices()
        .map(|transition| {
            let level = classify(state_graph, &components, &cycling, transition);
            log::debug!("transition {} is {}", transition, level);
            (transition, level)
        })
        .collect()
}

fn classify(
    state_graph: &StateGraph,
    components: &Components,
    cycling: &FxHashSet<TransitionId>,
    transition: TransitionId,
) -> LivenessLevel {
    let enabled_somewhere = state_graph
        .nodes()
        .any(|(_, node)| node.enabled.contains(&transition));
    if !enabled_somewhere {
        return LivenessLevel::Dead;
    }

    let live = components.terminal_components().all(|component| {
        components
            .members(component)
            .iter()
            .any(|&node| state_graph.node(node).enabled.contains(&transition))
    });
    if live {
        LivenessLevel::Live
    } else if cycling.contains(&transition) {
        LivenessLevel::InfinitelyFirable
    } else {
        LivenessLevel::PotentiallyFirable
    }
}

/// `true` iff every transition is live.
pub fn is_live(levels: &BTreeMap<TransitionId, LivenessLevel>) -> bool {
    levels.values().all(|level| *level == LivenessLevel::Live)
}

/// Nodes from which `transition` can never become enabled again, in BFS order.
pub fn dead_at(state_graph: &StateGraph, transition: TransitionId) -> Vec<NodeIndex> {
    let mut can_reach: FxHashSet<NodeIndex> = FxHashSet::default();
    let mut queue: VecDeque<NodeIndex> = state_graph
        .nodes()
        .filter(|(_, node)| node.enabled.contains(&transition))
        .map(|(index, _)| index)
        .collect();
    can_reach.extend(queue.iter().copied());

    while let Some(node) = queue.pop_front() {
        for predecessor in state_graph
            .graph
            .neighbors_directed(node, Direction::Incoming)
        {
            if can_reach.insert(predecessor) {
                queue.push_back(predecessor);
            }
        }
    }

    state_graph
        .nodes()
        .map(|(index, _)| index)
        .filter(|index| !can_reach.contains(index))
        .collect()
}
