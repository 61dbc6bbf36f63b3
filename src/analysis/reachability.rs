//! 状态空间探索：可达图与覆盖图构造.
//!
//! 两种模式共用同一个广度优先搜索。覆盖图模式下，新标识在插入前与其
//! 生成树上的全部祖先比较（由近及远），若严格覆盖某个祖先，则所有增长的
//! 库所记为 `ω`（Karp–Miller 加速）。标识按值去重：已存在的标识直接作为边的
//! 目标，包括自环。
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use petgraph::dot::{Config, Dot};
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableGraph;
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::net::ids::{PlaceId, TransitionId};
use crate::net::structure::{Marking, Tokens};
use crate::net::{FireError, Net};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplorationMode {
    /// Exact markings, no ω. Only terminates on bounded nets.
    Reachability,
    /// Karp–Miller abstraction; always terminates.
    #[default]
    Coverability,
}

/// Caps on the search. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorationBudget {
    /// Maximum number of distinct markings in the graph.
    pub max_states: Option<usize>,
    /// Maximum BFS depth of any marking.
    pub max_depth: Option<usize>,
}

impl ExplorationBudget {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn states(limit: usize) -> Self {
        Self {
            max_states: Some(limit),
            max_depth: None,
        }
    }

    fn admits(&self, states: usize, depth: usize) -> bool {
        self.max_states.is_none_or(|limit| states < limit)
            && self.max_depth.is_none_or(|limit| depth <= limit)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StateGraphConfig {
    pub mode: ExplorationMode,
    pub budget: ExplorationBudget,
}

#[derive(Debug, Error)]
pub enum ExplorationError {
    /// The search hit the budget. `partial` holds everything built so far
    /// and is tagged `truncated`.
    #[error("exploration budget {budget:?} exceeded after {} states", .partial.graph.node_count())]
    BudgetExceeded {
        budget: ExplorationBudget,
        partial: Box<StateGraph>,
    },
    #[error(transparent)]
    Fire(#[from] FireError),
}

impl ExplorationError {
    /// The partially built graph, if the search was cut short by the budget.
    pub fn into_partial(self) -> Option<StateGraph> {
        match self {
            ExplorationError::BudgetExceeded { partial, .. } => Some(*partial),
            ExplorationError::Fire(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenChange {
    pub place: PlaceId,
    pub before: Tokens,
    pub after: Tokens,
}

impl TokenChange {
    fn new(place: PlaceId, before: Tokens, after: Tokens) -> Option<Self> {
        (before != after).then_some(Self {
            place,
            before,
            after,
        })
    }
}

/// marking 保留完整标识；parent/via 构成从初始标识出发的生成树.
#[derive(Debug, Clone)]
pub struct StateNode {
    pub index: usize,
    pub marking: Marking,
    pub depth: usize,
    pub parent: Option<NodeIndex>,
    pub via: Option<TransitionId>,
    pub enabled: Vec<TransitionId>,
    /// Successors have been generated. Only `false` in truncated graphs.
    pub expanded: bool,
}

#[derive(Debug, Clone)]
pub struct StateEdge {
    pub transition: TransitionId,
    pub name: String,
    pub changes: Vec<TokenChange>,
}

impl StateEdge {
    fn new(net: &Net, transition: TransitionId, before: &Marking, after: &Marking) -> Self {
        let changes = before
            .iter()
            .filter_map(|(place, tokens)| TokenChange::new(place, tokens, after.tokens(place)))
            .collect();
        Self {
            transition,
            name: net.transitions()[transition].name.clone(),
            changes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateGraphStats {
    pub state_count: usize,
    pub edge_count: usize,
    pub deadlock_count: usize,
    pub omega_states: usize,
    pub truncated: bool,
}

/// Node/edge list handed to whatever renders the graph.
#[derive(Debug, Clone, Serialize)]
pub struct GraphExport {
    pub mode: ExplorationMode,
    pub truncated: bool,
    pub nodes: Vec<NodeExport>,
    pub edges: Vec<EdgeExport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeExport {
    pub id: usize,
    pub label: String,
    pub marking: Marking,
    pub initial: bool,
    pub deadlock: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeExport {
    pub source: usize,
    pub target: usize,
    pub transition: TransitionId,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct StateGraph {
    pub graph: StableGraph<StateNode, StateEdge>,
    pub initial: NodeIndex,
    pub mode: ExplorationMode,
    pub deadlocks: Vec<NodeIndex>,
    pub truncated: bool,
    markings: FxHashMap<Marking, NodeIndex>,
}

impl StateGraph {
    pub fn explore(
        net: &Net,
        initial: Marking,
        config: &StateGraphConfig,
    ) -> Result<Self, ExplorationError> {
        if initial.len() != net.places_len() {
            return Err(FireError::MarkingSize {
                expected: net.places_len(),
                found: initial.len(),
            }
            .into());
        }

        let mut state_graph = Self::rooted_at(initial, config.mode);
        if net.places_len() == 0 {
            // Only the empty marking exists; firing cannot leave it.
            let root = state_graph.initial;
            let enabled = net.enabled_transitions(&state_graph.graph[root].marking);
            if enabled.is_empty() {
                state_graph.deadlocks.push(root);
            }
            state_graph.graph[root].enabled = enabled;
            state_graph.graph[root].expanded = true;
            return Ok(state_graph);
        }

        let capped = net.capped_places();
        let mut queue = VecDeque::from([state_graph.initial]);

        while let Some(source) = queue.pop_front() {
            let current = state_graph.graph[source].marking.clone();
            let enabled = net.enabled_transitions(&current);
            state_graph.graph[source].enabled = enabled.clone();
            state_graph.graph[source].expanded = true;

            if enabled.is_empty() {
                state_graph.deadlocks.push(source);
                continue;
            }

            for transition in enabled {
                let next = net.fire(&current, transition)?;
                let target = match state_graph.markings.get(&next) {
                    Some(&existing) => existing,
                    None => match state_graph.insert(source, transition, next, &capped, &config.budget) {
                        Some(inserted) => {
                            queue.push_back(inserted);
                            inserted
                        }
                        None => {
                            state_graph.truncated = true;
                            log::warn!(
                                "{:?} exploration stopped at {} states: budget {:?} exhausted",
                                config.mode,
                                state_graph.graph.node_count(),
                                config.budget
                            );
                            return Err(ExplorationError::BudgetExceeded {
                                budget: config.budget,
                                partial: Box::new(state_graph),
                            });
                        }
                    },
                };
                let edge = StateEdge::new(
                    net,
                    transition,
                    &current,
                    &state_graph.graph[target].marking,
                );
                state_graph.graph.add_edge(source, target, edge);
            }
        }

        log::debug!(
            "{:?} graph built: {} states, {} edges, {} deadlocks",
            config.mode,
            state_graph.graph.node_count(),
            state_graph.graph.edge_count(),
            state_graph.deadlocks.len()
        );
        Ok(state_graph)
    }

    fn rooted_at(initial: Marking, mode: ExplorationMode) -> Self {
        let mut graph = StableGraph::new();
        let root = graph.add_node(StateNode {
            index: 0,
            marking: initial.clone(),
            depth: 0,
            parent: None,
            via: None,
            enabled: Vec::new(),
            expanded: false,
        });
        let mut markings = FxHashMap::default();
        markings.insert(initial, root);
        Self {
            graph,
            initial: root,
            mode,
            deadlocks: Vec::new(),
            truncated: false,
            markings,
        }
    }

    /// Adds the successor of `source` reached through `transition`, after
    /// ω-acceleration in coverability mode. Returns the node holding the
    /// final marking, or `None` when the budget forbids a new node.
    fn insert(
        &mut self,
        source: NodeIndex,
        transition: TransitionId,
        mut marking: Marking,
        capped: &[PlaceId],
        budget: &ExplorationBudget,
    ) -> Option<NodeIndex> {
        if self.mode == ExplorationMode::Coverability
            && self.accelerate(source, &mut marking, capped)
        {
            if let Some(&existing) = self.markings.get(&marking) {
                return Some(existing);
            }
        }

        let depth = self.graph[source].depth + 1;
        if !budget.admits(self.graph.node_count(), depth) {
            return None;
        }
        let index = self.graph.add_node(StateNode {
            index: self.graph.node_count(),
            marking: marking.clone(),
            depth,
            parent: Some(source),
            via: Some(transition),
            enabled: Vec::new(),
            expanded: false,
        });
        self.markings.insert(marking, index);
        Some(index)
    }

    /// Compares `candidate` with every marking on the tree path from
    /// `predecessor` back to the root, nearest first.
    fn accelerate(
        &self,
        predecessor: NodeIndex,
        candidate: &mut Marking,
        capped: &[PlaceId],
    ) -> bool {
        let mut changed = false;
        let mut cursor = Some(predecessor);
        while let Some(node) = cursor {
            changed |= candidate.accelerate_against(&self.graph[node].marking, capped);
            cursor = self.graph[node].parent;
        }
        changed
    }

    pub fn stats(&self) -> StateGraphStats {
        StateGraphStats {
            state_count: self.graph.node_count(),
            edge_count: self.graph.edge_count(),
            deadlock_count: self.deadlocks.len(),
            omega_states: self.nodes().filter(|(_, n)| n.marking.has_omega()).count(),
            truncated: self.truncated,
        }
    }

    pub fn node(&self, index: NodeIndex) -> &StateNode {
        &self.graph[index]
    }

    /// Nodes in insertion (BFS) order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &StateNode)> {
        self.graph
            .node_indices()
            .map(move |index| (index, &self.graph[index]))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn find(&self, marking: &Marking) -> Option<NodeIndex> {
        self.markings.get(marking).copied()
    }

    pub fn contains_marking(&self, marking: &Marking) -> bool {
        self.markings.contains_key(marking)
    }

    pub fn has_omega(&self) -> bool {
        self.nodes().any(|(_, node)| node.marking.has_omega())
    }

    /// `(source, transition, target)` for every edge.
    pub fn edges(&self) -> impl Iterator<Item = (NodeIndex, TransitionId, NodeIndex)> {
        self.graph
            .edge_references()
            .map(|edge| (edge.source(), edge.weight().transition, edge.target()))
    }

    /// Firing sequence from the initial marking to `node` along the
    /// spanning tree built during the search.
    pub fn path_to(&self, node: NodeIndex) -> Vec<TransitionId> {
        let mut sequence = Vec::new();
        let mut cursor = node;
        while let (Some(parent), Some(via)) = (self.graph[cursor].parent, self.graph[cursor].via) {
            sequence.push(via);
            cursor = parent;
        }
        sequence.reverse();
        sequence
    }

    pub fn export(&self) -> GraphExport {
        let nodes = self
            .nodes()
            .map(|(index, node)| NodeExport {
                id: index.index(),
                label: node.marking.to_string(),
                marking: node.marking.clone(),
                initial: index == self.initial,
                deadlock: self.deadlocks.contains(&index),
            })
            .collect();
        let edges = self
            .graph
            .edge_references()
            .map(|edge| EdgeExport {
                source: edge.source().index(),
                target: edge.target().index(),
                transition: edge.weight().transition,
                label: edge.weight().name.clone(),
            })
            .collect();
        GraphExport {
            mode: self.mode,
            truncated: self.truncated,
            nodes,
            edges,
        }
    }

    pub fn dot(&self) -> String {
        fn escape(s: &str) -> String {
            s.replace('\\', "\\\\").replace('"', "\\\"")
        }

        let edge_attr = |_, edge: petgraph::stable_graph::EdgeReference<StateEdge>| -> String {
            format!("label=\"{}\"", escape(&edge.weight().name))
        };

        let node_attr = |_, (index, node): (NodeIndex, &StateNode)| -> String {
            let mut attrs = format!("label=\"s{}\\n{}\"", node.index, escape(&node.marking.to_string()));
            if index == self.initial {
                attrs.push_str(", penwidth=2");
            }
            if self.deadlocks.contains(&index) {
                attrs.push_str(", style=filled, fillcolor=\"#ffcdd2\"");
            }
            attrs
        };

        format!(
            "{:?}",
            Dot::with_attr_getters(
                &self.graph,
                &[Config::EdgeNoLabel, Config::NodeNoLabel],
                &edge_attr,
                &node_attr
            )
        )
    }

    pub fn write_dot<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let dot = self.dot();
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, dot)
    }
}

/// Exact reachability graph from `initial`.
pub fn explore_reachability(
    net: &Net,
    initial: Marking,
    budget: ExplorationBudget,
) -> Result<StateGraph, ExplorationError> {
    let config = StateGraphConfig {
        mode: ExplorationMode::Reachability,
        budget,
    };
    StateGraph::explore(net, initial, &config)
}

/// Coverability graph from `initial`.
pub fn explore_coverability(
    net: &Net,
    initial: Marking,
    budget: ExplorationBudget,
) -> Result<StateGraph, ExplorationError> {
    let config = StateGraphConfig {
        mode: ExplorationMode::Coverability,
        budget,
    };
    StateGraph::explore(net, initial, &config)
}
