//! 状态图的强连通分量分解（Tarjan）。
use petgraph::algo::tarjan_scc;
use petgraph::graph::NodeIndex;
use rustc_hash::FxHashMap;

use crate::analysis::reachability::StateGraph;

/// SCC decomposition of an explored graph, plus which components are
/// terminal (no edge leaves them).
#[derive(Debug, Clone)]
pub struct Components {
    members: Vec<Vec<NodeIndex>>,
    component_of: FxHashMap<NodeIndex, usize>,
    terminal: Vec<bool>,
}

impl Components {
    pub fn of(state_graph: &StateGraph) -> Self {
        let members = tarjan_scc(&state_graph.graph);
        let mut component_of = FxHashMap::default();
        for (component, nodes) in members.iter().enumerate() {
            for &node in nodes {
                component_of.insert(node, component);
            }
        }

        let mut terminal = vec![true; members.len()];
        for (source, _, target) in state_graph.edges() {
            let from = component_of[&source];
            if from != component_of[&target] {
                terminal[from] = false;
            }
        }

        Self {
            members,
            component_of,
            terminal,
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn component_of(&self, node: NodeIndex) -> usize {
        self.component_of[&node]
    }

    pub fn members(&self, component: usize) -> &[NodeIndex] {
        &self.members[component]
    }

    pub fn same_component(&self, a: NodeIndex, b: NodeIndex) -> bool {
        self.component_of(a) == self.component_of(b)
    }

    pub fn terminal_components(&self) -> impl Iterator<Item = usize> {
        self.terminal
            .iter()
            .enumerate()
            .filter(|(_, terminal)| **terminal)
            .map(|(component, _)| component)
    }
}
