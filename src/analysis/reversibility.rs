//! 可逆性：初始标识能否从每个可达标识重新到达。
use crate::analysis::components::Components;
use crate::analysis::reachability::StateGraph;

/// `true` iff every explored node lies in the strongly connected component
/// of the initial node.
pub fn analyze_reversibility(state_graph: &StateGraph) -> bool {
    if state_graph.truncated {
        log::warn!("reversibility computed on a truncated graph");
    }
    let components = Components::of(state_graph);
    let home = components.component_of(state_graph.initial);
    let reversible = components.len() == 1 && components.members(home).len() == state_graph.node_count();
    log::info!("net is {}reversible", if reversible { "" } else { "not " });
    reversible
}
