//! 对若干网检查探索与分析结果之间应当始终成立的关系。
use petgraph::algo::has_path_connecting;
use rand::SeedableRng;
use rand::rngs::StdRng;

use pn_analyzer::analysis::{
    ExplorationBudget, StateGraph, analyze_conservation, analyze_conservation_in,
    analyze_reversibility, explore_coverability, explore_reachability,
};
use pn_analyzer::net::io::read_net;
use pn_analyzer::net::{Net, Place, Transition};
use pn_analyzer::simulation::SimulationSession;

fn mutex() -> Net {
    read_net(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("nets/mutex.json")).unwrap()
}

/// Two workers sharing a pool of two resources, with a weight-2 batch job.
fn pool() -> Net {
    let mut net = Net::empty();
    let free = net.add_place(Place::new("free", 2)).unwrap();
    let busy = net.add_place(Place::new("busy", 0)).unwrap();
    let batch = net.add_place(Place::new("batch", 0)).unwrap();
    let take = net.add_transition(Transition::new("take"));
    let give = net.add_transition(Transition::new("give"));
    let start_batch = net.add_transition(Transition::new("start_batch"));
    let end_batch = net.add_transition(Transition::new("end_batch"));
    net.add_input_arc(free, take, 1).unwrap();
    net.add_output_arc(busy, take, 1).unwrap();
    net.add_input_arc(busy, give, 1).unwrap();
    net.add_output_arc(free, give, 1).unwrap();
    net.add_input_arc(free, start_batch, 2).unwrap();
    net.add_output_arc(batch, start_batch, 1).unwrap();
    net.add_input_arc(batch, end_batch, 1).unwrap();
    net.add_output_arc(free, end_batch, 2).unwrap();
    net
}

/// Unbounded: every cycle through `work` leaves a token in `log`.
fn logger() -> Net {
    let mut net = Net::empty();
    let idle = net.add_place(Place::new("idle", 1)).unwrap();
    let working = net.add_place(Place::new("working", 0)).unwrap();
    let log = net.add_place(Place::new("log", 0)).unwrap();
    let work = net.add_transition(Transition::new("work"));
    let done = net.add_transition(Transition::new("done"));
    net.add_input_arc(idle, work, 1).unwrap();
    net.add_output_arc(working, work, 1).unwrap();
    net.add_input_arc(working, done, 1).unwrap();
    net.add_output_arc(idle, done, 1).unwrap();
    net.add_output_arc(log, done, 1).unwrap();
    net
}

fn bounded_nets() -> Vec<Net> {
    vec![mutex(), pool()]
}

fn reach(net: &Net) -> StateGraph {
    explore_reachability(net, net.initial_marking(), ExplorationBudget::unlimited()).unwrap()
}

fn cover(net: &Net) -> StateGraph {
    explore_coverability(net, net.initial_marking(), ExplorationBudget::unlimited()).unwrap()
}

#[test]
fn reachability_edges_follow_the_firing_rule() {
    for net in bounded_nets() {
        let graph = reach(&net);
        for (source, transition, target) in graph.edges() {
            let fired = net.fire(&graph.node(source).marking, transition).unwrap();
            assert_eq!(fired, graph.node(target).marking);
        }
        assert!(!graph.has_omega());
    }
}

#[test]
fn exploration_is_deterministic() {
    for net in [mutex(), pool(), logger()] {
        let first = serde_json::to_string(&cover(&net).export()).unwrap();
        let second = serde_json::to_string(&cover(&net).export()).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn coverability_covers_every_reachable_marking() {
    for net in bounded_nets() {
        let reachable = reach(&net);
        let coverable = cover(&net);
        for (_, node) in reachable.nodes() {
            assert!(coverable.nodes().any(|(_, c)| node.marking <= c.marking));
        }
    }

    // On an unbounded net, compare against a depth-limited reachability prefix.
    let net = logger();
    let budget = ExplorationBudget {
        max_states: None,
        max_depth: Some(8),
    };
    let prefix = explore_reachability(&net, net.initial_marking(), budget)
        .unwrap_err()
        .into_partial()
        .unwrap();
    let coverable = cover(&net);
    assert!(coverable.has_omega());
    for (_, node) in prefix.nodes() {
        assert!(coverable.nodes().any(|(_, c)| node.marking <= c.marking));
    }
}

#[test]
fn bounded_nets_give_the_same_graph_in_both_modes() {
    for net in bounded_nets() {
        let reachable = reach(&net);
        let coverable = cover(&net);
        assert_eq!(reachable.node_count(), coverable.node_count());
        assert_eq!(reachable.graph.edge_count(), coverable.graph.edge_count());
        for (_, node) in reachable.nodes() {
            assert!(coverable.contains_marking(&node.marking));
        }
    }
}

#[test]
fn conservation_witness_holds_everywhere() {
    for net in bounded_nets() {
        let graph = reach(&net);
        let verdict = analyze_conservation(&net);
        assert!(verdict.is_conservative());
        assert!(verdict.holds_on(&graph));
        assert!(verdict.weights().unwrap().iter().all(|w| *w > 0));
    }

    let net = logger();
    assert!(!analyze_conservation(&net).is_conservative());
    let graph = cover(&net);
    assert!(!analyze_conservation_in(&graph, &net).is_conservative());
}

#[test]
fn reversible_graphs_lead_back_home() {
    for net in [mutex(), pool(), logger()] {
        let graph = cover(&net);
        if analyze_reversibility(&graph) {
            for (node, _) in graph.nodes() {
                assert!(has_path_connecting(&graph.graph, node, graph.initial, None));
            }
        }
    }
    assert!(analyze_reversibility(&reach(&pool())));
    assert!(!analyze_reversibility(&cover(&logger())));
}

#[test]
fn degenerate_nets_yield_a_single_node() {
    let empty = Net::empty();
    let graph = reach(&empty);
    assert_eq!(graph.node_count(), 1);
    assert_eq!(graph.graph.edge_count(), 0);
    assert!(graph.node(graph.initial).marking.is_empty());

    // Without places the only marking is the empty one; transitions are
    // vacuously enabled but contribute no edges.
    let mut transitions_only = Net::empty();
    transitions_only.add_transition(Transition::new("tick"));
    for graph in [reach(&transitions_only), cover(&transitions_only)] {
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.graph.edge_count(), 0);
        assert!(graph.deadlocks.is_empty());
        assert!(analyze_reversibility(&graph));
    }

    let mut places_only = Net::empty();
    places_only.add_place(Place::new("p", 2)).unwrap();
    let graph = cover(&places_only);
    assert_eq!(graph.node_count(), 1);
    assert_eq!(graph.deadlocks, vec![graph.initial]);
    assert!(analyze_reversibility(&graph));
}

#[test]
fn random_simulation_stays_inside_the_reachability_graph() {
    let net = mutex();
    let graph = reach(&net);
    let mut session = SimulationSession::new(net);
    let mut rng = StdRng::seed_from_u64(2024);
    session.begin();
    for _ in 0..200 {
        assert!(session.fire_random(&mut rng).unwrap().is_some());
        assert!(graph.contains_marking(session.marking()));
    }
    session.end();
    assert_eq!(session.marking(), &graph.node(graph.initial).marking);
}
