//! 端到端场景：小网上的图构造与各项分析结论。
use pn_analyzer::analysis::{
    BoundnessAnalyzer, BoundnessResult, Conservation, ExplorationBudget, ExplorationError,
    ExplorationMode, LivenessLevel, PlaceBound, analyze_boundedness, analyze_conservation,
    analyze_liveness, analyze_reversibility, check_boundness, dead_at, explore_coverability,
    explore_reachability, incidence_matrix, is_live,
};
use pn_analyzer::net::io::read_net;
use pn_analyzer::net::{Marking, Net, Place, PlaceId, Tokens, Transition, TransitionId};

fn manifest_path(relative: &str) -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(relative)
}

/// P (1 token) with a weight-1 self-loop through T.
fn self_loop() -> Net {
    let mut net = Net::empty();
    let p = net.add_place(Place::new("P", 1)).unwrap();
    let t = net.add_transition(Transition::new("T"));
    net.add_input_arc(p, t, 1).unwrap();
    net.add_output_arc(p, t, 1).unwrap();
    net
}

/// P1 (1 token) -> T -> P2, no way back.
fn one_shot() -> Net {
    let mut net = Net::empty();
    let p1 = net.add_place(Place::new("P1", 1)).unwrap();
    let p2 = net.add_place(Place::new("P2", 0)).unwrap();
    let t = net.add_transition(Transition::new("T"));
    net.add_input_arc(p1, t, 1).unwrap();
    net.add_output_arc(p2, t, 1).unwrap();
    net
}

/// P (1 token) -> T -> P with weight 2 going back.
fn doubler() -> Net {
    let mut net = Net::empty();
    let p = net.add_place(Place::new("P", 1)).unwrap();
    let t = net.add_transition(Transition::new("T"));
    net.add_input_arc(p, t, 1).unwrap();
    net.add_output_arc(p, t, 2).unwrap();
    net
}

#[test]
fn self_loop_is_live_bounded_and_conservative() {
    let net = self_loop();
    let graph =
        explore_reachability(&net, net.initial_marking(), ExplorationBudget::unlimited()).unwrap();

    assert_eq!(graph.node_count(), 1);
    assert_eq!(graph.node(graph.initial).marking, Marking::from_counts([1]));
    let edge = graph.graph.edge_weights().next().unwrap();
    assert_eq!(graph.graph.edge_count(), 1);
    assert_eq!(edge.name, "T");
    assert_eq!(
        graph.edges().collect::<Vec<_>>(),
        vec![(graph.initial, TransitionId::new(0), graph.initial)]
    );

    let levels = analyze_liveness(&graph, &net);
    assert_eq!(levels[&TransitionId::new(0)], LivenessLevel::Live);
    assert!(is_live(&levels));

    assert_eq!(check_boundness(&graph, &net), BoundnessResult::Bounded { bound: 1 });
    assert_eq!(
        analyze_boundedness(&graph, &net)[&PlaceId::new(0)],
        PlaceBound::Bounded(1)
    );

    let conservation = analyze_conservation(&net);
    assert_eq!(conservation.weights().unwrap().as_slice(), &[1]);
    assert!(conservation.holds_on(&graph));
    assert!(analyze_reversibility(&graph));
    assert!(graph.deadlocks.is_empty());
}

#[test]
fn one_shot_transfer_dies_and_cannot_return() {
    let net = one_shot();
    let graph =
        explore_reachability(&net, net.initial_marking(), ExplorationBudget::unlimited()).unwrap();

    assert_eq!(graph.node_count(), 2);
    let start = graph.find(&Marking::from_counts([1, 0])).unwrap();
    let end = graph.find(&Marking::from_counts([0, 1])).unwrap();
    assert_eq!(start, graph.initial);
    assert_eq!(graph.edges().collect::<Vec<_>>(), vec![(start, TransitionId::new(0), end)]);

    let t = TransitionId::new(0);
    assert!(dead_at(&graph, t).contains(&end));
    assert!(!graph.node(end).enabled.contains(&t));
    assert_eq!(analyze_liveness(&graph, &net)[&t], LivenessLevel::PotentiallyFirable);
    assert_eq!(graph.deadlocks, vec![end]);

    assert!(!analyze_reversibility(&graph));

    let conservation = analyze_conservation(&net);
    assert_eq!(
        conservation,
        Conservation::Conservative {
            weights: vec![1, 1].into()
        }
    );
    assert!(conservation.holds_on(&graph));
}

#[test]
fn doubler_collapses_to_omega() {
    let net = doubler();
    let graph =
        explore_coverability(&net, net.initial_marking(), ExplorationBudget::unlimited()).unwrap();

    assert!(graph.node_count() <= 3);
    let omega = Marking::new(vec![Tokens::Omega].into());
    let node = graph.find(&omega).unwrap();
    assert_eq!(graph.path_to(node).len(), 1);
    assert_eq!(
        analyze_boundedness(&graph, &net)[&PlaceId::new(0)],
        PlaceBound::Unbounded
    );
    assert!(matches!(
        check_boundness(&graph, &net),
        BoundnessResult::Unbounded { ref unbounded_places, .. } if unbounded_places == &[PlaceId::new(0)]
    ));
    assert!(!analyze_conservation(&net).is_conservative());
    assert!(!BoundnessAnalyzer::new().check(&net).unwrap().is_bounded());
}

#[test]
fn doubler_reachability_needs_a_budget() {
    let net = doubler();
    let err = explore_reachability(&net, net.initial_marking(), ExplorationBudget::states(50))
        .unwrap_err();
    match err {
        ExplorationError::BudgetExceeded { budget, partial } => {
            assert_eq!(budget.max_states, Some(50));
            assert!(partial.truncated);
            assert_eq!(partial.node_count(), 50);
            assert_eq!(partial.mode, ExplorationMode::Reachability);
            assert!(!partial.has_omega());
        }
        other => panic!("expected a budget error, got {other}"),
    }
}

#[test]
fn mutex_net_from_json() {
    let net = read_net(manifest_path("nets/mutex.json")).unwrap();
    assert!(!net.diagnose_connectivity().has_issues());

    let graph =
        explore_reachability(&net, net.initial_marking(), ExplorationBudget::unlimited()).unwrap();
    assert_eq!(graph.node_count(), 3);
    assert!(graph.deadlocks.is_empty());
    assert!(is_live(&analyze_liveness(&graph, &net)));
    assert!(analyze_reversibility(&graph));
    assert!(check_boundness(&graph, &net).is_safe());

    let conservation = analyze_conservation(&net);
    assert_eq!(conservation.weights().unwrap().as_slice(), &[1, 2, 1, 1, 2]);
    assert!(conservation.holds_on(&graph));

    let matrix = incidence_matrix(&net);
    assert_eq!(matrix.row(PlaceId::new(2)), &[-1, 1, -1, 1]);
}

#[test]
fn producer_net_from_ron() {
    let net = read_net(manifest_path("nets/producer.ron")).unwrap();
    let graph =
        explore_coverability(&net, net.initial_marking(), ExplorationBudget::unlimited()).unwrap();

    assert_eq!(graph.node_count(), 2);
    let flooded = graph
        .find(&Marking::new(vec![Tokens::Finite(1), Tokens::Omega].into()))
        .unwrap();
    assert_eq!(graph.node(flooded).enabled.len(), 2);
    assert_eq!(
        graph.edges().filter(|(s, _, t)| *s == flooded && *t == flooded).count(),
        2
    );
    let levels = analyze_liveness(&graph, &net);
    assert!(is_live(&levels));
}

/// `src` keeps minting tokens into the uncapped `q`, while `u` fills `p`
/// up to its capacity of 2.
fn capped_and_unbounded() -> Net {
    let mut net = Net::empty();
    let src = net.add_place(Place::new("src", 1)).unwrap();
    let q = net.add_place(Place::new("q", 0)).unwrap();
    let p = net
        .add_place(Place::new_with_tokens_and_capacity("p", 0, 2))
        .unwrap();
    let t = net.add_transition(Transition::new("t"));
    let u = net.add_transition(Transition::new("u"));
    net.add_input_arc(src, t, 1).unwrap();
    net.add_output_arc(src, t, 1).unwrap();
    net.add_output_arc(q, t, 1).unwrap();
    net.add_output_arc(p, u, 1).unwrap();
    net
}

#[test]
fn capacity_places_stay_finite_in_coverability() {
    let net = capped_and_unbounded();
    let graph =
        explore_coverability(&net, net.initial_marking(), ExplorationBudget::unlimited()).unwrap();

    assert_eq!(graph.node_count(), 6);
    assert!(graph.deadlocks.is_empty());
    for (_, node) in graph.nodes() {
        assert!(!node.marking.tokens(PlaceId::new(2)).is_omega());
    }

    let bounds = analyze_boundedness(&graph, &net);
    assert_eq!(bounds[&PlaceId::new(0)], PlaceBound::Bounded(1));
    assert_eq!(bounds[&PlaceId::new(1)], PlaceBound::Unbounded);
    assert_eq!(bounds[&PlaceId::new(2)], PlaceBound::Bounded(2));
    assert!(matches!(
        check_boundness(&graph, &net),
        BoundnessResult::Unbounded { ref unbounded_places, .. } if unbounded_places == &[PlaceId::new(1)]
    ));
}

#[test]
fn capacity_only_net_is_bounded_by_its_capacity() {
    let mut net = Net::empty();
    let p = net
        .add_place(Place::new_with_tokens_and_capacity("p", 0, 2))
        .unwrap();
    let t = net.add_transition(Transition::new("t"));
    net.add_output_arc(p, t, 1).unwrap();

    let reachable =
        explore_reachability(&net, net.initial_marking(), ExplorationBudget::unlimited()).unwrap();
    let coverable =
        explore_coverability(&net, net.initial_marking(), ExplorationBudget::unlimited()).unwrap();
    for graph in [&reachable, &coverable] {
        assert_eq!(analyze_boundedness(graph, &net)[&p], PlaceBound::Bounded(2));
        assert_eq!(check_boundness(graph, &net), BoundnessResult::Bounded { bound: 2 });
    }
    assert_eq!(coverable.node_count(), reachable.node_count());
    assert_eq!(
        BoundnessAnalyzer::new().check(&net).unwrap(),
        BoundnessResult::Bounded { bound: 2 }
    );
}
