//! 运行时: 网构造校验、可发生判定与发生规则.
use std::fmt::{self, Write as FmtWrite};
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::net::ids::{PlaceId, TransitionId};
use crate::net::incidence::Incidence;
use crate::net::index_vec::{Idx, IndexVec};
use crate::net::structure::{Arc, ArcDirection, Marking, Place, Tokens, Transition, Weight};

/// Largest accumulated weight between one place and one transition; keeps
/// every incidence entry `Post - Pre` representable as `i64`.
pub const MAX_ARC_WEIGHT: Weight = i64::MAX as Weight;

/// Malformed net description, rejected before any analysis runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("arc references unknown place {0:?}")]
    UnknownPlace(PlaceId),
    #[error("arc references unknown transition {0:?}")]
    UnknownTransition(TransitionId),
    #[error("arc between {place:?} and {transition:?} has zero weight")]
    ZeroWeight {
        place: PlaceId,
        transition: TransitionId,
    },
    #[error("place {place:?} starts with {tokens} tokens above its capacity {capacity}")]
    CapacityBelowTokens {
        place: PlaceId,
        tokens: Weight,
        capacity: Weight,
    },
    #[error("accumulated weight of arcs between {place:?} and {transition:?} exceeds {MAX_ARC_WEIGHT}")]
    WeightOverflow {
        place: PlaceId,
        transition: TransitionId,
    },
}

/// Firing precondition violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FireError {
    #[error("transition {0:?} is out of bounds")]
    OutOfBounds(TransitionId),
    #[error("transition {0:?} is not enabled under the supplied marking")]
    NotEnabled(TransitionId),
    #[error("marking has {found} places but the net has {expected}")]
    MarkingSize { expected: usize, found: usize },
    #[error("token count of place {place:?} overflows when firing {transition:?}")]
    Overflow {
        place: PlaceId,
        transition: TransitionId,
    },
    #[error("transitions cannot fire while simulation mode is off")]
    SimulationInactive,
}

/// 网连通性诊断报告
#[derive(Debug, Clone, Default)]
pub struct DiagnosticReport {
    /// 孤立库所（无任何连接的弧）
    pub isolated_places: Vec<(PlaceId, String)>,
    /// 孤立变迁（无任何连接的弧，恒可发生）
    pub isolated_transitions: Vec<(TransitionId, String)>,
    pub warnings: Vec<String>,
}

impl DiagnosticReport {
    pub fn has_issues(&self) -> bool {
        !self.isolated_places.is_empty()
            || !self.isolated_transitions.is_empty()
            || !self.warnings.is_empty()
    }
}

/// Place/transition net. Topology is fixed once built; analyses only read it.
///
/// Arcs are kept as plain records next to the `pre`/`post` weight matrices
/// derived from them, so the whole value is cheap to clone and share.
#[derive(Clone, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "NetDescription", into = "NetDescription")]
pub struct Net {
    places: IndexVec<PlaceId, Place>,
    transitions: IndexVec<TransitionId, Transition>,
    arcs: Vec<Arc>,
    pre: Incidence<u64>,
    post: Incidence<u64>,
}

impl fmt::Debug for Net {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Net")
            .field("places", &self.places)
            .field("transitions", &self.transitions)
            .field("arcs", &self.arcs)
            .finish()
    }
}

impl Net {
    pub fn empty() -> Self {
        Self {
            places: IndexVec::new(),
            transitions: IndexVec::new(),
            arcs: Vec::new(),
            pre: Incidence::new(0, 0, 0u64),
            post: Incidence::new(0, 0, 0u64),
        }
    }

    /// Builds a net from its parts, validating every arc.
    pub fn build(
        places: impl IntoIterator<Item = Place>,
        transitions: impl IntoIterator<Item = Transition>,
        arcs: impl IntoIterator<Item = Arc>,
    ) -> Result<Self, TopologyError> {
        let mut net = Net::empty();
        for place in places {
            net.add_place(place)?;
        }
        for transition in transitions {
            net.add_transition(transition);
        }
        for arc in arcs {
            net.add_arc(arc)?;
        }
        log::debug!(
            "built net with {} places, {} transitions, {} arcs",
            net.places_len(),
            net.transitions_len(),
            net.arcs.len()
        );
        Ok(net)
    }

    pub fn add_place(&mut self, place: Place) -> Result<PlaceId, TopologyError> {
        if let Some(capacity) = place.capacity {
            if place.tokens > capacity {
                return Err(TopologyError::CapacityBelowTokens {
                    place: PlaceId::from_usize(self.places.len()),
                    tokens: place.tokens,
                    capacity,
                });
            }
        }
        let place_id = self.places.push(place);
        self.pre.push_place_with_default(0);
        self.post.push_place_with_default(0);
        Ok(place_id)
    }

    pub fn add_transition(&mut self, transition: Transition) -> TransitionId {
        let transition_id = self.transitions.push(transition);
        self.pre.push_transition_with_default(0);
        self.post.push_transition_with_default(0);
        transition_id
    }

    /// Records an arc. Parallel arcs of the same direction add up.
    pub fn add_arc(&mut self, arc: Arc) -> Result<(), TopologyError> {
        if !self.places.contains_index(arc.place) {
            return Err(TopologyError::UnknownPlace(arc.place));
        }
        if !self.transitions.contains_index(arc.transition) {
            return Err(TopologyError::UnknownTransition(arc.transition));
        }
        if arc.weight == 0 {
            return Err(TopologyError::ZeroWeight {
                place: arc.place,
                transition: arc.transition,
            });
        }
        let matrix = match arc.direction {
            ArcDirection::PlaceToTransition => &mut self.pre,
            ArcDirection::TransitionToPlace => &mut self.post,
        };
        let entry = matrix.get_mut(arc.place, arc.transition);
        *entry = entry
            .checked_add(arc.weight)
            .filter(|total| *total <= MAX_ARC_WEIGHT)
            .ok_or(TopologyError::WeightOverflow {
                place: arc.place,
                transition: arc.transition,
            })?;
        self.arcs.push(arc);
        Ok(())
    }

    /// 输入弧: place -> transition
    pub fn add_input_arc(
        &mut self,
        place: PlaceId,
        transition: TransitionId,
        weight: Weight,
    ) -> Result<(), TopologyError> {
        self.add_arc(Arc::input(place, transition, weight))
    }

    /// 输出弧: transition -> place
    pub fn add_output_arc(
        &mut self,
        place: PlaceId,
        transition: TransitionId,
        weight: Weight,
    ) -> Result<(), TopologyError> {
        self.add_arc(Arc::output(place, transition, weight))
    }

    pub fn places(&self) -> &IndexVec<PlaceId, Place> {
        &self.places
    }

    pub fn transitions(&self) -> &IndexVec<TransitionId, Transition> {
        &self.transitions
    }

    pub fn get_place(&self, place: PlaceId) -> Option<&Place> {
        self.places.get(place)
    }

    pub fn get_transition(&self, transition: TransitionId) -> Option<&Transition> {
        self.transitions.get(transition)
    }

    pub fn arcs(&self) -> &[Arc] {
        &self.arcs
    }

    /// Places with a capacity, in id order.
    pub fn capped_places(&self) -> Vec<PlaceId> {
        self.places
            .iter_enumerated()
            .filter(|(_, place)| place.capacity.is_some())
            .map(|(id, _)| id)
            .collect()
    }

    pub fn places_len(&self) -> usize {
        self.places.len()
    }

    pub fn transitions_len(&self) -> usize {
        self.transitions.len()
    }

    pub fn input_weight(&self, place: PlaceId, transition: TransitionId) -> Weight {
        *self.pre.get(place, transition)
    }

    pub fn output_weight(&self, place: PlaceId, transition: TransitionId) -> Weight {
        *self.post.get(place, transition)
    }

    /// Samples the current token counts of the places.
    pub fn initial_marking(&self) -> Marking {
        Marking::from_counts(self.places.iter().map(|p| p.tokens))
    }

    pub fn incidence(&self) -> (&Incidence<u64>, &Incidence<u64>) {
        (&self.pre, &self.post)
    }

    /// `C = Post - Pre`, places × transitions.
    pub fn incidence_matrix(&self) -> Incidence<i64> {
        self.post.difference(&self.pre)
    }

    pub fn enabled_transitions(&self, marking: &Marking) -> Vec<TransitionId> {
        self.transitions
            .indices()
            .filter(|&transition| self.is_enabled(transition, marking))
            .collect()
    }

    /// Every input place holds at least the arc weight (ω always does), and
    /// no bounded output place would exceed its capacity.
    pub fn is_enabled(&self, transition: TransitionId, marking: &Marking) -> bool {
        if !self.transitions.contains_index(transition) || marking.len() != self.places_len() {
            return false;
        }
        for (place, row) in self.pre.rows().iter_enumerated() {
            if !marking.tokens(place).covers(row[transition.index()]) {
                return false;
            }
        }
        self.respects_capacity(transition, marking)
    }

    /// Enabled and the session allows interactive firing.
    pub fn is_active(
        &self,
        transition: TransitionId,
        marking: &Marking,
        simulation_mode: bool,
    ) -> bool {
        simulation_mode && self.is_enabled(transition, marking)
    }

    /// Applies the firing rule. ω places stay ω; no other place goes negative.
    pub fn fire(&self, marking: &Marking, transition: TransitionId) -> Result<Marking, FireError> {
        if !self.transitions.contains_index(transition) {
            return Err(FireError::OutOfBounds(transition));
        }
        if marking.len() != self.places_len() {
            return Err(FireError::MarkingSize {
                expected: self.places_len(),
                found: marking.len(),
            });
        }
        if !self.is_enabled(transition, marking) {
            return Err(FireError::NotEnabled(transition));
        }

        let mut next = marking.clone();
        for place in self.places.indices() {
            let consumed = self.input_weight(place, transition);
            let produced = self.output_weight(place, transition);
            if consumed == 0 && produced == 0 {
                continue;
            }
            let tokens = next.tokens_mut(place);
            *tokens = tokens
                .checked_sub(consumed)
                .and_then(|left| left.checked_add(produced))
                .ok_or(FireError::Overflow { place, transition })?;
        }
        Ok(next)
    }

    fn respects_capacity(&self, transition: TransitionId, marking: &Marking) -> bool {
        self.places.iter_enumerated().all(|(place, info)| {
            let Some(capacity) = info.capacity else {
                return true;
            };
            let produced = self.output_weight(place, transition);
            if produced == 0 {
                return true;
            }
            match marking.tokens(place) {
                Tokens::Omega => true,
                Tokens::Finite(count) => {
                    let consumed = self.input_weight(place, transition);
                    count.saturating_sub(consumed).saturating_add(produced) <= capacity
                }
            }
        })
    }

    pub fn to_dot(&self) -> String {
        let mut dot = String::new();
        let _ = writeln!(&mut dot, "digraph PetriNet {{");
        let _ = writeln!(&mut dot, "    rankdir=LR;");
        let _ = writeln!(&mut dot, "    node [fontname=\"Helvetica\"];");

        for (place_id, place) in self.places.iter_enumerated() {
            let capacity = place
                .capacity
                .map(|cap| cap.to_string())
                .unwrap_or_else(|| "ω".to_string());
            let _ = writeln!(
                &mut dot,
                "    place_{} [label=\"{}\\n{}/{}\", shape=circle, style=filled, fillcolor=\"#e3f2fd\"];",
                place_id.index(),
                escape_label(&place.name),
                place.tokens,
                capacity
            );
        }

        for (transition_id, transition) in self.transitions.iter_enumerated() {
            let _ = writeln!(
                &mut dot,
                "    trans_{} [label=\"{}\", shape=box, style=filled, fillcolor=\"#ffe0b2\"];",
                transition_id.index(),
                escape_label(&transition.name)
            );
        }

        for arc in &self.arcs {
            let place_node = format!("place_{}", arc.place.index());
            let transition_node = format!("trans_{}", arc.transition.index());
            let (from, to) = match arc.direction {
                ArcDirection::PlaceToTransition => (place_node, transition_node),
                ArcDirection::TransitionToPlace => (transition_node, place_node),
            };
            if arc.weight == 1 {
                let _ = writeln!(&mut dot, "    {} -> {};", from, to);
            } else {
                let _ = writeln!(&mut dot, "    {} -> {} [label=\"{}\"];", from, to, arc.weight);
            }
        }

        let _ = writeln!(&mut dot, "}}");
        dot
    }

    pub fn write_dot<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_dot())
    }

    /// 诊断信息：检测孤立节点以及永远无法获得 token 的库所
    pub fn diagnose_connectivity(&self) -> DiagnosticReport {
        let mut report = DiagnosticReport::default();

        for (place_id, place) in self.places.iter_enumerated() {
            let feeds = self.pre.row(place_id).iter().any(|w| *w > 0);
            let fed = self.post.row(place_id).iter().any(|w| *w > 0);

            if !feeds && !fed {
                report.isolated_places.push((place_id, place.name.clone()));
            } else if !fed && place.tokens == 0 {
                report.warnings.push(format!(
                    "place '{}' ({}) has no producing transition and starts empty",
                    place.name, place_id
                ));
            }
        }

        for (trans_id, trans) in self.transitions.iter_enumerated() {
            let has_preset = self.pre.column(trans_id).any(|(_, w)| *w > 0);
            let has_postset = self.post.column(trans_id).any(|(_, w)| *w > 0);

            if !has_preset && !has_postset {
                report.isolated_transitions.push((trans_id, trans.name.clone()));
            } else if !has_preset {
                report.warnings.push(format!(
                    "transition '{}' ({}) has an empty preset and is always enabled",
                    trans.name, trans_id
                ));
            }
        }

        report
    }

    pub fn log_diagnostics(&self) {
        let report = self.diagnose_connectivity();
        if !report.has_issues() {
            log::info!("net connectivity check passed");
            return;
        }
        for (id, name) in &report.isolated_places {
            log::warn!("isolated place {} '{}'", id, name);
        }
        for (id, name) in &report.isolated_transitions {
            log::warn!("isolated transition {} '{}'", id, name);
        }
        for warning in &report.warnings {
            log::warn!("{}", warning);
        }
    }
}

/// Serialised form of a net: the three lists handed over by the editor.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NetDescription {
    pub places: Vec<Place>,
    pub transitions: Vec<Transition>,
    #[serde(default)]
    pub arcs: Vec<Arc>,
}

impl TryFrom<NetDescription> for Net {
    type Error = TopologyError;

    fn try_from(value: NetDescription) -> Result<Self, Self::Error> {
        Net::build(value.places, value.transitions, value.arcs)
    }
}

impl From<Net> for NetDescription {
    fn from(net: Net) -> Self {
        Self {
            places: net.places.into_iter().collect(),
            transitions: net.transitions.into_iter().collect(),
            arcs: net.arcs,
        }
    }
}

impl Default for Net {
    fn default() -> Self {
        Self::empty()
    }
}

fn escape_label(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn producer_consumer() -> (Net, PlaceId, PlaceId, TransitionId) {
        let mut net = Net::empty();
        let p0 = net.add_place(Place::new("p0", 2)).unwrap();
        let p1 = net
            .add_place(Place::new_with_tokens_and_capacity("p1", 0, 1))
            .unwrap();
        let t0 = net.add_transition(Transition::new("t0"));
        net.add_input_arc(p0, t0, 1).unwrap();
        net.add_output_arc(p1, t0, 1).unwrap();
        (net, p0, p1, t0)
    }

    #[test]
    fn build_rejects_dangling_and_zero_weight_arcs() {
        let places = vec![Place::new("p", 1)];
        let transitions = vec![Transition::new("t")];

        let dangling = Net::build(
            places.clone(),
            transitions.clone(),
            vec![Arc::input(PlaceId::new(4), TransitionId::new(0), 1)],
        );
        assert_eq!(dangling.unwrap_err(), TopologyError::UnknownPlace(PlaceId::new(4)));

        let unknown_transition = Net::build(
            places.clone(),
            transitions.clone(),
            vec![Arc::output(PlaceId::new(0), TransitionId::new(2), 1)],
        );
        assert_eq!(
            unknown_transition.unwrap_err(),
            TopologyError::UnknownTransition(TransitionId::new(2))
        );

        let zero = Net::build(
            places,
            transitions,
            vec![Arc::input(PlaceId::new(0), TransitionId::new(0), 0)],
        );
        assert!(matches!(zero, Err(TopologyError::ZeroWeight { .. })));
    }

    #[test]
    fn capacity_below_initial_tokens_is_rejected() {
        let result = Net::build(
            vec![Place::new_with_tokens_and_capacity("p", 3, 2)],
            Vec::new(),
            Vec::new(),
        );
        assert!(matches!(
            result,
            Err(TopologyError::CapacityBelowTokens { tokens: 3, capacity: 2, .. })
        ));
    }

    #[test]
    fn parallel_arcs_accumulate() {
        let mut net = Net::empty();
        let p = net.add_place(Place::new("p", 0)).unwrap();
        let t = net.add_transition(Transition::new("t"));
        net.add_output_arc(p, t, 1).unwrap();
        net.add_output_arc(p, t, 2).unwrap();
        assert_eq!(net.output_weight(p, t), 3);
        assert_eq!(*net.incidence_matrix().get(p, t), 3);
        assert_eq!(net.arcs().len(), 2);
    }

    #[test]
    fn weights_beyond_i64_are_rejected() {
        let mut net = Net::empty();
        let p = net.add_place(Place::new("p", 0)).unwrap();
        let t = net.add_transition(Transition::new("t"));
        assert_eq!(
            net.add_output_arc(p, t, 1 << 63),
            Err(TopologyError::WeightOverflow { place: p, transition: t })
        );
        net.add_output_arc(p, t, MAX_ARC_WEIGHT).unwrap();
        assert!(net.add_output_arc(p, t, 1).is_err());
        assert_eq!(*net.incidence_matrix().get(p, t), i64::MAX);
        assert!(net.arcs().len() == 1);
    }

    #[test]
    fn fire_moves_tokens_and_respects_capacity() {
        let (net, p0, p1, t0) = producer_consumer();
        let marking = net.initial_marking();
        assert_eq!(net.enabled_transitions(&marking), vec![t0]);

        let next = net.fire(&marking, t0).unwrap();
        assert_eq!(next.tokens(p0), Tokens::Finite(1));
        assert_eq!(next.tokens(p1), Tokens::Finite(1));

        // p1 is full, so t0 is blocked even though p0 still holds a token.
        assert!(!net.is_enabled(t0, &next));
        assert_eq!(net.fire(&next, t0), Err(FireError::NotEnabled(t0)));
    }

    #[test]
    fn firing_is_deterministic() {
        let (net, _, _, t0) = producer_consumer();
        let marking = net.initial_marking();
        assert_eq!(net.fire(&marking, t0), net.fire(&marking, t0));
    }

    #[test]
    fn omega_places_survive_firing() {
        let mut net = Net::empty();
        let p = net.add_place(Place::new("p", 0)).unwrap();
        let t = net.add_transition(Transition::new("t"));
        net.add_input_arc(p, t, 5).unwrap();
        net.add_output_arc(p, t, 1).unwrap();

        let mut marking = net.initial_marking();
        assert!(!net.is_enabled(t, &marking));
        *marking.tokens_mut(p) = Tokens::Omega;
        let next = net.fire(&marking, t).unwrap();
        assert_eq!(next.tokens(p), Tokens::Omega);
    }

    #[test]
    fn transition_without_arcs_is_always_enabled() {
        let mut net = Net::empty();
        net.add_place(Place::new("p", 0)).unwrap();
        let t = net.add_transition(Transition::new("idle"));
        let marking = net.initial_marking();
        assert!(net.is_enabled(t, &marking));
        assert_eq!(net.fire(&marking, t).unwrap(), marking);
        assert!(net.is_active(t, &marking, true));
        assert!(!net.is_active(t, &marking, false));
    }

    #[test]
    fn fire_checks_marking_shape_and_bounds() {
        let (net, _, _, t0) = producer_consumer();
        let short = Marking::from_counts([1]);
        assert_eq!(
            net.fire(&short, t0),
            Err(FireError::MarkingSize {
                expected: 2,
                found: 1
            })
        );
        let missing = TransitionId::new(9);
        assert_eq!(
            net.fire(&net.initial_marking(), missing),
            Err(FireError::OutOfBounds(missing))
        );
    }

    #[test]
    fn diagnostics_flag_isolated_nodes() {
        let mut net = Net::empty();
        net.add_place(Place::new("lonely", 0)).unwrap();
        net.add_transition(Transition::new("idle"));
        let report = net.diagnose_connectivity();
        assert_eq!(report.isolated_places.len(), 1);
        assert_eq!(report.isolated_transitions.len(), 1);
        assert!(report.has_issues());
        assert!(net.to_dot().contains("lonely"));
    }
}
