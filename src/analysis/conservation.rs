//! 守恒性分析（P-不变量）
//!
//! 用 Farkas 算法在关联矩阵 `C` 上求全部最小支撑的半正 P-不变量 `y ≥ 0,
//! yᵀC = 0`。网是守恒的当且仅当这些不变量的支撑并集覆盖全部库所，此时
//! 它们之和（按最大公约数归一）就是一个严格正的权向量 `w`，使
//! `w · M` 在所有可达标识上保持不变。
use std::collections::BTreeSet;
use std::fmt;

use itertools::Itertools;
use num::bigint::BigInt;
use num::integer::Integer;
use num::traits::{Signed, ToPrimitive, Zero};
use serde::Serialize;

use crate::analysis::reachability::StateGraph;
use crate::net::Net;
use crate::net::ids::{PlaceId, TransitionId};
use crate::net::index_vec::{Idx, IndexVec};
use crate::net::structure::{Marking, Tokens, Weight};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Conservation {
    /// `weights` is strictly positive and `weights · M` is constant.
    Conservative { weights: IndexVec<PlaceId, Weight> },
    NotConservative,
}

impl Conservation {
    pub fn is_conservative(&self) -> bool {
        matches!(self, Conservation::Conservative { .. })
    }

    pub fn weights(&self) -> Option<&IndexVec<PlaceId, Weight>> {
        match self {
            Conservation::Conservative { weights } => Some(weights),
            Conservation::NotConservative => None,
        }
    }

    /// Checks the weighted token sum on every node of `state_graph`.
    pub fn holds_on(&self, state_graph: &StateGraph) -> bool {
        let Some(weights) = self.weights() else {
            return false;
        };
        let expected = weighted_sum(weights, &state_graph.node(state_graph.initial).marking);
        expected.is_some()
            && state_graph
                .nodes()
                .all(|(_, node)| weighted_sum(weights, &node.marking) == expected)
    }
}

impl fmt::Display for Conservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conservation::Conservative { weights } => {
                write!(f, "conservative with weights ({})", weights.iter().join(","))
            }
            Conservation::NotConservative => f.write_str("not conservative"),
        }
    }
}

/// `Σ w[p]·M[p]`; `None` when a weighted place holds ω or the sum overflows.
pub fn weighted_sum(weights: &IndexVec<PlaceId, Weight>, marking: &Marking) -> Option<u128> {
    let mut total: u128 = 0;
    for (place, tokens) in marking.iter() {
        let weight = weights.get(place).copied().unwrap_or(0);
        if weight == 0 {
            continue;
        }
        let Tokens::Finite(count) = tokens else {
            return None;
        };
        total = total.checked_add(u128::from(weight).checked_mul(u128::from(count))?)?;
    }
    Some(total)
}

/// Conservation over every transition of the net.
pub fn analyze_conservation(net: &Net) -> Conservation {
    let transitions: Vec<TransitionId> = net.transitions().indices().collect();
    conservation_for(net, &transitions)
}

/// Conservation restricted to the transitions that label an edge of
/// `state_graph`; transitions that never fire cannot break the invariant.
pub fn analyze_conservation_in(state_graph: &StateGraph, net: &Net) -> Conservation {
    let fired: BTreeSet<TransitionId> = state_graph.edges().map(|(_, t, _)| t).collect();
    conservation_for(net, &fired.into_iter().collect::<Vec<_>>())
}

fn conservation_for(net: &Net, transitions: &[TransitionId]) -> Conservation {
    let invariants = semi_positive_invariants(net, transitions);
    let mut weights = vec![BigInt::zero(); net.places_len()];
    for invariant in &invariants {
        for (sum, coeff) in weights.iter_mut().zip(invariant.iter()) {
            *sum += coeff;
        }
    }
    if weights.iter().any(|w| w.is_zero()) {
        log::info!(
            "{} semi-positive invariants leave some place uncovered",
            invariants.len()
        );
        return Conservation::NotConservative;
    }

    normalize(&mut weights);
    let converted: Option<Vec<Weight>> = weights.iter().map(|w| w.to_u64()).collect();
    match converted {
        Some(weights) => Conservation::Conservative {
            weights: IndexVec::from_vec(weights),
        },
        None => {
            log::warn!("conservation weights do not fit into u64");
            Conservation::NotConservative
        }
    }
}

/// Minimal-support semi-positive P-invariants of the whole net.
pub fn place_invariants(net: &Net) -> Vec<IndexVec<PlaceId, BigInt>> {
    let transitions: Vec<TransitionId> = net.transitions().indices().collect();
    semi_positive_invariants(net, &transitions)
        .into_iter()
        .map(IndexVec::from_vec)
        .collect()
}

/// One tableau row of the Farkas algorithm: remaining effect on the
/// unprocessed transitions, and the place combination that produced it.
#[derive(Clone)]
struct Row {
    effect: Vec<BigInt>,
    coeffs: Vec<BigInt>,
}

impl Row {
    fn support(&self) -> Vec<usize> {
        self.coeffs
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_zero())
            .map(|(idx, _)| idx)
            .collect()
    }

    fn combine(positive: &Row, negative: &Row, column: usize) -> Row {
        let a = positive.effect[column].clone();
        let b = -negative.effect[column].clone();
        let mix = |left: &[BigInt], right: &[BigInt]| -> Vec<BigInt> {
            left.iter()
                .zip(right.iter())
                .map(|(l, r)| &b * l + &a * r)
                .collect()
        };
        let mut row = Row {
            effect: mix(&positive.effect, &negative.effect),
            coeffs: mix(&positive.coeffs, &negative.coeffs),
        };
        let mut all = row.effect.clone();
        all.extend(row.coeffs.iter().cloned());
        let divisor = gcd_of(&all);
        if !divisor.is_zero() && divisor != BigInt::from(1) {
            for value in row.effect.iter_mut().chain(row.coeffs.iter_mut()) {
                *value /= &divisor;
            }
        }
        row
    }
}

fn semi_positive_invariants(net: &Net, transitions: &[TransitionId]) -> Vec<Vec<BigInt>> {
    let places = net.places_len();
    let matrix = net.incidence_matrix();

    let mut rows: Vec<Row> = (0..places)
        .map(|p| {
            let place = PlaceId::from_usize(p);
            let mut coeffs = vec![BigInt::zero(); places];
            coeffs[p] = BigInt::from(1);
            Row {
                effect: transitions
                    .iter()
                    .map(|&t| BigInt::from(*matrix.get(place, t)))
                    .collect(),
                coeffs,
            }
        })
        .collect();

    for column in 0..transitions.len() {
        let mut next = Vec::new();
        let mut positive = Vec::new();
        let mut negative = Vec::new();
        for row in rows {
            if row.effect[column].is_zero() {
                next.push(row);
            } else if row.effect[column].is_positive() {
                positive.push(row);
            } else {
                negative.push(row);
            }
        }
        for pos in &positive {
            for neg in &negative {
                next.push(Row::combine(pos, neg, column));
            }
        }
        rows = keep_minimal_supports(next);
    }

    rows.into_iter().map(|row| row.coeffs).collect()
}

/// Drops rows whose support strictly contains another row's support, and
/// duplicates of an already kept support.
fn keep_minimal_supports(rows: Vec<Row>) -> Vec<Row> {
    let supports: Vec<Vec<usize>> = rows.iter().map(Row::support).collect();
    let is_subset = |small: &[usize], large: &[usize]| small.iter().all(|p| large.contains(p));

    let mut kept = Vec::new();
    let mut kept_supports: Vec<&Vec<usize>> = Vec::new();
    for (idx, row) in rows.iter().enumerate() {
        let support = &supports[idx];
        let dominated = supports.iter().enumerate().any(|(other, candidate)| {
            other != idx && candidate.len() < support.len() && is_subset(candidate, support)
        });
        let duplicate = kept_supports.iter().any(|seen| *seen == support);
        if !dominated && !duplicate {
            kept_supports.push(support);
            kept.push(row.clone());
        }
    }
    kept
}

fn gcd_of(values: &[BigInt]) -> BigInt {
    values
        .iter()
        .filter(|v| !v.is_zero())
        .fold(BigInt::zero(), |acc, v| {
            if acc.is_zero() { v.abs() } else { acc.gcd(v) }
        })
}

fn normalize(values: &mut [BigInt]) {
    let divisor = gcd_of(values);
    if !divisor.is_zero() {
        for value in values.iter_mut() {
            *value /= &divisor;
        }
    }
}
