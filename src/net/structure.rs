//! P/T 网静态结构元素：库所、迁移、弧与标识。
use std::cmp::Ordering;
use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::net::ids::{PlaceId, TransitionId};
use crate::net::index_vec::IndexVec;

pub type Weight = u64;

/// Token count of one place inside a marking.
///
/// `Omega` only shows up in coverability graphs and stands for a count that
/// can be pumped arbitrarily high. The derived order puts every finite count
/// below `Omega`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tokens {
    Finite(Weight),
    Omega,
}

impl Tokens {
    pub const ZERO: Tokens = Tokens::Finite(0);

    pub fn is_omega(self) -> bool {
        matches!(self, Tokens::Omega)
    }

    pub fn finite(self) -> Option<Weight> {
        match self {
            Tokens::Finite(count) => Some(count),
            Tokens::Omega => None,
        }
    }

    /// `true` when at least `weight` tokens are available.
    pub fn covers(self, weight: Weight) -> bool {
        match self {
            Tokens::Finite(count) => count >= weight,
            Tokens::Omega => true,
        }
    }

    /// Removes `weight` tokens. `None` if the count would go negative.
    pub fn checked_sub(self, weight: Weight) -> Option<Tokens> {
        match self {
            Tokens::Finite(count) => count.checked_sub(weight).map(Tokens::Finite),
            Tokens::Omega => Some(Tokens::Omega),
        }
    }

    /// Adds `weight` tokens. `None` on `u64` overflow.
    pub fn checked_add(self, weight: Weight) -> Option<Tokens> {
        match self {
            Tokens::Finite(count) => count.checked_add(weight).map(Tokens::Finite),
            Tokens::Omega => Some(Tokens::Omega),
        }
    }
}

impl Default for Tokens {
    fn default() -> Self {
        Tokens::ZERO
    }
}

impl From<Weight> for Tokens {
    fn from(value: Weight) -> Self {
        Tokens::Finite(value)
    }
}

impl fmt::Debug for Tokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Tokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tokens::Finite(count) => write!(f, "{count}"),
            Tokens::Omega => f.write_str("ω"),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Debug)]
pub struct Place {
    pub name: String,
    pub tokens: Weight,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<Weight>,
}

impl Place {
    pub fn new(name: impl Into<String>, tokens: Weight) -> Self {
        Self {
            name: name.into(),
            tokens,
            capacity: None,
        }
    }

    pub fn new_with_tokens_and_capacity(
        name: impl Into<String>,
        tokens: Weight,
        capacity: Weight,
    ) -> Self {
        Self {
            name: name.into(),
            tokens,
            capacity: Some(capacity),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Transition {
    pub name: String,
}

impl Transition {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Transition").field(&self.name).finish()
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Arc {
    pub place: PlaceId,
    pub transition: TransitionId,
    pub weight: Weight,
    pub direction: ArcDirection,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ArcDirection {
    PlaceToTransition,
    TransitionToPlace,
}

impl Arc {
    pub fn new(
        place: PlaceId,
        transition: TransitionId,
        weight: Weight,
        direction: ArcDirection,
    ) -> Self {
        Self {
            place,
            transition,
            weight,
            direction,
        }
    }

    /// 输入弧: place -> transition
    pub fn input(place: PlaceId, transition: TransitionId, weight: Weight) -> Self {
        Self::new(place, transition, weight, ArcDirection::PlaceToTransition)
    }

    /// 输出弧: transition -> place
    pub fn output(place: PlaceId, transition: TransitionId, weight: Weight) -> Self {
        Self::new(place, transition, weight, ArcDirection::TransitionToPlace)
    }
}

impl fmt::Debug for Arc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arc")
            .field("place", &self.place)
            .field("transition", &self.transition)
            .field("weight", &self.weight)
            .field("direction", &self.direction)
            .finish()
    }
}

/// 标识：每个库所一个分量。一旦插入状态图便不再修改。
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Marking(pub IndexVec<PlaceId, Tokens>);

impl Marking {
    pub fn new(initial: IndexVec<PlaceId, Tokens>) -> Self {
        Self(initial)
    }

    pub fn from_counts(counts: impl IntoIterator<Item = Weight>) -> Self {
        Self(counts.into_iter().map(Tokens::Finite).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlaceId, Tokens)> {
        self.0.iter_enumerated().map(|(place, tokens)| (place, *tokens))
    }

    pub fn tokens(&self, place: PlaceId) -> Tokens {
        self.0[place]
    }

    pub fn tokens_mut(&mut self, place: PlaceId) -> &mut Tokens {
        &mut self.0[place]
    }

    pub fn has_omega(&self) -> bool {
        self.0.iter().any(|tokens| tokens.is_omega())
    }

    pub fn omega_places(&self) -> Vec<PlaceId> {
        self.iter()
            .filter(|(_, tokens)| tokens.is_omega())
            .map(|(place, _)| place)
            .collect()
    }

    /// `self` covers `other` and is strictly larger in at least one place.
    pub fn strictly_covers(&self, other: &Marking) -> bool {
        matches!(self.partial_cmp(other), Some(Ordering::Greater))
    }

    /// Karp-Miller acceleration: every place that grew relative to a
    /// strictly smaller ancestor becomes ω. Returns whether anything changed.
    ///
    /// Places in `capped` have a capacity, which breaks monotonicity of
    /// firing: the ancestor only counts when it agrees with `self` on all of
    /// them, and they never become ω.
    pub fn accelerate_against(&mut self, ancestor: &Marking, capped: &[PlaceId]) -> bool {
        if !self.strictly_covers(ancestor) {
            return false;
        }
        if capped.iter().any(|&place| self.0[place] != ancestor.0[place]) {
            return false;
        }
        let mut changed = false;
        for (place, tokens) in self.0.iter_enumerated_mut() {
            if *tokens > ancestor.0[place] && !tokens.is_omega() {
                *tokens = Tokens::Omega;
                changed = true;
            }
        }
        changed
    }

    pub fn into_inner(self) -> IndexVec<PlaceId, Tokens> {
        self.0
    }
}

impl fmt::Debug for Marking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (place, tokens) in self.iter() {
            map.entry(&place, &tokens);
        }
        map.finish()
    }
}

impl fmt::Display for Marking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.iter().join(","))
    }
}

/// Component-wise covering order; incomparable markings give `None`.
impl PartialOrd for Marking {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.len() != other.len() {
            return None;
        }
        let mut less = false;
        let mut greater = false;
        for (left, right) in self.0.iter().zip(other.0.iter()) {
            match left.cmp(right) {
                Ordering::Less => less = true,
                Ordering::Greater => greater = true,
                Ordering::Equal => {}
            }
        }
        match (less, greater) {
            (true, true) => None,
            (true, false) => Some(Ordering::Less),
            (false, true) => Some(Ordering::Greater),
            (false, false) => Some(Ordering::Equal),
        }
    }
}
