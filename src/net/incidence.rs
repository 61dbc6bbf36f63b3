//! 库所 × 迁移 的稠密矩阵封装（前置、后置及关联矩阵）。
use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::net::ids::{PlaceId, TransitionId};
use crate::net::index_vec::{Idx, IndexVec};

type SmallRow<T> = SmallVec<[T; 4]>;

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Incidence<T> {
    rows: IndexVec<PlaceId, SmallRow<T>>,
    cols: usize,
}

impl<T> Incidence<T>
where
    T: Clone,
{
    pub fn new(places: usize, transitions: usize, default: T) -> Self {
        let mut rows = IndexVec::new();
        for _ in 0..places {
            rows.push(SmallRow::from_elem(default.clone(), transitions));
        }
        Self {
            rows,
            cols: transitions,
        }
    }

    pub fn places(&self) -> usize {
        self.rows.len()
    }

    pub fn transitions(&self) -> usize {
        self.cols
    }

    pub fn push_place_with_default(&mut self, default: T) -> PlaceId {
        let mut row = SmallRow::new();
        row.resize(self.cols, default);
        self.rows.push(row)
    }

    pub fn push_transition_with_default(&mut self, default: T) -> TransitionId {
        let next = self.cols;
        for row in self.rows.iter_mut() {
            row.push(default.clone());
        }
        self.cols += 1;
        TransitionId::from_usize(next)
    }

    pub fn set(&mut self, place: PlaceId, transition: TransitionId, value: T) {
        self.rows[place][transition.index()] = value;
    }

    pub fn get(&self, place: PlaceId, transition: TransitionId) -> &T {
        &self.rows[place][transition.index()]
    }

    pub fn get_mut(&mut self, place: PlaceId, transition: TransitionId) -> &mut T {
        &mut self.rows[place][transition.index()]
    }

    pub fn row(&self, place: PlaceId) -> &[T] {
        &self.rows[place]
    }

    /// The entries of one transition, in place order.
    pub fn column(&self, transition: TransitionId) -> impl Iterator<Item = (PlaceId, &T)> {
        self.rows
            .iter_enumerated()
            .map(move |(place, row)| (place, &row[transition.index()]))
    }

    pub fn rows(&self) -> &IndexVec<PlaceId, SmallRow<T>> {
        &self.rows
    }
}

impl<T> fmt::Debug for Incidence<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Incidence")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish()
    }
}

/// Tabular rendering: one header row of transitions, one row per place.
impl<T> fmt::Display for Incidence<T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cell = 5;
        write!(f, "{:>cell$}", "")?;
        for col in 0..self.cols {
            write!(f, "{:>cell$}", TransitionId::from_usize(col).to_string())?;
        }
        writeln!(f)?;
        for (place, row) in self.rows.iter_enumerated() {
            write!(f, "{:>cell$}", place.to_string())?;
            for value in row.iter() {
                write!(f, "{:>cell$}", value.to_string())?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl Incidence<u64> {
    /// `self - other` entry by entry, e.g. `C = Post - Pre`. Entries above
    /// `i64::MAX` saturate; `Net` never stores such weights.
    pub fn difference(&self, other: &Self) -> Incidence<i64> {
        assert_eq!(self.places(), other.places());
        assert_eq!(self.transitions(), other.transitions());
        let mut rows = IndexVec::new();
        for (left, right) in self.rows.iter().zip(other.rows.iter()) {
            rows.push(
                left.iter()
                    .zip(right.iter())
                    .map(|(l, r)| {
                        let l = i64::try_from(*l).unwrap_or(i64::MAX);
                        let r = i64::try_from(*r).unwrap_or(i64::MAX);
                        l.saturating_sub(r)
                    })
                    .collect::<SmallRow<_>>(),
            );
        }
        Incidence {
            rows,
            cols: self.cols,
        }
    }
}
