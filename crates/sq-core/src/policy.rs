//! Occupancy measures.
//!
//! A policy is represented by its expected discounted visitation of each
//! `(state, action)` pair. Only strictly positive entries are stored, so two
//! policies are equal exactly when their stored maps are equal.

use crate::mdp::MdpView;
use serde::{Deserialize, Serialize};
use sq_common::{ActionId, StateId};
use sq_math::stable_sum;
use std::collections::{BTreeMap, BTreeSet};

/// Sparse occupancy measure over `(state, action)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<OccupancyEntry>", from = "Vec<OccupancyEntry>")]
pub struct Occupancy {
    visits: BTreeMap<(StateId, ActionId), f64>,
}

/// Serialized form of one occupancy entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OccupancyEntry {
    pub state: StateId,
    pub action: ActionId,
    pub visits: f64,
}

impl Occupancy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add visitation mass; non-positive amounts are ignored.
    pub fn add(&mut self, state: StateId, action: ActionId, amount: f64) {
        if amount > 0.0 {
            *self.visits.entry((state, action)).or_insert(0.0) += amount;
        }
    }

    pub fn get(&self, state: StateId, action: ActionId) -> f64 {
        self.visits.get(&(state, action)).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = ((StateId, ActionId), f64)> + '_ {
        self.visits.iter().map(|(&k, &v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.visits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visits.is_empty()
    }

    /// States visited with positive probability under any action.
    pub fn visited_states(&self) -> BTreeSet<StateId> {
        self.visits.keys().map(|&(s, _)| s).collect()
    }

    /// True if some state in `states` has positive visitation.
    pub fn touches(&self, states: &BTreeSet<StateId>) -> bool {
        self.visits.keys().any(|(s, _)| states.contains(s))
    }

    /// Total visitation over a set of pairs.
    pub fn mass_on(&self, pairs: &BTreeSet<(StateId, ActionId)>) -> f64 {
        stable_sum(
            self.visits
                .iter()
                .filter(|(k, _)| pairs.contains(*k))
                .map(|(_, &v)| v),
        )
    }

    /// Dot product with the view's reward vector.
    pub fn value(&self, mdp: &dyn MdpView) -> f64 {
        stable_sum(self.visits.iter().map(|(&(s, a), &v)| v * mdp.reward(s, a)))
    }
}

impl From<Occupancy> for Vec<OccupancyEntry> {
    fn from(occupancy: Occupancy) -> Self {
        occupancy
            .visits
            .into_iter()
            .map(|((state, action), visits)| OccupancyEntry {
                state,
                action,
                visits,
            })
            .collect()
    }
}

impl From<Vec<OccupancyEntry>> for Occupancy {
    fn from(entries: Vec<OccupancyEntry>) -> Self {
        let mut occupancy = Occupancy::new();
        for e in entries {
            occupancy.add(e.state, e.action, e.visits);
        }
        occupancy
    }
}

impl FromIterator<((StateId, ActionId), f64)> for Occupancy {
    fn from_iter<I: IntoIterator<Item = ((StateId, ActionId), f64)>>(iter: I) -> Self {
        let mut occupancy = Occupancy::new();
        for ((s, a), v) in iter {
            occupancy.add(s, a, v);
        }
        occupancy
    }
}

/// Drop repeated occupancy measures, keeping first occurrences in order.
pub fn dedup_by_occupancy<T, F>(items: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> &Occupancy,
{
    let mut kept: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !kept.iter().any(|k| key(k) == key(&item)) {
            kept.push(item);
        }
    }
    kept
}
