//! Property-based tests for the search and query invariants.
//!
//! Problems are random route worlds: a safe route no constraint touches plus
//! up to four risky routes, with up to four constraints over the risky
//! routes' states.

mod support;

use proptest::prelude::*;
use sq_common::{ConstraintId, Query, RewardIndex, StateId};
use sq_config::SearchConfig;
use sq_core::agent::{ConstraintQueryAgent, ConstraintSet, JointUncertaintyAgent};
use sq_core::oracle::Solution;
use sq_core::query::{compute_evoi, EVOI_TOLERANCE};
use sq_core::search::DomPiSearch;
use std::collections::BTreeSet;
use support::{joint_agent, Route, RouteWorld};

#[derive(Debug, Clone)]
struct Case {
    /// (length, payoff under r0, payoff under r1), in tenths.
    routes: Vec<(usize, u8, u8)>,
    /// Indices into the risky routes' states, wrapped around.
    constraints: Vec<BTreeSet<usize>>,
    probs: Vec<f64>,
    psi: (u8, u8),
}

impl Case {
    fn agent(&self, cost: f64) -> JointUncertaintyAgent {
        let mut routes = vec![Route::new(1, &[0.1, 0.1])];
        routes.extend(self.routes.iter().map(|&(len, r0, r1)| {
            Route::new(len, &[f64::from(r0) / 10.0, f64::from(r1) / 10.0])
        }));
        let total = f64::from(self.psi.0) + f64::from(self.psi.1);
        let world = RouteWorld::new(
            &routes,
            vec![f64::from(self.psi.0) / total, f64::from(self.psi.1) / total],
        );

        let risky: Vec<StateId> = world.route_states[1..].iter().flatten().copied().collect();
        let sets = self
            .constraints
            .iter()
            .map(|raw| raw.iter().map(|&i| risky[i % risky.len()]).collect())
            .collect();
        let constraints = ConstraintSet::new(sets)
            .with_free_probs(self.probs[..self.constraints.len()].to_vec());
        joint_agent(world.mdp, constraints, cost)
    }
}

prop_compose! {
    fn case_strategy()(
        routes in prop::collection::vec((1usize..=2, 0u8..=10, 0u8..=10), 1..=4),
        constraints in prop::collection::vec(
            prop::collection::btree_set(0usize..8, 1..=2),
            1..=4,
        ),
        probs in prop::collection::vec(
            prop::sample::select(vec![0.0, 0.25, 0.5, 0.75, 1.0]),
            4,
        ),
        psi in (1u8..=10, 1u8..=10),
    ) -> Case {
        Case { routes, constraints, probs, psi }
    }
}

/// Constraints whose bit is set in `mask`.
fn subset(mask: u8, count: usize) -> BTreeSet<ConstraintId> {
    (0..count)
        .filter(|bit| mask & (1 << bit) != 0)
        .map(ConstraintId)
        .collect()
}

/// Every subset of `of`.
fn power_set(of: &BTreeSet<ConstraintId>) -> Vec<BTreeSet<ConstraintId>> {
    let items: Vec<ConstraintId> = of.iter().copied().collect();
    (0..1usize << items.len())
        .map(|mask| {
            items
                .iter()
                .enumerate()
                .filter(|(bit, _)| mask & (1 << bit) != 0)
                .map(|(_, &c)| c)
                .collect()
        })
        .collect()
}

/// Violated set of the optimum with `active` enforced; empty when infeasible.
fn violated_of(
    agent: &ConstraintQueryAgent,
    active: &BTreeSet<ConstraintId>,
) -> BTreeSet<ConstraintId> {
    match agent.find_constrained_opt_pi(active, true).expect("solve succeeds") {
        Solution::Feasible { pi, .. } => agent.find_violated_constraints(&pi),
        Solution::Infeasible => BTreeSet::new(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Enforcing more constraints never helps and never restores feasibility.
    #[test]
    fn enforcing_more_is_monotone(
        case in case_strategy(),
        b_mask in 0u8..16,
        a_mask in 0u8..16,
    ) {
        let joint = case.agent(0.0);
        let agent = joint.constraints();
        let count = case.constraints.len();
        let larger = subset(b_mask, count);
        let smaller = subset(b_mask & a_mask, count);

        let big = agent.find_constrained_opt_pi(&larger, true).unwrap();
        let small = agent.find_constrained_opt_pi(&smaller, true).unwrap();
        if let Some(big_obj) = big.obj() {
            let small_obj = small.obj();
            prop_assert!(small_obj.is_some(), "{:?} feasible but {:?} not", larger, smaller);
            prop_assert!(big_obj <= small_obj.unwrap_or(f64::NEG_INFINITY) + 1e-12);
        }
    }

    /// Skipping dominated subsets changes nothing a direct evaluation would see.
    #[test]
    fn pruning_is_sound(case in case_strategy()) {
        let joint = case.agent(0.0);
        let agent = joint.constraints();
        let pruned = DomPiSearch::new(SearchConfig::default()).run(agent).unwrap();
        let unpruned = DomPiSearch::new(SearchConfig::default().without_pruning())
            .run(agent)
            .unwrap();
        prop_assert_eq!(&pruned.relevant, &unpruned.relevant);
        prop_assert_eq!(unpruned.stats.pruned, 0);

        for rule in &pruned.beta {
            for candidate in power_set(agent.unknown()) {
                if rule.covers(&candidate) {
                    prop_assert_eq!(
                        violated_of(agent, &candidate),
                        rule.relaxed.clone(),
                        "rule {:?} covers {:?}",
                        rule,
                        candidate
                    );
                }
            }
        }
    }

    /// Without a budget the relevant set is closed under its own subsets.
    #[test]
    fn relevant_set_is_a_fixed_point(case in case_strategy()) {
        let joint = case.agent(0.0);
        let agent = joint.constraints();
        let search = DomPiSearch::new(SearchConfig::default());
        let outcome = search.run(agent).unwrap();
        prop_assert!(outcome.is_complete());

        for active in power_set(&outcome.relevant) {
            let violated = violated_of(agent, &active);
            prop_assert!(
                violated.is_subset(&outcome.relevant),
                "{:?} violates {:?} outside {:?}",
                active,
                violated,
                outcome.relevant
            );
        }
        let exhaustive = search.brute_force(agent).unwrap();
        prop_assert_eq!(&exhaustive.relevant, &outcome.relevant);
    }

    /// No two dominating policies share an occupancy measure.
    #[test]
    fn dominating_policies_are_distinct(case in case_strategy()) {
        let joint = case.agent(0.0);
        let search = DomPiSearch::new(SearchConfig::default());
        for outcome in [
            search.run(joint.constraints()).unwrap(),
            search.brute_force(joint.constraints()).unwrap(),
        ] {
            let policies: Vec<_> = outcome.policies().collect();
            for (i, a) in policies.iter().enumerate() {
                for b in &policies[i + 1..] {
                    prop_assert_ne!(a, b);
                }
            }
        }
    }

    /// EVOI is non-negative, and zero for queries with a certain answer.
    #[test]
    fn evoi_is_non_negative(case in case_strategy()) {
        let joint = case.agent(0.0);
        for feat in joint.constraints().unknown().clone() {
            let evoi = compute_evoi(&joint, &Query::Constraint(feat)).unwrap();
            prop_assert!(evoi >= -EVOI_TOLERANCE, "{} has evoi {}", feat, evoi);
            if joint.constraints().free_prob(feat).unwrap() == 0.0 {
                prop_assert_eq!(evoi, 0.0);
            }
        }

        let single = [RewardIndex(0)].into_iter().collect();
        let evoi = compute_evoi(&joint, &Query::Reward(single)).unwrap();
        prop_assert!(evoi >= -EVOI_TOLERANCE, "reward query has evoi {}", evoi);

        let everything = [RewardIndex(0), RewardIndex(1)].into_iter().collect();
        let evoi = compute_evoi(&joint, &Query::Reward(everything)).unwrap();
        prop_assert!(evoi.abs() <= 1e-9, "whole-support query has evoi {}", evoi);
    }

    /// Conditioning keeps ψ a distribution with no mass outside the kept set.
    #[test]
    fn reward_update_normalizes(
        weights in prop::collection::vec(0u8..=10, 2..=5),
        keep in prop::collection::btree_set(0usize..5, 0..=5),
    ) {
        let total: f64 = weights.iter().map(|&w| f64::from(w)).sum();
        prop_assume!(total > 0.0);
        let psi: Vec<f64> = weights.iter().map(|&w| f64::from(w) / total).collect();
        let consistent: BTreeSet<RewardIndex> = keep
            .iter()
            .filter(|&&i| i < psi.len())
            .map(|&i| RewardIndex(i))
            .collect();
        let kept_mass: f64 = consistent.iter().map(|r| psi[r.index()]).sum();

        match JointUncertaintyAgent::update_reward_distribution(&consistent, &psi) {
            Ok(updated) => {
                prop_assert!(kept_mass > 0.0);
                let sum: f64 = updated.iter().sum();
                prop_assert!((sum - 1.0).abs() < 1e-9, "sum {}", sum);
                for (i, p) in updated.iter().enumerate() {
                    if !consistent.contains(&RewardIndex(i)) {
                        prop_assert_eq!(*p, 0.0);
                    }
                }
            }
            Err(err) => {
                prop_assert!(kept_mass == 0.0, "unexpected {:?}", err);
            }
        }
    }
}
