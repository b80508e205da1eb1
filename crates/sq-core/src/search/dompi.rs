//! Dominating-policy search.
//!
//! Incrementally discovers the unknown constraints that matter (the
//! *relevant* set) and one optimal policy per distinct resolution of them.
//!
//! # Algorithm
//!
//! ```text
//! relevant = {}; frontier = { {} }
//! while frontier non-empty and budget remains:
//!     C = smallest unvisited subset of relevant
//!     if some rule (E, R) has E ⊆ C and R ∩ C = {}: skip C
//!     solve with C enforced
//!     V = unknown constraints the optimum visits (empty if infeasible)
//!     record rule (C, V); relevant ∪= V
//! ```
//!
//! Enforcing more constraints only shrinks the feasible set, so once `E` is
//! solved by a policy touching only `R`, any superset of `E` that leaves `R`
//! free has the same optimum and cannot reveal new constraints.
//!
//! The frontier holds every generated-but-unvisited subset bucketed by
//! cardinality. When a constraint joins `relevant`, each subset generated so
//! far is extended by it, which keeps the generated family equal to the
//! power set of `relevant` without rebuilding it.

use super::SearchError;
use crate::agent::ConstraintSolver;
use crate::logging::event_names;
use crate::oracle::Solution;
use crate::policy::{dedup_by_occupancy, Occupancy};
use serde::{Deserialize, Serialize};
use sq_common::ConstraintId;
use sq_config::SearchConfig;
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Set of constraint indices.
pub type ConstraintSubset = BTreeSet<ConstraintId>;

/// Dominance memo: supersets of `enforced` disjoint from `relaxed` add nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetaRule {
    pub enforced: ConstraintSubset,
    pub relaxed: ConstraintSubset,
}

impl BetaRule {
    /// True if the rule makes `candidate` redundant.
    pub fn covers(&self, candidate: &ConstraintSubset) -> bool {
        self.enforced.is_subset(candidate) && self.relaxed.is_disjoint(candidate)
    }
}

/// One optimal policy and the subset whose enforcement produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DominatingPolicy {
    pub active: ConstraintSubset,
    pub policy: Occupancy,
    pub value: f64,
    /// Unknown constraints the policy visits.
    pub violated: ConstraintSubset,
}

/// Search bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Subsets handed to the oracle.
    pub evaluated: usize,
    /// Subsets skipped by a dominance rule.
    pub pruned: usize,
    pub elapsed_ms: f64,
    /// False when the time budget ran out with subsets still unvisited.
    pub complete: bool,
}

/// Result of a search run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub relevant: ConstraintSubset,
    /// Distinct occupancy measures, in discovery order.
    pub dominating: Vec<DominatingPolicy>,
    pub beta: Vec<BetaRule>,
    pub stats: SearchStats,
}

impl SearchOutcome {
    pub fn is_complete(&self) -> bool {
        self.stats.complete
    }

    pub fn policies(&self) -> impl Iterator<Item = &Occupancy> {
        self.dominating.iter().map(|d| &d.policy)
    }
}

/// Unvisited subsets keyed by cardinality, plus everything ever generated.
#[derive(Debug, Default)]
struct Frontier {
    pending: BTreeMap<usize, BTreeSet<ConstraintSubset>>,
    generated: BTreeSet<ConstraintSubset>,
}

impl Frontier {
    fn seeded() -> Self {
        let mut frontier = Self::default();
        frontier.push(ConstraintSubset::new());
        frontier
    }

    fn push(&mut self, subset: ConstraintSubset) {
        if self.generated.insert(subset.clone()) {
            self.pending.entry(subset.len()).or_default().insert(subset);
        }
    }

    /// Add `constraint` to the universe: every generated subset gains a twin
    /// that includes it.
    fn extend_with(&mut self, constraint: ConstraintId) {
        let twins: Vec<ConstraintSubset> = self
            .generated
            .iter()
            .filter(|s| !s.contains(&constraint))
            .map(|s| {
                let mut twin = s.clone();
                twin.insert(constraint);
                twin
            })
            .collect();
        for twin in twins {
            self.push(twin);
        }
    }

    fn pop_smallest(&mut self) -> Option<ConstraintSubset> {
        let mut bucket = self.pending.first_entry()?;
        let subset = bucket.get_mut().pop_first();
        if bucket.get().is_empty() {
            bucket.remove();
        }
        subset
    }

    fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Dominating-policy search engine.
#[derive(Debug, Clone, Default)]
pub struct DomPiSearch {
    config: SearchConfig,
}

impl DomPiSearch {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Run the incremental search against `solver`.
    ///
    /// With a time budget the loop stops between iterations once the budget
    /// is spent and the outcome is flagged incomplete. Without one it runs
    /// until every subset of the relevant set has been visited or pruned.
    pub fn run<S>(&self, solver: &S) -> Result<SearchOutcome, SearchError>
    where
        S: ConstraintSolver + ?Sized,
    {
        let budget = self.config.budget()?;
        let start = Instant::now();
        info!(
            event = event_names::SEARCH_STARTED,
            unknown = solver.unknown().len(),
            budget_secs = ?budget.map(|b| b.as_secs_f64()),
            prune = self.config.prune,
            "dominating-policy search started"
        );

        let mut relevant = ConstraintSubset::new();
        let mut found: Vec<DominatingPolicy> = Vec::new();
        let mut beta: Vec<BetaRule> = Vec::new();
        let mut frontier = Frontier::seeded();
        let mut stats = SearchStats::default();

        while !frontier.is_empty() {
            if out_of_budget(start, budget) {
                warn!(
                    event = event_names::SEARCH_BUDGET_EXHAUSTED,
                    evaluated = stats.evaluated,
                    relevant = relevant.len(),
                    "search budget exhausted; result may be incomplete"
                );
                break;
            }
            let Some(candidate) = frontier.pop_smallest() else {
                break;
            };

            if self.config.prune && beta.iter().any(|rule| rule.covers(&candidate)) {
                stats.pruned += 1;
                debug!(
                    event = event_names::SEARCH_SUBSET_PRUNED,
                    subset = ?candidate,
                    "subset dominated"
                );
                continue;
            }

            let violated = evaluate(solver, &candidate, &mut found)?;
            stats.evaluated += 1;
            debug!(
                event = event_names::SEARCH_SUBSET_EVALUATED,
                subset = ?candidate,
                violated = ?violated,
                "subset evaluated"
            );

            for &constraint in &violated {
                if relevant.insert(constraint) {
                    frontier.extend_with(constraint);
                }
            }
            beta.push(BetaRule {
                enforced: candidate,
                relaxed: violated,
            });
        }

        stats.complete = frontier.is_empty();
        Ok(finish(relevant, found, beta, stats, start))
    }

    /// Evaluate every subset of the unknown constraints with no pruning.
    ///
    /// Exponential in the number of unknown constraints; the time budget
    /// still applies.
    pub fn brute_force<S>(&self, solver: &S) -> Result<SearchOutcome, SearchError>
    where
        S: ConstraintSolver + ?Sized,
    {
        let unknown: Vec<ConstraintId> = solver.unknown().iter().copied().collect();
        if unknown.len() >= usize::BITS as usize {
            return Err(SearchError::TooManyConstraints(unknown.len()));
        }
        let budget = self.config.budget()?;
        let start = Instant::now();
        info!(
            event = event_names::SEARCH_STARTED,
            unknown = unknown.len(),
            mode = "brute_force",
            "exhaustive subset evaluation started"
        );

        let mut relevant = ConstraintSubset::new();
        let mut found = Vec::new();
        let mut stats = SearchStats::default();
        let total: usize = 1 << unknown.len();
        let mut mask = 0;

        while mask < total {
            if out_of_budget(start, budget) {
                warn!(
                    event = event_names::SEARCH_BUDGET_EXHAUSTED,
                    evaluated = stats.evaluated,
                    "brute-force budget exhausted"
                );
                break;
            }
            let subset: ConstraintSubset = unknown
                .iter()
                .enumerate()
                .filter(|(bit, _)| mask & (1 << bit) != 0)
                .map(|(_, &c)| c)
                .collect();
            relevant.extend(evaluate(solver, &subset, &mut found)?);
            stats.evaluated += 1;
            mask += 1;
        }

        stats.complete = mask == total;
        Ok(finish(relevant, found, Vec::new(), stats, start))
    }
}

fn out_of_budget(start: Instant, budget: Option<Duration>) -> bool {
    budget.is_some_and(|b| start.elapsed() >= b)
}

/// Solve one subset; returns its violated set and records feasible optima.
fn evaluate<S>(
    solver: &S,
    subset: &ConstraintSubset,
    found: &mut Vec<DominatingPolicy>,
) -> Result<ConstraintSubset, SearchError>
where
    S: ConstraintSolver + ?Sized,
{
    match solver.solve_enforcing(subset)? {
        Solution::Feasible { obj, pi } => {
            let violated = solver.violated_constraints(&pi);
            found.push(DominatingPolicy {
                active: subset.clone(),
                policy: pi,
                value: obj,
                violated: violated.clone(),
            });
            Ok(violated)
        }
        Solution::Infeasible => Ok(ConstraintSubset::new()),
    }
}

fn finish(
    relevant: ConstraintSubset,
    found: Vec<DominatingPolicy>,
    beta: Vec<BetaRule>,
    mut stats: SearchStats,
    start: Instant,
) -> SearchOutcome {
    let dominating = dedup_by_occupancy(found, |d| &d.policy);
    stats.elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    info!(
        event = event_names::SEARCH_FINISHED,
        relevant = relevant.len(),
        dominating = dominating.len(),
        evaluated = stats.evaluated,
        pruned = stats.pruned,
        complete = stats.complete,
        elapsed_ms = stats.elapsed_ms,
        "dominating-policy search finished"
    );
    SearchOutcome {
        relevant,
        dominating,
        beta,
        stats,
    }
}
