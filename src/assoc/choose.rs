//! Plan selection loop over an iterator and an external cost model.

use tracing::debug;

use crate::assoc::iter::QueryPlanIterator;
use crate::assoc::plan::{Orientation, QueryPlan};
use crate::error::Result;

/// External cost model: scores one orientation of a plan.
///
/// Lower is cheaper. Implementations are supplied by the caller; this crate
/// only enumerates candidates.
pub trait PlanScorer: Send + Sync {
    /// Scores the plan in its current orientation.
    fn score(&self, plan: &QueryPlan) -> f64;
}

/// Outcome of a plan search.
#[derive(Clone, Debug)]
pub struct ChosenPlan {
    /// The winning orientation, already re-installed on the plan.
    pub orientation: Orientation,
    /// The winner's cost.
    pub cost: f64,
    /// How many orientations were scored (including the initial one).
    pub explored: usize,
}

/// Enumerates orientations of `plan` with `iterator`, scores each with
/// `scorer`, and leaves the cheapest installed on the plan.
///
/// The initial orientation is always scored; ties keep the earliest
/// candidate. `max_candidates` caps how many orientations are scored;
/// the search space is exponential in edge count, and nothing inside a
/// single step is interruptible, so callers bound the loop itself.
pub fn choose_plan(
    plan: &mut QueryPlan,
    iterator: &mut dyn QueryPlanIterator,
    scorer: &dyn PlanScorer,
    max_candidates: Option<usize>,
) -> Result<ChosenPlan> {
    iterator.reset(plan);
    let mut best = plan.orientation();
    let mut best_cost = scorer.score(plan);
    let mut explored = 1usize;
    debug!(orientation = %best, cost = best_cost, "initial candidate");

    while max_candidates.map_or(true, |cap| explored < cap) {
        if !iterator.next(plan)? {
            break;
        }
        explored += 1;
        let cost = scorer.score(plan);
        if cost < best_cost {
            debug!(orientation = %plan.orientation(), cost, "better candidate");
            best = plan.orientation();
            best_cost = cost;
        }
    }

    plan.restore(&best)?;
    debug!(orientation = %best, cost = best_cost, explored, "plan chosen");
    Ok(ChosenPlan {
        orientation: best,
        cost: best_cost,
        explored,
    })
}
