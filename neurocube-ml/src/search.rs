//! Cube-and-conquer episode search.
//!
//! Starting from the root, the cuber decides whether to split and the
//! brancher picks the split literal; the chosen literals form the cube path.
//! The leaf is handed to [`Solver::solve_limited`] under the cube as
//! assumptions.

use crate::error::ModelResult;
use crate::inference::Inference;
use crate::policy::{Brancher, Cuber, SearchNode};
use neurocube_sat::{Lit, SolveResult, Solver};
use tracing::{debug, trace};

/// Result of a search that refuted its cube.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeOutcome {
    /// Cube literals in decision order
    pub trail: Vec<Lit>,
    /// Failed-assumption core, a subset of `trail`
    pub core: Vec<Lit>,
    /// Estimated tree size: every inner node at depth `d` stands for `2^d`
    /// nodes and the leaf for `2^depth * (1 + leaf conflicts)`
    pub estimate: f64,
}

/// Play one cube-and-conquer search.
///
/// Returns `None` when the leaf is satisfiable or the conflict budget runs
/// out, since neither yields a refutation to learn from.
pub fn play<I: Inference + ?Sized>(
    solver: &mut Solver,
    cuber: &Cuber,
    brancher: &Brancher,
    inference: &mut I,
) -> ModelResult<Option<EpisodeOutcome>> {
    let mut trail: Vec<Lit> = Vec::new();
    let mut estimate = 0.0;

    loop {
        let query = solver.to_query(&trail);
        let weight = 2f64.powi(trail.len() as i32);
        let mut node = SearchNode::new(&query, trail.len());

        if cuber.should_split(&mut node, inference)?
            && let Some(lit) = brancher.choose(&mut node, inference)?
        {
            trace!(depth = trail.len(), %lit, "split");
            estimate += weight;
            trail.push(lit);
            continue;
        }
        break;
    }

    let before = solver.stats().conflicts;
    let result = solver.solve_limited(&trail);
    let leaf_conflicts = solver.stats().conflicts - before;
    estimate += 2f64.powi(trail.len() as i32) * (1.0 + leaf_conflicts as f64);

    match result {
        SolveResult::Unsat { core } => {
            debug!(
                cuber = cuber.name(),
                brancher = brancher.name(),
                depth = trail.len(),
                core = core.len(),
                leaf_conflicts,
                "cube refuted"
            );
            Ok(Some(EpisodeOutcome {
                trail,
                core,
                estimate,
            }))
        }
        other @ (SolveResult::Sat | SolveResult::Unknown) => {
            debug!(depth = trail.len(), result = ?other, "no refutation");
            Ok(None)
        }
    }
}
