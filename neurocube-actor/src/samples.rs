//! Training examples from refuted cubes.
//!
//! Only the cube literals that took part in the refutation matter: they
//! form the minimal trail. Every prefix of the minimal trail yields one
//! example whose target is the next literal's variable, valued by its
//! distance to the end of the refutation.

use crate::config::RewardShaping;
use crate::protocol::TrainingExample;
use neurocube_ml::EpisodeOutcome;
use neurocube_sat::{Lit, ProblemInstance, Solver, SolverOptions};
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// Trail literals that appear in the core, in trail order.
pub fn minimal_trail(trail: &[Lit], core: &[Lit]) -> Vec<Lit> {
    let core: FxHashSet<Lit> = core.iter().copied().collect();
    trail.iter().copied().filter(|l| core.contains(l)).collect()
}

/// One example per prefix of the minimal trail, stopping at the first
/// prefix that leaves no free variable.
pub fn generate_examples(
    instance: &Arc<ProblemInstance>,
    options: &SolverOptions,
    outcome: &EpisodeOutcome,
    reward: &RewardShaping,
) -> Vec<TrainingExample> {
    let min_trail = minimal_trail(&outcome.trail, &outcome.core);
    let mut examples = Vec::with_capacity(min_trail.len());

    for i in 0..min_trail.len() {
        let mut solver = Solver::new(Arc::clone(instance), *options);
        let query = solver.to_query(&min_trail[..i]);
        if query.is_empty() {
            break;
        }
        examples.push(TrainingExample {
            variable_count: query.num_vars,
            constraint_count: query.num_clauses,
            constraint_index_map: query.lc_idxs,
            target_variable: min_trail[i].var().index(),
            target_value: reward.compute_v(min_trail.len() - i),
        });
    }
    examples
}
