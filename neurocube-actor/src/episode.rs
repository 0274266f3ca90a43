//! Episode runner.

use neurocube_ml::{Brancher, Cuber, EpisodeOutcome, Inference, ModelResult, search};
use neurocube_sat::{ProblemInstance, Solver, SolverOptions};
use std::sync::Arc;

/// Play one search on a fresh solver for `instance`.
///
/// `Ok(None)` means the episode produced nothing usable; only inference
/// failures are errors.
pub fn run_episode<I: Inference + ?Sized>(
    instance: &Arc<ProblemInstance>,
    options: &SolverOptions,
    cuber: &Cuber,
    brancher: &Brancher,
    inference: &mut I,
) -> ModelResult<Option<EpisodeOutcome>> {
    let mut solver = Solver::new(Arc::clone(instance), *options);
    search::play(&mut solver, cuber, brancher, inference)
}
