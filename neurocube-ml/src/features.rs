//! Per-variable features of a [`Query`].

use neurocube_sat::{Query, Var};
use rustc_hash::FxHashMap;

/// Number of features per free variable.
pub const VAR_FEATURES: usize = 7;

/// Feature vectors, one per entry of `query.free_vars` and in the same order.
///
/// 0. positive occurrences / residual clauses
/// 1. negative occurrences / residual clauses
/// 2. positive occurrences in binary clauses / residual clauses
/// 3. negative occurrences in binary clauses / residual clauses
/// 4. mean length of the clauses containing the variable / longest residual clause
/// 5. free variables / variables
/// 6. residual clauses / clauses
pub fn extract(query: &Query) -> Vec<[f64; VAR_FEATURES]> {
    if query.is_empty() {
        return Vec::new();
    }
    let n = query.num_vars;

    let mut clause_len: FxHashMap<u32, usize> = FxHashMap::default();
    for &(_, clause) in &query.lc_idxs {
        *clause_len.entry(clause).or_default() += 1;
    }
    let residual = clause_len.len().max(1) as f64;
    let longest = clause_len.values().copied().max().unwrap_or(1).max(1) as f64;

    let position: FxHashMap<Var, usize> = query
        .free_vars
        .iter()
        .enumerate()
        .map(|(i, &v)| (v, i))
        .collect();

    #[derive(Default, Clone, Copy)]
    struct Counts {
        pos: f64,
        neg: f64,
        pos_bin: f64,
        neg_bin: f64,
        len_sum: f64,
    }
    let mut counts = vec![Counts::default(); query.free_vars.len()];

    for &(slot, clause) in &query.lc_idxs {
        let (var, positive) = if slot < n {
            (Var::new(slot), true)
        } else {
            (Var::new(slot - n), false)
        };
        let Some(&i) = position.get(&var) else {
            continue;
        };
        let len = clause_len[&clause];
        let c = &mut counts[i];
        if positive {
            c.pos += 1.0;
            if len == 2 {
                c.pos_bin += 1.0;
            }
        } else {
            c.neg += 1.0;
            if len == 2 {
                c.neg_bin += 1.0;
            }
        }
        c.len_sum += len as f64;
    }

    let free_density = query.free_vars.len() as f64 / n.max(1) as f64;
    let clause_density = clause_len.len() as f64 / query.num_clauses.max(1) as f64;

    counts
        .iter()
        .map(|c| {
            let occurrences = c.pos + c.neg;
            let mean_len = if occurrences > 0.0 {
                c.len_sum / occurrences
            } else {
                0.0
            };
            [
                c.pos / residual,
                c.neg / residual,
                c.pos_bin / residual,
                c.neg_bin / residual,
                mean_len / longest,
                free_density,
                clause_density,
            ]
        })
        .collect()
}
