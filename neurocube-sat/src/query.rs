//! Structured queries handed to the inference layer.

use crate::dimacs::ProblemInstance;
use crate::literal::{LBool, Var};
use serde::{Deserialize, Serialize};

/// The residual formula under a partial assignment.
///
/// `lc_idxs` is the sparse literal/clause adjacency of the clauses that are
/// not yet satisfied, restricted to unassigned literals. Literal slots follow
/// [`crate::Lit::slot`]; clause indices are positions in the original
/// instance, so they stay below `num_clauses`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Variable count of the instance
    pub num_vars: u32,
    /// Clause count of the instance
    pub num_clauses: usize,
    /// Unassigned variables occurring in an unsatisfied clause, ascending
    pub free_vars: Vec<Var>,
    /// `(literal slot, clause index)` pairs
    pub lc_idxs: Vec<(u32, u32)>,
}

impl Query {
    /// A query with nothing left to decide.
    pub fn empty(num_vars: u32, num_clauses: usize) -> Self {
        Self {
            num_vars,
            num_clauses,
            free_vars: Vec::new(),
            lc_idxs: Vec::new(),
        }
    }

    /// Build the query for `instance` under the assignment `assigns`
    /// (indexed by variable).
    pub fn from_assignment(instance: &ProblemInstance, assigns: &[LBool]) -> Self {
        let num_vars = instance.num_vars();
        let mut is_free = vec![false; num_vars as usize];
        let mut lc_idxs = Vec::new();

        for (ci, clause) in instance.clauses().iter().enumerate() {
            let satisfied = clause
                .iter()
                .any(|&l| assigns[l.var().index() as usize].under(l) == LBool::True);
            if satisfied {
                continue;
            }
            for &lit in clause {
                let v = lit.var().index() as usize;
                if assigns[v] == LBool::Undef {
                    is_free[v] = true;
                    lc_idxs.push((lit.slot(num_vars), ci as u32));
                }
            }
        }

        let free_vars = is_free
            .iter()
            .enumerate()
            .filter(|&(_, &free)| free)
            .map(|(v, _)| Var::new(v as u32))
            .collect();

        Self {
            num_vars,
            num_clauses: instance.num_clauses(),
            free_vars,
            lc_idxs,
        }
    }

    /// True when no variable is left to decide.
    pub fn is_empty(&self) -> bool {
        self.free_vars.is_empty()
    }

    /// Number of distinct clauses in the residual formula.
    pub fn num_residual_clauses(&self) -> usize {
        let mut clauses: Vec<u32> = self.lc_idxs.iter().map(|&(_, c)| c).collect();
        clauses.sort_unstable();
        clauses.dedup();
        clauses.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_full_formula() {
        let inst = ProblemInstance::from_dimacs_clauses(3, &[vec![1, -2], vec![2, 3]]).unwrap();
        let assigns = vec![LBool::Undef; 3];
        let query = Query::from_assignment(&inst, &assigns);

        assert_eq!(query.free_vars, vec![Var::new(0), Var::new(1), Var::new(2)]);
        // -x2 lives in slot 1 + 3
        assert_eq!(query.lc_idxs, vec![(0, 0), (4, 0), (1, 1), (2, 1)]);
        assert_eq!(query.num_residual_clauses(), 2);
    }

    #[test]
    fn test_query_drops_satisfied_and_assigned() {
        let inst = ProblemInstance::from_dimacs_clauses(3, &[vec![1, -2], vec![2, 3]]).unwrap();
        let assigns = vec![LBool::True, LBool::Undef, LBool::Undef];
        let query = Query::from_assignment(&inst, &assigns);

        assert_eq!(query.free_vars, vec![Var::new(1), Var::new(2)]);
        assert_eq!(query.lc_idxs, vec![(1, 1), (2, 1)]);
        assert_eq!(query.num_residual_clauses(), 1);
    }

    #[test]
    fn test_empty_query() {
        let query = Query::empty(4, 7);
        assert!(query.is_empty());
        assert_eq!(query.num_clauses, 7);
    }
}
