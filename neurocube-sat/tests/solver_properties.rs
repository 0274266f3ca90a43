//! Property-based tests for the CDCL solver
//!
//! Tests:
//! - Agreement with brute-force enumeration on small formulas
//! - Failed-assumption cores are subsets of the assumptions
//! - Cores are themselves contradictory with the formula
//! - Queries never mention assigned variables

use neurocube_sat::*;
use proptest::prelude::*;
use std::sync::Arc;

const NUM_VARS: u32 = 6;

fn clause_strategy() -> impl Strategy<Value = Vec<i32>> {
    prop::collection::vec(
        (1..=NUM_VARS as i32, any::<bool>()).prop_map(|(v, s)| if s { v } else { -v }),
        1..4,
    )
}

fn formula_strategy() -> impl Strategy<Value = Vec<Vec<i32>>> {
    prop::collection::vec(clause_strategy(), 0..24)
}

fn assumptions_strategy() -> impl Strategy<Value = Vec<i32>> {
    prop::collection::vec(
        (1..=NUM_VARS as i32, any::<bool>()).prop_map(|(v, s)| if s { v } else { -v }),
        0..5,
    )
}

fn brute_force_sat(clauses: &[Vec<i32>], assumptions: &[i32]) -> bool {
    (0u32..(1 << NUM_VARS)).any(|bits| {
        let holds = |l: i32| {
            let value = bits >> (l.unsigned_abs() - 1) & 1 == 1;
            if l > 0 { value } else { !value }
        };
        assumptions.iter().all(|&a| holds(a)) && clauses.iter().all(|c| c.iter().any(|&l| holds(l)))
    })
}

fn build(clauses: &[Vec<i32>]) -> Solver {
    let instance = ProblemInstance::from_dimacs_clauses(NUM_VARS, clauses).unwrap();
    Solver::new(Arc::new(instance), SolverOptions::default())
}

proptest! {
    #[test]
    fn solver_agrees_with_enumeration(clauses in formula_strategy()) {
        let mut solver = build(&clauses);
        let expected = brute_force_sat(&clauses, &[]);
        match solver.solve_limited(&[]) {
            SolveResult::Sat => prop_assert!(expected),
            SolveResult::Unsat { core } => {
                prop_assert!(!expected);
                prop_assert!(core.is_empty());
            }
            SolveResult::Unknown => prop_assert!(false, "budget exhausted on a 6-variable formula"),
        }
    }

    #[test]
    fn core_is_subset_of_assumptions(
        clauses in formula_strategy(),
        assumptions in assumptions_strategy(),
    ) {
        let mut solver = build(&clauses);
        let lits: Vec<Lit> = assumptions.iter().map(|&l| Lit::from_dimacs(l)).collect();
        let expected = brute_force_sat(&clauses, &assumptions);

        match solver.solve_limited(&lits) {
            SolveResult::Sat => prop_assert!(expected),
            SolveResult::Unsat { core } => {
                prop_assert!(!expected);
                for l in &core {
                    prop_assert!(lits.contains(l), "core literal {} is not an assumption", l);
                }
                let core_dimacs: Vec<i32> = core.iter().map(|l| l.to_dimacs()).collect();
                prop_assert!(!brute_force_sat(&clauses, &core_dimacs));
            }
            SolveResult::Unknown => prop_assert!(false, "budget exhausted on a 6-variable formula"),
        }
    }

    #[test]
    fn query_only_mentions_free_variables(
        clauses in formula_strategy(),
        assumptions in assumptions_strategy(),
    ) {
        let mut solver = build(&clauses);
        let lits: Vec<Lit> = assumptions.iter().map(|&l| Lit::from_dimacs(l)).collect();
        let query = solver.to_query(&lits);

        for &(slot, clause) in &query.lc_idxs {
            let var = Var::new(slot % NUM_VARS);
            prop_assert!(query.free_vars.contains(&var));
            prop_assert!((clause as usize) < query.num_clauses);
        }
        for var in &query.free_vars {
            prop_assert!(!lits.iter().any(|l| l.var() == *var));
        }
        prop_assert_eq!(solver.decision_level(), 0);
    }
}

#[test]
fn repeated_calls_reuse_learned_clauses() {
    // Pigeonhole 4 -> 3
    let p = |i: i32, h: i32| 3 * i + h + 1;
    let mut clauses = Vec::new();
    for i in 0..4 {
        clauses.push(vec![p(i, 0), p(i, 1), p(i, 2)]);
    }
    for h in 0..3 {
        for i in 0..4 {
            for j in (i + 1)..4 {
                clauses.push(vec![-p(i, h), -p(j, h)]);
            }
        }
    }
    let instance = ProblemInstance::from_dimacs_clauses(12, &clauses).unwrap();
    let mut solver = Solver::new(Arc::new(instance), SolverOptions::default());

    let first = solver.solve_limited(&[Lit::from_dimacs(1)]);
    assert!(matches!(first, SolveResult::Unsat { .. }));
    assert!(solver.num_learned() > 0 || solver.stats().conflicts > 0);

    assert_eq!(
        solver.solve_limited(&[]),
        SolveResult::Unsat { core: Vec::new() }
    );
}

#[test]
fn instance_from_file() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "c tiny\np cnf 2 2\n1 2 0\n-1 0").unwrap();

    let instance = ProblemInstance::from_file(file.path()).unwrap();
    assert_eq!(instance.num_vars(), 2);
    assert_eq!(instance.num_clauses(), 2);

    let mut solver = Solver::new(Arc::new(instance), SolverOptions::default());
    assert_eq!(solver.solve_limited(&[]), SolveResult::Sat);
    assert_eq!(
        solver.solve_limited(&[Lit::from_dimacs(-2)]),
        SolveResult::Unsat {
            core: vec![Lit::from_dimacs(-2)]
        }
    );
}
