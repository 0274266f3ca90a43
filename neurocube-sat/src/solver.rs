//! Incremental CDCL solver with assumptions.
//!
//! A compact MiniSat-style engine:
//! - two watched literals per clause
//! - first-UIP conflict analysis with activity bumping
//! - Luby restarts, at most `sat_restart_max` per call
//! - assumptions decided before any free decision; when one is falsified the
//!   final conflict analysis returns the subset of assumptions responsible
//!
//! Every solve call is bounded by `max_conflicts` and reports
//! [`SolveResult::Unknown`] once the budget is spent.

use crate::dimacs::ProblemInstance;
use crate::literal::{LBool, Lit, Var};
use crate::query::Query;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::trace;

/// Conflicts between restarts is `RESTART_BASE * luby(i)`.
const RESTART_BASE: u64 = 100;
const VAR_DECAY: f64 = 0.95;
const ACTIVITY_RESCALE: f64 = 1e100;

/// Tuning parameters applied to every solver an actor creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Conflict budget of a single solve call
    pub max_conflicts: u64,
    /// Maximum number of restarts in a single solve call
    pub sat_restart_max: u32,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_conflicts: 10_000,
            sat_restart_max: 16,
        }
    }
}

/// Outcome of [`Solver::solve_limited`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveResult {
    /// A model exists under the assumptions.
    Sat,
    /// No model exists under the assumptions. `core` is a subset of the
    /// assumptions that is already contradictory with the formula (empty
    /// when the formula itself is unsatisfiable).
    Unsat {
        /// Failed assumptions
        core: Vec<Lit>,
    },
    /// The conflict budget ran out.
    Unknown,
}

/// Cumulative solver counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolverStats {
    /// Conflicts encountered
    pub conflicts: u64,
    /// Free decisions (assumptions excluded)
    pub decisions: u64,
    /// Literals propagated
    pub propagations: u64,
    /// Restarts performed
    pub restarts: u64,
    /// Clauses learned
    pub learned: u64,
}

type ClauseRef = usize;

#[derive(Debug, Clone)]
struct ClauseData {
    /// `lits[0]` and `lits[1]` are watched; for a reason clause `lits[0]`
    /// is the implied literal.
    lits: SmallVec<[Lit; 4]>,
    learnt: bool,
}

/// Incremental CDCL solver bound to one [`ProblemInstance`].
pub struct Solver {
    instance: Arc<ProblemInstance>,
    options: SolverOptions,
    clauses: Vec<ClauseData>,
    /// Indexed by literal code: clauses watching the negation of that literal.
    watches: Vec<Vec<ClauseRef>>,
    assigns: Vec<LBool>,
    level: Vec<u32>,
    reason: Vec<Option<ClauseRef>>,
    /// Saved phase
    polarity: Vec<bool>,
    activity: Vec<f64>,
    var_inc: f64,
    seen: Vec<bool>,
    trail: Vec<Lit>,
    trail_lim: Vec<usize>,
    qhead: usize,
    /// False once the formula is known to be unsatisfiable.
    ok: bool,
    stats: SolverStats,
}

impl Solver {
    /// Create a solver loaded with every clause of `instance`.
    pub fn new(instance: Arc<ProblemInstance>, options: SolverOptions) -> Self {
        let n = instance.num_vars() as usize;
        let mut solver = Self {
            instance: Arc::clone(&instance),
            options,
            clauses: Vec::with_capacity(instance.num_clauses()),
            watches: vec![Vec::new(); 2 * n],
            assigns: vec![LBool::Undef; n],
            level: vec![0; n],
            reason: vec![None; n],
            polarity: vec![false; n],
            activity: vec![0.0; n],
            var_inc: 1.0,
            seen: vec![false; n],
            trail: Vec::with_capacity(n),
            trail_lim: Vec::new(),
            qhead: 0,
            ok: true,
            stats: SolverStats::default(),
        };

        for clause in instance.clauses() {
            if !solver.add_clause(clause) {
                break;
            }
        }
        if solver.ok && solver.propagate().is_some() {
            solver.ok = false;
        }

        trace!(
            vars = n,
            clauses = solver.clauses.len(),
            ok = solver.ok,
            "solver initialised"
        );
        solver
    }

    /// The instance this solver is bound to.
    pub fn instance(&self) -> &Arc<ProblemInstance> {
        &self.instance
    }

    /// Options applied to every solve call.
    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// Cumulative counters.
    pub fn stats(&self) -> &SolverStats {
        &self.stats
    }

    /// Current assignment trail.
    pub fn trail(&self) -> &[Lit] {
        &self.trail
    }

    /// Current decision level.
    pub fn decision_level(&self) -> u32 {
        self.trail_lim.len() as u32
    }

    /// Value of a literal under the current assignment.
    pub fn value(&self, lit: Lit) -> LBool {
        value_of(&self.assigns, lit)
    }

    /// Decide satisfiability under `assumptions` within the conflict budget.
    ///
    /// The solver is back at decision level 0 when this returns; learned
    /// clauses are kept for later calls.
    pub fn solve_limited(&mut self, assumptions: &[Lit]) -> SolveResult {
        self.backtrack(0);
        if !self.ok {
            return SolveResult::Unsat { core: Vec::new() };
        }

        let budget_start = self.stats.conflicts;
        let mut restarts = 0u32;
        let mut since_restart = 0u64;
        let mut restart_limit = RESTART_BASE * luby(0);

        let result = loop {
            if let Some(confl) = self.propagate() {
                self.stats.conflicts += 1;
                since_restart += 1;

                if self.decision_level() == 0 {
                    self.ok = false;
                    break SolveResult::Unsat { core: Vec::new() };
                }

                let (learnt, backtrack_level) = self.analyze(confl);
                self.backtrack(backtrack_level);
                if learnt.len() == 1 {
                    self.enqueue(learnt[0], None);
                } else {
                    let asserting = learnt[0];
                    let cref = self.attach(learnt, true);
                    self.stats.learned += 1;
                    self.enqueue(asserting, Some(cref));
                }
                self.var_inc /= VAR_DECAY;

                if self.stats.conflicts - budget_start >= self.options.max_conflicts {
                    break SolveResult::Unknown;
                }

                if since_restart >= restart_limit && restarts < self.options.sat_restart_max {
                    restarts += 1;
                    self.stats.restarts += 1;
                    since_restart = 0;
                    restart_limit = RESTART_BASE * luby(restarts);
                    self.backtrack(0);
                }
                continue;
            }

            let level = self.decision_level() as usize;
            let next = if level < assumptions.len() {
                let assumption = assumptions[level];
                match self.value(assumption) {
                    LBool::True => {
                        // Already implied: open an empty level to keep
                        // assumption i at level i + 1.
                        self.new_decision_level();
                        continue;
                    }
                    LBool::False => {
                        break SolveResult::Unsat {
                            core: self.analyze_final(assumption),
                        };
                    }
                    LBool::Undef => assumption,
                }
            } else {
                match self.pick_branch() {
                    Some(lit) => {
                        self.stats.decisions += 1;
                        lit
                    }
                    None => break SolveResult::Sat,
                }
            };

            self.new_decision_level();
            self.enqueue(next, None);
        };

        self.backtrack(0);
        result
    }

    /// Structured view of the formula after propagating `assumptions`.
    ///
    /// Returns an empty query when the assumptions conflict with the formula.
    /// The solver is back at decision level 0 afterwards.
    pub fn to_query(&mut self, assumptions: &[Lit]) -> Query {
        self.backtrack(0);
        if self.ok && self.propagate().is_some() {
            self.ok = false;
        }

        let query = if self.ok && self.assume_all(assumptions) {
            Query::from_assignment(&self.instance, &self.assigns)
        } else {
            Query::empty(self.instance.num_vars(), self.instance.num_clauses())
        };

        self.backtrack(0);
        query
    }

    fn assume_all(&mut self, assumptions: &[Lit]) -> bool {
        for &lit in assumptions {
            match self.value(lit) {
                LBool::True => {}
                LBool::False => return false,
                LBool::Undef => {
                    self.new_decision_level();
                    self.enqueue(lit, None);
                    if self.propagate().is_some() {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Add an input clause at level 0. Returns false once the formula is
    /// known to be unsatisfiable.
    fn add_clause(&mut self, lits: &[Lit]) -> bool {
        let mut clause: SmallVec<[Lit; 4]> = lits.iter().copied().collect();
        clause.sort_unstable();
        clause.dedup();

        // p and !p sort next to each other
        if clause.windows(2).any(|w| w[0] == !w[1]) {
            return true;
        }
        if clause.iter().any(|&l| self.value(l) == LBool::True) {
            return true;
        }
        clause.retain(|l| self.value(*l) != LBool::False);

        match clause.len() {
            0 => {
                self.ok = false;
                false
            }
            1 => {
                self.enqueue(clause[0], None);
                true
            }
            _ => {
                self.attach(clause, false);
                true
            }
        }
    }

    fn attach(&mut self, lits: SmallVec<[Lit; 4]>, learnt: bool) -> ClauseRef {
        let cref = self.clauses.len();
        self.watches[(!lits[0]).code()].push(cref);
        self.watches[(!lits[1]).code()].push(cref);
        self.clauses.push(ClauseData { lits, learnt });
        cref
    }

    fn new_decision_level(&mut self) {
        self.trail_lim.push(self.trail.len());
    }

    fn enqueue(&mut self, lit: Lit, reason: Option<ClauseRef>) {
        let v = var_idx(lit.var());
        self.assigns[v] = if lit.is_pos() {
            LBool::True
        } else {
            LBool::False
        };
        self.level[v] = self.decision_level();
        self.reason[v] = reason;
        self.trail.push(lit);
    }

    fn backtrack(&mut self, level: u32) {
        if self.decision_level() <= level {
            return;
        }
        let limit = self.trail_lim[level as usize];
        for &lit in self.trail[limit..].iter().rev() {
            let v = var_idx(lit.var());
            self.assigns[v] = LBool::Undef;
            self.reason[v] = None;
            self.polarity[v] = lit.is_pos();
        }
        self.trail.truncate(limit);
        self.trail_lim.truncate(level as usize);
        self.qhead = self.qhead.min(limit);
    }

    /// Unit propagation. Returns the conflicting clause, if any.
    fn propagate(&mut self) -> Option<ClauseRef> {
        let mut conflict = None;

        while conflict.is_none() && self.qhead < self.trail.len() {
            let p = self.trail[self.qhead];
            self.qhead += 1;
            self.stats.propagations += 1;

            let false_lit = !p;
            let mut watchers = std::mem::take(&mut self.watches[p.code()]);
            let mut i = 0;
            let mut j = 0;

            while i < watchers.len() {
                let cref = watchers[i];
                i += 1;

                let lits = &mut self.clauses[cref].lits;
                if lits[0] == false_lit {
                    lits.swap(0, 1);
                }
                let first = lits[0];
                if value_of(&self.assigns, first) == LBool::True {
                    watchers[j] = cref;
                    j += 1;
                    continue;
                }

                let mut moved = false;
                for k in 2..lits.len() {
                    if value_of(&self.assigns, lits[k]) != LBool::False {
                        lits.swap(1, k);
                        self.watches[(!lits[1]).code()].push(cref);
                        moved = true;
                        break;
                    }
                }
                if moved {
                    continue;
                }

                watchers[j] = cref;
                j += 1;
                if value_of(&self.assigns, first) == LBool::False {
                    conflict = Some(cref);
                    self.qhead = self.trail.len();
                    while i < watchers.len() {
                        watchers[j] = watchers[i];
                        j += 1;
                        i += 1;
                    }
                } else {
                    self.enqueue(first, Some(cref));
                }
            }

            watchers.truncate(j);
            self.watches[p.code()] = watchers;
        }

        conflict
    }

    /// First-UIP analysis. Returns the learned clause (asserting literal
    /// first, highest remaining level second) and the backtrack level.
    fn analyze(&mut self, confl: ClauseRef) -> (SmallVec<[Lit; 4]>, u32) {
        let current = self.decision_level();
        let mut learnt: SmallVec<[Lit; 4]> = SmallVec::new();
        learnt.push(Lit::pos(Var::new(0)));

        let mut path_count = 0usize;
        let mut index = self.trail.len();
        let mut confl = confl;
        let mut first = true;

        let uip = loop {
            let start = if first { 0 } else { 1 };
            first = false;
            for k in start..self.clauses[confl].lits.len() {
                let q = self.clauses[confl].lits[k];
                let v = var_idx(q.var());
                if !self.seen[v] && self.level[v] > 0 {
                    self.bump(v);
                    self.seen[v] = true;
                    if self.level[v] >= current {
                        path_count += 1;
                    } else {
                        learnt.push(q);
                    }
                }
            }

            loop {
                index -= 1;
                if self.seen[var_idx(self.trail[index].var())] {
                    break;
                }
            }
            let lit = self.trail[index];
            let v = var_idx(lit.var());
            self.seen[v] = false;
            path_count -= 1;

            if path_count == 0 {
                break lit;
            }
            let Some(reason) = self.reason[v] else {
                unreachable!("literal {lit} above the first UIP has no reason clause");
            };
            confl = reason;
        };

        learnt[0] = !uip;
        for lit in &learnt[1..] {
            self.seen[var_idx(lit.var())] = false;
        }

        let backtrack_level = if learnt.len() == 1 {
            0
        } else {
            let mut max_i = 1;
            for k in 2..learnt.len() {
                if self.level[var_idx(learnt[k].var())] > self.level[var_idx(learnt[max_i].var())] {
                    max_i = k;
                }
            }
            learnt.swap(1, max_i);
            self.level[var_idx(learnt[1].var())]
        };

        (learnt, backtrack_level)
    }

    /// Assumptions responsible for `failed` being false.
    fn analyze_final(&mut self, failed: Lit) -> Vec<Lit> {
        let mut core = vec![failed];
        if self.decision_level() == 0 {
            return core;
        }

        let failed_var = var_idx(failed.var());
        self.seen[failed_var] = true;

        for i in (self.trail_lim[0]..self.trail.len()).rev() {
            let lit = self.trail[i];
            let v = var_idx(lit.var());
            if !self.seen[v] {
                continue;
            }
            match self.reason[v] {
                // Every decision so far is an assumption
                None => core.push(lit),
                Some(cref) => {
                    for k in 1..self.clauses[cref].lits.len() {
                        let q = self.clauses[cref].lits[k];
                        if self.level[var_idx(q.var())] > 0 {
                            self.seen[var_idx(q.var())] = true;
                        }
                    }
                }
            }
            self.seen[v] = false;
        }
        self.seen[failed_var] = false;

        core
    }

    fn pick_branch(&self) -> Option<Lit> {
        let mut best: Option<usize> = None;
        for v in 0..self.assigns.len() {
            if self.assigns[v] != LBool::Undef {
                continue;
            }
            if best.is_none_or(|b| self.activity[v] > self.activity[b]) {
                best = Some(v);
            }
        }
        best.map(|v| Lit::new(Var::new(v as u32), self.polarity[v]))
    }

    fn bump(&mut self, v: usize) {
        self.activity[v] += self.var_inc;
        if self.activity[v] > ACTIVITY_RESCALE {
            for a in &mut self.activity {
                *a /= ACTIVITY_RESCALE;
            }
            self.var_inc /= ACTIVITY_RESCALE;
        }
    }

    /// Number of learned clauses currently stored.
    pub fn num_learned(&self) -> usize {
        self.clauses.iter().filter(|c| c.learnt).count()
    }
}

#[inline]
fn var_idx(var: Var) -> usize {
    var.index() as usize
}

#[inline]
fn value_of(assigns: &[LBool], lit: Lit) -> LBool {
    assigns[var_idx(lit.var())].under(lit)
}

/// Luby sequence 1, 1, 2, 1, 1, 2, 4, ...
fn luby(x: u32) -> u64 {
    let mut x = u64::from(x);
    let mut size = 1u64;
    let mut seq = 0u32;
    while size < x + 1 {
        seq += 1;
        size = 2 * size + 1;
    }
    while size - 1 != x {
        size = (size - 1) >> 1;
        seq -= 1;
        x %= size;
    }
    1u64 << seq
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(num_vars: u32, clauses: &[Vec<i32>]) -> Arc<ProblemInstance> {
        Arc::new(ProblemInstance::from_dimacs_clauses(num_vars, clauses).unwrap())
    }

    fn lit(l: i32) -> Lit {
        Lit::from_dimacs(l)
    }

    #[test]
    fn test_luby_prefix() {
        let seq: Vec<u64> = (0..9).map(luby).collect();
        assert_eq!(seq, vec![1, 1, 2, 1, 1, 2, 4, 1, 1]);
    }

    #[test]
    fn test_empty_formula_is_sat() {
        let mut solver = Solver::new(instance(3, &[]), SolverOptions::default());
        assert_eq!(solver.solve_limited(&[]), SolveResult::Sat);
    }

    #[test]
    fn test_contradictory_units() {
        let mut solver = Solver::new(instance(1, &[vec![1], vec![-1]]), SolverOptions::default());
        assert_eq!(
            solver.solve_limited(&[]),
            SolveResult::Unsat { core: Vec::new() }
        );
    }

    #[test]
    fn test_assumption_core() {
        // x1 -> x2, x2 -> x3
        let mut solver = Solver::new(
            instance(4, &[vec![-1, 2], vec![-2, 3]]),
            SolverOptions::default(),
        );

        let result = solver.solve_limited(&[lit(4), lit(1), lit(-3)]);
        let SolveResult::Unsat { mut core } = result else {
            panic!("expected unsat, got {result:?}");
        };
        core.sort();
        let mut expected = vec![lit(1), lit(-3)];
        expected.sort();
        assert_eq!(core, expected);

        // Same solver still answers sat without the assumptions
        assert_eq!(solver.solve_limited(&[]), SolveResult::Sat);
    }

    #[test]
    fn test_complementary_assumptions() {
        let mut solver = Solver::new(instance(2, &[vec![1, 2]]), SolverOptions::default());
        let result = solver.solve_limited(&[lit(1), lit(-1)]);
        let SolveResult::Unsat { core } = result else {
            panic!("expected unsat, got {result:?}");
        };
        assert!(core.contains(&lit(1)));
        assert!(core.contains(&lit(-1)));
    }

    #[test]
    fn test_pigeonhole_unsat() {
        // 3 pigeons, 2 holes: p(i,h) = 2*i + h + 1
        let p = |i: i32, h: i32| 2 * i + h + 1;
        let mut clauses = Vec::new();
        for i in 0..3 {
            clauses.push(vec![p(i, 0), p(i, 1)]);
        }
        for h in 0..2 {
            for i in 0..3 {
                for j in (i + 1)..3 {
                    clauses.push(vec![-p(i, h), -p(j, h)]);
                }
            }
        }
        let mut solver = Solver::new(instance(6, &clauses), SolverOptions::default());
        assert_eq!(
            solver.solve_limited(&[]),
            SolveResult::Unsat { core: Vec::new() }
        );
        assert!(solver.stats().conflicts > 0);
    }

    #[test]
    fn test_conflict_budget() {
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
        let options = SolverOptions {
            max_conflicts: 1,
            sat_restart_max: 0,
        };
        let mut solver = Solver::new(instance(12, &clauses), options);
        assert_eq!(solver.solve_limited(&[]), SolveResult::Unknown);
        assert_eq!(solver.decision_level(), 0);
    }

    #[test]
    fn test_query_after_assumptions() {
        // (x1 | x2) & (-x1 | x3)
        let mut solver = Solver::new(
            instance(3, &[vec![1, 2], vec![-1, 3]]),
            SolverOptions::default(),
        );

        let query = solver.to_query(&[]);
        assert_eq!(query.free_vars.len(), 3);
        assert_eq!(query.lc_idxs.len(), 4);

        // x1 satisfies clause 0 and forces x3, which satisfies clause 1
        let query = solver.to_query(&[lit(1)]);
        assert!(query.is_empty());

        // -x1 forces x2: everything satisfied
        let query = solver.to_query(&[lit(-1)]);
        assert!(query.is_empty());
        assert_eq!(solver.decision_level(), 0);
    }

    #[test]
    fn test_query_conflicting_assumptions() {
        let mut solver = Solver::new(instance(2, &[vec![1, 2]]), SolverOptions::default());
        let query = solver.to_query(&[lit(-1), lit(-2)]);
        assert!(query.is_empty());
        assert_eq!(query.num_vars, 2);
        assert_eq!(query.num_clauses, 1);
    }
}
