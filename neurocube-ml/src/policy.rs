//! Cube and branch policies.
//!
//! A cuber decides whether the search keeps splitting the current node; a
//! brancher picks the literal to split on. Both are configured from JSON:
//!
//! ```json
//! { "name": "deep", "kind": "depth", "depth": 4 }
//! { "kind": "neural", "max_depth": 8, "cutoff": 0.5 }
//! { "kind": "occurrence" }
//! ```

use crate::error::ModelResult;
use crate::inference::{Evaluation, Inference};
use neurocube_sat::{Lit, Query, Var};
use serde::{Deserialize, Serialize};

/// One node of the cube tree.
///
/// Caches the network evaluation so that a cuber and a brancher looking at
/// the same node share one forward pass.
#[derive(Debug)]
pub struct SearchNode<'q> {
    query: &'q Query,
    depth: usize,
    evaluation: Option<Evaluation>,
}

impl<'q> SearchNode<'q> {
    /// Node at `depth` whose residual formula is `query`.
    pub fn new(query: &'q Query, depth: usize) -> Self {
        Self {
            query,
            depth,
            evaluation: None,
        }
    }

    /// Residual formula.
    pub fn query(&self) -> &Query {
        self.query
    }

    /// Number of cube literals above this node.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Network evaluation, computed on first use.
    pub fn evaluate<I: Inference + ?Sized>(&mut self, inference: &mut I) -> ModelResult<&Evaluation> {
        let evaluation = match self.evaluation.take() {
            Some(e) => e,
            None => inference.evaluate(self.query)?,
        };
        Ok(self.evaluation.insert(evaluation))
    }
}

/// How a cuber decides to split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CuberKind {
    /// Never split; hand the whole formula to the solver.
    None,
    /// Split to a fixed depth.
    Depth {
        /// Cube length
        depth: usize,
    },
    /// Split while the predicted value stays below `cutoff`.
    Neural {
        /// Hard limit on the cube length
        max_depth: usize,
        /// Value threshold
        cutoff: f64,
    },
}

/// Named cube policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cuber {
    /// Display name, defaults to the kind
    #[serde(default)]
    pub name: Option<String>,
    /// Policy
    #[serde(flatten)]
    pub kind: CuberKind,
}

impl Cuber {
    /// Unnamed cuber.
    pub fn new(kind: CuberKind) -> Self {
        Self { name: None, kind }
    }

    /// Name used in logs and reports.
    pub fn name(&self) -> &str {
        match (&self.name, &self.kind) {
            (Some(name), _) => name,
            (None, CuberKind::None) => "none",
            (None, CuberKind::Depth { .. }) => "depth",
            (None, CuberKind::Neural { .. }) => "neural",
        }
    }

    /// Whether to split `node` further.
    pub fn should_split<I: Inference + ?Sized>(
        &self,
        node: &mut SearchNode<'_>,
        inference: &mut I,
    ) -> ModelResult<bool> {
        if node.query().is_empty() {
            return Ok(false);
        }
        Ok(match self.kind {
            CuberKind::None => false,
            CuberKind::Depth { depth } => node.depth() < depth,
            CuberKind::Neural { max_depth, cutoff } => {
                node.depth() < max_depth && node.evaluate(inference)?.value < cutoff
            }
        })
    }
}

/// How a brancher picks the split literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BrancherKind {
    /// Highest network logit.
    Neural,
    /// Most frequent literal in the residual formula.
    Occurrence,
}

/// Named branch policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brancher {
    /// Display name, defaults to the kind
    #[serde(default)]
    pub name: Option<String>,
    /// Policy
    #[serde(flatten)]
    pub kind: BrancherKind,
}

impl Brancher {
    /// Unnamed brancher.
    pub fn new(kind: BrancherKind) -> Self {
        Self { name: None, kind }
    }

    /// Name used in logs and reports.
    pub fn name(&self) -> &str {
        match (&self.name, &self.kind) {
            (Some(name), _) => name,
            (None, BrancherKind::Neural) => "neural",
            (None, BrancherKind::Occurrence) => "occurrence",
        }
    }

    /// Literal to split `node` on, `None` if nothing is left to decide.
    pub fn choose<I: Inference + ?Sized>(
        &self,
        node: &mut SearchNode<'_>,
        inference: &mut I,
    ) -> ModelResult<Option<Lit>> {
        if node.query().is_empty() {
            return Ok(None);
        }
        match self.kind {
            BrancherKind::Neural => Ok(node.evaluate(inference)?.best_literal()),
            BrancherKind::Occurrence => Ok(most_frequent(node.query())),
        }
    }
}

fn most_frequent(query: &Query) -> Option<Lit> {
    let n = query.num_vars;
    let mut counts = vec![0u32; 2 * n as usize];
    for &(slot, _) in &query.lc_idxs {
        counts[slot as usize] += 1;
    }
    // Slots are ordered positive-first, so ties favour the lower variable
    // and then the positive literal.
    let mut best: Option<(u32, u32)> = None;
    for var in &query.free_vars {
        for slot in [var.index(), var.index() + n] {
            if best.is_none_or(|(_, c)| counts[slot as usize] > c) {
                best = Some((slot, counts[slot as usize]));
            }
        }
    }
    best.map(|(slot, _)| {
        if slot < n {
            Lit::pos(Var::new(slot))
        } else {
            Lit::neg(Var::new(slot - n))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::VarScore;
    use neurocube_sat::{LBool, ProblemInstance};

    /// Returns a fixed value and prefers the last free variable.
    struct Fixed {
        value: f64,
        calls: usize,
    }

    impl Inference for Fixed {
        fn evaluate(&mut self, query: &Query) -> ModelResult<Evaluation> {
            self.calls += 1;
            let k = query.free_vars.len();
            let scores = query
                .free_vars
                .iter()
                .enumerate()
                .map(|(i, &var)| VarScore {
                    var,
                    pos: 0.0,
                    neg: i as f64 / k as f64,
                })
                .collect();
            Ok(Evaluation {
                scores,
                value: self.value,
            })
        }
    }

    fn query() -> Query {
        let inst = ProblemInstance::from_dimacs_clauses(
            3,
            &[vec![1, 2], vec![1, -3], vec![-2, 3]],
        )
        .unwrap();
        Query::from_assignment(&inst, &[LBool::Undef; 3])
    }

    #[test]
    fn test_cuber_from_json() {
        let c: Cuber = serde_json::from_str(r#"{"kind":"depth","depth":3}"#).unwrap();
        assert_eq!(c.kind, CuberKind::Depth { depth: 3 });
        assert_eq!(c.name(), "depth");

        let c: Cuber =
            serde_json::from_str(r#"{"name":"nn","kind":"neural","max_depth":4,"cutoff":0.5}"#)
                .unwrap();
        assert_eq!(c.name(), "nn");

        let b: Brancher = serde_json::from_str(r#"{"kind":"occurrence"}"#).unwrap();
        assert_eq!(b.kind, BrancherKind::Occurrence);
        assert!(serde_json::from_str::<Brancher>(r#"{"kind":"random"}"#).is_err());
    }

    #[test]
    fn test_depth_cuber() {
        let q = query();
        let mut inf = Fixed {
            value: 0.0,
            calls: 0,
        };
        let cuber = Cuber::new(CuberKind::Depth { depth: 2 });
        assert!(cuber.should_split(&mut SearchNode::new(&q, 1), &mut inf).unwrap());
        assert!(!cuber.should_split(&mut SearchNode::new(&q, 2), &mut inf).unwrap());
        assert_eq!(inf.calls, 0);

        let none = Cuber::new(CuberKind::None);
        assert!(!none.should_split(&mut SearchNode::new(&q, 0), &mut inf).unwrap());
    }

    #[test]
    fn test_neural_cuber_and_brancher_share_evaluation() {
        let q = query();
        let mut inf = Fixed {
            value: 0.2,
            calls: 0,
        };
        let cuber = Cuber::new(CuberKind::Neural {
            max_depth: 5,
            cutoff: 0.5,
        });
        let brancher = Brancher::new(BrancherKind::Neural);

        let mut node = SearchNode::new(&q, 0);
        assert!(cuber.should_split(&mut node, &mut inf).unwrap());
        assert_eq!(
            brancher.choose(&mut node, &mut inf).unwrap(),
            Some(Lit::from_dimacs(-3))
        );
        assert_eq!(inf.calls, 1);

        let mut high = Fixed {
            value: 0.9,
            calls: 0,
        };
        assert!(!cuber.should_split(&mut SearchNode::new(&q, 0), &mut high).unwrap());
    }

    #[test]
    fn test_occurrence_brancher() {
        let q = query();
        let mut inf = Fixed {
            value: 0.0,
            calls: 0,
        };
        let brancher = Brancher::new(BrancherKind::Occurrence);
        // x1 occurs positively twice, everything else once
        assert_eq!(
            brancher.choose(&mut SearchNode::new(&q, 0), &mut inf).unwrap(),
            Some(Lit::from_dimacs(1))
        );
        assert_eq!(
            brancher
                .choose(&mut SearchNode::new(&Query::empty(3, 3), 0), &mut inf)
                .unwrap(),
            None
        );
    }
}
