//! Variables and literals.
//!
//! Variables are 0-based internally; DIMACS variable `k` is [`Var`] `k - 1`.
//! A literal packs its variable and sign into one `u32` (`var << 1 | sign`),
//! so literal codes can index watch lists directly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Not;

/// A Boolean variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Var(u32);

impl Var {
    /// Create a variable from its 0-based index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Create a variable from its 1-based DIMACS number.
    #[must_use]
    pub const fn from_dimacs(number: u32) -> Self {
        Self(number - 1)
    }

    /// The 0-based integer id of this variable.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }

    /// The 1-based DIMACS number of this variable.
    #[must_use]
    pub const fn to_dimacs(self) -> u32 {
        self.0 + 1
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.to_dimacs())
    }
}

/// A signed reference to a [`Var`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Lit(u32);

impl Lit {
    /// Positive literal of `var`.
    #[must_use]
    pub const fn pos(var: Var) -> Self {
        Self(var.0 << 1)
    }

    /// Negative literal of `var`.
    #[must_use]
    pub const fn neg(var: Var) -> Self {
        Self((var.0 << 1) | 1)
    }

    /// Literal of `var` with the given polarity.
    #[must_use]
    pub const fn new(var: Var, positive: bool) -> Self {
        if positive { Self::pos(var) } else { Self::neg(var) }
    }

    /// Parse a non-zero DIMACS literal (`3`, `-7`).
    #[must_use]
    pub fn from_dimacs(lit: i32) -> Self {
        debug_assert_ne!(lit, 0, "0 terminates a clause, it is not a literal");
        Self::new(Var::from_dimacs(lit.unsigned_abs()), lit > 0)
    }

    /// DIMACS rendering of this literal.
    #[must_use]
    pub fn to_dimacs(self) -> i32 {
        let number = self.var().to_dimacs() as i32;
        if self.is_pos() { number } else { -number }
    }

    /// The underlying variable.
    #[must_use]
    pub const fn var(self) -> Var {
        Var(self.0 >> 1)
    }

    /// True for the positive literal of its variable.
    #[must_use]
    pub const fn is_pos(self) -> bool {
        self.0 & 1 == 0
    }

    /// True for the negative literal of its variable.
    #[must_use]
    pub const fn is_neg(self) -> bool {
        self.0 & 1 == 1
    }

    /// Dense code in `0..2 * num_vars`, used to index per-literal tables.
    #[must_use]
    pub const fn code(self) -> usize {
        self.0 as usize
    }

    /// Literal slot in the literal/clause adjacency: `var` for positive
    /// literals, `var + num_vars` for negative ones.
    #[must_use]
    pub const fn slot(self, num_vars: u32) -> u32 {
        if self.is_pos() {
            self.var().0
        } else {
            self.var().0 + num_vars
        }
    }
}

impl Not for Lit {
    type Output = Lit;

    fn not(self) -> Lit {
        Lit(self.0 ^ 1)
    }
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_dimacs())
    }
}

/// Three-valued assignment of a variable or literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LBool {
    /// Assigned true.
    True,
    /// Assigned false.
    False,
    /// Unassigned.
    #[default]
    Undef,
}

impl LBool {
    /// Value of a literal whose variable has value `self`.
    #[must_use]
    pub fn under(self, lit: Lit) -> LBool {
        match (self, lit.is_pos()) {
            (LBool::Undef, _) => LBool::Undef,
            (LBool::True, true) | (LBool::False, false) => LBool::True,
            _ => LBool::False,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_polarity() {
        let v = Var::new(5);
        let pos = Lit::pos(v);
        let neg = Lit::neg(v);

        assert!(pos.is_pos());
        assert!(neg.is_neg());
        assert_eq!(pos.var(), v);
        assert_eq!(neg.var(), v);
        assert_eq!(!pos, neg);
        assert_eq!(!!pos, pos);
    }

    #[test]
    fn test_dimacs_mapping() {
        let lit = Lit::from_dimacs(-3);
        assert_eq!(lit.var().index(), 2);
        assert!(lit.is_neg());
        assert_eq!(lit.to_dimacs(), -3);
        assert_eq!(Lit::from_dimacs(1).var(), Var::new(0));
    }

    #[test]
    fn test_slot_layout() {
        let v = Var::new(2);
        assert_eq!(Lit::pos(v).slot(4), 2);
        assert_eq!(Lit::neg(v).slot(4), 6);
    }

    #[test]
    fn test_lbool_under_literal() {
        let lit = Lit::pos(Var::new(0));
        assert_eq!(LBool::True.under(lit), LBool::True);
        assert_eq!(LBool::True.under(!lit), LBool::False);
        assert_eq!(LBool::False.under(!lit), LBool::True);
        assert_eq!(LBool::Undef.under(lit), LBool::Undef);
    }
}
