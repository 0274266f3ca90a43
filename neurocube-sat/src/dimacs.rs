//! DIMACS CNF problem instances
//!
//! Format:
//! - Comments start with 'c'
//! - Problem line: "p cnf <num_vars> <num_clauses>"
//! - Clauses: whitespace-separated literals terminated by 0, possibly spanning lines
//! - A line starting with '%' ends the clause section (SATLIB files)

use crate::error::ParseError;
use crate::literal::Lit;
use smallvec::SmallVec;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A clause of an instance.
pub type Clause = SmallVec<[Lit; 4]>;

/// An immutable parsed CNF instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemInstance {
    num_vars: u32,
    clauses: Vec<Clause>,
}

impl ProblemInstance {
    /// Build an instance from clauses given as DIMACS literals.
    ///
    /// Literals must be non-zero and refer to variables `1..=num_vars`.
    pub fn from_dimacs_clauses(num_vars: u32, clauses: &[Vec<i32>]) -> Result<Self, ParseError> {
        let mut parsed = Vec::with_capacity(clauses.len());
        for clause in clauses {
            let mut lits = Clause::new();
            for &lit in clause {
                lits.push(checked_literal(lit, num_vars, 0)?);
            }
            parsed.push(lits);
        }
        Ok(Self {
            num_vars,
            clauses: parsed,
        })
    }

    /// Parse DIMACS CNF from a reader.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self, ParseError> {
        let mut header: Option<(u32, usize)> = None;
        let mut clauses = Vec::new();
        let mut pending = Clause::new();

        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let line = line?;
            let trimmed = line.trim();

            if trimmed.is_empty() || trimmed.starts_with('c') {
                continue;
            }
            if trimmed.starts_with('%') {
                break;
            }

            if trimmed.starts_with('p') {
                if header.is_some() {
                    return Err(ParseError::syntax(line_no, "duplicate problem line"));
                }
                header = Some(parse_problem_line(trimmed, line_no)?);
                continue;
            }

            let Some((num_vars, _)) = header else {
                return Err(ParseError::syntax(
                    line_no,
                    "clause found before problem line",
                ));
            };

            for token in trimmed.split_whitespace() {
                let lit: i32 = token.parse().map_err(|_| {
                    ParseError::syntax(line_no, format!("invalid literal '{token}'"))
                })?;
                if lit == 0 {
                    clauses.push(std::mem::take(&mut pending));
                } else {
                    pending.push(checked_literal(lit, num_vars, line_no)?);
                }
            }
        }

        let Some((num_vars, expected)) = header else {
            return Err(ParseError::MissingProblemLine);
        };

        // Last clause without its terminating 0
        if !pending.is_empty() {
            clauses.push(pending);
        }

        if clauses.len() != expected {
            return Err(ParseError::ClauseCount {
                expected,
                found: clauses.len(),
            });
        }

        Ok(Self { num_vars, clauses })
    }

    /// Parse a DIMACS CNF file.
    pub fn from_file(path: &Path) -> Result<Self, ParseError> {
        let file = File::open(path)?;
        Self::parse(BufReader::new(file))
    }

    /// Number of declared variables.
    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }

    /// Number of clauses.
    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    /// The clauses, in file order.
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }
}

fn parse_problem_line(line: &str, line_no: usize) -> Result<(u32, usize), ParseError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() != 4 || parts[1] != "cnf" {
        return Err(ParseError::syntax(
            line_no,
            format!("invalid problem line '{line}'"),
        ));
    }

    let num_vars = parts[2].parse().map_err(|_| {
        ParseError::syntax(line_no, format!("invalid number of variables '{}'", parts[2]))
    })?;
    let num_clauses = parts[3].parse().map_err(|_| {
        ParseError::syntax(line_no, format!("invalid number of clauses '{}'", parts[3]))
    })?;

    Ok((num_vars, num_clauses))
}

fn checked_literal(lit: i32, num_vars: u32, line_no: usize) -> Result<Lit, ParseError> {
    if lit == 0 || lit.unsigned_abs() > num_vars {
        return Err(ParseError::LiteralOutOfRange {
            line: line_no,
            lit,
            num_vars,
        });
    }
    Ok(Lit::from_dimacs(lit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_simple() {
        let input = "c example\np cnf 3 2\n1 -2 0\n2 3 0\n";
        let inst = ProblemInstance::parse(Cursor::new(input)).unwrap();

        assert_eq!(inst.num_vars(), 3);
        assert_eq!(inst.num_clauses(), 2);
        assert_eq!(inst.clauses()[0][1], Lit::from_dimacs(-2));
    }

    #[test]
    fn test_parse_clause_spanning_lines() {
        let input = "p cnf 4 2\n1 2\n3 0 -4\n0\n";
        let inst = ProblemInstance::parse(Cursor::new(input)).unwrap();

        assert_eq!(inst.num_clauses(), 2);
        assert_eq!(inst.clauses()[0].len(), 3);
        assert_eq!(inst.clauses()[1].len(), 1);
    }

    #[test]
    fn test_parse_satlib_trailer() {
        let input = "p cnf 2 1\n1 2 0\n%\n0\n";
        let inst = ProblemInstance::parse(Cursor::new(input)).unwrap();
        assert_eq!(inst.num_clauses(), 1);
    }

    #[test]
    fn test_parse_missing_problem_line() {
        let err = ProblemInstance::parse(Cursor::new("c nothing\n")).unwrap_err();
        assert!(matches!(err, ParseError::MissingProblemLine));
    }

    #[test]
    fn test_parse_clause_before_header() {
        let err = ProblemInstance::parse(Cursor::new("1 2 0\np cnf 2 1\n")).unwrap_err();
        assert!(matches!(err, ParseError::Syntax { line: 1, .. }));
    }

    #[test]
    fn test_parse_out_of_range() {
        let err = ProblemInstance::parse(Cursor::new("p cnf 2 1\n1 3 0\n")).unwrap_err();
        assert!(matches!(
            err,
            ParseError::LiteralOutOfRange { line: 2, lit: 3, .. }
        ));
    }

    #[test]
    fn test_parse_clause_count_mismatch() {
        let err = ProblemInstance::parse(Cursor::new("p cnf 2 3\n1 0\n2 0\n")).unwrap_err();
        assert!(matches!(
            err,
            ParseError::ClauseCount {
                expected: 3,
                found: 2
            }
        ));
    }

    #[test]
    fn test_parse_bad_token() {
        let err = ProblemInstance::parse(Cursor::new("p cnf 2 1\n1 x 0\n")).unwrap_err();
        assert!(err.to_string().contains("'x'"));
    }

    #[test]
    fn test_from_dimacs_clauses() {
        let inst = ProblemInstance::from_dimacs_clauses(3, &[vec![1, 2], vec![-1, 3]]).unwrap();
        assert_eq!(inst.num_vars(), 3);
        assert_eq!(inst.num_clauses(), 2);
        assert!(ProblemInstance::from_dimacs_clauses(1, &[vec![2]]).is_err());
    }
}
