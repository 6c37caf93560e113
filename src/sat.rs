//! SAT backend abstraction
//!
//! [`SatSolver`] is the seam between CNF and a concrete solver, and
//! [`RustSatAdapter`] implements it for any rustsat-compatible solver.
//! The default backend is batsat.

use crate::cnf::Cnf;
use crate::error::{Result, SigrunError};

/// An incremental SAT solver over DIMACS-style literals
pub trait SatSolver {
    /// Adds a clause of literals
    fn add_clause(&mut self, lits: &[i32]) -> Result<()>;

    /// Solves the accumulated clauses; true means satisfiable
    fn solve(&mut self) -> Result<bool>;

    /// Returns the value of a variable in the last satisfying assignment
    fn value_of(&self, var: u32) -> bool;

    /// Returns the number of clauses added
    fn num_clauses(&self) -> usize;

    /// Loads every clause of a CNF
    fn add_cnf(&mut self, cnf: &Cnf) -> Result<()> {
        for clause in cnf.clauses() {
            self.add_clause(clause)?;
        }
        Ok(())
    }
}

/// Wraps a rustsat solver behind [`SatSolver`]
pub struct RustSatAdapter<S> {
    solver: S,
    num_vars: u32,
    num_clauses: usize,
}

/// The default backend
pub type BatsatSolver = RustSatAdapter<rustsat_batsat::BasicSolver>;

impl Default for BatsatSolver {
    fn default() -> Self {
        Self::new(rustsat_batsat::BasicSolver::default())
    }
}

impl<S> RustSatAdapter<S> {
    /// Creates an adapter around the given solver
    pub fn new(solver: S) -> Self {
        Self {
            solver,
            num_vars: 0,
            num_clauses: 0,
        }
    }
}

impl<S: rustsat::solvers::Solve> SatSolver for RustSatAdapter<S> {
    fn add_clause(&mut self, lits: &[i32]) -> Result<()> {
        use rustsat::types::{Clause, Var};

        let mut clause_lits = Vec::with_capacity(lits.len());
        for &lit in lits {
            let var_idx = lit.unsigned_abs() - 1;
            if var_idx > Var::MAX_IDX {
                return Err(SigrunError::Backend(format!(
                    "variable index {} exceeds the backend maximum {}",
                    var_idx,
                    Var::MAX_IDX
                )));
            }
            let var = Var::new(var_idx);
            if var_idx + 1 > self.num_vars {
                self.num_vars = var_idx + 1;
            }
            clause_lits.push(if lit > 0 { var.pos_lit() } else { var.neg_lit() });
        }

        let clause = Clause::from(&clause_lits[..]);
        self.num_clauses += 1;
        self.solver
            .add_clause(clause)
            .map_err(|e| SigrunError::Backend(e.to_string()))
    }

    fn solve(&mut self) -> Result<bool> {
        use rustsat::solvers::SolverResult;
        match self.solver.solve() {
            Ok(SolverResult::Sat) => Ok(true),
            Ok(_) => Ok(false),
            Err(e) => Err(SigrunError::Backend(e.to_string())),
        }
    }

    fn value_of(&self, var: u32) -> bool {
        use rustsat::types::{TernaryVal, Var};
        if var == 0 || var > self.num_vars {
            return false;
        }
        let v = Var::new(var - 1);
        match self.solver.solution(v) {
            Ok(assignment) => matches!(assignment.var_value(v), TernaryVal::True),
            Err(_) => false,
        }
    }

    fn num_clauses(&self) -> usize {
        self.num_clauses
    }
}
