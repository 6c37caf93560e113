//! Solving: translation to SAT, model extraction, and enumeration
//!
//! The solver pipeline is translate, break symmetries, CNF, SAT. A
//! satisfying assignment of the primary variables determines the tuples of
//! every relation, so reading a model back is a walk over the variable
//! ranges. Enumeration blocks each model's primary assignment and
//! resolves until the backend reports unsatisfiable.

use std::time::{Duration, Instant};

use crate::ast::Formula;
use crate::cnf::to_cnf;
use crate::error::Result;
use crate::instance::{Bounds, Instance, TupleSet};
use crate::sat::{BatsatSolver, SatSolver};
use crate::symmetry::{self, DEFAULT_PREDICATE_LENGTH};
use crate::translate::{self, LeafInterpreter};

/// Solver options
#[derive(Debug, Clone)]
pub struct Options {
    /// Wall-clock budget; checked between pipeline stages and between
    /// enumerated models, never inside a backend call
    pub timeout_ms: Option<u64>,
    /// Cap on the lex-leader predicate length per atom pair; zero disables
    /// symmetry breaking
    pub symmetry_breaking: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            symmetry_breaking: DEFAULT_PREDICATE_LENGTH,
        }
    }
}

/// Statistics collected while solving
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    translation_time: Duration,
    solving_time: Duration,
    num_primary_variables: u32,
    num_variables: u32,
    num_clauses: usize,
}

impl Statistics {
    /// Returns translation time (circuit plus CNF) in milliseconds
    pub fn translation_time(&self) -> u64 {
        self.translation_time.as_millis() as u64
    }

    /// Returns SAT solving time in milliseconds
    pub fn solving_time(&self) -> u64 {
        self.solving_time.as_millis() as u64
    }

    /// Returns the number of primary (tuple) variables
    pub fn num_primary_variables(&self) -> u32 {
        self.num_primary_variables
    }

    /// Returns the total number of CNF variables
    pub fn num_variables(&self) -> u32 {
        self.num_variables
    }

    /// Returns the number of CNF clauses
    pub fn num_clauses(&self) -> usize {
        self.num_clauses
    }
}

/// The outcome of one solve
#[derive(Debug)]
pub enum Solution {
    /// A satisfying instance was found
    Sat {
        /// The instance
        instance: Instance,
        /// Solving statistics
        stats: Statistics,
    },
    /// No instance exists within the bounds
    Unsat {
        /// Solving statistics
        stats: Statistics,
    },
    /// The formula folded to a constant during translation
    Trivial {
        /// True when the constant was TRUE; the instance is then the
        /// lower bound of every relation
        instance: Option<Instance>,
        /// Solving statistics
        stats: Statistics,
    },
    /// The time budget ran out before the backend answered
    Indeterminate {
        /// Solving statistics
        stats: Statistics,
    },
}

impl Solution {
    /// Returns true for [`Solution::Sat`] or a trivially true formula
    pub fn is_sat(&self) -> bool {
        matches!(
            self,
            Solution::Sat { .. }
                | Solution::Trivial {
                    instance: Some(_),
                    ..
                }
        )
    }

    /// Returns true for [`Solution::Unsat`] or a trivially false formula
    pub fn is_unsat(&self) -> bool {
        matches!(self, Solution::Unsat { .. } | Solution::Trivial { instance: None, .. })
    }

    /// Returns the instance, if there is one
    pub fn instance(&self) -> Option<&Instance> {
        match self {
            Solution::Sat { instance, .. } => Some(instance),
            Solution::Trivial { instance, .. } => instance.as_ref(),
            _ => None,
        }
    }

    /// Returns the statistics
    pub fn statistics(&self) -> &Statistics {
        match self {
            Solution::Sat { stats, .. }
            | Solution::Unsat { stats }
            | Solution::Trivial { stats, .. }
            | Solution::Indeterminate { stats } => stats,
        }
    }
}

/// Translates relational problems to SAT and finds instances
pub struct Solver {
    options: Options,
}

impl Solver {
    /// Creates a solver with the given options
    pub fn new(options: Options) -> Self {
        Self { options }
    }

    /// Creates a solver with default options
    pub fn with_defaults() -> Self {
        Self::new(Options::default())
    }

    /// Returns the options
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Finds one instance of the formula within the bounds
    ///
    /// `symmetry_classes` lists groups of interchangeable atoms; pass an
    /// empty slice when none are known.
    pub fn solve(
        &self,
        formula: &Formula,
        bounds: &Bounds,
        symmetry_classes: &[Vec<usize>],
    ) -> Result<Solution> {
        let mut run = self.prepare(formula, bounds, symmetry_classes)?;
        run.next_solution()
    }

    /// Prepares an enumerator over all instances of the formula
    ///
    /// Each call to [`Solutions::next_solution`] yields a further
    /// instance with distinct relation extents, then [`Solution::Unsat`]
    /// once the space is exhausted.
    pub fn solve_all(
        &self,
        formula: &Formula,
        bounds: &Bounds,
        symmetry_classes: &[Vec<usize>],
    ) -> Result<Solutions> {
        self.prepare(formula, bounds, symmetry_classes)
    }

    fn prepare(
        &self,
        formula: &Formula,
        bounds: &Bounds,
        symmetry_classes: &[Vec<usize>],
    ) -> Result<Solutions> {
        let started = Instant::now();
        let deadline = self.options.timeout_ms.map(Duration::from_millis);

        let (circuit, interpreter) = translate::translate(formula, bounds);

        let circuit = if circuit.is_constant() {
            circuit
        } else {
            let sbp = symmetry::break_predicate(
                symmetry_classes,
                &interpreter,
                self.options.symmetry_breaking,
            );
            interpreter.factory().and(circuit, sbp)
        };

        let mut stats = Statistics {
            num_primary_variables: interpreter.num_primary_vars(),
            ..Statistics::default()
        };

        if let Some(value) = circuit.as_bool() {
            stats.translation_time = started.elapsed();
            let instance = if value {
                Some(lower_bound_instance(bounds, &interpreter)?)
            } else {
                None
            };
            return Ok(Solutions {
                state: State::Trivial { instance },
                bounds: bounds.clone(),
                interpreter,
                stats,
                started,
                deadline,
            });
        }

        let cnf = to_cnf(circuit, interpreter.factory());
        stats.translation_time = started.elapsed();
        stats.num_variables = cnf.num_variables();
        stats.num_clauses = cnf.num_clauses();

        let mut backend = BatsatSolver::default();
        backend.add_cnf(&cnf)?;

        Ok(Solutions {
            state: State::Open { backend },
            bounds: bounds.clone(),
            interpreter,
            stats,
            started,
            deadline,
        })
    }
}

enum State {
    /// The circuit folded to a constant; at most one answer to give
    Trivial { instance: Option<Instance> },
    /// The backend holds the clauses and any blocking clauses added so far
    Open { backend: BatsatSolver },
    /// Enumeration has finished
    Exhausted,
}

/// An enumerator over the instances of one prepared problem
pub struct Solutions {
    state: State,
    bounds: Bounds,
    interpreter: LeafInterpreter,
    stats: Statistics,
    started: Instant,
    deadline: Option<Duration>,
}

impl Solutions {
    /// Returns the next solution
    ///
    /// Yields [`Solution::Sat`] (or one trivial answer) while instances
    /// remain, then [`Solution::Unsat`] from there on.
    pub fn next_solution(&mut self) -> Result<Solution> {
        if let Some(budget) = self.deadline {
            if self.started.elapsed() > budget {
                return Ok(Solution::Indeterminate {
                    stats: self.stats.clone(),
                });
            }
        }

        match std::mem::replace(&mut self.state, State::Exhausted) {
            State::Trivial { instance } => Ok(Solution::Trivial {
                instance,
                stats: self.stats.clone(),
            }),

            State::Exhausted => Ok(Solution::Unsat {
                stats: self.stats.clone(),
            }),

            State::Open { mut backend } => {
                let solving_start = Instant::now();
                let is_sat = backend.solve()?;
                self.stats.solving_time += solving_start.elapsed();
                self.stats.num_clauses = backend.num_clauses();

                if !is_sat {
                    return Ok(Solution::Unsat {
                        stats: self.stats.clone(),
                    });
                }

                let instance = extract_instance(&backend, &self.interpreter, &self.bounds)?;
                self.block_current(&mut backend)?;
                self.state = State::Open { backend };

                Ok(Solution::Sat {
                    instance,
                    stats: self.stats.clone(),
                })
            }
        }
    }

    /// Forbids the current primary assignment
    ///
    /// Primary variables determine relation extents bijectively, so
    /// blocking them yields a new extent or unsatisfiability. With no
    /// primary variables at all the single model is already blocked by
    /// the empty clause.
    fn block_current(&self, backend: &mut BatsatSolver) -> Result<()> {
        let primary = self.interpreter.num_primary_vars();
        let mut clause = Vec::with_capacity(primary as usize);
        for var in 1..=primary {
            let lit = var as i32;
            clause.push(if backend.value_of(var) { -lit } else { lit });
        }
        backend.add_clause(&clause)
    }
}

/// Builds the instance of a trivially true problem: every relation at its
/// lower bound
fn lower_bound_instance(bounds: &Bounds, interpreter: &LeafInterpreter) -> Result<Instance> {
    let mut instance = Instance::new(bounds.universe().clone());
    for relation in bounds.relations() {
        if let Some(lower) = interpreter.lower_bound(relation) {
            instance.add(relation.clone(), lower.clone())?;
        }
    }
    Ok(instance)
}

/// Reads a SAT model back into relation extents
fn extract_instance(
    backend: &impl SatSolver,
    interpreter: &LeafInterpreter,
    bounds: &Bounds,
) -> Result<Instance> {
    let mut instance = Instance::new(bounds.universe().clone());
    let factory = bounds.universe().factory();

    for relation in bounds.relations() {
        let mut tuples = TupleSet::empty(bounds.universe().clone(), relation.arity());

        if let Some(lower) = interpreter.lower_bound(relation) {
            tuples.add_all(lower)?;
        }

        if let Some(range) = interpreter.var_range(relation) {
            let lower = interpreter.lower_bound(relation);
            let upper = interpreter.upper_bound(relation);
            if let (Some(lower), Some(upper)) = (lower, upper) {
                let mut var = range.start;
                for &index in upper.index_view() {
                    if lower.contains_index(index) {
                        continue;
                    }
                    if backend.value_of(var) {
                        let tuple = factory.tuple_from_index(relation.arity(), index)?;
                        tuples.add(tuple)?;
                    }
                    var += 1;
                }
            }
        }

        instance.add(relation.clone(), tuples)?;
    }

    Ok(instance)
}
