//! # sigrun
//!
//! A bounded relational model finder.
//!
//! sigrun consumes declarative models (signatures organized in a
//! single-inheritance hierarchy, typed relations with multiplicities, `fact`
//! blocks, `pred` blocks, and a bounded `run` command), fixes every signature
//! to a finite universe of atoms, compiles the relational formulas into a
//! boolean constraint problem, and searches for satisfying instances with a
//! SAT backend, or proves that none exists within the given scope.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sigrun::run::execute_source;
//! use sigrun::solver::Options;
//!
//! let source = r#"
//!     sig Person { friend: set Person }
//!     fact { all p: Person | not p in p.friend }
//!     pred show() {}
//!     run show for 3 Person
//! "#;
//!
//! for report in execute_source(source, &Options::default())? {
//!     if let Some(instance) = report.solution.instance() {
//!         println!("{}", instance);
//!     }
//! }
//! ```
//!
//! The pipeline is: parse → scope resolution → bound compilation →
//! formula lowering → boolean translation → symmetry breaking → CNF →
//! SAT → instance extraction, with an enumerator looping blocking clauses
//! back into the solver for additional instances.

#![warn(missing_docs)]

/// Relational-logic AST: expressions, formulas, quantifiers
pub mod ast;

/// Per-relation lower/upper bound compilation from the resolved scope
pub mod bounds;

/// Boolean circuit layer: gates, caching factory, boolean matrices
pub mod bool;

/// Tseitin transformation of boolean circuits into CNF
pub mod cnf;

/// Evaluation of formulas against concrete instances
pub mod eval;

/// Surface formula lowering and type checking
pub mod lower;

/// Universe, tuples, tuple sets, bounds, and instances
pub mod instance;

/// Parsed surface declarations (signatures, facts, preds, runs)
pub mod model;

/// Surface syntax parser
pub mod parse;

/// End-to-end driver: source text in, instances out
pub mod run;

/// SAT backend trait and the default batsat adapter
pub mod sat;

/// Universe and scope resolution for signature hierarchies
pub mod scope;

/// Solve pipeline, solutions, statistics, and enumeration
pub mod solver;

/// Symmetry-breaking predicates over interchangeable atoms
pub mod symmetry;

/// Relational formula to boolean circuit translation
pub mod translate;

/// Error types
pub mod error {
    //! Error taxonomy for sigrun.
    //!
    //! Unsatisfiability and timeouts are *results*, not errors; they are
    //! reported through [`crate::solver::Solution`]. Everything here is
    //! fatal and carries enough context to diagnose without re-running.

    use thiserror::Error;

    /// Errors that can occur while executing a model
    #[derive(Error, Debug)]
    pub enum SigrunError {
        /// Malformed surface syntax
        #[error("parse error at line {line}, column {col}: {message}")]
        Parse {
            /// 1-based line of the first unconsumed input
            line: usize,
            /// 1-based column of the first unconsumed input
            col: usize,
            /// What the parser expected
            message: String,
        },

        /// Contradictory multiplicity/scope requests, detected before any search
        #[error("scope error: {0}")]
        Scope(String),

        /// Arity or type mismatch in a relational expression
        #[error("translation error: {0}")]
        Translation(String),

        /// The SAT backend failed; no partial instance is surfaced
        #[error("backend error: {0}")]
        Backend(String),

        /// API misuse (foreign universe, arity mismatch in tuple plumbing)
        #[error("invalid argument: {0}")]
        InvalidArgument(String),
    }

    /// Result type for sigrun operations
    pub type Result<T> = std::result::Result<T, SigrunError>;
}

pub use error::{Result, SigrunError};
