//! End to end execution of a source file's run commands
//!
//! Gathers the pipeline into one call: parse, resolve scopes, compile
//! bounds, lower formulas, and solve. Each `run` command in the source
//! yields one report.

use crate::bounds;
use crate::error::{Result, SigrunError};
use crate::lower::Lowerer;
use crate::model::{Model, RunDecl};
use crate::parse::parse_source;
use crate::scope;
use crate::solver::{Options, Solution, Solutions, Solver};

/// The outcome of one `run` command
#[derive(Debug)]
pub struct RunReport {
    /// Name of the predicate the command ran
    pub pred: String,
    /// The solution
    pub solution: Solution,
}

/// Parses a source file and solves every run command in order
pub fn execute_source(source: &str, options: &Options) -> Result<Vec<RunReport>> {
    let model = parse_source(source)?;
    if model.runs.is_empty() {
        return Err(SigrunError::InvalidArgument(
            "the source contains no run command".to_string(),
        ));
    }

    let mut reports = Vec::with_capacity(model.runs.len());
    for run in &model.runs {
        let solution = execute_run(&model, run, options)?;
        reports.push(RunReport {
            pred: run.pred.clone(),
            solution,
        });
    }
    Ok(reports)
}

/// Solves a single run command of a parsed model
pub fn execute_run(model: &Model, run: &RunDecl, options: &Options) -> Result<Solution> {
    prepare_run(model, run, options)?.next_solution()
}

/// Prepares an enumerator over all instances of a run command
///
/// The enumerator yields instances with pairwise distinct relation
/// extents, then reports unsatisfiable.
pub fn prepare_run(model: &Model, run: &RunDecl, options: &Options) -> Result<Solutions> {
    let resolved = scope::resolve(model, run)?;
    let compiled = bounds::compile(model, &resolved)?;

    let classes = resolved.symmetry_classes().to_vec();
    let (problem_bounds, relations, mut conjuncts) = compiled.into_parts();

    let lowerer = Lowerer::new(model, &relations);
    conjuncts.push(lowerer.lower_run(run)?);
    let formula = crate::ast::Formula::and_all(conjuncts);

    let solver = Solver::new(options.clone());
    solver.solve_all(&formula, &problem_bounds, &classes)
}
