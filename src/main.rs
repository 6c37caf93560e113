//! Command line front end
//!
//! Reads a model file, executes its run commands, and prints any instances
//! found. The exit code distinguishes outcome classes so that scripts can
//! branch on them.

use std::process::ExitCode;

use sigrun::parse::parse_source;
use sigrun::run::{execute_source, prepare_run};
use sigrun::solver::{Options, Solution};
use sigrun::SigrunError;

const USAGE: &str = "\
usage: sigrun [options] <file>

options:
  -a, --all           enumerate every instance of each run command
  -t, --timeout <ms>  give up after the given wall-clock budget
  -s, --sb <n>        symmetry predicate length per atom pair (0 disables)
  -h, --help          print this message

exit codes:
  0  an instance was found for every run command
  1  the file does not parse or fails scope/type checking
  2  at least one run command is unsatisfiable within its scope
  3  a run command timed out before an answer was reached
  4  backend failure, bad usage, or an unreadable file";

struct Args {
    file: String,
    all: bool,
    options: Options,
}

fn parse_args() -> Result<Args, String> {
    let mut file = None;
    let mut all = false;
    let mut options = Options::default();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-a" | "--all" => all = true,
            "-t" | "--timeout" => {
                let value = args.next().ok_or("--timeout requires a value")?;
                let ms: u64 = value
                    .parse()
                    .map_err(|_| format!("invalid timeout {}", value))?;
                options.timeout_ms = Some(ms);
            }
            "-s" | "--sb" => {
                let value = args.next().ok_or("--sb requires a value")?;
                options.symmetry_breaking = value
                    .parse()
                    .map_err(|_| format!("invalid predicate length {}", value))?;
            }
            "-h" | "--help" => return Err(String::new()),
            other if other.starts_with('-') => {
                return Err(format!("unknown option {}", other));
            }
            other => {
                if file.replace(other.to_string()).is_some() {
                    return Err("more than one file given".to_string());
                }
            }
        }
    }

    let file = file.ok_or("no file given")?;
    Ok(Args { file, all, options })
}

fn describe(solution: &Solution) -> &'static str {
    match solution {
        Solution::Sat { .. } => "sat",
        Solution::Unsat { .. } => "unsat",
        Solution::Trivial { instance: Some(_), .. } => "trivially sat",
        Solution::Trivial { instance: None, .. } => "trivially unsat",
        Solution::Indeterminate { .. } => "indeterminate",
    }
}

fn report(pred: &str, solution: &Solution) {
    let stats = solution.statistics();
    println!(
        "run {}: {} ({} primary vars, {} vars, {} clauses, {}ms translate, {}ms solve)",
        pred,
        describe(solution),
        stats.num_primary_variables(),
        stats.num_variables(),
        stats.num_clauses(),
        stats.translation_time(),
        stats.solving_time(),
    );
    if let Some(instance) = solution.instance() {
        print!("{}", instance);
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Outcome {
    AllSat,
    SomeUnsat,
    TimedOut,
}

impl Outcome {
    fn fold(&mut self, solution: &Solution) {
        let step = match solution {
            Solution::Indeterminate { .. } => Outcome::TimedOut,
            s if s.is_sat() => Outcome::AllSat,
            _ => Outcome::SomeUnsat,
        };
        // a timeout anywhere outranks an unsat anywhere outranks all-sat
        if step == Outcome::TimedOut || *self == Outcome::AllSat {
            *self = step;
        }
    }
}

fn solve_once(source: &str, options: &Options) -> Result<Outcome, SigrunError> {
    let mut outcome = Outcome::AllSat;
    for run_report in execute_source(source, options)? {
        report(&run_report.pred, &run_report.solution);
        outcome.fold(&run_report.solution);
    }
    Ok(outcome)
}

fn solve_all(source: &str, options: &Options) -> Result<Outcome, SigrunError> {
    let model = parse_source(source)?;
    if model.runs.is_empty() {
        return Err(SigrunError::InvalidArgument(
            "the source contains no run command".to_string(),
        ));
    }

    let mut outcome = Outcome::AllSat;
    for run in &model.runs {
        let mut solutions = prepare_run(&model, run, options)?;
        let mut count = 0usize;
        loop {
            let solution = solutions.next_solution()?;
            match solution {
                Solution::Sat { .. } | Solution::Trivial { instance: Some(_), .. } => {
                    count += 1;
                    println!("--- instance {} ---", count);
                    report(&run.pred, &solution);
                }
                Solution::Indeterminate { .. } => {
                    report(&run.pred, &solution);
                    outcome.fold(&solution);
                    break;
                }
                _ => break,
            }
        }
        println!("run {}: {} instance(s)", run.pred, count);
        if count == 0 && outcome == Outcome::AllSat {
            outcome = Outcome::SomeUnsat;
        }
    }
    Ok(outcome)
}

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            if message.is_empty() {
                println!("{}", USAGE);
                return ExitCode::SUCCESS;
            }
            eprintln!("error: {}\n\n{}", message, USAGE);
            return ExitCode::from(4);
        }
    };

    let source = match std::fs::read_to_string(&args.file) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error: cannot read {}: {}", args.file, e);
            return ExitCode::from(4);
        }
    };

    let outcome = if args.all {
        solve_all(&source, &args.options)
    } else {
        solve_once(&source, &args.options)
    };

    match outcome {
        Ok(Outcome::AllSat) => ExitCode::SUCCESS,
        Ok(Outcome::SomeUnsat) => ExitCode::from(2),
        Ok(Outcome::TimedOut) => ExitCode::from(3),
        Err(e) => {
            eprintln!("error: {}", e);
            match e {
                SigrunError::Parse { .. }
                | SigrunError::Scope(_)
                | SigrunError::Translation(_) => ExitCode::from(1),
                SigrunError::Backend(_) | SigrunError::InvalidArgument(_) => ExitCode::from(4),
            }
        }
    }
}
