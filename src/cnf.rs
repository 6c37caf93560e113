//! Boolean circuit to CNF via the Tseitin transformation
//!
//! Every gate label becomes a CNF variable defined by a handful of clauses;
//! the circuit root is asserted with a unit clause. Gates are encoded at
//! most once, so shared subcircuits cost nothing extra.

use rustc_hash::FxHashSet;

use crate::bool::{BoolFactory, BoolValue, Gate};

/// A CNF formula in DIMACS conventions
///
/// Literals are nonzero integers; a negative literal negates its variable.
#[derive(Debug, Clone, Default)]
pub struct Cnf {
    num_variables: u32,
    clauses: Vec<Vec<i32>>,
}

impl Cnf {
    /// Creates an empty CNF
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a clause, growing the variable count to cover its literals
    pub fn add_clause(&mut self, clause: Vec<i32>) {
        for &lit in &clause {
            let var = lit.unsigned_abs();
            if var > self.num_variables {
                self.num_variables = var;
            }
        }
        self.clauses.push(clause);
    }

    /// Returns the number of variables
    pub fn num_variables(&self) -> u32 {
        self.num_variables
    }

    /// Returns the number of clauses
    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    /// Returns the clauses
    pub fn clauses(&self) -> &[Vec<i32>] {
        &self.clauses
    }
}

/// Translates a circuit rooted at `value` into CNF
///
/// TRUE produces no clauses; FALSE produces the empty clause, which makes
/// the CNF trivially unsatisfiable.
pub fn to_cnf(value: BoolValue, factory: &BoolFactory) -> Cnf {
    let mut translator = CnfTranslator {
        factory,
        cnf: Cnf::new(),
        visited: FxHashSet::default(),
    };

    match value {
        BoolValue::True => {}
        BoolValue::False => translator.cnf.add_clause(vec![]),
        _ => {
            let root = translator.value(value);
            translator.cnf.add_clause(vec![root]);
        }
    }

    translator.cnf
}

struct CnfTranslator<'a> {
    factory: &'a BoolFactory,
    cnf: Cnf,
    visited: FxHashSet<i32>,
}

impl<'a> CnfTranslator<'a> {
    fn value(&mut self, value: BoolValue) -> i32 {
        match value {
            BoolValue::True | BoolValue::False => value.label(),
            BoolValue::Var(_) => value.label(),
            BoolValue::Gate(_) => self.gate(value),
        }
    }

    fn gate(&mut self, value: BoolValue) -> i32 {
        let output = value.label();
        if !self.visited.insert(output) {
            return output;
        }

        match self.factory.gate(value) {
            Gate::And(inputs) => self.and(output, &inputs),
            Gate::Or(inputs) => self.or(output, &inputs),
            Gate::Not(input) => self.not(output, input),
            Gate::Ite(condition, then_val, else_val) => {
                self.ite(output, condition, then_val, else_val)
            }
        }

        output
    }

    /// output <-> a1 and ... and an
    fn and(&mut self, output: i32, inputs: &[BoolValue]) {
        let labels: Vec<i32> = inputs.iter().map(|&v| self.value(v)).collect();

        let mut all_imply: Vec<i32> = labels.iter().map(|&l| -l).collect();
        all_imply.push(output);
        self.cnf.add_clause(all_imply);

        for &input in &labels {
            self.cnf.add_clause(vec![input, -output]);
        }
    }

    /// output <-> a1 or ... or an
    fn or(&mut self, output: i32, inputs: &[BoolValue]) {
        let labels: Vec<i32> = inputs.iter().map(|&v| self.value(v)).collect();

        let mut any_implies = labels.clone();
        any_implies.push(-output);
        self.cnf.add_clause(any_implies);

        for &input in &labels {
            self.cnf.add_clause(vec![-input, output]);
        }
    }

    /// output <-> not input
    fn not(&mut self, output: i32, input: BoolValue) {
        let label = self.value(input);
        self.cnf.add_clause(vec![label, output]);
        self.cnf.add_clause(vec![-label, -output]);
    }

    /// output <-> if condition then then_val else else_val
    fn ite(&mut self, output: i32, condition: BoolValue, then_val: BoolValue, else_val: BoolValue) {
        let cond = self.value(condition);
        let then_label = self.value(then_val);
        let else_label = self.value(else_val);

        self.cnf.add_clause(vec![-cond, -then_label, output]);
        self.cnf.add_clause(vec![-cond, then_label, -output]);
        self.cnf.add_clause(vec![cond, -else_label, output]);
        self.cnf.add_clause(vec![cond, else_label, -output]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn true_yields_no_clauses() {
        let factory = BoolFactory::new(0);
        let cnf = to_cnf(BoolValue::True, &factory);
        assert_eq!(cnf.num_clauses(), 0);
    }

    #[test]
    fn false_yields_the_empty_clause() {
        let factory = BoolFactory::new(0);
        let cnf = to_cnf(BoolValue::False, &factory);
        assert_eq!(cnf.num_clauses(), 1);
        assert!(cnf.clauses()[0].is_empty());
    }

    #[test]
    fn variable_is_asserted() {
        let factory = BoolFactory::new(3);
        let cnf = to_cnf(factory.variable(2), &factory);
        assert_eq!(cnf.clauses(), &[vec![2]]);
        assert_eq!(cnf.num_variables(), 2);
    }

    #[test]
    fn and_gate_encoding() {
        let factory = BoolFactory::new(2);
        let g = factory.and(factory.variable(1), factory.variable(2));
        let cnf = to_cnf(g, &factory);

        // definition (3 clauses) plus the root assertion
        assert_eq!(cnf.num_clauses(), 4);
        assert_eq!(cnf.num_variables(), 3);
        assert!(cnf.clauses().contains(&vec![3]));
        assert!(cnf.clauses().contains(&vec![-1, -2, 3]));
        assert!(cnf.clauses().contains(&vec![1, -3]));
        assert!(cnf.clauses().contains(&vec![2, -3]));
    }

    #[test]
    fn shared_gates_encode_once() {
        let factory = BoolFactory::new(3);
        let shared = factory.and(factory.variable(1), factory.variable(2));
        let root = factory.or(shared, factory.variable(3));
        let cnf = to_cnf(root, &factory);

        // and: 3 clauses, or: 3 clauses, assertion: 1
        assert_eq!(cnf.num_clauses(), 7);
    }

    #[test]
    fn not_gate_encoding() {
        let factory = BoolFactory::new(1);
        let n = factory.not(factory.variable(1));
        let cnf = to_cnf(n, &factory);

        assert_eq!(cnf.num_clauses(), 3);
        assert!(cnf.clauses().contains(&vec![1, 2]));
        assert!(cnf.clauses().contains(&vec![-1, -2]));
        assert!(cnf.clauses().contains(&vec![2]));
    }
}
