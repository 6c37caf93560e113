//! Boolean circuit factory with gate caching
//!
//! The factory owns the gate table and deduplicates structurally equal
//! gates. Interior mutability keeps gate creation available through `&self`,
//! which is what the matrix operations want.

use rustc_hash::FxHashMap;
use std::cell::RefCell;

use super::{BoolValue, Gate};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheKey {
    And(Vec<i32>),
    Or(Vec<i32>),
    Not(i32),
    Ite(i32, i32, i32),
}

/// Boolean circuit factory
///
/// Variables are fixed at construction; gates are created on demand with
/// constant folding and structural sharing. Gate labels start right after
/// the variable labels, so a label uniquely identifies any non-constant
/// value.
pub struct BoolFactory {
    num_vars: u32,
    gates: RefCell<Vec<Gate>>,
    cache: RefCell<FxHashMap<CacheKey, BoolValue>>,
}

impl BoolFactory {
    /// Creates a factory over variables 1..=num_vars
    pub fn new(num_vars: u32) -> Self {
        Self {
            num_vars,
            gates: RefCell::new(Vec::new()),
            cache: RefCell::new(FxHashMap::default()),
        }
    }

    /// Returns the number of variables
    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }

    /// Returns the number of gates created so far
    pub fn num_gates(&self) -> usize {
        self.gates.borrow().len()
    }

    /// Returns a variable value
    ///
    /// # Panics
    /// Panics if the label is outside 1..=num_vars.
    pub fn variable(&self, label: u32) -> BoolValue {
        assert!(
            label >= 1 && label <= self.num_vars,
            "variable label {} out of range 1..={}",
            label,
            self.num_vars
        );
        BoolValue::Var(label)
    }

    /// Returns a constant value
    pub fn constant(&self, value: bool) -> BoolValue {
        if value {
            BoolValue::True
        } else {
            BoolValue::False
        }
    }

    /// Returns the gate node behind a gate label
    ///
    /// # Panics
    /// Panics if the value is not a gate of this factory.
    pub fn gate(&self, value: BoolValue) -> Gate {
        match value {
            BoolValue::Gate(label) => {
                let index = (label - self.num_vars - 1) as usize;
                self.gates.borrow()[index].clone()
            }
            other => panic!("{:?} is not a gate", other),
        }
    }

    fn intern(&self, key: CacheKey, node: Gate) -> BoolValue {
        if let Some(&cached) = self.cache.borrow().get(&key) {
            return cached;
        }
        let mut gates = self.gates.borrow_mut();
        let label = self.num_vars + 1 + gates.len() as u32;
        gates.push(node);
        let value = BoolValue::Gate(label);
        self.cache.borrow_mut().insert(key, value);
        value
    }

    /// Binary AND
    pub fn and(&self, left: BoolValue, right: BoolValue) -> BoolValue {
        self.and_all(vec![left, right])
    }

    /// Multi-input AND with constant folding
    pub fn and_all(&self, mut inputs: Vec<BoolValue>) -> BoolValue {
        if inputs.contains(&BoolValue::False) {
            return BoolValue::False;
        }
        inputs.retain(|v| *v != BoolValue::True);
        inputs.sort_unstable_by_key(BoolValue::label);
        inputs.dedup();
        match inputs.len() {
            0 => BoolValue::True,
            1 => inputs[0],
            _ => {
                let labels = inputs.iter().map(BoolValue::label).collect();
                self.intern(CacheKey::And(labels), Gate::And(inputs))
            }
        }
    }

    /// Binary OR
    pub fn or(&self, left: BoolValue, right: BoolValue) -> BoolValue {
        self.or_all(vec![left, right])
    }

    /// Multi-input OR with constant folding
    pub fn or_all(&self, mut inputs: Vec<BoolValue>) -> BoolValue {
        if inputs.contains(&BoolValue::True) {
            return BoolValue::True;
        }
        inputs.retain(|v| *v != BoolValue::False);
        inputs.sort_unstable_by_key(BoolValue::label);
        inputs.dedup();
        match inputs.len() {
            0 => BoolValue::False,
            1 => inputs[0],
            _ => {
                let labels = inputs.iter().map(BoolValue::label).collect();
                self.intern(CacheKey::Or(labels), Gate::Or(inputs))
            }
        }
    }

    /// Negation; double negations fold away
    pub fn not(&self, input: BoolValue) -> BoolValue {
        match input {
            BoolValue::True => BoolValue::False,
            BoolValue::False => BoolValue::True,
            BoolValue::Gate(_) => {
                if let Gate::Not(inner) = self.gate(input) {
                    return inner;
                }
                self.intern(CacheKey::Not(input.label()), Gate::Not(input))
            }
            BoolValue::Var(_) => self.intern(CacheKey::Not(input.label()), Gate::Not(input)),
        }
    }

    /// If-then-else
    pub fn ite(&self, condition: BoolValue, then_val: BoolValue, else_val: BoolValue) -> BoolValue {
        match condition {
            BoolValue::True => return then_val,
            BoolValue::False => return else_val,
            _ => {}
        }
        if then_val == else_val {
            return then_val;
        }
        if then_val == BoolValue::True && else_val == BoolValue::False {
            return condition;
        }
        if then_val == BoolValue::True {
            return self.or(condition, else_val);
        }
        if then_val == BoolValue::False {
            let not_condition = self.not(condition);
            return self.and(not_condition, else_val);
        }
        if else_val == BoolValue::True {
            let not_condition = self.not(condition);
            return self.or(not_condition, then_val);
        }
        if else_val == BoolValue::False {
            return self.and(condition, then_val);
        }
        self.intern(
            CacheKey::Ite(condition.label(), then_val.label(), else_val.label()),
            Gate::Ite(condition, then_val, else_val),
        )
    }

    /// Implication: `not a or b`
    pub fn implies(&self, a: BoolValue, b: BoolValue) -> BoolValue {
        let not_a = self.not(a);
        self.or(not_a, b)
    }

    /// Biconditional: `(a and b) or (not a and not b)`
    pub fn iff(&self, a: BoolValue, b: BoolValue) -> BoolValue {
        let both = self.and(a, b);
        let not_a = self.not(a);
        let not_b = self.not(b);
        let neither = self.and(not_a, not_b);
        self.or(both, neither)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_folding() {
        let f = BoolFactory::new(5);
        let v1 = f.variable(1);

        assert_eq!(f.and(BoolValue::True, v1), v1);
        assert_eq!(f.and(BoolValue::False, v1), BoolValue::False);
        assert_eq!(f.or(BoolValue::False, v1), v1);
        assert_eq!(f.or(BoolValue::True, v1), BoolValue::True);
        assert_eq!(f.not(BoolValue::True), BoolValue::False);
        assert_eq!(f.not(BoolValue::False), BoolValue::True);
    }

    #[test]
    fn gate_labels_follow_variables() {
        let f = BoolFactory::new(3);
        let g = f.and(f.variable(1), f.variable(2));
        assert_eq!(g.label(), 4);
        let g2 = f.or(f.variable(2), f.variable(3));
        assert_eq!(g2.label(), 5);
    }

    #[test]
    fn gates_are_shared() {
        let f = BoolFactory::new(3);
        let a = f.and(f.variable(1), f.variable(2));
        let b = f.and(f.variable(2), f.variable(1));
        assert_eq!(a, b);
        assert_eq!(f.num_gates(), 1);
    }

    #[test]
    fn duplicate_inputs_collapse() {
        let f = BoolFactory::new(3);
        let v1 = f.variable(1);
        assert_eq!(f.and(v1, v1), v1);
        assert_eq!(f.or(v1, v1), v1);
    }

    #[test]
    fn double_negation_folds() {
        let f = BoolFactory::new(2);
        let v = f.variable(1);
        let n = f.not(v);
        assert_eq!(f.not(n), v);
    }

    #[test]
    fn ite_folding() {
        let f = BoolFactory::new(4);
        let c = f.variable(1);
        let t = f.variable(2);
        let e = f.variable(3);

        assert_eq!(f.ite(BoolValue::True, t, e), t);
        assert_eq!(f.ite(BoolValue::False, t, e), e);
        assert_eq!(f.ite(c, t, t), t);
        assert_eq!(f.ite(c, BoolValue::True, BoolValue::False), c);
    }

    #[test]
    fn gate_lookup() {
        let f = BoolFactory::new(2);
        let v1 = f.variable(1);
        let v2 = f.variable(2);
        let g = f.and(v1, v2);
        match f.gate(g) {
            Gate::And(inputs) => assert_eq!(inputs, vec![v1, v2]),
            other => panic!("unexpected gate {:?}", other),
        }
    }

    #[test]
    fn implies_and_iff_fold_constants() {
        let f = BoolFactory::new(2);
        let v = f.variable(1);
        assert_eq!(f.implies(BoolValue::False, v), BoolValue::True);
        assert_eq!(f.implies(v, BoolValue::True), BoolValue::True);
        assert_eq!(f.iff(BoolValue::True, v), v);
        assert_eq!(f.iff(BoolValue::False, v), f.not(v));
    }
}
