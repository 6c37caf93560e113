//! Symmetry breaking
//!
//! Atoms inside one signature cell are interchangeable until a formula or a
//! bound tells them apart. For each adjacent atom pair of each class this
//! module emits a lex-leader predicate: the bit string of all relation
//! matrices must not grow lexicographically when the two atoms are swapped.
//! Adding the predicates preserves satisfiability while cutting the
//! permuted duplicates of each model.

use crate::bool::{BoolFactory, BoolValue};
use crate::translate::LeafInterpreter;

/// Default cap on the number of matrix cells compared per atom pair
pub const DEFAULT_PREDICATE_LENGTH: usize = 20;

/// Builds the symmetry breaking predicate for the given atom classes
///
/// Classes come from scope resolution: the direct atoms of every
/// non-singleton signature cell. A `pred_length` of zero disables
/// breaking.
pub fn break_predicate(
    classes: &[Vec<usize>],
    interpreter: &LeafInterpreter,
    pred_length: usize,
) -> BoolValue {
    if classes.is_empty() || pred_length == 0 {
        return BoolValue::True;
    }

    let factory = interpreter.factory();
    let base = interpreter.universe().size();
    let mut predicates = Vec::new();

    for class in classes {
        for pair in class.windows(2) {
            let (prev, cur) = (pair[0], pair[1]);

            let mut original = Vec::new();
            let mut permuted = Vec::new();

            'relations: for relation in interpreter.relations() {
                let matrix = interpreter.interpret_relation(relation);
                let capacity = matrix.dimensions().capacity();
                for index in 0..capacity {
                    if original.len() >= pred_length {
                        break 'relations;
                    }
                    let swapped = permute_index(base, relation.arity(), index, prev, cur);
                    if swapped == index {
                        continue;
                    }
                    original.push(matrix.get(index));
                    permuted.push(matrix.get(swapped));
                }
            }

            if !original.is_empty() {
                predicates.push(lex_leq(factory, &original, &permuted));
            }
        }
    }

    factory.and_all(predicates)
}

/// Applies the transposition (from to) to each digit of a tuple index
fn permute_index(base: usize, arity: usize, index: usize, from: usize, to: usize) -> usize {
    let mut result = 0;
    let mut remaining = index;
    for i in (0..arity).rev() {
        let divisor = base.pow(i as u32);
        let mut atom = remaining / divisor;
        if atom == from {
            atom = to;
        } else if atom == to {
            atom = from;
        }
        result += atom * divisor;
        remaining %= divisor;
    }
    result
}

/// True iff the bit string `l0` is lexicographically at most `l1`
///
/// Position i only constrains the result while all earlier positions
/// agree.
fn lex_leq(factory: &BoolFactory, l0: &[BoolValue], l1: &[BoolValue]) -> BoolValue {
    assert_eq!(l0.len(), l1.len());

    let mut constraints = Vec::with_capacity(l0.len());
    let mut prev_equal = BoolValue::True;

    for (&a, &b) in l0.iter().zip(l1.iter()) {
        let bit_leq = factory.implies(a, b);
        constraints.push(factory.implies(prev_equal, bit_leq));
        let agree = factory.iff(a, b);
        prev_equal = factory.and(prev_equal, agree);
    }

    factory.and_all(constraints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Relation;
    use crate::instance::{Bounds, Universe};

    fn free_unary_bounds() -> (Bounds, Relation) {
        let universe = Universe::new(&["A$0", "A$1", "A$2"]).unwrap();
        let factory = universe.factory();
        let mut bounds = Bounds::new(universe.clone());
        let r = Relation::unary("R");
        bounds.bound(&r, factory.none(1), factory.all(1)).unwrap();
        (bounds, r)
    }

    #[test]
    fn permutation_swaps_digits() {
        // base 3, arity 2: index 5 = (1,2); swapping 1 and 2 gives (2,1) = 7
        assert_eq!(permute_index(3, 2, 5, 1, 2), 7);
        assert_eq!(permute_index(3, 2, 7, 1, 2), 5);
        // fixed points stay put
        assert_eq!(permute_index(3, 2, 0, 1, 2), 0);
        // swapping within one digit
        assert_eq!(permute_index(3, 1, 1, 1, 2), 2);
    }

    #[test]
    fn lex_leq_on_constants() {
        let factory = BoolFactory::new(0);
        let t = BoolValue::True;
        let f = BoolValue::False;

        // 01 <= 10 fails at the first position
        assert_eq!(lex_leq(&factory, &[f, t], &[t, f]), BoolValue::True);
        assert_eq!(lex_leq(&factory, &[t, f], &[f, t]), BoolValue::False);
        assert_eq!(lex_leq(&factory, &[t, t], &[t, t]), BoolValue::True);
    }

    #[test]
    fn no_classes_means_no_predicate() {
        let (bounds, _) = free_unary_bounds();
        let interpreter = LeafInterpreter::from_bounds(&bounds);
        assert_eq!(break_predicate(&[], &interpreter, 20), BoolValue::True);
        assert_eq!(
            break_predicate(&[vec![0, 1, 2]], &interpreter, 0),
            BoolValue::True
        );
    }

    #[test]
    fn interchangeable_atoms_yield_a_predicate() {
        let (bounds, _) = free_unary_bounds();
        let interpreter = LeafInterpreter::from_bounds(&bounds);
        let sbp = break_predicate(&[vec![0, 1, 2]], &interpreter, 20);
        assert!(!sbp.is_constant());
    }

    #[test]
    fn singleton_class_is_vacuous() {
        let (bounds, _) = free_unary_bounds();
        let interpreter = LeafInterpreter::from_bounds(&bounds);
        let sbp = break_predicate(&[vec![2]], &interpreter, 20);
        assert_eq!(sbp, BoolValue::True);
    }
}
