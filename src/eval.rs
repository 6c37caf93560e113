//! Evaluation of formulas and expressions against a concrete instance
//!
//! An instance binds every relation exactly, so translation against it
//! folds each leaf to constants and every formula to TRUE or FALSE. This is
//! how a returned model is checked against the problem it came from.

use crate::ast::{Expression, Formula};
use crate::error::{Result, SigrunError};
use crate::instance::{Instance, TupleSet};
use crate::translate::{translate_expression_with, translate_with, LeafInterpreter};

/// Evaluates formulas and expressions in the context of one instance
pub struct Evaluator {
    interpreter: LeafInterpreter,
}

impl Evaluator {
    /// Creates an evaluator over the given instance
    pub fn new(instance: &Instance) -> Self {
        Self {
            interpreter: LeafInterpreter::from_instance(instance),
        }
    }

    /// Evaluates a formula to a truth value
    ///
    /// # Errors
    /// Returns [`SigrunError::Translation`] if the formula mentions a
    /// relation the instance does not bind.
    pub fn evaluate(&self, formula: &Formula) -> Result<bool> {
        self.check_relations_formula(formula)?;
        let value = translate_with(&self.interpreter, formula);
        value.as_bool().ok_or_else(|| {
            SigrunError::Translation("evaluation did not reduce to a constant".to_string())
        })
    }

    /// Evaluates an expression to the tuple set it denotes
    pub fn evaluate_expression(&self, expr: &Expression) -> Result<TupleSet> {
        self.check_relations_expr(expr)?;
        let matrix = translate_expression_with(&self.interpreter, expr);
        let universe = self.interpreter.universe().clone();
        let mut tuples = TupleSet::empty(universe, matrix.dimensions().arity());
        for index in matrix.dense_indices() {
            tuples.add_index(index);
        }
        Ok(tuples)
    }

    fn check_relations_formula(&self, formula: &Formula) -> Result<()> {
        match formula {
            Formula::Constant(_) => Ok(()),
            Formula::Not(inner) => self.check_relations_formula(inner),
            Formula::Binary { left, right, .. } => {
                self.check_relations_formula(left)?;
                self.check_relations_formula(right)
            }
            Formula::Nary { formulas, .. } => {
                formulas.iter().try_for_each(|f| self.check_relations_formula(f))
            }
            Formula::Comparison { left, right, .. } => {
                self.check_relations_expr(left)?;
                self.check_relations_expr(right)
            }
            Formula::Multiplicity { expr, .. } => self.check_relations_expr(expr),
            Formula::Quantified {
                declarations, body, ..
            } => {
                for decl in declarations.iter() {
                    self.check_relations_expr(decl.expression())?;
                }
                self.check_relations_formula(body)
            }
        }
    }

    fn check_relations_expr(&self, expr: &Expression) -> Result<()> {
        match expr {
            Expression::Relation(r) => {
                if self.interpreter.lower_bound(r).is_none() {
                    return Err(SigrunError::Translation(format!(
                        "relation {} is not bound by the instance",
                        r.name()
                    )));
                }
                Ok(())
            }
            Expression::Variable(_) | Expression::Constant(_) => Ok(()),
            Expression::Binary { left, right, .. } => {
                self.check_relations_expr(left)?;
                self.check_relations_expr(right)
            }
            Expression::Unary { expr, .. } => self.check_relations_expr(expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Decl, Decls, Relation, Variable};
    use crate::instance::Universe;

    fn graph_instance() -> (Instance, Relation, Relation) {
        let universe = Universe::new(&["a", "b", "c"]).unwrap();
        let factory = universe.factory();

        let node = Relation::unary("Node");
        let edge = Relation::binary("edge");

        let mut instance = Instance::new(universe.clone());
        instance.add(node.clone(), factory.all(1)).unwrap();
        instance
            .add(
                edge.clone(),
                factory.tuple_set(&[&["a", "b"], &["b", "c"]]).unwrap(),
            )
            .unwrap();
        (instance, node, edge)
    }

    #[test]
    fn multiplicities_hold_in_the_instance() {
        let (instance, node, edge) = graph_instance();
        let evaluator = Evaluator::new(&instance);

        assert!(evaluator.evaluate(&Expression::from(&node).some()).unwrap());
        assert!(evaluator.evaluate(&Expression::from(&edge).some()).unwrap());
        assert!(!evaluator.evaluate(&Expression::from(&edge).no()).unwrap());
        assert!(!evaluator.evaluate(&Expression::from(&edge).one()).unwrap());
    }

    #[test]
    fn quantified_formulas_evaluate() {
        let (instance, node, edge) = graph_instance();
        let evaluator = Evaluator::new(&instance);

        // all x: Node | lone x.edge
        let x = Variable::unary("x");
        let functional = Formula::forall(
            Decls::from(Decl::new(x.clone(), Expression::from(&node))),
            Expression::from(&x).join(Expression::from(&edge)).lone(),
        );
        assert!(evaluator.evaluate(&functional).unwrap());

        // some x: Node | x in x.edge (a self loop), false here
        let y = Variable::unary("y");
        let self_loop = Formula::exists(
            Decls::from(Decl::new(y.clone(), Expression::from(&node))),
            Expression::from(&y).in_set(Expression::from(&y).join(Expression::from(&edge))),
        );
        assert!(!evaluator.evaluate(&self_loop).unwrap());
    }

    #[test]
    fn expressions_evaluate_to_tuple_sets() {
        let (instance, _, edge) = graph_instance();
        let evaluator = Evaluator::new(&instance);

        let closed = evaluator
            .evaluate_expression(&Expression::from(&edge).closure())
            .unwrap();
        // {(a,b),(b,c),(a,c)}
        assert_eq!(closed.size(), 3);

        let flipped = evaluator
            .evaluate_expression(&Expression::from(&edge).transpose())
            .unwrap();
        assert_eq!(flipped.size(), 2);
    }

    #[test]
    fn unbound_relation_is_reported() {
        let (instance, _, _) = graph_instance();
        let evaluator = Evaluator::new(&instance);

        let ghost = Relation::unary("Ghost");
        let err = evaluator.evaluate(&Expression::from(&ghost).some()).unwrap_err();
        assert!(matches!(err, SigrunError::Translation(_)));
    }
}
