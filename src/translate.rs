//! Relational formula to boolean circuit translation
//!
//! Leaf expressions become boolean matrices: lower-bound tuples are TRUE,
//! uncertain tuples (upper minus lower) get one fresh variable each, and
//! everything else is FALSE. Operators become matrix algebra, comparisons
//! and multiplicities collapse matrices to single values, and quantifiers
//! unroll over the finite tuples of their domain.

use rustc_hash::FxHashMap;
use std::ops::Range;

use crate::ast::{
    BinaryFormulaOp, BinaryOp, CompareOp, ConstantExpr, Decls, Expression, Formula, Multiplicity,
    Quantifier, Relation, UnaryOp, Variable,
};
use crate::bool::{BoolFactory, BoolMatrix, BoolValue, Dimensions};
use crate::instance::{Bounds, Instance, TupleSet, Universe};

/// Interprets leaf expressions as boolean matrices
///
/// Owns the circuit factory and the variable ranges allocated per relation.
/// The ranges double as the recipe for reading a SAT model back into an
/// instance.
pub struct LeafInterpreter {
    factory: BoolFactory,
    universe: Universe,
    relations: Vec<Relation>,
    var_ranges: FxHashMap<Relation, Range<u32>>,
    lower_bounds: FxHashMap<Relation, TupleSet>,
    upper_bounds: FxHashMap<Relation, TupleSet>,
}

impl LeafInterpreter {
    /// Creates an interpreter from bounds, allocating one variable per
    /// uncertain tuple
    ///
    /// Variables are handed out in the order relations were bound, and
    /// within a relation in ascending tuple index order.
    pub fn from_bounds(bounds: &Bounds) -> Self {
        let mut next_var: u32 = 1;
        let mut relations = Vec::new();
        let mut var_ranges = FxHashMap::default();
        let mut lower_bounds = FxHashMap::default();
        let mut upper_bounds = FxHashMap::default();

        for relation in bounds.relations() {
            let lower = bounds
                .lower_bound(relation)
                .expect("bound relation has a lower bound");
            let upper = bounds
                .upper_bound(relation)
                .expect("bound relation has an upper bound");

            let uncertain = upper.size() - lower.size();
            if uncertain > 0 {
                let range = next_var..next_var + uncertain as u32;
                next_var = range.end;
                var_ranges.insert(relation.clone(), range);
            }

            relations.push(relation.clone());
            lower_bounds.insert(relation.clone(), lower.clone());
            upper_bounds.insert(relation.clone(), upper.clone());
        }

        Self {
            factory: BoolFactory::new(next_var - 1),
            universe: bounds.universe().clone(),
            relations,
            var_ranges,
            lower_bounds,
            upper_bounds,
        }
    }

    /// Creates an exact interpreter from an instance
    ///
    /// Every relation is bound exactly to its instance tuples, so leaves
    /// are constant matrices and any translated formula folds to TRUE or
    /// FALSE.
    pub fn from_instance(instance: &Instance) -> Self {
        let mut relations = Vec::new();
        let mut lower_bounds = FxHashMap::default();
        let mut upper_bounds = FxHashMap::default();
        for relation in instance.relations() {
            let tuples = instance
                .tuples(relation)
                .expect("listed relation has tuples")
                .clone();
            relations.push(relation.clone());
            lower_bounds.insert(relation.clone(), tuples.clone());
            upper_bounds.insert(relation.clone(), tuples);
        }

        Self {
            factory: BoolFactory::new(0),
            universe: instance.universe().clone(),
            relations,
            var_ranges: FxHashMap::default(),
            lower_bounds,
            upper_bounds,
        }
    }

    /// Returns the circuit factory
    pub fn factory(&self) -> &BoolFactory {
        &self.factory
    }

    /// Returns the universe
    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    /// Returns the number of primary variables
    ///
    /// Primary variables encode tuple membership; Tseitin variables added
    /// later by CNF translation are not primary.
    pub fn num_primary_vars(&self) -> u32 {
        self.factory.num_vars()
    }

    /// Returns the interpreted relations, in bound order
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Returns the variable range of a relation, if it has uncertain tuples
    pub fn var_range(&self, relation: &Relation) -> Option<&Range<u32>> {
        self.var_ranges.get(relation)
    }

    /// Returns the lower bound of a relation
    pub fn lower_bound(&self, relation: &Relation) -> Option<&TupleSet> {
        self.lower_bounds.get(relation)
    }

    /// Returns the upper bound of a relation
    pub fn upper_bound(&self, relation: &Relation) -> Option<&TupleSet> {
        self.upper_bounds.get(relation)
    }

    /// Interprets a relation as a matrix over its bounds
    pub fn interpret_relation(&self, relation: &Relation) -> BoolMatrix {
        let lower = self
            .lower_bounds
            .get(relation)
            .expect("relation is bound before translation");
        let upper = self
            .upper_bounds
            .get(relation)
            .expect("relation is bound before translation");

        let dims = Dimensions::new(self.universe.size(), relation.arity());
        let mut matrix = BoolMatrix::empty(dims);

        let mut next = self.var_ranges.get(relation).map(|r| r.start);
        for &index in upper.index_view() {
            if lower.contains_index(index) {
                matrix.set(index, BoolValue::True);
            } else if let Some(var) = next.as_mut() {
                matrix.set(index, self.factory.variable(*var));
                *var += 1;
            }
        }

        matrix
    }

    /// Interprets `univ`, `iden`, or `none`
    pub fn interpret_constant(&self, c: ConstantExpr) -> BoolMatrix {
        let size = self.universe.size();
        match c {
            ConstantExpr::Univ => {
                let mut matrix = BoolMatrix::empty(Dimensions::new(size, 1));
                for i in 0..size {
                    matrix.set(i, BoolValue::True);
                }
                matrix
            }
            ConstantExpr::None => BoolMatrix::empty(Dimensions::new(size, 1)),
            ConstantExpr::Iden => {
                let mut matrix = BoolMatrix::empty(Dimensions::new(size, 2));
                for i in 0..size {
                    matrix.set(i * size + i, BoolValue::True);
                }
                matrix
            }
        }
    }
}

/// Translates a formula over bounds into a single boolean value
///
/// Returns the circuit root and the interpreter used to build it; the
/// interpreter is what maps a SAT model back to relation extents.
pub fn translate(formula: &Formula, bounds: &Bounds) -> (BoolValue, LeafInterpreter) {
    let interpreter = LeafInterpreter::from_bounds(bounds);
    let circuit = translate_with(&interpreter, formula);
    (circuit, interpreter)
}

/// Translates a formula against an existing interpreter
pub fn translate_with(interpreter: &LeafInterpreter, formula: &Formula) -> BoolValue {
    let mut translator = CircuitBuilder {
        interpreter,
        env: Vec::new(),
    };
    translator.formula(formula)
}

/// Translates an expression against an existing interpreter
pub fn translate_expression_with(interpreter: &LeafInterpreter, expr: &Expression) -> BoolMatrix {
    let mut translator = CircuitBuilder {
        interpreter,
        env: Vec::new(),
    };
    translator.expression(expr)
}

/// Translator state: the interpreter plus the quantifier binding stack
struct CircuitBuilder<'a> {
    interpreter: &'a LeafInterpreter,
    env: Vec<(Variable, BoolMatrix)>,
}

impl<'a> CircuitBuilder<'a> {
    fn formula(&mut self, formula: &Formula) -> BoolValue {
        let factory = self.interpreter.factory();
        match formula {
            Formula::Constant(b) => factory.constant(*b),

            Formula::Not(inner) => {
                let value = self.formula(inner);
                factory.not(value)
            }

            Formula::Binary { left, op, right } => {
                let l = self.formula(left);
                let r = self.formula(right);
                match op {
                    BinaryFormulaOp::And => factory.and(l, r),
                    BinaryFormulaOp::Or => factory.or(l, r),
                    BinaryFormulaOp::Implies => factory.implies(l, r),
                    BinaryFormulaOp::Iff => factory.iff(l, r),
                }
            }

            Formula::Nary { op, formulas } => {
                let translated: Vec<BoolValue> =
                    formulas.iter().map(|f| self.formula(f)).collect();
                match op {
                    BinaryFormulaOp::And => factory.and_all(translated),
                    BinaryFormulaOp::Or => factory.or_all(translated),
                    _ => unreachable!("n-ary formulas are built with and/or only"),
                }
            }

            Formula::Comparison { left, op, right } => {
                let left_matrix = self.expression(left);
                let right_matrix = self.expression(right);
                match op {
                    CompareOp::Equals => left_matrix.equals(&right_matrix, factory),
                    CompareOp::Subset => left_matrix.subset(&right_matrix, factory),
                }
            }

            Formula::Multiplicity { mult, expr } => {
                let matrix = self.expression(expr);
                match mult {
                    Multiplicity::Some => matrix.some(factory),
                    Multiplicity::No => matrix.none(factory),
                    Multiplicity::One => matrix.one(factory),
                    Multiplicity::Lone => matrix.lone(factory),
                }
            }

            Formula::Quantified {
                quantifier,
                declarations,
                body,
            } => match quantifier {
                Quantifier::Some => {
                    let mut acc = Vec::new();
                    self.exists(declarations, body, 0, BoolValue::True, &mut acc);
                    factory.or_all(acc)
                }
                Quantifier::All => {
                    let mut acc = Vec::new();
                    self.forall(declarations, body, 0, BoolValue::False, &mut acc);
                    factory.and_all(acc)
                }
            },
        }
    }

    fn expression(&mut self, expr: &Expression) -> BoolMatrix {
        let factory = self.interpreter.factory();
        match expr {
            Expression::Relation(rel) => self.interpreter.interpret_relation(rel),

            Expression::Variable(var) => self
                .env
                .iter()
                .rev()
                .find(|(v, _)| v == var)
                .map(|(_, m)| m.clone())
                .unwrap_or_else(|| panic!("unbound variable {}", var.name())),

            Expression::Constant(c) => self.interpreter.interpret_constant(*c),

            Expression::Binary {
                left, op, right, ..
            } => {
                let left_matrix = self.expression(left);
                let right_matrix = self.expression(right);
                match op {
                    BinaryOp::Union => left_matrix.union(&right_matrix, factory),
                    BinaryOp::Intersection => left_matrix.intersection(&right_matrix, factory),
                    BinaryOp::Difference => left_matrix.difference(&right_matrix, factory),
                    BinaryOp::Join => left_matrix.join(&right_matrix, factory),
                    BinaryOp::Product => left_matrix.product(&right_matrix, factory),
                }
            }

            Expression::Unary { op, expr } => {
                let matrix = self.expression(expr);
                match op {
                    UnaryOp::Transpose => matrix.transpose(),
                    UnaryOp::Closure => matrix.closure(factory),
                    UnaryOp::ReflexiveClosure => {
                        let iden = self.interpreter.interpret_constant(ConstantExpr::Iden);
                        matrix.reflexive_closure(&iden, factory)
                    }
                }
            }
        }
    }

    /// Unrolls an existential quantifier
    ///
    /// For each domain tuple, the variable is ground to that tuple and the
    /// body translated; the disjunct carries the domain cell's own value
    /// so tuples outside the (possibly symbolic) domain contribute nothing.
    fn exists(
        &mut self,
        decls: &Decls,
        body: &Formula,
        current: usize,
        constraints: BoolValue,
        acc: &mut Vec<BoolValue>,
    ) {
        if current >= decls.size() {
            let body_value = self.formula(body);
            let factory = self.interpreter.factory();
            acc.push(factory.and(constraints, body_value));
            return;
        }

        let decl = decls.iter().nth(current).expect("declaration index in range");
        let var = decl.variable().clone();
        let domain = self.expression(decl.expression());

        let mut ground = BoolMatrix::empty(domain.dimensions());
        self.env.push((var.clone(), ground.clone()));

        let cells: Vec<(usize, BoolValue)> = domain.iter_indexed().collect();
        for (index, value) in cells {
            ground.set(index, BoolValue::True);
            self.rebind(&var, ground.clone());

            let new_constraints = self.interpreter.factory().and(value, constraints);
            self.exists(decls, body, current + 1, new_constraints, acc);

            ground.set(index, BoolValue::False);
        }

        self.env.pop();
    }

    /// Unrolls a universal quantifier
    ///
    /// Dual of [`Self::exists`]: each conjunct is `not domain_cell or
    /// body`, so tuples outside the domain are vacuously satisfied.
    fn forall(
        &mut self,
        decls: &Decls,
        body: &Formula,
        current: usize,
        constraints: BoolValue,
        acc: &mut Vec<BoolValue>,
    ) {
        if current >= decls.size() {
            let body_value = self.formula(body);
            let factory = self.interpreter.factory();
            acc.push(factory.or(constraints, body_value));
            return;
        }

        let decl = decls.iter().nth(current).expect("declaration index in range");
        let var = decl.variable().clone();
        let domain = self.expression(decl.expression());

        let mut ground = BoolMatrix::empty(domain.dimensions());
        self.env.push((var.clone(), ground.clone()));

        let cells: Vec<(usize, BoolValue)> = domain.iter_indexed().collect();
        for (index, value) in cells {
            ground.set(index, BoolValue::True);
            self.rebind(&var, ground.clone());

            let factory = self.interpreter.factory();
            let not_value = factory.not(value);
            let new_constraints = factory.or(not_value, constraints);
            self.forall(decls, body, current + 1, new_constraints, acc);

            ground.set(index, BoolValue::False);
        }

        self.env.pop();
    }

    fn rebind(&mut self, var: &Variable, matrix: BoolMatrix) {
        let slot = self
            .env
            .iter_mut()
            .rev()
            .find(|(v, _)| v == var)
            .expect("variable pushed before grounding");
        slot.1 = matrix;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Decl;
    use crate::error::Result;

    fn family_bounds() -> Result<(Bounds, Relation, Relation)> {
        let universe = Universe::new(&["Adam", "Eve", "P0", "P1"])?;
        let factory = universe.factory();
        let mut bounds = Bounds::new(universe.clone());

        let person = Relation::unary("Person");
        let spouse = Relation::binary("spouse");

        bounds.bound_exactly(&person, factory.all(1))?;
        bounds.bound(&spouse, factory.none(2), factory.all(2))?;
        Ok((bounds, person, spouse))
    }

    #[test]
    fn exact_relation_is_constant() -> Result<()> {
        let (bounds, person, _) = family_bounds()?;
        let interpreter = LeafInterpreter::from_bounds(&bounds);
        let matrix = interpreter.interpret_relation(&person);
        assert_eq!(matrix.dense_indices(), vec![0, 1, 2, 3]);
        assert!(interpreter.var_range(&person).is_none());
        Ok(())
    }

    #[test]
    fn uncertain_tuples_get_variables() -> Result<()> {
        let (bounds, _, spouse) = family_bounds()?;
        let interpreter = LeafInterpreter::from_bounds(&bounds);
        assert_eq!(interpreter.num_primary_vars(), 16);

        let matrix = interpreter.interpret_relation(&spouse);
        assert_eq!(matrix.get(0), BoolValue::Var(1));
        assert_eq!(matrix.get(15), BoolValue::Var(16));
        Ok(())
    }

    #[test]
    fn tautology_folds_to_true() -> Result<()> {
        let (bounds, person, _) = family_bounds()?;
        let formula = Expression::from(&person).in_set(Expression::UNIV);
        let (circuit, _) = translate(&formula, &bounds);
        assert_eq!(circuit, BoolValue::True);
        Ok(())
    }

    #[test]
    fn contradiction_folds_to_false() -> Result<()> {
        let (bounds, person, _) = family_bounds()?;
        let formula = Expression::from(&person).no();
        let (circuit, _) = translate(&formula, &bounds);
        assert_eq!(circuit, BoolValue::False);
        Ok(())
    }

    #[test]
    fn satisfiable_formula_stays_symbolic() -> Result<()> {
        let (bounds, _, spouse) = family_bounds()?;
        let formula = Expression::from(&spouse).some();
        let (circuit, _) = translate(&formula, &bounds);
        assert!(!circuit.is_constant());
        Ok(())
    }

    #[test]
    fn forall_over_exact_domain_unrolls() -> Result<()> {
        let (bounds, person, _) = family_bounds()?;
        // all p: Person | p in Person, trivially true
        let p = Variable::unary("p");
        let formula = Formula::forall(
            Decls::from(Decl::new(p.clone(), Expression::from(&person))),
            Expression::from(&p).in_set(Expression::from(&person)),
        );
        let (circuit, _) = translate(&formula, &bounds);
        assert_eq!(circuit, BoolValue::True);
        Ok(())
    }

    #[test]
    fn exists_requires_a_witness() -> Result<()> {
        let (bounds, person, spouse) = family_bounds()?;
        // some p: Person | some p.spouse
        let p = Variable::unary("p");
        let formula = Formula::exists(
            Decls::from(Decl::new(p.clone(), Expression::from(&person))),
            Expression::from(&p).join(Expression::from(&spouse)).some(),
        );
        let (circuit, _) = translate(&formula, &bounds);
        assert!(!circuit.is_constant());
        Ok(())
    }

    #[test]
    fn closure_over_exact_relation_is_exact() -> Result<()> {
        let universe = Universe::new(&["a", "b", "c"])?;
        let factory = universe.factory();
        let mut bounds = Bounds::new(universe.clone());

        let edge = Relation::binary("edge");
        bounds.bound_exactly(&edge, factory.tuple_set(&[&["a", "b"], &["b", "c"]])?)?;

        // a..c reachable, so ^edge = {(a,b),(b,c),(a,c)} and acyclicity holds
        let no_cycle = {
            let v = Variable::unary("x");
            Formula::forall(
                Decls::from(Decl::new(v.clone(), Expression::UNIV)),
                Expression::from(&v)
                    .in_set(
                        Expression::from(&v).join(Expression::from(&edge).closure()),
                    )
                    .not(),
            )
        };
        let (circuit, _) = translate(&no_cycle, &bounds);
        assert_eq!(circuit, BoolValue::True);
        Ok(())
    }
}
