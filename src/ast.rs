//! AST types for relational logic
//!
//! Expressions denote relations (sets of tuples); formulas denote truth
//! values. Relations and variables use identity equality: two `Relation`
//! values are equal iff they originate from the same declaration.

use std::fmt;
use std::sync::Arc;

/// A relation - a named leaf expression with a fixed arity
///
/// Two relations are equal if and only if they are the same object.
#[derive(Clone)]
pub struct Relation {
    inner: Arc<RelationInner>,
}

struct RelationInner {
    name: String,
    arity: usize,
}

impl Relation {
    /// Creates a new relation with the given name and arity
    ///
    /// # Panics
    /// Panics if arity < 1
    pub fn nary(name: impl Into<String>, arity: usize) -> Self {
        assert!(arity >= 1, "arity must be at least 1, got {}", arity);
        Self {
            inner: Arc::new(RelationInner {
                name: name.into(),
                arity,
            }),
        }
    }

    /// Creates a new unary relation
    pub fn unary(name: impl Into<String>) -> Self {
        Self::nary(name, 1)
    }

    /// Creates a new binary relation
    pub fn binary(name: impl Into<String>) -> Self {
        Self::nary(name, 2)
    }

    /// Returns the name of this relation
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the arity of this relation
    pub fn arity(&self) -> usize {
        self.inner.arity
    }
}

impl PartialEq for Relation {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Relation {}

impl std::hash::Hash for Relation {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.inner).hash(state);
    }
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Relation({}/{})", self.name(), self.arity())
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A variable bound by a quantifier
///
/// Variables have identity equality like relations.
#[derive(Clone)]
pub struct Variable {
    inner: Arc<VariableInner>,
}

struct VariableInner {
    name: String,
}

impl Variable {
    /// Creates a new unary variable
    pub fn unary(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(VariableInner { name: name.into() }),
        }
    }

    /// Returns the name of this variable
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the arity of this variable (always 1; quantifiers bind atoms)
    pub fn arity(&self) -> usize {
        1
    }

    /// Binds this variable to a domain expression for use in a quantifier
    pub fn one_of(self, domain: Expression) -> Decl {
        Decl::new(self, domain)
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Variable {}

impl std::hash::Hash for Variable {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.inner).hash(state);
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Variable({})", self.name())
    }
}

/// Operators for binary expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// Relational composition (`.`)
    Join,
    /// Cartesian product (`->`)
    Product,
    /// Set union (`+`)
    Union,
    /// Set difference (`-`)
    Difference,
    /// Set intersection (`&`)
    Intersection,
}

/// Operators for unary expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Transpose of a binary relation (`~`)
    Transpose,
    /// Transitive closure (`^`)
    Closure,
    /// Reflexive transitive closure (`*`)
    ReflexiveClosure,
}

/// Constant expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstantExpr {
    /// All atoms in the universe
    Univ,
    /// Identity relation over the universe
    Iden,
    /// The empty unary relation
    None,
}

/// A relational expression
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    /// A relation (leaf)
    Relation(Relation),
    /// A quantified variable (leaf)
    Variable(Variable),
    /// A constant expression
    Constant(ConstantExpr),
    /// Binary expression
    Binary {
        /// Left operand
        left: Box<Expression>,
        /// Operator
        op: BinaryOp,
        /// Right operand
        right: Box<Expression>,
        /// Arity computed at construction
        arity: usize,
    },
    /// Unary expression
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        expr: Box<Expression>,
    },
}

impl Expression {
    /// The universal unary relation
    pub const UNIV: Expression = Expression::Constant(ConstantExpr::Univ);
    /// The identity relation
    pub const IDEN: Expression = Expression::Constant(ConstantExpr::Iden);
    /// The empty unary relation
    pub const NONE: Expression = Expression::Constant(ConstantExpr::None);

    /// Returns the arity of this expression
    pub fn arity(&self) -> usize {
        match self {
            Expression::Relation(r) => r.arity(),
            Expression::Variable(v) => v.arity(),
            Expression::Constant(c) => match c {
                ConstantExpr::Univ | ConstantExpr::None => 1,
                ConstantExpr::Iden => 2,
            },
            Expression::Binary { arity, .. } => *arity,
            Expression::Unary { .. } => 2,
        }
    }

    /// Relational join
    pub fn join(self, other: Expression) -> Expression {
        self.binary(BinaryOp::Join, other)
    }

    /// Cartesian product
    pub fn product(self, other: Expression) -> Expression {
        self.binary(BinaryOp::Product, other)
    }

    /// Set union
    pub fn union(self, other: Expression) -> Expression {
        self.binary(BinaryOp::Union, other)
    }

    /// Set difference
    pub fn difference(self, other: Expression) -> Expression {
        self.binary(BinaryOp::Difference, other)
    }

    /// Set intersection
    pub fn intersection(self, other: Expression) -> Expression {
        self.binary(BinaryOp::Intersection, other)
    }

    /// Transpose
    pub fn transpose(self) -> Expression {
        assert_eq!(self.arity(), 2, "transpose requires arity 2");
        Expression::Unary {
            op: UnaryOp::Transpose,
            expr: Box::new(self),
        }
    }

    /// Transitive closure
    pub fn closure(self) -> Expression {
        assert_eq!(self.arity(), 2, "closure requires arity 2");
        Expression::Unary {
            op: UnaryOp::Closure,
            expr: Box::new(self),
        }
    }

    /// Reflexive transitive closure
    pub fn reflexive_closure(self) -> Expression {
        assert_eq!(self.arity(), 2, "reflexive closure requires arity 2");
        Expression::Unary {
            op: UnaryOp::ReflexiveClosure,
            expr: Box::new(self),
        }
    }

    fn binary(self, op: BinaryOp, other: Expression) -> Expression {
        let arity = match op {
            BinaryOp::Union | BinaryOp::Difference | BinaryOp::Intersection => {
                assert_eq!(
                    self.arity(),
                    other.arity(),
                    "incompatible arities for {:?}: {} and {}",
                    op,
                    self.arity(),
                    other.arity()
                );
                self.arity()
            }
            BinaryOp::Join => {
                let result_arity = self.arity() + other.arity() - 2;
                assert!(
                    result_arity >= 1,
                    "join would produce arity < 1: {} + {} - 2",
                    self.arity(),
                    other.arity()
                );
                result_arity
            }
            BinaryOp::Product => self.arity() + other.arity(),
        };

        Expression::Binary {
            left: Box::new(self),
            op,
            right: Box::new(other),
            arity,
        }
    }

    /// Subset test: `self in other`
    pub fn in_set(self, other: Expression) -> Formula {
        Formula::Comparison {
            left: Box::new(self),
            op: CompareOp::Subset,
            right: Box::new(other),
        }
    }

    /// Equality test: `self = other`
    pub fn equals(self, other: Expression) -> Formula {
        Formula::Comparison {
            left: Box::new(self),
            op: CompareOp::Equals,
            right: Box::new(other),
        }
    }

    /// Multiplicity test: at least one tuple
    pub fn some(self) -> Formula {
        Formula::Multiplicity {
            mult: Multiplicity::Some,
            expr: Box::new(self),
        }
    }

    /// Multiplicity test: no tuples
    pub fn no(self) -> Formula {
        Formula::Multiplicity {
            mult: Multiplicity::No,
            expr: Box::new(self),
        }
    }

    /// Multiplicity test: exactly one tuple
    pub fn one(self) -> Formula {
        Formula::Multiplicity {
            mult: Multiplicity::One,
            expr: Box::new(self),
        }
    }

    /// Multiplicity test: at most one tuple
    pub fn lone(self) -> Formula {
        Formula::Multiplicity {
            mult: Multiplicity::Lone,
            expr: Box::new(self),
        }
    }
}

impl From<Relation> for Expression {
    fn from(r: Relation) -> Self {
        Expression::Relation(r)
    }
}

impl From<&Relation> for Expression {
    fn from(r: &Relation) -> Self {
        Expression::Relation(r.clone())
    }
}

impl From<Variable> for Expression {
    fn from(v: Variable) -> Self {
        Expression::Variable(v)
    }
}

impl From<&Variable> for Expression {
    fn from(v: &Variable) -> Self {
        Expression::Variable(v.clone())
    }
}

/// Operators for binary formulas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryFormulaOp {
    /// Logical conjunction
    And,
    /// Logical disjunction
    Or,
    /// Material implication
    Implies,
    /// Biconditional
    Iff,
}

/// Comparison operators for expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// Set equality
    Equals,
    /// Subset
    Subset,
}

/// Multiplicity operators over expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Multiplicity {
    /// At least one tuple
    Some,
    /// No tuples
    No,
    /// Exactly one tuple
    One,
    /// At most one tuple
    Lone,
}

/// Quantifiers over finite domains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantifier {
    /// Universal
    All,
    /// Existential
    Some,
}

/// A variable bound to a domain expression
#[derive(Clone, Debug, PartialEq)]
pub struct Decl {
    variable: Variable,
    expression: Expression,
}

impl Decl {
    /// Creates a declaration binding `variable` to one atom of `domain`
    ///
    /// # Panics
    /// Panics if the domain is not unary.
    pub fn new(variable: Variable, domain: Expression) -> Self {
        assert_eq!(domain.arity(), 1, "quantifier domain must be unary");
        Self {
            variable,
            expression: domain,
        }
    }

    /// Returns the declared variable
    pub fn variable(&self) -> &Variable {
        &self.variable
    }

    /// Returns the domain expression
    pub fn expression(&self) -> &Expression {
        &self.expression
    }
}

/// An ordered sequence of declarations
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Decls {
    decls: Vec<Decl>,
}

impl Decls {
    /// Appends another declaration
    pub fn and(mut self, decl: Decl) -> Self {
        self.decls.push(decl);
        self
    }

    /// Returns the number of declarations
    pub fn size(&self) -> usize {
        self.decls.len()
    }

    /// Iterates over the declarations in order
    pub fn iter(&self) -> impl Iterator<Item = &Decl> {
        self.decls.iter()
    }
}

impl From<Decl> for Decls {
    fn from(decl: Decl) -> Self {
        Self { decls: vec![decl] }
    }
}

/// A relational-logic formula
#[derive(Clone, Debug, PartialEq)]
pub enum Formula {
    /// A boolean constant
    Constant(bool),
    /// Negation
    Not(Box<Formula>),
    /// Binary connective
    Binary {
        /// Left operand
        left: Box<Formula>,
        /// Connective
        op: BinaryFormulaOp,
        /// Right operand
        right: Box<Formula>,
    },
    /// N-ary conjunction or disjunction
    Nary {
        /// And or Or
        op: BinaryFormulaOp,
        /// Operands
        formulas: Vec<Formula>,
    },
    /// Comparison between two expressions
    Comparison {
        /// Left expression
        left: Box<Expression>,
        /// Comparison operator
        op: CompareOp,
        /// Right expression
        right: Box<Expression>,
    },
    /// Multiplicity constraint on an expression
    Multiplicity {
        /// Multiplicity operator
        mult: Multiplicity,
        /// Constrained expression
        expr: Box<Expression>,
    },
    /// Quantified formula
    Quantified {
        /// Quantifier
        quantifier: Quantifier,
        /// Bound variables with domains
        declarations: Decls,
        /// Body
        body: Box<Formula>,
    },
}

impl Formula {
    /// The trivially true formula
    pub const TRUE: Formula = Formula::Constant(true);
    /// The trivially false formula
    pub const FALSE: Formula = Formula::Constant(false);

    /// Conjunction
    pub fn and(self, other: Formula) -> Formula {
        Formula::Binary {
            left: Box::new(self),
            op: BinaryFormulaOp::And,
            right: Box::new(other),
        }
    }

    /// Disjunction
    pub fn or(self, other: Formula) -> Formula {
        Formula::Binary {
            left: Box::new(self),
            op: BinaryFormulaOp::Or,
            right: Box::new(other),
        }
    }

    /// Implication
    pub fn implies(self, other: Formula) -> Formula {
        Formula::Binary {
            left: Box::new(self),
            op: BinaryFormulaOp::Implies,
            right: Box::new(other),
        }
    }

    /// Biconditional
    pub fn iff(self, other: Formula) -> Formula {
        Formula::Binary {
            left: Box::new(self),
            op: BinaryFormulaOp::Iff,
            right: Box::new(other),
        }
    }

    /// Negation
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Formula {
        Formula::Not(Box::new(self))
    }

    /// Conjunction of an arbitrary number of formulas
    pub fn and_all(formulas: Vec<Formula>) -> Formula {
        match formulas.len() {
            0 => Formula::TRUE,
            1 => formulas.into_iter().next().unwrap(),
            _ => Formula::Nary {
                op: BinaryFormulaOp::And,
                formulas,
            },
        }
    }

    /// Universal quantification
    pub fn forall(declarations: Decls, body: Formula) -> Formula {
        Formula::Quantified {
            quantifier: Quantifier::All,
            declarations,
            body: Box::new(body),
        }
    }

    /// Existential quantification
    pub fn exists(declarations: Decls, body: Formula) -> Formula {
        Formula::Quantified {
            quantifier: Quantifier::Some,
            declarations,
            body: Box::new(body),
        }
    }
}
