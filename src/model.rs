//! Surface model: the declarations a parsed source file consists of
//!
//! Everything here is plain data straight out of the parser. Names are
//! unresolved strings; the scope resolver and the lowering pass give them
//! meaning (or reject them).

/// Per-field multiplicity keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMult {
    /// Any number of range atoms per domain atom
    Set,
    /// At most one range atom per domain atom
    Lone,
    /// Exactly one range atom per domain atom
    One,
}

/// A field declared inside a `sig` block: `name: mult Range`
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    /// Field name
    pub name: String,
    /// Multiplicity keyword (`set` when omitted)
    pub mult: FieldMult,
    /// Range signature name
    pub range: String,
}

/// A signature declaration
#[derive(Debug, Clone, PartialEq)]
pub struct SigDecl {
    /// Signature name
    pub name: String,
    /// Parent signature, from an `extends` clause
    pub parent: Option<String>,
    /// `abstract sig`
    pub is_abstract: bool,
    /// `one sig`
    pub is_one: bool,
    /// Declared fields
    pub fields: Vec<FieldDecl>,
}

/// Unary operators in surface expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceUnaryOp {
    /// `~e`
    Transpose,
    /// `^e`
    Closure,
    /// `*e`
    ReflexiveClosure,
}

/// Binary operators in surface expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceBinaryOp {
    /// `a.b`
    Join,
    /// `a -> b`
    Product,
    /// `a + b`
    Union,
    /// `a - b`
    Difference,
    /// `a & b`
    Intersection,
}

/// A surface relational expression
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceExpr {
    /// An unresolved name: signature, field, or quantified variable
    Name(String),
    /// The `univ` constant
    Univ,
    /// The `iden` constant
    Iden,
    /// The `none` constant
    None,
    /// Unary operator application
    Unary {
        /// Operator
        op: SurfaceUnaryOp,
        /// Operand
        expr: Box<SurfaceExpr>,
    },
    /// Binary operator application
    Binary {
        /// Operator
        op: SurfaceBinaryOp,
        /// Left operand
        left: Box<SurfaceExpr>,
        /// Right operand
        right: Box<SurfaceExpr>,
    },
}

/// Quantifier keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceQuant {
    /// `all x: e | f`
    All,
    /// `some x: e | f`
    Some,
    /// `no x: e | f`
    No,
    /// `one x: e | f`
    One,
    /// `lone x: e | f`
    Lone,
}

/// Binary boolean connectives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceConnective {
    /// `and` / `&&`
    And,
    /// `or` / `||`
    Or,
    /// `implies` / `=>`
    Implies,
    /// `iff` / `<=>`
    Iff,
}

/// A surface formula
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceFormula {
    /// `a in b` or `a = b`
    Compare {
        /// Left expression
        left: SurfaceExpr,
        /// True for `in`, false for `=`
        subset: bool,
        /// Right expression
        right: SurfaceExpr,
    },
    /// `some e`, `no e`, `one e`, `lone e` applied to an expression
    Mult {
        /// The multiplicity keyword
        mult: SurfaceQuant,
        /// Constrained expression
        expr: SurfaceExpr,
    },
    /// `not f`
    Not(Box<SurfaceFormula>),
    /// Binary connective
    Connective {
        /// Connective
        op: SurfaceConnective,
        /// Left formula
        left: Box<SurfaceFormula>,
        /// Right formula
        right: Box<SurfaceFormula>,
    },
    /// `all x, y: e | f` and the other quantifiers
    Quantified {
        /// Quantifier keyword
        quant: SurfaceQuant,
        /// Bound variable names
        vars: Vec<String>,
        /// Shared domain expression
        domain: SurfaceExpr,
        /// Body
        body: Box<SurfaceFormula>,
    },
    /// `predname[a, b]` invoking a declared predicate
    PredCall {
        /// Predicate name
        name: String,
        /// Argument expressions
        args: Vec<SurfaceExpr>,
    },
}

/// A `fact` block, optionally named
#[derive(Debug, Clone, PartialEq)]
pub struct FactDecl {
    /// Optional fact name
    pub name: Option<String>,
    /// Conjoined body formulas
    pub body: Vec<SurfaceFormula>,
}

/// A `pred` block with parameters
#[derive(Debug, Clone, PartialEq)]
pub struct PredDecl {
    /// Predicate name
    pub name: String,
    /// Parameters as (name, signature) pairs
    pub params: Vec<(String, String)>,
    /// Conjoined body formulas
    pub body: Vec<SurfaceFormula>,
}

/// A `run <pred> for <N> [<Sig>]*` command
#[derive(Debug, Clone, PartialEq)]
pub struct RunDecl {
    /// Name of the predicate to run
    pub pred: String,
    /// Scope applied to every top-level signature not named explicitly
    pub default_scope: Option<usize>,
    /// Per-signature scope overrides, in source order
    pub sig_scopes: Vec<(String, usize)>,
}

/// A complete parsed source file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    /// Signature declarations, in source order
    pub sigs: Vec<SigDecl>,
    /// Fact blocks, in source order
    pub facts: Vec<FactDecl>,
    /// Predicate blocks
    pub preds: Vec<PredDecl>,
    /// Run commands
    pub runs: Vec<RunDecl>,
}

impl Model {
    /// Looks up a signature declaration by name
    pub fn sig(&self, name: &str) -> Option<&SigDecl> {
        self.sigs.iter().find(|s| s.name == name)
    }

    /// Looks up a predicate declaration by name
    pub fn pred(&self, name: &str) -> Option<&PredDecl> {
        self.preds.iter().find(|p| p.name == name)
    }

    /// Iterates over all fields of all signatures as (owner, field) pairs
    pub fn fields(&self) -> impl Iterator<Item = (&SigDecl, &FieldDecl)> {
        self.sigs
            .iter()
            .flat_map(|s| s.fields.iter().map(move |f| (s, f)))
    }
}
