//! Boolean circuit representation
//!
//! The boolean layer is the intermediate representation between relational
//! formulas and CNF. Values carry integer labels: TRUE is 0, FALSE is -1,
//! variables are 1..=n, and gate labels continue after the variables. Gate
//! nodes live in an id-indexed table inside [`BoolFactory`]; a
//! [`BoolValue::Gate`] is just the label, so values stay `Copy`.
//!
//! Relations translate to [`BoolMatrix`] values: one cell per tuple of the
//! relation's tuple space, stored sparsely (absent means FALSE) and iterated
//! in ascending index order so circuit construction is deterministic.

pub mod factory;

pub use factory::BoolFactory;

use std::collections::BTreeMap;

/// A boolean value: a constant, a variable, or a reference to a gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolValue {
    /// The TRUE constant, label 0
    True,
    /// The FALSE constant, label -1
    False,
    /// A variable; labels are 1..=num_vars
    Var(u32),
    /// A gate stored in the factory; labels follow the variables
    Gate(u32),
}

impl BoolValue {
    /// Returns the label of this value
    pub fn label(&self) -> i32 {
        match self {
            BoolValue::True => 0,
            BoolValue::False => -1,
            BoolValue::Var(l) | BoolValue::Gate(l) => *l as i32,
        }
    }

    /// Returns true if this is TRUE or FALSE
    pub fn is_constant(&self) -> bool {
        matches!(self, BoolValue::True | BoolValue::False)
    }

    /// Returns the constant's truth value, if this is a constant
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            BoolValue::True => Some(true),
            BoolValue::False => Some(false),
            _ => None,
        }
    }
}

/// A gate node in the factory's table
///
/// Inputs are never constants; the factory folds those away at
/// construction time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Gate {
    /// Multi-input conjunction
    And(Vec<BoolValue>),
    /// Multi-input disjunction
    Or(Vec<BoolValue>),
    /// Negation
    Not(BoolValue),
    /// If-then-else
    Ite(BoolValue, BoolValue, BoolValue),
}

/// Dimensions of a boolean matrix: a tuple space of `base^arity` cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    base: usize,
    arity: usize,
}

impl Dimensions {
    /// Creates dimensions for relations of the given arity over a universe
    /// of `base` atoms
    pub fn new(base: usize, arity: usize) -> Self {
        assert!(arity >= 1, "arity must be at least 1");
        Self { base, arity }
    }

    /// Returns the universe size
    pub fn base(&self) -> usize {
        self.base
    }

    /// Returns the arity
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Returns the number of cells, `base^arity`
    pub fn capacity(&self) -> usize {
        self.base.pow(self.arity as u32)
    }
}

/// A sparse matrix of boolean values encoding one relational expression
///
/// Cell index i holds the truth value of the i-th tuple (row-major) of the
/// expression's tuple space. Absent cells are FALSE.
#[derive(Debug, Clone)]
pub struct BoolMatrix {
    dims: Dimensions,
    cells: BTreeMap<usize, BoolValue>,
}

impl BoolMatrix {
    /// Creates an all-FALSE matrix
    pub fn empty(dims: Dimensions) -> Self {
        Self {
            dims,
            cells: BTreeMap::new(),
        }
    }

    /// Returns the dimensions
    pub fn dimensions(&self) -> Dimensions {
        self.dims
    }

    /// Sets the value of a cell; setting FALSE removes the cell
    pub fn set(&mut self, index: usize, value: BoolValue) {
        debug_assert!(index < self.dims.capacity());
        if value == BoolValue::False {
            self.cells.remove(&index);
        } else {
            self.cells.insert(index, value);
        }
    }

    /// Returns the value of a cell
    pub fn get(&self, index: usize) -> BoolValue {
        self.cells.get(&index).copied().unwrap_or(BoolValue::False)
    }

    /// Iterates over non-FALSE cells in ascending index order
    pub fn iter_indexed(&self) -> impl Iterator<Item = (usize, BoolValue)> + '_ {
        self.cells.iter().map(|(&i, &v)| (i, v))
    }

    /// Returns the number of non-FALSE cells
    pub fn density(&self) -> usize {
        self.cells.len()
    }

    /// Returns the indices of TRUE cells
    ///
    /// Meaningful once all cells are constant, i.e. after evaluation
    /// against an instance.
    pub fn dense_indices(&self) -> Vec<usize> {
        self.cells
            .iter()
            .filter(|(_, &v)| v == BoolValue::True)
            .map(|(&i, _)| i)
            .collect()
    }

    /// Cell-wise OR
    pub fn union(&self, other: &BoolMatrix, factory: &BoolFactory) -> BoolMatrix {
        assert_eq!(self.dims, other.dims);
        let mut result = BoolMatrix::empty(self.dims);
        for (i, v) in self.iter_indexed() {
            result.set(i, factory.or(v, other.get(i)));
        }
        for (i, v) in other.iter_indexed() {
            if !self.cells.contains_key(&i) {
                result.set(i, v);
            }
        }
        result
    }

    /// Cell-wise AND
    pub fn intersection(&self, other: &BoolMatrix, factory: &BoolFactory) -> BoolMatrix {
        assert_eq!(self.dims, other.dims);
        let mut result = BoolMatrix::empty(self.dims);
        for (i, v) in self.iter_indexed() {
            if let Some(&w) = other.cells.get(&i) {
                result.set(i, factory.and(v, w));
            }
        }
        result
    }

    /// Cell-wise AND NOT
    pub fn difference(&self, other: &BoolMatrix, factory: &BoolFactory) -> BoolMatrix {
        assert_eq!(self.dims, other.dims);
        if self.cells.is_empty() || other.cells.is_empty() {
            return self.clone();
        }
        let mut result = BoolMatrix::empty(self.dims);
        for (i, v) in self.iter_indexed() {
            let not_other = factory.not(other.get(i));
            result.set(i, factory.and(v, not_other));
        }
        result
    }

    /// Relational composition
    ///
    /// The shared column of a cell pair (i, j) matches when j falls in the
    /// row of other selected by i's last atom; the result cell is
    /// (i / b) * c + j % c with b the base and c = other.capacity / b.
    pub fn join(&self, other: &BoolMatrix, factory: &BoolFactory) -> BoolMatrix {
        assert_eq!(self.dims.base(), other.dims.base());
        let result_arity = self.dims.arity() + other.dims.arity() - 2;
        assert!(result_arity >= 1, "join would produce arity 0");

        let b = self.dims.base();
        let c = other.dims.capacity() / b;
        let mut result = BoolMatrix::empty(Dimensions::new(b, result_arity));

        if self.cells.is_empty() || other.cells.is_empty() {
            return result;
        }

        for (i, v0) in self.iter_indexed() {
            let row_head = (i % b) * c;
            let row_tail = row_head + c;
            for (&j, &v1) in other.cells.range(row_head..row_tail) {
                let product = factory.and(v0, v1);
                if product != BoolValue::False {
                    let k = (i / b) * c + j % c;
                    let accumulated = factory.or(result.get(k), product);
                    result.set(k, accumulated);
                }
            }
        }

        result
    }

    /// Cartesian product
    pub fn product(&self, other: &BoolMatrix, factory: &BoolFactory) -> BoolMatrix {
        assert_eq!(self.dims.base(), other.dims.base());
        let dims = Dimensions::new(self.dims.base(), self.dims.arity() + other.dims.arity());
        let mut result = BoolMatrix::empty(dims);

        let other_cap = other.dims.capacity();
        for (i, v0) in self.iter_indexed() {
            let offset = i * other_cap;
            for (j, v1) in other.iter_indexed() {
                result.set(offset + j, factory.and(v0, v1));
            }
        }
        result
    }

    /// Transpose of a binary matrix
    pub fn transpose(&self) -> BoolMatrix {
        assert_eq!(self.dims.arity(), 2, "transpose requires arity 2");
        let u = self.dims.base();
        let mut result = BoolMatrix::empty(self.dims);
        for (i, v) in self.iter_indexed() {
            result.set((i % u) * u + i / u, v);
        }
        result
    }

    /// Transitive closure of a binary matrix by iterative squaring
    ///
    /// Squaring log2(base) times covers every path length up to base,
    /// which is exact on a finite universe.
    pub fn closure(&self, factory: &BoolFactory) -> BoolMatrix {
        assert_eq!(self.dims.arity(), 2, "closure requires arity 2");
        if self.cells.is_empty() {
            return self.clone();
        }

        let mut ret = self.clone();
        let mut i = 1;
        while i < self.dims.base() {
            let squared = ret.join(&ret, factory);
            ret = ret.union(&squared, factory);
            i *= 2;
        }
        ret
    }

    /// Reflexive transitive closure: identity united with the closure
    pub fn reflexive_closure(&self, iden: &BoolMatrix, factory: &BoolFactory) -> BoolMatrix {
        self.closure(factory).union(iden, factory)
    }

    /// True when every cell of this matrix implies the matching cell of
    /// the other
    pub fn subset(&self, other: &BoolMatrix, factory: &BoolFactory) -> BoolValue {
        assert_eq!(self.dims, other.dims);
        let mut implications = Vec::new();
        for (i, v) in self.iter_indexed() {
            let implication = factory.implies(v, other.get(i));
            implications.push(implication);
        }
        factory.and_all(implications)
    }

    /// True when both matrices hold the same tuples
    pub fn equals(&self, other: &BoolMatrix, factory: &BoolFactory) -> BoolValue {
        let forward = self.subset(other, factory);
        let backward = other.subset(self, factory);
        factory.and(forward, backward)
    }

    /// True when at least one cell is true
    pub fn some(&self, factory: &BoolFactory) -> BoolValue {
        factory.or_all(self.cells.values().copied().collect())
    }

    /// True when no cell is true
    pub fn none(&self, factory: &BoolFactory) -> BoolValue {
        let some = self.some(factory);
        factory.not(some)
    }

    /// True when exactly one cell is true
    ///
    /// Builds a partial-OR chain: each cell excludes all earlier ones, and
    /// the full disjunction must hold.
    pub fn one(&self, factory: &BoolFactory) -> BoolValue {
        if self.cells.is_empty() {
            return BoolValue::False;
        }
        let mut constraints = self.exclusion_chain(factory);
        let some = self.some(factory);
        constraints.push(some);
        factory.and_all(constraints)
    }

    /// True when at most one cell is true
    pub fn lone(&self, factory: &BoolFactory) -> BoolValue {
        let constraints = self.exclusion_chain(factory);
        factory.and_all(constraints)
    }

    /// For each cell, the constraint that it is false or all earlier cells
    /// are false
    fn exclusion_chain(&self, factory: &BoolFactory) -> Vec<BoolValue> {
        let mut constraints = Vec::new();
        let mut partial = BoolValue::False;
        for (_, v) in self.iter_indexed() {
            let not_v = factory.not(v);
            let not_partial = factory.not(partial);
            constraints.push(factory.or(not_v, not_partial));
            partial = factory.or(partial, v);
        }
        constraints
    }
}
