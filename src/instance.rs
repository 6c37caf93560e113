//! Universe, tuples, tuple sets, bounds, and instances
//!
//! These types define the domain of discourse and the bindings for relations.
//! Tuple sets are backed by sorted index sets so that iteration order is
//! deterministic and independent of how the set was built.

use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::ast::Relation;
use crate::error::{Result, SigrunError};

/// An ordered set of unique atoms
///
/// A universe provides the domain for all tuples and relations in a problem.
/// Atoms are stored in a specific order which is used for indexing.
#[derive(Clone)]
pub struct Universe {
    inner: Arc<UniverseInner>,
}

struct UniverseInner {
    atoms: Vec<String>,
    indices: FxHashMap<String, usize>,
}

impl Universe {
    /// Creates a new universe from a slice of atom names
    ///
    /// # Errors
    /// Returns an error if the slice is empty or contains duplicates
    pub fn new<S: AsRef<str>>(atoms: &[S]) -> Result<Self> {
        if atoms.is_empty() {
            return Err(SigrunError::InvalidArgument(
                "cannot create an empty universe".to_string(),
            ));
        }

        let mut atom_vec = Vec::with_capacity(atoms.len());
        let mut indices = FxHashMap::default();

        for (i, atom) in atoms.iter().enumerate() {
            let atom_string = atom.as_ref().to_string();
            if indices.contains_key(&atom_string) {
                return Err(SigrunError::InvalidArgument(format!(
                    "atom {} appears multiple times",
                    atom_string
                )));
            }
            indices.insert(atom_string.clone(), i);
            atom_vec.push(atom_string);
        }

        Ok(Self {
            inner: Arc::new(UniverseInner {
                atoms: atom_vec,
                indices,
            }),
        })
    }

    /// Returns the number of atoms in this universe
    pub fn size(&self) -> usize {
        self.inner.atoms.len()
    }

    /// Returns the atom at the given index
    pub fn atom(&self, index: usize) -> Option<&str> {
        self.inner.atoms.get(index).map(|s| s.as_str())
    }

    /// Returns the index of the given atom
    pub fn index_of(&self, atom: &str) -> Option<usize> {
        self.inner.indices.get(atom).copied()
    }

    /// Returns true if this universe contains the given atom
    pub fn contains(&self, atom: &str) -> bool {
        self.inner.indices.contains_key(atom)
    }

    /// Returns a factory for creating tuples from this universe
    pub fn factory(&self) -> TupleFactory {
        TupleFactory {
            universe: self.clone(),
        }
    }
}

impl PartialEq for Universe {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Universe {}

impl fmt::Debug for Universe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Universe({:?})", self.inner.atoms)
    }
}

/// A tuple of atoms from a universe
///
/// Tuples are identified by their row-major index in the n-dimensional
/// tuple space: index = sum over positions of atom_index * size^(arity-1-pos).
#[derive(Clone, Debug)]
pub struct Tuple {
    universe: Universe,
    atom_indices: Vec<usize>,
    index: usize,
}

impl Tuple {
    /// Returns the universe this tuple belongs to
    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    /// Returns the arity (number of atoms) in this tuple
    pub fn arity(&self) -> usize {
        self.atom_indices.len()
    }

    /// Returns the index of this tuple in n-dimensional space
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the atom at the given position
    pub fn atom(&self, i: usize) -> Option<&str> {
        self.atom_indices
            .get(i)
            .and_then(|&idx| self.universe.atom(idx))
    }

    /// Returns the index of the atom at position i
    pub fn atom_index(&self, i: usize) -> Option<usize> {
        self.atom_indices.get(i).copied()
    }

    /// Returns an iterator over the atoms in this tuple
    pub fn atoms(&self) -> impl Iterator<Item = &str> + '_ {
        (0..self.arity()).filter_map(move |i| self.atom(i))
    }
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.universe == other.universe
            && self.arity() == other.arity()
            && self.index == other.index
    }
}

impl Eq for Tuple {}

impl Hash for Tuple {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.arity().hash(state);
        self.index.hash(state);
        Arc::as_ptr(&self.universe.inner).hash(state);
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, atom) in self.atoms().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", atom)?;
        }
        write!(f, ")")
    }
}

/// A set of tuples all of the same arity from the same universe
///
/// Backed by a sorted set of tuple indices. Iteration is always in
/// ascending index order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TupleSet {
    universe: Universe,
    arity: usize,
    indices: BTreeSet<usize>,
}

impl TupleSet {
    /// Creates an empty tuple set with the given arity
    pub fn empty(universe: Universe, arity: usize) -> Self {
        Self {
            universe,
            arity,
            indices: BTreeSet::new(),
        }
    }

    /// Returns the universe this tuple set belongs to
    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    /// Returns the arity of tuples in this set
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Returns the number of tuples in this set
    pub fn size(&self) -> usize {
        self.indices.len()
    }

    /// Returns true if this set is empty
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Returns true if this set contains the tuple with the given index
    pub fn contains_index(&self, index: usize) -> bool {
        self.indices.contains(&index)
    }

    /// Returns true if this set contains the given tuple
    pub fn contains(&self, tuple: &Tuple) -> bool {
        tuple.universe() == &self.universe
            && tuple.arity() == self.arity
            && self.indices.contains(&tuple.index())
    }

    /// Adds a tuple to this set
    pub fn add(&mut self, tuple: Tuple) -> Result<()> {
        if tuple.universe() != &self.universe {
            return Err(SigrunError::InvalidArgument(
                "tuple from different universe".to_string(),
            ));
        }
        if tuple.arity() != self.arity {
            return Err(SigrunError::InvalidArgument(format!(
                "expected arity {}, got {}",
                self.arity,
                tuple.arity()
            )));
        }
        self.indices.insert(tuple.index());
        Ok(())
    }

    /// Adds the tuple with the given index
    pub fn add_index(&mut self, index: usize) {
        self.indices.insert(index);
    }

    /// Adds all tuples from another set to this set
    pub fn add_all(&mut self, other: &TupleSet) -> Result<()> {
        if other.universe() != &self.universe {
            return Err(SigrunError::InvalidArgument(
                "tuple sets from different universes".to_string(),
            ));
        }
        if other.arity() != self.arity {
            return Err(SigrunError::InvalidArgument(format!(
                "expected arity {}, got {}",
                self.arity,
                other.arity()
            )));
        }
        self.indices.extend(other.indices.iter().copied());
        Ok(())
    }

    /// Returns an iterator over the tuples in this set, in index order
    pub fn iter(&self) -> impl Iterator<Item = Tuple> + '_ {
        let factory = self.universe.factory();
        let arity = self.arity;
        self.indices
            .iter()
            .filter_map(move |&i| factory.tuple_from_index(arity, i).ok())
    }

    /// Returns the sorted tuple indices of this set
    pub fn index_view(&self) -> &BTreeSet<usize> {
        &self.indices
    }

    /// Returns true if every tuple of this set is in `other`
    pub fn subset_of(&self, other: &TupleSet) -> bool {
        self.universe == other.universe
            && self.arity == other.arity
            && self.indices.is_subset(&other.indices)
    }

    /// Returns a new tuple set containing tuples in this set but not in other
    pub fn difference(&self, other: &TupleSet) -> Result<TupleSet> {
        if other.universe() != &self.universe || other.arity() != self.arity {
            return Err(SigrunError::InvalidArgument(
                "tuple sets must share universe and arity".to_string(),
            ));
        }
        Ok(Self {
            universe: self.universe.clone(),
            arity: self.arity,
            indices: self.indices.difference(&other.indices).copied().collect(),
        })
    }

    /// Returns the Cartesian product of this set with another
    pub fn product(&self, other: &TupleSet) -> Result<TupleSet> {
        if other.universe() != &self.universe {
            return Err(SigrunError::InvalidArgument(
                "tuple sets from different universes".to_string(),
            ));
        }

        let new_arity = self.arity + other.arity;
        let mut result = TupleSet::empty(self.universe.clone(), new_arity);
        let shift = self.universe.size().pow(other.arity as u32);

        for &i in &self.indices {
            for &j in &other.indices {
                result.indices.insert(i * shift + j);
            }
        }

        Ok(result)
    }
}

impl fmt::Display for TupleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, tuple) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", tuple)?;
        }
        write!(f, "}}")
    }
}

/// Factory for creating tuples and tuple sets
pub struct TupleFactory {
    universe: Universe,
}

impl TupleFactory {
    /// Returns the universe this factory belongs to
    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    /// Creates a tuple from the given atoms
    pub fn tuple(&self, atoms: &[&str]) -> Result<Tuple> {
        if atoms.is_empty() {
            return Err(SigrunError::InvalidArgument(
                "cannot create empty tuple".to_string(),
            ));
        }

        let mut atom_indices = Vec::with_capacity(atoms.len());
        for &atom in atoms {
            let idx = self.universe.index_of(atom).ok_or_else(|| {
                SigrunError::InvalidArgument(format!("atom {} not in universe", atom))
            })?;
            atom_indices.push(idx);
        }

        let base = self.universe.size();
        let mut index = 0;
        for (i, &atom_idx) in atom_indices.iter().enumerate() {
            index += atom_idx * base.pow((atoms.len() - 1 - i) as u32);
        }

        Ok(Tuple {
            universe: self.universe.clone(),
            atom_indices,
            index,
        })
    }

    /// Creates a tuple set from an array of atom sequences
    pub fn tuple_set(&self, tuples: &[&[&str]]) -> Result<TupleSet> {
        if tuples.is_empty() {
            return Err(SigrunError::InvalidArgument(
                "cannot create tuple set from empty array".to_string(),
            ));
        }

        let arity = tuples[0].len();
        let mut set = TupleSet::empty(self.universe.clone(), arity);

        for &atoms in tuples {
            if atoms.len() != arity {
                return Err(SigrunError::InvalidArgument(
                    "all tuples must have the same arity".to_string(),
                ));
            }
            let tuple = self.tuple(atoms)?;
            set.add(tuple)?;
        }

        Ok(set)
    }

    /// Creates an empty tuple set with the given arity
    pub fn none(&self, arity: usize) -> TupleSet {
        TupleSet::empty(self.universe.clone(), arity)
    }

    /// Creates a tuple set containing all tuples of the given arity
    pub fn all(&self, arity: usize) -> TupleSet {
        let mut set = TupleSet::empty(self.universe.clone(), arity);
        let total = self.universe.size().pow(arity as u32);
        for i in 0..total {
            set.indices.insert(i);
        }
        set
    }

    /// Creates a singleton tuple set containing a single atom
    pub fn set_of(&self, atom: &str) -> Result<TupleSet> {
        let tuple = self.tuple(&[atom])?;
        let mut set = TupleSet::empty(self.universe.clone(), 1);
        set.add(tuple)?;
        Ok(set)
    }

    /// Creates a tuple from an index in n-dimensional space
    pub fn tuple_from_index(&self, arity: usize, index: usize) -> Result<Tuple> {
        let base = self.universe.size();
        let max_index = base.pow(arity as u32);

        if index >= max_index {
            return Err(SigrunError::InvalidArgument(format!(
                "index {} out of range for arity {}",
                index, arity
            )));
        }

        let mut atom_indices = Vec::with_capacity(arity);
        let mut remaining = index;

        // First atom is most significant; must match tuple().
        for pos in (0..arity).rev() {
            let divisor = base.pow(pos as u32);
            atom_indices.push(remaining / divisor);
            remaining %= divisor;
        }

        Ok(Tuple {
            universe: self.universe.clone(),
            atom_indices,
            index,
        })
    }

    /// Creates a tuple set with the given arity from a set of tuple indices
    pub fn tuple_set_from_indices(
        &self,
        arity: usize,
        indices: &BTreeSet<usize>,
    ) -> Result<TupleSet> {
        let max_index = self.universe.size().pow(arity as u32);
        if let Some(&last) = indices.iter().next_back() {
            if last >= max_index {
                return Err(SigrunError::InvalidArgument(format!(
                    "index {} out of range for arity {}",
                    last, arity
                )));
            }
        }
        Ok(TupleSet {
            universe: self.universe.clone(),
            arity,
            indices: indices.clone(),
        })
    }
}

/// Bounds map relations to lower and upper bounds on their contents
///
/// The lower bound specifies tuples that must be in the relation, the
/// upper bound those that may be. Relations are kept in the order they
/// were bound; boolean variable allocation and instance rendering walk
/// that order, which keeps solving deterministic.
#[derive(Clone)]
pub struct Bounds {
    universe: Universe,
    order: Vec<Relation>,
    lower_bounds: FxHashMap<Relation, TupleSet>,
    upper_bounds: FxHashMap<Relation, TupleSet>,
}

impl Bounds {
    /// Creates new bounds over the given universe
    pub fn new(universe: Universe) -> Self {
        Self {
            universe,
            order: Vec::new(),
            lower_bounds: FxHashMap::default(),
            upper_bounds: FxHashMap::default(),
        }
    }

    /// Returns the universe
    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    /// Returns the tuple factory for this bounds
    pub fn factory(&self) -> TupleFactory {
        self.universe.factory()
    }

    /// Sets both lower and upper bounds for a relation
    ///
    /// # Errors
    /// Returns an error if the tuple sets come from a different universe,
    /// their arity does not match the relation, or lower is not a subset
    /// of upper.
    pub fn bound(&mut self, relation: &Relation, lower: TupleSet, upper: TupleSet) -> Result<()> {
        if lower.universe() != &self.universe || upper.universe() != &self.universe {
            return Err(SigrunError::InvalidArgument(
                "tuple sets must be from the bounds universe".to_string(),
            ));
        }

        if lower.arity() != relation.arity() || upper.arity() != relation.arity() {
            return Err(SigrunError::InvalidArgument(format!(
                "tuple set arity {} does not match arity {} of relation {}",
                lower.arity(),
                relation.arity(),
                relation.name()
            )));
        }

        if !lower.subset_of(&upper) {
            return Err(SigrunError::InvalidArgument(format!(
                "lower bound of {} is not a subset of its upper bound",
                relation.name()
            )));
        }

        if !self.lower_bounds.contains_key(relation) {
            self.order.push(relation.clone());
        }
        self.lower_bounds.insert(relation.clone(), lower);
        self.upper_bounds.insert(relation.clone(), upper);
        Ok(())
    }

    /// Sets an exact bound for a relation (lower == upper)
    pub fn bound_exactly(&mut self, relation: &Relation, tuples: TupleSet) -> Result<()> {
        let upper = tuples.clone();
        self.bound(relation, tuples, upper)
    }

    /// Returns the lower bound for a relation
    pub fn lower_bound(&self, relation: &Relation) -> Option<&TupleSet> {
        self.lower_bounds.get(relation)
    }

    /// Returns the upper bound for a relation
    pub fn upper_bound(&self, relation: &Relation) -> Option<&TupleSet> {
        self.upper_bounds.get(relation)
    }

    /// Returns true if a relation is bound exactly
    pub fn is_exact(&self, relation: &Relation) -> bool {
        match (self.lower_bounds.get(relation), self.upper_bounds.get(relation)) {
            (Some(lower), Some(upper)) => lower.index_view() == upper.index_view(),
            _ => false,
        }
    }

    /// Returns all bound relations, in the order they were bound
    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.order.iter()
    }
}

/// An instance maps relations to tuple sets (a solution)
#[derive(Debug, Clone)]
pub struct Instance {
    universe: Universe,
    order: Vec<Relation>,
    relations: FxHashMap<Relation, TupleSet>,
}

impl Instance {
    /// Creates a new empty instance
    pub fn new(universe: Universe) -> Self {
        Self {
            universe,
            order: Vec::new(),
            relations: FxHashMap::default(),
        }
    }

    /// Returns the universe
    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    /// Adds a relation binding
    pub fn add(&mut self, relation: Relation, tuples: TupleSet) -> Result<()> {
        if tuples.universe() != &self.universe {
            return Err(SigrunError::InvalidArgument(
                "tuple set from different universe".to_string(),
            ));
        }

        if tuples.arity() != relation.arity() {
            return Err(SigrunError::InvalidArgument(format!(
                "tuple set arity {} does not match arity {} of relation {}",
                tuples.arity(),
                relation.arity(),
                relation.name()
            )));
        }

        if !self.relations.contains_key(&relation) {
            self.order.push(relation.clone());
        }
        self.relations.insert(relation, tuples);
        Ok(())
    }

    /// Returns the tuples for a relation
    pub fn tuples(&self, relation: &Relation) -> Option<&TupleSet> {
        self.relations.get(relation)
    }

    /// Returns all relations in this instance, in insertion order
    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.order.iter()
    }

    /// Returns true if two instances bind the same relations to the
    /// same extents
    ///
    /// Universes are compared by atom list and relations are matched by
    /// name and arity, so instances from separate solver runs compare.
    pub fn same_extents(&self, other: &Instance) -> bool {
        if self.order.len() != other.order.len() {
            return false;
        }
        let atoms = |u: &Universe| -> Vec<String> {
            (0..u.size())
                .filter_map(|i| u.atom(i).map(str::to_string))
                .collect()
        };
        if atoms(&self.universe) != atoms(&other.universe) {
            return false;
        }
        self.order.iter().all(|r| {
            let matched = other
                .order
                .iter()
                .find(|o| o.name() == r.name() && o.arity() == r.arity());
            let theirs = matched.and_then(|o| other.relations.get(o));
            match (self.relations.get(r), theirs) {
                (Some(a), Some(b)) => a.index_view() == b.index_view(),
                _ => false,
            }
        })
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for relation in &self.order {
            if let Some(tuples) = self.relations.get(relation) {
                writeln!(f, "{} = {}", relation.name(), tuples)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_universe() -> Result<()> {
        let universe = Universe::new(&["A", "B", "C"])?;
        assert_eq!(universe.size(), 3);
        assert_eq!(universe.atom(0), Some("A"));
        assert_eq!(universe.atom(2), Some("C"));
        assert_eq!(universe.index_of("B"), Some(1));
        assert!(universe.contains("A"));
        assert!(!universe.contains("D"));
        Ok(())
    }

    #[test]
    fn universe_rejects_duplicates() {
        assert!(Universe::new(&["A", "B", "A"]).is_err());
    }

    #[test]
    fn universe_rejects_empty() {
        assert!(Universe::new::<&str>(&[]).is_err());
    }

    #[test]
    fn tuple_index_round_trip() -> Result<()> {
        let universe = Universe::new(&["A", "B", "C"])?;
        let factory = universe.factory();

        let tuple = factory.tuple(&["B", "C"])?;
        assert_eq!(tuple.index(), 1 * 3 + 2);

        let back = factory.tuple_from_index(2, tuple.index())?;
        assert_eq!(back.atom(0), Some("B"));
        assert_eq!(back.atom(1), Some("C"));
        Ok(())
    }

    #[test]
    fn tuple_rejects_foreign_atom() {
        let universe = Universe::new(&["A", "B"]).unwrap();
        assert!(universe.factory().tuple(&["X"]).is_err());
    }

    #[test]
    fn tuple_set_iterates_sorted() -> Result<()> {
        let universe = Universe::new(&["A", "B", "C"])?;
        let factory = universe.factory();

        let set = factory.tuple_set(&[&["C"], &["A"]])?;
        let atoms: Vec<String> = set
            .iter()
            .map(|t| t.atom(0).unwrap().to_string())
            .collect();
        assert_eq!(atoms, vec!["A", "C"]);
        Ok(())
    }

    #[test]
    fn full_sets() -> Result<()> {
        let universe = Universe::new(&["A", "B"])?;
        let factory = universe.factory();

        assert!(factory.none(1).is_empty());
        assert_eq!(factory.all(1).size(), 2);
        assert_eq!(factory.all(2).size(), 4);
        Ok(())
    }

    #[test]
    fn product_indices() -> Result<()> {
        let universe = Universe::new(&["A", "B"])?;
        let factory = universe.factory();

        let left = factory.tuple_set(&[&["B"]])?;
        let right = factory.tuple_set(&[&["A"], &["B"]])?;
        let product = left.product(&right)?;

        assert_eq!(product.arity(), 2);
        // (B,A)=2 and (B,B)=3 in base 2
        assert!(product.contains_index(2));
        assert!(product.contains_index(3));
        assert_eq!(product.size(), 2);
        Ok(())
    }

    #[test]
    fn bounds_reject_lower_outside_upper() -> Result<()> {
        let universe = Universe::new(&["A", "B"])?;
        let mut bounds = Bounds::new(universe.clone());
        let r = Relation::unary("R");
        let factory = universe.factory();

        let lower = factory.tuple_set(&[&["A"]])?;
        let upper = factory.tuple_set(&[&["B"]])?;
        assert!(bounds.bound(&r, lower, upper).is_err());
        Ok(())
    }

    #[test]
    fn bounds_preserve_order() -> Result<()> {
        let universe = Universe::new(&["A", "B"])?;
        let mut bounds = Bounds::new(universe.clone());
        let factory = universe.factory();

        let r1 = Relation::unary("First");
        let r2 = Relation::unary("Second");
        bounds.bound_exactly(&r1, factory.set_of("A")?)?;
        bounds.bound_exactly(&r2, factory.set_of("B")?)?;

        let names: Vec<&str> = bounds.relations().map(|r| r.name()).collect();
        assert_eq!(names, vec!["First", "Second"]);
        assert!(bounds.is_exact(&r1));
        Ok(())
    }

    #[test]
    fn instance_extent_equality() -> Result<()> {
        let universe = Universe::new(&["A", "B"])?;
        let factory = universe.factory();
        let person = Relation::unary("Person");

        let mut a = Instance::new(universe.clone());
        a.add(person.clone(), factory.tuple_set(&[&["A"], &["B"]])?)?;

        let mut b = Instance::new(universe.clone());
        b.add(person.clone(), factory.tuple_set(&[&["B"], &["A"]])?)?;

        let mut c = Instance::new(universe.clone());
        c.add(person.clone(), factory.set_of("A")?)?;

        assert!(a.same_extents(&b));
        assert!(!a.same_extents(&c));
        Ok(())
    }

    #[test]
    fn extent_equality_spans_separately_built_instances() -> Result<()> {
        // no shared Universe or Relation values between the two
        let build = || -> Result<Instance> {
            let universe = Universe::new(&["A", "B"])?;
            let factory = universe.factory();
            let mut instance = Instance::new(universe);
            instance.add(Relation::unary("R"), factory.set_of("A")?)?;
            Ok(instance)
        };
        assert!(build()?.same_extents(&build()?));

        let other_universe = || -> Result<Instance> {
            let universe = Universe::new(&["A", "C"])?;
            let factory = universe.factory();
            let mut instance = Instance::new(universe);
            instance.add(Relation::unary("R"), factory.set_of("A")?)?;
            Ok(instance)
        };
        assert!(!build()?.same_extents(&other_universe()?));
        Ok(())
    }
}
