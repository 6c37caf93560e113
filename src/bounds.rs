//! Bound compilation: from a resolved scope to relational bounds
//!
//! Signatures are bound exactly to their atom sets, so sig membership costs
//! no boolean variables. Fields get an empty lower bound and an upper bound
//! of owner atoms crossed with range atoms; their `one` and `lone`
//! multiplicities become quantified formulas conjoined with the rest of the
//! problem.

use rustc_hash::FxHashMap;

use crate::ast::{Expression, Formula, Relation, Variable};
use crate::error::{Result, SigrunError};
use crate::instance::{Bounds, TupleSet};
use crate::model::{FieldMult, Model};
use crate::scope::ResolvedScope;

/// The output of bound compilation
///
/// Holds the bounds, the relation for every signature and field keyed by
/// name, and the formulas that field multiplicities induce.
pub struct CompiledBounds {
    bounds: Bounds,
    relations: FxHashMap<String, Relation>,
    sig_names: Vec<String>,
    field_names: Vec<String>,
    constraints: Vec<Formula>,
}

impl CompiledBounds {
    /// Returns the bounds
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Looks up the relation for a signature or field name
    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.get(name)
    }

    /// Returns the signature names, in declaration order
    pub fn sig_names(&self) -> impl Iterator<Item = &str> {
        self.sig_names.iter().map(|s| s.as_str())
    }

    /// Returns the field names, in declaration order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.field_names.iter().map(|s| s.as_str())
    }

    /// Returns the formulas induced by field multiplicities
    pub fn constraints(&self) -> &[Formula] {
        &self.constraints
    }

    /// Consumes self, returning the bounds and induced formulas
    pub fn into_parts(self) -> (Bounds, FxHashMap<String, Relation>, Vec<Formula>) {
        (self.bounds, self.relations, self.constraints)
    }
}

fn atoms_to_set(scope: &ResolvedScope, sig: &str, arity: usize) -> Result<TupleSet> {
    let atoms = scope.atoms_of(sig).ok_or_else(|| {
        SigrunError::Scope(format!("signature {} has no resolved atoms", sig))
    })?;
    scope
        .universe()
        .factory()
        .tuple_set_from_indices(arity, atoms)
}

/// Compiles a model and a resolved scope into bounds and constraints
///
/// # Errors
/// Returns [`SigrunError::Scope`] when two fields share a name; field names
/// live in one flat namespace so that formulas can refer to them directly.
pub fn compile(model: &Model, scope: &ResolvedScope) -> Result<CompiledBounds> {
    let universe = scope.universe().clone();
    let factory = universe.factory();
    let mut bounds = Bounds::new(universe);
    let mut relations = FxHashMap::default();
    let mut sig_names = Vec::new();
    let mut field_names = Vec::new();
    let mut constraints = Vec::new();

    for sig in &model.sigs {
        let relation = Relation::unary(&sig.name);
        let atoms = atoms_to_set(scope, &sig.name, 1)?;
        bounds.bound_exactly(&relation, atoms)?;
        relations.insert(sig.name.clone(), relation);
        sig_names.push(sig.name.clone());
    }

    for (owner, field) in model.fields() {
        if relations.contains_key(&field.name) {
            return Err(SigrunError::Scope(format!(
                "field {} of signature {} clashes with another declaration",
                field.name, owner.name
            )));
        }

        let relation = Relation::binary(&field.name);
        let domain = atoms_to_set(scope, &owner.name, 1)?;
        let range = atoms_to_set(scope, &field.range, 1)?;
        let upper = domain.product(&range)?;
        bounds.bound(&relation, factory.none(2), upper)?;

        if let Some(constraint) = multiplicity_constraint(field.mult, &relations, owner, &relation)
        {
            constraints.push(constraint);
        }

        relations.insert(field.name.clone(), relation);
        field_names.push(field.name.clone());
    }

    Ok(CompiledBounds {
        bounds,
        relations,
        sig_names,
        field_names,
        constraints,
    })
}

/// Builds `all x: Owner | lone x.field` (or `one`) for a field
///
/// `set` fields induce nothing; the upper bound already confines them to
/// owner atoms crossed with range atoms.
fn multiplicity_constraint(
    mult: FieldMult,
    relations: &FxHashMap<String, Relation>,
    owner: &crate::model::SigDecl,
    field: &Relation,
) -> Option<Formula> {
    let per_atom = |image: Expression| match mult {
        FieldMult::Set => None,
        FieldMult::Lone => Some(image.lone()),
        FieldMult::One => Some(image.one()),
    };

    let owner_rel = relations.get(&owner.name)?;
    let x = Variable::unary("x");
    let image = Expression::from(&x).join(Expression::from(field));
    let body = per_atom(image)?;
    Some(Formula::forall(
        x.one_of(Expression::from(owner_rel)).into(),
        body,
    ))
}
