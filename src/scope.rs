//! Scope resolution: from a signature hierarchy and a `run` scope to a
//! concrete universe of atoms
//!
//! Every signature is fixed to an exact atom set. `one` signatures get a
//! single designated atom named after the signature; the remaining scope of
//! each top-level signature is distributed round-robin over the non-abstract,
//! non-singleton signatures of its subtree, in declaration order. The
//! distribution is a pure function of the model and the run command, so the
//! universe is identical across runs.

use rustc_hash::FxHashMap;
use std::collections::BTreeSet;

use crate::error::{Result, SigrunError};
use crate::instance::Universe;
use crate::model::{Model, RunDecl, SigDecl};

/// Scope applied to a top-level signature when the run command names none
pub const DEFAULT_SCOPE: usize = 3;

/// A fully resolved scope: the universe plus the atom set of every signature
#[derive(Debug)]
pub struct ResolvedScope {
    universe: Universe,
    sig_atoms: FxHashMap<String, BTreeSet<usize>>,
    sig_order: Vec<String>,
    symmetry_classes: Vec<Vec<usize>>,
}

impl ResolvedScope {
    /// Returns the universe
    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    /// Returns the atom indices of the named signature
    pub fn atoms_of(&self, sig: &str) -> Option<&BTreeSet<usize>> {
        self.sig_atoms.get(sig)
    }

    /// Returns the signature names in declaration order
    pub fn sig_names(&self) -> impl Iterator<Item = &str> {
        self.sig_order.iter().map(|s| s.as_str())
    }

    /// Returns the groups of interchangeable atoms
    ///
    /// Each group is the direct atom set of one signature cell with at
    /// least two atoms. Atoms of `one` signatures never appear.
    pub fn symmetry_classes(&self) -> &[Vec<usize>] {
        &self.symmetry_classes
    }
}

/// Checks the signature hierarchy for structural problems
fn check_hierarchy(model: &Model) -> Result<()> {
    let mut seen = FxHashMap::default();
    for (i, sig) in model.sigs.iter().enumerate() {
        if seen.insert(sig.name.as_str(), i).is_some() {
            return Err(SigrunError::Scope(format!(
                "signature {} is declared twice",
                sig.name
            )));
        }
        if sig.is_abstract && sig.is_one {
            return Err(SigrunError::Scope(format!(
                "signature {} cannot be both abstract and one",
                sig.name
            )));
        }
    }

    for sig in &model.sigs {
        if let Some(parent) = &sig.parent {
            let parent_decl = model.sig(parent).ok_or_else(|| {
                SigrunError::Scope(format!(
                    "signature {} extends unknown signature {}",
                    sig.name, parent
                ))
            })?;
            if parent_decl.is_one {
                return Err(SigrunError::Scope(format!(
                    "signature {} extends one-signature {}",
                    sig.name, parent
                )));
            }
        }
        for field in &sig.fields {
            if model.sig(&field.range).is_none() {
                return Err(SigrunError::Scope(format!(
                    "field {} of signature {} has unknown range {}",
                    field.name, sig.name, field.range
                )));
            }
        }
    }

    // walk to the root from every sig; a cycle never reaches one
    for sig in &model.sigs {
        let mut current = sig;
        let mut steps = 0;
        while let Some(parent) = &current.parent {
            steps += 1;
            if steps > model.sigs.len() {
                return Err(SigrunError::Scope(format!(
                    "signature hierarchy around {} contains a cycle",
                    sig.name
                )));
            }
            match model.sig(parent) {
                Some(p) => current = p,
                None => break,
            }
        }
    }

    Ok(())
}

/// Collects the subtree of `root`, in declaration order, root included
fn subtree<'a>(model: &'a Model, root: &'a SigDecl) -> Vec<&'a SigDecl> {
    let mut members: Vec<&SigDecl> = vec![root];
    // declaration order is preserved by scanning the sig list repeatedly
    loop {
        let before = members.len();
        for sig in &model.sigs {
            if members.iter().any(|m| m.name == sig.name) {
                continue;
            }
            if let Some(parent) = &sig.parent {
                if members.iter().any(|m| &m.name == parent) {
                    members.push(sig);
                }
            }
        }
        if members.len() == before {
            break;
        }
    }
    members.sort_by_key(|s| {
        model
            .sigs
            .iter()
            .position(|m| m.name == s.name)
            .unwrap_or(usize::MAX)
    });
    members
}

fn requested_scope(run: &RunDecl, sig: &str) -> Option<usize> {
    run.sig_scopes
        .iter()
        .find(|(name, _)| name == sig)
        .map(|&(_, n)| n)
}

/// Resolves the scope of a run command into a universe and per-signature
/// atom sets
///
/// # Errors
/// Returns [`SigrunError::Scope`] when the hierarchy is malformed, a scope
/// names an unknown or non-top-level signature, or the requested scope
/// cannot be met exactly (singleton minima exceed it, or there is no
/// non-abstract signature to absorb the remainder).
pub fn resolve(model: &Model, run: &RunDecl) -> Result<ResolvedScope> {
    check_hierarchy(model)?;

    for (name, _) in &run.sig_scopes {
        let sig = model.sig(name).ok_or_else(|| {
            SigrunError::Scope(format!("scope names unknown signature {}", name))
        })?;
        if sig.parent.is_some() {
            return Err(SigrunError::Scope(format!(
                "scope can only be set on top-level signatures, {} extends {}",
                name,
                sig.parent.as_deref().unwrap_or("")
            )));
        }
    }

    // direct atom count per signature
    let mut direct: FxHashMap<&str, usize> = FxHashMap::default();
    for top in model.sigs.iter().filter(|s| s.parent.is_none()) {
        let members = subtree(model, top);
        let scope = requested_scope(run, &top.name)
            .or(run.default_scope)
            .unwrap_or(DEFAULT_SCOPE);

        let singletons = members.iter().filter(|s| s.is_one).count();
        if singletons > scope {
            return Err(SigrunError::Scope(format!(
                "signature {} has {} one-signatures but a scope of {}",
                top.name, singletons, scope
            )));
        }
        for member in members.iter().filter(|s| s.is_one) {
            direct.insert(&member.name, 1);
        }

        let free = scope - singletons;
        let cells: Vec<&&SigDecl> = members
            .iter()
            .filter(|s| !s.is_abstract && !s.is_one)
            .collect();
        if cells.is_empty() {
            if free > 0 {
                return Err(SigrunError::Scope(format!(
                    "signature {} has no non-abstract member to absorb a scope of {}",
                    top.name, scope
                )));
            }
            continue;
        }
        for (i, cell) in cells.iter().enumerate() {
            let share = free / cells.len() + usize::from(i < free % cells.len());
            direct.insert(&cell.name, share);
        }
    }

    // atoms in declaration order, singleton atoms named after their sig
    let mut atom_names = Vec::new();
    let mut direct_atoms: FxHashMap<&str, Vec<usize>> = FxHashMap::default();
    for sig in &model.sigs {
        let count = direct.get(sig.name.as_str()).copied().unwrap_or(0);
        let mut indices = Vec::with_capacity(count);
        for i in 0..count {
            indices.push(atom_names.len());
            if sig.is_one {
                atom_names.push(sig.name.clone());
            } else {
                atom_names.push(format!("{}${}", sig.name, i));
            }
        }
        direct_atoms.insert(&sig.name, indices);
    }

    if atom_names.is_empty() {
        return Err(SigrunError::Scope(
            "the requested scopes produce an empty universe".to_string(),
        ));
    }
    let universe = Universe::new(&atom_names)?;

    // each sig owns its direct atoms plus those of every descendant
    let mut sig_atoms: FxHashMap<String, BTreeSet<usize>> = FxHashMap::default();
    let mut sig_order = Vec::with_capacity(model.sigs.len());
    for sig in &model.sigs {
        let mut atoms = BTreeSet::new();
        for member in subtree(model, sig) {
            if let Some(indices) = direct_atoms.get(member.name.as_str()) {
                atoms.extend(indices.iter().copied());
            }
        }
        sig_order.push(sig.name.clone());
        sig_atoms.insert(sig.name.clone(), atoms);
    }

    let mut symmetry_classes = Vec::new();
    for sig in &model.sigs {
        if sig.is_one {
            continue;
        }
        if let Some(indices) = direct_atoms.get(sig.name.as_str()) {
            if indices.len() >= 2 {
                symmetry_classes.push(indices.clone());
            }
        }
    }

    Ok(ResolvedScope {
        universe,
        sig_atoms,
        sig_order,
        symmetry_classes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_source;

    const FAMILY: &str = "
        abstract sig Person { spouse: lone Person, parents: set Person }
        sig Man extends Person {}
        sig Woman extends Person {}
        one sig Adam extends Man {}
        one sig Eve extends Woman {}
        pred show() {}
        run show for 4 Person
    ";

    fn resolve_first(source: &str) -> Result<ResolvedScope> {
        let model = parse_source(source).unwrap();
        resolve(&model, &model.runs[0])
    }

    #[test]
    fn family_universe_at_scope_four() {
        let scope = resolve_first(FAMILY).unwrap();
        let universe = scope.universe();
        assert_eq!(universe.size(), 4);
        assert!(universe.contains("Adam"));
        assert!(universe.contains("Eve"));
        assert!(universe.contains("Man$0"));
        assert!(universe.contains("Woman$0"));

        let person = scope.atoms_of("Person").unwrap();
        assert_eq!(person.len(), 4);
        let man = scope.atoms_of("Man").unwrap();
        assert_eq!(man.len(), 2);
        assert!(man.contains(&universe.index_of("Adam").unwrap()));
        assert!(man.contains(&universe.index_of("Man$0").unwrap()));

        let adam = scope.atoms_of("Adam").unwrap();
        assert_eq!(adam.len(), 1);
    }

    #[test]
    fn singleton_minima_exceed_scope() {
        let source = FAMILY.replace("for 4 Person", "for 1 Person");
        let err = resolve_first(&source).unwrap_err();
        assert!(matches!(err, SigrunError::Scope(_)));
    }

    #[test]
    fn abstract_without_children_rejected() {
        let err = resolve_first("abstract sig A {}\npred p() {}\nrun p for 3 A").unwrap_err();
        assert!(matches!(err, SigrunError::Scope(_)));
    }

    #[test]
    fn unknown_parent_rejected() {
        let err =
            resolve_first("sig A extends Ghost {}\npred p() {}\nrun p for 2 A").unwrap_err();
        assert!(matches!(err, SigrunError::Scope(_)));
    }

    #[test]
    fn default_scope_applies_to_all_top_sigs() {
        let scope = resolve_first("sig A {}\nsig B {}\npred p() {}\nrun p for 2").unwrap();
        assert_eq!(scope.universe().size(), 4);
        assert_eq!(scope.atoms_of("A").unwrap().len(), 2);
        assert_eq!(scope.atoms_of("B").unwrap().len(), 2);
    }

    #[test]
    fn sibling_atom_sets_are_disjoint() {
        let scope = resolve_first(FAMILY).unwrap();
        let man = scope.atoms_of("Man").unwrap();
        let woman = scope.atoms_of("Woman").unwrap();
        assert!(man.is_disjoint(woman));

        let person = scope.atoms_of("Person").unwrap();
        let union: BTreeSet<usize> = man.union(woman).copied().collect();
        assert_eq!(&union, person);
    }

    #[test]
    fn symmetry_classes_exclude_singletons() {
        // Man holds Adam (fixed) plus its own Man$0, so at scope 6 the
        // spare atoms split two per cell and both cells become classes
        let source = FAMILY.replace("for 4 Person", "for 6 Person");
        let scope = resolve_first(&source).unwrap();
        assert_eq!(scope.symmetry_classes().len(), 2);
        for class in scope.symmetry_classes() {
            assert_eq!(class.len(), 2);
        }
    }

    #[test]
    fn resolution_is_deterministic() {
        let a = resolve_first(FAMILY).unwrap();
        let b = resolve_first(FAMILY).unwrap();
        let atoms_a: Vec<&str> = (0..a.universe().size())
            .filter_map(|i| a.universe().atom(i))
            .collect();
        let atoms_b: Vec<&str> = (0..b.universe().size())
            .filter_map(|i| b.universe().atom(i))
            .collect();
        assert_eq!(atoms_a, atoms_b);
    }
}
