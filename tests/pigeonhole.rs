//! Pigeonhole principle through the surface syntax

use sigrun::run::execute_source;
use sigrun::solver::Options;

fn pigeonhole(pigeons: usize, holes: usize) -> String {
    format!(
        "sig Pigeon {{ nest: one Hole }}
         sig Hole {{}}
         fact Injective {{ all p, q: Pigeon | p.nest = q.nest implies p = q }}
         pred fits() {{}}
         run fits for {} Pigeon, {} Hole",
        pigeons, holes
    )
}

#[test]
fn more_pigeons_than_holes_is_unsat() {
    let reports = execute_source(&pigeonhole(4, 3), &Options::default()).unwrap();
    assert!(reports[0].solution.is_unsat());
}

#[test]
fn equal_pigeons_and_holes_is_sat() {
    let reports = execute_source(&pigeonhole(3, 3), &Options::default()).unwrap();
    assert!(reports[0].solution.is_sat());

    // the nest relation is a bijection
    let instance = reports[0].solution.instance().unwrap();
    let nest = instance
        .relations()
        .find(|r| r.name() == "nest")
        .cloned()
        .unwrap();
    let tuples = instance.tuples(&nest).unwrap();
    assert_eq!(tuples.size(), 3);

    let mut sources: Vec<usize> = tuples.iter().map(|t| t.atom_index(0).unwrap()).collect();
    let mut targets: Vec<usize> = tuples.iter().map(|t| t.atom_index(1).unwrap()).collect();
    sources.sort_unstable();
    sources.dedup();
    targets.sort_unstable();
    targets.dedup();
    assert_eq!(sources.len(), 3);
    assert_eq!(targets.len(), 3);
}

#[test]
fn fewer_pigeons_fit_easily() {
    let reports = execute_source(&pigeonhole(2, 3), &Options::default()).unwrap();
    assert!(reports[0].solution.is_sat());
}
