//! End to end run of a small family model

use sigrun::run::execute_source;
use sigrun::solver::Options;
use sigrun::SigrunError;

const FAMILY: &str = "
    abstract sig Person { spouse: lone Person, parents: set Person }
    sig Man extends Person {}
    sig Woman extends Person {}
    one sig Adam extends Man {}
    one sig Eve extends Woman {}

    fact Symmetric { spouse = ~spouse }
    fact NoSelfMarriage { no spouse & iden }
    fact Biology { no ^parents & iden }
    fact NoIncest { no spouse & ^parents }

    pred married() { some Adam.spouse }
    run married for 4 Person
";

#[test]
fn family_model_has_an_instance() {
    let reports = execute_source(FAMILY, &Options::default()).unwrap();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].solution.is_sat());
}

#[test]
fn universe_holds_the_named_atoms() {
    let reports = execute_source(FAMILY, &Options::default()).unwrap();
    let instance = reports[0].solution.instance().unwrap();
    let universe = instance.universe();

    assert_eq!(universe.size(), 4);
    assert!(universe.contains("Adam"));
    assert!(universe.contains("Eve"));
    assert!(universe.contains("Man$0"));
    assert!(universe.contains("Woman$0"));
}

#[test]
fn spouse_is_symmetric_and_irreflexive() {
    let reports = execute_source(FAMILY, &Options::default()).unwrap();
    let instance = reports[0].solution.instance().unwrap();
    let universe = instance.universe();

    let spouse = instance
        .relations()
        .find(|r| r.name() == "spouse")
        .cloned()
        .unwrap();
    let tuples = instance.tuples(&spouse).unwrap();

    // Adam is married, so the relation is nonempty
    assert!(!tuples.is_empty());

    for tuple in tuples.iter() {
        assert_ne!(tuple.atom_index(0), tuple.atom_index(1));
        let flipped = universe
            .factory()
            .tuple(&[tuple.atom(1).unwrap(), tuple.atom(0).unwrap()])
            .unwrap();
        assert!(tuples.contains(&flipped));
    }
}

#[test]
fn sig_extents_partition_person() {
    let reports = execute_source(FAMILY, &Options::default()).unwrap();
    let instance = reports[0].solution.instance().unwrap();

    let extent = |name: &str| {
        let relation = instance
            .relations()
            .find(|r| r.name() == name)
            .cloned()
            .unwrap();
        instance.tuples(&relation).unwrap().clone()
    };

    let person = extent("Person");
    let man = extent("Man");
    let woman = extent("Woman");

    assert_eq!(person.size(), 4);
    assert_eq!(man.size(), 2);
    assert_eq!(woman.size(), 2);
    assert!(man.subset_of(&person));
    assert!(woman.subset_of(&person));

    let adam = extent("Adam");
    assert_eq!(adam.size(), 1);
    assert!(adam.subset_of(&man));
}

#[test]
fn parents_respects_its_upper_bound() {
    let reports = execute_source(FAMILY, &Options::default()).unwrap();
    let instance = reports[0].solution.instance().unwrap();
    let universe = instance.universe();

    let parents = instance
        .relations()
        .find(|r| r.name() == "parents")
        .cloned()
        .unwrap();
    for tuple in instance.tuples(&parents).unwrap().iter() {
        // both columns are Person atoms; any atom of this universe is one
        assert!(tuple.atom_index(0).unwrap() < universe.size());
        assert!(tuple.atom_index(1).unwrap() < universe.size());
    }
}

#[test]
fn scope_below_the_singletons_is_an_error() {
    let source = FAMILY.replace("for 4 Person", "for 1 Person");
    let err = execute_source(&source, &Options::default()).unwrap_err();
    assert!(matches!(err, SigrunError::Scope(_)));
}

#[test]
fn identical_runs_return_the_same_first_instance() {
    let first = execute_source(FAMILY, &Options::default()).unwrap();
    let second = execute_source(FAMILY, &Options::default()).unwrap();

    let a = first[0].solution.instance().unwrap();
    let b = second[0].solution.instance().unwrap();
    assert!(a.same_extents(b));
}

#[test]
fn adam_marries_eve_when_the_facts_say_so() {
    let source = FAMILY.replace(
        "fact NoIncest { no spouse & ^parents }",
        "fact NoIncest { no spouse & ^parents }
         fact Scripture { Adam.spouse = Eve }",
    );
    let reports = execute_source(&source, &Options::default()).unwrap();
    assert!(reports[0].solution.is_sat());

    let instance = reports[0].solution.instance().unwrap();
    let universe = instance.universe();
    let spouse = instance
        .relations()
        .find(|r| r.name() == "spouse")
        .cloned()
        .unwrap();
    let tuples = instance.tuples(&spouse).unwrap();

    let adam = universe.index_of("Adam").unwrap();
    let eve = universe.index_of("Eve").unwrap();
    let adam_eve = universe.factory().tuple(&["Adam", "Eve"]).unwrap();
    let eve_adam = universe.factory().tuple(&["Eve", "Adam"]).unwrap();
    assert!(tuples.contains(&adam_eve));
    assert!(tuples.contains(&eve_adam));

    // spouse is lone, so Eve is Adam's only spouse
    for tuple in tuples.iter() {
        if tuple.atom_index(0) == Some(adam) {
            assert_eq!(tuple.atom_index(1), Some(eve));
        }
    }
}

#[test]
fn forcing_a_self_spouse_is_unsat() {
    let source = FAMILY.replace(
        "pred married() { some Adam.spouse }",
        "pred married() { Adam in Adam.spouse }",
    );
    let reports = execute_source(&source, &Options::default()).unwrap();
    assert!(reports[0].solution.is_unsat());
}
