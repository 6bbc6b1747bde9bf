use metrica_common::{Formula, FormulaStep, Goal, Operator, QuadrenniumPeriod, Variable, VariableId};
use metrica_replicate::{
    Compatibility, Incompatibility, ReplicationOptions, ReplicationSession, commit_replication,
    validate_all,
};
use proptest::prelude::*;

fn meta_2025(id: u64, value: f64) -> Goal {
    Goal::new(id, value)
        .with_label(format!("Meta 2025: {value}"))
        .with_year(2025)
}

fn ppa(id: u64, value: f64) -> QuadrenniumPeriod {
    QuadrenniumPeriod::new(id, 2024, 2027, value).with_label(format!("PPA 2024-2027: {value}"))
}

#[test]
fn scenario_a_goal_is_retargeted_by_label() {
    let source = Variable::new(1, "Execution", "EXE")
        .with_formula(vec![FormulaStep::goal(meta_2025(10, 100.0))]);
    let target = Variable::new(2, "Contracts", "CTR").with_goal(meta_2025(20, 250.0));

    let results = validate_all(&source, &[target.clone()], ReplicationOptions::default())
        .expect("source has a formula");
    let result = results.get(target.id).expect("target checked");

    assert!(result.is_valid());
    assert!(result.reason().is_none());
    match result.mapped().map(Formula::steps) {
        Some([FormulaStep::GoalVariable { goal }]) => assert_eq!(goal, &target.goals[0]),
        other => panic!("unexpected mapping: {other:?}"),
    }
}

#[test]
fn scenario_b_direct_reference_is_circular() {
    let target = Variable::new(2, "Contracts", "CTR");
    let source = Variable::new(1, "Execution", "EXE")
        .with_formula(vec![FormulaStep::variable(target.as_ref_step())]);

    let results = validate_all(&source, &[target.clone()], ReplicationOptions::default())
        .expect("source has a formula");
    let result = results.get(target.id).expect("target checked");

    assert!(!result.is_valid());
    assert!(result.mapped().is_none());
    assert!(
        result
            .reason()
            .is_some_and(|reason| reason.contains("circular reference"))
    );
}

#[test]
fn scenario_c_missing_start_year_rejects_target() {
    let source = Variable::new(1, "Execution", "EXE")
        .with_formula(vec![FormulaStep::quadrennium(ppa(30, 12.0))]);
    let target = Variable::new(2, "Contracts", "CTR")
        .with_quadrennium(QuadrenniumPeriod::new(40, 2020, 2023, 8.0));

    let results = validate_all(&source, &[target.clone()], ReplicationOptions::default())
        .expect("source has a formula");
    let result = results.get(target.id).expect("target checked");

    assert!(!result.is_valid());
    assert!(
        result
            .reason()
            .is_some_and(|reason| reason.contains("missing compatible quadrennium"))
    );
}

fn scenario_d() -> (Variable, Variable) {
    let source = Variable::new(1, "Execution", "EXE").with_formula(vec![
        FormulaStep::number(2.0),
        FormulaStep::op(Operator::Mul),
        FormulaStep::goal(meta_2025(10, 100.0)),
        FormulaStep::op(Operator::Add),
        FormulaStep::quadrennium(ppa(30, 12.0)),
    ]);
    let target = Variable::new(2, "Contracts", "CTR")
        .with_goal(meta_2025(20, 250.0))
        .with_quadrennium(QuadrenniumPeriod::new(40, 2024, 2028, 15.0));
    (source, target)
}

#[test]
fn scenario_d_mixed_formula_commits_one_mapping() {
    let (source, target) = scenario_d();
    let catalog = vec![source.clone(), target.clone()];

    let mut session = ReplicationSession::open(&source, &catalog, ReplicationOptions::default());
    let mapped = session
        .results()
        .get(target.id)
        .and_then(Compatibility::mapped)
        .expect("target is compatible")
        .clone();

    let steps = mapped.steps();
    assert_eq!(steps[0], FormulaStep::number(2.0));
    assert_eq!(steps[1], FormulaStep::op(Operator::Mul));
    assert_eq!(steps[2], FormulaStep::goal(target.goals[0].clone()));
    assert_eq!(steps[3], FormulaStep::op(Operator::Add));
    assert_eq!(steps[4], FormulaStep::quadrennium(target.quadrenniums[0].clone()));

    session.toggle(target.id);
    let mut persisted = Vec::new();
    let batch = session
        .commit_into(&mut |ids: &[VariableId], formulas: &std::collections::BTreeMap<VariableId, Formula>| {
            persisted.push((ids.to_vec(), formulas.len()));
            Ok::<(), std::convert::Infallible>(())
        })
        .expect("sink accepts batch");

    assert_eq!(batch.mapped_formulas.len(), 1);
    assert_eq!(batch.mapped_formulas.get(&target.id), Some(&mapped));
    assert_eq!(persisted, vec![(vec![target.id], 1)]);
    assert!(session.selection().is_empty());
}

#[test]
fn source_passed_as_candidate_is_circular() {
    let (source, target) = scenario_d();
    let results = validate_all(
        &source,
        &[source.clone(), target],
        ReplicationOptions::default(),
    )
    .expect("source has a formula");
    assert_eq!(
        results.get(source.id).and_then(Compatibility::incompatibility),
        Some(&Incompatibility::CircularReference)
    );
}

#[test]
fn validation_is_deterministic_and_non_mutating() {
    let (source, target) = scenario_d();
    let stranger = Variable::new(3, "Staff", "STF").with_goal(meta_2025(50, 1.0));
    let candidates = vec![target, stranger];
    let source_before = source.clone();
    let candidates_before = candidates.clone();

    let first = validate_all(&source, &candidates, ReplicationOptions::default())
        .expect("source has a formula");
    let second = validate_all(&source, &candidates, ReplicationOptions::default())
        .expect("source has a formula");

    assert_eq!(first, second);
    assert_eq!(source, source_before);
    assert_eq!(candidates, candidates_before);
}

#[test]
fn select_all_twice_returns_to_empty() {
    let (source, target) = scenario_d();
    let twin = Variable {
        id: VariableId(3),
        ..target.clone()
    };
    let catalog = vec![source.clone(), target, twin];
    let mut session = ReplicationSession::open(&source, &catalog, ReplicationOptions::default());

    session.select_all_valid();
    assert_eq!(session.selection().len(), 2);
    session.select_all_valid();
    assert!(session.selection().is_empty());
}

#[test]
fn reopen_resets_selection_and_recomputes() {
    let (source, target) = scenario_d();
    let catalog = vec![source.clone(), target.clone()];
    let mut session = ReplicationSession::open(&source, &catalog, ReplicationOptions::default());
    session.toggle(target.id);

    let other_source = Variable::new(5, "Population", "POP")
        .with_formula(vec![FormulaStep::variable(target.as_ref_step())]);
    let catalog = vec![source, target.clone(), other_source.clone()];
    session.reopen(&other_source, &catalog);

    assert!(session.selection().is_empty());
    assert_eq!(session.source().id, other_source.id);
    assert!(!session.results().is_valid(target.id));
}

#[test]
fn stale_selection_is_dropped_silently_on_commit() {
    let (source, target) = scenario_d();
    let catalog = vec![source.clone(), target.clone()];
    let mut session = ReplicationSession::open(&source, &catalog, ReplicationOptions::default());
    session.toggle(target.id);

    // The target loses its 2024 period while selected.
    let mut shrunk = target.clone();
    shrunk.quadrenniums.clear();
    session.refresh(&[source, shrunk]);
    assert!(session.is_selected(target.id));

    let batch = session.commit();
    assert_eq!(batch.target_ids, vec![target.id]);
    assert!(batch.mapped_formulas.is_empty());
}

#[test]
fn commit_replication_keeps_unfiltered_ids() {
    let (source, target) = scenario_d();
    let results = validate_all(&source, &[target.clone()], ReplicationOptions::default())
        .expect("source has a formula");
    let batch = commit_replication([VariableId(99), target.id], &results);
    assert_eq!(batch.target_ids, vec![VariableId(99), target.id]);
    assert_eq!(batch.mapped_formulas.len(), 1);
}

fn opaque_step() -> impl Strategy<Value = FormulaStep> {
    prop_oneof![
        (-1.0e6..1.0e6f64).prop_map(FormulaStep::number),
        prop_oneof![
            Just(Operator::Add),
            Just(Operator::Sub),
            Just(Operator::Mul),
            Just(Operator::Div)
        ]
        .prop_map(FormulaStep::op),
        Just(FormulaStep::function("SUM")),
        Just(FormulaStep::OpenParen),
        Just(FormulaStep::CloseParen),
        Just(FormulaStep::Separator),
        (1u32..4).prop_map(|periods| FormulaStep::PeriodAdvance { periods }),
    ]
}

fn any_step() -> impl Strategy<Value = FormulaStep> {
    prop_oneof![
        3 => opaque_step(),
        1 => Just(FormulaStep::goal(meta_2025(10, 100.0))),
        1 => Just(FormulaStep::quadrennium(ppa(30, 12.0))),
        1 => Just(FormulaStep::variable(
            Variable::new(7, "Population", "POP").as_ref_step()
        )),
    ]
}

proptest! {
    #[test]
    fn valid_mappings_keep_length_and_opaque_steps(steps in prop::collection::vec(any_step(), 1..24)) {
        let source = Variable::new(1, "Execution", "EXE").with_formula(steps.clone());
        let (_, target) = scenario_d();
        let results = validate_all(&source, &[target.clone()], ReplicationOptions::default())
            .expect("source has a formula");
        let mapped = results
            .get(target.id)
            .and_then(Compatibility::mapped)
            .expect("every generated reference has a match on the target");

        prop_assert_eq!(mapped.len(), steps.len());
        for (before, after) in steps.iter().zip(mapped.steps()) {
            match before {
                FormulaStep::GoalVariable { .. } => {
                    prop_assert_eq!(after, &FormulaStep::goal(target.goals[0].clone()));
                }
                FormulaStep::QuadrenniumVariable { .. } => {
                    prop_assert_eq!(after, &FormulaStep::quadrennium(target.quadrenniums[0].clone()));
                }
                _ => prop_assert_eq!(after, before),
            }
        }
    }
}
