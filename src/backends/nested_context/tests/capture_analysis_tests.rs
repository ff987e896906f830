#![cfg(test)]

use crate::backends::nested_context::capture_analysis::CaptureAnalysis;
use crate::compiler_frontend::compiler_messages::compiler_errors::{ErrorMetaDataKey, ErrorType};
use crate::compiler_frontend::declarations::decl_builder::DeclTreeBuilder;
use crate::compiler_frontend::declarations::decl_nodes::{AggregateKind, Expr, Stmt, ValueType};
use crate::compiler_frontend::declarations::tests::test_trees::{
    counter_tree, decl, instance_tree, siblings_tree, skip_tree, var,
};

#[test]
fn owner_of_a_captured_local_needs_a_frame() {
    let tree = counter_tree();
    let analysis = CaptureAnalysis::analyze(&tree).unwrap();
    let outer = decl(&tree, "outer");
    let inc = decl(&tree, "outer.inc");
    let a = var(&tree, "outer.a");

    assert!(analysis.is_captured(a));
    assert!(analysis.is_frame_needed(outer));
    assert!(!analysis.is_frame_needed(inc));
    assert_eq!(analysis.summary(outer).unwrap().captured, vec![a]);
    assert!(analysis.summary(inc).unwrap().pass_through.contains(&outer));
    assert_eq!(analysis.captured_count(), 1);
}

#[test]
fn intermediate_functions_pass_through_without_a_frame() {
    let tree = skip_tree();
    let analysis = CaptureAnalysis::analyze(&tree).unwrap();
    let outer = decl(&tree, "outer");
    let middle = decl(&tree, "outer.middle");
    let inner = decl(&tree, "outer.middle.inner");

    assert!(analysis.is_frame_needed(outer));
    assert!(!analysis.is_frame_needed(middle));
    assert!(!analysis.is_frame_needed(inner));

    let middle_summary = analysis.summary(middle).unwrap();
    assert!(middle_summary.captured.is_empty());
    assert!(middle_summary.pass_through.contains(&outer));
    assert!(analysis.summary(inner).unwrap().pass_through.contains(&outer));
    assert!(analysis.summary(outer).unwrap().pass_through.is_empty());
}

#[test]
fn captured_variables_keep_declaration_order() {
    let tree = siblings_tree();
    let analysis = CaptureAnalysis::analyze(&tree).unwrap();
    let pair = decl(&tree, "pair");

    assert_eq!(
        analysis.summary(pair).unwrap().captured,
        vec![var(&tree, "pair.p"), var(&tree, "pair.q")]
    );
    assert!(analysis.is_frame_needed(decl(&tree, "pair.left")));
    assert!(analysis.is_frame_needed(decl(&tree, "pair.right")));
}

#[test]
fn methods_reading_enclosing_locals_force_an_outer_link() {
    let tree = instance_tree();
    let analysis = CaptureAnalysis::analyze(&tree).unwrap();
    let f = decl(&tree, "f");
    let counter = decl(&tree, "f.Counter");

    assert!(analysis.needs_outer(counter));
    assert!(analysis.is_frame_needed(f));
    assert!(analysis.is_captured(var(&tree, "f.x")));

    // Fields live in the instance, they are never captured
    assert!(!analysis.is_captured(var(&tree, "f.Counter.step")));
    assert!(!analysis.is_frame_needed(counter));
    assert!(analysis.is_carrier(&tree, counter));
}

#[test]
fn context_only_references_never_create_frames() {
    let mut builder = DeclTreeBuilder::new();
    let f = builder.function("f", None, ValueType::Int);
    let one = builder.function("one", Some(f), ValueType::Int);
    builder.set_body(one, vec![Stmt::ret(Expr::Int(1))]);
    let two = builder.function("two", Some(f), ValueType::Int);
    builder.set_body(
        two,
        vec![Stmt::ret(Expr::add(Expr::call(one, vec![]), Expr::Int(1)))],
    );
    builder.set_body(f, vec![Stmt::ret(Expr::call(two, vec![]))]);
    let tree = builder.finish().unwrap();

    let analysis = CaptureAnalysis::analyze(&tree).unwrap();
    assert_eq!(analysis.captured_count(), 0);
    assert!(!analysis.is_frame_needed(f));
    assert_eq!(analysis.nearest_carrier(&tree, two), None);
    assert!(analysis.report(&tree).is_empty());
}

#[test]
fn calling_an_enclosing_helper_from_a_method_links_the_instance_outward() {
    let mut builder = DeclTreeBuilder::new();
    let f = builder.function("f", None, ValueType::Int);
    let helper = builder.function("helper", Some(f), ValueType::Int);
    builder.set_body(helper, vec![Stmt::ret(Expr::Int(7))]);

    let k = builder.aggregate("K", Some(f), AggregateKind::Class);
    let m = builder.method("m", k, ValueType::Int);
    builder.set_body(m, vec![Stmt::ret(Expr::call(helper, vec![]))]);
    builder.set_body(
        f,
        vec![Stmt::ret(Expr::method_call(
            Expr::new_instance(k, vec![]),
            m,
            vec![],
        ))],
    );
    let tree = builder.finish().unwrap();

    let analysis = CaptureAnalysis::analyze(&tree).unwrap();
    assert!(analysis.needs_outer(k));
    assert!(!analysis.is_frame_needed(f));
}

#[test]
fn reading_a_variable_of_a_non_ancestor_is_an_internal_error() {
    let mut builder = DeclTreeBuilder::new();
    let first = builder.function("first", None, ValueType::Unit);
    let a = builder.local(first, "a", ValueType::Int);
    let second = builder.function("second", None, ValueType::Int);
    builder.set_body(second, vec![Stmt::ret(Expr::var(a))]);
    let tree = builder.finish().unwrap();

    let error = CaptureAnalysis::analyze(&tree).expect_err("foreign variable");
    assert_eq!(error.error_type, ErrorType::Compiler);
    assert_eq!(
        error.metadata.get(&ErrorMetaDataKey::Variable).map(String::as_str),
        Some("first.a")
    );
    assert_eq!(
        error.metadata.get(&ErrorMetaDataKey::UseSite).map(String::as_str),
        Some("second")
    );
}

#[test]
fn report_lists_frames_captures_and_reach() {
    let tree = counter_tree();
    let report = CaptureAnalysis::analyze(&tree).unwrap().report(&tree);

    assert_eq!(
        report,
        "outer [frame]\n    captures: outer.a\nouter.inc\n    reaches: outer\n"
    );
}
