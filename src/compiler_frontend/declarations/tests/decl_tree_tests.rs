#![cfg(test)]

use crate::compiler_frontend::compiler_messages::compiler_errors::ErrorType;
use crate::compiler_frontend::declarations::decl_builder::DeclTreeBuilder;
use crate::compiler_frontend::declarations::decl_nodes::{
    AggregateKind, BinOp, DeclId, Expr, Stmt, ValueType, VarKind,
};
use crate::compiler_frontend::declarations::tests::test_trees::{
    decl, instance_tree, siblings_tree, var,
};

#[test]
fn builder_keeps_parent_and_children_in_sync() {
    let tree = siblings_tree();
    let pair = decl(&tree, "pair");
    let left = decl(&tree, "pair.left");
    let right = decl(&tree, "pair.right");

    assert_eq!(tree.decl(pair).unwrap().children, vec![left, right]);
    assert_eq!(tree.parent(left), Some(pair));
    assert_eq!(tree.parent(pair), None);
    assert_eq!(tree.depth(decl(&tree, "pair.right.peek")), 2);
}

#[test]
fn preorder_visits_parents_before_children_in_declaration_order() {
    let tree = siblings_tree();
    let names: Vec<String> = tree
        .preorder()
        .into_iter()
        .map(|id| tree.qualified_name(id))
        .collect();

    assert_eq!(
        names,
        vec!["pair", "pair.left", "pair.left.peek", "pair.right", "pair.right.peek"]
    );
}

#[test]
fn qualified_names_resolve_back_to_declarations() {
    let tree = instance_tree();
    let bump = decl(&tree, "f.Counter.bump");

    assert!(tree.is_method(bump));
    assert!(tree.is_aggregate(decl(&tree, "f.Counter")));
    assert_eq!(tree.variable_name(var(&tree, "f.Counter.step")), "f.Counter.step");
    assert_eq!(tree.find_by_path("f.Missing"), None);
}

#[test]
fn ancestors_walk_to_the_root() {
    let tree = siblings_tree();
    let peek = decl(&tree, "pair.left.peek");
    let ancestors: Vec<DeclId> = tree.ancestors(peek).collect();

    assert_eq!(ancestors, vec![decl(&tree, "pair.left"), decl(&tree, "pair")]);
    assert!(tree.is_ancestor_or_self(decl(&tree, "pair"), peek));
    assert!(!tree.is_ancestor_or_self(decl(&tree, "pair.right"), peek));
}

#[test]
fn expression_types_follow_declarations() {
    let tree = instance_tree();
    let counter = decl(&tree, "f.Counter");
    let bump = decl(&tree, "f.Counter.bump");
    let c = var(&tree, "f.c");

    assert_eq!(
        tree.expr_type(&Expr::var(c)).unwrap(),
        ValueType::Instance(counter)
    );
    assert_eq!(
        tree.expr_type(&Expr::method_call(Expr::var(c), bump, vec![]))
            .unwrap(),
        ValueType::Int
    );
    assert_eq!(
        tree.expr_type(&Expr::binary(BinOp::Lt, Expr::Int(1), Expr::Int(2)))
            .unwrap(),
        ValueType::Bool
    );
}

#[test]
fn display_lists_nesting_and_variables() {
    let text = instance_tree().to_string();

    assert!(text.contains("fn f -> Int"));
    assert!(text.contains("  param x: Int"));
    assert!(text.contains("  Class Counter"));
    assert!(text.contains("    field step: Int"));
    assert!(text.contains("    fn bump -> Int"));
}

// ----------------------------------------------------------------------
// Validation
// ----------------------------------------------------------------------

#[test]
fn unit_variables_are_rejected() {
    let mut builder = DeclTreeBuilder::new();
    let f = builder.function("f", None, ValueType::Unit);
    builder.local(f, "nothing", ValueType::Unit);

    let error = builder.finish().expect_err("Unit locals must be rejected");
    assert_eq!(error.error_type, ErrorType::Program);
    assert!(error.msg.contains("Unit"));
}

#[test]
fn params_after_locals_are_rejected() {
    let mut builder = DeclTreeBuilder::new();
    let f = builder.function("f", None, ValueType::Int);
    builder.local(f, "a", ValueType::Int);
    builder.param(f, "late", ValueType::Int);

    let error = builder.finish().expect_err("late params must be rejected");
    assert!(error.msg.contains("after a local"));
}

#[test]
fn let_of_another_functions_local_is_rejected() {
    let mut builder = DeclTreeBuilder::new();
    let outer = builder.function("outer", None, ValueType::Unit);
    let a = builder.local(outer, "a", ValueType::Int);
    let inner = builder.function("inner", Some(outer), ValueType::Unit);
    builder.set_body(
        inner,
        vec![Stmt::Let {
            var: a,
            value: Expr::Int(1),
        }],
    );

    let error = builder.finish().expect_err("let of a captured local must be rejected");
    assert_eq!(error.error_type, ErrorType::Program);
    assert!(error.msg.contains("can only be bound by a let"));
}

#[test]
fn call_arity_is_checked() {
    let mut builder = DeclTreeBuilder::new();
    let callee = builder.function("callee", None, ValueType::Int);
    builder.param(callee, "v", ValueType::Int);
    builder.set_body(callee, vec![Stmt::ret(Expr::Int(0))]);

    let caller = builder.function("caller", None, ValueType::Unit);
    builder.set_body(caller, vec![Stmt::Expr(Expr::call(callee, vec![]))]);

    let error = builder.finish().expect_err("missing arguments must be rejected");
    assert!(error.msg.contains("takes 1 arguments but 0 were given"));
}

#[test]
fn methods_need_a_receiver_and_functions_refuse_one() {
    let mut builder = DeclTreeBuilder::new();
    let shape = builder.aggregate("Shape", None, AggregateKind::Struct);
    let area = builder.method("area", shape, ValueType::Int);
    builder.set_body(area, vec![Stmt::ret(Expr::Int(1))]);

    let main = builder.function("main", None, ValueType::Int);
    builder.set_body(main, vec![Stmt::ret(Expr::call(area, vec![]))]);

    let error = builder.finish().expect_err("method called without receiver");
    assert!(error.msg.contains("needs a receiver"));
}

#[test]
fn construction_needs_one_initializer_per_field() {
    let mut builder = DeclTreeBuilder::new();
    let point = builder.aggregate("Point", None, AggregateKind::Struct);
    builder.field(point, "x", ValueType::Int);
    builder.field(point, "y", ValueType::Int);

    let main = builder.function("main", None, ValueType::Unit);
    builder.set_body(
        main,
        vec![Stmt::Expr(Expr::new_instance(point, vec![Expr::Int(1)]))],
    );

    let error = builder.finish().expect_err("short initializer list");
    assert!(error.msg.contains("has 2 fields but 1 initializers"));
}

#[test]
fn methods_cannot_be_function_values() {
    let mut builder = DeclTreeBuilder::new();
    let shape = builder.aggregate("Shape", None, AggregateKind::Class);
    let area = builder.method("area", shape, ValueType::Int);
    builder.set_body(area, vec![Stmt::ret(Expr::Int(1))]);

    let main = builder.function("main", None, ValueType::Unit);
    builder.set_body(main, vec![Stmt::Expr(Expr::FunctionRef(area))]);

    let error = builder.finish().expect_err("method used as a value");
    assert!(error.msg.contains("can be used as values"));
}

#[test]
fn builder_misuse_is_reported_on_finish() {
    let mut builder = DeclTreeBuilder::new();
    let shape = builder.aggregate("Shape", None, AggregateKind::Struct);
    builder.param(shape, "oops", ValueType::Int);

    let error = builder.finish().expect_err("params on aggregates are misuse");
    assert_eq!(error.error_type, ErrorType::Program);
}

#[test]
fn instance_types_must_name_aggregates() {
    let mut builder = DeclTreeBuilder::new();
    let f = builder.function("f", None, ValueType::Unit);
    builder.local(f, "bad", ValueType::Instance(f));

    let error = builder.finish().expect_err("instance of a function");
    assert!(error.msg.contains("not an aggregate"));
}

#[test]
fn hand_edited_parent_links_are_caught() {
    let mut tree = siblings_tree();
    let left = decl(&tree, "pair.left");
    let right = decl(&tree, "pair.right");
    tree.declarations[left.0 as usize].parent = Some(right);

    let error = tree.validate().expect_err("inconsistent parent link");
    assert_eq!(error.error_type, ErrorType::Program);
}

#[test]
fn variables_keep_their_kinds() {
    let tree = instance_tree();

    assert_eq!(tree.variable(var(&tree, "f.x")).unwrap().kind, VarKind::Param);
    assert_eq!(tree.variable(var(&tree, "f.c")).unwrap().kind, VarKind::Local);
    assert_eq!(
        tree.variable(var(&tree, "f.Counter.step")).unwrap().kind,
        VarKind::Field
    );
}
