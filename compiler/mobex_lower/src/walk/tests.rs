use mobex_ir::{
    AttributeKind, ClassType, GraphBuilder, Module, Object, TypeId, TypePool, Value,
};
use pretty_assertions::assert_eq;

use super::lower_module_default;
use crate::test_helpers::{add_method, add_state_pair, nested_module, simple_module};

fn names(module: &Module, debug: bool) -> Vec<String> {
    lower_module_default(module, debug)
        .expect("lower")
        .functions
        .into_iter()
        .map(|f| f.name)
        .collect()
}

#[test]
fn root_methods_only() {
    assert_eq!(names(&simple_module(), false), vec!["__torch__.Model.forward"]);
    // Sub.forward is inlined, not exported on its own.
    assert_eq!(names(&nested_module(), false), vec!["__torch__.Model.forward"]);
}

/// `Model { a: Stateful, b: Stateful, c: Plain { inner: Inner } }`
fn stateful_module() -> Module {
    let mut pool = TypePool::new();
    let stateful = pool.add_class(ClassType::new("__torch__.Stateful"));
    add_state_pair(&mut pool, stateful);
    let inner = pool.add_class(ClassType::new("__torch__.Inner"));
    add_state_pair(&mut pool, inner);
    let plain = pool.add_class(ClassType::module("__torch__.Plain").with_attribute(
        "inner",
        inner,
        AttributeKind::Plain,
    ));
    let model = pool.add_class(
        ClassType::module("__torch__.Model")
            .with_attribute("a", stateful, AttributeKind::Plain)
            .with_attribute("b", stateful, AttributeKind::Plain)
            .with_attribute("c", plain, AttributeKind::Module),
    );

    let mut b = GraphBuilder::new();
    b.input(model, "self");
    let x = b.input(TypeId::TENSOR, "x");
    add_method(&mut pool, model, "forward", b.finish(&[x]));

    let first = Value::object(Object::new(stateful, Vec::new()));
    let second = Value::object(Object::new(stateful, Vec::new()));
    let inner_obj = Value::object(Object::new(inner, Vec::new()));
    let plain_obj = Value::object(Object::new(plain, vec![inner_obj]));
    Module::new(pool, Object::new(model, vec![first, second, plain_obj])).expect("module")
}

#[test]
fn setstate_is_emitted_once_per_class_in_traversal_order() {
    assert_eq!(
        names(&stateful_module(), false),
        vec![
            "__torch__.Model.forward",
            "__torch__.Stateful.__setstate__",
            "__torch__.Inner.__setstate__",
        ]
    );
}

#[test]
fn debug_records_parallel_functions() {
    let lowered = lower_module_default(&stateful_module(), true).expect("lower");
    assert_eq!(lowered.debug.len(), lowered.functions.len());
    for (function, debug) in lowered.functions.iter().zip(&lowered.debug) {
        assert_eq!(function.name, debug.name);
    }
}

#[test]
fn state_without_matching_getstate_is_traversed() {
    let mut pool = TypePool::new();
    let inner = pool.add_class(ClassType::new("__torch__.Inner"));
    add_state_pair(&mut pool, inner);

    // `__setstate__` alone is not a valid pair, so Half's attributes are
    // visited instead.
    let half = pool.add_class(ClassType::new("__torch__.Half").with_attribute(
        "inner",
        inner,
        AttributeKind::Plain,
    ));
    let mut b = GraphBuilder::new();
    b.input(half, "self");
    b.input(TypeId::INT, "state");
    let none = b.constant(Value::None, TypeId::NONE);
    add_method(&mut pool, half, "__setstate__", b.finish(&[none]));

    let model = pool.add_class(ClassType::module("__torch__.Model").with_attribute(
        "half",
        half,
        AttributeKind::Plain,
    ));
    let inner_obj = Value::object(Object::new(inner, Vec::new()));
    let half_obj = Value::object(Object::new(half, vec![inner_obj]));
    let module = Module::new(pool, Object::new(model, vec![half_obj])).expect("module");

    assert_eq!(names(&module, false), vec!["__torch__.Inner.__setstate__"]);
}

#[test]
fn operator_names_span_all_functions() {
    let lowered = lower_module_default(&nested_module(), false).expect("lower");
    assert_eq!(
        lowered.operator_names().into_iter().collect::<Vec<_>>(),
        vec!["aten::relu"]
    );
}

#[test]
fn setstate_operators_use_the_top_level_trace() {
    let mut pool = TypePool::new();
    let stateful = pool.add_class(ClassType::new("__torch__.Stateful"));

    let mut b = GraphBuilder::new();
    b.input(stateful, "self");
    let state = b.constant(0i64, TypeId::INT);
    add_method(&mut pool, stateful, "__getstate__", b.finish(&[state]));

    let mut b = GraphBuilder::new();
    b.input(stateful, "self");
    let state = b.input(TypeId::INT, "state");
    b.op("aten::neg", "int", &[state], TypeId::INT);
    let none = b.constant(Value::None, TypeId::NONE);
    add_method(&mut pool, stateful, "__setstate__", b.finish(&[none]));

    let model = pool.add_class(ClassType::module("__torch__.Model").with_attribute(
        "inner",
        stateful,
        AttributeKind::Plain,
    ));
    let inner = Value::object(Object::new(stateful, Vec::new()));
    let module = Module::new(pool, Object::new(model, vec![inner])).expect("module");

    let lowered = lower_module_default(&module, true).expect("lower");
    assert_eq!(lowered.debug.len(), 1);
    assert_eq!(lowered.debug[0].name, "__torch__.Stateful.__setstate__");
    assert_eq!(lowered.debug[0].module_debug_info, vec!["top(Model).forward{}"]);
}
