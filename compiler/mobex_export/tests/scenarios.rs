//! End-to-end export scenarios.
//!
//! Each test builds a module the way a frontend would, exports it into a
//! [`MemoryArchive`] and reads the archives back through the public API.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use std::rc::Rc;

use mobex_export::{
    decode_bytecode, decode_debug, export_module, unpickle, ExportHooks, ExportOptions,
    ExportReport, ExtraFiles, MemoryArchive,
};
use mobex_ir::{
    AttributeKind, ClassType, Function, Graph, GraphBuilder, Module, Object, OpCode, Tensor,
    TypeId, TypePool, Value,
};
use pretty_assertions::assert_eq;

// -- Fixtures --

fn add_method(pool: &mut TypePool, class: TypeId, name: &str, graph: Graph) {
    let owner = pool.class(class).expect("class").name.qualified_name();
    let function = Rc::new(Function::graph(format!("{owner}.{name}").as_str(), graph));
    pool.class_mut(class).expect("class").methods.push(function);
}

/// `forward(self, x) = aten::mul.Tensor(x, <scale>)` with a tensor literal.
fn scaling_module() -> Module {
    let mut pool = TypePool::new();
    let model = pool.add_class(ClassType::module("__torch__.Model"));
    let mut b = GraphBuilder::new();
    b.input(model, "self");
    let x = b.input(TypeId::TENSOR, "x");
    let scale = b.constant(Tensor::new(&[3], &[0.5f32, 1.5, 2.5]), TypeId::TENSOR);
    let y = b.op("aten::mul", "Tensor", &[x, scale], TypeId::TENSOR);
    add_method(&mut pool, model, "forward", b.finish(&[y]));
    Module::new(pool, Object::new(model, Vec::new())).expect("module")
}

/// `Model { inner: Stateful }`. `Stateful` restores `w` through
/// `__setstate__(self, state) = self.w = aten::relu(state)`.
fn stateful_module() -> Module {
    let mut pool = TypePool::new();
    let stateful = pool.add_class(ClassType::module("__torch__.Stateful").with_attribute(
        "w",
        TypeId::TENSOR,
        AttributeKind::Buffer,
    ));
    let model = pool.add_class(ClassType::module("__torch__.Model").with_attribute(
        "inner",
        stateful,
        AttributeKind::Module,
    ));

    let mut b = GraphBuilder::new();
    let this = b.input(stateful, "self");
    let w = b.get_attr(this, "w", TypeId::TENSOR);
    add_method(&mut pool, stateful, "__getstate__", b.finish(&[w]));

    let mut b = GraphBuilder::new();
    let this = b.input(stateful, "self");
    let state = b.input(TypeId::TENSOR, "state");
    let restored = b.op("aten::relu", "", &[state], TypeId::TENSOR);
    b.set_attr(this, "w", restored);
    let none = b.constant(Value::None, TypeId::NONE);
    add_method(&mut pool, stateful, "__setstate__", b.finish(&[none]));

    let mut b = GraphBuilder::new();
    b.input(model, "self");
    let x = b.input(TypeId::TENSOR, "x");
    let y = b.op("aten::sigmoid", "", &[x], TypeId::TENSOR);
    add_method(&mut pool, model, "forward", b.finish(&[y]));

    let inner = Object::new(stateful, vec![Value::from(Tensor::new(&[1], &[1.0f32]))]);
    Module::new(pool, Object::new(model, vec![Value::object(inner)])).expect("module")
}

fn export(
    module: &Module,
    options: &ExportOptions,
    extra: &ExtraFiles,
    hooks: ExportHooks<'_>,
) -> (MemoryArchive, ExportReport) {
    let mut archive = MemoryArchive::new();
    let report = export_module(module, &mut archive, extra, options, hooks).expect("export");
    (archive, report)
}

fn load(archive: &MemoryArchive, name: &str) -> Value {
    let bytes = archive.get(&format!("{name}.pkl")).expect("archive record");
    unpickle(bytes)
        .expect("unpickle")
        .to_value(&|key| archive.get(&format!("{name}/{key}")).map(<[u8]>::to_vec))
        .expect("rebuild")
}

// -- Scenarios --

#[test]
fn tensor_literal_lives_only_in_constants_archive() {
    let (archive, _) = export(
        &scaling_module(),
        &ExportOptions::default(),
        &ExtraFiles::new(),
        ExportHooks::default(),
    );

    let functions = decode_bytecode(&load(&archive, "bytecode")).expect("decode");
    assert_eq!(functions.len(), 1);
    let forward = &functions[0];
    assert_eq!(forward.name, "__torch__.Model.forward");
    assert_eq!(forward.table.operators.len(), 1);
    assert!(forward.table.constants.is_empty());

    let constants = load(&archive, "constants");
    assert_eq!(
        constants,
        Value::Tuple(vec![Value::from(Tensor::new(&[3], &[0.5f32, 1.5, 2.5]))])
    );
}

#[test]
fn nested_setstate_is_exported_with_aligned_debug_info() {
    let options = ExportOptions {
        debug_info: true,
        ..ExportOptions::default()
    };
    let (archive, report) = export(
        &stateful_module(),
        &options,
        &ExtraFiles::new(),
        ExportHooks::default(),
    );

    assert_eq!(
        report.functions,
        vec!["__torch__.Model.forward", "__torch__.Stateful.__setstate__"]
    );

    let functions = decode_bytecode(&load(&archive, "bytecode")).expect("decode");
    let debug = decode_debug(&load(&archive, "mobile_debug")).expect("decode");
    assert_eq!(functions.len(), 2);
    assert_eq!(debug.len(), 2);
    for (function, info) in functions.iter().zip(&debug) {
        assert_eq!(function.name, info.name);
        let operator_calls = function
            .table
            .instructions
            .iter()
            .filter(|i| matches!(i.op, OpCode::Op | OpCode::OpN))
            .count();
        assert_eq!(info.module_debug_info.len(), operator_calls);
        assert_eq!(operator_calls, 1);
        assert_eq!(info.module_debug_info, vec!["top(Model).forward{}"]);
    }
}

#[test]
fn caller_extra_file_wins_over_hook() {
    let hook = |_: &Module| -> ExtraFiles {
        ExtraFiles::from([("a.txt".to_owned(), b"from hook".to_vec())])
    };
    let extra = ExtraFiles::from([("a.txt".to_owned(), b"from caller".to_vec())]);

    for _ in 0..2 {
        let (archive, report) = export(
            &scaling_module(),
            &ExportOptions::default(),
            &extra,
            ExportHooks {
                extra_files: Some(&hook),
                ..ExportHooks::default()
            },
        );
        let extra_records: Vec<&str> = archive
            .names()
            .filter(|name| name.starts_with("extra/"))
            .collect();
        assert_eq!(extra_records, vec!["extra/a.txt"]);
        assert_eq!(archive.get("extra/a.txt"), Some(&b"from caller"[..]));
        assert_eq!(report.skipped_extra_files, vec!["a.txt"]);
    }
}

#[test]
fn exports_are_deterministic() {
    let module = stateful_module();
    let options = ExportOptions::default();
    let (first, _) = export(&module, &options, &ExtraFiles::new(), ExportHooks::default());
    let (second, _) = export(&module, &options, &ExtraFiles::new(), ExportHooks::default());
    assert_eq!(first.records(), second.records());
}
