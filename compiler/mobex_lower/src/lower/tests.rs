use std::rc::Rc;

use mobex_ir::{
    AttributeKind, ClassType, Function, Instruction, InterfaceType, OpCode, Signature, TypeId,
    TypePool, Value,
};
use pretty_assertions::assert_eq;

use super::{is_op_supported_in_mobile, lower_function};
use crate::test_helpers::{module_with_forward, nested_module, simple_module};
use crate::LowerError;

#[test]
fn call_is_not_on_the_allow_list() {
    assert!(!is_op_supported_in_mobile(OpCode::Call));
    assert!(!is_op_supported_in_mobile(OpCode::CreateObject));
    assert!(!is_op_supported_in_mobile(OpCode::IsInstance));
    assert!(is_op_supported_in_mobile(OpCode::InterfaceCall));
    assert!(is_op_supported_in_mobile(OpCode::NamedTupleConstruct));
}

#[test]
fn simple_forward_tables() {
    let module = simple_module();
    let forward = module.find_method("forward").expect("forward");

    let lowered = lower_function(&module, forward, false).expect("lower");

    let table = &lowered.record.table;
    assert_eq!(lowered.record.name, "__torch__.Model.forward");
    assert_eq!(
        table
            .operators
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>(),
        vec!["aten::add.Tensor"]
    );
    assert_eq!(table.constants, vec![Value::Int(1)]);
    assert!(table.types.is_empty());
    assert_eq!(table.register_size, 4);
    assert_eq!(table.instructions.last(), Some(&Instruction::new(OpCode::Ret, 0, 0)));
    assert!(lowered.debug.is_none());
}

#[test]
fn debug_info_without_call_stack_is_top_level_forward() {
    let module = simple_module();
    let forward = module.find_method("forward").expect("forward");

    let lowered = lower_function(&module, forward, true).expect("lower");

    let debug = lowered.debug.expect("debug record");
    assert_eq!(debug.name, "__torch__.Model.forward");
    assert_eq!(debug.module_debug_info, vec!["top(Model).forward{}"]);
}

#[test]
fn debug_info_follows_inlined_submodule_calls() {
    let module = nested_module();
    let forward = module.find_method("forward").expect("forward");

    let lowered = lower_function(&module, forward, true).expect("lower");

    assert_eq!(
        lowered.record.operator_names().into_iter().collect::<Vec<_>>(),
        vec!["aten::relu"]
    );
    let debug = lowered.debug.expect("debug record");
    assert_eq!(
        debug.module_debug_info,
        vec!["top(Model).sub(Sub).forward{model.py:10:8}"]
    );
}

#[test]
fn interface_call_becomes_interface_call() {
    let mut pool = TypePool::new();
    let run = Rc::new(Function::builtin(
        "__torch__.Runner.run",
        Signature {
            inputs: vec![TypeId::TENSOR],
            outputs: vec![TypeId::TENSOR],
        },
    ));
    let runner = pool.add_interface(InterfaceType {
        name: "__torch__.Runner".into(),
        methods: vec![run],
    });
    let model = pool.add_class(ClassType::module("__torch__.Model").with_attribute(
        "runner",
        runner,
        AttributeKind::Plain,
    ));
    let impl_class = pool.add_class(ClassType::new("__torch__.Impl"));
    let runner_object = Value::object(mobex_ir::Object::new(impl_class, Vec::new()));

    let module = module_with_forward(pool, model, vec![runner_object], |b, this| {
        let r = b.get_attr(this, "runner", runner);
        let scale = b.constant(2.0f64, TypeId::FLOAT);
        let y = b.call_method(r, "run", &[scale], TypeId::TENSOR);
        vec![y]
    });
    let forward = module.find_method("forward").expect("forward");

    let lowered = lower_function(&module, forward, false).expect("lower");
    let table = &lowered.record.table;

    // Method names are appended after the graph constants.
    assert_eq!(table.constants, vec![Value::Double(2.0), Value::str("run")]);
    assert!(table
        .instructions
        .contains(&Instruction::new(OpCode::InterfaceCall, 1, 2)));
    assert!(!table.instructions.iter().any(|i| i.op == OpCode::Call));
}

#[test]
fn named_tuple_return_is_rejected() {
    let mut pool = TypePool::new();
    let pair = pool.named_tuple(
        "__torch__.Pair",
        vec![(String::from("a"), TypeId::INT), (String::from("b"), TypeId::INT)],
    );
    let model = pool.add_class(ClassType::module("__torch__.Model"));
    let module = module_with_forward(pool, model, Vec::new(), |b, _| {
        let one = b.constant(1i64, TypeId::INT);
        vec![b.named_tuple(&[one, one], pair)]
    });
    let forward = module.find_method("forward").expect("forward");

    let err = lower_function(&module, forward, false).expect_err("named tuple");
    assert_eq!(
        err,
        LowerError::NamedTupleReturn {
            function: String::from("__torch__.Model.forward"),
            tuple: String::from("__torch__.Pair"),
        }
    );
    assert!(err.to_string().contains("Workaround"));
}

#[test]
fn list_of_class_return_is_rejected() {
    let mut pool = TypePool::new();
    let point = pool.add_class(ClassType::new("__torch__.Point"));
    let points = pool.list(point);
    let model = pool.add_class(ClassType::module("__torch__.Model").with_attribute(
        "origin",
        point,
        AttributeKind::Plain,
    ));
    let origin = Value::object(mobex_ir::Object::new(point, Vec::new()));
    let module = module_with_forward(pool, model, vec![origin], |b, this| {
        let p = b.get_attr(this, "origin", point);
        vec![b.list(&[p], points)]
    });
    let forward = module.find_method("forward").expect("forward");

    let err = lower_function(&module, forward, false).expect_err("list of class");
    assert_eq!(
        err,
        LowerError::ClassContainerReturn {
            function: String::from("__torch__.Model.forward"),
            container: String::from("List[__torch__.Point]"),
        }
    );
}

#[test]
fn dict_of_primitive_return_is_accepted() {
    let mut pool = TypePool::new();
    let dict = pool.dict(TypeId::STR, TypeId::INT);
    let model = pool.add_class(ClassType::module("__torch__.Model"));
    let module = module_with_forward(pool, model, Vec::new(), |b, _| {
        let k = b.constant("k", TypeId::STR);
        let v = b.constant(3i64, TypeId::INT);
        vec![b.dict(&[(k, v)], dict)]
    });
    let forward = module.find_method("forward").expect("forward");

    let lowered = lower_function(&module, forward, false).expect("lower");
    assert_eq!(lowered.record.table.types, vec!["Dict[str, int]"]);
}

#[test]
fn create_object_is_rejected() {
    let mut pool = TypePool::new();
    let foo = pool.add_class(ClassType::new("__torch__.Foo"));
    let model = pool.add_class(ClassType::module("__torch__.Model"));
    let module = module_with_forward(pool, model, Vec::new(), |b, _| {
        b.create_object(foo);
        vec![b.constant(Value::None, TypeId::NONE)]
    });
    let forward = module.find_method("forward").expect("forward");

    let err = lower_function(&module, forward, false).expect_err("create object");
    assert_eq!(
        err,
        LowerError::CreateObject {
            function: String::from("__torch__.Model.forward"),
            class: String::from("__torch__.Foo"),
        }
    );
}

#[test]
fn isinstance_is_rejected() {
    let mut pool = TypePool::new();
    let model = pool.add_class(ClassType::module("__torch__.Model"));
    let module = module_with_forward(pool, model, Vec::new(), |b, this| {
        vec![b.is_instance(this, &[TypeId::TENSOR])]
    });
    let forward = module.find_method("forward").expect("forward");

    let err = lower_function(&module, forward, false).expect_err("isinstance");
    assert_eq!(
        err,
        LowerError::UnsupportedOpcode {
            function: String::from("__torch__.Model.forward"),
            op: OpCode::IsInstance,
        }
    );
}

#[test]
fn builtin_function_call_is_rejected() {
    let sqrt = Rc::new(Function::builtin("math.sqrt", Signature::default()));
    let mut pool = TypePool::new();
    let model = pool.add_class(ClassType::module("__torch__.Model"));
    let module = module_with_forward(pool, model, Vec::new(), |b, _| {
        let x = b.constant(4.0f64, TypeId::FLOAT);
        vec![b.call_function(&sqrt, &[x], TypeId::FLOAT)]
    });
    let forward = module.find_method("forward").expect("forward");

    let err = lower_function(&module, forward, false).expect_err("builtin call");
    assert_eq!(
        err,
        LowerError::UnsupportedCall {
            function: String::from("__torch__.Model.forward"),
            kind: "prim::CallFunction",
        }
    );
}

#[test]
fn builtin_method_cannot_be_lowered_directly() {
    let builtin = Function::builtin("__torch__.Model.native", Signature::default());
    let module = simple_module();
    let err = lower_function(&module, &builtin, false).expect_err("builtin");
    assert!(matches!(err, LowerError::Compile { .. }));
}
