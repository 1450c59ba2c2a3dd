//! Shared fixtures for the lowering tests.
//!
//! Builds small modules the way a frontend would: allocate the classes,
//! build method graphs against the class ids, then attach the methods.
//! Only compiled in test builds.

use std::rc::Rc;

use mobex_ir::{
    AttributeKind, ClassType, Function, Graph, GraphBuilder, Module, Object, SourceRange, Tensor,
    TypeId, TypePool, Value, ValueId,
};

/// Attach a graph method to `class` and return it.
pub(crate) fn add_method(
    pool: &mut TypePool,
    class: TypeId,
    name: &str,
    graph: Graph,
) -> Rc<Function> {
    let owner = pool.class(class).expect("class").name.qualified_name();
    let function = Rc::new(Function::graph(format!("{owner}.{name}").as_str(), graph));
    pool.class_mut(class)
        .expect("class")
        .methods
        .push(Rc::clone(&function));
    function
}

/// `forward(self, x) = aten::add.Tensor(x, self.weight, 1)`
pub(crate) fn add_forward(class: TypeId) -> Graph {
    let mut b = GraphBuilder::new();
    let this = b.input(class, "self");
    let x = b.input(TypeId::TENSOR, "x");
    let weight = b.get_attr(this, "weight", TypeId::TENSOR);
    let alpha = b.constant(1i64, TypeId::INT);
    let y = b.op("aten::add", "Tensor", &[x, weight, alpha], TypeId::TENSOR);
    b.finish(&[y])
}

/// `Model { weight }` with the [`add_forward`] method.
pub(crate) fn simple_module() -> Module {
    let mut pool = TypePool::new();
    let model = pool.add_class(ClassType::module("__torch__.Model").with_attribute(
        "weight",
        TypeId::TENSOR,
        AttributeKind::Parameter,
    ));
    add_method(&mut pool, model, "forward", add_forward(model));
    let weight = Value::from(Tensor::new(&[2], &[1.0f32, 2.0]));
    Module::new(pool, Object::new(model, vec![weight])).expect("module")
}

/// `Model { sub: Sub }` whose forward calls `self.sub.forward(x)` at
/// `model.py:10:8`; `Sub.forward` applies `aten::relu` at `sub.py:3:4`.
pub(crate) fn nested_module() -> Module {
    let mut pool = TypePool::new();
    let sub = pool.add_class(ClassType::module("__torch__.Sub"));
    let model = pool.add_class(ClassType::module("__torch__.Model").with_attribute(
        "sub",
        sub,
        AttributeKind::Module,
    ));

    let mut b = GraphBuilder::new();
    b.input(sub, "self");
    let x = b.input(TypeId::TENSOR, "x");
    b.at(SourceRange::new("sub.py", 3, 4));
    let y = b.op("aten::relu", "", &[x], TypeId::TENSOR);
    add_method(&mut pool, sub, "forward", b.finish(&[y]));

    let mut b = GraphBuilder::new();
    let this = b.input(model, "self");
    let x = b.input(TypeId::TENSOR, "x");
    let child = b.get_attr(this, "sub", sub);
    b.at(SourceRange::new("model.py", 10, 8));
    let y = b.call_method(child, "forward", &[x], TypeId::TENSOR);
    add_method(&mut pool, model, "forward", b.finish(&[y]));

    let child = Value::object(Object::new(sub, Vec::new()));
    Module::new(pool, Object::new(model, vec![child])).expect("module")
}

/// Give `class` a `__getstate__(self) -> int` / `__setstate__(self, int) -> None`
/// pair.
pub(crate) fn add_state_pair(pool: &mut TypePool, class: TypeId) {
    let mut b = GraphBuilder::new();
    b.input(class, "self");
    let state = b.constant(0i64, TypeId::INT);
    add_method(pool, class, "__getstate__", b.finish(&[state]));

    let mut b = GraphBuilder::new();
    b.input(class, "self");
    b.input(TypeId::INT, "state");
    let none = b.constant(Value::None, TypeId::NONE);
    add_method(pool, class, "__setstate__", b.finish(&[none]));
}

/// A module whose only method is `forward(self) -> <ty>` built by `body`.
pub(crate) fn module_with_forward(
    mut pool: TypePool,
    class: TypeId,
    slots: Vec<Value>,
    body: impl FnOnce(&mut GraphBuilder, ValueId) -> Vec<ValueId>,
) -> Module {
    let mut b = GraphBuilder::new();
    let this = b.input(class, "self");
    let outputs = body(&mut b, this);
    add_method(&mut pool, class, "forward", b.finish(&outputs));
    Module::new(pool, Object::new(class, slots)).expect("module")
}
