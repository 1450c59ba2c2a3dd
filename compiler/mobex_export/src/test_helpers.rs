//! Shared fixtures for the export tests. Only compiled in test builds.

use std::rc::Rc;

use mobex_ir::{
    AttributeKind, ClassType, Function, Graph, GraphBuilder, Module, Object, SourceRange, Tensor,
    TypeId, TypePool, Value,
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

/// `Model { weight: [1.0, 2.0] }` with the [`add_forward`] method.
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

/// `Model { weight }` whose forward divides `x` by a tensor literal that
/// shares storage with the weight, at `model.py:4:8`.
pub(crate) fn dividing_module() -> Module {
    let mut pool = TypePool::new();
    let model = pool.add_class(ClassType::module("__torch__.Model").with_attribute(
        "weight",
        TypeId::TENSOR,
        AttributeKind::Parameter,
    ));
    let weight = Tensor::new(&[2], &[1.0f32, 2.0]);

    let mut b = GraphBuilder::new();
    b.input(model, "self");
    let x = b.input(TypeId::TENSOR, "x");
    let scale = b.constant(weight.clone(), TypeId::TENSOR);
    b.at(SourceRange::new("model.py", 4, 8));
    let y = b.op("aten::div", "Tensor", &[x, scale], TypeId::TENSOR);
    add_method(&mut pool, model, "forward", b.finish(&[y]));

    Module::new(pool, Object::new(model, vec![Value::from(weight)])).expect("module")
}

/// `Model { a: Layer, b: Layer }` where the two `Layer` classes are distinct
/// types that share the qualified name `__torch__.Layer`.
pub(crate) fn colliding_module() -> Module {
    let mut pool = TypePool::new();
    let first = pool.add_class(ClassType::module("__torch__.Layer"));
    let second = pool.add_class(ClassType::module("__torch__.Layer"));
    let model = pool.add_class(
        ClassType::module("__torch__.Model")
            .with_attribute("a", first, AttributeKind::Module)
            .with_attribute("b", second, AttributeKind::Module),
    );

    for layer in [first, second] {
        let mut b = GraphBuilder::new();
        b.input(layer, "self");
        let x = b.input(TypeId::TENSOR, "x");
        let y = b.op("aten::relu", "", &[x], TypeId::TENSOR);
        add_method(&mut pool, layer, "forward", b.finish(&[y]));
    }

    let mut b = GraphBuilder::new();
    let this = b.input(model, "self");
    let x = b.input(TypeId::TENSOR, "x");
    let a = b.get_attr(this, "a", first);
    let h = b.call_method(a, "forward", &[x], TypeId::TENSOR);
    let second_layer = b.get_attr(this, "b", second);
    let y = b.call_method(second_layer, "forward", &[h], TypeId::TENSOR);
    add_method(&mut pool, model, "forward", b.finish(&[y]));

    let slots = vec![
        Value::object(Object::new(first, Vec::new())),
        Value::object(Object::new(second, Vec::new())),
    ];
    Module::new(pool, Object::new(model, slots)).expect("module")
}
