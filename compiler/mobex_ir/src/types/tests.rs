use std::rc::Rc;

use pretty_assertions::assert_eq;

use super::*;
use crate::{GraphBuilder, Signature, Value};

#[test]
fn primitives_have_fixed_ids() {
    let pool = TypePool::new();
    assert!(matches!(pool.kind(TypeId::TENSOR), TypeKind::Tensor));
    assert!(matches!(pool.kind(TypeId::NONE), TypeKind::NoneType));
    assert_eq!(pool.len(), TypeId::PRIMITIVE_COUNT as usize);
}

#[test]
fn structural_types_are_interned() {
    let mut pool = TypePool::new();
    let a = pool.list(TypeId::INT);
    let b = pool.list(TypeId::INT);
    let c = pool.list(TypeId::FLOAT);
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(pool.tuple(vec![TypeId::INT, a]), pool.tuple(vec![TypeId::INT, a]));
}

#[test]
fn named_types_are_never_interned() {
    let mut pool = TypePool::new();
    let a = pool.add_class(ClassType::new("m.Foo"));
    let b = pool.add_class(ClassType::new("m.Foo"));
    let n1 = pool.named_tuple("m.Pair", vec![("a".into(), TypeId::INT)]);
    let n2 = pool.named_tuple("m.Pair", vec![("a".into(), TypeId::INT)]);
    assert_ne!(a, b);
    assert_ne!(n1, n2);
    assert!(pool.is_named(a));
    assert!(pool.is_named(n1));
    let t = pool.tuple(vec![TypeId::INT]);
    assert!(!pool.is_named(t));
}

#[test]
fn annotation_strings() {
    let mut pool = TypePool::new();
    let class = pool.add_class(ClassType::new("__module__.Sub"));
    let list = pool.list(class);
    let dict = pool.dict(TypeId::STR, TypeId::TENSOR);
    let opt = pool.optional(TypeId::INT);
    let tup = pool.tuple(vec![TypeId::INT, dict]);
    assert_eq!(pool.annotation_str(list), "List[__module__.Sub]");
    assert_eq!(pool.annotation_str(opt), "Optional[int]");
    assert_eq!(pool.annotation_str(tup), "Tuple[int, Dict[str, Tensor]]");
    assert_eq!(
        pool.annotation_str_with(list, &|_| Some("Renamed".to_owned())),
        "List[Renamed]"
    );
}

#[test]
fn valid_state_pair_requires_matching_signatures() {
    let mut pool = TypePool::new();
    let class = pool.add_class(ClassType::new("m.Stateful"));
    let state_ty = pool.tuple(vec![TypeId::TENSOR, TypeId::INT]);

    let getstate = Function::builtin(
        "m.Stateful.__getstate__",
        Signature {
            inputs: vec![class],
            outputs: vec![state_ty],
        },
    );

    let mut b = GraphBuilder::new();
    let _self = b.input(class, "self");
    let _state = b.input(state_ty, "state");
    let none = b.constant(Value::None, TypeId::NONE);
    let setstate = Function::graph("m.Stateful.__setstate__", b.finish(&[none]));

    let c = pool.class_mut(class).expect("class");
    c.methods.push(Rc::new(getstate));
    assert!(c.valid_state_pair().is_none(), "setstate missing");
    c.methods.push(Rc::new(setstate));
    assert!(c.valid_state_pair().is_some());

    let mismatched = Function::builtin(
        "m.Stateful.__getstate__",
        Signature {
            inputs: vec![class],
            outputs: vec![TypeId::INT],
        },
    );
    c.methods[0] = Rc::new(mismatched);
    assert!(c.valid_state_pair().is_none());
}

#[test]
fn attribute_slots_follow_declaration_order() {
    let class = ClassType::module("m.Net")
        .with_attribute("weight", TypeId::TENSOR, AttributeKind::Parameter)
        .with_attribute("steps", TypeId::INT, AttributeKind::Plain);
    assert!(class.is_module);
    assert_eq!(class.attribute_slot("steps"), Some(1));
    assert_eq!(class.attribute_slot("missing"), None);
}
