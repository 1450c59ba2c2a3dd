//! Type pool and named types.
//!
//! Every type lives in a [`TypePool`] and is referenced by a [`TypeId`].
//! Primitive types have fixed ids. Structural containers (unnamed tuples,
//! lists, dicts, optionals) are interned so equal shapes share an id.
//! Nominal types (classes, interfaces, named tuples) are never interned:
//! two classes may carry the same qualified name and still be distinct,
//! which is exactly the collision the exporter's type namer resolves.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::{Function, QualifiedName};

// ── Type ids ────────────────────────────────────────────────────────

/// Index into a [`TypePool`]. Type identity is id equality.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeId(u32);

impl TypeId {
    pub const TENSOR: Self = Self(0);
    pub const INT: Self = Self(1);
    pub const FLOAT: Self = Self(2);
    pub const BOOL: Self = Self(3);
    pub const STR: Self = Self(4);
    pub const NONE: Self = Self(5);
    pub const ANY: Self = Self(6);

    /// Number of pre-allocated primitive types.
    pub const PRIMITIVE_COUNT: u32 = 7;

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

// ── Nominal types ───────────────────────────────────────────────────

/// How a class attribute participates in module state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Parameter,
    Buffer,
    /// A nested sub-module.
    Module,
    Plain,
}

/// One attribute slot of a class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub ty: TypeId,
    pub kind: AttributeKind,
}

/// A user-defined class.
///
/// Attribute order defines object slot order.
#[derive(Clone, Debug)]
pub struct ClassType {
    pub name: QualifiedName,
    pub attributes: Vec<Attribute>,
    pub methods: Vec<Rc<Function>>,
    /// Module classes render with parameter/buffer bookkeeping.
    pub is_module: bool,
}

impl ClassType {
    pub fn new(name: impl Into<QualifiedName>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            methods: Vec::new(),
            is_module: false,
        }
    }

    /// A class that represents a module (has parameters, buffers, sub-modules).
    pub fn module(name: impl Into<QualifiedName>) -> Self {
        Self {
            is_module: true,
            ..Self::new(name)
        }
    }

    /// Builder-style attribute append.
    #[must_use]
    pub fn with_attribute(mut self, name: &str, ty: TypeId, kind: AttributeKind) -> Self {
        self.attributes.push(Attribute {
            name: name.to_owned(),
            ty,
            kind,
        });
        self
    }

    /// Slot index of the attribute called `name`.
    pub fn attribute_slot(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|attr| attr.name == name)
    }

    pub fn find_method(&self, name: &str) -> Option<&Rc<Function>> {
        self.methods.iter().find(|m| m.name().name() == name)
    }

    /// The `__getstate__`/`__setstate__` pair, if both exist with
    /// compatible signatures.
    ///
    /// `__getstate__(self) -> T` and `__setstate__(self, T) -> None`.
    pub fn valid_state_pair(&self) -> Option<(&Rc<Function>, &Rc<Function>)> {
        let getstate = self.find_method("__getstate__")?;
        let setstate = self.find_method("__setstate__")?;

        let get_sig = getstate.signature();
        let set_sig = setstate.signature();
        if get_sig.inputs.len() != 1 || get_sig.outputs.len() != 1 {
            return None;
        }
        if set_sig.inputs.len() != 2 || set_sig.outputs.len() != 1 {
            return None;
        }
        if set_sig.inputs[1] != get_sig.outputs[0] || set_sig.outputs[0] != TypeId::NONE {
            return None;
        }
        Some((getstate, setstate))
    }
}

/// An interface: a named set of method signatures, dispatched virtually.
#[derive(Clone, Debug)]
pub struct InterfaceType {
    pub name: QualifiedName,
    /// Builtin-bodied functions carrying only signatures.
    pub methods: Vec<Rc<Function>>,
}

/// Field names and qualified name of a named tuple.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedTupleSchema {
    pub name: QualifiedName,
    pub fields: Vec<String>,
}

// ── Type kinds ──────────────────────────────────────────────────────

/// The shape of one type in the pool.
#[derive(Clone, Debug)]
pub enum TypeKind {
    Tensor,
    Int,
    Float,
    Bool,
    Str,
    NoneType,
    Any,
    Tuple {
        elements: Vec<TypeId>,
        /// Present only for named tuples.
        schema: Option<NamedTupleSchema>,
    },
    List(TypeId),
    Dict(TypeId, TypeId),
    Optional(TypeId),
    Class(ClassType),
    Interface(InterfaceType),
}

/// Interning key for structural (unnamed) container types.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum StructuralKey {
    Tuple(Vec<TypeId>),
    List(TypeId),
    Dict(TypeId, TypeId),
    Optional(TypeId),
}

// ── Pool ────────────────────────────────────────────────────────────

/// Arena of all types referenced by one module.
#[derive(Clone, Debug)]
pub struct TypePool {
    types: Vec<TypeKind>,
    structural: FxHashMap<StructuralKey, TypeId>,
}

impl Default for TypePool {
    fn default() -> Self {
        Self::new()
    }
}

impl TypePool {
    /// Create a pool with the primitive types pre-allocated at their fixed ids.
    pub fn new() -> Self {
        Self {
            types: vec![
                TypeKind::Tensor,
                TypeKind::Int,
                TypeKind::Float,
                TypeKind::Bool,
                TypeKind::Str,
                TypeKind::NoneType,
                TypeKind::Any,
            ],
            structural: FxHashMap::default(),
        }
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "type counts never exceed u32"
    )]
    fn push(&mut self, kind: TypeKind) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(kind);
        id
    }

    fn intern(&mut self, key: StructuralKey, kind: TypeKind) -> TypeId {
        if let Some(&id) = self.structural.get(&key) {
            return id;
        }
        let id = self.push(kind);
        self.structural.insert(key, id);
        id
    }

    pub fn tuple(&mut self, elements: Vec<TypeId>) -> TypeId {
        self.intern(
            StructuralKey::Tuple(elements.clone()),
            TypeKind::Tuple {
                elements,
                schema: None,
            },
        )
    }

    pub fn named_tuple(
        &mut self,
        name: impl Into<QualifiedName>,
        fields: Vec<(String, TypeId)>,
    ) -> TypeId {
        let (field_names, elements) = fields.into_iter().unzip();
        self.push(TypeKind::Tuple {
            elements,
            schema: Some(NamedTupleSchema {
                name: name.into(),
                fields: field_names,
            }),
        })
    }

    pub fn list(&mut self, element: TypeId) -> TypeId {
        self.intern(StructuralKey::List(element), TypeKind::List(element))
    }

    pub fn dict(&mut self, key: TypeId, value: TypeId) -> TypeId {
        self.intern(StructuralKey::Dict(key, value), TypeKind::Dict(key, value))
    }

    pub fn optional(&mut self, inner: TypeId) -> TypeId {
        self.intern(StructuralKey::Optional(inner), TypeKind::Optional(inner))
    }

    pub fn add_class(&mut self, class: ClassType) -> TypeId {
        self.push(TypeKind::Class(class))
    }

    pub fn add_interface(&mut self, interface: InterfaceType) -> TypeId {
        self.push(TypeKind::Interface(interface))
    }

    #[inline]
    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.types[id.index()]
    }

    pub fn class(&self, id: TypeId) -> Option<&ClassType> {
        match self.kind(id) {
            TypeKind::Class(class) => Some(class),
            _ => None,
        }
    }

    /// Mutable class access, used to attach methods once their graphs
    /// (which refer back to the class id) have been built.
    pub fn class_mut(&mut self, id: TypeId) -> Option<&mut ClassType> {
        match &mut self.types[id.index()] {
            TypeKind::Class(class) => Some(class),
            _ => None,
        }
    }

    pub fn interface(&self, id: TypeId) -> Option<&InterfaceType> {
        match self.kind(id) {
            TypeKind::Interface(interface) => Some(interface),
            _ => None,
        }
    }

    /// Qualified name of a named type (class, interface, named tuple).
    pub fn named_type_name(&self, id: TypeId) -> Option<&QualifiedName> {
        match self.kind(id) {
            TypeKind::Class(class) => Some(&class.name),
            TypeKind::Interface(interface) => Some(&interface.name),
            TypeKind::Tuple {
                schema: Some(schema),
                ..
            } => Some(&schema.name),
            _ => None,
        }
    }

    #[inline]
    pub fn is_named(&self, id: TypeId) -> bool {
        self.named_type_name(id).is_some()
    }

    #[inline]
    pub fn is_class(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Class(_))
    }

    /// Directly contained types (container elements, not class attributes).
    pub fn contained_types(&self, id: TypeId) -> Vec<TypeId> {
        match self.kind(id) {
            TypeKind::Tuple { elements, .. } => elements.clone(),
            TypeKind::List(elem) | TypeKind::Optional(elem) => vec![*elem],
            TypeKind::Dict(key, value) => vec![*key, *value],
            _ => Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Render a type annotation using raw qualified names.
    pub fn annotation_str(&self, id: TypeId) -> String {
        self.annotation_str_with(id, &|_| None)
    }

    /// Render a type annotation; `printer` may override how named types print.
    pub fn annotation_str_with(
        &self,
        id: TypeId,
        printer: &dyn Fn(TypeId) -> Option<String>,
    ) -> String {
        let mut buf = String::new();
        self.annotation_into(id, printer, &mut buf);
        buf
    }

    fn annotation_into(
        &self,
        id: TypeId,
        printer: &dyn Fn(TypeId) -> Option<String>,
        buf: &mut String,
    ) {
        if self.is_named(id) {
            if let Some(printed) = printer(id) {
                buf.push_str(&printed);
                return;
            }
        }
        match self.kind(id) {
            TypeKind::Tensor => buf.push_str("Tensor"),
            TypeKind::Int => buf.push_str("int"),
            TypeKind::Float => buf.push_str("float"),
            TypeKind::Bool => buf.push_str("bool"),
            TypeKind::Str => buf.push_str("str"),
            TypeKind::NoneType => buf.push_str("NoneType"),
            TypeKind::Any => buf.push_str("Any"),
            TypeKind::Tuple {
                schema: Some(schema),
                ..
            } => buf.push_str(&schema.name.qualified_name()),
            TypeKind::Tuple {
                elements,
                schema: None,
            } => {
                buf.push_str("Tuple[");
                if elements.is_empty() {
                    buf.push_str("()");
                }
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        buf.push_str(", ");
                    }
                    self.annotation_into(*elem, printer, buf);
                }
                buf.push(']');
            }
            TypeKind::List(elem) => {
                buf.push_str("List[");
                self.annotation_into(*elem, printer, buf);
                buf.push(']');
            }
            TypeKind::Dict(key, value) => {
                buf.push_str("Dict[");
                self.annotation_into(*key, printer, buf);
                buf.push_str(", ");
                self.annotation_into(*value, printer, buf);
                buf.push(']');
            }
            TypeKind::Optional(inner) => {
                buf.push_str("Optional[");
                self.annotation_into(*inner, printer, buf);
                buf.push(']');
            }
            TypeKind::Class(class) => buf.push_str(&class.name.qualified_name()),
            TypeKind::Interface(interface) => buf.push_str(&interface.name.qualified_name()),
        }
    }
}

#[cfg(test)]
mod tests;
