//! Data model for the mobile module exporter.
//!
//! This crate provides:
//!
//! - **Types** ([`TypePool`], [`TypeId`], [`TypeKind`]): an arena of
//!   structural and nominal types. Classes, interfaces and named tuples are
//!   the *named* types that receive generated source files on export.
//!
//! - **Values** ([`Value`], [`Tensor`], [`Object`]): tagged runtime values
//!   making up module state and graph constants.
//!
//! - **Modules** ([`Module`]): a root object whose class carries the
//!   exported methods, plus the type pool everything refers to.
//!
//! - **Graph IR** ([`Graph`], [`Node`], [`NodeKind`], [`GraphBuilder`]):
//!   one method body, with optional source-range and inlined call-stack
//!   metadata per node.
//!
//! - **Linear code** ([`Code`], [`Instruction`], [`OpCode`]): the
//!   register-machine form produced by a graph compiler.
//!
//! # Crate Dependencies
//!
//! Nothing in here knows about archives or pickling. `mobex_lower` turns
//! graphs into bytecode tables, `mobex_export` packages them.

mod code;
mod function;
pub mod graph;
mod module;
mod name;
mod source;
mod tensor;
pub mod types;
mod value;

pub use code::{Code, Instruction, OpCode};
pub use function::{Function, FunctionBody, Signature};
pub use graph::{Block, Graph, GraphBuilder, Node, NodeId, NodeKind, OperatorName, ValueId, ValueInfo};
pub use module::{Module, ModuleError};
pub use name::QualifiedName;
pub use source::{CallStackEntry, InlinedCallStack, ModuleInstanceInfo, SourceRange};
pub use tensor::{DType, Element, Tensor};
pub use types::{
    Attribute, AttributeKind, ClassType, InterfaceType, NamedTupleSchema, TypeId, TypeKind,
    TypePool,
};
pub use value::{Object, Value};
