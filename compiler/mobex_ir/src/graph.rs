//! Graph IR for one method body.
//!
//! # Architecture
//!
//! - **[`Graph`]**: owns a value arena, a node arena and the top-level
//!   [`Block`]. The top-level block always ends in a [`NodeKind::Return`].
//! - **[`Node`]**: one operation: kind, input and output values, nested
//!   blocks (for `If`), and optional source-range / call-stack metadata.
//! - **[`Block`]**: an ordered list of nodes with block inputs and outputs.
//!
//! Values are SSA: each [`ValueId`] is either a block input or the output of
//! exactly one node. Nodes live in the arena and blocks refer to them by
//! [`NodeId`], so a graph can be copied and rewritten without touching the
//! original.

mod builder;

use std::fmt;
use std::rc::Rc;

use crate::{Function, InlinedCallStack, SourceRange, TypeId, Value};

pub use builder::GraphBuilder;

// ── ID newtypes ─────────────────────────────────────────────────────

/// Value ID within one [`Graph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ValueId(u32);

impl ValueId {
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Node ID within one [`Graph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ── Operators ───────────────────────────────────────────────────────

/// A registered operator: `aten::add` with overload `Tensor`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperatorName {
    pub name: String,
    /// Empty when the operator has no overloads.
    pub overload: String,
}

impl OperatorName {
    pub fn new(name: &str, overload: &str) -> Self {
        Self {
            name: name.to_owned(),
            overload: overload.to_owned(),
        }
    }
}

/// `name` or `name.overload`.
impl fmt::Display for OperatorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.overload.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}.{}", self.name, self.overload)
        }
    }
}

// ── Nodes ───────────────────────────────────────────────────────────

/// What a node does.
#[derive(Clone, Debug)]
pub enum NodeKind {
    /// A literal. No inputs, one output.
    Constant(Value),
    /// A registered operator call. `vararg` operators receive their argument
    /// count at runtime.
    Operator { name: OperatorName, vararg: bool },
    /// Read attribute `name` of input 0.
    GetAttr { name: String },
    /// Write input 1 into attribute `name` of input 0.
    SetAttr { name: String },
    /// Call method `name` on input 0 with the remaining inputs.
    CallMethod { name: String },
    /// Call a free function.
    CallFunction { function: Rc<Function> },
    TupleConstruct,
    /// Output type is the named tuple.
    NamedTupleConstruct,
    /// Output type is the list type.
    ListConstruct,
    /// Inputs alternate key, value. Output type is the dict type.
    DictConstruct,
    /// Unpack input 0 into the outputs.
    ListUnpack,
    TupleSlice { begin: usize, end: usize },
    /// Allocate an instance of the output's class.
    CreateObject,
    IsInstance { types: Vec<TypeId> },
    Warn,
    /// Input 0 is the condition; blocks are `[then, else]`.
    If,
    /// Graph return; inputs are the graph outputs.
    Return,
}

impl NodeKind {
    /// Qualified kind name, as shown in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeKind::Constant(_) => "prim::Constant",
            NodeKind::Operator { .. } => "aten::op",
            NodeKind::GetAttr { .. } => "prim::GetAttr",
            NodeKind::SetAttr { .. } => "prim::SetAttr",
            NodeKind::CallMethod { .. } => "prim::CallMethod",
            NodeKind::CallFunction { .. } => "prim::CallFunction",
            NodeKind::TupleConstruct => "prim::TupleConstruct",
            NodeKind::NamedTupleConstruct => "prim::NamedTupleConstruct",
            NodeKind::ListConstruct => "prim::ListConstruct",
            NodeKind::DictConstruct => "prim::DictConstruct",
            NodeKind::ListUnpack => "prim::ListUnpack",
            NodeKind::TupleSlice { .. } => "prim::TupleSlice",
            NodeKind::CreateObject => "prim::CreateObject",
            NodeKind::IsInstance { .. } => "prim::isinstance",
            NodeKind::Warn => "aten::warn",
            NodeKind::If => "prim::If",
            NodeKind::Return => "prim::Return",
        }
    }
}

/// One operation in a graph.
#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub inputs: Vec<ValueId>,
    pub outputs: Vec<ValueId>,
    /// Nested blocks (`If` only).
    pub blocks: Vec<Block>,
    pub source_range: Option<SourceRange>,
    /// Set by the inliner on nodes spliced in from a callee.
    pub callstack: Option<InlinedCallStack>,
}

impl Node {
    pub fn new(kind: NodeKind, inputs: Vec<ValueId>, outputs: Vec<ValueId>) -> Self {
        Self {
            kind,
            inputs,
            outputs,
            blocks: Vec::new(),
            source_range: None,
            callstack: None,
        }
    }

    /// The first `N` inputs, or `None` when the node has fewer.
    pub fn operands<const N: usize>(&self) -> Option<[ValueId; N]> {
        self.inputs.get(..N)?.try_into().ok()
    }

    /// The operator name, for operator nodes.
    pub fn operator_name(&self) -> Option<&OperatorName> {
        match &self.kind {
            NodeKind::Operator { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// An ordered list of nodes.
#[derive(Clone, Debug, Default)]
pub struct Block {
    pub inputs: Vec<ValueId>,
    pub nodes: Vec<NodeId>,
    pub outputs: Vec<ValueId>,
}

/// Type and optional debug name of a value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValueInfo {
    pub ty: TypeId,
    pub debug_name: Option<String>,
}

// ── Graph ───────────────────────────────────────────────────────────

/// One method body.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    values: Vec<ValueInfo>,
    nodes: Vec<Node>,
    block: Block,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new value of type `ty`.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "value counts never exceed u32"
    )]
    pub fn add_value(&mut self, ty: TypeId, debug_name: Option<String>) -> ValueId {
        let id = ValueId::new(self.values.len() as u32);
        self.values.push(ValueInfo { ty, debug_name });
        id
    }

    /// Allocate a node in the arena. The caller places it in a block.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "node counts never exceed u32"
    )]
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = NodeId::new(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    #[inline]
    pub fn value(&self, id: ValueId) -> &ValueInfo {
        &self.values[id.index()]
    }

    #[inline]
    pub fn value_ty(&self, id: ValueId) -> TypeId {
        self.values[id.index()].ty
    }

    #[inline]
    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The top-level block.
    #[inline]
    pub fn block(&self) -> &Block {
        &self.block
    }

    #[inline]
    pub fn block_mut(&mut self) -> &mut Block {
        &mut self.block
    }

    /// Graph inputs (inputs of the top-level block).
    #[inline]
    pub fn inputs(&self) -> &[ValueId] {
        &self.block.inputs
    }

    /// The `Return` node ending the top-level block, if present.
    pub fn return_node(&self) -> Option<&Node> {
        let last = *self.block.nodes.last()?;
        let node = self.node(last);
        matches!(node.kind, NodeKind::Return).then_some(node)
    }

    /// Graph outputs: the inputs of the `Return` node.
    pub fn outputs(&self) -> &[ValueId] {
        match self.return_node() {
            Some(node) => &node.inputs,
            None => &[],
        }
    }

    /// The node defining `value`, if it is not a block input.
    pub fn producer(&self, value: ValueId) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|node| node.outputs.contains(&value))
            .map(|index| self.node_id_at(index))
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "node counts never exceed u32"
    )]
    fn node_id_at(&self, index: usize) -> NodeId {
        debug_assert!(index < self.nodes.len());
        NodeId::new(index as u32)
    }

    /// All nodes reachable from the top-level block, in program order,
    /// including nodes inside nested blocks (after their owner).
    pub fn walk(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        self.walk_block(&self.block, &mut order);
        order
    }

    fn walk_block(&self, block: &Block, order: &mut Vec<NodeId>) {
        for &id in &block.nodes {
            order.push(id);
            for nested in &self.node(id).blocks {
                self.walk_block(nested, order);
            }
        }
    }
}
