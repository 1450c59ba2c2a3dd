//! Incremental graph construction.

use std::rc::Rc;

use super::{Block, Graph, Node, NodeKind, OperatorName, ValueId};
use crate::{Function, SourceRange, TypeId, Value};

/// Builder for a [`Graph`].
///
/// Appends nodes to the innermost open block. Nested blocks are opened by
/// [`if_else`](GraphBuilder::if_else) for the duration of each branch
/// closure. [`finish`](GraphBuilder::finish) appends the `Return` node.
#[derive(Default)]
pub struct GraphBuilder {
    graph: Graph,
    open_blocks: Vec<Block>,
    range: Option<SourceRange>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a graph input.
    pub fn input(&mut self, ty: TypeId, name: &str) -> ValueId {
        let value = self.graph.add_value(ty, Some(name.to_owned()));
        self.graph.block_mut().inputs.push(value);
        value
    }

    /// Attach `range` to every node added from now on.
    pub fn at(&mut self, range: SourceRange) -> &mut Self {
        self.range = Some(range);
        self
    }

    /// Stop attaching a source range to new nodes.
    pub fn clear_range(&mut self) -> &mut Self {
        self.range = None;
        self
    }

    fn current_block(&mut self) -> &mut Block {
        match self.open_blocks.last_mut() {
            Some(block) => block,
            None => self.graph.block_mut(),
        }
    }

    /// Add a node of any kind with fresh outputs of the given types.
    pub fn node(
        &mut self,
        kind: NodeKind,
        inputs: &[ValueId],
        output_types: &[TypeId],
    ) -> Vec<ValueId> {
        let outputs: Vec<ValueId> = output_types
            .iter()
            .map(|&ty| self.graph.add_value(ty, None))
            .collect();
        let mut node = Node::new(kind, inputs.to_vec(), outputs.clone());
        node.source_range.clone_from(&self.range);
        let id = self.graph.add_node(node);
        self.current_block().nodes.push(id);
        outputs
    }

    fn single(&mut self, kind: NodeKind, inputs: &[ValueId], ty: TypeId) -> ValueId {
        self.node(kind, inputs, &[ty])[0]
    }

    pub fn constant(&mut self, value: impl Into<Value>, ty: TypeId) -> ValueId {
        self.single(NodeKind::Constant(value.into()), &[], ty)
    }

    /// Call a fixed-arity operator.
    pub fn op(&mut self, name: &str, overload: &str, inputs: &[ValueId], ty: TypeId) -> ValueId {
        let kind = NodeKind::Operator {
            name: OperatorName::new(name, overload),
            vararg: false,
        };
        self.single(kind, inputs, ty)
    }

    /// Call an operator that takes a variable number of arguments.
    pub fn vararg_op(
        &mut self,
        name: &str,
        overload: &str,
        inputs: &[ValueId],
        ty: TypeId,
    ) -> ValueId {
        let kind = NodeKind::Operator {
            name: OperatorName::new(name, overload),
            vararg: true,
        };
        self.single(kind, inputs, ty)
    }

    pub fn get_attr(&mut self, object: ValueId, name: &str, ty: TypeId) -> ValueId {
        let kind = NodeKind::GetAttr {
            name: name.to_owned(),
        };
        self.single(kind, &[object], ty)
    }

    pub fn set_attr(&mut self, object: ValueId, name: &str, value: ValueId) {
        let kind = NodeKind::SetAttr {
            name: name.to_owned(),
        };
        self.node(kind, &[object, value], &[]);
    }

    pub fn call_method(
        &mut self,
        receiver: ValueId,
        name: &str,
        args: &[ValueId],
        ty: TypeId,
    ) -> ValueId {
        let mut inputs = Vec::with_capacity(args.len() + 1);
        inputs.push(receiver);
        inputs.extend_from_slice(args);
        let kind = NodeKind::CallMethod {
            name: name.to_owned(),
        };
        self.single(kind, &inputs, ty)
    }

    pub fn call_function(
        &mut self,
        function: &Rc<Function>,
        args: &[ValueId],
        ty: TypeId,
    ) -> ValueId {
        let kind = NodeKind::CallFunction {
            function: Rc::clone(function),
        };
        self.single(kind, args, ty)
    }

    pub fn tuple(&mut self, items: &[ValueId], ty: TypeId) -> ValueId {
        self.single(NodeKind::TupleConstruct, items, ty)
    }

    pub fn named_tuple(&mut self, items: &[ValueId], ty: TypeId) -> ValueId {
        self.single(NodeKind::NamedTupleConstruct, items, ty)
    }

    pub fn list(&mut self, items: &[ValueId], ty: TypeId) -> ValueId {
        self.single(NodeKind::ListConstruct, items, ty)
    }

    pub fn dict(&mut self, entries: &[(ValueId, ValueId)], ty: TypeId) -> ValueId {
        let inputs: Vec<ValueId> = entries.iter().flat_map(|&(k, v)| [k, v]).collect();
        self.single(NodeKind::DictConstruct, &inputs, ty)
    }

    pub fn list_unpack(&mut self, list: ValueId, types: &[TypeId]) -> Vec<ValueId> {
        self.node(NodeKind::ListUnpack, &[list], types)
    }

    pub fn tuple_slice(&mut self, tuple: ValueId, begin: usize, end: usize, ty: TypeId) -> ValueId {
        self.single(NodeKind::TupleSlice { begin, end }, &[tuple], ty)
    }

    pub fn create_object(&mut self, class: TypeId) -> ValueId {
        self.single(NodeKind::CreateObject, &[], class)
    }

    pub fn is_instance(&mut self, value: ValueId, types: &[TypeId]) -> ValueId {
        let kind = NodeKind::IsInstance {
            types: types.to_vec(),
        };
        self.single(kind, &[value], TypeId::BOOL)
    }

    pub fn warn(&mut self, message: ValueId) {
        self.node(NodeKind::Warn, &[message], &[]);
    }

    /// Add an `If` node. Each branch returns its block outputs, which must
    /// match `output_types` in length.
    pub fn if_else(
        &mut self,
        cond: ValueId,
        output_types: &[TypeId],
        then_branch: impl FnOnce(&mut Self) -> Vec<ValueId>,
        else_branch: impl FnOnce(&mut Self) -> Vec<ValueId>,
    ) -> Vec<ValueId> {
        let range = self.range.clone();
        let then_block = self.build_block(then_branch);
        let else_block = self.build_block(else_branch);
        debug_assert_eq!(then_block.outputs.len(), output_types.len());
        debug_assert_eq!(else_block.outputs.len(), output_types.len());

        let outputs: Vec<ValueId> = output_types
            .iter()
            .map(|&ty| self.graph.add_value(ty, None))
            .collect();
        let mut node = Node::new(NodeKind::If, vec![cond], outputs.clone());
        node.blocks = vec![then_block, else_block];
        node.source_range = range;
        let id = self.graph.add_node(node);
        self.current_block().nodes.push(id);
        outputs
    }

    fn build_block(&mut self, body: impl FnOnce(&mut Self) -> Vec<ValueId>) -> Block {
        self.open_blocks.push(Block::default());
        let outputs = body(self);
        let mut block = self.open_blocks.pop().unwrap_or_default();
        block.outputs = outputs;
        block
    }

    /// Append the `Return` node and produce the graph.
    pub fn finish(mut self, outputs: &[ValueId]) -> Graph {
        debug_assert!(self.open_blocks.is_empty(), "unterminated nested block");
        self.node(NodeKind::Return, outputs, &[]);
        self.graph
    }
}
