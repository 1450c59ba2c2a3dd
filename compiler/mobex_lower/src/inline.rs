//! Call inlining.
//!
//! Produces a flat copy of a graph in which every call with a statically
//! known graph body has been replaced by that body. Spliced nodes carry an
//! [`InlinedCallStack`] naming each call they came through (callee, call
//! site, module instance), outermost first, which is what module debug info
//! is rendered from.
//!
//! Calls that cannot be resolved statically stay in place:
//!
//! - method calls on interface-typed receivers (dispatched at runtime),
//! - calls to builtin functions (no graph body),
//! - calls re-entering a function that is already being inlined.

use mobex_ir::{
    Block, CallStackEntry, Function, Graph, InlinedCallStack, ModuleInstanceInfo, Node, NodeId,
    NodeKind, TypePool, ValueId,
};
use rustc_hash::FxHashMap;

use crate::GraphError;

type Env = FxHashMap<ValueId, ValueId>;

/// Inline every statically resolvable call in `graph`.
///
/// The input graph is not modified.
pub fn inline(graph: &Graph, pool: &TypePool) -> Result<Graph, GraphError> {
    let mut inliner = Inliner {
        pool,
        out: Graph::new(),
        active: Vec::new(),
    };

    let mut env = Env::default();
    for &input in graph.inputs() {
        let copy = inliner.copy_value(graph, input);
        inliner.out.block_mut().inputs.push(copy);
        env.insert(input, copy);
    }

    let mut nodes = Vec::new();
    let outputs = inliner.inline_body(graph, &mut env, None, &mut nodes)?;

    let mut ret = Node::new(NodeKind::Return, outputs, Vec::new());
    ret.source_range = graph.return_node().and_then(|n| n.source_range.clone());
    nodes.push(inliner.out.add_node(ret));
    inliner.out.block_mut().nodes = nodes;
    Ok(inliner.out)
}

struct Inliner<'a> {
    pool: &'a TypePool,
    out: Graph,
    /// Qualified names of the callees currently being spliced.
    active: Vec<String>,
}

impl<'a> Inliner<'a> {
    fn copy_value(&mut self, src: &Graph, value: ValueId) -> ValueId {
        let info = src.value(value);
        self.out.add_value(info.ty, info.debug_name.clone())
    }

    /// Splice the top-level block of `src` (minus its `Return`) into `dest`
    /// and return the mapped return values.
    fn inline_body(
        &mut self,
        src: &Graph,
        env: &mut Env,
        stack: Option<&InlinedCallStack>,
        dest: &mut Vec<NodeId>,
    ) -> Result<Vec<ValueId>, GraphError> {
        for &id in &src.block().nodes {
            let node = src.node(id);
            if matches!(node.kind, NodeKind::Return) {
                return lookup_all(env, &node.inputs);
            }
            self.inline_node(src, node, env, stack, dest)?;
        }
        Err(GraphError::MissingReturn)
    }

    fn inline_block(
        &mut self,
        src: &Graph,
        block: &Block,
        env: &mut Env,
        stack: Option<&InlinedCallStack>,
    ) -> Result<Block, GraphError> {
        let mut copy = Block::default();
        for &input in &block.inputs {
            let value = self.copy_value(src, input);
            env.insert(input, value);
            copy.inputs.push(value);
        }
        for &id in &block.nodes {
            self.inline_node(src, src.node(id), env, stack, &mut copy.nodes)?;
        }
        copy.outputs = lookup_all(env, &block.outputs)?;
        Ok(copy)
    }

    fn inline_node(
        &mut self,
        src: &Graph,
        node: &Node,
        env: &mut Env,
        stack: Option<&InlinedCallStack>,
        dest: &mut Vec<NodeId>,
    ) -> Result<(), GraphError> {
        let own_stack = effective_stack(node, stack);

        if let Some((callee, instance)) = self.resolve_call(src, node) {
            let callee_name = callee.name().qualified_name();
            let reentrant = self.active.contains(&callee_name);
            if let Some(body) = callee.graph_body().filter(|_| !reentrant) {
                let entry = CallStackEntry {
                    function: callee.name().name().to_owned(),
                    call_site: node.source_range.clone(),
                    module_instance: instance,
                };
                let call_stack = match &own_stack {
                    Some(outer) => InlinedCallStack::new(entry).nested_under(outer),
                    None => InlinedCallStack::new(entry),
                };

                let mut callee_env = Env::default();
                for (&param, &arg) in body.inputs().iter().zip(&node.inputs) {
                    callee_env.insert(param, lookup(env, arg)?);
                }

                self.active.push(callee_name);
                let results = self.inline_body(body, &mut callee_env, Some(&call_stack), dest);
                self.active.pop();

                for (&output, result) in node.outputs.iter().zip(results?) {
                    env.insert(output, result);
                }
                return Ok(());
            }
        }

        let inputs = lookup_all(env, &node.inputs)?;
        let mut blocks = Vec::with_capacity(node.blocks.len());
        for block in &node.blocks {
            blocks.push(self.inline_block(src, block, env, stack)?);
        }
        let outputs: Vec<ValueId> = node
            .outputs
            .iter()
            .map(|&output| {
                let copy = self.copy_value(src, output);
                env.insert(output, copy);
                copy
            })
            .collect();

        let mut copy = Node::new(node.kind.clone(), inputs, outputs);
        copy.blocks = blocks;
        copy.source_range.clone_from(&node.source_range);
        copy.callstack = own_stack;
        dest.push(self.out.add_node(copy));
        Ok(())
    }

    /// The callee of a statically dispatched call, and the module instance it
    /// was called on.
    fn resolve_call<'g>(
        &self,
        src: &'g Graph,
        node: &'g Node,
    ) -> Option<(&'g Function, Option<ModuleInstanceInfo>)>
    where
        'a: 'g,
    {
        match &node.kind {
            NodeKind::CallFunction { function } => Some((function.as_ref(), None)),
            NodeKind::CallMethod { name } => {
                let receiver = *node.inputs.first()?;
                let class_type = src.value_ty(receiver);
                let pool: &'a TypePool = self.pool;
                let method = pool.class(class_type)?.find_method(name)?;
                let instance =
                    instance_name(src, receiver).map(|instance_name| ModuleInstanceInfo {
                        class_type: Some(class_type),
                        instance_name,
                    });
                Some((method.as_ref(), instance))
            }
            _ => None,
        }
    }
}

/// The attribute name `receiver` was loaded from, or `self` for the first
/// graph input. `None` when the receiver is another input or was computed
/// some other way.
fn instance_name(src: &Graph, receiver: ValueId) -> Option<String> {
    let Some(producer) = src.producer(receiver) else {
        return (src.inputs().first() == Some(&receiver)).then(|| String::from("self"));
    };
    match &src.node(producer).kind {
        NodeKind::GetAttr { name } => Some(name.clone()),
        _ => None,
    }
}

/// The stack a copied node ends up with: the stack of the body it is being
/// spliced through, followed by anything it already carried.
fn effective_stack(node: &Node, outer: Option<&InlinedCallStack>) -> Option<InlinedCallStack> {
    match (outer, &node.callstack) {
        (None, own) => own.clone(),
        (Some(outer), None) => Some(outer.clone()),
        (Some(outer), Some(own)) => Some(own.nested_under(outer)),
    }
}

fn lookup(env: &Env, value: ValueId) -> Result<ValueId, GraphError> {
    env.get(&value)
        .copied()
        .ok_or(GraphError::UndefinedValue(value.raw()))
}

fn lookup_all(env: &Env, values: &[ValueId]) -> Result<Vec<ValueId>, GraphError> {
    values.iter().map(|&v| lookup(env, v)).collect()
}
