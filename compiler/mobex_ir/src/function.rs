//! Methods and free functions.

use crate::{Graph, QualifiedName, TypeId};

/// Input and output types of a function.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Signature {
    pub inputs: Vec<TypeId>,
    pub outputs: Vec<TypeId>,
}

/// What a function is made of.
#[derive(Clone, Debug)]
pub enum FunctionBody {
    /// An IR graph that can be inlined and lowered.
    Graph(Graph),
    /// A native function known only by signature.
    Builtin(Signature),
}

/// A named function: a class method, an interface method, or a free function.
#[derive(Clone, Debug)]
pub struct Function {
    name: QualifiedName,
    body: FunctionBody,
}

impl Function {
    pub fn graph(name: impl Into<QualifiedName>, graph: Graph) -> Self {
        Self {
            name: name.into(),
            body: FunctionBody::Graph(graph),
        }
    }

    pub fn builtin(name: impl Into<QualifiedName>, signature: Signature) -> Self {
        Self {
            name: name.into(),
            body: FunctionBody::Builtin(signature),
        }
    }

    #[inline]
    pub fn name(&self) -> &QualifiedName {
        &self.name
    }

    #[inline]
    pub fn body(&self) -> &FunctionBody {
        &self.body
    }

    /// The body graph, if this is a graph function.
    pub fn graph_body(&self) -> Option<&Graph> {
        match &self.body {
            FunctionBody::Graph(graph) => Some(graph),
            FunctionBody::Builtin(_) => None,
        }
    }

    #[inline]
    pub fn is_graph_function(&self) -> bool {
        matches!(self.body, FunctionBody::Graph(_))
    }

    /// Signature, derived from the graph's inputs and return for graph functions.
    pub fn signature(&self) -> Signature {
        match &self.body {
            FunctionBody::Graph(graph) => Signature {
                inputs: graph.inputs().iter().map(|&v| graph.value_ty(v)).collect(),
                outputs: graph.outputs().iter().map(|&v| graph.value_ty(v)).collect(),
            },
            FunctionBody::Builtin(signature) => signature.clone(),
        }
    }
}
