//! Lowering errors.

use mobex_ir::{Node, OpCode};

/// A structural problem in a graph handed to the inliner or compiler.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("value %{0} is used before it is defined")]
    UndefinedValue(u32),
    #[error("attribute `{name}` is not declared on `{owner}`")]
    UnknownAttribute { owner: String, name: String },
    #[error("`If` node needs a condition and exactly two blocks")]
    MalformedIf,
    #[error("graph has no return node")]
    MissingReturn,
    #[error("`{kind}` node needs {expected} operand(s), found {found}")]
    MissingOperand {
        kind: &'static str,
        expected: usize,
        found: usize,
    },
}

impl GraphError {
    pub fn missing_operand(node: &Node, expected: usize) -> Self {
        GraphError::MissingOperand {
            kind: node.kind.kind_name(),
            expected,
            found: node.inputs.len(),
        }
    }
}

/// A function could not be lowered to mobile bytecode.
///
/// Every variant except [`Graph`](LowerError::Graph) and
/// [`Compile`](LowerError::Compile) is a user-facing rejection, and its
/// message names a workaround.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LowerError {
    #[error(
        "`{function}` returns named tuple `{tuple}`, which is not supported in mobile \
         modules. Workaround: instead of using a named tuple type's fields, use a \
         dictionary type's key-value pair items or a class type's attributes"
    )]
    NamedTupleReturn { function: String, tuple: String },

    #[error(
        "`{function}` returns `{container}`, a list or dictionary of class type, which \
         is not supported in mobile modules. Workaround: instead of using a class type \
         as the element type, use combinations of list, dictionary and single types"
    )]
    ClassContainerReturn { function: String, container: String },

    #[error(
        "`{function}` creates an instance of class `{class}` (CREATE_OBJECT), which is \
         not supported in mobile modules. Workaround: instead of using arbitrary class \
         type (class Foo()), define a pytorch class (class Foo(torch.nn.Module))"
    )]
    CreateObject { function: String, class: String },

    #[error("`{function}`: instruction {op} is not supported in mobile modules")]
    UnsupportedOpcode { function: String, op: OpCode },

    #[error(
        "`{function}`: unsupported node kind `{kind}` on CALL opcode for mobile; only \
         method calls dispatched by name can be exported"
    )]
    UnsupportedCall { function: String, kind: &'static str },

    #[error("`{function}`: malformed graph: {source}")]
    Graph {
        function: String,
        #[source]
        source: GraphError,
    },

    #[error("`{function}`: {message}")]
    Compile { function: String, message: String },
}
