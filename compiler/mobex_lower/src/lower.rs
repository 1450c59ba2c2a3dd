//! Function → mobile bytecode lowering.
//!
//! # Pipeline
//!
//! 1. Inline every statically resolvable call ([`inline`](crate::inline())).
//! 2. Compile the flat graph to register code ([`GraphCompiler`]).
//! 3. Walk the instructions once, building the mobile tables:
//!    - `OP`/`OPN`: record the operator name (and a debug trace).
//!    - `CALL`: rewrite to `INTERFACE_CALL`, dispatching by method name.
//!    - `RET`: reject return types the mobile runtime cannot represent.
//!    - everything else: must be on the mobile allow-list.
//!
//! The function is rejected as a whole on the first problem.

use mobex_ir::{
    Code, Function, Instruction, Module, Node, NodeKind, OpCode, TypeId, TypeKind, TypePool,
    Value,
};

use crate::{
    inline, DebugRecord, FunctionRecord, FunctionTable, GraphCompiler, LowerError,
    LoweredFunction, RegisterCompiler,
};

/// Opcodes the mobile interpreter executes.
///
/// `CALL` is absent: lowering rewrites it into `INTERFACE_CALL`.
pub const MOBILE_SUPPORTED_OPS: &[OpCode] = &[
    OpCode::Op,
    OpCode::OpN,
    OpCode::Load,
    OpCode::Move,
    OpCode::StoreN,
    OpCode::Store,
    OpCode::Drop,
    OpCode::DropR,
    OpCode::LoadC,
    OpCode::Jf,
    OpCode::Jmp,
    OpCode::Loop,
    OpCode::Ret,
    OpCode::GetAttr,
    OpCode::SetAttr,
    OpCode::ListConstruct,
    OpCode::TupleConstruct,
    OpCode::Warn,
    OpCode::InterfaceCall,
    OpCode::ListUnpack,
    OpCode::TupleSlice,
    OpCode::DictConstruct,
    OpCode::NamedTupleConstruct,
];

#[inline]
pub fn is_op_supported_in_mobile(op: OpCode) -> bool {
    MOBILE_SUPPORTED_OPS.contains(&op)
}

/// Lowers the functions of one module.
pub struct FunctionLowerer<'a> {
    module: &'a Module,
    compiler: &'a dyn GraphCompiler,
    debug_info: bool,
    root_scope: String,
}

impl<'a> FunctionLowerer<'a> {
    pub fn new(module: &'a Module, compiler: &'a dyn GraphCompiler, debug_info: bool) -> Self {
        Self {
            module,
            compiler,
            debug_info,
            root_scope: format!("top({})", module.type_name().name()),
        }
    }

    /// Lower `function` into its bytecode tables.
    pub fn lower(&self, function: &Function) -> Result<LoweredFunction, LowerError> {
        let name = function.name().qualified_name();
        let pool = self.module.pool();

        let Some(graph) = function.graph_body() else {
            return Err(LowerError::Compile {
                function: name,
                message: String::from("builtin functions have no graph to lower"),
            });
        };
        let graph_error = |source| LowerError::Graph {
            function: name.clone(),
            source,
        };
        let flat = inline(graph, pool).map_err(graph_error)?;
        let code = self.compiler.compile(flat, pool).map_err(graph_error)?;

        let mut instructions = code.instructions.clone();
        let mut operators = Vec::new();
        let mut method_names = Vec::new();
        let mut debug_info = Vec::new();

        for (index, instruction) in code.instructions.iter().enumerate() {
            match instruction.op {
                OpCode::Op | OpCode::OpN => {
                    let node = source_node(&code, index, &name)?;
                    let Some(operator) = node.operator_name() else {
                        return Err(LowerError::Compile {
                            function: name,
                            message: format!("{} emitted for a non-operator node", instruction.op),
                        });
                    };
                    operators.push(operator.clone());
                    if self.debug_info {
                        debug_info.push(self.module_debug_info(node));
                    }
                }
                OpCode::Call => {
                    let node = source_node(&code, index, &name)?;
                    let NodeKind::CallMethod { name: method } = &node.kind else {
                        return Err(LowerError::UnsupportedCall {
                            function: name,
                            kind: node.kind.kind_name(),
                        });
                    };
                    let slot = code.constants.len() + method_names.len();
                    method_names.push(method.clone());
                    instructions[index] = Instruction::new(
                        OpCode::InterfaceCall,
                        i32::try_from(slot).unwrap_or(i32::MAX),
                        u16::try_from(node.inputs.len()).unwrap_or(u16::MAX),
                    );
                }
                OpCode::Ret => {
                    let node = source_node(&code, index, &name)?;
                    for &output in &node.inputs {
                        check_return_type(pool, code.graph.value_ty(output), &name)?;
                    }
                }
                OpCode::CreateObject => {
                    let class = code
                        .source_node(index)
                        .and_then(|node| node.outputs.first())
                        .map_or_else(
                            || String::from("<unknown>"),
                            |&v| pool.annotation_str(code.graph.value_ty(v)),
                        );
                    return Err(LowerError::CreateObject {
                        function: name,
                        class,
                    });
                }
                op if !is_op_supported_in_mobile(op) => {
                    return Err(LowerError::UnsupportedOpcode { function: name, op });
                }
                _ => {}
            }
        }

        let mut constants = code.constants.clone();
        constants.extend(method_names.into_iter().map(Value::Str));
        let types = code
            .types
            .iter()
            .map(|&ty| pool.annotation_str(ty))
            .collect();

        tracing::debug!(
            function = %name,
            instructions = instructions.len(),
            operators = operators.len(),
            constants = constants.len(),
            "lowered function"
        );

        let debug = self.debug_info.then(|| DebugRecord {
            name: name.clone(),
            module_debug_info: debug_info,
        });
        Ok(LoweredFunction {
            record: FunctionRecord {
                name,
                table: FunctionTable {
                    instructions,
                    operators,
                    constants,
                    types,
                    register_size: code.register_size,
                },
            },
            debug,
        })
    }

    /// Module path of an operator node, followed by its call-site trace.
    ///
    /// `top(Model).forward{}` for nodes with no call stack, whatever method
    /// they belong to. `top(Model).sub(Sub).forward{model.py:3:8}` for nodes
    /// spliced in from `self.sub.forward(...)`.
    pub fn module_debug_info(&self, node: &Node) -> String {
        let pool = self.module.pool();
        let Some(stack) = &node.callstack else {
            return format!("{}.forward{{}}", self.root_scope);
        };

        let mut path = self.root_scope.clone();
        for entry in stack.entries() {
            let instance = entry.module_instance.as_ref().and_then(|info| {
                let class = pool.named_type_name(info.class_type?)?;
                Some((info.instance_name.as_str(), class.name()))
            });
            match instance {
                Some((instance, class)) => {
                    path.push_str(&format!(".{instance}({class}).{}", entry.function));
                }
                None => path.push_str(".UNKNOWN_INSTANCE(UNKNOWN_TYPE)"),
            }
        }
        format!("{path}{{{}}}", stack.source_range_trace())
    }
}

/// Lower one function with the default compiler.
pub fn lower_function(
    module: &Module,
    function: &Function,
    debug_info: bool,
) -> Result<LoweredFunction, LowerError> {
    FunctionLowerer::new(module, &RegisterCompiler, debug_info).lower(function)
}

fn source_node<'c>(code: &'c Code, index: usize, function: &str) -> Result<&'c Node, LowerError> {
    code.source_node(index).ok_or_else(|| LowerError::Compile {
        function: function.to_owned(),
        message: format!("instruction {index} has no source node"),
    })
}

/// Named tuples and class-typed list/dict elements cannot cross the mobile
/// boundary.
fn check_return_type(pool: &TypePool, ty: TypeId, function: &str) -> Result<(), LowerError> {
    match pool.kind(ty) {
        TypeKind::Tuple {
            schema: Some(schema),
            ..
        } => Err(LowerError::NamedTupleReturn {
            function: function.to_owned(),
            tuple: schema.name.qualified_name(),
        }),
        TypeKind::List(_) | TypeKind::Dict(..)
            if pool
                .contained_types(ty)
                .into_iter()
                .any(|elem| pool.is_class(elem)) =>
        {
            Err(LowerError::ClassContainerReturn {
                function: function.to_owned(),
                container: pool.annotation_str(ty),
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests;
