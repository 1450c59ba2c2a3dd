//! Graph → register-machine code.
//!
//! [`GraphCompiler`] is the seam between lowering and code generation: the
//! lowerer only needs a [`Code`] whose instructions remember their source
//! nodes. [`RegisterCompiler`] is the stock implementation.
//!
//! # Register model
//!
//! Registers are numbered from 1. Every value that is read after it is
//! produced gets its own register; values nobody reads are `DROP`ped as soon
//! as they are pushed. Constants never occupy a register: each use emits a
//! `LOADC` against the constant table.
//!
//! Control flow is structured: an `If` becomes
//!
//! ```text
//!     LOAD cond
//!     JF   else        ; relative
//!     <then block>  STORE outputs
//!     JMP  end         ; relative
//! else:
//!     <else block>  STORE outputs
//! end:
//! ```

use mobex_ir::{
    Block, Code, Graph, Instruction, NodeId, NodeKind, OpCode, OperatorName, TypeId, TypePool,
    Value, ValueId,
};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::GraphError;

/// Compiles an inlined graph into linear code.
pub trait GraphCompiler {
    fn compile(&self, graph: Graph, pool: &TypePool) -> Result<Code, GraphError>;
}

/// Stack/register code generator used for mobile export.
#[derive(Clone, Copy, Debug, Default)]
pub struct RegisterCompiler;

impl GraphCompiler for RegisterCompiler {
    fn compile(&self, graph: Graph, pool: &TypePool) -> Result<Code, GraphError> {
        let tables = {
            let mut emitter = Emitter::new(&graph, pool);
            emitter.emit_entry();
            emitter.emit_block(graph.block())?;
            emitter.tables
        };
        tracing::trace!(
            instructions = tables.instructions.len(),
            registers = tables.register_size,
            "compiled graph"
        );
        Ok(Code {
            graph,
            instructions: tables.instructions,
            instruction_sources: tables.instruction_sources,
            operators: tables.operators,
            constants: tables.constants,
            types: tables.types,
            functions: tables.functions,
            register_size: tables.register_size,
        })
    }
}

#[derive(Default)]
struct Tables {
    instructions: Vec<Instruction>,
    instruction_sources: Vec<Option<NodeId>>,
    operators: Vec<OperatorName>,
    constants: Vec<Value>,
    types: Vec<TypeId>,
    functions: Vec<String>,
    register_size: usize,
}

struct Emitter<'a> {
    graph: &'a Graph,
    pool: &'a TypePool,
    tables: Tables,
    registers: FxHashMap<ValueId, usize>,
    /// Values read by some node or block.
    used: FxHashSet<ValueId>,
    /// Constant node → constant table slot, assigned on first use.
    constant_slots: FxHashMap<NodeId, usize>,
    /// Constant output value → defining constant node.
    constant_values: FxHashMap<ValueId, NodeId>,
}

impl<'a> Emitter<'a> {
    fn new(graph: &'a Graph, pool: &'a TypePool) -> Self {
        let mut used = FxHashSet::default();
        let mut constant_values = FxHashMap::default();
        for id in graph.walk() {
            let node = graph.node(id);
            used.extend(node.inputs.iter().copied());
            for block in &node.blocks {
                used.extend(block.outputs.iter().copied());
            }
            if let (NodeKind::Constant(_), Some(&output)) = (&node.kind, node.outputs.first()) {
                constant_values.insert(output, id);
            }
        }
        Self {
            graph,
            pool,
            tables: Tables::default(),
            registers: FxHashMap::default(),
            used,
            constant_slots: FxHashMap::default(),
            constant_values,
        }
    }

    fn push(&mut self, op: OpCode, x: usize, n: usize, source: Option<NodeId>) -> usize {
        let index = self.tables.instructions.len();
        self.tables
            .instructions
            .push(Instruction::new(op, operand(x), count(n)));
        self.tables.instruction_sources.push(source);
        index
    }

    fn register(&mut self, value: ValueId) -> usize {
        if let Some(&reg) = self.registers.get(&value) {
            return reg;
        }
        self.tables.register_size += 1;
        let reg = self.tables.register_size;
        self.registers.insert(value, reg);
        reg
    }

    // ── Entry ───────────────────────────────────────────────────────

    /// Pop graph inputs off the stack into consecutive registers.
    fn emit_entry(&mut self) {
        let graph = self.graph;
        let inputs = graph.inputs();
        let Some(&first) = inputs.first() else {
            return;
        };
        let first_reg = self.register(first);
        for &input in &inputs[1..] {
            self.register(input);
        }
        if inputs.len() == 1 {
            self.push(OpCode::Store, first_reg, 0, None);
        } else {
            self.push(OpCode::StoreN, first_reg, inputs.len(), None);
        }
    }

    // ── Blocks ──────────────────────────────────────────────────────

    fn emit_block(&mut self, block: &Block) -> Result<(), GraphError> {
        for &id in &block.nodes {
            self.emit_node(id)?;
        }
        Ok(())
    }

    fn emit_load(&mut self, value: ValueId, source: NodeId) -> Result<(), GraphError> {
        if let Some(&constant) = self.constant_values.get(&value) {
            let slot = self.constant_slot(constant);
            self.push(OpCode::LoadC, slot, 0, Some(source));
            return Ok(());
        }
        let Some(&reg) = self.registers.get(&value) else {
            return Err(GraphError::UndefinedValue(value.raw()));
        };
        self.push(OpCode::Load, reg, 0, Some(source));
        Ok(())
    }

    fn constant_slot(&mut self, constant: NodeId) -> usize {
        if let Some(&slot) = self.constant_slots.get(&constant) {
            return slot;
        }
        let value = match &self.graph.node(constant).kind {
            NodeKind::Constant(value) => value.clone(),
            _ => Value::None,
        };
        let slot = self.tables.constants.len();
        self.tables.constants.push(value);
        self.constant_slots.insert(constant, slot);
        slot
    }

    /// Pop `outputs` off the stack, last output first.
    fn emit_stores(&mut self, outputs: &[ValueId], source: NodeId) {
        for &output in outputs.iter().rev() {
            if self.used.contains(&output) {
                let reg = self.register(output);
                self.push(OpCode::Store, reg, 0, Some(source));
            } else {
                self.push(OpCode::Drop, 0, 0, Some(source));
            }
        }
    }

    fn type_slot(&mut self, ty: TypeId) -> usize {
        self.tables.types.push(ty);
        self.tables.types.len() - 1
    }

    fn attribute_slot(&self, object: ValueId, name: &str) -> Result<usize, GraphError> {
        let owner = self.graph.value_ty(object);
        self.pool
            .class(owner)
            .and_then(|class| class.attribute_slot(name))
            .ok_or_else(|| GraphError::UnknownAttribute {
                owner: self.pool.annotation_str(owner),
                name: name.to_owned(),
            })
    }

    // ── Nodes ───────────────────────────────────────────────────────

    fn emit_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        let graph = self.graph;
        let node = graph.node(id);
        match &node.kind {
            NodeKind::Constant(_) => return Ok(()),
            NodeKind::If => return self.emit_if(id),
            _ => {}
        }

        for &input in &node.inputs {
            self.emit_load(input, id)?;
        }

        let first_output_ty = || node.outputs.first().map_or(TypeId::ANY, |&v| graph.value_ty(v));
        let arity = node.inputs.len();
        match &node.kind {
            NodeKind::Return => {
                self.push(OpCode::Ret, 0, 0, Some(id));
                return Ok(());
            }
            NodeKind::Operator { name, vararg } => {
                let slot = self.tables.operators.len();
                self.tables.operators.push(name.clone());
                if *vararg {
                    self.push(OpCode::OpN, slot, arity, Some(id));
                } else {
                    self.push(OpCode::Op, slot, 0, Some(id));
                }
            }
            NodeKind::GetAttr { name } => {
                let [object] = node
                    .operands()
                    .ok_or_else(|| GraphError::missing_operand(node, 1))?;
                let slot = self.attribute_slot(object, name)?;
                self.push(OpCode::GetAttr, slot, 0, Some(id));
            }
            NodeKind::SetAttr { name } => {
                let [object] = node
                    .operands()
                    .ok_or_else(|| GraphError::missing_operand(node, 1))?;
                let slot = self.attribute_slot(object, name)?;
                self.push(OpCode::SetAttr, slot, 0, Some(id));
            }
            NodeKind::CallMethod { name } => {
                let slot = self.tables.functions.len();
                self.tables.functions.push(name.clone());
                self.push(OpCode::Call, slot, 0, Some(id));
            }
            NodeKind::CallFunction { function } => {
                let slot = self.tables.functions.len();
                self.tables.functions.push(function.name().qualified_name());
                self.push(OpCode::Call, slot, 0, Some(id));
            }
            NodeKind::TupleConstruct => {
                self.push(OpCode::TupleConstruct, 0, arity, Some(id));
            }
            NodeKind::NamedTupleConstruct => {
                let slot = self.type_slot(first_output_ty());
                self.push(OpCode::NamedTupleConstruct, slot, arity, Some(id));
            }
            NodeKind::ListConstruct => {
                let slot = self.type_slot(first_output_ty());
                self.push(OpCode::ListConstruct, slot, arity, Some(id));
            }
            NodeKind::DictConstruct => {
                let slot = self.type_slot(first_output_ty());
                self.push(OpCode::DictConstruct, slot, arity, Some(id));
            }
            NodeKind::ListUnpack => {
                self.push(OpCode::ListUnpack, 0, node.outputs.len(), Some(id));
            }
            NodeKind::TupleSlice { begin, end } => {
                self.push(OpCode::TupleSlice, *begin, end.saturating_sub(*begin), Some(id));
            }
            NodeKind::CreateObject => {
                let slot = self.type_slot(first_output_ty());
                self.push(OpCode::CreateObject, slot, 0, Some(id));
            }
            NodeKind::IsInstance { types } => {
                let first = self.tables.types.len();
                self.tables.types.extend(types.iter().copied());
                self.push(OpCode::IsInstance, first, types.len(), Some(id));
            }
            NodeKind::Warn => {
                self.push(OpCode::Warn, 0, 0, Some(id));
            }
            NodeKind::Constant(_) | NodeKind::If => unreachable!("handled above"),
        }

        self.emit_stores(&node.outputs, id);
        Ok(())
    }

    fn emit_if(&mut self, id: NodeId) -> Result<(), GraphError> {
        let graph = self.graph;
        let node = graph.node(id);
        let (Some(&cond), [then_block, else_block]) = (node.inputs.first(), node.blocks.as_slice())
        else {
            return Err(GraphError::MalformedIf);
        };

        self.emit_load(cond, id)?;
        let jf = self.push(OpCode::Jf, 0, 0, Some(id));

        self.emit_branch(then_block, &node.outputs, id)?;
        let jmp = self.push(OpCode::Jmp, 0, 0, Some(id));

        let else_start = self.tables.instructions.len();
        self.emit_branch(else_block, &node.outputs, id)?;
        let end = self.tables.instructions.len();

        self.tables.instructions[jf].x = operand(else_start - jf);
        self.tables.instructions[jmp].x = operand(end - jmp);
        Ok(())
    }

    /// Emit one branch and move its block outputs into the `If` outputs.
    fn emit_branch(
        &mut self,
        block: &Block,
        outputs: &[ValueId],
        source: NodeId,
    ) -> Result<(), GraphError> {
        self.emit_block(block)?;
        for &value in &block.outputs {
            self.emit_load(value, source)?;
        }
        self.emit_stores(outputs, source);
        Ok(())
    }
}

fn operand(x: usize) -> i32 {
    i32::try_from(x).unwrap_or(i32::MAX)
}

fn count(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}
