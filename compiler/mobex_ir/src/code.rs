//! Linear register-machine code.
//!
//! [`Code`] is what a graph compiler hands back: a flat instruction stream
//! plus the tables its operands index into. Each instruction remembers the
//! graph node it was emitted for, which is how later passes recover operator
//! schemas, call targets and debug metadata.

use std::fmt;

use crate::{Graph, Node, NodeId, OperatorName, TypeId, Value};

/// Interpreter opcodes.
///
/// Operand meaning depends on the opcode: `X` is usually a table index or a
/// register, `N` an argument count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpCode {
    /// Call operator `X`.
    Op,
    /// Call vararg operator `X` with `N` arguments.
    OpN,
    /// Push register `X`.
    Load,
    /// Push register `X` and clear it.
    Move,
    /// Pop `N` values into registers `X..X+N`.
    StoreN,
    /// Pop into register `X`.
    Store,
    /// Pop and discard.
    Drop,
    /// Clear register `X`.
    DropR,
    /// Push constant `X`.
    LoadC,
    /// Pop a bool; jump by `X` if false.
    Jf,
    /// Jump by `X`.
    Jmp,
    Loop,
    Ret,
    Wait,
    /// Call function `X`.
    Call,
    Guard,
    TypeCheck,
    FailGuard,
    ProfileOp,
    TailCall,
    /// Look up method name constant `X` on the type of the receiver, `N` inputs.
    InterfaceCall,
    GetAttr,
    SetAttr,
    ListUnpack,
    TupleConstruct,
    NamedTupleConstruct,
    ListConstruct,
    DictConstruct,
    CreateObject,
    IsInstance,
    TupleSlice,
    Fork,
    Warn,
    Enter,
    Exit,
}

const ALL_OPCODES: [OpCode; 35] = [
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
    OpCode::Wait,
    OpCode::Call,
    OpCode::Guard,
    OpCode::TypeCheck,
    OpCode::FailGuard,
    OpCode::ProfileOp,
    OpCode::TailCall,
    OpCode::InterfaceCall,
    OpCode::GetAttr,
    OpCode::SetAttr,
    OpCode::ListUnpack,
    OpCode::TupleConstruct,
    OpCode::NamedTupleConstruct,
    OpCode::ListConstruct,
    OpCode::DictConstruct,
    OpCode::CreateObject,
    OpCode::IsInstance,
    OpCode::TupleSlice,
    OpCode::Fork,
    OpCode::Warn,
    OpCode::Enter,
    OpCode::Exit,
];

impl OpCode {
    /// Canonical upper-case name, as written into bytecode tables.
    pub const fn as_str(self) -> &'static str {
        match self {
            OpCode::Op => "OP",
            OpCode::OpN => "OPN",
            OpCode::Load => "LOAD",
            OpCode::Move => "MOVE",
            OpCode::StoreN => "STOREN",
            OpCode::Store => "STORE",
            OpCode::Drop => "DROP",
            OpCode::DropR => "DROPR",
            OpCode::LoadC => "LOADC",
            OpCode::Jf => "JF",
            OpCode::Jmp => "JMP",
            OpCode::Loop => "LOOP",
            OpCode::Ret => "RET",
            OpCode::Wait => "WAIT",
            OpCode::Call => "CALL",
            OpCode::Guard => "GUARD",
            OpCode::TypeCheck => "TYPECHECK",
            OpCode::FailGuard => "FAIL_GUARD",
            OpCode::ProfileOp => "PROFILE_OP",
            OpCode::TailCall => "TAIL_CALL",
            OpCode::InterfaceCall => "INTERFACE_CALL",
            OpCode::GetAttr => "GET_ATTR",
            OpCode::SetAttr => "SET_ATTR",
            OpCode::ListUnpack => "LIST_UNPACK",
            OpCode::TupleConstruct => "TUPLE_CONSTRUCT",
            OpCode::NamedTupleConstruct => "NAMED_TUPLE_CONSTRUCT",
            OpCode::ListConstruct => "LIST_CONSTRUCT",
            OpCode::DictConstruct => "DICT_CONSTRUCT",
            OpCode::CreateObject => "CREATE_OBJECT",
            OpCode::IsInstance => "ISINSTANCE",
            OpCode::TupleSlice => "TUPLE_SLICE",
            OpCode::Fork => "FORK",
            OpCode::Warn => "WARN",
            OpCode::Enter => "ENTER",
            OpCode::Exit => "EXIT",
        }
    }

    /// Inverse of [`as_str`](OpCode::as_str).
    pub fn from_name(name: &str) -> Option<Self> {
        ALL_OPCODES.iter().copied().find(|op| op.as_str() == name)
    }

    /// `OP` and `OPN`: the instructions that invoke a registered operator.
    #[inline]
    pub const fn invokes_operator(self) -> bool {
        matches!(self, OpCode::Op | OpCode::OpN)
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One instruction: `(opcode, X, N)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Instruction {
    pub op: OpCode,
    pub x: i32,
    pub n: u16,
}

impl Instruction {
    #[inline]
    pub const fn new(op: OpCode, x: i32, n: u16) -> Self {
        Self { op, x, n }
    }
}

/// Compiled form of one (inlined) graph.
#[derive(Clone, Debug)]
pub struct Code {
    /// The flattened graph the instructions were emitted from.
    pub graph: Graph,
    pub instructions: Vec<Instruction>,
    /// Emitting node of each instruction, parallel to `instructions`.
    /// `None` for the entry stores of graph inputs.
    pub instruction_sources: Vec<Option<NodeId>>,
    /// Operator table indexed by `OP`/`OPN`. One entry per call site.
    pub operators: Vec<OperatorName>,
    pub constants: Vec<Value>,
    pub types: Vec<TypeId>,
    /// Call targets indexed by `CALL`.
    pub functions: Vec<String>,
    pub register_size: usize,
}

impl Code {
    /// The node instruction `index` was emitted for.
    pub fn source_node(&self, index: usize) -> Option<&Node> {
        let id = (*self.instruction_sources.get(index)?)?;
        Some(self.graph.node(id))
    }
}
