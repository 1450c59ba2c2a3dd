//! Lowered function tables.
//!
//! A [`FunctionRecord`] is everything the mobile interpreter needs to run one
//! function: instructions plus the operator, constant and type tables the
//! instruction operands index into. [`DebugRecord`] carries the per-operator
//! debug strings when debug info is requested.

use std::collections::BTreeSet;

use mobex_ir::{Instruction, OperatorName, Value};

/// The five tables of one lowered function.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionTable {
    pub instructions: Vec<Instruction>,
    /// One entry per `OP`/`OPN` instruction, in instruction order.
    pub operators: Vec<OperatorName>,
    /// Graph constants followed by the method names used by `INTERFACE_CALL`.
    pub constants: Vec<Value>,
    /// Type annotation strings indexed by construct instructions.
    pub types: Vec<String>,
    pub register_size: usize,
}

/// A function lowered to mobile bytecode, keyed by its qualified name.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionRecord {
    pub name: String,
    pub table: FunctionTable,
}

impl FunctionRecord {
    /// Distinct operator names (`name` or `name.overload`) used by this function.
    pub fn operator_names(&self) -> BTreeSet<String> {
        self.table
            .operators
            .iter()
            .map(ToString::to_string)
            .collect()
    }
}

/// Debug strings for one lowered function, parallel to its operator table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DebugRecord {
    pub name: String,
    pub module_debug_info: Vec<String>,
}

/// Output of lowering a single function.
#[derive(Clone, Debug, PartialEq)]
pub struct LoweredFunction {
    pub record: FunctionRecord,
    /// Present only when debug info was requested.
    pub debug: Option<DebugRecord>,
}

/// Output of lowering a whole module, in emission order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoweredModule {
    pub functions: Vec<FunctionRecord>,
    /// Parallel to `functions`. Empty when debug info was not requested.
    pub debug: Vec<DebugRecord>,
}

impl LoweredModule {
    /// Distinct operator names across every lowered function.
    pub fn operator_names(&self) -> BTreeSet<String> {
        self.functions
            .iter()
            .flat_map(FunctionRecord::operator_names)
            .collect()
    }
}
