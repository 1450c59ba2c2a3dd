//! Bytecode tables as tagged values.
//!
//! The `bytecode` archive is a tuple: the bytecode version followed by one
//! entry per function,
//!
//! ```text
//! (name, (("instructions", ((OP, x, n), ...)),
//!         ("operators", ((name, overload), ...)),
//!         ("constants", (...)),
//!         ("types", (...)),
//!         ("register_size", n)))
//! ```
//!
//! `mobile_debug` has the same outer shape with
//! `(name, (("module_debug_info", (...)),))` entries.
//!
//! Decoding is strict: every tag, key and arity is checked, so anything
//! read back with [`TableValue::from_value`] has the typed shape the
//! deduplicator and operator listing rely on.

use std::collections::BTreeSet;

use mobex_ir::{Instruction, OpCode, OperatorName, Value};
use mobex_lower::{DebugRecord, FunctionRecord, FunctionTable};

use crate::version::BYTECODE_VERSION;
use crate::ExportError;

/// A record with a tagged-value encoding.
pub trait TableValue: Sized {
    fn to_value(&self) -> Value;

    fn from_value(value: &Value) -> Result<Self, ExportError>;
}

// ── Encoding ────────────────────────────────────────────────────────

fn entry(key: &str, value: Value) -> Value {
    Value::Tuple(vec![Value::str(key), value])
}

fn instruction_value(instruction: &Instruction) -> Value {
    Value::Tuple(vec![
        Value::str(instruction.op.as_str()),
        Value::Int(i64::from(instruction.x)),
        Value::Int(i64::from(instruction.n)),
    ])
}

fn operator_value(operator: &OperatorName) -> Value {
    Value::Tuple(vec![
        Value::str(&operator.name),
        Value::str(&operator.overload),
    ])
}

impl TableValue for FunctionRecord {
    fn to_value(&self) -> Value {
        let table = &self.table;
        let fields = vec![
            entry(
                "instructions",
                Value::Tuple(table.instructions.iter().map(instruction_value).collect()),
            ),
            entry(
                "operators",
                Value::Tuple(table.operators.iter().map(operator_value).collect()),
            ),
            entry("constants", Value::Tuple(table.constants.clone())),
            entry(
                "types",
                Value::Tuple(table.types.iter().map(|t| Value::str(t)).collect()),
            ),
            entry("register_size", Value::Int(register_size_value(table.register_size))),
        ];
        Value::Tuple(vec![Value::str(&self.name), Value::Tuple(fields)])
    }

    fn from_value(value: &Value) -> Result<Self, ExportError> {
        let (name, fields) = named_entry(value)?;
        let [instructions, operators, constants, types, register_size] = fields else {
            return Err(ExportError::MalformedTable {
                expected: "5 table entries",
                found: format!("{} entries", fields.len()),
            });
        };

        let instructions = tuple(keyed(instructions, "instructions")?, "instruction list")?
            .iter()
            .map(decode_instruction)
            .collect::<Result<_, _>>()?;
        let operators = tuple(keyed(operators, "operators")?, "operator list")?
            .iter()
            .map(decode_operator)
            .collect::<Result<_, _>>()?;
        let constants = tuple(keyed(constants, "constants")?, "constant list")?.to_vec();
        let types = tuple(keyed(types, "types")?, "type list")?
            .iter()
            .map(|t| string(t, "type annotation"))
            .collect::<Result<_, _>>()?;
        let register_size = keyed(register_size, "register_size")?;
        let register_size = register_size
            .as_int()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| ExportError::table("non-negative register size", register_size))?;

        Ok(FunctionRecord {
            name,
            table: FunctionTable {
                instructions,
                operators,
                constants,
                types,
                register_size,
            },
        })
    }
}

impl TableValue for DebugRecord {
    fn to_value(&self) -> Value {
        let info = self.module_debug_info.iter().map(|s| Value::str(s)).collect();
        Value::Tuple(vec![
            Value::str(&self.name),
            Value::Tuple(vec![entry("module_debug_info", Value::Tuple(info))]),
        ])
    }

    fn from_value(value: &Value) -> Result<Self, ExportError> {
        let (name, fields) = named_entry(value)?;
        let [info] = fields else {
            return Err(ExportError::MalformedTable {
                expected: "1 debug entry",
                found: format!("{} entries", fields.len()),
            });
        };
        let module_debug_info = tuple(keyed(info, "module_debug_info")?, "debug string list")?
            .iter()
            .map(|s| string(s, "debug string"))
            .collect::<Result<_, _>>()?;
        Ok(DebugRecord {
            name,
            module_debug_info,
        })
    }
}

fn register_size_value(size: usize) -> i64 {
    i64::try_from(size).unwrap_or(i64::MAX)
}

/// The `bytecode` archive value: version, then one record per function.
pub fn bytecode_archive(functions: &[FunctionRecord]) -> Value {
    versioned(functions.iter().map(TableValue::to_value))
}

/// The `mobile_debug` archive value, parallel to [`bytecode_archive`].
pub fn debug_archive(debug: &[DebugRecord]) -> Value {
    versioned(debug.iter().map(TableValue::to_value))
}

fn versioned(records: impl Iterator<Item = Value>) -> Value {
    Value::Tuple(
        std::iter::once(Value::Int(BYTECODE_VERSION))
            .chain(records)
            .collect(),
    )
}

/// Decode a `bytecode` archive value back into typed records.
pub fn decode_bytecode(value: &Value) -> Result<Vec<FunctionRecord>, ExportError> {
    decode_versioned(value)?
        .iter()
        .map(FunctionRecord::from_value)
        .collect()
}

/// Decode a `mobile_debug` archive value back into typed records.
pub fn decode_debug(value: &Value) -> Result<Vec<DebugRecord>, ExportError> {
    decode_versioned(value)?
        .iter()
        .map(DebugRecord::from_value)
        .collect()
}

fn decode_versioned(value: &Value) -> Result<&[Value], ExportError> {
    let items = tuple(value, "versioned archive tuple")?;
    let Some((version, records)) = items.split_first() else {
        return Err(ExportError::MalformedTable {
            expected: "bytecode version",
            found: String::from("empty tuple"),
        });
    };
    if version.as_int() != Some(BYTECODE_VERSION) {
        return Err(ExportError::MalformedTable {
            expected: "bytecode version 4",
            found: version.to_string(),
        });
    }
    Ok(records)
}

/// Sorted distinct `name` / `name.overload` strings used by a decoded
/// `bytecode` archive.
pub fn operator_names_from_bytecode(value: &Value) -> Result<BTreeSet<String>, ExportError> {
    Ok(decode_bytecode(value)?
        .iter()
        .flat_map(FunctionRecord::operator_names)
        .collect())
}

// ── Decoding helpers ────────────────────────────────────────────────

fn tuple<'v>(value: &'v Value, expected: &'static str) -> Result<&'v [Value], ExportError> {
    value
        .as_tuple()
        .ok_or_else(|| ExportError::table(expected, value))
}

fn string(value: &Value, expected: &'static str) -> Result<String, ExportError> {
    value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| ExportError::table(expected, value))
}

/// Split `(name, (fields...))`.
fn named_entry(value: &Value) -> Result<(String, &[Value]), ExportError> {
    match tuple(value, "(name, table) tuple")? {
        [name, fields] => Ok((
            string(name, "function name")?,
            tuple(fields, "table tuple")?,
        )),
        other => Err(ExportError::MalformedTable {
            expected: "(name, table) pair",
            found: format!("{}-tuple", other.len()),
        }),
    }
}

/// The value of a `(key, value)` entry whose key must be `key`.
fn keyed<'v>(value: &'v Value, key: &'static str) -> Result<&'v Value, ExportError> {
    match tuple(value, "(key, value) entry")? {
        [found, inner] if found.as_str() == Some(key) => Ok(inner),
        [found, _] => Err(ExportError::MalformedTable {
            expected: key,
            found: found.to_string(),
        }),
        other => Err(ExportError::MalformedTable {
            expected: "(key, value) pair",
            found: format!("{}-tuple", other.len()),
        }),
    }
}

fn decode_instruction(value: &Value) -> Result<Instruction, ExportError> {
    let [op, x, n] = tuple(value, "instruction tuple")? else {
        return Err(ExportError::table("(opcode, x, n) instruction", value));
    };
    let op = op
        .as_str()
        .and_then(OpCode::from_name)
        .ok_or_else(|| ExportError::table("opcode name", op))?;
    let x = x
        .as_int()
        .and_then(|x| i32::try_from(x).ok())
        .ok_or_else(|| ExportError::table("32-bit operand", x))?;
    let n = n
        .as_int()
        .and_then(|n| u16::try_from(n).ok())
        .ok_or_else(|| ExportError::table("16-bit operand", n))?;
    Ok(Instruction::new(op, x, n))
}

fn decode_operator(value: &Value) -> Result<OperatorName, ExportError> {
    match tuple(value, "operator tuple")? {
        [name, overload] => Ok(OperatorName::new(
            &string(name, "operator name")?,
            &string(overload, "operator overload")?,
        )),
        other => Err(ExportError::MalformedOperatorName { arity: other.len() }),
    }
}
