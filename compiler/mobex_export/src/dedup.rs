//! Constant deduplication against the global pool.
//!
//! A lowered function embeds its constants. Those already stored in the
//! `constants` archive can be dropped from the function table. Only the
//! `constants` field shrinks: instructions, operators, types and register
//! size pass through untouched, and surviving constants keep their order.
//!
//! Whether a table constant "is in the pool" depends on the
//! [`ConstantEquivalence`]. Scalars, strings and containers compare
//! structurally under both policies. Objects compare by identity. Doubles
//! compare by bit pattern.

use mobex_ir::{Tensor, Value};
use mobex_lower::FunctionRecord;
use rustc_hash::FxHashSet;

/// How tensors in function tables are matched against pool tensors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConstantEquivalence {
    /// Same dtype, shape and bytes.
    #[default]
    Structural,
    /// Same canonical printed form. Large tensors print summarised, so two
    /// different tensors can match.
    Printed,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum TensorKey {
    Structural {
        dtype: &'static str,
        shape: Vec<i64>,
        bytes: Vec<u8>,
    },
    Printed(String),
}

/// Hashable image of a constant under one equivalence.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum ConstantKey {
    None,
    Bool(bool),
    Int(i64),
    Double(u64),
    Str(String),
    Tensor(TensorKey),
    Tuple(Vec<ConstantKey>),
    List(Vec<ConstantKey>),
    Dict(Vec<(ConstantKey, ConstantKey)>),
    Object(usize),
}

impl ConstantEquivalence {
    fn tensor_key(self, tensor: &Tensor) -> TensorKey {
        match self {
            ConstantEquivalence::Structural => TensorKey::Structural {
                dtype: tensor.dtype().name(),
                shape: tensor.shape().to_vec(),
                bytes: tensor.bytes().to_vec(),
            },
            ConstantEquivalence::Printed => TensorKey::Printed(tensor.to_string()),
        }
    }

    fn key(self, value: &Value) -> ConstantKey {
        match value {
            Value::None => ConstantKey::None,
            Value::Bool(b) => ConstantKey::Bool(*b),
            Value::Int(i) => ConstantKey::Int(*i),
            Value::Double(d) => ConstantKey::Double(d.to_bits()),
            Value::Str(s) => ConstantKey::Str(s.clone()),
            Value::Tensor(t) => ConstantKey::Tensor(self.tensor_key(t)),
            Value::Tuple(items) => ConstantKey::Tuple(items.iter().map(|v| self.key(v)).collect()),
            Value::List(items) => ConstantKey::List(items.iter().map(|v| self.key(v)).collect()),
            Value::Dict(entries) => ConstantKey::Dict(
                entries
                    .iter()
                    .map(|(k, v)| (self.key(k), self.key(v)))
                    .collect(),
            ),
            Value::Object(object) => ConstantKey::Object(std::rc::Rc::as_ptr(object) as usize),
        }
    }

    /// Whether `a` and `b` are the same constant under this policy.
    pub fn equivalent(self, a: &Value, b: &Value) -> bool {
        self.key(a) == self.key(b)
    }
}

/// Membership test for the global constant pool.
#[derive(Debug)]
pub struct ConstantPool {
    equivalence: ConstantEquivalence,
    keys: FxHashSet<ConstantKey>,
}

impl ConstantPool {
    pub fn new(equivalence: ConstantEquivalence, constants: &[Value]) -> Self {
        Self {
            equivalence,
            keys: constants.iter().map(|c| equivalence.key(c)).collect(),
        }
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.keys.contains(&self.equivalence.key(value))
    }
}

/// Drop every table constant already present in `pool`. Returns how many
/// constants were removed in total.
pub fn deduplicate_constants(functions: &mut [FunctionRecord], pool: &ConstantPool) -> usize {
    let mut removed = 0;
    for function in functions {
        let constants = &mut function.table.constants;
        let before = constants.len();
        constants.retain(|constant| !pool.contains(constant));
        let dropped = before - constants.len();
        if dropped > 0 {
            tracing::debug!(function = %function.name, removed = dropped, "deduplicated constants");
        }
        removed += dropped;
    }
    removed
}
