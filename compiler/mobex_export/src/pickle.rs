//! Tagged value → archive bytes.
//!
//! A [`Value`] is lowered into [`PickleValue`], a serde mirror in which
//! tensors are replaced by [`TensorRef`] placeholders and objects carry the
//! unique name of their class, and then encoded with `bincode`. Tensor
//! storage is collected separately (once per storage) so the packager can
//! write each buffer as its own record next to the archive.

use mobex_ir::{DType, SourceRange, Tensor, TypeId, TypePool, Value};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::{ExportError, TypeNameUniquer};

/// Serializable mirror of [`Value`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PickleValue {
    None,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    Tensor(TensorRef),
    Tuple(Vec<PickleValue>),
    List(Vec<PickleValue>),
    Dict(Vec<(PickleValue, PickleValue)>),
    Object {
        class: String,
        slots: Vec<PickleValue>,
    },
}

/// Placeholder for a tensor whose storage lives in record `<archive>/<key>`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorRef {
    pub key: String,
    pub dtype: String,
    pub shape: Vec<i64>,
}

impl PickleValue {
    /// Rebuild a [`Value`], resolving tensor placeholders through `storage`.
    ///
    /// Objects cannot be rebuilt without their type pool and are rejected.
    pub fn to_value(
        &self,
        storage: &dyn Fn(&str) -> Option<Vec<u8>>,
    ) -> Result<Value, ExportError> {
        Ok(match self {
            PickleValue::None => Value::None,
            PickleValue::Bool(b) => Value::Bool(*b),
            PickleValue::Int(i) => Value::Int(*i),
            PickleValue::Double(d) => Value::Double(*d),
            PickleValue::Str(s) => Value::Str(s.clone()),
            PickleValue::Tensor(tensor) => {
                let dtype = DType::from_name(&tensor.dtype).ok_or_else(|| {
                    ExportError::MalformedArchive(format!("unknown dtype `{}`", tensor.dtype))
                })?;
                let bytes = storage(&tensor.key).ok_or_else(|| {
                    ExportError::MalformedArchive(format!("missing tensor record `{}`", tensor.key))
                })?;
                Value::Tensor(Tensor::from_raw(dtype, tensor.shape.clone(), bytes))
            }
            PickleValue::Tuple(items) => Value::Tuple(to_values(items, storage)?),
            PickleValue::List(items) => Value::List(to_values(items, storage)?),
            PickleValue::Dict(entries) => Value::Dict(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.to_value(storage)?, v.to_value(storage)?)))
                    .collect::<Result<_, ExportError>>()?,
            ),
            PickleValue::Object { class, .. } => {
                return Err(ExportError::MalformedArchive(format!(
                    "cannot rebuild an instance of `{class}` without its type"
                )))
            }
        })
    }
}

fn to_values(
    items: &[PickleValue],
    storage: &dyn Fn(&str) -> Option<Vec<u8>>,
) -> Result<Vec<Value>, ExportError> {
    items.iter().map(|item| item.to_value(storage)).collect()
}

/// One pickled archive before it is written.
#[derive(Debug)]
pub struct PickledArchive {
    pub bytes: Vec<u8>,
    /// Tensor storages, indexed by [`TensorRef::key`].
    pub tensors: Vec<Tensor>,
    /// Class types of every object met, in first-seen order.
    pub class_types: Vec<TypeId>,
}

/// Lowers values into [`PickleValue`]s, collecting tensors and class types.
pub struct Pickler<'a> {
    pool: &'a TypePool,
    namer: &'a mut TypeNameUniquer,
    tensors: Vec<Tensor>,
    /// Storage address → tensor key.
    tensor_keys: FxHashMap<usize, usize>,
    class_types: Vec<TypeId>,
    seen_classes: FxHashSet<TypeId>,
}

impl<'a> Pickler<'a> {
    pub fn new(pool: &'a TypePool, namer: &'a mut TypeNameUniquer) -> Self {
        Self {
            pool,
            namer,
            tensors: Vec::new(),
            tensor_keys: FxHashMap::default(),
            class_types: Vec::new(),
            seen_classes: FxHashSet::default(),
        }
    }

    pub fn lower(&mut self, value: &Value) -> PickleValue {
        match value {
            Value::None => PickleValue::None,
            Value::Bool(b) => PickleValue::Bool(*b),
            Value::Int(i) => PickleValue::Int(*i),
            Value::Double(d) => PickleValue::Double(*d),
            Value::Str(s) => PickleValue::Str(s.clone()),
            Value::Tensor(tensor) => PickleValue::Tensor(self.tensor_ref(tensor)),
            Value::Tuple(items) => PickleValue::Tuple(self.lower_all(items)),
            Value::List(items) => PickleValue::List(self.lower_all(items)),
            Value::Dict(entries) => PickleValue::Dict(
                entries
                    .iter()
                    .map(|(k, v)| (self.lower(k), self.lower(v)))
                    .collect(),
            ),
            Value::Object(object) => {
                let ty = object.ty();
                if self.seen_classes.insert(ty) {
                    self.class_types.push(ty);
                }
                let class = self.namer.unique_name(self.pool, ty).qualified_name();
                PickleValue::Object {
                    class,
                    slots: self.lower_all(object.slots()),
                }
            }
        }
    }

    fn lower_all(&mut self, items: &[Value]) -> Vec<PickleValue> {
        items.iter().map(|item| self.lower(item)).collect()
    }

    fn tensor_ref(&mut self, tensor: &Tensor) -> TensorRef {
        let next = self.tensors.len();
        let key = *self.tensor_keys.entry(tensor.storage_id()).or_insert(next);
        if key == next {
            self.tensors.push(tensor.clone());
        }
        TensorRef {
            key: key.to_string(),
            dtype: tensor.dtype().name().to_owned(),
            shape: tensor.shape().to_vec(),
        }
    }

    /// Encode `root` and hand back everything collected so far.
    pub fn finish(mut self, root: &Value) -> Result<PickledArchive, ExportError> {
        let lowered = self.lower(root);
        let bytes = bincode::serialize(&lowered)?;
        Ok(PickledArchive {
            bytes,
            tensors: self.tensors,
            class_types: self.class_types,
        })
    }
}

/// Pickle a single value.
pub fn pickle_value(
    value: &Value,
    pool: &TypePool,
    namer: &mut TypeNameUniquer,
) -> Result<PickledArchive, ExportError> {
    Pickler::new(pool, namer).finish(value)
}

pub fn unpickle(bytes: &[u8]) -> Result<PickleValue, ExportError> {
    Ok(bincode::deserialize(bytes)?)
}

/// Encode the source-range table of a generated file.
pub fn pickle_ranges(ranges: &[(usize, SourceRange)]) -> Result<Vec<u8>, ExportError> {
    Ok(bincode::serialize(ranges)?)
}

pub fn unpickle_ranges(bytes: &[u8]) -> Result<Vec<(usize, SourceRange)>, ExportError> {
    Ok(bincode::deserialize(bytes)?)
}
