//! Dense tensors with shared storage.
//!
//! A tensor is a dtype, a shape and a little-endian byte buffer. Storage is
//! reference counted so that cloning a tensor (into a constant table, into
//! the state snapshot) keeps pointing at the same bytes; the pickler uses
//! storage identity to write each buffer once.

use std::fmt;
use std::rc::Rc;

/// Above this many elements the printed form is summarised.
const PRINT_THRESHOLD: usize = 1000;

/// Elements kept at each end of a summarised dimension.
const EDGE_ITEMS: usize = 3;

/// Element type of a tensor.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DType {
    Bool,
    UInt8,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl DType {
    /// Size of one element in bytes.
    pub const fn element_size(self) -> usize {
        match self {
            DType::Bool | DType::UInt8 => 1,
            DType::Int32 | DType::Float32 => 4,
            DType::Int64 | DType::Float64 => 8,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::UInt8 => "uint8",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
        }
    }

    /// Inverse of [`name`](DType::name).
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => DType::Bool,
            "uint8" => DType::UInt8,
            "int32" => DType::Int32,
            "int64" => DType::Int64,
            "float32" => DType::Float32,
            "float64" => DType::Float64,
            _ => return None,
        })
    }
}

/// Rust scalar types that can seed a tensor.
pub trait Element: Copy {
    const DTYPE: DType;

    fn extend_le(self, out: &mut Vec<u8>);
}

macro_rules! impl_element {
    ($ty:ty, $dtype:expr) => {
        impl Element for $ty {
            const DTYPE: DType = $dtype;

            fn extend_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }
        }
    };
}

impl_element!(u8, DType::UInt8);
impl_element!(i32, DType::Int32);
impl_element!(i64, DType::Int64);
impl_element!(f32, DType::Float32);
impl_element!(f64, DType::Float64);

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    fn extend_le(self, out: &mut Vec<u8>) {
        out.push(u8::from(self));
    }
}

/// A dense tensor value.
#[derive(Clone, Debug)]
pub struct Tensor {
    dtype: DType,
    shape: Vec<i64>,
    storage: Rc<[u8]>,
}

impl Tensor {
    /// Build a tensor from typed elements in row-major order.
    pub fn new<T: Element>(shape: &[i64], data: &[T]) -> Self {
        let mut bytes = Vec::with_capacity(data.len() * T::DTYPE.element_size());
        for &elem in data {
            elem.extend_le(&mut bytes);
        }
        let tensor = Self {
            dtype: T::DTYPE,
            shape: shape.to_vec(),
            storage: bytes.into(),
        };
        debug_assert_eq!(tensor.numel(), data.len(), "shape does not match data");
        tensor
    }

    /// A zero-dimensional tensor holding one element.
    pub fn scalar<T: Element>(value: T) -> Self {
        Self::new(&[], &[value])
    }

    /// Build a tensor from raw little-endian bytes.
    pub fn from_raw(dtype: DType, shape: Vec<i64>, bytes: Vec<u8>) -> Self {
        Self {
            dtype,
            shape,
            storage: bytes.into(),
        }
    }

    #[inline]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    #[inline]
    pub fn shape(&self) -> &[i64] {
        &self.shape
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.storage
    }

    /// Number of elements (1 for a zero-dimensional tensor).
    pub fn numel(&self) -> usize {
        self.shape
            .iter()
            .map(|&d| usize::try_from(d).unwrap_or(0))
            .product()
    }

    /// Address of the shared storage; equal for clones of the same tensor.
    pub fn storage_id(&self) -> usize {
        Rc::as_ptr(&self.storage).cast::<u8>() as usize
    }

    #[inline]
    pub fn shares_storage(&self, other: &Tensor) -> bool {
        Rc::ptr_eq(&self.storage, &other.storage)
    }

    /// Same dtype, shape and bytes.
    pub fn structurally_equal(&self, other: &Tensor) -> bool {
        self.dtype == other.dtype && self.shape == other.shape && self.bytes() == other.bytes()
    }

    fn format_element(&self, index: usize) -> String {
        let size = self.dtype.element_size();
        let Some(bytes) = self.storage.get(index * size..(index + 1) * size) else {
            return "?".to_owned();
        };
        match self.dtype {
            DType::Bool => (if bytes[0] == 0 { "False" } else { "True" }).to_owned(),
            DType::UInt8 => bytes[0].to_string(),
            DType::Int32 => i32::from_le_bytes(le_array(bytes)).to_string(),
            DType::Int64 => i64::from_le_bytes(le_array(bytes)).to_string(),
            DType::Float32 => format!("{:?}", f32::from_le_bytes(le_array(bytes))),
            DType::Float64 => format!("{:?}", f64::from_le_bytes(le_array(bytes))),
        }
    }

    fn format_dim(&self, dim: usize, offset: usize, summarize: bool, out: &mut String) {
        let size = usize::try_from(self.shape[dim]).unwrap_or(0);
        let stride: usize = self.shape[dim + 1..]
            .iter()
            .map(|&d| usize::try_from(d).unwrap_or(0))
            .product();
        let innermost = dim + 1 == self.shape.len();

        let indices: Vec<Option<usize>> = if summarize && size > 2 * EDGE_ITEMS {
            (0..EDGE_ITEMS)
                .map(Some)
                .chain(std::iter::once(None))
                .chain((size - EDGE_ITEMS..size).map(Some))
                .collect()
        } else {
            (0..size).map(Some).collect()
        };

        out.push('[');
        for (k, index) in indices.into_iter().enumerate() {
            if k > 0 {
                out.push_str(", ");
            }
            match index {
                None => out.push_str("..."),
                Some(i) if innermost => out.push_str(&self.format_element(offset + i * stride)),
                Some(i) => self.format_dim(dim + 1, offset + i * stride, summarize, out),
            }
        }
        out.push(']');
    }
}

fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut buf = [0u8; N];
    buf.copy_from_slice(&bytes[..N]);
    buf
}

/// Canonical printed form, e.g. `tensor([1, 2, 3], dtype=int64)`.
///
/// Tensors with more than 1000 elements print only the first and last three
/// entries of each dimension, so distinct large tensors can print alike.
impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut body = String::new();
        if self.shape.is_empty() {
            body.push_str(&self.format_element(0));
        } else {
            self.format_dim(0, 0, self.numel() > PRINT_THRESHOLD, &mut body);
        }
        write!(f, "tensor({body}, dtype={})", self.dtype.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn prints_vector() {
        let t = Tensor::new(&[3], &[1i64, 2, 3]);
        assert_eq!(t.to_string(), "tensor([1, 2, 3], dtype=int64)");
    }

    #[test]
    fn prints_matrix_and_scalar() {
        let m = Tensor::new(&[2, 2], &[1.0f32, 2.0, 3.0, 4.5]);
        assert_eq!(
            m.to_string(),
            "tensor([[1.0, 2.0], [3.0, 4.5]], dtype=float32)"
        );
        assert_eq!(Tensor::scalar(true).to_string(), "tensor(True, dtype=bool)");
    }

    #[test]
    fn summarises_large_tensors() {
        let data: Vec<i64> = (0..2000).collect();
        let t = Tensor::new(&[2000], &data);
        assert_eq!(
            t.to_string(),
            "tensor([0, 1, 2, ..., 1997, 1998, 1999], dtype=int64)"
        );
    }

    #[test]
    fn clones_share_storage() {
        let a = Tensor::new(&[2], &[1i32, 2]);
        let b = a.clone();
        let c = Tensor::new(&[2], &[1i32, 2]);
        assert!(a.shares_storage(&b));
        assert_eq!(a.storage_id(), b.storage_id());
        assert!(!a.shares_storage(&c));
        assert!(a.structurally_equal(&c));
    }
}
