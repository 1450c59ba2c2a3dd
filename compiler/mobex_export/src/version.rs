//! Format versions and size thresholds.

/// Version of the bytecode tables this crate produces.
pub const BYTECODE_VERSION: i64 = 4;

/// File-format version every generated source file needs at least.
pub const BASE_FILE_FORMAT_VERSION: u64 = 2;

/// File-format version required once a source file uses `aten::div`, whose
/// integer semantics changed at this version.
pub const DIV_FILE_FORMAT_VERSION: u64 = 4;

/// Records at or below this many bytes are never compressed.
pub const MIN_COMPRESS_SIZE: usize = 200;

/// Whether a record of `len` bytes is worth compressing.
#[inline]
pub fn should_compress(len: usize) -> bool {
    len > MIN_COMPRESS_SIZE
}
