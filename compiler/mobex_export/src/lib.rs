//! Mobile module export.
//!
//! This crate packages a [`Module`](mobex_ir::Module) into named records:
//!
//! - **Naming** ([`TypeNameUniquer`]): one collision-free qualified name
//!   per named type; the name's prefix picks the generated source file.
//!
//! - **Source emission** ([`SourcePrinter`], [`ConstantTable`]): renders
//!   classes, interfaces and named tuples, discovering the named types they
//!   mention and moving tensor literals into the global constant pool.
//!
//! - **Pickling** ([`Pickler`], [`PickleValue`]): tagged values to
//!   `bincode` bytes, with tensor storage split into sibling records.
//!
//! - **Bytecode tables** ([`TableValue`], [`bytecode_archive`]): typed
//!   function and debug records to and from their tagged-value layout.
//!
//! - **Deduplication** ([`deduplicate_constants`], [`ConstantEquivalence`]):
//!   drops function-table constants already stored in the global pool.
//!
//! - **Packaging** ([`export_module`], [`ModuleSerializer`]): runs one
//!   export session against a [`RecordWriter`] in the fixed record order.
//!
//! # Crate Dependencies
//!
//! Lowering comes from `mobex_lower`; the data model from `mobex_ir`.
//! `serde` + `bincode` encode pickled archives.

mod bytecode;
mod dedup;
mod error;
mod namer;
mod pickle;
mod printer;
mod serializer;
pub mod version;
mod writer;

#[cfg(test)]
mod test_helpers;

pub use bytecode::{
    bytecode_archive, debug_archive, decode_bytecode, decode_debug, operator_names_from_bytecode,
    TableValue,
};
pub use dedup::{deduplicate_constants, ConstantEquivalence, ConstantPool};
pub use error::ExportError;
pub use namer::TypeNameUniquer;
pub use pickle::{
    pickle_ranges, pickle_value, unpickle, unpickle_ranges, PickleValue, PickledArchive, Pickler,
    TensorRef,
};
pub use printer::{ConstantTable, PrintContext, SourcePrinter};
pub use serializer::{
    export_module, export_operator_names, ExportHooks, ExportOptions, ExportReport, ExtraFiles,
    ModuleSerializer,
};
pub use writer::{MemoryArchive, Record, RecordWriter};
