//! Mobile bytecode lowering.
//!
//! This crate turns module methods into the function tables the mobile
//! interpreter executes:
//!
//! - **Inlining** ([`inline()`]): splices statically resolvable calls into
//!   their caller, recording an [`InlinedCallStack`](mobex_ir::InlinedCallStack)
//!   on every spliced node.
//!
//! - **Compilation** ([`GraphCompiler`], [`RegisterCompiler`]): flattens an
//!   inlined graph into register code with per-instruction source nodes.
//!
//! - **Lowering** ([`FunctionLowerer`], [`lower_function`]): builds the
//!   operator/constant/type tables, rewrites `CALL` into `INTERFACE_CALL`
//!   and rejects anything the mobile runtime cannot execute.
//!
//! - **Module walking** ([`lower_module`]): picks the exported functions:
//!   root methods, then every reachable `__setstate__`.
//!
//! # Crate Dependencies
//!
//! `mobex_lower` depends only on `mobex_ir`. Archive layout and
//! serialization live in `mobex_export`.

mod compile;
mod error;
mod inline;
mod lower;
mod record;
mod walk;

#[cfg(test)]
mod test_helpers;

pub use compile::{GraphCompiler, RegisterCompiler};
pub use error::{GraphError, LowerError};
pub use inline::inline;
pub use lower::{
    is_op_supported_in_mobile, lower_function, FunctionLowerer, MOBILE_SUPPORTED_OPS,
};
pub use record::{DebugRecord, FunctionRecord, FunctionTable, LoweredFunction, LoweredModule};
pub use walk::{lower_module, lower_module_default};
