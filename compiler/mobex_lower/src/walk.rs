//! Module traversal.
//!
//! Decides which functions a module exports and in what order: the root
//! class's methods first (declaration order), then every `__setstate__`
//! reachable through the state tree (depth-first, attribute order). An
//! object whose class defines a valid `__getstate__`/`__setstate__` pair is
//! restored through `__setstate__`, so its own attributes are not visited.

use std::rc::Rc;

use mobex_ir::{Function, Module, Object, Value};
use rustc_hash::FxHashSet;

use crate::{FunctionLowerer, GraphCompiler, LowerError, LoweredModule, RegisterCompiler};

/// Lower every exported function of `module`.
pub fn lower_module(
    module: &Module,
    debug_info: bool,
    compiler: &dyn GraphCompiler,
) -> Result<LoweredModule, LowerError> {
    let mut walker = ModuleWalker {
        lowerer: FunctionLowerer::new(module, compiler, debug_info),
        module,
        lowered: LoweredModule::default(),
        emitted: FxHashSet::default(),
    };
    for method in module.methods() {
        walker.emit(method)?;
    }
    walker.visit_state()?;

    tracing::debug!(
        module = %module.type_name(),
        functions = walker.lowered.functions.len(),
        "lowered module"
    );
    Ok(walker.lowered)
}

/// [`lower_module`] with the default compiler.
pub fn lower_module_default(
    module: &Module,
    debug_info: bool,
) -> Result<LoweredModule, LowerError> {
    lower_module(module, debug_info, &RegisterCompiler)
}

struct ModuleWalker<'a> {
    lowerer: FunctionLowerer<'a>,
    module: &'a Module,
    lowered: LoweredModule,
    /// Qualified names already lowered. A class shared by several
    /// attributes contributes its `__setstate__` once.
    emitted: FxHashSet<String>,
}

impl ModuleWalker<'_> {
    fn emit(&mut self, function: &Function) -> Result<(), LowerError> {
        let name = function.name().qualified_name();
        if !self.emitted.insert(name) {
            tracing::trace!(function = %function.name(), "already lowered");
            return Ok(());
        }
        let lowered = self.lowerer.lower(function)?;
        self.lowered.functions.push(lowered.record);
        self.lowered.debug.extend(lowered.debug);
        Ok(())
    }

    fn visit_state(&mut self) -> Result<(), LowerError> {
        let pool = self.module.pool();
        let mut visited: FxHashSet<*const Object> = FxHashSet::default();
        let mut stack: Vec<Rc<Object>> = vec![Rc::clone(self.module.object())];

        while let Some(object) = stack.pop() {
            if !visited.insert(Rc::as_ptr(&object)) {
                continue;
            }
            let Some(class) = pool.class(object.ty()) else {
                continue;
            };
            if let Some((_, setstate)) = class.valid_state_pair() {
                if setstate.is_graph_function() {
                    self.emit(setstate)?;
                }
                continue;
            }
            let children = object.slots().iter().rev().filter_map(Value::as_object);
            stack.extend(children.cloned());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
