//! Unique type names.
//!
//! Two distinct named types may share a qualified name (a class redefined in
//! a notebook, two modules scripted from the same source). The archive needs
//! one name per type, so later claimants get a `___torch_mangle_<n>` atom
//! inserted before their base name. The prefix of the resulting name is the
//! type's qualifier: every type with the same qualifier lands in the same
//! generated source file.

use mobex_ir::{QualifiedName, TypeId, TypePool};
use rustc_hash::{FxHashMap, FxHashSet};

const MANGLE_PREFIX: &str = "___torch_mangle_";

/// Assigns each named type a collision-free qualified name.
///
/// Idempotent: asking again for the same type returns the same name.
#[derive(Debug, Default)]
pub struct TypeNameUniquer {
    assigned: FxHashMap<TypeId, QualifiedName>,
    taken: FxHashSet<QualifiedName>,
    next_mangle: usize,
}

impl TypeNameUniquer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The unique name of `ty`. Unnamed types fall back to their annotation.
    pub fn unique_name(&mut self, pool: &TypePool, ty: TypeId) -> QualifiedName {
        if let Some(name) = self.assigned.get(&ty) {
            return name.clone();
        }
        let requested = pool
            .named_type_name(ty)
            .cloned()
            .unwrap_or_else(|| QualifiedName::new(&pool.annotation_str(ty)));

        let mut name = requested.clone();
        while self.taken.contains(&name) {
            let atom = format!("{MANGLE_PREFIX}{}", self.next_mangle);
            self.next_mangle += 1;
            name = requested.with_atom_before_name(&atom);
        }
        if name != requested {
            tracing::debug!(requested = %requested, assigned = %name, "mangled type name");
        }

        self.taken.insert(name.clone());
        self.assigned.insert(ty, name.clone());
        name
    }

    /// A name already assigned to `ty`, without assigning one.
    pub fn get(&self, ty: TypeId) -> Option<&QualifiedName> {
        self.assigned.get(&ty)
    }
}
