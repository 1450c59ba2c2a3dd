//! Modules: a root object plus the type pool it lives in.

use std::rc::Rc;

use crate::{ClassType, Function, Object, QualifiedName, TypeId, TypePool};

/// Error constructing a [`Module`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ModuleError {
    #[error("module root must be an instance of a class, found type `{found}`")]
    RootNotClass { found: String },
    #[error("module root has {found} slots but class `{class}` declares {expected} attributes")]
    SlotCountMismatch {
        class: String,
        expected: usize,
        found: usize,
    },
}

/// A module ready for export.
///
/// The root object's class supplies the methods (in declaration order) and
/// the root object itself is the state tree. The exporter never mutates it.
#[derive(Debug)]
pub struct Module {
    pool: TypePool,
    root: Rc<Object>,
}

impl Module {
    pub fn new(pool: TypePool, root: Object) -> Result<Self, ModuleError> {
        let Some(class) = pool.class(root.ty()) else {
            return Err(ModuleError::RootNotClass {
                found: pool.annotation_str(root.ty()),
            });
        };
        if class.attributes.len() != root.slots().len() {
            return Err(ModuleError::SlotCountMismatch {
                class: class.name.qualified_name(),
                expected: class.attributes.len(),
                found: root.slots().len(),
            });
        }
        Ok(Self {
            pool,
            root: Rc::new(root),
        })
    }

    #[inline]
    pub fn pool(&self) -> &TypePool {
        &self.pool
    }

    /// The root state object.
    #[inline]
    pub fn object(&self) -> &Rc<Object> {
        &self.root
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.root.ty()
    }

    pub fn class(&self) -> &ClassType {
        match self.pool.class(self.root.ty()) {
            Some(class) => class,
            None => unreachable!("Module::new checks that the root is a class instance"),
        }
    }

    #[inline]
    pub fn type_name(&self) -> &QualifiedName {
        &self.class().name
    }

    /// Graph-backed methods of the root class, in declaration order.
    pub fn methods(&self) -> impl Iterator<Item = &Rc<Function>> {
        self.class().methods.iter().filter(|m| m.is_graph_function())
    }

    pub fn find_method(&self, name: &str) -> Option<&Rc<Function>> {
        self.class().find_method(name)
    }
}
