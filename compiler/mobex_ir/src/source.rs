//! Source ranges and inlined call stacks attached to graph nodes.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::TypeId;

/// A position in the original source of a method.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRange {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl SourceRange {
    pub fn new(file: &str, line: u32, column: u32) -> Self {
        Self {
            file: file.to_owned(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Which module instance a call was made on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleInstanceInfo {
    /// Class of the receiver, when known.
    pub class_type: Option<TypeId>,
    pub instance_name: String,
}

/// One inlined call: the callee and where it was called from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallStackEntry {
    /// Base name of the callee (`forward`, `helper`, ...).
    pub function: String,
    pub call_site: Option<SourceRange>,
    pub module_instance: Option<ModuleInstanceInfo>,
}

/// Chain of inlined calls that produced a node, outermost first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InlinedCallStack {
    entries: SmallVec<[CallStackEntry; 2]>,
}

impl InlinedCallStack {
    pub fn new(entry: CallStackEntry) -> Self {
        let mut entries = SmallVec::new();
        entries.push(entry);
        Self { entries }
    }

    #[inline]
    pub fn entries(&self) -> &[CallStackEntry] {
        &self.entries
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `outer` followed by `self`: the stack a node gets when the call
    /// that contained it is itself inlined.
    #[must_use]
    pub fn nested_under(&self, outer: &InlinedCallStack) -> Self {
        let mut entries = outer.entries.clone();
        entries.extend(self.entries.iter().cloned());
        Self { entries }
    }

    /// Call-site ranges, outermost first, separated by `;`.
    pub fn source_range_trace(&self) -> String {
        let mut trace = String::new();
        for range in self.entries.iter().filter_map(|e| e.call_site.as_ref()) {
            if !trace.is_empty() {
                trace.push(';');
            }
            trace.push_str(&range.to_string());
        }
        trace
    }
}
