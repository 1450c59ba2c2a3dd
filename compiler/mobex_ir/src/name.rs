//! Dotted qualified names.

use std::fmt;

/// A dotted name such as `__module__.encoder.Layer`.
///
/// The last atom is the base [`name`](QualifiedName::name); everything
/// before it is the [`prefix`](QualifiedName::prefix), which doubles as the
/// file qualifier when generated sources are grouped by namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName {
    atoms: Vec<String>,
}

impl QualifiedName {
    /// Parse a dotted name. Empty atoms are dropped.
    pub fn new(dotted: &str) -> Self {
        Self {
            atoms: dotted
                .split('.')
                .filter(|atom| !atom.is_empty())
                .map(str::to_owned)
                .collect(),
        }
    }

    /// Build a name from pre-split atoms.
    pub fn from_atoms(atoms: Vec<String>) -> Self {
        Self { atoms }
    }

    #[inline]
    pub fn atoms(&self) -> &[String] {
        &self.atoms
    }

    /// The base name (last atom), or `""` for an empty name.
    pub fn name(&self) -> &str {
        self.atoms.last().map_or("", String::as_str)
    }

    /// Everything before the base name, dot-joined.
    pub fn prefix(&self) -> String {
        match self.atoms.split_last() {
            Some((_, prefix)) => prefix.join("."),
            None => String::new(),
        }
    }

    /// The full dotted form.
    pub fn qualified_name(&self) -> String {
        self.atoms.join(".")
    }

    /// Same name with `atom` inserted directly before the base name.
    ///
    /// `a.b.C` with `m` becomes `a.b.m.C`.
    pub fn with_atom_before_name(&self, atom: &str) -> Self {
        let mut atoms = self.atoms.clone();
        let at = atoms.len().saturating_sub(1);
        atoms.insert(at, atom.to_owned());
        Self { atoms }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, atom) in self.atoms.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(atom)?;
        }
        Ok(())
    }
}

impl From<&str> for QualifiedName {
    fn from(dotted: &str) -> Self {
        Self::new(dotted)
    }
}
