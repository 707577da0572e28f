//! The symbolic environment, mapping fully-qualified program variables to
//! the symbolic values they currently hold.

use im::OrdMap;

use crate::{
    constant::VALIDITY_FIELD,
    ir::expr::{Expr, Name},
};

/// A persistent map from variable paths to symbolic values.
///
/// Cloning is O(1) and all updates produce new versions that share structure
/// with the old ones, so states that fork from one another never observe each
/// other's writes.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SymbolicEnvironment {
    values: OrdMap<Name, Expr>,
}

impl SymbolicEnvironment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the value bound to `path`.
    ///
    /// The validity bit of a header that was never written reads as `false`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Expr> {
        self.values.get(path).cloned().or_else(|| {
            path.rsplit_once('.')
                .filter(|(_, field)| *field == VALIDITY_FIELD)
                .map(|_| Expr::bool(false))
        })
    }

    /// Binds `path` to `value` in place.
    pub fn insert(&mut self, path: impl Into<Name>, value: Expr) {
        self.values.insert(path.into(), value);
    }

    /// Creates a new environment in which `path` is bound to `value`.
    #[must_use]
    pub fn set(&self, path: impl Into<Name>, value: Expr) -> Self {
        let values = self.values.update(path.into(), value);
        Self { values }
    }

    /// Creates a new environment with every binding of `bindings` added, later
    /// bindings replacing earlier ones.
    #[must_use]
    pub fn with(&self, bindings: impl IntoIterator<Item = (Name, Expr)>) -> Self {
        let mut values = self.values.clone();
        values.extend(bindings);
        Self { values }
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.values.contains_key(path)
    }

    /// Iterates over the bindings in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Expr)> {
        self.values.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(Name, Expr)> for SymbolicEnvironment {
    fn from_iter<T: IntoIterator<Item = (Name, Expr)>>(iter: T) -> Self {
        let values = iter.into_iter().collect();
        Self { values }
    }
}
