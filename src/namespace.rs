//! Lexical scoping for name resolution during evaluation.
//!
//! A [`NamespaceContext`] is an immutable chain of scopes. Pushing a scope
//! shares the parent chain, so states that fork from one another can keep
//! their contexts without copying.

use std::{collections::BTreeMap, rc::Rc};

use crate::ir::{expr::Name, NodeId};

/// What a name in scope refers to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Binding {
    /// An alias for the variable at the given fully-qualified path.
    Variable(Name),

    /// A declaration in the program.
    Declaration(NodeId),
}

#[derive(Debug, Eq, PartialEq)]
struct Scope {
    bindings: BTreeMap<Name, Binding>,
    parent:   NamespaceContext,
}

/// A chain of lexical scopes, innermost first.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NamespaceContext(Option<Rc<Scope>>);

impl NamespaceContext {
    /// Creates the empty context.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Creates a new context with a scope containing `bindings` innermost.
    ///
    /// The receiver is left untouched.
    #[must_use]
    pub fn push(&self, bindings: impl IntoIterator<Item = (Name, Binding)>) -> Self {
        let bindings = bindings.into_iter().collect();
        Self(Some(Rc::new(Scope {
            bindings,
            parent: self.clone(),
        })))
    }

    /// Looks `name` up, innermost scope first.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        let mut current = self;
        while let Some(scope) = &current.0 {
            if let Some(binding) = scope.bindings.get(name) {
                return Some(binding);
            }
            current = &scope.parent;
        }
        None
    }

    /// Resolves the dotted `path` to a fully-qualified variable path.
    ///
    /// Only the first segment of the path is looked up. When it is bound to a
    /// variable alias, that segment is replaced by the alias target.
    /// Otherwise the path is already fully qualified and is returned as is.
    #[must_use]
    pub fn resolve_path(&self, path: &str) -> Name {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        match (self.lookup(head), rest) {
            (Some(Binding::Variable(target)), Some(rest)) => format!("{target}.{rest}").into(),
            (Some(Binding::Variable(target)), None) => target.clone(),
            _ => path.into(),
        }
    }

    /// Gets the number of scopes in the context.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self;
        while let Some(scope) = &current.0 {
            depth += 1;
            current = &scope.parent;
        }
        depth
    }
}
