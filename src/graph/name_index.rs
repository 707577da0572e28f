//! Lookup of graph nodes by their hierarchical names.

use std::collections::{BTreeSet, HashMap};

use crate::ir::{expr::Name, NodeId};

/// Maps dot-separated hierarchical names to the nodes registered under them.
///
/// Every proper prefix of a registered name is linked to the names directly
/// below it, so that a prefix such as `ingress` can be used to refer to
/// everything declared inside `ingress`.
#[derive(Clone, Debug, Default)]
pub struct NameIndex {
    nodes:    HashMap<Name, BTreeSet<NodeId>>,
    children: HashMap<Name, BTreeSet<Name>>,
}

impl NameIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `node` under `name`.
    ///
    /// A name may be registered for more than one node.
    pub fn register(&mut self, name: &str, node: NodeId) {
        self.nodes.entry(name.into()).or_default().insert(node);

        let mut child = name;
        while let Some((parent, _)) = child.rsplit_once('.') {
            let known = self.children.contains_key(parent) || self.nodes.contains_key(parent);
            self.children.entry(parent.into()).or_default().insert(child.into());
            if known {
                break;
            }
            child = parent;
        }
    }

    /// Gets the nodes that `name` refers to.
    ///
    /// A name that some node was registered under refers to exactly those
    /// nodes. Otherwise, a name that is a prefix of registered names refers to
    /// every node registered below it. Any other name falls back to the name
    /// with its last component trimmed, so that `a.b.c` refers to whatever
    /// `a.b` does when nothing is known as `a.b.c`.
    #[must_use]
    pub fn lookup(&self, name: &str) -> BTreeSet<NodeId> {
        if let Some(nodes) = self.nodes.get(name) {
            return nodes.clone();
        }
        if !self.children.contains_key(name) {
            return match name.rsplit_once('.') {
                Some((parent, _)) => self.lookup(parent),
                None => BTreeSet::new(),
            };
        }

        let mut found = BTreeSet::new();
        let mut pending: Vec<&Name> = self
            .children
            .get(name)
            .map(|c| c.iter().collect())
            .unwrap_or_default();
        while let Some(child) = pending.pop() {
            if let Some(nodes) = self.nodes.get(child) {
                found.extend(nodes.iter().copied());
            }
            if let Some(grandchildren) = self.children.get(child) {
                pending.extend(grandchildren.iter());
            }
        }
        found
    }

    /// Checks whether `name` itself is known, without falling back to any
    /// of its prefixes.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name) || self.children.contains_key(name)
    }

    /// Gets the number of names that nodes were registered under.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use crate::{graph::name_index::NameIndex, ir::NodeId};

    #[test]
    fn exact_names_refer_to_their_own_nodes() {
        let mut index = NameIndex::new();
        index.register("ingress", NodeId::new(0));
        index.register("ingress.t", NodeId::new(1));
        index.register("ingress.t", NodeId::new(2));

        assert_eq!(index.lookup("ingress"), BTreeSet::from([NodeId::new(0)]));
        assert_eq!(
            index.lookup("ingress.t"),
            BTreeSet::from([NodeId::new(1), NodeId::new(2)])
        );
    }

    #[test]
    fn prefixes_refer_to_everything_below_them() {
        let mut index = NameIndex::new();
        index.register("main.ingress.t", NodeId::new(1));
        index.register("main.ingress.a", NodeId::new(2));
        index.register("main.egress.t", NodeId::new(3));

        assert_eq!(
            index.lookup("main.ingress"),
            BTreeSet::from([NodeId::new(1), NodeId::new(2)])
        );
        assert_eq!(index.lookup("main").len(), 3);
        assert!(index.contains("main"));
        assert!(index.lookup("ingress").is_empty());
        assert!(!index.contains("main.other"));
    }

    #[test]
    fn unknown_names_fall_back_to_their_prefixes() {
        let mut index = NameIndex::new();
        index.register("ingress", NodeId::new(0));
        index.register("ingress.t", NodeId::new(1));

        assert_eq!(index.lookup("ingress.t.hit"), BTreeSet::from([NodeId::new(1)]));
        assert_eq!(index.lookup("ingress.u.v"), BTreeSet::from([NodeId::new(0)]));
        assert!(index.lookup("egress.t").is_empty());
        assert!(!index.contains("ingress.t.hit"));
    }
}
