//! This module contains the directed call graph (DCG) of a program.
//!
//! The DCG has an edge from one construct to another whenever control may
//! flow directly from the first to the second. It is built once per program,
//! is immutable afterwards, and answers the reachability queries that the
//! [`crate::pattern`] engine is compiled against.

pub mod builder;
pub mod name_index;

use std::collections::BTreeSet;

use petgraph::{algo::has_path_connecting, graphmap::DiGraphMap, Direction};

use crate::{
    error::graph::Result,
    graph::{builder::DcgBuilder, name_index::NameIndex},
    ir::{NodeId, Program},
};

/// The directed call graph of a program.
#[derive(Clone, Debug)]
pub struct Dcg {
    graph: DiGraphMap<NodeId, ()>,
    names: NameIndex,
    entry: NodeId,
}

impl Dcg {
    /// Builds the call graph of `program`, starting at its entry.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the program has no entry, or if it refers to nodes
    /// that do not exist or are of the wrong kind.
    pub fn build(program: &Program) -> Result<Self> {
        DcgBuilder::new(program).build()
    }

    pub(crate) fn from_parts(graph: DiGraphMap<NodeId, ()>, names: NameIndex, entry: NodeId) -> Self {
        Self {
            graph,
            names,
            entry,
        }
    }

    /// Gets the node that the traversal started at.
    #[must_use]
    pub fn entry(&self) -> NodeId {
        self.entry
    }

    #[must_use]
    pub fn name_index(&self) -> &NameIndex {
        &self.names
    }

    /// Checks whether `node` was reached when building the graph.
    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.graph.contains_node(node)
    }

    /// Checks whether control can flow from `from` to `to` along zero or more
    /// edges.
    #[must_use]
    pub fn is_reachable(&self, from: NodeId, to: NodeId) -> bool {
        if from == to {
            return true;
        }
        self.contains(from)
            && self.contains(to)
            && has_path_connecting(&self.graph, from, to, None)
    }

    /// Checks whether any node of `to` is reachable from any node of `from`.
    #[must_use]
    pub fn is_any_reachable(&self, from: &BTreeSet<NodeId>, to: &BTreeSet<NodeId>) -> bool {
        from.iter()
            .any(|f| to.iter().any(|t| self.is_reachable(*f, *t)))
    }

    /// Gets the nodes that control may flow to directly from `node`.
    pub fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.neighbors_directed(node, Direction::Outgoing)
    }

    /// Gets the nodes that control may flow from directly into `node`.
    pub fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.neighbors_directed(node, Direction::Incoming)
    }

    /// Iterates over every node in the graph.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.nodes()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Gets the nodes of `program` that are never reached from its entry.
    #[must_use]
    pub fn dead_nodes(&self, program: &Program) -> BTreeSet<NodeId> {
        program
            .nodes()
            .map(|(id, _)| id)
            .filter(|id| !self.contains(*id))
            .collect()
    }
}
