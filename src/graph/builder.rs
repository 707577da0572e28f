//! Construction of the [`Dcg`] by a single pre-order traversal of the program.
//!
//! The traversal keeps a frontier of the nodes that the next visited node is
//! a successor of. Visiting a node links it to the whole frontier and then
//! makes it the sole member of the frontier. Branching constructs visit each
//! alternative from the same frontier and continue with the union of the
//! frontiers that the alternatives end with, so alternatives converge on
//! whatever follows them.

use std::collections::BTreeSet;

use itertools::Itertools;
use petgraph::graphmap::DiGraphMap;

use crate::{
    error::{
        located::Locatable,
        graph::{Error, Result},
    },
    graph::{name_index::NameIndex, Dcg},
    ir::{
        expr::{Call, Expr, ExprKind},
        statement::{Statement, StatementKind, SwitchLabel},
        KeySet,
        NextState,
        Node,
        NodeId,
        NodeKind,
        Program,
        Transition,
    },
};

type Frontier = BTreeSet<NodeId>;

/// Walks a program to produce its [`Dcg`].
#[derive(Debug)]
pub struct DcgBuilder<'p> {
    program: &'p Program,
    graph:   DiGraphMap<NodeId, ()>,
    names:   NameIndex,
    prev:    Frontier,

    /// Parser states already traversed, which later transitions only link to.
    visited: BTreeSet<NodeId>,
}

impl<'p> DcgBuilder<'p> {
    #[must_use]
    pub fn new(program: &'p Program) -> Self {
        Self {
            program,
            graph: DiGraphMap::new(),
            names: NameIndex::new(),
            prev: Frontier::new(),
            visited: BTreeSet::new(),
        }
    }

    /// Traverses the program from its entry.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the program has no entry, or if the traversal finds
    /// a reference to a node that does not exist or has the wrong kind.
    pub fn build(mut self) -> Result<Dcg> {
        let entry = self
            .program
            .entry()
            .ok_or_else(|| Error::MissingEntry.locate(0))?;
        self.block(entry)?;

        log::debug!(
            "Built call graph with {} nodes and {} edges",
            self.graph.node_count(),
            self.graph.edge_count()
        );
        Ok(Dcg::from_parts(self.graph, self.names, entry))
    }

    fn node(&self, id: NodeId) -> Result<&'p Node> {
        self.program
            .node(id)
            .ok_or_else(|| Error::NoSuchNode { node: id.index() }.locate(id.index()))
    }

    /// Links `id` to the frontier, makes it the frontier and registers it and
    /// its annotations.
    fn visit(&mut self, id: NodeId) -> Result<()> {
        let node = self.node(id)?;
        self.graph.add_node(id);
        for p in std::mem::take(&mut self.prev) {
            self.graph.add_edge(p, id, ());
        }
        self.prev.insert(id);
        self.names.register(&node.name, id);

        for annotation in &node.annotations {
            let name = &self.node(*annotation)?.name;
            self.graph.add_edge(id, *annotation, ());
            self.names.register(name, *annotation);
        }
        Ok(())
    }

    /// Visits each of `alternatives` from the current frontier, leaving the
    /// union of their resulting frontiers.
    fn fork<T>(
        &mut self,
        alternatives: impl IntoIterator<Item = T>,
        mut visit: impl FnMut(&mut Self, T) -> Result<()>,
    ) -> Result<()> {
        let saved = self.prev.clone();
        let mut joined = Frontier::new();
        for alternative in alternatives {
            self.prev = saved.clone();
            visit(self, alternative)?;
            joined.append(&mut self.prev);
        }
        self.prev = joined;
        Ok(())
    }

    /// Visits a pipeline, parser, control or table.
    fn block(&mut self, id: NodeId) -> Result<()> {
        match &self.node(id)?.kind {
            NodeKind::Pipeline(pipeline) => {
                self.visit(id)?;
                for block in &pipeline.blocks {
                    self.block(*block)?;
                }
            }
            NodeKind::Parser(decl) => {
                self.visit(id)?;
                self.parser_state(decl.start)?;
            }
            NodeKind::Control(decl) => {
                self.visit(id)?;
                self.statements(&decl.body)?;
            }
            NodeKind::Table(_) => self.table(id)?,
            _ => {
                return Err(Error::UnexpectedNodeKind {
                    node:     id.index(),
                    expected: "table, control, parser or pipeline",
                }
                .locate(id.index()))
            }
        }
        Ok(())
    }

    fn parser_state(&mut self, id: NodeId) -> Result<()> {
        let NodeKind::ParserState(decl) = &self.node(id)?.kind else {
            return Err(Error::UnexpectedNodeKind {
                node:     id.index(),
                expected: "parser state",
            }
            .locate(id.index()));
        };
        if !self.visited.insert(id) {
            for p in std::mem::take(&mut self.prev) {
                self.graph.add_edge(p, id, ());
            }
            self.prev.insert(id);
            return Ok(());
        }

        self.visit(id)?;
        self.statements(&decl.statements)?;
        match &decl.transition {
            Transition::Accept | Transition::Reject => Ok(()),
            Transition::Goto(next) => self.parser_state(*next),
            Transition::Select { keys, cases } => {
                for key in keys.iter() {
                    self.expr(key)?;
                }
                let has_default = cases
                    .iter()
                    .any(|c| matches!(c.keysets.as_slice(), [KeySet::Default]));
                let mut alternatives = cases.iter().map(Some).collect_vec();
                if !has_default {
                    alternatives.push(None);
                }
                self.fork(alternatives, |this, case| {
                    let Some(case) = case else {
                        return Ok(());
                    };
                    for keyset in &case.keysets {
                        if let KeySet::ValueSet(value_set) = keyset {
                            this.visit(*value_set)?;
                        }
                    }
                    match case.next {
                        NextState::State(next) => this.parser_state(next),
                        NextState::Accept | NextState::Reject => Ok(()),
                    }
                })
            }
        }
    }

    fn table(&mut self, id: NodeId) -> Result<()> {
        let NodeKind::Table(decl) = &self.node(id)?.kind else {
            return Err(Error::UnexpectedNodeKind {
                node:     id.index(),
                expected: "table",
            }
            .locate(id.index()));
        };
        for key in &decl.keys {
            self.expr(&key.expr)?;
        }
        self.visit(id)?;

        let actions = decl
            .actions
            .iter()
            .chain(decl.entries.iter().map(|e| &e.action.action))
            .chain(std::iter::once(&decl.default_action.action))
            .copied()
            .unique()
            .collect_vec();
        self.fork(actions, Self::action)
    }

    fn action(&mut self, id: NodeId) -> Result<()> {
        let NodeKind::Action(decl) = &self.node(id)?.kind else {
            return Err(Error::UnexpectedNodeKind {
                node:     id.index(),
                expected: "action",
            }
            .locate(id.index()));
        };
        self.visit(id)?;
        self.statements(&decl.body)
    }

    fn statements(&mut self, statements: &[Statement]) -> Result<()> {
        statements.iter().try_for_each(|s| self.statement(s))
    }

    fn statement(&mut self, statement: &Statement) -> Result<()> {
        if let Some(id) = statement.id() {
            self.visit(id)?;
        }

        match statement.kind() {
            StatementKind::Empty
            | StatementKind::Exit
            | StatementKind::Return(None)
            | StatementKind::EnterState(_)
            | StatementKind::Transition { .. } => Ok(()),
            StatementKind::Block(statements) => self.statements(statements),
            StatementKind::Assign { value, .. }
            | StatementKind::Call(value)
            | StatementKind::Return(Some(value)) => self.expr(value),
            StatementKind::If {
                cond,
                then,
                otherwise,
            } => {
                self.expr(cond)?;
                self.fork([Some(then), otherwise.as_ref()], |this, branch| match branch {
                    Some(branch) => this.statement(branch),
                    None => Ok(()),
                })
            }
            StatementKind::Switch { subject, cases } => {
                self.expr(subject)?;
                let has_default = cases.iter().any(|c| c.label == SwitchLabel::Default);
                let mut alternatives = cases
                    .iter()
                    .filter_map(|c| c.body.as_ref())
                    .map(Some)
                    .collect_vec();
                if !has_default {
                    alternatives.push(None);
                }
                self.fork(alternatives, |this, body| match body {
                    Some(body) => this.statement(body),
                    None => Ok(()),
                })
            }
            StatementKind::Apply(block) => self.block(*block),
        }
    }

    /// Visits the tables and actions invoked by `expr`, innermost first.
    fn expr(&mut self, expr: &Expr) -> Result<()> {
        for operand in expr.operands() {
            self.expr(&operand)?;
        }
        match expr.kind() {
            ExprKind::Call(Call::TableApply { table, .. } | Call::TableMatch { table, .. }) => {
                self.table(*table)
            }
            ExprKind::Call(Call::Action { action, .. }) => self.action(*action),
            _ => Ok(()),
        }
    }
}
