//! The program representation consumed by the evaluator and the graph
//! builder.
//!
//! A [`Program`] is an arena of [`Node`]s addressed by [`NodeId`]s. Nodes are
//! the declarations that make up a packet-processing program (pipelines,
//! parsers and their states, controls, tables, actions, statements,
//! annotations and value sets), and the identifiers are what the execution
//! trace and the reachability machinery talk about.

pub mod builder;
pub mod expr;
pub mod statement;

use std::{collections::HashMap, fmt, rc::Rc};

use serde::{Deserialize, Serialize};

use crate::{
    constant::VALIDITY_FIELD,
    ir::{
        expr::{BinaryOp, Expr, Name, Type},
        statement::Statement,
    },
    namespace::NamespaceContext,
};

/// The identifier of a node in a [`Program`].
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    #[must_use]
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    /// Gets the position of the node in its program's arena.
    #[must_use]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A declaration in the program.
#[derive(Clone, Debug)]
pub struct Node {
    /// The fully-qualified, dot-separated name of the node.
    pub name: Name,

    pub kind: NodeKind,

    /// The annotation nodes attached to this node.
    pub annotations: Vec<NodeId>,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Pipeline(Pipeline),
    Parser(ParserDecl),
    ParserState(ParserState),
    Control(ControlDecl),
    Table(TableDecl),
    Action(ActionDecl),

    /// A statement; its body lives inline in its parent declaration.
    Statement,

    Annotation(Annotation),
    ValueSet(ValueSetDecl),
}

impl NodeKind {
    /// Gets a name for the kind of node, for diagnostics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pipeline(_) => "pipeline",
            Self::Parser(_) => "parser",
            Self::ParserState(_) => "parser state",
            Self::Control(_) => "control",
            Self::Table(_) => "table",
            Self::Action(_) => "action",
            Self::Statement => "statement",
            Self::Annotation(_) => "annotation",
            Self::ValueSet(_) => "value set",
        }
    }
}

/// The top-level sequence of blocks that a packet flows through.
#[derive(Clone, Debug, Default)]
pub struct Pipeline {
    pub blocks: Vec<NodeId>,
}

#[derive(Clone, Debug)]
pub struct ParserDecl {
    pub start:  NodeId,
    pub states: Vec<NodeId>,
}

#[derive(Clone, Debug)]
pub struct ParserState {
    pub parser:     NodeId,
    pub statements: Rc<[Statement]>,
    pub transition: Transition,
}

/// How a parser state picks its successor.
#[derive(Clone, Debug)]
pub enum Transition {
    Accept,
    Reject,
    Goto(NodeId),
    Select {
        keys:  Rc<[Expr]>,
        cases: Rc<[SelectCase]>,
    },
}

#[derive(Clone, Debug)]
pub struct SelectCase {
    /// One keyset per select key, or a single [`KeySet::Default`].
    pub keysets: Vec<KeySet>,
    pub next:    NextState,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NextState {
    State(NodeId),
    Accept,
    Reject,
}

/// A set of values that a select key or a table key can match.
#[derive(Clone, Debug)]
pub enum KeySet {
    Default,
    Exact(Expr),
    Mask { value: Expr, mask: Expr },
    Range { low: Expr, high: Expr },

    /// Membership of a control-plane configured value set.
    ValueSet(NodeId),
}

impl KeySet {
    /// Builds the condition under which `key` is a member of the keyset.
    ///
    /// The entries of a value set are control-plane configuration and are
    /// modelled by symbolic variables named after the value set, so that
    /// every use of the value set sees the same entries.
    #[must_use]
    pub fn constraint(&self, key: &Expr, program: &Program) -> Expr {
        match self {
            Self::Default => Expr::bool(true),
            Self::Exact(value) => Expr::eq(key.clone(), value.clone()),
            Self::Mask { value, mask } => Expr::eq(
                Expr::binary(BinaryOp::BitAnd, key.clone(), mask.clone()),
                Expr::binary(BinaryOp::BitAnd, value.clone(), mask.clone()),
            ),
            Self::Range { low, high } => Expr::and(
                Expr::binary(BinaryOp::Ge, key.clone(), low.clone()),
                Expr::binary(BinaryOp::Le, key.clone(), high.clone()),
            ),
            Self::ValueSet(id) => {
                let Some(node) = program.node(*id) else {
                    return Expr::bool(false);
                };
                let NodeKind::ValueSet(decl) = &node.kind else {
                    return Expr::bool(false);
                };
                Expr::any((0..decl.size).map(|ix| {
                    let value = Expr::var(format!("{}.value{ix}", node.name), decl.ty);
                    let mask = Expr::var(format!("{}.mask{ix}", node.name), decl.ty);
                    Self::Mask { value, mask }.constraint(key, program)
                }))
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct ControlDecl {
    pub body: Rc<[Statement]>,
}

#[derive(Clone, Debug)]
pub struct TableDecl {
    pub keys:           Vec<TableKey>,
    pub actions:        Vec<NodeId>,
    pub default_action: ActionRef,

    /// Constant entries, matched in order. A table without entries is
    /// configured by the control plane.
    pub entries: Vec<TableEntry>,
}

#[derive(Clone, Debug)]
pub struct TableKey {
    pub expr:       Expr,
    pub match_kind: MatchKind,
    pub ty:         Type,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MatchKind {
    Exact,
    Ternary,
    Lpm,
    Range,
}

/// A reference to an action together with the arguments it is invoked with.
#[derive(Clone, Debug)]
pub struct ActionRef {
    pub action: NodeId,
    pub args:   Vec<Expr>,
}

#[derive(Clone, Debug)]
pub struct TableEntry {
    pub keysets: Vec<KeySet>,
    pub action:  ActionRef,
}

#[derive(Clone, Debug)]
pub struct ActionDecl {
    pub params: Vec<Param>,
    pub body:   Rc<[Statement]>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Param {
    pub name: Name,
    pub ty:   Type,
}

impl Param {
    #[must_use]
    pub fn new(name: impl Into<Name>, ty: Type) -> Self {
        let name = name.into();
        Self { name, ty }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Annotation {
    pub body: Option<String>,
}

#[derive(Clone, Copy, Debug)]
pub struct ValueSetDecl {
    pub ty:   Type,
    pub size: u32,
}

/// The layout of a header type.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HeaderType {
    pub name:   Name,
    pub fields: Vec<(Name, u16)>,
}

/// A complete program.
#[derive(Clone, Debug, Default)]
pub struct Program {
    nodes:        Vec<Node>,
    entry:        Option<NodeId>,
    header_types: HashMap<Name, Rc<HeaderType>>,
    headers:      HashMap<Name, Name>,
    scopes:       HashMap<NodeId, NamespaceContext>,
}

impl Program {
    /// Gets the node with identifier `id`, if it exists.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        usize::try_from(id.0).ok().and_then(|ix| self.nodes.get(ix))
    }

    /// Iterates over all nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(ix, node)| {
            #[allow(clippy::cast_possible_truncation)] // The builder never exceeds u32 nodes
            let id = NodeId(ix as u32);
            (id, node)
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Gets the top-level pipeline, if the program has one.
    #[must_use]
    pub fn entry(&self) -> Option<NodeId> {
        self.entry
    }

    /// Gets the type of the header instance at the fully-qualified `path`.
    #[must_use]
    pub fn header_type(&self, path: &str) -> Option<&HeaderType> {
        let type_name = self.headers.get(path)?;
        self.header_types.get(type_name).map(Rc::as_ref)
    }

    /// Iterates over the fully-qualified paths of all header instances.
    pub fn headers(&self) -> impl Iterator<Item = &Name> {
        self.headers.keys()
    }

    /// Gets the width of the header field at the fully-qualified `path`, or
    /// the type of a header's validity bit.
    #[must_use]
    pub fn field_type(&self, path: &str) -> Option<Type> {
        let (header, field) = path.rsplit_once('.')?;
        if field == VALIDITY_FIELD {
            return self.headers.contains_key(header).then_some(Type::Bool);
        }
        let header = self.header_type(header)?;
        header
            .fields
            .iter()
            .find(|(name, _)| name.as_ref() == field)
            .map(|(_, width)| Type::Bits(*width))
    }

    /// Gets the namespace that the body of the declaration `id` is evaluated
    /// in.
    #[must_use]
    pub fn namespace(&self, id: NodeId) -> NamespaceContext {
        self.scopes.get(&id).cloned().unwrap_or_default()
    }

    /// Gets the name of the node `id`, or a placeholder if it does not exist.
    #[must_use]
    pub fn name_of(&self, id: NodeId) -> Name {
        self.node(id)
            .map_or_else(|| format!("<{id}>").into(), |node| node.name.clone())
    }
}
