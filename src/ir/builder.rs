//! Incremental construction of [`Program`]s.
//!
//! Front-ends lower their syntax trees through a [`ProgramBuilder`], which
//! takes care of allocating node identifiers and of recording the namespace
//! that each declaration's body is evaluated in.

use std::rc::Rc;

use crate::{
    ir::{
        expr::{Name, Type},
        statement::{Statement, StatementKind},
        ActionDecl,
        Annotation,
        ControlDecl,
        HeaderType,
        Node,
        NodeId,
        NodeKind,
        Param,
        ParserDecl,
        ParserState,
        Pipeline,
        Program,
        TableDecl,
        Transition,
        ValueSetDecl,
    },
    namespace::{Binding, NamespaceContext},
};

/// Builds a [`Program`] one declaration at a time.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    program:   Program,
    anonymous: u32,
}

impl ProgramBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, name: impl Into<Name>, kind: NodeKind) -> NodeId {
        #[allow(clippy::cast_possible_truncation)] // Programs are far smaller than u32::MAX
        let id = NodeId::new(self.program.nodes.len() as u32);
        self.program.nodes.push(Node {
            name: name.into(),
            kind,
            annotations: vec![],
        });
        id
    }

    fn kind_mut(&mut self, id: NodeId) -> Option<&mut NodeKind> {
        let ix = usize::try_from(id.index()).ok()?;
        self.program.nodes.get_mut(ix).map(|n| &mut n.kind)
    }

    fn alias_scope(aliases: &[(&str, &str)]) -> NamespaceContext {
        if aliases.is_empty() {
            return NamespaceContext::root();
        }
        NamespaceContext::root().push(
            aliases
                .iter()
                .map(|(alias, target)| ((*alias).into(), Binding::Variable((*target).into()))),
        )
    }

    /// Declares a header type with the given `(name, width)` fields.
    pub fn header_type(&mut self, name: &str, fields: &[(&str, u16)]) {
        let name: Name = name.into();
        let fields = fields.iter().map(|(f, w)| ((*f).into(), *w)).collect();
        self.program.header_types.insert(
            name.clone(),
            Rc::new(HeaderType { name, fields }),
        );
    }

    /// Declares a header instance at the fully-qualified `path`.
    pub fn header(&mut self, path: &str, type_name: &str) {
        self.program.headers.insert(path.into(), type_name.into());
    }

    /// Declares an action.
    ///
    /// Within the body, each parameter is an alias for the variable
    /// `<name>.<param>`, which the evaluator binds on invocation.
    pub fn action(&mut self, name: &str, params: Vec<Param>, body: Vec<Statement>) -> NodeId {
        let scope = NamespaceContext::root().push(params.iter().map(|p| {
            let target: Name = format!("{name}.{}", p.name).into();
            (p.name.clone(), Binding::Variable(target))
        }));
        let id = self.add(
            name,
            NodeKind::Action(ActionDecl {
                params,
                body: body.into(),
            }),
        );
        self.program.scopes.insert(id, scope);
        id
    }

    pub fn table(&mut self, name: &str, decl: TableDecl) -> NodeId {
        self.add(name, NodeKind::Table(decl))
    }

    /// Declares a control block whose body sees each `(alias, target)` pair
    /// of `aliases` as a variable alias.
    pub fn control(
        &mut self,
        name: &str,
        aliases: &[(&str, &str)],
        body: Vec<Statement>,
    ) -> NodeId {
        let id = self.add(name, NodeKind::Control(ControlDecl { body: body.into() }));
        self.program.scopes.insert(id, Self::alias_scope(aliases));
        id
    }

    /// Declares a parser without any states.
    ///
    /// The first state added with [`Self::state`] becomes its start state.
    pub fn parser(&mut self, name: &str, aliases: &[(&str, &str)]) -> NodeId {
        let id = self.add(
            name,
            NodeKind::Parser(ParserDecl {
                start:  NodeId::new(0),
                states: vec![],
            }),
        );
        self.program.scopes.insert(id, Self::alias_scope(aliases));
        id
    }

    /// Declares a state of `parser` called `<parser>.<name>`.
    ///
    /// The state accepts until it is given a body with
    /// [`Self::define_state`], which allows states to refer to one another
    /// before they are defined.
    pub fn state(&mut self, parser: NodeId, name: &str) -> NodeId {
        let full_name = format!("{}.{name}", self.program.name_of(parser));
        let id = self.add(
            full_name,
            NodeKind::ParserState(ParserState {
                parser,
                statements: Vec::new().into(),
                transition: Transition::Accept,
            }),
        );
        let scope = self.program.namespace(parser);
        self.program.scopes.insert(id, scope);
        if let Some(NodeKind::Parser(decl)) = self.kind_mut(parser) {
            if decl.states.is_empty() {
                decl.start = id;
            }
            decl.states.push(id);
        }
        id
    }

    /// Gives the parser state `state` its body.
    pub fn define_state(
        &mut self,
        state: NodeId,
        statements: Vec<Statement>,
        transition: Transition,
    ) {
        if let Some(NodeKind::ParserState(decl)) = self.kind_mut(state) {
            decl.statements = statements.into();
            decl.transition = transition;
        }
    }

    pub fn value_set(&mut self, name: &str, ty: Type, size: u32) -> NodeId {
        self.add(name, NodeKind::ValueSet(ValueSetDecl { ty, size }))
    }

    /// Attaches an annotation called `@<name>` to `node`.
    pub fn annotate(&mut self, node: NodeId, name: &str, body: Option<&str>) -> NodeId {
        let full_name = format!("{}.@{name}", self.program.name_of(node));
        let id = self.add(
            full_name,
            NodeKind::Annotation(Annotation {
                body: body.map(String::from),
            }),
        );
        if let Some(target) = usize::try_from(node.index())
            .ok()
            .and_then(|ix| self.program.nodes.get_mut(ix))
        {
            target.annotations.push(id);
        }
        id
    }

    /// Declares the top-level pipeline, which becomes the program's entry.
    pub fn pipeline(&mut self, name: &str, blocks: Vec<NodeId>) -> NodeId {
        let id = self.add(name, NodeKind::Pipeline(Pipeline { blocks }));
        self.program.entry = Some(id);
        id
    }

    /// Declares a statement with a generated name.
    pub fn statement(&mut self, kind: StatementKind) -> Statement {
        let name = format!("stmt{}", self.anonymous);
        self.anonymous += 1;
        self.named_statement(&name, kind)
    }

    /// Declares a statement called `name`.
    pub fn named_statement(&mut self, name: &str, kind: StatementKind) -> Statement {
        let id = self.add(name, NodeKind::Statement);
        Statement::with_id(id, kind)
    }

    #[must_use]
    pub fn build(self) -> Program {
        self.program
    }
}
