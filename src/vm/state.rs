//! The unit of symbolic execution.

use im::{OrdSet, Vector};
use serde::{Deserialize, Serialize};

use crate::{
    ir::{
        expr::{Expr, Hole, Name, Type},
        NodeId,
    },
    namespace::NamespaceContext,
    vm::{
        continuation::{is_done, Body, Cmd, SignalKind, StackFrame},
        env::SymbolicEnvironment,
    },
};

/// An observable event recorded in the trace of an execution state.
///
/// Traces are never read by the evaluator itself.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    /// Execution entered the identifiable construct `node`.
    Node { node: NodeId, name: String },

    /// A branch was taken at `node` under `condition`.
    Branch {
        node:      Option<NodeId>,
        condition: String,
    },

    /// A header was extracted from the input packet.
    Extract { header: String },

    /// A header was emitted into the output packet.
    Emit { header: String },

    /// A signal reached the bottom of the stack and ended execution.
    Signal { kind: SignalKind },

    Diagnostic { message: String },
}

/// A packet header as seen by the generated test, with one value per field.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PacketHeader {
    pub header: Name,
    pub fields: Vec<Expr>,
}

/// The state of one path of symbolic execution.
///
/// States are values: cloning is O(1) as every component is persistent, and
/// the evaluator never mutates a state that has been handed to it.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutionState {
    pub(crate) body:            Body,
    pub(crate) stack:           Vector<StackFrame>,
    pub(crate) env:             SymbolicEnvironment,
    pub(crate) path_constraint: Expr,
    pub(crate) namespaces:      NamespaceContext,
    pub(crate) trace:           Vector<TraceEvent>,
    pub(crate) covered:         OrdSet<NodeId>,
    pub(crate) input:           Vector<PacketHeader>,
    pub(crate) output:          Vector<PacketHeader>,
    pub(crate) fresh:           u32,
    pub(crate) last_node:       Option<NodeId>,
}

impl ExecutionState {
    /// Creates a state that evaluates `body` with an empty stack, an empty
    /// environment and a `true` path constraint.
    #[must_use]
    pub fn new(body: impl IntoIterator<Item = Cmd>) -> Self {
        Self {
            body:            body.into_iter().collect(),
            stack:           Vector::new(),
            env:             SymbolicEnvironment::new(),
            path_constraint: Expr::bool(true),
            namespaces:      NamespaceContext::root(),
            trace:           Vector::new(),
            covered:         OrdSet::new(),
            input:           Vector::new(),
            output:          Vector::new(),
            fresh:           0,
            last_node:       None,
        }
    }

    /// Creates a state that evaluates the single expression `expr` to a
    /// value.
    #[must_use]
    pub fn for_expression(expr: Expr) -> Self {
        Self::new([Cmd::Return(expr)])
    }

    #[must_use]
    pub fn with_env(mut self, env: SymbolicEnvironment) -> Self {
        self.env = env;
        self
    }

    #[must_use]
    pub fn with_namespaces(mut self, namespaces: NamespaceContext) -> Self {
        self.namespaces = namespaces;
        self
    }

    #[must_use]
    pub fn body(&self) -> &Body {
        &self.body
    }

    #[must_use]
    pub fn stack(&self) -> &Vector<StackFrame> {
        &self.stack
    }

    #[must_use]
    pub fn env(&self) -> &SymbolicEnvironment {
        &self.env
    }

    /// Binds the variable at `path` to `value` in this state only.
    pub fn set_var(&mut self, path: impl Into<Name>, value: Expr) {
        self.env.insert(path, value);
    }

    /// Gets the conjunction of all branch conditions taken to reach the
    /// state.
    #[must_use]
    pub fn path_constraint(&self) -> &Expr {
        &self.path_constraint
    }

    #[must_use]
    pub fn namespaces(&self) -> &NamespaceContext {
        &self.namespaces
    }

    #[must_use]
    pub fn trace(&self) -> &Vector<TraceEvent> {
        &self.trace
    }

    /// Gets the coverable nodes that this state has executed.
    #[must_use]
    pub fn covered(&self) -> &OrdSet<NodeId> {
        &self.covered
    }

    /// Gets the headers consumed from the input packet, in order.
    #[must_use]
    pub fn input_packet(&self) -> &Vector<PacketHeader> {
        &self.input
    }

    /// Gets the headers emitted into the output packet, in order.
    #[must_use]
    pub fn output_packet(&self) -> &Vector<PacketHeader> {
        &self.output
    }

    /// Gets the most recent node that the state executed.
    #[must_use]
    pub fn last_node(&self) -> Option<NodeId> {
        self.last_node
    }

    /// Iterates over the nodes the state entered, in execution order.
    pub fn visited_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.trace.iter().filter_map(|event| match event {
            TraceEvent::Node { node, .. } => Some(*node),
            _ => None,
        })
    }

    /// Checks whether the state can no longer be stepped.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.stack.is_empty() && is_done(&self.body)
    }

    /// Gets the value the state's body returned, if it finished with one.
    #[must_use]
    pub fn result(&self) -> Option<&Expr> {
        match self.body.head() {
            Some(Cmd::Return(value)) if is_done(&self.body) => Some(value),
            _ => None,
        }
    }

    pub(crate) fn record(&mut self, event: TraceEvent) {
        self.trace.push_back(event);
    }

    pub(crate) fn fresh_hole(&mut self) -> Hole {
        let hole = Hole(self.fresh);
        self.fresh += 1;
        hole
    }

    /// Creates a symbolic variable named after `base` that no other variable
    /// created by this state or its ancestors shares.
    pub(crate) fn fresh_var(&mut self, base: &str, ty: Type) -> Expr {
        let var = Expr::var(format!("{base}_{}", self.fresh), ty);
        self.fresh += 1;
        var
    }
}

#[cfg(test)]
mod test {
    use crate::{
        ir::expr::{Expr, Type},
        vm::state::ExecutionState,
    };

    #[test]
    fn clones_are_isolated() {
        let mut original = ExecutionState::for_expression(Expr::path("meta.x"));
        original.set_var("meta.x", Expr::constant(1, 8));

        let mut clone = original.clone();
        clone.set_var("meta.x", Expr::constant(2, 8));

        assert_eq!(original.env().get("meta.x"), Some(Expr::constant(1, 8)));
        assert_eq!(clone.env().get("meta.x"), Some(Expr::constant(2, 8)));
    }

    #[test]
    fn fresh_variables_are_distinct() {
        let mut state = ExecutionState::new([]);
        let a = state.fresh_var("x", Type::Bits(8));
        let b = state.fresh_var("x", Type::Bits(8));
        assert_ne!(a, b);
    }

    #[test]
    fn a_returned_value_is_terminal() {
        let state = ExecutionState::for_expression(Expr::constant(1, 8));
        assert!(state.is_terminal());
        assert_eq!(state.result(), Some(&Expr::constant(1, 8)));
    }
}
