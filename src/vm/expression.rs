//! Reduction of expressions whose operands are all values.

use crate::{
    constant::VALIDITY_FIELD,
    error::{
        located::Locatable,
        execution::{Error, Result},
    },
    ir::{
        expr::{Call, Expr, ExprKind, Name, Type, Value},
        NodeId,
    },
    vm::{
        certain,
        continuation::{Cmd, Continuation, SignalKind, StackFrame},
        resume,
        state::{ExecutionState, PacketHeader, TraceEvent},
        Candidate,
        Evaluator,
    },
};

impl Evaluator {
    /// Reduces the expression `expr` at the head `slot` of the state's body.
    ///
    /// All operands of `expr` are values.
    pub(super) fn reduce(
        &self,
        mut state: ExecutionState,
        slot: &Cmd,
        expr: &Expr,
    ) -> Result<Vec<Candidate>> {
        match expr.kind() {
            ExprKind::Path(path) => {
                let value = self.read(&mut state, path)?;
                resume(&mut state, slot, value);
                Ok(vec![certain(state)])
            }
            ExprKind::Hole(_) => Err(Error::MissingReturnValue.locate(self.location(&state))),
            ExprKind::Call(call) => self.call(state, slot, call),
            _ => {
                resume(&mut state, slot, expr.clone());
                Ok(vec![certain(state)])
            }
        }
    }

    fn call(&self, mut state: ExecutionState, slot: &Cmd, call: &Call) -> Result<Vec<Candidate>> {
        match call {
            Call::TableApply { table, result } => {
                let keys = self.table(*table)?.keys.iter().map(|k| k.expr.clone()).collect();
                let matched = Expr::call(Call::TableMatch {
                    table: *table,
                    keys,
                    result: *result,
                });
                resume(&mut state, slot, matched);
                Ok(vec![certain(state)])
            }
            Call::TableMatch {
                table,
                keys,
                result,
            } => self.apply_table(state, slot, *table, keys, *result),
            Call::Action { action, args } => {
                if let Cmd::Return(_) = slot {
                    return Err(Error::TypeMismatch {
                        expected: "value",
                        found:    "action invocation".into(),
                    }
                    .locate(self.location(&state)));
                }
                self.invoke_action(state, *action, args).map(|s| vec![certain(s)])
            }
            Call::Extract { header } => {
                self.extract(&mut state, header)?;
                resume(&mut state, slot, Expr::bool(true));
                Ok(vec![certain(state)])
            }
            Call::Emit { header } => self.emit(state, slot, header),
            Call::IsValid { header } => {
                let header = state.namespaces.resolve_path(header);
                let valid = state
                    .env
                    .get(&format!("{header}.{VALIDITY_FIELD}"))
                    .unwrap_or_else(|| Expr::bool(false));
                resume(&mut state, slot, valid);
                Ok(vec![certain(state)])
            }
            Call::SetValid { header } | Call::SetInvalid { header } => {
                let header = state.namespaces.resolve_path(header);
                if self.program.header_type(&header).is_none() {
                    return Err(Error::UnknownHeader {
                        name: header.to_string(),
                    }
                    .locate(self.location(&state)));
                }
                let valid = matches!(call, Call::SetValid { .. });
                state
                    .env
                    .insert(format!("{header}.{VALIDITY_FIELD}"), Expr::bool(valid));
                resume(&mut state, slot, Expr::bool(true));
                Ok(vec![certain(state)])
            }
            Call::RegisterRead {
                register,
                index,
                ty,
            } => {
                let cell = self.register_cell(&state, register, index)?;
                let value = match state.env.get(&cell) {
                    Some(value) => value,
                    None => {
                        let value = state.fresh_var(&cell, *ty);
                        state.env.insert(cell, value.clone());
                        value
                    }
                };
                resume(&mut state, slot, value);
                Ok(vec![certain(state)])
            }
            Call::RegisterWrite {
                register,
                index,
                value,
            } => {
                let cell = self.register_cell(&state, register, index)?;
                state.env.insert(cell, value.clone());
                resume(&mut state, slot, Expr::bool(true));
                Ok(vec![certain(state)])
            }
            Call::Extern { name, .. } => Err(Error::UnimplementedConstruct {
                construct: format!("extern {name}"),
            }
            .locate(self.location(&state))),
        }
    }

    /// Runs the body of `action` with its parameters bound to `args`, then
    /// resumes with the rest of the current body.
    pub(super) fn invoke_action(
        &self,
        mut state: ExecutionState,
        action: NodeId,
        args: &[Expr],
    ) -> Result<ExecutionState> {
        let decl = self.action(action)?;
        let name = self.program.name_of(action);
        if decl.params.len() != args.len() {
            return Err(Error::ArityMismatch {
                action:   name.to_string(),
                expected: decl.params.len(),
                found:    args.len(),
            }
            .locate(action.index()));
        }

        self.enter(&mut state, action);
        state.env = state.env.with(
            decl.params
                .iter()
                .zip(args)
                .map(|(param, arg)| (Name::from(format!("{name}.{}", param.name)), arg.clone())),
        );

        let rest = std::mem::take(&mut state.body);
        let frame = StackFrame::new(Continuation::resume(rest.clone()), state.namespaces.clone())
            .with_handler(SignalKind::Return, Continuation::resume(rest));
        self.push_frame(&mut state, frame)?;
        state.body = decl.body.iter().cloned().map(Cmd::Stmt).collect();
        state.namespaces = self.program.namespace(action);

        Ok(state)
    }

    /// Consumes `header` from the input packet, giving each of its fields a
    /// fresh symbolic value.
    fn extract(&self, state: &mut ExecutionState, header: &str) -> Result<()> {
        let header = state.namespaces.resolve_path(header);
        let Some(layout) = self.program.header_type(&header) else {
            return Err(Error::UnknownHeader {
                name: header.to_string(),
            }
            .locate(self.location(state)));
        };

        let mut fields = Vec::with_capacity(layout.fields.len());
        for (field, width) in &layout.fields {
            let path = format!("{header}.{field}");
            let value = state.fresh_var(&path, Type::Bits(*width));
            state.env.insert(path, value.clone());
            fields.push(value);
        }
        state
            .env
            .insert(format!("{header}.{VALIDITY_FIELD}"), Expr::bool(true));
        state.input.push_back(PacketHeader {
            header: header.clone(),
            fields,
        });
        state.record(TraceEvent::Extract {
            header: header.to_string(),
        });

        Ok(())
    }

    /// Appends `header` to the output packet if it is valid.
    ///
    /// Forks when the validity of the header is symbolic.
    fn emit(&self, mut state: ExecutionState, slot: &Cmd, header: &str) -> Result<Vec<Candidate>> {
        let header = state.namespaces.resolve_path(header);
        let Some(layout) = self.program.header_type(&header) else {
            return Err(Error::UnknownHeader {
                name: header.to_string(),
            }
            .locate(self.location(&state)));
        };
        let valid = state
            .env
            .get(&format!("{header}.{VALIDITY_FIELD}"))
            .unwrap_or_else(|| Expr::bool(false));
        resume(&mut state, slot, Expr::bool(true));

        let mut emitted = state.clone();
        let mut fields = Vec::with_capacity(layout.fields.len());
        for (field, _) in &layout.fields {
            fields.push(self.read_resolved(&mut emitted, &format!("{header}.{field}"))?);
        }
        emitted.output.push_back(PacketHeader {
            header: header.clone(),
            fields,
        });
        emitted.record(TraceEvent::Emit {
            header: header.to_string(),
        });

        Ok(match valid.as_bool() {
            Some(true) => vec![certain(emitted)],
            Some(false) => vec![certain(state)],
            None => {
                let invalid = Expr::not(valid.clone());
                vec![(valid, emitted), (invalid, state)]
            }
        })
    }

    /// Gets the environment path of the register cell at `index`.
    fn register_cell(&self, state: &ExecutionState, register: &str, index: &Expr) -> Result<String> {
        match index.as_value() {
            Some(Value::Bits { value, .. }) => Ok(format!("{register}[{value}]")),
            Some(Value::Bool(_)) => Err(Error::TypeMismatch {
                expected: "bit-vector",
                found:    index.to_string(),
            }
            .locate(self.location(state))),
            None => Err(Error::SymbolicRegisterIndex {
                register: register.to_string(),
            }
            .locate(self.location(state))),
        }
    }
}

#[cfg(test)]
mod test {
    use std::rc::Rc;

    use crate::{
        error::execution::Error,
        ir::{
            builder::ProgramBuilder,
            expr::{Call, Expr, Type},
        },
        solver::Z3Solver,
        vm::{continuation::Cmd, state::ExecutionState, Config, Evaluator},
    };

    fn evaluator() -> Evaluator {
        let mut builder = ProgramBuilder::new();
        builder.header_type("h_t", &[("f", 8), ("g", 16)]);
        builder.header("hdr.h", "h_t");
        Evaluator::new(
            Rc::new(builder.build()),
            Config::default(),
            Rc::new(Z3Solver::new()),
        )
    }

    #[test]
    fn extraction_makes_fields_symbolic_and_the_header_valid() -> anyhow::Result<()> {
        let evaluator = evaluator();
        let extract = Expr::call(Call::Extract {
            header: "hdr.h".into(),
        });
        let state = ExecutionState::new([Cmd::Expr(extract)]);

        let branches = evaluator.step(&state)?;
        assert_eq!(branches.len(), 1);
        let next = &branches[0].next_state;
        assert_eq!(next.env().get("hdr.h.$valid"), Some(Expr::bool(true)));
        assert!(next.env().get("hdr.h.g").is_some_and(|v| v.is_value()));
        assert_eq!(next.input_packet().len(), 1);
        assert!(next.is_terminal());

        Ok(())
    }

    #[test]
    fn emitting_forks_on_symbolic_validity() -> anyhow::Result<()> {
        let evaluator = evaluator();
        let emit = Expr::call(Call::Emit {
            header: "hdr.h".into(),
        });
        let mut state = ExecutionState::new([Cmd::Expr(emit)]);
        state.set_var("hdr.h.$valid", Expr::var("v", Type::Bool));

        let branches = evaluator.step(&state)?;
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].next_state.output_packet().len(), 1);
        assert!(branches[1].next_state.output_packet().is_empty());

        Ok(())
    }

    #[test]
    fn registers_need_concrete_indices() -> anyhow::Result<()> {
        let evaluator = evaluator();
        let write = Expr::call(Call::RegisterWrite {
            register: "counts".into(),
            index:    Expr::constant(2, 32),
            value:    Expr::constant(9, 16),
        });
        let read = Expr::call(Call::RegisterRead {
            register: "counts".into(),
            index:    Expr::constant(2, 32),
            ty:       Type::Bits(16),
        });
        let state = ExecutionState::new([Cmd::Expr(write), Cmd::Return(read)]);

        let written = evaluator.step(&state)?.remove(0).next_state;
        let read = evaluator.step(&written)?.remove(0).next_state;
        assert_eq!(read.result(), Some(&Expr::constant(9, 16)));

        let symbolic = Expr::call(Call::RegisterRead {
            register: "counts".into(),
            index:    Expr::var("i", Type::Bits(32)),
            ty:       Type::Bits(16),
        });
        let result = evaluator.step(&ExecutionState::for_expression(symbolic));
        assert!(matches!(
            result.map_err(|e| e.payload),
            Err(Error::SymbolicRegisterIndex { .. })
        ));

        Ok(())
    }
}
