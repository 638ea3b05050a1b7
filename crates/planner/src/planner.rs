//! AST → Program lowering
//!
//! Walks the checked AST once, emitting steps and patching jump targets
//! as control-flow shapes close. The walk also models the value stack
//! statically: every emit records its stack effect, so the planner knows
//! the exact maximum depth and can reject programs that exceed the
//! configured bound before anything runs.
//!
//! Comprehension variables live in slots, two per nesting level
//! (iteration variable, then accumulator). Non-overlapping comprehensions
//! at the same depth reuse the same pair.

use crate::ast::{CheckedExpr, Expr, ExprKind, Reference, operators};
use crate::folding::fold_constants;
use crate::program::{Program, SYNTHETIC_ID, Step, StepKind};
use cel_core::FunctionRegistry;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Plan-time configuration, derived from the runtime options.
#[derive(Debug, Clone)]
pub struct PlanOptions {
    /// Emit short-circuit jumps for logicals; loop-condition stops are
    /// honored by the evaluator
    pub short_circuit: bool,
    /// Run the constant-folding pass before lowering
    pub constant_folding: bool,
    /// Heterogeneous numeric equality (folding evaluates under the same
    /// rules the evaluator will)
    pub hetero: bool,
    /// Maximum value stack depth; 0 disables the check
    pub max_stack_depth: u32,
}

impl Default for PlanOptions {
    fn default() -> Self {
        PlanOptions {
            short_circuit: true,
            constant_folding: false,
            hetero: true,
            max_stack_depth: 1024,
        }
    }
}

/// Fatal plan-time failure; nothing was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// Structurally invalid input (wrong operator arity, empty expression)
    MalformedAst(String),
    /// The program needs a deeper value stack than the options allow
    StackDepthExceeded { required: usize, limit: usize },
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::MalformedAst(msg) => write!(f, "malformed AST: {}", msg),
            PlanError::StackDepthExceeded { required, limit } => write!(
                f,
                "program requires stack depth {} but the limit is {}",
                required, limit
            ),
        }
    }
}

impl std::error::Error for PlanError {}

/// Lower a checked expression into a flat program.
pub fn plan(
    checked: &CheckedExpr,
    registry: &FunctionRegistry,
    options: &PlanOptions,
) -> Result<Program, PlanError> {
    let expr = checked
        .expr
        .as_ref()
        .ok_or_else(|| PlanError::MalformedAst("no expression".to_string()))?;

    let folded;
    let expr = if options.constant_folding {
        folded = fold_constants(expr, registry, options);
        &folded
    } else {
        expr
    };

    let mut planner = Planner {
        references: &checked.references,
        options,
        steps: Vec::new(),
        scopes: Vec::new(),
        depth: 0,
        max_slots: 0,
        stack: 0,
        max_stack: 0,
    };
    planner.plan_expr(expr)?;
    debug_assert_eq!(planner.stack, 1, "a program leaves exactly one value");

    if options.max_stack_depth > 0 && planner.max_stack > options.max_stack_depth as usize {
        return Err(PlanError::StackDepthExceeded {
            required: planner.max_stack,
            limit: options.max_stack_depth as usize,
        });
    }

    debug!(
        steps = planner.steps.len(),
        slots = planner.max_slots,
        stack = planner.max_stack,
        "planned program"
    );
    Ok(Program::new(planner.steps, planner.max_slots, planner.max_stack))
}

struct Planner<'a> {
    references: &'a HashMap<i64, Reference>,
    options: &'a PlanOptions,
    steps: Vec<Step>,
    /// Comprehension variable scopes, innermost last
    scopes: Vec<(String, usize)>,
    /// Current comprehension nesting depth
    depth: usize,
    max_slots: usize,
    /// Simulated stack depth at the current emission point
    stack: usize,
    max_stack: usize,
}

impl Planner<'_> {
    fn here(&self) -> usize {
        self.steps.len()
    }

    fn emit(&mut self, id: i64, kind: StepKind) -> usize {
        self.steps.push(Step::new(id, kind));
        self.steps.len() - 1
    }

    fn patch(&mut self, index: usize, f: impl FnOnce(&mut StepKind)) {
        f(&mut self.steps[index].kind);
    }

    fn push_stack(&mut self, n: usize) {
        self.stack += n;
        self.max_stack = self.max_stack.max(self.stack);
    }

    fn pop_stack(&mut self, n: usize) -> Result<(), PlanError> {
        if self.stack < n {
            return Err(PlanError::MalformedAst(
                "operator consumes more values than the stack holds".to_string(),
            ));
        }
        self.stack -= n;
        Ok(())
    }

    fn plan_expr(&mut self, expr: &Expr) -> Result<(), PlanError> {
        match &expr.kind {
            ExprKind::Const(c) => {
                self.emit(expr.id, StepKind::PushConst(c.to_value()));
                self.push_stack(1);
            }
            ExprKind::Lit(v) => {
                self.emit(expr.id, StepKind::PushConst(v.clone()));
                self.push_stack(1);
            }
            ExprKind::Ident(name) => {
                // Comprehension variables shadow activation bindings.
                let slot = self
                    .scopes
                    .iter()
                    .rev()
                    .find(|(var, _)| var == name)
                    .map(|(_, slot)| *slot);
                match slot {
                    Some(index) => self.emit(expr.id, StepKind::Slot { index }),
                    None => self.emit(expr.id, StepKind::Ident { name: name.clone() }),
                };
                self.push_stack(1);
            }
            ExprKind::Select {
                operand,
                field,
                test_only,
            } => {
                self.plan_expr(operand)?;
                let kind = if *test_only {
                    StepKind::TestOnlySelect {
                        field: field.clone(),
                    }
                } else {
                    StepKind::Select {
                        field: field.clone(),
                    }
                };
                self.emit(expr.id, kind);
            }
            ExprKind::Call {
                function,
                target,
                args,
            } => self.plan_call(expr.id, function, target.as_deref(), args)?,
            ExprKind::CreateList { elements } => {
                for elem in elements {
                    self.plan_expr(elem)?;
                }
                self.emit(
                    expr.id,
                    StepKind::CreateList {
                        size: elements.len(),
                    },
                );
                self.pop_stack(elements.len())?;
                self.push_stack(1);
            }
            ExprKind::CreateMap { entries } => {
                for (key, value) in entries {
                    self.plan_expr(key)?;
                    self.plan_expr(value)?;
                }
                self.emit(
                    expr.id,
                    StepKind::CreateMap {
                        entries: entries.len(),
                    },
                );
                self.pop_stack(entries.len() * 2)?;
                self.push_stack(1);
            }
            ExprKind::CreateRecord { type_name, fields } => {
                let mut field_names = Vec::with_capacity(fields.len());
                for (name, value) in fields {
                    field_names.push(name.clone());
                    self.plan_expr(value)?;
                }
                self.emit(
                    expr.id,
                    StepKind::CreateRecord {
                        type_name: type_name.clone(),
                        field_names,
                    },
                );
                self.pop_stack(fields.len())?;
                self.push_stack(1);
            }
            ExprKind::Comprehension {
                iter_var,
                iter_range,
                accu_var,
                accu_init,
                loop_condition,
                loop_step,
                result,
            } => self.plan_comprehension(
                iter_range,
                accu_init,
                iter_var,
                accu_var,
                loop_condition,
                loop_step,
                result,
            )?,
        }
        Ok(())
    }

    fn plan_call(
        &mut self,
        id: i64,
        function: &str,
        target: Option<&Expr>,
        args: &[Expr],
    ) -> Result<(), PlanError> {
        match function {
            operators::LOGICAL_AND | operators::LOGICAL_OR if target.is_none() => {
                let [left, right] = args else {
                    return Err(PlanError::MalformedAst(format!(
                        "{} expects 2 arguments, got {}",
                        function,
                        args.len()
                    )));
                };
                return self.plan_logical(id, function == operators::LOGICAL_AND, left, right);
            }
            operators::CONDITIONAL if target.is_none() => {
                let [cond, then, otherwise] = args else {
                    return Err(PlanError::MalformedAst(format!(
                        "{} expects 3 arguments, got {}",
                        operators::CONDITIONAL,
                        args.len()
                    )));
                };
                return self.plan_conditional(id, cond, then, otherwise);
            }
            operators::INDEX if target.is_none() && args.len() == 2 => {
                self.plan_expr(&args[0])?;
                self.plan_expr(&args[1])?;
                self.emit(id, StepKind::Index);
                self.pop_stack(2)?;
                self.push_stack(1);
                return Ok(());
            }
            _ => {}
        }

        let receiver_style = target.is_some();
        if let Some(target) = target {
            self.plan_expr(target)?;
        }
        for arg in args {
            self.plan_expr(arg)?;
        }
        let arity = args.len() + usize::from(receiver_style);
        let overload_ids = self
            .references
            .get(&id)
            .map(|r: &Reference| r.overload_ids.clone())
            .unwrap_or_default();
        self.emit(
            id,
            StepKind::Call {
                function: function.to_string(),
                arity,
                receiver_style,
                overload_ids,
            },
        );
        self.pop_stack(arity)?;
        self.push_stack(1);
        Ok(())
    }

    /// Both operands always evaluate unless short-circuiting skips the
    /// right arm on an absorbing Bool; the combine step owns the
    /// commutative error/unknown table either way.
    fn plan_logical(
        &mut self,
        id: i64,
        is_and: bool,
        left: &Expr,
        right: &Expr,
    ) -> Result<(), PlanError> {
        self.plan_expr(left)?;
        let skip = if self.options.short_circuit {
            Some(self.emit(
                id,
                StepKind::JumpIfAbsorbing {
                    is_and,
                    target: usize::MAX,
                },
            ))
        } else {
            None
        };
        self.plan_expr(right)?;
        self.emit(id, if is_and { StepKind::And2 } else { StepKind::Or2 });
        self.pop_stack(2)?;
        self.push_stack(1);
        let end = self.here();
        if let Some(skip) = skip {
            self.patch(skip, |kind| {
                if let StepKind::JumpIfAbsorbing { target, .. } = kind {
                    *target = end;
                }
            });
        }
        Ok(())
    }

    fn plan_conditional(
        &mut self,
        id: i64,
        cond: &Expr,
        then: &Expr,
        otherwise: &Expr,
    ) -> Result<(), PlanError> {
        self.plan_expr(cond)?;
        let jif = self.emit(
            id,
            StepKind::JumpIfFalseOrError {
                on_false: usize::MAX,
                on_done: usize::MAX,
            },
        );
        self.pop_stack(1)?;
        let base = self.stack;

        self.plan_expr(then)?;
        let jend = self.emit(SYNTHETIC_ID, StepKind::Jump { target: usize::MAX });
        let then_depth = self.stack;

        let on_false = self.here();
        self.stack = base;
        self.plan_expr(otherwise)?;
        debug_assert_eq!(self.stack, then_depth, "both arms leave one value");

        let end = self.here();
        self.patch(jend, |kind| {
            if let StepKind::Jump { target } = kind {
                *target = end;
            }
        });
        self.patch(jif, |kind| {
            if let StepKind::JumpIfFalseOrError { on_false: f, on_done } = kind {
                *f = on_false;
                *on_done = end;
            }
        });
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn plan_comprehension(
        &mut self,
        iter_range: &Expr,
        accu_init: &Expr,
        iter_var: &str,
        accu_var: &str,
        loop_condition: &Expr,
        loop_step: &Expr,
        result: &Expr,
    ) -> Result<(), PlanError> {
        let iter_slot = self.depth * 2;
        let accu_slot = self.depth * 2 + 1;
        self.depth += 1;
        self.max_slots = self.max_slots.max(self.depth * 2);

        // [init]: range, then accumulator init
        self.plan_expr(iter_range)?;
        let range_check = self.emit(
            iter_range.id,
            StepKind::IterRangeCheck { done: usize::MAX },
        );
        self.plan_expr(accu_init)?;
        let init = self.emit(
            SYNTHETIC_ID,
            StepKind::IterInit {
                iter_slot,
                accu_slot,
                done: usize::MAX,
            },
        );
        self.pop_stack(2)?;
        let base = self.stack;

        // [loop]
        let loop_top = self.here();
        let next = self.emit(
            iter_range.id,
            StepKind::IterNext {
                iter_slot,
                finish: usize::MAX,
            },
        );

        self.scopes.push((accu_var.to_string(), accu_slot));
        self.scopes.push((iter_var.to_string(), iter_slot));

        self.plan_expr(loop_condition)?;
        let loop_check = self.emit(
            loop_condition.id,
            StepKind::LoopCheck {
                finish: usize::MAX,
                done: usize::MAX,
            },
        );
        self.pop_stack(1)?;

        self.plan_expr(loop_step)?;
        self.emit(
            loop_step.id,
            StepKind::StoreAccu {
                accu_slot,
                loop_top,
            },
        );
        self.pop_stack(1)?;
        debug_assert_eq!(self.stack, base);

        // [finish]: the iteration variable goes out of scope, the
        // accumulator stays visible to the result expression
        let finish = self.here();
        self.scopes.pop();
        self.plan_expr(result)?;
        self.emit(
            result.id,
            StepKind::IterFinish {
                iter_slot,
                accu_slot,
            },
        );
        self.scopes.pop();

        let done = self.here();
        self.patch(range_check, |kind| {
            if let StepKind::IterRangeCheck { done: d } = kind {
                *d = done;
            }
        });
        self.patch(init, |kind| {
            if let StepKind::IterInit { done: d, .. } = kind {
                *d = done;
            }
        });
        self.patch(next, |kind| {
            if let StepKind::IterNext { finish: f, .. } = kind {
                *f = finish;
            }
        });
        self.patch(loop_check, |kind| {
            if let StepKind::LoopCheck { finish: f, done: d } = kind {
                *f = finish;
                *d = done;
            }
        });

        self.depth -= 1;
        Ok(())
    }
}
