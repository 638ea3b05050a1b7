//! Flat execution program
//!
//! A program is a frozen, ordered sequence of steps plus the number of
//! comprehension variable slots it needs. Steps either advance the
//! program counter by one or perform a computed jump; jump targets are
//! absolute step indices, with `steps.len()` meaning "end of program".
//!
//! Stack effects per step kind (the evaluator relies on these):
//! - `PushConst`/`Ident`/`Slot`: push 1
//! - `Select`/`TestOnlySelect`: pop 1, push 1
//! - `Index`: pop 2, push 1
//! - `Call{arity}`: pop arity, push 1
//! - `CreateList{size}`: pop size, push 1
//! - `CreateMap{entries}`: pop 2·entries, push 1
//! - `CreateRecord`: pop field count, push 1
//! - `Jump`: none; `JumpIfAbsorbing`: peek only
//! - `JumpIfFalseOrError`: pop 1 on Bool, peek-and-keep on error/unknown
//! - `And2`/`Or2`: pop 2, push 1
//! - `IterRangeCheck`: peek; `IterInit`: pop 2; `IterNext`/`IterFinish`:
//!   none; `LoopCheck`/`StoreAccu`: pop 1

use cel_core::Value;
use std::fmt;

/// Marks steps the planner synthesized with no source AST node.
pub const SYNTHETIC_ID: i64 = -1;

#[derive(Debug, Clone)]
pub enum StepKind {
    /// Push a literal value
    PushConst(Value),
    /// Look up a variable in the activation; roots the attribute trail
    Ident { name: String },
    /// Read a comprehension variable slot
    Slot { index: usize },
    /// Field access on the top of stack; extends the attribute trail
    Select { field: String },
    /// has(x.f) presence test
    TestOnlySelect { field: String },
    /// Container index: pops key then operand; extends the trail with the
    /// key qualifier
    Index,
    /// Function dispatch over the top `arity` stack values.
    /// `overload_ids` is the plan-time-resolved candidate set; empty
    /// means full runtime resolution.
    Call {
        function: String,
        arity: usize,
        receiver_style: bool,
        overload_ids: Vec<String>,
    },
    CreateList {
        size: usize,
    },
    CreateMap {
        entries: usize,
    },
    CreateRecord {
        type_name: String,
        field_names: Vec<String>,
    },
    /// Unconditional jump
    Jump { target: usize },
    /// Conditional dispatch: Bool pops and either falls through (true) or
    /// jumps to `on_false`; error/unknown keeps the value and jumps to
    /// `on_done`, skipping both arms
    JumpIfFalseOrError { on_false: usize, on_done: usize },
    /// Short-circuit peek for logicals: jumps when the top of stack is
    /// the absorbing Bool (false for &&, true for ||), skipping the right
    /// arm. Emitted only when short-circuiting is enabled.
    JumpIfAbsorbing { is_and: bool, target: usize },
    /// Combine two operands per the commutative && table
    And2,
    /// Combine two operands per the commutative || table
    Or2,
    /// Top of stack is the comprehension range: error/unknown jumps to
    /// `done` with the value as the comprehension result
    IterRangeCheck { done: usize },
    /// Pops the accumulator init into its slot, then pops the range and
    /// opens an iterator over it (map form iterates keys in insertion
    /// order). A non-list/non-map range jumps to the range check's `done`
    /// target with a no_matching_overload error; the planner stores that
    /// target here as well
    IterInit {
        iter_slot: usize,
        accu_slot: usize,
        done: usize,
    },
    /// Loop head: advances the iterator into `iter_slot`, or jumps to
    /// `finish` when exhausted. Charges the iteration budget
    IterNext { iter_slot: usize, finish: usize },
    /// Pops the loop condition: error/unknown jumps to `done` with that
    /// value as the result; false stops iteration (when short-circuiting)
    /// by jumping to `finish`; true falls through to the loop step
    LoopCheck { finish: usize, done: usize },
    /// Pops the loop step result into the accumulator slot and jumps back
    /// to the loop head
    StoreAccu { accu_slot: usize, loop_top: usize },
    /// Clears both slots; the comprehension result stays on the stack
    IterFinish { iter_slot: usize, accu_slot: usize },
}

/// One unit of work, tagged with the AST node it came from.
#[derive(Debug, Clone)]
pub struct Step {
    pub id: i64,
    pub kind: StepKind,
}

impl Step {
    pub fn new(id: i64, kind: StepKind) -> Step {
        Step { id, kind }
    }

    pub fn synthetic(kind: StepKind) -> Step {
        Step {
            id: SYNTHETIC_ID,
            kind,
        }
    }
}

/// Planner output, immutable once built.
#[derive(Debug, Clone)]
pub struct Program {
    steps: Vec<Step>,
    slot_count: usize,
    max_stack_depth: usize,
}

impl Program {
    pub(crate) fn new(steps: Vec<Step>, slot_count: usize, max_stack_depth: usize) -> Program {
        debug_assert!(!steps.is_empty(), "a program has at least one step");
        Program {
            steps,
            slot_count,
            max_stack_depth,
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of comprehension variable slots an execution frame needs.
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Planner-computed bound on the value stack.
    pub fn max_stack_depth(&self) -> usize {
        self.max_stack_depth
    }
}

impl fmt::Display for Program {
    /// One step per line, for plan debugging.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "program: {} steps, {} slots, stack depth {}",
            self.steps.len(),
            self.slot_count,
            self.max_stack_depth
        )?;
        for (i, step) in self.steps.iter().enumerate() {
            writeln!(f, "  {:4}: {:?}", i, step.kind)?;
        }
        Ok(())
    }
}
