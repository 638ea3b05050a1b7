//! CEL planner: lowering a checked AST into a flat execution program
//!
//! The planner is the bridge between the external checker and the
//! evaluator. It walks the AST once, resolves comprehension variables to
//! slots, pre-resolves overload candidates where the checker annotated
//! them, optionally folds constant subtrees, and statically bounds the
//! value stack.

pub mod ast;
pub mod folding;
pub mod planner;
pub mod program;

// Re-export key types
pub use ast::{CheckedExpr, Constant, Expr, ExprKind, Reference, operators};
pub use folding::fold_constants;
pub use planner::{PlanError, PlanOptions, plan};
pub use program::{Program, SYNTHETIC_ID, Step, StepKind};
