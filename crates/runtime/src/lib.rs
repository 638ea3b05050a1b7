//! CEL runtime: a stack evaluator for planned expression programs
//!
//! Key design principles:
//! - One immutable Program may be evaluated concurrently; every
//!   evaluation owns its frame, slots, and arena
//! - The Activation supplies bindings and the unknown/missing patterns
//! - Errors and unknowns are values on the stack; only budgets,
//!   deadlines, trace aborts, and internal bugs are fatal

pub mod activation;
pub mod evaluator;
pub mod options;
pub mod provider;
pub mod stdlib;

// Re-export key types
pub use activation::{Activation, EmptyActivation, LazyBinding, MapActivation};
pub use evaluator::{EvalError, Evaluator, TraceFn};
pub use options::{RuntimeOptions, UnknownTracking};
pub use provider::{DynRecord, DynRecordProvider, RecordDescriptor};
pub use stdlib::{register_standard_functions, standard_registry};

// The planner is the other half of the embedding surface; re-export the
// common entry points so hosts depend on one crate.
pub use cel_planner::{CheckedExpr, Expr, PlanError, PlanOptions, Program, plan};
