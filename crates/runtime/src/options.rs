//! Runtime options
//!
//! One plain struct controls every optional evaluator behavior. Options
//! are fixed for the lifetime of an evaluation; the planner derives its
//! own view from the same struct so plan and execution agree on
//! short-circuiting and folding.

use cel_core::StringBacking;
use cel_planner::PlanOptions;
use serde::{Deserialize, Serialize};

/// How unknown inputs are tracked during evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownTracking {
    /// Unknown patterns are ignored
    #[default]
    Disabled,
    /// Attribute trails matching unknown patterns become unknown values
    AttributeOnly,
    /// Attribute tracking, plus functions may return unknown values that
    /// union through calls
    AttributeAndFunction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeOptions {
    /// Total comprehension iteration budget per evaluation; 0 disables
    /// the limit. Exceeding it is fatal.
    pub comprehension_max_iterations: u32,
    /// Cross-numeric equality and map-key lookup
    pub enable_heterogeneous_equality: bool,
    pub unknown_tracking: UnknownTracking,
    /// Attribute trails matching missing patterns produce Missing errors
    pub enable_missing_attribute_errors: bool,
    /// Short-circuit logicals and comprehension loop conditions. When
    /// off, both logical arms always evaluate and loops run to range
    /// exhaustion.
    pub enable_short_circuiting: bool,
    pub enable_constant_folding: bool,
    pub string_backing: StringBacking,
    /// Value stack bound enforced at plan time; 0 disables the check
    pub max_value_stack_depth: u32,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        RuntimeOptions {
            comprehension_max_iterations: 0,
            enable_heterogeneous_equality: true,
            unknown_tracking: UnknownTracking::Disabled,
            enable_missing_attribute_errors: false,
            enable_short_circuiting: true,
            enable_constant_folding: false,
            string_backing: StringBacking::Contiguous,
            max_value_stack_depth: 1024,
        }
    }
}

impl RuntimeOptions {
    /// The planner's view of these options.
    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            short_circuit: self.enable_short_circuiting,
            constant_folding: self.enable_constant_folding,
            hetero: self.enable_heterogeneous_equality,
            max_stack_depth: self.max_value_stack_depth,
        }
    }

    pub fn unknown_tracking_enabled(&self) -> bool {
        self.unknown_tracking != UnknownTracking::Disabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = RuntimeOptions::default();
        assert_eq!(opts.comprehension_max_iterations, 0);
        assert!(opts.enable_heterogeneous_equality);
        assert!(opts.enable_short_circuiting);
        assert!(!opts.unknown_tracking_enabled());
        assert_eq!(opts.max_value_stack_depth, 1024);
    }

    #[test]
    fn test_serde_round_trip() {
        let opts = RuntimeOptions {
            comprehension_max_iterations: 100,
            unknown_tracking: UnknownTracking::AttributeOnly,
            string_backing: StringBacking::Chunked,
            ..RuntimeOptions::default()
        };
        let json = serde_json::to_string(&opts).unwrap();
        let back: RuntimeOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, opts);
    }
}
