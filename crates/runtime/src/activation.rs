//! Activations: the variable bindings for one evaluation
//!
//! An activation answers name lookups and declares which attribute
//! patterns are unknown or missing for this evaluation. Lazy bindings
//! produce their value at most once per evaluation; the memo lives in the
//! execution frame, not here, so one activation can safely serve
//! concurrent evaluations.

use cel_core::{AttributePattern, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// A binding produced on first use.
pub type LazyBinding = Arc<dyn Fn() -> Value + Send + Sync>;

pub trait Activation: Send + Sync {
    /// Scalar variable lookup.
    fn find(&self, name: &str) -> Option<Value>;

    /// Lazily produced binding; the evaluator forces the thunk at most
    /// once per evaluation and caches the result for the rest of it.
    fn find_lazy(&self, _name: &str) -> Option<LazyBinding> {
        None
    }

    /// Patterns marking inputs as unknown.
    fn unknown_patterns(&self) -> &[AttributePattern] {
        &[]
    }

    /// Patterns marking inputs as forbidden; matching accesses produce a
    /// Missing error.
    fn missing_patterns(&self) -> &[AttributePattern] {
        &[]
    }
}

/// No bindings at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyActivation;

impl Activation for EmptyActivation {
    fn find(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// Map-backed activation with builder-style construction.
#[derive(Default)]
pub struct MapActivation {
    values: HashMap<String, Value>,
    lazy: HashMap<String, LazyBinding>,
    unknown: Vec<AttributePattern>,
    missing: Vec<AttributePattern>,
}

impl MapActivation {
    pub fn new() -> Self {
        MapActivation::default()
    }

    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn bind_lazy(
        mut self,
        name: impl Into<String>,
        f: impl Fn() -> Value + Send + Sync + 'static,
    ) -> Self {
        self.lazy.insert(name.into(), Arc::new(f));
        self
    }

    pub fn mark_unknown(mut self, pattern: AttributePattern) -> Self {
        self.unknown.push(pattern);
        self
    }

    pub fn mark_missing(mut self, pattern: AttributePattern) -> Self {
        self.missing.push(pattern);
        self
    }
}

impl Activation for MapActivation {
    fn find(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }

    fn find_lazy(&self, name: &str) -> Option<LazyBinding> {
        self.lazy.get(name).cloned()
    }

    fn unknown_patterns(&self) -> &[AttributePattern] {
        &self.unknown
    }

    fn missing_patterns(&self) -> &[AttributePattern] {
        &self.missing
    }
}
