//! The process-wide method-mixin extension point.
//!
//! A method mixin is a behavior provider woven into a synthesized class at
//! the time it is constructed, rather than a runtime inheritance hierarchy:
//! a pluggable trait/behavior registry consulted at synthesis time. This
//! crate does not interpret what a mixin does; it only tracks, per
//! sanitized class name, whether
//! one is attached, and exposes it on the resulting
//! [`ClassDescriptor`](crate::synth::ClassDescriptor) for a caller-provided
//! implementation to consult when instantiating decoded objects.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, RwLock};

/// A behavior to weave into a synthesized class, identified by name. The
/// actual trait implementation lives outside this crate; this is only the
/// registry key plus an opaque payload the caller defines.
#[derive(Clone)]
pub struct MethodMixin {
    /// Name of the behavior, e.g. a trait name in a downstream crate.
    pub name: Rc<str>,
}

/// A process-wide registry mapping a sanitized class name to the
/// [`MethodMixin`] it should be woven with, if any.
///
/// Initialization must complete before any file is opened; this type does
/// not enforce that itself, callers are expected to
/// build the registry once at startup and clone the handle into every
/// [`FileContext`](crate::context::FileContext) they construct.
#[derive(Clone, Default)]
pub struct MethodMixins {
    inner: Arc<RwLock<HashMap<String, MethodMixin>>>,
}

impl MethodMixins {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `mixin` for `class_name`, overwriting any previous entry.
    pub fn register(&self, class_name: impl Into<String>, mixin: MethodMixin) {
        self.inner
            .write()
            .expect("method mixin registry lock poisoned")
            .insert(class_name.into(), mixin);
    }

    /// Looks up the mixin registered for `class_name`, if any.
    pub fn get(&self, class_name: &str) -> Option<MethodMixin> {
        self.inner
            .read()
            .expect("method mixin registry lock poisoned")
            .get(class_name)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_lookup() {
        let registry = MethodMixins::new();
        registry.register(
            "TH1",
            MethodMixin {
                name: Rc::from("Histogram"),
            },
        );
        assert!(registry.get("TH1").is_some());
        assert!(registry.get("TH2").is_none());
    }
}
