//! Named function registries with nearer-wins layering
//!
//! Resolvers and validators are registered by name and looked up from string
//! or object references. Registrations layer: engine defaults, then
//! ancestors' field-local registrations, then the control's own — nearer
//! registrations win per name.

use crate::context::ResolveContext;
use crate::output::SlotOutput;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A named resolver function
pub type ResolverFn = Arc<dyn Fn(&ResolveContext) -> SlotOutput + Send + Sync>;

/// A named validator function
///
/// Validators share the resolver signature; their produced value encodes a
/// [`ValidatorOutcome`](crate::output::ValidatorOutcome).
pub type ValidatorFn = ResolverFn;

/// Registry of named functions
#[derive(Clone)]
pub struct Registry<F: Clone> {
    entries: HashMap<String, F>,
}

impl<F: Clone> Default for Registry<F> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

/// Resolver registry
pub type ResolverRegistry = Registry<ResolverFn>;
/// Validator registry
pub type ValidatorRegistry = Registry<ValidatorFn>;

impl<F: Clone> Registry<F> {
    /// Create an empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a function under a name, replacing any previous entry
    pub fn register(&mut self, name: impl Into<String>, f: F) {
        self.entries.insert(name.into(), f);
    }

    /// Look up a function by name
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&F> {
        self.entries.get(name)
    }

    /// Check if a name is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Remove a registration
    pub fn remove(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    /// Registered names
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Number of registrations
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overlay a nearer registry on top of this one
    ///
    /// Entries in `nearer` win per name.
    #[must_use]
    pub fn overlaid(&self, nearer: &Self) -> Self {
        let mut merged = self.clone();
        for (name, f) in &nearer.entries {
            merged.entries.insert(name.clone(), f.clone());
        }
        merged
    }

    /// Merge layers in order, later (nearer) layers winning per name
    #[must_use]
    pub fn layered<'a>(layers: impl IntoIterator<Item = &'a Self>) -> Self
    where
        F: 'a,
    {
        let mut merged = Self::new();
        for layer in layers {
            for (name, f) in &layer.entries {
                merged.entries.insert(name.clone(), f.clone());
            }
        }
        merged
    }
}

impl<T: ?Sized> Registry<Arc<T>> {
    /// Compare two registries by name set and per-name pointer identity
    ///
    /// Function entries cannot be compared structurally; this is the equality
    /// used by semantic no-op detection on field descriptors.
    #[must_use]
    pub fn same_entries(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self.entries.iter().all(|(name, f)| {
                other
                    .entries
                    .get(name)
                    .is_some_and(|g| Arc::ptr_eq(f, g))
            })
    }
}

// Registries hold unnameable closures, so Debug shows names only.
impl<F: Clone> fmt::Debug for Registry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Registry").field("names", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formwork_value::Value;

    fn constant(value: Value) -> ResolverFn {
        Arc::new(move |_ctx| SlotOutput::Ready(value.clone()))
    }

    fn resolve_ready(registry: &ResolverRegistry, name: &str) -> Option<Value> {
        let f = registry.get(name)?;
        match f(&ResolveContext::new()) {
            SlotOutput::Ready(v) => Some(v),
            _ => None,
        }
    }

    #[test]
    fn register_and_get() {
        let mut registry = ResolverRegistry::new();
        registry.register("answer", constant(Value::from(42)));
        assert!(registry.contains("answer"));
        assert_eq!(resolve_ready(&registry, "answer"), Some(Value::from(42)));
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn overlaid_nearer_wins() {
        let mut base = ResolverRegistry::new();
        base.register("x", constant(Value::from("global")));
        base.register("y", constant(Value::from("kept")));

        let mut near = ResolverRegistry::new();
        near.register("x", constant(Value::from("local")));

        let merged = base.overlaid(&near);
        assert_eq!(resolve_ready(&merged, "x"), Some(Value::from("local")));
        assert_eq!(resolve_ready(&merged, "y"), Some(Value::from("kept")));
    }

    #[test]
    fn layered_last_layer_wins() {
        let mut global = ResolverRegistry::new();
        global.register("x", constant(Value::from(1)));
        let mut inherited = ResolverRegistry::new();
        inherited.register("x", constant(Value::from(2)));
        let mut own = ResolverRegistry::new();
        own.register("x", constant(Value::from(3)));

        let merged = Registry::layered([&global, &inherited, &own]);
        assert_eq!(resolve_ready(&merged, "x"), Some(Value::from(3)));
    }

    #[test]
    fn remove_unregisters() {
        let mut registry = ResolverRegistry::new();
        registry.register("x", constant(Value::Null));
        assert!(registry.remove("x"));
        assert!(!registry.contains("x"));
        assert!(!registry.remove("x"));
    }
}
