//! Form context: the explicit registry scope
//!
//! One [`FormContext`] per process (or per embedding scope) carries what the
//! engine would otherwise need ambient statics for: the validator and
//! resolver registries, the uid pool, engine default configuration, the
//! collaborator adapters, and the live form cache. Registrations merge
//! nearer-wins: a control sees the context registry overlaid by every
//! ancestor's field-local registrations, overlaid by its own.

use crate::config::Config;
use crate::control::Control;
use crate::error::FieldError;
use crate::external::{StorageAdapter, SyncAdapter};
use crate::field::Field;
use crate::validators;
use dashmap::DashMap;
use formwork_resolver::{ResolverFn, ResolverRegistry, ValidatorFn, ValidatorRegistry};
use formwork_value::UidPool;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Process-wide registry and form scope
pub struct FormContext {
    validators: RwLock<ValidatorRegistry>,
    resolvers: RwLock<ResolverRegistry>,
    config: RwLock<Config>,
    uid_pool: UidPool,
    forms: DashMap<String, Arc<Control>>,
    search_params: RwLock<HashMap<String, String>>,
    storage: RwLock<Option<Arc<dyn StorageAdapter>>>,
    sync: RwLock<Option<Arc<dyn SyncAdapter>>>,
}

impl FormContext {
    /// Context with engine defaults
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_config(Config::default())
    }

    /// Context with custom engine default configuration
    #[must_use]
    pub fn with_config(config: Config) -> Arc<Self> {
        let mut validator_registry = ValidatorRegistry::new();
        if config.add_default_validators {
            validators::register_defaults(&mut validator_registry);
        }
        Arc::new(Self {
            validators: RwLock::new(validator_registry),
            resolvers: RwLock::new(ResolverRegistry::new()),
            config: RwLock::new(config),
            uid_pool: UidPool::new(),
            forms: DashMap::new(),
            search_params: RwLock::new(HashMap::new()),
            storage: RwLock::new(None),
            sync: RwLock::new(None),
        })
    }

    /// Build a form, or return the live instance already built for this name
    ///
    /// Repeated calls for the same logical form reuse the cached control
    /// tree; the supplied field is only consulted for the first build.
    ///
    /// # Errors
    /// Construction errors from the control tree build.
    pub fn create_form(self: &Arc<Self>, field: Field) -> Result<Arc<Control>, FieldError> {
        let name = field.name.clone();
        if let Some(existing) = self.forms.get(&name) {
            return Ok(existing.clone());
        }
        let control = Control::build(field, None, self)?;
        self.forms.insert(name, control.clone());
        Ok(control)
    }

    /// Look up a cached form by name
    #[must_use]
    pub fn get_form(&self, name: &str) -> Option<Arc<Control>> {
        self.forms.get(name).map(|entry| entry.clone())
    }

    /// Clean up and drop a cached form
    pub fn remove_form(&self, name: &str) -> bool {
        match self.forms.remove(name) {
            Some((_, control)) => {
                control.cleanup();
                true
            }
            None => false,
        }
    }

    /// Register a named validator on the context
    pub fn register_validator(&self, name: impl Into<String>, f: ValidatorFn) {
        self.validators.write().register(name, f);
    }

    /// Register a named resolver on the context
    pub fn register_resolver(&self, name: impl Into<String>, f: ResolverFn) {
        self.resolvers.write().register(name, f);
    }

    /// Snapshot of the context validator registry
    #[must_use]
    pub fn validators(&self) -> ValidatorRegistry {
        self.validators.read().clone()
    }

    /// Snapshot of the context resolver registry
    #[must_use]
    pub fn resolvers(&self) -> ResolverRegistry {
        self.resolvers.read().clone()
    }

    /// Engine default configuration
    #[must_use]
    pub fn default_config(&self) -> Config {
        self.config.read().clone()
    }

    /// Uid issuing scope shared by every control in this context
    #[must_use]
    pub fn uid_pool(&self) -> &UidPool {
        &self.uid_pool
    }

    /// Seed URL search parameters for initial value resolution
    pub fn set_search_params(&self, params: HashMap<String, String>) {
        *self.search_params.write() = params;
    }

    /// Look up one search parameter
    #[must_use]
    pub fn search_param(&self, name: &str) -> Option<String> {
        self.search_params.read().get(name).cloned()
    }

    /// Install the storage collaborator
    pub fn set_storage(&self, storage: Arc<dyn StorageAdapter>) {
        *self.storage.write() = Some(storage);
    }

    /// The installed storage collaborator, if any
    #[must_use]
    pub fn storage(&self) -> Option<Arc<dyn StorageAdapter>> {
        self.storage.read().clone()
    }

    /// Install the cross-instance synchronization collaborator
    pub fn set_sync_adapter(&self, sync: Arc<dyn SyncAdapter>) {
        *self.sync.write() = Some(sync);
    }

    /// The installed synchronization collaborator, if any
    #[must_use]
    pub fn sync_adapter(&self) -> Option<Arc<dyn SyncAdapter>> {
        self.sync.read().clone()
    }
}

impl std::fmt::Debug for FormContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormContext")
            .field("forms", &self.forms.len())
            .field("live_uids", &self.uid_pool.len())
            .finish_non_exhaustive()
    }
}
