//! Formwork control engine
//!
//! Builds a live control tree from a declarative field tree and keeps it
//! synchronized in both directions: values aggregate bottom-up from active
//! children, assigned values reconcile child structure top-down, and
//! validity/interaction state propagates with the same tree awareness.
//! External collaborators (storage, cross-instance sync, element bindings)
//! plug in at trait boundaries and never leak into the core.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use formwork_core::prelude::*;
//!
//! let context = FormContext::new();
//! let form = context.create_form(
//!     Field::new("signup").with_fields(vec![
//!         Field::new("email").with_validation("required", true).with_validation("email", true),
//!         Field::new("name"),
//!     ]),
//! )?;
//!
//! form.get_control("email").unwrap().set_value("a@b.co")?;
//! let valid = form.validate(true).await;
//! ```

pub mod config;
pub mod context;
pub mod control;
pub mod error;
pub mod external;
pub mod field;
pub mod state;
pub mod validators;

pub(crate) mod debounce;
pub(crate) mod managers;

pub use config::{AfterSubmit, Config, FieldConfig, LocalizationOutput, NameCase, StorageKeySource, StorageStrategy};
pub use context::FormContext;
pub use control::Control;
pub use error::{FieldError, SubmitError};
pub use field::{
    AsyncControlHook, ControlHook, Field, Grouping, Hooks, StartWith, SubmitContext, SubmitFn,
    SubmitHandler, SubmitOutcome, Transformer,
};
pub use managers::{Lookup, TemplateRef};
pub use state::{ControlState, PathErrors, SubmitResult};

/// Common imports for embedding the engine
pub mod prelude {
    pub use crate::config::{AfterSubmit, Config, FieldConfig};
    pub use crate::context::FormContext;
    pub use crate::control::Control;
    pub use crate::error::{FieldError, SubmitError};
    pub use crate::external::{MemoryStorage, StorageAdapter, SyncAdapter, SyncMessage};
    pub use crate::field::{Field, Grouping, StartWith, SubmitHandler, SubmitOutcome};
    pub use crate::managers::{Lookup, TemplateRef};
    pub use crate::state::{ControlState, SubmitResult};
    pub use formwork_resolver::{Expr, ResolverRef, SlotOutput};
    pub use formwork_value::Value;
}
