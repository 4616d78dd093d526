//! Element binding contract
//!
//! UI-framework adapters implement [`ElementBinding`] per concrete element;
//! the engine consumes it generically: it pushes value and disabled/read-only
//! state onto the element, merges element-derived validation hints into the
//! field, and folds element events back into control state (blur → touched,
//! input → value, native submit/reset → the control's submit/reset).

use formwork_value::Value;
use futures::stream::BoxStream;
use indexmap::IndexMap;

/// Events an element reports back to its control
#[derive(Debug, Clone, PartialEq)]
pub enum ElementEvent {
    /// User input with the element's current value
    Input(Value),
    /// Element received focus
    Focus,
    /// Element lost focus
    Blur,
    /// Native form submit fired
    Submit,
    /// Native form reset fired
    Reset,
    /// Element left the document; the binding must be released
    Detached,
}

/// One bound element-like handle
pub trait ElementBinding: Send + Sync {
    /// Extract the element's current input-like value
    fn read_value(&self) -> Option<Value>;

    /// Push the control's value onto the element
    fn write_value(&self, value: Option<&Value>);

    /// Reflect the control's disabled state
    fn set_disabled(&self, disabled: bool);

    /// Reflect the control's read-only state
    fn set_read_only(&self, read_only: bool);

    /// Element-derived validation hints
    ///
    /// `required`, `pattern`, and input-type attributes map to validator
    /// keys; the engine merges these into the field's validation map.
    fn validation_hints(&self) -> IndexMap<String, Value> {
        IndexMap::new()
    }

    /// Lifecycle and interaction events
    fn events(&self) -> BoxStream<'static, ElementEvent>;
}
