//! Per-exchange correlation record

use super::events::{AjaxErrorData, AjaxEvent};
use crate::dom::NodeId;
use crate::network::TransportKind;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

/// Per-call event callback
pub type EventCallback = Rc<dyn Fn(&AjaxEvent)>;
/// Per-call error callback
pub type ErrorCallback = Rc<dyn Fn(&AjaxErrorData)>;

/// Engine-side bookkeeping of one exchange
#[derive(Debug, Clone, Default)]
pub struct ExchangeState {
    pub source_form_id: Option<String>,
    pub source_control_id: String,
    pub transport_kind: Option<TransportKind>,
    /// Forms whose hidden session fields must be refreshed
    pub touched_forms: BTreeSet<NodeId>,
    /// Replaced nodes outside any form; forms nested in them are refreshed
    pub touched_elements: BTreeSet<NodeId>,
    pub pending_view_state: Option<String>,
    pub pending_client_window: Option<String>,
}

impl ExchangeState {
    /// Drop the per-response tracking state
    pub fn clear_tracking(&mut self) {
        self.touched_forms.clear();
        self.touched_elements.clear();
        self.pending_view_state = None;
        self.pending_client_window = None;
    }

    pub fn has_pending_tokens(&self) -> bool {
        self.pending_view_state.is_some() || self.pending_client_window.is_some()
    }
}

/// Context of one submit call
#[derive(Clone, Default)]
pub struct AjaxContext {
    /// Id of the element that triggered the request
    pub source: String,
    pub on_event: Option<EventCallback>,
    pub on_error: Option<ErrorCallback>,
    pub internal: ExchangeState,
}

impl AjaxContext {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            internal: ExchangeState {
                source_control_id: source.clone(),
                ..Default::default()
            },
            source,
            on_event: None,
            on_error: None,
        }
    }

    /// Set the id of the form the source belongs to
    pub fn with_form(mut self, form_id: impl Into<String>) -> Self {
        self.internal.source_form_id = Some(form_id.into());
        self
    }

    pub fn with_callbacks(
        mut self,
        on_event: Option<EventCallback>,
        on_error: Option<ErrorCallback>,
    ) -> Self {
        self.on_event = on_event;
        self.on_error = on_error;
        self
    }
}

impl fmt::Debug for AjaxContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AjaxContext")
            .field("source", &self.source)
            .field("on_event", &self.on_event.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("internal", &self.internal)
            .finish()
    }
}
