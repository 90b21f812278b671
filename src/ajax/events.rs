//! Event and error broadcast
//!
//! Two ordered listener queues (events, errors) plus a default diagnostic
//! sink used in development stages when nobody listens for errors.

use super::context::AjaxContext;
use crate::engine::ProjectStage;
use crate::network::HttpResponse;
use crate::utils::AjaxError;
use crate::utils::error::ErrorStatus;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

/// Lifecycle status of an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    /// Right before the request is sent
    Begin,
    /// A response (or transport failure) arrived
    Complete,
    /// The response was applied and reconciled
    Success,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Begin => "begin",
            Self::Complete => "complete",
            Self::Success => "success",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload delivered to event listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AjaxEvent {
    pub status: EventStatus,
    pub source: String,
    pub response_code: Option<u16>,
    pub response_text: Option<String>,
}

impl AjaxEvent {
    pub fn new(status: EventStatus, source: impl Into<String>) -> Self {
        Self {
            status,
            source: source.into(),
            response_code: None,
            response_text: None,
        }
    }

    pub fn with_response(mut self, response: &HttpResponse) -> Self {
        self.response_code = Some(response.status());
        self.response_text = Some(response.body().to_string());
        self
    }
}

/// Payload delivered to error listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AjaxErrorData {
    pub status: ErrorStatus,
    pub source: String,
    pub error_name: String,
    pub error_message: String,
    pub response_code: Option<u16>,
    pub response_text: Option<String>,
    /// Component that raised the error
    pub origin: &'static str,
}

impl AjaxErrorData {
    pub fn from_error(error: &AjaxError, source: &str, response: Option<&HttpResponse>) -> Self {
        Self {
            status: error.status(),
            source: source.to_string(),
            error_name: error.name(),
            error_message: error.message(),
            response_code: response.map(HttpResponse::status),
            response_text: response.map(|r| r.body().to_string()),
            origin: error.origin(),
        }
    }

    /// One-line diagnostic, `[origin] name: message`
    pub fn diagnostic(&self) -> String {
        format!("[{}] {}: {}", self.origin, self.error_name, self.error_message)
    }
}

/// Handle returned when registering a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Ordered listener registry
pub struct ListenerQueue<T> {
    listeners: Vec<(ListenerId, Rc<dyn Fn(&T)>)>,
    next_id: u64,
}

impl<T> ListenerQueue<T> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    pub fn enqueue(&mut self, listener: Rc<dyn Fn(&T)>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Remove a listener; returns whether it was registered
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Call every listener in registration order. A panicking listener is
    /// logged and skipped.
    pub fn broadcast(&self, payload: &T) {
        for (id, listener) in &self.listeners {
            invoke(listener.as_ref(), payload, *id);
        }
    }
}

fn invoke<T>(listener: &dyn Fn(&T), payload: &T, id: ListenerId) {
    if catch_unwind(AssertUnwindSafe(|| listener(payload))).is_err() {
        log::error!("listener {:?} panicked, continuing broadcast", id);
    }
}

impl<T> Clone for ListenerQueue<T> {
    fn clone(&self) -> Self {
        Self {
            listeners: self.listeners.clone(),
            next_id: self.next_id,
        }
    }
}

impl<T> Default for ListenerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Receives diagnostics nobody else handled
#[cfg_attr(test, mockall::automock)]
pub trait DiagnosticSink {
    fn report(&self, diagnostic: &str);
}

/// Default sink writing to the log
#[derive(Debug, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&self, diagnostic: &str) {
        log::error!("{}", diagnostic);
    }
}

/// Event and error listener registries of one engine
#[derive(Clone)]
pub struct Broadcaster {
    events: ListenerQueue<AjaxEvent>,
    errors: ListenerQueue<AjaxErrorData>,
    sink: Rc<dyn DiagnosticSink>,
    stage: ProjectStage,
}

impl Broadcaster {
    pub fn new(stage: ProjectStage) -> Self {
        Self {
            events: ListenerQueue::new(),
            errors: ListenerQueue::new(),
            sink: Rc::new(LogSink),
            stage,
        }
    }

    pub fn set_sink(&mut self, sink: Rc<dyn DiagnosticSink>) {
        self.sink = sink;
    }

    pub fn add_event_listener(&mut self, listener: Rc<dyn Fn(&AjaxEvent)>) -> ListenerId {
        self.events.enqueue(listener)
    }

    pub fn remove_event_listener(&mut self, id: ListenerId) -> bool {
        self.events.remove(id)
    }

    pub fn add_error_listener(&mut self, listener: Rc<dyn Fn(&AjaxErrorData)>) -> ListenerId {
        self.errors.enqueue(listener)
    }

    pub fn remove_error_listener(&mut self, id: ListenerId) -> bool {
        self.errors.remove(id)
    }

    /// Deliver an event to the call's callback, then to every listener
    pub fn send_event(&self, context: &AjaxContext, event: &AjaxEvent) {
        log::debug!("event {} from {}", event.status, event.source);
        if let Some(callback) = &context.on_event {
            invoke(callback.as_ref(), event, ListenerId(u64::MAX));
        }
        self.events.broadcast(event);
    }

    /// Deliver an error to the call's callback, then to every listener.
    /// Unhandled errors reach the diagnostic sink in development stages.
    pub fn send_error(&self, context: &AjaxContext, error: &AjaxErrorData) {
        log::warn!("{} error from {}: {}", error.status.as_str(), error.source, error.error_message);
        if let Some(callback) = &context.on_error {
            invoke(callback.as_ref(), error, ListenerId(u64::MAX));
        }
        if !self.errors.is_empty() {
            self.errors.broadcast(error);
        } else if self.stage.is_development_like() {
            self.sink.report(&error.diagnostic());
        } else {
            log::debug!("no error listener, dropping {}", error.diagnostic());
        }
    }
}
