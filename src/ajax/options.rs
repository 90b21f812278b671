//! Per-call submit options

use super::context::{ErrorCallback, EventCallback};
use super::events::{AjaxErrorData, AjaxEvent};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

/// Options of one [`submit`](crate::engine::AjaxEngine::submit) call.
/// Unset values fall back to the engine configuration.
#[derive(Clone, Default)]
pub struct SubmitOptions {
    /// Raw execute list (`@this`, `@form`, `@all`, `@none` or ids)
    pub execute: Option<String>,
    /// Raw render list
    pub render: Option<String>,
    pub on_event: Option<EventCallback>,
    pub on_error: Option<ErrorCallback>,
    pub delay: Option<Duration>,
    pub queue_size: Option<usize>,
    pub timeout: Option<Duration>,
    /// Transport name override
    pub transport: Option<String>,
    pub reset_values: bool,
    /// Pinned client window id
    pub client_window: Option<String>,
    pub behavior_event: Option<String>,
    pub partial_page_submit: Option<bool>,
    /// Id of the form to use when the source is outside any form
    pub form: Option<String>,
    /// Extra pass-through parameters
    pub params: Vec<(String, String)>,
}

impl SubmitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn execute(mut self, ids: impl Into<String>) -> Self {
        self.execute = Some(ids.into());
        self
    }

    pub fn render(mut self, ids: impl Into<String>) -> Self {
        self.render = Some(ids.into());
        self
    }

    pub fn on_event(mut self, callback: impl Fn(&AjaxEvent) + 'static) -> Self {
        self.on_event = Some(Rc::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&AjaxErrorData) + 'static) -> Self {
        self.on_error = Some(Rc::new(callback));
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn queue_size(mut self, size: usize) -> Self {
        self.queue_size = Some(size);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn transport(mut self, name: impl Into<String>) -> Self {
        self.transport = Some(name.into());
        self
    }

    pub fn reset_values(mut self, reset: bool) -> Self {
        self.reset_values = reset;
        self
    }

    pub fn client_window(mut self, window_id: impl Into<String>) -> Self {
        self.client_window = Some(window_id.into());
        self
    }

    pub fn behavior_event(mut self, name: impl Into<String>) -> Self {
        self.behavior_event = Some(name.into());
        self
    }

    pub fn partial_page_submit(mut self, pps: bool) -> Self {
        self.partial_page_submit = Some(pps);
        self
    }

    pub fn form(mut self, form_id: impl Into<String>) -> Self {
        self.form = Some(form_id.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }
}

impl fmt::Debug for SubmitOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmitOptions")
            .field("execute", &self.execute)
            .field("render", &self.render)
            .field("delay", &self.delay)
            .field("queue_size", &self.queue_size)
            .field("timeout", &self.timeout)
            .field("transport", &self.transport)
            .field("reset_values", &self.reset_values)
            .field("client_window", &self.client_window)
            .field("behavior_event", &self.behavior_event)
            .field("partial_page_submit", &self.partial_page_submit)
            .field("form", &self.form)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
