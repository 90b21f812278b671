//! Partial-page engine
//!
//! One [`AjaxEngine`] per page owns the request queue, the transports and
//! the listener registries, and drives every exchange:
//! 1. `submit` validates the call and queues an [`AjaxRequest`]
//! 2. a local driver task encodes the head of the queue and sends it
//! 3. transport lifecycle events are collected until `LoadEnd`
//! 4. the response is interpreted and reconciled, listeners are notified
//! 5. the next queued request is sent
//!
//! The engine is single-threaded (`!Send`): `submit` must run inside a
//! [`tokio::task::LocalSet`].

mod config;
mod page;

pub use config::{EngineConfig, ProjectStage};
pub use page::Page;

use crate::ajax::{
    AjaxContext, AjaxErrorData, AjaxEvent, AjaxRequest, Admission, Broadcaster, DiagnosticSink,
    EventStatus, ListenerId, RequestQueue, ResponseInterpreter, SubmitOptions, codec,
};
use crate::network::{
    ExchangeHandle, HttpResponse, LifecycleSink, TransportEvent, TransportSet,
};
use crate::utils::error::TransportError;
use crate::utils::{AjaxError, Result};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::Notify;

/// Partial-page engine of one page
#[derive(Clone)]
pub struct AjaxEngine {
    inner: Rc<EngineInner>,
}

struct EngineInner {
    state: RefCell<EngineState>,
    broadcaster: RefCell<Broadcaster>,
    /// Signalled when the engine may have become idle
    idle: Notify,
    /// Signalled by `cleanup` to stop waiting on the running exchange
    cancelled: Notify,
}

struct EngineState {
    page: Page,
    config: EngineConfig,
    transports: TransportSet,
    queue: RequestQueue<AjaxRequest>,
    /// Bumped on every enqueue; a delayed request only fires if unchanged
    delay_generation: u64,
    delay_pending: bool,
    /// Bumped by `cleanup`; drivers of an older epoch stop
    epoch: u64,
    /// Handle of the exchange in flight, tagged with its epoch
    current: Option<(u64, ExchangeHandle)>,
}

/// How the transport finished
enum Outcome {
    Response(HttpResponse),
    Failed(String),
    TimedOut,
}

impl AjaxEngine {
    /// Engine with the reqwest-backed transports
    pub fn new(page: Page, config: EngineConfig) -> Result<Self> {
        Ok(Self::with_transports(page, config, TransportSet::standard()?))
    }

    /// Engine with caller-supplied transports
    pub fn with_transports(page: Page, config: EngineConfig, transports: TransportSet) -> Self {
        let broadcaster = Broadcaster::new(config.project_stage);
        Self {
            inner: Rc::new(EngineInner {
                state: RefCell::new(EngineState {
                    page,
                    config,
                    transports,
                    queue: RequestQueue::new(),
                    delay_generation: 0,
                    delay_pending: false,
                    epoch: 0,
                    current: None,
                }),
                broadcaster: RefCell::new(broadcaster),
                idle: Notify::new(),
                cancelled: Notify::new(),
            }),
        }
    }

    /// Submit a partial request triggered by the element `source_id`.
    ///
    /// Configuration errors (unknown source or form, file input in a
    /// non-multipart form, unknown transport) are returned here, before
    /// any network I/O, and are also broadcast.
    pub fn submit(&self, source_id: &str, event_type: Option<&str>, options: SubmitOptions) -> Result<()> {
        let context = AjaxContext::new(source_id)
            .with_callbacks(options.on_event.clone(), options.on_error.clone());
        let prepared = {
            let state = self.inner.state.borrow();
            AjaxRequest::prepare(state.page.dom(), &state.config, context.clone(), event_type, options)
        };
        let request = match prepared {
            Ok(request) => request,
            Err(error) => {
                self.inner.report_error(&context, &error, None);
                return Err(error);
            }
        };

        match request.delay() {
            Some(delay) => EngineInner::schedule(&self.inner, request, delay),
            None => {
                self.inner.cancel_delayed();
                EngineInner::enqueue(&self.inner, request);
            }
        }
        Ok(())
    }

    /// Interpret a response for `context` and notify listeners
    pub fn apply_response(&self, response: &HttpResponse, context: &mut AjaxContext) -> Result<()> {
        self.inner.apply(response, context)
    }

    pub fn on_event(&self, listener: impl Fn(&AjaxEvent) + 'static) -> ListenerId {
        self.inner.broadcaster.borrow_mut().add_event_listener(Rc::new(listener))
    }

    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.inner.broadcaster.borrow_mut().remove_event_listener(id)
    }

    pub fn on_error(&self, listener: impl Fn(&AjaxErrorData) + 'static) -> ListenerId {
        self.inner.broadcaster.borrow_mut().add_error_listener(Rc::new(listener))
    }

    pub fn remove_error_listener(&self, id: ListenerId) -> bool {
        self.inner.broadcaster.borrow_mut().remove_error_listener(id)
    }

    /// Replace the sink receiving unhandled errors in development stages
    pub fn set_diagnostic_sink(&self, sink: Rc<dyn DiagnosticSink>) {
        self.inner.broadcaster.borrow_mut().set_sink(sink);
    }

    /// Url-encoded fields of a form, as a full submit would send them
    pub fn serialize_form(&self, form_id: &str) -> Result<String> {
        let state = self.inner.state.borrow();
        let dom = state.page.dom();
        let form = dom
            .element_by_id(form_id)
            .filter(|&node| dom.tag_name(node).as_deref() == Some("form"))
            .ok_or_else(|| AjaxError::Configuration(format!("form '{}' not found", form_id)))?;
        Ok(codec::serialize_form(dom, form))
    }

    /// Access the page. `f` must not call back into the engine.
    pub fn with_page<R>(&self, f: impl FnOnce(&mut Page) -> R) -> R {
        f(&mut self.inner.state.borrow_mut().page)
    }

    /// Requests waiting behind the one in flight
    pub fn queue_len(&self) -> usize {
        self.inner.state.borrow().queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.inner.state.borrow().is_idle()
    }

    /// Resolve once nothing is in flight, queued or delayed
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Abort the running exchange and drop every waiting or delayed request
    pub fn cleanup(&self) {
        let (dropped, current) = {
            let mut state = self.inner.state.borrow_mut();
            state.epoch += 1;
            state.delay_generation += 1;
            state.delay_pending = false;
            (state.queue.cleanup(), state.current.take())
        };
        if let Some((_, handle)) = current {
            handle.abort();
        }
        log::debug!("cleanup dropped {} queued request(s)", dropped.len());
        self.inner.cancelled.notify_waiters();
        self.inner.idle.notify_waiters();
    }
}

impl EngineState {
    fn is_idle(&self) -> bool {
        self.queue.is_idle() && !self.delay_pending
    }
}

impl EngineInner {
    fn is_current(&self, epoch: u64) -> bool {
        self.state.borrow().epoch == epoch
    }

    fn send_event(&self, context: &AjaxContext, event: AjaxEvent) {
        // listeners may register listeners
        let broadcaster = self.broadcaster.borrow().clone();
        broadcaster.send_event(context, &event);
    }

    fn report_error(&self, context: &AjaxContext, error: &AjaxError, response: Option<&HttpResponse>) {
        let data = AjaxErrorData::from_error(error, &context.source, response);
        let broadcaster = self.broadcaster.borrow().clone();
        broadcaster.send_error(context, &data);
    }

    fn cancel_delayed(&self) {
        let mut state = self.state.borrow_mut();
        state.delay_generation += 1;
        state.delay_pending = false;
    }

    fn schedule(inner: &Rc<Self>, request: AjaxRequest, delay: Duration) {
        let generation = {
            let mut state = inner.state.borrow_mut();
            state.delay_generation += 1;
            state.delay_pending = true;
            state.delay_generation
        };
        log::debug!("delaying request from {} by {:?}", request.context.source, delay);
        let inner = Rc::clone(inner);
        tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            {
                let mut state = inner.state.borrow_mut();
                if state.delay_generation != generation {
                    log::debug!("delayed request from {} superseded", request.context.source);
                    return;
                }
                state.delay_pending = false;
            }
            Self::enqueue(&inner, request);
        });
    }

    fn enqueue(inner: &Rc<Self>, request: AjaxRequest) {
        let queue_size = request.queue_size();
        let source = request.context.source.clone();
        let (admission, epoch) = {
            let mut state = inner.state.borrow_mut();
            (state.queue.enqueue(request, queue_size), state.epoch)
        };
        match admission {
            Admission::SendNow(request) => {
                tokio::task::spawn_local(Self::drive(Rc::clone(inner), request, epoch));
            }
            Admission::Queued { evicted } => {
                log::debug!("request from {} queued", source);
                for dropped in evicted {
                    log::debug!("queue bound reached, dropped request from {}", dropped.context.source);
                }
            }
        }
    }

    /// Send requests one at a time until the queue is empty
    async fn drive(inner: Rc<Self>, first: AjaxRequest, epoch: u64) {
        let mut next = Some(first);
        while let Some(request) = next {
            if inner.state.borrow().epoch != epoch {
                log::debug!("request from {} dropped by cleanup", request.context.source);
                break;
            }
            let fatal = Self::exchange(&inner, request, epoch).await;
            let mut state = inner.state.borrow_mut();
            if state.epoch != epoch {
                log::debug!("engine was cleaned up, driver stops");
                break;
            }
            next = if fatal {
                let dropped = state.queue.cleanup();
                if !dropped.is_empty() {
                    log::warn!("client error, dropped {} queued request(s)", dropped.len());
                }
                None
            } else {
                state.queue.process_next()
            };
        }
        inner.idle.notify_waiters();
    }

    /// Run one exchange; returns whether the failure is fatal for the queue
    async fn exchange(inner: &Rc<Self>, request: AjaxRequest, epoch: u64) -> bool {
        let encoded = {
            let mut guard = inner.state.borrow_mut();
            let state = &mut *guard;
            request.encode(state.page.dom_mut(), &state.config)
        };
        let (http, window_guard) = match encoded {
            Ok(parts) => parts,
            Err(error) => {
                inner.report_error(&request.context, &error, None);
                return true;
            }
        };

        let kind = request.transport_kind();
        let transport = inner.state.borrow().transports.get(kind);
        let Some(transport) = transport else {
            window_guard.restore(inner.state.borrow_mut().page.dom_mut());
            let error: AjaxError = TransportError::Unsupported(kind.as_str()).into();
            inner.report_error(&request.context, &error, None);
            return false;
        };

        inner.send_event(
            &request.context,
            AjaxEvent::new(EventStatus::Begin, &request.context.source),
        );
        // a begin listener may have cleaned up the engine
        if !inner.is_current(epoch) {
            window_guard.restore(inner.state.borrow_mut().page.dom_mut());
            log::debug!("exchange from {} cancelled before sending", request.context.source);
            return false;
        }
        log::debug!("sending {} for form {} via {}", http.url(), request.form_id(), kind);

        let (sink, mut events) = LifecycleSink::channel();
        let handle = transport.send(http, sink);
        inner.state.borrow_mut().current = Some((epoch, handle));

        let mut outcome = None;
        loop {
            let cancelled = inner.cancelled.notified();
            if !inner.is_current(epoch) {
                break;
            }
            let event = tokio::select! {
                event = events.recv() => event,
                _ = cancelled => None,
            };
            match event {
                Some(TransportEvent::LoadStart) => log::trace!("load start"),
                Some(TransportEvent::Progress { loaded, total }) => {
                    log::trace!("progress {}/{:?}", loaded, total)
                }
                Some(TransportEvent::Error(message)) => outcome = Some(Outcome::Failed(message)),
                Some(TransportEvent::Load(response)) => outcome = Some(Outcome::Response(response)),
                Some(TransportEvent::Timeout) => outcome = Some(Outcome::TimedOut),
                Some(TransportEvent::LoadEnd) | None => break,
            }
        }

        let aborted = {
            let mut state = inner.state.borrow_mut();
            let handle = match state.current.take() {
                Some((owner, handle)) if owner == epoch => Some(handle),
                other => {
                    state.current = other;
                    None
                }
            };
            state.epoch != epoch || handle.is_none_or(|handle| handle.is_aborted())
        };
        window_guard.restore(inner.state.borrow_mut().page.dom_mut());
        if aborted {
            log::debug!("exchange from {} aborted", request.context.source);
            return false;
        }

        let timeout = request.timeout().unwrap_or_default();
        let mut context = request.context;
        let complete = AjaxEvent::new(EventStatus::Complete, &context.source);
        match outcome {
            Some(Outcome::Response(response)) => {
                log::debug!(
                    "response {} for {} ({})",
                    response.status(),
                    context.source,
                    response.header("content-type").unwrap_or("no content type")
                );
                inner.send_event(&context, complete.with_response(&response));
                if response.is_success() {
                    // errors are broadcast by apply
                    let _ = inner.apply(&response, &mut context);
                } else {
                    let error: AjaxError =
                        TransportError::Http(response.status(), response.status_text().to_string()).into();
                    inner.report_error(&context, &error, Some(&response));
                }
            }
            Some(Outcome::Failed(message)) => {
                inner.send_event(&context, complete);
                inner.report_error(&context, &AjaxError::from(TransportError::Network(message)), None);
            }
            Some(Outcome::TimedOut) => {
                inner.send_event(&context, complete);
                inner.report_error(&context, &AjaxError::Timeout(timeout), None);
            }
            None => {
                inner.send_event(&context, complete);
                inner.report_error(&context, &AjaxError::from(TransportError::ConnectionClosed), None);
            }
        }
        false
    }

    fn apply(&self, response: &HttpResponse, context: &mut AjaxContext) -> Result<()> {
        let result = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            let (dom, scripts) = state.page.parts_mut();
            ResponseInterpreter::new(dom, scripts, &state.config).process(response.body(), context)
        };
        match &result {
            Ok(()) => self.send_event(
                context,
                AjaxEvent::new(EventStatus::Success, &context.source).with_response(response),
            ),
            Err(error) => self.report_error(context, error, Some(response)),
        }
        result
    }
}
