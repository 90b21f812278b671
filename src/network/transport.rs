//! Transport abstraction shared by the three network backends
//!
//! Every backend reports the same lifecycle through a [`LifecycleSink`]:
//! `LoadStart`, zero or more `Progress`, exactly one of `Load`, `Error` or
//! `Timeout`, and finally `LoadEnd`. Request code never needs to know which
//! backend carried the exchange.

use super::{HttpRequest, HttpResponse};
use crate::utils::AjaxError;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Available transport variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Native asynchronous request with timeout and progress support
    DirectAsync,
    /// Level-1 style request without native timeout
    LegacyAsync,
    /// Form submit into a hidden frame
    HiddenFrame,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectAsync => "direct-async",
            Self::LegacyAsync => "legacy-async",
            Self::HiddenFrame => "hidden-frame",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = AjaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "direct-async" | "xhrPost" | "xhrQueuedPost" => Ok(Self::DirectAsync),
            "legacy-async" | "xhr1Post" | "xhr1QueuedPost" => Ok(Self::LegacyAsync),
            "hidden-frame" | "multipartPost" | "multipartQueuedPost" => Ok(Self::HiddenFrame),
            other => Err(AjaxError::Configuration(format!(
                "unsupported transport '{}'",
                other
            ))),
        }
    }
}

/// Native request support level of the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeLevel {
    /// No native asynchronous requests
    Unavailable,
    /// Basic requests without timeout/progress
    Level1,
    /// Requests with timeout, progress and binary bodies
    Level2,
}

/// Host request capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportCapabilities {
    pub level: NativeLevel,
    /// Native requests can carry multipart bodies
    pub multipart: bool,
}

impl Default for TransportCapabilities {
    fn default() -> Self {
        Self {
            level: NativeLevel::Level2,
            multipart: true,
        }
    }
}

/// Pick the transport for an exchange.
///
/// The override always wins. Multipart payloads prefer native level-2
/// requests and otherwise fall back to the hidden frame; plain payloads
/// use native level-2 requests, degrading to the legacy wrapper.
pub fn select_transport(
    multipart: bool,
    capabilities: TransportCapabilities,
    override_kind: Option<TransportKind>,
) -> TransportKind {
    if let Some(kind) = override_kind {
        return kind;
    }
    if multipart {
        if capabilities.level == NativeLevel::Level2 && capabilities.multipart {
            TransportKind::DirectAsync
        } else {
            TransportKind::HiddenFrame
        }
    } else {
        match capabilities.level {
            NativeLevel::Level2 => TransportKind::DirectAsync,
            NativeLevel::Level1 => TransportKind::LegacyAsync,
            NativeLevel::Unavailable => TransportKind::HiddenFrame,
        }
    }
}

/// Lifecycle notifications raised by a transport
#[derive(Debug, Clone)]
pub enum TransportEvent {
    LoadStart,
    Progress { loaded: u64, total: Option<u64> },
    Error(String),
    Load(HttpResponse),
    Timeout,
    LoadEnd,
}

/// Receiving end of an exchange's lifecycle
pub type LifecycleEvents = mpsc::UnboundedReceiver<TransportEvent>;

/// Sending end of an exchange's lifecycle.
///
/// Once aborted or detached, nothing more is delivered.
#[derive(Debug, Clone)]
pub struct LifecycleSink {
    sender: Option<mpsc::UnboundedSender<TransportEvent>>,
    aborted: Arc<AtomicBool>,
}

impl LifecycleSink {
    /// Create a connected sink/receiver pair
    pub fn channel() -> (Self, LifecycleEvents) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender: Some(sender),
                aborted: Arc::new(AtomicBool::new(false)),
            },
            receiver,
        )
    }

    fn emit(&self, event: TransportEvent) {
        if self.is_aborted() {
            log::trace!("suppressed {:?} after abort", event);
            return;
        }
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }

    pub fn load_start(&self) {
        self.emit(TransportEvent::LoadStart);
    }

    pub fn progress(&self, loaded: u64, total: Option<u64>) {
        self.emit(TransportEvent::Progress { loaded, total });
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(TransportEvent::Error(message.into()));
    }

    pub fn load(&self, response: HttpResponse) {
        self.emit(TransportEvent::Load(response));
    }

    pub fn timeout(&self) {
        self.emit(TransportEvent::Timeout);
    }

    pub fn load_end(&self) {
        self.emit(TransportEvent::LoadEnd);
    }

    /// Drop the listener; later notifications go nowhere
    pub fn detach(&mut self) {
        self.sender = None;
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    fn abort_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.aborted)
    }
}

/// Handle on a running exchange
#[derive(Debug)]
pub struct ExchangeHandle {
    aborted: Arc<AtomicBool>,
    task: Option<tokio::task::AbortHandle>,
}

impl ExchangeHandle {
    /// Handle whose abort cancels the backing task
    pub fn cancellable(sink: &LifecycleSink, task: tokio::task::AbortHandle) -> Self {
        Self {
            aborted: sink.abort_flag(),
            task: Some(task),
        }
    }

    /// Handle whose abort only suppresses further notifications
    pub fn flag_only(sink: &LifecycleSink) -> Self {
        Self {
            aborted: sink.abort_flag(),
            task: None,
        }
    }

    /// Best-effort cancellation
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
        if let Some(task) = &self.task {
            task.abort();
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

/// A network backend
pub trait Transport {
    /// Variant implemented by this backend
    fn kind(&self) -> TransportKind;

    /// Start the exchange; lifecycle notifications arrive through `sink`.
    /// Must be called from within a tokio runtime.
    fn send(&self, request: HttpRequest, sink: LifecycleSink) -> ExchangeHandle;
}

/// Registry of backends keyed by kind
#[derive(Clone, Default)]
pub struct TransportSet {
    transports: HashMap<TransportKind, Rc<dyn Transport>>,
}

impl TransportSet {
    /// Empty set, filled with [`TransportSet::register`]
    pub fn new() -> Self {
        Self::default()
    }

    /// The three reqwest-backed backends
    pub fn standard() -> crate::utils::Result<Self> {
        let mut set = Self::new();
        set.register(Rc::new(super::DirectAsyncTransport::new()?));
        set.register(Rc::new(super::LegacyAsyncTransport::new()));
        set.register(Rc::new(super::HiddenFrameTransport::new()?));
        Ok(set)
    }

    /// Register (or replace) the backend for its kind
    pub fn register(&mut self, transport: Rc<dyn Transport>) {
        self.transports.insert(transport.kind(), transport);
    }

    pub fn get(&self, kind: TransportKind) -> Option<Rc<dyn Transport>> {
        self.transports.get(&kind).cloned()
    }
}
