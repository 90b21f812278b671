//! Partial-page protocol: request building, queueing and response handling

pub mod codec;
mod context;
pub mod events;
pub mod ids;
mod interpreter;
mod options;
pub mod protocol;
mod queue;
pub mod reconcile;
mod request;
pub mod response;

pub use context::{AjaxContext, ErrorCallback, EventCallback, ExchangeState};
pub use events::{
    AjaxErrorData, AjaxEvent, Broadcaster, DiagnosticSink, EventStatus, ListenerId, ListenerQueue,
    LogSink,
};
pub use ids::{IdList, normalize_ids};
pub use interpreter::ResponseInterpreter;
pub use options::SubmitOptions;
pub use queue::{Admission, RequestQueue};
pub use request::AjaxRequest;
pub use response::{Command, Directive, Relation, ResponseDocument};
