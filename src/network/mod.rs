//! Network stack for partial-page exchanges
//!
//! Three interchangeable transports (direct async, legacy wrapper, hidden
//! frame) behind one [`Transport`] trait, selected by [`select_transport`].

mod direct;
mod frame;
mod legacy;
mod request;
mod response;
#[cfg(test)]
mod testing;
pub mod transport;

pub use direct::DirectAsyncTransport;
pub use frame::HiddenFrameTransport;
pub use legacy::LegacyAsyncTransport;
pub use request::{FileBlob, FormData, FormValue, HttpRequest, Method, RequestBody};
pub use response::HttpResponse;
pub use transport::{
    ExchangeHandle, LifecycleEvents, LifecycleSink, NativeLevel, Transport,
    TransportCapabilities, TransportEvent, TransportKind, TransportSet, select_transport,
};
