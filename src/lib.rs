//! # ppr-engine - Partial-Page AJAX Protocol Engine
//!
//! Submits partial-page requests and applies `partial-response` documents
//! to a live document, one request in flight at a time.
//!
//! ## Architecture
//!
//! - **engine**: per-page [`AjaxEngine`] wiring queue, transports and listeners
//! - **ajax**: request building, form codec, queue, response interpreter,
//!   session state reconciliation and event broadcast
//! - **network**: direct async, legacy and hidden-frame transports
//! - **dom**: the DOM patch surface and an html5ever-backed document
//! - **js_engine**: script execution on Boa
//! - **utils**: shared error types

pub mod ajax;
pub mod dom;
pub mod engine;
pub mod js_engine;
pub mod network;
pub mod utils;

// Re-export main types for convenience
pub use ajax::{AjaxContext, AjaxErrorData, AjaxEvent, EventStatus, SubmitOptions};
pub use engine::{AjaxEngine, EngineConfig, Page, ProjectStage};
pub use utils::error::{AjaxError, Result};

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = "ppr-engine";
