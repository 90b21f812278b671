//! Script execution for embedded `<script>` blocks and `eval` directives
//!
//! Backed by the Boa engine (pure Rust).

mod runtime;

pub use runtime::JsRuntime;

use crate::utils::Result;

/// Something able to run page scripts
pub trait ScriptEngine {
    /// Execute script code in the page's global scope
    fn execute(&mut self, code: &str) -> Result<JsValue>;
}

/// JavaScript value types
#[derive(Debug, Clone, PartialEq)]
pub enum JsValue {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Array(Vec<JsValue>),
    Object,
}
