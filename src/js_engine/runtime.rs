//! Boa-backed script runtime

use super::{JsValue, ScriptEngine};
use crate::utils::{Result, error::ScriptError};
use boa_engine::{Context, JsValue as BoaJsValue, Source};

/// Page script context. Globals persist between executions, so a
/// function defined by one embedded script is visible to the next.
pub struct JsRuntime {
    context: Context,
    executed: usize,
}

impl JsRuntime {
    pub fn new() -> Self {
        Self {
            context: Context::default(),
            executed: 0,
        }
    }

    /// Number of scripts executed so far
    pub fn executed(&self) -> usize {
        self.executed
    }

    /// Evaluate an expression, for inspecting page state
    pub fn eval(&mut self, expression: &str) -> Result<JsValue> {
        let value = self
            .context
            .eval(Source::from_bytes(expression))
            .map_err(|e| ScriptError::Execution(e.to_string()))?;
        Ok(convert(&value, &mut self.context))
    }

    fn run(&mut self, code: &str) -> Result<JsValue> {
        if code.trim().is_empty() {
            return Ok(JsValue::Undefined);
        }
        self.executed += 1;
        log::trace!("executing {} bytes of script", code.len());
        self.eval(code)
    }
}

impl Default for JsRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptEngine for JsRuntime {
    fn execute(&mut self, code: &str) -> Result<JsValue> {
        self.run(code)
    }
}

fn convert(value: &BoaJsValue, context: &mut Context) -> JsValue {
    if value.is_undefined() {
        return JsValue::Undefined;
    }
    if value.is_null() {
        return JsValue::Null;
    }
    if let Some(b) = value.as_boolean() {
        return JsValue::Boolean(b);
    }
    if let Some(n) = value.as_number() {
        return JsValue::Number(n);
    }
    if let Some(s) = value.as_string() {
        return JsValue::String(s.to_std_string_escaped());
    }
    let Ok(object) = value.to_object(context) else {
        return JsValue::Undefined;
    };
    if !object.is_array() {
        return JsValue::Object;
    }
    let length = object
        .get(boa_engine::js_string!("length"), context)
        .ok()
        .and_then(|len| len.as_number())
        .unwrap_or(0.0) as u32;
    let mut items = Vec::with_capacity(length as usize);
    for i in 0..length {
        if let Ok(item) = object.get(i, context) {
            items.push(convert(&item, context));
        }
    }
    JsValue::Array(items)
}
