//! Engine configuration

use crate::network::{NativeLevel, TransportCapabilities, TransportKind};
use crate::utils::{AjaxError, Result};
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;

/// Application stage; decides whether unhandled errors are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectStage {
    #[default]
    Production,
    Development,
    UnitTest,
    SystemTest,
}

impl ProjectStage {
    pub fn is_development_like(&self) -> bool {
        matches!(self, Self::Development | Self::UnitTest)
    }
}

impl FromStr for ProjectStage {
    type Err = AjaxError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Production" => Ok(Self::Production),
            "Development" => Ok(Self::Development),
            "UnitTest" => Ok(Self::UnitTest),
            "SystemTest" => Ok(Self::SystemTest),
            other => Err(AjaxError::Configuration(format!("unknown project stage '{}'", other))),
        }
    }
}

/// Page-wide engine settings
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub project_stage: ProjectStage,
    /// Write session tokens into every form instead of the touched ones
    pub no_isolated_windows: bool,
    /// Keep focus and caret across body replacement
    pub preserve_focus: bool,
    /// Default request timeout, `None` for no timeout
    pub timeout: Option<Duration>,
    /// Default delay before a request is queued
    pub delay: Option<Duration>,
    /// Default queue bound
    pub queue_size: Option<usize>,
    pub transport_override: Option<TransportKind>,
    pub capabilities: TransportCapabilities,
    /// Send only the fields inside execute elements
    pub partial_page_submit: bool,
    /// Separator of generated ids (`form:javax.faces.ViewState:0`)
    pub separator: char,
    /// Base for relative request targets, defaults to the page location
    pub base_url: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            project_stage: ProjectStage::Production,
            no_isolated_windows: false,
            preserve_focus: true,
            timeout: None,
            delay: None,
            queue_size: None,
            transport_override: None,
            capabilities: TransportCapabilities::default(),
            partial_page_submit: false,
            separator: ':',
            base_url: None,
        }
    }
}

impl EngineConfig {
    pub fn with_project_stage(mut self, stage: ProjectStage) -> Self {
        self.project_stage = stage;
        self
    }

    pub fn with_no_isolated_windows(mut self, enabled: bool) -> Self {
        self.no_isolated_windows = enabled;
        self
    }

    pub fn with_preserve_focus(mut self, enabled: bool) -> Self {
        self.preserve_focus = enabled;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_queue_size(mut self, size: usize) -> Self {
        self.queue_size = Some(size);
        self
    }

    pub fn with_transport(mut self, kind: TransportKind) -> Self {
        self.transport_override = Some(kind);
        self
    }

    pub fn with_capabilities(mut self, capabilities: TransportCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_partial_page_submit(mut self, enabled: bool) -> Self {
        self.partial_page_submit = enabled;
        self
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Read settings from a JSON object. Missing keys keep their defaults;
    /// durations are milliseconds.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| AjaxError::Configuration(format!("invalid config JSON: {}", e)))?;
        let Value::Object(map) = value else {
            return Err(AjaxError::Configuration("config must be a JSON object".to_string()));
        };

        let mut config = Self::default();
        for (key, value) in &map {
            match key.as_str() {
                "projectStage" => config.project_stage = string(key, value)?.parse()?,
                "timeout" => config.timeout = millis(key, value)?,
                "delay" => config.delay = millis(key, value)?,
                "queueSize" => {
                    // negative means unbounded
                    config.queue_size = match value.as_i64() {
                        Some(size) if size >= 0 => Some(size as usize),
                        Some(_) => None,
                        None => return Err(type_error(key, "an integer")),
                    }
                }
                "transportType" => {
                    config.transport_override = Some(string(key, value)?.parse()?)
                }
                "noIsolatedWindows" => config.no_isolated_windows = boolean(key, value)?,
                "preserveFocus" => config.preserve_focus = boolean(key, value)?,
                "pps" => config.partial_page_submit = boolean(key, value)?,
                "baseUrl" => config.base_url = Some(string(key, value)?.to_string()),
                "separator" => {
                    let text = string(key, value)?;
                    let mut chars = text.chars();
                    config.separator = match (chars.next(), chars.next()) {
                        (Some(c), None) => c,
                        _ => return Err(type_error(key, "a single character")),
                    };
                }
                "capabilities" => config.capabilities = capabilities(value)?,
                other => log::warn!("ignoring unknown config key '{}'", other),
            }
        }
        Ok(config)
    }
}

fn type_error(key: &str, expected: &str) -> AjaxError {
    AjaxError::Configuration(format!("config key '{}' must be {}", key, expected))
}

fn string<'a>(key: &str, value: &'a Value) -> Result<&'a str> {
    value.as_str().ok_or_else(|| type_error(key, "a string"))
}

fn boolean(key: &str, value: &Value) -> Result<bool> {
    value.as_bool().ok_or_else(|| type_error(key, "a boolean"))
}

fn millis(key: &str, value: &Value) -> Result<Option<Duration>> {
    match value.as_u64() {
        Some(0) => Ok(None),
        Some(ms) => Ok(Some(Duration::from_millis(ms))),
        None => Err(type_error(key, "a non-negative integer")),
    }
}

fn capabilities(value: &Value) -> Result<TransportCapabilities> {
    let mut caps = TransportCapabilities::default();
    if let Some(level) = value.get("level") {
        caps.level = match level.as_str() {
            Some("level2") => NativeLevel::Level2,
            Some("level1") => NativeLevel::Level1,
            Some("none") => NativeLevel::Unavailable,
            _ => return Err(type_error("capabilities.level", "level2, level1 or none")),
        };
    }
    if let Some(multipart) = value.get("multipart") {
        caps.multipart = boolean("capabilities.multipart", multipart)?;
    }
    Ok(caps)
}
