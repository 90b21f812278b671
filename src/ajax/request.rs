//! One outgoing partial-page exchange
//!
//! [`AjaxRequest::prepare`] runs every check that can fail before I/O when
//! `submit` is called; [`AjaxRequest::encode`] serializes the form when the
//! request actually leaves the queue, so queued requests pick up the view
//! state written by the responses before them.

use super::codec::{self, ClientWindowGuard, EncodeOptions};
use super::context::AjaxContext;
use super::ids::{IdList, execute_ids, render_ids};
use super::options::SubmitOptions;
use super::protocol::*;
use crate::dom::{DomPatchSurface, NodeId};
use crate::engine::EngineConfig;
use crate::network::{
    HttpRequest, RequestBody, TransportKind, select_transport,
};
use crate::utils::{AjaxError, Result};
use std::time::Duration;
use url::Url;

/// A prepared request waiting to be sent
#[derive(Debug)]
pub struct AjaxRequest {
    pub context: AjaxContext,
    event_type: Option<String>,
    execute: IdList,
    render: IdList,
    form_id: String,
    multipart: bool,
    transport: TransportKind,
    timeout: Option<Duration>,
    delay: Option<Duration>,
    queue_size: Option<usize>,
    reset_values: bool,
    client_window: Option<String>,
    behavior_event: Option<String>,
    partial_page_submit: bool,
    params: Vec<(String, String)>,
}

fn configuration(message: String) -> AjaxError {
    AjaxError::Configuration(message)
}

/// Form of the source: enclosing form, else the named one, else the only
/// form of the page
fn resolve_form(
    dom: &dyn DomPatchSurface,
    source: NodeId,
    source_id: &str,
    explicit: Option<&str>,
) -> Result<NodeId> {
    if let Some(form) = dom.enclosing_form(source) {
        return Ok(form);
    }
    if let Some(form_id) = explicit {
        return dom
            .element_by_id(form_id)
            .filter(|&n| dom.tag_name(n).as_deref() == Some("form"))
            .ok_or_else(|| configuration(format!("form '{}' not found", form_id)));
    }
    match dom.forms().as_slice() {
        [only] => Ok(*only),
        [] => Err(configuration(format!("no form found for source '{}'", source_id))),
        _ => Err(configuration(format!(
            "source '{}' is outside any form and the page has several",
            source_id
        ))),
    }
}

impl AjaxRequest {
    /// Validate a submit call against the current page
    pub fn prepare(
        dom: &dyn DomPatchSurface,
        config: &EngineConfig,
        context: AjaxContext,
        event_type: Option<&str>,
        options: SubmitOptions,
    ) -> Result<Self> {
        let source_id = context.source.clone();
        let source = dom
            .element_by_id(&source_id)
            .ok_or_else(|| configuration(format!("source element '{}' not found", source_id)))?;
        let form = resolve_form(dom, source, &source_id, options.form.as_deref())?;
        let form_id = dom
            .attribute(form, "id")
            .filter(|id| !id.is_empty())
            .ok_or_else(|| configuration("the source form has no id".to_string()))?;

        let execute = execute_ids(options.execute.as_deref(), &source_id, Some(&form_id));
        let render = render_ids(options.render.as_deref(), &source_id, Some(&form_id));

        let execute_roots: Vec<NodeId> = match &execute {
            IdList::None => Vec::new(),
            IdList::All => vec![form],
            IdList::Ids(ids) => ids.iter().filter_map(|id| dom.element_by_id(id)).collect(),
        };
        let has_files = codec::contains_file_input(dom, &execute_roots);
        if has_files && !codec::is_multipart_form(dom, form) {
            return Err(configuration(format!(
                "execute of '{}' contains a file input but form '{}' is not {}",
                source_id, form_id, ENCTYPE_MULTIPART
            )));
        }

        let override_kind = match options.transport.as_deref() {
            Some(name) => Some(name.parse::<TransportKind>()?),
            None => config.transport_override,
        };
        let transport = select_transport(has_files, config.capabilities, override_kind);

        let mut context = context.with_form(form_id.clone());
        context.internal.transport_kind = Some(transport);

        log::debug!(
            "prepared request from {} (form {}, transport {})",
            source_id,
            form_id,
            transport
        );

        Ok(Self {
            context,
            event_type: event_type.map(str::to_string),
            execute,
            render,
            form_id,
            multipart: has_files,
            transport,
            timeout: options.timeout.or(config.timeout).filter(|t| !t.is_zero()),
            delay: options.delay.or(config.delay).filter(|d| !d.is_zero()),
            queue_size: options.queue_size.or(config.queue_size),
            reset_values: options.reset_values,
            client_window: options.client_window,
            behavior_event: options.behavior_event,
            partial_page_submit: options
                .partial_page_submit
                .unwrap_or(config.partial_page_submit),
            params: options.params,
        })
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }

    pub fn queue_size(&self) -> Option<usize> {
        self.queue_size
    }

    pub fn form_id(&self) -> &str {
        &self.form_id
    }

    /// Post target: encoded URL field, else form action, else page location
    fn target_url(&self, dom: &dyn DomPatchSurface, form: NodeId, config: &EngineConfig) -> Result<String> {
        let encoded = codec::controls(dom, form)
            .into_iter()
            .find(|&n| dom.attribute(n, "name").as_deref() == Some(ENCODED_URL))
            .and_then(|n| dom.attribute(n, "value"));
        let location = dom.location();
        let raw = encoded
            .or_else(|| dom.attribute(form, "action"))
            .filter(|url| !url.trim().is_empty())
            .or_else(|| location.clone())
            .ok_or_else(|| configuration("no target URL: form has no action and page no location".to_string()))?;

        let base = config.base_url.clone().or(location);
        let resolved = match Url::parse(raw.trim()) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = base
                    .ok_or_else(|| configuration(format!("relative target '{}' without base URL", raw)))?;
                Url::parse(&base)
                    .and_then(|base| base.join(raw.trim()))
                    .map_err(|e| configuration(format!("cannot resolve '{}': {}", raw, e)))?
            }
            Err(e) => return Err(configuration(format!("invalid target '{}': {}", raw, e))),
        };
        Ok(resolved.to_string())
    }

    /// Serialize the form and build the HTTP request. The returned guard
    /// must be restored once the exchange is over.
    pub fn encode(
        &self,
        dom: &mut dyn DomPatchSurface,
        config: &EngineConfig,
    ) -> Result<(HttpRequest, ClientWindowGuard)> {
        let form = dom
            .element_by_id(&self.form_id)
            .ok_or_else(|| configuration(format!("form '{}' is no longer in the document", self.form_id)))?;
        let url = self.target_url(dom, form, config)?;
        let mut http = HttpRequest::post(url)?
            .header(HEADER_FACES_REQUEST, FACES_REQUEST_PARTIAL)
            .timeout(self.timeout);

        let guard = match &self.client_window {
            Some(_) => ClientWindowGuard::engage(dom, form),
            None => ClientWindowGuard::none(),
        };

        let dom: &dyn DomPatchSurface = dom;
        let pps_roots: Vec<NodeId> = self
            .execute
            .ids()
            .iter()
            .filter_map(|id| dom.element_by_id(id))
            .collect();
        let pps = self.partial_page_submit && matches!(self.execute, IdList::Ids(_));
        let mut data = codec::encode_form(
            dom,
            form,
            EncodeOptions {
                files: self.multipart,
                only_within: pps.then_some(pps_roots.as_slice()),
            },
        );
        if let Some(source) = dom.element_by_id(&self.context.source) {
            codec::append_issuing_button(dom, source, &mut data);
        }

        data.append(PARAM_SOURCE, self.context.source.clone());
        data.append(PARAM_PARTIAL_AJAX, "true");
        if let Some(execute) = self.execute.to_wire() {
            data.append(PARAM_EXECUTE, execute);
        }
        if let Some(render) = self.render.to_wire() {
            data.append(PARAM_RENDER, render);
        }
        if let Some(event) = &self.event_type {
            data.append(PARAM_EVENT, event.clone());
        }
        if let Some(behavior) = &self.behavior_event {
            data.append(PARAM_BEHAVIOR_EVENT, behavior.clone());
        }
        if self.reset_values {
            data.append(PARAM_RESET_VALUES, "true");
        }
        if let Some(window) = &self.client_window {
            data.append(CLIENT_WINDOW, window.clone());
        }
        for (name, value) in &self.params {
            if is_reserved_param(name) {
                log::warn!("pass-through parameter '{}' is reserved, ignoring it", name);
                continue;
            }
            data.append(name.clone(), value.clone());
        }

        http = if self.multipart {
            http.body(RequestBody::Multipart(data))
        } else {
            http.header("Content-Type", CONTENT_TYPE_URLENCODED)
                .body(RequestBody::UrlEncoded(data.to_urlencoded()))
        };
        Ok((http, guard))
    }
}
