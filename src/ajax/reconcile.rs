//! Session state reconciliation
//!
//! After all commands of a response ran, the captured view state and
//! client window id are written into the hidden fields of every touched
//! form, creating the field where it is missing.

use super::context::ExchangeState;
use super::protocol::{CLIENT_WINDOW, VIEW_STATE};
use crate::dom::{DomPatchSurface, NodeId};
use crate::engine::EngineConfig;
use crate::utils::Result;
use std::collections::BTreeSet;

/// Forms that receive the tokens
pub fn target_forms(
    dom: &dyn DomPatchSurface,
    state: &ExchangeState,
    no_isolated_windows: bool,
) -> Vec<NodeId> {
    if no_isolated_windows {
        return dom.forms();
    }
    let mut forms: BTreeSet<NodeId> = state.touched_forms.clone();
    for &element in &state.touched_elements {
        if dom.tag_name(element).as_deref() == Some("form") {
            forms.insert(element);
        }
        forms.extend(dom.find_by_tag(element, "form"));
    }
    forms.into_iter().filter(|&form| dom.is_connected(form)).collect()
}

/// Write the pending tokens of `state` into their forms. Does nothing when
/// the response carried no token.
pub fn reconcile(dom: &mut dyn DomPatchSurface, state: &ExchangeState, config: &EngineConfig) -> Result<()> {
    if !state.has_pending_tokens() {
        return Ok(());
    }
    let forms = target_forms(dom, state, config.no_isolated_windows);
    log::debug!("reconciling session state into {} form(s)", forms.len());
    for form in forms {
        if let Some(view_state) = &state.pending_view_state {
            write_field(dom, form, VIEW_STATE, view_state, config.separator)?;
        }
        if let Some(window) = &state.pending_client_window {
            write_field(dom, form, CLIENT_WINDOW, window, config.separator)?;
        }
    }
    Ok(())
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Set the value of the hidden field `name` of `form`, appending one when
/// the form has none
fn write_field(
    dom: &mut dyn DomPatchSurface,
    form: NodeId,
    name: &str,
    value: &str,
    separator: char,
) -> Result<()> {
    let existing = dom
        .find_by_tag(form, "input")
        .into_iter()
        .find(|&input| dom.attribute(input, "name").as_deref() == Some(name));
    if let Some(field) = existing {
        return dom.set_attribute(field, "value", value);
    }

    let id = match dom.attribute(form, "id") {
        Some(form_id) => format!("{form_id}{separator}{name}{separator}0"),
        None => format!("{name}{separator}0"),
    };
    let markup = format!(
        r#"<input type="hidden" name="{}" id="{}" value="{}" autocomplete="off">"#,
        name,
        escape_attribute(&id),
        escape_attribute(value)
    );
    dom.append_markup(form, &markup)?;
    Ok(())
}
