//! Form field codec
//!
//! Walks the controls of a form in document order and turns the
//! submittable ones into a [`FormData`] payload.

use super::protocol::{CLIENT_WINDOW, ENCTYPE_MULTIPART, VIEW_STATE};
use crate::dom::{DomPatchSurface, NodeId};
use crate::network::FormData;

/// Which fields of a form are encoded
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodeOptions<'a> {
    /// Encode file inputs as blobs (multipart), otherwise skip them
    pub files: bool,
    /// Only encode fields inside these elements, plus the session fields
    pub only_within: Option<&'a [NodeId]>,
}

/// Whether the form posts `multipart/form-data`
pub fn is_multipart_form(dom: &dyn DomPatchSurface, form: NodeId) -> bool {
    dom.attribute(form, "enctype")
        .is_some_and(|enctype| enctype.trim().eq_ignore_ascii_case(ENCTYPE_MULTIPART))
}

/// Form controls below `root` in document order (`root` included)
pub fn controls(dom: &dyn DomPatchSurface, root: NodeId) -> Vec<NodeId> {
    let mut found = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if matches!(
            dom.tag_name(node).as_deref(),
            Some("input" | "textarea" | "select" | "button")
        ) {
            found.push(node);
        }
        stack.extend(dom.children(node).into_iter().rev());
    }
    found
}

/// Whether any of `roots` is or contains a file input
pub fn contains_file_input(dom: &dyn DomPatchSurface, roots: &[NodeId]) -> bool {
    roots
        .iter()
        .flat_map(|&root| controls(dom, root))
        .any(|node| input_type(dom, node).as_deref() == Some("file"))
}

fn input_type(dom: &dyn DomPatchSurface, node: NodeId) -> Option<String> {
    match dom.tag_name(node).as_deref() {
        Some("input") => Some(
            dom.attribute(node, "type")
                .map(|t| t.to_ascii_lowercase())
                .unwrap_or_else(|| "text".to_string()),
        ),
        _ => None,
    }
}

fn is_session_field(name: &str) -> bool {
    name == VIEW_STATE || name == CLIENT_WINDOW
}

fn is_within(dom: &dyn DomPatchSurface, node: NodeId, roots: &[NodeId]) -> bool {
    let mut current = Some(node);
    while let Some(candidate) = current {
        if roots.contains(&candidate) {
            return true;
        }
        current = dom.parent(candidate);
    }
    false
}

/// Value of an `<option>`: its `value` attribute, else its collapsed text
fn option_value(dom: &dyn DomPatchSurface, option: NodeId) -> String {
    dom.attribute(option, "value").unwrap_or_else(|| {
        dom.text_content(option)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    })
}

fn encode_select(dom: &dyn DomPatchSurface, select: NodeId, name: &str, data: &mut FormData) {
    let options: Vec<NodeId> = dom
        .find_by_tag(select, "option")
        .into_iter()
        .filter(|&o| !dom.has_attribute(o, "disabled"))
        .collect();
    let selected: Vec<NodeId> = options
        .iter()
        .copied()
        .filter(|&o| dom.has_attribute(o, "selected"))
        .collect();

    if dom.has_attribute(select, "multiple") {
        for option in selected {
            data.append(name, option_value(dom, option));
        }
        return;
    }
    // single select: selectedIndex < 0 only when there is no option at all
    match selected.first().or(options.first()) {
        Some(&option) => data.append(name, option_value(dom, option)),
        None => log::trace!("select '{}' has no selectable option", name),
    }
}

/// Encode the submittable fields of `form`
pub fn encode_form(dom: &dyn DomPatchSurface, form: NodeId, options: EncodeOptions<'_>) -> FormData {
    let mut data = FormData::new();
    for node in controls(dom, form) {
        let Some(name) = dom.attribute(node, "name").filter(|n| !n.is_empty()) else {
            continue;
        };
        if dom.has_attribute(node, "disabled") {
            continue;
        }
        if let Some(roots) = options.only_within {
            if !is_session_field(&name) && !is_within(dom, node, roots) {
                continue;
            }
        }

        match dom.tag_name(node).as_deref() {
            Some("textarea") => data.append(name, dom.text_content(node)),
            Some("select") => encode_select(dom, node, &name, &mut data),
            Some("input") => {
                let kind = input_type(dom, node).unwrap_or_default();
                match kind.as_str() {
                    "submit" | "button" | "reset" | "image" => {}
                    "checkbox" | "radio" => {
                        if dom.has_attribute(node, "checked") {
                            let value = dom.attribute(node, "value").unwrap_or_else(|| "on".to_string());
                            data.append(name, value);
                        }
                    }
                    "file" => {
                        if options.files {
                            for blob in dom.files(node) {
                                data.append_file(name.clone(), blob);
                            }
                        }
                    }
                    _ => data.append(name, dom.attribute(node, "value").unwrap_or_default()),
                }
            }
            // buttons are only sent as the issuing element
            _ => {}
        }
    }
    data
}

/// `application/x-www-form-urlencoded` rendering of a form's fields
pub fn serialize_form(dom: &dyn DomPatchSurface, form: NodeId) -> String {
    encode_form(dom, form, EncodeOptions::default()).to_urlencoded()
}

/// Append `name=value` of the element that issued the request when it is
/// a submit-style control
pub fn append_issuing_button(dom: &dyn DomPatchSurface, source: NodeId, data: &mut FormData) {
    let is_button = match dom.tag_name(source).as_deref() {
        Some("button") => true,
        Some("input") => matches!(
            input_type(dom, source).as_deref(),
            Some("submit" | "button" | "image")
        ),
        _ => false,
    };
    if !is_button {
        return;
    }
    if let Some(name) = dom.attribute(source, "name").filter(|n| !n.is_empty()) {
        if !data.contains(&name) {
            let value = dom.attribute(source, "value").unwrap_or_default();
            data.append(name, value);
        }
    }
}

/// Disabled client window fields of a form, re-enabled after the exchange
#[derive(Debug, Default)]
#[must_use = "the client window field stays disabled until restored"]
pub struct ClientWindowGuard {
    disabled: Vec<NodeId>,
}

impl ClientWindowGuard {
    /// Disable the enabled client window fields of `form`
    pub fn engage(dom: &mut dyn DomPatchSurface, form: NodeId) -> Self {
        let targets: Vec<NodeId> = controls(dom, form)
            .into_iter()
            .filter(|&node| dom.attribute(node, "name").as_deref() == Some(CLIENT_WINDOW))
            .filter(|&node| !dom.has_attribute(node, "disabled"))
            .collect();
        let mut disabled = Vec::with_capacity(targets.len());
        for node in targets {
            match dom.set_attribute(node, "disabled", "disabled") {
                Ok(()) => disabled.push(node),
                Err(e) => log::warn!("could not disable client window field {}: {}", node, e),
            }
        }
        Self { disabled }
    }

    /// Guard that restores nothing
    pub fn none() -> Self {
        Self::default()
    }

    pub fn restore(self, dom: &mut dyn DomPatchSurface) {
        for node in self.disabled {
            if let Err(e) = dom.remove_attribute(node, "disabled") {
                log::debug!("client window field {} not restored: {}", node, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ArenaDocument;
    use crate::network::{FileBlob, FormValue};
    use pretty_assertions::assert_eq;

    const FORM: &str = r#"<html><body><form id="f">
        <input type="text" name="user" value="ann">
        <input type="text" value="no-name">
        <input type="text" name="off" value="x" disabled>
        <input type="checkbox" name="agree" checked>
        <input type="checkbox" name="news" value="yes">
        <input type="radio" name="color" value="red">
        <input type="radio" name="color" value="blue" checked>
        <textarea name="bio">hello
world</textarea>
        <select name="one"><option value="a">A</option><option selected>  B  item </option></select>
        <select name="many" multiple><option value="1" selected>1</option><option value="2">2</option><option value="3" selected>3</option></select>
        <select name="empty"></select>
        <input type="submit" name="go" value="Go">
        <input type="hidden" name="javax.faces.ViewState" value="VS1">
        </form></body></html>"#;

    fn text_pairs(data: &FormData) -> Vec<(String, String)> {
        data.entries()
            .iter()
            .filter_map(|(name, value)| match value {
                FormValue::Text(text) => Some((name.clone(), text.clone())),
                FormValue::File(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_encode_form_rules() {
        let doc = ArenaDocument::parse(FORM).unwrap();
        let form = doc.element_by_id("f").unwrap();
        let data = encode_form(&doc, form, EncodeOptions::default());
        let pairs: Vec<(String, String)> = text_pairs(&data);
        let expected: Vec<(String, String)> = [
            ("user", "ann"),
            ("agree", "on"),
            ("color", "blue"),
            ("bio", "hello\nworld"),
            ("one", "B item"),
            ("many", "1"),
            ("many", "3"),
            ("javax.faces.ViewState", "VS1"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(pairs, expected);
    }

    #[test]
    fn test_single_select_defaults_to_first_option() {
        let doc = ArenaDocument::parse(
            r#"<html><body><form id="f"><select name="s"><option>first</option><option>second</option></select></form></body></html>"#,
        )
        .unwrap();
        let form = doc.element_by_id("f").unwrap();
        assert_eq!(serialize_form(&doc, form), "s=first");
    }

    #[test]
    fn test_partial_page_submit_keeps_session_fields() {
        let doc = ArenaDocument::parse(
            r#"<html><body><form id="f"><div id="part"><input name="a" value="1"></div><input name="b" value="2"><input type="hidden" name="javax.faces.ViewState" value="V"></form></body></html>"#,
        )
        .unwrap();
        let form = doc.element_by_id("f").unwrap();
        let part = doc.element_by_id("part").unwrap();
        let roots = [part];
        let data = encode_form(
            &doc,
            form,
            EncodeOptions {
                files: false,
                only_within: Some(&roots),
            },
        );
        assert_eq!(data.to_urlencoded(), "a=1&javax.faces.ViewState=V");
    }

    #[test]
    fn test_file_inputs() {
        let mut doc = ArenaDocument::parse(
            r#"<html><body><form id="f" enctype="multipart/form-data"><input type="file" id="up" name="up"><input name="t" value="x"></form></body></html>"#,
        )
        .unwrap();
        let form = doc.element_by_id("f").unwrap();
        let up = doc.element_by_id("up").unwrap();
        doc.attach_file(up, FileBlob::new("a.txt", "text/plain", b"abc".to_vec()));

        assert!(is_multipart_form(&doc, form));
        assert!(contains_file_input(&doc, &[form]));
        let with_files = encode_form(&doc, form, EncodeOptions { files: true, only_within: None });
        assert!(with_files.has_files());
        let without = encode_form(&doc, form, EncodeOptions::default());
        assert!(!without.has_files());
        assert_eq!(without.to_urlencoded(), "t=x");
    }

    #[test]
    fn test_issuing_button() {
        let doc = ArenaDocument::parse(FORM).unwrap();
        let form = doc.element_by_id("f").unwrap();
        let go = doc
            .find_by_tag(form, "input")
            .into_iter()
            .find(|&n| doc.attribute(n, "name").as_deref() == Some("go"))
            .unwrap();
        let mut data = FormData::new();
        append_issuing_button(&doc, go, &mut data);
        assert_eq!(data.get("go"), Some("Go"));
    }

    #[test]
    fn test_client_window_guard_restores_field() {
        let mut doc = ArenaDocument::parse(
            r#"<html><body><form id="f"><input type="hidden" id="cw" name="javax.faces.ClientWindow" value="w1"></form></body></html>"#,
        )
        .unwrap();
        let form = doc.element_by_id("f").unwrap();
        let cw = doc.element_by_id("cw").unwrap();

        let guard = ClientWindowGuard::engage(&mut doc, form);
        assert!(doc.has_attribute(cw, "disabled"));
        assert_eq!(serialize_form(&doc, form), "");
        guard.restore(&mut doc);
        assert!(!doc.has_attribute(cw, "disabled"));
        assert_eq!(serialize_form(&doc, form), "javax.faces.ClientWindow=w1");
    }
}
