//! Response interpreter
//!
//! Executes the directives of a `partial-response` against the live
//! document. Target ids are resolved when each command runs, so elements
//! created by an earlier command are visible to the later ones.

use super::context::AjaxContext;
use super::reconcile;
use super::response::{Command, Directive, Relation, ResponseDocument, XmlElement};
use super::protocol::{TargetKind, classify_target};
use crate::dom::{DomPatchSurface, NodeId};
use crate::engine::EngineConfig;
use crate::js_engine::ScriptEngine;
use crate::utils::{AjaxError, Result, error::ProtocolError};

/// Applies responses to one page
pub struct ResponseInterpreter<'a> {
    dom: &'a mut dyn DomPatchSurface,
    scripts: &'a mut dyn ScriptEngine,
    config: &'a EngineConfig,
}

impl<'a> ResponseInterpreter<'a> {
    pub fn new(
        dom: &'a mut dyn DomPatchSurface,
        scripts: &'a mut dyn ScriptEngine,
        config: &'a EngineConfig,
    ) -> Self {
        Self { dom, scripts, config }
    }

    /// Validate, dispatch and reconcile one response body.
    ///
    /// A document that fails validation leaves the page untouched. Once
    /// dispatch started, reconciliation runs even if a command failed or
    /// the server sent an `error`, and the context's tracking state is
    /// cleared in every case.
    pub fn process(&mut self, body: &str, context: &mut AjaxContext) -> Result<()> {
        let document = match ResponseDocument::parse(body) {
            Ok(document) => document,
            Err(e) => {
                context.internal.clear_tracking();
                return Err(e);
            }
        };

        let dispatched = self.dispatch(&document, context);
        let reconciled = reconcile::reconcile(self.dom, &context.internal, self.config);
        context.internal.clear_tracking();
        dispatched.and(reconciled)
    }

    fn dispatch(&mut self, document: &ResponseDocument, context: &mut AjaxContext) -> Result<()> {
        for directive in &document.directives {
            match directive {
                Directive::Error { name, message } => {
                    log::debug!("server error {} in response to {}", name, context.source);
                    return Err(AjaxError::Server {
                        name: name.clone(),
                        message: message.clone(),
                    });
                }
                Directive::Redirect { url } => {
                    let url = url
                        .as_deref()
                        .map(str::trim)
                        .filter(|url| !url.is_empty())
                        .ok_or(ProtocolError::MissingRedirectUrl)?;
                    log::info!("redirecting to {}", url);
                    self.dom.navigate(url);
                    return Ok(());
                }
                Directive::Changes(commands) => self.process_changes(commands, context)?,
                Directive::Unknown(name) => log::warn!("ignoring unknown directive <{}>", name),
            }
        }
        Ok(())
    }

    fn process_changes(&mut self, commands: &[XmlElement], context: &mut AjaxContext) -> Result<()> {
        for element in commands {
            match Command::parse(element)? {
                Some(command) => self.execute(command, context)?,
                None => log::warn!("ignoring unknown command <{}>", element.name),
            }
        }
        Ok(())
    }

    fn execute(&mut self, command: Command, context: &mut AjaxContext) -> Result<()> {
        match command {
            Command::Update { target, markup } => self.update(&target, &markup, context),
            Command::Insert {
                anchor,
                relation,
                markup,
            } => {
                let anchor = self.resolve("insert", &anchor)?;
                let nodes = match relation {
                    Relation::Before => self.dom.insert_before(anchor, &markup)?,
                    Relation::After => self.dom.insert_after(anchor, &markup)?,
                };
                self.dom.run_embedded_scripts(&nodes, self.scripts)?;
                self.record(&nodes, context);
                Ok(())
            }
            Command::Delete { target } => {
                let node = self.resolve("delete", &target)?;
                if let Some(form) = self.dom.enclosing_form(node) {
                    context.internal.touched_forms.insert(form);
                }
                self.dom.remove(node)
            }
            Command::Eval { code } => {
                self.scripts.execute(&code)?;
                Ok(())
            }
            Command::Attributes { target, entries } => {
                let node = match classify_target(&target) {
                    TargetKind::ViewRoot | TargetKind::ViewHead => {
                        return Err(ProtocolError::IllegalAttributesTarget(target).into());
                    }
                    TargetKind::ViewBody => self.dom.body().ok_or(ProtocolError::UnknownTarget {
                        command: "attributes",
                        id: target.clone(),
                    })?,
                    _ => self.resolve("attributes", &target)?,
                };
                for (name, value) in &entries {
                    self.dom.set_attribute(node, name, value)?;
                }
                Ok(())
            }
            Command::Extension => {
                log::trace!("extension command skipped");
                Ok(())
            }
        }
    }

    fn update(&mut self, target: &str, markup: &str, context: &mut AjaxContext) -> Result<()> {
        match classify_target(target) {
            TargetKind::ViewState => {
                context.internal.pending_view_state = Some(markup.to_string());
                self.touch_source_form(context);
            }
            TargetKind::ClientWindow => {
                context.internal.pending_client_window = Some(markup.to_string());
                self.touch_source_form(context);
            }
            TargetKind::ViewRoot => {
                let added = self.dom.merge_head_resources(markup)?;
                self.dom.run_embedded_scripts(&added, self.scripts)?;
                self.replace_body(markup, context)?;
            }
            TargetKind::ViewHead => {
                let added = self.dom.merge_head_resources(markup)?;
                self.dom.run_embedded_scripts(&added, self.scripts)?;
            }
            TargetKind::ViewBody => self.replace_body(markup, context)?,
            TargetKind::Element => {
                let node = self.resolve("update", target)?;
                let nodes = self.dom.replace_outer(node, markup)?;
                self.dom.run_embedded_scripts(&nodes, self.scripts)?;
                self.record(&nodes, context);
            }
        }
        Ok(())
    }

    fn replace_body(&mut self, markup: &str, context: &mut AjaxContext) -> Result<()> {
        let focus = self
            .config
            .preserve_focus
            .then(|| self.dom.focus_state())
            .flatten();
        let nodes = self.dom.replace_body(markup)?;
        self.dom.run_embedded_scripts(&nodes, self.scripts)?;
        if let Some(state) = focus {
            if !self.dom.restore_focus(&state) {
                log::debug!("focused element {} did not survive the update", state.element_id);
            }
        }
        context.internal.touched_elements.extend(nodes);
        Ok(())
    }

    /// The source form, looked up again since the body may have been replaced
    fn touch_source_form(&self, context: &mut AjaxContext) {
        let form = context
            .internal
            .source_form_id
            .as_deref()
            .and_then(|id| self.dom.element_by_id(id));
        if let Some(form) = form {
            context.internal.touched_forms.insert(form);
        }
    }

    fn resolve(&self, command: &'static str, id: &str) -> Result<NodeId> {
        self.dom.element_by_id(id).ok_or_else(|| {
            ProtocolError::UnknownTarget {
                command,
                id: id.to_string(),
            }
            .into()
        })
    }

    /// Remember replaced nodes: their form, or the node itself when it is
    /// outside any form
    fn record(&self, nodes: &[NodeId], context: &mut AjaxContext) {
        for &node in nodes {
            if self.dom.tag_name(node).is_none() {
                continue;
            }
            match self.dom.enclosing_form(node) {
                Some(form) => {
                    context.internal.touched_forms.insert(form);
                }
                None => {
                    context.internal.touched_elements.insert(node);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ArenaDocument;
    use crate::js_engine::{JsRuntime, JsValue};
    use pretty_assertions::assert_eq;

    const PAGE: &str = r#"<html><head><title>t</title></head><body><form id="f1"><div id="panel">old</div><input type="hidden" name="javax.faces.ViewState" value="V1"></form><div id="outer"></div></body></html>"#;

    struct Fixture {
        doc: ArenaDocument,
        scripts: JsRuntime,
        config: EngineConfig,
        context: AjaxContext,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                doc: ArenaDocument::parse(PAGE).unwrap(),
                scripts: JsRuntime::new(),
                config: EngineConfig::default(),
                context: AjaxContext::new("panel").with_form("f1"),
            }
        }

        fn run(&mut self, body: &str) -> Result<()> {
            ResponseInterpreter::new(&mut self.doc, &mut self.scripts, &self.config)
                .process(body, &mut self.context)
        }

        fn html(&self) -> String {
            self.doc.outer_html(self.doc.document())
        }
    }

    fn changes(inner: &str) -> String {
        format!("<partial-response><changes>{}</changes></partial-response>", inner)
    }

    #[test]
    fn test_update_replaces_and_runs_scripts() {
        let mut fx = Fixture::new();
        fx.run(&changes(
            r#"<update id="panel"><![CDATA[<div id="panel">new<script>var touched = 7;</script></div>]]></update>"#,
        ))
        .unwrap();
        let panel = fx.doc.element_by_id("panel").unwrap();
        assert!(fx.doc.outer_html(panel).starts_with("<div id=\"panel\">new"));
        assert_eq!(fx.scripts.eval("touched").unwrap(), JsValue::Number(7.0));
    }

    #[test]
    fn test_wrong_root_mutates_nothing() {
        let mut fx = Fixture::new();
        let before = fx.html();
        let result = fx.run(r#"<changes><update id="panel"><![CDATA[<b>x</b>]]></update></changes>"#);
        assert!(matches!(
            result,
            Err(AjaxError::Protocol(ProtocolError::UnexpectedRoot(_)))
        ));
        assert_eq!(fx.html(), before);
    }

    #[test]
    fn test_insert_then_attributes() {
        let mut fx = Fixture::new();
        fx.run(&changes(
            r#"<insert id="x" after="outer"><![CDATA[<p id="x"></p>]]></insert><attributes id="x"><attribute name="class" value="fresh"/></attributes>"#,
        ))
        .unwrap();
        let x = fx.doc.element_by_id("x").unwrap();
        assert_eq!(fx.doc.attribute(x, "class").as_deref(), Some("fresh"));
    }

    #[test]
    fn test_missing_targets_are_fatal() {
        let mut fx = Fixture::new();
        let result = fx.run(&changes(r#"<delete id="ghost"/>"#));
        assert!(matches!(
            result,
            Err(AjaxError::Protocol(ProtocolError::UnknownTarget { command: "delete", .. }))
        ));
        let result = fx.run(&changes(r#"<insert><after id="ghost"><![CDATA[<p/>]]></after></insert>"#));
        assert!(matches!(
            result,
            Err(AjaxError::Protocol(ProtocolError::UnknownTarget { command: "insert", .. }))
        ));
    }

    #[test]
    fn test_attributes_reject_head_and_root() {
        let mut fx = Fixture::new();
        let result = fx.run(&changes(
            r#"<attributes id="javax.faces.ViewHead"><attribute name="a" value="b"/></attributes>"#,
        ));
        assert!(matches!(
            result,
            Err(AjaxError::Protocol(ProtocolError::IllegalAttributesTarget(_)))
        ));
        fx.run(&changes(
            r#"<attributes id="javax.faces.ViewBody"><attribute name="class" value="dark"/></attributes>"#,
        ))
        .unwrap();
        let body = fx.doc.body().unwrap();
        assert_eq!(fx.doc.attribute(body, "class").as_deref(), Some("dark"));
    }

    #[test]
    fn test_view_state_reaches_source_form_after_body_replacement() {
        let mut fx = Fixture::new();
        fx.doc.set_focus("name", Some(2));
        fx.run(&changes(
            r#"<update id="javax.faces.ViewBody"><![CDATA[<body><form id="f1"><input id="name" name="name"></form></body>]]></update><update id="j_id1:javax.faces.ViewState:0"><![CDATA[V2]]></update>"#,
        ))
        .unwrap();
        let form = fx.doc.element_by_id("f1").unwrap();
        let field = fx
            .doc
            .find_by_tag(form, "input")
            .into_iter()
            .find(|&n| fx.doc.attribute(n, "name").as_deref() == Some("javax.faces.ViewState"))
            .unwrap();
        assert_eq!(fx.doc.attribute(field, "value").as_deref(), Some("V2"));
        assert_eq!(fx.doc.focus_state().map(|f| f.caret), Some(Some(2)));
        assert!(fx.context.internal.touched_forms.is_empty());
    }

    #[test]
    fn test_error_directive_stops_dispatch() {
        let mut fx = Fixture::new();
        let result = fx.run(
            r#"<partial-response><error><error-name>Oops</error-name><error-message>failed</error-message></error><changes><delete id="outer"/></changes></partial-response>"#,
        );
        match result {
            Err(AjaxError::Server { name, message }) => {
                assert_eq!(name, "Oops");
                assert_eq!(message, "failed");
            }
            other => panic!("expected server error, got {:?}", other),
        }
        assert!(fx.doc.element_by_id("outer").is_some());
    }

    #[test]
    fn test_redirect() {
        let mut fx = Fixture::new();
        fx.run(r#"<partial-response><redirect url="http://localhost/login"/></partial-response>"#)
            .unwrap();
        assert_eq!(fx.doc.navigations(), ["http://localhost/login".to_string()]);
        assert!(matches!(
            fx.run(r#"<partial-response><redirect/></partial-response>"#),
            Err(AjaxError::Protocol(ProtocolError::MissingRedirectUrl))
        ));
    }

    #[test]
    fn test_eval_runs_in_order() {
        let mut fx = Fixture::new();
        fx.run(&changes(
            r#"<eval><![CDATA[var log = [];]]></eval><update id="outer"><![CDATA[<div id="outer"><script>log.push('u');</script></div>]]></update><eval><![CDATA[log.push('e'); var joined = log.join(',');]]></eval>"#,
        ))
        .unwrap();
        assert_eq!(
            fx.scripts.eval("joined").unwrap(),
            JsValue::String("u,e".to_string())
        );
    }

    #[test]
    fn test_view_head_merges_resources() {
        let mut fx = Fixture::new();
        fx.run(&changes(
            r#"<update id="javax.faces.ViewHead"><![CDATA[<head><title>ignored</title><link rel="stylesheet" href="x.css"><script>var headRan = true;</script></head>]]></update>"#,
        ))
        .unwrap();
        let head = fx.doc.head().unwrap();
        assert_eq!(fx.doc.find_by_tag(head, "link").len(), 1);
        assert_eq!(fx.doc.find_by_tag(head, "title").len(), 1);
        assert_eq!(fx.scripts.eval("headRan").unwrap(), JsValue::Boolean(true));
    }
}
