//! Integration tests for the partial-page engine
//!
//! A scripted transport stands in for the network: it records every
//! request and answers from a prepared list on a later scheduler turn,
//! so requests submitted back to back really do queue up.

use ppr_engine::ajax::protocol::{PARAM_EXECUTE, PARAM_RENDER, PARAM_SOURCE};
use ppr_engine::network::{
    ExchangeHandle, HttpRequest, HttpResponse, LifecycleSink, RequestBody, Transport, TransportKind,
    TransportSet,
};
use ppr_engine::utils::error::ErrorStatus;
use ppr_engine::{
    AjaxEngine, AjaxError, EngineConfig, EventStatus, Page, ProjectStage, SubmitOptions,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;
use tokio::task::LocalSet;
use tokio_test::{assert_err, assert_ok};

const EMPTY_RESPONSE: &str = "<partial-response><changes/></partial-response>";

const PAGE: &str = r#"<html><head><title>orders</title></head><body>
<form id="f1" action="/app/orders.xhtml">
  <input type="text" id="qty" name="qty" value="1">
  <button id="a" name="a" value="A">A</button>
  <button id="b" name="b" value="B">B</button>
  <button id="c" name="c" value="C">C</button>
  <button id="d" name="d" value="D">D</button>
  <div id="inside"></div>
  <input type="hidden" name="javax.faces.ViewState" value="V1">
</form>
<form id="f2" action="/app/orders.xhtml">
  <button id="other" name="other">Other</button>
  <input type="hidden" name="javax.faces.ViewState" value="V1">
</form>
<div id="panel">old panel</div>
</body></html>"#;

enum Reply {
    Respond(HttpResponse),
    Timeout,
    Fail(&'static str),
}

/// Transport answering from a prepared list
struct ScriptedTransport {
    replies: RefCell<VecDeque<Reply>>,
    sent: RefCell<Vec<HttpRequest>>,
    journal: Rc<RefCell<Vec<String>>>,
}

impl ScriptedTransport {
    fn new(journal: Rc<RefCell<Vec<String>>>) -> Self {
        Self {
            replies: RefCell::new(VecDeque::new()),
            sent: RefCell::new(Vec::new()),
            journal,
        }
    }

    fn reply(&self, reply: Reply) {
        self.replies.borrow_mut().push_back(reply);
    }

    fn respond(&self, body: &str) {
        self.reply(Reply::Respond(HttpResponse::new(200, body)));
    }

    fn sent_sources(&self) -> Vec<String> {
        self.sent
            .borrow()
            .iter()
            .map(|r| param(r, PARAM_SOURCE).unwrap_or_default())
            .collect()
    }
}

fn param(request: &HttpRequest, name: &str) -> Option<String> {
    let RequestBody::UrlEncoded(body) = request.request_body() else {
        return None;
    };
    url::form_urlencoded::parse(body.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

impl Transport for ScriptedTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::DirectAsync
    }

    fn send(&self, request: HttpRequest, sink: LifecycleSink) -> ExchangeHandle {
        let source = param(&request, PARAM_SOURCE).unwrap_or_default();
        self.journal.borrow_mut().push(format!("send:{}", source));
        self.sent.borrow_mut().push(request);

        let reply = self
            .replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Reply::Respond(HttpResponse::new(200, EMPTY_RESPONSE)));
        let handle = ExchangeHandle::flag_only(&sink);
        tokio::task::spawn_local(async move {
            tokio::task::yield_now().await;
            sink.load_start();
            match reply {
                Reply::Respond(response) => sink.load(response),
                Reply::Timeout => sink.timeout(),
                Reply::Fail(message) => sink.error(message),
            }
            sink.load_end();
        });
        handle
    }
}

struct Harness {
    engine: AjaxEngine,
    transport: Rc<ScriptedTransport>,
    journal: Rc<RefCell<Vec<String>>>,
    errors: Rc<RefCell<Vec<(ErrorStatus, String)>>>,
}

impl Harness {
    fn new(html: &str, config: EngineConfig) -> Self {
        let journal = Rc::new(RefCell::new(Vec::new()));
        let transport = Rc::new(ScriptedTransport::new(journal.clone()));
        let mut transports = TransportSet::new();
        transports.register(transport.clone());

        let page = Page::from_html(html, Some("http://localhost:8080/app/orders.xhtml")).unwrap();
        let engine = AjaxEngine::with_transports(page, config, transports);

        {
            let journal = journal.clone();
            engine.on_event(move |event| {
                if event.status == EventStatus::Success {
                    journal.borrow_mut().push(format!("success:{}", event.source));
                }
            });
        }
        let errors = Rc::new(RefCell::new(Vec::new()));
        {
            let errors = errors.clone();
            engine.on_error(move |error| {
                errors.borrow_mut().push((error.status, error.source.clone()));
            });
        }

        Self {
            engine,
            transport,
            journal,
            errors,
        }
    }

    fn field(&self, form_id: &str, name: &str) -> Option<String> {
        self.engine.with_page(|page| {
            let dom = page.dom();
            let form = dom.element_by_id(form_id)?;
            dom.find_by_tag(form, "input")
                .into_iter()
                .find(|&n| dom.attribute(n, "name").as_deref() == Some(name))
                .and_then(|n| dom.attribute(n, "value"))
        })
    }

    fn exists(&self, id: &str) -> bool {
        self.engine.with_page(|page| page.dom().element_by_id(id).is_some())
    }
}

fn changes(inner: &str) -> String {
    format!("<partial-response><changes>{}</changes></partial-response>", inner)
}

#[tokio::test]
async fn test_requests_are_sent_in_order_one_at_a_time() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new(PAGE, EngineConfig::default());
            for id in ["a", "b", "c"] {
                assert_ok!(h.engine.submit(id, Some("click"), SubmitOptions::new()));
            }
            assert_eq!(h.engine.queue_len(), 2);
            h.engine.wait_idle().await;

            assert_eq!(
                *h.journal.borrow(),
                vec!["send:a", "success:a", "send:b", "success:b", "send:c", "success:c"]
            );
        })
        .await;
}

#[tokio::test]
async fn test_queue_bound_drops_oldest_waiting_request() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new(PAGE, EngineConfig::default());
            assert_ok!(h.engine.submit("a", None, SubmitOptions::new()));
            assert_ok!(h.engine.submit("b", None, SubmitOptions::new()));
            assert_ok!(h.engine.submit("c", None, SubmitOptions::new()));
            assert_ok!(h.engine.submit("d", None, SubmitOptions::new().queue_size(2)));
            h.engine.wait_idle().await;

            assert_eq!(h.transport.sent_sources(), vec!["a", "c", "d"]);
        })
        .await;
}

#[tokio::test]
async fn test_queued_request_sends_fresh_view_state() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new(PAGE, EngineConfig::default());
            h.transport.respond(&changes(
                r#"<update id="j_id1:javax.faces.ViewState:0"><![CDATA[V2]]></update>"#,
            ));
            assert_ok!(h.engine.submit("a", None, SubmitOptions::new()));
            assert_ok!(h.engine.submit("b", None, SubmitOptions::new()));
            h.engine.wait_idle().await;

            let sent = h.transport.sent.borrow();
            assert_eq!(param(&sent[0], "javax.faces.ViewState").as_deref(), Some("V1"));
            assert_eq!(param(&sent[1], "javax.faces.ViewState").as_deref(), Some("V2"));
        })
        .await;
}

#[tokio::test]
async fn test_view_state_reaches_only_touched_forms() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new(PAGE, EngineConfig::default());
            h.transport.respond(&changes(
                r#"<update id="javax.faces.ViewState"><![CDATA[V2]]></update><update id="panel"><![CDATA[<div id="panel"><form id="f3"></form></div>]]></update>"#,
            ));
            assert_ok!(h.engine.submit("a", None, SubmitOptions::new().render("panel")));
            h.engine.wait_idle().await;

            assert_eq!(h.field("f1", "javax.faces.ViewState").as_deref(), Some("V2"));
            assert_eq!(h.field("f3", "javax.faces.ViewState").as_deref(), Some("V2"));
            assert_eq!(h.field("f2", "javax.faces.ViewState").as_deref(), Some("V1"));
        })
        .await;
}

#[tokio::test]
async fn test_no_isolated_windows_updates_every_form() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new(PAGE, EngineConfig::default().with_no_isolated_windows(true));
            h.transport.respond(&changes(
                r#"<update id="javax.faces.ViewState"><![CDATA[V2]]></update>"#,
            ));
            assert_ok!(h.engine.submit("a", None, SubmitOptions::new()));
            h.engine.wait_idle().await;

            assert_eq!(h.field("f1", "javax.faces.ViewState").as_deref(), Some("V2"));
            assert_eq!(h.field("f2", "javax.faces.ViewState").as_deref(), Some("V2"));
        })
        .await;
}

#[tokio::test]
async fn test_multipart_guard_fails_before_sending() {
    LocalSet::new()
        .run_until(async {
            let html = r#"<html><body><form id="up" action="/upload"><input type="file" id="file" name="file"></form></body></html>"#;
            let h = Harness::new(html, EngineConfig::default());
            let result = h.engine.submit("file", None, SubmitOptions::new());
            assert!(matches!(assert_err!(result), AjaxError::Configuration(_)));
            h.engine.wait_idle().await;

            assert!(h.transport.sent.borrow().is_empty());
            assert_eq!(*h.errors.borrow(), vec![(ErrorStatus::ClientError, "file".to_string())]);
        })
        .await;
}

#[tokio::test]
async fn test_failures_are_reported_and_queue_advances() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new(PAGE, EngineConfig::default().with_timeout(Duration::from_secs(5)));
            h.transport.reply(Reply::Respond(HttpResponse::new(500, "boom")));
            h.transport.reply(Reply::Timeout);
            h.transport.reply(Reply::Fail("connection reset"));
            h.transport.respond("<html>not a partial response</html>");
            h.transport.respond("");
            for id in ["a", "b", "c", "d", "qty"] {
                assert_ok!(h.engine.submit(id, None, SubmitOptions::new()));
            }
            h.engine.wait_idle().await;

            assert_eq!(
                *h.errors.borrow(),
                vec![
                    (ErrorStatus::HttpError, "a".to_string()),
                    (ErrorStatus::Timeout, "b".to_string()),
                    (ErrorStatus::HttpError, "c".to_string()),
                    (ErrorStatus::MalformedXml, "d".to_string()),
                    (ErrorStatus::EmptyResponse, "qty".to_string()),
                ]
            );
            assert_eq!(h.transport.sent_sources().len(), 5);
        })
        .await;
}

#[tokio::test]
async fn test_server_error_reaches_callback_and_listeners() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new(PAGE, EngineConfig::default().with_project_stage(ProjectStage::Development));
            h.transport.respond(
                r#"<partial-response><error><error-name>javax.faces.application.ViewExpiredException</error-name><error-message><![CDATA[view expired]]></error-message></error></partial-response>"#,
            );
            let seen = Rc::new(RefCell::new(Vec::new()));
            let callback_seen = seen.clone();
            let options = SubmitOptions::new().on_error(move |error| {
                callback_seen
                    .borrow_mut()
                    .push((error.error_name.clone(), error.error_message.clone(), error.response_code));
            });
            assert_ok!(h.engine.submit("a", None, options));
            h.engine.wait_idle().await;

            assert_eq!(
                *seen.borrow(),
                vec![(
                    "javax.faces.application.ViewExpiredException".to_string(),
                    "view expired".to_string(),
                    Some(200)
                )]
            );
            assert_eq!(*h.errors.borrow(), vec![(ErrorStatus::ServerError, "a".to_string())]);
        })
        .await;
}

#[tokio::test]
async fn test_invalid_root_changes_nothing() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new(PAGE, EngineConfig::default());
            let before = h.engine.with_page(|page| page.html());
            h.transport.respond(
                r#"<partial-responses><changes><delete id="panel"/></changes></partial-responses>"#,
            );
            assert_ok!(h.engine.submit("a", None, SubmitOptions::new()));
            h.engine.wait_idle().await;

            assert_eq!(h.engine.with_page(|page| page.html()), before);
            assert_eq!(*h.errors.borrow(), vec![(ErrorStatus::MalformedXml, "a".to_string())]);
        })
        .await;
}

#[tokio::test]
async fn test_ids_created_mid_response_are_resolved() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new(PAGE, EngineConfig::default());
            h.transport.respond(&changes(
                r#"<update id="panel"><![CDATA[<div id="panel"><span id="fresh">1</span></div>]]></update>
                   <update id="fresh"><![CDATA[<span id="fresh">2</span>]]></update>
                   <insert><after id="fresh"><![CDATA[<em id="tail">t</em>]]></after></insert>
                   <attributes id="tail"><attribute name="title" value="added"/></attributes>"#,
            ));
            assert_ok!(h.engine.submit("a", None, SubmitOptions::new()));
            h.engine.wait_idle().await;

            assert!(h.errors.borrow().is_empty());
            let (fresh, title) = h.engine.with_page(|page| {
                let dom = page.dom();
                let fresh = dom.element_by_id("fresh").map(|n| dom.text_content(n));
                let title = dom.element_by_id("tail").and_then(|n| dom.attribute(n, "title"));
                (fresh, title)
            });
            assert_eq!(fresh.as_deref(), Some("2"));
            assert_eq!(title.as_deref(), Some("added"));
        })
        .await;
}

#[tokio::test]
async fn test_repeated_update_is_idempotent() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new(PAGE, EngineConfig::default());
            let update = changes(r#"<update id="panel"><![CDATA[<div id="panel"><b>same</b></div>]]></update>"#);
            h.transport.respond(&update);
            h.transport.respond(&update);

            assert_ok!(h.engine.submit("a", None, SubmitOptions::new()));
            h.engine.wait_idle().await;
            let first = h.engine.with_page(|page| page.html());
            assert_ok!(h.engine.submit("a", None, SubmitOptions::new()));
            h.engine.wait_idle().await;

            assert_eq!(h.engine.with_page(|page| page.html()), first);
        })
        .await;
}

#[tokio::test]
async fn test_client_error_while_encoding_cleans_up_queue() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new(PAGE, EngineConfig::default());
            h.transport.respond(&changes(r#"<delete id="f2"/>"#));
            assert_ok!(h.engine.submit("a", None, SubmitOptions::new()));
            assert_ok!(h.engine.submit("other", None, SubmitOptions::new()));
            assert_ok!(h.engine.submit("b", None, SubmitOptions::new()));
            h.engine.wait_idle().await;

            assert!(!h.exists("f2"));
            assert_eq!(h.transport.sent_sources(), vec!["a"]);
            assert_eq!(*h.errors.borrow(), vec![(ErrorStatus::ClientError, "other".to_string())]);
            assert!(h.engine.is_idle());
        })
        .await;
}

#[tokio::test]
async fn test_delay_replaces_pending_request() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new(PAGE, EngineConfig::default());
            let delay = Duration::from_millis(20);
            assert_ok!(h.engine.submit("a", None, SubmitOptions::new().delay(delay)));
            assert_ok!(h.engine.submit("b", None, SubmitOptions::new().delay(delay)));
            assert!(!h.engine.is_idle());
            h.engine.wait_idle().await;

            assert_eq!(h.transport.sent_sources(), vec!["b"]);
        })
        .await;
}

#[tokio::test]
async fn test_cleanup_drops_waiting_requests() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new(PAGE, EngineConfig::default());
            assert_ok!(h.engine.submit("a", None, SubmitOptions::new()));
            assert_ok!(h.engine.submit("b", None, SubmitOptions::new()));
            assert_eq!(h.engine.queue_len(), 1);
            h.engine.cleanup();
            assert!(h.engine.is_idle());
            h.engine.wait_idle().await;

            assert_ok!(h.engine.submit("c", None, SubmitOptions::new()));
            h.engine.wait_idle().await;
            assert!(!h.transport.sent_sources().contains(&"b".to_string()));
            assert!(h.transport.sent_sources().contains(&"c".to_string()));
        })
        .await;
}

#[tokio::test]
async fn test_cleanup_from_begin_listener_keeps_one_exchange_in_flight() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new(PAGE, EngineConfig::default());
            h.transport.respond(&changes(
                r#"<update id="panel"><![CDATA[<div id="panel">replaced</div>]]></update>"#,
            ));
            let events = Rc::new(RefCell::new(Vec::new()));
            {
                let events = events.clone();
                let engine = h.engine.clone();
                h.engine.on_event(move |event| {
                    events.borrow_mut().push(format!("{}:{}", event.status, event.source));
                    if event.status == EventStatus::Begin && event.source == "a" {
                        engine.cleanup();
                        engine.submit("b", None, SubmitOptions::new()).unwrap();
                    }
                });
            }
            assert_ok!(h.engine.submit("a", None, SubmitOptions::new()));
            h.engine.wait_idle().await;

            assert_eq!(h.transport.sent_sources(), vec!["b"]);
            assert_eq!(
                *events.borrow(),
                vec!["begin:a", "begin:b", "complete:b", "success:b"]
            );
            let panel = h.engine.with_page(|page| {
                let dom = page.dom();
                dom.element_by_id("panel").map(|n| dom.text_content(n))
            });
            assert_eq!(panel.as_deref(), Some("replaced"));
        })
        .await;
}

#[tokio::test]
async fn test_pinned_client_window_field_is_restored() {
    LocalSet::new()
        .run_until(async {
            let html = r#"<html><body><form id="f" action="/app"><input type="hidden" id="cw" name="javax.faces.ClientWindow" value="page-window"><button id="go" name="go">Go</button></form></body></html>"#;
            let h = Harness::new(html, EngineConfig::default());
            assert_ok!(h.engine.submit("go", None, SubmitOptions::new().client_window("pinned")));
            h.engine.wait_idle().await;

            let sent = h.transport.sent.borrow();
            assert_eq!(param(&sent[0], "javax.faces.ClientWindow").as_deref(), Some("pinned"));
            let disabled = h.engine.with_page(|page| {
                let dom = page.dom();
                dom.element_by_id("cw").map(|n| dom.has_attribute(n, "disabled"))
            });
            assert_eq!(disabled, Some(false));
        })
        .await;
}

#[tokio::test]
async fn test_execute_and_render_on_the_wire() {
    LocalSet::new()
        .run_until(async {
            let h = Harness::new(PAGE, EngineConfig::default());
            assert_ok!(h.engine.submit("a", None, SubmitOptions::new().execute("@form").render("@all")));
            assert_ok!(h.engine.submit("b", None, SubmitOptions::new().execute("@none").render("@this panel")));
            h.engine.wait_idle().await;

            let sent = h.transport.sent.borrow();
            assert_eq!(param(&sent[0], PARAM_EXECUTE).as_deref(), Some("f1"));
            assert_eq!(param(&sent[0], PARAM_RENDER).as_deref(), Some("@all"));
            assert_eq!(param(&sent[1], PARAM_EXECUTE), None);
            assert_eq!(param(&sent[1], PARAM_RENDER).as_deref(), Some("b panel"));
            assert_eq!(sent[0].url(), "http://localhost:8080/app/orders.xhtml");
        })
        .await;
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_sends_follow_submit_order(order in prop::sample::subsequence(vec!["a", "b", "c", "d", "qty"], 1..=5)) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let sent = runtime.block_on(LocalSet::new().run_until(async {
            let h = Harness::new(PAGE, EngineConfig::default());
            for id in &order {
                h.engine.submit(id, None, SubmitOptions::new()).unwrap();
            }
            h.engine.wait_idle().await;
            h.transport.sent_sources()
        }));
        prop_assert_eq!(sent, order.iter().map(|s| s.to_string()).collect::<Vec<_>>());
    }
}
