//! Wire names of the partial-page protocol

/// Source element id
pub const PARAM_SOURCE: &str = "javax.faces.source";
/// Marks the post as a partial request
pub const PARAM_PARTIAL_AJAX: &str = "javax.faces.partial.ajax";
pub const PARAM_EXECUTE: &str = "javax.faces.partial.execute";
pub const PARAM_RENDER: &str = "javax.faces.partial.render";
/// DOM event that triggered the request
pub const PARAM_EVENT: &str = "javax.faces.partial.event";
pub const PARAM_BEHAVIOR_EVENT: &str = "javax.faces.behavior.event";
pub const PARAM_RESET_VALUES: &str = "javax.faces.partial.resetValues";

/// Hidden field carrying the view state token
pub const VIEW_STATE: &str = "javax.faces.ViewState";
/// Hidden field carrying the client window id
pub const CLIENT_WINDOW: &str = "javax.faces.ClientWindow";
/// Hidden field overriding the post target
pub const ENCODED_URL: &str = "javax.faces.encodedURL";

pub const VIEW_ROOT: &str = "javax.faces.ViewRoot";
pub const VIEW_HEAD: &str = "javax.faces.ViewHead";
pub const VIEW_BODY: &str = "javax.faces.ViewBody";

pub const HEADER_FACES_REQUEST: &str = "Faces-Request";
pub const FACES_REQUEST_PARTIAL: &str = "partial/ajax";
pub const CONTENT_TYPE_URLENCODED: &str = "application/x-www-form-urlencoded;charset=UTF-8";
pub const ENCTYPE_MULTIPART: &str = "multipart/form-data";

/// Root element of a response document
pub const PARTIAL_RESPONSE: &str = "partial-response";

pub const TOKEN_NONE: &str = "@none";
pub const TOKEN_ALL: &str = "@all";
pub const TOKEN_THIS: &str = "@this";
pub const TOKEN_FORM: &str = "@form";

/// Keys callers cannot set through pass-through params
pub const RESERVED_PARAMS: &[&str] = &[
    PARAM_SOURCE,
    PARAM_PARTIAL_AJAX,
    PARAM_EXECUTE,
    PARAM_RENDER,
    PARAM_EVENT,
    PARAM_BEHAVIOR_EVENT,
    PARAM_RESET_VALUES,
    CLIENT_WINDOW,
];

pub fn is_reserved_param(name: &str) -> bool {
    RESERVED_PARAMS.contains(&name)
}

/// How a command target id is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    ViewRoot,
    ViewHead,
    ViewBody,
    ViewState,
    ClientWindow,
    Element,
}

/// Classify a target id. View state and client window ids may be
/// namespaced (`j_id1:javax.faces.ViewState:0`).
pub fn classify_target(id: &str) -> TargetKind {
    match id {
        VIEW_ROOT => TargetKind::ViewRoot,
        VIEW_HEAD => TargetKind::ViewHead,
        VIEW_BODY => TargetKind::ViewBody,
        _ if id.contains(VIEW_STATE) => TargetKind::ViewState,
        _ if id.contains(CLIENT_WINDOW) => TargetKind::ClientWindow,
        _ => TargetKind::Element,
    }
}
