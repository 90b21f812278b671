//! Execute/render id list normalization

use super::protocol::{TOKEN_ALL, TOKEN_FORM, TOKEN_NONE, TOKEN_THIS};

/// A normalized execute or render list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdList {
    /// Key is left out of the request
    None,
    /// `@all`
    All,
    Ids(Vec<String>),
}

impl IdList {
    /// Space-delimited wire value, `None` when the key is omitted
    pub fn to_wire(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::All => Some(TOKEN_ALL.to_string()),
            Self::Ids(ids) if ids.is_empty() => None,
            Self::Ids(ids) => Some(ids.join(" ")),
        }
    }

    pub fn ids(&self) -> &[String] {
        match self {
            Self::Ids(ids) => ids,
            _ => &[],
        }
    }
}

/// Expand the special tokens of a raw id list.
///
/// `@none` suppresses the list, `@all` collapses it, `@this` becomes the
/// source id unless that id is already listed and `@form` becomes the
/// owning form id. Duplicates are dropped, first occurrence wins.
pub fn normalize_ids(raw: &str, source: &str, form: Option<&str>) -> IdList {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    if tokens.contains(&TOKEN_NONE) {
        return IdList::None;
    }
    if tokens.contains(&TOKEN_ALL) {
        return IdList::All;
    }

    let source_listed = tokens.contains(&source);
    let mut ids: Vec<String> = Vec::with_capacity(tokens.len());
    for token in tokens {
        let id = match token {
            TOKEN_THIS if source_listed => continue,
            TOKEN_THIS => source,
            TOKEN_FORM => match form {
                Some(form) => form,
                None => {
                    log::warn!("@form used outside of a form, ignoring");
                    continue;
                }
            },
            other => other,
        };
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }
    IdList::Ids(ids)
}

/// Execute list: defaults to the source element alone
pub fn execute_ids(raw: Option<&str>, source: &str, form: Option<&str>) -> IdList {
    match raw.map(str::trim) {
        None | Some("") => IdList::Ids(vec![source.to_string()]),
        Some(raw) => normalize_ids(raw, source, form),
    }
}

/// Render list: absent unless given
pub fn render_ids(raw: Option<&str>, source: &str, form: Option<&str>) -> IdList {
    match raw.map(str::trim) {
        None | Some("") => IdList::None,
        Some(raw) => normalize_ids(raw, source, form),
    }
}
