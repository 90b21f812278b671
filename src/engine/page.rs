//! Page representation

use crate::dom::{ArenaDocument, DomPatchSurface};
use crate::js_engine::{JsRuntime, ScriptEngine};
use crate::utils::Result;

/// A live page: its document and its script context
pub struct Page {
    /// The DOM document
    dom: Box<dyn DomPatchSurface>,
    /// Global script scope shared by `eval` and embedded scripts
    scripts: Box<dyn ScriptEngine>,
}

impl Page {
    /// Create a page from its collaborators
    pub fn new(dom: Box<dyn DomPatchSurface>, scripts: Box<dyn ScriptEngine>) -> Self {
        Self { dom, scripts }
    }

    /// Parse HTML into an in-memory page with a Boa script context
    pub fn from_html(html: &str, location: Option<&str>) -> Result<Self> {
        let mut document = ArenaDocument::parse(html)?;
        if let Some(url) = location {
            document = document.with_location(url);
        }
        Ok(Self::new(Box::new(document), Box::new(JsRuntime::new())))
    }

    /// Get the page URL
    pub fn url(&self) -> Option<String> {
        self.dom.location()
    }

    /// Get the DOM document
    pub fn dom(&self) -> &dyn DomPatchSurface {
        self.dom.as_ref()
    }

    pub fn dom_mut(&mut self) -> &mut dyn DomPatchSurface {
        self.dom.as_mut()
    }

    /// Document and script context borrowed together
    pub fn parts_mut(&mut self) -> (&mut dyn DomPatchSurface, &mut dyn ScriptEngine) {
        (self.dom.as_mut(), self.scripts.as_mut())
    }

    /// Serialized markup of the whole document
    pub fn html(&self) -> String {
        self.dom.outer_html(self.dom.document())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_html() {
        let page = Page::from_html(
            "<html><body><form id=\"f\"></form></body></html>",
            Some("http://localhost/app/page.xhtml"),
        )
        .unwrap();
        assert_eq!(page.url().as_deref(), Some("http://localhost/app/page.xhtml"));
        assert_eq!(page.dom().forms().len(), 1);
        assert!(page.html().contains("<form id=\"f\"></form>"));
    }
}
