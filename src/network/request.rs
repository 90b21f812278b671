//! HTTP request types and the transport-neutral form payload

use crate::utils::{error::TransportError, Result};
use std::time::Duration;

/// HTTP methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// A file selected in a file input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBlob {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl FileBlob {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }
}

/// Value of one payload entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    File(FileBlob),
}

/// Ordered key/value payload, independent of the wire encoding
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    entries: Vec<(String, FormValue)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a text entry
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries
            .push((name.into(), FormValue::Text(value.into())));
    }

    /// Append a file entry
    pub fn append_file(&mut self, name: impl Into<String>, file: FileBlob) {
        self.entries.push((name.into(), FormValue::File(file)));
    }

    /// First text value stored under `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.iter().find_map(|(key, value)| match value {
            FormValue::Text(text) if key == name => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(key, _)| key == name)
    }

    pub fn entries(&self) -> &[(String, FormValue)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any entry carries a file
    pub fn has_files(&self) -> bool {
        self.entries
            .iter()
            .any(|(_, value)| matches!(value, FormValue::File(_)))
    }

    /// `application/x-www-form-urlencoded` rendering; file entries are skipped
    pub fn to_urlencoded(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (name, value) in &self.entries {
            if let FormValue::Text(text) = value {
                serializer.append_pair(name, text);
            }
        }
        serializer.finish()
    }

    /// `multipart/form-data` rendering for the async reqwest client
    pub fn to_multipart(&self) -> Result<reqwest::multipart::Form> {
        let mut form = reqwest::multipart::Form::new();
        for (name, value) in &self.entries {
            form = match value {
                FormValue::Text(text) => form.text(name.clone(), text.clone()),
                FormValue::File(file) => {
                    let part = reqwest::multipart::Part::bytes(file.bytes.clone())
                        .file_name(file.file_name.clone())
                        .mime_str(&file.content_type)
                        .map_err(|e| TransportError::Network(e.to_string()))?;
                    form.part(name.clone(), part)
                }
            };
        }
        Ok(form)
    }
}

/// Request body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    Empty,
    UrlEncoded(String),
    Multipart(FormData),
}

impl RequestBody {
    pub fn is_multipart(&self) -> bool {
        matches!(self, Self::Multipart(_))
    }
}

/// HTTP request handed to a transport
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    body: RequestBody,
    timeout: Option<Duration>,
}

impl HttpRequest {
    /// Create a new request
    pub fn new(method: Method, url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        // Transports only speak absolute http(s)
        match url::Url::parse(&url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => return Err(TransportError::InvalidUrl(url).into()),
        }
        Ok(Self {
            method,
            url,
            headers: Vec::new(),
            body: RequestBody::Empty,
            timeout: None,
        })
    }

    /// Create a POST request
    pub fn post(url: impl Into<String>) -> Result<Self> {
        Self::new(Method::Post, url)
    }

    /// Add a header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Set the request body
    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Set the client-side timeout
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Header value by case-insensitive name
    pub fn header_value(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn request_body(&self) -> &RequestBody {
        &self.body
    }

    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_relative_url() {
        assert!(HttpRequest::post("/app/page.xhtml").is_err());
        assert!(HttpRequest::post("ftp://example.com/x").is_err());
        assert!(HttpRequest::post("https://example.com/x").is_ok());
    }

    #[test]
    fn test_urlencoded_skips_files() {
        let mut data = FormData::new();
        data.append("a b", "1&2");
        data.append_file("upload", FileBlob::new("f.txt", "text/plain", b"hi".to_vec()));
        assert!(data.has_files());
        assert_eq!(data.to_urlencoded(), "a+b=1%262");
    }

    #[test]
    fn test_repeated_names_keep_order() {
        let mut data = FormData::new();
        data.append("sel", "x");
        data.append("other", "y");
        data.append("sel", "z");
        assert_eq!(data.get("sel"), Some("x"));
        assert_eq!(data.to_urlencoded(), "sel=x&other=y&sel=z");
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let req = HttpRequest::post("https://example.com/")
            .unwrap()
            .header("Faces-Request", "partial/ajax");
        assert_eq!(req.header_value("faces-request"), Some("partial/ajax"));
        assert_eq!(req.method().as_str(), "POST");
    }
}
