//! Native asynchronous transport built on the async reqwest client

use super::transport::{ExchangeHandle, LifecycleSink, Transport, TransportKind};
use super::{HttpRequest, HttpResponse, Method, RequestBody};
use crate::utils::{Result, error::TransportError};
use futures::StreamExt;
use std::collections::HashMap;

pub(crate) const USER_AGENT: &str = concat!("ppr-engine/", env!("CARGO_PKG_VERSION"));

/// How an exchange failed below the protocol level
#[derive(Debug)]
pub(crate) enum Failure {
    Timeout,
    Network(String),
}

impl From<reqwest::Error> for Failure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Failure::Timeout
        } else {
            Failure::Network(err.to_string())
        }
    }
}

/// Deliver the outcome of an exchange and close the lifecycle
pub(crate) fn finish(sink: &LifecycleSink, outcome: std::result::Result<HttpResponse, Failure>) {
    match outcome {
        Ok(response) => sink.load(response),
        Err(Failure::Timeout) => sink.timeout(),
        Err(Failure::Network(message)) => sink.error(message),
    }
    sink.load_end();
}

/// Build and run a request on the async client.
///
/// `native_timeout` applies the request timeout inside reqwest; callers
/// without native timeout support enforce it themselves.
pub(crate) async fn perform(
    client: &reqwest::Client,
    request: &HttpRequest,
    native_timeout: bool,
    sink: Option<&LifecycleSink>,
) -> std::result::Result<HttpResponse, Failure> {
    let method = match request.method() {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
    };
    let mut builder = client.request(method, request.url());

    for (name, value) in request.headers() {
        builder = builder.header(name.as_str(), value.as_str());
    }

    builder = match request.request_body() {
        RequestBody::Empty => builder,
        RequestBody::UrlEncoded(body) => builder.body(body.clone()),
        RequestBody::Multipart(data) => {
            let form = data
                .to_multipart()
                .map_err(|e| Failure::Network(e.to_string()))?;
            builder.multipart(form)
        }
    };

    if native_timeout {
        if let Some(timeout) = request.timeout_duration() {
            builder = builder.timeout(timeout);
        }
    }

    let response = builder.send().await?;
    let status = response.status().as_u16();
    let headers: HashMap<String, String> = response
        .headers()
        .iter()
        .map(|(k, v)| (k.as_str().to_ascii_lowercase(), v.to_str().unwrap_or("").to_string()))
        .collect();
    let total = response.content_length();

    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        body.extend_from_slice(&chunk?);
        if let Some(sink) = sink {
            sink.progress(body.len() as u64, total);
        }
    }

    Ok(HttpResponse::with_headers(
        status,
        String::from_utf8_lossy(&body).into_owned(),
        headers,
    ))
}

/// Transport with native timeout, progress and multipart support
pub struct DirectAsyncTransport {
    client: reqwest::Client,
}

impl DirectAsyncTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for DirectAsyncTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::DirectAsync
    }

    fn send(&self, request: HttpRequest, sink: LifecycleSink) -> ExchangeHandle {
        let client = self.client.clone();
        let task_sink = sink.clone();
        let task = tokio::spawn(async move {
            task_sink.load_start();
            let outcome = perform(&client, &request, true, Some(&task_sink)).await;
            finish(&task_sink, outcome);
        });
        ExchangeHandle::cancellable(&sink, task.abort_handle())
    }
}
