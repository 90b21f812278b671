//! Legacy-compatible transport
//!
//! Wraps a blocking request run on the blocking pool. There is no native
//! timeout: a timer watchdog raises `Timeout` and detaches the sink, so a
//! request that completes after the watchdog fired is never reported.

use super::direct::{Failure, USER_AGENT, finish};
use super::transport::{ExchangeHandle, LifecycleSink, Transport, TransportKind};
use super::{HttpRequest, HttpResponse, Method, RequestBody};
use crate::utils::error::TransportError;
use std::collections::HashMap;

/// Transport for hosts without level-2 requests
#[derive(Debug, Default)]
pub struct LegacyAsyncTransport;

impl LegacyAsyncTransport {
    pub fn new() -> Self {
        Self
    }
}

fn execute_blocking(request: &HttpRequest) -> Result<HttpResponse, Failure> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .build()?;

    let method = match request.method() {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
    };
    let mut builder = client.request(method, request.url());
    for (name, value) in request.headers() {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let RequestBody::UrlEncoded(body) = request.request_body() {
        builder = builder.body(body.clone());
    }

    let response = builder.send()?;
    let status = response.status().as_u16();
    let headers: HashMap<String, String> = response
        .headers()
        .iter()
        .map(|(k, v)| (k.as_str().to_ascii_lowercase(), v.to_str().unwrap_or("").to_string()))
        .collect();
    let body = response.text()?;

    Ok(HttpResponse::with_headers(status, body, headers))
}

impl Transport for LegacyAsyncTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::LegacyAsync
    }

    fn send(&self, request: HttpRequest, sink: LifecycleSink) -> ExchangeHandle {
        let mut task_sink = sink.clone();
        let task = tokio::spawn(async move {
            task_sink.load_start();

            if request.request_body().is_multipart() {
                task_sink.error(TransportError::Unsupported("legacy-async").to_string());
                task_sink.load_end();
                return;
            }

            let timeout = request.timeout_duration();
            let blocking = tokio::task::spawn_blocking(move || execute_blocking(&request));
            let watchdog = async move {
                match timeout {
                    Some(limit) => tokio::time::sleep(limit).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                joined = blocking => {
                    let outcome = match joined {
                        Ok(outcome) => outcome,
                        Err(e) => Err(Failure::Network(e.to_string())),
                    };
                    finish(&task_sink, outcome);
                }
                _ = watchdog => {
                    log::debug!("legacy transport watchdog fired after {:?}", timeout);
                    task_sink.timeout();
                    task_sink.load_end();
                    task_sink.detach();
                }
            }
        });
        ExchangeHandle::cancellable(&sink, task.abort_handle())
    }
}
