//! Hidden-frame transport
//!
//! Models a form submitted into an invisible frame: the post cannot be
//! cancelled once it left, so `abort` only flags the exchange and the
//! deferred result delivery is suppressed. There is no native timeout;
//! a client-side timer abandons the exchange instead.

use super::direct::{Failure, USER_AGENT, finish, perform};
use super::transport::{ExchangeHandle, LifecycleSink, Transport, TransportKind};
use super::HttpRequest;
use crate::utils::{Result, error::TransportError};

/// Fallback transport for multipart posts without native support
pub struct HiddenFrameTransport {
    client: reqwest::Client,
}

impl HiddenFrameTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for HiddenFrameTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::HiddenFrame
    }

    fn send(&self, request: HttpRequest, sink: LifecycleSink) -> ExchangeHandle {
        let client = self.client.clone();
        let task_sink = sink.clone();
        tokio::spawn(async move {
            task_sink.load_start();
            let submit = perform(&client, &request, false, None);
            let outcome = match request.timeout_duration() {
                Some(limit) => match tokio::time::timeout(limit, submit).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(Failure::Timeout),
                },
                None => submit.await,
            };
            // The frame's load callback fires on a later turn
            tokio::task::yield_now().await;
            if task_sink.is_aborted() {
                log::debug!("hidden frame result for {} dropped after abort", request.url());
                return;
            }
            finish(&task_sink, outcome);
        });
        ExchangeHandle::flag_only(&sink)
    }
}
