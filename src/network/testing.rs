//! Local endpoints for transport tests

use super::transport::{LifecycleEvents, TransportEvent};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/faces/page.xhtml", listener.local_addr().unwrap());
    (listener, url)
}

/// Endpoint that accepts connections and never answers
pub(crate) async fn silent_server() -> String {
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(2)).await;
                drop(socket);
            });
        }
    });
    url
}

/// Endpoint answering one request with `body` once the returned sender fires
pub(crate) async fn gated_server(body: &'static str) -> (String, oneshot::Sender<()>) {
    let (listener, url) = bind().await;
    let (release, gate) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut buf = [0u8; 8192];
        let _ = socket.read(&mut buf).await;
        let _ = gate.await;
        let reply = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: text/xml\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let _ = socket.write_all(reply.as_bytes()).await;
        let _ = socket.shutdown().await;
    });
    (url, release)
}

/// Next lifecycle event other than progress, `None` once the channel closed
pub(crate) async fn next_event(events: &mut LifecycleEvents) -> Option<TransportEvent> {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("transport went quiet");
        if !matches!(event, Some(TransportEvent::Progress { .. })) {
            return event;
        }
    }
}

/// Whether the lifecycle stays silent until it closes
pub(crate) async fn stays_silent(events: &mut LifecycleEvents) -> bool {
    matches!(
        tokio::time::timeout(Duration::from_millis(800), events.recv()).await,
        Ok(None)
    )
}
