//! Scripted HTTP server for failures wiremock cannot produce
//!
//! Each connection gets the next reply in the script; the last one repeats.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// One canned `200` reply
pub(crate) enum Reply {
    Full(Vec<u8>),
    /// Declares 500 more bytes than it sends, then closes the connection
    Truncated(Vec<u8>),
}

pub(crate) struct ScriptedServer {
    uri: String,
    hits: Arc<AtomicUsize>,
}

impl ScriptedServer {
    pub(crate) async fn start(replies: Vec<Reply>) -> Self {
        assert!(!replies.is_empty(), "script needs at least one reply");

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let uri = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let index = counter.fetch_add(1, Ordering::SeqCst);
                let (body, declared) = match &replies[index.min(replies.len() - 1)] {
                    Reply::Full(body) => (body, body.len()),
                    Reply::Truncated(body) => (body, body.len() + 500),
                };

                let mut request = [0u8; 8192];
                let _ = socket.read(&mut request).await;

                let head = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                    declared
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(body).await;
                let _ = socket.shutdown().await;
            }
        });

        Self { uri, hits }
    }

    pub(crate) fn uri(&self) -> &str {
        &self.uri
    }

    /// Connections accepted so far
    pub(crate) fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}
