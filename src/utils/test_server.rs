//! One-route HTTP/1.1 server on a loopback port for exercising real clients.

use reqwest::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub struct TestServer {
    addr: String,
    hits: Arc<AtomicUsize>,
}

impl TestServer {
    /// Answers the n-th connection with `replies[n]`, repeating the last reply after that.
    pub async fn start<S: Into<String>>(replies: Vec<S>) -> Self {
        let replies: Vec<String> = replies.into_iter().map(Into::into).collect();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let reply = &replies[n.min(replies.len() - 1)];

                // Drain headers and body so closing the socket does not reset it.
                let mut request = Vec::new();
                let mut chunk = [0u8; 4096];
                loop {
                    if let Some(head_end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                        let head = String::from_utf8_lossy(&request[..head_end]).to_ascii_lowercase();
                        let body_len = head
                            .lines()
                            .find_map(|l| l.strip_prefix("content-length:"))
                            .and_then(|v| v.trim().parse::<usize>().ok())
                            .unwrap_or(0);
                        if request.len() >= head_end + 4 + body_len {
                            break;
                        }
                    }
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(k) => request.extend_from_slice(&chunk[..k]),
                    }
                }
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Self { addr, hits }
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// A complete `Connection: close` response with the given status line and body.
pub fn reply(status: &str, body: &str) -> String {
    format!("HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}", status, body.len(), body)
}

/// Plain client that ignores proxy settings from the environment.
pub fn test_client() -> Client {
    Client::builder().no_proxy().build().unwrap()
}
