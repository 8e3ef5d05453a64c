//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use haproxy_confd::config::ApiSettings;
use haproxy_confd::install::{CommandLine, CommandOutput, CommandRunner};

/// Start a programmable mock API server on an ephemeral port.
///
/// `f` receives the request path and returns the status and body to send.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let path = match read_request_path(&mut socket).await {
                            Some(path) => path,
                            None => return,
                        };
                        let (status, body) = f(path).await;
                        let status_text = match status {
                            200 => "200 OK",
                            403 => "403 Forbidden",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a mock API server that always answers with `body`.
pub async fn start_mock_api(body: String) -> SocketAddr {
    start_programmable_backend(move |_| {
        let body = body.clone();
        async move { (200, body) }
    })
    .await
}

/// Address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

async fn read_request_path(socket: &mut tokio::net::TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let head = String::from_utf8_lossy(&buf);
    head.lines()
        .next()?
        .split_whitespace()
        .nth(1)
        .map(str::to_string)
}

/// Plain HTTP API settings pointing at the given servers.
pub fn api_settings(servers: &[SocketAddr]) -> ApiSettings {
    ApiSettings {
        servers: servers.iter().map(|a| format!("http://{}", a)).collect(),
        timeout_secs: 5,
        ..ApiSettings::default()
    }
}

/// One endpoints record carrying the routing annotations.
pub fn annotated(name: &str, domain: &str, proto: &str, ips: &[&str], port: u16) -> Value {
    let addresses: Vec<Value> = ips.iter().map(|ip| json!({ "ip": ip })).collect();
    json!({
        "metadata": {
            "name": name,
            "annotations": { "domain": domain, "proto": proto }
        },
        "subsets": [{
            "addresses": addresses,
            "ports": [{ "port": port, "protocol": "TCP" }]
        }]
    })
}

/// Wrap records in an endpoints listing body.
pub fn listing(items: Vec<Value>) -> String {
    json!({ "kind": "EndpointsList", "items": items }).to_string()
}

/// Command runner that records every command and never spawns anything.
#[derive(Default)]
pub struct RecordingRunner {
    commands: Mutex<Vec<String>>,
    reject_check: AtomicBool,
    fail_reload: AtomicBool,
}

impl RecordingRunner {
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn reloads(&self) -> usize {
        self.commands()
            .iter()
            .filter(|c| c.starts_with("reload"))
            .count()
    }

    pub fn reject_check(&self, reject: bool) {
        self.reject_check.store(reject, Ordering::SeqCst);
    }

    pub fn fail_reload(&self, fail: bool) {
        self.fail_reload.store(fail, Ordering::SeqCst);
    }
}

impl CommandRunner for RecordingRunner {
    async fn run(&self, cmd: &CommandLine, _timeout: Duration) -> io::Result<CommandOutput> {
        self.commands.lock().unwrap().push(cmd.to_string());

        let failed = match cmd.program.as_str() {
            "check" => self.reject_check.load(Ordering::SeqCst),
            "reload" => self.fail_reload.load(Ordering::SeqCst),
            _ => false,
        };
        Ok(CommandOutput {
            success: !failed,
            status: if failed { "exit status: 1" } else { "exit status: 0" }.to_string(),
            stderr: if failed { "[ALERT] parse error".to_string() } else { String::new() },
        })
    }
}
