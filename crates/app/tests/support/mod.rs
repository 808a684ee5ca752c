//! Shared test plumbing: a minimal HTTP/1.1 server on a local port and a
//! recording host implementation.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value as JsonValue;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use relay_application::ports::{Host, HostError, MarkerScope};

/// A request as seen by the test server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Path including the query string, exactly as sent.
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or(&self.target)
    }
}

/// Canned response returned by a handler.
#[derive(Debug, Clone)]
pub struct TestResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(status: u16, value: JsonValue) -> Self {
        Self {
            status,
            content_type: "application/json".to_string(),
            body: serde_json::to_vec(&value).unwrap(),
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain".to_string(),
            body: body.as_bytes().to_vec(),
        }
    }
}

type ServerHandler = Arc<dyn Fn(&RecordedRequest) -> TestResponse + Send + Sync>;

/// A tiny HTTP/1.1 server bound to `127.0.0.1:0`; one request per
/// connection, every request recorded.
pub struct TestServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl TestServer {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&RecordedRequest) -> TestResponse + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let requests: Arc<Mutex<Vec<RecordedRequest>>> = Arc::new(Mutex::new(Vec::new()));
        let handler: ServerHandler = Arc::new(handler);

        let requests_for_loop = Arc::clone(&requests);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let handler = Arc::clone(&handler);
                let requests = Arc::clone(&requests_for_loop);
                tokio::spawn(async move {
                    let _ = serve_connection(stream, handler, requests).await;
                });
            }
        });

        Self { addr, requests }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

async fn serve_connection(
    mut stream: tokio::net::TcpStream,
    handler: ServerHandler,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
) -> std::io::Result<()> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            return Ok(());
        }
        buffer.extend_from_slice(&chunk[..read]);
        if let Some(position) = find_header_end(&buffer) {
            break position;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split(' ');
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();

    let headers: Vec<(String, String)> = lines
        .filter_map(|line| {
            line.split_once(':')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        })
        .collect();

    let content_length: usize = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(0);

    let mut body = buffer[header_end + 4..].to_vec();
    while body.len() < content_length {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..read]);
    }
    body.truncate(content_length);

    let recorded = RecordedRequest {
        method,
        target,
        headers,
        body,
    };
    let response = handler(&recorded);
    requests.lock().unwrap().push(recorded);

    let head = format!(
        "HTTP/1.1 {} X\r\ncontent-type: {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
        response.status,
        response.content_type,
        response.body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(&response.body).await?;
    stream.flush().await?;
    Ok(())
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Host recording every report, with a fixture table and a flip-on-demand
/// cancellation flag.
#[derive(Default)]
pub struct TestHost {
    pub fixtures: HashMap<String, JsonValue>,
    pub events: Mutex<Vec<String>>,
    pub cancel: AtomicBool,
}

impl TestHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_fixtures(fixtures: &[(&str, JsonValue)]) -> Arc<Self> {
        Arc::new(Self {
            fixtures: fixtures
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
            ..Self::default()
        })
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl Host for TestHost {
    fn fixture_value(&self, name: &str) -> Result<JsonValue, HostError> {
        self.fixtures
            .get(name)
            .cloned()
            .ok_or_else(|| HostError::UnknownFixture(name.to_string()))
    }

    fn report_pass(&self, stage: &str, iteration: Option<&str>) {
        self.events
            .lock()
            .unwrap()
            .push(format!("pass:{stage}:{}", iteration.unwrap_or("-")));
    }

    fn report_fail(&self, stage: &str, iteration: Option<&str>, _error: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("fail:{stage}:{}", iteration.unwrap_or("-")));
    }

    fn report_skip(&self, stage: &str, iteration: Option<&str>, _reason: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("skip:{stage}:{}", iteration.unwrap_or("-")));
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn apply_markers(&self, _scope: MarkerScope, _target: &str, _markers: &[String]) {}
}
