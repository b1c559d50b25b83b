use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Scripted answer of the mock service.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
    pub delay: Option<Duration>,
}

impl MockResponse {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: None,
        }
    }

    /// Hold the response back, e.g. to simulate a hanging service.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Captured HTTP request from the mock service.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl CapturedRequest {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("request body should be JSON")
    }
}

/// Responses for one method + path. The last response repeats forever.
struct Route {
    method: String,
    path: String,
    responses: VecDeque<MockResponse>,
}

impl Route {
    fn next(&mut self) -> MockResponse {
        if self.responses.len() > 1 {
            self.responses.pop_front().expect("checked length")
        } else {
            self.responses
                .front()
                .cloned()
                .unwrap_or_else(|| MockResponse::text(500, "route has no responses"))
        }
    }
}

#[derive(Default)]
struct MockState {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<CapturedRequest>>,
}

/// In-process stand-in for a Task Execution Service.
pub struct MockTes {
    addr: std::net::SocketAddr,
    state: Arc<MockState>,
    _shutdown: tokio::sync::oneshot::Sender<()>,
}

#[derive(Default)]
pub struct MockTesBuilder {
    routes: Vec<Route>,
}

impl MockTesBuilder {
    /// Answer `method path` with `responses` in order, repeating the last one.
    pub fn on(mut self, method: &str, path: &str, responses: Vec<MockResponse>) -> Self {
        self.routes.push(Route {
            method: method.to_string(),
            path: path.to_string(),
            responses: responses.into(),
        });
        self
    }

    pub fn start(self) -> MockTes {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        listener.set_nonblocking(true).unwrap();
        let listener = tokio::net::TcpListener::from_std(listener).unwrap();

        let state = Arc::new(MockState {
            routes: Mutex::new(self.routes),
            requests: Mutex::new(Vec::new()),
        });
        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let server_state = state.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        if let Ok((stream, _)) = result {
                            let state = server_state.clone();
                            tokio::spawn(async move {
                                handle_connection(stream, state).await;
                            });
                        }
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
        });

        MockTes {
            addr,
            state,
            _shutdown: shutdown_tx,
        }
    }
}

impl MockTes {
    pub fn builder() -> MockTesBuilder {
        MockTesBuilder::default()
    }

    /// Base URL of the task collection.
    pub fn tasks_url(&self) -> String {
        format!("http://{}/v1/tasks", self.addr)
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Number of requests received for `method path`.
    pub fn hits(&self, method: &str, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    pub fn total_hits(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }
}

async fn handle_connection(mut stream: tokio::net::TcpStream, state: Arc<MockState>) {
    let mut buf = Vec::with_capacity(8192);
    let mut tmp = [0u8; 4096];
    let header_end;
    loop {
        let n = stream.read(&mut tmp).await.unwrap_or(0);
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&tmp[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            header_end = pos;
            break;
        }
    }
    let header_section = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let body_start = header_end + 4;

    let mut lines = header_section.lines();
    let request_line = lines.next().unwrap_or("").to_string();
    let mut headers = HashMap::new();
    for line in lines {
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_lowercase(), v.trim().to_string());
        }
    }

    let content_length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let already_read = buf.len() - body_start;
    if already_read < content_length {
        let mut body_buf = vec![0u8; content_length - already_read];
        stream
            .read_exact(&mut body_buf)
            .await
            .expect("failed to read request body");
        buf.extend_from_slice(&body_buf);
    }
    let body = String::from_utf8_lossy(&buf[body_start..body_start + content_length]).to_string();

    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("").to_string();
    let target = parts.next().unwrap_or("").to_string();
    let (path, query) = match target.split_once('?') {
        Some((p, q)) => (p.to_string(), Some(q.to_string())),
        None => (target.clone(), None),
    };

    let response = {
        let mut routes = state.routes.lock().unwrap();
        routes
            .iter_mut()
            .find(|r| r.method == method && r.path == path)
            .map(Route::next)
            .unwrap_or_else(|| MockResponse::text(404, "no such route"))
    };

    state.requests.lock().unwrap().push(CapturedRequest {
        method,
        path,
        query,
        headers,
        body,
    });

    if let Some(delay) = response.delay {
        tokio::time::sleep(delay).await;
    }

    let raw = format!(
        "HTTP/1.1 {} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status,
        response.body.len(),
        response.body
    );
    let _ = stream.write_all(raw.as_bytes()).await;
    let _ = stream.shutdown().await;
}
