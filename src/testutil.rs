// Throw-away HTTP server for client tests: an axum fallback route that answers
// every request with the same canned response and records what it received.

use std::{
    net::TcpListener,
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, Method, StatusCode, Uri},
    response::Response,
    Router,
};

#[derive(Clone)]
pub struct CannedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub delay: Duration,
}

impl CannedResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self { status: 200, headers: vec![], body: body.into(), delay: Duration::ZERO }
    }

    pub fn json(body: &str) -> Self {
        Self::ok(body).header("Content-Type", "application/json")
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub content_type: Option<String>,
    pub body: String,
}

#[derive(Clone)]
struct Canned {
    response: CannedResponse,
    seen: Arc<Mutex<Vec<RecordedRequest>>>,
}

async fn answer(
    State(canned): State<Canned>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    canned.seen.lock().unwrap().push(RecordedRequest {
        method,
        path: uri.path().to_string(),
        content_type: headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: String::from_utf8_lossy(&body).into_owned(),
    });
    tokio::time::sleep(canned.response.delay).await;

    let mut builder = Response::builder().status(StatusCode::from_u16(canned.response.status).unwrap());
    for (name, value) in &canned.response.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder.body(Body::from(canned.response.body.clone())).unwrap()
}

pub struct CannedServer {
    pub base: String,
    seen: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl CannedServer {
    pub fn start(response: CannedResponse) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .fallback(answer)
            .with_state(Canned { response, seen: Arc::clone(&seen) });

        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                axum::serve(listener, app).await.unwrap();
            });
        });

        Self { base, seen }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn hits(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}
