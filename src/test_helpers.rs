//! Scripted transport and fixtures shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Method;
use serde_json::{Value, json};

use crate::config::SessionOptions;
use crate::net::gateway::Gateway;
use crate::net::transport::{ApiRequest, ApiResponse, ApiTransport, TransportError};
use crate::net::types::{Credential, Identity};
use crate::state::session::SessionStore;
use crate::state::storage::{CredentialStorage, MemoryStorage};

pub const BASE_URL: &str = "http://backend.test";
pub const TOKEN: &str = "/api/token/";
pub const REFRESH: &str = "/api/token/refresh/";
pub const ME: &str = "/api/users/me/";

#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub bearer: Option<String>,
    pub body: Option<Value>,
}

type Scripted = Result<ApiResponse, TransportError>;

/// Replays queued responses per `METHOD path`. The last queued response for a
/// route repeats; unscripted routes answer 404.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self { delay: Some(delay), ..Self::default() })
    }

    pub fn on(&self, method: &str, path: &str, status: u16, body: Value) -> &Self {
        self.push(method, path, Ok(ApiResponse::json(status, &body)))
    }

    pub fn on_raw(&self, method: &str, path: &str, status: u16, body: &str) -> &Self {
        self.push(method, path, Ok(ApiResponse::new(status, body)))
    }

    pub fn fail(&self, method: &str, path: &str, error: TransportError) -> &Self {
        self.push(method, path, Err(error))
    }

    fn push(&self, method: &str, path: &str, scripted: Scripted) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .entry(format!("{method} {path}"))
            .or_default()
            .push_back(scripted);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.method.as_str() == method && call.path == path)
            .count()
    }

    pub fn last_call(&self, method: &str, path: &str) -> Option<RecordedCall> {
        self.calls()
            .into_iter()
            .rev()
            .find(|call| call.method.as_str() == method && call.path == path)
    }
}

#[async_trait::async_trait]
impl ApiTransport for MockTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let path = request
            .url
            .strip_prefix(BASE_URL)
            .unwrap_or(&request.url)
            .to_owned();
        let key = format!("{} {path}", request.method);
        self.calls.lock().unwrap().push(RecordedCall {
            method: request.method,
            path,
            bearer: request.bearer,
            body: request.body,
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if !queue.is_empty() => queue.front().cloned().unwrap(),
            _ => Ok(ApiResponse::json(404, &json!({ "detail": "Not found." }))),
        }
    }
}

/// Gateway over `transport`; `storage` clones share the same entries.
pub fn gateway(transport: &Arc<MockTransport>, storage: &MemoryStorage) -> Gateway {
    let transport: Arc<dyn ApiTransport> = transport.clone();
    let storage: Arc<dyn CredentialStorage> = Arc::new(storage.clone());
    Gateway::new(BASE_URL, transport, storage)
}

pub fn store(transport: &Arc<MockTransport>, storage: &MemoryStorage, options: SessionOptions) -> Arc<SessionStore> {
    let shared: Arc<dyn CredentialStorage> = Arc::new(storage.clone());
    Arc::new(SessionStore::new(gateway(transport, storage), shared, options))
}

pub fn ada_json() -> Value {
    json!({ "id": 1, "email": "a@x.com", "first_name": "Ada", "last_name": "Lovelace" })
}

pub fn ada() -> Identity {
    serde_json::from_value(ada_json()).unwrap()
}

pub fn t1() -> Credential {
    Credential::new("T1", "R1")
}
