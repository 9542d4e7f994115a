//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::extract::{RawQuery, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use config_sync::error::{SyncError, SyncResult};
use config_sync::model::{
    ChangeNotification, ConfigSnapshot, DataGroup, GroupSnapshot, ListenOutcome, ListenRequest,
};
use config_sync::sync::SubscriberRegistry;
use config_sync::transport::SyncTransport;

// ---------------------------------------------------------------------------
// Mock config authority over real HTTP
// ---------------------------------------------------------------------------

/// A request seen by the mock authority.
#[derive(Debug, Clone)]
pub struct MockRequest {
    /// Zero-based index of this call on its endpoint.
    pub index: u32,
    /// `groupKeys` query values (fetch only).
    pub groups: Vec<String>,
    /// JSON body (listen only).
    pub body: Value,
}

type Reply = Pin<Box<dyn Future<Output = (u16, String)> + Send>>;
type Responder = Arc<dyn Fn(MockRequest) -> Reply + Send + Sync>;

#[derive(Clone)]
struct MockState {
    fetch: Responder,
    listen: Responder,
    fetch_hits: Arc<AtomicU32>,
    listen_hits: Arc<AtomicU32>,
    listen_bodies: Arc<Mutex<Vec<Value>>>,
}

/// Handle to a running mock authority.
pub struct MockAuthority {
    pub addr: SocketAddr,
    pub fetch_hits: Arc<AtomicU32>,
    pub listen_hits: Arc<AtomicU32>,
    pub listen_bodies: Arc<Mutex<Vec<Value>>>,
}

impl MockAuthority {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn fetches(&self) -> u32 {
        self.fetch_hits.load(Ordering::SeqCst)
    }

    pub fn listens(&self) -> u32 {
        self.listen_hits.load(Ordering::SeqCst)
    }
}

/// Start a programmable mock authority on an ephemeral port.
pub async fn start_mock_authority<F, FFut, L, LFut>(fetch: F, listen: L) -> MockAuthority
where
    F: Fn(MockRequest) -> FFut + Send + Sync + 'static,
    FFut: Future<Output = (u16, String)> + Send + 'static,
    L: Fn(MockRequest) -> LFut + Send + Sync + 'static,
    LFut: Future<Output = (u16, String)> + Send + 'static,
{
    let state = MockState {
        fetch: Arc::new(move |req| Box::pin(fetch(req)) as Reply),
        listen: Arc::new(move |req| Box::pin(listen(req)) as Reply),
        fetch_hits: Arc::new(AtomicU32::new(0)),
        listen_hits: Arc::new(AtomicU32::new(0)),
        listen_bodies: Arc::new(Mutex::new(Vec::new())),
    };
    let fetch_hits = state.fetch_hits.clone();
    let listen_hits = state.listen_hits.clone();
    let listen_bodies = state.listen_bodies.clone();

    let app = Router::new()
        .route("/configs/fetch", get(fetch_handler))
        .route("/configs/listener", post(listen_handler))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockAuthority {
        addr,
        fetch_hits,
        listen_hits,
        listen_bodies,
    }
}

async fn fetch_handler(
    State(state): State<MockState>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    let groups = query
        .unwrap_or_default()
        .split('&')
        .filter_map(|kv| kv.strip_prefix("groupKeys="))
        .map(str::to_string)
        .collect();
    let index = state.fetch_hits.fetch_add(1, Ordering::SeqCst);
    let (status, body) = (state.fetch)(MockRequest {
        index,
        groups,
        body: Value::Null,
    })
    .await;
    json_response(status, body)
}

async fn listen_handler(State(state): State<MockState>, body: String) -> impl IntoResponse {
    let body: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    state.listen_bodies.lock().unwrap().push(body.clone());
    let index = state.listen_hits.fetch_add(1, Ordering::SeqCst);
    let (status, body) = (state.listen)(MockRequest {
        index,
        groups: Vec::new(),
        body,
    })
    .await;
    json_response(status, body)
}

fn json_response(status: u16, body: String) -> impl IntoResponse {
    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
}

/// Fetch response body with the given groups at the given versions.
pub fn fetch_body(entries: &[(&str, u64)]) -> String {
    let mut data = serde_json::Map::new();
    for (group, version) in entries {
        data.insert(
            group.to_string(),
            json!({
                "version": version.to_string(),
                "items": [{ "id": format!("{}-{}", group, version), "enabled": true }],
            }),
        );
    }
    json!({ "code": 200, "message": "success", "data": data }).to_string()
}

/// Listener response body naming the changed groups.
pub fn listen_body(groups: &[&str]) -> String {
    json!({ "code": 200, "message": "success", "data": groups }).to_string()
}

// ---------------------------------------------------------------------------
// Scripted in-memory transport
// ---------------------------------------------------------------------------

/// What the next long-poll does.
#[derive(Debug, Clone)]
pub enum ListenStep {
    Changed(Vec<DataGroup>),
    Timeout,
    Fail,
    /// Never answer, like a server holding the connection.
    Hold,
}

type FetchFn = Box<dyn Fn(&[DataGroup], u32) -> SyncResult<ConfigSnapshot> + Send + Sync>;

/// `SyncTransport` replaying a listen script; fetches answered by a closure.
///
/// Once the script runs out every long-poll holds forever.
pub struct ScriptedTransport {
    listen_script: Mutex<VecDeque<ListenStep>>,
    fetch_fn: FetchFn,
    fetch_count: AtomicU32,
    pub fetch_calls: Mutex<Vec<Vec<DataGroup>>>,
    pub listen_calls: Mutex<Vec<(Instant, ListenRequest)>>,
    listen_in_flight: AtomicUsize,
    pub max_listen_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new<F>(script: Vec<ListenStep>, fetch: F) -> Arc<Self>
    where
        F: Fn(&[DataGroup], u32) -> SyncResult<ConfigSnapshot> + Send + Sync + 'static,
    {
        Arc::new(Self {
            listen_script: Mutex::new(script.into()),
            fetch_fn: Box::new(fetch),
            fetch_count: AtomicU32::new(0),
            fetch_calls: Mutex::new(Vec::new()),
            listen_calls: Mutex::new(Vec::new()),
            listen_in_flight: AtomicUsize::new(0),
            max_listen_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn listen_count(&self) -> usize {
        self.listen_calls.lock().unwrap().len()
    }

    /// Long-polls currently awaiting an answer.
    pub fn listen_in_flight(&self) -> usize {
        self.listen_in_flight.load(Ordering::SeqCst)
    }

    pub fn listen_request(&self, index: usize) -> Option<ListenRequest> {
        self.listen_calls.lock().unwrap().get(index).map(|(_, r)| r.clone())
    }

    pub fn listen_instants(&self) -> Vec<Instant> {
        self.listen_calls.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SyncTransport for ScriptedTransport {
    async fn fetch(&self, groups: &[DataGroup]) -> SyncResult<ConfigSnapshot> {
        self.fetch_calls.lock().unwrap().push(groups.to_vec());
        let index = self.fetch_count.fetch_add(1, Ordering::SeqCst);
        (self.fetch_fn)(groups, index)
    }

    async fn listen(&self, request: &ListenRequest) -> SyncResult<ListenOutcome> {
        let in_flight = self.listen_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.listen_in_flight);
        self.max_listen_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        self.listen_calls
            .lock()
            .unwrap()
            .push((Instant::now(), request.clone()));
        let step = self
            .listen_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ListenStep::Hold);

        // Give a concurrent caller, if there were one, the chance to overlap.
        tokio::task::yield_now().await;

        match step {
            ListenStep::Changed(groups) => {
                Ok(ListenOutcome::Changed(ChangeNotification::new(groups)))
            }
            ListenStep::Timeout => Ok(ListenOutcome::Timeout),
            ListenStep::Fail => Err(SyncError::Transport {
                url: "scripted://listener".to_string(),
                message: "connection refused".to_string(),
            }),
            ListenStep::Hold => std::future::pending().await,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Snapshot with one item per group at the given versions.
pub fn snapshot(entries: &[(DataGroup, &str)]) -> ConfigSnapshot {
    let mut snapshot = ConfigSnapshot::new();
    for (group, version) in entries {
        snapshot.insert(
            *group,
            GroupSnapshot::new(
                *version,
                vec![json!({ "group": group.as_str(), "version": version })],
            ),
        );
    }
    snapshot
}

pub fn fetch_failure() -> SyncError {
    SyncError::Status {
        url: "scripted://fetch".to_string(),
        status: 500,
    }
}

/// Everything a registry delivered, in order.
pub type Deliveries = Arc<Mutex<Vec<(DataGroup, String)>>>;

/// Register a recording subscriber for each of `groups`.
pub fn record_deliveries(registry: &SubscriberRegistry, groups: &[DataGroup]) -> Deliveries {
    let deliveries: Deliveries = Arc::new(Mutex::new(Vec::new()));
    for &group in groups {
        let deliveries = deliveries.clone();
        registry.register_fn(group, move |group, snap| {
            deliveries
                .lock()
                .unwrap()
                .push((group, snap.version.to_string()));
        });
    }
    deliveries
}

pub fn versions_of(deliveries: &Deliveries, group: DataGroup) -> Vec<String> {
    deliveries
        .lock()
        .unwrap()
        .iter()
        .filter(|(g, _)| *g == group)
        .map(|(_, v)| v.clone())
        .collect()
}

/// Poll `condition` every 10ms until it holds or `timeout` elapses.
pub async fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
