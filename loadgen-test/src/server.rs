//! Exposes an in-process fake of the pet clinic REST API for use in integration tests.
//!
//! ```
//! use loadgen_test::server::TestServer;
//!
//! #[tokio::main]
//! async fn main() {
//!    let server = TestServer::new().await;
//!    let url = server.url("/api/customer/owners");
//!    // use the URL in tests...
//! }
//! ```
//!
//! The fake serves:
//!
//! - `GET /api/customer/owners`: all owners
//! - `GET /api/customer/owners/{id}`: a single owner, or `404`
//! - `POST /api/customer/owners`: creates an owner from the JSON body
//! - `GET /api/vet/vets`: a fixed list of veterinarians
//! - `GET /`: a health response

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// Path of the owners collection.
pub const OWNERS: &str = "/api/customer/owners";
/// Path of the veterinarians collection.
pub const VETS: &str = "/api/vet/vets";

/// Configures a [`TestServer`] before starting it.
#[derive(Debug, Default)]
pub struct TestServerBuilder {
    owners: usize,
    failing: bool,
    latency: Duration,
}

impl TestServerBuilder {
    /// Number of owners the service knows about on start.
    pub fn owners(mut self, owners: usize) -> Self {
        self.owners = owners;
        self
    }

    /// Answer every request with `500 Internal Server Error`.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Delay every response by `latency`.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Binds to a random port on localhost and starts serving.
    pub async fn start(self) -> TestServer {
        let owners = (1..=self.owners as u64).map(owner).collect();
        let state = Arc::new(Clinic {
            failing: self.failing,
            latency: self.latency,
            owners: Mutex::new(owners),
            requests: AtomicU64::new(0),
            created: AtomicU64::new(0),
        });

        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .route(OWNERS, get(list_owners).post(create_owner))
            .route(&format!("{OWNERS}/{{id}}"), get(get_owner))
            .route(VETS, get(list_vets))
            .layer(middleware::from_fn_with_state(state.clone(), intercept))
            .with_state(state.clone());

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let socket = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestServer {
            handle,
            socket,
            state,
        }
    }
}

/// An in-process fake target service for use in integration tests.
///
/// It listens on a random available port on `127.0.0.1` and stops when dropped.
#[derive(Debug)]
pub struct TestServer {
    handle: tokio::task::JoinHandle<()>,
    socket: SocketAddr,
    state: Arc<Clinic>,
}

impl TestServer {
    /// Starts a healthy server with 10 owners.
    pub async fn new() -> Self {
        Self::builder().owners(10).start().await
    }

    /// Creates a [`TestServerBuilder`] for a server without owners.
    pub fn builder() -> TestServerBuilder {
        TestServerBuilder::default()
    }

    /// Returns the base URL of this server.
    ///
    /// This URL uses the loopback IP, so no name resolution is involved.
    pub fn remote(&self) -> String {
        format!("http://{}", self.socket)
    }

    /// Returns a full URL pointing to the given path.
    pub fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("{}/{}", self.remote(), path)
    }

    /// Total number of requests received, including failed ones.
    pub fn requests(&self) -> u64 {
        self.state.requests.load(Ordering::Relaxed)
    }

    /// Number of owners created through `POST`.
    pub fn created(&self) -> u64 {
        self.state.created.load(Ordering::Relaxed)
    }

    /// Number of owners currently stored.
    pub fn owner_count(&self) -> usize {
        self.state.owners.lock().unwrap().len()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[derive(Debug)]
struct Clinic {
    failing: bool,
    latency: Duration,
    owners: Mutex<Vec<Value>>,
    requests: AtomicU64,
    created: AtomicU64,
}

fn owner(id: u64) -> Value {
    json!({
        "id": id,
        "firstName": format!("Owner {id}"),
        "lastName": "Test",
        "address": "Rua das Flores, 1",
        "city": "Sao Paulo",
        "telephone": "1234567890",
        "pets": [],
    })
}

async fn intercept(State(clinic): State<Arc<Clinic>>, request: Request, next: Next) -> Response {
    clinic.requests.fetch_add(1, Ordering::Relaxed);

    if !clinic.latency.is_zero() {
        tokio::time::sleep(clinic.latency).await;
    }
    if clinic.failing {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    next.run(request).await
}

async fn list_owners(State(clinic): State<Arc<Clinic>>) -> Json<Vec<Value>> {
    Json(clinic.owners.lock().unwrap().clone())
}

async fn get_owner(State(clinic): State<Arc<Clinic>>, Path(id): Path<u64>) -> Response {
    let owners = clinic.owners.lock().unwrap();
    match owners.iter().find(|owner| owner["id"] == id) {
        Some(owner) => Json(owner.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn create_owner(
    State(clinic): State<Arc<Clinic>>,
    Json(mut record): Json<Value>,
) -> Response {
    let Some(fields) = record.as_object_mut() else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let mut owners = clinic.owners.lock().unwrap();
    let id = owners.len() as u64 + 1;
    fields.insert("id".to_owned(), json!(id));
    owners.push(record.clone());
    clinic.created.fetch_add(1, Ordering::Relaxed);

    (StatusCode::CREATED, Json(record)).into_response()
}

async fn list_vets() -> Json<Value> {
    Json(json!([
        {"id": 1, "firstName": "James", "lastName": "Carter", "specialties": []},
        {
            "id": 2,
            "firstName": "Helen",
            "lastName": "Leary",
            "specialties": [{"id": 1, "name": "radiology"}],
        },
        {
            "id": 3,
            "firstName": "Linda",
            "lastName": "Douglas",
            "specialties": [{"id": 2, "name": "surgery"}],
        },
    ]))
}
