#![allow(dead_code)]

use std::collections::HashMap;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    routing::{delete, get},
    Router,
};
use tokio::sync::OnceCell;

pub const SERVICE_ROLE_KEY: &str = "service-role-test-key";

// Tokens the stub identity provider recognizes, and where they lead.
pub const VALID_TOKEN: &str = "valid-token";
pub const NO_ID_TOKEN: &str = "no-id-token";
pub const DOOMED_TOKEN: &str = "doomed-token";
pub const VALID_USER_ID: &str = "u-123";
pub const DOOMED_USER_ID: &str = "u-fail";

static HARNESS: OnceCell<Harness> = OnceCell::const_new();

/// Stub identity provider state: live tokens and the record of admin
/// deletions. Deleting a user revokes every token that mapped to it, so
/// a second deletion attempt with the same token fails upstream.
pub struct StubState {
    tokens: Mutex<HashMap<String, Option<String>>>,
    pub deleted: Mutex<Vec<String>>,
}

impl StubState {
    fn new() -> Self {
        let mut tokens = HashMap::new();
        tokens.insert(VALID_TOKEN.to_string(), Some(VALID_USER_ID.to_string()));
        tokens.insert(NO_ID_TOKEN.to_string(), None);
        tokens.insert(DOOMED_TOKEN.to_string(), Some(DOOMED_USER_ID.to_string()));
        Self {
            tokens: Mutex::new(tokens),
            deleted: Mutex::new(Vec::new()),
        }
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(String::from)
}

async fn whoami(State(state): State<Arc<StubState>>, headers: HeaderMap) -> impl IntoResponse {
    let known = bearer(&headers).and_then(|t| state.tokens.lock().unwrap().get(&t).cloned());
    match known {
        Some(Some(id)) => (
            StatusCode::OK,
            Json(serde_json::json!({ "id": id, "aud": "authenticated" })),
        )
            .into_response(),
        Some(None) => (
            StatusCode::OK,
            Json(serde_json::json!({ "aud": "authenticated" })),
        )
            .into_response(),
        None => (StatusCode::UNAUTHORIZED, "invalid or revoked token").into_response(),
    }
}

async fn admin_delete(
    State(state): State<Arc<StubState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let apikey = headers.get("apikey").and_then(|v| v.to_str().ok());
    if bearer(&headers).as_deref() != Some(SERVICE_ROLE_KEY) || apikey != Some(SERVICE_ROLE_KEY) {
        return (StatusCode::UNAUTHORIZED, "service role key required").into_response();
    }
    if id == DOOMED_USER_ID {
        return (StatusCode::INTERNAL_SERVER_ERROR, "database error deleting user").into_response();
    }

    let mut tokens = state.tokens.lock().unwrap();
    tokens.retain(|_, mapped| mapped.as_deref() != Some(id.as_str()));
    drop(tokens);

    state.deleted.lock().unwrap().push(id);
    (StatusCode::OK, Json(serde_json::json!({}))).into_response()
}

async fn start_stub() -> Result<(String, Arc<StubState>)> {
    let state = Arc::new(StubState::new());
    let state_for_server = state.clone();

    // Run the stub on its own dedicated runtime in a background thread. Each
    // `#[tokio::test]` builds (and drops) its own runtime, so spawning the
    // stub onto the ambient per-test runtime would kill it the moment the
    // first test finished, leaving the shared `OnceCell` harness pointing at a
    // dead provider for every later test. A dedicated runtime outlives them
    // all for the life of the test process.
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("build stub runtime");
        rt.block_on(async move {
            let router = Router::new()
                .route("/auth/v1/user", get(whoami))
                .route("/auth/v1/admin/users/:id", delete(admin_delete))
                .with_state(state_for_server);

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("failed to bind stub identity provider");
            let addr = listener.local_addr().expect("stub local addr");
            tx.send(addr).expect("report stub address");

            axum::serve(listener, router).await.expect("stub identity provider");
        });
    });

    let addr = rx.recv().context("stub failed to report its address")?;
    Ok((format!("http://{}", addr), state))
}

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn(envs: &[(&str, &str)], removed: &[&str]) -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_delete-account-api"));
        cmd.env("DELETE_ACCOUNT_API_PORT", port.to_string())
            .env_remove("PORT")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        for name in removed {
            cmd.env_remove(name);
        }
        for (name, value) in envs {
            cmd.env(name, value);
        }

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == reqwest::StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub struct Harness {
    pub base_url: String,
    pub stub: Arc<StubState>,
    _server: TestServer,
}

/// Shared harness: one stub identity provider plus one server process
/// configured against it, reused by every test in the file.
pub async fn ensure_server() -> &'static Harness {
    HARNESS
        .get_or_init(|| async {
            let (stub_url, stub) = start_stub().await.expect("stub identity provider");
            let server = TestServer::spawn(
                &[
                    ("SUPABASE_URL", &stub_url),
                    ("DELETE_ACCOUNT_SERVICE_ROLE_KEY", SERVICE_ROLE_KEY),
                ],
                &[],
            )
            .expect("failed to spawn server binary");
            server
                .wait_ready(Duration::from_secs(10))
                .await
                .expect("server did not become ready");
            Harness { base_url: server.base_url.clone(), stub, _server: server }
        })
        .await
}

/// A server with neither identity secret present, for the
/// missing-configuration contract.
pub async fn spawn_unconfigured() -> Result<TestServer> {
    let server = TestServer::spawn(&[], &["SUPABASE_URL", "DELETE_ACCOUNT_SERVICE_ROLE_KEY"])?;
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}
