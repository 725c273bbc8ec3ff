#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use tower::ServiceExt;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::{fmt::MakeWriter, EnvFilter};

use cmdb_api::config::{AppConfig, DEFAULT_IDENTITY_HEADER};
use cmdb_api::testing::{Reply, ScriptedExecutor};
use cmdb_api::{app, AppState};

/// SQL fragment unique to the policy's role lookup.
pub const ROLE_LOOKUP: &str = "SELECT \"Role\" FROM \"Users\"";

/// SQL fragment unique to the active-user lookup by email.
pub const ACTIVE_USER: &str = "\"IsActive\" FROM \"Users\"";

pub struct TestApp {
    pub router: Router,
    pub executor: Arc<ScriptedExecutor>,
}

impl TestApp {
    pub fn new(config: AppConfig, executor: ScriptedExecutor) -> Self {
        let executor = Arc::new(executor);
        let router = app(AppState::new(config, executor.clone()));
        Self { router, executor }
    }

    /// Strict trust mode, no error details.
    pub fn strict(executor: ScriptedExecutor) -> Self {
        Self::new(AppConfig::production(), executor)
    }

    /// Development trust mode with error details exposed.
    pub fn development(executor: ScriptedExecutor) -> Self {
        Self::new(AppConfig::development(), executor)
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.expect("router is infallible");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).expect("JSON body") };
        (status, body)
    }

    pub async fn call(&self, method: Method, uri: &str, caller: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        self.send(request(method, uri, caller, body)).await
    }
}

/// Executor whose role lookup returns `role` for whoever asks.
pub fn caller_with_role(role: &str) -> ScriptedExecutor {
    ScriptedExecutor::new().on(ROLE_LOOKUP, Reply::row(json!({ "Role": role })))
}

pub fn principal(email: &str) -> String {
    STANDARD.encode(
        json!({
            "identityProvider": "aad",
            "userId": format!("id-{}", email),
            "userDetails": email,
            "userRoles": ["anonymous", "authenticated"]
        })
        .to_string(),
    )
}

pub fn request(method: Method, uri: &str, caller: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(email) = caller {
        builder = builder.header(DEFAULT_IDENTITY_HEADER, principal(email));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

/// In-memory sink for `audit` log records emitted on the current thread.
#[derive(Clone, Default)]
pub struct AuditLog(Arc<Mutex<Vec<u8>>>);

impl AuditLog {
    /// Install a thread-local subscriber keeping only the `audit` target.
    /// Records are captured until the guard drops.
    pub fn capture() -> (Self, DefaultGuard) {
        let log = Self::default();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("audit=info"))
            .with_writer(log.clone())
            .with_ansi(false)
            .finish();
        (log, tracing::subscriber::set_default(subscriber))
    }

    pub fn records(&self) -> Vec<String> {
        let bytes = self.0.lock().expect("audit log lock").clone();
        String::from_utf8_lossy(&bytes).lines().map(str::to_string).collect()
    }
}

impl io::Write for AuditLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("audit log lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for AuditLog {
    type Writer = AuditLog;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
