//! Common test utilities for hook-keeper integration tests
//!
//! This module provides:
//! - Action handlers that record or block what the workers hand them
//! - Builders for application state, rules and signed requests
//! - Polling helpers for the asynchronous worker side

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use hook_keeper_api::{create_router, AppState, ServiceConfig};
use hook_keeper_core::{
    rules::Parameters, signature::compute_signature, template, Action, ActionError, ActionHandler,
    Condition, ConditionType, Event, Operator, Rule, RuleEngine, WorkerPool,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, Semaphore};
use tokio::time::{sleep, Duration, Instant};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Recording Handler
// ============================================================================

/// One call observed by [`RecordingHandler`]
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct RecordedCall {
    pub event_type: String,
    pub repository: String,
    /// `title` parameter after template substitution
    pub title: String,
}

/// Records every action it executes
#[derive(Clone, Default)]
pub struct RecordingHandler {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl ActionHandler for RecordingHandler {
    async fn execute(&self, event: &Event, action: &Action) -> Result<(), ActionError> {
        let title = action
            .parameter_str("title")
            .map(|t| template::render(t, event, &HashMap::new()))
            .unwrap_or_default();

        self.calls.lock().unwrap().push(RecordedCall {
            event_type: event.qualified_type(),
            repository: event.repository_name().to_string(),
            title,
        });
        Ok(())
    }

    fn validate_parameters(&self, _parameters: &Parameters) -> Result<(), ActionError> {
        Ok(())
    }
}

// ============================================================================
// Gate Handler
// ============================================================================

/// Blocks each execution until a permit is released
#[allow(dead_code)]
pub struct GateHandler {
    pub started: Notify,
    pub gate: Semaphore,
}

#[allow(dead_code)]
impl GateHandler {
    pub fn closed() -> Arc<Self> {
        Arc::new(Self {
            started: Notify::new(),
            gate: Semaphore::new(0),
        })
    }

    pub fn open(&self, permits: usize) {
        self.gate.add_permits(permits);
    }
}

#[async_trait::async_trait]
impl ActionHandler for GateHandler {
    async fn execute(&self, _event: &Event, _action: &Action) -> Result<(), ActionError> {
        self.started.notify_one();
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| ActionError::Handler(e.into()))?;
        permit.forget();
        Ok(())
    }

    fn validate_parameters(&self, _parameters: &Parameters) -> Result<(), ActionError> {
        Ok(())
    }
}

// ============================================================================
// Application Builders
// ============================================================================

/// Running application under test
#[allow(dead_code)]
pub struct TestApp {
    pub state: AppState,
    pub engine: Arc<RuleEngine>,
    pub pool: Arc<WorkerPool>,
    pub token: CancellationToken,
}

impl TestApp {
    /// Build state around `engine` with the given queue shape
    pub fn start(config: ServiceConfig, engine: RuleEngine, capacity: usize, workers: usize) -> Self {
        let engine = Arc::new(engine);
        let token = CancellationToken::new();
        let pool = Arc::new(WorkerPool::start(
            Arc::clone(&engine),
            capacity,
            workers,
            token.clone(),
        ));
        let state = AppState::new(config, Arc::clone(&engine), Arc::clone(&pool)).unwrap();

        Self {
            state,
            engine,
            pool,
            token,
        }
    }

    /// Send one request through a fresh router
    pub async fn send(&self, request: Request<Body>) -> Response {
        use tower::ServiceExt;

        create_router(self.state.clone())
            .oneshot(request)
            .await
            .unwrap()
    }
}

/// Engine with `handler` registered under `action_type`
pub fn engine_with_handler(action_type: &str, handler: Arc<dyn ActionHandler>) -> RuleEngine {
    let mut engine = RuleEngine::default();
    engine.register_handler(action_type, handler).unwrap();
    engine
}

/// Enabled rule on `event_type` running one action of `action_type`
pub fn rule_for(id: &str, event_type: &str, action_type: &str) -> Rule {
    Rule {
        id: id.to_string(),
        name: format!("Rule {}", id),
        enabled: true,
        conditions: vec![Condition::new(ConditionType::EventType, Operator::Equals, event_type)],
        actions: vec![Action::new(action_type)],
        ..Rule::default()
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Builder for webhook POSTs
pub struct WebhookRequestBuilder {
    path: String,
    headers: Vec<(String, String)>,
    body: String,
}

#[allow(dead_code)]
impl WebhookRequestBuilder {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            path: "/webhook".to_string(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Add `x-hub-signature-256` computed over the body
    pub fn signed(self, secret: &str) -> Self {
        let signature = compute_signature(secret.as_bytes(), self.body.as_bytes());
        self.header("x-hub-signature-256", &signature)
    }

    pub fn build(self) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(&self.path)
            .header("content-type", "application/json");
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder.body(Body::from(self.body)).unwrap()
    }
}

/// Unsigned GitHub-style delivery of `event_type`
pub fn github_delivery(event_type: &str, body: &str) -> Request<Body> {
    WebhookRequestBuilder::new(body)
        .header("x-github-event", event_type)
        .build()
}

pub async fn json_body(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ============================================================================
// Polling
// ============================================================================

/// Poll `condition` until it holds or two seconds pass
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    condition()
}
