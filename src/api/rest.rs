//! REST API Handlers
//!
//! Thin adapter from HTTP onto the component synchronizer. The application
//! path segment is the namespace the component lives in.

use crate::error::Error;
use crate::response::{ComponentDetails, ResponseBuilder};
use crate::sync::{ComponentRequest, ComponentSynchronizer};
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

// =============================================================================
// Request/Response Types
// =============================================================================

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl From<&Error> for ApiErrorResponse {
    fn from(e: &Error) -> Self {
        let failed = e.failed_plugins();
        Self {
            error: e.class().as_str().to_string(),
            message: e.to_string(),
            details: (!failed.is_empty()).then(|| format!("failed plugins: {}", failed.join(", "))),
        }
    }
}

fn error_response(e: Error) -> Response {
    let class = e.class();
    let status =
        StatusCode::from_u16(class.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if status.is_server_error() {
        error!("Request failed: {}", e);
    } else {
        debug!("Request rejected: {}", e);
    }

    (status, Json(ApiErrorResponse::from(&e))).into_response()
}

// =============================================================================
// REST Router
// =============================================================================

/// REST API router builder
pub struct RestRouter {
    synchronizer: ComponentSynchronizer,
    responses: ResponseBuilder,
    shutdown: CancellationToken,
}

impl RestRouter {
    /// Create a new REST router; `shutdown` parents every request's token
    pub fn new(
        synchronizer: ComponentSynchronizer,
        responses: ResponseBuilder,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            synchronizer,
            responses,
            shutdown,
        }
    }

    /// Build the Axum router
    pub fn build(self) -> Router {
        let state = AppState {
            synchronizer: self.synchronizer,
            responses: self.responses,
            shutdown: self.shutdown,
        };

        Router::new()
            .route(
                "/v1alpha1/applications/:application/components",
                get(list_components).post(create_component),
            )
            .route(
                "/v1alpha1/applications/:application/components/:name",
                get(get_component)
                    .put(update_component)
                    .delete(delete_component),
            )
            .route("/health", get(health_check))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    synchronizer: ComponentSynchronizer,
    responses: ResponseBuilder,
    shutdown: CancellationToken,
}

impl AppState {
    fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// List the components of an application
async fn list_components(
    State(state): State<AppState>,
    Path(application): Path<String>,
) -> Response {
    let cancel = state.request_token();

    let components = match state.synchronizer.list(&application, &cancel).await {
        Ok(components) => components,
        Err(e) => return error_response(e),
    };

    match state.responses.build_details_list(&components).await {
        Ok(details) => (StatusCode::OK, Json(details)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Get one component
async fn get_component(
    State(state): State<AppState>,
    Path((application, name)): Path<(String, String)>,
) -> Response {
    let cancel = state.request_token();

    match state.synchronizer.get(&application, &name, &cancel).await {
        Ok(component) => details_response(&state, StatusCode::OK, &component).await,
        Err(e) => error_response(e),
    }
}

/// Create a component and bind its plugins
async fn create_component(
    State(state): State<AppState>,
    Path(application): Path<String>,
    Json(request): Json<ComponentRequest>,
) -> Response {
    info!("Creating component in application {}", application);
    let cancel = state.request_token();

    match state.synchronizer.create(&application, request, &cancel).await {
        Ok(outcome) => details_response(&state, StatusCode::CREATED, &outcome.component).await,
        Err(e) => error_response(e),
    }
}

/// Replace a component and reconcile its plugins
async fn update_component(
    State(state): State<AppState>,
    Path((application, name)): Path<(String, String)>,
    Json(request): Json<ComponentRequest>,
) -> Response {
    info!("Updating component {}/{}", application, name);
    let cancel = state.request_token();

    match state
        .synchronizer
        .update(&application, &name, request, &cancel)
        .await
    {
        Ok(outcome) => details_response(&state, StatusCode::OK, &outcome.component).await,
        Err(e) => error_response(e),
    }
}

/// Delete a component and its plugin bindings
async fn delete_component(
    State(state): State<AppState>,
    Path((application, name)): Path<(String, String)>,
) -> Response {
    info!("Deleting component {}/{}", application, name);
    let cancel = state.request_token();

    match state.synchronizer.delete(&application, &name, &cancel).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

/// Health check
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn details_response(
    state: &AppState,
    status: StatusCode,
    component: &crate::crd::Component,
) -> Response {
    match state.responses.build_details(component).await {
        Ok(details) => (status, Json::<ComponentDetails>(details)).into_response(),
        Err(e) => error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{Component, ComponentPluginBinding};
    use crate::metrics::SyncMetrics;
    use crate::store::MemoryStore;
    use crate::sync::testing::SequentialClaimNames;
    use crate::sync::ComponentTranslator;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn router_with(shutdown: CancellationToken) -> Router {
        let synchronizer = ComponentSynchronizer::new(
            ComponentTranslator::new(Arc::new(SequentialClaimNames::default())),
            Arc::new(MemoryStore::<Component>::with_namespaces(["shop"])),
            Arc::new(MemoryStore::<ComponentPluginBinding>::with_namespaces(["shop"])),
            SyncMetrics::new(),
        );
        let responses = ResponseBuilder::new(synchronizer.reconciler().clone());
        RestRouter::new(synchronizer, responses, shutdown).build()
    }

    fn router() -> Router {
        router_with(CancellationToken::new())
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    const COMPONENTS: &str = "/v1alpha1/applications/shop/components";

    #[tokio::test]
    async fn test_component_lifecycle() {
        let app = router();

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                COMPONENTS,
                json!({
                    "name": "web",
                    "image": "nginx:1.25",
                    "volumes": [{"type": "pvc", "path": "/data", "size": "1Gi"}],
                    "plugins": [{"name": "a"}, {"name": "b"}]
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["name"], "web");
        assert_eq!(body["image"], "nginx:1.25");
        assert_eq!(body["claims"], json!(["pvc-web-1700000000-0"]));
        assert_eq!(body["plugins"].as_array().unwrap().len(), 2);

        let (status, body) = send(
            &app,
            json_request(
                "PUT",
                &format!("{}/web", COMPONENTS),
                json!({
                    "image": "nginx:1.26",
                    "plugins": [{"name": "b", "config": {"v": 2}}, {"name": "c"}]
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["image"], "nginx:1.26");
        let plugins: Vec<_> = body["plugins"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(plugins, vec!["b", "c"]);

        let (status, body) = send(&app, empty_request("GET", COMPONENTS)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, _) = send(&app, empty_request("DELETE", &format!("{}/web", COMPONENTS))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&app, empty_request("GET", &format!("{}/web", COMPONENTS))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let app = router();
        let web = json!({"name": "web"});

        let (status, _) = send(&app, json_request("POST", COMPONENTS, web.clone())).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(&app, json_request("POST", COMPONENTS, web)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "conflict");

        let (status, body) = send(&app, json_request("POST", COMPONENTS, json!({"image": "x"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");

        let (status, _) = send(
            &app,
            json_request(
                "PUT",
                &format!("{}/web", COMPONENTS),
                json!({"resourceVersion": "999"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(
            &app,
            json_request("POST", "/v1alpha1/applications/nowhere/components", json!({"name": "web"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_requests() {
        let shutdown = CancellationToken::new();
        let app = router_with(shutdown.clone());
        shutdown.cancel();

        let (status, body) = send(&app, json_request("POST", COMPONENTS, json!({"name": "web"}))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "cancelled");
    }

    #[tokio::test]
    async fn test_health() {
        let response = router()
            .oneshot(empty_request("GET", "/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_reconciliation_error_details() {
        let e = Error::Reconciliation {
            failures: vec![crate::error::BindingFailure {
                plugin: "sidecar/b".into(),
                operation: crate::error::BindingOperation::Create,
                reason: "timeout".into(),
            }],
        };
        let response = ApiErrorResponse::from(&e);
        assert_eq!(response.error, "reconciliation_error");
        assert_eq!(response.details.as_deref(), Some("failed plugins: sidecar/b"));
    }
}
