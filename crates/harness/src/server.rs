//! HTTP mock endpoint
//!
//! Serves a scenario over real HTTP so an application under test can point
//! its database URL at the harness instead of relying on in-process fetch
//! interception.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use neonmock_common::{MockResult, RowRecord};

use crate::config::{check_path, HarnessConfig};
use crate::interceptor::{EndpointMatcher, FetchInterceptor, MockResponse};
use crate::scenario::{Failure, Scenario};

#[derive(Serialize)]
struct Health {
    status: &'static str,
    scenario: String,
    version: &'static str,
}

impl IntoResponse for MockResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, self.body).into_response();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                header::HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                response.headers_mut().insert(name, value);
            }
        }
        response
    }
}

/// Build the router for an interceptor. Fails when the matcher's path is
/// not absolute.
pub fn router(interceptor: Arc<FetchInterceptor>) -> MockResult<Router> {
    let sql_path = interceptor.matcher().path().to_string();
    check_path(&sql_path)?;
    Ok(Router::new()
        .route(&sql_path, post(query))
        .route("/health", get(health))
        .route("/_mock/rows", get(rows))
        .route("/_mock/failures", get(failures))
        .layer(TraceLayer::new_for_http())
        .with_state(interceptor))
}

/// Any host may post here: the listener itself is the mocked endpoint.
async fn query(State(interceptor): State<Arc<FetchInterceptor>>, body: Bytes) -> Response {
    match interceptor.handle_body(&body) {
        Ok(response) => response.into_response(),
        Err(e) => MockResponse::error(&e).into_response(),
    }
}

async fn health(State(interceptor): State<Arc<FetchInterceptor>>) -> Json<Health> {
    Json(Health {
        status: "ok",
        scenario: interceptor.scenario().name().to_string(),
        version: neonmock_common::VERSION,
    })
}

async fn rows(State(interceptor): State<Arc<FetchInterceptor>>) -> Json<Vec<RowRecord>> {
    Json(interceptor.scenario().snapshot())
}

async fn failures(State(interceptor): State<Arc<FetchInterceptor>>) -> Json<Vec<Failure>> {
    Json(interceptor.scenario().failures())
}

/// A bound mock endpoint
pub struct MockServer {
    listener: TcpListener,
    interceptor: Arc<FetchInterceptor>,
}

impl MockServer {
    /// Bind the configured listen address
    pub async fn bind(config: &HarnessConfig, scenario: Arc<Scenario>) -> MockResult<Self> {
        config.validate()?;
        let listener = TcpListener::bind(&config.listen).await?;
        let interceptor = Arc::new(FetchInterceptor::new(
            scenario,
            EndpointMatcher::from(&config.endpoint),
        ));
        Ok(Self {
            listener,
            interceptor,
        })
    }

    pub fn local_addr(&self) -> MockResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn interceptor(&self) -> &Arc<FetchInterceptor> {
        &self.interceptor
    }

    pub async fn serve(self) -> MockResult<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    pub async fn serve_with_shutdown<F>(self, signal: F) -> MockResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr()?;
        info!(
            "Mock endpoint for scenario '{}' listening on http://{}{}",
            self.interceptor.scenario().name(),
            addr,
            self.interceptor.matcher().path()
        );
        let app = router(self.interceptor)?;
        axum::serve(self.listener, app)
            .with_graceful_shutdown(signal)
            .await?;
        info!("Mock endpoint stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::select_all;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use neonmock_common::{ColumnDescriptor, Schema, TypeOid};
    use tower::ServiceExt;

    fn scenario() -> Arc<Scenario> {
        let schema = Schema::new(vec![ColumnDescriptor::new("id", TypeOid::INT4)]).unwrap();
        let scenario = Scenario::builder(schema)
            .name("server")
            .row(RowRecord::new().with("id", 1))
            .on("SELECT id FROM t;", select_all())
            .build()
            .unwrap();
        Arc::new(scenario)
    }

    fn app() -> Router {
        router(Arc::new(FetchInterceptor::new(
            scenario(),
            EndpointMatcher::default(),
        )))
        .unwrap()
    }

    async fn post_sql(app: Router, body: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::post("/sql")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_query_endpoint() {
        let (status, json) = post_sql(app(), r#"{"query":"SELECT id FROM t;","params":[]}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["rows"], serde_json::json!([[1]]));
        assert_eq!(json["fields"][0]["dataTypeID"], 23);
    }

    #[tokio::test]
    async fn test_unmatched_is_server_error() {
        let (status, json) = post_sql(app(), r#"{"query":"DROP TABLE todos;"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["code"], "unmatched_query");
    }

    #[tokio::test]
    async fn test_failures_are_exposed() {
        let app = app();
        let _ = post_sql(app.clone(), r#"{"query":"DROP TABLE todos;"}"#).await;
        let response = app
            .oneshot(Request::get("/_mock/failures").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let failures: Vec<Failure> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].sql.as_deref(), Some("DROP TABLE todos;"));
    }

    #[test]
    fn test_relative_path_is_rejected_by_router() {
        let interceptor = FetchInterceptor::new(scenario(), EndpointMatcher::new(".neon.tech", "sql"));
        let err = router(Arc::new(interceptor)).err().unwrap();
        assert!(matches!(err, neonmock_common::MockError::Config(_)));
    }

    #[tokio::test]
    async fn test_bind_rejects_relative_path() {
        let mut config = HarnessConfig::default();
        config.listen = "127.0.0.1:0".to_string();
        config.endpoint.path = "sql".to_string();
        let err = MockServer::bind(&config, scenario()).await.err().unwrap();
        assert!(matches!(err, neonmock_common::MockError::Config(_)));
    }
}
