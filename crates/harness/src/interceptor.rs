//! Fetch interceptor
//!
//! Entry point for every outgoing request a page makes. Requests addressed
//! to the mocked endpoint are answered from the scenario; everything else is
//! handed back to the host untouched.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info_span};
use url::Url;

use neonmock_common::{MockError, MockResult};

use crate::config::EndpointConfig;
use crate::protocol::{parse_body, status_for, BatchResponse, ErrorBody, RequestBody};
use crate::scenario::{Failure, Scenario};

/// Lifecycle of one intercepted request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Received,
    Parsed,
    Matched,
    Executed,
    Encoded,
    Unmatched,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Received => "received",
            Phase::Parsed => "parsed",
            Phase::Matched => "matched",
            Phase::Executed => "executed",
            Phase::Encoded => "encoded",
            Phase::Unmatched => "unmatched",
            Phase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// An outgoing request as supplied by the browser automation layer
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl InterceptedRequest {
    pub fn post(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            method: "POST".to_string(),
            url: url.into(),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: body.into(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }
}

/// A response used to fulfill an intercepted request
#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl MockResponse {
    pub fn json<T: Serialize>(status: u16, body: &T) -> MockResult<Self> {
        Ok(Self {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Bytes::from(serde_json::to_vec(body)?),
        })
    }

    /// Error response carrying the failure's message and code
    pub fn error(err: &MockError) -> Self {
        let body = serde_json::to_vec(&ErrorBody::from(err)).unwrap_or_default();
        Self {
            status: status_for(err),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Bytes::from(body),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outcome of examining a request
#[derive(Debug, Clone, PartialEq)]
pub enum Interception {
    /// Not ours: let the request through
    Continue,
    /// Answer with this response
    Fulfill(MockResponse),
}

/// Decides whether a request targets the mocked database endpoint
#[derive(Debug, Clone)]
pub struct EndpointMatcher {
    host_suffix: String,
    path: String,
}

impl EndpointMatcher {
    pub fn new(host_suffix: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host_suffix: host_suffix.into().to_ascii_lowercase(),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn matches(&self, method: &str, url: &str) -> bool {
        if !method.eq_ignore_ascii_case("POST") {
            return false;
        }
        let Ok(url) = Url::parse(url) else {
            return false;
        };
        let host_ok = url
            .host_str()
            .is_some_and(|h| h.to_ascii_lowercase().ends_with(&self.host_suffix));
        host_ok && url.path() == self.path
    }
}

impl From<&EndpointConfig> for EndpointMatcher {
    fn from(config: &EndpointConfig) -> Self {
        Self::new(&config.host_suffix, &config.path)
    }
}

impl Default for EndpointMatcher {
    fn default() -> Self {
        Self::from(&EndpointConfig::default())
    }
}

/// Answers requests to the mocked endpoint from a scenario
#[derive(Debug, Clone)]
pub struct FetchInterceptor {
    scenario: Arc<Scenario>,
    matcher: EndpointMatcher,
}

impl FetchInterceptor {
    pub fn new(scenario: Arc<Scenario>, matcher: EndpointMatcher) -> Self {
        Self { scenario, matcher }
    }

    pub fn scenario(&self) -> &Arc<Scenario> {
        &self.scenario
    }

    pub fn matcher(&self) -> &EndpointMatcher {
        &self.matcher
    }

    /// Examine a request. Failures are recorded on the scenario and
    /// returned as `Err`, so a host that raises on error fails the test.
    pub fn intercept(&self, req: &InterceptedRequest) -> MockResult<Interception> {
        if !self.matcher.matches(&req.method, &req.url) {
            debug!(method = %req.method, url = %req.url, "passing request through");
            return Ok(Interception::Continue);
        }
        self.handle_body(&req.body).map(Interception::Fulfill)
    }

    /// Like [`intercept`](Self::intercept), but failures become error
    /// responses instead of `Err`. For hosts that must always answer.
    pub fn respond(&self, req: &InterceptedRequest) -> Interception {
        match self.intercept(req) {
            Ok(interception) => interception,
            Err(e) => Interception::Fulfill(MockResponse::error(&e)),
        }
    }

    /// Answer a request body already known to target the endpoint
    pub fn handle_body(&self, body: &[u8]) -> MockResult<MockResponse> {
        let span = info_span!("intercept", scenario = %self.scenario.name());
        let _guard = span.enter();
        debug!(phase = %Phase::Received, bytes = body.len());

        let request = parse_body(body).map_err(|e| self.fail(None, e))?;
        debug!(phase = %Phase::Parsed);

        match request {
            RequestBody::Single(query) => {
                let sql = query.query.as_str();
                let response = self
                    .scenario
                    .execute(sql, query.params)
                    .map_err(|e| self.fail(Some(sql), e))?;
                MockResponse::json(200, &response)
            }
            RequestBody::Batch { queries } => {
                debug!(statements = queries.len(), "running batch");
                let results = self
                    .scenario
                    .execute_batch(&queries)
                    .map_err(|e| self.fail(Some(&e.sql), e.error))?;
                MockResponse::json(200, &BatchResponse { results })
            }
        }
    }

    /// Record a failure and hand the error back
    fn fail(&self, sql: Option<&str>, err: MockError) -> MockError {
        let phase = match &err {
            MockError::UnmatchedQuery { .. } => Phase::Unmatched,
            _ => Phase::Failed,
        };
        error!(phase = %phase, sql = sql.unwrap_or(""), error = %err, "request failed");
        self.scenario.record_failure(Failure::new(phase, sql, &err));
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{delete_by_id, select_all, DeleteReturn};
    use neonmock_common::{ColumnDescriptor, RowRecord, Schema, TypeOid};
    use test_case::test_case;

    const SELECT: &str = "SELECT * FROM todos WHERE user_id = $1;";
    const DELETE: &str = "DELETE FROM todos WHERE id = $1 RETURNING *;";
    const ENDPOINT: &str = "https://ep-mock-123.us-east-2.aws.neon.tech/sql";

    fn interceptor() -> FetchInterceptor {
        let schema = Schema::new(vec![
            ColumnDescriptor::new("id", TypeOid::INT4),
            ColumnDescriptor::new("title", TypeOid::TEXT),
        ])
        .unwrap();
        let scenario = Scenario::builder(schema)
            .row(RowRecord::new().with("id", 1).with("title", "Make a cup of tea"))
            .on(SELECT, select_all())
            .on(DELETE, delete_by_id("id", 0, DeleteReturn::Removed))
            .build()
            .unwrap();
        FetchInterceptor::new(Arc::new(scenario), EndpointMatcher::default())
    }

    #[test_case("POST", ENDPOINT, true ; "neon endpoint")]
    #[test_case("post", ENDPOINT, true ; "method is case insensitive")]
    #[test_case("GET", ENDPOINT, false ; "get is not a query")]
    #[test_case("POST", "https://ep-mock-123.neon.tech/other", false ; "other path")]
    #[test_case("POST", "https://example.com/sql", false ; "other host")]
    #[test_case("POST", "not a url", false ; "unparseable url")]
    fn test_endpoint_matching(method: &str, url: &str, expected: bool) {
        assert_eq!(EndpointMatcher::default().matches(method, url), expected);
    }

    #[test]
    fn test_passthrough_is_untouched() {
        let interceptor = interceptor();
        let outcome = interceptor
            .intercept(&InterceptedRequest::get("https://example.com/index.html"))
            .unwrap();
        assert_eq!(outcome, Interception::Continue);
        assert!(interceptor.scenario().failures().is_empty());
    }

    #[test]
    fn test_matched_request_is_fulfilled() {
        let interceptor = interceptor();
        let body = serde_json::json!({"query": SELECT, "params": [7]}).to_string();
        let outcome = interceptor
            .intercept(&InterceptedRequest::post(ENDPOINT, body))
            .unwrap();

        let Interception::Fulfill(response) = outcome else {
            panic!("expected a fulfilled response");
        };
        assert_eq!(response.status, 200);
        let json: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(json["rows"], serde_json::json!([[1, "Make a cup of tea"]]));
        assert_eq!(json["command"], "SELECT");
        assert_eq!(json["rowCount"], 1);
    }

    #[test]
    fn test_unmatched_query_fails_with_sql() {
        let interceptor = interceptor();
        let body = serde_json::json!({"query": "DROP TABLE todos;", "params": []}).to_string();
        let req = InterceptedRequest::post(ENDPOINT, body);

        let err = interceptor.intercept(&req).unwrap_err();
        assert!(matches!(err, MockError::UnmatchedQuery { ref sql } if sql == "DROP TABLE todos;"));

        let failures = interceptor.scenario().failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].phase, Phase::Unmatched);
        assert_eq!(failures[0].sql.as_deref(), Some("DROP TABLE todos;"));

        let Interception::Fulfill(response) = interceptor.respond(&req) else {
            panic!("expected an error response");
        };
        assert_eq!(response.status, 500);
        let body: ErrorBody = serde_json::from_slice(&response.body).unwrap();
        assert!(body.message.contains("DROP TABLE todos;"));
    }

    #[test]
    fn test_failed_batch_statement_is_recorded_with_sql() {
        let interceptor = interceptor();
        let body = serde_json::json!({
            "queries": [
                { "query": SELECT, "params": [7] },
                { "query": "DELETE FROM todos WHERE id = $1;", "params": [9] },
            ]
        })
        .to_string();

        let err = interceptor
            .intercept(&InterceptedRequest::post(ENDPOINT, body))
            .unwrap_err();
        assert!(matches!(err, MockError::UnmatchedQuery { .. }));

        let failures = interceptor.scenario().failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].phase, Phase::Unmatched);
        assert_eq!(failures[0].sql.as_deref(), Some("DELETE FROM todos WHERE id = $1;"));
    }

    #[test]
    fn test_missing_record_in_batch_is_recorded_with_sql() {
        let interceptor = interceptor();
        let body = serde_json::json!({
            "queries": [{ "query": DELETE, "params": [9] }]
        })
        .to_string();

        let err = interceptor
            .intercept(&InterceptedRequest::post(ENDPOINT, body))
            .unwrap_err();
        assert!(matches!(err, MockError::RecordNotFound { .. }));

        let failures = interceptor.scenario().failures();
        assert_eq!(failures[0].phase, Phase::Failed);
        assert_eq!(failures[0].sql.as_deref(), Some(DELETE));
        assert!(!failures[0].defect);
        assert_eq!(interceptor.scenario().snapshot().len(), 1);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_phases_are_traced_in_order() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let interceptor = interceptor();
        let body = serde_json::json!({"query": SELECT, "params": [7]}).to_string();
        tracing::subscriber::with_default(subscriber, || {
            interceptor
                .intercept(&InterceptedRequest::post(ENDPOINT, body))
                .unwrap();
        });

        let output = String::from_utf8(logs.0.lock().clone()).unwrap();
        let positions: Vec<usize> = ["received", "parsed", "matched", "executed", "encoded"]
            .iter()
            .map(|phase| {
                output
                    .find(&format!("phase={phase}"))
                    .unwrap_or_else(|| panic!("phase {phase} not traced:\n{output}"))
            })
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{output}");
    }

    #[test]
    fn test_malformed_body_is_recorded() {
        let interceptor = interceptor();
        let err = interceptor
            .intercept(&InterceptedRequest::post(ENDPOINT, "{"))
            .unwrap_err();
        assert!(matches!(err, MockError::MalformedRequest(_)));
        assert_eq!(interceptor.scenario().failures()[0].phase, Phase::Failed);
    }
}
