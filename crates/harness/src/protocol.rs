//! SQL-over-HTTP wire format

use serde::{Deserialize, Serialize};

use neonmock_common::{MockError, MockResult, Value};

use crate::encoder::QueryResponse;

/// One statement as sent by the driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

/// Request body: a single statement or a transaction batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestBody {
    Batch { queries: Vec<QueryRequest> },
    Single(QueryRequest),
}

/// Response body for a transaction batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub results: Vec<QueryResponse>,
}

/// Error body returned when a request cannot be answered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: String,
}

impl From<&MockError> for ErrorBody {
    fn from(err: &MockError) -> Self {
        Self {
            message: err.to_string(),
            code: err.code().to_string(),
        }
    }
}

/// Parse a request body
pub fn parse_body(body: &[u8]) -> MockResult<RequestBody> {
    if body.is_empty() {
        return Err(MockError::MalformedRequest("empty request body".to_string()));
    }
    serde_json::from_slice(body).map_err(|e| {
        MockError::MalformedRequest(format!(
            "expected {{\"query\", \"params\"}} or {{\"queries\"}}: {}",
            e
        ))
    })
}

/// HTTP status used when answering with an error body
pub fn status_for(err: &MockError) -> u16 {
    match err {
        MockError::RecordNotFound { .. } => 404,
        MockError::MalformedRequest(_)
        | MockError::MissingParam { .. }
        | MockError::InvalidParam { .. }
        | MockError::AmbiguousRecord { .. } => 400,
        _ => 500,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_parse_single() {
        let body = br#"{"query":"SELECT * FROM todos WHERE user_id = $1;","params":["7"]}"#;
        match parse_body(body).unwrap() {
            RequestBody::Single(q) => {
                assert_eq!(q.query, "SELECT * FROM todos WHERE user_id = $1;");
                assert_eq!(q.params, vec![Value::from("7")]);
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn test_parse_single_without_params() {
        let body = br#"{"query":"SELECT 1;"}"#;
        assert!(matches!(
            parse_body(body).unwrap(),
            RequestBody::Single(QueryRequest { ref params, .. }) if params.is_empty()
        ));
    }

    #[test]
    fn test_parse_batch() {
        let body = br#"{"queries":[{"query":"A;","params":[]},{"query":"B;","params":[1]}]}"#;
        match parse_body(body).unwrap() {
            RequestBody::Batch { queries } => {
                assert_eq!(queries.len(), 2);
                assert_eq!(queries[1].params, vec![Value::Int(1)]);
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test_case(b"" ; "empty")]
    #[test_case(b"not json" ; "not json")]
    #[test_case(br#"{"sql":"SELECT 1;"}"# ; "wrong key")]
    fn test_malformed(body: &[u8]) {
        assert!(matches!(parse_body(body), Err(MockError::MalformedRequest(_))));
    }

    #[test]
    fn test_status_mapping() {
        let unmatched = MockError::UnmatchedQuery { sql: "DROP TABLE todos;".into() };
        assert_eq!(status_for(&unmatched), 500);
        let body = ErrorBody::from(&unmatched);
        assert_eq!(body.code, "unmatched_query");
        assert!(body.message.ends_with("DROP TABLE todos;"));
    }
}
