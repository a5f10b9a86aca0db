//! Mock endpoint served over a real socket

use std::sync::Arc;
use std::time::Duration;

use neonmock_common::{FixedClock, Value};
use neonmock_harness::{HarnessConfig, MockServer, MockSpec, QueryResponse};
use tokio::sync::oneshot;

const SPEC: &str = r#"
name: todos-http
columns:
  - { name: id, dataTypeID: 25 }
  - { name: title, dataTypeID: 25 }
  - { name: done, dataTypeID: 16 }
seed:
  - { id: 1, title: Make a cup of tea, done: "false" }
queries:
  "SELECT * FROM todos WHERE user_id = $1;":
    kind: select
  "UPDATE todos SET done = $1 WHERE id = $2 RETURNING *;":
    kind: update
    where_param: 2
    set: { done: $1 }
"#;

async fn start() -> (String, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let config = HarnessConfig {
        listen: "127.0.0.1:0".to_string(),
        ..Default::default()
    };
    let scenario = MockSpec::from_yaml(SPEC)
        .unwrap()
        .into_scenario(Box::new(FixedClock::default()))
        .unwrap();
    let server = MockServer::bind(&config, Arc::new(scenario)).await.unwrap();
    let base_url = format!("http://{}", server.local_addr().unwrap());

    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        server
            .serve_with_shutdown(async {
                let _ = rx.await;
            })
            .await
            .unwrap();
    });
    (base_url, tx, handle)
}

#[tokio::test]
async fn serves_queries_over_http() {
    let (base_url, shutdown, handle) = start().await;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();

    let health = client.get(format!("{base_url}/health")).send().await.unwrap();
    assert!(health.status().is_success());

    let updated: QueryResponse = client
        .post(format!("{base_url}/sql"))
        .json(&serde_json::json!({
            "query": "UPDATE todos SET done = $1 WHERE id = $2 RETURNING *;",
            "params": ["true", "1"],
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated.rows[0][2], Value::from("true"));

    let rows: serde_json::Value = client
        .get(format!("{base_url}/_mock/rows"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(rows[0]["done"], "true");

    let unmatched = client
        .post(format!("{base_url}/sql"))
        .json(&serde_json::json!({ "query": "DROP TABLE todos;", "params": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(unmatched.status().as_u16(), 500);
    let body: serde_json::Value = unmatched.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().contains("DROP TABLE todos;"));

    shutdown.send(()).unwrap();
    handle.await.unwrap();
}
