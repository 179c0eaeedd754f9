//! Result ingestion gateway for externally-executed engine runs.

pub mod api;
pub mod server;

pub use api::{ImportedItem, ImportResultsRequest, ImportResultsResponse, ReportedOutcome};
pub use server::{api_key_from_env, IngestConfig, IngestServer, API_KEY_ENV, DEFAULT_API_KEY};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        CaseDefinition, CaseStatus, LoadTestConfig, Priority, ResultState, RunState, TestCase,
    };
    use crate::store::{MemoryStore, RunStore};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    const KEY: &str = "test-key";

    fn sample_case(id: &str) -> TestCase {
        TestCase {
            id: id.to_string(),
            title: format!("case {}", id),
            priority: Priority::Medium,
            status: CaseStatus::Active,
            definition: CaseDefinition::LoadTest(LoadTestConfig {
                target_url: "https://example.com".to_string(),
                virtual_users: 1,
                duration: "1s".to_string(),
                thresholds: None,
            }),
            timeout_ms: None,
        }
    }

    async fn setup(case_ids: &[&str]) -> (IngestServer, Arc<MemoryStore>, String) {
        let store = Arc::new(MemoryStore::new());
        for id in case_ids {
            store.insert_case(sample_case(id)).await.unwrap();
        }
        let ids: Vec<String> = case_ids.iter().map(|s| s.to_string()).collect();
        let run = store.create_run("imported", "ci", &ids).await.unwrap();
        let server = IngestServer::new(
            store.clone(),
            IngestConfig {
                port: 0,
                api_key: KEY.to_string(),
            },
        );
        (server, store, run.id)
    }

    fn post_results(key: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/results")
            .header("content-type", "application/json")
            .header("x-api-key", key)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_api_key_rejected_before_state_change() {
        let (server, store, run_id) = setup(&["a"]).await;
        let body = serde_json::json!({
            "runId": run_id,
            "results": [{ "testCaseId": "a", "exitCode": 0 }]
        });

        let response = server.router().oneshot(post_results("wrong", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // nothing was ingested
        let results = store.results(&run_id).await.unwrap();
        assert_eq!(results[0].state, ResultState::Pending);
    }

    #[tokio::test]
    async fn test_import_classifies_and_promotes_the_run() {
        let (server, store, run_id) = setup(&["a", "b"]).await;
        let body = serde_json::json!({
            "runId": run_id,
            "results": [
                { "testCaseId": "a", "exitCode": 0, "durationMs": 420 },
                { "testCaseId": "b", "exitCode": 1 }
            ]
        });

        let response = server.router().oneshot(post_results(KEY, body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let payload = json_body(response).await;
        assert_eq!(payload["runState"], "COMPLETED");
        assert_eq!(payload["items"][0]["result"]["state"], "PASS");
        assert_eq!(payload["items"][1]["result"]["state"], "FAIL");

        let results = store.results(&run_id).await.unwrap();
        assert_eq!(results[0].state, ResultState::Pass);
        assert_eq!(results[1].state, ResultState::Fail);
        assert_eq!(store.run(&run_id).await.unwrap().state, RunState::Completed);
    }

    #[tokio::test]
    async fn test_replayed_import_is_idempotent() {
        let (server, _store, run_id) = setup(&["a"]).await;
        let body = serde_json::json!({
            "runId": run_id,
            "results": [{ "testCaseId": "a", "exitCode": 0 }]
        });

        let first = server
            .router()
            .oneshot(post_results(KEY, body.clone()))
            .await
            .unwrap();
        let first_payload = json_body(first).await;
        assert_eq!(first_payload["items"][0]["result"]["state"], "PASS");

        // the replay is a no-op returning the stored outcome: the whole
        // response body is unchanged, timestamps included
        let second = server.router().oneshot(post_results(KEY, body)).await.unwrap();
        let second_payload = json_body(second).await;
        assert_eq!(first_payload, second_payload);
    }

    #[tokio::test]
    async fn test_unknown_run_is_not_found() {
        let (server, _store, _run_id) = setup(&["a"]).await;
        let body = serde_json::json!({
            "runId": "no-such-run",
            "results": [{ "testCaseId": "a", "exitCode": 0 }]
        });
        let response = server.router().oneshot(post_results(KEY, body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_case_rejected_per_item() {
        let (server, store, run_id) = setup(&["a"]).await;
        let body = serde_json::json!({
            "runId": run_id,
            "results": [
                { "testCaseId": "a", "exitCode": 0 },
                { "testCaseId": "ghost", "exitCode": 0 }
            ]
        });

        let response = server.router().oneshot(post_results(KEY, body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let payload = json_body(response).await;
        assert_eq!(payload["items"][0]["result"]["state"], "PASS");
        assert_eq!(payload["items"][1]["testCaseId"], "ghost");
        assert!(payload["items"][1]["error"].is_string());
        assert!(payload["items"][1].get("result").is_none());

        assert_eq!(
            store.results(&run_id).await.unwrap()[0].state,
            ResultState::Pass
        );
    }

    #[tokio::test]
    async fn test_timed_out_report_maps_to_blocked() {
        let (server, store, run_id) = setup(&["a"]).await;
        let body = serde_json::json!({
            "runId": run_id,
            "results": [{ "testCaseId": "a", "exitCode": null, "timedOut": true }]
        });

        server.router().oneshot(post_results(KEY, body)).await.unwrap();
        assert_eq!(
            store.results(&run_id).await.unwrap()[0].state,
            ResultState::Blocked
        );
    }

    #[tokio::test]
    async fn test_create_run_endpoint() {
        let (server, _store, _run_id) = setup(&["a"]).await;
        let request = Request::builder()
            .method("POST")
            .uri("/api/runs")
            .header("content-type", "application/json")
            .header("x-api-key", KEY)
            .body(Body::from(
                serde_json::json!({ "title": "nightly", "caseIds": ["a"] }).to_string(),
            ))
            .unwrap();

        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let payload = json_body(response).await;
        assert_eq!(payload["run"]["state"], "PENDING");
    }

    #[tokio::test]
    async fn test_health_needs_no_key() {
        let (server, _store, _run_id) = setup(&[]).await;
        let request = Request::builder()
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
