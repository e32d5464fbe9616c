use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::{TestRequest, TestServer};
use serde_json::{Value, json};
use std::sync::Arc;
use uuid::Uuid;

use cron_orchestrator::{
    config::SchedulerConfig,
    database::Database,
    job_scheduling::JobOrchestrator,
    repositories::{JobSeaOrmRepository, JobStore},
    web::{AppState, create_router},
};

/// Far enough away that no timer fires during a test
const NEVER: &str = "0 0 1 1 *";

struct Caller {
    user_id: Uuid,
    org_id: Uuid,
    role: &'static str,
}

impl Caller {
    fn user(org_id: Uuid) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            org_id,
            role: "user",
        }
    }

    fn admin(org_id: Uuid) -> Self {
        Self {
            role: "admin",
            ..Self::user(org_id)
        }
    }

    fn sign(&self, request: TestRequest) -> TestRequest {
        request
            .add_header(
                HeaderName::from_static("x-user-id"),
                HeaderValue::from_str(&self.user_id.to_string()).unwrap(),
            )
            .add_header(
                HeaderName::from_static("x-org-id"),
                HeaderValue::from_str(&self.org_id.to_string()).unwrap(),
            )
            .add_header(
                HeaderName::from_static("x-user-role"),
                HeaderValue::from_static(self.role),
            )
    }
}

async fn setup() -> (TestServer, Arc<JobOrchestrator>) {
    let database = Database::new_in_memory().await.unwrap();
    database.migrate().await.unwrap();
    let store: Arc<dyn JobStore> = Arc::new(JobSeaOrmRepository::new(database.connection.clone()));
    let orchestrator =
        Arc::new(JobOrchestrator::from_config(store, &SchedulerConfig::default()).unwrap());
    let router = create_router(AppState::new(orchestrator.clone(), database));
    (TestServer::new(router).unwrap(), orchestrator)
}

fn shell_job(name: &str, command: &str) -> Value {
    json!({
        "name": name,
        "type": "shell",
        "schedule": NEVER,
        "payload": {"command": command},
    })
}

async fn create(server: &TestServer, caller: &Caller, body: Value) -> Value {
    let response = caller.sign(server.post("/api/v1/jobs")).json(&body).await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["data"].clone()
}

#[tokio::test]
async fn health_reports_database_and_triggers() {
    let (server, orchestrator) = setup().await;

    let response = server.get("/health").await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["database"], "connected");
    assert_eq!(body["data"]["scheduled_triggers"], 0);
    orchestrator.shutdown();
}

#[tokio::test]
async fn requests_without_identity_are_unauthorized() {
    let (server, _) = setup().await;

    let response = server.get("/api/v1/jobs").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["success"], false);
}

#[tokio::test]
async fn create_then_get_and_list() {
    let (server, orchestrator) = setup().await;
    let caller = Caller::user(Uuid::new_v4());

    let job = create(
        &server,
        &caller,
        json!({
            "name": "ping",
            "type": "http",
            "schedule": "*/5 * * * *",
            "payload": {"url": "https://example.com/ping", "method": "get"},
            "retry_limit": 2,
            "webhook_url": "https://hooks.example.com/ping",
        }),
    )
    .await;

    assert_eq!(job["type"], "http");
    assert_eq!(job["payload"]["method"], "GET");
    assert_eq!(job["retry_limit"], 2);
    assert_eq!(job["enabled"], true);
    assert_eq!(job["is_scheduled"], true);
    assert!(job["next_run_at"].is_string());

    let id = job["id"].as_str().unwrap();
    let fetched = caller.sign(server.get(&format!("/api/v1/jobs/{id}"))).await;
    fetched.assert_status_ok();
    assert_eq!(fetched.json::<Value>()["data"]["name"], "ping");

    let listed = caller.sign(server.get("/api/v1/jobs")).await;
    assert_eq!(listed.json::<Value>()["data"].as_array().unwrap().len(), 1);
    orchestrator.shutdown();
}

#[tokio::test]
async fn validation_failures_are_bad_requests() {
    let (server, _) = setup().await;
    let caller = Caller::user(Uuid::new_v4());

    let cases = [
        json!({"name": "x", "type": "ftp", "schedule": NEVER, "payload": {}}),
        json!({"name": "x", "type": "http", "schedule": NEVER, "payload": {"url": "https://a.b"}}),
        json!({"name": "x", "type": "shell", "schedule": NEVER, "payload": {}}),
        json!({"name": "x", "type": "shell", "schedule": "61 * * * *", "payload": {"command": "true"}}),
        json!({"name": "", "type": "shell", "schedule": NEVER, "payload": {"command": "true"}}),
        json!({"name": "x", "type": "shell", "schedule": NEVER, "payload": {"command": "true"}, "retry_limit": -1}),
        json!({"name": "x", "type": "shell", "schedule": NEVER, "payload": {"command": "true"}, "depends_on": ["nope"]}),
        json!({"schedule": NEVER}),
    ];
    for body in cases {
        let response = caller.sign(server.post("/api/v1/jobs")).json(&body).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    let listed = caller.sign(server.get("/api/v1/jobs")).await;
    assert!(listed.json::<Value>()["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn dependency_cycle_is_a_conflict() {
    let (server, orchestrator) = setup().await;
    let caller = Caller::user(Uuid::new_v4());

    let a = create(&server, &caller, shell_job("a", "true")).await;
    let a_id = a["id"].as_str().unwrap().to_string();
    let mut b_body = shell_job("b", "true");
    b_body["depends_on"] = json!([a_id]);
    let b = create(&server, &caller, b_body).await;
    let b_id = b["id"].as_str().unwrap().to_string();

    let response = caller
        .sign(server.put(&format!("/api/v1/jobs/{a_id}")))
        .json(&json!({"depends_on": [b_id]}))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body = response.json::<Value>();
    assert_eq!(body["details"]["path"], format!("{a_id},{b_id},{a_id}"));

    let delete = caller
        .sign(server.delete(&format!("/api/v1/jobs/{a_id}")))
        .await;
    delete.assert_status(StatusCode::CONFLICT);
    orchestrator.shutdown();
}

#[tokio::test]
async fn toggle_update_and_delete() {
    let (server, orchestrator) = setup().await;
    let caller = Caller::user(Uuid::new_v4());
    let job = create(&server, &caller, shell_job("lifecycle", "true")).await;
    let id = job["id"].as_str().unwrap();

    let toggled = caller
        .sign(server.patch(&format!("/api/v1/jobs/{id}/toggle")))
        .await;
    toggled.assert_status_ok();
    let toggled = toggled.json::<Value>();
    assert_eq!(toggled["data"]["enabled"], false);
    assert_eq!(toggled["data"]["is_scheduled"], false);
    assert!(toggled["data"]["next_run_at"].is_null());

    let updated = caller
        .sign(server.put(&format!("/api/v1/jobs/{id}")))
        .json(&json!({"enabled": true, "schedule": "15 4 * * *"}))
        .await;
    updated.assert_status_ok();
    let updated = updated.json::<Value>();
    assert_eq!(updated["data"]["schedule"], "15 4 * * *");
    assert_eq!(updated["data"]["is_scheduled"], true);
    assert_eq!(orchestrator.registry().scheduled_count(), 1);

    caller
        .sign(server.delete(&format!("/api/v1/jobs/{id}")))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    caller
        .sign(server.get(&format!("/api/v1/jobs/{id}")))
        .await
        .assert_status_not_found();
    assert_eq!(orchestrator.registry().scheduled_count(), 0);
}

#[tokio::test]
async fn manual_run_and_history() {
    let (server, orchestrator) = setup().await;
    let caller = Caller::user(Uuid::new_v4());
    let job = create(&server, &caller, shell_job("manual", "echo from-api")).await;
    let id = job["id"].as_str().unwrap();

    let run = caller
        .sign(server.post(&format!("/api/v1/jobs/{id}/run")))
        .await;
    run.assert_status_ok();
    let run = run.json::<Value>();
    assert_eq!(run["data"]["outcome"], "recorded");
    assert_eq!(run["data"]["record"]["status"], "success");
    assert_eq!(run["data"]["record"]["output"]["stdout"], "from-api\n");

    let history = caller
        .sign(server.get(&format!("/api/v1/jobs/{id}/executions?limit=5")))
        .await;
    history.assert_status_ok();
    let records = history.json::<Value>()["data"].clone();
    assert_eq!(records.as_array().unwrap().len(), 1);
    assert_eq!(records[0]["retry_count"], 0);
    orchestrator.shutdown();
}

#[tokio::test]
async fn blocked_manual_run_reports_skip() {
    let (server, orchestrator) = setup().await;
    let caller = Caller::user(Uuid::new_v4());
    let upstream = create(&server, &caller, shell_job("upstream", "exit 1")).await;
    let upstream_id = upstream["id"].as_str().unwrap().to_string();
    let mut body = shell_job("downstream", "true");
    body["depends_on"] = json!([upstream_id]);
    let downstream = create(&server, &caller, body).await;
    let downstream_id = downstream["id"].as_str().unwrap();

    let skipped = caller
        .sign(server.post(&format!("/api/v1/jobs/{downstream_id}/run")))
        .await
        .json::<Value>();
    assert_eq!(skipped["data"]["outcome"], "skipped");

    let failed = caller
        .sign(server.post(&format!("/api/v1/jobs/{upstream_id}/run")))
        .await
        .json::<Value>();
    assert_eq!(failed["data"]["record"]["status"], "failure");
    assert_eq!(failed["data"]["record"]["error"]["code"], 1);

    let still_skipped = caller
        .sign(server.post(&format!("/api/v1/jobs/{downstream_id}/run")))
        .await
        .json::<Value>();
    assert_eq!(still_skipped["data"]["outcome"], "skipped");

    let history = caller
        .sign(server.get(&format!("/api/v1/jobs/{downstream_id}/executions")))
        .await
        .json::<Value>();
    assert!(history["data"].as_array().unwrap().is_empty());
    orchestrator.shutdown();
}

#[tokio::test]
async fn other_organization_gets_not_found() {
    let (server, orchestrator) = setup().await;
    let owner = Caller::user(Uuid::new_v4());
    let outsider = Caller::admin(Uuid::new_v4());
    let job = create(&server, &owner, shell_job("private", "true")).await;
    let id = job["id"].as_str().unwrap();

    outsider
        .sign(server.get(&format!("/api/v1/jobs/{id}")))
        .await
        .assert_status_not_found();
    outsider
        .sign(server.put(&format!("/api/v1/jobs/{id}")))
        .json(&json!({"name": "stolen"}))
        .await
        .assert_status_not_found();
    outsider
        .sign(server.patch(&format!("/api/v1/jobs/{id}/toggle")))
        .await
        .assert_status_not_found();
    outsider
        .sign(server.post(&format!("/api/v1/jobs/{id}/run")))
        .await
        .assert_status_not_found();
    outsider
        .sign(server.get(&format!("/api/v1/jobs/{id}/executions")))
        .await
        .assert_status_not_found();
    outsider
        .sign(server.delete(&format!("/api/v1/jobs/{id}")))
        .await
        .assert_status_not_found();
    outsider
        .sign(server.get("/api/v1/jobs/not-a-uuid"))
        .await
        .assert_status_not_found();

    let fetched = owner.sign(server.get(&format!("/api/v1/jobs/{id}"))).await;
    assert_eq!(fetched.json::<Value>()["data"]["name"], "private");
    orchestrator.shutdown();
}

#[tokio::test]
async fn stats_are_admin_only() {
    let (server, orchestrator) = setup().await;
    let org = Uuid::new_v4();
    let user = Caller::user(org);
    create(&server, &user, shell_job("one", "true")).await;

    user.sign(server.get("/api/v1/stats/jobs"))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let stats = Caller::admin(org)
        .sign(server.get("/api/v1/stats/jobs"))
        .await;
    stats.assert_status_ok();
    let stats = stats.json::<Value>();
    assert_eq!(stats["data"]["total_jobs"], 1);
    assert_eq!(stats["data"]["scheduled_triggers"], 1);
    orchestrator.shutdown();
}
