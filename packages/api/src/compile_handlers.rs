// ABOUTME: HTTP request handlers for sandbox compile, stop, port and sweep operations
// ABOUTME: Translates JSON bodies into SandboxManager calls and results into the legacy envelope

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Response,
    Json,
};
use crowbox_sandbox::{CompileRequest, StopRequest};
use serde_json::{json, Value};
use tracing::{error, info};

use super::response::{bad_request, failure, success};
use super::AppState;

/// Build and start the sandbox for the posted file
pub async fn compile(
    State(state): State<AppState>,
    payload: Result<Json<CompileRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(body) => body,
        Err(rejection) => return bad_request(rejection.body_text()),
    };

    info!("Compile requested for {}", request.file_path);

    match state.manager.compile(&request).await {
        Ok(outcome) => {
            info!(
                "Compiled {} project for {}",
                outcome.project_type, request.file_path
            );
            success(Some(("response", Value::String(outcome.response))))
        }
        Err(e) => {
            error!("Compile of {} failed: {}", request.file_path, e);
            failure(&e)
        }
    }
}

pub async fn stop(
    State(state): State<AppState>,
    payload: Result<Json<StopRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(body) => body,
        Err(rejection) => return bad_request(rejection.body_text()),
    };

    info!(
        "Stop requested for team {} ({})",
        request.team_id, request.team_name
    );

    match state.manager.stop(&request).await {
        Ok(()) => success(None),
        Err(e) => {
            error!("Stop for team {} failed: {}", request.team_id, e);
            failure(&e)
        }
    }
}

/// Allocate (or return) the fixed host port of a team
pub async fn register_port(State(state): State<AppState>, Path(team_id): Path<i64>) -> Response {
    info!("Port registration for team {}", team_id);

    match state.manager.register_port(team_id).await {
        Ok(port) => success(Some(("port", json!(port)))),
        Err(e) => {
            error!("Port registration for team {} failed: {}", team_id, e);
            failure(&e)
        }
    }
}

/// Run the cleanup sweep now
pub async fn sweep(State(state): State<AppState>) -> Response {
    info!("Manual sweep requested");

    let report = state.manager.sweep().await;
    success(Some(("data", json!(report))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use crowbox_sandbox::{
        CommandOutput, CommandRunner, EngineConfig, SandboxManager, SqliteStore,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    /// Answers like a docker daemon with no sandboxes yet
    struct IdleDocker;

    #[async_trait]
    impl CommandRunner for IdleDocker {
        async fn run(
            &self,
            args: &[String],
            _timeout: Duration,
        ) -> crowbox_sandbox::Result<CommandOutput> {
            let verb = args.get(1).map(String::as_str).unwrap_or_default();
            let output = match verb {
                "run" => CommandOutput::new("baseline-id\n", 0),
                "port" => CommandOutput::new("3000/tcp -> 0.0.0.0:49200\n", 0),
                "container" => CommandOutput::new("", 0),
                "image" => CommandOutput::new("Total reclaimed space: 0B\n", 0),
                _ => CommandOutput::new("Error: No such container: x\n", 1),
            };
            Ok(output)
        }
    }

    async fn app() -> axum::Router {
        let store = Arc::new(SqliteStore::connect("sqlite::memory:").await.unwrap());
        store.create_team(1, "alpha").await.unwrap();

        let manager = SandboxManager::new(
            EngineConfig::default(),
            Arc::new(IdleDocker),
            store.clone(),
            store,
        );
        crate::create_router(AppState {
            manager: Arc::new(manager),
        })
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_compile_missing_file_path_is_bad_request() {
        let (status, json) = send(app().await, post("/api/compile/py", r#"{"input":"5"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["result"], "BAD REQUEST...");
    }

    #[tokio::test]
    async fn test_compile_unknown_team_is_not_found() {
        let (status, json) = send(
            app().await,
            post("/api/compile/py", r#"{"filePath":"42/demo/main.py","input":""}"#),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["result"], "NO SUCH THING...");
    }

    #[tokio::test]
    async fn test_compile_malformed_path_is_wrong_data() {
        let (status, json) = send(
            app().await,
            post("/api/compile/py", r#"{"filePath":"main.py"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["result"], "WRONG DATA...");
    }

    #[tokio::test]
    async fn test_stop_without_sandbox_succeeds() {
        let (status, json) = send(
            app().await,
            post("/api/compile/py/stop", r#"{"teamName":"alpha","teamSeq":1}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["result"], "SUCCESS");
    }

    #[tokio::test]
    async fn test_register_port_returns_port() {
        let (status, json) = send(app().await, post("/api/compile/teams/1/port", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["result"], "SUCCESS");
        assert_eq!(json["port"], 49200);
    }

    #[tokio::test]
    async fn test_sweep_reports_prune() {
        let (status, json) = send(app().await, post("/api/compile/sweep", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["containers_found"], 0);
        assert_eq!(json["data"]["pruned"], true);
    }
}
