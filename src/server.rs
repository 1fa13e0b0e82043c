use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::hg::{split_diff, CommandRunner, FileDiff, HgClient, HgCommand, IssueId, MatchMode, RepoLocation};
use crate::llm::{ChangedFile, LlmClient, ModificationWriter};

/// Envelope shared by every JSON route
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn ok<T: Serialize>(data: T) -> Response {
    Json(ApiResponse {
        success: true,
        data: Some(data),
        error: None,
    })
    .into_response()
}

fn fail(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(error.into()),
        }),
    )
        .into_response()
}

pub struct AppState<R = HgCommand> {
    pub hg: HgClient<R>,
    pub writer: Option<ModificationWriter>,
}

impl AppState<HgCommand> {
    pub fn from_config(config: &Config) -> Result<Self> {
        let writer = match config.llm {
            Some(ref llm) => Some(ModificationWriter::new(LlmClient::new(llm)?)),
            None => None,
        };
        Ok(Self {
            hg: HgClient::from_config(&config.hg),
            writer,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct IssueQuery {
    issue: Option<String>,
    #[serde(rename = "repoPath")]
    repo_path: Option<String>,
    #[serde(default, rename = "allHistory")]
    all_history: bool,
    #[serde(default)]
    split: bool,
}

#[derive(Debug, Deserialize)]
pub struct RepoQuery {
    #[serde(rename = "repoPath")]
    repo_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    files: Option<Vec<ChangedFile>>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct DiffData {
    diff: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    files: Option<Vec<FileDiff>>,
}

#[derive(Debug, Serialize)]
struct IssuesData {
    issues: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ModificationData {
    modification: String,
}

fn repo_param(repo_path: Option<&str>) -> Result<RepoLocation, Response> {
    let Some(repo_path) = repo_path else {
        return Err(fail(StatusCode::BAD_REQUEST, "Missing repoPath parameter"));
    };
    RepoLocation::new(repo_path).map_err(|e| fail(StatusCode::BAD_REQUEST, e.to_string()))
}

fn issue_params(query: &IssueQuery) -> Result<(IssueId, RepoLocation), Response> {
    let (Some(issue), Some(_)) = (query.issue.as_deref(), query.repo_path.as_deref()) else {
        return Err(fail(StatusCode::BAD_REQUEST, "Missing issue or repoPath parameter"));
    };
    let issue = IssueId::parse(issue).map_err(|e| fail(StatusCode::BAD_REQUEST, e.to_string()))?;
    let repo = repo_param(query.repo_path.as_deref())?;
    Ok((issue, repo))
}

pub fn router<R: CommandRunner + 'static>(state: Arc<AppState<R>>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/hg/changeset", get(get_changeset::<R>))
        .route("/api/hg/files", get(get_files::<R>))
        .route("/api/hg/diff", get(get_diff::<R>))
        .route("/api/hg/issues", get(get_issues::<R>))
        .route("/api/llm/generate-modification", post(generate_modification::<R>))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: &Config) -> Result<()> {
    let state = Arc::new(AppState::from_config(config)?);
    if state.writer.is_none() {
        tracing::warn!("no [llm] section configured, modification notes are disabled");
    }

    let app = router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", addr);
    println!("🚀 hgtrace API running at http://{}", addr);
    println!("   Press Ctrl+C to stop\n");

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\n✓ Server stopped via Ctrl+C");
        }
    }

    Ok(())
}

async fn index() -> &'static str {
    "hgtrace is running"
}

async fn get_changeset<R: CommandRunner + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Query(query): Query<IssueQuery>,
) -> Response {
    let (issue, repo) = match issue_params(&query) {
        Ok(params) => params,
        Err(response) => return response,
    };

    match state.hg.changeset(&issue, &repo).await {
        Some(changeset) => ok(changeset),
        None => fail(StatusCode::NOT_FOUND, "Changeset not found"),
    }
}

async fn get_files<R: CommandRunner + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Query(query): Query<IssueQuery>,
) -> Response {
    let (issue, repo) = match issue_params(&query) {
        Ok(params) => params,
        Err(response) => return response,
    };

    let mode = MatchMode::from_all_history(query.all_history);
    ok(state.hg.files(&issue, &repo, mode).await)
}

async fn get_diff<R: CommandRunner + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Query(query): Query<IssueQuery>,
) -> Response {
    let (issue, repo) = match issue_params(&query) {
        Ok(params) => params,
        Err(response) => return response,
    };

    let diff = state.hg.diff_for_latest_match(&issue, &repo).await;
    let files = query.split.then(|| split_diff(&diff));
    ok(DiffData { diff, files })
}

async fn get_issues<R: CommandRunner + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Query(query): Query<RepoQuery>,
) -> Response {
    let repo = match repo_param(query.repo_path.as_deref()) {
        Ok(repo) => repo,
        Err(response) => return response,
    };

    ok(IssuesData {
        issues: state.hg.scan_all_issue_ids(&repo).await,
    })
}

async fn generate_modification<R: CommandRunner + 'static>(
    State(state): State<Arc<AppState<R>>>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return fail(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    let Some(files) = request.files else {
        return fail(StatusCode::BAD_REQUEST, "Missing files parameter");
    };
    let Some(writer) = state.writer.as_ref() else {
        return fail(StatusCode::SERVICE_UNAVAILABLE, "LLM is not configured");
    };

    let description = request.description.unwrap_or_default();
    match writer.generate(&files, &description).await {
        Ok(modification) => ok(ModificationData { modification }),
        Err(e) => {
            tracing::warn!("modification note failed: {:#}", e);
            fail(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hg::fake::FakeRepo;
    use serde_json::Value;

    fn state() -> Arc<AppState<FakeRepo>> {
        let fake = FakeRepo::new()
            .commit(1, "fix issue(100) login bug", &[('A', "x.txt"), ('A', "y.txt")])
            .commit(2, "unrelated change, refs 9100", &[('M', "x.txt")])
            .commit(3, "#100 follow-up", &[('M', "x.txt")])
            .with_diff(3, "diff -r 01 -r 02 x.txt\n-old\n+new\n");
        Arc::new(AppState {
            hg: HgClient::with_runner(fake, 2),
            writer: None,
        })
    }

    fn query(issue: Option<&str>, repo: Option<&str>) -> IssueQuery {
        IssueQuery {
            issue: issue.map(str::to_string),
            repo_path: repo.map(str::to_string),
            all_history: false,
            split: false,
        }
    }

    async fn body(response: Response) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_files_route() {
        let (status, json) = body(get_files(State(state()), Query(query(Some("100"), Some("/repo")))).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["data"][0]["path"], "x.txt");
        assert_eq!(json["data"][0]["status"], "M");
        assert_eq!(json["data"][0]["revision"], 3);
        assert_eq!(json["data"].as_array().unwrap().len(), 1);

        let mut all = query(Some("100"), Some("/repo"));
        all.all_history = true;
        let (_, json) = body(get_files(State(state()), Query(all)).await).await;
        assert_eq!(json["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_parameters_are_bad_requests() {
        let (status, json) = body(get_files(State(state()), Query(query(None, Some("/repo")))).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Missing issue or repoPath parameter");

        let (status, _) = body(get_diff(State(state()), Query(query(Some("abc"), Some("/repo")))).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = body(get_issues(State(state()), Query(RepoQuery { repo_path: None })).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_changeset_route() {
        let (status, json) =
            body(get_changeset(State(state()), Query(query(Some("#100"), Some("/repo")))).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["revision"], 3);
        assert_eq!(json["data"]["summary"], "#100 follow-up");

        let (status, json) =
            body(get_changeset(State(state()), Query(query(Some("555"), Some("/repo")))).await).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Changeset not found");
    }

    #[tokio::test]
    async fn test_diff_route_with_split() {
        let mut q = query(Some("100"), Some("/repo"));
        q.split = true;
        let (_, json) = body(get_diff(State(state()), Query(q)).await).await;
        assert_eq!(json["data"]["diff"], "diff -r 01 -r 02 x.txt\n-old\n+new\n");
        assert_eq!(json["data"]["files"][0]["filename"], "x.txt");

        let (_, json) = body(get_diff(State(state()), Query(query(Some("100"), Some("/repo")))).await).await;
        assert!(json["data"].get("files").is_none());
    }

    #[tokio::test]
    async fn test_issues_route() {
        let q = RepoQuery { repo_path: Some("/repo".to_string()) };
        let (_, json) = body(get_issues(State(state()), Query(q)).await).await;
        assert_eq!(json["data"]["issues"], serde_json::json!(["100"]));
    }

    #[tokio::test]
    async fn test_generate_modification_without_llm() {
        let request = GenerateRequest {
            files: Some(vec![]),
            description: None,
        };
        let (status, _) = body(generate_modification(State(state()), Ok(Json(request))).await).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let request = GenerateRequest {
            files: None,
            description: None,
        };
        let (status, json) = body(generate_modification(State(state()), Ok(Json(request))).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Missing files parameter");
    }

    #[tokio::test]
    async fn test_generate_modification_malformed_body() {
        let payload = Json::<GenerateRequest>::from_bytes(b"{\"files\": [{\"path\": 1}");
        assert!(payload.is_err());

        let (status, json) = body(generate_modification(State(state()), payload).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert!(!json["error"].as_str().unwrap().is_empty());
    }
}
