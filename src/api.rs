use reqwest::blocking::{Client, ClientBuilder, RequestBuilder, Response};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::error::{ApiError, ApiResult, FALLBACK_MESSAGE};
use crate::models::{
    Application, ApplicationStatus, AuthResponse, Credentials, DashboardStats, Interview,
    JobListing, NewApplication, RecordId, Registration, ResumeAnalysis, SavedJob, SearchPage,
    SearchParams,
};
use crate::resume::ResumeInput;
use crate::session::SessionService;

/// Every remote operation the client needs. Views take `&dyn JobTrackerApi`
/// so they can run against a fake.
pub trait JobTrackerApi: Send + Sync {
    fn authenticate(&self, credentials: &Credentials) -> ApiResult<AuthResponse>;
    fn register(&self, registration: &Registration) -> ApiResult<AuthResponse>;

    fn search_jobs(&self, params: &SearchParams) -> ApiResult<SearchPage>;
    fn save_job(&self, job: &JobListing) -> ApiResult<()>;
    fn unsave_job(&self, id: &RecordId) -> ApiResult<()>;
    fn saved_jobs(&self) -> ApiResult<Vec<SavedJob>>;

    fn applications(&self) -> ApiResult<Vec<Application>>;
    fn create_application(&self, application: &NewApplication) -> ApiResult<()>;
    fn update_status(&self, id: &RecordId, status: ApplicationStatus) -> ApiResult<()>;
    fn update_notes(&self, id: &RecordId, notes: &str) -> ApiResult<()>;
    fn schedule_interview(&self, id: &RecordId, interview: &Interview) -> ApiResult<()>;
    fn delete_application(&self, id: &RecordId) -> ApiResult<()>;

    fn dashboard_stats(&self) -> ApiResult<DashboardStats>;
    fn analyze_resume(&self, input: &ResumeInput) -> ApiResult<ResumeAnalysis>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

// The list endpoint has been seen both bare and wrapped in `{ "data": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApplicationsBody {
    List(Vec<Application>),
    Wrapped {
        #[serde(default)]
        data: Vec<Application>,
    },
}

#[derive(Debug, Serialize)]
struct StatusUpdate<'a> {
    status: &'a str,
}

#[derive(Debug, Serialize)]
struct NotesUpdate<'a> {
    notes: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest<'a> {
    resume_text: &'a str,
    job_description: &'a str,
}

/// The single HTTP gateway. Bearer injection and 401 teardown happen here
/// and nowhere else.
pub struct ApiClient {
    base_url: String,
    client: Client,
    session: Arc<SessionService>,
}

impl ApiClient {
    pub fn new(config: &Config, session: Arc<SessionService>) -> ApiResult<Self> {
        Self::with_builder(Client::builder(), config, session)
    }

    /// Loopback test servers must never be routed through a system proxy.
    #[cfg(test)]
    fn without_proxy(config: &Config, session: Arc<SessionService>) -> ApiResult<Self> {
        Self::with_builder(Client::builder().no_proxy(), config, session)
    }

    fn with_builder(
        builder: ClientBuilder,
        config: &Config,
        session: Arc<SessionService>,
    ) -> ApiResult<Self> {
        let client = builder
            .timeout(config.timeout)
            .user_agent(concat!("jobtrack/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            client,
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%method, %url, "api request");
        let builder = self.client.request(method, url);
        match self.session.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn send(&self, builder: RequestBuilder) -> ApiResult<Response> {
        let response = builder.send()?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(url = %response.url(), "authorization rejected; clearing session");
            if let Err(e) = self.session.clear() {
                tracing::error!(error = %e, "failed to clear stored session");
                return Err(ApiError::StaleSession(format!("{:#}", e)));
            }
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            return Err(remote_error(response));
        }
        Ok(response)
    }

    // Bad credentials on the auth endpoints are a failed login, not an
    // expired session.
    fn send_auth<B: Serialize>(&self, path: &str, body: &B) -> ApiResult<AuthResponse> {
        let response = self.client.post(format!("{}{}", self.base_url, path)).json(body).send()?;
        let status = response.status();
        if !status.is_success() {
            let fallback = if path.ends_with("register") {
                "Registration failed"
            } else {
                "Login failed"
            };
            let code = status.as_u16();
            let message = match error_message(response) {
                Some(detail) => format!("{}: {}", fallback, detail),
                None => fallback.to_string(),
            };
            return Err(ApiError::Remote { status: code, message });
        }
        decode(response)
    }

    fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ApiResult<T> {
        decode(self.send(builder)?)
    }

    fn send_empty(&self, builder: RequestBuilder) -> ApiResult<()> {
        self.send(builder).map(|_| ())
    }
}

fn decode<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let text = response.text()?;
    serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
}

fn error_message(response: Response) -> Option<String> {
    let text = response.text().ok()?;
    serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|body| body.message)
        .filter(|m| !m.trim().is_empty())
}

fn remote_error(response: Response) -> ApiError {
    let status = response.status().as_u16();
    let message = error_message(response).unwrap_or_else(|| FALLBACK_MESSAGE.to_string());
    tracing::warn!(status, %message, "api call failed");
    ApiError::Remote { status, message }
}

impl JobTrackerApi for ApiClient {
    fn authenticate(&self, credentials: &Credentials) -> ApiResult<AuthResponse> {
        self.send_auth("/auth/authenticate", credentials)
    }

    fn register(&self, registration: &Registration) -> ApiResult<AuthResponse> {
        self.send_auth("/auth/register", registration)
    }

    fn search_jobs(&self, params: &SearchParams) -> ApiResult<SearchPage> {
        self.send_json(self.request(Method::GET, "/jobs/search").query(params))
    }

    fn save_job(&self, job: &JobListing) -> ApiResult<()> {
        self.send_empty(self.request(Method::POST, "/jobs/saved").json(job))
    }

    fn unsave_job(&self, id: &RecordId) -> ApiResult<()> {
        self.send_empty(self.request(Method::DELETE, &format!("/jobs/saved/{}", id)))
    }

    fn saved_jobs(&self) -> ApiResult<Vec<SavedJob>> {
        self.send_json(self.request(Method::GET, "/jobs/saved"))
    }

    fn applications(&self) -> ApiResult<Vec<Application>> {
        let body: ApplicationsBody = self.send_json(self.request(Method::GET, "/applications"))?;
        Ok(match body {
            ApplicationsBody::List(apps) => apps,
            ApplicationsBody::Wrapped { data } => data,
        })
    }

    fn create_application(&self, application: &NewApplication) -> ApiResult<()> {
        self.send_empty(self.request(Method::POST, "/applications").json(application))
    }

    fn update_status(&self, id: &RecordId, status: ApplicationStatus) -> ApiResult<()> {
        let body = StatusUpdate { status: status.as_str() };
        self.send_empty(
            self.request(Method::PATCH, &format!("/applications/{}/status", id))
                .json(&body),
        )
    }

    fn update_notes(&self, id: &RecordId, notes: &str) -> ApiResult<()> {
        self.send_empty(
            self.request(Method::PATCH, &format!("/applications/{}/notes", id))
                .json(&NotesUpdate { notes }),
        )
    }

    fn schedule_interview(&self, id: &RecordId, interview: &Interview) -> ApiResult<()> {
        self.send_empty(
            self.request(Method::POST, &format!("/applications/{}/interview", id))
                .json(interview),
        )
    }

    fn delete_application(&self, id: &RecordId) -> ApiResult<()> {
        self.send_empty(self.request(Method::DELETE, &format!("/applications/{}", id)))
    }

    fn dashboard_stats(&self) -> ApiResult<DashboardStats> {
        self.send_json(self.request(Method::GET, "/dashboard/stats"))
    }

    fn analyze_resume(&self, input: &ResumeInput) -> ApiResult<ResumeAnalysis> {
        let body = AnalyzeRequest {
            resume_text: &input.resume_text,
            job_description: &input.job_description,
        };
        self.send_json(self.request(Method::POST, "/resume-analysis/analyze").json(&body))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{LocalStore, SessionState, TokenStore};
    use axum::extract::Path as AxumPath;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::{get, patch};
    use axum::{Json, Router};
    use std::time::Duration;

    struct TestServer {
        url: String,
        _runtime: tokio::runtime::Runtime,
    }

    fn spawn_server(app: Router) -> TestServer {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let listener = runtime
            .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
            .unwrap();
        let addr = listener.local_addr().unwrap();
        runtime.spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        TestServer {
            url: format!("http://{}/api", addr),
            _runtime: runtime,
        }
    }

    fn client_for(server: &TestServer, token: Option<&str>) -> (ApiClient, Arc<SessionService>) {
        let store = LocalStore::open_in_memory().unwrap();
        if let Some(t) = token {
            store.save_token(t).unwrap();
        }
        let session = Arc::new(SessionService::new(store));
        session.initialize().unwrap();
        let config = Config {
            api_url: server.url.clone(),
            timeout: Duration::from_secs(5),
            data_dir: std::env::temp_dir(),
        };
        (ApiClient::without_proxy(&config, session.clone()).unwrap(), session)
    }

    fn bearer(headers: &HeaderMap) -> String {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string()
    }

    #[test]
    fn test_bearer_token_is_injected() {
        let app = Router::new().route(
            "/api/applications",
            get(|headers: HeaderMap| async move {
                if bearer(&headers) == "Bearer secret-token" {
                    Ok(Json(serde_json::json!([
                        { "id": 1, "title": "SRE", "company": "Acme", "status": "OFFER" }
                    ])))
                } else {
                    Err(AxumStatus::FORBIDDEN)
                }
            }),
        );
        let server = spawn_server(app);
        let (client, _) = client_for(&server, Some("secret-token"));

        let apps = client.applications().unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].status, ApplicationStatus::Offer);
    }

    #[test]
    fn test_wrapped_application_list_is_accepted() {
        let app = Router::new().route(
            "/api/applications",
            get(|| async {
                Json(serde_json::json!({
                    "data": [{ "id": 3, "title": "QA", "company": "Initech" }]
                }))
            }),
        );
        let server = spawn_server(app);
        let (client, _) = client_for(&server, Some("t"));
        let apps = client.applications().unwrap();
        assert_eq!(apps[0].id, RecordId::Number(3));
    }

    #[test]
    fn test_unauthorized_clears_session() {
        let app = Router::new().route(
            "/api/dashboard/stats",
            get(|| async { AxumStatus::UNAUTHORIZED }),
        );
        let server = spawn_server(app);
        let (client, session) = client_for(&server, Some("expired"));
        let rx = session.subscribe();

        let err = client.dashboard_stats().unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
        assert_eq!(session.state(), SessionState::Anonymous);
        assert_eq!(*rx.borrow(), SessionState::Anonymous);
        assert_eq!(session.token(), None);
        // storage was cleared too
        assert_eq!(session.initialize().unwrap(), SessionState::Anonymous);
    }

    struct LockedStore;

    impl TokenStore for LockedStore {
        fn load_token(&self) -> anyhow::Result<Option<String>> {
            Ok(Some("expired".to_string()))
        }

        fn save_token(&self, _token: &str) -> anyhow::Result<()> {
            Ok(())
        }

        fn clear_token(&self) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("database is locked"))
        }
    }

    #[test]
    fn test_unauthorized_reports_uncleared_storage() {
        let app = Router::new().route(
            "/api/applications",
            get(|| async { AxumStatus::UNAUTHORIZED }),
        );
        let server = spawn_server(app);
        let session = Arc::new(SessionService::new(LockedStore));
        session.initialize().unwrap();
        let config = Config {
            api_url: server.url.clone(),
            timeout: Duration::from_secs(5),
            data_dir: std::env::temp_dir(),
        };
        let client = ApiClient::without_proxy(&config, session.clone()).unwrap();

        let err = client.applications().unwrap_err();
        assert!(matches!(err, ApiError::StaleSession(_)));
        assert!(err.to_string().contains("database is locked"));
        assert_eq!(session.state(), SessionState::Anonymous);
    }

    #[test]
    fn test_remote_error_message_is_surfaced() {
        let app = Router::new().route(
            "/api/applications/:id/status",
            patch(|AxumPath(id): AxumPath<String>| async move {
                (
                    AxumStatus::CONFLICT,
                    Json(serde_json::json!({ "message": format!("application {} is archived", id) })),
                )
            }),
        );
        let server = spawn_server(app);
        let (client, session) = client_for(&server, Some("t"));

        let err = client
            .update_status(&RecordId::Number(9), ApplicationStatus::Offer)
            .unwrap_err();
        match err {
            ApiError::Remote { status, message } => {
                assert_eq!(status, 409);
                assert_eq!(message, "application 9 is archived");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(session.is_authenticated());
    }

    #[test]
    fn test_remote_error_without_body_uses_fallback() {
        let app = Router::new().route(
            "/api/jobs/saved",
            get(|| async { AxumStatus::INTERNAL_SERVER_ERROR }),
        );
        let server = spawn_server(app);
        let (client, _) = client_for(&server, Some("t"));
        match client.saved_jobs().unwrap_err() {
            ApiError::Remote { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, FALLBACK_MESSAGE);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_status_update_sends_wire_status() {
        let app = Router::new().route(
            "/api/applications/:id/status",
            patch(|AxumPath(id): AxumPath<String>, Json(body): Json<serde_json::Value>| async move {
                if id == "12" && body["status"] == "SCREENING" {
                    AxumStatus::OK
                } else {
                    AxumStatus::BAD_REQUEST
                }
            }),
        );
        let server = spawn_server(app);
        let (client, _) = client_for(&server, Some("t"));
        client
            .update_status(&RecordId::Number(12), ApplicationStatus::Screening)
            .unwrap();
    }

    #[test]
    fn test_bad_login_does_not_report_expired_session() {
        let app = Router::new().route(
            "/api/auth/authenticate",
            axum::routing::post(|| async { AxumStatus::UNAUTHORIZED }),
        );
        let server = spawn_server(app);
        let (client, _) = client_for(&server, None);
        let err = client
            .authenticate(&Credentials {
                email: "a@b.c".into(),
                password: "nope".into(),
            })
            .unwrap_err();
        assert!(!matches!(err, ApiError::Unauthorized));
        assert!(err.to_string().contains("Login failed"));
    }
}
