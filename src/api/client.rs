/// HTTP client for the REST collaborator
///
/// Every request carries the session's bearer token when one is set. A 401
/// clears the session before the error is returned, so the next caller sees
/// an unauthenticated client.
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::session::SessionStore;
use super::types::*;
use crate::config::ApiConfig;
use crate::errors::ApiError;
use crate::logger::{self, LogTag};
use crate::telemetry::DebugEvent;

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session: Arc::new(SessionStore::new()),
        })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    /// Share a session with other clients
    pub fn with_session(mut self, session: Arc<SessionStore>) -> Self {
        self.session = session;
        self
    }

    pub fn session(&self) -> Arc<SessionStore> {
        self.session.clone()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi { client: self }
    }

    pub fn devices(&self) -> DevicesApi<'_> {
        DevicesApi { client: self }
    }

    pub fn flows(&self) -> FlowsApi<'_> {
        FlowsApi { client: self }
    }

    pub fn logs(&self) -> LogsApi<'_> {
        LogsApi { client: self }
    }

    fn builder(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match self.session.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let request = builder.build()?;
        let label = format!("{} {}", request.method(), request.url().path());
        logger::debug(LogTag::Api, &format!("→ {}", label));

        let response = self.http.execute(request).await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            self.session.clear();
            logger::warning(
                LogTag::Api,
                &format!("{} returned 401, session cleared", label),
            );
            return Err(ApiError::Unauthorized);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            logger::debug(LogTag::Api, &format!("{} failed: {}", label, status));
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        let text = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.execute(self.builder(Method::GET, path)).await?;
        Self::read_json(response).await
    }

    async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let response = self
            .execute(self.builder(Method::GET, path).query(query))
            .await?;
        Self::read_json(response).await
    }

    async fn send_json<T, B>(&self, method: Method, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self.execute(self.builder(method, path).json(body)).await?;
        Self::read_json(response).await
    }

    async fn send_empty<T: DeserializeOwned>(&self, method: Method, path: &str) -> Result<T, ApiError> {
        let response = self.execute(self.builder(method, path)).await?;
        Self::read_json(response).await
    }
}

/// Percent-encode one path segment
fn segment(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

// ============================================================================
// ENDPOINT GROUPS
// ============================================================================

pub struct AuthApi<'a> {
    client: &'a ApiClient,
}

impl AuthApi<'_> {
    /// Log in and keep the returned token in the session
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response: LoginResponse = self
            .client
            .send_json(Method::POST, "/auth/login", &body)
            .await?;
        self.client.session.set_token(response.token.clone());
        logger::info(
            LogTag::Api,
            &format!("Logged in as {}", response.user.username),
        );
        Ok(response)
    }

    /// Forget the local token; the server keeps no session state
    pub fn logout(&self) {
        self.client.session.clear();
    }

    pub async fn change_credentials(
        &self,
        request: &ChangeCredentialsRequest,
    ) -> Result<ActionResult, ApiError> {
        self.client
            .send_json(Method::PUT, "/auth/admin/credentials", request)
            .await
    }

    pub async fn list_secrets(&self) -> Result<Vec<Secret>, ApiError> {
        self.client.get("/auth/secrets").await
    }

    pub async fn save_secret(&self, request: &SaveSecretRequest) -> Result<Value, ApiError> {
        self.client
            .send_json(Method::POST, "/auth/secrets", request)
            .await
    }

    pub async fn delete_secret(&self, key: &str) -> Result<Value, ApiError> {
        self.client
            .send_empty(Method::DELETE, &format!("/auth/secrets/{}", segment(key)))
            .await
    }
}

pub struct DevicesApi<'a> {
    client: &'a ApiClient,
}

impl DevicesApi<'_> {
    pub async fn list(&self) -> Result<Vec<Device>, ApiError> {
        self.client.get("/devices").await
    }

    pub async fn get(&self, client_id: &str) -> Result<Device, ApiError> {
        self.client
            .get(&format!("/devices/{}", segment(client_id)))
            .await
    }

    pub async fn register(&self, request: &RegisterDeviceRequest) -> Result<Device, ApiError> {
        self.client.send_json(Method::POST, "/devices", request).await
    }

    pub async fn delete(&self, client_id: &str) -> Result<ActionResult, ApiError> {
        self.client
            .send_empty(Method::DELETE, &format!("/devices/{}", segment(client_id)))
            .await
    }

    pub async fn connected(&self) -> Result<Vec<ConnectedClient>, ApiError> {
        self.client.get("/devices/connected/list").await
    }

    /// Cached debug events at or after `since` (unix ms), optionally for one workflow
    pub async fn debug_events(
        &self,
        workflow_id: Option<&str>,
        since: i64,
    ) -> Result<Vec<DebugEvent>, ApiError> {
        let since = since.to_string();
        let query = [("flowId", workflow_id.unwrap_or("")), ("since", since.as_str())];
        let response: DebugEventsResponse = self
            .client
            .get_with_query("/devices/debug-events", &query)
            .await?;
        Ok(response.events)
    }
}

pub struct FlowsApi<'a> {
    client: &'a ApiClient,
}

impl FlowsApi<'_> {
    pub async fn list(&self) -> Result<Vec<Flow>, ApiError> {
        self.client.get("/flows").await
    }

    /// Node schemas for the editor palette
    pub async fn schemas(&self) -> Result<Value, ApiError> {
        self.client.get("/flows/schemas").await
    }

    pub async fn get(&self, id: &str) -> Result<Flow, ApiError> {
        self.client.get(&format!("/flows/{}", segment(id))).await
    }

    pub async fn create(&self, request: &CreateFlowRequest) -> Result<Flow, ApiError> {
        self.client.send_json(Method::POST, "/flows", request).await
    }

    pub async fn update(&self, id: &str, changes: &Value) -> Result<Flow, ApiError> {
        self.client
            .send_json(Method::PUT, &format!("/flows/{}", segment(id)), changes)
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<Value, ApiError> {
        self.client
            .send_empty(Method::DELETE, &format!("/flows/{}", segment(id)))
            .await
    }

    pub async fn start(&self, id: &str) -> Result<Value, ApiError> {
        self.client
            .send_empty(Method::POST, &format!("/flows/{}/start", segment(id)))
            .await
    }

    pub async fn stop(&self, id: &str) -> Result<Value, ApiError> {
        self.client
            .send_empty(Method::POST, &format!("/flows/{}/stop", segment(id)))
            .await
    }
}

pub struct LogsApi<'a> {
    client: &'a ApiClient,
}

impl LogsApi<'_> {
    pub async fn list(&self, query: &LogQuery) -> Result<Value, ApiError> {
        self.client.get_with_query("/logs", query).await
    }

    /// Entries newer than `since` (unix ms)
    pub async fn live(&self, since: Option<i64>) -> Result<Value, ApiError> {
        match since {
            Some(since) => {
                self.client
                    .get_with_query("/logs/live", &[("since", since)])
                    .await
            }
            None => self.client.get("/logs/live").await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::stub::StubServer;
    use serde_json::json;

    async fn client_for(server: &StubServer) -> ApiClient {
        ApiClient::new(&server.base_url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_login_stores_token_and_sends_bearer() {
        let server = StubServer::start(|req| match req.path.as_str() {
            "/auth/login" => (
                200,
                json!({"token": "jwt-1", "user": {"id": "u1", "username": "admin", "role": "admin"}})
                    .to_string(),
            ),
            _ => (200, "[]".to_string()),
        })
        .await;
        let client = client_for(&server).await;

        let login = client.auth().login("admin", "secret").await.unwrap();
        assert_eq!(login.user.username, "admin");
        assert_eq!(client.session().token().as_deref(), Some("jwt-1"));

        let devices = client.devices().list().await.unwrap();
        assert!(devices.is_empty());

        let requests = server.requests();
        assert_eq!(requests[0].method, "POST");
        assert_eq!(
            serde_json::from_str::<Value>(&requests[0].body).unwrap(),
            json!({"username": "admin", "password": "secret"})
        );
        assert_eq!(requests[0].header("authorization"), None);
        assert_eq!(requests[1].header("authorization"), Some("Bearer jwt-1"));
    }

    #[tokio::test]
    async fn test_unauthorized_clears_session() {
        let server = StubServer::start(|_| (401, r#"{"message":"Unauthorized"}"#.to_string())).await;
        let client = client_for(&server).await;
        client.session().set_token("expired");

        let result = client.flows().list().await;
        assert!(matches!(result, Err(ApiError::Unauthorized)));
        assert!(!client.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_error_status_carries_body() {
        let server = StubServer::start(|_| (404, r#"{"message":"Device not found"}"#.to_string())).await;
        let client = client_for(&server).await;

        match client.devices().get("esp32 001").await {
            Err(ApiError::Status { status, body }) => {
                assert_eq!(status, 404);
                assert!(body.contains("Device not found"));
            }
            other => panic!("unexpected {:?}", other.map(|d| d.client_id)),
        }
        assert_eq!(server.requests()[0].path, "/devices/esp32%20001");
    }

    #[tokio::test]
    async fn test_debug_events_query_and_decode() {
        let server = StubServer::start(|_| {
            (
                200,
                json!({"events": [{
                    "flowId": "wf-A", "nodeId": "n1", "timestamp": 42,
                    "uso": {"header": {}, "payloadType": "text", "payloadSize": 2, "payloadPreview": "hi"}
                }]})
                .to_string(),
            )
        })
        .await;
        let client = client_for(&server).await;

        let events = client.devices().debug_events(Some("wf-A"), 1000).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp, 42);
        assert_eq!(
            server.requests()[0].path,
            "/devices/debug-events?flowId=wf-A&since=1000"
        );

        client.devices().debug_events(None, 5).await.unwrap();
        assert_eq!(server.requests()[1].path, "/devices/debug-events?flowId=&since=5");
    }

    #[tokio::test]
    async fn test_flow_actions_and_empty_bodies() {
        let server = StubServer::start(|req| match (req.method.as_str(), req.path.as_str()) {
            ("POST", "/flows/f1/start") => (201, String::new()),
            ("GET", "/flows/f1") => (
                200,
                json!({"_id": "f1", "name": "Voice", "definition": {"nodes": [], "edges": []}, "active": true})
                    .to_string(),
            ),
            _ => (500, "boom".to_string()),
        })
        .await;
        let client = client_for(&server).await;

        assert_eq!(client.flows().start("f1").await.unwrap(), Value::Null);
        let flow = client.flows().get("f1").await.unwrap();
        assert_eq!(flow.id, "f1");
        assert!(flow.active);
        assert!(matches!(
            client.flows().stop("f1").await,
            Err(ApiError::Status { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_logs_query_skips_unset_params() {
        let server = StubServer::start(|_| (200, "[]".to_string())).await;
        let client = client_for(&server).await;

        let query = LogQuery {
            level: Some("error".into()),
            limit: Some(20),
            offset: None,
        };
        client.logs().list(&query).await.unwrap();
        client.logs().live(Some(99)).await.unwrap();

        let requests = server.requests();
        assert_eq!(requests[0].path, "/logs?level=error&limit=20");
        assert_eq!(requests[1].path, "/logs/live?since=99");
    }
}
