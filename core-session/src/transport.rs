//! # API Transport Client
//!
//! All backend traffic for the session core flows through [`ApiClient`]. It
//! decorates protected requests with the stored bearer credential at send
//! time, recovers from a 401 with a single silent renewal followed by exactly
//! one replay, and keeps the two failure modes strictly apart: an HTTP status
//! is interpreted, a missing response is propagated as
//! [`SessionError::Network`] and never ends the session.
//!
//! Concurrent 401s share one renewal: the renewal path is serialized behind a
//! mutex, and a waiter that finds the stored credential already changed skips
//! its own renewal and replays with the fresh token.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bridge_traits::{BridgeError, HttpClient, HttpMethod, HttpRequest, HttpResponse};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, SessionEvent};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::{Result, SessionError};
use crate::store::SessionStore;
use crate::types::{AccessToken, Identity, Role};

const STATUS_UNAUTHORIZED: u16 = 401;

const ENDPOINT_LOGIN: &str = "auth/login/";
const ENDPOINT_GOOGLE_LOGIN: &str = "auth/google/";
const ENDPOINT_LOGOUT: &str = "auth/logout/";
const ENDPOINT_REFRESH: &str = "auth/refresh/";
const ENDPOINT_PROFILE_ME: &str = "profile/me/";

/// Standard response envelope the backend wraps payloads in.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    #[serde(default)]
    #[allow(dead_code)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    // No serde(default) here: it would demand T: Default, and a missing
    // Option field already decodes as None.
    data: Option<T>,
}

/// Error body shape for non-2xx responses.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Option<HashMap<String, Vec<String>>>,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct GoogleLoginRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenBundle {
    access_token: AccessToken,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    user: Value,
    tokens: TokenBundle,
}

#[derive(Debug, Deserialize)]
struct RefreshData {
    access_token: AccessToken,
}

/// Backend transport with credential decoration and 401 recovery.
pub struct ApiClient {
    http: Arc<dyn HttpClient>,
    base_url: Url,
    request_timeout: Duration,
    store: SessionStore,
    events: EventBus,
    /// Serializes credential renewal so concurrent 401s trigger one refresh.
    refresh_gate: Mutex<()>,
}

impl ApiClient {
    pub fn new(config: &CoreConfig, store: SessionStore, events: EventBus) -> Self {
        Self {
            http: config.http_client.clone(),
            base_url: config.api_base_url.clone(),
            request_timeout: config.request_timeout,
            store,
            events,
            refresh_gate: Mutex::new(()),
        }
    }

    /// Join a relative endpoint path onto the base URL. The base always
    /// carries a trailing slash and endpoints never a leading one.
    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Execute a request as-is, applying the default timeout when none is
    /// set. No decoration, no recovery.
    async fn execute_raw(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        if request.timeout.is_none() {
            request = request.timeout(self.request_timeout);
        }
        self.http.execute(request).await.map_err(transport_error)
    }

    /// Send a protected request.
    ///
    /// The stored credential is read and attached at send time, so a renewal
    /// that happened between two calls is always picked up. A 401 response
    /// enters the recovery path: one silent renewal, one replay. Any other
    /// response is returned for the caller to interpret.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let sent_token = self.store.load_token().await?;

        let mut decorated = request.clone();
        if let Some(token) = &sent_token {
            decorated = decorated.bearer_token(token.as_str());
        }

        let response = self.execute_raw(decorated).await?;
        if response.status != STATUS_UNAUTHORIZED {
            return Ok(response);
        }

        self.recover_unauthorized(request, sent_token).await
    }

    /// 401 recovery: renew the credential once and replay the original
    /// request exactly once.
    ///
    /// Requests queue on the gate; the first renews, later waiters observe
    /// the changed stored credential and replay without renewing again, and
    /// waiters that find the credential cleared inherit the expiry without
    /// renewing either. A
    /// second 401 on the replay, or an HTTP-level renewal failure, ends the
    /// session. A network failure during renewal propagates and leaves the
    /// session alone.
    async fn recover_unauthorized(
        &self,
        request: HttpRequest,
        sent_token: Option<AccessToken>,
    ) -> Result<HttpResponse> {
        let _gate = self.refresh_gate.lock().await;

        let current = self.store.load_token().await?;
        let fresh = match (&current, &sent_token) {
            // A concurrent request already renewed while we waited.
            (Some(current), Some(sent)) if current != sent => current.clone(),
            // The credential this request went out with is gone: a request
            // ahead of us in the gate already failed to renew and ended the
            // session. Renewing again would double both the refresh call and
            // the expiry announcement.
            (None, Some(_)) => return Err(SessionError::SessionExpired),
            _ => match self.refresh_access_token().await {
                Ok(token) => token,
                Err(SessionError::Network(message)) => {
                    return Err(SessionError::Network(message));
                }
                Err(cause) => return Err(self.hard_logout(cause).await),
            },
        };

        debug!("Replaying request after credential renewal");
        let replay = request.bearer_token(fresh.as_str());
        let response = self.execute_raw(replay).await?;

        if response.status == STATUS_UNAUTHORIZED {
            return Err(self.hard_logout(SessionError::SessionExpired).await);
        }
        Ok(response)
    }

    /// Renew the access credential. The renewal material lives server-side,
    /// so this call carries neither a bearer header nor a body. The fresh
    /// token is persisted before this returns so queued requests replay with
    /// it.
    async fn refresh_access_token(&self) -> Result<AccessToken> {
        debug!("Renewing access credential");
        let request = HttpRequest::new(HttpMethod::Post, self.endpoint(ENDPOINT_REFRESH));
        let response = self.execute_raw(request).await?;

        if !response.is_success() {
            return Err(SessionError::SessionExpired);
        }

        let envelope: ApiEnvelope<RefreshData> = decode_body(&response)?;
        let token = envelope
            .data
            .ok_or_else(|| SessionError::UnexpectedResponse {
                status: response.status,
                message: "renewal response carried no token".to_string(),
            })?
            .access_token;

        self.store.save_token(&token).await?;
        self.events
            .emit(CoreEvent::Session(SessionEvent::TokenRefreshed))
            .ok();
        info!("Access credential renewed");
        Ok(token)
    }

    /// End the session: clear durable state and announce the expiry so the
    /// host navigates to the unauthenticated entry point.
    async fn hard_logout(&self, cause: SessionError) -> SessionError {
        warn!(error = %cause, "Credential renewal failed, ending session");
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "Failed to clear session state during hard logout");
        }
        self.events
            .emit(CoreEvent::Session(SessionEvent::SessionExpired {
                message: cause.to_string(),
            }))
            .ok();
        SessionError::SessionExpired
    }

    // ------------------------------------------------------------------
    // Typed endpoints
    // ------------------------------------------------------------------

    /// Authenticate with email and password.
    ///
    /// Runs outside the 401 recovery path: a 401 here means rejected
    /// credentials, not an expired session. Nothing is persisted; the caller
    /// owns that.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<(AccessToken, Identity)> {
        let request = HttpRequest::new(HttpMethod::Post, self.endpoint(ENDPOINT_LOGIN))
            .json(&LoginRequest { email, password })
            .map_err(transport_error)?;
        self.establish_session(request).await
    }

    /// Authenticate with a Google-issued ID token. Same response shape and
    /// error mapping as [`login`](ApiClient::login).
    #[instrument(skip(self, id_token))]
    pub async fn login_with_google(&self, id_token: &str) -> Result<(AccessToken, Identity)> {
        let request = HttpRequest::new(HttpMethod::Post, self.endpoint(ENDPOINT_GOOGLE_LOGIN))
            .json(&GoogleLoginRequest { token: id_token })
            .map_err(transport_error)?;
        self.establish_session(request).await
    }

    async fn establish_session(&self, request: HttpRequest) -> Result<(AccessToken, Identity)> {
        let response = self.execute_raw(request).await?;
        if !response.is_success() {
            return Err(decode_error(&response, true));
        }

        let envelope: ApiEnvelope<LoginData> = decode_body(&response)?;
        let data = envelope.data.ok_or_else(|| SessionError::Authentication {
            message: envelope
                .message
                .unwrap_or_else(|| "Login response carried no session".to_string()),
        })?;

        let identity = Identity::from_value(&data.user)?;
        Ok((data.tokens.access_token, identity))
    }

    /// Invalidate the session server-side.
    pub async fn logout(&self) -> Result<()> {
        let request = HttpRequest::new(HttpMethod::Post, self.endpoint(ENDPOINT_LOGOUT));
        let response = self.send(request).await?;
        if !response.is_success() {
            return Err(decode_error(&response, true));
        }
        Ok(())
    }

    /// Fetch the profile for the signed-in user.
    pub async fn current_profile(&self) -> Result<Identity> {
        let request = HttpRequest::new(HttpMethod::Get, self.endpoint(ENDPOINT_PROFILE_ME));
        let response = self.send(request).await?;
        if !response.is_success() {
            return Err(decode_error(&response, false));
        }

        let envelope: ApiEnvelope<Value> = decode_body(&response)?;
        let data = envelope
            .data
            .ok_or_else(|| SessionError::UnexpectedResponse {
                status: response.status,
                message: "profile response carried no data".to_string(),
            })?;
        Identity::from_value(&data)
    }

    /// Apply a partial profile update for the given role and return the
    /// re-decoded identity the backend echoes back.
    #[instrument(skip(self, patch))]
    pub async fn update_profile(&self, role: Role, patch: &Value) -> Result<Identity> {
        let request = HttpRequest::new(
            HttpMethod::Patch,
            self.endpoint(profile_endpoint(role)),
        )
        .json(patch)
        .map_err(transport_error)?;

        let response = self.send(request).await?;
        if !response.is_success() {
            return Err(decode_error(&response, false));
        }

        let envelope: ApiEnvelope<Value> = decode_body(&response)?;
        let data = envelope
            .data
            .ok_or_else(|| SessionError::UnexpectedResponse {
                status: response.status,
                message: "profile update response carried no data".to_string(),
            })?;
        Identity::from_value(&data)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

fn profile_endpoint(role: Role) -> &'static str {
    match role {
        Role::Patient => "profile/patient/",
        Role::Doctor => "profile/doctor/",
        Role::Lab => "profile/lab/",
        Role::Admin | Role::Staff => "profile/admin-staff/",
    }
}

fn transport_error(e: BridgeError) -> SessionError {
    SessionError::Network(e.to_string())
}

fn decode_body<T: DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    response.json().map_err(|e| SessionError::UnexpectedResponse {
        status: response.status,
        message: e.to_string(),
    })
}

/// Map a non-2xx response to the error taxonomy. Field-scoped backend errors
/// become `Validation`; in an authentication context a plain 4xx rejection
/// becomes `Authentication`; anything else is `UnexpectedResponse`.
fn decode_error(response: &HttpResponse, auth_context: bool) -> SessionError {
    let body: ApiErrorBody = response.json().unwrap_or_default();
    let message = body
        .message
        .unwrap_or_else(|| format!("Request failed with status {}", response.status));

    if let Some(fields) = body.errors.filter(|fields| !fields.is_empty()) {
        return SessionError::Validation { message, fields };
    }
    if auth_context && matches!(response.status, 400 | 401 | 403) {
        return SessionError::Authentication { message };
    }
    SessionError::UnexpectedResponse {
        status: response.status,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::StateStore;
    use bytes::Bytes;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    const BASE: &str = "https://api.test/api/";

    // ------------------------------------------------------------------
    // Fakes
    // ------------------------------------------------------------------

    #[derive(Default)]
    struct MemoryStateStore {
        entries: StdMutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl StateStore for MemoryStateStore {
        async fn set_string(&self, key: &str, value: &str) -> BridgeResult<()> {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn get_string(&self, key: &str) -> BridgeResult<Option<String>> {
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }

        async fn delete(&self, key: &str) -> BridgeResult<()> {
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }

        async fn list_keys(&self) -> BridgeResult<Vec<String>> {
            Ok(self.entries.lock().unwrap().keys().cloned().collect())
        }

        async fn clear_all(&self) -> BridgeResult<()> {
            self.entries.lock().unwrap().clear();
            Ok(())
        }
    }

    /// Scripted HTTP fake: responses are queued per `(method, url)` and
    /// every request is recorded for assertions.
    #[derive(Default)]
    struct ScriptedHttpClient {
        responses: StdMutex<HashMap<String, VecDeque<BridgeResult<HttpResponse>>>>,
        requests: StdMutex<Vec<HttpRequest>>,
    }

    impl ScriptedHttpClient {
        fn script(&self, method: HttpMethod, path: &str, response: BridgeResult<HttpResponse>) {
            self.responses
                .lock()
                .unwrap()
                .entry(script_key(method, &format!("{}{}", BASE, path)))
                .or_default()
                .push_back(response);
        }

        fn recorded(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }

        fn request_count(&self, method: HttpMethod, path: &str) -> usize {
            let url = format!("{}{}", BASE, path);
            self.recorded()
                .iter()
                .filter(|r| r.method == method && r.url == url)
                .count()
        }
    }

    fn script_key(method: HttpMethod, url: &str) -> String {
        format!("{:?} {}", method, url)
    }

    #[async_trait]
    impl HttpClient for ScriptedHttpClient {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            let key = script_key(request.method, &request.url);
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .get_mut(&key)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| panic!("unscripted request: {}", key))
        }
    }

    fn http_json(status: u16, body: Value) -> BridgeResult<HttpResponse> {
        Ok(HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        })
    }

    fn connection_refused() -> BridgeResult<HttpResponse> {
        Err(BridgeError::ConnectionFailed("connection refused".to_string()))
    }

    // ------------------------------------------------------------------
    // Fixtures
    // ------------------------------------------------------------------

    fn patient_value() -> Value {
        json!({
            "user": {
                "user_id": "4e2c9b00-6a4f-49a3-9d6a-0b1c2d3e4f50",
                "email": "asha@example.com",
                "role": "PATIENT"
            },
            "full_name": "Asha Rao"
        })
    }

    fn envelope(data: Value) -> Value {
        json!({ "success": true, "message": null, "data": data })
    }

    struct Harness {
        api: ApiClient,
        http: Arc<ScriptedHttpClient>,
        store: SessionStore,
        events: EventBus,
    }

    fn harness() -> Harness {
        let http = Arc::new(ScriptedHttpClient::default());
        let store = SessionStore::new(Arc::new(MemoryStateStore::default()));
        let events = EventBus::new(16);
        let config = CoreConfig::builder()
            .api_base_url(BASE)
            .http_client(http.clone())
            .state_store(Arc::new(MemoryStateStore::default()))
            .build()
            .unwrap();
        // The store injected into the client is the one we assert against.
        let api = ApiClient::new(&config, store.clone(), events.clone());
        Harness { api, http, store, events }
    }

    async fn seed_session(store: &SessionStore, token: &str) {
        let identity = Identity::from_value(&patient_value()).unwrap();
        store
            .save(&AccessToken::new(token), &identity)
            .await
            .unwrap();
    }

    // ------------------------------------------------------------------
    // Login
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_login_success_returns_token_and_identity() {
        let h = harness();
        h.http.script(
            HttpMethod::Post,
            ENDPOINT_LOGIN,
            http_json(
                200,
                envelope(json!({
                    "user": patient_value(),
                    "tokens": { "access_token": "t1" }
                })),
            ),
        );

        let (token, identity) = h.api.login("asha@example.com", "pw").await.unwrap();
        assert_eq!(token.as_str(), "t1");
        assert_eq!(identity.role(), Role::Patient);

        let request = &h.http.recorded()[0];
        assert!(!request.headers.contains_key("Authorization"));
        assert_eq!(
            request.headers.get("Content-Type").map(String::as_str),
            Some("application/json")
        );
    }

    #[tokio::test]
    async fn test_login_rejection_maps_to_authentication() {
        let h = harness();
        h.http.script(
            HttpMethod::Post,
            ENDPOINT_LOGIN,
            http_json(401, json!({ "success": false, "message": "Invalid credentials" })),
        );

        let err = h.api.login("asha@example.com", "wrong").await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Authentication { message } if message == "Invalid credentials"
        ));
        // A rejected login never enters the renewal path.
        assert_eq!(h.http.request_count(HttpMethod::Post, ENDPOINT_REFRESH), 0);
    }

    #[tokio::test]
    async fn test_login_field_errors_map_to_validation() {
        let h = harness();
        h.http.script(
            HttpMethod::Post,
            ENDPOINT_LOGIN,
            http_json(
                400,
                json!({
                    "success": false,
                    "message": "Validation failed",
                    "errors": { "email": ["Enter a valid email address."] }
                }),
            ),
        );

        let err = h.api.login("not-an-email", "pw").await.unwrap_err();
        match err {
            SessionError::Validation { fields, .. } => {
                assert_eq!(
                    fields.get("email").map(Vec::as_slice),
                    Some(&["Enter a valid email address.".to_string()][..])
                );
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_google_login_posts_issued_token() {
        let h = harness();
        h.http.script(
            HttpMethod::Post,
            ENDPOINT_GOOGLE_LOGIN,
            http_json(
                200,
                envelope(json!({
                    "user": patient_value(),
                    "tokens": { "access_token": "t1" }
                })),
            ),
        );

        let (token, identity) = h.api.login_with_google("google-id-token").await.unwrap();
        assert_eq!(token.as_str(), "t1");
        assert_eq!(identity.role(), Role::Patient);

        let request = &h.http.recorded()[0];
        let body: Value = serde_json::from_slice(request.body.as_ref().unwrap()).unwrap();
        assert_eq!(body, json!({ "token": "google-id-token" }));
    }

    #[tokio::test]
    async fn test_google_login_rejection_maps_to_authentication() {
        let h = harness();
        h.http.script(
            HttpMethod::Post,
            ENDPOINT_GOOGLE_LOGIN,
            http_json(401, json!({ "success": false, "message": "Token verification failed" })),
        );

        let err = h.api.login_with_google("expired-token").await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Authentication { message } if message == "Token verification failed"
        ));
    }

    // ------------------------------------------------------------------
    // Decoration and recovery
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_bearer_attached_at_send_time() {
        let h = harness();
        seed_session(&h.store, "t1").await;
        h.http.script(
            HttpMethod::Get,
            ENDPOINT_PROFILE_ME,
            http_json(200, envelope(patient_value())),
        );

        h.api.current_profile().await.unwrap();

        let request = &h.http.recorded()[0];
        assert_eq!(
            request.headers.get("Authorization").map(String::as_str),
            Some("Bearer t1")
        );
    }

    #[tokio::test]
    async fn test_401_renews_persists_then_replays_once() {
        let h = harness();
        seed_session(&h.store, "stale").await;

        h.http
            .script(HttpMethod::Get, ENDPOINT_PROFILE_ME, http_json(401, json!({})));
        h.http.script(
            HttpMethod::Post,
            ENDPOINT_REFRESH,
            http_json(200, envelope(json!({ "access_token": "fresh" }))),
        );
        h.http.script(
            HttpMethod::Get,
            ENDPOINT_PROFILE_ME,
            http_json(200, envelope(patient_value())),
        );

        let identity = h.api.current_profile().await.unwrap();
        assert_eq!(identity.role(), Role::Patient);

        let requests = h.http.recorded();
        assert_eq!(requests.len(), 3);
        assert_eq!(
            requests[0].headers.get("Authorization").map(String::as_str),
            Some("Bearer stale")
        );
        // The renewal call itself carries no credential.
        assert!(!requests[1].headers.contains_key("Authorization"));
        assert_eq!(
            requests[2].headers.get("Authorization").map(String::as_str),
            Some("Bearer fresh")
        );

        let stored = h.store.load_token().await.unwrap().unwrap();
        assert_eq!(stored.as_str(), "fresh");
    }

    #[tokio::test]
    async fn test_replay_401_ends_session() {
        let h = harness();
        seed_session(&h.store, "stale").await;
        let mut events = h.events.subscribe();

        h.http
            .script(HttpMethod::Get, ENDPOINT_PROFILE_ME, http_json(401, json!({})));
        h.http.script(
            HttpMethod::Post,
            ENDPOINT_REFRESH,
            http_json(200, envelope(json!({ "access_token": "fresh" }))),
        );
        h.http
            .script(HttpMethod::Get, ENDPOINT_PROFILE_ME, http_json(401, json!({})));

        let err = h.api.current_profile().await.unwrap_err();
        assert!(matches!(err, SessionError::SessionExpired));
        assert!(h.store.load().await.unwrap().is_none());

        // TokenRefreshed first, then the expiry announcement.
        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Session(SessionEvent::TokenRefreshed)
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Session(SessionEvent::SessionExpired { .. })
        ));
    }

    #[tokio::test]
    async fn test_renewal_rejection_ends_session() {
        let h = harness();
        seed_session(&h.store, "stale").await;
        let mut events = h.events.subscribe();

        h.http
            .script(HttpMethod::Get, ENDPOINT_PROFILE_ME, http_json(401, json!({})));
        h.http
            .script(HttpMethod::Post, ENDPOINT_REFRESH, http_json(401, json!({})));

        let err = h.api.current_profile().await.unwrap_err();
        assert!(matches!(err, SessionError::SessionExpired));
        assert!(h.store.load().await.unwrap().is_none());
        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Session(SessionEvent::SessionExpired { .. })
        ));
        // No replay happened.
        assert_eq!(h.http.request_count(HttpMethod::Get, ENDPOINT_PROFILE_ME), 1);
    }

    #[tokio::test]
    async fn test_network_failure_during_renewal_keeps_session() {
        let h = harness();
        seed_session(&h.store, "stale").await;

        h.http
            .script(HttpMethod::Get, ENDPOINT_PROFILE_ME, http_json(401, json!({})));
        h.http
            .script(HttpMethod::Post, ENDPOINT_REFRESH, connection_refused());

        let err = h.api.current_profile().await.unwrap_err();
        assert!(matches!(err, SessionError::Network(_)));
        // The session survives; retrying later may succeed.
        assert!(h.store.load().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_network_failure_never_ends_session() {
        let h = harness();
        seed_session(&h.store, "t1").await;

        h.http
            .script(HttpMethod::Get, ENDPOINT_PROFILE_ME, connection_refused());

        let err = h.api.current_profile().await.unwrap_err();
        assert!(matches!(err, SessionError::Network(_)));
        assert!(h.store.load().await.unwrap().is_some());
        assert_eq!(h.http.request_count(HttpMethod::Post, ENDPOINT_REFRESH), 0);
    }

    /// Answers by token instead of by queue so request interleaving does not
    /// matter: stale bearers 401, the fresh bearer succeeds, and every
    /// renewal is counted.
    struct TokenAwareHttpClient {
        refresh_calls: StdMutex<usize>,
    }

    #[async_trait]
    impl HttpClient for TokenAwareHttpClient {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            if request.url.ends_with(ENDPOINT_REFRESH) {
                *self.refresh_calls.lock().unwrap() += 1;
                return http_json(200, envelope(json!({ "access_token": "fresh" })));
            }
            match request.headers.get("Authorization").map(String::as_str) {
                Some("Bearer fresh") => http_json(200, envelope(patient_value())),
                _ => http_json(401, json!({})),
            }
        }
    }

    #[tokio::test]
    async fn test_concurrent_401s_share_one_renewal() {
        let http = Arc::new(TokenAwareHttpClient {
            refresh_calls: StdMutex::new(0),
        });
        let store = SessionStore::new(Arc::new(MemoryStateStore::default()));
        let events = EventBus::new(16);
        let config = CoreConfig::builder()
            .api_base_url(BASE)
            .http_client(http.clone())
            .state_store(Arc::new(MemoryStateStore::default()))
            .build()
            .unwrap();
        let api = ApiClient::new(&config, store.clone(), events);
        seed_session(&store, "stale").await;

        let (a, b) = tokio::join!(api.current_profile(), api.current_profile());
        assert!(a.is_ok());
        assert!(b.is_ok());
        // The gate plus the stored-token re-read collapse both 401s into a
        // single renewal.
        assert_eq!(*http.refresh_calls.lock().unwrap(), 1);
    }

    /// Everything 401s, renewal included. The yield keeps the two callers
    /// interleaved so both first sends go out with the stale credential.
    struct FailingRenewalClient {
        refresh_calls: StdMutex<usize>,
    }

    #[async_trait]
    impl HttpClient for FailingRenewalClient {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            tokio::task::yield_now().await;
            if request.url.ends_with(ENDPOINT_REFRESH) {
                *self.refresh_calls.lock().unwrap() += 1;
            }
            http_json(401, json!({}))
        }
    }

    #[tokio::test]
    async fn test_concurrent_failed_renewal_is_not_repeated() {
        let http = Arc::new(FailingRenewalClient {
            refresh_calls: StdMutex::new(0),
        });
        let store = SessionStore::new(Arc::new(MemoryStateStore::default()));
        let events = EventBus::new(16);
        let config = CoreConfig::builder()
            .api_base_url(BASE)
            .http_client(http.clone())
            .state_store(Arc::new(MemoryStateStore::default()))
            .build()
            .unwrap();
        let api = ApiClient::new(&config, store.clone(), events.clone());
        seed_session(&store, "stale").await;
        let mut subscriber = events.subscribe();

        let (a, b) = tokio::join!(api.current_profile(), api.current_profile());
        assert!(matches!(a, Err(SessionError::SessionExpired)));
        assert!(matches!(b, Err(SessionError::SessionExpired)));

        // The gate waiter finds the credential cleared and inherits the
        // expiry instead of renewing a second time.
        assert_eq!(*http.refresh_calls.lock().unwrap(), 1);
        assert!(matches!(
            subscriber.recv().await.unwrap(),
            CoreEvent::Session(SessionEvent::SessionExpired { .. })
        ));
        // Exactly one expiry announcement.
        assert!(subscriber.try_recv().is_err());
    }

    // ------------------------------------------------------------------
    // Profile endpoints
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_update_profile_targets_role_endpoint() {
        let h = harness();
        seed_session(&h.store, "t1").await;
        h.http.script(
            HttpMethod::Patch,
            "profile/patient/",
            http_json(200, envelope(patient_value())),
        );

        let identity = h
            .api
            .update_profile(Role::Patient, &json!({ "city": "Pune" }))
            .await
            .unwrap();
        assert_eq!(identity.role(), Role::Patient);
    }

    #[tokio::test]
    async fn test_admin_and_staff_share_profile_endpoint() {
        assert_eq!(profile_endpoint(Role::Admin), profile_endpoint(Role::Staff));
    }

    #[tokio::test]
    async fn test_profile_error_without_fields_is_unexpected_response() {
        let h = harness();
        seed_session(&h.store, "t1").await;
        h.http.script(
            HttpMethod::Get,
            ENDPOINT_PROFILE_ME,
            http_json(500, json!({ "success": false, "message": "boom" })),
        );

        let err = h.api.current_profile().await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::UnexpectedResponse { status: 500, .. }
        ));
    }
}
