//! MOIM HTTP client
//!
//! [`MoimClient`] attaches the stored access token to outgoing calls and,
//! when the server answers 401, reissues the token through the refresh
//! cookie and replays the call once. Callers only ever see the replayed
//! result or a final error.

pub mod auth;
pub mod config;
pub mod error;
pub mod meetings;
pub mod probe;
mod refresh;
pub mod store;

pub use config::{BypassPaths, ClientConfig};
pub use error::ClientError;
#[cfg(not(target_arch = "wasm32"))]
pub use store::{FileTokenStore, write_private};
pub use store::{MemoryTokenStore, TokenStore};

use crate::types::TokenResponse;
use refresh::{RefreshCoordinator, Reissue};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, ClientBuilder, Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Callback fired when the access token could not be reissued
pub type SessionExpiredHook = Arc<dyn Fn() + Send + Sync>;

/// Outgoing call, kept by value so it can be replayed after a reissue
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ClientError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Add a header sent on every attempt of this call
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub const fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Which send of a call this is; only the first may trigger a reissue
#[derive(Debug, Clone, PartialEq, Eq)]
enum Attempt {
    Initial,
    Replay { token: String },
}

/// MOIM API client
#[derive(Clone)]
pub struct MoimClient {
    client: Client,
    base_url: String,
    reissue_path: String,
    bypass: BypassPaths,
    #[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
    with_credentials: bool,
    store: Arc<dyn TokenStore>,
    refresh: Arc<RefreshCoordinator<ClientError>>,
    on_session_expired: Option<SessionExpiredHook>,
}

impl MoimClient {
    /// Create a new client with default configuration
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> MoimClientBuilder {
        MoimClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Token store shared by every clone of this client
    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Whether an access token is currently stored
    pub fn is_authenticated(&self) -> bool {
        self.store.get().is_some()
    }

    /// Send a call, reissuing the access token and replaying once on 401
    pub async fn send(&self, request: ApiRequest) -> Result<Response, ClientError> {
        let mut attempt = Attempt::Initial;
        loop {
            let observed = self.refresh.epoch();
            match self.dispatch(&request, &attempt).await {
                Err(err) if self.should_reissue(&request, &attempt, &err) => {
                    info!(path = %request.path, "Access token rejected, reissuing");
                    let token = self.renew(observed).await?;
                    attempt = Attempt::Replay { token };
                }
                result => return result,
            }
        }
    }

    /// Send a call and decode its JSON body
    pub async fn execute<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    /// Send a call and return its body as text
    pub async fn execute_text(&self, request: ApiRequest) -> Result<String, ClientError> {
        let response = self.send(request).await?;
        Ok(response.text().await?)
    }

    /// Outbound stage: build the transport request, attaching credentials
    fn authorize(&self, request: &ApiRequest, attempt: &Attempt) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, request.path);
        let mut headers = request.headers.clone();

        if self.bypass.contains(&request.path) {
            debug!(path = %request.path, "Bypassed path, no bearer token attached");
        } else {
            let token = match attempt {
                Attempt::Replay { token } => Some(token.clone()),
                Attempt::Initial => self.store.get(),
            };

            // A token that is not a valid header value is treated as absent
            if let Some(value) = token.and_then(|token| bearer(&token)) {
                headers.insert(header::AUTHORIZATION, value);
            }
        }

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(headers);

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        #[cfg(target_arch = "wasm32")]
        if self.with_credentials {
            builder = builder.fetch_credentials_include();
        }

        builder
    }

    /// Send one attempt and map error statuses
    async fn dispatch(&self, request: &ApiRequest, attempt: &Attempt) -> Result<Response, ClientError> {
        let response = self.authorize(request, attempt).send().await?;
        let status = response.status();

        if status.is_success() {
            Ok(response)
        } else {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            Err(ClientError::from_status(status, message))
        }
    }

    fn should_reissue(&self, request: &ApiRequest, attempt: &Attempt, err: &ClientError) -> bool {
        err.is_unauthorized() && *attempt == Attempt::Initial && !self.bypass.contains(&request.path)
    }

    /// Obtain a fresh token through the single-flight coordinator.
    ///
    /// `observed` is the coordinator epoch recorded before the failed call
    /// was sent.
    async fn renew(&self, observed: u64) -> Result<String, ClientError> {
        match self.refresh.reissue(observed, || self.request_new_token()).await {
            Reissue::Performed(Ok(token)) | Reissue::Joined(Ok(token)) => Ok(token),
            Reissue::Performed(Err(err)) => {
                self.expire_session();
                Err(ClientError::SessionExpired(err))
            }
            Reissue::Joined(Err(err)) => Err(ClientError::SessionExpired(err)),
        }
    }

    /// Exchange the refresh cookie for a new access token and store it
    async fn request_new_token(&self) -> Result<String, ClientError> {
        let request = ApiRequest::post(self.reissue_path.clone()).json(&serde_json::json!({}))?;
        let response = self.dispatch(&request, &Attempt::Initial).await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ClientError::UnexpectedStatus {
                status: status.as_u16(),
                message: "reissue must answer 200".to_string(),
            });
        }

        let body: TokenResponse = response.json().await?;
        let token = body.access_token().ok_or(ClientError::MissingToken)?;
        self.store.set(token);
        info!("Access token reissued");
        Ok(token.to_string())
    }

    /// Drop stored credentials and tell the host to send the user to login
    fn expire_session(&self) {
        warn!("Session expired, clearing stored access token");
        self.store.clear();
        if let Some(hook) = &self.on_session_expired {
            hook();
        }
    }
}

fn bearer(token: &str) -> Option<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}")).ok()?;
    value.set_sensitive(true);
    Some(value)
}

impl std::fmt::Debug for MoimClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MoimClient")
            .field("base_url", &self.base_url)
            .field("reissue_path", &self.reissue_path)
            .field("bypass", &self.bypass)
            .finish_non_exhaustive()
    }
}

/// Builder for MoimClient
pub struct MoimClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    with_credentials: bool,
    reissue_path: String,
    bypass_paths: Vec<String>,
    store: Option<Arc<dyn TokenStore>>,
    on_session_expired: Option<SessionExpiredHook>,
    #[cfg(not(target_arch = "wasm32"))]
    cookie_jar: Option<Arc<reqwest::cookie::Jar>>,
}

impl Default for MoimClientBuilder {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default()).without_base_url()
    }
}

impl MoimClientBuilder {
    /// Start from a loaded configuration, base URL included
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            base_url: Some(config.base_url.clone()),
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
            with_credentials: config.with_credentials,
            reissue_path: config.reissue_path.clone(),
            bypass_paths: config.bypass_paths.clone(),
            store: None,
            on_session_expired: None,
            #[cfg(not(target_arch = "wasm32"))]
            cookie_jar: None,
        }
    }

    fn without_base_url(mut self) -> Self {
        self.base_url = None;
        self
    }

    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the per-call timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Send cookies with every call (needed for the refresh cookie)
    pub const fn with_credentials(mut self, enabled: bool) -> Self {
        self.with_credentials = enabled;
        self
    }

    /// Set the reissue endpoint path
    pub fn reissue_path(mut self, path: impl Into<String>) -> Self {
        self.reissue_path = path.into();
        self
    }

    /// Replace the bypass path set
    pub fn bypass_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bypass_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Use `store` for the access token instead of an in-memory slot
    pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Keep cookies (the refresh cookie included) in `jar`
    ///
    /// Lets a host persist the jar between runs. Ignored when credentials
    /// are disabled.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn cookie_jar(mut self, jar: Arc<reqwest::cookie::Jar>) -> Self {
        self.cookie_jar = Some(jar);
        self
    }

    /// Register the callback fired when a reissue fails
    pub fn on_session_expired(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_session_expired = Some(Arc::new(hook));
        self
    }

    /// Build the client
    pub fn build(self) -> Result<MoimClient, ClientError> {
        let base_url = self
            .base_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        if !self.reissue_path.starts_with('/') {
            return Err(ClientError::Configuration(format!(
                "reissue_path must start with '/': {}",
                self.reissue_path
            )));
        }

        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        let mut client_builder = ClientBuilder::new().default_headers(default_headers);

        #[cfg(not(target_arch = "wasm32"))]
        {
            if let Some(timeout) = self.timeout {
                client_builder = client_builder.timeout(timeout);
            }
            client_builder = match self.cookie_jar {
                Some(jar) if self.with_credentials => client_builder.cookie_provider(jar),
                _ => client_builder.cookie_store(self.with_credentials),
            };
        }

        if let Some(user_agent) = self.user_agent {
            client_builder = client_builder.user_agent(user_agent);
        } else {
            client_builder =
                client_builder.user_agent(concat!("moim-client/", env!("CARGO_PKG_VERSION")));
        }

        let client = client_builder.build()?;

        Ok(MoimClient {
            client,
            base_url,
            bypass: BypassPaths::new(
                self.bypass_paths
                    .iter()
                    .chain(std::iter::once(&self.reissue_path)),
            ),
            reissue_path: self.reissue_path,
            with_credentials: self.with_credentials,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(MemoryTokenStore::new())),
            refresh: Arc::new(RefreshCoordinator::default()),
            on_session_expired: self.on_session_expired,
        })
    }
}
