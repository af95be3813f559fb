//! Authenticated request pipeline.
//!
//! [`ApiClient`] attaches the stored bearer credential to every request and
//! renews an expired access token before the request is dispatched. A failed
//! renewal never aborts the request: it goes out with the stale credential
//! and the backend's authorization error is left for the caller to handle.

use crate::{
    claims::{self, CredentialPair},
    config::ClientConfig,
    errors::{ClientError, ClientResult},
    session::{SessionManager, SessionTokens},
};
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Method, Request, RequestBuilder, Response, Url};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::sync::Arc;

/// Renewal endpoint, relative to the API base URL
pub const REFRESH_PATH: &str = "user/token/refresh/";

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

/// Backends that do not rotate refresh tokens answer with `access` only
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
    refresh: Option<String>,
}

/// HTTP client for the LMS backend
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    http: reqwest::Client,
    session: Arc<SessionManager>,
    config: Arc<ClientConfig>,
    default_bearer: Option<String>,
}

impl ApiClient {
    /// Create a client bound to `session`.
    ///
    /// The access token stored at this moment becomes the default bearer
    /// credential of every request built by this client.
    pub fn new(config: ClientConfig, session: Arc<SessionManager>) -> ClientResult<Self> {
        let base_url = config
            .base_url()
            .map_err(|e| ClientError::Url(e.to_string()))?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        let default_bearer = session.tokens().access_token;
        tracing::debug!(
            base_url = %base_url,
            authenticated = default_bearer.is_some(),
            "API client created"
        );

        Ok(Self {
            base_url,
            http,
            session,
            config: Arc::new(config),
            default_bearer,
        })
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Resolve `path` against the API base URL
    pub fn url(&self, path: &str) -> ClientResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::Url(format!("{path}: {e}")))
    }

    /// Start a request to `path`, carrying the default bearer credential
    pub fn request(&self, method: Method, path: &str) -> ClientResult<RequestBuilder> {
        let builder = self.http.request(method, self.url(path)?);
        Ok(match &self.default_bearer {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    /// Intercept and dispatch an authenticated request
    pub async fn send(&self, builder: RequestBuilder) -> ClientResult<Response> {
        let mut request = builder.build()?;
        self.intercept(&mut request).await;
        Ok(self.http.execute(request).await?)
    }

    /// Dispatch without credentials, bounded by the public timeout.
    ///
    /// Used by login, registration and password reset, which must not
    /// trigger a renewal of whatever session happens to be stored.
    pub async fn send_anonymous(&self, builder: RequestBuilder) -> ClientResult<Response> {
        let mut request = builder.timeout(self.config.public_timeout).build()?;
        request.headers_mut().remove(AUTHORIZATION);
        Ok(self.http.execute(request).await?)
    }

    /// Per-request interception; never fails.
    async fn intercept(&self, request: &mut Request) {
        let tokens = self.session.tokens();

        if tokens.is_empty() {
            // Anonymous visitor, or a session that ended after this client was built
            request.headers_mut().remove(AUTHORIZATION);
            return;
        }

        if let Some(access) = &tokens.access_token
            && !claims::is_access_token_expired(access, Utc::now())
        {
            if self.default_bearer.as_ref() != Some(access) {
                set_bearer(request, access);
            }
            return;
        }

        match self.renew(&tokens).await {
            Some(pair) => set_bearer(request, &pair.access_token),
            // Stale but current: the backend gets to reject it
            None => {
                if let Some(stale) = &tokens.access_token {
                    set_bearer(request, stale);
                }
            }
        }
    }

    /// Exactly one renewal attempt; `None` on any failure.
    async fn renew(&self, stale: &SessionTokens) -> Option<CredentialPair> {
        let guard = self.session.refresh_guard().await;

        // Under single-flight another request may have renewed while we waited
        let current = if guard.is_some() {
            let current = self.session.tokens();
            if let Some(access) = &current.access_token
                && current.access_token != stale.access_token
                && !claims::is_access_token_expired(access, Utc::now())
            {
                tracing::debug!("Reusing access token renewed by a concurrent request");
                return Some(CredentialPair {
                    access_token: access.clone(),
                    refresh_token: current.refresh_token.unwrap_or_default(),
                });
            }
            current
        } else {
            stale.clone()
        };

        let Some(refresh_token) = current.refresh_token else {
            tracing::warn!("Access token expired and no refresh token stored, sending as-is");
            return None;
        };

        match self.refresh(&refresh_token).await {
            Ok(pair) => {
                if let Err(e) = self.session.set_tokens(&pair) {
                    tracing::warn!(error = %e, "Failed to persist renewed tokens");
                }
                tracing::info!("Access token renewed");
                Some(pair)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token renewal failed, sending request with stale credentials");
                None
            }
        }
    }

    /// Exchange `refresh_token` for a new pair
    async fn refresh(&self, refresh_token: &str) -> ClientResult<CredentialPair> {
        let response = self
            .http
            .post(self.url(REFRESH_PATH)?)
            .json(&RefreshRequest {
                refresh: refresh_token,
            })
            .send()
            .await?;
        let response = error_for_status(response).await?;
        let body: RefreshResponse = response.json().await?;

        Ok(CredentialPair {
            access_token: body.access,
            refresh_token: body.refresh.unwrap_or_else(|| refresh_token.to_string()),
        })
    }

    /// GET `path` and parse the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.send(self.request(Method::GET, path)?).await?;
        Ok(error_for_status(response).await?.json().await?)
    }

    /// POST `body` to `path` and parse the JSON reply
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .send(self.request(Method::POST, path)?.json(body))
            .await?;
        Ok(error_for_status(response).await?.json().await?)
    }

    /// DELETE `path`, discarding any body
    pub async fn delete(&self, path: &str) -> ClientResult<()> {
        let response = self.send(self.request(Method::DELETE, path)?).await?;
        error_for_status(response).await?;
        Ok(())
    }
}

fn set_bearer(request: &mut Request, token: &str) {
    match HeaderValue::from_str(&format!("Bearer {token}")) {
        Ok(value) => {
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        Err(_) => tracing::warn!("Access token is not a valid header value, not attached"),
    }
}

/// Turn a non-success response into `ClientError::Status`
pub(crate) async fn error_for_status(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|e| format!("Failed to read error response: {e}"));
    Err(ClientError::Status { status, body })
}
