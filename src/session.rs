use std::borrow::Cow;

use chrono::Utc;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, ACCEPT},
    Client, Method, StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::{
    accessory::{LoginRequest, LoginResponse},
    config::Config,
    error::{HomebridgeError, Result},
};

pub const LOGIN_ENDPOINT: &str = "api/auth/login";

/// Refresh this many seconds before the token's advertised expiry.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Value the bridge expects in the login `otp` field when 2FA is disabled.
const OTP_PLACEHOLDER: &str = "string";

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Authenticated HTTP session against one bridge.
///
/// Starts unauthenticated; [`Session::authenticate`] installs a bearer token
/// that every later [`Session::request`] carries.
#[derive(Debug)]
pub struct Session {
    http: Client,
    config: Config,
    token: Option<CachedToken>,
    available: bool,
}

#[derive(Debug)]
struct CachedToken {
    access_token: String,
    /// Unix timestamp (seconds) when this token expires, if the bridge said.
    expires_at: Option<i64>,
}

impl Session {
    /// Builds the HTTP client from `config` (applying its timeout, if any).
    pub fn new(config: Config) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::with_client(config, builder.build()?))
    }

    /// Uses a caller-supplied HTTP client as-is.
    pub fn with_client(config: Config, http: Client) -> Self {
        Self {
            http,
            config,
            token: None,
            available: false,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Last known availability. Does not touch the network.
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Logs in and installs the returned bearer token.
    ///
    /// Fails with `Configuration` before any network traffic when credentials
    /// are empty, and with `Authentication` when the bridge rejects them. Any
    /// failure leaves the session unavailable.
    pub async fn authenticate(&mut self) -> Result<()> {
        if let Err(e) = self.config.validate() {
            error!(error = %e, "Cannot authenticate against Homebridge");
            self.available = false;
            return Err(e);
        }

        info!(base_url = %self.config.base_url, "Creating session token for authentication");
        match self.login().await {
            Ok(token) => {
                info!(
                    expires_at = ?token.expires_at,
                    "Successfully created authentication token"
                );
                self.token = Some(token);
                self.available = true;
                Ok(())
            }
            Err(e) => {
                self.available = false;
                Err(e)
            }
        }
    }

    async fn login(&self) -> Result<CachedToken> {
        let url = self.endpoint_url(LOGIN_ENDPOINT);
        let body = LoginRequest {
            username: &self.config.username,
            password: &self.config.password,
            otp: OTP_PLACEHOLDER,
        };

        let response = self
            .http
            .post(&url)
            .header(ACCEPT, "*/*")
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes).into_owned();
            warn!(url = %url, status = %status, body = %body, "Homebridge login rejected");
            return Err(HomebridgeError::Authentication { status, body });
        }

        let login = serde_json::from_slice::<LoginResponse>(&bytes)?;
        let access_token = login
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(HomebridgeError::MissingAccessToken)?;

        Ok(CachedToken {
            access_token,
            expires_at: expiry_from(Utc::now().timestamp(), login.expires_in),
        })
    }

    /// Sends `method endpoint` through the session.
    ///
    /// A failure status is returned, not raised; anything but `200` is
    /// logged at `warn`. With `reauth_on_unauthorized`, a `401` triggers one
    /// re-login and one retry. If the re-login fails the original `401` is
    /// returned and the session is marked unavailable. At most one login is
    /// attempted per call, including the refresh of a token about to expire.
    pub async fn request(
        &mut self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse> {
        let mut reauthenticated = false;
        if self.token_needs_refresh() {
            info!("Access token about to expire; re-authenticating");
            reauthenticated = true;
            if let Err(e) = self.authenticate().await {
                warn!(error = %e, "Proactive re-authentication failed");
            }
        }

        let url = self.endpoint_url(endpoint);
        let response = self.send(&method, &url, &options).await?;

        if response.status() == StatusCode::UNAUTHORIZED
            && self.config.reauth_on_unauthorized
            && !reauthenticated
        {
            warn!(url = %url, "Access token rejected; re-authenticating once and retrying");
            match self.authenticate().await {
                Ok(()) => {
                    let retried = self.send(&method, &url, &options).await?;
                    log_failure(&url, &retried);
                    return Ok(retried);
                }
                Err(e) => {
                    warn!(error = %e, "Re-authentication failed; returning original response");
                }
            }
        }

        log_failure(&url, &response);
        Ok(response)
    }

    async fn send(
        &self,
        method: &Method,
        url: &str,
        options: &RequestOptions,
    ) -> Result<ApiResponse> {
        debug!(method = %method, url = %url, "Making request");

        let mut builder = self.http.request(method.clone(), url).header(ACCEPT, "*/*");
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(&token.access_token);
        }

        let default_body = is_mutating(method).then(|| Value::Object(Default::default()));
        if let Some(body) = options.body.as_ref().or(default_body.as_ref()) {
            builder = builder.json(body);
        }

        let response = builder.headers(options.headers.clone()).send().await?;
        ApiResponse::read(response).await
    }

    fn token_needs_refresh(&self) -> bool {
        if !self.config.reauth_on_unauthorized {
            return false;
        }
        match &self.token {
            Some(CachedToken { expires_at: Some(at), .. }) => {
                *at <= Utc::now().timestamp() + TOKEN_REFRESH_MARGIN_SECS
            }
            _ => false,
        }
    }

    /// `base_url` joined with `endpoint`, tolerating slashes on either side.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }
}

fn is_mutating(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

/// Absolute expiry for a token issued at `now`. An offset that overflows is
/// treated as no expiry.
fn expiry_from(now: i64, expires_in: Option<i64>) -> Option<i64> {
    expires_in.and_then(|secs| now.checked_add(secs))
}

fn log_failure(url: &str, response: &ApiResponse) {
    if response.status() != StatusCode::OK {
        warn!(
            url = %url,
            status = %response.status(),
            body = %response.text(),
            "Request failed"
        );
    }
}

// ---------------------------------------------------------------------------
// Request options
// ---------------------------------------------------------------------------

/// Optional body and headers for [`Session::request`].
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// JSON body. Mutating methods send `{}` when this is `None`.
    pub body: Option<Value>,
    /// Extra headers; they override the session defaults.
    pub headers: HeaderMap,
}

impl RequestOptions {
    pub fn json<T: Serialize>(body: &T) -> Result<Self> {
        Ok(Self {
            body: Some(serde_json::to_value(body)?),
            headers: HeaderMap::new(),
        })
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Fully buffered bridge response.
///
/// The body is read eagerly so that it can be logged on failure and still be
/// handed to the caller.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ApiResponse {
    pub(crate) fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self { status, headers, body }
    }

    async fn read(response: reqwest::Response) -> Result<Self> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        Ok(Self::new(status, headers, body))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
