//! Authentication for channels whose playback API needs a bearer token.
//!
//! [`AuthProvider`] is the seam the resolver uses. [`SessionAuth`] keeps one
//! session per process: the first caller performs the renewal while holding
//! the session lock, every later caller gets the cached token.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::ResolveError;
use crate::stream::fetcher::{FetchRequest, PayloadFetcher};
use crate::stream::metadata::str_at;

/// Bearer token presented to a channel API.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `Authorization` header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token(<{} chars>)", self.0.len())
    }
}

/// Why no token could be produced.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No stored credentials or refresh token")]
    MissingCredentials,

    #[error("Credentials were rejected by the identity provider")]
    InvalidCredentials,

    #[error(transparent)]
    Transport(#[from] ResolveError),
}

/// Stored credentials for one channel.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
    pub refresh_token: Option<String>,
}

impl Credentials {
    fn login(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }
}

/// Supplies tokens to the resolver.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Return a usable token, renewing or logging in when none is cached.
    async fn ensure_token(&self) -> Result<Token, AuthError>;

    /// Forget `rejected` so the next `ensure_token` renews it. A no-op when
    /// another caller already replaced it.
    async fn invalidate(&self, rejected: &Token);
}

/// Result of a successful token exchange.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub id_token: Token,
    /// Present when the identity provider issued a new refresh token.
    pub refresh_token: Option<String>,
}

/// Network side of a token exchange.
///
/// `Ok(None)` means the provider refused the refresh token or credentials.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn renew(&self, refresh_token: &str) -> Result<Option<TokenGrant>, ResolveError>;

    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<TokenGrant>, ResolveError>;
}

#[derive(Default)]
struct Session {
    id_token: Option<Token>,
    refresh_token: Option<String>,
}

impl Session {
    fn store(&mut self, grant: TokenGrant, previous_refresh: Option<String>) -> Token {
        self.refresh_token = grant.refresh_token.or(previous_refresh);
        self.id_token = Some(grant.id_token.clone());
        grant.id_token
    }
}

/// Process-wide session: refresh-token renewal first, password login second.
pub struct SessionAuth {
    source: Arc<dyn TokenSource>,
    credentials: Credentials,
    session: Mutex<Session>,
}

impl SessionAuth {
    pub fn new(source: Arc<dyn TokenSource>, credentials: Credentials) -> Self {
        Self {
            source,
            credentials,
            session: Mutex::new(Session::default()),
        }
    }

    /// Latest refresh token, for callers that persist it between runs.
    pub async fn refresh_token(&self) -> Option<String> {
        let session = self.session.lock().await;
        session
            .refresh_token
            .clone()
            .or_else(|| self.credentials.refresh_token.clone())
    }
}

#[async_trait]
impl AuthProvider for SessionAuth {
    #[instrument(skip(self))]
    async fn ensure_token(&self) -> Result<Token, AuthError> {
        let mut session = self.session.lock().await;
        if let Some(token) = &session.id_token {
            return Ok(token.clone());
        }

        let refresh = session
            .refresh_token
            .clone()
            .or_else(|| self.credentials.refresh_token.clone());

        if let Some(refresh) = refresh {
            debug!("Renewing token from stored refresh token");
            match self.source.renew(&refresh).await? {
                Some(grant) => return Ok(session.store(grant, Some(refresh))),
                None => info!("Extending token failed, falling back to credentials"),
            }
        }

        let Some((username, password)) = self.credentials.login() else {
            warn!("No credentials configured");
            return Err(AuthError::MissingCredentials);
        };

        match self.source.authenticate(username, password).await? {
            Some(grant) => Ok(session.store(grant, None)),
            None => {
                warn!("Error getting a new token, wrong password?");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    async fn invalidate(&self, rejected: &Token) {
        let mut session = self.session.lock().await;
        if session.id_token.as_ref() == Some(rejected) {
            debug!("Dropping rejected token");
            session.id_token = None;
        }
    }
}

/// AWS Cognito user pool login (`InitiateAuth`).
pub struct CognitoIdp {
    fetcher: Arc<dyn PayloadFetcher>,
    pool_id: String,
    client_id: String,
}

impl CognitoIdp {
    pub fn new(
        fetcher: Arc<dyn PayloadFetcher>,
        pool_id: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            pool_id: pool_id.into(),
            client_id: client_id.into(),
        }
    }

    /// Regional endpoint derived from the pool id (`eu-west-1_xxx`).
    fn endpoint(&self) -> String {
        let region = self.pool_id.split('_').next().unwrap_or("eu-west-1");
        format!("https://cognito-idp.{region}.amazonaws.com/")
    }

    async fn initiate(&self, flow: &str, parameters: Value) -> Result<Option<TokenGrant>, ResolveError> {
        let endpoint = self.endpoint();
        let body = json!({
            "AuthFlow": flow,
            "ClientId": self.client_id,
            "AuthParameters": parameters,
        });
        let request = FetchRequest::post(&endpoint, body.to_string())
            .header("Content-Type", "application/x-amz-json-1.1")
            .header("X-Amz-Target", "AWSCognitoIdentityProviderService.InitiateAuth");

        let response = self.fetcher.fetch(&request).await?;
        let payload: Value = serde_json::from_str(&response.body).unwrap_or(Value::Null);

        if !response.is_success() {
            let kind = str_at(&payload, "/__type").unwrap_or_default();
            if kind.ends_with("NotAuthorizedException") || kind.ends_with("UserNotFoundException") {
                debug!(flow, kind, "Identity provider refused");
                return Ok(None);
            }
            return Err(ResolveError::transport(
                endpoint,
                format!("identity provider returned {}", response.status),
            ));
        }

        let id_token = str_at(&payload, "/AuthenticationResult/IdToken")
            .ok_or_else(|| ResolveError::malformed(&endpoint, "missing AuthenticationResult.IdToken"))?;
        let refresh_token = str_at(&payload, "/AuthenticationResult/RefreshToken").map(str::to_string);

        Ok(Some(TokenGrant {
            id_token: Token::new(id_token),
            refresh_token,
        }))
    }
}

#[async_trait]
impl TokenSource for CognitoIdp {
    async fn renew(&self, refresh_token: &str) -> Result<Option<TokenGrant>, ResolveError> {
        self.initiate("REFRESH_TOKEN_AUTH", json!({ "REFRESH_TOKEN": refresh_token }))
            .await
    }

    /// `USER_PASSWORD_AUTH`, which the app client must have enabled.
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<TokenGrant>, ResolveError> {
        self.initiate(
            "USER_PASSWORD_AUTH",
            json!({ "USERNAME": username, "PASSWORD": password }),
        )
        .await
    }
}

/// Anonymous device token, as handed out by realm-based video APIs.
pub struct AnonymousTokenAuth {
    fetcher: Arc<dyn PayloadFetcher>,
    token_url: String,
    token: Mutex<Option<Token>>,
}

impl AnonymousTokenAuth {
    /// `token_url` may contain `{device_id}`, filled with a fresh random id.
    pub fn new(fetcher: Arc<dyn PayloadFetcher>, token_url: &str) -> Self {
        let device_id = uuid::Uuid::new_v4().simple().to_string();
        Self {
            fetcher,
            token_url: token_url.replace("{device_id}", &device_id),
            token: Mutex::new(None),
        }
    }
}

#[async_trait]
impl AuthProvider for AnonymousTokenAuth {
    async fn ensure_token(&self) -> Result<Token, AuthError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let response = self.fetcher.fetch(&FetchRequest::get(&self.token_url)).await?;
        if !response.is_success() {
            return Err(ResolveError::transport(
                &self.token_url,
                format!("token endpoint returned {}", response.status),
            )
            .into());
        }

        let payload: Value = serde_json::from_str(&response.body)
            .map_err(|e| ResolveError::malformed(&self.token_url, e.to_string()))?;
        let token = str_at(&payload, "/data/attributes/token")
            .map(Token::new)
            .ok_or_else(|| ResolveError::malformed(&self.token_url, "missing data.attributes.token"))?;

        *cached = Some(token.clone());
        Ok(token)
    }

    async fn invalidate(&self, rejected: &Token) {
        let mut cached = self.token.lock().await;
        if cached.as_ref() == Some(rejected) {
            *cached = None;
        }
    }
}
