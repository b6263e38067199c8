//! Cookie based authentication.
//!
//! Requests carry a credential in a cookie. Paths starting with one of the
//! allow-listed prefixes pass through untouched; everything else needs a
//! credential the [`Authenticator`] accepts, or it is redirected to the login
//! path.

use crate::RequestContext;
use crate::error::ConfigError;
use crate::handler::{BoxHandler, RequestHandler};
use crate::middleware::Middleware;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use http::StatusCode;
use sha2::Sha256;
use std::sync::Arc;
use tracing::{debug, error};

pub const DEFAULT_COOKIE_NAME: &str = "X_AUTH";
pub const DEFAULT_LOGIN_PATH: &str = "/login";
const DEFAULT_MESSAGE: &str = "verified";

/// Decides whether a credential is acceptable.
#[cfg_attr(test, mockall::automock)]
pub trait Authenticator: Send + Sync {
    fn verify(&self, token: &str) -> bool;
}

/// Issues and checks HMAC-SHA256 signatures of a fixed message.
///
/// Tokens are the url-safe base64 encoding of the signature, so they can be
/// stored in a cookie as is.
#[derive(Clone)]
pub struct HmacAuthenticator {
    mac: Hmac<Sha256>,
    message: String,
}

impl HmacAuthenticator {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, ConfigError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        let mac = Hmac::<Sha256>::new_from_slice(secret).map_err(|_invalid_length| ConfigError::EmptySecret)?;
        Ok(Self { mac, message: DEFAULT_MESSAGE.to_string() })
    }

    /// Replaces the signed message, `verified` by default.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn sign(&self, message: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(message.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    /// The token a logged in client should present.
    pub fn token(&self) -> String {
        self.sign(&self.message)
    }
}

impl Authenticator for HmacAuthenticator {
    fn verify(&self, token: &str) -> bool {
        let Ok(signature) = URL_SAFE_NO_PAD.decode(token) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(self.message.as_bytes());
        mac.verify_slice(&signature).is_ok()
    }
}

impl std::fmt::Debug for HmacAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacAuthenticator").field("message", &self.message).finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct AuthMiddleware {
    authenticator: Arc<dyn Authenticator>,
    cookie_name: String,
    login_path: String,
    allow_prefixes: Vec<String>,
}

impl AuthMiddleware {
    /// Creates the middleware with the `X_AUTH` cookie, the `/login` path and
    /// the login path as the only allowed prefix.
    pub fn new<A: Authenticator + 'static>(authenticator: A) -> Self {
        Self {
            authenticator: Arc::new(authenticator),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            allow_prefixes: vec![DEFAULT_LOGIN_PATH.to_string()],
        }
    }

    #[must_use]
    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Replaces the allow-listed path prefixes.
    #[must_use]
    pub fn allow_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Adds one allow-listed path prefix.
    #[must_use]
    pub fn allow(mut self, prefix: impl Into<String>) -> Self {
        self.allow_prefixes.push(prefix.into());
        self
    }
}

impl std::fmt::Debug for AuthMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthMiddleware")
            .field("cookie_name", &self.cookie_name)
            .field("login_path", &self.login_path)
            .field("allow_prefixes", &self.allow_prefixes)
            .finish_non_exhaustive()
    }
}

impl Middleware for AuthMiddleware {
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        Arc::new(AuthStage { config: self.clone(), next })
    }
}

struct AuthStage {
    config: AuthMiddleware,
    next: BoxHandler,
}

enum Verdict {
    Pass,
    Redirect,
    Fail,
}

impl AuthStage {
    fn check(&self, ctx: &RequestContext) -> Verdict {
        let path = ctx.path();
        if self.config.allow_prefixes.iter().any(|prefix| path.starts_with(prefix.as_str())) {
            return Verdict::Pass;
        }

        match ctx.cookie(&self.config.cookie_name) {
            Ok(Some(token)) if self.config.authenticator.verify(token) => Verdict::Pass,
            Ok(Some(_)) => {
                debug!(path, "invalid credential");
                Verdict::Redirect
            }
            Ok(None) => {
                debug!(path, "missing credential");
                Verdict::Redirect
            }
            Err(e) => {
                error!(path, cause = %e, "read credential cookie error");
                Verdict::Fail
            }
        }
    }
}

#[async_trait]
impl RequestHandler for AuthStage {
    async fn invoke(&self, ctx: &mut RequestContext) {
        match self.check(ctx) {
            Verdict::Pass => self.next.invoke(ctx).await,
            Verdict::Redirect => ctx.redirect(&self.config.login_path),
            Verdict::Fail => ctx.render_error(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}
