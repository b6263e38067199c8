//! Server configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! address = "0.0.0.0:8080"
//! log_level = "debug"
//! max_body_size = 1048576
//!
//! [static_files]
//! root = "./public"
//!
//! [auth]
//! secret = "change me"
//! allow_prefixes = ["/login", "/public/"]
//! ```

use crate::error::ConfigError;
use crate::middleware::{AuthMiddleware, HmacAuthenticator, StaticFilesMiddleware};
use crate::render::TemplateRenderer;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::Level;

const DEFAULT_ADDRESS: &str = "127.0.0.1:8080";
const DEFAULT_MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    pub log_level: String,
    /// Largest accepted request body in bytes; larger bodies get `413`.
    pub max_body_size: usize,
    pub static_files: StaticFilesConfig,
    pub templates: TemplatesConfig,
    pub auth: Option<AuthConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            log_level: "info".to_string(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            static_files: StaticFilesConfig::default(),
            templates: TemplatesConfig::default(),
            auth: None,
        }
    }
}

impl ServerConfig {
    /// Reads and validates a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;
        self.level()?;
        if let Some(auth) = &self.auth
            && auth.secret.is_empty()
        {
            return Err(ConfigError::EmptySecret);
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.address
            .parse()
            .map_err(|source| ConfigError::InvalidAddress { address: self.address.clone(), source })
    }

    pub fn level(&self) -> Result<Level, ConfigError> {
        Level::from_str(&self.log_level).map_err(|_unknown| ConfigError::invalid_log_level(&self.log_level))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    pub enabled: bool,
    pub root: PathBuf,
    pub index_file: String,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self { enabled: true, root: PathBuf::from("."), index_file: "index.html".to_string() }
    }
}

impl StaticFilesConfig {
    pub fn middleware(&self) -> StaticFilesMiddleware {
        StaticFilesMiddleware::from_dir(&self.root, &self.index_file)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatesConfig {
    pub root: PathBuf,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self { root: PathBuf::from(".") }
    }
}

impl TemplatesConfig {
    /// A renderer with its own, initially empty, template cache.
    pub fn renderer(&self) -> TemplateRenderer {
        TemplateRenderer::with_root(&self.root)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    pub secret: String,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_allow_prefixes")]
    pub allow_prefixes: Vec<String>,
}

fn default_cookie_name() -> String {
    crate::middleware::DEFAULT_COOKIE_NAME.to_string()
}

fn default_login_path() -> String {
    crate::middleware::DEFAULT_LOGIN_PATH.to_string()
}

fn default_allow_prefixes() -> Vec<String> {
    vec![default_login_path()]
}

impl AuthConfig {
    pub fn authenticator(&self) -> Result<HmacAuthenticator, ConfigError> {
        HmacAuthenticator::new(&self.secret)
    }

    pub fn middleware(&self) -> Result<AuthMiddleware, ConfigError> {
        Ok(AuthMiddleware::new(self.authenticator()?)
            .cookie_name(&self.cookie_name)
            .login_path(&self.login_path)
            .allow_prefixes(&self.allow_prefixes))
    }
}
