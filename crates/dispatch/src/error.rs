use std::io;
use std::net::AddrParseError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegisterError {
    #[error("invalid method '{method}'")]
    InvalidMethod { method: String },

    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl RegisterError {
    pub fn invalid_method<S: ToString>(method: S) -> Self {
        Self::InvalidMethod { method: method.to_string() }
    }

    pub fn invalid_pattern<S: ToString, R: ToString>(pattern: S, reason: R) -> Self {
        Self::InvalidPattern { pattern: pattern.to_string(), reason: reason.to_string() }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("can not read config file {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("can not parse config: {source}")]
    Parse {
        #[from]
        source: toml::de::Error,
    },

    #[error("invalid address '{address}': {source}")]
    InvalidAddress { address: String, source: AddrParseError },

    #[error("invalid log level '{level}'")]
    InvalidLogLevel { level: String },

    #[error("auth secret must not be empty")]
    EmptySecret,
}

impl ConfigError {
    pub fn invalid_log_level<S: ToString>(level: S) -> Self {
        Self::InvalidLogLevel { level: level.to_string() }
    }
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Register(#[from] RegisterError),

    #[error("can not bind {address}: {source}")]
    Bind { address: String, source: io::Error },
}
