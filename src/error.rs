use std::error::Error;
use std::fmt;

/// Custom Error and Result types to unify errors from all sources.
pub type ProxyResult<T> = Result<T, ProxyError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    FetchFailed(String),
    ParseFailed(String),
    Config(String),
    Server(String),
}

impl ProxyError {
    /// Short machine-readable label, exposed in failed HTTP responses.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::FetchFailed(_) => "fetch",
            ProxyError::ParseFailed(_) => "parse",
            ProxyError::Config(_) => "config",
            ProxyError::Server(_) => "server",
        }
    }
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProxyError::FetchFailed(s) => write!(f, "Fetch Error: {}", s),
            ProxyError::ParseFailed(s) => write!(f, "Parse Error: {}", s),
            ProxyError::Config(s) => write!(f, "Config Error: {}", s),
            ProxyError::Server(s) => write!(f, "Server Error: {}", s),
        }
    }
}

impl Error for ProxyError {}

impl From<reqwest::Error> for ProxyError {
    fn from(error: reqwest::Error) -> Self {
        ProxyError::FetchFailed(error.to_string())
    }
}

impl From<figment::Error> for ProxyError {
    fn from(error: figment::Error) -> Self {
        ProxyError::Config(error.to_string())
    }
}

impl From<std::io::Error> for ProxyError {
    fn from(error: std::io::Error) -> Self {
        ProxyError::Server(error.to_string())
    }
}
