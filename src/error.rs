//! Crate-wide error type, grounded on the teacher's `CleanError`: a hand
//! written `Display`/`Debug`/`Error` wrapper with `From` conversions at
//! every boundary, rather than `thiserror`/`anyhow`.

use std::fmt;

use crate::config::ConfigError;

pub struct ServerError(pub Box<dyn std::error::Error + Send + Sync>);

impl fmt::Debug for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\r\x1b[K{}", self)
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\x1b[31mERROR\x1b[0m: {}", self.0)
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.0.as_ref())
    }
}

#[derive(Debug)]
pub struct GenericError(pub String);

impl fmt::Display for GenericError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for GenericError {}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        ServerError(Box::new(e))
    }
}

impl From<std::net::AddrParseError> for ServerError {
    fn from(e: std::net::AddrParseError) -> Self {
        ServerError(Box::new(e))
    }
}

impl From<ConfigError> for ServerError {
    fn from(e: ConfigError) -> Self {
        ServerError(Box::new(GenericError(e.to_string())))
    }
}

impl From<String> for ServerError {
    fn from(s: String) -> Self {
        ServerError(Box::new(GenericError(s)))
    }
}

impl From<&str> for ServerError {
    fn from(s: &str) -> Self {
        ServerError(Box::new(GenericError(s.to_string())))
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
