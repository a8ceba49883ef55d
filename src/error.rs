use std::fmt;

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    Timeout,
    Authentication(String),
    Api(String),
    Validation(String),
    Protocol(String),
    Decode(serde_json::Error),
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Timeout => write!(f, "request timed out"),
            Error::Authentication(msg) => write!(f, "authentication failed: {msg}"),
            Error::Api(msg) => write!(f, "API error: {msg}"),
            Error::Validation(msg) => write!(f, "invalid request: {msg}"),
            Error::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Error::Decode(e) => write!(f, "JSON decode error: {e}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Decode(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout
        } else {
            Error::Http(e)
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
