//! The `result` module exposes the crate-wide `Error` and `Result` types.

use reqwest;
use serde_json;
use std::error;
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum Error {
    /// Project absent from the static configuration, empty wallet, invalid
    /// collaborator allocation, or missing required credentials.
    Config(String),
    /// No backend record for an identifier the configuration promises.
    NotFound(String),
    /// A milestone-API or indexer call failed; callers degrade to defaults.
    UpstreamFetch(String),
    /// Writing a table, cache or summary file failed; fatal to the run.
    Persistence(String),
    /// Webhook delivery failed; logged and swallowed, never escalated.
    Notification(String),
    Io(io::Error),
    Http(reqwest::Error),
    Json(serde_json::Error),
}

pub type Result<T> = ::std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Config(ref msg) => write!(f, "configuration error: {}", msg),
            Error::NotFound(ref msg) => write!(f, "not found: {}", msg),
            Error::UpstreamFetch(ref msg) => write!(f, "upstream fetch failed: {}", msg),
            Error::Persistence(ref msg) => write!(f, "persistence failed: {}", msg),
            Error::Notification(ref msg) => write!(f, "notification failed: {}", msg),
            Error::Io(ref err) => write!(f, "io error: {}", err),
            Error::Http(ref err) => write!(f, "http error: {}", err),
            Error::Json(ref err) => write!(f, "json error: {}", err),
        }
    }
}

impl error::Error for Error {
    fn description(&self) -> &str {
        match *self {
            Error::Config(_) => "configuration error",
            Error::NotFound(_) => "not found",
            Error::UpstreamFetch(_) => "upstream fetch failed",
            Error::Persistence(_) => "persistence failed",
            Error::Notification(_) => "notification failed",
            Error::Io(_) => "io error",
            Error::Http(_) => "http error",
            Error::Json(_) => "json error",
        }
    }

    fn cause(&self) -> Option<&error::Error> {
        match *self {
            Error::Io(ref err) => Some(err),
            Error::Http(ref err) => Some(err),
            Error::Json(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Error {
        Error::Http(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::Json(err)
    }
}
