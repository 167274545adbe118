//! Canonical request/response shapes exchanged with the pipeline.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use axum::body::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Request header map. Keys are lower-cased before injection.
pub type Headers = BTreeMap<String, String>;

/// Response header map.
pub type ResponseHeaders = BTreeMap<String, HeaderValues>;

/// The HTTP methods a socket client may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
}

impl Method {
    pub const ALL: [Method; 7] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Delete,
        Method::Patch,
        Method::Options,
        Method::Head,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Options => "OPTIONS",
            Method::Head => "HEAD",
        }
    }
}

impl FromStr for Method {
    type Err = ();

    /// Case-insensitive match against the supported methods.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated request ready for the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    pub payload: Option<Value>,
}

/// One or many values for a response header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValues {
    One(String),
    Many(Vec<String>),
}

impl HeaderValues {
    /// All values as a slice-like vector.
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            HeaderValues::One(v) => vec![v.clone()],
            HeaderValues::Many(vs) => vs.clone(),
        }
    }
}

impl From<&str> for HeaderValues {
    fn from(value: &str) -> Self {
        HeaderValues::One(value.to_string())
    }
}

impl From<String> for HeaderValues {
    fn from(value: String) -> Self {
        HeaderValues::One(value)
    }
}

impl From<Vec<String>> for HeaderValues {
    fn from(values: Vec<String>) -> Self {
        HeaderValues::Many(values)
    }
}

/// The pipeline's answer, body still unparsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status_code: u16,
    pub headers: ResponseHeaders,
    pub raw_body: Bytes,
}

impl Response {
    pub fn new(status_code: u16, raw_body: impl Into<Bytes>) -> Self {
        Self {
            status_code,
            headers: ResponseHeaders::new(),
            raw_body: raw_body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<HeaderValues>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// A 400 carrying `reason` in the usual JSON error envelope.
    pub fn bad_request(reason: &str) -> Self {
        Self::error(400, "Bad Request", reason)
    }

    /// JSON error envelope: `{statusCode, error, message}`.
    pub fn error(status_code: u16, error: &str, message: &str) -> Self {
        let body = json!({
            "statusCode": status_code,
            "error": error,
            "message": message,
        });
        Self::new(status_code, body.to_string())
    }
}

/// Lower-case every header name. On collision the later key wins.
///
/// Works on request [`Headers`] and on [`ResponseHeaders`] alike.
pub fn lower_keys<V>(headers: BTreeMap<String, V>) -> BTreeMap<String, V> {
    headers
        .into_iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v))
        .collect()
}
