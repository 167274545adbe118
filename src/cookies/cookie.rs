//! Single cookie parsing.
//!
//! Accepts both the bare `name=value` pairs found in a `Cookie` request header
//! and full `Set-Cookie` lines with attributes.

use thiserror::Error;

/// Errors produced while parsing a cookie string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CookieParseError {
    /// Nothing but whitespace was given.
    #[error("empty cookie string")]
    Empty,

    /// The leading pair has no `=` separator.
    #[error("cookie pair '{0}' has no '=' separator")]
    MissingSeparator(String),

    /// The cookie name is empty or contains forbidden characters.
    #[error("invalid cookie name '{0}'")]
    InvalidName(String),
}

/// A cookie as stored in the jar.
///
/// Only `name` and `value` are serialized back into requests. Attributes are
/// kept for inspection and logging.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub expires: Option<String>,
    pub max_age: Option<i64>,
    pub secure: bool,
    pub http_only: bool,
}

impl Cookie {
    /// Create a cookie from a name and value without attributes.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    /// Parse `name=value` optionally followed by `; Attr=...` segments.
    pub fn parse(raw: &str) -> Result<Self, CookieParseError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(CookieParseError::Empty);
        }

        let mut segments = raw.split(';');
        let pair = segments.next().unwrap_or_default().trim();
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| CookieParseError::MissingSeparator(pair.to_string()))?;

        let name = name.trim();
        if !is_valid_name(name) {
            return Err(CookieParseError::InvalidName(name.to_string()));
        }

        let mut cookie = Cookie::new(name, value.trim());
        for attribute in segments {
            cookie.apply_attribute(attribute.trim());
        }
        Ok(cookie)
    }

    /// Render the `name=value` pair used in a `Cookie` request header.
    pub fn to_value_string(&self) -> String {
        format!("{}={}", self.name, self.value)
    }

    fn apply_attribute(&mut self, attribute: &str) {
        let (key, value) = match attribute.split_once('=') {
            Some((k, v)) => (k.trim(), Some(v.trim())),
            None => (attribute, None),
        };

        match (key.to_ascii_lowercase().as_str(), value) {
            ("path", Some(v)) => self.path = Some(v.to_string()),
            ("domain", Some(v)) => self.domain = Some(v.to_string()),
            ("expires", Some(v)) => self.expires = Some(v.to_string()),
            ("max-age", Some(v)) => self.max_age = v.parse().ok(),
            ("secure", _) => self.secure = true,
            ("httponly", _) => self.http_only = true,
            // SameSite, Priority and friends carry nothing the jar needs.
            _ => {}
        }
    }
}

/// RFC 6265 token: visible ASCII without separators.
fn is_valid_name(name: &str) -> bool {
    const SEPARATORS: &[u8] = b"()<>@,;:\\\"/[]?={} \t";
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_graphic() && !SEPARATORS.contains(&b))
}
