//! Minimal, domain/path agnostic cookie jar.

use crate::cookies::cookie::Cookie;

/// Where a batch of cookies came from.
#[derive(Debug, Clone, Copy)]
pub enum CookieSource<'a> {
    /// A `Cookie` request header: `a=b; c=d`.
    Header(&'a str),
    /// One cookie string per entry, as found in `Set-Cookie` headers.
    List(&'a [String]),
}

impl<'a> From<&'a str> for CookieSource<'a> {
    fn from(header: &'a str) -> Self {
        CookieSource::Header(header)
    }
}

impl<'a> From<&'a [String]> for CookieSource<'a> {
    fn from(list: &'a [String]) -> Self {
        CookieSource::List(list)
    }
}

impl<'a> From<&'a Vec<String>> for CookieSource<'a> {
    fn from(list: &'a Vec<String>) -> Self {
        CookieSource::List(list.as_slice())
    }
}

/// Cookie state for one connection, keyed by cookie name.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    /// Create an empty jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store every parsable cookie from `source`, overwriting by name.
    ///
    /// Returns how many cookies were stored. Malformed entries are skipped.
    pub fn set_cookies<'a>(&mut self, source: impl Into<CookieSource<'a>>) -> usize {
        match source.into() {
            CookieSource::Header(header) => header
                .split(';')
                .filter(|piece| !piece.trim().is_empty())
                .map(|piece| self.store(piece))
                .filter(|stored| *stored)
                .count(),
            CookieSource::List(list) => list
                .iter()
                .map(|raw| self.store(raw))
                .filter(|stored| *stored)
                .count(),
        }
    }

    /// Serialize the jar as a `Cookie` header value.
    pub fn get_cookies(&self) -> String {
        self.cookies
            .iter()
            .map(Cookie::to_value_string)
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Drop every cookie.
    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    pub fn get(&self, name: &str) -> Option<&Cookie> {
        self.cookies.iter().find(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.iter()
    }

    fn store(&mut self, raw: &str) -> bool {
        match Cookie::parse(raw) {
            Ok(cookie) => {
                match self.cookies.iter_mut().find(|c| c.name == cookie.name) {
                    Some(existing) => *existing = cookie,
                    None => self.cookies.push(cookie),
                }
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "Skipping malformed cookie");
                false
            }
        }
    }
}
