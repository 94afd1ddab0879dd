//! Request and response snapshots handed to the engine by the server.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Read-only view of an incoming request.
///
/// Extractors pull typed values out of it; nothing in the engine mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestInfo {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
}

impl RequestInfo {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Build a request from a method name and a URI string.
    pub fn parse(method: &str, uri: &str) -> Result<Self, http::Error> {
        let method = Method::from_bytes(method.as_bytes())?;
        let uri: Uri = uri.parse()?;
        Ok(Self::new(method, uri))
    }

    /// Append a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, http::Error> {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        let value = HeaderValue::from_str(value)?;
        self.headers.append(name, value);
        Ok(self)
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query_string(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Decoded query parameters, in the order they appear.
    pub fn query(&self) -> QueryParams {
        parse_query_string(self.query_string().unwrap_or(""))
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header. Lookup is case-insensitive; bytes outside
    /// visible ASCII are decoded lossily as UTF-8.
    pub fn header(&self, name: &str) -> Option<Cow<'_, str>> {
        self.headers.get(name).map(header_text)
    }

    /// Headers as lowercase name -> all values.
    pub fn header_map(&self) -> BTreeMap<String, Vec<String>> {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in &self.headers {
            map.entry(name.as_str().to_string())
                .or_default()
                .push(header_text(value).into_owned());
        }
        map
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body as UTF-8 text, if it is valid UTF-8.
    pub fn body_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

fn header_text(value: &HeaderValue) -> Cow<'_, str> {
    match value.to_str() {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => String::from_utf8_lossy(value.as_bytes()),
    }
}

/// Completed response, passed to post-actions once it has been produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseInfo {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ResponseInfo {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// Decoded query parameters. Keeps duplicates and their order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((name.into(), value.into()));
    }

    /// First value for a parameter.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == name)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Group values by parameter name.
    pub fn to_multi_map(&self) -> BTreeMap<String, Vec<String>> {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (k, v) in &self.pairs {
            map.entry(k.clone()).or_default().push(v.clone());
        }
        map
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Parse a query string into decoded name/value pairs.
pub fn parse_query_string(query: &str) -> QueryParams {
    let mut params = QueryParams::new();

    for part in query.split('&') {
        if part.is_empty() {
            continue;
        }
        match part.split_once('=') {
            Some((key, value)) => params.push(decode_component(key), decode_component(value)),
            None => params.push(decode_component(part), String::new()),
        }
    }

    params
}

fn decode_component(s: &str) -> String {
    let s = s.replace('+', " ");
    let decoded = urlencoding::decode(&s).map(|d| d.into_owned());
    decoded.unwrap_or(s)
}
