//! Request and response metadata snapshots.

use std::sync::{Arc, Mutex};

use axum::http::{header, request, HeaderMap, StatusCode};

use crate::trace::lock;

/// Everything the request header block reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    /// Scheme, authority and path, without the query.
    pub url: String,
    pub query: Option<String>,
    /// Header names with their first value, in arrival order.
    pub headers: Vec<(String, String)>,
    /// Parameter names with every value, in first-seen order.
    pub parameters: Vec<(String, Vec<String>)>,
}

impl RequestHead {
    /// Snapshot an HTTP request head. Parameters come from the query string.
    pub fn from_parts(parts: &request::Parts) -> Self {
        let uri = &parts.uri;
        let url = match (uri.scheme_str(), uri.authority()) {
            (Some(scheme), Some(authority)) => format!("{}://{}{}", scheme, authority, uri.path()),
            _ => {
                let host = parts
                    .headers
                    .get(header::HOST)
                    .and_then(|h| h.to_str().ok())
                    .unwrap_or("localhost");
                format!("http://{}{}", host, uri.path())
            }
        };
        let query = uri.query().map(str::to_string);
        let parameters = query.as_deref().map(parse_parameters).unwrap_or_default();

        Self {
            method: parts.method.to_string(),
            url,
            query,
            headers: header_pairs(&parts.headers),
            parameters,
        }
    }
}

/// Group `application/x-www-form-urlencoded` pairs by name.
pub fn parse_parameters(query: &str) -> Vec<(String, Vec<String>)> {
    let mut params: Vec<(String, Vec<String>)> = Vec::new();
    for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match params.iter_mut().find(|(n, _)| *n == name) {
            Some((_, values)) => values.push(value.into_owned()),
            None => params.push((name.into_owned(), vec![value.into_owned()])),
        }
    }
    params
}

fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .keys()
        .filter_map(|name| {
            let value = headers.get(name)?;
            Some((
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            ))
        })
        .collect()
}

/// Everything the response header block reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHead {
    /// `None` until the application sets a status.
    pub status: Option<u16>,
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    pub fn from_parts(status: StatusCode, headers: &HeaderMap) -> Self {
        Self {
            status: Some(status.as_u16()),
            headers: header_pairs(headers),
        }
    }
}

/// Deferred view of a response, read when the trace is finalized.
pub trait ResponseMetadata: Send + Sync {
    fn snapshot(&self) -> ResponseHead;
}

/// Mutable response head shared between a response and its trace.
#[derive(Debug, Clone, Default)]
pub struct SharedResponseHead(Arc<Mutex<ResponseHead>>);

impl SharedResponseHead {
    pub fn set_status(&self, status: u16) {
        lock(&self.0).status = Some(status);
    }

    /// Replace any existing value of `name` (case-insensitive).
    pub fn set_header(&self, name: &str, value: &str) {
        let mut head = lock(&self.0);
        match head.headers.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some((_, v)) => *v = value.to_string(),
            None => head.headers.push((name.to_string(), value.to_string())),
        }
    }

    /// Overwrite the head with what an HTTP response carries.
    pub fn capture(&self, status: StatusCode, headers: &HeaderMap) {
        *lock(&self.0) = ResponseHead::from_parts(status, headers);
    }

    /// Forget status and headers, as a response reset does.
    pub fn clear(&self) {
        *lock(&self.0) = ResponseHead::default();
    }
}

impl ResponseMetadata for SharedResponseHead {
    fn snapshot(&self) -> ResponseHead {
        lock(&self.0).clone()
    }
}
