use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde_json::Value;
use url::form_urlencoded::byte_serialize;
use url::Url;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::test_case::{Header, Parameter, Request};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Patch,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
            Verb::Head => "HEAD",
            Verb::Patch => "PATCH",
        }
    }

    pub fn method(&self) -> http::Method {
        match self {
            Verb::Get => http::Method::GET,
            Verb::Post => http::Method::POST,
            Verb::Put => http::Method::PUT,
            Verb::Delete => http::Method::DELETE,
            Verb::Head => http::Method::HEAD,
            Verb::Patch => http::Method::PATCH,
        }
    }
}

impl FromStr for Verb {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "GET" => Ok(Verb::Get),
            "POST" => Ok(Verb::Post),
            "PUT" => Ok(Verb::Put),
            "DELETE" => Ok(Verb::Delete),
            "HEAD" => Ok(Verb::Head),
            "PATCH" => Ok(Verb::Patch),
            other => Err(Error::InvalidVerb(other.to_string())),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully materialized outbound request. Built once, never modified.
#[derive(Debug, Clone)]
pub struct ExecutedRequest {
    pub verb: Verb,
    /// Base URL + path + query string.
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    /// The declared request with the base URL applied, echoed in the result.
    pub declared: Request,
}

/// Turns a declarative request into an [`ExecutedRequest`]. No I/O happens here.
pub fn build_request(config: &Config, request: &Request) -> Result<ExecutedRequest> {
    let verb: Verb = request.verb.parse()?;

    let target = format!("{}{}", config.base_url, request.url);
    let query = assemble_query(&request.payload.parameters);
    log::debug!("query string: {query}");

    let raw = format!("{target}{query}");
    let url = Url::parse(&raw).map_err(|source| Error::InvalidUrl { url: raw, source })?;

    let body = encode_body(&request.payload.body)?;
    let headers = apply_headers(&request.payload.headers, body.is_some())?;

    Ok(ExecutedRequest {
        verb,
        url,
        headers,
        body,
        declared: Request {
            url: target,
            ..request.clone()
        },
    })
}

/// `?k1=v1&k2=v2`, or an empty string when there are no parameters.
///
/// Values are HTML-unescaped first and then form-encoded. Only the first value
/// of a parameter is used; a parameter without values is sent as `key=`.
pub fn assemble_query(parameters: &[Parameter]) -> String {
    let mut query = String::new();

    for param in parameters {
        query.push(if query.is_empty() { '?' } else { '&' });

        let value = param.value.first().map(String::as_str).unwrap_or_default();
        let value = html_escape::decode_html_entities(value);

        query.extend(byte_serialize(param.key.as_bytes()));
        query.push('=');
        query.extend(byte_serialize(value.as_bytes()));
    }

    query
}

fn encode_body(body: &Value) -> Result<Option<Bytes>> {
    if body.is_null() {
        return Ok(None);
    }

    let encoded = serde_json::to_vec(body).map_err(Error::RequestBody)?;
    log::debug!("request body: {}", String::from_utf8_lossy(&encoded));
    Ok(Some(Bytes::from(encoded)))
}

fn apply_headers(declared: &[Header], has_body: bool) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    if has_body {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    for Header { header, value } in declared {
        log::debug!("request header: {header}: {value}");

        let name = HeaderName::from_bytes(header.as_bytes())
            .map_err(|_| Error::InvalidHeader(header.clone()))?;
        // Non-ASCII text goes out as its UTF-8 bytes; control characters are refused.
        let value = HeaderValue::from_bytes(value.as_bytes())
            .map_err(|_| Error::InvalidHeader(header.clone()))?;
        headers.insert(name, value);
    }

    Ok(headers)
}
