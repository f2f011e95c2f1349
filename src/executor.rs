use std::collections::BTreeMap;
use std::time::Instant;

use bytes::Bytes;
use http::header::HeaderMap;
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::Serialize;
use serde_json::Value;
use url::Position;

use crate::error::{Error, Result};
use crate::request::ExecutedRequest;

/// What the target actually sent back.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActualResponse {
    pub http_code: u16,
    /// Wall clock from connecting to having read the whole body.
    pub latency_ms: u64,
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: Value,
    #[serde(skip)]
    pub raw_body: Bytes,
}

type HttpClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// A client that keeps no idle connections, so every request dials anew.
/// TLS uses rustls with the ring provider and the bundled webpki roots.
fn client() -> Result<HttpClient> {
    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())
        .map_err(|err| Error::Tls(err.to_string()))?
        .https_or_http()
        .enable_http1()
        .build();

    Ok(Client::builder(TokioExecutor::new())
        .pool_max_idle_per_host(0)
        .build(https))
}

/// Sends the request on a fresh connection and reads the full response.
///
/// Transport failures and bodies that are not JSON are hard errors. An empty
/// body decodes to `null`.
pub async fn execute(request: &ExecutedRequest) -> Result<ActualResponse> {
    let url = &request.url;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::UnsupportedScheme(url.scheme().to_string()));
    }
    let authority = &url[Position::BeforeHost..Position::AfterPort];

    let client = client()?;

    let mut req = hyper::Request::builder()
        .method(request.verb.method())
        .uri(url.as_str())
        .body(Full::new(request.body.clone().unwrap_or_default()))?;
    *req.headers_mut() = request.headers.clone();

    log::debug!("{} {url}", request.verb);

    let started = Instant::now();

    let res = client.request(req).await.map_err(|err| {
        if err.is_connect() {
            Error::Connect {
                addr: authority.to_string(),
                source: err,
            }
        } else {
            Error::Client(err)
        }
    })?;
    let http_code = res.status().as_u16();
    let headers = collect_headers(res.headers());

    let raw_body = res.into_body().collect().await?.to_bytes();
    let latency_ms = started.elapsed().as_millis() as u64;

    log::debug!("response {http_code} in {latency_ms}ms, headers: {headers:?}");

    let body = decode_body(&raw_body)?;

    Ok(ActualResponse {
        http_code,
        latency_ms,
        headers,
        body,
        raw_body,
    })
}

fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut collected: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        collected
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    collected
}

fn decode_body(raw: &[u8]) -> Result<Value> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(raw).map_err(Error::ResponseBody)
}
