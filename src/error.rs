//! Hard errors: anything that stops a test case from reaching a verdict.
//!
//! A response that does not match its expectation is not an error, see
//! [`crate::verify::Verdict`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unable to read test case content: {0}")]
    Read(#[source] std::io::Error),

    #[error("unable to parse test case as JSON: {0}")]
    Json(#[source] serde_json::Error),

    #[error("test case must be a JSON object")]
    NotAnObject,

    #[error("request.verb must be one of GET, POST, PUT, DELETE, HEAD, PATCH, got `{0}`")]
    InvalidVerb(String),

    #[error("invalid request url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported url scheme `{0}`, only http and https targets are supported")]
    UnsupportedScheme(String),

    #[error("invalid request header `{0}`")]
    InvalidHeader(String),

    #[error("unable to serialize request body: {0}")]
    RequestBody(#[source] serde_json::Error),

    #[error("unable to set up TLS: {0}")]
    Tls(String),

    #[error("unable to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    #[error("unable to build HTTP request: {0}")]
    Request(#[from] http::Error),

    #[error("unable to execute HTTP request: {0}")]
    Client(#[from] hyper_util::client::legacy::Error),

    #[error("unable to read HTTP response: {0}")]
    Transport(#[from] hyper::Error),

    #[error("unable to parse HTTP response body as JSON: {0}")]
    ResponseBody(#[source] serde_json::Error),

    #[error("unrecognized verification strategy `{0}`, expect.parse_as should be one of 'regex', 'exact_match', 'partial_match', 'json_schema'")]
    UnknownStrategy(String),

    #[error("invalid expectation: {0}")]
    InvalidExpectation(String),

    #[error("invalid regex for expect.body.{field}: {source}")]
    Regex {
        field: String,
        #[source]
        source: regex::Error,
    },

    #[error("unable to run JSON schema validation: {0}")]
    Schema(String),

    #[error("unable to render test result: {0}")]
    Render(#[source] serde_json::Error),

    #[error("unable to write test result: {0}")]
    Persist(#[source] std::io::Error),

    #[error("test case pipeline panicked: {0}")]
    Panicked(String),
}

pub type Result<T> = std::result::Result<T, Error>;
