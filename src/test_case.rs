use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};

/// Descriptive metadata. Echoed into the result, never used to decide anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestInfo {
    pub id: String,
    pub description: String,
    pub version: String,
    pub date_uploaded: String,
    pub author: String,
    #[serde(deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Header {
    pub header: String,
    pub value: String,
}

/// A query parameter. Only the first value is ever sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameter {
    pub key: String,
    #[serde(deserialize_with = "one_or_many")]
    pub value: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Payload {
    #[serde(deserialize_with = "null_as_default")]
    pub headers: Vec<Header>,
    pub body: Value,
    #[serde(deserialize_with = "null_as_default")]
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Request {
    pub verb: String,
    pub url: String,
    pub payload: Payload,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Expect {
    /// Verification strategy tag; empty when the case only collects data.
    pub parse_as: String,
    /// `0` means "not checked".
    pub http_code: u16,
    /// `0` means "not checked".
    pub max_latency_ms: u64,
    pub headers: Value,
    pub body: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestCase {
    pub test_info: TestInfo,
    pub request: Request,
    pub expect: Expect,
}

impl TestCase {
    /// Parses a test case document. The top level has to be a JSON object.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes).map_err(Error::Json)?;
        if !value.is_object() {
            return Err(Error::NotAnObject);
        }

        let case: TestCase = serde_json::from_value(value).map_err(Error::Json)?;
        log::debug!("testcase: {case:?}");
        Ok(case)
    }

    pub async fn from_reader<R>(mut reader: R) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.map_err(Error::Read)?;
        Self::from_slice(&buf)
    }
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(value)) => vec![value],
        Some(OneOrMany::Many(values)) => values,
    })
}

/// `null` reads the same as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
