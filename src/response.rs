use crate::error::Result;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde_json::Value;
use std::io::Read;

/// Raw HTTP response handed back by a transport.
///
/// The body is streamed; it is read at most once.
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Box<dyn Read + Send>,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Box<dyn Read + Send>) -> Self {
        Response {
            status,
            headers,
            body,
        }
    }

    /// Build a response around an in-memory body
    pub fn from_bytes(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Response::new(
            status,
            HeaderMap::new(),
            Box::new(std::io::Cursor::new(body.into())),
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Hand out the body reader
    pub fn into_body(self) -> Box<dyn Read + Send> {
        self.body
    }

    /// Drain the body
    pub fn bytes(mut self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.body.read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    /// Drain the body as text, replacing invalid UTF-8
    pub fn text(self) -> Result<String> {
        let bytes = self.bytes()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Drain the body and deserialize it as JSON
    pub fn json<T>(self) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let bytes = self.bytes()?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Re-indent a JSON document with two spaces
pub fn pretty_json(bytes: &[u8]) -> Result<String> {
    let value: Value = serde_json::from_slice(bytes)?;
    Ok(serde_json::to_string_pretty(&value)?)
}
