use crate::client::{self, Config};
use crate::error::{RestError, Result};
use crate::multipart::MultipartForm;
use crate::oauth::Credentials;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Method;
use std::collections::BTreeMap;
use tracing::{debug, warn};
use url::{form_urlencoded, Position, Url};

/// Query parameters, encoded in key order
pub type Params = BTreeMap<String, String>;

/// Content type of signable form bodies
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A request ready for the transport.
///
/// Produced unsigned by [`prepare`] and signed by [`ApiRequest::sign`] or [`build`].
/// The URL path is exactly the literal path given by the caller.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
    form: Vec<(String, String)>,
    multipart: Option<MultipartForm>,
}

impl ApiRequest {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Literal request-line path
    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Decoded form fields carried by the body
    pub fn form(&self) -> &[(String, String)] {
        &self.form
    }

    /// Parsed multipart body, if a file was attached
    pub fn multipart(&self) -> Option<&MultipartForm> {
        self.multipart.as_ref()
    }

    pub fn is_signed(&self) -> bool {
        self.headers.contains_key(header::AUTHORIZATION)
    }

    /// Add or replace the Authorization header.
    ///
    /// Form fields join the signature only while the body is form-encoded;
    /// once a multipart body is attached only the query string is signed.
    pub fn sign(&mut self, credentials: &Credentials) -> Result<()> {
        let form: &[(String, String)] = if self.multipart.is_some() {
            &[]
        } else {
            &self.form
        };
        credentials.sign(&mut self.headers, &self.method, &self.url, form)
    }

    pub(crate) fn set_multipart(
        &mut self,
        body: Vec<u8>,
        content_type: HeaderValue,
        form: MultipartForm,
    ) {
        self.form = form.fields.clone();
        self.multipart = Some(form);
        self.body = Some(body);
        self.headers.insert(header::CONTENT_TYPE, content_type);
    }

    /// Convert into a reqwest request without touching the URL
    pub fn into_reqwest(self) -> reqwest::blocking::Request {
        let mut request = reqwest::blocking::Request::new(self.method, self.url);
        *request.headers_mut() = self.headers;
        if let Some(body) = self.body {
            *request.body_mut() = Some(body.into());
        }
        request
    }
}

/// Methods whose body is a set of signable form parameters
pub fn is_form_method(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::DELETE
}

/// Prepend `/` when missing; the path is otherwise left alone
pub fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Build `scheme://host` + literal path + encoded query.
///
/// Fails instead of re-encoding when the URL parser would alter the path.
pub fn literal_url(config: &Config, path: &str, query: &Params) -> Result<Url> {
    if config.host.is_empty() {
        return Err(RestError::RequestBuild("API host is empty".to_string()));
    }

    let path = normalize_path(path);
    let mut url = Url::parse(&format!("{}{}", config.base_url(), path))?;

    if url.path() != path || url.query().is_some() || url.fragment().is_some() {
        let rewritten = url[Position::BeforePath..].to_string();
        return Err(RestError::InvalidPath { path, rewritten });
    }

    if !query.is_empty() {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(query.iter())
            .finish();
        url.set_query(Some(&encoded));
    }

    Ok(url)
}

/// Parse an application/x-www-form-urlencoded body, rejecting malformed escapes
pub fn parse_form(body: &[u8]) -> Result<Vec<(String, String)>> {
    let text = std::str::from_utf8(body)
        .map_err(|e| RestError::FormParse(format!("body is not UTF-8: {e}")))?;

    for segment in text.split('&') {
        if segment.contains(';') {
            return Err(RestError::FormParse(format!(
                "invalid semicolon separator in {segment:?}"
            )));
        }
        check_escapes(segment)?;
    }

    Ok(form_urlencoded::parse(body).into_owned().collect())
}

fn check_escapes(segment: &str) -> Result<()> {
    let bytes = segment.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return Err(RestError::FormParse(format!(
                    "invalid percent escape in {segment:?}"
                )));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}

/// Construct an unsigned request
pub fn prepare(
    config: &Config,
    method: &str,
    path: &str,
    query: &Params,
    body: Option<&[u8]>,
) -> Result<ApiRequest> {
    let http_method = Method::from_bytes(method.as_bytes())
        .map_err(|_| RestError::RequestBuild(format!("Invalid HTTP method: {}", method)))?;

    let url = literal_url(config, path, query)?;

    let mut headers = HeaderMap::new();
    headers.insert(header::USER_AGENT, HeaderValue::from_static(client::USER_AGENT));

    let mut request = ApiRequest {
        method: http_method,
        url,
        headers,
        body: None,
        form: Vec::new(),
        multipart: None,
    };

    match body {
        Some(body) if is_form_method(&request.method) => {
            request.form = parse_form(body)?;
            request
                .headers
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
            request.body = Some(body.to_vec());
        }
        Some(body) if !body.is_empty() => {
            warn!(method, "discarding body of a body-less request");
        }
        _ => {}
    }

    debug!(method, path = request.path(), query = request.url.query(), "prepared request");
    Ok(request)
}

/// Construct and sign a request
pub fn build(
    config: &Config,
    credentials: &Credentials,
    method: &str,
    path: &str,
    query: &Params,
    body: Option<&[u8]>,
) -> Result<ApiRequest> {
    let mut request = prepare(config, method, path, query, body)?;
    request.sign(credentials)?;
    Ok(request)
}
