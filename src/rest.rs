use crate::client::{Config, HttpTransport, Transport};
use crate::error::{RestError, Result};
use crate::multipart::attach_file;
use crate::oauth::Credentials;
use crate::pacing::Pacer;
use crate::request::{self, ApiRequest, Params};
use crate::response::Response;
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::debug;

/// Context for signed REST API requests.
///
/// Owns its configuration, credentials and pacing state; instances do not
/// share anything, so two contexts can target different hosts or rates.
pub struct RestContext {
    config: Config,
    credentials: Credentials,
    pacer: Pacer,
    transport: Box<dyn Transport>,
}

impl RestContext {
    /// Create a context for the default API host
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Result<Self> {
        Self::with_config(Credentials::new(key, secret), Config::default())
    }

    /// Create a context with custom configuration
    pub fn with_config(credentials: Credentials, config: Config) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(credentials, config, transport))
    }

    /// Create a context sending through the given transport
    pub fn with_transport(
        credentials: Credentials,
        config: Config,
        transport: impl Transport + 'static,
    ) -> Self {
        RestContext {
            pacer: Pacer::with_rate(config.rate),
            config,
            credentials,
            transport: Box::new(transport),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Point this context at another API host
    pub fn set_api_host(&mut self, host: impl Into<String>) {
        self.config.host = host.into();
    }

    /// Limit outgoing requests to `requests_per_minute`; 0 disables pacing
    pub fn set_rate(&mut self, requests_per_minute: u32) {
        self.config.rate = Some(requests_per_minute);
        self.pacer.set_rate(requests_per_minute);
    }

    /// Wait for the pacing gate, then build a signed request
    ///
    /// # Arguments
    /// * `method` - HTTP method (GET, POST, PUT, DELETE, ...)
    /// * `path` - Literal request path, already percent-encoded where needed
    /// * `query` - Query parameters
    /// * `body` - Form-encoded body, used for POST/PUT/DELETE only
    pub fn new_request(
        &self,
        method: &str,
        path: &str,
        query: &Params,
        body: Option<&[u8]>,
    ) -> Result<ApiRequest> {
        self.pacer.wait();
        request::build(&self.config, &self.credentials, method, path, query, body)
    }

    /// Build a signed request and send it, returning the raw response
    pub fn do_request(
        &self,
        method: &str,
        path: &str,
        query: &Params,
        body: Option<&[u8]>,
    ) -> Result<Response> {
        let request = self.new_request(method, path, query, body)?;
        self.send(request)
    }

    /// Send a request and return the response body.
    ///
    /// A non-success status yields [`RestError::Http`] carrying the body.
    pub fn do_json(
        &self,
        method: &str,
        path: &str,
        query: &Params,
        body: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        let response = self.do_request(method, path, query, body)?;
        read_success(response)
    }

    /// Send a request and deserialize the JSON response body
    pub fn apply<T>(
        &self,
        method: &str,
        path: &str,
        query: &Params,
        body: Option<&[u8]>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let bytes = self.do_json(method, path, query, body)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Build a request carrying a file upload.
    ///
    /// The multipart body (file plus the fields from `body`) is assembled
    /// before signing, and the signature covers the query string only.
    pub fn new_upload_request(
        &self,
        method: &str,
        path: &str,
        query: &Params,
        body: Option<&[u8]>,
        field_name: &str,
        file_path: impl AsRef<Path>,
    ) -> Result<ApiRequest> {
        self.pacer.wait();
        let mut request = request::prepare(&self.config, method, path, query, body)?;
        attach_file(&mut request, field_name, file_path)?;
        request.sign(&self.credentials)?;
        Ok(request)
    }

    /// Upload a file and return the response body
    pub fn upload(
        &self,
        method: &str,
        path: &str,
        query: &Params,
        body: Option<&[u8]>,
        field_name: &str,
        file_path: impl AsRef<Path>,
    ) -> Result<Vec<u8>> {
        let request = self.new_upload_request(method, path, query, body, field_name, file_path)?;
        read_success(self.send(request)?)
    }

    fn send(&self, request: ApiRequest) -> Result<Response> {
        debug!(method = %request.method(), path = request.path(), "sending request");
        self.transport.send(request)
    }
}

impl std::fmt::Debug for RestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestContext")
            .field("config", &self.config)
            .field("credentials", &self.credentials)
            .field("pacer", &self.pacer)
            .finish_non_exhaustive()
    }
}

/// Drain the body, failing on a non-success status
fn read_success(response: Response) -> Result<Vec<u8>> {
    let status = response.status();
    let body = response.bytes().map_err(|err| match err {
        RestError::Io(io) => RestError::Transport(Box::new(io)),
        other => other,
    })?;
    if !status.is_success() {
        return Err(RestError::http(status, body));
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multipart::parse_multipart;
    use parking_lot::Mutex;
    use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
    use reqwest::StatusCode;
    use serde::Deserialize;
    use std::io::{self, Write};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[derive(Clone)]
    struct StubTransport {
        status: StatusCode,
        body: &'static str,
        sent: Arc<Mutex<Vec<ApiRequest>>>,
    }

    impl StubTransport {
        fn new(status: StatusCode, body: &'static str) -> Self {
            StubTransport {
                status,
                body,
                sent: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl Transport for StubTransport {
        fn send(&self, request: ApiRequest) -> Result<Response> {
            self.sent.lock().push(request);
            Ok(Response::from_bytes(self.status, self.body))
        }
    }

    struct RefusingTransport;

    impl Transport for RefusingTransport {
        fn send(&self, _request: ApiRequest) -> Result<Response> {
            Err(RestError::Transport(Box::new(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))))
        }
    }

    /// Answers with a body whose connection drops mid-read
    struct DroppingTransport;

    struct DroppedBody;

    impl io::Read for DroppedBody {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            ))
        }
    }

    impl Transport for DroppingTransport {
        fn send(&self, _request: ApiRequest) -> Result<Response> {
            Ok(Response::new(
                StatusCode::OK,
                reqwest::header::HeaderMap::new(),
                Box::new(DroppedBody),
            ))
        }
    }

    fn context(transport: impl Transport + 'static) -> RestContext {
        RestContext::with_transport(
            Credentials::new("key", "secret"),
            Config::default(),
            transport,
        )
    }

    fn limit(n: &str) -> Params {
        Params::from([("limit".to_string(), n.to_string())])
    }

    #[test]
    fn test_rest_context_creation() {
        let ctx = RestContext::new("key", "secret").unwrap();
        assert_eq!(ctx.config().scheme, "https");
        assert_eq!(ctx.config().host, "api.context.io");
        assert_eq!(ctx.credentials().key(), "key");
    }

    #[test]
    fn test_do_json_success() {
        let stub = StubTransport::new(StatusCode::OK, r#"[{"id":"abc"}]"#);
        let ctx = context(stub.clone());

        let body = ctx
            .do_json("GET", "/2.0/accounts/a%40b.com", &limit("10"), None)
            .unwrap();
        assert_eq!(body, br#"[{"id":"abc"}]"#);

        let sent = stub.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].url().as_str(),
            "https://api.context.io/2.0/accounts/a%40b.com?limit=10"
        );
        assert!(sent[0].headers().contains_key(AUTHORIZATION));
    }

    #[test]
    fn test_do_json_status_error_carries_body() {
        let ctx = context(StubTransport::new(
            StatusCode::NOT_FOUND,
            r#"{"error":"not found"}"#,
        ));

        let err = ctx
            .do_json("GET", "/2.0/accounts/missing", &Params::new(), None)
            .unwrap_err();
        assert!(err.is_status());
        assert!(!err.is_transport());
        assert!(err.is_not_found());
        assert_eq!(err.body(), Some(&br#"{"error":"not found"}"#[..]));
        assert!(err.to_string().contains("Not Found"));
    }

    #[test]
    fn test_do_json_transport_error_has_no_body() {
        let ctx = context(RefusingTransport);

        let err = ctx
            .do_json("GET", "/2.0/accounts", &Params::new(), None)
            .unwrap_err();
        assert!(err.is_transport());
        assert!(!err.is_status());
        assert!(err.body().is_none());
    }

    #[test]
    fn test_body_read_failure_is_transport_error() {
        let ctx = context(DroppingTransport);

        let err = ctx
            .do_json("GET", "/2.0/accounts", &Params::new(), None)
            .unwrap_err();
        assert!(err.is_transport(), "expected transport error, got {:?}", err);
        assert!(!err.is_status());
        assert!(err.body().is_none());
    }

    #[test]
    fn test_do_request_returns_raw_response() {
        let ctx = context(StubTransport::new(StatusCode::NOT_FOUND, "{}"));
        let response = ctx
            .do_request("GET", "/2.0/accounts", &Params::new(), None)
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.bytes().unwrap(), b"{}");
    }

    #[test]
    fn test_apply_deserializes() {
        #[derive(Deserialize)]
        struct Account {
            id: String,
        }

        let ctx = context(StubTransport::new(StatusCode::OK, r#"{"id":"abc"}"#));
        let account: Account = ctx
            .apply("GET", "/2.0/accounts/abc", &Params::new(), None)
            .unwrap();
        assert_eq!(account.id, "abc");
    }

    #[test]
    fn test_build_errors_skip_transport() {
        let stub = StubTransport::new(StatusCode::OK, "{}");
        let ctx = context(stub.clone());

        let err = ctx
            .do_json("POST", "/2.0/accounts", &Params::new(), Some(b"a=%zz"))
            .unwrap_err();
        assert!(matches!(err, RestError::FormParse(_)));
        assert!(stub.sent.lock().is_empty());
    }

    #[test]
    fn test_set_api_host() {
        let stub = StubTransport::new(StatusCode::OK, "{}");
        let mut ctx = context(stub.clone());
        ctx.set_api_host("api.example.test");

        ctx.do_json("GET", "lists", &Params::new(), None).unwrap();
        assert_eq!(
            stub.sent.lock()[0].url().as_str(),
            "https://api.example.test/lists"
        );
    }

    #[test]
    fn test_instances_are_independent() {
        let mut first = context(StubTransport::new(StatusCode::OK, "{}"));
        let second = context(StubTransport::new(StatusCode::OK, "{}"));
        first.set_api_host("one.example.test");
        first.set_rate(1);

        assert_eq!(second.config().host, "api.context.io");
        assert_eq!(second.config().rate, None);

        let start = Instant::now();
        second.new_request("GET", "/", &Params::new(), None).unwrap();
        second.new_request("GET", "/", &Params::new(), None).unwrap();
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_set_rate_paces_requests() {
        let mut ctx = context(StubTransport::new(StatusCode::OK, "{}"));
        // 600 per minute is one every 100ms
        ctx.set_rate(600);

        let start = Instant::now();
        for _ in 0..3 {
            ctx.new_request("GET", "/2.0/accounts", &Params::new(), None)
                .unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[test]
    fn test_upload_signs_after_building_multipart() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello file").unwrap();

        let stub = StubTransport::new(StatusCode::CREATED, r#"{"success":true}"#);
        let ctx = context(stub.clone());

        let body = ctx
            .upload(
                "POST",
                "/2.0/accounts/abc/files",
                &Params::from([("overwrite".to_string(), "1".to_string())]),
                Some(b"note=hello"),
                "file",
                file.path(),
            )
            .unwrap();
        assert_eq!(body, br#"{"success":true}"#);

        let sent = stub.sent.lock();
        let request = &sent[0];
        let content_type = request.headers().get(CONTENT_TYPE).unwrap().to_str().unwrap();
        let form = parse_multipart(content_type, request.body().unwrap()).unwrap();
        assert_eq!(form.file("file").unwrap().data, b"hello file");
        assert_eq!(form.field("note"), Some("hello"));

        let header = request.headers().get(AUTHORIZATION).unwrap().to_str().unwrap();
        let expected = ctx
            .credentials()
            .recompute(header, request.method(), request.url(), &[])
            .unwrap();
        assert_eq!(header, expected);
    }

    #[test]
    fn test_upload_missing_file_sends_nothing() {
        let stub = StubTransport::new(StatusCode::OK, "{}");
        let ctx = context(stub.clone());

        let err = ctx
            .upload(
                "POST",
                "/upload",
                &Params::new(),
                None,
                "file",
                "/definitely/not/here.bin",
            )
            .unwrap_err();
        assert!(matches!(err, RestError::Io(_)));
        assert!(stub.sent.lock().is_empty());
    }
}
