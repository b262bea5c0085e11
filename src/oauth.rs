use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use sha1::Sha1;
use sha2::Sha256;
use url::Url;
use uuid::Uuid;

use crate::error::{RestError, Result};

/// RFC 3986 unreserved characters pass through, everything else is escaped.
const OAUTH_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode a string the way OAuth 1.0a requires
pub fn encode(value: &str) -> String {
    utf8_percent_encode(value, OAUTH_ENCODE).to_string()
}

/// Signature algorithm advertised in `oauth_signature_method`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureMethod {
    #[default]
    HmacSha1,
    HmacSha256,
    Plaintext,
}

impl SignatureMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureMethod::HmacSha1 => "HMAC-SHA1",
            SignatureMethod::HmacSha256 => "HMAC-SHA256",
            SignatureMethod::Plaintext => "PLAINTEXT",
        }
    }

    /// Sign a base string with the given signing key, returning the encoded signature
    pub fn sign(&self, key: &str, base_string: &str) -> Result<String> {
        match self {
            SignatureMethod::HmacSha1 => {
                let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
                    .map_err(|e| RestError::Signing(format!("failed to create HMAC: {e}")))?;
                mac.update(base_string.as_bytes());
                Ok(STANDARD.encode(mac.finalize().into_bytes()))
            }
            SignatureMethod::HmacSha256 => {
                let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes())
                    .map_err(|e| RestError::Signing(format!("failed to create HMAC: {e}")))?;
                mac.update(base_string.as_bytes());
                Ok(STANDARD.encode(mac.finalize().into_bytes()))
            }
            SignatureMethod::Plaintext => Ok(key.to_string()),
        }
    }
}

/// Consumer key and secret used for two-legged OAuth 1.0a signing.
#[derive(Clone)]
pub struct Credentials {
    key: String,
    secret: String,
    signature_method: SignatureMethod,
}

impl Credentials {
    /// Create credentials signing with HMAC-SHA1
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Credentials {
            key: key.into(),
            secret: secret.into(),
            signature_method: SignatureMethod::default(),
        }
    }

    /// Use a different signature method
    pub fn with_signature_method(mut self, method: SignatureMethod) -> Self {
        self.signature_method = method;
        self
    }

    /// Consumer key
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn signature_method(&self) -> SignatureMethod {
        self.signature_method
    }

    /// Add an `Authorization` header signing `method` and `url`.
    ///
    /// `url` must already carry its final query string and literal path.
    /// `form` holds the decoded body parameters for form-encoded bodies and
    /// must be empty for every other request, so only the query string is signed.
    pub fn sign(
        &self,
        headers: &mut HeaderMap,
        method: &Method,
        url: &Url,
        form: &[(String, String)],
    ) -> Result<()> {
        let nonce = Uuid::new_v4().simple().to_string();
        let timestamp = Utc::now().timestamp();
        self.sign_with(headers, method, url, form, &nonce, timestamp)
    }

    pub(crate) fn sign_with(
        &self,
        headers: &mut HeaderMap,
        method: &Method,
        url: &Url,
        form: &[(String, String)],
        nonce: &str,
        timestamp: i64,
    ) -> Result<()> {
        let header = self.authorization(method, url, form, nonce, timestamp)?;
        let value = HeaderValue::from_str(&header)
            .map_err(|e| RestError::Signing(format!("invalid authorization header: {e}")))?;
        headers.insert(AUTHORIZATION, value);
        Ok(())
    }

    fn authorization(
        &self,
        method: &Method,
        url: &Url,
        form: &[(String, String)],
        nonce: &str,
        timestamp: i64,
    ) -> Result<String> {
        if self.key.is_empty() {
            return Err(RestError::Signing("consumer key is empty".to_string()));
        }

        let mut oauth: Vec<(String, String)> = vec![
            ("oauth_consumer_key".to_string(), self.key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            (
                "oauth_signature_method".to_string(),
                self.signature_method.as_str().to_string(),
            ),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];

        let mut params = form.to_vec();
        params.extend(oauth.iter().cloned());
        let base_string = signature_base_string(method, url, &params);

        // No token secret in two-legged mode, the trailing '&' stays
        let signing_key = format!("{}&", encode(&self.secret));
        let signature = self.signature_method.sign(&signing_key, &base_string)?;
        oauth.push(("oauth_signature".to_string(), signature));
        oauth.sort();

        let fields: Vec<String> = oauth
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, encode(v)))
            .collect();
        Ok(format!("OAuth {}", fields.join(", ")))
    }

    /// Recompute the header `sign` would have produced for the nonce and
    /// timestamp found in `header`, over the given form parameters.
    #[cfg(test)]
    pub(crate) fn recompute(
        &self,
        header: &str,
        method: &Method,
        url: &Url,
        form: &[(String, String)],
    ) -> Result<String> {
        let params = parse_authorization(header);
        let get = |name: &str| {
            params
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
                .unwrap_or_default()
        };
        let timestamp: i64 = get("oauth_timestamp").parse().unwrap_or_default();
        self.authorization(method, url, form, &get("oauth_nonce"), timestamp)
    }
}

// Implement Debug manually to avoid exposing the secret
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .field("signature_method", &self.signature_method)
            .finish()
    }
}

/// Base string URI: lowercase scheme and host, port only when not the default, literal path
pub fn base_string_uri(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    match url.port() {
        Some(port) => format!("{}://{}:{}{}", url.scheme(), host, port, url.path()),
        None => format!("{}://{}{}", url.scheme(), host, url.path()),
    }
}

/// Encode every pair, sort by key then value and join into the normalized parameter string
pub fn normalize_parameters<I>(params: I) -> String
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut encoded: Vec<(String, String)> = params
        .into_iter()
        .map(|(k, v)| (encode(&k), encode(&v)))
        .collect();
    encoded.sort();

    encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the signature base string over the URL's query pairs plus `params`
pub fn signature_base_string(method: &Method, url: &Url, params: &[(String, String)]) -> String {
    let all = url
        .query_pairs()
        .into_owned()
        .chain(params.iter().cloned());

    format!(
        "{}&{}&{}",
        encode(&method.as_str().to_ascii_uppercase()),
        encode(&base_string_uri(url)),
        encode(&normalize_parameters(all))
    )
}

/// Split an `OAuth k="v", ...` header into decoded pairs
#[cfg(test)]
pub(crate) fn parse_authorization(header: &str) -> Vec<(String, String)> {
    header
        .trim_start_matches("OAuth ")
        .split(", ")
        .filter_map(|field| field.split_once('='))
        .map(|(k, v)| {
            let v = v.trim_matches('"');
            let decoded = percent_encoding::percent_decode_str(v).decode_utf8_lossy();
            (k.to_string(), decoded.into_owned())
        })
        .collect()
}
