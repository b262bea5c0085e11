//! # contextio - signed requests for the Context.IO REST API
//!
//! Builds OAuth 1.0a (two-legged) signed HTTP requests against a JSON REST
//! API, paces outgoing requests to a configured rate and attaches file
//! uploads as multipart form data.
//!
//! ## Features
//!
//! - Literal request paths: pre-encoded segments such as `a%40b.com` or
//!   `INBOX%2FWork` reach the wire untouched
//! - OAuth 1.0a signing (HMAC-SHA1, HMAC-SHA256, PLAINTEXT) over the query
//!   string and, for POST/PUT/DELETE, the form-encoded body
//! - Per-context request pacing expressed in requests per minute
//! - Multipart file uploads signed after the body is assembled
//! - HTTP status errors kept apart from transport errors
//!
//! ## Basic Usage
//!
//! ```no_run
//! use contextio::{Params, RestContext};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut ctx = RestContext::new("consumer-key", "consumer-secret")?;
//!     ctx.set_rate(60);
//!
//!     let mut query = Params::new();
//!     query.insert("limit".to_string(), "10".to_string());
//!
//!     let json = ctx.do_json("GET", "/2.0/accounts", &query, None)?;
//!     println!("{}", contextio::pretty_json(&json)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Status errors
//!
//! ```no_run
//! use contextio::{Params, RestContext, RestError};
//!
//! let ctx = RestContext::new("consumer-key", "consumer-secret")?;
//! match ctx.do_json("GET", "/2.0/accounts/a%40b.com", &Params::new(), None) {
//!     Ok(body) => println!("{} bytes", body.len()),
//!     Err(RestError::Http { status, body }) => {
//!         eprintln!("server said {status}: {}", String::from_utf8_lossy(&body))
//!     }
//!     Err(e) => eprintln!("request never completed: {e}"),
//! }
//! # Ok::<(), contextio::RestError>(())
//! ```
//!
//! ## File uploads
//!
//! ```no_run
//! use contextio::{Params, RestContext};
//!
//! let ctx = RestContext::new("consumer-key", "consumer-secret")?;
//! let _body = ctx.upload(
//!     "POST",
//!     "/lite/users/u1/email_accounts/a%40b.com/folders/INBOX/messages",
//!     &Params::new(),
//!     Some(b"flag=seen"),
//!     "message",
//!     "/tmp/message.eml",
//! )?;
//! # Ok::<(), contextio::RestError>(())
//! ```

pub mod client;
pub mod error;
pub mod multipart;
pub mod oauth;
pub mod pacing;
pub mod request;
pub mod response;
pub mod rest;

// Re-export main types for convenience
pub use client::{Config, HttpTransport, Transport, DEFAULT_API_HOST};
pub use error::{RestError, Result};
pub use multipart::{attach_file, parse_multipart, FilePart, MultipartForm};
pub use oauth::{Credentials, SignatureMethod};
pub use pacing::{interval_for_rate, Pacer};
pub use request::{build, prepare, ApiRequest, Params};
pub use response::{pretty_json, Response};
pub use rest::RestContext;

// Re-export serde_json for convenience
pub use serde_json::json;
