use crate::error::{RestError, Result};
use crate::request::ApiRequest;
use reqwest::header::HeaderValue;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

/// Content type given to attached files
pub const FILE_CONTENT_TYPE: &str = "application/octet-stream";

/// A file carried by a multipart body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// Form field name
    pub field: String,
    /// Base name of the uploaded file
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Parsed multipart/form-data body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    /// Plain form fields, in body order
    pub fields: Vec<(String, String)>,
    pub files: Vec<FilePart>,
}

impl MultipartForm {
    /// First value of a plain field
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First file attached under `field`
    pub fn file(&self, field: &str) -> Option<&FilePart> {
        self.files.iter().find(|f| f.field == field)
    }
}

/// Replace the request body with a multipart form holding the file at
/// `file_path` under `field_name` plus every form field the request already carried.
///
/// The request is not re-signed. On error the request must not be sent.
pub fn attach_file(
    request: &mut ApiRequest,
    field_name: &str,
    file_path: impl AsRef<Path>,
) -> Result<()> {
    let path = file_path.as_ref();
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| RestError::Multipart(format!("{} has no file name", path.display())))?;

    let mut file = File::open(path)?;
    let boundary = Uuid::new_v4().simple().to_string();

    let mut body = Vec::new();
    write!(
        body,
        "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {FILE_CONTENT_TYPE}\r\n\r\n",
        escape_quotes(field_name),
        escape_quotes(&filename)
    )?;
    let copied = io::copy(&mut file, &mut body)?;
    body.extend_from_slice(b"\r\n");

    for (key, value) in request.form() {
        write!(
            body,
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{value}\r\n",
            escape_quotes(key)
        )?;
    }
    write!(body, "--{boundary}--\r\n")?;

    let content_type = format!("multipart/form-data; boundary={boundary}");
    let form = parse_multipart(&content_type, &body)?;
    let header = HeaderValue::from_str(&content_type)
        .map_err(|e| RestError::Multipart(format!("invalid content type: {e}")))?;

    debug!(
        field = field_name,
        filename = filename.as_str(),
        bytes = copied,
        fields = form.fields.len(),
        "attached file"
    );
    request.set_multipart(body, header, form);
    Ok(())
}

fn escape_quotes(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Extract the boundary from a multipart/form-data content type
pub fn boundary(content_type: &str) -> Result<String> {
    let mut params = content_type.split(';');
    let mime = params.next().unwrap_or_default().trim();
    if !mime.eq_ignore_ascii_case("multipart/form-data") {
        return Err(RestError::Multipart(format!(
            "unexpected content type {mime:?}"
        )));
    }

    for param in params {
        if let Some((key, value)) = param.trim().split_once('=') {
            let value = value.trim().trim_matches('"');
            if key.trim().eq_ignore_ascii_case("boundary") && !value.is_empty() {
                return Ok(value.to_string());
            }
        }
    }
    Err(RestError::Multipart("missing boundary".to_string()))
}

/// Parse a multipart/form-data body into fields and files
pub fn parse_multipart(content_type: &str, body: &[u8]) -> Result<MultipartForm> {
    let boundary = boundary(content_type)?;
    let delimiter = format!("--{boundary}");
    let next_part = format!("\r\n--{boundary}");

    let start = find(body, delimiter.as_bytes())
        .ok_or_else(|| RestError::Multipart("body does not contain the boundary".to_string()))?;
    let mut rest = &body[start + delimiter.len()..];
    let mut form = MultipartForm::default();

    loop {
        if rest.starts_with(b"--") {
            return Ok(form);
        }
        rest = rest
            .strip_prefix(b"\r\n")
            .ok_or_else(|| RestError::Multipart("malformed boundary line".to_string()))?;
        let end = find(rest, next_part.as_bytes())
            .ok_or_else(|| RestError::Multipart("unterminated part".to_string()))?;
        parse_part(&rest[..end], &mut form)?;
        rest = &rest[end + next_part.len()..];
    }
}

fn parse_part(part: &[u8], form: &mut MultipartForm) -> Result<()> {
    let split = find(part, b"\r\n\r\n")
        .ok_or_else(|| RestError::Multipart("part without header terminator".to_string()))?;
    let head = std::str::from_utf8(&part[..split])
        .map_err(|_| RestError::Multipart("part headers are not UTF-8".to_string()))?;
    let data = &part[split + 4..];

    let mut name = None;
    let mut filename = None;
    let mut content_type = None;
    for line in head.split("\r\n") {
        let Some((key, value)) = line.split_once(':') else {
            return Err(RestError::Multipart(format!("malformed part header {line:?}")));
        };
        let key = key.trim();
        if key.eq_ignore_ascii_case("content-disposition") {
            let mut params = disposition_params(value)?;
            name = params.remove("name");
            filename = params.remove("filename");
        } else if key.eq_ignore_ascii_case("content-type") {
            content_type = Some(value.trim().to_string());
        }
    }

    let name = name.ok_or_else(|| RestError::Multipart("part without a name".to_string()))?;
    match filename {
        Some(filename) => form.files.push(FilePart {
            field: name,
            filename,
            content_type,
            data: data.to_vec(),
        }),
        None => {
            let value = String::from_utf8(data.to_vec())
                .map_err(|_| RestError::Multipart(format!("field {name:?} is not UTF-8")))?;
            form.fields.push((name, value));
        }
    }
    Ok(())
}

/// Parameters of a Content-Disposition value, keys lowercased
fn disposition_params(value: &str) -> Result<HashMap<String, String>> {
    let mut params = HashMap::new();
    let Some((_, mut rest)) = value.split_once(';') else {
        return Ok(params);
    };

    while let Some((key, after)) = rest.split_once('=') {
        let key = key.trim().to_ascii_lowercase();
        let after = after.trim_start();
        let (value, remaining) = match after.strip_prefix('"') {
            Some(quoted) => unquote(quoted)?,
            None => match after.split_once(';') {
                Some((v, r)) => (v.trim().to_string(), Some(r)),
                None => (after.trim().to_string(), None),
            },
        };
        params.insert(key, value);
        match remaining {
            Some(r) => rest = r,
            None => break,
        }
    }
    Ok(params)
}

/// Read a quoted string (opening quote already consumed); returns the value
/// and whatever follows the next `;`
fn unquote(quoted: &str) -> Result<(String, Option<&str>)> {
    let mut value = String::new();
    let mut chars = quoted.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, escaped)) => value.push(escaped),
                None => break,
            },
            '"' => {
                let tail = &quoted[i + 1..];
                return Ok((value, tail.split_once(';').map(|(_, r)| r)));
            }
            _ => value.push(c),
        }
    }
    Err(RestError::Multipart("unterminated quoted string".to_string()))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
