//! JSON request bodies whose rejections render as [`Error`] bodies.
//!
//! `axum::Json` answers a body that does not match the target type with a plain-text 422.
//! [`JsonBody`] answers with the same `{code, message, fields}` 400 every other validation
//! failure uses, keyed by the offending field.

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
};
use serde::de::DeserializeOwned;
use serde_json::error::Category;

use crate::errors::{Error, Result};

/// Message attached to a field absent from the request body.
pub const REQUIRED_FIELD: &str = "This field is required.";

/// Field key for errors that cannot be attributed to a single field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Drop-in replacement for `axum::Json` as a request extractor.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        if !has_json_content_type(&req) {
            return Err(Error::BadRequest {
                message: "Expected request with `Content-Type: application/json`".to_string(),
            });
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| Error::BadRequest { message: e.body_text() })?;

        parse(&bytes).map(Self)
    }
}

fn has_json_content_type(req: &Request) -> bool {
    let Some(content_type) = req.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let essence = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    essence == "application/json" || (essence.starts_with("application/") && essence.ends_with("+json"))
}

/// Deserialize `bytes` into `T`, mapping type mismatches to field errors.
pub fn parse<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut de = serde_json::Deserializer::from_slice(bytes);
    let value = serde_path_to_error::deserialize(&mut de).map_err(|err| {
        let path = err.path().to_string();
        into_error(&path, err.into_inner())
    })?;
    de.end().map_err(|err| into_error(".", err))?;
    Ok(value)
}

fn into_error(path: &str, err: serde_json::Error) -> Error {
    let message = without_location(&err);
    match err.classify() {
        Category::Data => {
            let at_root = path == ".";
            if let Some(field) = missing_field(&message) {
                let field = if at_root { field.to_string() } else { format!("{path}.{field}") };
                Error::field(field, REQUIRED_FIELD)
            } else if at_root {
                Error::field(NON_FIELD_ERRORS, message)
            } else {
                Error::field(path, message)
            }
        }
        Category::Syntax | Category::Eof | Category::Io => Error::BadRequest {
            message: format!("JSON parse error - {message}"),
        },
    }
}

/// serde reports absent fields as ``missing field `name` ``.
fn missing_field(message: &str) -> Option<&str> {
    message.strip_prefix("missing field `")?.strip_suffix('`')
}

fn without_location(err: &serde_json::Error) -> String {
    let text = err.to_string();
    if err.line() == 0 {
        return text;
    }
    match text.rsplit_once(" at line ") {
        Some((message, _)) => message.to_string(),
        None => text,
    }
}
