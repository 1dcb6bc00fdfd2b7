//! Error types shared by the binder and composed handlers.
//!
//! [`BindError`] is what the binder returns for one request. [`HandlerError`]
//! is what business functions return; binding failures convert into it so both
//! flow through the same error-to-response mapping.
//!
//! Errors that know their HTTP status implement [`HttpError`]. Errors that
//! also carry a ready JSON body implement [`HttpJsonError`].

use crate::convert::ConversionError;
use std::error::Error as StdError;
use std::fmt;
use validator::{ValidationErrors, ValidationErrorsKind};

/// Where a bound value was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    Header,
    Path,
    Query,
}

impl fmt::Display for ParamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamSource::Header => f.write_str("header"),
            ParamSource::Path => f.write_str("path parameter"),
            ParamSource::Query => f.write_str("query parameter"),
        }
    }
}

/// Failure while binding one request.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error("invalid request body: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("{type_name}::body_field() returned no value to decode the body into")]
    NullBodyField { type_name: &'static str },

    #[error("{location} {key:?} for field {field}: {error}")]
    Conversion {
        field: &'static str,
        key: &'static str,
        location: ParamSource,
        #[source]
        error: ConversionError,
    },

    #[error("field {field} is not settable")]
    NotSettable { field: &'static str },

    #[error(transparent)]
    Validation(ValidationErrors),
}

impl BindError {
    /// Client input faults are 400; a type that cannot take the value is 500.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            BindError::Decode(_) | BindError::Conversion { .. } | BindError::Validation(_) => 400,
            BindError::NullBodyField { .. } | BindError::NotSettable { .. } => 500,
        }
    }
}

/// An error that knows its HTTP status.
pub trait HttpError: StdError + Send + Sync + 'static {
    fn status(&self) -> u16;
}

/// An error that renders its own JSON body.
pub trait HttpJsonError: HttpError {
    /// Encoded JSON body, written verbatim.
    fn json(&self) -> Vec<u8>;
}

/// Status code with a plain-text message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct StatusError {
    pub status: u16,
    pub message: String,
}

impl StatusError {
    #[must_use]
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl HttpError for StatusError {
    fn status(&self) -> u16 {
        self.status
    }
}

/// Status code with a JSON body.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{body}")]
pub struct JsonError {
    pub status: u16,
    pub body: serde_json::Value,
}

impl JsonError {
    #[must_use]
    pub fn new(status: u16, body: serde_json::Value) -> Self {
        Self { status, body }
    }
}

impl HttpError for JsonError {
    fn status(&self) -> u16 {
        self.status
    }
}

impl HttpJsonError for JsonError {
    fn json(&self) -> Vec<u8> {
        self.body.to_string().into_bytes()
    }
}

impl HttpError for BindError {
    fn status(&self) -> u16 {
        BindError::status(self)
    }
}

/// Error returned by business functions and composed handlers.
pub enum HandlerError {
    Bind(BindError),
    Validation(ValidationErrors),
    Json(Box<dyn HttpJsonError>),
    Status(Box<dyn HttpError>),
    /// Anything else; rendered as 500 with its message
    Internal(anyhow::Error),
}

impl HandlerError {
    /// Plain-text error with the given status.
    #[must_use]
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        HandlerError::Status(Box::new(StatusError::new(status, message)))
    }

    /// JSON error with the given status.
    #[must_use]
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        HandlerError::Json(Box::new(JsonError::new(status, body)))
    }

    /// Wrap a custom status-carrying error.
    #[must_use]
    pub fn http(error: impl HttpError) -> Self {
        HandlerError::Status(Box::new(error))
    }

    /// Wrap a custom error carrying its own JSON body.
    #[must_use]
    pub fn http_json(error: impl HttpJsonError) -> Self {
        HandlerError::Json(Box::new(error))
    }

    /// Validation errors wrapped anywhere in this error.
    #[must_use]
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            HandlerError::Validation(errors) | HandlerError::Bind(BindError::Validation(errors)) => {
                Some(errors)
            }
            HandlerError::Internal(err) => err
                .chain()
                .find_map(|cause| cause.downcast_ref::<ValidationErrors>()),
            _ => None,
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::Bind(err) => fmt::Display::fmt(err, f),
            HandlerError::Validation(err) => fmt::Display::fmt(err, f),
            HandlerError::Json(err) => fmt::Display::fmt(err, f),
            HandlerError::Status(err) => fmt::Display::fmt(err, f),
            HandlerError::Internal(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::Bind(err) => f.debug_tuple("Bind").field(err).finish(),
            HandlerError::Validation(err) => f.debug_tuple("Validation").field(err).finish(),
            HandlerError::Json(err) => f.debug_tuple("Json").field(err).finish(),
            HandlerError::Status(err) => f.debug_tuple("Status").field(err).finish(),
            HandlerError::Internal(err) => f.debug_tuple("Internal").field(err).finish(),
        }
    }
}

impl StdError for HandlerError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            HandlerError::Bind(err) => err.source(),
            HandlerError::Validation(_) => None,
            HandlerError::Json(err) => err.source(),
            HandlerError::Status(err) => err.source(),
            HandlerError::Internal(err) => err.source(),
        }
    }
}

impl From<BindError> for HandlerError {
    fn from(err: BindError) -> Self {
        match err {
            BindError::Validation(errors) => HandlerError::Validation(errors),
            other => HandlerError::Bind(other),
        }
    }
}

impl From<ValidationErrors> for HandlerError {
    fn from(errors: ValidationErrors) -> Self {
        HandlerError::Validation(errors)
    }
}

impl From<StatusError> for HandlerError {
    fn from(err: StatusError) -> Self {
        HandlerError::Status(Box::new(err))
    }
}

impl From<JsonError> for HandlerError {
    fn from(err: JsonError) -> Self {
        HandlerError::Json(Box::new(err))
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::Internal(err.into())
    }
}

impl From<anyhow::Error> for HandlerError {
    /// Recognized error types at the top of the chain keep their mapping.
    fn from(err: anyhow::Error) -> Self {
        let err = match err.downcast::<ValidationErrors>() {
            Ok(errors) => return HandlerError::Validation(errors),
            Err(err) => err,
        };
        let err = match err.downcast::<BindError>() {
            Ok(bind) => return bind.into(),
            Err(err) => err,
        };
        let err = match err.downcast::<JsonError>() {
            Ok(json) => return json.into(),
            Err(err) => err,
        };
        match err.downcast::<StatusError>() {
            Ok(status) => status.into(),
            Err(err) => HandlerError::Internal(err),
        }
    }
}

/// One message per failed rule, ordered by the request type's field
/// declaration order. Fields not in `field_order` follow, sorted by name.
///
/// Failures inside nested structs and lists are reported under their full
/// key, e.g. `Order.address.city` or `Order.items[0].name`.
#[must_use]
pub fn validation_messages(
    errors: &ValidationErrors,
    type_name: &str,
    field_order: &[&str],
) -> Vec<String> {
    let mut fields: Vec<(usize, &str, &ValidationErrorsKind)> = errors
        .errors()
        .iter()
        .map(|(&field, kind)| {
            let position = field_order
                .iter()
                .position(|name| *name == field)
                .unwrap_or(usize::MAX);
            (position, field, kind)
        })
        .collect();
    fields.sort_unstable_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

    let mut messages = Vec::new();
    for (_, field, kind) in fields {
        collect_messages(kind, &format!("{type_name}.{field}"), field, &mut messages);
    }
    messages
}

fn collect_messages(
    kind: &ValidationErrorsKind,
    key: &str,
    field: &str,
    messages: &mut Vec<String>,
) {
    match kind {
        ValidationErrorsKind::Field(failures) => {
            for failure in failures {
                let message = match &failure.message {
                    Some(message) => message.to_string(),
                    None => format!(
                        "Key: '{key}' Error:Field validation for '{field}' failed on the '{}' tag",
                        failure.code
                    ),
                };
                messages.push(message);
            }
        }
        ValidationErrorsKind::Struct(nested) => collect_nested(nested, key, messages),
        ValidationErrorsKind::List(entries) => {
            for (index, nested) in entries {
                collect_nested(nested, &format!("{key}[{index}]"), messages);
            }
        }
    }
}

fn collect_nested(errors: &ValidationErrors, prefix: &str, messages: &mut Vec<String>) {
    let mut fields: Vec<(&str, &ValidationErrorsKind)> = errors
        .errors()
        .iter()
        .map(|(&field, kind)| (field, kind))
        .collect();
    fields.sort_unstable_by_key(|(field, _)| *field);
    for (field, kind) in fields {
        collect_messages(kind, &format!("{prefix}.{field}"), field, messages);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::ValidationError;

    fn two_field_errors() -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.add("email", ValidationError::new("email"));
        let mut custom = ValidationError::new("length");
        custom.message = Some("name is too short".into());
        errors.add("name", custom);
        errors
    }

    #[test]
    fn messages_follow_declaration_order() {
        let messages = validation_messages(&two_field_errors(), "Signup", &["name", "email"]);
        assert_eq!(
            messages,
            vec![
                "name is too short".to_string(),
                "Key: 'Signup.email' Error:Field validation for 'email' failed on the 'email' tag"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn anyhow_errors_keep_their_mapping() {
        let err: HandlerError = anyhow::Error::new(StatusError::new(404, "no such city")).into();
        assert!(matches!(err, HandlerError::Status(ref e) if e.status() == 404));
        assert_eq!(err.to_string(), "no such city");

        let err: HandlerError = anyhow::Error::new(two_field_errors()).into();
        assert!(matches!(err, HandlerError::Validation(_)));

        let err: HandlerError = anyhow::anyhow!("database unavailable").into();
        assert!(matches!(err, HandlerError::Internal(_)));
    }

    #[test]
    fn validation_found_behind_context() {
        let err: HandlerError = anyhow::Error::new(two_field_errors())
            .context("checking signup")
            .into();
        assert!(err.validation_errors().is_some());
    }

    #[test]
    fn bind_error_statuses() {
        let decode = serde_json::from_slice::<u8>(b"{").unwrap_err();
        assert_eq!(BindError::Decode(decode).status(), 400);
        assert_eq!(BindError::NotSettable { field: "x" }.status(), 500);
        assert_eq!(BindError::NullBodyField { type_name: "Batch" }.status(), 500);
    }

    #[test]
    fn nested_failures_use_full_keys() {
        let mut address = ValidationErrors::new();
        address.add("city", ValidationError::new("length"));
        let mut first_item = ValidationErrors::new();
        first_item.add("sku", ValidationError::new("required"));

        let mut note = ValidationErrors::new();
        note.add("note", ValidationError::new("length"));
        let mut errors = ValidationErrors::merge(Err(note), "address", Err(address)).unwrap_err();
        let items = std::collections::BTreeMap::from([(0, Box::new(first_item))]);
        errors
            .errors_mut()
            .insert("items", ValidationErrorsKind::List(items));

        let messages = validation_messages(&errors, "Order", &["address", "items", "note"]);
        assert_eq!(
            messages,
            vec![
                "Key: 'Order.address.city' Error:Field validation for 'city' failed on the 'length' tag"
                    .to_string(),
                "Key: 'Order.items[0].sku' Error:Field validation for 'sku' failed on the 'required' tag"
                    .to_string(),
                "Key: 'Order.note' Error:Field validation for 'note' failed on the 'length' tag"
                    .to_string(),
            ]
        );
    }
}
