use super::slot::FieldKind;
use std::fmt;

/// A single malformed declaration found while analyzing a request type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaViolation {
    #[error("header field {field} must be a string, found {kind}")]
    HeaderNotString { field: &'static str, kind: FieldKind },

    #[error("field {field} is not settable")]
    NotSettable { field: &'static str },

    #[error("type {type_name}: must implement the BodyFieldGetter capability returning a reference to field {field}")]
    MissingBodyFieldGetter {
        type_name: &'static str,
        field: &'static str,
    },

    #[error("{type_name}::body_field() returned no value for field {field}")]
    NullBodyField {
        type_name: &'static str,
        field: &'static str,
    },

    #[error("{type_name}::body_field() is returning a type {found} incompatible to field {field} {expected}")]
    IncompatibleBodyField {
        type_name: &'static str,
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("fields {first} and {second} are both tagged as body fields")]
    MultipleBodyFields {
        first: &'static str,
        second: &'static str,
    },

    #[error("field {json_field} requests whole-body decoding but field {body_field} requests sub-field decoding")]
    ConflictingBodyModes {
        json_field: &'static str,
        body_field: &'static str,
    },

    #[error("field {field} is tagged json but the type provides no whole-body decoder")]
    MissingBodyDecoder { field: &'static str },

    #[error("validation is requested by field {field} but the type provides no validator")]
    MissingValidator { field: &'static str },
}

/// Every violation found in one analysis pass over a request type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    type_name: &'static str,
    violations: Vec<SchemaViolation>,
}

impl SchemaError {
    pub(crate) fn new(type_name: &'static str, violations: Vec<SchemaViolation>) -> Self {
        Self {
            type_name,
            violations,
        }
    }

    /// Request type that failed analysis.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Violations in the order they were found.
    #[must_use]
    pub fn violations(&self) -> &[SchemaViolation] {
        &self.violations
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.type_name)?;
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaError {}
