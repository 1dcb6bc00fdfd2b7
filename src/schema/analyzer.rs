//! Schema analysis and the process-wide binding plan cache.
//!
//! [`analyze`] walks a request type's descriptor table once, probing a default
//! instance for field kinds and body accessor behavior, and produces an
//! immutable [`BindingPlan`]. Every malformed declaration is collected into a
//! single [`SchemaError`] so one failed start reports all of them.
//!
//! Plans are cached by [`TypeId`](std::any::TypeId) for the life of the
//! process. Lookups of a populated plan take the read lock only.

use super::descriptor::{BodySlot, FieldDescriptor, RequestSchema, WholeBodyDecoder};
use super::error::{SchemaError, SchemaViolation};
use super::slot::FieldKind;
use crate::registry::TypeRegistry;
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;
use tracing::error;
use validator::ValidationErrors;

/// How the request body is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    /// Body is ignored
    NoBody,
    /// Body is decoded into the whole instance
    WholeBody,
    /// Body is decoded into the field returned by `BodyFieldGetter`
    SubFieldBody,
}

/// How checked-out instances are returned to their initial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetStrategy {
    /// `Resettable::reset`
    SelfReset,
    /// Body-only schemas; the decoder overwrites what it touches
    Noop,
    /// Replace the instance with `Default::default()`
    Zero,
}

/// Which validator runs after a successful bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    Skip,
    /// `Validatable::validate`
    SelfCheck,
    /// `validator::Validate::validate`
    Engine,
}

/// One field bound from a header, path parameter or query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBinding {
    /// Position passed to `RequestSchema::field_slot`
    pub index: usize,
    pub name: &'static str,
    /// Header name, path parameter name or query key
    pub key: &'static str,
    pub kind: FieldKind,
}

type BodyFieldFn<T> = fn(&mut T) -> Option<&mut dyn BodySlot>;
type ValidateFn<T> = fn(&T) -> Result<(), ValidationErrors>;

pub(crate) enum BodyDecoder<T> {
    None,
    Whole(WholeBodyDecoder<T>),
    SubField(BodyFieldFn<T>),
}

/// Compiled, immutable description of how to bind one request type.
pub struct BindingPlan<T> {
    type_name: &'static str,
    short_name: &'static str,
    field_order: Vec<&'static str>,
    pub(crate) query: Vec<FieldBinding>,
    pub(crate) path: Vec<FieldBinding>,
    pub(crate) header: Vec<FieldBinding>,
    body_mode: BodyMode,
    pub(crate) body: BodyDecoder<T>,
    validation: ValidationMode,
    validate_fn: Option<ValidateFn<T>>,
    reset: ResetStrategy,
    reset_fn: Option<fn(&mut T)>,
}

impl<T> fmt::Debug for BindingPlan<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingPlan")
            .field("type_name", &self.type_name)
            .field("query", &self.query)
            .field("path", &self.path)
            .field("header", &self.header)
            .field("body_mode", &self.body_mode)
            .field("validation", &self.validation)
            .field("reset", &self.reset)
            .finish()
    }
}

impl<T: RequestSchema> BindingPlan<T> {
    /// Fully qualified name of the request type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Request type name without its module path.
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        self.short_name
    }

    /// Names of all declared fields, in declaration order.
    #[must_use]
    pub fn field_order(&self) -> &[&'static str] {
        &self.field_order
    }

    #[must_use]
    pub fn query_fields(&self) -> &[FieldBinding] {
        &self.query
    }

    #[must_use]
    pub fn path_fields(&self) -> &[FieldBinding] {
        &self.path
    }

    #[must_use]
    pub fn header_fields(&self) -> &[FieldBinding] {
        &self.header
    }

    #[must_use]
    pub fn body_mode(&self) -> BodyMode {
        self.body_mode
    }

    #[must_use]
    pub fn validation(&self) -> ValidationMode {
        self.validation
    }

    #[must_use]
    pub fn reset_strategy(&self) -> ResetStrategy {
        self.reset
    }

    /// Return `instance` to its initial state.
    pub fn reset(&self, instance: &mut T) {
        match (self.reset, self.reset_fn) {
            (ResetStrategy::SelfReset, Some(reset)) => reset(instance),
            (ResetStrategy::Noop, _) => {}
            _ => *instance = T::default(),
        }
    }

    /// Run the selected validator, if any.
    pub fn validate(&self, instance: &T) -> Result<(), ValidationErrors> {
        match self.validate_fn {
            Some(validate) => validate(instance),
            None => Ok(()),
        }
    }
}

/// Analyze `T` and build its binding plan without touching the cache.
pub fn analyze<T: RequestSchema>() -> Result<BindingPlan<T>, SchemaError> {
    let type_name = std::any::type_name::<T>();
    let descriptors = T::fields();
    let capabilities = T::capabilities();
    let mut sample = T::default();

    let mut violations = Vec::new();
    let mut query = Vec::new();
    let mut path = Vec::new();
    let mut header = Vec::new();
    let mut json_field: Option<&'static str> = None;
    let mut body_field: Option<&FieldDescriptor> = None;
    let mut validate_field: Option<&'static str> = None;

    for field in descriptors.iter().filter(|d| d.exported) {
        let kind = if field.tags.query.is_some()
            || field.tags.path.is_some()
            || field.tags.header.is_some()
        {
            sample.field_slot(field.index).map(|slot| slot.kind())
        } else {
            None
        };

        let binding = |key: &'static str| FieldBinding {
            index: field.index,
            name: field.name,
            key,
            kind: kind.unwrap_or(FieldKind::Unsupported(field.type_tag.name())),
        };

        if let Some(key) = field.tags.query {
            query.push(binding(key));
        }
        if let Some(key) = field.tags.path {
            path.push(binding(key));
        }
        if let Some(key) = field.tags.header {
            match kind {
                Some(FieldKind::String) | None => {}
                Some(kind) => violations.push(SchemaViolation::HeaderNotString {
                    field: field.name,
                    kind,
                }),
            }
            header.push(binding(key));
        }

        if field.tags.json && json_field.is_none() {
            json_field = Some(field.name);
        }
        if field.tags.body {
            match body_field {
                Some(first) => violations.push(SchemaViolation::MultipleBodyFields {
                    first: first.name,
                    second: field.name,
                }),
                None => body_field = Some(field),
            }
        }
        if field.tags.validate && validate_field.is_none() {
            validate_field = Some(field.name);
        }
    }

    // Settability is checked once every bound field has been recorded.
    for binding in query.iter().chain(&path).chain(&header) {
        if sample.field_slot(binding.index).is_none()
            && !violations.contains(&SchemaViolation::NotSettable { field: binding.name })
        {
            violations.push(SchemaViolation::NotSettable { field: binding.name });
        }
    }

    let (body_mode, body) = match (json_field, body_field) {
        (Some(json_field), Some(body_field)) => {
            violations.push(SchemaViolation::ConflictingBodyModes {
                json_field,
                body_field: body_field.name,
            });
            (BodyMode::NoBody, BodyDecoder::None)
        }
        (Some(field), None) => match T::whole_body_decoder() {
            Some(decoder) => (BodyMode::WholeBody, BodyDecoder::Whole(decoder)),
            None => {
                violations.push(SchemaViolation::MissingBodyDecoder { field });
                (BodyMode::NoBody, BodyDecoder::None)
            }
        },
        (None, Some(field)) => match check_body_field(
            type_name,
            field,
            capabilities.body_field,
            &mut sample,
        ) {
            Ok(getter) => (BodyMode::SubFieldBody, BodyDecoder::SubField(getter)),
            Err(violation) => {
                violations.push(violation);
                (BodyMode::NoBody, BodyDecoder::None)
            }
        },
        (None, None) => (BodyMode::NoBody, BodyDecoder::None),
    };

    let (validation, validate_fn) = match (capabilities.validate, capabilities.struct_validation) {
        (Some(validate), _) => (ValidationMode::SelfCheck, Some(validate)),
        (None, Some(engine)) if validate_field.is_some() => (ValidationMode::Engine, Some(engine)),
        (None, _) => {
            if let Some(field) = validate_field {
                violations.push(SchemaViolation::MissingValidator { field });
            }
            (ValidationMode::Skip, None)
        }
    };

    let reset = if capabilities.reset.is_some() {
        ResetStrategy::SelfReset
    } else if query.is_empty() && path.is_empty() && header.is_empty() {
        ResetStrategy::Noop
    } else {
        ResetStrategy::Zero
    };

    if !violations.is_empty() {
        return Err(SchemaError::new(type_name, violations));
    }

    Ok(BindingPlan {
        type_name,
        short_name: short_type_name(type_name),
        field_order: descriptors.iter().map(|d| d.name).collect(),
        query,
        path,
        header,
        body_mode,
        body,
        validation,
        validate_fn,
        reset,
        reset_fn: capabilities.reset,
    })
}

fn check_body_field<T>(
    type_name: &'static str,
    field: &FieldDescriptor,
    getter: Option<BodyFieldFn<T>>,
    sample: &mut T,
) -> Result<BodyFieldFn<T>, SchemaViolation> {
    let getter = getter.ok_or(SchemaViolation::MissingBodyFieldGetter {
        type_name,
        field: field.name,
    })?;

    let slot = getter(sample).ok_or(SchemaViolation::NullBodyField {
        type_name,
        field: field.name,
    })?;

    let found = slot.slot_type();
    if !found.is_compatible(&field.type_tag) {
        return Err(SchemaViolation::IncompatibleBodyField {
            type_name,
            field: field.name,
            expected: field.type_tag.name(),
            found: found.name(),
        });
    }
    Ok(getter)
}

fn short_type_name(type_name: &'static str) -> &'static str {
    type_name.rsplit("::").next().unwrap_or(type_name)
}

static PLANS: Lazy<TypeRegistry> = Lazy::new(|| TypeRegistry::new("binding_plans"));

/// Cached binding plan for `T`, analyzing it on first use.
///
/// A failed analysis is returned to every caller and never cached.
pub fn try_plan_for<T: RequestSchema>() -> Result<Arc<BindingPlan<T>>, SchemaError> {
    PLANS.get_or_try_insert_with::<T, BindingPlan<T>, _, _>(analyze::<T>)
}

/// Cached binding plan for `T`.
///
/// # Panics
///
/// Panics when `T` has malformed declarations. This is a configuration fault
/// meant to abort startup, reported through `tracing` before panicking.
#[must_use]
#[allow(clippy::panic)]
pub fn plan_for<T: RequestSchema>() -> Arc<BindingPlan<T>> {
    match try_plan_for::<T>() {
        Ok(plan) => plan,
        Err(err) => {
            error!(
                type_name = err.type_name(),
                violations = err.violations().len(),
                error = %err,
                "Request type failed schema analysis"
            );
            panic!("invalid request schema {err}");
        }
    }
}

/// Number of request types with a cached plan.
#[must_use]
pub fn cached_plans() -> usize {
    PLANS.len()
}
