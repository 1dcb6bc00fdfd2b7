//! # Schema Analyzer
//!
//! Request types describe themselves through [`RequestSchema`], normally via
//! `#[derive(RequestSchema)]`. The analyzer turns that description into a
//! cached [`BindingPlan`]: which fields come from headers, path parameters and
//! the query string, how the body is decoded, which validator runs and how
//! pooled instances are reset.
//!
//! ## Invariants checked at first use
//!
//! - Header-bound fields are `String`
//! - Every bound field is settable
//! - A `body` field requires the `BodyFieldGetter` capability returning a
//!   compatible, non-empty slot
//! - `json` and `body` fields are not mixed
//! - Validation rules have a validator to run them

mod analyzer;
mod descriptor;
mod error;
mod slot;

pub use analyzer::{
    analyze, cached_plans, plan_for, try_plan_for, BindingPlan, BodyMode, FieldBinding,
    ResetStrategy, ValidationMode,
};
pub(crate) use analyzer::BodyDecoder;
pub use descriptor::{
    decode_whole_body, BodyFieldGetter, BodySlot, Capabilities, FieldDescriptor, FieldTags,
    RequestSchema, Resettable, TypeTag, Validatable, WholeBodyDecoder,
};
pub use error::{SchemaError, SchemaViolation};
pub use slot::{FieldKind, FieldSlot};
