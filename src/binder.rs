//! # Binder
//!
//! Applies a cached [`BindingPlan`] to one [`RawRequest`].
//!
//! ## Order
//!
//! 1. Body (whole instance or the `BodyFieldGetter` slot)
//! 2. Headers
//! 3. Path parameters
//! 4. Query parameters
//! 5. Validation
//!
//! The first failure stops the bind. Fields not reached keep whatever value
//! the instance had, which for pooled instances is the reset state.
//!
//! A missing header, path parameter or query key converts from the empty
//! string: string fields become empty, numeric fields fail to convert.

use crate::convert::convert;
use crate::error::{BindError, ParamSource};
use crate::pool::{InstancePool, Pooled};
use crate::request::RawRequest;
use crate::schema::{
    plan_for, try_plan_for, BindingPlan, BodyDecoder, FieldBinding, RequestSchema, SchemaError,
};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

impl<T: RequestSchema> BindingPlan<T> {
    /// Populate `instance` from `request`.
    pub fn bind(&self, request: &RawRequest, instance: &mut T) -> Result<(), BindError> {
        match &self.body {
            BodyDecoder::None => {}
            BodyDecoder::Whole(decode) => {
                decode(instance, &request.body).map_err(BindError::Decode)?;
            }
            BodyDecoder::SubField(body_field) => {
                let slot = body_field(instance).ok_or(BindError::NullBodyField {
                    type_name: self.type_name(),
                })?;
                slot.decode_json(&request.body).map_err(BindError::Decode)?;
            }
        }

        apply(&self.header, ParamSource::Header, instance, |key| {
            request.get_header(key)
        })?;
        apply(&self.path, ParamSource::Path, instance, |key| {
            request.get_path_param(key)
        })?;
        apply(&self.query, ParamSource::Query, instance, |key| {
            request.get_query_param(key)
        })?;

        self.validate(instance).map_err(BindError::Validation)
    }
}

fn apply<'r, T: RequestSchema>(
    fields: &[FieldBinding],
    location: ParamSource,
    instance: &mut T,
    lookup: impl Fn(&str) -> Option<&'r str>,
) -> Result<(), BindError> {
    for field in fields {
        let raw = lookup(field.key).unwrap_or_default();
        let slot = instance
            .field_slot(field.index)
            .ok_or(BindError::NotSettable { field: field.name })?;
        convert(raw, slot).map_err(|error| BindError::Conversion {
            field: field.name,
            key: field.key,
            location,
            error,
        })?;
    }
    Ok(())
}

/// Per-type request parser: a binding plan plus the pool its instances come from.
///
/// ```rust,ignore
/// let parser = Parser::<CityRequest>::new();
/// let city = parser.parse(&request)?;
/// // `city` returns to the pool when dropped
/// ```
pub struct Parser<T: RequestSchema> {
    plan: Arc<BindingPlan<T>>,
    pool: Arc<InstancePool<T>>,
}

impl<T: RequestSchema> Parser<T> {
    /// Parser over the process-wide plan and pool for `T`.
    ///
    /// # Panics
    ///
    /// Panics when `T` fails schema analysis.
    #[must_use]
    pub fn new() -> Self {
        let plan = plan_for::<T>();
        let pool = InstancePool::shared();
        Self { plan, pool }
    }

    pub fn try_new() -> Result<Self, SchemaError> {
        let plan = try_plan_for::<T>()?;
        let pool = InstancePool::try_shared()?;
        Ok(Self { plan, pool })
    }

    /// Parser drawing instances from a dedicated pool.
    #[must_use]
    pub fn with_pool(pool: Arc<InstancePool<T>>) -> Self {
        Self {
            plan: Arc::clone(pool.plan()),
            pool,
        }
    }

    #[must_use]
    pub fn plan(&self) -> &Arc<BindingPlan<T>> {
        &self.plan
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<InstancePool<T>> {
        &self.pool
    }

    /// Check out an instance and bind `request` into it.
    ///
    /// On failure the instance goes straight back to the pool.
    pub fn parse(&self, request: &RawRequest) -> Result<Pooled<T>, BindError> {
        let mut instance = self.pool.checkout();
        self.plan.bind(request, &mut *instance)?;
        trace!(
            request_id = %request.request_id,
            type_name = self.plan.type_name(),
            "Request bound"
        );
        Ok(instance)
    }
}

impl<T: RequestSchema> Default for Parser<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RequestSchema> Clone for Parser<T> {
    fn clone(&self) -> Self {
        Self {
            plan: Arc::clone(&self.plan),
            pool: Arc::clone(&self.pool),
        }
    }
}

impl<T: RequestSchema> fmt::Debug for Parser<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("plan", &self.plan)
            .field("pool", &self.pool)
            .finish()
    }
}
