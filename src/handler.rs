//! # Handler Composer
//!
//! Wraps a [`Parser`] and a business function into a [`RequestHandler`]
//! that any transport can drive.
//!
//! ## Per request
//!
//! 1. Run the pre-parse hook, if any
//! 2. Bind the request into a pooled instance
//! 3. Call the business function
//! 4. Serialize its reply as JSON with the reply's status (200 when unset)
//!
//! Any failure along the way is rendered by [`error_response`]:
//!
//! | Error | Response |
//! |-------|----------|
//! | validation errors | 400, JSON array with one message per failed rule |
//! | [`HttpJsonError`](crate::HttpJsonError) | its status and JSON body |
//! | [`HttpError`](crate::HttpError) | its status and plain message |
//! | [`BindError`] | 400 for bad input, 500 for schema faults, plain message |
//! | anything else | 500 with the plain message |
//!
//! A panicking business function is caught and answered with a 500.

use crate::binder::Parser;
use crate::error::{
    validation_messages, BindError, HandlerError, HttpError, HttpJsonError, JsonError, StatusError,
};
use crate::request::{RawRequest, RequestId};
use crate::response::HandlerResponse;
use crate::schema::{RequestSchema, SchemaError};
use http::Method;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use tracing::{debug, error, warn};

/// Anything that turns a request into a response.
pub trait RequestHandler: Send + Sync {
    fn handle(&self, request: &mut RawRequest) -> HandlerResponse;
}

impl<F> RequestHandler for F
where
    F: Fn(&mut RawRequest) -> HandlerResponse + Send + Sync,
{
    fn handle(&self, request: &mut RawRequest) -> HandlerResponse {
        self(request)
    }
}

/// Request metadata visible to business functions.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'r> {
    request: &'r RawRequest,
}

impl<'r> RequestContext<'r> {
    #[must_use]
    pub fn new(request: &'r RawRequest) -> Self {
        Self { request }
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request.request_id
    }

    #[must_use]
    pub fn method(&self) -> &'r Method {
        &self.request.method
    }

    #[must_use]
    pub fn path(&self) -> &'r str {
        &self.request.path
    }

    /// The raw request the instance was bound from.
    #[must_use]
    pub fn request(&self) -> &'r RawRequest {
        self.request
    }
}

/// Successful result of a business function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply<T> {
    pub body: T,
    /// `0` means 200
    pub status: u16,
}

impl<T> Reply<T> {
    /// 200 reply.
    #[must_use]
    pub fn ok(body: T) -> Self {
        Self { body, status: 200 }
    }

    #[must_use]
    pub fn with_status(status: u16, body: T) -> Self {
        Self { body, status }
    }
}

impl<T> From<T> for Reply<T> {
    fn from(body: T) -> Self {
        Self::ok(body)
    }
}

/// Runs before binding; an error skips binding and the business function.
pub type PreParseHook = Box<dyn Fn(&mut RawRequest) -> Result<(), HandlerError> + Send + Sync>;

/// A parser and a business function composed into a [`RequestHandler`].
pub struct TypedHandler<RIn, ROut, F>
where
    RIn: RequestSchema,
{
    parser: Parser<RIn>,
    pre_parse: Option<PreParseHook>,
    service: F,
    _reply: PhantomData<fn() -> ROut>,
}

/// Compose `service` with `parser` and an optional pre-parse hook.
#[must_use]
pub fn compose<RIn, ROut, F>(
    parser: Parser<RIn>,
    pre_parse: Option<PreParseHook>,
    service: F,
) -> TypedHandler<RIn, ROut, F>
where
    RIn: RequestSchema,
    ROut: Serialize,
    F: Fn(&RequestContext<'_>, &mut RIn) -> Result<Reply<ROut>, HandlerError> + Send + Sync,
{
    debug!(
        type_name = parser.plan().type_name(),
        pre_parse = pre_parse.is_some(),
        "Composed typed handler"
    );
    TypedHandler {
        parser,
        pre_parse,
        service,
        _reply: PhantomData,
    }
}

/// Compose `service` with the process-wide parser for `RIn`.
///
/// # Panics
///
/// Panics when `RIn` fails schema analysis, so a bad request type stops
/// startup instead of failing the first request.
#[must_use]
pub fn compose_simple<RIn, ROut, F>(service: F) -> TypedHandler<RIn, ROut, F>
where
    RIn: RequestSchema,
    ROut: Serialize,
    F: Fn(&RequestContext<'_>, &mut RIn) -> Result<Reply<ROut>, HandlerError> + Send + Sync,
{
    compose(Parser::new(), None, service)
}

/// [`compose_simple`] reporting schema faults as errors.
pub fn try_compose_simple<RIn, ROut, F>(service: F) -> Result<TypedHandler<RIn, ROut, F>, SchemaError>
where
    RIn: RequestSchema,
    ROut: Serialize,
    F: Fn(&RequestContext<'_>, &mut RIn) -> Result<Reply<ROut>, HandlerError> + Send + Sync,
{
    Ok(compose(Parser::try_new()?, None, service))
}

impl<RIn, ROut, F> TypedHandler<RIn, ROut, F>
where
    RIn: RequestSchema,
    ROut: Serialize,
    F: Fn(&RequestContext<'_>, &mut RIn) -> Result<Reply<ROut>, HandlerError> + Send + Sync,
{
    /// Install or replace the pre-parse hook.
    #[must_use]
    pub fn with_pre_parse<H>(mut self, hook: H) -> Self
    where
        H: Fn(&mut RawRequest) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.pre_parse = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn parser(&self) -> &Parser<RIn> {
        &self.parser
    }

    fn render(&self, err: &HandlerError, request: &RawRequest) -> HandlerResponse {
        let plan = self.parser.plan();
        let response = error_response(err, plan.short_name(), plan.field_order());
        if response.status >= 500 {
            warn!(
                request_id = %request.request_id,
                type_name = plan.type_name(),
                status = response.status,
                error = %err,
                "Request failed"
            );
        } else {
            debug!(
                request_id = %request.request_id,
                type_name = plan.type_name(),
                status = response.status,
                error = %err,
                "Request rejected"
            );
        }
        response
    }
}

impl<RIn, ROut, F> RequestHandler for TypedHandler<RIn, ROut, F>
where
    RIn: RequestSchema,
    ROut: Serialize,
    F: Fn(&RequestContext<'_>, &mut RIn) -> Result<Reply<ROut>, HandlerError> + Send + Sync,
{
    fn handle(&self, request: &mut RawRequest) -> HandlerResponse {
        if let Some(hook) = &self.pre_parse {
            if let Err(err) = hook(request) {
                return self.render(&err, request);
            }
        }

        let mut instance = match self.parser.parse(request) {
            Ok(instance) => instance,
            Err(err) => return self.render(&err.into(), request),
        };

        let ctx = RequestContext::new(request);
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            (self.service)(&ctx, &mut *instance)
        }));

        let result = match outcome {
            Ok(result) => result,
            Err(panic) => {
                error!(
                    request_id = %request.request_id,
                    type_name = self.parser.plan().type_name(),
                    panic_message = ?panic,
                    "Handler panicked"
                );
                return HandlerResponse::text(500, "handler panicked");
            }
        };

        match result.and_then(|reply| {
            let body = serde_json::to_vec(&reply.body)?;
            Ok((reply.status, body))
        }) {
            Ok((status, body)) => {
                let status = if status == 0 { 200 } else { status };
                HandlerResponse::json(status, body)
            }
            Err(err) => self.render(&err, request),
        }
    }
}

impl<RIn, ROut, F> fmt::Debug for TypedHandler<RIn, ROut, F>
where
    RIn: RequestSchema,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedHandler")
            .field("parser", &self.parser)
            .field("pre_parse", &self.pre_parse.is_some())
            .finish()
    }
}

/// Map an error to its response.
///
/// `type_name` and `field_order` describe the request type and are used to
/// label and order validation messages.
#[must_use]
pub fn error_response(err: &HandlerError, type_name: &str, field_order: &[&str]) -> HandlerResponse {
    if let Some(errors) = err.validation_errors() {
        let messages = validation_messages(errors, type_name, field_order);
        let body = serde_json::Value::from(messages).to_string();
        return HandlerResponse::json(400, body.into_bytes());
    }

    match err {
        HandlerError::Json(err) => HandlerResponse::json(err.status(), err.json()),
        HandlerError::Status(err) => HandlerResponse::text(err.status(), err.to_string()),
        HandlerError::Bind(err) => HandlerResponse::text(err.status(), err.to_string()),
        HandlerError::Validation(_) => HandlerResponse::text(400, err.to_string()),
        HandlerError::Internal(inner) => {
            for cause in inner.chain() {
                if let Some(json) = cause.downcast_ref::<JsonError>() {
                    return HandlerResponse::json(json.status, json.body.to_string().into_bytes());
                }
                if let Some(status) = cause.downcast_ref::<StatusError>() {
                    return HandlerResponse::text(status.status, status.message.clone());
                }
                if let Some(bind) = cause.downcast_ref::<BindError>() {
                    return HandlerResponse::text(bind.status(), inner.to_string());
                }
            }
            HandlerResponse::text(500, inner.to_string())
        }
    }
}
