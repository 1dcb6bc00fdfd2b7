//! # typedhandler
//!
//! **typedhandler** turns HTTP requests into strongly typed request structs,
//! calls a business function with them and serializes the reply. It owns no
//! sockets and no router: a transport hands it a [`RawRequest`] and writes
//! back the [`HandlerResponse`].
//!
//! ## Architecture
//!
//! - **[`convert`](mod@convert)** - text to typed field conversion (integers, floats, bools,
//!   timestamps, durations)
//! - **[`time_layout`]** - self-tuning timestamp layout list
//! - **[`schema`]** - descriptor tables, schema analysis and the plan cache
//! - **[`pool`]** - per-type instance recycling
//! - **[`binder`]** - applies a plan to a request
//! - **[`handler`]** - composes a parser and a business function
//! - **[`config`]** - environment-driven configuration
//!
//! ### Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant T as Transport
//!     participant H as TypedHandler
//!     participant P as Parser
//!     participant Pool as InstancePool
//!     participant Plan as BindingPlan
//!     participant S as Business fn
//!
//!     T->>H: handle(&mut RawRequest)
//!     H->>H: pre-parse hook
//!     H->>P: parse(request)
//!     P->>Pool: checkout()
//!     Pool-->>P: Pooled<T> (reset)
//!     P->>Plan: bind(request, instance)
//!     Plan->>Plan: body, headers, path, query, validate
//!     P-->>H: Pooled<T>
//!     H->>S: service(ctx, &mut T)
//!     S-->>H: Result<Reply<R>, HandlerError>
//!     H-->>T: HandlerResponse
//!     H->>Pool: drop guard (checkin)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use typedhandler::{compose_simple, RawRequest, Reply, RequestHandler, RequestSchema};
//!
//! #[derive(Default, Deserialize, RequestSchema)]
//! #[serde(default)]
//! pub struct Greet {
//!     #[request(json)]
//!     pub name: String,
//!     #[request(query = "lang")]
//!     pub lang: String,
//! }
//!
//! #[derive(Serialize)]
//! struct Greeting {
//!     text: String,
//! }
//!
//! let handler = compose_simple(|_ctx, req: &mut Greet| {
//!     Ok(Reply::ok(Greeting {
//!         text: format!("[{}] hello {}", req.lang, req.name),
//!     }))
//! });
//!
//! let mut request = RawRequest::new(http::Method::POST, "/greet?lang=en")
//!     .with_body(r#"{"name":"Homer"}"#);
//! let response = handler.handle(&mut request);
//! assert_eq!(response.status, 200);
//! assert_eq!(response.body_str(), r#"{"text":"[en] hello Homer"}"#);
//! ```
//!
//! ## Configuration Faults
//!
//! Malformed request types (a header bound to a non-string field, a `body`
//! field without a getter, ...) are reported when the type is first used.
//! [`compose_simple`], [`Parser::new`] and [`plan_for`] panic so startup
//! stops; their `try_` counterparts return the [`SchemaError`].

extern crate self as typedhandler;

pub mod binder;
pub mod config;
pub mod convert;
pub mod error;
pub mod handler;
pub mod pool;
mod registry;
pub mod request;
pub mod response;
pub mod schema;
pub mod time_layout;

pub use binder::Parser;
pub use config::BindConfig;
pub use convert::{convert, parse_duration, ConversionError, ConversionFailure, DurationError};
pub use error::{
    BindError, HandlerError, HttpError, HttpJsonError, JsonError, ParamSource, StatusError,
};
pub use handler::{
    compose, compose_simple, error_response, try_compose_simple, PreParseHook, Reply,
    RequestContext, RequestHandler, TypedHandler,
};
pub use pool::{
    created_instances, pool_enabled, reset_created_instances, set_max_idle_instances,
    set_pool_enabled, InstancePool, PoolStats, Pooled,
};
pub use request::{RawRequest, RequestId};
pub use response::HandlerResponse;
pub use schema::{
    cached_plans, decode_whole_body, plan_for, try_plan_for, BindingPlan, BodyFieldGetter,
    BodyMode, BodySlot, Capabilities, FieldDescriptor, FieldKind, FieldSlot, RequestSchema,
    ResetStrategy, Resettable, SchemaError, SchemaViolation, TypeTag, Validatable,
    ValidationMode, WholeBodyDecoder,
};
pub use time_layout::{parse_time, set_time_layouts, TimeError, TimeLayouts, Timestamp};
pub use typedhandler_macros::RequestSchema;

/// Validation engine used for `#[validate(...)]` rules.
pub use validator;
