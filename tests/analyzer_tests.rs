#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::requests::{CityRequest, SignupRequest};
use serde::Deserialize;
use std::sync::Arc;
use typedhandler::{
    cached_plans, plan_for, try_compose_simple, try_plan_for, BodyMode, FieldKind, Reply,
    RequestSchema, ResetStrategy, SchemaViolation, ValidationMode,
};

#[derive(Debug, Default, RequestSchema)]
pub struct BadHeader {
    #[request(header = "X-Count")]
    pub count: i32,
}

#[derive(Debug, Default, RequestSchema)]
pub struct NoGetter {
    #[request(body)]
    pub items: Vec<String>,
}

#[derive(Debug, Default, Deserialize, RequestSchema)]
#[serde(default)]
pub struct TwoBodies {
    #[request(json)]
    pub name: String,
    #[request(body)]
    pub payload: Vec<u8>,
}

#[derive(Debug, Default, RequestSchema)]
pub struct ManyFaults {
    #[request(header = "X-Retries")]
    pub retries: u8,
    #[request(header = "X-Ratio")]
    pub ratio: f64,
    #[request(body)]
    pub payload: Vec<u8>,
}

#[derive(Debug, Default, RequestSchema)]
pub struct Unexported {
    #[request(header = "X-Count")]
    count: i32,
    #[request(query = "q")]
    pub q: String,
}

#[derive(Debug, Default, RequestSchema)]
pub struct Nested {
    #[request(query = "tags")]
    pub tags: Vec<String>,
}

#[test]
fn test_header_must_be_string() {
    common::init_tracing();
    let err = try_plan_for::<BadHeader>().unwrap_err();
    assert!(err.type_name().ends_with("BadHeader"));
    assert_eq!(
        err.violations(),
        &[SchemaViolation::HeaderNotString {
            field: "count",
            kind: FieldKind::Int(32),
        }]
    );
}

#[test]
fn test_body_field_requires_getter() {
    common::init_tracing();
    let err = try_plan_for::<NoGetter>().unwrap_err();
    match err.violations() {
        [SchemaViolation::MissingBodyFieldGetter { type_name, field }] => {
            assert!(type_name.ends_with("NoGetter"));
            assert_eq!(*field, "items");
        }
        other => panic!("unexpected violations: {other:?}"),
    }
    assert!(err
        .to_string()
        .contains("must implement the BodyFieldGetter capability returning a reference to field items"));
}

#[test]
fn test_json_and_body_conflict() {
    common::init_tracing();
    let err = try_plan_for::<TwoBodies>().unwrap_err();
    assert_eq!(
        err.violations(),
        &[SchemaViolation::ConflictingBodyModes {
            json_field: "name",
            body_field: "payload",
        }]
    );
}

#[test]
fn test_every_violation_is_reported() {
    common::init_tracing();
    let err = try_plan_for::<ManyFaults>().unwrap_err();
    assert_eq!(err.violations().len(), 3);
    assert!(matches!(
        err.violations()[0],
        SchemaViolation::HeaderNotString { field: "retries", .. }
    ));
    assert!(matches!(
        err.violations()[1],
        SchemaViolation::HeaderNotString { field: "ratio", .. }
    ));
    assert!(matches!(
        err.violations()[2],
        SchemaViolation::MissingBodyFieldGetter { field: "payload", .. }
    ));
    // One line per violation after the type prefix.
    assert_eq!(err.to_string().lines().count(), 3);
}

#[test]
fn test_failed_analysis_is_not_cached() {
    common::init_tracing();
    let first = try_plan_for::<BadHeader>().unwrap_err();
    let second = try_plan_for::<BadHeader>().unwrap_err();
    assert_eq!(first, second);
}

#[test]
#[should_panic(expected = "invalid request schema")]
fn test_plan_for_panics_on_bad_schema() {
    common::init_tracing();
    let _ = plan_for::<BadHeader>();
}

#[test]
fn test_compose_reports_bad_schema() {
    common::init_tracing();
    let composed = try_compose_simple(|_ctx, _req: &mut NoGetter| Ok(Reply::ok(())));
    assert!(composed.is_err());
}

#[test]
fn test_unexported_fields_are_ignored() {
    common::init_tracing();
    let plan = try_plan_for::<Unexported>().unwrap();
    assert!(plan.header_fields().is_empty());
    assert_eq!(plan.query_fields().len(), 1);
}

#[test]
fn test_unsupported_types_pass_analysis() {
    common::init_tracing();
    let plan = try_plan_for::<Nested>().unwrap();
    assert!(matches!(
        plan.query_fields()[0].kind,
        FieldKind::Unsupported(name) if name.contains("Vec")
    ));
}

#[test]
fn test_city_plan_shape() {
    common::init_tracing();
    let plan = plan_for::<CityRequest>();

    assert_eq!(plan.short_name(), "CityRequest");
    assert_eq!(plan.field_order(), &["name", "city", "state", "country"]);
    assert_eq!(plan.body_mode(), BodyMode::WholeBody);
    assert_eq!(plan.validation(), ValidationMode::Skip);
    assert_eq!(plan.reset_strategy(), ResetStrategy::Zero);

    let keys = |fields: &[typedhandler::schema::FieldBinding]| {
        fields.iter().map(|f| f.key).collect::<Vec<_>>()
    };
    assert_eq!(keys(plan.query_fields()), vec!["city"]);
    assert_eq!(keys(plan.header_fields()), vec!["State"]);
    assert_eq!(keys(plan.path_fields()), vec!["country"]);
}

#[test]
fn test_body_only_schema_skips_reset() {
    common::init_tracing();
    let plan = plan_for::<SignupRequest>();
    assert_eq!(plan.reset_strategy(), ResetStrategy::Noop);
    assert_eq!(plan.validation(), ValidationMode::Engine);
}

#[test]
fn test_plans_are_shared() {
    common::init_tracing();
    let first = plan_for::<CityRequest>();
    let second = try_plan_for::<CityRequest>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(cached_plans() >= 1);
}

#[test]
fn test_concurrent_first_use_builds_one_plan() {
    common::init_tracing();

    #[derive(Debug, Default, RequestSchema)]
    pub struct Raced {
        #[request(query = "q")]
        pub q: String,
    }

    let handles: Vec<_> = (0..8)
        .map(|_| std::thread::spawn(plan_for::<Raced>))
        .collect();
    let plans: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for plan in &plans[1..] {
        assert!(Arc::ptr_eq(&plans[0], plan));
    }
}
