#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::requests::{CityRequest, Greeting, SignupRequest};
use http::Method;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use serde::Deserialize;
use typedhandler::{
    compose, compose_simple, HandlerError, HandlerResponse, Parser, RawRequest, Reply,
    RequestHandler, RequestSchema, StatusError,
};
use validator::Validate;

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct Address {
    #[validate(length(min = 2))]
    pub city: String,
}

#[derive(Debug, Default, Deserialize, Validate, RequestSchema)]
#[serde(default)]
pub struct Order {
    #[request(json)]
    #[validate(nested)]
    pub address: Address,
}

fn city_request(body: &str) -> RawRequest {
    RawRequest::new(Method::POST, "/countries/US/cities?city=Springfield")
        .with_path_param("country", "US")
        .with_header("State", "IL")
        .with_body(body.to_string())
}

fn greeting(resp: &HandlerResponse) -> Greeting {
    serde_json::from_slice(&resp.body).unwrap()
}

#[test]
fn test_typed_handler_round_trip() {
    common::init_tracing();
    let handler = compose_simple(|ctx, req: &mut CityRequest| {
        assert_eq!(ctx.path(), "/countries/US/cities");
        Ok(Reply::ok(Greeting {
            message: format!("{} from {}, {}, {}", req.name, req.city, req.state, req.country),
        }))
    });

    let resp = handler.handle(&mut city_request(r#"{"name":"Homer"}"#));
    assert_eq!(resp.status, 200);
    assert_eq!(resp.get_header("content-type"), Some("application/json"));
    assert_eq!(greeting(&resp).message, "Homer from Springfield, IL, US");
}

#[test]
fn test_zero_status_means_ok() {
    common::init_tracing();
    let handler = compose_simple(|_ctx, req: &mut CityRequest| {
        Ok(Reply::with_status(0, Greeting { message: req.name.clone() }))
    });

    let resp = handler.handle(&mut city_request(r#"{"name":"Bart"}"#));
    assert_eq!(resp.status, 200);
    assert_eq!(greeting(&resp).message, "Bart");
}

#[test]
fn test_custom_status_is_kept() {
    common::init_tracing();
    let handler = compose_simple(|_ctx, req: &mut CityRequest| {
        Ok(Reply::with_status(201, Greeting { message: req.name.clone() }))
    });

    let resp = handler.handle(&mut city_request(r#"{"name":"Lisa"}"#));
    assert_eq!(resp.status, 201);
}

#[test]
fn test_plain_error_is_500() {
    common::init_tracing();
    let handler = compose_simple(|_ctx, _req: &mut CityRequest| -> Result<Reply<Greeting>, HandlerError> {
        Err(anyhow::anyhow!("database unavailable").into())
    });

    let resp = handler.handle(&mut city_request("{}"));
    assert_eq!(resp.status, 500);
    assert_eq!(resp.body_str(), "database unavailable");
}

#[test]
fn test_status_error_from_service() {
    common::init_tracing();
    let handler = compose_simple(|_ctx, req: &mut CityRequest| -> Result<Reply<Greeting>, HandlerError> {
        Err(StatusError::new(404, format!("no city named {}", req.city)).into())
    });

    let resp = handler.handle(&mut city_request("{}"));
    assert_eq!(resp.status, 404);
    assert_eq!(resp.body_str(), "no city named Springfield");
}

#[test]
fn test_json_error_from_service() {
    common::init_tracing();
    let handler = compose_simple(|_ctx, _req: &mut CityRequest| -> Result<Reply<Greeting>, HandlerError> {
        Err(HandlerError::json(
            422,
            serde_json::json!({"error": "unprocessable", "field": "city"}),
        ))
    });

    let resp = handler.handle(&mut city_request("{}"));
    assert_eq!(resp.status, 422);
    assert_eq!(resp.get_header("content-type"), Some("application/json"));
    let body: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
    assert_eq!(body["error"], "unprocessable");
    assert_eq!(body["field"], "city");
}

#[test]
fn test_validation_failures_are_listed_in_field_order() {
    common::init_tracing();
    let called = Arc::new(AtomicBool::new(false));
    let seen = Arc::clone(&called);
    let handler = compose_simple(move |_ctx, _req: &mut SignupRequest| {
        seen.store(true, Ordering::SeqCst);
        Ok(Reply::ok(()))
    });

    let mut request =
        RawRequest::new(Method::POST, "/signup").with_body(r#"{"name":"Al","email":"bad"}"#);
    let resp = handler.handle(&mut request);

    assert_eq!(resp.status, 400);
    assert!(!called.load(Ordering::SeqCst));
    let messages: Vec<String> = serde_json::from_slice(&resp.body).unwrap();
    assert_eq!(
        messages,
        vec![
            "Key: 'SignupRequest.name' Error:Field validation for 'name' failed on the 'length' tag"
                .to_string(),
            "Key: 'SignupRequest.email' Error:Field validation for 'email' failed on the 'email' tag"
                .to_string(),
        ]
    );
}

#[test]
fn test_nested_validation_failure_is_reported() {
    common::init_tracing();
    let handler = compose_simple(|_ctx, _req: &mut Order| Ok(Reply::ok(())));

    let mut request =
        RawRequest::new(Method::POST, "/orders").with_body(r#"{"address":{"city":"x"}}"#);
    let resp = handler.handle(&mut request);

    assert_eq!(resp.status, 400);
    let messages: Vec<String> = serde_json::from_slice(&resp.body).unwrap();
    assert_eq!(
        messages,
        vec!["Key: 'Order.address.city' Error:Field validation for 'city' failed on the 'length' tag"
            .to_string()]
    );

    let mut request =
        RawRequest::new(Method::POST, "/orders").with_body(r#"{"address":{"city":"Paris"}}"#);
    assert_eq!(handler.handle(&mut request).status, 200);
}

#[test]
fn test_valid_signup_reaches_service() {
    common::init_tracing();
    let handler = compose_simple(|_ctx, req: &mut SignupRequest| {
        Ok(Reply::with_status(201, Greeting { message: format!("welcome {}", req.name) }))
    });

    let mut request = RawRequest::new(Method::POST, "/signup")
        .with_body(r#"{"name":"Homer","email":"homer@example.com"}"#);
    let resp = handler.handle(&mut request);
    assert_eq!(resp.status, 201);
    assert_eq!(greeting(&resp).message, "welcome Homer");
}

#[test]
fn test_bind_failure_is_400_and_skips_service() {
    common::init_tracing();
    let called = Arc::new(AtomicBool::new(false));
    let seen = Arc::clone(&called);
    let handler = compose_simple(move |_ctx, _req: &mut CityRequest| {
        seen.store(true, Ordering::SeqCst);
        Ok(Reply::ok(()))
    });

    let resp = handler.handle(&mut city_request("{not json"));
    assert_eq!(resp.status, 400);
    assert!(resp.body_str().starts_with("invalid request body:"));
    assert!(!called.load(Ordering::SeqCst));
}

#[test]
fn test_pre_parse_rejection_skips_service() {
    common::init_tracing();
    let called = Arc::new(AtomicBool::new(false));
    let seen = Arc::clone(&called);
    let handler = compose_simple(move |_ctx, _req: &mut CityRequest| {
        seen.store(true, Ordering::SeqCst);
        Ok(Reply::ok(()))
    })
    .with_pre_parse(|req: &mut RawRequest| match req.get_header("authorization") {
        Some(_) => Ok(()),
        None => Err(HandlerError::status(401, "unauthorized")),
    });

    let resp = handler.handle(&mut city_request("{}"));
    assert_eq!(resp.status, 401);
    assert_eq!(resp.body_str(), "unauthorized");
    assert!(!called.load(Ordering::SeqCst));

    let mut authorized = city_request("{}").with_header("Authorization", "Bearer t");
    let resp = handler.handle(&mut authorized);
    assert_eq!(resp.status, 200);
    assert!(called.load(Ordering::SeqCst));
}

#[test]
fn test_pre_parse_can_rewrite_request() {
    common::init_tracing();
    let handler = compose(
        Parser::<CityRequest>::new(),
        Some(Box::new(|req: &mut RawRequest| -> Result<(), HandlerError> {
            req.path_params.clear();
            req.path_params.push((Arc::from("country"), "CA".to_string()));
            Ok(())
        })),
        |_ctx, req: &mut CityRequest| {
            Ok(Reply::ok(Greeting {
                message: req.country.clone(),
            }))
        },
    );

    let resp = handler.handle(&mut city_request("{}"));
    assert_eq!(greeting(&resp).message, "CA");
}

#[test]
fn test_panicking_service_is_500() {
    common::init_tracing();
    let handler = compose_simple(|_ctx, req: &mut CityRequest| -> Result<Reply<Greeting>, HandlerError> {
        panic!("cannot greet {}", req.city)
    });

    let resp = handler.handle(&mut city_request("{}"));
    assert_eq!(resp.status, 500);
    assert_eq!(resp.body_str(), "handler panicked");

    // The handler keeps serving after a panic.
    let resp = handler.handle(&mut city_request("{not json"));
    assert_eq!(resp.status, 400);
}

#[test]
fn test_response_converts_to_http() {
    common::init_tracing();
    let handler = compose_simple(|_ctx, req: &mut CityRequest| {
        Ok(Reply::ok(Greeting {
            message: req.name.clone(),
        }))
    });

    let resp = handler
        .handle(&mut city_request(r#"{"name":"Maggie"}"#))
        .into_http()
        .unwrap();
    assert_eq!(resp.status(), http::StatusCode::OK);
    assert_eq!(resp.headers()["content-type"], "application/json");
    assert_eq!(resp.body().as_slice(), br#"{"message":"Maggie"}"#);
}
