#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Process-wide layout list and configuration. Kept in its own test binary
//! because replacing the layouts affects every timestamp conversion.

mod common;

use chrono::{Datelike, Timelike};
use http::Method;
use typedhandler::config::{ENV_POOL_MAX_IDLE, ENV_TIME_LAYOUTS};
use typedhandler::time_layout::{global_layouts, DEFAULT_LAYOUTS, RFC1123Z};
use typedhandler::{
    parse_time, set_time_layouts, BindConfig, Parser, RawRequest, RequestSchema, TimeError,
    Timestamp,
};

#[derive(Debug, Default, RequestSchema)]
pub struct Since {
    #[request(header = "X-Since")]
    pub raw: String,
    #[request(query = "since")]
    pub since: Timestamp,
}

#[test]
fn test_process_wide_layouts() {
    common::init_tracing();
    assert_eq!(global_layouts().layouts(), DEFAULT_LAYOUTS.map(String::from).to_vec());

    // A later layout that matches moves to the front.
    let parsed = parse_time("Tue, 05 Mar 2024 10:11:12 +0200").unwrap();
    assert_eq!(parsed.hour(), 8);
    assert_eq!(global_layouts().layouts()[0], RFC1123Z);

    // Bound fields see the same list.
    let parser = Parser::<Since>::new();
    let bound = parser
        .parse(&RawRequest::new(Method::GET, "/?since=2024-03-05%2010%3A11%3A12"))
        .unwrap();
    assert_eq!((bound.since.day(), bound.since.minute()), (5, 11));
    drop(bound);

    // Wholesale replacement.
    set_time_layouts(["%d/%m/%Y"]);
    assert_eq!(parse_time("05/03/2024").unwrap().month(), 3);
    assert_eq!(parse_time("2024-03-05"), Err(TimeError::NoMatchingLayout));

    let err = parser
        .parse(&RawRequest::new(Method::GET, "/?since=2024-03-05"))
        .unwrap_err();
    assert_eq!(err.status(), 400);
    assert!(err.to_string().contains("unable to parse time with provided layouts"));

    set_time_layouts(Vec::<String>::new());
    assert_eq!(parse_time("05/03/2024"), Err(TimeError::NoLayoutsConfigured));

    // Configuration publishes its layouts.
    let config = BindConfig::from_lookup(|name| match name {
        n if n == ENV_TIME_LAYOUTS => Some("%Y-%m-%d".to_string()),
        n if n == ENV_POOL_MAX_IDLE => Some("64".to_string()),
        _ => None,
    });
    config.apply();
    assert_eq!(global_layouts().layouts(), vec!["%Y-%m-%d".to_string()]);
    assert_eq!(typedhandler::pool::max_idle_instances(), 64);
    assert_eq!(parse_time("2024-03-05").unwrap().year(), 2024);

    BindConfig::default().apply();
    assert_eq!(global_layouts().layouts(), DEFAULT_LAYOUTS.map(String::from).to_vec());
}
