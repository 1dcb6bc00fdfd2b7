#![allow(dead_code)]

use std::sync::Once;

static TRACING: Once = Once::new();

/// Install a test subscriber once per test binary.
///
/// Honors `RUST_LOG`; defaults to `typedhandler=debug` so plan and pool events
/// show up in `--nocapture` runs.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("typedhandler=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

pub mod requests {
    use serde::{Deserialize, Serialize};
    use validator::Validate;
    use typedhandler::RequestSchema;

    /// Request bound from every source at once.
    #[derive(Debug, Default, Deserialize, RequestSchema)]
    #[serde(default)]
    pub struct CityRequest {
        #[request(json)]
        pub name: String,
        #[request(query = "city")]
        pub city: String,
        #[request(header = "State")]
        pub state: String,
        #[request(path = "country")]
        pub country: String,
    }

    #[derive(Debug, Default, Deserialize, Validate, RequestSchema)]
    #[serde(default)]
    pub struct SignupRequest {
        #[request(json)]
        #[validate(length(min = 3))]
        pub name: String,
        #[request(json)]
        #[validate(email)]
        pub email: String,
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    pub struct Greeting {
        pub message: String,
    }
}
