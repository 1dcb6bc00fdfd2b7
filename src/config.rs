//! # Bind Configuration
//!
//! Process-wide knobs for the binder, loaded from environment variables or
//! embedded in a host's own configuration file.
//!
//! ## Environment Variables
//!
//! ### `TYPEDHANDLER_POOL`
//!
//! Instance recycling: `on`, `off`, `true`, `false`, `1` or `0`.
//!
//! Default: on
//!
//! ### `TYPEDHANDLER_POOL_MAX_IDLE`
//!
//! Idle instances kept per request type.
//!
//! Default: `1024`
//!
//! ### `TYPEDHANDLER_TIME_LAYOUTS`
//!
//! `;`-separated `chrono` format strings tried in order when converting
//! timestamps, for example `%Y-%m-%d;%+`.
//!
//! Default: [`DEFAULT_LAYOUTS`](crate::time_layout::DEFAULT_LAYOUTS)
//!
//! ## Usage
//!
//! ```rust
//! use typedhandler::BindConfig;
//!
//! let config = BindConfig::from_env();
//! config.apply();
//! ```

use crate::pool::{set_max_idle_instances, set_pool_enabled, DEFAULT_MAX_IDLE};
use crate::time_layout::{set_time_layouts, DEFAULT_LAYOUTS};
use serde::Deserialize;
use std::env;
use tracing::{info, warn};

pub const ENV_POOL: &str = "TYPEDHANDLER_POOL";
pub const ENV_POOL_MAX_IDLE: &str = "TYPEDHANDLER_POOL_MAX_IDLE";
pub const ENV_TIME_LAYOUTS: &str = "TYPEDHANDLER_TIME_LAYOUTS";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BindConfig {
    /// Recycle request instances (default: true)
    pub pool_enabled: bool,
    /// Idle instances kept per request type (default: 1024)
    pub max_idle: usize,
    /// Timestamp layouts in trial order
    pub time_layouts: Vec<String>,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            pool_enabled: true,
            max_idle: DEFAULT_MAX_IDLE,
            time_layouts: DEFAULT_LAYOUTS.iter().map(|l| l.to_string()).collect(),
        }
    }
}

impl BindConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from any key/value source.
    ///
    /// Unrecognized values are logged and replaced by the default.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let pool_enabled = match lookup(ENV_POOL) {
            Some(val) => parse_switch(&val).unwrap_or_else(|| {
                warn!(variable = ENV_POOL, value = %val, "Unrecognized pool switch, keeping default");
                defaults.pool_enabled
            }),
            None => defaults.pool_enabled,
        };

        let max_idle = match lookup(ENV_POOL_MAX_IDLE) {
            Some(val) => val.trim().parse().unwrap_or_else(|_| {
                warn!(variable = ENV_POOL_MAX_IDLE, value = %val, "Invalid idle limit, keeping default");
                defaults.max_idle
            }),
            None => defaults.max_idle,
        };

        let time_layouts = match lookup(ENV_TIME_LAYOUTS) {
            Some(val) => {
                let layouts: Vec<String> = val
                    .split(';')
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(String::from)
                    .collect();
                if layouts.is_empty() {
                    warn!(variable = ENV_TIME_LAYOUTS, "No time layouts given, keeping defaults");
                    defaults.time_layouts
                } else {
                    layouts
                }
            }
            None => defaults.time_layouts,
        };

        Self {
            pool_enabled,
            max_idle,
            time_layouts,
        }
    }

    /// Publish this configuration to the process-wide pool and layout state.
    pub fn apply(&self) {
        set_pool_enabled(self.pool_enabled);
        set_max_idle_instances(self.max_idle);
        set_time_layouts(self.time_layouts.iter().cloned());
        info!(
            pool_enabled = self.pool_enabled,
            max_idle = self.max_idle,
            time_layouts = self.time_layouts.len(),
            "Bind configuration applied"
        );
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Some(true),
        "off" | "false" | "0" => Some(false),
        _ => None,
    }
}
