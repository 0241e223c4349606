//! Component metadata: the named properties a host passes to a component
//! when initialising it, and the well-known keys shared across components.
use std::collections::HashMap;
use std::time::Duration;

/// Time-to-live of a message, as an integer number of seconds
pub const TTL_IN_SECONDS_KEY: &str = "ttlInSeconds";

/// Time-to-live of a message, as a human readable duration (e.g. `10s`, `1m 30s`)
pub const TTL_KEY: &str = "ttl";

pub type Properties = HashMap<String, String>;

/// Metadata of a component instance
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
    pub name: String,
    pub properties: Properties,
}

impl Metadata {
    pub fn new(name: impl Into<String>) -> Self {
        Metadata {
            name: name.into(),
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// The value of a property, if set and not empty
    pub fn get(&self, key: &str) -> Option<&str> {
        non_empty(&self.properties, key)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("{key} value must be {expected}: actual is '{value}'")]
    InvalidTtl {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Look up a property, treating empty values as absent
pub fn non_empty<'a>(properties: &'a Properties, key: &str) -> Option<&'a str> {
    properties
        .get(key)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

/// Read the message time-to-live from the metadata, if any.
///
/// `ttlInSeconds` takes precedence over `ttl` when both are given.
pub fn try_get_ttl(properties: &Properties) -> Result<Option<Duration>, MetadataError> {
    if let Some(value) = non_empty(properties, TTL_IN_SECONDS_KEY) {
        let seconds: i64 = value.trim().parse().map_err(|_| MetadataError::InvalidTtl {
            key: TTL_IN_SECONDS_KEY,
            value: value.to_string(),
            expected: "a valid integer",
        })?;
        if seconds <= 0 {
            return Err(MetadataError::InvalidTtl {
                key: TTL_IN_SECONDS_KEY,
                value: value.to_string(),
                expected: "higher than zero",
            });
        }
        return Ok(Some(Duration::from_secs(seconds.unsigned_abs())));
    }

    if let Some(value) = non_empty(properties, TTL_KEY) {
        let ttl = humantime::parse_duration(value).map_err(|_| MetadataError::InvalidTtl {
            key: TTL_KEY,
            value: value.to_string(),
            expected: "a valid duration",
        })?;
        if ttl.is_zero() {
            return Err(MetadataError::InvalidTtl {
                key: TTL_KEY,
                value: value.to_string(),
                expected: "higher than zero",
            });
        }
        return Ok(Some(ttl));
    }

    Ok(None)
}
