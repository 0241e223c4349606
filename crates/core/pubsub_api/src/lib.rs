mod envelope;
mod feature;

pub use envelope::*;
pub use feature::Feature;

/// The CloudEvents `specversion` of the envelopes built here
pub const CLOUD_EVENTS_SPEC_VERSION: &str = "1.0";

/// The HTTP content type of a CloudEvents JSON envelope
pub const CLOUD_EVENTS_CONTENT_TYPE: &str = "application/cloudevents+json";

pub const DEFAULT_CLOUD_EVENT_TYPE: &str = "com.dapr.event.sent";
pub const DEFAULT_CLOUD_EVENT_SOURCE: &str = "Dapr";
pub const DEFAULT_CLOUD_EVENT_DATA_CONTENT_TYPE: &str = "text/plain";
pub const JSON_CONTENT_TYPE: &str = "application/json";
