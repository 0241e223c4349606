use crate::Feature;
use crate::CLOUD_EVENTS_SPEC_VERSION;
use crate::DEFAULT_CLOUD_EVENT_DATA_CONTENT_TYPE;
use crate::DEFAULT_CLOUD_EVENT_SOURCE;
use crate::DEFAULT_CLOUD_EVENT_TYPE;
use crate::JSON_CONTENT_TYPE;
use clock::Clock;
use clock::Timestamp;
use clock::WallClock;
use component_metadata::try_get_ttl;
use component_metadata::Properties;
use serde::de::IgnoredAny;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use time::UtcOffset;
use tracing::debug;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("Failed to decode the cloud event: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A CloudEvents envelope as exchanged with the pub/sub components.
///
/// Attributes that are not known here are kept in `extensions`
/// and written back unchanged when the event is encoded.
///
/// Any JSON object decodes: a `null` attribute is treated as missing
/// and non-string values of the string attributes are kept as their JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct CloudEvent {
    pub id: String,

    #[serde(rename = "specversion")]
    pub spec_version: String,

    #[serde(rename = "datacontenttype")]
    pub data_content_type: String,

    pub source: String,

    #[serde(rename = "type")]
    pub event_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    #[serde(rename = "pubsubname", skip_serializing_if = "Option::is_none")]
    pub pubsub_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(rename = "traceid")]
    pub trace_id: String,

    /// RFC 3339 timestamp after which the event must be dropped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<Value>,

    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl From<Map<String, Value>> for CloudEvent {
    fn from(mut attributes: Map<String, Value>) -> Self {
        let data = attributes.remove("data");
        let expiration = attributes.remove("expiration").filter(|e| !e.is_null());
        let mut text = |key: &str| attributes.remove(key).and_then(attribute_text);

        let id = text("id").unwrap_or_default();
        let spec_version = text("specversion").unwrap_or_default();
        let data_content_type = text("datacontenttype").unwrap_or_default();
        let source = text("source").unwrap_or_default();
        let event_type = text("type").unwrap_or_default();
        let subject = text("subject");
        let topic = text("topic");
        let pubsub_name = text("pubsubname");
        let trace_id = text("traceid").unwrap_or_default();

        CloudEvent {
            id,
            spec_version,
            data_content_type,
            source,
            event_type,
            subject,
            topic,
            pubsub_name,
            data,
            trace_id,
            expiration,
            extensions: attributes,
        }
    }
}

fn attribute_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

impl CloudEvent {
    /// The expiration time of this event, if set to a valid RFC 3339 timestamp
    pub fn expiration_time(&self) -> Option<OffsetDateTime> {
        let expiration = match self.expiration.as_ref()? {
            Value::String(expiration) if expiration.is_empty() => return None,
            Value::String(expiration) => expiration,
            other => {
                debug!("Ignoring non-string expiration {other} of event {}", self.id);
                return None;
            }
        };
        match OffsetDateTime::parse(expiration, &Rfc3339) {
            Ok(time) => Some(time),
            Err(err) => {
                debug!("Ignoring invalid expiration {expiration:?} of event {}: {err}", self.id);
                None
            }
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, EnvelopeError> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Decode an existing cloud event, tagging it with the given trace id
pub fn from_cloud_event(cloud_event: &[u8], trace_id: &str) -> Result<CloudEvent, EnvelopeError> {
    let mut event: CloudEvent = serde_json::from_slice(cloud_event)?;
    event.trace_id = trace_id.to_string();
    Ok(event)
}

/// Values used for the attributes left empty by the publisher
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvelopeDefaults {
    pub source: String,
    pub event_type: String,
    pub data_content_type: String,
}

impl Default for EnvelopeDefaults {
    fn default() -> Self {
        EnvelopeDefaults {
            source: DEFAULT_CLOUD_EVENT_SOURCE.to_string(),
            event_type: DEFAULT_CLOUD_EVENT_TYPE.to_string(),
            data_content_type: DEFAULT_CLOUD_EVENT_DATA_CONTENT_TYPE.to_string(),
        }
    }
}

/// What a publisher provides for a new event; empty strings are defaulted
#[derive(Clone, Copy, Debug, Default)]
pub struct EventDetails<'a> {
    pub id: &'a str,
    pub source: &'a str,
    pub event_type: &'a str,
    pub subject: &'a str,
    pub topic: &'a str,
    pub pubsub_name: &'a str,
    pub data_content_type: &'a str,
    pub data: &'a [u8],
    pub trace_id: &'a str,
}

pub struct EnvelopeBuilder {
    defaults: EnvelopeDefaults,
    clock: Box<dyn Clock>,
}

impl Default for EnvelopeBuilder {
    fn default() -> Self {
        EnvelopeBuilder::new(EnvelopeDefaults::default(), Box::new(WallClock))
    }
}

impl EnvelopeBuilder {
    pub fn new(defaults: EnvelopeDefaults, clock: Box<dyn Clock>) -> Self {
        EnvelopeBuilder { defaults, clock }
    }

    /// Wrap a payload into a new cloud event.
    ///
    /// A payload that parses as JSON is always tagged `application/json`,
    /// whatever the content type given by the publisher.
    pub fn build(&self, details: EventDetails<'_>) -> CloudEvent {
        let id = match details.id {
            "" => Uuid::new_v4().to_string(),
            id => id.to_string(),
        };
        let source = or_default(details.source, &self.defaults.source);
        let event_type = or_default(details.event_type, &self.defaults.event_type);
        let data_content_type = if is_json(details.data) {
            JSON_CONTENT_TYPE.to_string()
        } else {
            or_default(details.data_content_type, &self.defaults.data_content_type)
        };

        CloudEvent {
            id,
            spec_version: CLOUD_EVENTS_SPEC_VERSION.to_string(),
            data_content_type,
            source,
            event_type,
            subject: Some(details.subject.to_string()),
            topic: Some(details.topic.to_string()),
            pubsub_name: Some(details.pubsub_name.to_string()),
            data: Some(Value::String(
                String::from_utf8_lossy(details.data).into_owned(),
            )),
            trace_id: details.trace_id.to_string(),
            expiration: None,
            extensions: Map::new(),
        }
    }

    pub fn from_cloud_event(
        &self,
        cloud_event: &[u8],
        trace_id: &str,
    ) -> Result<CloudEvent, EnvelopeError> {
        from_cloud_event(cloud_event, trace_id)
    }

    /// An event has expired once its expiration time is in the past.
    ///
    /// Events without a valid expiration never expire.
    pub fn has_expired(&self, event: &CloudEvent) -> bool {
        event
            .expiration_time()
            .is_some_and(|expiration| expiration < self.clock.now())
    }

    /// Set the expiration of the event from the TTL given in the metadata,
    /// unless the component handles message TTL natively.
    pub fn apply_metadata(
        &self,
        event: &mut CloudEvent,
        component_features: &[Feature],
        metadata: &Properties,
    ) {
        let ttl = match try_get_ttl(metadata) {
            Ok(Some(ttl)) => ttl,
            Ok(None) => return,
            Err(err) => {
                warn!("Ignoring the TTL of event {}: {err}", event.id);
                return;
            }
        };

        if Feature::MessageTtl.is_present(component_features) {
            return;
        }

        match expiration_after(self.clock.now(), ttl) {
            Some(expiration) => event.expiration = Some(Value::String(expiration)),
            None => warn!("Ignoring the TTL of event {}: {ttl:?} is out of range", event.id),
        }
    }
}

fn or_default(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

fn is_json(data: &[u8]) -> bool {
    serde_json::from_slice::<IgnoredAny>(data).is_ok()
}

/// Longest TTL applied to an event, about 292 years
const MAX_TTL: Duration = Duration::from_nanos(i64::MAX as u64);

fn expiration_after(now: Timestamp, ttl: Duration) -> Option<String> {
    let ttl = time::Duration::try_from(ttl.min(MAX_TTL)).ok()?;
    now.to_offset(UtcOffset::UTC)
        .checked_add(ttl)?
        .replace_nanosecond(0)
        .ok()?
        .format(&Rfc3339)
        .ok()
}
