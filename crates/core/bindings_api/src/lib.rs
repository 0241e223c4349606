use async_trait::async_trait;
use component_metadata::non_empty;
use std::collections::HashMap;

pub use component_metadata::Metadata;

/// The kinds of operation an output binding can be asked to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum OperationKind {
    Create,
    Get,
    Delete,
    List,
}

/// A request sent by the host to an output binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeRequest {
    pub data: Vec<u8>,
    pub metadata: HashMap<String, String>,
    pub operation: OperationKind,
}

impl InvokeRequest {
    pub fn new(operation: OperationKind, data: impl Into<Vec<u8>>) -> Self {
        InvokeRequest {
            data: data.into(),
            metadata: HashMap::new(),
            operation,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The value attached to a metadata key, if set and not empty
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        non_empty(&self.metadata, key)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvokeResponse {
    pub data: Vec<u8>,
    pub metadata: HashMap<String, String>,
}

/// An output binding forwards requests from the host to an external system.
///
/// A binding is initialised once with its component metadata,
/// then invoked for each request, one at a time.
#[async_trait]
pub trait OutputBinding: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    fn init(&mut self, metadata: &Metadata) -> Result<(), Self::Error>;

    fn operations(&self) -> Vec<OperationKind>;

    /// Returns `Ok(None)` when the external system has nothing to send back.
    async fn invoke(
        &mut self,
        request: InvokeRequest,
    ) -> Result<Option<InvokeResponse>, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use test_case::test_case;

    #[test_case(OperationKind::Create, "create")]
    #[test_case(OperationKind::Get, "get")]
    #[test_case(OperationKind::Delete, "delete")]
    #[test_case(OperationKind::List, "list")]
    fn operation_kind_names(kind: OperationKind, name: &str) {
        assert_eq!(kind.to_string(), name);
        assert_eq!(OperationKind::from_str(name).unwrap(), kind);
    }

    #[test]
    fn empty_metadata_values_are_ignored() {
        let request = InvokeRequest::new(OperationKind::Create, "[]")
            .with_metadata("twinId", "")
            .with_metadata("other", "value");

        assert_eq!(request.metadata_value("twinId"), None);
        assert_eq!(request.metadata_value("other"), Some("value"));
    }
}
