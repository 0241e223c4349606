use crate::client::DigitalTwinsApi;
use crate::client::OAuthDigitalTwinsClient;
use crate::config::DigitalTwinsConfig;
use crate::error::DigitalTwinsBindingError;
use crate::patch::parse_patch_document;
use crate::patch::split_by_twin;
use crate::patch::TwinOperation;
use async_trait::async_trait;
use bindings_api::InvokeRequest;
use bindings_api::InvokeResponse;
use bindings_api::Metadata;
use bindings_api::OperationKind;
use bindings_api::OutputBinding;
use tracing::debug;
use tracing::error;
use tracing::info;

/// Metadata key selecting the twin to patch
pub const TWIN_ID_KEY: &str = "twinId";

/// Former spelling of [TWIN_ID_KEY], still accepted
pub const LEGACY_TWIN_ID_KEY: &str = "twinID";

/// Output binding writing to an Azure Digital Twins instance
#[derive(Default)]
pub struct AzureDigitalTwins {
    client: Option<Box<dyn DigitalTwinsApi>>,
}

impl AzureDigitalTwins {
    pub fn new() -> Self {
        AzureDigitalTwins::default()
    }

    /// A binding already connected to the given API
    pub fn with_client(client: Box<dyn DigitalTwinsApi>) -> Self {
        AzureDigitalTwins {
            client: Some(client),
        }
    }

    fn client(&mut self) -> Result<&mut dyn DigitalTwinsApi, DigitalTwinsBindingError> {
        match self.client.as_mut() {
            Some(client) => Ok(client.as_mut()),
            None => Err(DigitalTwinsBindingError::NotInitialised),
        }
    }

    async fn patch_single_twin(
        &mut self,
        twin_id: &str,
        data: &[u8],
    ) -> Result<(), DigitalTwinsBindingError> {
        debug!("Patching single twin {twin_id}");
        let operations = parse_patch_document(data).inspect_err(log_invalid_request)?;

        self.client()?.update_twin(twin_id, &operations).await?;
        Ok(())
    }

    async fn patch_multiple_twins(&mut self, data: &[u8]) -> Result<(), DigitalTwinsBindingError> {
        let operations = parse_patch_document(data).inspect_err(log_invalid_request)?;

        // All the paths are checked before any twin is updated
        let twin_operations = split_by_twin(operations).inspect_err(|err| error!("{err}"))?;

        let client = self.client()?;
        for (i, TwinOperation { twin_id, operation }) in twin_operations.iter().enumerate() {
            info!(
                "[{i}] Submitting {} {} to digital twin ({twin_id})",
                operation.op, operation.path
            );
            client.update_twin(twin_id, std::slice::from_ref(operation)).await?;
        }

        Ok(())
    }
}

fn log_invalid_request(err: &serde_json::Error) {
    error!("Request data json error: {err}");
}

#[async_trait]
impl OutputBinding for AzureDigitalTwins {
    type Error = DigitalTwinsBindingError;

    fn init(&mut self, metadata: &Metadata) -> Result<(), Self::Error> {
        info!("Init invoked...Azure Digital Twins");
        let config = DigitalTwinsConfig::try_from(metadata)?;
        let client = OAuthDigitalTwinsClient::try_new(&config)?;
        self.client = Some(Box::new(client));

        Ok(())
    }

    fn operations(&self) -> Vec<OperationKind> {
        vec![OperationKind::Create]
    }

    async fn invoke(
        &mut self,
        request: InvokeRequest,
    ) -> Result<Option<InvokeResponse>, Self::Error> {
        if !self.operations().contains(&request.operation) {
            return Err(DigitalTwinsBindingError::UnsupportedOperation(
                request.operation,
            ));
        }

        let twin_id = request
            .metadata_value(TWIN_ID_KEY)
            .or_else(|| request.metadata_value(LEGACY_TWIN_ID_KEY));

        match twin_id {
            Some(twin_id) => {
                info!("Metadata twinId: {twin_id}");
                self.patch_single_twin(twin_id, &request.data).await?
            }
            None => {
                debug!("Metadata twinId not found, reading twin ids from the patch paths");
                self.patch_multiple_twins(&request.data).await?
            }
        }

        Ok(None)
    }
}
