use crate::patch::InvalidTwinPath;
use bindings_api::OperationKind;
use reqwest::StatusCode;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("azureDigitalTwins error: missing {0}")]
    MissingField(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum DigitalTwinsClientError {
    #[error(transparent)]
    FromReqwest(#[from] reqwest::Error),

    #[error(transparent)]
    FromUrlParse(#[from] url::ParseError),

    #[error(transparent)]
    FromSerde(#[from] serde_json::Error),

    #[error("Not a valid Azure Digital Twins instance URL: {0}")]
    InvalidInstanceUrl(String),

    #[error("The token endpoint returned an invalid expiry: {0}")]
    InvalidTokenExpiry(String),

    #[error("Update of twin {twin_id} rejected with status {status}: {body}")]
    UpdateRejected {
        twin_id: String,
        status: StatusCode,
        body: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum DigitalTwinsBindingError {
    #[error(transparent)]
    FromConfig(#[from] ConfigError),

    #[error(transparent)]
    FromClient(#[from] DigitalTwinsClientError),

    #[error("Request data json error: {0}")]
    InvalidRequest(#[from] serde_json::Error),

    #[error(transparent)]
    InvalidPath(#[from] InvalidTwinPath),

    #[error("Operation {0} is not supported by the Azure Digital Twins binding")]
    UnsupportedOperation(OperationKind),

    #[error("The Azure Digital Twins binding has not been initialised")]
    NotInitialised,
}
