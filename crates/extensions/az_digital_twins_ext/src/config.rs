use crate::error::ConfigError;
use bindings_api::Metadata;
use std::fmt;

pub const CLIENT_ID_KEY: &str = "clientId";
pub const CLIENT_SECRET_KEY: &str = "clientSecret";
pub const TENANT_ID_KEY: &str = "tenantId";
pub const ADT_INSTANCE_URL_KEY: &str = "adtInstanceUrl";
pub const AUTHORITY_HOST_KEY: &str = "authorityHost";
pub const API_VERSION_KEY: &str = "apiVersion";

pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
pub const DEFAULT_API_VERSION: &str = "2020-10-31";

/// The resource access tokens are requested for
pub const DIGITAL_TWINS_RESOURCE: &str = "https://digitaltwins.azure.net";

/// Configuration of the Azure Digital Twins binding
#[derive(Clone, PartialEq, Eq)]
pub struct DigitalTwinsConfig {
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
    pub adt_instance_url: String,
    pub authority_host: String,
    pub api_version: String,
}

impl TryFrom<&Metadata> for DigitalTwinsConfig {
    type Error = ConfigError;

    fn try_from(metadata: &Metadata) -> Result<Self, Self::Error> {
        let required = |key: &'static str| {
            metadata
                .get(key)
                .map(str::to_string)
                .ok_or(ConfigError::MissingField(key))
        };
        let optional = |key: &str, default: &str| metadata.get(key).unwrap_or(default).to_string();

        Ok(DigitalTwinsConfig {
            client_id: required(CLIENT_ID_KEY)?,
            client_secret: required(CLIENT_SECRET_KEY)?,
            tenant_id: required(TENANT_ID_KEY)?,
            adt_instance_url: required(ADT_INSTANCE_URL_KEY)?,
            authority_host: optional(AUTHORITY_HOST_KEY, DEFAULT_AUTHORITY_HOST),
            api_version: optional(API_VERSION_KEY, DEFAULT_API_VERSION),
        })
    }
}

impl DigitalTwinsConfig {
    /// The OAuth2 endpoint delivering tokens to this tenant's clients
    pub fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/token",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        )
    }
}

impl fmt::Debug for DigitalTwinsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigitalTwinsConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("tenant_id", &self.tenant_id)
            .field("adt_instance_url", &self.adt_instance_url)
            .field("authority_host", &self.authority_host)
            .field("api_version", &self.api_version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn full_metadata() -> Metadata {
        Metadata::new("twins")
            .with_property("clientId", "client")
            .with_property("clientSecret", "secret")
            .with_property("tenantId", "tenant")
            .with_property("adtInstanceUrl", "https://my-twins.api.weu.digitaltwins.azure.net")
    }

    #[test]
    fn read_required_and_default_settings() {
        let config = DigitalTwinsConfig::try_from(&full_metadata()).unwrap();

        assert_eq!(config.client_id, "client");
        assert_eq!(config.client_secret, "secret");
        assert_eq!(config.tenant_id, "tenant");
        assert_eq!(
            config.adt_instance_url,
            "https://my-twins.api.weu.digitaltwins.azure.net"
        );
        assert_eq!(config.authority_host, DEFAULT_AUTHORITY_HOST);
        assert_eq!(config.api_version, DEFAULT_API_VERSION);
        assert_eq!(
            config.token_url(),
            "https://login.microsoftonline.com/tenant/oauth2/token"
        );
    }

    #[test]
    fn optional_settings_override_defaults() {
        let metadata = full_metadata()
            .with_property("authorityHost", "http://localhost:1234/")
            .with_property("apiVersion", "2022-05-31");
        let config = DigitalTwinsConfig::try_from(&metadata).unwrap();

        assert_eq!(config.api_version, "2022-05-31");
        assert_eq!(config.token_url(), "http://localhost:1234/tenant/oauth2/token");
    }

    #[test_case("clientId")]
    #[test_case("clientSecret")]
    #[test_case("tenantId")]
    #[test_case("adtInstanceUrl")]
    fn missing_settings_are_reported_by_name(key: &str) {
        let mut metadata = full_metadata();
        metadata.properties.remove(key);
        let error = DigitalTwinsConfig::try_from(&metadata).unwrap_err();

        assert_eq!(
            error.to_string(),
            format!("azureDigitalTwins error: missing {key}")
        );
    }

    #[test]
    fn empty_settings_are_missing() {
        let metadata = full_metadata().with_property("tenantId", "");
        assert_eq!(
            DigitalTwinsConfig::try_from(&metadata),
            Err(ConfigError::MissingField("tenantId"))
        );
    }

    #[test]
    fn secret_is_not_logged() {
        let config = DigitalTwinsConfig::try_from(&full_metadata()).unwrap();
        assert!(!format!("{config:?}").contains("\"secret\""));
    }
}
