//! Test helpers for the Megaport API

use super::products::ProvisioningWait;
use super::{Client, ClientConfig, Environment, RetryConfig};
use crate::provider_data::MegaportProviderData;
use std::time::Duration;

/// Client pointed at a mock server for both the API and the token endpoint,
/// with retries that do not slow the suite down
pub fn create_test_client(url: &str) -> Client {
    let config = ClientConfig::new(Environment::Development, "access", "secret")
        .with_api_endpoint(url)
        .with_auth_endpoint(url)
        .with_retry(RetryConfig {
            max_retries: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            timeout_seconds: 5,
        });
    Client::new(config).unwrap()
}

/// Provider data for resource and data source tests; purchase terms are
/// accepted and provisioning polls without sleeping
pub fn create_test_provider_data(url: &str) -> MegaportProviderData {
    MegaportProviderData::new(
        create_test_client(url),
        true,
        ProvisioningWait {
            timeout: Duration::from_secs(5),
            interval: Duration::from_millis(1),
        },
    )
}

/// Token endpoint answering with `test-token`
pub async fn mock_token(server: &mut mockito::ServerGuard) -> mockito::Mock {
    server
        .mock("POST", "/oauth2/token")
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"test-token","expires_in":3600,"token_type":"Bearer"}"#)
        .create_async()
        .await
}

#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn retry_config_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_backoff_ms, 100);
        assert_eq!(config.max_backoff_ms, 10000);
        assert_eq!(config.timeout_seconds, 60);
    }

    #[test]
    fn client_config_defaults_to_environment_endpoints() {
        let config = ClientConfig::new(Environment::Production, "a", "b");
        assert_eq!(config.api_endpoint, "https://api.megaport.com");
        assert_eq!(config.auth_endpoint, "https://auth-m2m.megaport.com");

        let config = config.with_api_endpoint("http://localhost:1234/");
        let client = Client::new(config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:1234");
    }
}
