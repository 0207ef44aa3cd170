//! Partner (cloud provider) ports

use super::common::null_as_default;
use super::{ApiError, Client};
use serde::Deserialize;

/// A port on the partner marketplace, e.g. an AWS or Azure on-ramp
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PartnerPort {
    #[serde(default, deserialize_with = "null_as_default")]
    pub connect_type: String,
    pub product_uid: String,
    #[serde(rename = "title", alias = "name", alias = "productName", default)]
    pub product_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub company_uid: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub company_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub diversity_zone: String,
    #[serde(default)]
    pub location_id: i64,
    #[serde(default)]
    pub speed: i64,
    #[serde(default)]
    pub rank: i64,
    #[serde(default = "default_true")]
    pub vxc_permitted: bool,
    /// Set when the port came from a service key lookup
    #[serde(skip)]
    pub secure: bool,
}

fn default_true() -> bool {
    true
}

/// Cloud providers whose ports are only reachable through a service key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecureProvider {
    Azure,
    Google,
    Oracle,
}

impl SecureProvider {
    /// The secure provider behind a connect type, if it has one
    pub fn from_connect_type(connect_type: &str) -> Option<Self> {
        match connect_type.to_ascii_uppercase().as_str() {
            "AZURE" => Some(SecureProvider::Azure),
            "GOOGLE" => Some(SecureProvider::Google),
            "ORACLE" => Some(SecureProvider::Oracle),
            _ => None,
        }
    }

    fn path_segment(&self) -> &'static str {
        match self {
            SecureProvider::Azure => "azure",
            SecureProvider::Google => "google",
            SecureProvider::Oracle => "oracle",
        }
    }

    fn connect_type(&self) -> &'static str {
        match self {
            SecureProvider::Azure => "AZURE",
            SecureProvider::Google => "GOOGLE",
            SecureProvider::Oracle => "ORACLE",
        }
    }
}

#[derive(Debug, Deserialize)]
struct SecureLookup {
    #[serde(default)]
    megaports: Vec<PartnerPort>,
}

pub struct PartnersApi<'a> {
    client: &'a Client,
}

impl<'a> PartnersApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /v2/dropdowns/partner/megaports
    pub async fn list(&self) -> Result<Vec<PartnerPort>, ApiError> {
        self.client.get("/v2/dropdowns/partner/megaports").await
    }

    /// GET /v2/secure/{provider}/{key}
    pub async fn lookup_service_key(
        &self,
        provider: SecureProvider,
        key: &str,
    ) -> Result<Vec<PartnerPort>, ApiError> {
        let path = format!(
            "/v2/secure/{}/{}",
            provider.path_segment(),
            urlencoding::encode(key)
        );
        let lookup: SecureLookup = self.client.get(&path).await?;

        Ok(lookup
            .megaports
            .into_iter()
            .map(|mut port| {
                port.secure = true;
                if port.connect_type.is_empty() {
                    port.connect_type = provider.connect_type().to_string();
                }
                port
            })
            .collect())
    }
}
