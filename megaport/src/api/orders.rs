//! Network design validation and purchase
//!
//! Every order is a JSON array of product requests. Validation must pass
//! before the same body is posted to the buy endpoint, which answers with the
//! technical service UID of each new product.

use super::common::ResourceTag;
use super::{ApiError, Client};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortOrder {
    pub product_name: String,
    /// Always MEGAPORT
    pub product_type: &'static str,
    pub port_speed: i64,
    pub location_id: i64,
    #[serde(rename = "term")]
    pub contract_term_months: i64,
    pub marketplace_visibility: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diversity_zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_centre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promo_code: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource_tags: Vec<ResourceTag>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct McrOrder {
    pub product_name: String,
    /// Always MCR2
    pub product_type: &'static str,
    pub port_speed: i64,
    pub location_id: i64,
    #[serde(rename = "term")]
    pub contract_term_months: i64,
    pub marketplace_visibility: bool,
    pub config: McrOrderConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_centre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promo_code: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource_tags: Vec<ResourceTag>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct McrOrderConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mcr_asn: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diversity_zone: Option<String>,
}

/// A VXC is ordered against its A-End product
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VxcOrder {
    pub product_uid: String,
    pub associated_vxcs: Vec<VxcOrderDetails>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VxcOrderDetails {
    pub product_name: String,
    pub rate_limit: i64,
    #[serde(rename = "term")]
    pub contract_term_months: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_centre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promo_code: Option<String>,
    pub a_end: VxcEndOrder,
    pub b_end: VxcEndOrder,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VxcEndOrder {
    /// Only set on the B-End; the A-End is the order's top-level product
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner_vlan: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_config: Option<PartnerConfig>,
}

/// Cloud-side settings for a VXC whose B-End is a partner port
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "connectType")]
pub enum PartnerConfig {
    #[serde(rename = "AWS")]
    Aws(AwsPartnerConfig),
    /// AWS hosted connection rather than a hosted VIF
    #[serde(rename = "AWSHC")]
    AwsHosted(AwsPartnerConfig),
    #[serde(rename = "AZURE")]
    Azure {
        #[serde(rename = "serviceKey")]
        service_key: String,
    },
    #[serde(rename = "GOOGLE")]
    Google {
        #[serde(rename = "pairingKey")]
        pairing_key: String,
    },
    #[serde(rename = "ORACLE")]
    Oracle {
        #[serde(rename = "virtualCircuitId")]
        virtual_circuit_id: String,
    },
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AwsPartnerConfig {
    /// "private" or "public" virtual interface
    #[serde(rename = "type")]
    pub interface_type: String,
    pub owner_account: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asn: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amazon_asn: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefixes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amazon_ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderedProduct {
    #[serde(alias = "vxcJTechnicalServiceUid")]
    technical_service_uid: String,
}

pub struct OrdersApi<'a> {
    client: &'a Client,
}

impl<'a> OrdersApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// POST /v3/networkdesign/validate
    pub async fn validate<T: Serialize>(&self, items: &[T]) -> Result<(), ApiError> {
        self.client
            .post::<serde_json::Value, _>("/v3/networkdesign/validate", &items)
            .await
            .map(|_| ())
    }

    /// POST /v3/networkdesign/buy, returning the new product UIDs in order
    pub async fn buy<T: Serialize>(&self, items: &[T]) -> Result<Vec<String>, ApiError> {
        let ordered: Vec<OrderedProduct> =
            self.client.post("/v3/networkdesign/buy", &items).await?;
        Ok(ordered
            .into_iter()
            .map(|p| p.technical_service_uid)
            .collect())
    }

    /// Validates then buys a single product and returns its UID
    pub async fn place<T: Serialize>(&self, item: T) -> Result<String, ApiError> {
        let items = [item];
        self.validate(&items).await?;
        let uids = self.buy(&items).await?;
        uids.into_iter()
            .next()
            .ok_or_else(|| ApiError::Parse("order returned no product".to_string()))
    }
}
