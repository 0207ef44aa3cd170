//! Products: ports, MCRs and MVEs share one listing and lifecycle surface

use super::common::{deserialize_epoch_millis, null_as_default};
use super::{ApiError, Client};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductType {
    Port,
    Mcr,
    Mve,
}

impl ProductType {
    /// Value of `productType` in API payloads
    pub fn api_name(&self) -> &'static str {
        match self {
            ProductType::Port => "MEGAPORT",
            ProductType::Mcr => "MCR2",
            ProductType::Mve => "MVE",
        }
    }

    /// Path segment used by the modify endpoint
    fn modify_segment(&self) -> &'static str {
        match self {
            ProductType::Port => "megaport",
            ProductType::Mcr => "mcr2",
            ProductType::Mve => "mve",
        }
    }

    pub fn matches(&self, product_type: &str) -> bool {
        product_type.eq_ignore_ascii_case(self.api_name())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub product_uid: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub product_type: String,
    #[serde(default)]
    pub provisioning_status: String,
    #[serde(default, deserialize_with = "deserialize_epoch_millis")]
    pub create_date: Option<String>,
    #[serde(default, deserialize_with = "deserialize_epoch_millis")]
    pub contract_end_date: Option<String>,
    #[serde(default)]
    pub port_speed: i64,
    #[serde(default)]
    pub location_id: i64,
    #[serde(default)]
    pub marketplace_visibility: bool,
    #[serde(default)]
    pub vxc_permitted: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cost_centre: String,
    #[serde(default)]
    pub contract_term_months: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub company_uid: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub diversity_zone: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub vendor: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mve_size: String,
    #[serde(default)]
    pub resources: ProductResources,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductResources {
    #[serde(default)]
    pub virtual_router: Option<VirtualRouter>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualRouter {
    #[serde(default)]
    pub mcr_asn: Option<i64>,
}

/// Statuses of products that are gone or going away
const INACTIVE_STATUSES: &[&str] = &["CANCELLED", "CANCELLED_PARENT", "DECOMMISSIONED"];

/// Statuses at which an order counts as provisioned
const PROVISIONED_STATUSES: &[&str] = &["CONFIGURED", "LIVE"];

impl Product {
    pub fn is_active(&self) -> bool {
        is_active_status(&self.provisioning_status)
    }

    pub fn mcr_asn(&self) -> Option<i64> {
        self.resources
            .virtual_router
            .as_ref()
            .and_then(|r| r.mcr_asn)
    }
}

pub fn is_active_status(status: &str) -> bool {
    !INACTIVE_STATUSES.contains(&status)
}

/// Fields that can change on a port or MCR without replacing it
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModifyProductRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_centre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marketplace_visibility: Option<bool>,
    #[serde(rename = "term", skip_serializing_if = "Option::is_none")]
    pub contract_term_months: Option<i64>,
}

/// How long and how often to poll a new order
#[derive(Debug, Clone, Copy)]
pub struct ProvisioningWait {
    pub timeout: Duration,
    pub interval: Duration,
}

impl ProvisioningWait {
    pub fn minutes(minutes: u64) -> Self {
        Self {
            timeout: Duration::from_secs(minutes * 60),
            interval: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProvisioningState {
    #[serde(default)]
    provisioning_status: String,
}

pub struct ProductsApi<'a> {
    client: &'a Client,
}

impl<'a> ProductsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /v2/products, narrowed to one product type
    pub async fn list(&self, product_type: ProductType) -> Result<Vec<Product>, ApiError> {
        let products: Vec<Product> = self.client.get("/v2/products").await?;
        Ok(products
            .into_iter()
            .filter(|p| product_type.matches(&p.product_type))
            .collect())
    }

    /// GET /v2/product/{uid}
    pub async fn get(&self, uid: &str) -> Result<Product, ApiError> {
        self.client.get(&format!("/v2/product/{}", uid)).await
    }

    /// PUT /v2/product/{type}/{uid}
    pub async fn modify(
        &self,
        product_type: ProductType,
        uid: &str,
        request: &ModifyProductRequest,
    ) -> Result<(), ApiError> {
        let path = format!("/v2/product/{}/{}", product_type.modify_segment(), uid);
        self.client
            .put::<serde_json::Value, _>(&path, request)
            .await
            .map(|_| ())
    }

    /// POST /v3/product/{uid}/action/CANCEL_NOW
    pub async fn cancel(&self, uid: &str) -> Result<(), ApiError> {
        let path = format!("/v3/product/{}/action/CANCEL_NOW", uid);
        self.client
            .post::<serde_json::Value, _>(&path, &serde_json::json!({}))
            .await
            .map(|_| ())
    }

    /// Polls until the product reaches CONFIGURED or LIVE
    pub async fn wait_for_provisioning(
        &self,
        uid: &str,
        wait: ProvisioningWait,
    ) -> Result<String, ApiError> {
        let started = Instant::now();
        loop {
            let state: ProvisioningState =
                self.client.get(&format!("/v2/product/{}", uid)).await?;
            let status = state.provisioning_status;

            if PROVISIONED_STATUSES.contains(&status.as_str()) {
                tracing::info!("Product {} is {}", uid, status);
                return Ok(status);
            }
            if !is_active_status(&status) {
                return Err(ApiError::Provisioning(format!(
                    "product {} entered status {}",
                    uid, status
                )));
            }
            if started.elapsed() >= wait.timeout {
                return Err(ApiError::Timeout(wait.timeout.as_secs()));
            }

            tracing::debug!("Product {} is {}, waiting", uid, status);
            tokio::time::sleep(wait.interval).await;
        }
    }
}
