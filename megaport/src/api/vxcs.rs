//! Virtual cross connects

use super::common::{deserialize_epoch_millis, null_as_default};
use super::{ApiError, Client};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vxc {
    pub product_uid: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub rate_limit: i64,
    #[serde(default)]
    pub provisioning_status: String,
    #[serde(default)]
    pub contract_term_months: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cost_centre: String,
    #[serde(default, deserialize_with = "deserialize_epoch_millis")]
    pub create_date: Option<String>,
    #[serde(default)]
    pub a_end: VxcEnd,
    #[serde(default)]
    pub b_end: VxcEnd,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VxcEnd {
    #[serde(default, deserialize_with = "null_as_default")]
    pub product_uid: String,
    #[serde(default)]
    pub vlan: Option<i64>,
    #[serde(default)]
    pub inner_vlan: Option<i64>,
    #[serde(default)]
    pub location_id: i64,
}

/// Body of PUT /v3/product/vxc/{uid}; unset fields stay as they are
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVxcRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_centre: Option<String>,
    #[serde(rename = "term", skip_serializing_if = "Option::is_none")]
    pub contract_term_months: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub a_end_vlan: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b_end_vlan: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub a_end_inner_vlan: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b_end_inner_vlan: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub a_end_product_uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b_end_product_uid: Option<String>,
}

impl UpdateVxcRequest {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

pub struct VxcsApi<'a> {
    client: &'a Client,
}

impl<'a> VxcsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /v2/product/{uid}
    pub async fn get(&self, uid: &str) -> Result<Vxc, ApiError> {
        self.client.get(&format!("/v2/product/{}", uid)).await
    }

    /// PUT /v3/product/vxc/{uid}
    pub async fn update(&self, uid: &str, request: &UpdateVxcRequest) -> Result<(), ApiError> {
        self.client
            .put::<serde_json::Value, _>(&format!("/v3/product/vxc/{}", uid), request)
            .await
            .map(|_| ())
    }
}
