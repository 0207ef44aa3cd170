//! Resource tags on products

use super::common::ResourceTag;
use super::{ApiError, Client};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceTags {
    #[serde(default)]
    resource_tags: Vec<ResourceTag>,
}

pub struct TagsApi<'a> {
    client: &'a Client,
}

impl<'a> TagsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /v2/product/{uid}/tags
    pub async fn get(&self, uid: &str) -> Result<HashMap<String, String>, ApiError> {
        let tags: Option<ResourceTags> = self
            .client
            .get(&format!("/v2/product/{}/tags", uid))
            .await?;

        Ok(tags
            .unwrap_or_default()
            .resource_tags
            .into_iter()
            .map(|t| (t.key, t.value))
            .collect())
    }

    /// PUT /v2/product/{uid}/tags, replacing every tag on the product
    pub async fn replace(&self, uid: &str, tags: &HashMap<String, String>) -> Result<(), ApiError> {
        let mut resource_tags: Vec<ResourceTag> = tags
            .iter()
            .map(|(key, value)| ResourceTag {
                key: key.clone(),
                value: value.clone(),
            })
            .collect();
        resource_tags.sort_by(|a, b| a.key.cmp(&b.key));

        self.client
            .put::<serde_json::Value, _>(
                &format!("/v2/product/{}/tags", uid),
                &ResourceTags { resource_tags },
            )
            .await
            .map(|_| ())
    }
}
