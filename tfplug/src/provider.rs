//! Provider trait and related types

use crate::context::Context;
use crate::data_source::DataSource;
use crate::resource::Resource;
use crate::schema::Schema;
use crate::types::{Diagnostic, DynamicValue};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// A provider owns configuration (API clients, credentials) and hands out
/// resource and data source instances on demand.
///
/// Schemas must be available before `configure` runs: Terraform asks for them
/// and validates configs first. The factories, on the other hand, should fail
/// until the provider has been configured.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider type name, e.g. "example"
    fn type_name(&self) -> &str;

    /// Schema of the `provider` block
    fn schema(&self) -> Schema;

    /// Called once with the decoded provider block
    async fn configure(
        &mut self,
        ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse;

    /// Resource schemas keyed by type name - cache these in your implementation
    async fn resource_schemas(&self) -> HashMap<String, Schema>;

    /// Data source schemas keyed by type name - cache these in your implementation
    async fn data_source_schemas(&self) -> HashMap<String, Schema>;

    /// Builds a resource bound to the configured client
    async fn create_resource(&self, name: &str) -> Result<Box<dyn Resource>>;

    /// Builds a data source bound to the configured client
    async fn create_data_source(&self, name: &str) -> Result<Box<dyn DataSource>>;
}

pub struct ConfigureProviderRequest {
    pub terraform_version: String,
    pub config: DynamicValue,
}

#[derive(Default)]
pub struct ConfigureProviderResponse {
    pub diagnostics: Vec<Diagnostic>,
}
