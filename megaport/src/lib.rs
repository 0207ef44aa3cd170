pub mod api;
pub mod data_sources;
pub mod filter;
pub mod provider_data;
pub mod resources;
pub mod values;

use api::products::ProvisioningWait;
use api::{Client, ClientConfig, Environment};
use async_trait::async_trait;
use data_sources::{mcrs, mves, ports};
use provider_data::MegaportProviderData;
use std::collections::HashMap;
use std::sync::OnceLock;
use tfplug::context::Context;
use tfplug::data_source::DataSource;
use tfplug::provider::{ConfigureProviderRequest, ConfigureProviderResponse, Provider};
use tfplug::resource::Resource;
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::{NumberRangeValidator, StringOneOfValidator};

pub const DEFAULT_WAIT_MINUTES: u64 = 10;

pub struct MegaportProvider {
    provider_data: Option<MegaportProviderData>,
}

impl Default for MegaportProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MegaportProvider {
    pub fn new() -> Self {
        Self {
            provider_data: None,
        }
    }

    fn provider_data(&self) -> tfplug::Result<MegaportProviderData> {
        self.provider_data
            .clone()
            .ok_or(tfplug::TfplugError::ProviderNotConfigured)
    }
}

/// A provider block value, falling back to its environment variable
fn setting(config: &DynamicValue, name: &str, env: &str) -> Option<String> {
    match config.get(&AttributePath::new(name)) {
        Some(Dynamic::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Dynamic::Bool(b)) => Some(b.to_string()),
        Some(Dynamic::Number(n)) => Some(n.to_string()),
        _ => std::env::var(env).ok().filter(|v| !v.is_empty()),
    }
}

fn invalid_setting(name: &str, env: &str, detail: String) -> Diagnostic {
    Diagnostic::error(format!("Invalid {}", name), format!("{} ({}): {}", name, env, detail))
        .with_attribute(AttributePath::new(name))
}

#[async_trait]
impl Provider for MegaportProvider {
    fn type_name(&self) -> &str {
        "megaport"
    }

    fn schema(&self) -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Manages Megaport ports, cloud routers, virtual cross connects and users")
            .attribute(
                AttributeBuilder::new("environment", AttributeType::String)
                    .description("production, staging or development (MEGAPORT_ENVIRONMENT)")
                    .optional()
                    .validator(Box::new(StringOneOfValidator::new([
                        "production",
                        "staging",
                        "development",
                    ])))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("access_key", AttributeType::String)
                    .description("API access key (MEGAPORT_ACCESS_KEY)")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("secret_key", AttributeType::String)
                    .description("API secret key (MEGAPORT_SECRET_KEY)")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("accept_purchase_terms", AttributeType::Bool)
                    .description(
                        "Accept Megaport's purchase terms; required to order products \
                         (MEGAPORT_ACCEPT_PURCHASE_TERMS)",
                    )
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("api_endpoint", AttributeType::String)
                    .description("Overrides the environment's API URL (MEGAPORT_API_ENDPOINT)")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("auth_endpoint", AttributeType::String)
                    .description("Overrides the environment's token URL (MEGAPORT_AUTH_ENDPOINT)")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("wait_time", AttributeType::Number)
                    .description("Minutes to wait for products to provision (MEGAPORT_WAIT_TIME)")
                    .optional()
                    .validator(Box::new(NumberRangeValidator::at_least(1.0)))
                    .build(),
            )
            .build()
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        let config = &request.config;
        let mut diagnostics = Vec::new();

        let environment = match setting(config, "environment", "MEGAPORT_ENVIRONMENT")
            .unwrap_or_else(|| "production".to_string())
            .parse::<Environment>()
        {
            Ok(environment) => Some(environment),
            Err(e) => {
                diagnostics.push(invalid_setting("environment", "MEGAPORT_ENVIRONMENT", e));
                None
            }
        };

        let mut credential = |name: &str, env: &str| {
            let value = setting(config, name, env);
            if value.is_none() {
                diagnostics.push(
                    Diagnostic::error(
                        format!("Missing {}", name),
                        format!("Set {} in the provider block or the {} environment variable", name, env),
                    )
                    .with_attribute(AttributePath::new(name)),
                );
            }
            value
        };
        let access_key = credential("access_key", "MEGAPORT_ACCESS_KEY");
        let secret_key = credential("secret_key", "MEGAPORT_SECRET_KEY");

        let accept_purchase_terms = match setting(
            config,
            "accept_purchase_terms",
            "MEGAPORT_ACCEPT_PURCHASE_TERMS",
        ) {
            None => false,
            Some(value) => match value.to_ascii_lowercase().parse::<bool>() {
                Ok(accepted) => accepted,
                Err(_) => {
                    diagnostics.push(invalid_setting(
                        "accept_purchase_terms",
                        "MEGAPORT_ACCEPT_PURCHASE_TERMS",
                        format!("expected true or false, got \"{}\"", value),
                    ));
                    false
                }
            },
        };

        let wait_minutes = match setting(config, "wait_time", "MEGAPORT_WAIT_TIME") {
            None => DEFAULT_WAIT_MINUTES,
            Some(value) => match value.parse::<f64>() {
                Ok(minutes) if minutes >= 1.0 && minutes.fract() == 0.0 => minutes as u64,
                _ => {
                    diagnostics.push(invalid_setting(
                        "wait_time",
                        "MEGAPORT_WAIT_TIME",
                        format!("expected a whole number of minutes, got \"{}\"", value),
                    ));
                    DEFAULT_WAIT_MINUTES
                }
            },
        };

        let (Some(environment), Some(access_key), Some(secret_key)) =
            (environment, access_key, secret_key)
        else {
            return ConfigureProviderResponse { diagnostics };
        };
        if tfplug::types::has_errors(&diagnostics) {
            return ConfigureProviderResponse { diagnostics };
        }

        let mut client_config = ClientConfig::new(environment, &access_key, &secret_key);
        if let Some(endpoint) = setting(config, "api_endpoint", "MEGAPORT_API_ENDPOINT") {
            client_config = client_config.with_api_endpoint(&endpoint);
        }
        if let Some(endpoint) = setting(config, "auth_endpoint", "MEGAPORT_AUTH_ENDPOINT") {
            client_config = client_config.with_auth_endpoint(&endpoint);
        }

        match Client::new(client_config) {
            Ok(client) => {
                tracing::info!(
                    "Configured Megaport provider for {:?} at {}",
                    environment,
                    client.base_url()
                );
                if !accept_purchase_terms {
                    tracing::debug!("Purchase terms not accepted, orders will be refused");
                }
                self.provider_data = Some(MegaportProviderData::new(
                    client,
                    accept_purchase_terms,
                    ProvisioningWait::minutes(wait_minutes),
                ));
            }
            Err(e) => diagnostics.push(Diagnostic::error(
                "Failed to create API client",
                e.to_string(),
            )),
        }

        ConfigureProviderResponse { diagnostics }
    }

    async fn resource_schemas(&self) -> HashMap<String, Schema> {
        static SCHEMAS: OnceLock<HashMap<String, Schema>> = OnceLock::new();

        SCHEMAS
            .get_or_init(|| {
                HashMap::from([
                    (
                        resources::port::TYPE_NAME.to_string(),
                        resources::PortResource::schema(),
                    ),
                    (
                        resources::mcr::TYPE_NAME.to_string(),
                        resources::McrResource::schema(),
                    ),
                    (
                        resources::vxc::TYPE_NAME.to_string(),
                        resources::VxcResource::schema(),
                    ),
                    (
                        resources::user::TYPE_NAME.to_string(),
                        resources::UserResource::schema(),
                    ),
                ])
            })
            .clone()
    }

    async fn data_source_schemas(&self) -> HashMap<String, Schema> {
        static SCHEMAS: OnceLock<HashMap<String, Schema>> = OnceLock::new();

        SCHEMAS
            .get_or_init(|| {
                HashMap::from([
                    (
                        data_sources::location::TYPE_NAME.to_string(),
                        data_sources::LocationDataSource::schema(),
                    ),
                    (
                        data_sources::partner_port::TYPE_NAME.to_string(),
                        data_sources::PartnerPortDataSource::schema(),
                    ),
                    (
                        data_sources::cloud_port_lookup::TYPE_NAME.to_string(),
                        data_sources::CloudPortLookupDataSource::schema(),
                    ),
                    (ports::TYPE_NAME.to_string(), ports::PORTS.schema()),
                    (mcrs::TYPE_NAME.to_string(), mcrs::MCRS.schema()),
                    (mves::TYPE_NAME.to_string(), mves::MVES.schema()),
                ])
            })
            .clone()
    }

    async fn create_resource(&self, name: &str) -> tfplug::Result<Box<dyn Resource>> {
        let data = self.provider_data()?;

        match name {
            resources::port::TYPE_NAME => Ok(Box::new(resources::PortResource::new(data))),
            resources::mcr::TYPE_NAME => Ok(Box::new(resources::McrResource::new(data))),
            resources::vxc::TYPE_NAME => Ok(Box::new(resources::VxcResource::new(data))),
            resources::user::TYPE_NAME => Ok(Box::new(resources::UserResource::new(data))),
            _ => Err(format!("Unknown resource: {}", name).into()),
        }
    }

    async fn create_data_source(&self, name: &str) -> tfplug::Result<Box<dyn DataSource>> {
        let data = self.provider_data()?;

        match name {
            data_sources::location::TYPE_NAME => {
                Ok(Box::new(data_sources::LocationDataSource::new(data)))
            }
            data_sources::partner_port::TYPE_NAME => {
                Ok(Box::new(data_sources::PartnerPortDataSource::new(data)))
            }
            data_sources::cloud_port_lookup::TYPE_NAME => {
                Ok(Box::new(data_sources::CloudPortLookupDataSource::new(data)))
            }
            ports::TYPE_NAME => Ok(Box::new(data_sources::ProductListDataSource::new(
                data,
                &ports::PORTS,
            ))),
            mcrs::TYPE_NAME => Ok(Box::new(data_sources::ProductListDataSource::new(
                data,
                &mcrs::MCRS,
            ))),
            mves::TYPE_NAME => Ok(Box::new(data_sources::ProductListDataSource::new(
                data,
                &mves::MVES,
            ))),
            _ => Err(format!("Unknown data source: {}", name).into()),
        }
    }
}
