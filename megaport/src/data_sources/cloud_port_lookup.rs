//! Cloud port lookup data source implementation
//!
//! Lists every partner port of one cloud provider that matches the optional
//! criteria, unlike `megaport_partner` which insists on a single match.

use crate::api::partners::{PartnerPort, SecureProvider};
use crate::api::ApiError;
use crate::filter::sort_by_two_keys;
use crate::provider_data::MegaportProviderData;
use crate::values::{api_diagnostic, object, string_or_null};
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{DataSource, ReadDataSourceRequest, ReadDataSourceResponse};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::StringOneOfValidator;

pub const TYPE_NAME: &str = "megaport_cloud_port_lookup";

pub const CLOUD_PROVIDERS: &[&str] = &["AWS", "AWSHC", "AZURE", "GOOGLE", "ORACLE", "IBM"];

pub struct CloudPortLookupDataSource {
    provider_data: MegaportProviderData,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CloudPortQuery {
    pub cloud_provider: String,
    pub location_id: Option<i64>,
    pub company_name: Option<String>,
    pub diversity_zone: Option<String>,
    pub vxc_permitted: bool,
    pub include_secure: bool,
    pub service_key: Option<String>,
}

impl CloudPortQuery {
    fn from_config(config: &DynamicValue) -> Result<Self, Diagnostic> {
        let cloud_provider = config
            .get_string(&AttributePath::new("cloud_provider"))
            .map_err(|_| {
                Diagnostic::error(
                    "Missing cloud_provider",
                    "The 'cloud_provider' attribute is required",
                )
                .with_attribute(AttributePath::new("cloud_provider"))
            })?;

        Ok(Self {
            cloud_provider,
            location_id: config.get_i64_opt(&AttributePath::new("location_id")),
            company_name: config.get_string_opt(&AttributePath::new("company_name")),
            diversity_zone: config.get_string_opt(&AttributePath::new("diversity_zone")),
            vxc_permitted: config
                .get_bool_opt(&AttributePath::new("vxc_permitted"))
                .unwrap_or(true),
            include_secure: config
                .get_bool_opt(&AttributePath::new("include_secure"))
                .unwrap_or(false),
            service_key: config
                .get_string_opt(&AttributePath::new("service_key"))
                .filter(|k| !k.is_empty()),
        })
    }

    /// The secure lookup to run, if a service key was given
    fn secure_lookup(&self) -> Result<Option<(SecureProvider, &str)>, Diagnostic> {
        let Some(key) = self.service_key.as_deref() else {
            return Ok(None);
        };
        match SecureProvider::from_connect_type(&self.cloud_provider) {
            Some(provider) => Ok(Some((provider, key))),
            None => Err(Diagnostic::error(
                "Service key not supported",
                format!(
                    "service_key can only be used with AZURE, GOOGLE or ORACLE, not {}",
                    self.cloud_provider
                ),
            )
            .with_attribute(AttributePath::new("service_key"))),
        }
    }

    fn matches(&self, port: &PartnerPort) -> bool {
        port.connect_type.eq_ignore_ascii_case(&self.cloud_provider)
            && port.vxc_permitted == self.vxc_permitted
            && self.location_id.is_none_or(|id| port.location_id == id)
            && self
                .company_name
                .as_ref()
                .is_none_or(|name| port.company_name == *name)
            && self
                .diversity_zone
                .as_ref()
                .is_none_or(|zone| port.diversity_zone == *zone)
    }

    /// Filters and orders ports by location then name
    pub fn select(&self, ports: Vec<PartnerPort>) -> Vec<PartnerPort> {
        let mut selected: Vec<PartnerPort> = ports.into_iter().filter(|p| self.matches(p)).collect();
        sort_by_two_keys(
            &mut selected,
            |p| p.location_id,
            |p| p.product_name.clone(),
        );
        selected
    }
}

impl CloudPortLookupDataSource {
    pub fn new(provider_data: MegaportProviderData) -> Self {
        Self { provider_data }
    }

    fn port_type() -> AttributeType {
        AttributeType::list_of_objects(&[
            ("product_uid", AttributeType::String),
            ("product_name", AttributeType::String),
            ("connect_type", AttributeType::String),
            ("company_uid", AttributeType::String),
            ("company_name", AttributeType::String),
            ("location_id", AttributeType::Number),
            ("speed", AttributeType::Number),
            ("rank", AttributeType::Number),
            ("diversity_zone", AttributeType::String),
            ("vxc_permitted", AttributeType::Bool),
            ("secure", AttributeType::Bool),
        ])
    }

    pub fn schema() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Lists the partner ports of a cloud provider")
            .attribute(
                AttributeBuilder::new("cloud_provider", AttributeType::String)
                    .required()
                    .validator(Box::new(StringOneOfValidator::new(CLOUD_PROVIDERS.iter().copied())))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("location_id", AttributeType::Number)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("company_name", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("diversity_zone", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vxc_permitted", AttributeType::Bool)
                    .description("Only ports that do (or do not) accept VXCs; defaults to true")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("include_secure", AttributeType::Bool)
                    .description("With service_key, also return the public ports")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("service_key", AttributeType::String)
                    .description("Azure service key, Google pairing key or Oracle circuit id")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("ports", Self::port_type())
                    .computed()
                    .build(),
            )
            .build()
    }

    async fn fetch(&self, query: &CloudPortQuery) -> Result<Vec<PartnerPort>, LookupError> {
        let partners = self.provider_data.client.partners();
        let Some((provider, key)) = query.secure_lookup().map_err(LookupError::Config)? else {
            return partners.list().await.map_err(LookupError::Api);
        };

        let mut ports = partners
            .lookup_service_key(provider, key)
            .await
            .map_err(LookupError::Api)?;
        if query.include_secure {
            let public = partners.list().await.map_err(LookupError::Api)?;
            for port in public {
                if !ports.iter().any(|p| p.product_uid == port.product_uid) {
                    ports.push(port);
                }
            }
        }
        Ok(ports)
    }
}

enum LookupError {
    Config(Diagnostic),
    Api(ApiError),
}

fn port_object(port: &PartnerPort) -> Dynamic {
    object([
        ("product_uid", Dynamic::from(port.product_uid.as_str())),
        ("product_name", Dynamic::from(port.product_name.as_str())),
        ("connect_type", Dynamic::from(port.connect_type.as_str())),
        ("company_uid", string_or_null(&port.company_uid)),
        ("company_name", string_or_null(&port.company_name)),
        ("location_id", Dynamic::from(port.location_id)),
        ("speed", Dynamic::from(port.speed)),
        ("rank", Dynamic::from(port.rank)),
        ("diversity_zone", string_or_null(&port.diversity_zone)),
        ("vxc_permitted", Dynamic::from(port.vxc_permitted)),
        ("secure", Dynamic::from(port.secure)),
    ])
}

#[async_trait]
impl DataSource for CloudPortLookupDataSource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let query = match CloudPortQuery::from_config(&request.config) {
            Ok(query) => query,
            Err(diagnostic) => {
                return ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics: vec![diagnostic],
                }
            }
        };

        let ports = match self.fetch(&query).await {
            Ok(ports) => query.select(ports),
            Err(LookupError::Config(diagnostic)) => {
                return ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics: vec![diagnostic],
                }
            }
            Err(LookupError::Api(e)) => {
                return ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics: vec![api_diagnostic("Failed to look up cloud ports", &e)],
                }
            }
        };
        tracing::debug!("{} {} ports matched", ports.len(), query.cloud_provider);

        let mut state = request.config;
        let _ = state.set_list(
            &AttributePath::new("ports"),
            ports.iter().map(port_object).collect(),
        );

        ReadDataSourceResponse {
            state,
            diagnostics: vec![],
        }
    }
}
