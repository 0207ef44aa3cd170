//! Partner port data source implementation
//!
//! Resolves exactly one partner (cloud provider) port. Candidates are the
//! VXC-permitted partner ports; each configured attribute narrows them in a
//! fixed order so a failed lookup can name the attribute that emptied the
//! candidate list.

use crate::api::partners::PartnerPort;
use crate::filter::{narrow_to_one, Criterion};
use crate::provider_data::MegaportProviderData;
use crate::values::{api_diagnostic, string_or_null};
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{DataSource, ReadDataSourceRequest, ReadDataSourceResponse};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

pub const TYPE_NAME: &str = "megaport_partner";

pub struct PartnerPortDataSource {
    provider_data: MegaportProviderData,
}

/// Lookup criteria as configured
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartnerQuery {
    pub connect_type: String,
    pub company_name: Option<String>,
    pub product_name: Option<String>,
    pub diversity_zone: Option<String>,
    pub location_id: Option<i64>,
}

impl PartnerQuery {
    fn from_config(config: &DynamicValue) -> Result<Self, Diagnostic> {
        let connect_type = config
            .get_string(&AttributePath::new("connect_type"))
            .map_err(|_| {
                Diagnostic::error("Missing connect_type", "The 'connect_type' attribute is required")
                    .with_attribute(AttributePath::new("connect_type"))
            })?;

        Ok(Self {
            connect_type,
            company_name: config.get_string_opt(&AttributePath::new("company_name")),
            product_name: config.get_string_opt(&AttributePath::new("product_name")),
            diversity_zone: config.get_string_opt(&AttributePath::new("diversity_zone")),
            location_id: config.get_i64_opt(&AttributePath::new("location_id")),
        })
    }

    fn criteria(&self) -> Vec<Criterion<'_, PartnerPort>> {
        let mut criteria = vec![Criterion::new(
            "connect_type",
            &self.connect_type,
            |p: &PartnerPort| p.connect_type.eq_ignore_ascii_case(&self.connect_type),
        )];
        if let Some(company_name) = &self.company_name {
            criteria.push(Criterion::new(
                "company_name",
                company_name,
                move |p: &PartnerPort| p.company_name == *company_name,
            ));
        }
        if let Some(product_name) = &self.product_name {
            criteria.push(Criterion::new(
                "product_name",
                product_name,
                move |p: &PartnerPort| p.product_name == *product_name,
            ));
        }
        if let Some(diversity_zone) = &self.diversity_zone {
            criteria.push(Criterion::new(
                "diversity_zone",
                diversity_zone,
                move |p: &PartnerPort| p.diversity_zone == *diversity_zone,
            ));
        }
        if let Some(location_id) = self.location_id {
            criteria.push(Criterion::new(
                "location_id",
                location_id,
                move |p: &PartnerPort| p.location_id == location_id,
            ));
        }
        criteria
    }

    /// Narrows VXC-permitted ports down to the single match
    pub fn resolve(&self, ports: Vec<PartnerPort>) -> Result<PartnerPort, crate::filter::FilterError> {
        let candidates: Vec<PartnerPort> = ports.into_iter().filter(|p| p.vxc_permitted).collect();
        narrow_to_one("partner ports", candidates, &self.criteria())
    }
}

impl PartnerPortDataSource {
    pub fn new(provider_data: MegaportProviderData) -> Self {
        Self { provider_data }
    }

    pub fn schema() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Resolves a single partner port, e.g. an AWS or Azure on-ramp")
            .attribute(
                AttributeBuilder::new("connect_type", AttributeType::String)
                    .description("Partner connect type, e.g. AWS, AWSHC, AZURE, GOOGLE, ORACLE")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("company_name", AttributeType::String)
                    .description("Exact company name of the partner")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("product_name", AttributeType::String)
                    .description("Exact partner port name")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("diversity_zone", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("location_id", AttributeType::Number)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("product_uid", AttributeType::String)
                    .description("UID of the matched partner port")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("company_uid", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("speed", AttributeType::Number)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("rank", AttributeType::Number)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vxc_permitted", AttributeType::Bool)
                    .computed()
                    .build(),
            )
            .build()
    }
}

#[async_trait]
impl DataSource for PartnerPortDataSource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let query = match PartnerQuery::from_config(&request.config) {
            Ok(query) => query,
            Err(diagnostic) => {
                return ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics: vec![diagnostic],
                }
            }
        };

        let ports = match self.provider_data.client.partners().list().await {
            Ok(ports) => ports,
            Err(e) => {
                return ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics: vec![api_diagnostic("Failed to list partner ports", &e)],
                }
            }
        };
        tracing::debug!("Resolving {:?} among {} partner ports", query, ports.len());

        let port = match query.resolve(ports) {
            Ok(port) => port,
            Err(e) => return ReadDataSourceResponse::error("No unique partner port", e.to_string()),
        };

        let mut state = request.config;
        let _ = state.set_string(&AttributePath::new("product_uid"), port.product_uid);
        let _ = state.set_string(&AttributePath::new("product_name"), port.product_name);
        let _ = state.set_value(
            &AttributePath::new("company_uid"),
            string_or_null(&port.company_uid),
        );
        let _ = state.set_value(&AttributePath::new("speed"), Dynamic::from(port.speed));
        let _ = state.set_value(&AttributePath::new("rank"), Dynamic::from(port.rank));
        let _ = state.set_bool(&AttributePath::new("vxc_permitted"), port.vxc_permitted);

        ReadDataSourceResponse {
            state,
            diagnostics: vec![],
        }
    }
}
