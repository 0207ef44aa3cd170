//! Shared engine behind the port, MCR and MVE list data sources
//!
//! Each listing declares its filter names, its output object type and how a
//! product becomes an output object. Reads then follow the same steps:
//! compile the filters, list products of one type, drop inactive ones unless
//! asked, apply attribute filters, fetch tags for the survivors when a tag
//! filter is set, and sort by name then UID.

use crate::api::products::{Product, ProductType};
use crate::api::ApiError;
use crate::filter::{sort_by_two_keys, FilterError, FilterField, FilterSet, FilterSpec, TagFilter};
use crate::provider_data::MegaportProviderData;
use crate::values::{api_diagnostic, read_string_list, read_string_map, string_list};
use async_trait::async_trait;
use futures::future::try_join_all;
use tfplug::context::Context;
use tfplug::data_source::{DataSource, ReadDataSourceRequest, ReadDataSourceResponse};
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, NestingMode, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

/// What distinguishes one product list data source from another
pub struct ProductListing {
    pub type_name: &'static str,
    pub description: &'static str,
    pub product_type: ProductType,
    pub filters: fn() -> Vec<FilterField<Product>>,
    pub object_fields: fn() -> Vec<(&'static str, AttributeType)>,
    pub to_object: fn(&Product) -> Dynamic,
}

impl ProductListing {
    pub fn schema(&self) -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description(self.description)
            .attribute(
                AttributeBuilder::new("tags", AttributeType::Map(Box::new(AttributeType::String)))
                    .description("Resource tags every result must carry; values may be globs")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("include_inactive", AttributeType::Bool)
                    .description("Include cancelled and decommissioned products")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("uids", AttributeType::List(Box::new(AttributeType::String)))
                    .description("UIDs of the matching products, sorted by name")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "products",
                    AttributeType::list_of_objects(&(self.object_fields)()),
                )
                .computed()
                .build(),
            )
            .block(
                NestedBlockBuilder::new("filter", NestingMode::List)
                    .description("A product matches when any value matches; all filters must match")
                    .attribute(
                        AttributeBuilder::new("name", AttributeType::String)
                            .description("Attribute to filter on")
                            .required()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new(
                            "values",
                            AttributeType::List(Box::new(AttributeType::String)),
                        )
                        .description("Accepted values; strings are glob patterns")
                        .required()
                        .build(),
                    )
                    .build(),
            )
            .build()
    }

    /// Matching products, already sorted
    pub async fn select(
        &self,
        provider_data: &MegaportProviderData,
        query: &ListQuery,
    ) -> Result<Vec<Product>, ListError> {
        let filters = FilterSet::compile(&(self.filters)(), &query.filters)?;
        let tag_filter = TagFilter::compile(&query.tags)?;

        let client = &provider_data.client;
        let mut candidates: Vec<Product> = client
            .products()
            .list(self.product_type)
            .await?
            .into_iter()
            .filter(|p| query.include_inactive || p.is_active())
            .filter(|p| filters.matches(p))
            .collect();

        if !tag_filter.is_empty() {
            tracing::debug!("Fetching tags for {} candidates", candidates.len());
            let tags_api = client.tags();
            let tags = try_join_all(candidates.iter().map(|p| tags_api.get(&p.product_uid))).await?;
            candidates = candidates
                .into_iter()
                .zip(tags)
                .filter(|(_, tags)| tag_filter.matches(tags))
                .map(|(product, _)| product)
                .collect();
        }

        sort_by_two_keys(
            &mut candidates,
            |p| p.product_name.clone(),
            |p| p.product_uid.clone(),
        );
        Ok(candidates)
    }
}

/// Inputs shared by the list data sources
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub filters: Vec<FilterSpec>,
    pub tags: std::collections::HashMap<String, String>,
    pub include_inactive: bool,
}

impl ListQuery {
    pub fn from_config(config: &DynamicValue) -> Self {
        let filters = config
            .get_list_opt(&AttributePath::new("filter"))
            .unwrap_or_default()
            .iter()
            .filter_map(Dynamic::as_map)
            .map(|block| FilterSpec {
                name: block
                    .get("name")
                    .and_then(Dynamic::as_string)
                    .unwrap_or_default()
                    .to_string(),
                values: block.get("values").map(read_string_list).unwrap_or_default(),
            })
            .collect();

        Self {
            filters,
            tags: read_string_map(config, &AttributePath::new("tags")),
            include_inactive: config
                .get_bool_opt(&AttributePath::new("include_inactive"))
                .unwrap_or(false),
        }
    }
}

#[derive(Debug)]
pub enum ListError {
    Filter(FilterError),
    Api(ApiError),
}

impl From<FilterError> for ListError {
    fn from(e: FilterError) -> Self {
        ListError::Filter(e)
    }
}

impl From<ApiError> for ListError {
    fn from(e: ApiError) -> Self {
        ListError::Api(e)
    }
}

pub struct ProductListDataSource {
    provider_data: MegaportProviderData,
    listing: &'static ProductListing,
}

impl ProductListDataSource {
    pub fn new(provider_data: MegaportProviderData, listing: &'static ProductListing) -> Self {
        Self {
            provider_data,
            listing,
        }
    }
}

#[async_trait]
impl DataSource for ProductListDataSource {
    fn type_name(&self) -> &str {
        self.listing.type_name
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let query = ListQuery::from_config(&request.config);

        let products = match self.listing.select(&self.provider_data, &query).await {
            Ok(products) => products,
            Err(ListError::Filter(e)) => {
                return ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics: vec![Diagnostic::error("Invalid filter", e.to_string())
                        .with_attribute(AttributePath::new("filter"))],
                }
            }
            Err(ListError::Api(e)) => {
                return ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics: vec![api_diagnostic("Failed to list products", &e)],
                }
            }
        };
        tracing::debug!("{} matched {} products", self.listing.type_name, products.len());

        let uids: Vec<&str> = products.iter().map(|p| p.product_uid.as_str()).collect();
        let mut state = request.config;
        let _ = state.set_value(&AttributePath::new("uids"), string_list(&uids));
        let _ = state.set_list(
            &AttributePath::new("products"),
            products.iter().map(self.listing.to_object).collect(),
        );

        ReadDataSourceResponse {
            state,
            diagnostics: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_sources::ports::PORTS;

    fn filter_block(name: &str, values: &[&str]) -> Dynamic {
        crate::values::object([
            ("name", Dynamic::from(name)),
            ("values", string_list(values)),
        ])
    }

    #[test]
    fn query_reads_filters_tags_and_flags() {
        let mut config = PORTS.schema().conform(&DynamicValue::object());
        config
            .set_list(
                &AttributePath::new("filter"),
                vec![filter_block("name", &["syd-*", "mel-*"])],
            )
            .unwrap();
        config
            .set_map(
                &AttributePath::new("tags"),
                [("env".to_string(), Dynamic::from("prod"))].into(),
            )
            .unwrap();
        config
            .set_bool(&AttributePath::new("include_inactive"), true)
            .unwrap();

        let query = ListQuery::from_config(&config);
        assert_eq!(
            query.filters,
            vec![FilterSpec {
                name: "name".into(),
                values: vec!["syd-*".into(), "mel-*".into()],
            }]
        );
        assert_eq!(query.tags.get("env").map(String::as_str), Some("prod"));
        assert!(query.include_inactive);
    }

    #[test]
    fn empty_config_reads_as_match_all() {
        let config = PORTS.schema().conform(&DynamicValue::object());
        assert_eq!(ListQuery::from_config(&config), ListQuery::default());
    }
}
