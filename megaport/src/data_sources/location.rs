//! Location data source implementation

use crate::api::locations::{Location, LocationQuery};
use crate::provider_data::MegaportProviderData;
use crate::values::{api_diagnostic, string_or_null};
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{DataSource, ReadDataSourceRequest, ReadDataSourceResponse};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Dynamic, DynamicValue};
use tfplug::validator::ExactlyOneOf;

pub const TYPE_NAME: &str = "megaport_location";

pub struct LocationDataSource {
    provider_data: MegaportProviderData,
}

impl LocationDataSource {
    pub fn new(provider_data: MegaportProviderData) -> Self {
        Self { provider_data }
    }

    pub fn schema() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Looks up a Megaport data center location by id, name or site code")
            .attribute(
                AttributeBuilder::new("id", AttributeType::Number)
                    .description("Location id")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Exact location name")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("site_code", AttributeType::String)
                    .description("Site code, matched case-insensitively")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("country", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("metro", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("market", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("latitude", AttributeType::Number)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("longitude", AttributeType::Number)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("mcr_available", AttributeType::Bool)
                    .description("Whether MCRs can be ordered here")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("mve_available", AttributeType::Bool)
                    .description("Whether MVEs can be ordered here")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "port_speeds",
                    AttributeType::List(Box::new(AttributeType::Number)),
                )
                .description("Port speeds in Mbps available at this location")
                .computed()
                .build(),
            )
            .config_validator(Box::new(ExactlyOneOf::new(&["id", "name", "site_code"])))
            .build()
    }

    fn query(config: &DynamicValue) -> Option<LocationQuery> {
        if let Some(id) = config.get_i64_opt(&AttributePath::new("id")) {
            return Some(LocationQuery::Id(id));
        }
        if let Some(name) = config.get_string_opt(&AttributePath::new("name")) {
            return Some(LocationQuery::Name(name));
        }
        config
            .get_string_opt(&AttributePath::new("site_code"))
            .map(LocationQuery::SiteCode)
    }
}

fn location_state(location: &Location) -> DynamicValue {
    let mut state = DynamicValue::object();
    let _ = state.set_number(&AttributePath::new("id"), location.id as f64);
    let _ = state.set_string(&AttributePath::new("name"), location.name.clone());
    let _ = state.set_value(
        &AttributePath::new("site_code"),
        string_or_null(&location.site_code),
    );
    let _ = state.set_string(&AttributePath::new("country"), location.country.clone());
    let _ = state.set_string(&AttributePath::new("metro"), location.metro.clone());
    let _ = state.set_string(&AttributePath::new("market"), location.market.clone());
    let _ = state.set_string(&AttributePath::new("status"), location.status.clone());
    let _ = state.set_number(&AttributePath::new("latitude"), location.latitude);
    let _ = state.set_number(&AttributePath::new("longitude"), location.longitude);
    let _ = state.set_bool(
        &AttributePath::new("mcr_available"),
        location.mcr_available(),
    );
    let _ = state.set_bool(
        &AttributePath::new("mve_available"),
        location.mve_available(),
    );

    let mut speeds = location.products.megaport.clone();
    speeds.sort_unstable();
    speeds.dedup();
    let _ = state.set_list(
        &AttributePath::new("port_speeds"),
        speeds.into_iter().map(Dynamic::from).collect(),
    );
    state
}

#[async_trait]
impl DataSource for LocationDataSource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let Some(query) = Self::query(&request.config) else {
            return ReadDataSourceResponse::error(
                "Invalid location query",
                "One of id, name or site_code must be set",
            );
        };

        tracing::debug!("Looking up {}", query);

        match self.provider_data.client.locations().find(&query).await {
            Ok(location) => ReadDataSourceResponse {
                state: location_state(&location),
                diagnostics: vec![],
            },
            Err(e) if e.is_not_found() => ReadDataSourceResponse::error(
                "Location not found",
                format!("No {} exists", query),
            ),
            Err(e) => ReadDataSourceResponse {
                state: DynamicValue::null(),
                diagnostics: vec![api_diagnostic("Failed to list locations", &e)],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::{create_test_provider_data, mock_token};
    use mockito::Server;

    const LOCATIONS: &str = r#"{"message":"ok","data":[
        {"id":2,"name":"Equinix SY1","country":"Australia","metro":"Sydney",
         "siteCode":"sy1","market":"AU","status":"Active","latitude":-33.92,
         "longitude":151.19,"products":{"mcr":true,"megaport":[10000,1000,10000],"mve":[{"sizes":["SMALL"]}]}},
        {"id":3,"name":"Global Switch Sydney","country":"Australia","metro":"Sydney",
         "siteCode":"gs-syd","market":"AU","status":"Active","products":{}}
    ]}"#;

    fn config(name: &str, value: Dynamic) -> DynamicValue {
        let mut config = LocationDataSource::schema().conform(&DynamicValue::object());
        config.set_value(&AttributePath::new(name), value).unwrap();
        config
    }

    #[test]
    fn schema_requires_exactly_one_lookup_key() {
        let schema = LocationDataSource::schema();

        let none = schema.conform(&DynamicValue::object());
        assert_eq!(schema.validate_config(&none).len(), 1);

        let mut both = config("id", Dynamic::from(2_i64));
        both.set_string(&AttributePath::new("name"), "Equinix SY1")
            .unwrap();
        assert_eq!(schema.validate_config(&both).len(), 1);

        assert!(schema
            .validate_config(&config("site_code", Dynamic::from("SY1")))
            .is_empty());
    }

    #[tokio::test]
    async fn read_by_site_code() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _locations = server
            .mock("GET", "/v2/locations")
            .with_body(LOCATIONS)
            .create_async()
            .await;

        let data_source = LocationDataSource::new(create_test_provider_data(&server.url()));
        let response = data_source
            .read(
                Context::new(),
                ReadDataSourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    config: config("site_code", Dynamic::from("SY1")),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        let state = response.state;
        assert_eq!(state.get_i64(&AttributePath::new("id")).unwrap(), 2);
        assert_eq!(
            state.get_string(&AttributePath::new("metro")).unwrap(),
            "Sydney"
        );
        assert!(state.get_bool(&AttributePath::new("mcr_available")).unwrap());
        assert!(state.get_bool(&AttributePath::new("mve_available")).unwrap());
        assert_eq!(
            state.get_list(&AttributePath::new("port_speeds")).unwrap(),
            vec![Dynamic::Number(1000.0), Dynamic::Number(10000.0)]
        );
    }

    #[tokio::test]
    async fn missing_location_is_an_error() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _locations = server
            .mock("GET", "/v2/locations")
            .with_body(LOCATIONS)
            .create_async()
            .await;

        let data_source = LocationDataSource::new(create_test_provider_data(&server.url()));
        let response = data_source
            .read(
                Context::new(),
                ReadDataSourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    config: config("id", Dynamic::from(99_i64)),
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Location not found");
        assert_eq!(response.diagnostics[0].detail, "No location with id 99 exists");
        assert!(response.state.is_null());
    }
}
