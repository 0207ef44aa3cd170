//! `megaport_mcrs` list data source

use super::product_list::ProductListing;
use crate::api::products::{Product, ProductType};
use crate::filter::{FieldValue, FilterField};
use crate::values::{object, string_or_null};
use tfplug::schema::AttributeType;
use tfplug::types::Dynamic;

pub const TYPE_NAME: &str = "megaport_mcrs";

pub static MCRS: ProductListing = ProductListing {
    type_name: TYPE_NAME,
    description: "Lists the Megaport Cloud Routers in the account, optionally filtered",
    product_type: ProductType::Mcr,
    filters,
    object_fields,
    to_object,
};

fn filters() -> Vec<FilterField<Product>> {
    vec![
        FilterField::text("name", |p: &Product| FieldValue::text(&p.product_name)),
        FilterField::text("product-uid", |p: &Product| FieldValue::text(&p.product_uid)),
        FilterField::number("location-id", |p: &Product| FieldValue::Number(p.location_id)),
        FilterField::number("port-speed", |p: &Product| FieldValue::Number(p.port_speed)),
        FilterField::text("provisioning-status", |p: &Product| {
            FieldValue::text(&p.provisioning_status)
        }),
        FilterField::text("cost-centre", |p: &Product| FieldValue::text(&p.cost_centre)),
        FilterField::text("diversity-zone", |p: &Product| FieldValue::text(&p.diversity_zone)),
        FilterField::boolean("marketplace-visibility", |p: &Product| {
            FieldValue::Bool(p.marketplace_visibility)
        }),
        FilterField::text("company-uid", |p: &Product| FieldValue::text(&p.company_uid)),
        // MCRs without a router config never match an ASN
        FilterField::number("asn", |p: &Product| FieldValue::Number(p.mcr_asn().unwrap_or(-1))),
    ]
}

fn object_fields() -> Vec<(&'static str, AttributeType)> {
    vec![
        ("product_uid", AttributeType::String),
        ("product_name", AttributeType::String),
        ("provisioning_status", AttributeType::String),
        ("port_speed", AttributeType::Number),
        ("location_id", AttributeType::Number),
        ("marketplace_visibility", AttributeType::Bool),
        ("cost_centre", AttributeType::String),
        ("contract_term_months", AttributeType::Number),
        ("company_uid", AttributeType::String),
        ("diversity_zone", AttributeType::String),
        ("asn", AttributeType::Number),
        ("create_date", AttributeType::String),
        ("contract_end_date", AttributeType::String),
    ]
}

fn to_object(product: &Product) -> Dynamic {
    object([
        ("product_uid", Dynamic::from(product.product_uid.as_str())),
        ("product_name", Dynamic::from(product.product_name.as_str())),
        (
            "provisioning_status",
            Dynamic::from(product.provisioning_status.as_str()),
        ),
        ("port_speed", Dynamic::from(product.port_speed)),
        ("location_id", Dynamic::from(product.location_id)),
        (
            "marketplace_visibility",
            Dynamic::from(product.marketplace_visibility),
        ),
        ("cost_centre", string_or_null(&product.cost_centre)),
        (
            "contract_term_months",
            Dynamic::from(product.contract_term_months),
        ),
        ("company_uid", string_or_null(&product.company_uid)),
        ("diversity_zone", string_or_null(&product.diversity_zone)),
        ("asn", Dynamic::from(product.mcr_asn())),
        ("create_date", Dynamic::from(product.create_date.clone())),
        (
            "contract_end_date",
            Dynamic::from(product.contract_end_date.clone()),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::{create_test_provider_data, mock_token};
    use crate::data_sources::product_list::{ListError, ListQuery};
    use crate::filter::{FilterError, FilterSpec};
    use mockito::Server;

    #[tokio::test]
    async fn filters_on_asn() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _products = server
            .mock("GET", "/v2/products")
            .with_body(
                r#"{"message":"ok","data":[
                {"productUid":"mcr-1","productName":"edge","productType":"MCR2","provisioningStatus":"LIVE",
                 "resources":{"virtual_router":{"mcrAsn":133937}}},
                {"productUid":"mcr-2","productName":"core","productType":"MCR2","provisioningStatus":"LIVE",
                 "resources":{"virtual_router":{"mcrAsn":64512}}},
                {"productUid":"port-1","productName":"edge","productType":"MEGAPORT","provisioningStatus":"LIVE"}
            ]}"#,
            )
            .create_async()
            .await;
        let data = create_test_provider_data(&server.url());

        let query = ListQuery {
            filters: vec![FilterSpec {
                name: "asn".into(),
                values: vec!["133937".into()],
            }],
            ..Default::default()
        };
        let products = MCRS.select(&data, &query).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].product_uid, "mcr-1");

        let object = to_object(&products[0]);
        assert_eq!(object.as_map().unwrap()["asn"], Dynamic::Number(133937.0));
    }

    #[tokio::test]
    async fn vxc_permitted_is_not_an_mcr_filter() {
        let server = Server::new_async().await;
        let data = create_test_provider_data(&server.url());

        let query = ListQuery {
            filters: vec![FilterSpec {
                name: "vxc-permitted".into(),
                values: vec!["true".into()],
            }],
            ..Default::default()
        };
        assert!(matches!(
            MCRS.select(&data, &query).await,
            Err(ListError::Filter(FilterError::UnknownFilter { .. }))
        ));
    }
}
