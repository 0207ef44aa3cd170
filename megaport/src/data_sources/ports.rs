//! `megaport_ports` list data source

use super::product_list::ProductListing;
use crate::api::products::{Product, ProductType};
use crate::filter::{FieldValue, FilterField};
use crate::values::{object, string_or_null};
use tfplug::schema::AttributeType;
use tfplug::types::Dynamic;

pub const TYPE_NAME: &str = "megaport_ports";

pub static PORTS: ProductListing = ProductListing {
    type_name: TYPE_NAME,
    description: "Lists the ports in the account, optionally filtered",
    product_type: ProductType::Port,
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
        FilterField::boolean("vxc-permitted", |p: &Product| FieldValue::Bool(p.vxc_permitted)),
        FilterField::text("company-uid", |p: &Product| FieldValue::text(&p.company_uid)),
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
        ("vxc_permitted", AttributeType::Bool),
        ("cost_centre", AttributeType::String),
        ("contract_term_months", AttributeType::Number),
        ("company_uid", AttributeType::String),
        ("diversity_zone", AttributeType::String),
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
        ("vxc_permitted", Dynamic::from(product.vxc_permitted)),
        ("cost_centre", string_or_null(&product.cost_centre)),
        (
            "contract_term_months",
            Dynamic::from(product.contract_term_months),
        ),
        ("company_uid", string_or_null(&product.company_uid)),
        ("diversity_zone", string_or_null(&product.diversity_zone)),
        ("create_date", Dynamic::from(product.create_date.clone())),
        (
            "contract_end_date",
            Dynamic::from(product.contract_end_date.clone()),
        ),
    ])
}
