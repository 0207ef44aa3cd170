//! Lifecycle shared by the port and MCR resources
//!
//! Both are ordered through the network design endpoints, polled until
//! provisioned, modified in place for name/term/visibility/cost centre
//! changes and cancelled on delete. Attributes that would change the
//! physical product (speed, location, diversity zone) force replacement.

use crate::api::common::ResourceTag;
use crate::api::products::{ModifyProductRequest, Product, ProductType};
use crate::api::{ApiError, Client};
use crate::provider_data::MegaportProviderData;
use crate::values::{api_diagnostic, read_string_map, set_optional_string, string_map, unknowns_to_null};
use serde::Serialize;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::{NumberOneOfValidator, StringLengthValidator};

pub const CONTRACT_TERMS: &[i64] = &[1, 12, 24, 36];

/// Attributes every ordered product carries
pub fn product_attributes(kind: &str, port_speeds: &[i64]) -> Vec<Attribute> {
    vec![
        AttributeBuilder::new("product_uid", AttributeType::String)
            .description(&format!("UID of the {}", kind))
            .computed()
            .plan_modifier(Box::new(UseStateForUnknown))
            .build(),
        AttributeBuilder::new("product_name", AttributeType::String)
            .description(&format!("Name of the {}", kind))
            .required()
            .validator(Box::new(StringLengthValidator {
                min: Some(1),
                max: Some(64),
            }))
            .build(),
        AttributeBuilder::new("port_speed", AttributeType::Number)
            .description("Speed in Mbps")
            .required()
            .validator(Box::new(NumberOneOfValidator::new(port_speeds)))
            .plan_modifier(Box::new(RequiresReplace))
            .build(),
        AttributeBuilder::new("location_id", AttributeType::Number)
            .description("Location the product is ordered in")
            .required()
            .plan_modifier(Box::new(RequiresReplace))
            .build(),
        AttributeBuilder::new("contract_term_months", AttributeType::Number)
            .description("Contract term: 1, 12, 24 or 36 months")
            .required()
            .validator(Box::new(NumberOneOfValidator::new(CONTRACT_TERMS)))
            .build(),
        AttributeBuilder::new("marketplace_visibility", AttributeType::Bool)
            .description("Whether the product is listed on the Megaport marketplace")
            .optional()
            .computed()
            .plan_modifier(Box::new(UseStateForUnknown))
            .build(),
        AttributeBuilder::new("diversity_zone", AttributeType::String)
            .description("Diversity zone to order in")
            .optional()
            .computed()
            .plan_modifier(Box::new(UseStateForUnknown))
            .plan_modifier(Box::new(RequiresReplace))
            .build(),
        AttributeBuilder::new("cost_centre", AttributeType::String)
            .description("Cost centre for invoicing")
            .optional()
            .build(),
        AttributeBuilder::new("promo_code", AttributeType::String)
            .description("Promotion code applied when ordering")
            .optional()
            .build(),
        AttributeBuilder::new(
            "resource_tags",
            AttributeType::Map(Box::new(AttributeType::String)),
        )
        .optional()
        .build(),
        AttributeBuilder::new("provisioning_status", AttributeType::String)
            .computed()
            .build(),
        AttributeBuilder::new("create_date", AttributeType::String)
            .computed()
            .plan_modifier(Box::new(UseStateForUnknown))
            .build(),
        AttributeBuilder::new("contract_end_date", AttributeType::String)
            .computed()
            .build(),
        AttributeBuilder::new("company_uid", AttributeType::String)
            .computed()
            .plan_modifier(Box::new(UseStateForUnknown))
            .build(),
        AttributeBuilder::new("vxc_permitted", AttributeType::Bool)
            .computed()
            .plan_modifier(Box::new(UseStateForUnknown))
            .build(),
    ]
}

/// Order fields read from a planned state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductSettings {
    pub product_name: String,
    pub port_speed: i64,
    pub location_id: i64,
    pub contract_term_months: i64,
    pub marketplace_visibility: bool,
    pub diversity_zone: Option<String>,
    pub cost_centre: Option<String>,
    pub promo_code: Option<String>,
    pub resource_tags: HashMap<String, String>,
}

impl ProductSettings {
    pub fn from_state(state: &DynamicValue) -> Result<Self, Diagnostic> {
        let required_number = |name: &str| {
            state.get_i64(&AttributePath::new(name)).map_err(|_| {
                Diagnostic::error(
                    format!("Missing {}", name),
                    format!("The '{}' attribute is required", name),
                )
                .with_attribute(AttributePath::new(name))
            })
        };

        let product_name = state
            .get_string(&AttributePath::new("product_name"))
            .map_err(|_| {
                Diagnostic::error("Missing product_name", "The 'product_name' attribute is required")
                    .with_attribute(AttributePath::new("product_name"))
            })?;

        Ok(Self {
            product_name,
            port_speed: required_number("port_speed")?,
            location_id: required_number("location_id")?,
            contract_term_months: required_number("contract_term_months")?,
            marketplace_visibility: state
                .get_bool_opt(&AttributePath::new("marketplace_visibility"))
                .unwrap_or(false),
            diversity_zone: state
                .get_string_opt(&AttributePath::new("diversity_zone"))
                .filter(|z| !z.is_empty()),
            cost_centre: state.get_string_opt(&AttributePath::new("cost_centre")),
            promo_code: state
                .get_string_opt(&AttributePath::new("promo_code"))
                .filter(|c| !c.is_empty()),
            resource_tags: read_string_map(state, &AttributePath::new("resource_tags")),
        })
    }

    /// Changes that can be applied without replacement, if any
    pub fn modification(&self, prior: &ProductSettings) -> Option<ModifyProductRequest> {
        let changed = self.product_name != prior.product_name
            || self.cost_centre != prior.cost_centre
            || self.marketplace_visibility != prior.marketplace_visibility
            || self.contract_term_months != prior.contract_term_months;
        if !changed {
            return None;
        }

        Some(ModifyProductRequest {
            name: self.product_name.clone(),
            cost_centre: self.cost_centre.clone(),
            marketplace_visibility: Some(self.marketplace_visibility),
            contract_term_months: (self.contract_term_months != prior.contract_term_months)
                .then_some(self.contract_term_months),
        })
    }
}

pub fn product_uid(state: &DynamicValue) -> Result<String, Diagnostic> {
    state
        .get_string(&AttributePath::new("product_uid"))
        .map_err(|_| {
            Diagnostic::error("Missing product_uid", "The product has no UID in state")
                .with_attribute(AttributePath::new("product_uid"))
        })
}

pub fn purchase_terms_diagnostic() -> Diagnostic {
    Diagnostic::error(
        "Purchase terms not accepted",
        "Ordering requires accept_purchase_terms = true in the provider block \
         (or MEGAPORT_ACCEPT_PURCHASE_TERMS=true)",
    )
}

/// Waits for a new or modified product, giving up when Terraform stops us
pub async fn wait_provisioned(
    ctx: &Context,
    provider_data: &MegaportProviderData,
    uid: &str,
) -> Result<String, ApiError> {
    let products = provider_data.client.products();
    tokio::select! {
        result = products.wait_for_provisioning(uid, provider_data.wait) => result,
        _ = ctx.cancelled() => Err(ApiError::Provisioning(format!(
            "stopped waiting for {} to provision",
            uid
        ))),
    }
}

/// Places an order and waits for it, returning the new UID
///
/// When the order went through but provisioning failed, the error carries
/// the UID so the caller can save it.
pub async fn order_and_wait<T: Serialize>(
    ctx: &Context,
    provider_data: &MegaportProviderData,
    order: T,
) -> Result<String, (Option<String>, Diagnostic)> {
    if !provider_data.accept_purchase_terms {
        return Err((None, purchase_terms_diagnostic()));
    }

    let uid = provider_data
        .client
        .orders()
        .place(order)
        .await
        .map_err(|e| (None, api_diagnostic("Failed to order product", &e)))?;
    tracing::info!("Ordered product {}", uid);

    match wait_provisioned(ctx, provider_data, &uid).await {
        Ok(_) => Ok(uid),
        Err(e) => Err((
            Some(uid),
            api_diagnostic("Product did not finish provisioning", &e),
        )),
    }
}

/// Planned state saved after an order whose provisioning failed
pub fn partial_state(planned: &DynamicValue, uid: &str) -> DynamicValue {
    let mut state = planned.clone();
    unknowns_to_null(&mut state.value);
    let _ = state.set_string(&AttributePath::new("product_uid"), uid);
    state
}

/// Writes the API's view of a product into state
pub fn apply_product(state: &mut DynamicValue, product: &Product) {
    let _ = state.set_string(&AttributePath::new("product_uid"), product.product_uid.clone());
    let _ = state.set_string(
        &AttributePath::new("product_name"),
        product.product_name.clone(),
    );
    let _ = state.set_value(
        &AttributePath::new("port_speed"),
        Dynamic::from(product.port_speed),
    );
    let _ = state.set_value(
        &AttributePath::new("location_id"),
        Dynamic::from(product.location_id),
    );
    let _ = state.set_value(
        &AttributePath::new("contract_term_months"),
        Dynamic::from(product.contract_term_months),
    );
    let _ = state.set_bool(
        &AttributePath::new("marketplace_visibility"),
        product.marketplace_visibility,
    );
    set_optional_string(
        state,
        &AttributePath::new("diversity_zone"),
        &product.diversity_zone,
    );
    set_optional_string(state, &AttributePath::new("cost_centre"), &product.cost_centre);
    let _ = state.set_string(
        &AttributePath::new("provisioning_status"),
        product.provisioning_status.clone(),
    );
    let _ = state.set_value(
        &AttributePath::new("create_date"),
        Dynamic::from(product.create_date.clone()),
    );
    let _ = state.set_value(
        &AttributePath::new("contract_end_date"),
        Dynamic::from(product.contract_end_date.clone()),
    );
    set_optional_string(state, &AttributePath::new("company_uid"), &product.company_uid);
    let _ = state.set_bool(&AttributePath::new("vxc_permitted"), product.vxc_permitted);
}

/// Tags go to state when configured or present remotely
pub fn apply_tags(state: &mut DynamicValue, tags: &HashMap<String, String>) {
    let path = AttributePath::new("resource_tags");
    let configured = state.get(&path).is_some_and(|v| !v.is_null());
    if tags.is_empty() && !configured {
        let _ = state.set_null(&path);
    } else {
        let _ = state.set_value(&path, string_map(tags));
    }
}

/// Fetches a product and its tags; `None` once it is gone or cancelled
pub async fn fetch_product(
    client: &Client,
    uid: &str,
) -> Result<Option<(Product, HashMap<String, String>)>, ApiError> {
    let product = match client.products().get(uid).await {
        Ok(product) => product,
        Err(e) if e.is_not_found() => return Ok(None),
        Err(e) => return Err(e),
    };
    if !product.is_active() {
        tracing::info!(
            "Product {} is {}, treating it as deleted",
            uid,
            product.provisioning_status
        );
        return Ok(None);
    }

    let tags = client.tags().get(uid).await?;
    Ok(Some((product, tags)))
}

/// Reads a product back into `state`; `None` once it is gone
pub async fn refresh(
    client: &Client,
    mut state: DynamicValue,
    uid: &str,
) -> Result<Option<(DynamicValue, Product)>, ApiError> {
    let Some((product, tags)) = fetch_product(client, uid).await? else {
        return Ok(None);
    };
    apply_product(&mut state, &product);
    apply_tags(&mut state, &tags);
    Ok(Some((state, product)))
}

/// Tags in the order payload shape, sorted for stable requests
pub fn order_tags(tags: &HashMap<String, String>) -> Vec<ResourceTag> {
    let mut list: Vec<ResourceTag> = tags
        .iter()
        .map(|(key, value)| ResourceTag {
            key: key.clone(),
            value: value.clone(),
        })
        .collect();
    list.sort_by(|a, b| a.key.cmp(&b.key));
    list
}

pub fn gone_diagnostic(uid: &str) -> Diagnostic {
    Diagnostic::error(
        "Product not found",
        format!("Product {} disappeared while it was being applied", uid),
    )
}

/// Applies in-place changes between two states
pub async fn update_product(
    client: &Client,
    product_type: ProductType,
    uid: &str,
    prior: &ProductSettings,
    planned: &ProductSettings,
) -> Result<(), ApiError> {
    if let Some(request) = planned.modification(prior) {
        tracing::debug!("Modifying {} with {:?}", uid, request);
        client.products().modify(product_type, uid, &request).await?;
    }
    if planned.resource_tags != prior.resource_tags {
        client.tags().replace(uid, &planned.resource_tags).await?;
    }
    Ok(())
}

/// Cancels a product; an already missing product counts as deleted
pub async fn cancel_product(client: &Client, uid: &str) -> Result<(), ApiError> {
    match client.products().cancel(uid).await {
        Err(e) if e.is_not_found() => {
            tracing::warn!("Product {} was already gone", uid);
            Ok(())
        }
        result => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ProductSettings {
        ProductSettings {
            product_name: "Sydney Port".into(),
            port_speed: 10000,
            location_id: 2,
            contract_term_months: 12,
            ..Default::default()
        }
    }

    #[test]
    fn unchanged_settings_need_no_modification() {
        assert!(settings().modification(&settings()).is_none());

        let mut planned = settings();
        planned.resource_tags.insert("env".into(), "prod".into());
        assert!(planned.modification(&settings()).is_none());
    }

    #[test]
    fn term_only_sent_when_changed() {
        let planned = ProductSettings {
            product_name: "Renamed".into(),
            ..settings()
        };
        let request = planned.modification(&settings()).unwrap();
        assert_eq!(request.name, "Renamed");
        assert_eq!(request.contract_term_months, None);

        let planned = ProductSettings {
            contract_term_months: 24,
            ..settings()
        };
        let request = planned.modification(&settings()).unwrap();
        assert_eq!(request.contract_term_months, Some(24));
    }

    #[test]
    fn settings_read_from_state() {
        let mut state = DynamicValue::object();
        state
            .set_string(&AttributePath::new("product_name"), "Sydney Port")
            .unwrap();
        state
            .set_number(&AttributePath::new("port_speed"), 10000.0)
            .unwrap();
        state
            .set_number(&AttributePath::new("location_id"), 2.0)
            .unwrap();
        state
            .set_number(&AttributePath::new("contract_term_months"), 12.0)
            .unwrap();
        state
            .mark_unknown(&AttributePath::new("marketplace_visibility"))
            .unwrap();
        state
            .set_string(&AttributePath::new("diversity_zone"), "")
            .unwrap();

        let settings = ProductSettings::from_state(&state).unwrap();
        assert_eq!(settings.port_speed, 10000);
        assert!(!settings.marketplace_visibility);
        assert_eq!(settings.diversity_zone, None);

        state.set_null(&AttributePath::new("location_id")).unwrap();
        let err = ProductSettings::from_state(&state).unwrap_err();
        assert_eq!(err.summary, "Missing location_id");
    }

    #[test]
    fn partial_state_keeps_uid_and_clears_unknowns() {
        let mut planned = DynamicValue::object();
        planned
            .set_string(&AttributePath::new("product_name"), "Sydney Port")
            .unwrap();
        planned
            .mark_unknown(&AttributePath::new("product_uid"))
            .unwrap();
        planned
            .mark_unknown(&AttributePath::new("create_date"))
            .unwrap();

        let state = partial_state(&planned, "port-1");
        assert_eq!(
            state.get_string(&AttributePath::new("product_uid")).unwrap(),
            "port-1"
        );
        assert!(state
            .get(&AttributePath::new("create_date"))
            .unwrap()
            .is_null());
    }

    #[test]
    fn tags_only_written_when_present_or_configured() {
        let mut state = DynamicValue::object();
        state.set_null(&AttributePath::new("resource_tags")).unwrap();

        apply_tags(&mut state, &HashMap::new());
        assert!(state
            .get(&AttributePath::new("resource_tags"))
            .unwrap()
            .is_null());

        apply_tags(
            &mut state,
            &HashMap::from([("env".to_string(), "prod".to_string())]),
        );
        assert_eq!(
            state
                .get_map(&AttributePath::new("resource_tags"))
                .unwrap()
                .get("env"),
            Some(&Dynamic::from("prod"))
        );
    }
}
