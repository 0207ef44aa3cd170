//! MCR (Megaport Cloud Router) resource implementation

use crate::api::orders::{McrOrder, McrOrderConfig};
use crate::api::products::{Product, ProductType};
use crate::provider_data::MegaportProviderData;
use crate::resources::product::{
    cancel_product, gone_diagnostic, order_and_wait, order_tags, partial_state,
    product_attributes, product_uid, refresh, update_product, ProductSettings,
};
use crate::values::api_diagnostic;
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::resource::{
    import_state_passthrough_id, CreateResourceRequest, CreateResourceResponse,
    DeleteResourceRequest, DeleteResourceResponse, ImportResourceStateRequest,
    ImportResourceStateResponse, ReadResourceRequest, ReadResourceResponse, Resource,
    UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Dynamic, DynamicValue};
use tfplug::validator::NumberRangeValidator;

pub const TYPE_NAME: &str = "megaport_mcr";

pub const MCR_SPEEDS: &[i64] = &[1000, 2500, 5000, 10000, 25000, 50000, 100000];

pub struct McrResource {
    provider_data: MegaportProviderData,
}

impl McrResource {
    pub fn new(provider_data: MegaportProviderData) -> Self {
        Self { provider_data }
    }

    pub fn schema() -> Schema {
        product_attributes("MCR", MCR_SPEEDS)
            .into_iter()
            .fold(
                SchemaBuilder::new()
                    .version(0)
                    .description("Orders and manages a Megaport Cloud Router"),
                |builder, attribute| builder.attribute(attribute),
            )
            .attribute(
                AttributeBuilder::new("asn", AttributeType::Number)
                    .description("BGP ASN of the router; Megaport assigns one when unset")
                    .optional()
                    .computed()
                    .validator(Box::new(NumberRangeValidator::between(1.0, 4294967295.0)))
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .plan_modifier(Box::new(RequiresReplace))
                    .build(),
            )
            .build()
    }

    fn order(settings: &ProductSettings, asn: Option<i64>) -> McrOrder {
        McrOrder {
            product_name: settings.product_name.clone(),
            product_type: ProductType::Mcr.api_name(),
            port_speed: settings.port_speed,
            location_id: settings.location_id,
            contract_term_months: settings.contract_term_months,
            marketplace_visibility: settings.marketplace_visibility,
            config: McrOrderConfig {
                mcr_asn: asn,
                diversity_zone: settings.diversity_zone.clone(),
            },
            cost_centre: settings.cost_centre.clone().filter(|c| !c.is_empty()),
            promo_code: settings.promo_code.clone(),
            resource_tags: order_tags(&settings.resource_tags),
        }
    }
}

fn apply_asn(state: &mut DynamicValue, product: &Product) {
    let _ = state.set_value(&AttributePath::new("asn"), Dynamic::from(product.mcr_asn()));
}

#[async_trait]
impl Resource for McrResource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let settings = match ProductSettings::from_state(&request.planned_state) {
            Ok(settings) => settings,
            Err(diag) => {
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics: vec![diag],
                }
            }
        };
        let asn = request.planned_state.get_i64_opt(&AttributePath::new("asn"));
        tracing::debug!("Ordering MCR {:?} with ASN {:?}", settings, asn);

        let order = Self::order(&settings, asn);
        let uid = match order_and_wait(&ctx, &self.provider_data, order).await {
            Ok(uid) => uid,
            Err((uid, diag)) => {
                return CreateResourceResponse {
                    new_state: match uid {
                        Some(uid) => partial_state(&request.planned_state, &uid),
                        None => request.planned_state,
                    },
                    diagnostics: vec![diag],
                }
            }
        };

        match refresh(&self.provider_data.client, request.planned_state.clone(), &uid).await {
            Ok(Some((mut state, product))) => {
                apply_asn(&mut state, &product);
                CreateResourceResponse {
                    new_state: state,
                    diagnostics: vec![],
                }
            }
            Ok(None) => CreateResourceResponse {
                new_state: partial_state(&request.planned_state, &uid),
                diagnostics: vec![gone_diagnostic(&uid)],
            },
            Err(e) => CreateResourceResponse {
                new_state: partial_state(&request.planned_state, &uid),
                diagnostics: vec![api_diagnostic("Failed to read MCR", &e)],
            },
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let uid = match product_uid(&request.current_state) {
            Ok(uid) => uid,
            Err(diag) => {
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics: vec![diag],
                }
            }
        };

        match refresh(&self.provider_data.client, request.current_state.clone(), &uid).await {
            Ok(found) => ReadResourceResponse {
                new_state: found.map(|(mut state, product)| {
                    apply_asn(&mut state, &product);
                    state
                }),
                diagnostics: vec![],
            },
            Err(e) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![api_diagnostic("Failed to read MCR", &e)],
            },
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let parsed = product_uid(&request.prior_state).and_then(|uid| {
            Ok((
                uid,
                ProductSettings::from_state(&request.prior_state)?,
                ProductSettings::from_state(&request.planned_state)?,
            ))
        });
        let (uid, prior, planned) = match parsed {
            Ok(parsed) => parsed,
            Err(diag) => {
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics: vec![diag],
                }
            }
        };

        let client = &self.provider_data.client;
        if let Err(e) = update_product(client, ProductType::Mcr, &uid, &prior, &planned).await {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![api_diagnostic("Failed to update MCR", &e)],
            };
        }

        match refresh(client, request.planned_state, &uid).await {
            Ok(Some((mut state, product))) => {
                apply_asn(&mut state, &product);
                UpdateResourceResponse {
                    new_state: state,
                    diagnostics: vec![],
                }
            }
            Ok(None) => UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![gone_diagnostic(&uid)],
            },
            Err(e) => UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![api_diagnostic("Failed to read MCR", &e)],
            },
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let uid = match product_uid(&request.prior_state) {
            Ok(uid) => uid,
            Err(diag) => {
                return DeleteResourceResponse {
                    diagnostics: vec![diag],
                }
            }
        };

        tracing::info!("Cancelling MCR {}", uid);
        let diagnostics = match cancel_product(&self.provider_data.client, &uid).await {
            Ok(()) => vec![],
            Err(e) => vec![api_diagnostic("Failed to delete MCR", &e)],
        };
        DeleteResourceResponse { diagnostics }
    }

    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_state_passthrough_id(AttributePath::new("product_uid"), &request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::{create_test_provider_data, mock_token};
    use mockito::{Matcher, Server};

    fn planned_mcr(asn: Option<i64>) -> DynamicValue {
        let mut planned = McrResource::schema().conform(&DynamicValue::object());
        planned
            .set_string(&AttributePath::new("product_name"), "Edge Router")
            .unwrap();
        planned
            .set_number(&AttributePath::new("port_speed"), 5000.0)
            .unwrap();
        planned
            .set_number(&AttributePath::new("location_id"), 2.0)
            .unwrap();
        planned
            .set_number(&AttributePath::new("contract_term_months"), 1.0)
            .unwrap();
        planned
            .set_value(&AttributePath::new("asn"), Dynamic::from(asn))
            .unwrap();
        if asn.is_none() {
            planned.mark_unknown(&AttributePath::new("asn")).unwrap();
        }
        planned
            .mark_unknown(&AttributePath::new("product_uid"))
            .unwrap();
        planned
    }

    #[tokio::test]
    async fn create_sends_asn_in_router_config() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let validate = server
            .mock("POST", "/v3/networkdesign/validate")
            .match_body(Matcher::PartialJson(serde_json::json!([{
                "productType": "MCR2",
                "portSpeed": 5000,
                "config": {"mcrAsn": 65001}
            }])))
            .with_body(r#"{"message":"ok","data":[]}"#)
            .create_async()
            .await;
        let _buy = server
            .mock("POST", "/v3/networkdesign/buy")
            .with_body(r#"{"message":"ok","data":[{"technicalServiceUid":"mcr-1"}]}"#)
            .create_async()
            .await;
        let _product = server
            .mock("GET", "/v2/product/mcr-1")
            .with_body(
                r#"{"data":{"productUid":"mcr-1","productName":"Edge Router",
                "productType":"MCR2","provisioningStatus":"CONFIGURED","portSpeed":5000,
                "locationId":2,"contractTermMonths":1,
                "resources":{"virtual_router":{"mcrAsn":65001}}}}"#,
            )
            .create_async()
            .await;
        let _tags = server
            .mock("GET", "/v2/product/mcr-1/tags")
            .with_body(r#"{"data":null}"#)
            .create_async()
            .await;

        let response = McrResource::new(create_test_provider_data(&server.url()))
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    planned_state: planned_mcr(Some(65001)),
                    config: DynamicValue::object(),
                },
            )
            .await;

        validate.assert_async().await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(
            response.new_state.get_i64(&AttributePath::new("asn")).unwrap(),
            65001
        );
        assert_eq!(
            response
                .new_state
                .get_string(&AttributePath::new("provisioning_status"))
                .unwrap(),
            "CONFIGURED"
        );
    }

    #[test]
    fn unset_asn_is_left_to_megaport() {
        let order = McrResource::order(
            &ProductSettings::from_state(&planned_mcr(None)).unwrap(),
            planned_mcr(None).get_i64_opt(&AttributePath::new("asn")),
        );
        let body = serde_json::to_value(&order).unwrap();
        assert_eq!(body["config"], serde_json::json!({}));
        assert_eq!(body["productType"], "MCR2");
    }

    #[tokio::test]
    async fn update_uses_the_mcr_modify_path() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let modify = server
            .mock("PUT", "/v2/product/mcr2/mcr-1")
            .match_body(Matcher::PartialJson(serde_json::json!({"name": "Core Router"})))
            .with_body(r#"{"message":"ok","data":{}}"#)
            .create_async()
            .await;
        let _product = server
            .mock("GET", "/v2/product/mcr-1")
            .with_body(
                r#"{"data":{"productUid":"mcr-1","productName":"Core Router",
                "productType":"MCR2","provisioningStatus":"LIVE","portSpeed":5000,
                "locationId":2,"contractTermMonths":1,
                "resources":{"virtual_router":{"mcrAsn":133937}}}}"#,
            )
            .create_async()
            .await;
        let _tags = server
            .mock("GET", "/v2/product/mcr-1/tags")
            .with_body(r#"{"data":{"resourceTags":[]}}"#)
            .create_async()
            .await;

        let mut prior = planned_mcr(Some(133937));
        prior
            .set_string(&AttributePath::new("product_uid"), "mcr-1")
            .unwrap();
        let mut planned = prior.clone();
        planned
            .set_string(&AttributePath::new("product_name"), "Core Router")
            .unwrap();

        let response = McrResource::new(create_test_provider_data(&server.url()))
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    prior_state: prior,
                    config: planned.clone(),
                    planned_state: planned,
                },
            )
            .await;

        modify.assert_async().await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(
            response
                .new_state
                .get_string(&AttributePath::new("product_name"))
                .unwrap(),
            "Core Router"
        );
    }

    #[test]
    fn schema_allows_mcr_speeds() {
        let schema = McrResource::schema();
        let mut config = schema.conform(&DynamicValue::object());
        config
            .set_string(&AttributePath::new("product_name"), "Edge Router")
            .unwrap();
        config
            .set_number(&AttributePath::new("location_id"), 2.0)
            .unwrap();
        config
            .set_number(&AttributePath::new("contract_term_months"), 12.0)
            .unwrap();

        config
            .set_number(&AttributePath::new("port_speed"), 2500.0)
            .unwrap();
        assert!(!tfplug::types::has_errors(&schema.validate_config(&config)));

        config
            .set_number(&AttributePath::new("port_speed"), 3000.0)
            .unwrap();
        assert!(tfplug::types::has_errors(&schema.validate_config(&config)));
    }
}
