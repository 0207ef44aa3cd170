//! Port resource implementation

use crate::api::orders::PortOrder;
use crate::api::products::ProductType;
use crate::provider_data::MegaportProviderData;
use crate::resources::product::{
    cancel_product, gone_diagnostic, order_and_wait, order_tags, partial_state,
    product_attributes, product_uid, refresh, update_product, ProductSettings,
};
use crate::values::api_diagnostic;
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::resource::{
    import_state_passthrough_id, CreateResourceRequest, CreateResourceResponse,
    DeleteResourceRequest, DeleteResourceResponse, ImportResourceStateRequest,
    ImportResourceStateResponse, ReadResourceRequest, ReadResourceResponse, Resource,
    UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{Schema, SchemaBuilder};
use tfplug::types::{AttributePath, DynamicValue};

pub const TYPE_NAME: &str = "megaport_port";

pub const PORT_SPEEDS: &[i64] = &[1000, 10000, 100000];

pub struct PortResource {
    provider_data: MegaportProviderData,
}

impl PortResource {
    pub fn new(provider_data: MegaportProviderData) -> Self {
        Self { provider_data }
    }

    pub fn schema() -> Schema {
        product_attributes("port", PORT_SPEEDS)
            .into_iter()
            .fold(
                SchemaBuilder::new()
                    .version(0)
                    .description("Orders and manages a Megaport port"),
                |builder, attribute| builder.attribute(attribute),
            )
            .build()
    }

    fn order(settings: &ProductSettings) -> PortOrder {
        PortOrder {
            product_name: settings.product_name.clone(),
            product_type: ProductType::Port.api_name(),
            port_speed: settings.port_speed,
            location_id: settings.location_id,
            contract_term_months: settings.contract_term_months,
            marketplace_visibility: settings.marketplace_visibility,
            diversity_zone: settings.diversity_zone.clone(),
            cost_centre: settings.cost_centre.clone().filter(|c| !c.is_empty()),
            promo_code: settings.promo_code.clone(),
            resource_tags: order_tags(&settings.resource_tags),
        }
    }
}

#[async_trait]
impl Resource for PortResource {
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
        tracing::debug!("Ordering port {:?}", settings);

        let uid = match order_and_wait(&ctx, &self.provider_data, Self::order(&settings)).await {
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
            Ok(Some((state, _))) => CreateResourceResponse {
                new_state: state,
                diagnostics: vec![],
            },
            Ok(None) => CreateResourceResponse {
                new_state: partial_state(&request.planned_state, &uid),
                diagnostics: vec![gone_diagnostic(&uid)],
            },
            Err(e) => CreateResourceResponse {
                new_state: partial_state(&request.planned_state, &uid),
                diagnostics: vec![api_diagnostic("Failed to read port", &e)],
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
                new_state: found.map(|(state, _)| state),
                diagnostics: vec![],
            },
            Err(e) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![api_diagnostic("Failed to read port", &e)],
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
        if let Err(e) = update_product(client, ProductType::Port, &uid, &prior, &planned).await {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![api_diagnostic("Failed to update port", &e)],
            };
        }

        match refresh(client, request.planned_state, &uid).await {
            Ok(Some((state, _))) => UpdateResourceResponse {
                new_state: state,
                diagnostics: vec![],
            },
            Ok(None) => UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![gone_diagnostic(&uid)],
            },
            Err(e) => UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![api_diagnostic("Failed to read port", &e)],
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

        tracing::info!("Cancelling port {}", uid);
        let diagnostics = match cancel_product(&self.provider_data.client, &uid).await {
            Ok(()) => vec![],
            Err(e) => vec![api_diagnostic("Failed to delete port", &e)],
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

/// Planned state for a new port, as the framework would hand it over
#[cfg(test)]
pub(crate) fn planned_port(name: &str) -> DynamicValue {
    use tfplug::types::Dynamic;

    let mut planned = PortResource::schema().conform(&DynamicValue::object());
    let _ = planned.set_string(&AttributePath::new("product_name"), name);
    let _ = planned.set_number(&AttributePath::new("port_speed"), 10000.0);
    let _ = planned.set_number(&AttributePath::new("location_id"), 2.0);
    let _ = planned.set_number(&AttributePath::new("contract_term_months"), 12.0);
    for computed in [
        "product_uid",
        "marketplace_visibility",
        "diversity_zone",
        "provisioning_status",
        "create_date",
        "contract_end_date",
        "company_uid",
        "vxc_permitted",
    ] {
        let _ = planned.set_value(&AttributePath::new(computed), Dynamic::Unknown);
    }
    planned
}
