//! VXC (virtual cross connect) resource implementation
//!
//! Each end is a single nested block. `requested_product_uid` and
//! `ordered_vlan` hold what the user asked for; `current_product_uid`,
//! `vlan` and `location_id` report what Megaport has. The older
//! `product_uid` and `vlan` inputs are still accepted and folded into the
//! requested values while planning.

use crate::api::orders::{AwsPartnerConfig, PartnerConfig, VxcEndOrder, VxcOrder, VxcOrderDetails};
use crate::api::products::is_active_status;
use crate::api::vxcs::{UpdateVxcRequest, Vxc, VxcEnd};
use crate::api::{ApiError, Client};
use crate::provider_data::MegaportProviderData;
use crate::resources::product::{
    cancel_product, gone_diagnostic, partial_state, product_uid, purchase_terms_diagnostic,
    wait_provisioned, CONTRACT_TERMS,
};
use crate::values::{api_diagnostic, object, set_optional_string};
use async_trait::async_trait;
use std::fmt::Debug;
use tfplug::context::Context;
use tfplug::plan_modifier::{values_equal, UseStateForUnknown};
use tfplug::resource::{
    import_state_passthrough_id, CreateResourceRequest, CreateResourceResponse,
    DeleteResourceRequest, DeleteResourceResponse, ImportResourceStateRequest,
    ImportResourceStateResponse, ModifyPlanRequest, ModifyPlanResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{
    AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder, NestingMode, Schema,
    SchemaBuilder,
};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::{NumberOneOfValidator, NumberRangeValidator, StringOneOfValidator};

pub const TYPE_NAME: &str = "megaport_vxc";

const ENDS: [&str; 2] = ["a_end", "b_end"];
const PARTNER_CONFIG: &str = "b_end_partner_config";
pub const PARTNERS: &[&str] = &["aws", "azure", "google", "oracle"];

static NULL: Dynamic = Dynamic::Null;

pub struct VxcResource {
    provider_data: MegaportProviderData,
}

impl VxcResource {
    pub fn new(provider_data: MegaportProviderData) -> Self {
        Self { provider_data }
    }

    pub fn schema() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Orders and manages a virtual cross connect between two products")
            .attribute(
                AttributeBuilder::new("product_uid", AttributeType::String)
                    .description("UID of the VXC")
                    .computed()
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("product_name", AttributeType::String)
                    .description("Name of the VXC")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("rate_limit", AttributeType::Number)
                    .description("Bandwidth in Mbps")
                    .required()
                    .validator(Box::new(NumberRangeValidator::at_least(0.0)))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("contract_term_months", AttributeType::Number)
                    .description("Contract term: 1, 12, 24 or 36 months")
                    .required()
                    .validator(Box::new(NumberOneOfValidator::new(CONTRACT_TERMS)))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("cost_centre", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("promo_code", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("provisioning_status", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("create_date", AttributeType::String)
                    .computed()
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
            .block(end_block("a_end", "A-End of the VXC"))
            .block(end_block("b_end", "B-End of the VXC"))
            .block(partner_config_block())
            .build()
    }

    async fn fetch(&self, uid: &str) -> Result<Option<Vxc>, ApiError> {
        fetch_vxc(&self.provider_data.client, uid).await
    }
}

fn end_block(name: &str, description: &str) -> NestedBlock {
    NestedBlockBuilder::new(name, NestingMode::Single)
        .description(description)
        .min_items(1)
        .max_items(1)
        .attribute(
            AttributeBuilder::new("requested_product_uid", AttributeType::String)
                .description("Product this end should connect to")
                .optional()
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("product_uid", AttributeType::String)
                .description("Product this end should connect to")
                .optional()
                .deprecated("Use requested_product_uid instead")
                .build(),
        )
        .attribute(
            AttributeBuilder::new("current_product_uid", AttributeType::String)
                .description("Product this end is connected to")
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("ordered_vlan", AttributeType::Number)
                .description("VLAN to order; -1 untags the end, 0 lets Megaport pick")
                .optional()
                .computed()
                .validator(Box::new(NumberRangeValidator::between(-1.0, 4093.0)))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("vlan", AttributeType::Number)
                .description("VLAN in use on this end")
                .optional()
                .computed()
                .deprecated("Use ordered_vlan to request a VLAN")
                .build(),
        )
        .attribute(
            AttributeBuilder::new("inner_vlan", AttributeType::Number)
                .description("Inner VLAN for Q-in-Q")
                .optional()
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("location_id", AttributeType::Number)
                .computed()
                .build(),
        )
        .build()
}

fn partner_config_block() -> NestedBlock {
    let required_string = |name: &str, description: &str| {
        AttributeBuilder::new(name, AttributeType::String)
            .description(description)
            .required()
            .build()
    };
    let optional_string = |name: &str| {
        AttributeBuilder::new(name, AttributeType::String)
            .optional()
            .build()
    };

    NestedBlockBuilder::new(PARTNER_CONFIG, NestingMode::Single)
        .description("Cloud-side settings when the B-End is a partner port")
        .attribute(
            AttributeBuilder::new("partner", AttributeType::String)
                .description("One of aws, azure, google or oracle")
                .required()
                .validator(Box::new(StringOneOfValidator::new(PARTNERS.iter().copied())))
                .build(),
        )
        .block(
            NestedBlockBuilder::new("aws_config", NestingMode::Single)
                .attribute(
                    AttributeBuilder::new("connect_type", AttributeType::String)
                        .description("AWS for a hosted VIF, AWSHC for a hosted connection")
                        .required()
                        .validator(Box::new(StringOneOfValidator::new(["AWS", "AWSHC"])))
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("type", AttributeType::String)
                        .description("private or public")
                        .required()
                        .validator(Box::new(StringOneOfValidator::new(["private", "public"])))
                        .build(),
                )
                .attribute(required_string("owner_account", "AWS account id"))
                .attribute(
                    AttributeBuilder::new("asn", AttributeType::Number)
                        .optional()
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("amazon_asn", AttributeType::Number)
                        .optional()
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("auth_key", AttributeType::String)
                        .description("BGP authentication key")
                        .optional()
                        .sensitive()
                        .build(),
                )
                .attribute(optional_string("prefixes"))
                .attribute(optional_string("customer_ip_address"))
                .attribute(optional_string("amazon_ip_address"))
                .attribute(optional_string("name"))
                .build(),
        )
        .block(
            NestedBlockBuilder::new("azure_config", NestingMode::Single)
                .attribute(required_string("service_key", "ExpressRoute service key"))
                .build(),
        )
        .block(
            NestedBlockBuilder::new("google_config", NestingMode::Single)
                .attribute(required_string("pairing_key", "Partner interconnect pairing key"))
                .build(),
        )
        .block(
            NestedBlockBuilder::new("oracle_config", NestingMode::Single)
                .attribute(required_string("virtual_circuit_id", "FastConnect virtual circuit OCID"))
                .build(),
        )
        .build()
}

fn end_path(end: &str, name: &str) -> AttributePath {
    AttributePath::new(end).attribute(name)
}

fn end_field<'a>(value: &'a DynamicValue, end: &str, name: &str) -> &'a Dynamic {
    value.get(&end_path(end, name)).unwrap_or(&NULL)
}

/// Folds a deprecated input into its replacement; both set and different is an error
fn pick<T: PartialEq + Debug>(
    end: &str,
    current: (&str, Option<T>),
    deprecated: (&str, Option<T>),
) -> Result<Option<T>, Diagnostic> {
    match (current.1, deprecated.1) {
        (Some(a), Some(b)) if a != b => Err(Diagnostic::error(
            format!("Conflicting {}.{} values", end, current.0),
            format!(
                "{end}.{} is {:?} but the deprecated {end}.{} is {:?}; set only {}",
                current.0,
                a,
                deprecated.0,
                b,
                current.0,
                end = end
            ),
        )
        .with_attribute(end_path(end, current.0))),
        (a, b) => Ok(a.or(b)),
    }
}

/// What the configuration asks of one end
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestedEnd {
    /// `None` only while the value is still unknown
    pub product_uid: Option<String>,
    pub vlan: Option<i64>,
    pub inner_vlan: Option<i64>,
    /// Whether any input still has to be computed
    pub pending: bool,
}

impl RequestedEnd {
    pub fn from_config(config: &DynamicValue, end: &str) -> Result<Self, Diagnostic> {
        let field = |name: &str| end_field(config, end, name);
        let pending = ["requested_product_uid", "product_uid", "ordered_vlan", "vlan"]
            .iter()
            .any(|name| field(name).is_unknown());

        let product_uid = pick(
            end,
            (
                "requested_product_uid",
                field("requested_product_uid").as_string().map(str::to_string),
            ),
            ("product_uid", field("product_uid").as_string().map(str::to_string)),
        )?;
        if product_uid.is_none() && !pending {
            return Err(Diagnostic::error(
                format!("Missing {} product", end),
                format!("Set {}.requested_product_uid to the product to connect", end),
            )
            .with_attribute(end_path(end, "requested_product_uid")));
        }

        let vlan = pick(
            end,
            ("ordered_vlan", field("ordered_vlan").as_i64()),
            ("vlan", field("vlan").as_i64()),
        )?;

        Ok(Self {
            product_uid,
            vlan,
            inner_vlan: field("inner_vlan").as_i64(),
            pending,
        })
    }

    fn order(&self, include_uid: bool, partner_config: Option<PartnerConfig>) -> VxcEndOrder {
        VxcEndOrder {
            product_uid: self.product_uid.clone().filter(|_| include_uid),
            vlan: self.vlan,
            inner_vlan: self.inner_vlan,
            partner_config,
        }
    }
}

/// Reads `b_end_partner_config` into the order payload
pub fn partner_config(value: &DynamicValue) -> Result<Option<PartnerConfig>, Diagnostic> {
    let block = AttributePath::new(PARTNER_CONFIG);
    if value.get(&block).is_none_or(Dynamic::is_null) {
        return Ok(None);
    }

    let partner = value
        .get_string(&block.clone().attribute("partner"))
        .map_err(|_| {
            Diagnostic::error("Missing partner", "b_end_partner_config.partner is required")
                .with_attribute(block.clone().attribute("partner"))
        })?;

    for other in PARTNERS.iter().filter(|p| **p != partner) {
        let name = format!("{}_config", other);
        if value
            .get(&block.clone().attribute(&name))
            .is_some_and(|v| !v.is_null())
        {
            return Err(Diagnostic::error(
                "Mismatched partner config",
                format!("{} is set but partner is \"{}\"", name, partner),
            )
            .with_attribute(block.clone().attribute(&name)));
        }
    }

    let settings = block.clone().attribute(&format!("{}_config", partner));
    if value.get(&settings).is_none_or(Dynamic::is_null) {
        return Err(Diagnostic::error(
            format!("Missing {}_config", partner),
            format!("partner = \"{}\" needs a {}_config block", partner, partner),
        )
        .with_attribute(settings));
    }

    let string = |name: &str| value.get_string_opt(&settings.clone().attribute(name));
    let required = |name: &str| {
        string(name).ok_or_else(|| {
            Diagnostic::error(
                format!("Missing {}", name),
                format!("{}_config.{} is required", partner, name),
            )
            .with_attribute(settings.clone().attribute(name))
        })
    };

    let config = match partner.as_str() {
        "aws" => {
            let aws = AwsPartnerConfig {
                interface_type: required("type")?,
                owner_account: required("owner_account")?,
                asn: value.get_i64_opt(&settings.clone().attribute("asn")),
                amazon_asn: value.get_i64_opt(&settings.clone().attribute("amazon_asn")),
                auth_key: string("auth_key"),
                prefixes: string("prefixes"),
                customer_ip_address: string("customer_ip_address"),
                amazon_ip_address: string("amazon_ip_address"),
                name: string("name"),
            };
            if required("connect_type")? == "AWSHC" {
                PartnerConfig::AwsHosted(aws)
            } else {
                PartnerConfig::Aws(aws)
            }
        }
        "azure" => PartnerConfig::Azure {
            service_key: required("service_key")?,
        },
        "google" => PartnerConfig::Google {
            pairing_key: required("pairing_key")?,
        },
        "oracle" => PartnerConfig::Oracle {
            virtual_circuit_id: required("virtual_circuit_id")?,
        },
        other => {
            return Err(Diagnostic::error(
                "Unsupported partner",
                format!("partner must be one of {}, got \"{}\"", PARTNERS.join(", "), other),
            )
            .with_attribute(block.attribute("partner")))
        }
    };
    Ok(Some(config))
}

/// Fetches a VXC; `None` once it is gone or cancelled
async fn fetch_vxc(client: &Client, uid: &str) -> Result<Option<Vxc>, ApiError> {
    match client.vxcs().get(uid).await {
        Ok(vxc) if is_active_status(&vxc.provisioning_status) => Ok(Some(vxc)),
        Ok(vxc) => {
            tracing::info!(
                "VXC {} is {}, treating it as deleted",
                uid,
                vxc.provisioning_status
            );
            Ok(None)
        }
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Writes the API's view of one end, keeping the requested values
fn apply_end(state: &mut DynamicValue, end: &str, api: &VxcEnd) {
    let existing = state.get(&AttributePath::new(end)).cloned().unwrap_or(Dynamic::Null);
    let keep = |name: &str, fallback: Dynamic| match existing.as_map().and_then(|m| m.get(name)) {
        Some(value) if !value.is_unknown() => value.clone(),
        _ => fallback,
    };

    // An imported VXC has no ends in state yet; what exists is what was asked for
    let imported = existing.is_null();
    let requested_uid = if imported {
        Dynamic::from(api.product_uid.clone())
    } else {
        keep("requested_product_uid", Dynamic::from(api.product_uid.clone()))
    };
    let ordered_vlan = if imported {
        Dynamic::from(api.vlan)
    } else {
        keep("ordered_vlan", Dynamic::from(api.vlan))
    };

    let _ = state.set_value(
        &AttributePath::new(end),
        object([
            ("requested_product_uid", requested_uid),
            ("product_uid", keep("product_uid", Dynamic::Null)),
            ("current_product_uid", Dynamic::from(api.product_uid.clone())),
            ("ordered_vlan", ordered_vlan),
            ("vlan", Dynamic::from(api.vlan)),
            ("inner_vlan", Dynamic::from(api.inner_vlan)),
            ("location_id", Dynamic::from(api.location_id)),
        ]),
    );
}

/// Writes the API's view of a VXC into state
pub fn apply_vxc(state: &mut DynamicValue, vxc: &Vxc) {
    let _ = state.set_string(&AttributePath::new("product_uid"), vxc.product_uid.clone());
    let _ = state.set_string(&AttributePath::new("product_name"), vxc.product_name.clone());
    let _ = state.set_value(
        &AttributePath::new("rate_limit"),
        Dynamic::from(vxc.rate_limit),
    );
    let _ = state.set_value(
        &AttributePath::new("contract_term_months"),
        Dynamic::from(vxc.contract_term_months),
    );
    set_optional_string(state, &AttributePath::new("cost_centre"), &vxc.cost_centre);
    let _ = state.set_string(
        &AttributePath::new("provisioning_status"),
        vxc.provisioning_status.clone(),
    );
    let _ = state.set_value(
        &AttributePath::new("create_date"),
        Dynamic::from(vxc.create_date.clone()),
    );
    apply_end(state, "a_end", &vxc.a_end);
    apply_end(state, "b_end", &vxc.b_end);

    for path in [AttributePath::new("promo_code"), AttributePath::new(PARTNER_CONFIG)] {
        if state.get(&path).is_none_or(Dynamic::is_unknown) {
            let _ = state.set_null(&path);
        }
    }
}

/// Changes between two states that the VXC update endpoint accepts
pub fn vxc_changes(prior: &DynamicValue, planned: &DynamicValue) -> UpdateVxcRequest {
    fn changed<T: PartialEq>(prior: Option<T>, planned: Option<T>) -> Option<T> {
        match planned {
            Some(value) if prior.as_ref() != Some(&value) => Some(value),
            _ => None,
        }
    }
    let string = |v: &DynamicValue, name: &str| v.get_string_opt(&AttributePath::new(name));
    let number = |v: &DynamicValue, name: &str| v.get_i64_opt(&AttributePath::new(name));
    let end_string =
        |v: &DynamicValue, end: &str, name: &str| end_field(v, end, name).as_string().map(str::to_string);
    let end_number = |v: &DynamicValue, end: &str, name: &str| end_field(v, end, name).as_i64();

    let cost_centre = match (string(prior, "cost_centre"), string(planned, "cost_centre")) {
        (Some(_), None) => Some(String::new()),
        (prior, planned) => changed(prior, planned),
    };

    UpdateVxcRequest {
        name: changed(string(prior, "product_name"), string(planned, "product_name")),
        rate_limit: changed(number(prior, "rate_limit"), number(planned, "rate_limit")),
        cost_centre,
        contract_term_months: changed(
            number(prior, "contract_term_months"),
            number(planned, "contract_term_months"),
        ),
        a_end_vlan: changed(
            end_number(prior, "a_end", "ordered_vlan"),
            end_number(planned, "a_end", "ordered_vlan"),
        ),
        b_end_vlan: changed(
            end_number(prior, "b_end", "ordered_vlan"),
            end_number(planned, "b_end", "ordered_vlan"),
        ),
        a_end_inner_vlan: changed(
            end_number(prior, "a_end", "inner_vlan"),
            end_number(planned, "a_end", "inner_vlan"),
        ),
        b_end_inner_vlan: changed(
            end_number(prior, "b_end", "inner_vlan"),
            end_number(planned, "b_end", "inner_vlan"),
        ),
        a_end_product_uid: changed(
            end_string(prior, "a_end", "requested_product_uid"),
            end_string(planned, "a_end", "requested_product_uid"),
        ),
        b_end_product_uid: changed(
            end_string(prior, "b_end", "requested_product_uid"),
            end_string(planned, "b_end", "requested_product_uid"),
        ),
    }
}

#[async_trait]
impl Resource for VxcResource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn modify_plan(&self, _ctx: Context, request: ModifyPlanRequest) -> ModifyPlanResponse {
        let mut planned = request.planned_state;
        let mut diagnostics = Vec::new();
        let mut requires_replace = Vec::new();
        let updating = !request.prior_state.is_null();

        for end in ENDS {
            let block = request.config.get(&AttributePath::new(end));
            if block.is_none_or(|b| b.is_null() || b.is_unknown()) {
                continue;
            }
            let requested = match RequestedEnd::from_config(&request.config, end) {
                Ok(requested) => requested,
                Err(diag) => {
                    diagnostics.push(diag);
                    continue;
                }
            };

            if let Some(uid) = &requested.product_uid {
                let _ = planned.set_string(&end_path(end, "requested_product_uid"), uid.clone());
            }
            if !requested.pending {
                let _ = planned.set_value(
                    &end_path(end, "ordered_vlan"),
                    Dynamic::from(requested.vlan),
                );
            }

            if updating {
                let moved = !values_equal(
                    end_field(&request.prior_state, end, "requested_product_uid"),
                    end_field(&planned, end, "requested_product_uid"),
                );
                let retagged = !values_equal(
                    end_field(&request.prior_state, end, "ordered_vlan"),
                    end_field(&planned, end, "ordered_vlan"),
                );
                if moved {
                    let _ = planned.mark_unknown(&end_path(end, "current_product_uid"));
                    let _ = planned.mark_unknown(&end_path(end, "location_id"));
                }
                if retagged && end_field(&request.config, end, "vlan").is_null() {
                    let _ = planned.mark_unknown(&end_path(end, "vlan"));
                }
            }
        }

        if updating {
            let path = AttributePath::new(PARTNER_CONFIG);
            let prior = request.prior_state.get(&path).unwrap_or(&NULL);
            let next = planned.get(&path).unwrap_or(&NULL);
            if !next.contains_unknown() && !values_equal(prior, next) {
                tracing::debug!("Partner config changed, replacing VXC");
                requires_replace.push(path);
            }
        }

        ModifyPlanResponse {
            planned_state: planned,
            requires_replace,
            diagnostics,
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let fail = |state: DynamicValue, diag: Diagnostic| CreateResourceResponse {
            new_state: state,
            diagnostics: vec![diag],
        };

        if !self.provider_data.accept_purchase_terms {
            return fail(request.planned_state, purchase_terms_diagnostic());
        }

        let config = if request.config.is_null() {
            &request.planned_state
        } else {
            &request.config
        };
        let ends = RequestedEnd::from_config(config, "a_end")
            .and_then(|a| Ok((a, RequestedEnd::from_config(config, "b_end")?)));
        let (a_end, b_end) = match ends {
            Ok(ends) => ends,
            Err(diag) => return fail(request.planned_state, diag),
        };
        let partner = match partner_config(&request.planned_state) {
            Ok(partner) => partner,
            Err(diag) => return fail(request.planned_state, diag),
        };
        let Some(a_end_uid) = a_end.product_uid.clone() else {
            return fail(
                request.planned_state,
                Diagnostic::error("Missing a_end product", "a_end.requested_product_uid is unknown"),
            );
        };

        let planned = &request.planned_state;
        let order = VxcOrder {
            product_uid: a_end_uid,
            associated_vxcs: vec![VxcOrderDetails {
                product_name: planned
                    .get_string_opt(&AttributePath::new("product_name"))
                    .unwrap_or_default(),
                rate_limit: planned
                    .get_i64_opt(&AttributePath::new("rate_limit"))
                    .unwrap_or_default(),
                contract_term_months: planned
                    .get_i64_opt(&AttributePath::new("contract_term_months"))
                    .unwrap_or(1),
                cost_centre: planned
                    .get_string_opt(&AttributePath::new("cost_centre"))
                    .filter(|c| !c.is_empty()),
                promo_code: planned
                    .get_string_opt(&AttributePath::new("promo_code"))
                    .filter(|c| !c.is_empty()),
                a_end: a_end.order(false, None),
                b_end: b_end.order(true, partner),
            }],
        };
        tracing::debug!("Ordering VXC {:?}", order);

        let uid = match self.provider_data.client.orders().place(order).await {
            Ok(uid) => uid,
            Err(e) => return fail(request.planned_state, api_diagnostic("Failed to order VXC", &e)),
        };
        tracing::info!("Ordered VXC {}", uid);

        if let Err(e) = wait_provisioned(&ctx, &self.provider_data, &uid).await {
            return fail(
                partial_state(&request.planned_state, &uid),
                api_diagnostic("VXC did not finish provisioning", &e),
            );
        }

        match self.fetch(&uid).await {
            Ok(Some(vxc)) => {
                let mut state = request.planned_state;
                apply_vxc(&mut state, &vxc);
                CreateResourceResponse {
                    new_state: state,
                    diagnostics: vec![],
                }
            }
            Ok(None) => fail(partial_state(&request.planned_state, &uid), gone_diagnostic(&uid)),
            Err(e) => fail(
                partial_state(&request.planned_state, &uid),
                api_diagnostic("Failed to read VXC", &e),
            ),
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

        match self.fetch(&uid).await {
            Ok(found) => ReadResourceResponse {
                new_state: found.map(|vxc| {
                    let mut state = request.current_state;
                    apply_vxc(&mut state, &vxc);
                    state
                }),
                diagnostics: vec![],
            },
            Err(e) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![api_diagnostic("Failed to read VXC", &e)],
            },
        }
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let uid = match product_uid(&request.prior_state) {
            Ok(uid) => uid,
            Err(diag) => {
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics: vec![diag],
                }
            }
        };

        let changes = vxc_changes(&request.prior_state, &request.planned_state);
        if !changes.is_empty() {
            tracing::debug!("Updating VXC {} with {:?}", uid, changes);
            let result = match self.provider_data.client.vxcs().update(&uid, &changes).await {
                Ok(()) => wait_provisioned(&ctx, &self.provider_data, &uid).await.map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics: vec![api_diagnostic("Failed to update VXC", &e)],
                };
            }
        }

        match self.fetch(&uid).await {
            Ok(Some(vxc)) => {
                let mut state = request.planned_state;
                apply_vxc(&mut state, &vxc);
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
                diagnostics: vec![api_diagnostic("Failed to read VXC", &e)],
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

        tracing::info!("Cancelling VXC {}", uid);
        let diagnostics = match cancel_product(&self.provider_data.client, &uid).await {
            Ok(()) => vec![],
            Err(e) => vec![api_diagnostic("Failed to delete VXC", &e)],
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
