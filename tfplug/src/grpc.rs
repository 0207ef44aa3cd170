//! gRPC service implementation for the Terraform Plugin Protocol v6
//!
//! `GrpcProvider` adapts a [`Provider`] to the `tfplugin6.Provider` service.
//! Resources and data sources are created per call through the provider's
//! factories; schemas drive validation, conforming and planning.

use crate::context::Context;
use crate::data_source::ReadDataSourceRequest;
use crate::plan_modifier::values_equal;
use crate::proto::{self, provider_server::Provider as ProtoProvider};
use crate::provider::{ConfigureProviderRequest, Provider};
use crate::resource::{
    CreateResourceRequest, DeleteResourceRequest, ImportResourceStateRequest, ModifyPlanRequest,
    ReadResourceRequest, UpdateResourceRequest,
};
use crate::schema::{Attribute, Block, NestedBlock, NestingMode, Schema, StringKind};
use crate::types::{
    AttributePath, AttributePathStep, Diagnostic, DiagnosticSeverity, DynamicValue,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

pub struct GrpcProvider<P: Provider> {
    provider: Arc<RwLock<P>>,
    /// Root context, cancelled by StopProvider
    stop: Context,
}

impl<P: Provider + 'static> GrpcProvider<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider: Arc::new(RwLock::new(provider)),
            stop: Context::new(),
        }
    }

    async fn resource_schema(&self, type_name: &str) -> Option<Schema> {
        let provider = self.provider.read().await;
        provider.resource_schemas().await.remove(type_name)
    }

    async fn data_source_schema(&self, type_name: &str) -> Option<Schema> {
        let provider = self.provider.read().await;
        provider.data_source_schemas().await.remove(type_name)
    }
}

#[tonic::async_trait]
impl<P: Provider + 'static> ProtoProvider for GrpcProvider<P> {
    async fn get_metadata(
        &self,
        _request: Request<proto::get_metadata::Request>,
    ) -> std::result::Result<Response<proto::get_metadata::Response>, Status> {
        let provider = self.provider.read().await;

        let mut resources: Vec<String> = provider.resource_schemas().await.into_keys().collect();
        let mut data_sources: Vec<String> =
            provider.data_source_schemas().await.into_keys().collect();
        resources.sort();
        data_sources.sort();

        Ok(Response::new(proto::get_metadata::Response {
            server_capabilities: Some(server_capabilities()),
            diagnostics: vec![],
            data_sources: data_sources
                .into_iter()
                .map(|type_name| proto::get_metadata::DataSourceMetadata { type_name })
                .collect(),
            resources: resources
                .into_iter()
                .map(|type_name| proto::get_metadata::ResourceMetadata { type_name })
                .collect(),
        }))
    }

    async fn get_provider_schema(
        &self,
        _request: Request<proto::get_provider_schema::Request>,
    ) -> std::result::Result<Response<proto::get_provider_schema::Response>, Status> {
        let provider = self.provider.read().await;

        Ok(Response::new(proto::get_provider_schema::Response {
            provider: Some(convert_schema(&provider.schema())),
            resource_schemas: convert_schemas(&provider.resource_schemas().await),
            data_source_schemas: convert_schemas(&provider.data_source_schemas().await),
            diagnostics: vec![],
            provider_meta: None,
            server_capabilities: Some(server_capabilities()),
        }))
    }

    async fn validate_provider_config(
        &self,
        request: Request<proto::validate_provider_config::Request>,
    ) -> std::result::Result<Response<proto::validate_provider_config::Response>, Status> {
        let req = request.into_inner();
        let config = decode_dynamic_value(req.config.as_ref())?;

        let schema = self.provider.read().await.schema();
        let diagnostics = schema.validate_config(&config);

        Ok(Response::new(proto::validate_provider_config::Response {
            diagnostics: convert_diagnostics(diagnostics),
        }))
    }

    async fn validate_resource_config(
        &self,
        request: Request<proto::validate_resource_config::Request>,
    ) -> std::result::Result<Response<proto::validate_resource_config::Response>, Status> {
        let req = request.into_inner();

        let diagnostics = match self.resource_schema(&req.type_name).await {
            Some(schema) => {
                let config = decode_dynamic_value(req.config.as_ref())?;
                schema.validate_config(&config)
            }
            None => vec![unknown_type("resource", &req.type_name)],
        };

        Ok(Response::new(proto::validate_resource_config::Response {
            diagnostics: convert_diagnostics(diagnostics),
        }))
    }

    async fn validate_data_resource_config(
        &self,
        request: Request<proto::validate_data_resource_config::Request>,
    ) -> std::result::Result<Response<proto::validate_data_resource_config::Response>, Status>
    {
        let req = request.into_inner();

        let diagnostics = match self.data_source_schema(&req.type_name).await {
            Some(schema) => {
                let config = decode_dynamic_value(req.config.as_ref())?;
                schema.validate_config(&config)
            }
            None => vec![unknown_type("data source", &req.type_name)],
        };

        Ok(Response::new(
            proto::validate_data_resource_config::Response {
                diagnostics: convert_diagnostics(diagnostics),
            },
        ))
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<proto::upgrade_resource_state::Request>,
    ) -> std::result::Result<Response<proto::upgrade_resource_state::Response>, Status> {
        let req = request.into_inner();

        let Some(schema) = self.resource_schema(&req.type_name).await else {
            return Ok(Response::new(proto::upgrade_resource_state::Response {
                upgraded_state: None,
                diagnostics: convert_diagnostics(vec![unknown_type("resource", &req.type_name)]),
            }));
        };

        let raw_state = req.raw_state.unwrap_or_default();
        if raw_state.json.is_empty() && !raw_state.flatmap.is_empty() {
            return Ok(Response::new(proto::upgrade_resource_state::Response {
                upgraded_state: None,
                diagnostics: convert_diagnostics(vec![Diagnostic::error(
                    "Unsupported state format",
                    format!("{} state is stored in the legacy flatmap format", req.type_name),
                )]),
            }));
        }

        if req.version > schema.version {
            warn!(
                type_name = %req.type_name,
                stored = req.version,
                current = schema.version,
                "state was written by a newer schema version"
            );
        }

        let state = DynamicValue::decode_json(&raw_state.json)
            .map_err(|e| Status::invalid_argument(e.to_string()))?;
        // Dropping removed attributes and adding new ones is all an upgrade needs today
        let upgraded = schema.conform(&state);

        Ok(Response::new(proto::upgrade_resource_state::Response {
            upgraded_state: Some(encode_dynamic_value(&upgraded)?),
            diagnostics: vec![],
        }))
    }

    async fn configure_provider(
        &self,
        request: Request<proto::configure_provider::Request>,
    ) -> std::result::Result<Response<proto::configure_provider::Response>, Status> {
        let req = request.into_inner();
        let config = decode_dynamic_value(req.config.as_ref())?;

        info!(terraform_version = %req.terraform_version, "configuring provider");

        let mut provider = self.provider.write().await;
        let config = provider.schema().conform(&config);
        let response = provider
            .configure(
                self.stop.clone(),
                ConfigureProviderRequest {
                    terraform_version: req.terraform_version,
                    config,
                },
            )
            .await;

        Ok(Response::new(proto::configure_provider::Response {
            diagnostics: convert_diagnostics(response.diagnostics),
        }))
    }

    async fn read_resource(
        &self,
        request: Request<proto::read_resource::Request>,
    ) -> std::result::Result<Response<proto::read_resource::Response>, Status> {
        let req = request.into_inner();
        debug!(type_name = %req.type_name, "read_resource");

        let current_state = decode_dynamic_value(req.current_state.as_ref())?;
        if current_state.is_null() {
            return Ok(Response::new(proto::read_resource::Response {
                new_state: req.current_state,
                diagnostics: vec![],
                private: req.private,
            }));
        }

        let Some(schema) = self.resource_schema(&req.type_name).await else {
            return Ok(Response::new(proto::read_resource::Response {
                new_state: req.current_state,
                diagnostics: convert_diagnostics(vec![unknown_type("resource", &req.type_name)]),
                private: req.private,
            }));
        };

        let resource = {
            let provider = self.provider.read().await;
            provider.create_resource(&req.type_name).await
        };
        let resource = match resource {
            Ok(resource) => resource,
            Err(e) => {
                return Ok(Response::new(proto::read_resource::Response {
                    new_state: req.current_state,
                    diagnostics: convert_diagnostics(vec![factory_error(&e)]),
                    private: req.private,
                }))
            }
        };

        let response = resource
            .read(
                self.stop.clone(),
                ReadResourceRequest {
                    type_name: req.type_name.clone(),
                    current_state,
                },
            )
            .await;

        let new_state = match response.new_state {
            Some(state) => schema.conform(&state),
            None => {
                info!(type_name = %req.type_name, "resource no longer exists, removing from state");
                DynamicValue::null()
            }
        };

        Ok(Response::new(proto::read_resource::Response {
            new_state: Some(encode_dynamic_value(&new_state)?),
            diagnostics: convert_diagnostics(response.diagnostics),
            private: req.private,
        }))
    }

    async fn plan_resource_change(
        &self,
        request: Request<proto::plan_resource_change::Request>,
    ) -> std::result::Result<Response<proto::plan_resource_change::Response>, Status> {
        let req = request.into_inner();
        debug!(type_name = %req.type_name, "plan_resource_change");

        let prior_state = decode_dynamic_value(req.prior_state.as_ref())?;
        let proposed = decode_dynamic_value(req.proposed_new_state.as_ref())?;
        let config = decode_dynamic_value(req.config.as_ref())?;

        let unchanged = |planned_state| proto::plan_resource_change::Response {
            planned_state,
            requires_replace: vec![],
            planned_private: req.prior_private.clone(),
            diagnostics: vec![],
            legacy_type_system: false,
        };

        // Destroy plans pass through untouched
        if proposed.is_null() {
            return Ok(Response::new(unchanged(req.proposed_new_state.clone())));
        }

        if !prior_state.is_null() && values_equal(&prior_state.value, &proposed.value) {
            return Ok(Response::new(unchanged(req.prior_state.clone())));
        }

        let Some(schema) = self.resource_schema(&req.type_name).await else {
            let mut response = unchanged(req.proposed_new_state.clone());
            response.diagnostics =
                convert_diagnostics(vec![unknown_type("resource", &req.type_name)]);
            return Ok(Response::new(response));
        };

        let creating = prior_state.is_null();
        let mut planned = schema.conform(&proposed);
        schema
            .block
            .mark_computed_unknown(&config.value, &mut planned.value, creating);

        let mut requires_replace = Vec::new();
        let mut diagnostics = Vec::new();
        if !creating {
            schema.block.apply_plan_modifiers(
                &AttributePath::root(),
                &prior_state.value,
                &config.value,
                &mut planned.value,
                &mut requires_replace,
                &mut diagnostics,
            );
        }

        let resource = {
            let provider = self.provider.read().await;
            provider.create_resource(&req.type_name).await
        };
        match resource {
            Ok(resource) => {
                let response = resource
                    .modify_plan(
                        self.stop.clone(),
                        ModifyPlanRequest {
                            type_name: req.type_name.clone(),
                            config,
                            prior_state,
                            planned_state: planned,
                        },
                    )
                    .await;
                planned = response.planned_state;
                diagnostics.extend(response.diagnostics);
                for path in response.requires_replace {
                    if !requires_replace.contains(&path) {
                        requires_replace.push(path);
                    }
                }
            }
            Err(e) => diagnostics.push(factory_error(&e)),
        }

        if creating {
            requires_replace.clear();
        }

        Ok(Response::new(proto::plan_resource_change::Response {
            planned_state: Some(encode_dynamic_value(&planned)?),
            requires_replace: requires_replace.iter().map(convert_attribute_path).collect(),
            planned_private: req.prior_private,
            diagnostics: convert_diagnostics(diagnostics),
            legacy_type_system: false,
        }))
    }

    async fn apply_resource_change(
        &self,
        request: Request<proto::apply_resource_change::Request>,
    ) -> std::result::Result<Response<proto::apply_resource_change::Response>, Status> {
        let req = request.into_inner();

        let prior_state = decode_dynamic_value(req.prior_state.as_ref())?;
        let planned_state = decode_dynamic_value(req.planned_state.as_ref())?;
        let config = decode_dynamic_value(req.config.as_ref())?;

        let failed = |diagnostic: Diagnostic, new_state| proto::apply_resource_change::Response {
            new_state,
            private: vec![],
            diagnostics: convert_diagnostics(vec![diagnostic]),
            legacy_type_system: false,
        };

        let Some(schema) = self.resource_schema(&req.type_name).await else {
            return Ok(Response::new(failed(
                unknown_type("resource", &req.type_name),
                req.prior_state.clone(),
            )));
        };

        let resource = {
            let provider = self.provider.read().await;
            provider.create_resource(&req.type_name).await
        };
        let resource = match resource {
            Ok(resource) => resource,
            Err(e) => return Ok(Response::new(failed(factory_error(&e), req.prior_state))),
        };

        let ctx = self.stop.clone();
        let (new_state, diagnostics) = if planned_state.is_null() {
            info!(type_name = %req.type_name, "deleting resource");
            let response = resource
                .delete(
                    ctx,
                    DeleteResourceRequest {
                        type_name: req.type_name.clone(),
                        prior_state: prior_state.clone(),
                    },
                )
                .await;
            // keep the prior state when the delete failed so Terraform retries
            let new_state = if crate::types::has_errors(&response.diagnostics) {
                prior_state
            } else {
                DynamicValue::null()
            };
            (new_state, response.diagnostics)
        } else if prior_state.is_null() {
            info!(type_name = %req.type_name, "creating resource");
            let response = resource
                .create(
                    ctx,
                    CreateResourceRequest {
                        type_name: req.type_name.clone(),
                        planned_state,
                        config,
                    },
                )
                .await;
            (schema.conform(&response.new_state), response.diagnostics)
        } else {
            info!(type_name = %req.type_name, "updating resource");
            let response = resource
                .update(
                    ctx,
                    UpdateResourceRequest {
                        type_name: req.type_name.clone(),
                        prior_state,
                        planned_state,
                        config,
                    },
                )
                .await;
            (schema.conform(&response.new_state), response.diagnostics)
        };

        Ok(Response::new(proto::apply_resource_change::Response {
            new_state: Some(encode_dynamic_value(&new_state)?),
            private: vec![],
            diagnostics: convert_diagnostics(diagnostics),
            legacy_type_system: false,
        }))
    }

    async fn import_resource_state(
        &self,
        request: Request<proto::import_resource_state::Request>,
    ) -> std::result::Result<Response<proto::import_resource_state::Response>, Status> {
        let req = request.into_inner();
        info!(type_name = %req.type_name, id = %req.id, "importing resource");

        let failed = |diagnostic| proto::import_resource_state::Response {
            imported_resources: vec![],
            diagnostics: convert_diagnostics(vec![diagnostic]),
        };

        let Some(schema) = self.resource_schema(&req.type_name).await else {
            return Ok(Response::new(failed(unknown_type("resource", &req.type_name))));
        };

        let resource = {
            let provider = self.provider.read().await;
            provider.create_resource(&req.type_name).await
        };
        let resource = match resource {
            Ok(resource) => resource,
            Err(e) => return Ok(Response::new(failed(factory_error(&e)))),
        };

        let response = resource
            .import_state(
                self.stop.clone(),
                ImportResourceStateRequest {
                    type_name: req.type_name,
                    id: req.id,
                },
            )
            .await;

        let imported_resources = response
            .imported_resources
            .into_iter()
            .map(|imported| {
                Ok(proto::import_resource_state::ImportedResource {
                    type_name: imported.type_name,
                    state: Some(encode_dynamic_value(&schema.conform(&imported.state))?),
                    private: vec![],
                })
            })
            .collect::<std::result::Result<Vec<_>, Status>>()?;

        Ok(Response::new(proto::import_resource_state::Response {
            imported_resources,
            diagnostics: convert_diagnostics(response.diagnostics),
        }))
    }

    async fn read_data_source(
        &self,
        request: Request<proto::read_data_source::Request>,
    ) -> std::result::Result<Response<proto::read_data_source::Response>, Status> {
        let req = request.into_inner();
        debug!(type_name = %req.type_name, "read_data_source");

        let failed = |diagnostic| proto::read_data_source::Response {
            state: None,
            diagnostics: convert_diagnostics(vec![diagnostic]),
        };

        let Some(schema) = self.data_source_schema(&req.type_name).await else {
            return Ok(Response::new(failed(unknown_type(
                "data source",
                &req.type_name,
            ))));
        };

        let data_source = {
            let provider = self.provider.read().await;
            provider.create_data_source(&req.type_name).await
        };
        let data_source = match data_source {
            Ok(data_source) => data_source,
            Err(e) => return Ok(Response::new(failed(factory_error(&e)))),
        };

        let config = schema.conform(&decode_dynamic_value(req.config.as_ref())?);
        let response = data_source
            .read(
                self.stop.clone(),
                ReadDataSourceRequest {
                    type_name: req.type_name,
                    config,
                },
            )
            .await;

        let state = if response.state.is_null() {
            None
        } else {
            Some(encode_dynamic_value(&schema.conform(&response.state))?)
        };

        Ok(Response::new(proto::read_data_source::Response {
            state,
            diagnostics: convert_diagnostics(response.diagnostics),
        }))
    }

    async fn stop_provider(
        &self,
        _request: Request<proto::stop_provider::Request>,
    ) -> std::result::Result<Response<proto::stop_provider::Response>, Status> {
        info!("stop requested, cancelling in-flight operations");
        self.stop.cancel();

        Ok(Response::new(proto::stop_provider::Response {
            error: String::new(),
        }))
    }
}

fn server_capabilities() -> proto::ServerCapabilities {
    proto::ServerCapabilities {
        plan_destroy: true,
        get_provider_schema_optional: false,
        move_resource_state: false,
    }
}

fn unknown_type(kind: &str, type_name: &str) -> Diagnostic {
    Diagnostic::error(
        format!("Unknown {} type", kind),
        format!("The {} type \"{}\" is not supported by this provider", kind, type_name),
    )
}

fn factory_error(e: &crate::TfplugError) -> Diagnostic {
    Diagnostic::error(
        e.to_string(),
        "Ensure the provider block is configured before using this resource",
    )
}

/// Decodes a protocol value, preferring msgpack over JSON
pub fn decode_dynamic_value(
    value: Option<&proto::DynamicValue>,
) -> std::result::Result<DynamicValue, Status> {
    let Some(value) = value else {
        return Ok(DynamicValue::null());
    };

    let decoded = if !value.msgpack.is_empty() {
        DynamicValue::decode_msgpack(&value.msgpack)
    } else {
        DynamicValue::decode_json(&value.json)
    };

    decoded.map_err(Status::from)
}

pub fn encode_dynamic_value(
    value: &DynamicValue,
) -> std::result::Result<proto::DynamicValue, Status> {
    Ok(proto::DynamicValue {
        msgpack: value.encode_msgpack().map_err(Status::from)?,
        json: vec![],
    })
}

pub fn convert_diagnostics(diagnostics: Vec<Diagnostic>) -> Vec<proto::Diagnostic> {
    diagnostics
        .into_iter()
        .map(|d| proto::Diagnostic {
            severity: match d.severity {
                DiagnosticSeverity::Invalid => proto::diagnostic::Severity::Invalid,
                DiagnosticSeverity::Error => proto::diagnostic::Severity::Error,
                DiagnosticSeverity::Warning => proto::diagnostic::Severity::Warning,
            } as i32,
            summary: d.summary,
            detail: d.detail,
            attribute: d.attribute.as_ref().map(convert_attribute_path),
        })
        .collect()
}

pub fn convert_attribute_path(path: &AttributePath) -> proto::AttributePath {
    use proto::attribute_path::{step::Selector, Step};

    proto::AttributePath {
        steps: path
            .steps
            .iter()
            .map(|step| Step {
                selector: Some(match step {
                    AttributePathStep::AttributeName(name) => Selector::AttributeName(name.clone()),
                    AttributePathStep::ElementKeyString(key) => {
                        Selector::ElementKeyString(key.clone())
                    }
                    AttributePathStep::ElementKeyInt(idx) => Selector::ElementKeyInt(*idx),
                }),
            })
            .collect(),
    }
}

pub fn convert_schema(schema: &Schema) -> proto::Schema {
    proto::Schema {
        version: schema.version,
        block: Some(convert_block(&schema.block)),
    }
}

fn convert_block(block: &Block) -> proto::schema::Block {
    proto::schema::Block {
        version: block.version,
        attributes: block.attributes.iter().map(convert_attribute).collect(),
        block_types: block.block_types.iter().map(convert_nested_block).collect(),
        description: block.description.clone(),
        description_kind: convert_string_kind(block.description_kind) as i32,
        deprecated: block.deprecated,
    }
}

fn convert_attribute(attr: &Attribute) -> proto::schema::Attribute {
    proto::schema::Attribute {
        name: attr.name.clone(),
        r#type: attr.r#type.to_bytes(),
        description: attr.description.clone(),
        required: attr.required,
        optional: attr.optional,
        computed: attr.computed,
        sensitive: attr.sensitive,
        description_kind: proto::StringKind::Plain as i32,
        deprecated: attr.deprecated,
    }
}

fn convert_nested_block(nested: &NestedBlock) -> proto::schema::NestedBlock {
    use proto::schema::nested_block::NestingMode as ProtoNesting;

    let nesting = match nested.nesting {
        NestingMode::Invalid => ProtoNesting::Invalid,
        NestingMode::Single => ProtoNesting::Single,
        NestingMode::List => ProtoNesting::List,
        NestingMode::Set => ProtoNesting::Set,
        NestingMode::Map => ProtoNesting::Map,
        NestingMode::Group => ProtoNesting::Group,
    };

    proto::schema::NestedBlock {
        type_name: nested.type_name.clone(),
        block: Some(convert_block(&nested.block)),
        nesting: nesting as i32,
        min_items: nested.min_items,
        max_items: nested.max_items,
    }
}

fn convert_string_kind(kind: StringKind) -> proto::StringKind {
    match kind {
        StringKind::Plain => proto::StringKind::Plain,
        StringKind::Markdown => proto::StringKind::Markdown,
    }
}

/// Schemas keyed by type name, converted for the wire
pub fn convert_schemas(schemas: &HashMap<String, Schema>) -> HashMap<String, proto::Schema> {
    schemas
        .iter()
        .map(|(name, schema)| (name.clone(), convert_schema(schema)))
        .collect()
}
