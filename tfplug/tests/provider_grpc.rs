//! Drives a small provider through the gRPC service the way Terraform does

#![allow(clippy::disallowed_methods)] // Allow unwrap() in tests for clarity

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tfplug::data_source::{ReadDataSourceRequest, ReadDataSourceResponse};
use tfplug::grpc::GrpcProvider;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::proto::{self, provider_server::Provider as ProtoProvider};
use tfplug::provider::{ConfigureProviderRequest, ConfigureProviderResponse};
use tfplug::resource::*;
use tfplug::schema::NestingMode;
use tfplug::{
    AttributeBuilder, AttributePath, AttributeType, Context, DataSource, Diagnostic, Dynamic,
    DynamicValue, NestedBlockBuilder, Provider, Resource, Result, Schema, SchemaBuilder,
};
use tonic::Request;

#[derive(Default)]
struct Calls {
    created: AtomicUsize,
    deleted: AtomicUsize,
}

struct TestProvider {
    configured: Option<String>,
    calls: Arc<Calls>,
}

impl TestProvider {
    fn new(calls: Arc<Calls>) -> Self {
        Self {
            configured: None,
            calls,
        }
    }
}

fn widget_schema() -> Schema {
    SchemaBuilder::new()
        .attribute(
            AttributeBuilder::new("id", AttributeType::String)
                .computed()
                .plan_modifier(Box::new(UseStateForUnknown))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("name", AttributeType::String)
                .required()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("size", AttributeType::Number)
                .required()
                .plan_modifier(Box::new(RequiresReplace))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("status", AttributeType::String)
                .computed()
                .build(),
        )
        .block(
            NestedBlockBuilder::new("port", NestingMode::List)
                .attribute(
                    AttributeBuilder::new("number", AttributeType::Number)
                        .required()
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("label", AttributeType::String)
                        .computed()
                        .build(),
                )
                .build(),
        )
        .build()
}

fn lookup_schema() -> Schema {
    SchemaBuilder::new()
        .attribute(
            AttributeBuilder::new("name", AttributeType::String)
                .required()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("greeting", AttributeType::String)
                .computed()
                .build(),
        )
        .build()
}

#[async_trait]
impl Provider for TestProvider {
    fn type_name(&self) -> &str {
        "test"
    }

    fn schema(&self) -> Schema {
        SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("token", AttributeType::String)
                    .optional()
                    .sensitive()
                    .build(),
            )
            .build()
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        match request.config.get_string_opt(&AttributePath::new("token")) {
            Some(token) => {
                self.configured = Some(token);
                ConfigureProviderResponse::default()
            }
            None => ConfigureProviderResponse {
                diagnostics: vec![Diagnostic::error("token is required", "")],
            },
        }
    }

    async fn resource_schemas(&self) -> HashMap<String, Schema> {
        HashMap::from([("test_widget".to_string(), widget_schema())])
    }

    async fn data_source_schemas(&self) -> HashMap<String, Schema> {
        HashMap::from([("test_lookup".to_string(), lookup_schema())])
    }

    async fn create_resource(&self, name: &str) -> Result<Box<dyn Resource>> {
        self.configured.as_ref().ok_or("Provider not configured")?;
        match name {
            "test_widget" => Ok(Box::new(WidgetResource {
                calls: self.calls.clone(),
            })),
            _ => Err(format!("Unknown resource: {}", name).into()),
        }
    }

    async fn create_data_source(&self, name: &str) -> Result<Box<dyn DataSource>> {
        self.configured.as_ref().ok_or("Provider not configured")?;
        match name {
            "test_lookup" => Ok(Box::new(LookupDataSource)),
            _ => Err(format!("Unknown data source: {}", name).into()),
        }
    }
}

struct WidgetResource {
    calls: Arc<Calls>,
}

#[async_trait]
impl Resource for WidgetResource {
    fn type_name(&self) -> &str {
        "test_widget"
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        self.calls.created.fetch_add(1, Ordering::SeqCst);
        let mut state = request.planned_state;
        state.set_string(&AttributePath::new("id"), "w-1").unwrap();
        state.set_string(&AttributePath::new("status"), "LIVE").unwrap();
        let ports = state.get_list(&AttributePath::new("port")).unwrap();
        for i in 0..ports.len() {
            state
                .set_string(
                    &AttributePath::new("port").index(i as i64).attribute("label"),
                    format!("port-{}", i),
                )
                .unwrap();
        }
        CreateResourceResponse {
            new_state: state,
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let gone = request
            .current_state
            .get_string_opt(&AttributePath::new("id"))
            .as_deref()
            == Some("gone");
        ReadResourceResponse {
            new_state: if gone {
                None
            } else {
                Some(request.current_state)
            },
            diagnostics: vec![],
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let mut state = request.planned_state;
        state.set_string(&AttributePath::new("status"), "LIVE").unwrap();
        UpdateResourceResponse {
            new_state: state,
            diagnostics: vec![],
        }
    }

    async fn delete(&self, _ctx: Context, _request: DeleteResourceRequest) -> DeleteResourceResponse {
        self.calls.deleted.fetch_add(1, Ordering::SeqCst);
        DeleteResourceResponse {
            diagnostics: vec![],
        }
    }

    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_state_passthrough_id(AttributePath::new("id"), &request)
    }
}

struct LookupDataSource;

#[async_trait]
impl DataSource for LookupDataSource {
    fn type_name(&self) -> &str {
        "test_lookup"
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let name = request
            .config
            .get_string(&AttributePath::new("name"))
            .unwrap();
        let mut state = request.config;
        state
            .set_string(&AttributePath::new("greeting"), format!("hello {}", name))
            .unwrap();
        ReadDataSourceResponse {
            state,
            diagnostics: vec![],
        }
    }
}

fn obj(pairs: &[(&str, Dynamic)]) -> Dynamic {
    Dynamic::Map(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    )
}

fn s(v: &str) -> Dynamic {
    Dynamic::String(v.to_string())
}

fn wire(value: Dynamic) -> Option<proto::DynamicValue> {
    Some(proto::DynamicValue {
        msgpack: DynamicValue::new(value).encode_msgpack().unwrap(),
        json: vec![],
    })
}

fn unwire(value: Option<proto::DynamicValue>) -> DynamicValue {
    DynamicValue::decode_msgpack(&value.unwrap().msgpack).unwrap()
}

async fn configured_server() -> (GrpcProvider<TestProvider>, Arc<Calls>) {
    let calls = Arc::new(Calls::default());
    let server = GrpcProvider::new(TestProvider::new(calls.clone()));
    let response = server
        .configure_provider(Request::new(proto::configure_provider::Request {
            terraform_version: "1.9.0".to_string(),
            config: wire(obj(&[("token", s("secret"))])),
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(response.diagnostics.is_empty());
    (server, calls)
}

#[tokio::test]
async fn metadata_lists_sorted_types() {
    let server = GrpcProvider::new(TestProvider::new(Arc::default()));
    let response = server
        .get_metadata(Request::new(proto::get_metadata::Request {}))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.resources[0].type_name, "test_widget");
    assert_eq!(response.data_sources[0].type_name, "test_lookup");
    assert!(response.server_capabilities.unwrap().plan_destroy);
}

#[tokio::test]
async fn schema_is_served_before_configure() {
    let server = GrpcProvider::new(TestProvider::new(Arc::default()));
    let response = server
        .get_provider_schema(Request::new(proto::get_provider_schema::Request {}))
        .await
        .unwrap()
        .into_inner();

    let provider_block = response.provider.unwrap().block.unwrap();
    assert!(provider_block.attributes[0].sensitive);

    let widget = response.resource_schemas["test_widget"].block.clone().unwrap();
    assert_eq!(widget.attributes.len(), 4);
    assert_eq!(widget.block_types[0].type_name, "port");
}

#[tokio::test]
async fn validate_resource_config_reports_missing_required() {
    let server = GrpcProvider::new(TestProvider::new(Arc::default()));
    let response = server
        .validate_resource_config(Request::new(proto::validate_resource_config::Request {
            type_name: "test_widget".to_string(),
            config: wire(obj(&[("name", s("a")), ("size", Dynamic::Null)])),
        }))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.diagnostics.len(), 1);
    assert_eq!(response.diagnostics[0].summary, "Missing required argument");
}

#[tokio::test]
async fn configure_failure_is_reported() {
    let server = GrpcProvider::new(TestProvider::new(Arc::default()));
    let response = server
        .configure_provider(Request::new(proto::configure_provider::Request {
            terraform_version: "1.9.0".to_string(),
            config: wire(obj(&[])),
        }))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.diagnostics.len(), 1);
    assert_eq!(
        response.diagnostics[0].severity,
        proto::diagnostic::Severity::Error as i32
    );
}

#[tokio::test]
async fn read_before_configure_returns_diagnostic() {
    let server = GrpcProvider::new(TestProvider::new(Arc::default()));
    let response = server
        .read_data_source(Request::new(proto::read_data_source::Request {
            type_name: "test_lookup".to_string(),
            config: wire(obj(&[("name", s("x"))])),
            provider_meta: None,
        }))
        .await
        .unwrap()
        .into_inner();

    assert!(response.state.is_none());
    assert!(response.diagnostics[0].summary.contains("Provider not configured"));
}

#[tokio::test]
async fn plan_create_marks_computed_unknown() {
    let (server, _) = configured_server().await;
    let config = obj(&[
        ("name", s("w")),
        ("size", Dynamic::Number(3.0)),
        ("port", Dynamic::List(vec![obj(&[("number", Dynamic::Number(1.0))])])),
    ]);

    let response = server
        .plan_resource_change(Request::new(proto::plan_resource_change::Request {
            type_name: "test_widget".to_string(),
            prior_state: wire(Dynamic::Null),
            proposed_new_state: wire(config.clone()),
            config: wire(config),
            prior_private: vec![],
        }))
        .await
        .unwrap()
        .into_inner();

    let planned = unwire(response.planned_state);
    assert!(planned.get(&AttributePath::new("id")).unwrap().is_unknown());
    assert!(planned.get(&AttributePath::new("status")).unwrap().is_unknown());
    assert!(planned
        .get(&AttributePath::new("port").index(0).attribute("label"))
        .unwrap()
        .is_unknown());
    assert!(response.requires_replace.is_empty());
}

#[tokio::test]
async fn plan_update_keeps_id_and_flags_replacement() {
    let (server, _) = configured_server().await;
    let prior = obj(&[
        ("id", s("w-1")),
        ("name", s("w")),
        ("size", Dynamic::Number(3.0)),
        ("status", s("LIVE")),
        ("port", Dynamic::List(vec![])),
    ]);
    let config = obj(&[
        ("id", Dynamic::Null),
        ("name", s("w")),
        ("size", Dynamic::Number(5.0)),
        ("status", Dynamic::Null),
        ("port", Dynamic::List(vec![])),
    ]);
    let proposed = obj(&[
        ("id", s("w-1")),
        ("name", s("w")),
        ("size", Dynamic::Number(5.0)),
        ("status", s("LIVE")),
        ("port", Dynamic::List(vec![])),
    ]);

    let response = server
        .plan_resource_change(Request::new(proto::plan_resource_change::Request {
            type_name: "test_widget".to_string(),
            prior_state: wire(prior),
            proposed_new_state: wire(proposed),
            config: wire(config),
            prior_private: vec![],
        }))
        .await
        .unwrap()
        .into_inner();

    let planned = unwire(response.planned_state);
    assert_eq!(planned.get_string(&AttributePath::new("id")).unwrap(), "w-1");
    assert!(planned.get(&AttributePath::new("status")).unwrap().is_unknown());
    assert_eq!(response.requires_replace.len(), 1);
}

#[tokio::test]
async fn plan_without_changes_returns_prior_state() {
    let (server, _) = configured_server().await;
    let prior = obj(&[
        ("id", s("w-1")),
        ("name", s("w")),
        ("size", Dynamic::Number(3.0)),
        ("status", s("LIVE")),
        ("port", Dynamic::List(vec![])),
    ]);

    let response = server
        .plan_resource_change(Request::new(proto::plan_resource_change::Request {
            type_name: "test_widget".to_string(),
            prior_state: wire(prior.clone()),
            proposed_new_state: wire(prior.clone()),
            config: wire(prior.clone()),
            prior_private: vec![],
        }))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(unwire(response.planned_state).value, prior);
}

#[tokio::test]
async fn apply_creates_and_deletes() {
    let (server, calls) = configured_server().await;
    let planned = obj(&[
        ("id", Dynamic::Unknown),
        ("name", s("w")),
        ("size", Dynamic::Number(3.0)),
        ("status", Dynamic::Unknown),
        ("port", Dynamic::List(vec![obj(&[
            ("number", Dynamic::Number(1.0)),
            ("label", Dynamic::Unknown),
        ])])),
    ]);

    let response = server
        .apply_resource_change(Request::new(proto::apply_resource_change::Request {
            type_name: "test_widget".to_string(),
            prior_state: wire(Dynamic::Null),
            planned_state: wire(planned.clone()),
            config: wire(planned),
            planned_private: vec![],
        }))
        .await
        .unwrap()
        .into_inner();

    let state = unwire(response.new_state);
    assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "w-1");
    assert_eq!(
        state
            .get_string(&AttributePath::new("port").index(0).attribute("label"))
            .unwrap(),
        "port-0"
    );
    assert!(!state.value.contains_unknown());
    assert_eq!(calls.created.load(Ordering::SeqCst), 1);

    let response = server
        .apply_resource_change(Request::new(proto::apply_resource_change::Request {
            type_name: "test_widget".to_string(),
            prior_state: wire(state.value),
            planned_state: wire(Dynamic::Null),
            config: wire(Dynamic::Null),
            planned_private: vec![],
        }))
        .await
        .unwrap()
        .into_inner();

    assert!(unwire(response.new_state).is_null());
    assert_eq!(calls.deleted.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn read_of_missing_resource_returns_null() {
    let (server, _) = configured_server().await;
    let response = server
        .read_resource(Request::new(proto::read_resource::Request {
            type_name: "test_widget".to_string(),
            current_state: wire(obj(&[("id", s("gone"))])),
            private: vec![],
            provider_meta: None,
        }))
        .await
        .unwrap()
        .into_inner();

    assert!(unwire(response.new_state).is_null());
}

#[tokio::test]
async fn import_conforms_state_to_schema() {
    let (server, _) = configured_server().await;
    let response = server
        .import_resource_state(Request::new(proto::import_resource_state::Request {
            type_name: "test_widget".to_string(),
            id: "w-9".to_string(),
        }))
        .await
        .unwrap()
        .into_inner();

    let state = unwire(response.imported_resources[0].state.clone());
    assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "w-9");
    assert_eq!(state.get(&AttributePath::new("name")), Some(&Dynamic::Null));
    assert_eq!(
        state.get(&AttributePath::new("port")),
        Some(&Dynamic::List(vec![]))
    );
}

#[tokio::test]
async fn upgrade_state_from_json() {
    let (server, _) = configured_server().await;
    let response = server
        .upgrade_resource_state(Request::new(proto::upgrade_resource_state::Request {
            type_name: "test_widget".to_string(),
            version: 0,
            raw_state: Some(proto::RawState {
                json: br#"{"id":"w-1","name":"w","size":3,"removed":true}"#.to_vec(),
                flatmap: HashMap::new(),
            }),
        }))
        .await
        .unwrap()
        .into_inner();

    let state = unwire(response.upgraded_state);
    assert_eq!(state.get_i64(&AttributePath::new("size")).unwrap(), 3);
    assert!(state.get(&AttributePath::new("removed")).is_none());
    assert_eq!(state.get(&AttributePath::new("status")), Some(&Dynamic::Null));
}

#[tokio::test]
async fn data_source_read_round_trip() {
    let (server, _) = configured_server().await;
    let response = server
        .read_data_source(Request::new(proto::read_data_source::Request {
            type_name: "test_lookup".to_string(),
            config: wire(obj(&[("name", s("megaport"))])),
            provider_meta: None,
        }))
        .await
        .unwrap()
        .into_inner();

    let state = unwire(response.state);
    assert_eq!(
        state.get_string(&AttributePath::new("greeting")).unwrap(),
        "hello megaport"
    );
}

#[tokio::test]
async fn unknown_resource_type_is_a_diagnostic() {
    let (server, _) = configured_server().await;
    let response = server
        .validate_resource_config(Request::new(proto::validate_resource_config::Request {
            type_name: "test_nothing".to_string(),
            config: wire(obj(&[])),
        }))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.diagnostics[0].summary, "Unknown resource type");
}
