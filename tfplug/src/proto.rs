//! Protocol buffer types for Terraform Plugin Protocol v6
//!
//! The subset of `tfplugin6.proto` this framework serves, declared directly
//! with prost derives so the crate builds without protoc. Field numbers follow
//! the upstream proto; fields that are never read or written are left out,
//! prost skips them on decode.
//!
//! # Type Naming
//!
//! The layout mirrors prost-build output:
//! - Top-level messages become structs (e.g., `DynamicValue`, `Schema`)
//! - RPC methods have nested `Request` and `Response` types in snake_case modules
//!   (e.g., `get_provider_schema::Request`, `read_resource::Response`)
//! - Nested messages are in sub-modules (e.g., `diagnostic::Severity`)
//! - The gRPC service trait is available as `provider_server::Provider`
//!
//! Some protobuf types have the same names as tfplug framework types. Always
//! use the `proto::` prefix when referring to protobuf types.

use std::collections::HashMap;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DynamicValue {
    #[prost(bytes = "vec", tag = "1")]
    pub msgpack: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub json: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Diagnostic {
    #[prost(enumeration = "diagnostic::Severity", tag = "1")]
    pub severity: i32,
    #[prost(string, tag = "2")]
    pub summary: String,
    #[prost(string, tag = "3")]
    pub detail: String,
    #[prost(message, optional, tag = "4")]
    pub attribute: Option<AttributePath>,
}

pub mod diagnostic {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Severity {
        Invalid = 0,
        Error = 1,
        Warning = 2,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AttributePath {
    #[prost(message, repeated, tag = "1")]
    pub steps: Vec<attribute_path::Step>,
}

pub mod attribute_path {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Step {
        #[prost(oneof = "step::Selector", tags = "1, 2, 3")]
        pub selector: Option<step::Selector>,
    }

    pub mod step {
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Selector {
            #[prost(string, tag = "1")]
            AttributeName(String),
            #[prost(string, tag = "2")]
            ElementKeyString(String),
            #[prost(int64, tag = "3")]
            ElementKeyInt(i64),
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RawState {
    #[prost(bytes = "vec", tag = "1")]
    pub json: Vec<u8>,
    #[prost(map = "string, string", tag = "2")]
    pub flatmap: HashMap<String, String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum StringKind {
    Plain = 0,
    Markdown = 1,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Schema {
    #[prost(int64, tag = "1")]
    pub version: i64,
    #[prost(message, optional, tag = "2")]
    pub block: Option<schema::Block>,
}

pub mod schema {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Block {
        #[prost(int64, tag = "1")]
        pub version: i64,
        #[prost(message, repeated, tag = "2")]
        pub attributes: Vec<Attribute>,
        #[prost(message, repeated, tag = "3")]
        pub block_types: Vec<NestedBlock>,
        #[prost(string, tag = "4")]
        pub description: String,
        #[prost(enumeration = "super::StringKind", tag = "5")]
        pub description_kind: i32,
        #[prost(bool, tag = "6")]
        pub deprecated: bool,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Attribute {
        #[prost(string, tag = "1")]
        pub name: String,
        /// JSON type constraint
        #[prost(bytes = "vec", tag = "2")]
        pub r#type: Vec<u8>,
        #[prost(string, tag = "3")]
        pub description: String,
        #[prost(bool, tag = "4")]
        pub required: bool,
        #[prost(bool, tag = "5")]
        pub optional: bool,
        #[prost(bool, tag = "6")]
        pub computed: bool,
        #[prost(bool, tag = "7")]
        pub sensitive: bool,
        #[prost(enumeration = "super::StringKind", tag = "8")]
        pub description_kind: i32,
        #[prost(bool, tag = "9")]
        pub deprecated: bool,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct NestedBlock {
        #[prost(string, tag = "1")]
        pub type_name: String,
        #[prost(message, optional, tag = "2")]
        pub block: Option<Block>,
        #[prost(enumeration = "nested_block::NestingMode", tag = "3")]
        pub nesting: i32,
        #[prost(int64, tag = "4")]
        pub min_items: i64,
        #[prost(int64, tag = "5")]
        pub max_items: i64,
    }

    pub mod nested_block {
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration,
        )]
        #[repr(i32)]
        pub enum NestingMode {
            Invalid = 0,
            Single = 1,
            List = 2,
            Set = 3,
            Map = 4,
            Group = 5,
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServerCapabilities {
    #[prost(bool, tag = "1")]
    pub plan_destroy: bool,
    #[prost(bool, tag = "2")]
    pub get_provider_schema_optional: bool,
    #[prost(bool, tag = "3")]
    pub move_resource_state: bool,
}

pub mod get_metadata {
    use super::{Diagnostic, ServerCapabilities};

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Request {}

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Response {
        #[prost(message, optional, tag = "1")]
        pub server_capabilities: Option<ServerCapabilities>,
        #[prost(message, repeated, tag = "2")]
        pub diagnostics: Vec<Diagnostic>,
        #[prost(message, repeated, tag = "3")]
        pub data_sources: Vec<DataSourceMetadata>,
        #[prost(message, repeated, tag = "4")]
        pub resources: Vec<ResourceMetadata>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct DataSourceMetadata {
        #[prost(string, tag = "1")]
        pub type_name: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ResourceMetadata {
        #[prost(string, tag = "1")]
        pub type_name: String,
    }
}

pub mod get_provider_schema {
    use super::{Diagnostic, Schema, ServerCapabilities};
    use std::collections::HashMap;

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Request {}

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Response {
        #[prost(message, optional, tag = "1")]
        pub provider: Option<Schema>,
        #[prost(map = "string, message", tag = "2")]
        pub resource_schemas: HashMap<String, Schema>,
        #[prost(map = "string, message", tag = "3")]
        pub data_source_schemas: HashMap<String, Schema>,
        #[prost(message, repeated, tag = "4")]
        pub diagnostics: Vec<Diagnostic>,
        #[prost(message, optional, tag = "5")]
        pub provider_meta: Option<Schema>,
        #[prost(message, optional, tag = "6")]
        pub server_capabilities: Option<ServerCapabilities>,
    }
}

pub mod validate_provider_config {
    use super::{Diagnostic, DynamicValue};

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Request {
        #[prost(message, optional, tag = "1")]
        pub config: Option<DynamicValue>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Response {
        #[prost(message, repeated, tag = "2")]
        pub diagnostics: Vec<Diagnostic>,
    }
}

pub mod validate_resource_config {
    use super::{Diagnostic, DynamicValue};

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Request {
        #[prost(string, tag = "1")]
        pub type_name: String,
        #[prost(message, optional, tag = "2")]
        pub config: Option<DynamicValue>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Response {
        #[prost(message, repeated, tag = "1")]
        pub diagnostics: Vec<Diagnostic>,
    }
}

pub mod validate_data_resource_config {
    use super::{Diagnostic, DynamicValue};

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Request {
        #[prost(string, tag = "1")]
        pub type_name: String,
        #[prost(message, optional, tag = "2")]
        pub config: Option<DynamicValue>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Response {
        #[prost(message, repeated, tag = "1")]
        pub diagnostics: Vec<Diagnostic>,
    }
}

pub mod upgrade_resource_state {
    use super::{Diagnostic, DynamicValue, RawState};

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Request {
        #[prost(string, tag = "1")]
        pub type_name: String,
        #[prost(int64, tag = "2")]
        pub version: i64,
        #[prost(message, optional, tag = "3")]
        pub raw_state: Option<RawState>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Response {
        #[prost(message, optional, tag = "1")]
        pub upgraded_state: Option<DynamicValue>,
        #[prost(message, repeated, tag = "2")]
        pub diagnostics: Vec<Diagnostic>,
    }
}

pub mod configure_provider {
    use super::{Diagnostic, DynamicValue};

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Request {
        #[prost(string, tag = "1")]
        pub terraform_version: String,
        #[prost(message, optional, tag = "2")]
        pub config: Option<DynamicValue>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Response {
        #[prost(message, repeated, tag = "1")]
        pub diagnostics: Vec<Diagnostic>,
    }
}

pub mod read_resource {
    use super::{Diagnostic, DynamicValue};

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Request {
        #[prost(string, tag = "1")]
        pub type_name: String,
        #[prost(message, optional, tag = "2")]
        pub current_state: Option<DynamicValue>,
        #[prost(bytes = "vec", tag = "3")]
        pub private: Vec<u8>,
        #[prost(message, optional, tag = "4")]
        pub provider_meta: Option<DynamicValue>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Response {
        #[prost(message, optional, tag = "1")]
        pub new_state: Option<DynamicValue>,
        #[prost(message, repeated, tag = "2")]
        pub diagnostics: Vec<Diagnostic>,
        #[prost(bytes = "vec", tag = "3")]
        pub private: Vec<u8>,
    }
}

pub mod plan_resource_change {
    use super::{AttributePath, Diagnostic, DynamicValue};

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Request {
        #[prost(string, tag = "1")]
        pub type_name: String,
        #[prost(message, optional, tag = "2")]
        pub prior_state: Option<DynamicValue>,
        #[prost(message, optional, tag = "3")]
        pub proposed_new_state: Option<DynamicValue>,
        #[prost(message, optional, tag = "4")]
        pub config: Option<DynamicValue>,
        #[prost(bytes = "vec", tag = "5")]
        pub prior_private: Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Response {
        #[prost(message, optional, tag = "1")]
        pub planned_state: Option<DynamicValue>,
        #[prost(message, repeated, tag = "2")]
        pub requires_replace: Vec<AttributePath>,
        #[prost(bytes = "vec", tag = "3")]
        pub planned_private: Vec<u8>,
        #[prost(message, repeated, tag = "4")]
        pub diagnostics: Vec<Diagnostic>,
        #[prost(bool, tag = "5")]
        pub legacy_type_system: bool,
    }
}

pub mod apply_resource_change {
    use super::{Diagnostic, DynamicValue};

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Request {
        #[prost(string, tag = "1")]
        pub type_name: String,
        #[prost(message, optional, tag = "2")]
        pub prior_state: Option<DynamicValue>,
        #[prost(message, optional, tag = "3")]
        pub planned_state: Option<DynamicValue>,
        #[prost(message, optional, tag = "4")]
        pub config: Option<DynamicValue>,
        #[prost(bytes = "vec", tag = "5")]
        pub planned_private: Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Response {
        #[prost(message, optional, tag = "1")]
        pub new_state: Option<DynamicValue>,
        #[prost(bytes = "vec", tag = "2")]
        pub private: Vec<u8>,
        #[prost(message, repeated, tag = "3")]
        pub diagnostics: Vec<Diagnostic>,
        #[prost(bool, tag = "4")]
        pub legacy_type_system: bool,
    }
}

pub mod import_resource_state {
    use super::{Diagnostic, DynamicValue};

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Request {
        #[prost(string, tag = "1")]
        pub type_name: String,
        #[prost(string, tag = "2")]
        pub id: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ImportedResource {
        #[prost(string, tag = "1")]
        pub type_name: String,
        #[prost(message, optional, tag = "2")]
        pub state: Option<DynamicValue>,
        #[prost(bytes = "vec", tag = "3")]
        pub private: Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Response {
        #[prost(message, repeated, tag = "1")]
        pub imported_resources: Vec<ImportedResource>,
        #[prost(message, repeated, tag = "2")]
        pub diagnostics: Vec<Diagnostic>,
    }
}

pub mod read_data_source {
    use super::{Diagnostic, DynamicValue};

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Request {
        #[prost(string, tag = "1")]
        pub type_name: String,
        #[prost(message, optional, tag = "2")]
        pub config: Option<DynamicValue>,
        #[prost(message, optional, tag = "3")]
        pub provider_meta: Option<DynamicValue>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Response {
        #[prost(message, optional, tag = "1")]
        pub state: Option<DynamicValue>,
        #[prost(message, repeated, tag = "2")]
        pub diagnostics: Vec<Diagnostic>,
    }
}

pub mod stop_provider {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Request {}

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Response {
        #[prost(string, tag = "1")]
        pub error: String,
    }
}

/// Server side of the `tfplugin6.Provider` service, in the shape tonic-build
/// generates: a service trait plus a `ProviderServer` that routes HTTP/2
/// requests by path.
pub mod provider_server {
    use tonic::codegen::*;

    #[tonic::async_trait]
    pub trait Provider: std::marker::Send + std::marker::Sync + 'static {
        async fn get_metadata(
            &self,
            request: tonic::Request<super::get_metadata::Request>,
        ) -> std::result::Result<tonic::Response<super::get_metadata::Response>, tonic::Status>;
        async fn get_provider_schema(
            &self,
            request: tonic::Request<super::get_provider_schema::Request>,
        ) -> std::result::Result<
            tonic::Response<super::get_provider_schema::Response>,
            tonic::Status,
        >;
        async fn validate_provider_config(
            &self,
            request: tonic::Request<super::validate_provider_config::Request>,
        ) -> std::result::Result<
            tonic::Response<super::validate_provider_config::Response>,
            tonic::Status,
        >;
        async fn validate_resource_config(
            &self,
            request: tonic::Request<super::validate_resource_config::Request>,
        ) -> std::result::Result<
            tonic::Response<super::validate_resource_config::Response>,
            tonic::Status,
        >;
        async fn validate_data_resource_config(
            &self,
            request: tonic::Request<super::validate_data_resource_config::Request>,
        ) -> std::result::Result<
            tonic::Response<super::validate_data_resource_config::Response>,
            tonic::Status,
        >;
        async fn upgrade_resource_state(
            &self,
            request: tonic::Request<super::upgrade_resource_state::Request>,
        ) -> std::result::Result<
            tonic::Response<super::upgrade_resource_state::Response>,
            tonic::Status,
        >;
        async fn configure_provider(
            &self,
            request: tonic::Request<super::configure_provider::Request>,
        ) -> std::result::Result<
            tonic::Response<super::configure_provider::Response>,
            tonic::Status,
        >;
        async fn read_resource(
            &self,
            request: tonic::Request<super::read_resource::Request>,
        ) -> std::result::Result<tonic::Response<super::read_resource::Response>, tonic::Status>;
        async fn plan_resource_change(
            &self,
            request: tonic::Request<super::plan_resource_change::Request>,
        ) -> std::result::Result<
            tonic::Response<super::plan_resource_change::Response>,
            tonic::Status,
        >;
        async fn apply_resource_change(
            &self,
            request: tonic::Request<super::apply_resource_change::Request>,
        ) -> std::result::Result<
            tonic::Response<super::apply_resource_change::Response>,
            tonic::Status,
        >;
        async fn import_resource_state(
            &self,
            request: tonic::Request<super::import_resource_state::Request>,
        ) -> std::result::Result<
            tonic::Response<super::import_resource_state::Response>,
            tonic::Status,
        >;
        async fn read_data_source(
            &self,
            request: tonic::Request<super::read_data_source::Request>,
        ) -> std::result::Result<tonic::Response<super::read_data_source::Response>, tonic::Status>;
        async fn stop_provider(
            &self,
            request: tonic::Request<super::stop_provider::Request>,
        ) -> std::result::Result<tonic::Response<super::stop_provider::Response>, tonic::Status>;
    }

    #[derive(Debug)]
    pub struct ProviderServer<T> {
        inner: Arc<T>,
        max_decoding_message_size: Option<usize>,
        max_encoding_message_size: Option<usize>,
    }

    impl<T> ProviderServer<T> {
        pub fn new(inner: T) -> Self {
            Self::from_arc(Arc::new(inner))
        }

        pub fn from_arc(inner: Arc<T>) -> Self {
            Self {
                inner,
                max_decoding_message_size: None,
                max_encoding_message_size: None,
            }
        }

        /// Limits the maximum size of a decoded message (default 4MB)
        pub fn max_decoding_message_size(mut self, limit: usize) -> Self {
            self.max_decoding_message_size = Some(limit);
            self
        }

        /// Limits the maximum size of an encoded message (default usize::MAX)
        pub fn max_encoding_message_size(mut self, limit: usize) -> Self {
            self.max_encoding_message_size = Some(limit);
            self
        }
    }

    /// One routing arm: wraps a trait method as a `UnaryService` and runs it
    /// through a prost codec.
    macro_rules! unary {
        ($server:ident, $req:ident, $method:ident, $module:ident) => {{
            struct Svc<T: Provider>(Arc<T>);

            impl<T: Provider> tonic::server::UnaryService<super::$module::Request> for Svc<T> {
                type Response = super::$module::Response;
                type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;

                fn call(
                    &mut self,
                    request: tonic::Request<super::$module::Request>,
                ) -> Self::Future {
                    let inner = Arc::clone(&self.0);
                    Box::pin(async move { <T as Provider>::$method(&inner, request).await })
                }
            }

            let inner = $server.inner.clone();
            let max_decoding_message_size = $server.max_decoding_message_size;
            let max_encoding_message_size = $server.max_encoding_message_size;
            Box::pin(async move {
                let codec = tonic::codec::ProstCodec::default();
                let mut grpc = tonic::server::Grpc::new(codec).apply_max_message_size_config(
                    max_decoding_message_size,
                    max_encoding_message_size,
                );
                Ok(grpc.unary(Svc(inner), $req).await)
            })
        }};
    }

    impl<T, B> tonic::codegen::Service<http::Request<B>> for ProviderServer<T>
    where
        T: Provider,
        B: Body + std::marker::Send + 'static,
        B::Error: Into<StdError> + std::marker::Send + 'static,
    {
        type Response = http::Response<tonic::body::Body>;
        type Error = std::convert::Infallible;
        type Future = BoxFuture<Self::Response, Self::Error>;

        fn poll_ready(
            &mut self,
            _cx: &mut Context<'_>,
        ) -> Poll<std::result::Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: http::Request<B>) -> Self::Future {
            match req.uri().path() {
                "/tfplugin6.Provider/GetMetadata" => unary!(self, req, get_metadata, get_metadata),
                "/tfplugin6.Provider/GetProviderSchema" => {
                    unary!(self, req, get_provider_schema, get_provider_schema)
                }
                "/tfplugin6.Provider/ValidateProviderConfig" => {
                    unary!(self, req, validate_provider_config, validate_provider_config)
                }
                "/tfplugin6.Provider/ValidateResourceConfig" => {
                    unary!(self, req, validate_resource_config, validate_resource_config)
                }
                "/tfplugin6.Provider/ValidateDataResourceConfig" => unary!(
                    self,
                    req,
                    validate_data_resource_config,
                    validate_data_resource_config
                ),
                "/tfplugin6.Provider/UpgradeResourceState" => {
                    unary!(self, req, upgrade_resource_state, upgrade_resource_state)
                }
                "/tfplugin6.Provider/ConfigureProvider" => {
                    unary!(self, req, configure_provider, configure_provider)
                }
                "/tfplugin6.Provider/ReadResource" => {
                    unary!(self, req, read_resource, read_resource)
                }
                "/tfplugin6.Provider/PlanResourceChange" => {
                    unary!(self, req, plan_resource_change, plan_resource_change)
                }
                "/tfplugin6.Provider/ApplyResourceChange" => {
                    unary!(self, req, apply_resource_change, apply_resource_change)
                }
                "/tfplugin6.Provider/ImportResourceState" => {
                    unary!(self, req, import_resource_state, import_resource_state)
                }
                "/tfplugin6.Provider/ReadDataSource" => {
                    unary!(self, req, read_data_source, read_data_source)
                }
                "/tfplugin6.Provider/StopProvider" => {
                    unary!(self, req, stop_provider, stop_provider)
                }
                _ => Box::pin(async move {
                    let mut response = http::Response::new(tonic::body::Body::default());
                    let headers = response.headers_mut();
                    headers.insert(
                        tonic::Status::GRPC_STATUS,
                        (tonic::Code::Unimplemented as i32).into(),
                    );
                    headers.insert(
                        http::header::CONTENT_TYPE,
                        tonic::metadata::GRPC_CONTENT_TYPE,
                    );
                    Ok(response)
                }),
            }
        }
    }

    impl<T> Clone for ProviderServer<T> {
        fn clone(&self) -> Self {
            Self {
                inner: self.inner.clone(),
                max_decoding_message_size: self.max_decoding_message_size,
                max_encoding_message_size: self.max_encoding_message_size,
            }
        }
    }

    pub const SERVICE_NAME: &str = "tfplugin6.Provider";

    impl<T> tonic::server::NamedService for ProviderServer<T> {
        const NAME: &'static str = SERVICE_NAME;
    }
}

// Re-export the gRPC service trait and server
pub use provider_server::{Provider as ProviderService, ProviderServer};

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn nested_types_accessible() {
        let _ = diagnostic::Severity::Invalid;
        let _ = attribute_path::step::Selector::AttributeName("test".to_string());
        let _ = schema::nested_block::NestingMode::Single;
    }

    #[test]
    fn dynamic_value_wire_format() {
        let value = DynamicValue {
            msgpack: vec![0xc0],
            json: Vec::new(),
        };
        // field 1, length-delimited, one byte
        assert_eq!(value.encode_to_vec(), vec![0x0a, 0x01, 0xc0]);
    }

    #[test]
    fn validate_provider_config_diagnostics_use_field_two() {
        let response = validate_provider_config::Response {
            diagnostics: vec![Diagnostic {
                severity: diagnostic::Severity::Error as i32,
                summary: "x".to_string(),
                ..Default::default()
            }],
        };
        let bytes = response.encode_to_vec();
        // field 2, wire type 2
        assert_eq!(bytes[0], 0x12);
    }

    #[test]
    fn attribute_path_round_trips() {
        let path = AttributePath {
            steps: vec![
                attribute_path::Step {
                    selector: Some(attribute_path::step::Selector::AttributeName(
                        "a_end".to_string(),
                    )),
                },
                attribute_path::Step {
                    selector: Some(attribute_path::step::Selector::ElementKeyInt(0)),
                },
            ],
        };
        let decoded = AttributePath::decode(path.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded, path);
    }
}
