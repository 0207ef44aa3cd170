//! DataSource trait and related types

use crate::context::Context;
use crate::types::{Diagnostic, DynamicValue};
use async_trait::async_trait;

/// Base trait for data sources - implement read operations
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Type name should be constant (e.g., "example_lookup")
    /// MUST match the key used in Provider.data_source_schemas()
    fn type_name(&self) -> &str;

    /// Called to read data - this is the only operation for data sources
    /// MUST populate all attributes in response.state
    async fn read(&self, ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse;
}

pub struct ReadDataSourceRequest {
    pub type_name: String,
    pub config: DynamicValue,
}

pub struct ReadDataSourceResponse {
    pub state: DynamicValue,
    pub diagnostics: Vec<Diagnostic>,
}

impl ReadDataSourceResponse {
    /// A failed read: null state plus the error diagnostic
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            state: DynamicValue::null(),
            diagnostics: vec![Diagnostic::error(summary, detail)],
        }
    }
}
