//! Resource trait and related types
//!
//! This module defines the Resource trait, its request/response types and the
//! import helpers resources use for `terraform import`.

use crate::context::Context;
use crate::types::{AttributePath, Diagnostic, DynamicValue};
use async_trait::async_trait;

/// Base trait for resources - implement CRUD operations
/// Type name should be constant and match the key in Provider.resource_schemas()
#[async_trait]
pub trait Resource: Send + Sync {
    /// Type name should be constant (e.g., "example_widget")
    fn type_name(&self) -> &str;

    /// Called to create a new resource
    /// MUST populate all attributes in response.new_state (including computed)
    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse;

    /// Called to read current state - used for refresh and after import
    /// MUST return None if the remote object no longer exists
    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse;

    /// Called to update an existing resource
    /// MUST apply all changes from planned_state to the resource
    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse;

    /// Called to delete a resource
    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse;

    /// Called during planning AFTER the framework marked computed attributes
    /// unknown and ran schema plan modifiers. Not called for destroy plans.
    async fn modify_plan(&self, _ctx: Context, request: ModifyPlanRequest) -> ModifyPlanResponse {
        ModifyPlanResponse {
            planned_state: request.planned_state,
            requires_replace: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Called during "terraform import"; the imported state is then refreshed
    /// through `read`
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        ImportResourceStateResponse {
            imported_resources: Vec::new(),
            diagnostics: vec![Diagnostic::error(
                "Resource Import Not Implemented",
                format!("{} does not support import", request.type_name),
            )],
        }
    }
}

pub struct CreateResourceRequest {
    pub type_name: String,
    pub planned_state: DynamicValue,
    pub config: DynamicValue,
}

pub struct CreateResourceResponse {
    pub new_state: DynamicValue,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ReadResourceRequest {
    pub type_name: String,
    pub current_state: DynamicValue,
}

pub struct ReadResourceResponse {
    pub new_state: Option<DynamicValue>,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct UpdateResourceRequest {
    pub type_name: String,
    pub prior_state: DynamicValue,
    pub planned_state: DynamicValue,
    pub config: DynamicValue,
}

pub struct UpdateResourceResponse {
    pub new_state: DynamicValue,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct DeleteResourceRequest {
    pub type_name: String,
    pub prior_state: DynamicValue,
}

pub struct DeleteResourceResponse {
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ModifyPlanRequest {
    pub type_name: String,
    pub config: DynamicValue,
    /// Null when the resource is being created
    pub prior_state: DynamicValue,
    pub planned_state: DynamicValue,
}

pub struct ModifyPlanResponse {
    pub planned_state: DynamicValue,
    pub requires_replace: Vec<AttributePath>,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ImportResourceStateRequest {
    pub type_name: String,
    pub id: String,
}

pub struct ImportResourceStateResponse {
    pub imported_resources: Vec<ImportedResource>,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ImportedResource {
    pub type_name: String,
    pub state: DynamicValue,
}

/// Imports by writing the import ID into a single state attribute
///
/// Example: ID "uid-123" -> state.id = "uid-123"
pub fn import_state_passthrough_id(
    attr_path: AttributePath,
    request: &ImportResourceStateRequest,
) -> ImportResourceStateResponse {
    let mut response = ImportResourceStateResponse {
        imported_resources: Vec::new(),
        diagnostics: Vec::new(),
    };

    if request.id.trim().is_empty() {
        response.diagnostics.push(
            Diagnostic::error(
                "Invalid import ID",
                "The import ID must not be empty".to_string(),
            )
            .with_attribute(attr_path),
        );
        return response;
    }

    let mut state = DynamicValue::object();
    if let Err(e) = state.set_string(&attr_path, request.id.clone()) {
        response.diagnostics.push(
            Diagnostic::error(
                format!("Failed to set import ID: {}", e),
                format!("Could not set attribute '{}' to '{}'", attr_path, request.id),
            )
            .with_attribute(attr_path),
        );
        return response;
    }

    response.imported_resources.push(ImportedResource {
        type_name: request.type_name.clone(),
        state,
    });
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_import_sets_attribute() {
        let request = ImportResourceStateRequest {
            type_name: "example_widget".to_string(),
            id: "uid-123".to_string(),
        };

        let response = import_state_passthrough_id(AttributePath::new("id"), &request);

        assert!(response.diagnostics.is_empty());
        assert_eq!(response.imported_resources.len(), 1);
        assert_eq!(
            response.imported_resources[0]
                .state
                .get_string(&AttributePath::new("id"))
                .unwrap(),
            "uid-123"
        );
    }

    #[test]
    fn passthrough_import_rejects_blank_id() {
        let request = ImportResourceStateRequest {
            type_name: "example_widget".to_string(),
            id: "  ".to_string(),
        };

        let response = import_state_passthrough_id(AttributePath::new("id"), &request);

        assert!(response.imported_resources.is_empty());
        assert_eq!(response.diagnostics.len(), 1);
    }
}
