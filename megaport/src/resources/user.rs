//! User (company employee) resource implementation

use crate::api::users::{User, UserRequest, USER_POSITIONS};
use crate::provider_data::MegaportProviderData;
use crate::values::{api_diagnostic, set_optional_string};
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::plan_modifier::UseStateForUnknown;
use tfplug::resource::{
    CreateResourceRequest, CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource, ModifyPlanRequest,
    ModifyPlanResponse, ReadResourceRequest, ReadResourceResponse, Resource,
    UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::StringOneOfValidator;

pub const TYPE_NAME: &str = "megaport_user";

pub struct UserResource {
    provider_data: MegaportProviderData,
}

impl UserResource {
    pub fn new(provider_data: MegaportProviderData) -> Self {
        Self { provider_data }
    }

    pub fn schema() -> Schema {
        let id = |name: &str, type_: AttributeType, description: &str| {
            AttributeBuilder::new(name, type_)
                .description(description)
                .computed()
                .plan_modifier(Box::new(UseStateForUnknown))
                .build()
        };
        let required = |name: &str| {
            AttributeBuilder::new(name, AttributeType::String)
                .required()
                .build()
        };

        SchemaBuilder::new()
            .version(0)
            .description("Manages a user in the Megaport company account")
            .attribute(id("employee_id", AttributeType::Number, "Employee id"))
            .attribute(id("person_uid", AttributeType::String, "Person UID"))
            .attribute(id("party_id", AttributeType::Number, "Company party id"))
            .attribute(required("first_name"))
            .attribute(required("last_name"))
            .attribute(required("email"))
            .attribute(
                AttributeBuilder::new("position", AttributeType::String)
                    .description("Portal role of the user")
                    .required()
                    .validator(Box::new(StringOneOfValidator::new(USER_POSITIONS.iter().copied())))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("phone", AttributeType::String)
                    .description("Phone number in international format")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("active", AttributeType::Bool)
                    .description("Whether the user can log in; defaults to true")
                    .optional()
                    .computed()
                    .build(),
            )
            .build()
    }

    fn request(state: &DynamicValue) -> Result<UserRequest, Diagnostic> {
        let required = |name: &str| {
            state.get_string(&AttributePath::new(name)).map_err(|_| {
                Diagnostic::error(
                    format!("Missing {}", name),
                    format!("The '{}' attribute is required", name),
                )
                .with_attribute(AttributePath::new(name))
            })
        };

        Ok(UserRequest {
            first_name: required("first_name")?,
            last_name: required("last_name")?,
            email: required("email")?,
            position: required("position")?,
            phone: state
                .get_string_opt(&AttributePath::new("phone"))
                .filter(|p| !p.is_empty()),
            active: state
                .get_bool_opt(&AttributePath::new("active"))
                .unwrap_or(true),
        })
    }

    async fn refresh(&self, mut state: DynamicValue, employee_id: i64) -> ReadResourceResponse {
        match self.provider_data.client.users().get(employee_id).await {
            Ok(user) => {
                apply_user(&mut state, &user);
                ReadResourceResponse {
                    new_state: Some(state),
                    diagnostics: vec![],
                }
            }
            Err(e) if e.is_not_found() => ReadResourceResponse {
                new_state: None,
                diagnostics: vec![],
            },
            Err(e) => ReadResourceResponse {
                new_state: Some(state),
                diagnostics: vec![api_diagnostic("Failed to read user", &e)],
            },
        }
    }
}

fn employee_id(state: &DynamicValue) -> Result<i64, Diagnostic> {
    state
        .get_i64(&AttributePath::new("employee_id"))
        .map_err(|_| {
            Diagnostic::error("Missing employee_id", "The user has no employee id in state")
                .with_attribute(AttributePath::new("employee_id"))
        })
}

fn apply_user(state: &mut DynamicValue, user: &User) {
    let _ = state.set_value(
        &AttributePath::new("employee_id"),
        Dynamic::from(user.employee_id),
    );
    let _ = state.set_string(&AttributePath::new("person_uid"), user.person_uid.clone());
    let _ = state.set_value(&AttributePath::new("party_id"), Dynamic::from(user.party_id));
    let _ = state.set_string(&AttributePath::new("first_name"), user.first_name.clone());
    let _ = state.set_string(&AttributePath::new("last_name"), user.last_name.clone());
    let _ = state.set_string(&AttributePath::new("email"), user.email.clone());
    let _ = state.set_string(&AttributePath::new("position"), user.position.clone());
    set_optional_string(state, &AttributePath::new("phone"), &user.phone);
    let _ = state.set_bool(&AttributePath::new("active"), user.active);
}

#[async_trait]
impl Resource for UserResource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn modify_plan(&self, _ctx: Context, request: ModifyPlanRequest) -> ModifyPlanResponse {
        let mut planned = request.planned_state;
        let active = AttributePath::new("active");
        if planned.get(&active).is_some_and(Dynamic::is_unknown) {
            let _ = planned.set_bool(&active, true);
        }

        ModifyPlanResponse {
            planned_state: planned,
            requires_replace: vec![],
            diagnostics: vec![],
        }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let body = match Self::request(&request.planned_state) {
            Ok(body) => body,
            Err(diag) => {
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics: vec![diag],
                }
            }
        };

        let employee_id = match self.provider_data.client.users().create(&body).await {
            Ok(id) => id,
            Err(e) => {
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics: vec![api_diagnostic("Failed to create user", &e)],
                }
            }
        };
        tracing::info!("Created user {}", employee_id);

        let response = self.refresh(request.planned_state.clone(), employee_id).await;
        match response.new_state {
            Some(state) => CreateResourceResponse {
                new_state: state,
                diagnostics: response.diagnostics,
            },
            None => {
                let mut state = request.planned_state;
                crate::values::unknowns_to_null(&mut state.value);
                let _ = state.set_value(
                    &AttributePath::new("employee_id"),
                    Dynamic::from(employee_id),
                );
                CreateResourceResponse {
                    new_state: state,
                    diagnostics: vec![Diagnostic::error(
                        "User not found",
                        format!("User {} disappeared right after creation", employee_id),
                    )],
                }
            }
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        match employee_id(&request.current_state) {
            Ok(id) => self.refresh(request.current_state, id).await,
            Err(diag) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![diag],
            },
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let parsed = employee_id(&request.prior_state)
            .and_then(|id| Ok((id, Self::request(&request.planned_state)?)));
        let (id, body) = match parsed {
            Ok(parsed) => parsed,
            Err(diag) => {
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics: vec![diag],
                }
            }
        };

        if let Err(e) = self.provider_data.client.users().update(id, &body).await {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![api_diagnostic("Failed to update user", &e)],
            };
        }

        let response = self.refresh(request.planned_state, id).await;
        match response.new_state {
            Some(state) => UpdateResourceResponse {
                new_state: state,
                diagnostics: response.diagnostics,
            },
            None => UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![Diagnostic::error(
                    "User not found",
                    format!("User {} disappeared during the update", id),
                )],
            },
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let id = match employee_id(&request.prior_state) {
            Ok(id) => id,
            Err(diag) => {
                return DeleteResourceResponse {
                    diagnostics: vec![diag],
                }
            }
        };

        let diagnostics = match self.provider_data.client.users().delete(id).await {
            Ok(()) => vec![],
            Err(e) if e.is_not_found() => {
                tracing::warn!("User {} was already gone", id);
                vec![]
            }
            Err(e) => vec![api_diagnostic("Failed to delete user", &e)],
        };
        DeleteResourceResponse { diagnostics }
    }

    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let Ok(id) = request.id.trim().parse::<i64>() else {
            return ImportResourceStateResponse {
                imported_resources: vec![],
                diagnostics: vec![Diagnostic::error(
                    "Invalid import ID",
                    format!("Expected a numeric employee id, got \"{}\"", request.id),
                )],
            };
        };

        let mut state = DynamicValue::object();
        let _ = state.set_value(&AttributePath::new("employee_id"), Dynamic::from(id));
        ImportResourceStateResponse {
            imported_resources: vec![ImportedResource {
                type_name: request.type_name,
                state,
            }],
            diagnostics: vec![],
        }
    }
}
