//! Company users (employees)

use super::common::null_as_default;
use super::{ApiError, Client};
use serde::{Deserialize, Serialize};

/// Roles a user can hold in the Megaport portal
pub const USER_POSITIONS: &[&str] = &[
    "Company Admin",
    "Technical Admin",
    "Technical Contact",
    "Finance",
    "Financial Contact",
    "Read Only",
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub employee_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub person_uid: String,
    #[serde(default)]
    pub party_id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub position: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub phone: String,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub position: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub active: bool,
}

/// Creation answers with the new ids only
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedUser {
    employee_id: i64,
}

pub struct UsersApi<'a> {
    client: &'a Client,
}

impl<'a> UsersApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /v2/employee/{id}
    pub async fn get(&self, employee_id: i64) -> Result<User, ApiError> {
        self.client
            .get(&format!("/v2/employee/{}", employee_id))
            .await
    }

    /// POST /v2/employee, returning the new employee id
    pub async fn create(&self, request: &UserRequest) -> Result<i64, ApiError> {
        let created: CreatedUser = self.client.post("/v2/employee", request).await?;
        Ok(created.employee_id)
    }

    /// PUT /v2/employee/{id}
    pub async fn update(&self, employee_id: i64, request: &UserRequest) -> Result<(), ApiError> {
        self.client
            .put::<serde_json::Value, _>(&format!("/v2/employee/{}", employee_id), request)
            .await
            .map(|_| ())
    }

    /// DELETE /v2/employee/{id}
    pub async fn delete(&self, employee_id: i64) -> Result<(), ApiError> {
        self.client
            .delete::<serde_json::Value>(&format!("/v2/employee/{}", employee_id))
            .await
            .map(|_| ())
    }
}
