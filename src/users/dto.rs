use serde::Deserialize;

use crate::store::types::Role;

#[derive(Debug, Deserialize)]
pub struct RegisterUserRequest {
    pub id: i64,
    pub role: Role,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct SetAvailabilityRequest {
    pub available: bool,
}
