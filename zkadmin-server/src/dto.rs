//! Request and response bodies.
//!
//! Every request field is optional so that a missing argument reaches the
//! service and comes back as a validation error with its code.

use serde::{Deserialize, Serialize};
use zkadmin_types::ConnState;

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub alias: Option<String>,
    pub hosts: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnStateRequest {
    /// Required by the hosts-keyed route, ignored by the alias-keyed one.
    #[serde(default)]
    pub hosts: Option<String>,
    pub conn_state: ConnState,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedResponse {
    pub updated: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PathQuery {
    pub path_id: Option<String>,
    pub version: Option<i32>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreatePathRequest {
    pub path_id: Option<String>,
    pub data: Option<String>,
    pub create_mode: Option<i32>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePathRequest {
    pub new_id: Option<String>,
    pub old_id: Option<String>,
    pub data: Option<String>,
    pub version: Option<i32>,
    pub create_mode: Option<i32>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CopyPasteRequest {
    pub copy: Option<String>,
    pub paste: Option<String>,
    pub new_base_name: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PathIdResponse {
    pub path_id: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CopyPasteResponse {
    pub created: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorBody {
    pub code: u32,
    pub message: String,
}
