//! Typed task properties from the inbound property bag.
//!
//! The hosting pipeline delivers a flat string-keyed map. Everything the
//! reporting collaborators need is validated up front: every missing
//! mandatory key is reported in one error, the hub must come from the
//! allow-list, and GUID-typed values must parse.

use crate::error::{Result, TaskError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub const AUTH_TOKEN_KEY: &str = "AuthToken";
pub const HUB_NAME_KEY: &str = "HubName";
pub const PLAN_URL_KEY: &str = "PlanUrl";
pub const JOB_ID_KEY: &str = "JobId";
pub const PLAN_ID_KEY: &str = "PlanId";
pub const TIMELINE_ID_KEY: &str = "TimelineId";
pub const PROJECT_ID_KEY: &str = "ProjectId";
pub const TASK_INSTANCE_ID_KEY: &str = "TaskInstanceId";
pub const TASK_INSTANCE_NAME_KEY: &str = "TaskInstanceName";
pub const REQUEST_TYPE_KEY: &str = "RequestType";

const MANDATORY_KEYS: [&str; 6] = [
    AUTH_TOKEN_KEY,
    HUB_NAME_KEY,
    PLAN_URL_KEY,
    JOB_ID_KEY,
    PLAN_ID_KEY,
    TIMELINE_ID_KEY,
];

const ALLOWED_HUBS: [&str; 3] = ["Build", "Release", "Gates"];

/// How the hosting pipeline wants the task handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    Execute,
    Cancel,
}

impl RequestType {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("cancel") {
            RequestType::Cancel
        } else {
            RequestType::Execute
        }
    }
}

/// Validated identity and credential fields for one task invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskProperties {
    pub auth_token: String,
    pub hub_name: String,
    pub plan_url: String,
    pub job_id: Uuid,
    pub plan_id: Uuid,
    pub timeline_id: Uuid,
    pub project_id: Option<Uuid>,
    pub task_instance_id: Option<Uuid>,
    pub task_instance_name: Option<String>,
    pub request_type: RequestType,
}

impl TaskProperties {
    /// Build validated properties from the flat property bag.
    pub fn from_map(properties: &HashMap<String, String>) -> Result<Self> {
        let missing: Vec<String> = MANDATORY_KEYS
            .iter()
            .filter(|key| {
                properties
                    .get(**key)
                    .map(|v| v.trim().is_empty())
                    .unwrap_or(true)
            })
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(TaskError::MissingProperties { keys: missing });
        }

        let hub_name = properties[HUB_NAME_KEY].clone();
        if !ALLOWED_HUBS.iter().any(|hub| *hub == hub_name) {
            return Err(TaskError::UnsupportedHub(hub_name));
        }

        Ok(TaskProperties {
            auth_token: properties[AUTH_TOKEN_KEY].clone(),
            hub_name,
            plan_url: properties[PLAN_URL_KEY].clone(),
            job_id: parse_guid(properties, JOB_ID_KEY)?,
            plan_id: parse_guid(properties, PLAN_ID_KEY)?,
            timeline_id: parse_guid(properties, TIMELINE_ID_KEY)?,
            project_id: parse_optional_guid(properties, PROJECT_ID_KEY)?,
            task_instance_id: parse_optional_guid(properties, TASK_INSTANCE_ID_KEY)?,
            task_instance_name: properties.get(TASK_INSTANCE_NAME_KEY).cloned(),
            request_type: properties
                .get(REQUEST_TYPE_KEY)
                .map(|v| RequestType::parse(v))
                .unwrap_or(RequestType::Execute),
        })
    }
}

fn parse_guid(properties: &HashMap<String, String>, key: &str) -> Result<Uuid> {
    let value = &properties[key];
    Uuid::parse_str(value.trim()).map_err(|_| TaskError::InvalidGuid {
        key: key.to_string(),
        value: value.clone(),
    })
}

fn parse_optional_guid(properties: &HashMap<String, String>, key: &str) -> Result<Option<Uuid>> {
    match properties.get(key) {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => Uuid::parse_str(value.trim())
            .map(Some)
            .map_err(|_| TaskError::InvalidGuid {
                key: key.to_string(),
                value: value.clone(),
            }),
    }
}
