use serde::Deserialize;
use serde_json::{json, Value};

pub const TABLE: &str = "ConfigurationItems";
pub const ALIAS: &str = "ci";

pub const CI_ID: &str = "CiId";
pub const CI_NAME: &str = "CiName";
pub const CI_TYPE: &str = "CiType";
pub const STATUS: &str = "Status";
pub const ENVIRONMENT: &str = "Environment";
pub const SUPPORT_GROUP_ID: &str = "SupportGroupId";

pub const DEFAULT_STATUS: &str = "Active";
pub const DEFAULT_ENVIRONMENT: &str = "Production";

/// Tables whose rows pin a configuration item in place.
pub const SERVICE_MAPPING_TABLE: &str = "ServiceCiMapping";
pub const RELATIONSHIP_TABLE: &str = "CiRelationships";

pub const ASSIGNMENT_GROUP_TABLE: &str = "AssignmentGroups";
pub const ASSIGNMENT_GROUP_ALIAS: &str = "ag";

/// Request body for POST and PUT on /api/configuration-items.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationItemRequest {
    pub ci_name: Option<String>,
    pub ci_type: Option<String>,
    pub sub_type: Option<String>,
    pub status: Option<String>,
    pub environment: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub ip_address: Option<String>,
    pub hostname: Option<String>,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub support_group_id: Option<Value>,
    pub owner: Option<String>,
    pub attributes: Option<Value>,
}

/// Validated, defaulted column values for a configuration item.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationItemFields {
    pub ci_name: String,
    pub ci_type: String,
    pub sub_type: Option<String>,
    pub status: String,
    pub environment: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub ip_address: Option<String>,
    pub hostname: Option<String>,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub support_group_id: Option<i64>,
    pub owner: Option<String>,
    /// Serialized JSON object
    pub attributes: Option<String>,
}

impl ConfigurationItemFields {
    /// Every mutable column with its value; absent optionals become NULL.
    pub fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            (CI_NAME, json!(self.ci_name)),
            (CI_TYPE, json!(self.ci_type)),
            ("SubType", json!(self.sub_type)),
            (STATUS, json!(self.status)),
            (ENVIRONMENT, json!(self.environment)),
            ("Description", json!(self.description)),
            ("Location", json!(self.location)),
            ("IpAddress", json!(self.ip_address)),
            ("Hostname", json!(self.hostname)),
            ("SerialNumber", json!(self.serial_number)),
            ("Manufacturer", json!(self.manufacturer)),
            ("Model", json!(self.model)),
            (SUPPORT_GROUP_ID, json!(self.support_group_id)),
            ("Owner", json!(self.owner)),
            ("Attributes", json!(self.attributes)),
        ]
    }

    /// Key fields echoed back after a write.
    pub fn projection(&self, ci_id: Value) -> Value {
        json!({
            CI_ID: ci_id,
            CI_NAME: self.ci_name,
            CI_TYPE: self.ci_type,
            STATUS: self.status,
            ENVIRONMENT: self.environment,
        })
    }
}

/// Equality filters accepted by the list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConfigurationItemFilter {
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub ci_type: Option<String>,
    pub environment: Option<String>,
}
