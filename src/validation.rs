//! Request validation for configuration items and users.
//!
//! Validators take the raw JSON body so that type mismatches surface as
//! `ValidationError` (400) rather than an extractor rejection.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::database::models::configuration_item::{
    ConfigurationItemFields, ConfigurationItemRequest, DEFAULT_ENVIRONMENT, DEFAULT_STATUS,
};
use crate::database::models::user::{CreateUserRequest, NewUser, Role, UpdateUserRequest, UserUpdate};

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Invalid role '{0}'. Must be one of: user, agent, admin")]
    InvalidRole(String),

    #[error("{field} {message}")]
    InvalidField { field: &'static str, message: String },

    #[error("Malformed request body: {0}")]
    Malformed(String),

    #[error("No updatable fields supplied")]
    NothingToUpdate,
}

impl ValidationError {
    /// Request field the error is about, when there is one.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ValidationError::MissingField(field) => Some(field),
            ValidationError::InvalidEmail => Some("email"),
            ValidationError::InvalidRole(_) => Some("role"),
            ValidationError::InvalidField { field, .. } => Some(field),
            ValidationError::Malformed(_) | ValidationError::NothingToUpdate => None,
        }
    }
}

fn parse_body<T: DeserializeOwned>(body: Value) -> Result<T, ValidationError> {
    if !body.is_object() {
        return Err(ValidationError::Malformed("expected a JSON object".to_string()));
    }
    serde_json::from_value(body).map_err(|e| ValidationError::Malformed(e.to_string()))
}

/// Trimmed, non-empty value or `None`.
fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
    })
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    non_empty(value).ok_or(ValidationError::MissingField(field))
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

pub fn parse_role(value: &str) -> Result<Role, ValidationError> {
    Role::from_stored(value).ok_or_else(|| ValidationError::InvalidRole(value.to_string()))
}

/// Validate a configuration item body for create or full replace.
pub fn configuration_item(body: Value) -> Result<ConfigurationItemFields, ValidationError> {
    let req: ConfigurationItemRequest = parse_body(body)?;

    let ci_name = required(req.ci_name, "ciName")?;
    let ci_type = required(req.ci_type, "ciType")?;

    let support_group_id = match req.support_group_id {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => Some(n.as_i64().ok_or_else(|| ValidationError::InvalidField {
            field: "supportGroupId",
            message: "must be an integer".to_string(),
        })?),
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.trim().parse::<i64>().map_err(|_| ValidationError::InvalidField {
            field: "supportGroupId",
            message: "must be an integer".to_string(),
        })?),
        Some(_) => {
            return Err(ValidationError::InvalidField {
                field: "supportGroupId",
                message: "must be an integer".to_string(),
            })
        }
    };

    let attributes = match req.attributes {
        None | Some(Value::Null) => None,
        Some(obj @ Value::Object(_)) => Some(obj.to_string()),
        Some(_) => {
            return Err(ValidationError::InvalidField {
                field: "attributes",
                message: "must be an object".to_string(),
            })
        }
    };

    Ok(ConfigurationItemFields {
        ci_name,
        ci_type,
        sub_type: non_empty(req.sub_type),
        status: non_empty(req.status).unwrap_or_else(|| DEFAULT_STATUS.to_string()),
        environment: non_empty(req.environment).unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
        description: non_empty(req.description),
        location: non_empty(req.location),
        ip_address: non_empty(req.ip_address),
        hostname: non_empty(req.hostname),
        serial_number: non_empty(req.serial_number),
        manufacturer: non_empty(req.manufacturer),
        model: non_empty(req.model),
        support_group_id,
        owner: non_empty(req.owner),
        attributes,
    })
}

/// Validate a user creation body.
pub fn new_user(body: Value) -> Result<NewUser, ValidationError> {
    let req: CreateUserRequest = parse_body(body)?;

    let email = required(req.email, "email")?;
    let display_name = required(req.display_name, "displayName")?;
    if !is_valid_email(&email) {
        return Err(ValidationError::InvalidEmail);
    }
    let role = match non_empty(req.role) {
        Some(role) => parse_role(&role)?,
        None => Role::User,
    };

    Ok(NewUser {
        email,
        display_name,
        first_name: non_empty(req.first_name),
        last_name: non_empty(req.last_name),
        department: non_empty(req.department),
        job_title: non_empty(req.job_title),
        external_id: non_empty(req.external_id),
        role,
        assignment_group_ids: req.assignment_group_ids,
    })
}

/// Validate a partial user update body.
pub fn user_update(body: Value) -> Result<UserUpdate, ValidationError> {
    let req: UpdateUserRequest = parse_body(body)?;

    let email = required(req.email, "email")?;
    let display_name = match req.display_name {
        None => None,
        Some(value) => Some(non_empty(value).ok_or(ValidationError::InvalidField {
            field: "displayName",
            message: "cannot be empty".to_string(),
        })?),
    };
    let role = match (req.new_role, req.role) {
        (Some(new_role), Some(role)) => {
            let parsed = parse_role(&new_role)?;
            if parse_role(&role)? != parsed {
                return Err(ValidationError::InvalidField {
                    field: "role",
                    message: format!("'{}' conflicts with newRole '{}'", role.trim(), new_role.trim()),
                });
            }
            Some(parsed)
        }
        (Some(role), None) | (None, Some(role)) => Some(parse_role(&role)?),
        (None, None) => None,
    };

    let update = UserUpdate {
        email,
        display_name,
        first_name: req.first_name.map(non_empty),
        last_name: req.last_name.map(non_empty),
        department: req.department.map(non_empty),
        job_title: req.job_title.map(non_empty),
        role,
    };

    if update.is_empty() {
        return Err(ValidationError::NothingToUpdate);
    }
    Ok(update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn configuration_item_requires_name_then_type() {
        assert_eq!(
            configuration_item(json!({ "ciType": "Server" })),
            Err(ValidationError::MissingField("ciName"))
        );
        assert_eq!(
            configuration_item(json!({ "ciName": "srv01" })),
            Err(ValidationError::MissingField("ciType"))
        );
        assert_eq!(
            configuration_item(json!({ "ciName": "   ", "ciType": "Server" })),
            Err(ValidationError::MissingField("ciName"))
        );
        // First missing field wins
        assert_eq!(configuration_item(json!({})), Err(ValidationError::MissingField("ciName")));
    }

    #[test]
    fn configuration_item_applies_defaults() {
        let fields = configuration_item(json!({ "ciName": "srv01", "ciType": "Server" })).unwrap();
        assert_eq!(fields.status, "Active");
        assert_eq!(fields.environment, "Production");
        assert_eq!(fields.support_group_id, None);
        assert_eq!(fields.attributes, None);
    }

    #[test]
    fn configuration_item_serializes_attributes_and_parses_group() {
        let fields = configuration_item(json!({
            "ciName": "db01",
            "ciType": "Database",
            "supportGroupId": "12",
            "attributes": { "engine": "postgres", "cores": 8 }
        }))
        .unwrap();
        assert_eq!(fields.support_group_id, Some(12));
        let attrs: Value = serde_json::from_str(fields.attributes.as_deref().unwrap()).unwrap();
        assert_eq!(attrs["cores"], 8);

        assert!(matches!(
            configuration_item(json!({ "ciName": "a", "ciType": "b", "attributes": [1, 2] })),
            Err(ValidationError::InvalidField { field: "attributes", .. })
        ));
        assert!(matches!(
            configuration_item(json!({ "ciName": "a", "ciType": "b", "supportGroupId": "ops" })),
            Err(ValidationError::InvalidField { field: "supportGroupId", .. })
        ));
    }

    #[test]
    fn non_object_bodies_are_malformed() {
        assert!(matches!(configuration_item(json!([1])), Err(ValidationError::Malformed(_))));
        assert!(matches!(new_user(json!("x")), Err(ValidationError::Malformed(_))));
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("jane.doe@example.com"));
        assert!(!is_valid_email("bad-email"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@example.com"));
    }

    #[test]
    fn new_user_rules() {
        assert_eq!(
            new_user(json!({ "email": "bad-email", "displayName": "X" })),
            Err(ValidationError::InvalidEmail)
        );
        assert_eq!(new_user(json!({ "displayName": "X" })), Err(ValidationError::MissingField("email")));
        assert_eq!(
            new_user(json!({ "email": "x@example.com" })),
            Err(ValidationError::MissingField("displayName"))
        );
        assert_eq!(
            new_user(json!({ "email": "x@example.com", "displayName": "X", "role": "root" })),
            Err(ValidationError::InvalidRole("root".to_string()))
        );

        let user = new_user(json!({ "email": "x@example.com", "displayName": "X" })).unwrap();
        assert_eq!(user.role, Role::User);

        let agent = new_user(json!({
            "email": "x@example.com",
            "displayName": "X",
            "role": "Agent",
            "assignmentGroupIds": [1, 2]
        }))
        .unwrap();
        assert_eq!(agent.role, Role::Agent);
        assert_eq!(agent.assignment_group_ids, vec![1, 2]);
    }

    #[test]
    fn user_update_keeps_only_present_fields() {
        let update = user_update(json!({ "email": "x@example.com", "displayName": "New Name" })).unwrap();
        assert_eq!(update.display_name.as_deref(), Some("New Name"));
        assert_eq!(update.role, None);
        assert_eq!(update.department, None);

        let cleared = user_update(json!({ "email": "x@example.com", "department": null })).unwrap();
        assert_eq!(cleared.department, Some(None));
    }

    #[test]
    fn user_update_rejects_empty_and_invalid() {
        assert_eq!(user_update(json!({ "email": "x@example.com" })), Err(ValidationError::NothingToUpdate));
        assert_eq!(
            user_update(json!({ "email": "x@example.com", "newRole": "owner" })),
            Err(ValidationError::InvalidRole("owner".to_string()))
        );
        assert!(matches!(
            user_update(json!({ "email": "x@example.com", "displayName": "" })),
            Err(ValidationError::InvalidField { field: "displayName", .. })
        ));
        assert_eq!(user_update(json!({ "displayName": "A" })), Err(ValidationError::MissingField("email")));
    }

    #[test]
    fn user_update_accepts_either_role_key() {
        let legacy = user_update(json!({ "email": "x@example.com", "role": "Agent" })).unwrap();
        assert_eq!(legacy.role, Some(Role::Agent));

        let both = user_update(json!({ "email": "x@example.com", "role": "agent", "newRole": "AGENT" })).unwrap();
        assert_eq!(both.role, Some(Role::Agent));

        let conflict = user_update(json!({ "email": "x@example.com", "role": "user", "newRole": "admin" }));
        assert!(matches!(conflict, Err(ValidationError::InvalidField { field: "role", .. })));
    }
}
