//! Wire types shared by the API client, fixtures and suites

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A fixture record kept exactly as written: any key, any JSON type
pub type UserFields = Map<String, Value>;

/// Age a record carries, as the service would coerce it: a whole number or
/// a numeric string
pub fn age_of(fields: &UserFields) -> Option<i64> {
    match fields.get("age")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A user record as exchanged with the service.
///
/// Every field is optional so the same type describes create payloads,
/// partial updates and server responses. Absent fields are omitted when
/// serializing; unknown properties are kept in `extras`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Number, string or explicit null in invalid fixtures
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub age: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,

    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

/// Keep an explicit `null` as `Some(Value::Null)` so it survives a round trip
fn nullable<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            email: Some(email.into()),
            ..Default::default()
        }
    }

    pub fn with_age(mut self, age: impl Into<Value>) -> Self {
        self.age = Some(age.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Numeric age, if the record carries one
    pub fn age_number(&self) -> Option<i64> {
        self.age.as_ref().and_then(Value::as_i64)
    }

    /// Identity equality: name and email, plus age when `self` carries one
    pub fn same_identity(&self, other: &User) -> bool {
        if self.name != other.name || self.email != other.email {
            return false;
        }
        match self.age.as_ref().and_then(Value::as_f64) {
            Some(age) => other.age.as_ref().and_then(Value::as_f64) == Some(age),
            None => true,
        }
    }

    /// The writable fields of `self` with every key of `patch` laid over
    /// them verbatim
    pub fn overlay(&self, patch: &UserFields) -> UserFields {
        let mut fields = UserFields::new();
        if let Some(name) = &self.name {
            fields.insert("name".into(), Value::String(name.clone()));
        }
        if let Some(email) = &self.email {
            fields.insert("email".into(), Value::String(email.clone()));
        }
        if let Some(age) = &self.age {
            fields.insert("age".into(), age.clone());
        }
        for (key, value) in patch {
            fields.insert(key.clone(), value.clone());
        }
        fields
    }

    /// The writable fields only, as sent on create/update
    pub fn payload(&self) -> User {
        User {
            name: self.name.clone(),
            email: self.email.clone(),
            age: self.age.clone(),
            ..Default::default()
        }
    }
}

/// Login credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_fields_are_omitted() {
        let user = User::new("Jane", "jane@example.com");
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value, json!({"name": "Jane", "email": "jane@example.com"}));
    }

    #[test]
    fn explicit_null_age_round_trips() {
        let user: User = serde_json::from_value(json!({"name": "A", "email": "a@b.co", "age": null})).unwrap();
        assert_eq!(user.age, Some(Value::Null));
        let back = serde_json::to_value(&user).unwrap();
        assert_eq!(back["age"], Value::Null);
        assert!(back.as_object().unwrap().contains_key("age"));
    }

    #[test]
    fn server_fields_and_extras_are_kept() {
        let user: User = serde_json::from_value(json!({
            "id": "17",
            "name": "A",
            "email": "a@b.co",
            "createdAt": "2024-01-01T00:00:00.000Z",
            "updatedAt": "2024-01-01T00:00:00.000Z",
            "role": "viewer"
        }))
        .unwrap();
        assert_eq!(user.id(), Some("17"));
        assert!(user.created_at.is_some());
        assert_eq!(user.extras.get("role"), Some(&json!("viewer")));
        assert_eq!(serde_json::to_value(&user).unwrap()["role"], "viewer");
    }

    #[test]
    fn identity_ignores_server_fields() {
        let sent = User::new("A", "a@b.co").with_age(30);
        let mut echoed = sent.clone();
        echoed.id = Some("1".into());
        echoed.created_at = Some("now".into());
        assert!(sent.same_identity(&echoed));

        let other_age = User::new("A", "a@b.co").with_age(31);
        assert!(!sent.same_identity(&other_age));
        assert!(User::new("A", "a@b.co").same_identity(&other_age));
    }

    #[test]
    fn overlay_keeps_patch_values_verbatim() {
        let current = User::new("A", "a@b.co").with_age(30);
        let patch = json!({"age": 41, "email": null, "nickname": 7});
        let merged = current.overlay(patch.as_object().unwrap());
        assert_eq!(
            Value::Object(merged),
            json!({"name": "A", "email": null, "age": 41, "nickname": 7})
        );
    }

    #[test]
    fn age_of_coerces_numeric_strings() {
        let fields = |v: Value| v.as_object().unwrap().clone();
        assert_eq!(age_of(&fields(json!({"age": 33}))), Some(33));
        assert_eq!(age_of(&fields(json!({"age": " 34 "}))), Some(34));
        assert_eq!(age_of(&fields(json!({"age": "abc"}))), None);
        assert_eq!(age_of(&fields(json!({"age": null}))), None);
        assert_eq!(age_of(&fields(json!({"name": "A"}))), None);
    }
}
