//! Logical database records and request parameters.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::classifier::Classifier;

/// Connection metadata of a logical database (url, host, port, username, password, ...).
///
/// Keys depend on the database type.
pub type ConnectionProperties = Map<String, Value>;

/// A provisioned database as tracked by the provisioning service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogicalDb {
    /// Unique identifier of the record.
    pub id: String,

    /// Purpose of the database; distinguishes it from others in the same namespace.
    #[serde(deserialize_with = "null_as_default")]
    pub classifier: Classifier,

    #[serde(deserialize_with = "null_as_default")]
    pub connection_properties: ConnectionProperties,

    /// Namespace where the database is placed.
    pub namespace: String,

    pub name: String,

    /// Database type, for example `postgresql` or `mongodb`.
    #[serde(rename = "type")]
    pub db_type: String,

    pub settings: Option<Map<String, Value>>,
}

impl LogicalDb {
    /// Connection URL, when the record carries one.
    pub fn url(&self) -> Option<&str> {
        self.connection_properties.get("url").and_then(Value::as_str)
    }
}

/// Optional parameters that customize database creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseDbParams {
    /// Prefix of the generated database name.
    #[serde(skip_serializing_if = "is_blank")]
    pub name_prefix: Option<String>,

    /// Additional settings; may be updated after creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<Map<String, Value>>,

    /// Physical database to place the logical one in; the default one when unset.
    #[serde(skip_serializing_if = "is_blank")]
    pub physical_database_id: Option<String>,

    /// Requested user role; the service defaults to admin.
    #[serde(rename = "userRole", skip_serializing_if = "is_blank")]
    pub role: Option<String>,
}

impl BaseDbParams {
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(prefix.into());
        self
    }

    /// Role to send, ignoring an empty string.
    pub fn user_role(&self) -> Option<&str> {
        self.role.as_deref().filter(|r| !r.is_empty())
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(str::is_empty)
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
