//! Classifiers identify which logical database a caller wants.
//!
//! A classifier is an unordered set of attributes. Two classifiers that hold
//! the same attributes are the same classifier, whatever order they were
//! built in; [`Classifier::to_canonical_string`] is the stable form used for
//! cache keys.

mod validation;

pub use validation::{enrich, validate};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Error;

pub const MICROSERVICE_NAME: &str = "microserviceName";
pub const NAMESPACE: &str = "namespace";
pub const SCOPE: &str = "scope";
pub const TENANT_ID: &str = "tenantId";

pub const SCOPE_SERVICE: &str = "service";
pub const SCOPE_TENANT: &str = "tenant";

/// Placeholder tenant id used by context propagation when no tenant is set.
const ABSENT_TENANT: &str = "-";

/// Attribute set identifying a logical database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Classifier(HashMap<String, Value>);

impl Classifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifier for a database owned by a whole microservice.
    pub fn service(microservice_name: &str, namespace: &str) -> Self {
        Self::new()
            .with(MICROSERVICE_NAME, microservice_name)
            .with(NAMESPACE, namespace)
            .with(SCOPE, SCOPE_SERVICE)
    }

    /// Classifier for a per-tenant database.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidClassifier` if the tenant id is empty or the
    /// `-` placeholder.
    pub fn tenant(microservice_name: &str, namespace: &str, tenant_id: &str) -> Result<Self, Error> {
        if tenant_id.is_empty() || tenant_id == ABSENT_TENANT {
            return Err(Error::InvalidClassifier("can't create tenant database, tenantId is absent".into()));
        }

        Ok(Self::new()
            .with(MICROSERVICE_NAME, microservice_name)
            .with(NAMESPACE, namespace)
            .with(SCOPE, SCOPE_TENANT)
            .with(TENANT_ID, tenant_id))
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Whether `key` is present with a non-null value.
    pub fn has(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(|v| !v.is_null())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Deterministic JSON form with object keys sorted at every level.
    pub fn to_canonical_string(&self) -> String {
        let mut keys: Vec<&String> = self.0.keys().collect();
        keys.sort();

        let mut sorted = Map::new();
        for key in keys {
            sorted.insert(key.clone(), canonicalize(&self.0[key]));
        }
        Value::Object(sorted).to_string()
    }
}

/// Rebuild nested objects with their keys inserted in sorted order.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

impl From<HashMap<String, Value>> for Classifier {
    fn from(map: HashMap<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Map<String, Value>> for Classifier {
    fn from(map: Map<String, Value>) -> Self {
        Self(map.into_iter().collect())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Classifier {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
