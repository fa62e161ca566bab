//! Classifier enrichment and validation.
//!
//! Enrichment fills in the caller's namespace; validation rejects classifiers
//! the agent would refuse anyway, before anything goes over the wire.

use super::{Classifier, MICROSERVICE_NAME, NAMESPACE, SCOPE, SCOPE_SERVICE, SCOPE_TENANT, TENANT_ID};
use crate::Error;

/// Inject `namespace` when the classifier does not carry one.
pub fn enrich(mut classifier: Classifier, namespace: &str) -> Classifier {
    if !classifier.has(NAMESPACE) {
        classifier.insert(NAMESPACE, namespace);
    }
    classifier
}

/// Check that a classifier can be used to create a database.
///
/// # Errors
///
/// Returns `Error::InvalidClassifier` for the first failed rule:
/// - the classifier is empty
/// - `microserviceName` is absent
/// - `namespace` is absent
/// - `scope` is `tenant` but `tenantId` is absent
/// - `scope` is neither `service` nor `tenant`
pub fn validate(classifier: &Classifier) -> Result<(), Error> {
    let reject = |reason: &str| {
        tracing::error!(reason, "can't create database with wrong classifier");
        Err(Error::InvalidClassifier(reason.to_string()))
    };

    if classifier.is_empty() {
        return reject("classifier can't be nil or empty");
    }
    if !classifier.has(MICROSERVICE_NAME) {
        return reject(r#"classifier is not valid. "microserviceName" field must be not empty"#);
    }
    if !classifier.has(NAMESPACE) {
        return reject(r#"classifier is not valid. "namespace" field must be not empty"#);
    }

    match classifier.get_str(SCOPE) {
        Some(SCOPE_SERVICE) => Ok(()),
        Some(SCOPE_TENANT) if classifier.has(TENANT_ID) => Ok(()),
        Some(SCOPE_TENANT) => {
            reject(r#"classifier is not valid. tenant classifier must contain "tenantId": "<tenant_id>""#)
        }
        _ => reject(
            r#"classifier is not valid. service classifier must contain "scope": "service", tenant classifier must contain "scope": "tenant" and "tenantId": "<tenant_id>""#,
        ),
    }
}
