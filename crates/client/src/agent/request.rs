//! Agent request bodies.

use dbaas_core::{BaseDbParams, Classifier};
use serde::Serialize;

/// Body of the create-or-get call: the creation parameters flattened next to
/// the classifier and database type.
#[derive(Debug, Serialize)]
pub struct CreateDbRequest<'a> {
    #[serde(flatten)]
    pub params: &'a BaseDbParams,

    pub classifier: &'a Classifier,

    #[serde(rename = "type")]
    pub db_type: &'a str,
}

/// Body of the get-connection call.
#[derive(Debug, Serialize)]
pub struct ConnectionRequest<'a> {
    pub classifier: &'a Classifier,

    #[serde(rename = "userRole", skip_serializing_if = "Option::is_none")]
    pub role: Option<&'a str>,
}

impl<'a> ConnectionRequest<'a> {
    pub fn new(classifier: &'a Classifier, params: &'a BaseDbParams) -> Self {
        Self { classifier, role: params.user_role() }
    }
}
