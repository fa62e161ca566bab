//! Agent response bodies.

use dbaas_core::{Classifier, ConnectionProperties, Error, LogicalDb};
use serde::Deserialize;

/// Answer of the get-connection call.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionResponse {
    #[serde(default)]
    pub classifier: Option<Classifier>,

    pub connection_properties: Option<ConnectionProperties>,
}

impl ConnectionResponse {
    /// Parse a get-connection body.
    ///
    /// # Errors
    ///
    /// Returns `Error::Decode` for malformed JSON or when the body has no
    /// `connectionProperties` object.
    pub fn parse(body: &[u8]) -> Result<Self, Error> {
        let response: Self = serde_json::from_slice(body)
            .map_err(|e| Error::Decode(format!("unable to unmarshal response body: {}", e)))?;
        if response.connection_properties.is_none() {
            return Err(Error::Decode("response body has no connectionProperties".into()));
        }
        Ok(response)
    }

    pub fn into_properties(self) -> ConnectionProperties {
        self.connection_properties.unwrap_or_default()
    }
}

/// Parse a create-or-get body.
///
/// # Errors
///
/// Returns `Error::Decode` when the body is not a logical database record.
pub fn parse_logical_db(body: &[u8]) -> Result<LogicalDb, Error> {
    serde_json::from_slice(body)
        .map_err(|e| Error::Decode(format!("unable to unmarshal json with response from dbaas: {}", e)))
}
