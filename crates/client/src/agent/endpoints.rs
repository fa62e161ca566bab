//! Agent endpoint URLs.
//!
//! Path segments are appended with percent-encoding, so namespaces and
//! database types never change the shape of the path.

use dbaas_core::Error;
use url::Url;

/// `PUT {agent}/api/v3/dbaas/{namespace}/databases`
pub fn get_or_create_database(base: &Url, namespace: &str) -> Result<Url, Error> {
    with_segments(base, &["api", "v3", "dbaas", namespace, "databases"])
}

/// `POST {agent}/api/v3/dbaas/{namespace}/databases/get-by-classifier/{db_type}`
pub fn get_by_classifier(base: &Url, namespace: &str, db_type: &str) -> Result<Url, Error> {
    with_segments(base, &["api", "v3", "dbaas", namespace, "databases", "get-by-classifier", db_type])
}

/// `GET {agent}/api-version`
pub fn api_version(base: &Url) -> Result<Url, Error> {
    with_segments(base, &["api-version"])
}

fn with_segments(base: &Url, segments: &[&str]) -> Result<Url, Error> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| Error::Request(format!("agent url cannot be a base: {}", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
