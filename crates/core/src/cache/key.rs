//! Canonical cache keys for logical databases.

use sha2::{Digest, Sha256};

use crate::classifier::Classifier;

/// Extra tag separating cache entries that share a classifier,
/// e.g. read-only replica routing.
pub trait Discriminator {
    fn value(&self) -> String;
}

impl Discriminator for str {
    fn value(&self) -> String {
        self.to_string()
    }
}

impl Discriminator for String {
    fn value(&self) -> String {
        self.clone()
    }
}

/// Cache key built from a database type and a canonicalized classifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    db_type: String,
    classifier: String,
    discriminator: String,
}

impl CacheKey {
    pub fn new(db_type: &str, classifier: &Classifier) -> Self {
        Self { db_type: db_type.to_string(), classifier: classifier.to_canonical_string(), discriminator: String::new() }
    }

    pub fn with_discriminator<D: Discriminator + ?Sized>(
        db_type: &str, classifier: &Classifier, discriminator: &D,
    ) -> Self {
        Self { discriminator: discriminator.value(), ..Self::new(db_type, classifier) }
    }

    pub fn db_type(&self) -> &str {
        &self.db_type
    }

    pub fn classifier(&self) -> &str {
        &self.classifier
    }

    pub fn discriminator(&self) -> &str {
        &self.discriminator
    }

    /// Short stable digest of the key, used as a log field.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.db_type.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.classifier.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.discriminator.as_bytes());
        hex::encode(&hasher.finalize()[..8])
    }
}
