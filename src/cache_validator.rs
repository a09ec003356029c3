use sha2::{Digest, Sha256};

/// Integrity envelope for cached upstream responses.
///
/// Weather and geolocation payloads are cached as JSON strings; a SHA-256
/// checksum is stored alongside the data and re-verified on every read.
/// A corrupted entry is treated as a cache miss and refetched, never served.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ValidatedCacheEntry {
    /// The cached payload (JSON string).
    pub data: String,
    /// SHA-256 checksum of the payload, hex encoded.
    pub checksum: String,
}

impl ValidatedCacheEntry {
    /// Wraps a payload with its computed checksum.
    pub fn new(data: String) -> Self {
        let checksum = Self::compute_checksum(&data);
        Self { data, checksum }
    }

    fn compute_checksum(data: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Returns true if the stored checksum matches the payload.
    pub fn is_valid(&self) -> bool {
        Self::compute_checksum(&self.data) == self.checksum
    }

    /// Serializes the envelope for storage in the cache.
    pub fn serialize(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Deserializes a cached envelope and returns the payload only if the
    /// checksum verifies. `None` means the entry must be refetched.
    pub fn deserialize_and_validate(raw: &str) -> Option<String> {
        let entry: ValidatedCacheEntry = serde_json::from_str(raw).ok()?;
        if entry.is_valid() {
            Some(entry.data)
        } else {
            tracing::warn!("Cache entry failed checksum validation, discarding");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_payload() {
        let payload = r#"{"averageSunlightHours":6.5,"cloudCover":40.0}"#.to_string();
        let entry = ValidatedCacheEntry::new(payload.clone());
        assert!(entry.is_valid());

        let raw = entry.serialize();
        let restored = ValidatedCacheEntry::deserialize_and_validate(&raw);
        assert_eq!(restored, Some(payload));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let mut entry = ValidatedCacheEntry::new(r#"{"humidity":80}"#.to_string());
        entry.data = r#"{"humidity":10}"#.to_string();
        assert!(!entry.is_valid());

        let raw = entry.serialize();
        assert_eq!(ValidatedCacheEntry::deserialize_and_validate(&raw), None);
    }

    #[test]
    fn garbage_input_is_rejected() {
        assert_eq!(
            ValidatedCacheEntry::deserialize_and_validate("not json at all"),
            None
        );
    }
}
