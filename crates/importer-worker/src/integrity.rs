//! Integrity check between the declared checksum and the fetched object

use importer_common::checksum::{verify_content_digest, verify_integrity_tag};
use tracing::debug;

use crate::error::FileResult;
use crate::storage::StoredObject;

#[derive(Debug, Clone, Copy, Default)]
pub struct IntegrityValidator {
    verify_content_digest: bool,
}

impl IntegrityValidator {
    pub fn new(verify_content_digest: bool) -> Self {
        Self {
            verify_content_digest,
        }
    }

    /// Fail with a checksum mismatch unless the object matches `declared`.
    ///
    /// Runs before any decoding or storage mutation.
    pub fn verify(&self, declared: &str, object: &StoredObject) -> FileResult<()> {
        verify_integrity_tag(declared, object.e_tag.as_deref())?;

        if self.verify_content_digest {
            if let Some(tag) = object.e_tag.as_deref() {
                verify_content_digest(&object.body, tag)?;
            }
        }

        debug!(key = %object.key, checksum = declared, "Integrity check passed");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::FileError;

    fn object(e_tag: Option<&str>, body: &[u8]) -> StoredObject {
        StoredObject {
            key: "t1/a.csv".to_string(),
            content_type: Some("text/csv".to_string()),
            e_tag: e_tag.map(str::to_string),
            body: body.to_vec(),
        }
    }

    #[test]
    fn test_quoted_tag_matches() {
        let validator = IntegrityValidator::default();
        assert!(validator.verify("abc123", &object(Some("\"abc123\""), b"x")).is_ok());
    }

    #[test]
    fn test_mismatch() {
        let validator = IntegrityValidator::default();
        let err = validator
            .verify("bad999", &object(Some("\"zzz000\""), b"x"))
            .unwrap_err();
        assert!(matches!(err, FileError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_missing_tag_is_mismatch() {
        let validator = IntegrityValidator::default();
        let err = validator.verify("abc123", &object(None, b"x")).unwrap_err();
        assert_eq!(err.kind(), "checksum_mismatch");
    }

    #[test]
    fn test_content_digest() {
        let validator = IntegrityValidator::new(true);
        let tag = "\"098f6bcd4621d373cade4e832627b4f6\"";
        let declared = "098f6bcd4621d373cade4e832627b4f6";

        assert!(validator.verify(declared, &object(Some(tag), b"test")).is_ok());
        assert!(validator.verify(declared, &object(Some(tag), b"tampered")).is_err());

        // digest check is off by default
        let lenient = IntegrityValidator::default();
        assert!(lenient.verify(declared, &object(Some(tag), b"tampered")).is_ok());
    }
}
