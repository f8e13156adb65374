//! Integrity-tag utilities for uploaded objects
//!
//! Object stores report an integrity tag (the S3 `ETag`) for every object.
//! The tag is returned wrapped in double quotes and, for weak validators,
//! prefixed with `W/`. Callers declare the bare checksum when they enqueue a
//! job, so comparison happens on the normalized form.

use crate::error::{CommonError, Result};

/// Length of a hex-encoded MD5 digest
const MD5_HEX_LEN: usize = 32;

/// Strip the storage quoting convention from an integrity tag.
///
/// `"abc123"` and `W/"abc123"` both normalize to `abc123`. Surrounding
/// whitespace is ignored.
pub fn normalize_integrity_tag(tag: &str) -> &str {
    let tag = tag.trim();
    let tag = tag.strip_prefix("W/").unwrap_or(tag);

    match tag.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        Some(inner) => inner,
        None => tag,
    }
}

/// Render a bare checksum the way the object store reports it.
pub fn quote_integrity_tag(checksum: &str) -> String {
    format!("\"{}\"", checksum.trim())
}

/// Verify a caller-declared checksum against the storage-reported tag.
///
/// A missing tag never matches.
pub fn verify_integrity_tag(declared: &str, reported: Option<&str>) -> Result<()> {
    let declared = declared.trim();
    let actual = reported.map(normalize_integrity_tag).unwrap_or_default();

    if !declared.is_empty() && declared.eq_ignore_ascii_case(actual) {
        Ok(())
    } else {
        Err(CommonError::ChecksumMismatch {
            expected: declared.to_string(),
            actual: reported.unwrap_or("<none>").to_string(),
        })
    }
}

/// Whether a normalized tag is a plain MD5 digest of the object content.
///
/// Multipart uploads produce `<hex>-<parts>` tags which are not content
/// digests.
pub fn is_content_digest(tag: &str) -> bool {
    let tag = normalize_integrity_tag(tag);
    tag.len() == MD5_HEX_LEN && tag.chars().all(|c| c.is_ascii_hexdigit())
}

/// Compute MD5 checksum of bytes
pub fn compute_md5(data: &[u8]) -> String {
    let digest = md5::compute(data);
    format!("{:x}", digest)
}

/// Verify downloaded bytes against a content-digest tag.
///
/// Tags that are not plain digests are accepted without hashing.
pub fn verify_content_digest(data: &[u8], tag: &str) -> Result<()> {
    if !is_content_digest(tag) {
        return Ok(());
    }

    let expected = normalize_integrity_tag(tag);
    let actual = compute_md5(data);

    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(CommonError::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        })
    }
}
