//! Validation for registry, package, and version fields.
//!
//! Rules follow the data model documented on [`crate::model::Registry`],
//! [`crate::model::Package`], and [`crate::model::Version`].

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::RegistryError;

/// Minimum length of a registry/package name.
const MIN_NAME_LEN: usize = 1;

/// Maximum length of a registry/package name.
const MAX_NAME_LEN: usize = 64;

/// Maximum length of a description.
const MAX_DESCRIPTION_LEN: usize = 4096;

/// Maximum number of `custom_values` entries.
const MAX_CUSTOM_VALUES: usize = 20;

/// Maximum length of a `custom_values` value.
const MAX_CUSTOM_VALUE_LEN: usize = 1024;

/// Maximum length of a checksum's/url's URL field.
const MAX_URL_LEN: usize = 2048;

/// Inclusive lower bound for partitions.
const PARTITION_MIN: u8 = 0;

/// Inclusive upper bound for partitions.
const PARTITION_MAX: u8 = 9;

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").expect("static regex is valid"));

static CUSTOM_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_-]{0,63}$").expect("static regex is valid")
});

static CHECKSUM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sha256:[0-9a-f]{64}$").expect("static regex is valid"));

/// Validate a registry or package name.
///
/// Must be 1-64 characters, matching `^[a-z0-9][a-z0-9_-]*$`. Names are
/// exact-match: no normalization (e.g. lowercasing) is applied anywhere in
/// the core.
///
/// # Errors
///
/// Returns [`RegistryError::Validation`] if the name is empty, too long, or
/// does not match the pattern.
pub fn validate_name(field: &str, name: &str) -> Result<(), RegistryError> {
    if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&name.len()) {
        return Err(RegistryError::Validation {
            field: field.to_owned(),
            message: format!(
                "must be between {MIN_NAME_LEN} and {MAX_NAME_LEN} characters long, got {}",
                name.len()
            ),
        });
    }
    if !NAME_RE.is_match(name) {
        return Err(RegistryError::Validation {
            field: field.to_owned(),
            message: "must match ^[a-z0-9][a-z0-9_-]*$".to_owned(),
        });
    }
    Ok(())
}

/// Validate a free-text description.
///
/// # Errors
///
/// Returns [`RegistryError::Validation`] if the description exceeds
/// [`MAX_DESCRIPTION_LEN`] characters.
pub fn validate_description(description: &str) -> Result<(), RegistryError> {
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(RegistryError::Validation {
            field: "description".to_owned(),
            message: format!("must be at most {MAX_DESCRIPTION_LEN} characters long"),
        });
    }
    Ok(())
}

/// Validate a `custom_values` map.
///
/// # Errors
///
/// Returns [`RegistryError::Validation`] if there are too many entries, a key
/// does not match `^[a-zA-Z_][a-zA-Z0-9_-]{0,63}$`, or a value exceeds
/// [`MAX_CUSTOM_VALUE_LEN`] characters.
pub fn validate_custom_values(values: &BTreeMap<String, String>) -> Result<(), RegistryError> {
    if values.len() > MAX_CUSTOM_VALUES {
        return Err(RegistryError::Validation {
            field: "custom_values".to_owned(),
            message: format!("must have at most {MAX_CUSTOM_VALUES} entries"),
        });
    }
    for (key, value) in values {
        if !CUSTOM_KEY_RE.is_match(key) {
            return Err(RegistryError::Validation {
                field: "custom_values".to_owned(),
                message: format!("key `{key}` must match ^[a-zA-Z_][a-zA-Z0-9_-]{{0,63}}$"),
            });
        }
        if value.chars().count() > MAX_CUSTOM_VALUE_LEN {
            return Err(RegistryError::Validation {
                field: "custom_values".to_owned(),
                message: format!("value for `{key}` must be at most {MAX_CUSTOM_VALUE_LEN} characters long"),
            });
        }
    }
    Ok(())
}

/// Validate a semantic version string (`MAJOR.MINOR.PATCH` with optional
/// pre-release/build metadata).
///
/// # Errors
///
/// Returns [`RegistryError::Validation`] if the string is not a valid
/// semantic version.
pub fn validate_version_string(version: &str) -> Result<(), RegistryError> {
    semver::Version::parse(version).map_err(|e| RegistryError::Validation {
        field: "version".to_owned(),
        message: format!("not a valid semantic version: {e}"),
    })?;
    Ok(())
}

/// Validate a checksum in the form `sha256:<64 lowercase hex chars>`.
///
/// # Errors
///
/// Returns [`RegistryError::Validation`] if the checksum does not match the
/// expected format. Uppercase hex is rejected.
pub fn validate_checksum(checksum: &str) -> Result<(), RegistryError> {
    if !CHECKSUM_RE.is_match(checksum) {
        return Err(RegistryError::Validation {
            field: "checksum".to_owned(),
            message: "must match sha256:<64 lowercase hex characters>".to_owned(),
        });
    }
    Ok(())
}

/// Validate a download URL: must be `http` or `https`, at most
/// [`MAX_URL_LEN`] characters.
///
/// # Errors
///
/// Returns [`RegistryError::Validation`] if the URL is too long or uses an
/// unsupported scheme.
pub fn validate_url(url: &str) -> Result<(), RegistryError> {
    if url.len() > MAX_URL_LEN {
        return Err(RegistryError::Validation {
            field: "url".to_owned(),
            message: format!("must be at most {MAX_URL_LEN} characters long"),
        });
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(RegistryError::Validation {
            field: "url".to_owned(),
            message: "must start with http:// or https://".to_owned(),
        });
    }
    Ok(())
}

/// Validate a partition range: both bounds in `[0, 9]`, start <= end.
///
/// # Errors
///
/// Returns [`RegistryError::Validation`] if either bound is out of range or
/// `start > end`.
pub fn validate_partition_range(start: u8, end: u8) -> Result<(), RegistryError> {
    if !(PARTITION_MIN..=PARTITION_MAX).contains(&start)
        || !(PARTITION_MIN..=PARTITION_MAX).contains(&end)
    {
        return Err(RegistryError::Validation {
            field: "partitions".to_owned(),
            message: format!("must be within [{PARTITION_MIN}, {PARTITION_MAX}]"),
        });
    }
    if start > end {
        return Err(RegistryError::Validation {
            field: "partitions".to_owned(),
            message: "startPartition must be <= endPartition".to_owned(),
        });
    }
    Ok(())
}

/// Whether two inclusive partition ranges overlap.
///
/// Two ranges `[a1, b1]` and `[a2, b2]` overlap iff `a1 <= b2 && a2 <= b1`.
///
/// # Examples
///
/// ```
/// use registry_core::validation::partition_overlap;
///
/// assert!(partition_overlap(0, 4, 3, 9));
/// assert!(!partition_overlap(0, 4, 5, 9));
/// ```
#[must_use]
pub fn partition_overlap(a1: u8, b1: u8, a2: u8, b2: u8) -> bool {
    a1 <= b2 && a2 <= b1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_accept_valid_names() {
        assert!(validate_name("name", "a").is_ok());
        assert!(validate_name("name", "hotfix-tool_2").is_ok());
        assert!(validate_name("name", &"a".repeat(64)).is_ok());
    }

    #[test]
    fn test_should_reject_invalid_names() {
        assert!(validate_name("name", "").is_err());
        assert!(validate_name("name", &"a".repeat(65)).is_err());
        assert!(validate_name("name", "Hotfix").is_err());
        assert!(validate_name("name", "-leading-dash").is_err());
    }

    #[test]
    fn test_should_reject_long_description() {
        assert!(validate_description(&"a".repeat(4096)).is_ok());
        assert!(validate_description(&"a".repeat(4097)).is_err());
    }

    #[test]
    fn test_should_validate_custom_values() {
        let mut values = BTreeMap::new();
        values.insert("team".to_owned(), "platform".to_owned());
        assert!(validate_custom_values(&values).is_ok());

        let mut bad_key = BTreeMap::new();
        bad_key.insert("0bad".to_owned(), "x".to_owned());
        assert!(validate_custom_values(&bad_key).is_err());

        let mut too_many = BTreeMap::new();
        for i in 0..21 {
            too_many.insert(format!("k{i}"), "v".to_owned());
        }
        assert!(validate_custom_values(&too_many).is_err());
    }

    #[test]
    fn test_should_validate_semver_strings() {
        assert!(validate_version_string("1.0.0").is_ok());
        assert!(validate_version_string("1.0.0-rc.1+build.5").is_ok());
        assert!(validate_version_string("1.0").is_err());
        assert!(validate_version_string("v1.0.0").is_err());
    }

    #[test]
    fn test_should_reject_uppercase_checksum() {
        let lower = format!("sha256:{}", "0".repeat(64));
        assert!(validate_checksum(&lower).is_ok());
        let upper = format!("sha256:{}", "A".repeat(64));
        assert!(validate_checksum(&upper).is_err());
    }

    #[test]
    fn test_should_reject_non_http_urls() {
        assert!(validate_url("https://example.com/x").is_ok());
        assert!(validate_url("http://example.com/x").is_ok());
        assert!(validate_url("ftp://example.com/x").is_err());
    }

    #[test]
    fn test_should_validate_partition_bounds() {
        assert!(validate_partition_range(0, 9).is_ok());
        assert!(validate_partition_range(0, 0).is_ok());
        assert!(validate_partition_range(9, 9).is_ok());
        assert!(validate_partition_range(5, 3).is_err());
        assert!(validate_partition_range(0, 10).is_err());
    }

    #[test]
    fn test_should_detect_partition_overlap() {
        assert!(partition_overlap(0, 4, 4, 9));
        assert!(!partition_overlap(0, 4, 5, 9));
        assert!(partition_overlap(2, 2, 0, 9));
    }
}
