//! Parsing and validation of storage backend location strings.

use registry_core::RegistryError;

/// The storage backend a [`StorageUri`] selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// Local filesystem.
    File,
    /// OCI artifact registry.
    Oci,
    /// S3-compatible object store over TLS.
    S3,
    /// S3-compatible object store over plain HTTP.
    S3Http,
}

/// A parsed, validated storage location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageUri {
    /// Which backend this location selects.
    pub scheme: Scheme,
    /// Endpoint host (and optional port) for `oci`/`s3`/`s3+http`; unused for
    /// `file`.
    pub host: String,
    /// Filesystem path (`file`), OCI repository path (`oci`), or
    /// `bucket/key` (`s3`/`s3+http`).
    pub path: String,
    /// Optional bucket region, from an `s3://...?region=...` query string or
    /// derived from a `s3.<region>.amazonaws.com`-shaped host.
    pub region: Option<String>,
}

/// Parse a storage location string into a [`StorageUri`].
///
/// A string with no `://` is treated as a bare filesystem path and prefixed
/// with `file://`.
///
/// # Errors
///
/// Returns [`RegistryError::InvalidConfig`] if the string is empty, the
/// scheme is unrecognized, or a scheme-specific requirement (non-empty host
/// for `oci`, non-empty path) is not met.
pub fn parse(raw: &str) -> Result<StorageUri, RegistryError> {
    if raw.is_empty() {
        return Err(RegistryError::InvalidConfig(
            "storage location must not be empty".to_owned(),
        ));
    }

    let normalized = if raw.contains("://") {
        raw.to_owned()
    } else {
        format!("file://{raw}")
    };

    let (scheme_str, rest) = normalized.split_once("://").ok_or_else(|| {
        RegistryError::InvalidConfig(format!("missing scheme in storage location: {raw}"))
    })?;

    let scheme = match scheme_str {
        "file" => Scheme::File,
        "oci" => Scheme::Oci,
        "s3" => Scheme::S3,
        "s3+http" => Scheme::S3Http,
        other => {
            return Err(RegistryError::InvalidConfig(format!(
                "unsupported storage scheme: {other}"
            )));
        }
    };

    match scheme {
        Scheme::File => parse_file(rest),
        Scheme::Oci => parse_oci(rest),
        Scheme::S3 | Scheme::S3Http => parse_s3(scheme, rest),
    }
}

fn parse_file(rest: &str) -> Result<StorageUri, RegistryError> {
    if rest.is_empty() {
        return Err(RegistryError::InvalidConfig(
            "file storage location must include a path".to_owned(),
        ));
    }
    // Recognize a Windows drive letter (e.g. `C:/x`) that would otherwise be
    // split on the first `/` as if it were a host.
    let path = if rest.len() >= 2 && rest.as_bytes()[1] == b':' {
        rest.to_owned()
    } else if let Some(stripped) = rest.strip_prefix('/') {
        format!("/{stripped}")
    } else {
        rest.to_owned()
    };
    Ok(StorageUri {
        scheme: Scheme::File,
        host: String::new(),
        path,
        region: None,
    })
}

fn parse_oci(rest: &str) -> Result<StorageUri, RegistryError> {
    if rest.contains('?') || rest.contains('#') {
        return Err(RegistryError::InvalidConfig(
            "oci storage location must not carry a query string or fragment".to_owned(),
        ));
    }
    let (host, path) = rest
        .split_once('/')
        .ok_or_else(|| RegistryError::InvalidConfig("oci storage location must include a repository path".to_owned()))?;
    if host.is_empty() {
        return Err(RegistryError::InvalidConfig(
            "oci storage location must include a non-empty host".to_owned(),
        ));
    }
    if path.is_empty() {
        return Err(RegistryError::InvalidConfig(
            "oci storage location must include a non-empty repository path".to_owned(),
        ));
    }
    // Strip any tag suffix: the registry always uses `latest`.
    let path = path.split(':').next().expect("split always yields at least one item").to_owned();
    Ok(StorageUri {
        scheme: Scheme::Oci,
        host: host.to_owned(),
        path,
        region: None,
    })
}

fn parse_s3(scheme: Scheme, rest: &str) -> Result<StorageUri, RegistryError> {
    let (rest, region) = match rest.split_once('?') {
        Some((base, query)) => (base, parse_region_query(query)),
        None => (rest, None),
    };
    let (host, path) = rest
        .split_once('/')
        .ok_or_else(|| RegistryError::InvalidConfig("s3 storage location must include a bucket and key".to_owned()))?;
    if host.is_empty() || path.is_empty() {
        return Err(RegistryError::InvalidConfig(
            "s3 storage location must include a non-empty endpoint and bucket/key path".to_owned(),
        ));
    }
    let region = region.or_else(|| derive_region_from_host(host));
    Ok(StorageUri {
        scheme,
        host: host.to_owned(),
        path: path.to_owned(),
        region,
    })
}

fn parse_region_query(query: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == "region").then(|| value.to_owned())
    })
}

fn derive_region_from_host(host: &str) -> Option<String> {
    let hostname = host.split(':').next().unwrap_or(host);
    for prefix in ["s3.", "s3-"] {
        if let Some(rest) = hostname.strip_prefix(prefix) {
            if let Some(region) = rest.strip_suffix(".amazonaws.com") {
                return Some(region.to_owned());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_default_bare_path_to_file_scheme() {
        let uri = parse("/var/lib/registry/state.json").unwrap();
        assert_eq!(uri.scheme, Scheme::File);
        assert_eq!(uri.path, "/var/lib/registry/state.json");
    }

    #[test]
    fn test_should_parse_file_uri() {
        let uri = parse("file:///var/lib/registry/state.json").unwrap();
        assert_eq!(uri.scheme, Scheme::File);
        assert_eq!(uri.path, "/var/lib/registry/state.json");
    }

    #[test]
    fn test_should_parse_windows_file_uri() {
        let uri = parse("file://C:/registry/state.json").unwrap();
        assert_eq!(uri.scheme, Scheme::File);
        assert_eq!(uri.path, "C:/registry/state.json");
    }

    #[test]
    fn test_should_parse_oci_uri_and_strip_tag() {
        let uri = parse("oci://ghcr.io/acme/registry-state:v2").unwrap();
        assert_eq!(uri.scheme, Scheme::Oci);
        assert_eq!(uri.host, "ghcr.io");
        assert_eq!(uri.path, "acme/registry-state");
    }

    #[test]
    fn test_should_reject_oci_without_host() {
        assert!(parse("oci:///acme/registry-state").is_err());
    }

    #[test]
    fn test_should_parse_s3_uri_with_region_query() {
        let uri = parse("s3://s3.us-west-2.amazonaws.com/my-bucket/registry.json").unwrap();
        assert_eq!(uri.scheme, Scheme::S3);
        assert_eq!(uri.host, "s3.us-west-2.amazonaws.com");
        assert_eq!(uri.path, "my-bucket/registry.json");
        assert_eq!(uri.region.as_deref(), Some("us-west-2"));
    }

    #[test]
    fn test_should_prefer_explicit_region_query_over_derived() {
        let uri = parse("s3+http://minio.local:9000/bucket/key?region=custom-1").unwrap();
        assert_eq!(uri.scheme, Scheme::S3Http);
        assert_eq!(uri.region.as_deref(), Some("custom-1"));
    }

    #[test]
    fn test_should_reject_empty_location() {
        assert!(parse("").is_err());
    }

    #[test]
    fn test_should_reject_unsupported_scheme() {
        assert!(parse("ftp://example.com/x").is_err());
    }
}
