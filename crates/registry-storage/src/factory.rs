//! Dispatches a [`RegistryConfig`] to the concrete backend its storage URI
//! selects.

use registry_core::{Backend, RegistryConfig, RegistryResult};

use crate::file::FileBackend;
use crate::oci::OciBackend;
use crate::s3::S3Backend;
use crate::uri::{self, Scheme};

/// Open the backend selected by `config.storage_uri`.
///
/// # Errors
///
/// Returns [`registry_core::RegistryError::InvalidConfig`] for an
/// unparsable or unsupported location, or whatever startup error the
/// selected backend produces.
pub fn open(config: &RegistryConfig) -> RegistryResult<Box<dyn Backend>> {
    let parsed = uri::parse(&config.storage_uri)?;
    let token = config.storage_token.as_deref();

    match parsed.scheme {
        Scheme::File => Ok(Box::new(FileBackend::open(&parsed.path, token)?)),
        Scheme::Oci => Ok(Box::new(OciBackend::open(
            &parsed.host,
            &parsed.path,
            token,
        )?)),
        Scheme::S3 | Scheme::S3Http => {
            let (bucket, key) = parsed.path.split_once('/').ok_or_else(|| {
                registry_core::RegistryError::InvalidConfig(
                    "s3 storage location must include a bucket and key".to_owned(),
                )
            })?;
            Ok(Box::new(S3Backend::open(
                &parsed.host,
                parsed.scheme == Scheme::S3,
                parsed.region.as_deref(),
                bucket,
                key,
                token,
            )?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_select_file_backend_for_bare_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let config = RegistryConfig::new(path.to_string_lossy().to_string(), None);
        assert!(open(&config).is_ok());
    }

    #[test]
    fn test_should_reject_oci_without_token() {
        let config = RegistryConfig::new("oci://ghcr.io/acme/registry-state", None);
        assert!(matches!(
            open(&config),
            Err(registry_core::RegistryError::TokenRequired)
        ));
    }

    #[test]
    fn test_should_reject_unsupported_scheme() {
        let config = RegistryConfig::new("ftp://example.com/x", None);
        assert!(open(&config).is_err());
    }
}
