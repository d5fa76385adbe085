//! S3-compatible object store persistence backend.
//!
//! The model is stored as a single JSON object at `bucket/key`. The
//! [`crate::Backend`] trait is synchronous (backends are called while the
//! core's store holds its write lock), so this backend owns a small
//! dedicated Tokio runtime and bridges into the async `aws-sdk-s3` client
//! via [`tokio::runtime::Runtime::block_on`].

use std::time::Duration;

use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use registry_core::{RegistryError, RegistryResult, RootContainer};
use tracing::{debug, info};

use crate::error::{BackendError, ErrorCategory, Operation};

const UPLOAD_TIMEOUT: Duration = Duration::from_mins(1);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// An S3-backed [`registry_core::Backend`].
pub struct S3Backend {
    client: aws_sdk_s3::Client,
    runtime: tokio::runtime::Runtime,
    bucket: String,
    key: String,
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend")
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl S3Backend {
    /// Open (or initialize) the backend at `endpoint`/`bucket`/`key`.
    ///
    /// Credentials: `ACCESS:SECRET` in `token`, else ambient
    /// `AWS_ACCESS_KEY_ID`/`AWS_SECRET_ACCESS_KEY`, else IAM role auth.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::StorageUnavailable`] if the bucket does not
    /// exist or cannot be reached.
    pub fn open(
        endpoint: &str,
        use_tls: bool,
        region: Option<&str>,
        bucket: &str,
        key: &str,
        token: Option<&str>,
    ) -> RegistryResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                RegistryError::from(BackendError::new(
                    ErrorCategory::Network,
                    Operation::Connect,
                    format!("failed to start async runtime: {e}"),
                ))
            })?;

        let client = runtime.block_on(build_client(endpoint, use_tls, region, token))?;

        let backend = Self {
            client,
            runtime,
            bucket: bucket.to_owned(),
            key: key.to_owned(),
        };

        backend.runtime.block_on(with_timeout(
            CONNECT_TIMEOUT,
            Operation::Connect,
            "bucket existence check timed out",
            backend.ensure_bucket(),
        ))?;

        let existing = backend.runtime.block_on(with_timeout(
            DOWNLOAD_TIMEOUT,
            Operation::Load,
            "download timed out",
            backend.get_object(),
        ));
        match existing {
            Ok(_) => {}
            Err(RegistryError::NotFound(_)) => {
                info!(bucket = %backend.bucket, key = %backend.key, "no existing object, initializing empty model");
                backend.runtime.block_on(with_timeout(
                    UPLOAD_TIMEOUT,
                    Operation::Persist,
                    "upload timed out",
                    backend.put_object(&RootContainer::default()),
                ))?;
            }
            Err(e) => return Err(e),
        }

        Ok(backend)
    }

    async fn ensure_bucket(&self) -> RegistryResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| categorize_sdk_error(Operation::Connect, &e.to_string()))?;
        Ok(())
    }

    async fn get_object(&self) -> RegistryResult<RootContainer> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
            .map_err(|e| categorize_sdk_error(Operation::Load, &e.to_string()))?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| {
                RegistryError::from(BackendError::new(
                    ErrorCategory::Network,
                    Operation::Load,
                    format!("failed to read object body: {e}"),
                ))
            })?
            .into_bytes();

        serde_json::from_slice(&bytes).map_err(|e| {
            RegistryError::InvalidConfig(format!("persisted object is not valid JSON: {e}"))
        })
    }

    async fn put_object(&self, state: &RootContainer) -> RegistryResult<()> {
        let json = serde_json::to_vec(state).map_err(|e| {
            BackendError::new(
                ErrorCategory::Storage,
                Operation::Persist,
                format!("failed to serialize model: {e}"),
            )
        })?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .content_type("application/json")
            .body(json.clone().into())
            .send()
            .await
            .map_err(|e| categorize_sdk_error(Operation::Persist, &e.to_string()))?;
        debug!(bucket = %self.bucket, key = %self.key, bytes = json.len(), "uploaded registry model to S3");
        Ok(())
    }
}

async fn with_timeout<T>(
    duration: Duration,
    operation: Operation,
    timeout_message: &str,
    fut: impl std::future::Future<Output = RegistryResult<T>>,
) -> RegistryResult<T> {
    tokio::time::timeout(duration, fut).await.unwrap_or_else(|_| {
        Err(BackendError::new(ErrorCategory::Network, operation, timeout_message).into())
    })
}

async fn build_client(
    endpoint: &str,
    use_tls: bool,
    region: Option<&str>,
    token: Option<&str>,
) -> RegistryResult<aws_sdk_s3::Client> {
    let scheme = if use_tls { "https" } else { "http" };
    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .endpoint_url(format!("{scheme}://{endpoint}"))
        .region(Region::new(region.unwrap_or("us-east-1").to_owned()));

    if let Some(token) = token {
        if let Some((access_key, secret_key)) = token.split_once(':') {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "registry-storage",
            ));
        }
    }

    let config = loader.load().await;
    let s3_config = aws_sdk_s3::config::Builder::from(&config)
        .force_path_style(true)
        .build();
    Ok(aws_sdk_s3::Client::from_conf(s3_config))
}

fn categorize_sdk_error(operation: Operation, message: &str) -> RegistryError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("nosuchkey") || lower.contains("nosuchbucket") {
        return RegistryError::NotFound(message.to_owned());
    }
    let category = if lower.contains("accessdenied")
        || lower.contains("invalidaccesskeyid")
        || lower.contains("signaturedoesnotmatch")
        || lower.contains("expiredtoken")
    {
        ErrorCategory::Authentication
    } else if lower.contains("dns") || lower.contains("connection") || lower.contains("timed out")
    {
        ErrorCategory::Network
    } else {
        ErrorCategory::Storage
    };
    BackendError::new(category, operation, message.to_owned()).into()
}

impl registry_core::Backend for S3Backend {
    fn load(&self) -> RegistryResult<RootContainer> {
        self.runtime.block_on(with_timeout(
            DOWNLOAD_TIMEOUT,
            Operation::Load,
            "download timed out",
            self.get_object(),
        ))
    }

    fn persist(&self, state: &RootContainer) -> RegistryResult<()> {
        self.runtime.block_on(with_timeout(
            UPLOAD_TIMEOUT,
            Operation::Persist,
            "upload timed out",
            self.put_object(state),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_categorize_not_found_as_missing() {
        assert!(matches!(
            categorize_sdk_error(Operation::Load, "NoSuchKey: not found"),
            RegistryError::NotFound(_)
        ));
    }

    #[test]
    fn test_should_categorize_access_denied_as_storage_unavailable() {
        let err = categorize_sdk_error(Operation::Load, "AccessDenied: access denied");
        assert!(matches!(err, RegistryError::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn test_should_build_client_with_explicit_credentials() {
        let client = build_client("127.0.0.1:9", false, Some("us-west-2"), Some("AKID:SECRET")).await;
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_should_build_client_without_token() {
        let client = build_client("127.0.0.1:9", false, None, None).await;
        assert!(client.is_ok());
    }
}
