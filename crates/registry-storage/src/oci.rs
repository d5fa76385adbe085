//! OCI artifact registry persistence backend.
//!
//! The model is pushed as a single-layer OCI image: an empty config blob and
//! one `application/json` layer holding the serialized state, tagged
//! `latest`. This lets any OCI-compliant registry (ghcr.io, Docker Hub,
//! Azure Container Registry, ECR, ...) act as a backend with no bespoke
//! server-side support.

use std::time::Duration;

use chrono::Utc;
use registry_core::{Backend as _, RegistryError, RegistryResult, RootContainer};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{BackendError, ErrorCategory, Operation};

const EMPTY_CONFIG_MEDIA_TYPE: &str = "application/vnd.oci.image.config.v1+json";
const LAYER_MEDIA_TYPE: &str = "application/json";
const MANIFEST_MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";
const VERSION_MARKER: &str = "com.cola-registry.version";

const PUSH_TIMEOUT: Duration = Duration::from_mins(1);
const PULL_TIMEOUT: Duration = Duration::from_secs(30);

/// An OCI-backed [`registry_core::Backend`].
pub struct OciBackend {
    client: Client,
    base_url: String,
    repository: String,
    token: String,
}

impl std::fmt::Debug for OciBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OciBackend")
            .field("base_url", &self.base_url)
            .field("repository", &self.repository)
            .finish_non_exhaustive()
    }
}

fn auth_hint(host: &str) -> &'static str {
    if host.contains("ghcr.io") {
        "create a GitHub personal access token with the write:packages scope"
    } else if host.contains("docker.io") {
        "create a Docker Hub access token under Account Settings > Security"
    } else if host.contains("azurecr.io") {
        "run `az acr login` or supply an ACR access token"
    } else if host.contains("amazonaws.com") {
        "run `aws ecr get-login-password` to obtain a token"
    } else if host.contains("gcr.io") || host.contains("pkg.dev") {
        "run `gcloud auth print-access-token` to obtain a token"
    } else {
        "verify the token has push/pull access to this repository"
    }
}

fn digest_of(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

fn is_not_found(status: StatusCode, body: &str) -> bool {
    status == StatusCode::NOT_FOUND
        || status == StatusCode::BAD_REQUEST
        || body.contains("NOT_FOUND")
        || body.contains("NAME_UNKNOWN")
        || body.contains("MANIFEST_UNKNOWN")
}

impl OciBackend {
    /// Open (or initialize) the backend against `host`/`repository`, tagged
    /// `latest`. A token is mandatory.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::TokenRequired`] if `token` is `None`, or
    /// [`RegistryError::StorageUnavailable`] if the registry cannot be
    /// reached for a reason other than "tag does not exist yet".
    pub fn open(host: &str, repository: &str, token: Option<&str>) -> RegistryResult<Self> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or(RegistryError::TokenRequired)?
            .to_owned();

        let backend = Self {
            client: Client::builder()
                .timeout(PUSH_TIMEOUT)
                .build()
                .map_err(|e| {
                    RegistryError::from(BackendError::new(
                        ErrorCategory::Network,
                        Operation::Connect,
                        format!("failed to build HTTP client: {e}"),
                    ))
                })?,
            base_url: format!("https://{host}"),
            repository: repository.to_owned(),
            token,
        };

        match backend.load() {
            Ok(_) => Ok(backend),
            Err(RegistryError::NotFound(_)) => {
                info!(repository = %backend.repository, "no existing manifest, initializing empty model");
                backend.persist(&RootContainer::default())?;
                Ok(backend)
            }
            Err(e) => Err(e),
        }
    }

    fn manifest_url(&self) -> String {
        format!("{}/v2/{}/manifests/latest", self.base_url, self.repository)
    }

    fn blob_url(&self, digest: &str) -> String {
        format!("{}/v2/{}/blobs/{digest}", self.base_url, self.repository)
    }

    fn upload_init_url(&self) -> String {
        format!("{}/v2/{}/blobs/uploads/", self.base_url, self.repository)
    }

    fn push_blob(&self, bytes: &[u8]) -> Result<String, BackendError> {
        let digest = digest_of(bytes);

        let initiate = self
            .client
            .post(self.upload_init_url())
            .basic_auth("registry", Some(&self.token))
            .timeout(PUSH_TIMEOUT)
            .send()
            .map_err(|e| categorize_transport(Operation::Persist, &e, &self.base_url))?;

        if initiate.status() == StatusCode::UNAUTHORIZED || initiate.status() == StatusCode::FORBIDDEN {
            return Err(BackendError::new(
                ErrorCategory::Authentication,
                Operation::Persist,
                format!("blob upload rejected with {}", initiate.status()),
            )
            .with_hint(auth_hint(&self.base_url)));
        }
        let upload_location = initiate
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                BackendError::new(
                    ErrorCategory::Storage,
                    Operation::Persist,
                    "registry did not return an upload location",
                )
            })?
            .to_owned();

        let upload_url = if upload_location.starts_with("http") {
            upload_location
        } else {
            format!("{}{upload_location}", self.base_url)
        };
        let separator = if upload_url.contains('?') { "&" } else { "?" };
        let complete_url = format!("{upload_url}{separator}digest={digest}");

        let put = self
            .client
            .put(&complete_url)
            .basic_auth("registry", Some(&self.token))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .timeout(PUSH_TIMEOUT)
            .body(bytes.to_vec())
            .send()
            .map_err(|e| categorize_transport(Operation::Persist, &e, &self.base_url))?;

        if !put.status().is_success() {
            return Err(BackendError::new(
                ErrorCategory::Storage,
                Operation::Persist,
                format!("blob upload failed with {}", put.status()),
            ));
        }

        Ok(digest)
    }
}

fn categorize_transport(operation: Operation, err: &reqwest::Error, host: &str) -> BackendError {
    if err.is_timeout() {
        BackendError::new(ErrorCategory::Network, operation, format!("timed out: {err}"))
    } else if err.is_connect() {
        BackendError::new(
            ErrorCategory::Network,
            operation,
            format!("could not connect to {host}: {err}"),
        )
    } else {
        BackendError::new(ErrorCategory::Network, operation, err.to_string())
    }
}

impl registry_core::Backend for OciBackend {
    fn load(&self) -> RegistryResult<RootContainer> {
        let response = self
            .client
            .get(self.manifest_url())
            .basic_auth("registry", Some(&self.token))
            .header(reqwest::header::ACCEPT, MANIFEST_MEDIA_TYPE)
            .timeout(PULL_TIMEOUT)
            .send()
            .map_err(|e| categorize_transport(Operation::Load, &e, &self.base_url))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BackendError::new(
                ErrorCategory::Authentication,
                Operation::Load,
                format!("manifest fetch rejected with {status}"),
            )
            .with_hint(auth_hint(&self.base_url))
            .into());
        }

        let body = response
            .text()
            .map_err(|e| categorize_transport(Operation::Load, &e, &self.base_url))?;

        if is_not_found(status, &body) {
            return Err(RegistryError::NotFound(self.repository.clone()));
        }
        if !status.is_success() {
            return Err(BackendError::new(
                ErrorCategory::Storage,
                Operation::Load,
                format!("manifest fetch failed with {status}: {body}"),
            )
            .into());
        }

        let manifest: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
            BackendError::new(
                ErrorCategory::Storage,
                Operation::Load,
                format!("malformed manifest: {e}"),
            )
        })?;
        let digest = manifest["layers"][0]["digest"].as_str().ok_or_else(|| {
            BackendError::new(
                ErrorCategory::Storage,
                Operation::Load,
                "manifest has no layers",
            )
        })?;

        let blob = self
            .client
            .get(self.blob_url(digest))
            .basic_auth("registry", Some(&self.token))
            .timeout(PULL_TIMEOUT)
            .send()
            .map_err(|e| categorize_transport(Operation::Load, &e, &self.base_url))?
            .bytes()
            .map_err(|e| categorize_transport(Operation::Load, &e, &self.base_url))?;

        serde_json::from_slice(&blob).map_err(|e| {
            RegistryError::InvalidConfig(format!("persisted layer is not valid JSON: {e}"))
        })
    }

    fn persist(&self, state: &RootContainer) -> RegistryResult<()> {
        let layer_bytes = serde_json::to_vec(state).map_err(|e| {
            BackendError::new(
                ErrorCategory::Storage,
                Operation::Persist,
                format!("failed to serialize model: {e}"),
            )
        })?;
        let config_bytes = b"{}".to_vec();

        let config_digest = self.push_blob(&config_bytes)?;
        let layer_digest = self.push_blob(&layer_bytes)?;

        let manifest = serde_json::json!({
            "schemaVersion": 2,
            "mediaType": MANIFEST_MEDIA_TYPE,
            "config": {
                "mediaType": EMPTY_CONFIG_MEDIA_TYPE,
                "digest": config_digest,
                "size": config_bytes.len(),
            },
            "layers": [{
                "mediaType": LAYER_MEDIA_TYPE,
                "digest": layer_digest,
                "size": layer_bytes.len(),
                "annotations": {
                    "org.opencontainers.image.title": "registry.json",
                },
            }],
            "annotations": {
                "org.opencontainers.image.created": Utc::now().to_rfc3339(),
                VERSION_MARKER: env!("CARGO_PKG_VERSION"),
            },
        });

        let response = self
            .client
            .put(self.manifest_url())
            .basic_auth("registry", Some(&self.token))
            .header(reqwest::header::CONTENT_TYPE, MANIFEST_MEDIA_TYPE)
            .timeout(PUSH_TIMEOUT)
            .body(manifest.to_string())
            .send()
            .map_err(|e| categorize_transport(Operation::Persist, &e, &self.base_url))?;

        if !response.status().is_success() {
            return Err(BackendError::new(
                ErrorCategory::Storage,
                Operation::Persist,
                format!("manifest push failed with {}", response.status()),
            )
            .into());
        }

        debug!(repository = %self.repository, bytes = layer_bytes.len(), "pushed registry model to OCI");
        Ok(())
    }
}
