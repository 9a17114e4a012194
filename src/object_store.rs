use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ObjectStoreError {
    #[error("S3 SDK error: {0}")]
    SdkError(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Upload error: {0}")]
    Upload(String),
}

/// S3 configuration for the media object store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket_name: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint_url: Option<String>, // For MinIO/S3-compatible services
}

impl S3Config {
    pub fn validate(&self) -> Result<(), ObjectStoreError> {
        if self.bucket_name.trim().is_empty() {
            return Err(ObjectStoreError::Config(
                "Bucket name cannot be empty".to_string(),
            ));
        }
        if self.region.trim().is_empty() {
            return Err(ObjectStoreError::Config("Region cannot be empty".to_string()));
        }
        if self.access_key_id.trim().is_empty() {
            return Err(ObjectStoreError::Config(
                "Access key ID cannot be empty".to_string(),
            ));
        }
        if self.secret_access_key.trim().is_empty() {
            return Err(ObjectStoreError::Config(
                "Secret access key cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for media object storage (allows mocking for tests). Uploads must be
/// safe to issue concurrently and idempotent-safe for retried filenames.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload one object and return its public URL.
    async fn upload(
        &self,
        data: &[u8],
        filename: &str,
        mime_type: &str,
        folder: &str,
    ) -> Result<String, ObjectStoreError>;
}

/// Production S3 object store implementation
pub struct S3ObjectStore {
    client: Client,
    bucket_name: String,
    region: String,
    endpoint_url: Option<String>,
}

impl S3ObjectStore {
    /// Create a new S3 object store client
    pub async fn new(config: S3Config) -> Result<Self, ObjectStoreError> {
        config.validate()?;

        let credentials = Credentials::new(
            config.access_key_id,
            config.secret_access_key,
            None, // session_token
            None, // expiration
            "mnemo-s3-config",
        );

        let mut aws_config_builder = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);

        // Set custom endpoint if provided (for S3-compatible services)
        if let Some(endpoint) = config.endpoint_url.clone() {
            aws_config_builder = aws_config_builder.endpoint_url(endpoint);
        }

        let aws_config = aws_config_builder.load().await;
        let client = Client::new(&aws_config);

        Ok(S3ObjectStore {
            client,
            bucket_name: config.bucket_name,
            region: config.region,
            endpoint_url: config.endpoint_url,
        })
    }

    fn object_key(&self, folder: &str, filename: &str) -> String {
        let folder = folder.trim_matches('/');
        if folder.is_empty() {
            filename.to_string()
        } else {
            format!("{}/{}", folder, filename)
        }
    }

    fn public_url(&self, key: &str) -> String {
        match &self.endpoint_url {
            Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), self.bucket_name, key),
            None => format!("https://{}.s3.{}.amazonaws.com/{}", self.bucket_name, self.region, key),
        }
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(
        &self,
        data: &[u8],
        filename: &str,
        mime_type: &str,
        folder: &str,
    ) -> Result<String, ObjectStoreError> {
        let key = self.object_key(folder, filename);

        debug!("uploading {} ({} bytes) to s3://{}/{}", filename, data.len(), self.bucket_name, key);

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .body(data.to_vec().into())
            .content_type(mime_type)
            .send()
            .await
            .map_err(|e| ObjectStoreError::SdkError(format!("Put object failed: {}", e)))?;

        Ok(self.public_url(&key))
    }
}

/// Object store manager that wraps the configured backend
#[derive(Clone)]
pub struct ObjectStoreManager {
    storage: std::sync::Arc<dyn ObjectStore>,
}

impl std::fmt::Debug for ObjectStoreManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreManager")
            .field("storage", &"<dyn ObjectStore>")
            .finish()
    }
}

impl ObjectStoreManager {
    /// Create a new manager backed by S3
    pub async fn new(config: S3Config) -> Result<Self, ObjectStoreError> {
        let storage = S3ObjectStore::new(config).await?;
        Ok(ObjectStoreManager {
            storage: std::sync::Arc::new(storage),
        })
    }

    /// Create a manager over any object store implementation
    pub fn with_storage(storage: std::sync::Arc<dyn ObjectStore>) -> Self {
        ObjectStoreManager { storage }
    }

    pub fn storage(&self) -> std::sync::Arc<dyn ObjectStore> {
        self.storage.clone()
    }

    pub async fn upload(
        &self,
        data: &[u8],
        filename: &str,
        mime_type: &str,
        folder: &str,
    ) -> Result<String, ObjectStoreError> {
        self.storage.upload(data, filename, mime_type, folder).await
    }
}
