use async_trait::async_trait;
use aws_sdk_s3 as s3;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use s3::primitives::ByteStream;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::error::ApiError;

// 1. StorageService Contract
/// StorageService
///
/// Abstract contract for the object storage layer. Objects are addressed by
/// opaque string references; the application never interprets the bytes.
/// The trait lets us swap the real S3 client (S3StorageClient) for the
/// in-memory Mock (MockStorageService) in tests without touching handlers.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Ensures the configured bucket exists. Used in the `Env::Local` setup to
    /// provision the bucket in MinIO automatically. No-op in production.
    async fn ensure_bucket_exists(&self);

    /// Stores a blob and returns the generated object reference.
    async fn put(&self, bytes: Vec<u8>, content_type: &str) -> Result<String, ApiError>;

    /// Fetches a blob by reference. `Ok(None)` means the object is absent;
    /// `Err` means the store itself failed.
    async fn get(&self, reference: &str) -> Result<Option<Vec<u8>>, ApiError>;
}

/// StorageState
///
/// The concrete type used to share storage access across the application state.
pub type StorageState = Arc<dyn StorageService>;

/// Renders stored image bytes as a base64 data URL for API responses. Returns
/// None when the object is absent; storage failures propagate so the caller
/// can decide whether the read is enrichment-only.
pub async fn get_as_data_url(
    storage: &StorageState,
    reference: &str,
) -> Result<Option<String>, ApiError> {
    let Some(bytes) = storage.get(reference).await? else {
        return Ok(None);
    };
    let content_type = content_type_for(reference);
    Ok(Some(format!(
        "data:{};base64,{}",
        content_type,
        BASE64.encode(bytes)
    )))
}

/// Maps a file extension to a MIME type for data-URL rendering.
fn content_type_for(reference: &str) -> &'static str {
    match reference.rsplit('.').next() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

/// Picks the object-key extension for an uploaded MIME type.
fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        _ => "bin",
    }
}

/// sanitize_key
///
/// Removes directory navigation components (`..`, `.`) from a key segment to
/// prevent path traversal through stored references.
fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

// 2. The Real Implementation (S3/MinIO)
/// S3StorageClient
///
/// Concrete implementation using the AWS SDK for S3. S3 compatibility means
/// the same client talks to a Dockerized MinIO locally and real S3 (or any
/// S3-compatible gateway) in production. `force_path_style(true)` is required
/// for MinIO.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
}

impl S3StorageClient {
    /// Constructs the S3 client using credentials from AppConfig.
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            // Path-style addressing (http://endpoint/bucket/key) is required
            // for MinIO gateways.
            .force_path_style(true)
            .build();

        let client = s3::Client::from_conf(config);

        Self {
            client,
            bucket_name: bucket.to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    /// Calls the S3 CreateBucket API. Idempotent, safe at startup.
    async fn ensure_bucket_exists(&self) {
        let _ = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await;
    }

    async fn put(&self, bytes: Vec<u8>, content_type: &str) -> Result<String, ApiError> {
        let key = format!("uploads/{}.{}", Uuid::new_v4(), extension_for(content_type));

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("s3 put_object failed: {}", e);
                ApiError::StorageUnavailable
            })?;

        Ok(key)
    }

    async fn get(&self, reference: &str) -> Result<Option<Vec<u8>>, ApiError> {
        let key = sanitize_key(reference);

        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    return Ok(None);
                }
                tracing::error!("s3 get_object failed: {}", service_err);
                return Err(ApiError::StorageUnavailable);
            }
        };

        let bytes = output.body.collect().await.map_err(|e| {
            tracing::error!("s3 body read failed: {}", e);
            ApiError::StorageUnavailable
        })?;

        Ok(Some(bytes.into_bytes().to_vec()))
    }
}

// 3. The Mock Implementation (For Tests)
/// MockStorageService
///
/// In-memory implementation of `StorageService` used in unit and integration
/// tests, so handler logic can be exercised without a network connection.
#[derive(Clone, Default)]
pub struct MockStorageService {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            objects: Arc::new(Mutex::new(HashMap::new())),
            should_fail: true,
        }
    }

    /// Seeds an object under a known reference, for test fixtures.
    pub fn seed(&self, reference: &str, bytes: Vec<u8>) {
        self.objects
            .lock()
            .unwrap()
            .insert(reference.to_string(), bytes);
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {
        // No-op in mock environment.
    }

    async fn put(&self, bytes: Vec<u8>, content_type: &str) -> Result<String, ApiError> {
        if self.should_fail {
            return Err(ApiError::StorageUnavailable);
        }
        let key = sanitize_key(&format!(
            "uploads/{}.{}",
            Uuid::new_v4(),
            extension_for(content_type)
        ));
        self.objects.lock().unwrap().insert(key.clone(), bytes);
        Ok(key)
    }

    async fn get(&self, reference: &str) -> Result<Option<Vec<u8>>, ApiError> {
        if self.should_fail {
            return Err(ApiError::StorageUnavailable);
        }
        Ok(self.objects.lock().unwrap().get(reference).cloned())
    }
}
