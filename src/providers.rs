use crate::config::RemoteSettings;
use crate::error::RemoteError;
use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::{primitives::ByteStream, Client as S3Client, Config};
use std::path::Path;
use std::time::Duration;
use tracing::info;
use url::Url;

const REDACTED: &str = "REDACTED";

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fails when the bucket is missing or the credentials may not use it.
    async fn check_bucket(&self) -> Result<(), RemoteError>;
    async fn upload(&self, key: &str, file_path: &Path) -> Result<(), RemoteError>;
    /// A URL the uploaded object can be fetched from, with the access key id
    /// already redacted.
    async fn object_url(&self, key: &str) -> Result<String, RemoteError>;
    fn bucket(&self) -> &str;
}

// S3-compatible provider (AWS S3, MinIO, DigitalOcean Spaces, Wasabi, etc.)
pub struct S3Provider {
    client: S3Client,
    bucket: String,
    access_key: String,
    url_expiry: Duration,
}

impl S3Provider {
    pub fn new(settings: &RemoteSettings) -> Self {
        use aws_credential_types::Credentials;
        let credentials = Credentials::new(
            &settings.access_key,
            &settings.secret_key,
            None,
            None,
            "rdb-backup",
        );

        let mut builder = Config::builder()
            .region(aws_sdk_s3::config::Region::new(settings.region.clone()))
            .credentials_provider(credentials);
        if let Some(ref endpoint) = settings.endpoint {
            // Most S3-compatible servers only route path-style requests.
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: S3Client::from_conf(builder.build()),
            bucket: settings.bucket.clone(),
            access_key: settings.access_key.clone(),
            url_expiry: settings.url_expiry,
        }
    }
}

#[async_trait]
impl RemoteStore for S3Provider {
    async fn check_bucket(&self) -> Result<(), RemoteError> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                info!("Bucket {} is reachable", self.bucket);
                Ok(())
            }
            Err(err) => {
                let status = err.raw_response().map(|r| r.status().as_u16());
                match status {
                    Some(404) => Err(RemoteError::BucketNotFound(self.bucket.clone())),
                    Some(401) | Some(403) => Err(RemoteError::PermissionDenied(self.bucket.clone())),
                    _ => Err(RemoteError::Unreachable {
                        bucket: self.bucket.clone(),
                        reason: DisplayErrorContext(&err).to_string(),
                    }),
                }
            }
        }
    }

    async fn upload(&self, key: &str, file_path: &Path) -> Result<(), RemoteError> {
        let failed = |reason: String| RemoteError::Upload {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            reason,
        };

        info!("Uploading {} to S3...", key);
        let body = ByteStream::from_path(file_path)
            .await
            .map_err(|e| failed(format!("cannot read {}: {}", file_path.display(), e)))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| failed(DisplayErrorContext(&e).to_string()))?;

        info!("Successfully uploaded: {}", key);
        Ok(())
    }

    async fn object_url(&self, key: &str) -> Result<String, RemoteError> {
        let failed = |reason: String| RemoteError::Presign {
            key: key.to_string(),
            reason,
        };

        let presigning = PresigningConfig::expires_in(self.url_expiry)
            .map_err(|e| failed(e.to_string()))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| failed(DisplayErrorContext(&e).to_string()))?;

        Ok(redact_access_key(request.uri(), &self.access_key))
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// Replaces every occurrence of `access_key` in the query string of `raw`
/// with `REDACTED`. Presigned URLs carry the key id inside
/// `X-Amz-Credential`; the signature itself is left intact.
pub fn redact_access_key(raw: &str, access_key: &str) -> String {
    if access_key.is_empty() {
        return raw.to_string();
    }

    let Ok(mut url) = Url::parse(raw) else {
        return raw.replace(access_key, REDACTED);
    };

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.replace(access_key, REDACTED)))
        .collect();
    if !pairs.is_empty() {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }

    // Some providers put the key id in the path or user info as well.
    url.to_string().replace(access_key, REDACTED)
}
