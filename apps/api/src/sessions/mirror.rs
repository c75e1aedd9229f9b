use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use tracing::{info, warn};

use crate::config::S3Config;

/// Copies every session document written to disk into an S3 / MinIO bucket.
/// Upload failures are logged and never fail the local write.
#[derive(Clone)]
pub struct S3Mirror {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Mirror {
    /// Constructs a client configured for MinIO (custom endpoint) or AWS.
    pub async fn connect(config: &S3Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "wellness-static",
        );

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        // MinIO needs path-style addressing; AWS accepts it as well.
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.endpoint.is_some())
            .build();

        info!("S3 mirror enabled for bucket {}", config.bucket);
        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        }
    }

    pub fn key_for(session_id: &str, data_type: &str) -> String {
        format!("sessions/{session_id}/{data_type}.json")
    }

    pub async fn put(&self, key: &str, body: Vec<u8>) {
        let result = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type("application/json")
            .send()
            .await;

        match result {
            Ok(_) => info!("Mirrored s3://{}/{}", self.bucket, key),
            Err(e) => warn!("S3 mirror upload of {key} failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout_matches_disk_layout() {
        assert_eq!(
            S3Mirror::key_for("7d5c", "userprofile"),
            "sessions/7d5c/userprofile.json"
        );
    }
}
