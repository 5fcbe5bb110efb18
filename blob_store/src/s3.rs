use std::{env, sync::Arc};

use anyhow::{Context, Result};
use object_store::{aws::AmazonS3Builder, ObjectStore};

use super::S3Config;

/// Bucket-scoped S3 client. Credentials come from the standard AWS
/// environment variables; the region from config.
pub(crate) fn build_store(bucket: &str, config: &S3Config) -> Result<Arc<dyn ObjectStore>> {
    let mut builder = AmazonS3Builder::from_env()
        .with_region(config.region.as_str())
        .with_bucket_name(bucket);

    // For supporting localstack/minio for testing
    if let Ok(val) = env::var("AWS_ENDPOINT_URL") {
        builder = builder.with_endpoint(val.clone());
        if val.starts_with("http://") {
            builder = builder.with_allow_http(true);
        }
    }

    let store = builder
        .build()
        .with_context(|| format!("unable to build S3 client for bucket {}", bucket))?;
    Ok(Arc::new(store))
}

pub(crate) fn public_url(bucket: &str, key: &str, region: &str) -> String {
    format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key)
}

/// Whether the environment carries the credential pair the S3 builder
/// reads. Checked up front by ingestion so it can abort before uploading.
pub fn credentials_present() -> bool {
    env::var("AWS_ACCESS_KEY_ID").is_ok() && env::var("AWS_SECRET_ACCESS_KEY").is_ok()
}
