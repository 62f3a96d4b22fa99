//! S3 backend on top of `aws-sdk-s3`.
//!
//! Credentials come from the standard AWS provider chain (environment,
//! profile, instance metadata). Region, endpoint and path-style addressing can
//! be overridden for S3-compatible services such as MinIO.

use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::operation::RequestId;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;

use crate::error::StorageError;
use crate::storage::{ObjectBackend, ResponseMetadata, StoredObject};

#[derive(Debug, Clone, Default)]
pub struct S3Options {
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub force_path_style: bool,
}

pub struct S3Backend {
    client: Client,
}

impl S3Backend {
    pub async fn new(options: &S3Options) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &options.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &options.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;
        let conf = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(options.force_path_style)
            .build();
        tracing::debug!(
            region = ?shared.region(),
            endpoint = options.endpoint.as_deref().unwrap_or("default"),
            "S3 client initialised"
        );
        Self::from_client(Client::from_conf(conf))
    }

    pub fn from_client(client: Client) -> Self {
        S3Backend { client }
    }
}

#[async_trait::async_trait]
impl ObjectBackend for S3Backend {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
    ) -> Result<ResponseMetadata, StorageError> {
        let output = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StorageError::backend("put_object", e))?;
        Ok(ResponseMetadata::new(200).with_request_id(output.request_id()))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, StorageError> {
        let output = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(output) => output,
            // Only `NoSuchKey` is a miss; `NoSuchBucket` and friends are also 404s.
            Err(e) if e.as_service_error().is_some_and(|service| service.is_no_such_key()) => {
                return Err(StorageError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                });
            }
            Err(e) => return Err(StorageError::backend("get_object", e)),
        };

        let metadata = ResponseMetadata::new(200).with_request_id(output.request_id());
        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::backend("get_object", e))?
            .into_bytes();
        Ok(StoredObject { data, metadata })
    }

    async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<ResponseMetadata, StorageError> {
        let output = self
            .client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::backend("delete_object", e))?;
        Ok(ResponseMetadata::new(204).with_request_id(output.request_id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::config::retry::RetryConfig;
    use aws_sdk_s3::config::{BehaviorVersion, Credentials};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const NO_SUCH_KEY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message><Key>cache/foo</Key><RequestId>req-1</RequestId></Error>"#;

    const NO_SUCH_BUCKET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>NoSuchBucket</Code><Message>The specified bucket does not exist</Message><BucketName>nope</BucketName><RequestId>req-2</RequestId></Error>"#;

    const INTERNAL_ERROR: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>InternalError</Code><Message>We encountered an internal error.</Message><RequestId>req-3</RequestId></Error>"#;

    /// Serves the same canned response to every request on a local port.
    async fn endpoint(status: &'static str, request_id: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match stream.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    let response = format!(
                        "HTTP/1.1 {status}\r\nContent-Type: application/xml\r\nx-amz-request-id: {request_id}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });
        format!("http://{addr}")
    }

    fn backend(endpoint: &str) -> S3Backend {
        let conf = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(endpoint)
            .force_path_style(true)
            .credentials_provider(Credentials::new("AKIDEXAMPLE", "secret", None, None, "test"))
            .retry_config(RetryConfig::disabled())
            .build();
        S3Backend::from_client(Client::from_conf(conf))
    }

    #[tokio::test]
    async fn no_such_key_is_not_found() {
        let backend = backend(&endpoint("404 Not Found", "req-1", NO_SUCH_KEY).await);
        let err = backend.get_object("objcache", "cache/foo").await.unwrap_err();
        assert!(
            matches!(&err, StorageError::NotFound { bucket, key } if bucket == "objcache" && key == "cache/foo"),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn no_such_bucket_is_a_backend_error() {
        let backend = backend(&endpoint("404 Not Found", "req-2", NO_SUCH_BUCKET).await);
        let err = backend.get_object("nope", "cache/foo").await.unwrap_err();
        assert!(
            matches!(err, StorageError::Backend { operation: "get_object", .. }),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn server_error_is_a_backend_error() {
        let backend = backend(&endpoint("500 Internal Server Error", "req-3", INTERNAL_ERROR).await);
        let err = backend.get_object("objcache", "cache/foo").await.unwrap_err();
        assert!(
            matches!(err, StorageError::Backend { operation: "get_object", .. }),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn get_returns_body_and_request_id() {
        let backend = backend(&endpoint("200 OK", "req-ok", "one").await);
        let object = backend.get_object("objcache", "cache/foo").await.unwrap();
        assert_eq!(&object.data[..], b"one");
        assert_eq!(object.metadata.status, 200);
        assert_eq!(object.metadata.request_id.as_deref(), Some("req-ok"));
    }

    #[tokio::test]
    async fn delete_reports_no_content() {
        let backend = backend(&endpoint("204 No Content", "req-del", "").await);
        let metadata = backend.delete_object("objcache", "cache/foo").await.unwrap();
        assert_eq!(metadata.status, 204);
        assert_eq!(metadata.request_id.as_deref(), Some("req-del"));
    }
}
