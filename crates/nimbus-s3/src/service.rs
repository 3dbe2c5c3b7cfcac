//! The S3 service: bucket operations addressed by host and path.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use http::StatusCode;

use nimbus_core::KvStore;
use nimbus_gateway::{CloudService, RequestContext, ServiceError, parse_s3_host};
use nimbus_protocol::encode::{EncodeError, rest_xml_empty, rest_xml_success};
use nimbus_protocol::{Request, Response};

use crate::model::{Bucket, ListAllMyBucketsResult};

/// S3 bucket emulation backed by the shared state store.
#[derive(Debug)]
pub struct S3Service {
    store: Arc<KvStore>,
}

impl S3Service {
    /// Create the service over the given store.
    #[must_use]
    pub fn new(store: Arc<KvStore>) -> Self {
        Self { store }
    }

    /// The bucket a request addresses: a virtual-hosted host label first,
    /// then the first path segment.
    fn bucket_name(request: &Request) -> Option<String> {
        if let Some(info) = request.host().and_then(parse_s3_host) {
            if !info.bucket.is_empty() {
                return Some(info.bucket);
            }
        }
        request.first_path_segment().map(str::to_owned)
    }

    /// Idempotent: re-creating an existing bucket succeeds with the same
    /// response rather than erroring, matching how permissive emulated
    /// clients expect repeated setup calls to behave.
    fn create_bucket(&self, name: &str) -> Result<Response, ServiceError> {
        let key = bucket_key(name);
        if !self.store.exists(&key) {
            let bucket = Bucket {
                name: name.to_owned(),
                creation_date: Utc::now(),
            };
            self.store.set(&key, &bucket).map_err(state_error)?;
        }
        Ok(rest_xml_empty(StatusCode::OK).header("location", &format!("/{name}")))
    }

    fn head_bucket(&self, name: &str) -> Result<Response, ServiceError> {
        if self.store.exists(&bucket_key(name)) {
            Ok(rest_xml_empty(StatusCode::OK))
        } else {
            Err(no_such_bucket(name))
        }
    }

    fn delete_bucket(&self, name: &str) -> Result<Response, ServiceError> {
        if self.store.delete(&bucket_key(name)) {
            Ok(rest_xml_empty(StatusCode::NO_CONTENT))
        } else {
            Err(no_such_bucket(name))
        }
    }

    fn list_buckets(&self) -> Result<Response, ServiceError> {
        let mut buckets = Vec::new();
        for key in self.store.list("s3/bucket/") {
            if let Some(bucket) = self.store.get::<Bucket>(&key).map_err(state_error)? {
                buckets.push(bucket);
            }
        }
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        rest_xml_success(StatusCode::OK, &ListAllMyBucketsResult { buckets })
            .map_err(encode_failure)
    }
}

#[async_trait]
impl CloudService for S3Service {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn handle(
        &self,
        _ctx: &RequestContext,
        request: &Request,
    ) -> Result<Response, ServiceError> {
        match request.action.as_deref() {
            Some("CreateBucket") => {
                let name = Self::bucket_name(request)
                    .ok_or_else(|| ServiceError::validation("bucket name required"))?;
                self.create_bucket(&name)
            }
            Some("HeadBucket") => {
                let name = Self::bucket_name(request)
                    .ok_or_else(|| ServiceError::validation("bucket name required"))?;
                self.head_bucket(&name)
            }
            Some("DeleteBucket") => {
                let name = Self::bucket_name(request)
                    .ok_or_else(|| ServiceError::validation("bucket name required"))?;
                self.delete_bucket(&name)
            }
            Some("ListBuckets") => self.list_buckets(),
            Some(other) => Err(ServiceError::new(
                StatusCode::NOT_IMPLEMENTED,
                "NotImplemented",
                format!("operation not implemented: {other}"),
            )),
            None => Err(ServiceError::validation("unable to determine operation")),
        }
    }

    /// Operations are method- and address-derived; there is no action
    /// header on this protocol.
    fn extract_action(&self, request: &Request) -> Option<String> {
        let bucket = Self::bucket_name(request);
        let action = match (&request.method, bucket) {
            (&http::Method::GET, None) => "ListBuckets",
            (&http::Method::PUT, Some(_)) => "CreateBucket",
            (&http::Method::HEAD, Some(_)) => "HeadBucket",
            (&http::Method::DELETE, Some(_)) => "DeleteBucket",
            _ => return None,
        };
        Some(action.to_owned())
    }
}

fn bucket_key(name: &str) -> String {
    format!("s3/bucket/{name}")
}

fn no_such_bucket(name: &str) -> ServiceError {
    ServiceError::not_found(
        "NoSuchBucket",
        format!("The specified bucket does not exist: {name}"),
    )
}

fn state_error(err: nimbus_core::StateError) -> ServiceError {
    ServiceError::internal(err.to_string())
}

fn encode_failure(err: EncodeError) -> ServiceError {
    ServiceError::internal(err.to_string())
}
