//! Host-based detection of the storage service's addressing schemes.
//!
//! The storage API is the one service clients address by host shape rather
//! than by an action header: `my-bucket.s3.example.com` (virtual-hosted)
//! and `s3.example.com/my-bucket` (path-style) must both short-circuit to
//! it during routing. The heuristic keys on an `s3` label anywhere in the
//! host, so wildcard-DNS development suffixes (`*.nip.io`, raw IPs behind
//! them) are recognized too.

/// How the bucket is addressed in the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S3AddressingStyle {
    /// Bucket name is a host label before the `s3` label.
    VirtualHosted,
    /// Bucket name comes from the path; the host starts at the `s3` label.
    PathStyle,
}

/// The outcome of parsing a storage-style host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3HostInfo {
    /// Addressing style detected.
    pub style: S3AddressingStyle,
    /// Bucket name from the host; empty for path-style addressing.
    pub bucket: String,
}

/// Parse a host header value as a storage-service address.
///
/// Returns `None` when the host carries no `s3` label at all. The port is
/// stripped before matching. Every label before the first `s3` label joins
/// into the bucket name, so dotted bucket names survive.
#[must_use]
pub fn parse_s3_host(host: &str) -> Option<S3HostInfo> {
    let host = host.split(':').next().unwrap_or(host);
    let labels: Vec<&str> = host.split('.').collect();
    let s3_index = labels
        .iter()
        .position(|label| label.eq_ignore_ascii_case("s3"))?;

    if s3_index == 0 {
        return Some(S3HostInfo {
            style: S3AddressingStyle::PathStyle,
            bucket: String::new(),
        });
    }

    Some(S3HostInfo {
        style: S3AddressingStyle::VirtualHosted,
        bucket: labels[..s3_index].join("."),
    })
}
