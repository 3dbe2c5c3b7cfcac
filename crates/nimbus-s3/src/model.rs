//! Bucket records and the typed listing document.

use std::io::{self, Write};

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};

use nimbus_protocol::encode::{XmlRoot, write_text};

/// The namespace on storage response documents.
pub const S3_XMLNS: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// A stored bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bucket {
    /// Bucket name, globally unique in the emulated namespace.
    pub name: String,
    /// Creation timestamp.
    pub creation_date: DateTime<Utc>,
}

/// The `ListBuckets` response document.
#[derive(Debug)]
pub(crate) struct ListAllMyBucketsResult {
    pub buckets: Vec<Bucket>,
}

impl XmlRoot for ListAllMyBucketsResult {
    const ROOT_ELEMENT: &'static str = "ListAllMyBucketsResult";
    const XMLNS: &'static str = S3_XMLNS;

    fn write_children<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer.create_element("Owner").write_inner_content(|w| {
            write_text(w, "ID", "nimbus")?;
            write_text(w, "DisplayName", "nimbus")
        })?;
        writer.create_element("Buckets").write_inner_content(|w| {
            for bucket in &self.buckets {
                w.create_element("Bucket").write_inner_content(|w| {
                    write_text(w, "Name", &bucket.name)?;
                    write_text(
                        w,
                        "CreationDate",
                        &bucket
                            .creation_date
                            .to_rfc3339_opts(SecondsFormat::Millis, true),
                    )
                })?;
            }
            Ok::<_, io::Error>(())
        })?;
        Ok(())
    }
}
