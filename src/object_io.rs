//! Uniform object access over `file://` and `s3://` URIs.
//!
//! Readers and writers are addressed by URI. Local paths (with or without a
//! `file://` prefix) go straight to the filesystem; `s3://bucket/key` URIs
//! build an S3 client honoring the endpoint and path-style overrides from
//! [`S3Options`], which keeps MinIO deployments working.
//!
//! Readers transparently gunzip when the URI ends in `.gz` (inferred from
//! the suffix, not by probing the stream). Writers create parent directories
//! for local files; S3 writes buffer the object in memory and upload on
//! [`ObjectWriter::finish`], which is bounded by a single output object per
//! run.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_compression::tokio::bufread::GzipDecoder;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use tokio::fs;
use tokio::io::{AsyncBufRead, AsyncWriteExt, BufReader, BufWriter};
use tokio_util::io::StreamReader;

use crate::config::S3Options;
use crate::constants::{READ_BUF_SIZE, WRITE_BUF_SIZE};
use crate::error::{Error, Result};

/// A parsed object location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Local filesystem path.
    Local(PathBuf),
    /// S3-compatible object.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Object key (no leading slash).
        key: String,
    },
}

/// Parse a URI into a [`Location`].
///
/// A missing scheme is treated as a local path. Anything other than `file`
/// and `s3` is rejected.
pub fn parse_uri(uri: &str) -> Result<Location> {
    if let Some(path) = uri.strip_prefix("file://") {
        return Ok(Location::Local(PathBuf::from(path)));
    }
    if let Some(rest) = uri.strip_prefix("s3://") {
        let (bucket, key) = rest
            .split_once('/')
            .ok_or_else(|| Error::InvalidParams(format!("s3 uri missing key: {uri}")))?;
        if bucket.is_empty() || key.is_empty() {
            return Err(Error::InvalidParams(format!("invalid s3 uri: {uri}")));
        }
        return Ok(Location::S3 {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
    }
    match uri.split_once("://") {
        Some((scheme, _)) => Err(Error::UnsupportedScheme(scheme.to_string())),
        None => Ok(Location::Local(PathBuf::from(uri))),
    }
}

/// Byte stream handed to consumers; already buffered.
pub type Reader = Box<dyn AsyncBufRead + Send + Unpin>;

/// Open a reader on a URI, returning the stream and the content length when
/// it is known. `.gz` URIs are decompressed on the fly; the reported size is
/// the stored (compressed) size.
pub async fn open_reader(uri: &str, s3: &S3Options) -> Result<(Reader, Option<u64>)> {
    let gzipped = uri.to_lowercase().ends_with(".gz");

    let (raw, size): (Reader, Option<u64>) = match parse_uri(uri)? {
        Location::Local(path) => {
            let file = fs::File::open(&path).await?;
            let size = file.metadata().await.ok().map(|m| m.len());
            (Box::new(BufReader::with_capacity(READ_BUF_SIZE, file)), size)
        }
        Location::S3 { bucket, key } => {
            let store = s3_store(&bucket, s3)?;
            let result = store.get(&ObjectPath::from(key)).await?;
            let size = result.meta.size as u64;
            let stream = result.into_stream().map_err(io::Error::other);
            (
                Box::new(BufReader::with_capacity(READ_BUF_SIZE, StreamReader::new(stream))),
                Some(size),
            )
        }
    };

    if gzipped {
        let decoder = GzipDecoder::new(raw);
        Ok((Box::new(BufReader::with_capacity(READ_BUF_SIZE, decoder)), size))
    } else {
        Ok((raw, size))
    }
}

/// A writer bound to an object URI.
///
/// Call [`ObjectWriter::finish`] to flush local buffers or upload the S3
/// object; dropping the writer without finishing discards an S3 write.
pub enum ObjectWriter {
    /// Buffered local file.
    Local(BufWriter<fs::File>),
    /// In-memory buffer uploaded on finish.
    S3 {
        /// Destination store.
        store: Arc<dyn ObjectStore>,
        /// Destination key.
        path: ObjectPath,
        /// Accumulated object body.
        buf: Vec<u8>,
    },
}

impl ObjectWriter {
    /// Append bytes to the object.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        match self {
            ObjectWriter::Local(w) => w.write_all(data).await?,
            ObjectWriter::S3 { buf, .. } => buf.extend_from_slice(data),
        }
        Ok(())
    }

    /// Flush and close the object, uploading buffered S3 bodies.
    pub async fn finish(self) -> Result<()> {
        match self {
            ObjectWriter::Local(mut w) => {
                w.flush().await?;
                w.shutdown().await?;
            }
            ObjectWriter::S3 { store, path, buf } => {
                store.put(&path, bytes::Bytes::from(buf).into()).await?;
            }
        }
        Ok(())
    }
}

/// Create a writer on a URI. Local parents are created as needed.
pub async fn create_writer(uri: &str, s3: &S3Options) -> Result<ObjectWriter> {
    match parse_uri(uri)? {
        Location::Local(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).await?;
                }
            }
            let file = fs::File::create(&path).await?;
            Ok(ObjectWriter::Local(BufWriter::with_capacity(WRITE_BUF_SIZE, file)))
        }
        Location::S3 { bucket, key } => Ok(ObjectWriter::S3 {
            store: s3_store(&bucket, s3)?,
            path: ObjectPath::from(key),
            buf: Vec::new(),
        }),
    }
}

/// Build an S3 client for one bucket with the configured overrides.
fn s3_store(bucket: &str, opts: &S3Options) -> Result<Arc<dyn ObjectStore>> {
    let mut builder = AmazonS3Builder::new()
        .with_bucket_name(bucket)
        .with_region(opts.region.as_str());

    if let Some(endpoint) = &opts.endpoint {
        builder = builder.with_endpoint(endpoint).with_allow_http(true);
    }
    if opts.force_path_style {
        builder = builder.with_virtual_hosted_style_request(false);
    }
    if let (Some(key), Some(secret)) = (&opts.access_key_id, &opts.secret_access_key) {
        builder = builder
            .with_access_key_id(key)
            .with_secret_access_key(secret);
    }

    Ok(Arc::new(builder.build()?))
}

/// Format a local path as a `file://` URI.
pub fn file_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}
