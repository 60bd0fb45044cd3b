//! Response compression.
//!
//! # Responsibilities
//! - Negotiate a content coding from `Accept-Encoding`
//! - Install an encoder on the response that runs at finalisation
//! - Provide the `CompressionModule` middleware
//!
//! # Design Decisions
//! - gzip is preferred over deflate whenever both are acceptable
//! - The size threshold is checked against the final body, not a declared length
//! - HTTP `deflate` is the zlib format, so it is produced with `ZlibEncoder`

use std::io::{self, Write};

use async_trait::async_trait;
use axum::http::header;
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;

use crate::http::{RequestContext, RequestError};
use crate::plugin::{settings, Configurable, ConfigurationError, Middleware, Settings};

/// Default `MinSizeToCompress`.
pub const DEFAULT_MIN_SIZE: usize = 1024;

/// Supported content codings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCoding {
    Gzip,
    Deflate,
}

impl ContentCoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentCoding::Gzip => "gzip",
            ContentCoding::Deflate => "deflate",
        }
    }
}

/// Pick a coding from an `Accept-Encoding` header value.
///
/// Tokens with `q=0` are refused. `*` counts as accepting gzip.
pub fn negotiate(accept_encoding: &str) -> Option<ContentCoding> {
    let mut gzip = false;
    let mut deflate = false;

    for token in accept_encoding.split(',') {
        let mut parts = token.split(';');
        let name = parts.next().unwrap_or("").trim();
        if name.is_empty() {
            continue;
        }

        let refused = parts.any(|param| {
            let param = param.trim();
            match param.split_once('=') {
                Some((key, value)) if key.trim().eq_ignore_ascii_case("q") => value
                    .trim()
                    .parse::<f32>()
                    .map(|q| q <= 0.0)
                    .unwrap_or(false),
                _ => false,
            }
        });
        if refused {
            continue;
        }

        if name.eq_ignore_ascii_case("gzip") || name.eq_ignore_ascii_case("x-gzip") || name == "*" {
            gzip = true;
        } else if name.eq_ignore_ascii_case("deflate") {
            deflate = true;
        }
    }

    if gzip {
        Some(ContentCoding::Gzip)
    } else if deflate {
        Some(ContentCoding::Deflate)
    } else {
        None
    }
}

/// Compresses a finished body when it is large enough.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseEncoder {
    coding: ContentCoding,
    min_size: usize,
}

impl ResponseEncoder {
    pub fn new(coding: ContentCoding, min_size: usize) -> Self {
        Self { coding, min_size }
    }

    pub fn coding(&self) -> ContentCoding {
        self.coding
    }

    pub fn applies_to(&self, body_len: usize) -> bool {
        body_len > 0 && body_len >= self.min_size
    }

    pub fn encode(&self, body: &[u8]) -> io::Result<Vec<u8>> {
        match self.coding {
            ContentCoding::Gzip => {
                let mut encoder = GzEncoder::new(Vec::with_capacity(body.len() / 2), Compression::default());
                encoder.write_all(body)?;
                encoder.finish()
            }
            ContentCoding::Deflate => {
                let mut encoder = ZlibEncoder::new(Vec::with_capacity(body.len() / 2), Compression::default());
                encoder.write_all(body)?;
                encoder.finish()
            }
        }
    }
}

/// Middleware that arranges for the response to be compressed.
///
/// Settings: `MinSizeToCompress` (bytes, default 1024).
#[derive(Debug)]
pub struct CompressionModule {
    min_size: usize,
}

impl Default for CompressionModule {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_MIN_SIZE,
        }
    }
}

impl CompressionModule {
    pub const CLASS_NAME: &'static str = "CompressionModule";

    pub fn new(min_size: usize) -> Self {
        Self { min_size }
    }
}

impl Configurable for CompressionModule {
    fn configure(&mut self, settings: &Settings) -> Result<(), ConfigurationError> {
        if let Some(min) = settings::optional_u64(settings, "MinSizeToCompress")? {
            self.min_size = usize::try_from(min)
                .map_err(|_| ConfigurationError::invalid("MinSizeToCompress", "value too large"))?;
        }
        Ok(())
    }
}

#[async_trait]
impl Middleware for CompressionModule {
    async fn process_request(&self, ctx: &mut RequestContext) -> Result<bool, RequestError> {
        let coding = ctx
            .request()
            .headers()
            .get(header::ACCEPT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .and_then(negotiate);

        if let Some(coding) = coding {
            tracing::trace!(
                request_id = %ctx.request().id(),
                coding = coding.as_str(),
                min_size = self.min_size,
                "Response compression negotiated"
            );
            ctx.response_mut()
                .set_encoder(ResponseEncoder::new(coding, self.min_size));
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Request;
    use axum::http::{HeaderValue, Method};
    use flate2::read::{GzDecoder, ZlibDecoder};
    use std::io::Read;

    #[test]
    fn gzip_preferred_over_deflate() {
        assert_eq!(negotiate("deflate, gzip"), Some(ContentCoding::Gzip));
        assert_eq!(negotiate("deflate"), Some(ContentCoding::Deflate));
        assert_eq!(negotiate("br"), None);
        assert_eq!(negotiate(""), None);
    }

    #[test]
    fn zero_quality_is_refused() {
        assert_eq!(negotiate("gzip;q=0, deflate"), Some(ContentCoding::Deflate));
        assert_eq!(negotiate("gzip; q=0.0"), None);
        assert_eq!(negotiate("gzip;q=0.5"), Some(ContentCoding::Gzip));
        assert_eq!(negotiate("*"), Some(ContentCoding::Gzip));
    }

    #[test]
    fn encoders_produce_decodable_output() {
        let body = b"hello world ".repeat(200);

        let gz = ResponseEncoder::new(ContentCoding::Gzip, 0).encode(&body).unwrap();
        let mut out = Vec::new();
        GzDecoder::new(&gz[..]).read_to_end(&mut out).unwrap();
        assert_eq!(out, body);

        let zl = ResponseEncoder::new(ContentCoding::Deflate, 0).encode(&body).unwrap();
        let mut out = Vec::new();
        ZlibDecoder::new(&zl[..]).read_to_end(&mut out).unwrap();
        assert_eq!(out, body);
    }

    #[test]
    fn configure_reads_threshold() {
        let mut module = CompressionModule::default();
        let settings: Settings =
            serde_json::from_value(serde_json::json!({ "MinSizeToCompress": 10 })).unwrap();
        module.configure(&settings).unwrap();
        assert_eq!(module.min_size, 10);
    }

    #[tokio::test]
    async fn installs_encoder_when_client_accepts() {
        let module = CompressionModule::default();
        let request = Request::new("127.0.0.1:1".parse().unwrap(), Method::GET, "/")
            .with_header(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate"));
        let (mut ctx, _rx) = RequestContext::new(request);

        assert!(module.process_request(&mut ctx).await.unwrap());
        assert_eq!(
            ctx.response().encoder(),
            Some(&ResponseEncoder::new(ContentCoding::Gzip, DEFAULT_MIN_SIZE))
        );
    }

    #[tokio::test]
    async fn no_encoder_without_accept_encoding() {
        let module = CompressionModule::default();
        let request = Request::new("127.0.0.1:1".parse().unwrap(), Method::GET, "/");
        let (mut ctx, _rx) = RequestContext::new(request);

        assert!(module.process_request(&mut ctx).await.unwrap());
        assert!(ctx.response().encoder().is_none());
    }
}
