#![cfg_attr(docsrs, doc(cfg(feature = "plugins")))]
//! HTTP response compression plugin.
//!
//! Gzip is the only encoding the search API's clients need to negotiate, so this
//! plugin keeps the builder/`TakoPlugin` shape from the original multi-codec
//! version but drops Brotli/DEFLATE/Zstandard support and the streaming path.
//!
//! # Examples
//!
//! ```rust
//! use pansou::plugins::compression::CompressionBuilder;
//! use pansou::plugins::TakoPlugin;
//! use pansou::router::Router;
//!
//! let mut router = Router::new();
//! let compression = CompressionBuilder::new().min_size(1024).build();
//! router.plugin(compression);
//! ```

use std::io::Write;

use anyhow::Result;
use bytes::Bytes;
use flate2::Compression as GzLevel;
use flate2::write::GzEncoder;
use http::HeaderValue;
use http::StatusCode;
use http::header::ACCEPT_ENCODING;
use http::header::CONTENT_ENCODING;
use http::header::CONTENT_LENGTH;
use http::header::CONTENT_TYPE;
use http::header::VARY;
use http_body_util::BodyExt;

use crate::body::TakoBody;
use crate::middleware::Next;
use crate::plugins::TakoPlugin;
use crate::responder::Responder;
use crate::router::Router;
use crate::types::Request;

/// Configuration settings for HTTP response compression.
#[derive(Clone)]
pub struct Config {
  /// Minimum response size in bytes required for compression to be applied.
  pub min_size: usize,
  /// Gzip compression level (1-9, where 9 is maximum compression).
  pub gzip_level: u32,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      min_size: 1024,
      gzip_level: 6,
    }
  }
}

/// Builder for configuring HTTP response compression settings.
pub struct CompressionBuilder(Config);

impl CompressionBuilder {
  pub fn new() -> Self {
    Self(Config::default())
  }

  /// Sets the minimum response size threshold for compression.
  pub fn min_size(mut self, bytes: usize) -> Self {
    self.0.min_size = bytes;
    self
  }

  /// Sets the Gzip compression level (1-9).
  pub fn gzip_level(mut self, lvl: u32) -> Self {
    self.0.gzip_level = lvl.min(9);
    self
  }

  pub fn build(self) -> CompressionPlugin {
    CompressionPlugin { cfg: self.0 }
  }
}

impl Default for CompressionBuilder {
  fn default() -> Self {
    Self::new()
  }
}

/// HTTP response compression plugin for Tako applications.
#[derive(Clone)]
#[doc(alias = "compression")]
#[doc(alias = "gzip")]
pub struct CompressionPlugin {
  cfg: Config,
}

impl Default for CompressionPlugin {
  fn default() -> Self {
    Self {
      cfg: Config::default(),
    }
  }
}

impl TakoPlugin for CompressionPlugin {
  fn name(&self) -> &'static str {
    "CompressionPlugin"
  }

  fn setup(&self, router: &Router) -> Result<()> {
    let cfg = self.cfg.clone();
    router.middleware(move |req, next| {
      let cfg = cfg.clone();
      async move { compress_middleware(req, next, cfg).await.into_response() }
    });
    Ok(())
  }
}

/// Buffers the response body and gzip-compresses it when the client accepts gzip,
/// the body is large enough, and the content type looks text-like.
async fn compress_middleware(req: Request, next: Next, cfg: Config) -> impl Responder {
  let accepted = req
    .headers()
    .get(ACCEPT_ENCODING)
    .and_then(|v| v.to_str().ok())
    .unwrap_or("")
    .to_ascii_lowercase();

  let mut resp = next.run(req).await;

  let status = resp.status();
  if !(status.is_success() || status == StatusCode::NOT_MODIFIED) {
    return resp.into_response();
  }

  if resp.headers().contains_key(CONTENT_ENCODING) {
    return resp.into_response();
  }

  if let Some(ct) = resp.headers().get(CONTENT_TYPE) {
    let ct = ct.to_str().unwrap_or("");
    if !(ct.starts_with("text/") || ct.contains("json") || ct.contains("javascript")) {
      return resp.into_response();
    }
  }

  let body_bytes = resp.body_mut().collect().await.unwrap().to_bytes();
  if !accepted.contains("gzip") || body_bytes.len() < cfg.min_size {
    *resp.body_mut() = TakoBody::from(Bytes::from(body_bytes));
    return resp.into_response();
  }

  match compress_gzip(&body_bytes, cfg.gzip_level) {
    Ok(compressed) => {
      *resp.body_mut() = TakoBody::from(Bytes::from(compressed));
      resp
        .headers_mut()
        .insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
      resp.headers_mut().remove(CONTENT_LENGTH);
      resp
        .headers_mut()
        .insert(VARY, HeaderValue::from_static("Accept-Encoding"));
    }
    Err(_) => {
      *resp.body_mut() = TakoBody::from(Bytes::from(body_bytes));
    }
  }

  resp.into_response()
}

fn compress_gzip(data: &[u8], lvl: u32) -> std::io::Result<Vec<u8>> {
  let mut enc = GzEncoder::new(Vec::new(), GzLevel::new(lvl));
  enc.write_all(data)?;
  enc.finish()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn gzip_roundtrips_via_flate2_reader() {
    let data = b"hello hello hello hello hello hello hello hello hello hello";
    let compressed = compress_gzip(data, 6).unwrap();
    assert!(compressed.len() < data.len());

    use flate2::read::GzDecoder;
    use std::io::Read;
    let mut decoder = GzDecoder::new(&compressed[..]);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).unwrap();
    assert_eq!(out, data);
  }
}
