use std::path::{Path, PathBuf};

use anyhow::Context;
use base64::Engine;
use futures::future::BoxFuture;

use crate::foundation::error::{FxError, FxResult};

/// Straight-alpha RGBA8 pixels produced by an [`ImageLoader`].
#[derive(Clone, Debug)]
pub struct DecodedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major RGBA8 bytes.
    pub rgba8: Vec<u8>,
}

/// Fetches and decodes the pixels behind an image record's `src`.
///
/// Returned futures are dropped when a reconstruction is cancelled, so implementations should
/// release whatever they hold on drop.
pub trait ImageLoader: Send + Sync {
    /// Resolve `src` into pixels.
    fn load(&self, src: &str) -> BoxFuture<'static, FxResult<DecodedImage>>;
}

/// Loads `data:` URIs and files relative to a root directory.
///
/// Each load reads and decodes on its own thread, so sibling loads proceed together and a dropped
/// future stops waiting without blocking the caller.
#[derive(Clone, Debug)]
pub struct FsImageLoader {
    root: PathBuf,
}

impl FsImageLoader {
    /// Resolve relative paths against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for FsImageLoader {
    fn default() -> Self {
        Self::new(".")
    }
}

impl ImageLoader for FsImageLoader {
    fn load(&self, src: &str) -> BoxFuture<'static, FxResult<DecodedImage>> {
        let src = src.to_string();
        let root = self.root.clone();
        let (tx, rx) = futures::channel::oneshot::channel();
        let spawned = std::thread::Builder::new()
            .name("fxchain-image-load".to_string())
            .spawn(move || {
                // The receiver is gone when the load was cancelled.
                let _ = tx.send(read_and_decode(&root, &src));
            });
        Box::pin(async move {
            spawned.map_err(|e| FxError::resource_load(format!("spawn image loader: {e}")))?;
            rx.await
                .map_err(|_| FxError::resource_load("image loader exited without a result"))?
        })
    }
}

fn read_and_decode(root: &Path, src: &str) -> FxResult<DecodedImage> {
    let bytes = if src.starts_with("data:") {
        decode_data_uri(src)?
    } else {
        let rel = normalize_rel_path(src)?;
        let path = root.join(&rel);
        std::fs::read(&path)
            .map_err(|e| FxError::resource_load(format!("read '{}': {e}", path.display())))?
    };
    decode_image(&bytes)
}

/// Decode encoded image bytes into straight RGBA8.
pub fn decode_image(bytes: &[u8]) -> FxResult<DecodedImage> {
    let dyn_img = image::load_from_memory(bytes)
        .context("decode image from memory")
        .map_err(|e| FxError::resource_load(format!("{e:#}")))?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(DecodedImage {
        width,
        height,
        rgba8: rgba.into_raw(),
    })
}

/// Extract the payload of a base64 `data:` URI.
pub(crate) fn decode_data_uri(uri: &str) -> FxResult<Vec<u8>> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| FxError::resource_load("not a data uri"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| FxError::resource_load("data uri has no payload"))?;
    if !meta.ends_with(";base64") {
        return Err(FxError::resource_load(
            "only base64 data uris are supported",
        ));
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| FxError::resource_load(format!("data uri payload: {e}")))
}

/// Normalize and validate root-relative image paths.
///
/// The normalized result uses `/` separators, removes `.` segments, and rejects absolute paths or
/// parent traversals (`..`).
pub(crate) fn normalize_rel_path(source: &str) -> FxResult<String> {
    let s = source.replace('\\', "/");
    if s.starts_with('/') {
        return Err(FxError::resource_load("image paths must be relative"));
    }
    if s.is_empty() {
        return Err(FxError::resource_load("image path must be non-empty"));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(FxError::resource_load("image paths must not contain '..'"));
        }
        out.push(part);
    }

    if out.is_empty() {
        return Err(FxError::resource_load("image path must contain a file name"));
    }

    Ok(out.join("/"))
}

#[cfg(test)]
#[path = "../../tests/unit/assets/loader.rs"]
mod tests;
