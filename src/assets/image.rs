use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use base64::Engine;
use kurbo::Affine;
use serde::{Deserialize, Serialize};

use crate::assets::loader::DecodedImage;
use crate::filters::registry::LoadOptions;
use crate::foundation::cancel::guard;
use crate::foundation::error::{FxError, FxResult};
use crate::foundation::math::Fnv1a64;

static NEXT_IMAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Serialized tag for image records.
pub const IMAGE_TYPE: &str = "image";

/// A decoded raster image placed with its own position and scale.
///
/// This is the surface the filter pipeline needs from an image object: pixels, a transform and a
/// cache key that changes whenever either changes.
///
/// A clone shares the pixel storage but gets its own id, so it can be placed independently
/// without competing with the original for a texture cache slot.
pub struct ImageResource {
    id: u64,
    src: Option<String>,
    width: u32,
    height: u32,
    rgba8: Arc<Vec<u8>>,
    left: f64,
    top: f64,
    scale_x: f64,
    scale_y: f64,
    cache_key: String,
}

impl Clone for ImageResource {
    fn clone(&self) -> Self {
        let mut img = Self {
            id: NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed),
            src: self.src.clone(),
            width: self.width,
            height: self.height,
            rgba8: Arc::clone(&self.rgba8),
            left: self.left,
            top: self.top,
            scale_x: self.scale_x,
            scale_y: self.scale_y,
            cache_key: String::new(),
        };
        img.refresh_cache_key();
        img
    }
}

impl std::fmt::Debug for ImageResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageResource")
            .field("id", &self.id)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("left", &self.left)
            .field("top", &self.top)
            .field("scale_x", &self.scale_x)
            .field("scale_y", &self.scale_y)
            .field("cache_key", &self.cache_key)
            .finish_non_exhaustive()
    }
}

/// Wire form of an [`ImageResource`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    /// Always [`IMAGE_TYPE`].
    #[serde(rename = "type", default = "image_type")]
    pub kind: String,
    /// Path or `data:` URI the pixels were loaded from.
    pub src: String,
    /// Horizontal offset in target pixels.
    #[serde(default)]
    pub left: f64,
    /// Vertical offset in target pixels.
    #[serde(default)]
    pub top: f64,
    /// Horizontal scale.
    #[serde(default = "one")]
    pub scale_x: f64,
    /// Vertical scale.
    #[serde(default = "one")]
    pub scale_y: f64,
    /// Decoded width; informational.
    #[serde(default)]
    pub width: u32,
    /// Decoded height; informational.
    #[serde(default)]
    pub height: u32,
}

fn image_type() -> String {
    IMAGE_TYPE.to_string()
}

fn one() -> f64 {
    1.0
}

impl ImageResource {
    /// Wrap straight-alpha RGBA8 pixels with an identity transform.
    pub fn from_rgba8(width: u32, height: u32, rgba8: Vec<u8>) -> FxResult<Self> {
        check_rgba8(width, height, &rgba8)?;
        let mut img = Self {
            id: NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed),
            src: None,
            width,
            height,
            rgba8: Arc::new(rgba8),
            left: 0.0,
            top: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            cache_key: String::new(),
        };
        img.refresh_cache_key();
        Ok(img)
    }

    pub(crate) fn from_decoded(src: String, decoded: DecodedImage) -> FxResult<Self> {
        let mut img = Self::from_rgba8(decoded.width, decoded.height, decoded.rgba8)?;
        img.src = Some(src);
        Ok(img)
    }

    /// Builder-style position.
    pub fn with_position(mut self, left: f64, top: f64) -> Self {
        self.set_position(left, top);
        self
    }

    /// Builder-style scale.
    pub fn with_scale(mut self, scale_x: f64, scale_y: f64) -> Self {
        self.set_scale(scale_x, scale_y);
        self
    }

    /// Move the image; refreshes the cache key.
    pub fn set_position(&mut self, left: f64, top: f64) {
        self.left = left;
        self.top = top;
        self.refresh_cache_key();
    }

    /// Rescale the image; refreshes the cache key.
    pub fn set_scale(&mut self, scale_x: f64, scale_y: f64) {
        self.scale_x = scale_x;
        self.scale_y = scale_y;
        self.refresh_cache_key();
    }

    /// Replace the pixels; the previous `src` no longer describes them and is dropped.
    pub fn set_pixels(&mut self, width: u32, height: u32, rgba8: Vec<u8>) -> FxResult<()> {
        check_rgba8(width, height, &rgba8)?;
        self.width = width;
        self.height = height;
        self.rgba8 = Arc::new(rgba8);
        self.src = None;
        self.refresh_cache_key();
        Ok(())
    }

    /// Process-unique identity, stable across pixel and transform changes.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Content identity: changes whenever pixels or transform change.
    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    /// Decoded width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Decoded height.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Straight-alpha RGBA8 pixels.
    pub fn rgba8(&self) -> &[u8] {
        &self.rgba8
    }

    /// Horizontal offset.
    pub fn left(&self) -> f64 {
        self.left
    }

    /// Vertical offset.
    pub fn top(&self) -> f64 {
        self.top
    }

    /// Horizontal scale.
    pub fn scale_x(&self) -> f64 {
        self.scale_x
    }

    /// Vertical scale.
    pub fn scale_y(&self) -> f64 {
        self.scale_y
    }

    /// Where the image was loaded from, if anywhere.
    pub fn src(&self) -> Option<&str> {
        self.src.as_deref()
    }

    /// The image's own placement: scale, then offset.
    pub fn transform(&self) -> Affine {
        Affine::new([self.scale_x, 0.0, 0.0, self.scale_y, self.left, self.top])
    }

    /// Serialize; images without a `src` embed their pixels as a PNG `data:` URI.
    pub fn to_object(&self) -> FxResult<serde_json::Value> {
        let src = match &self.src {
            Some(s) => s.clone(),
            None => self.png_data_uri()?,
        };
        let record = ImageRecord {
            kind: image_type(),
            src,
            left: self.left,
            top: self.top,
            scale_x: self.scale_x,
            scale_y: self.scale_y,
            width: self.width,
            height: self.height,
        };
        Ok(serde_json::to_value(record)?)
    }

    /// Rebuild an image from its record, loading pixels through `opts.loader`.
    #[tracing::instrument(skip_all)]
    pub async fn from_object(object: serde_json::Value, opts: LoadOptions) -> FxResult<Self> {
        let record: ImageRecord = serde_json::from_value(object)
            .map_err(|e| FxError::validation(format!("invalid image record: {e}")))?;
        if record.kind != IMAGE_TYPE {
            return Err(FxError::validation(format!(
                "expected image record, got type '{}'",
                record.kind
            )));
        }

        let loader = &opts.loader;
        let decoded = guard(opts.signal.as_ref(), "image load", async {
            loader.load(&record.src).await
        })
        .await?;
        tracing::debug!(width = decoded.width, height = decoded.height, "image loaded");

        Ok(Self::from_decoded(record.src, decoded)?
            .with_position(record.left, record.top)
            .with_scale(record.scale_x, record.scale_y))
    }

    fn png_data_uri(&self) -> FxResult<String> {
        let buf = image::RgbaImage::from_raw(self.width, self.height, self.rgba8.to_vec())
            .ok_or_else(|| FxError::validation("image pixels do not match dimensions"))?;
        let mut png = Vec::new();
        buf.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .context("encode image as png")?;
        Ok(format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(png)
        ))
    }

    fn refresh_cache_key(&mut self) {
        let mut h = Fnv1a64::new_default();
        h.write_u32(self.width);
        h.write_u32(self.height);
        h.write_bytes(&self.rgba8);
        h.write_f64(self.left);
        h.write_f64(self.top);
        h.write_f64(self.scale_x);
        h.write_f64(self.scale_y);
        self.cache_key = format!("{}:{:016x}", self.id, h.finish());
    }
}

fn check_rgba8(width: u32, height: u32, rgba8: &[u8]) -> FxResult<()> {
    let expected = crate::render::pixels::byte_len(width, height)?;
    if rgba8.len() != expected || width == 0 || height == 0 {
        return Err(FxError::validation(format!(
            "image must be non-empty with {expected} rgba8 bytes for {width}x{height}"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/assets/image.rs"]
mod tests;
