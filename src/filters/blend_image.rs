use kurbo::{Affine, Point};
use serde::{Deserialize, Serialize};

use crate::assets::image::ImageResource;
use crate::filters::registry::LoadOptions;
use crate::filters::{Filter, ParamValue, expect_type};
use crate::foundation::error::{FxError, FxResult};
use crate::foundation::math::mul_div255_u8;
use crate::render::context::FilterContext;
use crate::render::pixels::PixelBuffer;

/// Scratch pool name of the staging surface the blend image is drawn into.
pub const BLEND_SURFACE: &str = "blend-image";

/// How the blend image combines with the target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    /// Every channel, alpha included, becomes `target * blend / 255`.
    #[default]
    Multiply,
    /// Target alpha is replaced by the blend image's alpha; color is untouched.
    Mask,
}

impl BlendMode {
    /// Serialized name, also the program cache key suffix.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Multiply => "multiply",
            Self::Mask => "mask",
        }
    }
}

impl std::fmt::Display for BlendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Combines the target with a second, independently placed image.
#[derive(Clone, Debug)]
pub struct BlendImage {
    /// The image blended over the target.
    pub image: ImageResource,
    /// Combination rule.
    pub mode: BlendMode,
    /// Blend strength; carried through serialization but not applied to pixels yet.
    pub alpha: f64,
}

#[derive(Serialize, Deserialize)]
struct BlendImageRecord {
    #[serde(rename = "type")]
    kind: String,
    image: serde_json::Value,
    #[serde(default)]
    mode: BlendMode,
    #[serde(default = "full_alpha")]
    alpha: f64,
}

fn full_alpha() -> f64 {
    1.0
}

impl BlendImage {
    /// Serialization tag.
    pub const TYPE: &'static str = "BlendImage";

    /// Blend `image` with `mode` at full strength.
    pub fn new(image: ImageResource, mode: BlendMode) -> Self {
        Self {
            image,
            mode,
            alpha: 1.0,
        }
    }

    /// Rebuild from a record, loading the embedded image before constructing the filter.
    #[tracing::instrument(skip_all)]
    pub async fn from_object(object: serde_json::Value, opts: LoadOptions) -> FxResult<Self> {
        expect_type(&object, Self::TYPE)?;
        let record: BlendImageRecord = serde_json::from_value(object)
            .map_err(|e| FxError::validation(format!("invalid BlendImage record: {e}")))?;
        let image = ImageResource::from_object(record.image, opts).await?;
        Ok(Self {
            image,
            mode: record.mode,
            alpha: record.alpha,
        })
    }

    /// Affine mapping normalized output coordinates into the blend image's normalized space.
    ///
    /// `None` when the image transform cannot be inverted, in which case nothing is drawn.
    pub fn uv_transform(&self, width: u32, height: u32) -> Option<Affine> {
        let t = self.image.transform();
        let det = t.determinant();
        if width == 0 || height == 0 || !t.is_finite() || det == 0.0 || !det.is_finite() {
            return None;
        }
        let (w, h) = (f64::from(width), f64::from(height));
        Some(
            Affine::scale_non_uniform(1.0 / w, 1.0 / h)
                * t.inverse()
                * Affine::scale_non_uniform(w, h),
        )
    }

    /// Draw the blend image into `out` (already sized to the target), transformed into place.
    pub(crate) fn draw_into(&self, out: &mut PixelBuffer) {
        out.clear();
        let Some(m) = self.uv_transform(out.width, out.height) else {
            return;
        };
        let (w, h) = (f64::from(out.width), f64::from(out.height));
        let (iw, ih) = (self.image.width(), self.image.height());
        let src = self.image.rgba8();
        for y in 0..out.height {
            for x in 0..out.width {
                let uv = m * Point::new((f64::from(x) + 0.5) / w, (f64::from(y) + 0.5) / h);
                if !(0.0..1.0).contains(&uv.x) || !(0.0..1.0).contains(&uv.y) {
                    continue;
                }
                let sx = ((uv.x * f64::from(iw)) as u32).min(iw - 1) as usize;
                let sy = ((uv.y * f64::from(ih)) as u32).min(ih - 1) as usize;
                let si = (sy * iw as usize + sx) * 4;
                let di = ((y as usize) * (out.width as usize) + (x as usize)) * 4;
                out.data[di..di + 4].copy_from_slice(&src[si..si + 4]);
            }
        }
    }

    #[cfg(feature = "gpu")]
    pub(crate) fn uniforms(&self, width: u32, height: u32) -> [u8; 48] {
        // Columns of a 3x3 matrix, each padded to a vec4.
        let [a, b, c, d, e, f] = self
            .uv_transform(width, height)
            .map(|m| m.as_coeffs())
            .unwrap_or([0.0, 0.0, 0.0, 0.0, -1.0, -1.0]);
        let cols = [a, b, 0.0, 0.0, c, d, 0.0, 0.0, e, f, 1.0, 0.0];
        let mut out = [0u8; 48];
        for (i, v) in cols.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&(*v as f32).to_le_bytes());
        }
        out
    }
}

/// Combine `target` with the aligned blend pixels in place.
pub fn blend_rgba8(target: &mut [u8], blend: &[u8], mode: BlendMode) {
    for (t, b) in target.chunks_exact_mut(4).zip(blend.chunks_exact(4)) {
        match mode {
            BlendMode::Multiply => {
                for (tc, bc) in t.iter_mut().zip(b) {
                    *tc = mul_div255_u8(*tc, *bc);
                }
            }
            BlendMode::Mask => t[3] = b[3],
        }
    }
}

impl Filter for BlendImage {
    fn filter_type(&self) -> &'static str {
        Self::TYPE
    }

    fn parameter(&self, name: &str) -> Option<ParamValue> {
        match name {
            "image" => Some(ParamValue::Resource(true)),
            "mode" => Some(ParamValue::Text(self.mode.to_string())),
            "alpha" => Some(ParamValue::Number(self.alpha)),
            _ => None,
        }
    }

    fn apply_to_cpu(&self, ctx: &mut FilterContext<'_>) -> FxResult<()> {
        let surface = ctx.cpu_surface()?;
        let (width, height) = (surface.image.width, surface.image.height);
        let staging = surface.resources.acquire(BLEND_SURFACE, width, height)?;
        self.draw_into(staging);
        blend_rgba8(&mut surface.image.data, &staging.data, self.mode);
        Ok(())
    }

    #[cfg(feature = "gpu")]
    fn apply_to_gpu(&self, ctx: &mut FilterContext<'_>) -> FxResult<()> {
        let uniforms = self.uniforms(ctx.width(), ctx.height());
        let fragment = match self.mode {
            BlendMode::Multiply => crate::render::shaders::BLEND_MULTIPLY_FS,
            BlendMode::Mask => crate::render::shaders::BLEND_MASK_FS,
        };
        ctx.run_gpu_program(
            crate::render::shaders::ProgramSpec {
                cache_key: format!("{}_{}", Self::TYPE, self.mode),
                fragment,
                extra_texture: true,
            },
            &uniforms,
            Some(&self.image),
        )
    }

    fn to_object(&self) -> FxResult<serde_json::Value> {
        Ok(serde_json::to_value(BlendImageRecord {
            kind: Self::TYPE.to_string(),
            image: self.image.to_object()?,
            mode: self.mode,
            alpha: self.alpha,
        })?)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/filters/blend_image.rs"]
mod tests;
