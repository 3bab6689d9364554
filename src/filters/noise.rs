use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::filters::registry::LoadOptions;
use crate::filters::{Filter, ParamValue, expect_type};
use crate::foundation::error::{FxError, FxResult};
use crate::foundation::math::add_offset_sat_u8;
use crate::render::context::FilterContext;

/// Adds the same random offset in `[-noise/2, noise/2]` to the color channels of each pixel.
///
/// Alpha is never touched. The CPU and GPU paths draw from different generators, so only the
/// magnitude of the result is comparable between them.
#[derive(Clone, Debug, PartialEq)]
pub struct Noise {
    /// Magnitude in pixel-value units (0..=255 and beyond). Zero or non-finite values do nothing.
    pub noise: f64,
}

#[derive(Serialize, Deserialize)]
struct NoiseRecord {
    #[serde(rename = "type")]
    kind: String,
    noise: f64,
}

impl Noise {
    /// Serialization tag.
    pub const TYPE: &'static str = "Noise";

    /// Noise of the given magnitude.
    pub fn new(noise: f64) -> Self {
        Self { noise }
    }

    /// Rebuild from a record produced by [`Filter::to_object`].
    pub async fn from_object(object: serde_json::Value, _opts: LoadOptions) -> FxResult<Self> {
        expect_type(&object, Self::TYPE)?;
        let record: NoiseRecord = serde_json::from_value(object)
            .map_err(|e| FxError::validation(format!("invalid Noise record: {e}")))?;
        Ok(Self::new(record.noise))
    }

    fn is_inert(&self) -> bool {
        self.noise == 0.0 || !self.noise.is_finite()
    }

    /// Apply the noise to straight RGBA8 pixels using `rng`.
    pub fn apply_rgba8(&self, data: &mut [u8], rng: &mut impl Rng) {
        if self.is_inert() {
            return;
        }
        let noise = self.noise as f32;
        for px in data.chunks_exact_mut(4) {
            let r = (0.5 - rng.gen_range(0.0f32..1.0)) * noise;
            px[0] = add_offset_sat_u8(px[0], r);
            px[1] = add_offset_sat_u8(px[1], r);
            px[2] = add_offset_sat_u8(px[2], r);
        }
    }

    #[cfg(feature = "gpu")]
    pub(crate) fn uniforms(&self, height: u32, seed: f32) -> [u8; 16] {
        let mut out = [0u8; 16];
        let amount = if self.is_inert() { 0.0 } else { (self.noise / 255.0) as f32 };
        out[0..4].copy_from_slice(&amount.to_le_bytes());
        out[4..8].copy_from_slice(&seed.to_le_bytes());
        out[8..12].copy_from_slice(&(1.0 / height.max(1) as f32).to_le_bytes());
        out
    }
}

impl Filter for Noise {
    fn filter_type(&self) -> &'static str {
        Self::TYPE
    }

    fn main_parameter(&self) -> Option<&'static str> {
        Some("noise")
    }

    fn parameter(&self, name: &str) -> Option<ParamValue> {
        (name == "noise").then_some(ParamValue::Number(self.noise))
    }

    fn is_neutral_state(&self) -> bool {
        self.is_inert()
    }

    fn apply_to_cpu(&self, ctx: &mut FilterContext<'_>) -> FxResult<()> {
        if self.is_inert() {
            return Ok(());
        }
        let surface = ctx.cpu_surface()?;
        self.apply_rgba8(&mut surface.image.data, &mut rand::thread_rng());
        Ok(())
    }

    #[cfg(feature = "gpu")]
    fn apply_to_gpu(&self, ctx: &mut FilterContext<'_>) -> FxResult<()> {
        let uniforms = self.uniforms(ctx.height(), rand::random::<f32>());
        ctx.run_gpu_program(
            crate::render::shaders::ProgramSpec {
                cache_key: Self::TYPE.to_string(),
                fragment: crate::render::shaders::NOISE_FS,
                extra_texture: false,
            },
            &uniforms,
            None,
        )
    }

    fn to_object(&self) -> FxResult<serde_json::Value> {
        Ok(serde_json::to_value(NoiseRecord {
            kind: Self::TYPE.to_string(),
            noise: self.noise,
        })?)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/filters/noise.rs"]
mod tests;
