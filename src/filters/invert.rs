use serde::{Deserialize, Serialize};

use crate::filters::registry::LoadOptions;
use crate::filters::{Filter, ParamValue, expect_type};
use crate::foundation::error::{FxError, FxResult};
use crate::render::context::FilterContext;

/// Replaces each color channel `v` with `255 - v`, optionally alpha too.
#[derive(Clone, Debug, PartialEq)]
pub struct Invert {
    /// Whether the filter does anything at all.
    pub invert: bool,
    /// Also invert the alpha channel.
    pub alpha: bool,
}

#[derive(Serialize, Deserialize)]
struct InvertRecord {
    #[serde(rename = "type")]
    kind: String,
    invert: bool,
    #[serde(default)]
    alpha: bool,
}

impl Default for Invert {
    fn default() -> Self {
        Self {
            invert: true,
            alpha: false,
        }
    }
}

impl Invert {
    /// Serialization tag.
    pub const TYPE: &'static str = "Invert";

    /// Invert color channels only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style alpha switch.
    pub fn with_alpha(mut self, alpha: bool) -> Self {
        self.alpha = alpha;
        self
    }

    /// Rebuild from a record produced by [`Filter::to_object`].
    pub async fn from_object(object: serde_json::Value, _opts: LoadOptions) -> FxResult<Self> {
        expect_type(&object, Self::TYPE)?;
        let record: InvertRecord = serde_json::from_value(object)
            .map_err(|e| FxError::validation(format!("invalid Invert record: {e}")))?;
        Ok(Self {
            invert: record.invert,
            alpha: record.alpha,
        })
    }

    #[cfg(feature = "gpu")]
    pub(crate) fn uniforms(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[0..4].copy_from_slice(&u32::from(self.invert).to_le_bytes());
        out[4..8].copy_from_slice(&u32::from(self.alpha).to_le_bytes());
        out
    }
}

/// Invert straight RGBA8 pixels in place.
pub fn invert_rgba8(data: &mut [u8], alpha: bool) {
    for px in data.chunks_exact_mut(4) {
        px[0] = 255 - px[0];
        px[1] = 255 - px[1];
        px[2] = 255 - px[2];
        if alpha {
            px[3] = 255 - px[3];
        }
    }
}

impl Filter for Invert {
    fn filter_type(&self) -> &'static str {
        Self::TYPE
    }

    fn main_parameter(&self) -> Option<&'static str> {
        Some("invert")
    }

    fn parameter(&self, name: &str) -> Option<ParamValue> {
        match name {
            "invert" => Some(ParamValue::Bool(self.invert)),
            "alpha" => Some(ParamValue::Bool(self.alpha)),
            _ => None,
        }
    }

    fn is_neutral_state(&self) -> bool {
        !self.invert
    }

    fn apply_to_cpu(&self, ctx: &mut FilterContext<'_>) -> FxResult<()> {
        if !self.invert {
            return Ok(());
        }
        let surface = ctx.cpu_surface()?;
        invert_rgba8(&mut surface.image.data, self.alpha);
        Ok(())
    }

    #[cfg(feature = "gpu")]
    fn apply_to_gpu(&self, ctx: &mut FilterContext<'_>) -> FxResult<()> {
        ctx.run_gpu_program(
            crate::render::shaders::ProgramSpec {
                cache_key: Self::TYPE.to_string(),
                fragment: crate::render::shaders::INVERT_FS,
                extra_texture: false,
            },
            &self.uniforms(),
            None,
        )
    }

    fn to_object(&self) -> FxResult<serde_json::Value> {
        Ok(serde_json::to_value(InvertRecord {
            kind: Self::TYPE.to_string(),
            invert: self.invert,
            alpha: self.alpha,
        })?)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/filters/invert.rs"]
mod tests;
